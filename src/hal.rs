//! Collaborator traits for the firmware surrounding the link engine.
//!
//! The engine drives the radio through [`Transceiver`](crate::radio::Transceiver);
//! everything else it needs from the rest of the firmware comes in through
//! the narrow traits below. All of them are trivial to implement on real
//! hardware and trivial to stub in tests.

/// Source of the eight analog control-channel samples carried in every
/// control packet.
pub trait ChannelSource {
    /// Returns the current 10-bit sample of each of the 8 control channels.
    fn sample_channels(&mut self) -> [u16; 8];
}

/// Consumer of telemetry payload bytes extracted from downlink frames.
pub trait TelemetrySink {
    /// Hands one received telemetry byte to the higher layer.
    fn enqueue(&mut self, byte: u8);
}

/// Watchdog service hook, fed on every iteration of long-running foreground
/// work (calibration, clone capture, autotune).
pub trait Watchdog {
    /// Resets the watchdog counter.
    fn reset(&mut self);
}
