//! Tick scheduling seam for the link driver.
//!
//! The frame cycle does not own a hardware timer; it only decides, on every
//! tick, how far away the next tick must be. This module holds the seam to
//! the platform's timer: the [`TickTimer`] trait that
//! [`LinkDriver::enable`](crate::driver::LinkDriver::enable) and
//! [`LinkDriver::disable`](crate::driver::LinkDriver::disable) drive, plus
//! two ways of wiring the tick itself:
//!
//! - `timer-isr` (default): a `critical_section`-protected global driver
//!   cell ticked from the timer interrupt handler
//! - `delay-loop`: a blocking loop driven by an
//!   `embedded_hal::delay::DelayNs` implementation, for platforms without a
//!   usable compare-timer interrupt

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg_attr(feature = "delay-loop", allow(unused_imports))]
#[cfg(feature = "delay-loop")]
pub use delay::*;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use isr::*;

/// The periodic compare-timer the frame cycle is scheduled on.
///
/// Implementations wrap the platform's timer peripheral. Timeouts are
/// one-shot: the driver re-arms the timer from every tick with the next
/// slot's duration.
pub trait TickTimer {
    /// Programs the time until the next tick interrupt fires.
    fn set_next_timeout(&mut self, micros: u32);

    /// Unmasks the tick interrupt.
    fn enable_interrupt(&mut self);

    /// Masks the tick interrupt. Part of the hand-off into the foreground
    /// modes, which must be the only owner of the radio while they run.
    fn disable_interrupt(&mut self);
}
