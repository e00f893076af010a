//! Constants used across the frequency-hopping link protocol.
//!
//! This module defines the protocol-wide constants for packet geometry,
//! hop-table sizing, slot scheduling, binding, and the autotune search.
//!
//! ## Key Concepts
//!
//! - **Packet geometry**: every over-the-air frame is a fixed 17-byte payload
//!   behind a length byte; received frames carry a 2-byte appended status
//!   trailer (RSSI and LQI/CRC).
//! - **Hop table**: both link ends cycle through the same 47-entry channel
//!   list; binding transfers it in 5-entry fragments.
//! - **Slot timing**: the normal cycle is 3 transmit slots and 1 receive slot
//!   spread over two 9 ms hop periods; the per-slot timeouts compensate for
//!   the radio's actual transition latencies.
//! - **Empirical values**: the lost-packet threshold and the autotune step
//!   sizes encode real hardware margins. Treat them as load-bearing.

/// Number of channels in the hop table shared by both link ends.
pub const HOP_TABLE_SIZE: u8 = 47;

/// See [`HOP_TABLE_SIZE`](crate::consts::HOP_TABLE_SIZE)
pub const HOP_TABLE_SIZE_USIZE: usize = HOP_TABLE_SIZE as usize;

/// Value of the leading length byte of every frame (17 payload bytes).
pub const FRAME_LENGTH: u8 = 0x11;

/// Bytes sent per transmitted frame: the length byte plus the payload.
pub const TX_FRAME_SIZE: usize = FRAME_LENGTH as usize + 1;

/// Full receive buffer size: the transmitted frame plus the 2-byte status
/// trailer (RSSI, LQI/CRC) the transceiver appends on reception.
pub const PACKET_BUFFER_SIZE: usize = TX_FRAME_SIZE + 2;

/// First marker byte of a bind packet. Doubles as the hardware address
/// filter value while listening for a bind broadcast.
pub const BIND_MARKER_0: u8 = 0x03;

/// Second marker byte of a bind packet.
pub const BIND_MARKER_1: u8 = 0x01;

/// Hop-table entries carried per bind packet.
pub const BIND_FRAGMENT_LEN: u8 = 5;

/// Number of distinct bind fragments needed to transfer the hop table.
pub const BIND_FRAGMENT_COUNT: u8 = 10;

/// Completeness bitmask value once every fragment has been captured.
pub const BIND_CAPTURE_DONE: u16 = (1 << BIND_FRAGMENT_COUNT) - 1;

/// Fixed filler byte after the telemetry request id in a control packet.
/// Stock transmitters send 0x0B here.
pub const CONTROL_FILLER: u8 = 0x0B;

/// Maximum telemetry payload bytes carried per downlink frame.
pub const TELEMETRY_MAX_BYTES: u8 = 10;

/// See [`TELEMETRY_MAX_BYTES`](crate::consts::TELEMETRY_MAX_BYTES)
pub const TELEMETRY_MAX_BYTES_USIZE: usize = TELEMETRY_MAX_BYTES as usize;

/// The telemetry frame id is a 5-bit wrapping cursor.
pub const TELEMETRY_ID_MASK: u8 = 0x1F;

/// Consecutive missed receive slots after which the link counts as down and
/// both reported RSSI values snap to zero.
pub const PACKET_LOSS_THRESHOLD: u8 = 20;

/// Slot timeout for the plain hop-and-transmit slots, in microseconds.
pub const TIMEOUT_HOP_US: u32 = 9_000;

/// Slot timeout after the last transmit slot of a cycle: TX finishes after
/// roughly 7.2 ms, so the receive preparation slot starts early.
pub const TIMEOUT_TX_TAIL_US: u32 = 7_500;

/// Settle time between switching the front end to receive and arming RX,
/// long enough for the synthesizer to lock on the new channel.
pub const TIMEOUT_RX_SETTLE_US: u32 = 1_300;

/// Length of the receive listen window. Together with the two previous
/// timeouts this closes a pair of 9 ms hop periods: 7.5 + 1.3 + 9.2 = 18 ms.
pub const TIMEOUT_LISTEN_US: u32 = 9_200;

/// Silence window during clone capture before the receive chain is reset:
/// three hop periods plus one millisecond.
pub const CLONE_SILENCE_LIMIT_MS: u16 = 3 * 9 + 1;

/// Lowest frequency-offset value tried by the autotune search.
pub const AUTOTUNE_OFFSET_MIN: i8 = -127;

/// Coarse sweep step. 9 divides the usable range so the sweep still lands
/// inside the narrowest reception window observed on real hardware.
pub const AUTOTUNE_COARSE_STEP: i8 = 9;

/// Upper bound of the coarse sweep (one step short of the i8 range).
pub const AUTOTUNE_COARSE_LIMIT: i8 = 127 - 10;

/// Per-trial listen budget for a bind packet, in 100 microsecond polls.
pub const AUTOTUNE_TEST_POLLS: u8 = 50;

/// Delay between two autotune receive polls, in microseconds.
pub const AUTOTUNE_POLL_DELAY_US: u32 = 100;

/// Upper bound on MARCSTATE polls while waiting for a synthesizer
/// self-calibration to finish. Calibration completes in well under a
/// millisecond; the bound keeps a wedged transceiver from hanging the
/// caller.
pub const CALIBRATION_WAIT_SPINS: u16 = 10_000;

/// Retries for the double-read of the RX byte-count register before a
/// pending packet is abandoned (chip length-register erratum).
pub const LEN_READ_RETRIES: u8 = 10;
