//! # hoplink
//!
//! A portable, no_std link-layer engine for frequency-hopping RC control
//! links built on CC2500-class sub-GHz/2.4 GHz transceivers.
//!
//! This crate implements the protocol side of a hand-held transmitter's RF
//! link — everything between "a timer tick fired" and "bytes went through
//! the radio":
//! - time-division slot scheduling (3 transmit slots, 1 receive slot per
//!   4-hop sub-cycle) with per-slot timeouts that keep both ends hop-locked
//! - channel hopping over a shared 47-entry pseudo-random hop table with a
//!   per-channel PLL calibration cache
//! - binding (broadcasting the hop table to a receiver) and clone capture
//!   (adopting another transmitter's identity and hop table off the air)
//! - frequency-offset self-calibration ("autotune")
//! - control/bind/telemetry packet framing and link-quality estimation
//!
//! The radio itself stays behind the
//! [`Transceiver`](crate::radio::Transceiver) trait, and timers, analog
//! sampling, telemetry and the watchdog behind equally narrow traits, so
//! the whole protocol runs — and is tested — without hardware.
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]` support and replaces `heapless::Vec`s with `std::vec::Vec`s |
//! | `delay-loop`          | Blocking tick loop driven by `embedded_hal::delay::DelayNs` |
//! | `timer-isr` (default) | Global driver cell + ISR tick glue via `critical_section` |
//! | `defmt-0-3`           | Uses `defmt` logging |
//! | `log`                 | Uses `log` logging |
//!
//! ## Usage
//!
//! ```ignore
//! use hoplink::driver::{LinkDriver, LinkConfig};
//!
//! let config = storage.load().unwrap_or_default();
//! let mut link = LinkDriver::new(radio, adc, telemetry, watchdog, config);
//! link.init()?;
//! link.enable(&mut timer);
//! // from the periodic timer ISR:
//! let next_us = link.tick();
//! timer.set_next_timeout(next_us);
//! ```
//!
//! Provisioning modes run in the foreground with the tick interrupt
//! disabled:
//!
//! ```ignore
//! link.disable(&mut timer, &mut delay);
//! let mut capture = link.clone_capture();
//! let config = loop {
//!     match capture.poll(&mut delay) {
//!         Ok(config) => break config,
//!         Err(nb::Error::WouldBlock) => continue,
//!     }
//! };
//! storage.save(&config);
//! ```
//!
//! ## Integration Notes
//!
//! - [`tick()`](crate::driver::LinkDriver::tick) runs in interrupt context
//!   with a hard deadline of the shortest slot (1.3 ms); it never blocks
//!   beyond bounded register polls.
//! - Only one driver instance should be active at a time in
//!   interrupt-driven mode.
//! - The cycle driver and the foreground modes (bind, clone capture,
//!   autotune) are mutually exclusive by construction: the foreground modes
//!   hold a mutable borrow of the driver, so the hand-off is checked at
//!   compile time. Disabling the tick interrupt around them is still the
//!   caller's job.
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded
//! environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "timer-isr")]
pub use critical_section;

#[cfg(not(feature = "std"))]
pub use heapless;

pub mod autotune;
pub mod bind;
pub mod channel;
pub mod consts;
pub mod driver;
pub(crate) mod fmt;
pub mod hal;
pub mod packet;
pub mod radio;
pub mod timer;

#[cfg(test)]
mod testutil;

/// Fatal bring-up errors.
///
/// Everything that can go wrong after bring-up — malformed frames, identity
/// mismatches, FIFO overflows, the length-register erratum — is recovered
/// silently and only ever visible through the lost-packet counter. The one
/// unrecoverable condition is a transceiver that is not there at all.
#[derive(PartialEq, Eq, Clone, Copy, Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Error {
    /// The radio did not answer the identity probe with a supported part
    /// number. There is no hardware to drive; whether to retry is the
    /// caller's decision.
    #[error("no supported transceiver detected (partnum {partnum:#04x}, version {version:#04x})")]
    TransceiverNotFound {
        /// Part number reported over the bus.
        partnum: u8,
        /// Silicon revision reported over the bus.
        version: u8,
    },
}
