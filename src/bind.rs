//! Clone capture: adopting another transmitter's identity and hop table.
//!
//! The counterpart of the bind broadcast
//! ([`LinkDriver::enter_bind_mode`](crate::driver::LinkDriver::enter_bind_mode)).
//! The device parks on the calibration channel and passively listens while a
//! master transmitter cycles through its hop-table fragments; once all 10
//! fragments have been seen the captured identity and table are handed back
//! for the caller to persist.
//!
//! This is a foreground mode: disable the tick interrupt, then call
//! [`poll()`](CloneCapture::poll) about once per millisecond until it
//! returns `Ok`. The watchdog is serviced on every call.

use crate::channel::listen_on;
use crate::consts::{
    BIND_CAPTURE_DONE, BIND_FRAGMENT_COUNT, BIND_FRAGMENT_LEN, BIND_MARKER_0,
    CLONE_SILENCE_LIMIT_MS, HOP_TABLE_SIZE,
};
use crate::driver::{LinkConfig, LinkDriver};
use crate::fmt::debug;
use crate::hal::{ChannelSource, TelemetrySink, Watchdog};
use crate::radio::{Strobe, Transceiver, flush_overflows};
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;

/// Passive capture of a bind broadcast.
///
/// Holds the exclusive borrow of the [`LinkDriver`] for the duration of the
/// mode, so nothing else can touch the shared packet buffer while capture
/// is running.
#[derive(Debug)]
pub struct CloneCapture<'a, RF, ADC, TLM, WDT>
where
    RF: Transceiver,
    ADC: ChannelSource,
    TLM: TelemetrySink,
    WDT: Watchdog,
{
    link: &'a mut LinkDriver<RF, ADC, TLM, WDT>,
    hoptable_flags: u16,
    silence_ms: u16,
}

impl<'a, RF, ADC, TLM, WDT> CloneCapture<'a, RF, ADC, TLM, WDT>
where
    RF: Transceiver,
    ADC: ChannelSource,
    TLM: TelemetrySink,
    WDT: Watchdog,
{
    pub(crate) fn new(link: &'a mut LinkDriver<RF, ADC, TLM, WDT>) -> Self {
        // filter on the bind broadcast address with a neutral offset
        link.txid[0] = BIND_MARKER_0;
        link.freq_offset = 0;
        link.configure_address();

        // park on the calibration channel, then start from a clean identity
        listen_on(&mut link.rf, 0);
        link.txid = [0, 0];

        Self {
            link,
            hoptable_flags: 0,
            silence_ms: 0,
        }
    }

    /// Bitmask of the fragments captured so far (bit `n` = entries
    /// `[5n, 5n + 5)`).
    pub fn captured_fragments(&self) -> u16 {
        self.hoptable_flags
    }

    /// Runs one unit of capture work. Call roughly once per millisecond.
    ///
    /// Returns `Ok` with the captured configuration once every fragment has
    /// been seen (the radio is left idle; persist the value and re-run
    /// [`init`](crate::driver::LinkDriver::init) before resuming the
    /// cycle). Until then returns [`nb::Error::WouldBlock`].
    ///
    /// The identity is captured from the first valid bind packet and never
    /// overwritten; duplicate fragments are idempotent. If no frame arrives
    /// for three hop periods the receive chain is reset, which recovers a
    /// transceiver that has wedged mid-packet.
    pub fn poll<D: DelayNs>(&mut self, delay: &mut D) -> nb::Result<LinkConfig, Infallible> {
        self.link.watchdog.reset();
        flush_overflows(&mut self.link.rf);

        if self.silence_ms >= CLONE_SILENCE_LIMIT_MS {
            self.silence_ms = 0;
            self.link.rf.strobe(Strobe::Idle);
            delay.delay_ms(1);
            self.link.rf.enter_rx_mode();
            self.link.rf.strobe(Strobe::Rx);
        }

        if self.link.rf.process_packet(self.link.buffer.rx_frame_mut()) {
            // re-arm before looking at the payload
            self.link.rf.enter_rx_mode();
            self.link.rf.strobe(Strobe::Rx);

            if self.link.buffer.is_valid_bind() {
                self.silence_ms = 0;

                if self.link.txid == [0, 0] {
                    self.link.txid = self.link.buffer.bind_txid();
                    debug!("clone: captured identity");
                }

                let start = self.link.buffer.bind_fragment_start();
                let fragment = start / BIND_FRAGMENT_LEN;
                if fragment < BIND_FRAGMENT_COUNT {
                    for (i, &channel) in self.link.buffer.bind_hop_bytes().iter().enumerate() {
                        let index = u16::from(start) + i as u16;
                        if index < u16::from(HOP_TABLE_SIZE) {
                            self.link.channels.set_entry(index as u8, channel);
                        }
                    }
                    self.hoptable_flags |= 1 << fragment;
                }

                // never process the same frame twice
                self.link.buffer.invalidate();
            }
        } else {
            delay.delay_ms(1);
            self.silence_ms = self.silence_ms.saturating_add(1);
        }

        if self.hoptable_flags == BIND_CAPTURE_DONE {
            self.link.rf.strobe(Strobe::Idle);
            debug!("clone: hop table complete");
            Ok(self.link.config())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}
