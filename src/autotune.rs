//! Frequency-offset self-calibration.
//!
//! Crystal tolerance between two units can put the receiver far enough off
//! the transmitter's actual carrier that nothing demodulates. The autotune
//! search finds the frequency-offset correction empirically: sweep the
//! offset register while a bound transmitter broadcasts bind packets, note
//! which offsets still receive, and settle on the midpoint of the usable
//! window.
//!
//! The search runs in two passes — a coarse sweep in steps of 9 across the
//! whole signed range, then a fine sweep in steps of 1 across the
//! neighborhood the coarse pass found. Both step sizes are empirical: the
//! coarse step is small enough to land inside the narrowest real reception
//! window, and widening it is a correctness risk, not a cleanup.
//!
//! Like clone capture this is a foreground mode: disable the tick
//! interrupt, then call [`poll()`](Autotune::poll) repeatedly; each call
//! performs one offset trial (a few milliseconds) and services the
//! watchdog.

use crate::channel::listen_on;
use crate::consts::{
    AUTOTUNE_COARSE_LIMIT, AUTOTUNE_COARSE_STEP, AUTOTUNE_OFFSET_MIN, AUTOTUNE_POLL_DELAY_US,
    AUTOTUNE_TEST_POLLS,
};
use crate::driver::LinkDriver;
use crate::fmt::debug;
use crate::hal::{ChannelSource, TelemetrySink, Watchdog};
use crate::radio::{Strobe, Transceiver, flush_overflows, regs};
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;

/// Phase of the offset search.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum AutotuneState {
    /// Rewind to the bottom of the offset range.
    Init,
    /// Sweep the full range in steps of 9, collecting hits.
    CoarseSweep,
    /// Sweep the found neighborhood in steps of 1, refining the window.
    FineSweep,
    /// Window refined; the corrected offset is its midpoint.
    Done,
}

/// The frequency-offset search, holding the exclusive borrow of the
/// [`LinkDriver`] for the duration of the mode.
#[derive(Debug)]
pub struct Autotune<'a, RF, ADC, TLM, WDT>
where
    RF: Transceiver,
    ADC: ChannelSource,
    TLM: TelemetrySink,
    WDT: Watchdog,
{
    link: &'a mut LinkDriver<RF, ADC, TLM, WDT>,
    state: AutotuneState,
    offset: i8,
    hit_min: i8,
    hit_max: i8,
    hit: bool,
}

impl<'a, RF, ADC, TLM, WDT> Autotune<'a, RF, ADC, TLM, WDT>
where
    RF: Transceiver,
    ADC: ChannelSource,
    TLM: TelemetrySink,
    WDT: Watchdog,
{
    pub(crate) fn new(link: &'a mut LinkDriver<RF, ADC, TLM, WDT>) -> Self {
        link.freq_offset = 0;
        listen_on(&mut link.rf, 0);
        Self {
            link,
            state: AutotuneState::Init,
            offset: 0,
            hit_min: 127,
            hit_max: -127,
            hit: false,
        }
    }

    /// Current phase of the search.
    pub fn state(&self) -> AutotuneState {
        self.state
    }

    /// The window of offsets that have received a bind packet so far.
    pub fn hit_window(&self) -> Option<(i8, i8)> {
        self.hit.then_some((self.hit_min, self.hit_max))
    }

    /// Runs one offset trial.
    ///
    /// Returns `Ok` with the corrected offset once the fine sweep has
    /// refined the reception window; the value is already programmed into
    /// the radio and stored in the driver, the caller persists it. Until
    /// then returns [`nb::Error::WouldBlock`]. A coarse sweep that crosses
    /// the whole range without a single hit starts over — the search
    /// retries indefinitely until a broadcast appears.
    pub fn poll<D: DelayNs>(&mut self, delay: &mut D) -> nb::Result<i8, Infallible> {
        self.link.watchdog.reset();
        flush_overflows(&mut self.link.rf);

        match self.state {
            AutotuneState::Init => {
                self.offset = AUTOTUNE_OFFSET_MIN;
                self.state = AutotuneState::CoarseSweep;
            }
            AutotuneState::CoarseSweep => {
                if self.offset < AUTOTUNE_COARSE_LIMIT {
                    self.offset += AUTOTUNE_COARSE_STEP;
                } else if self.hit {
                    // back off one coarse step and comb the window finely
                    self.offset = self.hit_min - AUTOTUNE_COARSE_STEP;
                    self.state = AutotuneState::FineSweep;
                } else {
                    self.state = AutotuneState::Init;
                }
            }
            AutotuneState::FineSweep => {
                if self.offset < i8::MAX
                    && i16::from(self.offset)
                        < i16::from(self.hit_max) + i16::from(AUTOTUNE_COARSE_STEP)
                {
                    self.offset += 1;
                } else {
                    self.state = AutotuneState::Done;
                }
            }
            AutotuneState::Done => {}
        }

        self.test_offset(delay);

        if self.state == AutotuneState::Done {
            let corrected = ((i16::from(self.hit_min) + i16::from(self.hit_max)) / 2) as i8;
            self.link.freq_offset = corrected;
            self.link.rf.strobe(Strobe::Idle);
            self.link.rf.set_register(regs::FSCTRL0, corrected as u8);
            delay.delay_ms(1);
            self.link.rf.strobe(Strobe::Rx);
            debug!("autotune: offset {}", corrected);
            Ok(corrected)
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Programs the trial offset and listens briefly for a bind packet.
    ///
    /// Offset changes only latch from idle, so every trial re-idles first.
    /// A received bind packet updates the hit window and is invalidated so
    /// a later trial cannot count it again.
    fn test_offset<D: DelayNs>(&mut self, delay: &mut D) {
        self.link.rf.strobe(Strobe::Idle);
        self.link.rf.set_register(regs::FSCTRL0, self.offset as u8);
        delay.delay_ms(1);
        self.link.rf.strobe(Strobe::Rx);

        for _ in 0..AUTOTUNE_TEST_POLLS {
            flush_overflows(&mut self.link.rf);
            if self.link.rf.process_packet(self.link.buffer.rx_frame_mut()) {
                // prepare for the next frame before validating this one
                self.link.rf.enter_rx_mode();
                self.link.rf.strobe(Strobe::Rx);

                if self.link.buffer.is_valid_bind() {
                    self.hit = true;
                    self.hit_min = self.hit_min.min(self.offset);
                    self.hit_max = self.hit_max.max(self.offset);
                    self.link.buffer.invalidate();
                    return;
                }
            }
            delay.delay_us(AUTOTUNE_POLL_DELAY_US);
        }
    }
}
