use crate::driver::LinkDriver;
use crate::hal::{ChannelSource, TelemetrySink, Watchdog};
use crate::radio::Transceiver;
use embedded_hal::delay::DelayNs;

/// Runs the frame cycle in a blocking loop, sleeping each slot's timeout
/// through a `DelayNs` provider instead of a timer interrupt.
///
/// Slot timing from a busy delay is less exact than a compare timer, but
/// the per-slot timeouts absorb modest jitter. Intended for bring-up and
/// for single-purpose polling firmware; interrupt-driven scheduling is the
/// normal mode.
///
/// This loop never returns.
pub fn run_tick_loop<D, RF, ADC, TLM, WDT>(
    driver: &mut LinkDriver<RF, ADC, TLM, WDT>,
    delay: &mut D,
) -> !
where
    D: DelayNs,
    RF: Transceiver,
    ADC: ChannelSource,
    TLM: TelemetrySink,
    WDT: Watchdog,
{
    loop {
        let next_us = driver.tick();
        delay.delay_us(next_us);
    }
}
