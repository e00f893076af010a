use crate::driver::LinkDriver;
use crate::hal::{ChannelSource, TelemetrySink, Watchdog};
use crate::radio::Transceiver;
use crate::timer::TickTimer;
use core::cell::RefCell;
use critical_section::Mutex;

/// Creates the empty global cell a `static` link driver lives in when the
/// tick runs from an interrupt handler.
///
/// ```ignore
/// static LINK: Mutex<RefCell<Option<LinkDriver<Rf, Adc, Tlm, Wdt>>>> =
///     global_link_driver_init::<Rf, Adc, Tlm, Wdt>();
/// ```
pub const fn global_link_driver_init<RF, ADC, TLM, WDT>()
-> Mutex<RefCell<Option<LinkDriver<RF, ADC, TLM, WDT>>>>
where
    RF: Transceiver,
    ADC: ChannelSource,
    TLM: TelemetrySink,
    WDT: Watchdog,
{
    Mutex::new(RefCell::new(None))
}

/// Stores a constructed driver into the global cell. Call once from main
/// before enabling the tick interrupt.
pub fn global_link_driver_setup<RF, ADC, TLM, WDT>(
    global_driver: &'static Mutex<RefCell<Option<LinkDriver<RF, ADC, TLM, WDT>>>>,
    driver: LinkDriver<RF, ADC, TLM, WDT>,
) where
    RF: Transceiver,
    ADC: ChannelSource,
    TLM: TelemetrySink,
    WDT: Watchdog,
{
    critical_section::with(|cs| {
        let _ = global_driver.borrow(cs).replace(Some(driver));
    });
}

/// Ticks the global driver and re-arms the timer with the returned slot
/// timeout. Call from the timer interrupt handler:
///
/// ```ignore
/// #[interrupt]
/// fn TIM3() {
///     global_link_timer_tick(&LINK, &mut timer);
/// }
/// ```
///
/// Does nothing if the driver has not been set up yet.
pub fn global_link_timer_tick<T, RF, ADC, TLM, WDT>(
    global_driver: &'static Mutex<RefCell<Option<LinkDriver<RF, ADC, TLM, WDT>>>>,
    timer: &mut T,
) where
    T: TickTimer,
    RF: Transceiver,
    ADC: ChannelSource,
    TLM: TelemetrySink,
    WDT: Watchdog,
{
    critical_section::with(|cs| {
        if let Some(driver) = global_driver.borrow(cs).borrow_mut().as_mut() {
            let next_us = driver.tick();
            timer.set_next_timeout(next_us);
        }
    });
}
