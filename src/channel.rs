//! Hop-table sequencing and PLL calibration caching.
//!
//! Retuning a CC2500-class synthesizer normally requires a self-calibration
//! run of several hundred microseconds — far too long to pay on every hop of
//! a 9 ms cycle. [`ChannelHopper`] therefore calibrates every hop-table
//! channel once up front, caches the per-channel calibration byte (plus the
//! two bytes shared by all channels), and restores the cached values on each
//! hop instead of recalibrating.
//!
//! The cache is all-or-nothing: it is only usable after
//! [`calibrate_all`](ChannelHopper::calibrate_all) has run to completion,
//! and any change to the hop table invalidates it as a whole.

use crate::consts::{CALIBRATION_WAIT_SPINS, HOP_TABLE_SIZE, HOP_TABLE_SIZE_USIZE};
use crate::fmt::debug;
use crate::hal::Watchdog;
use crate::radio::{Strobe, Transceiver, regs};

/// Tunes the radio to a raw channel number with a full self-calibration,
/// bypassing the cache.
///
/// Used before a cache exists: during bind broadcast, clone capture and
/// autotune, which all operate on the fixed calibration channel. The wait
/// for the synthesizer state machine is bounded; a healthy chip settles in
/// well under a millisecond.
pub fn tune_raw<RF: Transceiver>(rf: &mut RF, channel: u8) {
    rf.strobe(Strobe::Idle);
    rf.set_register(regs::CHANNR, channel);
    rf.strobe(Strobe::Calibrate);
    for _ in 0..CALIBRATION_WAIT_SPINS {
        if rf.get_register(regs::MARCSTATE) == regs::MARCSTATE_IDLE {
            break;
        }
    }
}

/// Parks the receiver on a raw channel: idle, RX front end, uncached tune,
/// arm.
pub fn listen_on<RF: Transceiver>(rf: &mut RF, channel: u8) {
    rf.strobe(Strobe::Idle);
    rf.enter_rx_mode();
    tune_raw(rf, channel);
    rf.strobe(Strobe::Rx);
}

/// The hop table, the current position in it, and the calibration cache.
#[derive(Debug)]
pub struct ChannelHopper {
    hop_table: [u8; HOP_TABLE_SIZE_USIZE],
    index: u8,
    fscal1: [u8; HOP_TABLE_SIZE_USIZE],
    fscal2: u8,
    fscal3: u8,
    calibrated: bool,
}

impl ChannelHopper {
    /// Creates a hopper over `hop_table` with an empty calibration cache.
    pub fn new(hop_table: [u8; HOP_TABLE_SIZE_USIZE]) -> Self {
        Self {
            hop_table,
            index: 0,
            fscal1: [0; HOP_TABLE_SIZE_USIZE],
            fscal2: 0,
            fscal3: 0,
            calibrated: false,
        }
    }

    /// The hop table itself.
    pub fn table(&self) -> &[u8; HOP_TABLE_SIZE_USIZE] {
        &self.hop_table
    }

    /// Current position in the hop sequence.
    pub fn current_index(&self) -> u8 {
        self.index
    }

    /// Whether the calibration cache is valid.
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Overwrites one hop-table entry (out-of-range indices are ignored)
    /// and invalidates the calibration cache.
    pub fn set_entry(&mut self, index: u8, channel: u8) {
        if index < HOP_TABLE_SIZE {
            self.hop_table[usize::from(index)] = channel;
            self.calibrated = false;
        }
    }

    /// Tunes the radio to hop-table position `index` from the cache.
    ///
    /// Idles the state machine, restores the three calibration bytes and
    /// sets the channel register. Cannot fail for a valid index; the caller
    /// re-arms RX or TX afterwards.
    pub fn select<RF: Transceiver>(&mut self, rf: &mut RF, index: u8) {
        debug_assert!(index < HOP_TABLE_SIZE);
        debug_assert!(self.calibrated, "hop cache used before calibrate_all");
        self.index = index;
        rf.strobe(Strobe::Idle);
        rf.set_register(regs::FSCAL3, self.fscal3);
        rf.set_register(regs::FSCAL2, self.fscal2);
        rf.set_register(regs::FSCAL1, self.fscal1[usize::from(index)]);
        rf.set_register(regs::CHANNR, self.hop_table[usize::from(index)]);
    }

    /// Moves `delta` positions through the hop sequence and tunes there.
    ///
    /// `delta` may be negative; the result wraps into `[0, table size)`
    /// with an explicit two-sided correction. Deltas beyond one table
    /// length do not occur on this link.
    pub fn advance<RF: Transceiver>(&mut self, rf: &mut RF, delta: i8) {
        let mut next = i16::from(self.index) + i16::from(delta);
        if next < 0 {
            next += i16::from(HOP_TABLE_SIZE);
        }
        if next >= i16::from(HOP_TABLE_SIZE) {
            next -= i16::from(HOP_TABLE_SIZE);
        }
        self.select(rf, next as u8);
    }

    /// Runs the synthesizer self-calibration for every hop-table channel
    /// and fills the cache.
    ///
    /// Must run to completion before the first [`select`](Self::select) of
    /// a session. 47 calibrations take tens of milliseconds, so the
    /// watchdog is serviced on every iteration. The two shared calibration
    /// bytes are read once after the loop; the radio is left idle.
    pub fn calibrate_all<RF: Transceiver, W: Watchdog>(&mut self, rf: &mut RF, watchdog: &mut W) {
        for i in 0..HOP_TABLE_SIZE_USIZE {
            watchdog.reset();
            tune_raw(rf, self.hop_table[i]);
            self.fscal1[i] = rf.get_register(regs::FSCAL1);
        }
        self.fscal3 = rf.get_register(regs::FSCAL3);
        self.fscal2 = rf.get_register(regs::FSCAL2);
        rf.strobe(Strobe::Idle);
        self.calibrated = true;
        debug!("pll calibration cached for {} channels", HOP_TABLE_SIZE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeRadio, FakeWatchdog, test_table};

    fn calibrated_hopper(rf: &mut FakeRadio) -> ChannelHopper {
        let mut hopper = ChannelHopper::new(test_table());
        let mut watchdog = FakeWatchdog::default();
        hopper.calibrate_all(rf, &mut watchdog);
        assert!(watchdog.resets >= 47);
        hopper
    }

    #[test]
    fn test_calibrate_all_fills_cache_and_idles() {
        let mut rf = FakeRadio::new();
        let hopper = calibrated_hopper(&mut rf);

        assert!(hopper.is_calibrated());
        // one calibration strobe per table entry
        let cals = rf.strobes.iter().filter(|&&s| s == Strobe::Calibrate).count();
        assert_eq!(cals, HOP_TABLE_SIZE_USIZE);
        assert_eq!(rf.strobes.last(), Some(&Strobe::Idle));
    }

    #[test]
    fn test_select_restores_cached_calibration() {
        let mut rf = FakeRadio::new();
        let mut hopper = calibrated_hopper(&mut rf);

        hopper.select(&mut rf, 7);
        assert_eq!(hopper.current_index(), 7);
        assert_eq!(rf.regs[usize::from(regs::CHANNR)], hopper.table()[7]);
        // FakeRadio derives FSCAL1 from CHANNR on each Calibrate strobe
        assert_eq!(
            rf.regs[usize::from(regs::FSCAL1)],
            hopper.table()[7].wrapping_add(0x11)
        );
    }

    #[test]
    fn test_advance_round_trips_at_boundaries() {
        let mut rf = FakeRadio::new();
        let mut hopper = calibrated_hopper(&mut rf);

        for start in [0u8, 1, 23, 45, 46] {
            for delta in [-47i8, -46, -23, -1, 0, 1, 23, 46, 47] {
                hopper.select(&mut rf, start);
                hopper.advance(&mut rf, delta);
                assert!(hopper.current_index() < HOP_TABLE_SIZE);
                hopper.advance(&mut rf, -delta);
                assert_eq!(
                    hopper.current_index(),
                    start,
                    "start {start} delta {delta}"
                );
            }
        }
    }

    #[test]
    fn test_advance_wraps_both_directions() {
        let mut rf = FakeRadio::new();
        let mut hopper = calibrated_hopper(&mut rf);

        hopper.select(&mut rf, 46);
        hopper.advance(&mut rf, 1);
        assert_eq!(hopper.current_index(), 0);
        hopper.advance(&mut rf, -1);
        assert_eq!(hopper.current_index(), 46);
    }

    #[test]
    fn test_set_entry_invalidates_cache() {
        let mut rf = FakeRadio::new();
        let mut hopper = calibrated_hopper(&mut rf);

        hopper.set_entry(3, 0x7F);
        assert_eq!(hopper.table()[3], 0x7F);
        assert!(!hopper.is_calibrated());

        // out-of-range writes are dropped and do not invalidate anything
        let mut fresh = ChannelHopper::new(test_table());
        fresh.set_entry(HOP_TABLE_SIZE, 0x7F);
        assert_eq!(fresh.table()[..], test_table()[..]);
    }
}
