//! Frame-cycle driver for the frequency-hopping link.
//!
//! This module provides the [`LinkDriver`] struct, the top-level state
//! machine of the link. It is advanced by calling
//! [`tick()`](LinkDriver::tick) from a periodic timer interrupt; every tick
//! executes one scheduling slot and returns the timeout to program for the
//! next one.
//!
//! ## The cycle
//!
//! The normal cycle is 3 transmit slots and 1 receive slot per 4 hops,
//! matching the counterpart receiver's expectation of one telemetry-carrying
//! return packet per transmit burst:
//!
//! | slot | action | next timeout |
//! |------|--------|--------------|
//! | [`ProcessAndSend`](LinkState::ProcessAndSend) | process downlink, hop, transmit | 9.0 ms |
//! | [`Send`](LinkState::Send) | hop, transmit | 9.0 ms |
//! | [`SendLast`](LinkState::SendLast) | hop, transmit | 7.5 ms |
//! | [`PrepareReceive`](LinkState::PrepareReceive) | hop, RX front end | 1.3 ms |
//! | [`Listen`](LinkState::Listen) | arm receiver | 9.2 ms |
//!
//! The uneven timeouts absorb the radio's actual transition latencies
//! (7.5 + 1.3 + 9.2 closes a pair of 9 ms hop periods), so overshoot on one
//! slot cannot desynchronize the hop sequence.
//!
//! ## Modes
//!
//! [`BindBroadcast`](LinkState::BindBroadcast) replaces the cycle while a
//! receiver is being bound. The foreground provisioning drivers —
//! [`CloneCapture`](crate::bind::CloneCapture) and
//! [`Autotune`](crate::autotune::Autotune) — mutably borrow the driver
//! instead, which makes the mode exclusivity (one owner of the shared
//! packet buffer at a time) a compile-time property. Disable the tick
//! interrupt via [`disable()`](LinkDriver::disable) before entering a
//! foreground mode and re-enable it on exit.

use crate::autotune::Autotune;
use crate::bind::CloneCapture;
use crate::channel::{ChannelHopper, tune_raw};
use crate::consts::{
    BIND_FRAGMENT_LEN, FRAME_LENGTH, HOP_TABLE_SIZE, HOP_TABLE_SIZE_USIZE, PACKET_LOSS_THRESHOLD,
    TELEMETRY_ID_MASK, TIMEOUT_HOP_US, TIMEOUT_LISTEN_US, TIMEOUT_RX_SETTLE_US, TIMEOUT_TX_TAIL_US,
};
use crate::fmt::debug;
use crate::hal::{ChannelSource, TelemetrySink, Watchdog};
use crate::packet::{PacketBuffer, extract_rssi};
use crate::radio::{Strobe, Transceiver, flush_overflows, partnum_valid, regs};
use crate::timer::TickTimer;
use crate::Error;
use embedded_hal::delay::DelayNs;

/// The persisted link parameters: identity, hop table and oscillator
/// correction. Loading and saving this value is the storage collaborator's
/// business; the engine only produces and consumes it.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct LinkConfig {
    /// 2-byte transmitter identity, fixed at bind time.
    pub txid: [u8; 2],
    /// The 47-entry channel hop sequence shared with the receiver.
    pub hop_table: [u8; HOP_TABLE_SIZE_USIZE],
    /// Signed frequency-offset correction found by autotune.
    pub freq_offset: i8,
}

impl Default for LinkConfig {
    /// Reference bench values, useful before a unit has ever been bound.
    fn default() -> Self {
        Self {
            txid: [0x16, 0x68],
            hop_table: [
                0x01, 0x42, 0x83, 0xC4, 0x1A, 0x5B, 0x9C, 0xDD, 0x33, 0x74, 0xB5, 0x0B, 0x4C,
                0x8D, 0xCE, 0x24, 0x65, 0xA6, 0xE7, 0x3D, 0x7E, 0xBF, 0x15, 0x56, 0x97, 0xD8,
                0x2E, 0x6F, 0xB0, 0x06, 0x47, 0x88, 0xC9, 0x1F, 0x60, 0xA1, 0xE2, 0x38, 0x79,
                0xBA, 0x10, 0x51, 0x92, 0xD3, 0x29, 0x6A, 0xAB,
            ],
            freq_offset: 0,
        }
    }
}

/// Scheduling slot the driver will execute on its next tick.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum LinkState {
    /// Process the downlink from the listen window, hop, transmit.
    #[default]
    ProcessAndSend,
    /// Hop and transmit.
    Send,
    /// Hop and transmit; the downlink follows this slot.
    SendLast,
    /// Hop and switch the front end to receive; wait for frequency lock.
    PrepareReceive,
    /// Arm the receiver and keep listening until the next cycle starts.
    Listen,
    /// Broadcast hop-table fragments instead of running the cycle, until
    /// externally stopped.
    BindBroadcast,
}

/// Exponential moving average with smoothing factor 8/128 (1/16).
///
/// The shift floors toward negative infinity, which keeps the filter
/// arithmetic identical to the 8-bit wraparound filter of stock receivers.
fn filter_rssi(current: u8, sample: u8) -> u8 {
    let diff = i32::from(sample) - i32::from(current);
    (i32::from(current) + ((8 * diff) >> 7)) as u8
}

/// The frequency-hopping link driver.
///
/// Owns the radio, the hop/calibration state, the single shared packet
/// buffer and every protocol counter. Construct it with the persisted
/// [`LinkConfig`], run [`init()`](Self::init) once, then drive it from the
/// periodic timer interrupt:
///
/// ```ignore
/// let mut link = LinkDriver::new(radio, adc, telemetry, watchdog, config);
/// link.init()?;
/// link.enable(&mut timer);
/// // in the timer ISR:
/// let next_us = link.tick();
/// timer.set_next_timeout(next_us);
/// ```
///
/// ## Type Parameters
///
/// - `RF`: the [`Transceiver`] driving the radio hardware
/// - `ADC`: the [`ChannelSource`] sampling the 8 analog control channels
/// - `TLM`: the [`TelemetrySink`] consuming downlink telemetry bytes
/// - `WDT`: the [`Watchdog`] serviced during long foreground work
#[derive(Debug)]
pub struct LinkDriver<RF, ADC, TLM, WDT>
where
    RF: Transceiver,
    ADC: ChannelSource,
    TLM: TelemetrySink,
    WDT: Watchdog,
{
    /// Scheduling slot executed by the next [`tick()`](Self::tick).
    pub state: LinkState,
    /// Hop table, hop position and PLL calibration cache.
    pub channels: ChannelHopper,
    /// Frame counter carried in control packets; increments once per tick.
    pub frame_counter: u8,
    /// Telemetry frame id the counterpart is expected to send next.
    pub last_requested_telemetry_id: u8,
    /// Smoothed RSSI as measured by the remote end (reported in the
    /// downlink payload).
    pub rssi: u8,
    /// Smoothed local RSSI of the downlink, after the piecewise transform.
    pub rssi_telemetry: u8,
    /// Receive slots elapsed since the last valid downlink.
    pub packet_lost_counter: u8,

    pub(crate) rf: RF,
    pub(crate) adc: ADC,
    pub(crate) telemetry: TLM,
    pub(crate) watchdog: WDT,
    pub(crate) buffer: PacketBuffer,
    pub(crate) txid: [u8; 2],
    pub(crate) freq_offset: i8,
    bind_fragment: u8,
}

impl<RF, ADC, TLM, WDT> LinkDriver<RF, ADC, TLM, WDT>
where
    RF: Transceiver,
    ADC: ChannelSource,
    TLM: TelemetrySink,
    WDT: Watchdog,
{
    /// Creates a driver from the persisted configuration. No hardware is
    /// touched until [`init()`](Self::init).
    pub fn new(rf: RF, adc: ADC, telemetry: TLM, watchdog: WDT, config: LinkConfig) -> Self {
        Self {
            state: LinkState::ProcessAndSend,
            channels: ChannelHopper::new(config.hop_table),
            frame_counter: 0,
            last_requested_telemetry_id: 0,
            rssi: 100,
            rssi_telemetry: 0,
            packet_lost_counter: 0,
            rf,
            adc,
            telemetry,
            watchdog,
            buffer: PacketBuffer::new(),
            txid: config.txid,
            freq_offset: config.freq_offset,
            bind_fragment: 0,
        }
    }

    /// The transmitter identity currently in use.
    pub fn txid(&self) -> [u8; 2] {
        self.txid
    }

    /// The frequency-offset correction currently programmed.
    pub fn freq_offset(&self) -> i8 {
        self.freq_offset
    }

    /// Snapshot of the persistable link parameters.
    pub fn config(&self) -> LinkConfig {
        LinkConfig {
            txid: self.txid,
            hop_table: *self.channels.table(),
            freq_offset: self.freq_offset,
        }
    }

    /// Brings the link up: identity probe, protocol register configuration,
    /// address filtering, PLL calibration of the whole hop table.
    ///
    /// Fails only when the transceiver does not answer the probe — there is
    /// no radio to drive, and retrying is the caller's decision.
    pub fn init(&mut self) -> Result<(), Error> {
        self.rf.strobe(Strobe::Idle);
        let (partnum, version) = self.rf.hw_info();
        if !partnum_valid(partnum, version) {
            return Err(Error::TransceiverNotFound { partnum, version });
        }
        self.configure();
        self.configure_address();
        self.channels.calibrate_all(&mut self.rf, &mut self.watchdog);
        debug!("link up, freq offset {}", self.freq_offset);
        Ok(())
    }

    /// Writes the protocol's base register configuration.
    fn configure(&mut self) {
        self.rf.strobe(Strobe::Idle);
        // packet-pending on GDO0, RX-FIFO status on GDO2
        self.rf.set_register(regs::IOCFG0, 0x01);
        self.rf.set_register(regs::IOCFG2, 0x02);
        // back to RX after a completed transmission
        self.rf.set_register(regs::MCSM1, 0x0F);
        self.rf.set_register(regs::MCSM0, 0x18);
        self.rf.set_register(regs::PKTLEN, FRAME_LENGTH);
        self.rf.set_register(regs::PKTCTRL0, 0x05);
        self.rf.set_register(regs::PA_TABLE0, 0xFF);
        self.rf.set_register(regs::FSCTRL1, 0x08);
        self.rf.set_register(regs::FSCTRL0, 0x00);
        // 2.404 GHz base frequency
        self.rf.set_register(regs::FREQ2, 0x5C);
        self.rf.set_register(regs::FREQ1, 0x76);
        self.rf.set_register(regs::FREQ0, 0x27);
        self.rf.set_register(regs::MDMCFG4, 0xAA);
        self.rf.set_register(regs::MDMCFG3, 0x39);
        self.rf.set_register(regs::MDMCFG2, 0x11);
        self.rf.set_register(regs::MDMCFG1, 0x23);
        self.rf.set_register(regs::MDMCFG0, 0x7A);
        self.rf.set_register(regs::DEVIATN, 0x42);
        self.rf.set_register(regs::FOCCFG, 0x16);
        self.rf.set_register(regs::BSCFG, 0x6C);
        self.rf.set_register(regs::AGCCTRL2, 0x03);
        self.rf.set_register(regs::AGCCTRL1, 0x40);
        self.rf.set_register(regs::AGCCTRL0, 0x91);
        self.rf.set_register(regs::FREND1, 0x56);
        self.rf.set_register(regs::FREND0, 0x10);
        self.rf.set_register(regs::FSCAL3, 0xA9);
        self.rf.set_register(regs::FSCAL2, 0x05);
        self.rf.set_register(regs::FSCAL1, 0x00);
        self.rf.set_register(regs::FSCAL0, 0x11);
        self.rf.set_register(regs::TEST2, 0x88);
        self.rf.set_register(regs::TEST1, 0x31);
        self.rf.set_register(regs::TEST0, 0x0B);
        self.rf.set_register(regs::ADDR, 0x00);
        self.rf.set_register(regs::PKTCTRL1, regs::PKTCTRL1_APPEND_STATUS);
    }

    /// Programs identity filtering and the frequency offset. Used at
    /// bring-up and whenever either value changes (bind, clone capture).
    pub(crate) fn configure_address(&mut self) {
        self.rf.strobe(Strobe::Idle);
        self.rf.set_register(regs::FSCTRL0, self.freq_offset as u8);
        // manual calibration only: the hop cache replaces autocalibration
        self.rf.set_register(regs::MCSM0, 0x08);
        self.rf.set_register(regs::ADDR, self.txid[0]);
        self.rf.set_register(
            regs::PKTCTRL1,
            regs::PKTCTRL1_APPEND_STATUS
                | regs::PKTCTRL1_CRC_AUTOFLUSH
                | regs::PKTCTRL1_ADR_CHECK_01,
        );
    }

    /// Starts the periodic cycle: counters reset, first slot scheduled,
    /// tick interrupt enabled.
    pub fn enable<T: TickTimer>(&mut self, timer: &mut T) {
        self.frame_counter = 0;
        self.state = LinkState::ProcessAndSend;
        timer.set_next_timeout(TIMEOUT_HOP_US);
        timer.enable_interrupt();
    }

    /// Stops the periodic cycle and waits out a possibly in-flight packet.
    /// This is the hand-off point before a foreground mode may borrow the
    /// driver.
    pub fn disable<T: TickTimer, D: DelayNs>(&mut self, timer: &mut T, delay: &mut D) {
        timer.disable_interrupt();
        delay.delay_ms(20);
    }

    /// Switches the next tick into bind broadcast. The cycle resumes on the
    /// next [`enable()`](Self::enable).
    pub fn enter_bind_mode(&mut self) {
        self.bind_fragment = 0;
        self.state = LinkState::BindBroadcast;
        debug!("entering bind broadcast");
    }

    /// Borrows the driver for passive clone capture of another
    /// transmitter's identity and hop table. Disable the tick interrupt
    /// first.
    pub fn clone_capture(&mut self) -> CloneCapture<'_, RF, ADC, TLM, WDT> {
        CloneCapture::new(self)
    }

    /// Borrows the driver for the frequency-offset search. Disable the tick
    /// interrupt first.
    pub fn autotune(&mut self) -> Autotune<'_, RF, ADC, TLM, WDT> {
        Autotune::new(self)
    }

    /// Smoothed link quality: (remote-reported RSSI, local downlink RSSI).
    ///
    /// Both snap to zero once more than
    /// [`PACKET_LOSS_THRESHOLD`](crate::consts::PACKET_LOSS_THRESHOLD)
    /// receive slots have passed without a valid downlink.
    pub fn link_quality(&self) -> (u8, u8) {
        if self.packet_lost_counter > PACKET_LOSS_THRESHOLD {
            (0, 0)
        } else {
            (self.rssi, self.rssi_telemetry)
        }
    }

    /// Executes one scheduling slot and returns the timeout, in
    /// microseconds, to program for the next tick.
    ///
    /// Runs in interrupt context: everything here is bounded and completes
    /// well inside the shortest slot (1.3 ms). Each tick begins with the
    /// FIFO overflow guard so a glitched transceiver recovers by the next
    /// slot at the latest.
    pub fn tick(&mut self) -> u32 {
        flush_overflows(&mut self.rf);
        let timeout = match self.state {
            LinkState::ProcessAndSend => {
                self.receive_packet();
                self.channels.advance(&mut self.rf, 1);
                self.send_packet();
                self.state = LinkState::Send;
                TIMEOUT_HOP_US
            }
            LinkState::Send => {
                self.channels.advance(&mut self.rf, 1);
                self.send_packet();
                self.state = LinkState::SendLast;
                TIMEOUT_HOP_US
            }
            LinkState::SendLast => {
                self.channels.advance(&mut self.rf, 1);
                self.send_packet();
                // TX of this slot finishes after ~7.2 ms
                self.state = LinkState::PrepareReceive;
                TIMEOUT_TX_TAIL_US
            }
            LinkState::PrepareReceive => {
                self.channels.advance(&mut self.rf, 1);
                self.rf.enter_rx_mode();
                self.state = LinkState::Listen;
                TIMEOUT_RX_SETTLE_US
            }
            LinkState::Listen => {
                self.rf.strobe(Strobe::Rx);
                self.state = LinkState::ProcessAndSend;
                TIMEOUT_LISTEN_US
            }
            LinkState::BindBroadcast => {
                self.bind_fragment += 1;
                if self.bind_fragment * BIND_FRAGMENT_LEN > HOP_TABLE_SIZE {
                    self.bind_fragment = 0;
                }
                self.send_bind_packet();
                TIMEOUT_HOP_US
            }
        };
        self.frame_counter = self.frame_counter.wrapping_add(1);
        timeout
    }

    /// Fetches and processes whatever arrived during the listen window.
    fn receive_packet(&mut self) {
        let received = self.rf.process_packet(self.buffer.rx_frame_mut());

        // counts every receive slot; cleared below on a valid downlink
        self.packet_lost_counter = self.packet_lost_counter.saturating_add(1);

        if received && self.buffer.is_valid_control(self.txid) {
            self.packet_lost_counter = 0;

            self.rssi = filter_rssi(self.rssi, self.buffer.remote_rssi());
            // the transform's low byte keeps the filter in 8-bit arithmetic
            self.rssi_telemetry = filter_rssi(
                self.rssi_telemetry,
                extract_rssi(self.buffer.status_rssi()) as u8,
            );

            let frame_id = self.buffer.telemetry_id();
            if frame_id == self.last_requested_telemetry_id {
                // request fresh data with the next control packet
                self.last_requested_telemetry_id =
                    frame_id.wrapping_add(1) & TELEMETRY_ID_MASK;
                for byte in self.buffer.telemetry_payload() {
                    self.telemetry.enqueue(byte);
                }
            }
        }
    }

    /// Builds and transmits the control packet for the current slot.
    fn send_packet(&mut self) {
        self.rf.strobe(Strobe::FlushRx);
        self.rf.enter_tx_mode();
        let channels = self.adc.sample_channels();
        self.buffer.write_control(
            self.txid,
            self.frame_counter,
            self.last_requested_telemetry_id,
            &channels,
        );
        self.rf.transmit(self.buffer.tx_frame());
    }

    /// Broadcasts the bind packet for the current fragment on the
    /// calibration channel.
    fn send_bind_packet(&mut self) {
        self.rf.strobe(Strobe::FlushRx);
        // bind always broadcasts with a neutral offset; the receiving end
        // autotunes against it afterwards
        self.freq_offset = 0;
        self.configure_address();
        tune_raw(&mut self.rf, 0);
        self.rf.enter_tx_mode();
        self.buffer
            .write_bind(self.txid, self.bind_fragment, self.channels.table());
        self.rf.transmit(self.buffer.tx_frame());
    }
}
