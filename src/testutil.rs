//! In-memory doubles for the hardware collaborators, test builds only.

use crate::consts::{
    BIND_FRAGMENT_LEN, BIND_MARKER_0, BIND_MARKER_1, FRAME_LENGTH, HOP_TABLE_SIZE_USIZE,
    PACKET_BUFFER_SIZE,
};
use crate::driver::{LinkConfig, LinkDriver};
use crate::hal::{ChannelSource, TelemetrySink, Watchdog};
use crate::radio::{Strobe, Transceiver, regs};
use crate::timer::TickTimer;
use std::collections::VecDeque;
use std::vec::Vec;

/// Scriptable in-memory transceiver.
///
/// Registers are a plain byte file; strobes and transmitted frames are
/// recorded; received frames are fed through `rx_frames`. A `Calibrate`
/// strobe derives the per-channel FSCAL1 value from the current channel so
/// calibration caching is observable. `hit_window` turns the double into
/// the autotune stub: a canned bind frame appears whenever the programmed
/// frequency offset falls inside the window.
pub struct FakeRadio {
    pub regs: [u8; 0x40],
    pub strobes: Vec<Strobe>,
    pub sent: Vec<Vec<u8>>,
    pub rx_frames: VecDeque<Vec<u8>>,
    pub rxbytes_overrides: VecDeque<u8>,
    pub marcstate: u8,
    pub partnum: u8,
    pub version: u8,
    pub hit_window: Option<(i8, i8)>,
    pub hit_frame: Vec<u8>,
}

impl FakeRadio {
    pub fn new() -> Self {
        Self {
            regs: [0; 0x40],
            strobes: Vec::new(),
            sent: Vec::new(),
            rx_frames: VecDeque::new(),
            rxbytes_overrides: VecDeque::new(),
            marcstate: regs::MARCSTATE_IDLE,
            partnum: regs::PARTNUM_CC2500,
            version: 0x03,
            hit_window: None,
            hit_frame: Vec::new(),
        }
    }

    fn maybe_inject_hit(&mut self) {
        if let Some((lo, hi)) = self.hit_window {
            let offset = self.regs[usize::from(regs::FSCTRL0)] as i8;
            if offset >= lo
                && offset <= hi
                && self.rx_frames.is_empty()
                && !self.hit_frame.is_empty()
            {
                self.rx_frames.push_back(self.hit_frame.clone());
            }
        }
    }
}

impl Transceiver for FakeRadio {
    fn set_register(&mut self, addr: u8, value: u8) {
        self.regs[usize::from(addr)] = value;
    }

    fn get_register(&mut self, addr: u8) -> u8 {
        match addr {
            regs::PARTNUM => self.partnum,
            regs::VERSION => self.version,
            regs::MARCSTATE => self.marcstate,
            regs::RXBYTES => match self.rxbytes_overrides.pop_front() {
                Some(value) => value,
                None => self.rx_frames.front().map_or(0, |frame| frame.len() as u8),
            },
            _ => self.regs[usize::from(addr)],
        }
    }

    fn strobe(&mut self, strobe: Strobe) {
        match strobe {
            Strobe::Calibrate => {
                self.regs[usize::from(regs::FSCAL1)] =
                    self.regs[usize::from(regs::CHANNR)].wrapping_add(0x11);
                self.marcstate = regs::MARCSTATE_IDLE;
            }
            Strobe::FlushRx | Strobe::FlushTx => {
                self.marcstate = regs::MARCSTATE_IDLE;
            }
            _ => {}
        }
        self.strobes.push(strobe);
    }

    fn read_fifo(&mut self, buf: &mut [u8]) {
        if let Some(frame) = self.rx_frames.pop_front() {
            let n = frame.len().min(buf.len());
            buf[..n].copy_from_slice(&frame[..n]);
        }
    }

    fn write_fifo(&mut self, buf: &[u8]) {
        self.sent.push(buf.to_vec());
    }

    fn enter_rx_mode(&mut self) {}

    fn enter_tx_mode(&mut self) {}

    fn packet_pending(&mut self) -> bool {
        self.maybe_inject_hit();
        !self.rx_frames.is_empty()
    }
}

pub struct FakeAdc(pub [u16; 8]);

impl ChannelSource for FakeAdc {
    fn sample_channels(&mut self) -> [u16; 8] {
        self.0
    }
}

#[derive(Default)]
pub struct FakeTelemetry {
    pub bytes: Vec<u8>,
}

impl TelemetrySink for FakeTelemetry {
    fn enqueue(&mut self, byte: u8) {
        self.bytes.push(byte);
    }
}

#[derive(Default)]
pub struct FakeWatchdog {
    pub resets: u32,
}

impl Watchdog for FakeWatchdog {
    fn reset(&mut self) {
        self.resets += 1;
    }
}

#[derive(Default)]
pub struct FakeTimer {
    pub timeouts: Vec<u32>,
    pub enabled: bool,
}

impl TickTimer for FakeTimer {
    fn set_next_timeout(&mut self, micros: u32) {
        self.timeouts.push(micros);
    }

    fn enable_interrupt(&mut self) {
        self.enabled = true;
    }

    fn disable_interrupt(&mut self) {
        self.enabled = false;
    }
}

/// A deterministic full-size hop table distinct from the default config.
pub fn test_table() -> [u8; HOP_TABLE_SIZE_USIZE] {
    let mut table = [0u8; HOP_TABLE_SIZE_USIZE];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = (i as u8).wrapping_mul(5).wrapping_add(1);
    }
    table
}

/// A driver over `rf` with default config and trivial collaborators.
pub fn test_driver(rf: FakeRadio) -> LinkDriver<FakeRadio, FakeAdc, FakeTelemetry, FakeWatchdog> {
    LinkDriver::new(
        rf,
        FakeAdc([0x220; 8]),
        FakeTelemetry::default(),
        FakeWatchdog::default(),
        LinkConfig::default(),
    )
}

/// A received (20-byte, CRC-OK) bind frame for one hop-table fragment.
pub fn bind_frame(txid: [u8; 2], fragment: u8, table: &[u8; HOP_TABLE_SIZE_USIZE]) -> Vec<u8> {
    let mut frame = vec![0u8; PACKET_BUFFER_SIZE];
    frame[0] = FRAME_LENGTH;
    frame[1] = BIND_MARKER_0;
    frame[2] = BIND_MARKER_1;
    frame[3] = txid[0];
    frame[4] = txid[1];
    let start = usize::from(fragment) * usize::from(BIND_FRAGMENT_LEN);
    frame[5] = start as u8;
    for i in 0..usize::from(BIND_FRAGMENT_LEN) {
        if start + i < HOP_TABLE_SIZE_USIZE {
            frame[6 + i] = table[start + i];
        }
    }
    frame[PACKET_BUFFER_SIZE - 1] = 0x80;
    frame
}

/// Wraps an 18-byte uplink echo into a received 20-byte frame with the
/// CRC-OK status bit set.
pub fn downlink_frame(echo: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; PACKET_BUFFER_SIZE];
    let n = echo.len().min(PACKET_BUFFER_SIZE);
    frame[..n].copy_from_slice(&echo[..n]);
    frame[PACKET_BUFFER_SIZE - 1] = 0x80;
    frame
}
