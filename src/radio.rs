//! Transceiver abstraction for CC2500-class radios.
//!
//! The link engine never touches SPI or GPIO directly. It talks to the radio
//! through the [`Transceiver`] trait: a handful of register/strobe/FIFO
//! primitives that a hardware driver implements, plus provided methods for
//! the protocol-level access patterns that are the same on every board
//! (packet fetch with the length-register erratum workaround, FIFO-loaded
//! transmit, identity probe).
//!
//! Keeping the trait at this level means the whole protocol — hopping,
//! binding, autotune, the frame cycle — runs unmodified against an
//! in-memory test double.

use crate::consts::LEN_READ_RETRIES;
use crate::fmt::warn;

/// Register addresses and status values of a CC2500-class transceiver.
///
/// Status registers (`PARTNUM` and up) share their address space with the
/// strobe opcodes; hardware implementations of
/// [`Transceiver::get_register`] are responsible for applying the
/// read/burst access-mode flags that disambiguate them on the wire.
pub mod regs {
    /// GDO2 output pin configuration.
    pub const IOCFG2: u8 = 0x00;
    /// GDO0 output pin configuration.
    pub const IOCFG0: u8 = 0x02;
    /// Packet length.
    pub const PKTLEN: u8 = 0x06;
    /// Packet automation control, byte 1.
    pub const PKTCTRL1: u8 = 0x07;
    /// Packet automation control, byte 0.
    pub const PKTCTRL0: u8 = 0x08;
    /// Device address for packet filtration.
    pub const ADDR: u8 = 0x09;
    /// Channel number.
    pub const CHANNR: u8 = 0x0A;
    /// Frequency synthesizer control, byte 1.
    pub const FSCTRL1: u8 = 0x0B;
    /// Frequency synthesizer control, byte 0: the frequency-offset
    /// correction register.
    pub const FSCTRL0: u8 = 0x0C;
    /// Frequency control word, high byte.
    pub const FREQ2: u8 = 0x0D;
    /// Frequency control word, middle byte.
    pub const FREQ1: u8 = 0x0E;
    /// Frequency control word, low byte.
    pub const FREQ0: u8 = 0x0F;
    /// Modem configuration, byte 4.
    pub const MDMCFG4: u8 = 0x10;
    /// Modem configuration, byte 3.
    pub const MDMCFG3: u8 = 0x11;
    /// Modem configuration, byte 2.
    pub const MDMCFG2: u8 = 0x12;
    /// Modem configuration, byte 1.
    pub const MDMCFG1: u8 = 0x13;
    /// Modem configuration, byte 0.
    pub const MDMCFG0: u8 = 0x14;
    /// Modem deviation setting.
    pub const DEVIATN: u8 = 0x15;
    /// Main radio control state machine configuration, byte 1.
    pub const MCSM1: u8 = 0x17;
    /// Main radio control state machine configuration, byte 0.
    pub const MCSM0: u8 = 0x18;
    /// Frequency offset compensation configuration.
    pub const FOCCFG: u8 = 0x19;
    /// Bit synchronization configuration.
    pub const BSCFG: u8 = 0x1A;
    /// AGC control, byte 2.
    pub const AGCCTRL2: u8 = 0x1B;
    /// AGC control, byte 1.
    pub const AGCCTRL1: u8 = 0x1C;
    /// AGC control, byte 0.
    pub const AGCCTRL0: u8 = 0x1D;
    /// Front end RX configuration.
    pub const FREND1: u8 = 0x21;
    /// Front end TX configuration.
    pub const FREND0: u8 = 0x22;
    /// Frequency synthesizer calibration, byte 3 (shared across channels).
    pub const FSCAL3: u8 = 0x23;
    /// Frequency synthesizer calibration, byte 2 (shared across channels).
    pub const FSCAL2: u8 = 0x24;
    /// Frequency synthesizer calibration, byte 1 (per-channel).
    pub const FSCAL1: u8 = 0x25;
    /// Frequency synthesizer calibration, byte 0.
    pub const FSCAL0: u8 = 0x26;
    /// Test register 2.
    pub const TEST2: u8 = 0x2C;
    /// Test register 1.
    pub const TEST1: u8 = 0x2D;
    /// Test register 0.
    pub const TEST0: u8 = 0x2E;
    /// Part number (status register).
    pub const PARTNUM: u8 = 0x30;
    /// Silicon revision (status register).
    pub const VERSION: u8 = 0x31;
    /// Main radio control state machine state (status register).
    pub const MARCSTATE: u8 = 0x35;
    /// Number of bytes queued in the RX FIFO (status register).
    pub const RXBYTES: u8 = 0x3B;
    /// PA power table, entry 0.
    pub const PA_TABLE0: u8 = 0x3E;

    /// MARCSTATE value once the state machine has settled in idle
    /// (self-calibration finished).
    pub const MARCSTATE_IDLE: u8 = 0x01;
    /// MARCSTATE value flagging a receive FIFO overflow.
    pub const MARCSTATE_RX_OVERFLOW: u8 = 0x11;
    /// MARCSTATE value flagging a transmit FIFO underflow.
    pub const MARCSTATE_TX_UNDERFLOW: u8 = 0x16;

    /// PKTCTRL1: append RSSI and LQI/CRC status bytes to received packets.
    pub const PKTCTRL1_APPEND_STATUS: u8 = 0x04;
    /// PKTCTRL1: automatically flush packets failing the hardware CRC.
    pub const PKTCTRL1_CRC_AUTOFLUSH: u8 = 0x08;
    /// PKTCTRL1: filter received packets by the ADDR register.
    pub const PKTCTRL1_ADR_CHECK_01: u8 = 0x01;

    /// Part number reported by supported transceivers.
    pub const PARTNUM_CC2500: u8 = 0x80;
}

/// Command strobe opcodes.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum Strobe {
    /// SCAL: run the frequency-synthesizer self-calibration.
    Calibrate = 0x33,
    /// SRX: arm the receiver.
    Rx = 0x34,
    /// STX: transmit the FIFO contents.
    Tx = 0x35,
    /// SIDLE: drop back to the idle state.
    Idle = 0x36,
    /// SFRX: flush the receive FIFO.
    FlushRx = 0x3A,
    /// SFTX: flush the transmit FIFO.
    FlushTx = 0x3B,
}

/// Register-level access to a CC2500-class transceiver.
///
/// Implementations provide the eight primitives; the protocol-level access
/// patterns ([`process_packet`](Transceiver::process_packet),
/// [`transmit`](Transceiver::transmit), [`hw_info`](Transceiver::hw_info))
/// are written once in terms of them and should not normally be overridden.
///
/// The front-end switches carry their own mandated settle delays inside the
/// implementation; callers treat them as complete on return.
pub trait Transceiver {
    /// Writes a configuration register.
    fn set_register(&mut self, addr: u8, value: u8);

    /// Reads a configuration or status register. Status registers must be
    /// accessed with the burst access mode; the implementation applies the
    /// access-mode flags.
    fn get_register(&mut self, addr: u8) -> u8;

    /// Issues a fire-and-forget command strobe.
    fn strobe(&mut self, strobe: Strobe);

    /// Burst-reads `buf.len()` bytes out of the RX FIFO.
    fn read_fifo(&mut self, buf: &mut [u8]);

    /// Burst-writes `buf` into the TX FIFO.
    fn write_fifo(&mut self, buf: &[u8]);

    /// Switches the antenna path to the receive side (LNA on, PA off).
    fn enter_rx_mode(&mut self);

    /// Switches the antenna path to the transmit side (PA on, LNA off).
    fn enter_tx_mode(&mut self);

    /// Returns whether the packet-pending line (GDO) reports a received
    /// packet queued in the RX FIFO.
    fn packet_pending(&mut self) -> bool;

    /// Fetches a pending packet into `buf` if one is queued and its length
    /// matches `buf.len()` exactly.
    ///
    /// The RX byte-count register can be caught mid-update on these chips,
    /// so it is read twice and both reads must agree before the value is
    /// trusted; disagreement is retried up to
    /// [`LEN_READ_RETRIES`](crate::consts::LEN_READ_RETRIES) times and then
    /// treated as "no packet". A packet of any other length is drained from
    /// the FIFO and dropped so the next frame starts clean.
    ///
    /// Returns `true` when `buf` holds a freshly fetched packet.
    fn process_packet(&mut self, buf: &mut [u8]) -> bool {
        if !self.packet_pending() {
            return false;
        }

        let mut agreed = None;
        for _ in 0..LEN_READ_RETRIES {
            let len1 = self.get_register(regs::RXBYTES) & 0x7F;
            let len2 = self.get_register(regs::RXBYTES) & 0x7F;
            if len1 == len2 {
                agreed = Some(len1);
                break;
            }
        }
        let Some(len) = agreed else {
            return false;
        };

        let len = usize::from(len);
        if len == buf.len() {
            self.read_fifo(buf);
            true
        } else {
            let mut scratch = [0u8; 64];
            let drain = len.min(scratch.len());
            if drain > 0 {
                self.read_fifo(&mut scratch[..drain]);
            }
            false
        }
    }

    /// Loads `frame` into a freshly flushed TX FIFO and starts transmitting.
    fn transmit(&mut self, frame: &[u8]) {
        self.strobe(Strobe::FlushTx);
        self.write_fifo(frame);
        self.strobe(Strobe::Tx);
    }

    /// Reads the part number and silicon revision.
    fn hw_info(&mut self) -> (u8, u8) {
        (
            self.get_register(regs::PARTNUM),
            self.get_register(regs::VERSION),
        )
    }
}

/// Returns whether an identity probe found a supported transceiver.
pub fn partnum_valid(partnum: u8, version: u8) -> bool {
    partnum == regs::PARTNUM_CC2500 && version != 0x00 && version != 0xFF
}

/// Checks the radio state machine for FIFO overflow conditions and flushes
/// the affected FIFO.
///
/// Safe to call on every tick: when no overflow is flagged this is a single
/// status read. Flushing is idempotent, so no retry bookkeeping is needed —
/// the next tick simply starts with clean FIFOs.
pub fn flush_overflows<RF: Transceiver>(rf: &mut RF) {
    let marc_state = rf.get_register(regs::MARCSTATE) & 0x1F;
    if marc_state == regs::MARCSTATE_RX_OVERFLOW {
        warn!("rx fifo overflow");
        rf.strobe(Strobe::FlushRx);
    } else if marc_state == regs::MARCSTATE_TX_UNDERFLOW {
        warn!("tx fifo underflow");
        rf.strobe(Strobe::FlushTx);
    }
}
