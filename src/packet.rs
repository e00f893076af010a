//! Wire codec for the three over-the-air packet shapes.
//!
//! Every frame on this link is a fixed 17-byte payload behind a length byte.
//! On reception the transceiver appends a 2-byte status trailer (raw RSSI
//! and LQI with the CRC-OK flag), so the shared [`PacketBuffer`] is sized
//! for the full received frame while transmission uses only its leading
//! bytes.
//!
//! Three shapes share the buffer:
//!
//! - **Control packet** (uplink, every transmit slot): identity, frame
//!   counter, telemetry request id, and all 8 analog channels bit-packed as
//!   four low bytes followed by two bytes of paired high nibbles, twice.
//! - **Telemetry downlink** (the counterpart's return packet): the remote's
//!   RSSI reading, a byte count, a 5-bit frame id, and up to 10 raw
//!   telemetry bytes.
//! - **Bind packet**: marker bytes in place of the identity, the
//!   broadcaster's identity, and a 5-entry hop-table fragment.
//!
//! There is exactly one buffer in the whole engine: at most one in-flight
//! packet value exists at a time, overwritten each phase.

use crate::consts::{
    BIND_FRAGMENT_LEN, BIND_MARKER_0, BIND_MARKER_1, CONTROL_FILLER, FRAME_LENGTH,
    HOP_TABLE_SIZE_USIZE, PACKET_BUFFER_SIZE, TELEMETRY_MAX_BYTES, TX_FRAME_SIZE,
};
#[cfg(not(feature = "std"))]
use crate::consts::TELEMETRY_MAX_BYTES_USIZE;

#[cfg(not(feature = "std"))]
use heapless::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

/// Converts a raw RSSI status byte into the signed link metric.
///
/// The transform is piecewise linear around the sign bit of the raw value
/// and uses a truncating shift; both halves are monotonic.
///
/// ```rust
/// use hoplink::packet::extract_rssi;
///
/// assert_eq!(extract_rssi(0), 65);
/// assert_eq!(extract_rssi(255), (((255 * 18) >> 5) - 82) as i16);
/// ```
pub fn extract_rssi(raw: u8) -> i16 {
    let scaled = (i16::from(raw) * 18) >> 5;
    if raw >= 128 { scaled - 82 } else { scaled + 65 }
}

/// The single fixed-size RX/TX packet buffer shared by every operating
/// mode.
///
/// Writers fill it with one of the fixed shapes; readers validate the shape
/// first and then use the typed accessors. [`invalidate`](Self::invalidate)
/// defeats double-processing of a consumed frame by destroying both fields
/// the validity predicates depend on.
#[derive(Debug)]
pub struct PacketBuffer {
    bytes: [u8; PACKET_BUFFER_SIZE],
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuffer {
    /// Creates a zeroed (and therefore invalid) buffer.
    pub fn new() -> Self {
        Self {
            bytes: [0; PACKET_BUFFER_SIZE],
        }
    }

    /// The transmit view: length byte plus payload, without the status
    /// trailer.
    pub fn tx_frame(&self) -> &[u8] {
        &self.bytes[..TX_FRAME_SIZE]
    }

    /// The receive view: the whole buffer, to be filled by
    /// [`Transceiver::process_packet`](crate::radio::Transceiver::process_packet).
    pub fn rx_frame_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Builds a control packet carrying the current channel samples.
    ///
    /// Channels are 10-bit: four low bytes first, then two bytes holding
    /// the four high nibbles pairwise, repeated for the second group of
    /// four channels.
    pub fn write_control(
        &mut self,
        txid: [u8; 2],
        frame_counter: u8,
        telemetry_id: u8,
        channels: &[u16; 8],
    ) {
        self.bytes[0] = FRAME_LENGTH;
        self.bytes[1] = txid[0];
        self.bytes[2] = txid[1];
        self.bytes[3] = frame_counter;
        self.bytes[4] = telemetry_id;
        self.bytes[5] = CONTROL_FILLER;
        self.bytes[6] = (channels[0] & 0xFF) as u8;
        self.bytes[7] = (channels[1] & 0xFF) as u8;
        self.bytes[8] = (channels[2] & 0xFF) as u8;
        self.bytes[9] = (channels[3] & 0xFF) as u8;
        self.bytes[10] = (((channels[0] >> 8) & 0x0F) | ((channels[1] >> 4) & 0xF0)) as u8;
        self.bytes[11] = (((channels[2] >> 8) & 0x0F) | ((channels[3] >> 4) & 0xF0)) as u8;
        self.bytes[12] = (channels[4] & 0xFF) as u8;
        self.bytes[13] = (channels[5] & 0xFF) as u8;
        self.bytes[14] = (channels[6] & 0xFF) as u8;
        self.bytes[15] = (channels[7] & 0xFF) as u8;
        self.bytes[16] = (((channels[4] >> 8) & 0x0F) | ((channels[5] >> 4) & 0xF0)) as u8;
        self.bytes[17] = (((channels[6] >> 8) & 0x0F) | ((channels[7] >> 4) & 0xF0)) as u8;
    }

    /// Builds the bind packet for one hop-table fragment.
    ///
    /// Fragment `n` carries hop-table entries `[5n, 5n + 5)`; positions past
    /// the end of the table are sent as zero, as is the rest of the payload.
    pub fn write_bind(&mut self, txid: [u8; 2], fragment: u8, hop_table: &[u8; HOP_TABLE_SIZE_USIZE]) {
        self.bytes[0] = FRAME_LENGTH;
        self.bytes[1] = BIND_MARKER_0;
        self.bytes[2] = BIND_MARKER_1;
        self.bytes[3] = txid[0];
        self.bytes[4] = txid[1];
        let start = fragment * BIND_FRAGMENT_LEN;
        self.bytes[5] = start;
        for i in 0..usize::from(BIND_FRAGMENT_LEN) {
            let index = usize::from(start) + i;
            self.bytes[6 + i] = if index < HOP_TABLE_SIZE_USIZE {
                hop_table[index]
            } else {
                0
            };
        }
        for byte in &mut self.bytes[11..TX_FRAME_SIZE] {
            *byte = 0;
        }
    }

    fn crc_ok(&self) -> bool {
        self.bytes[PACKET_BUFFER_SIZE - 1] & 0x80 != 0
    }

    /// Returns whether the buffer holds a valid downlink frame addressed to
    /// `txid`: expected length byte, hardware CRC passed, identity match.
    pub fn is_valid_control(&self, txid: [u8; 2]) -> bool {
        self.bytes[0] == FRAME_LENGTH
            && self.crc_ok()
            && self.bytes[1] == txid[0]
            && self.bytes[2] == txid[1]
    }

    /// Returns whether the buffer holds a valid bind packet. Identity is
    /// deliberately not checked: during clone capture it is not yet known.
    pub fn is_valid_bind(&self) -> bool {
        self.bytes[0] == FRAME_LENGTH
            && self.crc_ok()
            && self.bytes[1] == BIND_MARKER_0
            && self.bytes[2] == BIND_MARKER_1
    }

    /// Destroys the length byte and the status trailer so a consumed frame
    /// can never pass a validity predicate again.
    pub fn invalidate(&mut self) {
        self.bytes[0] = 0;
        self.bytes[PACKET_BUFFER_SIZE - 1] = 0;
    }

    /// RSSI as measured by the remote end, reported back inside the
    /// downlink payload.
    pub fn remote_rssi(&self) -> u8 {
        self.bytes[5]
    }

    /// Raw local RSSI from the appended status trailer. Feed through
    /// [`extract_rssi`] before use.
    pub fn status_rssi(&self) -> u8 {
        self.bytes[PACKET_BUFFER_SIZE - 2]
    }

    /// Telemetry frame id carried in a downlink frame.
    pub fn telemetry_id(&self) -> u8 {
        self.bytes[7]
    }

    /// Telemetry payload of a downlink frame. The advertised byte count is
    /// clamped to the 10 bytes a frame can carry.
    #[cfg(not(feature = "std"))]
    pub fn telemetry_payload(&self) -> Vec<u8, TELEMETRY_MAX_BYTES_USIZE> {
        let count = usize::from(self.bytes[6].min(TELEMETRY_MAX_BYTES));
        Vec::from_slice(&self.bytes[8..8 + count]).unwrap_or_else(|()| Vec::new())
    }

    /// Telemetry payload of a downlink frame. The advertised byte count is
    /// clamped to the 10 bytes a frame can carry.
    #[cfg(feature = "std")]
    pub fn telemetry_payload(&self) -> Vec<u8> {
        let count = usize::from(self.bytes[6].min(TELEMETRY_MAX_BYTES));
        Vec::from(&self.bytes[8..8 + count])
    }

    /// Broadcaster identity from a bind packet.
    pub fn bind_txid(&self) -> [u8; 2] {
        [self.bytes[3], self.bytes[4]]
    }

    /// First hop-table index covered by a bind packet's fragment.
    pub fn bind_fragment_start(&self) -> u8 {
        self.bytes[5]
    }

    /// The five hop-table entries carried in a bind packet.
    pub fn bind_hop_bytes(&self) -> &[u8] {
        &self.bytes[6..6 + usize::from(BIND_FRAGMENT_LEN)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::HOP_TABLE_SIZE;

    fn filled_table() -> [u8; HOP_TABLE_SIZE_USIZE] {
        let mut table = [0u8; HOP_TABLE_SIZE_USIZE];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = 0xC0 | i as u8;
        }
        table
    }

    #[test]
    fn test_control_packet_layout() {
        let mut buf = PacketBuffer::new();
        let channels: [u16; 8] = [0x123, 0x2A4, 0x056, 0x3FF, 0x000, 0x111, 0x222, 0x333];
        buf.write_control([0x16, 0x68], 0x42, 0x1D, &channels);

        let frame = buf.tx_frame();
        assert_eq!(frame.len(), TX_FRAME_SIZE);
        assert_eq!(&frame[..6], &[0x11, 0x16, 0x68, 0x42, 0x1D, 0x0B]);
        // low bytes of channels 0..3
        assert_eq!(&frame[6..10], &[0x23, 0xA4, 0x56, 0xFF]);
        // paired high nibbles: ch0 in the low nibble, ch1 in the high one
        assert_eq!(frame[10], 0x01 | 0x20);
        assert_eq!(frame[11], 0x00 | 0x30);
        assert_eq!(&frame[12..16], &[0x00, 0x11, 0x22, 0x33]);
        assert_eq!(frame[16], 0x00 | 0x10);
        assert_eq!(frame[17], 0x02 | 0x30);
    }

    #[test]
    fn test_bind_packet_layout_and_padding() {
        let mut buf = PacketBuffer::new();
        let table = filled_table();

        buf.write_bind([0xAB, 0xCD], 2, &table);
        let frame = buf.tx_frame();
        assert_eq!(&frame[..6], &[0x11, 0x03, 0x01, 0xAB, 0xCD, 10]);
        assert_eq!(&frame[6..11], &table[10..15]);
        assert!(frame[11..].iter().all(|&b| b == 0));

        // the last fragment covers entries 45 and 46 only; 47..49 pad with 0
        buf.write_bind([0xAB, 0xCD], 9, &table);
        let frame = buf.tx_frame();
        assert_eq!(frame[5], 45);
        assert_eq!(&frame[6..8], &table[45..47]);
        assert_eq!(&frame[8..11], &[0, 0, 0]);
    }

    #[test]
    fn test_validity_requires_length_crc_and_identity() {
        let mut buf = PacketBuffer::new();
        let txid = [0x16, 0x68];

        let frame = buf.rx_frame_mut();
        frame[0] = FRAME_LENGTH;
        frame[1] = txid[0];
        frame[2] = txid[1];
        frame[19] = 0x80;
        assert!(buf.is_valid_control(txid));
        assert!(!buf.is_valid_control([0x16, 0x69]));
        assert!(!buf.is_valid_bind());

        // hardware CRC flag cleared: not a packet at all
        buf.rx_frame_mut()[19] = 0x00;
        assert!(!buf.is_valid_control(txid));
    }

    #[test]
    fn test_bind_validity_ignores_identity() {
        let mut buf = PacketBuffer::new();
        let frame = buf.rx_frame_mut();
        frame[0] = FRAME_LENGTH;
        frame[1] = BIND_MARKER_0;
        frame[2] = BIND_MARKER_1;
        frame[3] = 0xDE;
        frame[4] = 0xAD;
        frame[19] = 0x80;
        assert!(buf.is_valid_bind());
        assert_eq!(buf.bind_txid(), [0xDE, 0xAD]);
    }

    #[test]
    fn test_invalidate_defeats_reprocessing() {
        let mut buf = PacketBuffer::new();
        let frame = buf.rx_frame_mut();
        frame[0] = FRAME_LENGTH;
        frame[1] = BIND_MARKER_0;
        frame[2] = BIND_MARKER_1;
        frame[19] = 0x80;
        assert!(buf.is_valid_bind());

        buf.invalidate();
        assert!(!buf.is_valid_bind());
        assert!(!buf.is_valid_control([BIND_MARKER_0, BIND_MARKER_1]));
    }

    #[test]
    fn test_telemetry_payload_clamped() {
        let mut buf = PacketBuffer::new();
        let frame = buf.rx_frame_mut();
        frame[6] = 42; // absurd advertised count
        for (i, byte) in frame[8..18].iter_mut().enumerate() {
            *byte = i as u8;
        }
        let payload = buf.telemetry_payload();
        assert_eq!(payload.len(), usize::from(TELEMETRY_MAX_BYTES));
        assert_eq!(&payload[..], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);

        buf.rx_frame_mut()[6] = 3;
        assert_eq!(&buf.telemetry_payload()[..], &[0, 1, 2]);
    }

    #[test]
    fn test_extract_rssi_fixed_points() {
        assert_eq!(extract_rssi(0), 65);
        assert_eq!(extract_rssi(128), (((128 * 18) >> 5) - 82) as i16);
        assert_eq!(extract_rssi(255), (((255 * 18) >> 5) - 82) as i16);
    }

    #[test]
    fn test_extract_rssi_monotonic_within_branches() {
        for raw in 0u8..127 {
            assert!(extract_rssi(raw + 1) >= extract_rssi(raw));
        }
        for raw in 128u8..255 {
            assert!(extract_rssi(raw + 1) >= extract_rssi(raw));
        }
    }

    #[test]
    fn test_fragment_geometry_covers_table() {
        // 10 fragments of 5 cover indices 0..50, which clips to the table
        assert!(u16::from(crate::consts::BIND_FRAGMENT_COUNT)
            * u16::from(BIND_FRAGMENT_LEN)
            >= u16::from(HOP_TABLE_SIZE));
    }
}
