//! Framing and deframing of AgOpenGPS UDP packets.
//!
//! Wire layout: a two-byte start marker, source id, PGN id, payload length,
//! the payload, and a one-byte checksum over everything between the marker
//! and the checksum.

use crate::hal::TcError;
use alloc::vec::Vec;
use log::warn;

/// Start-of-packet marker.
pub const PACKET_START: [u8; 2] = [0x80, 0x81];

/// Receive buffer size. Large enough for any AOG packet plus coalesced
/// datagrams.
pub const RX_BUFFER_SIZE: usize = 512;

/// Header bytes before the payload (start marker, source, PGN, length).
const HEADER_SIZE: usize = 5;
/// Smallest complete packet: header plus checksum with an empty payload.
const MIN_PACKET_SIZE: usize = HEADER_SIZE + 1;

/// Unsigned byte sum over source, PGN, length and payload.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// One deframed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AogPacket {
    pub source: u8,
    pub pgn: u8,
    pub payload: Vec<u8>,
}

/// Serializes a packet, appending the checksum.
pub fn encode_packet(source: u8, pgn: u8, payload: &[u8]) -> Result<Vec<u8>, TcError> {
    if payload.len() > u8::MAX as usize {
        return Err(TcError::InvalidPacket("payload exceeds 255 bytes"));
    }
    let mut buffer = Vec::with_capacity(MIN_PACKET_SIZE + payload.len());
    buffer.extend_from_slice(&PACKET_START);
    buffer.push(source);
    buffer.push(pgn);
    buffer.push(payload.len() as u8);
    buffer.extend_from_slice(payload);
    buffer.push(checksum(&buffer[2..]));
    Ok(buffer)
}

/// Incremental deframer shared by both sockets. Datagrams are appended to
/// the internal buffer and complete packets pulled out one at a time; a bad
/// start marker discards the whole buffer.
pub struct Deframer {
    buffer: [u8; RX_BUFFER_SIZE],
    len: usize,
    validate_crc: bool,
}

impl Deframer {
    pub fn new() -> Self {
        Deframer {
            buffer: [0; RX_BUFFER_SIZE],
            len: 0,
            validate_crc: true,
        }
    }

    /// Disables or re-enables checksum validation. Some AOG builds emit
    /// checksums this implementation cannot reproduce; turning validation
    /// off keeps interoperability.
    pub fn with_crc_validation(mut self, validate: bool) -> Self {
        self.validate_crc = validate;
        self
    }

    /// The unused tail of the receive buffer, for zero-copy socket reads.
    pub fn vacant(&mut self) -> &mut [u8] {
        &mut self.buffer[self.len..]
    }

    /// Marks `count` bytes of `vacant()` as filled.
    pub fn commit(&mut self, count: usize) {
        self.len = (self.len + count).min(RX_BUFFER_SIZE);
    }

    /// Appends bytes to the buffer, dropping anything past capacity.
    pub fn extend(&mut self, data: &[u8]) {
        let space = RX_BUFFER_SIZE - self.len;
        if data.len() > space {
            warn!("AOG receive buffer overflow, dropping {} bytes", data.len() - space);
        }
        let count = data.len().min(space);
        self.buffer[self.len..self.len + count].copy_from_slice(&data[..count]);
        self.len += count;
    }

    /// Extracts the next complete packet, if any.
    pub fn next_packet(&mut self) -> Option<AogPacket> {
        while self.len >= MIN_PACKET_SIZE {
            if self.buffer[0..2] != PACKET_START {
                warn!(
                    "Unknown start of message: {:#06X}",
                    u16::from_be_bytes([self.buffer[0], self.buffer[1]])
                );
                self.len = 0;
                return None;
            }

            let payload_len = self.buffer[4] as usize;
            let packet_len = MIN_PACKET_SIZE + payload_len;
            if self.len < packet_len {
                // Wait for the rest of the packet.
                return None;
            }

            let source = self.buffer[2];
            let pgn = self.buffer[3];
            let crc = self.buffer[HEADER_SIZE + payload_len];
            let crc_ok = if self.validate_crc {
                let calculated = checksum(&self.buffer[2..HEADER_SIZE + payload_len]);
                if calculated != crc {
                    warn!(
                        "Checksum mismatch for PGN {:#04X}: expected {:#04X}, got {:#04X}",
                        pgn, crc, calculated
                    );
                }
                calculated == crc
            } else {
                true
            };
            let payload = self.buffer[HEADER_SIZE..HEADER_SIZE + payload_len].to_vec();

            // Compact the remaining bytes to the front.
            self.buffer.copy_within(packet_len..self.len, 0);
            self.len -= packet_len;

            if crc_ok {
                return Some(AogPacket { source, pgn, payload });
            }
            // Skip the corrupt packet and keep scanning.
        }
        None
    }
}

impl Default for Deframer {
    fn default() -> Self {
        Self::new()
    }
}
