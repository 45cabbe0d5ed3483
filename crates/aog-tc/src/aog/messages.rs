//! Typed views of the AOG packets this server consumes and produces.

use crate::hal::TcError;
use crate::tc::ClientState;
use crate::types::SectionState;
use alloc::vec::Vec;

/// Source id AgOpenGPS stamps on its packets.
pub const AOG_SOURCE: u8 = 0x7F;
/// Source id this task controller stamps on outbound packets.
pub const TC_SOURCE: u8 = 0x80;

/// Steer data: ground speed plus the desired section bitmap.
pub const PGN_STEER_DATA: u8 = 0xFE;
/// Section control auto/manual switch.
pub const PGN_SECTION_CONTROL: u8 = 0xF1;
/// Subnet announcement on the discovery socket.
pub const PGN_SUBNET_ANNOUNCE: u8 = 0xC9;
/// The 10 Hz heartbeat this server broadcasts per client.
pub const PGN_HEARTBEAT: u8 = 0xF0;

/// Parsed steer data packet.
///
/// Byte layout: speed in 0.1 km/h little-endian (0-1), a status byte (2),
/// cross track error (5) and the 16-bit desired-section bitmap (6-7,
/// LSB-first). Status and cross track error are carried but unused here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteerData {
    pub speed_kmh_tenths: u16,
    pub status: u8,
    pub cross_track_error: u8,
    pub section_bitmap: u16,
}

impl SteerData {
    pub fn parse(payload: &[u8]) -> Result<Self, TcError> {
        if payload.len() < 8 {
            return Err(TcError::InvalidPacket("steer data shorter than 8 bytes"));
        }
        Ok(SteerData {
            speed_kmh_tenths: u16::from_le_bytes(payload[0..2].try_into()?),
            status: payload[2],
            cross_track_error: payload[5],
            section_bitmap: u16::from_le_bytes(payload[6..8].try_into()?),
        })
    }

    /// The 16 desired section states, LSB first.
    pub fn desired_sections(&self) -> Vec<bool> {
        (0..16).map(|i| self.section_bitmap & (1 << i) != 0).collect()
    }
}

/// Parses the section control packet: payload byte 0 selects auto (1) or
/// manual (0).
pub fn parse_section_control(payload: &[u8]) -> Result<bool, TcError> {
    match payload.first() {
        Some(&value) => Ok(value == 1),
        None => Err(TcError::InvalidPacket("empty section control payload")),
    }
}

/// Parses a subnet announcement: two 0xC9 marker bytes followed by the
/// three subnet octets.
pub fn parse_subnet_announce(payload: &[u8]) -> Result<[u8; 3], TcError> {
    match payload {
        [0xC9, 0xC9, a, b, c] => Ok([*a, *b, *c]),
        _ => Err(TcError::InvalidPacket("malformed subnet announcement")),
    }
}

/// Builds the heartbeat payload for one client: section control mode, the
/// section count and the actual on/off states packed one bit per section,
/// LSB first.
pub fn heartbeat_payload(state: &ClientState) -> Vec<u8> {
    let number_of_sections = state.number_of_sections();
    let mut payload = Vec::with_capacity(2 + number_of_sections.div_ceil(8) as usize);
    payload.push(state.section_control_enabled() as u8);
    payload.push(number_of_sections.min(u8::MAX as u16) as u8);

    let mut section = 0u16;
    while section < number_of_sections {
        let mut byte = 0u8;
        for bit in 0..8 {
            if section < number_of_sections {
                byte |= ((state.section_actual_state(section) == SectionState::On) as u8) << bit;
                section += 1;
            }
        }
        payload.push(byte);
    }
    payload
}
