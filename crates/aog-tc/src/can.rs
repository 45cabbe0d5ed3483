use crate::hal::TcError;
use core::fmt;

// --- Protocol Constants (ISO 11783 / J1939) ---

/// Process data messages between task controllers and clients.
pub const PGN_PROCESS_DATA: u32 = 0xCB00;
/// Address claim.
pub const PGN_ADDRESS_CLAIM: u32 = 0xEE00;
/// Request PGN.
pub const PGN_REQUEST: u32 = 0xEA00;
/// Transport protocol connection management (TP.CM).
pub const PGN_TP_CM: u32 = 0xEC00;
/// Transport protocol data transfer (TP.DT).
pub const PGN_TP_DT: u32 = 0xEB00;
/// Machine selected speed.
pub const PGN_MACHINE_SELECTED_SPEED: u32 = 0xF022;
/// Language command.
pub const PGN_LANGUAGE_COMMAND: u32 = 0xFE0F;

/// Global (broadcast) destination address.
pub const BROADCAST_ADDRESS: u8 = 0xFF;
/// The null address used by control functions before a successful claim.
pub const NULL_ADDRESS: u8 = 0xFE;
/// Preferred address for a task controller (ISO 11783 industry group 2).
pub const TASK_CONTROLLER_PREFERRED_ADDRESS: u8 = 0xF7;

/// A 29-bit extended CAN identifier, decomposed per J1939: a 3-bit priority,
/// an 18-bit parameter group number and an 8-bit source address. For
/// destination-specific groups (PDU format < 240) the low PGN byte carries
/// the destination address instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanId(u32);

impl CanId {
    pub const fn from_raw(raw: u32) -> Self {
        CanId(raw & 0x1FFF_FFFF)
    }

    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// Builds an identifier for a destination-specific or broadcast PGN.
    /// For PDU1 groups the destination replaces the PGN low byte.
    pub fn new(priority: u8, pgn: u32, destination: u8, source: u8) -> Self {
        let pdu_format = ((pgn >> 8) & 0xFF) as u8;
        let group = if pdu_format < 240 {
            (pgn & 0x3FF00) | destination as u32
        } else {
            pgn & 0x3FFFF
        };
        CanId((((priority & 0x07) as u32) << 26) | (group << 8) | source as u32)
    }

    pub fn priority(self) -> u8 {
        ((self.0 >> 26) & 0x07) as u8
    }

    /// The parameter group number with the destination byte masked out for
    /// destination-specific groups.
    pub fn pgn(self) -> u32 {
        let raw = (self.0 >> 8) & 0x3FFFF;
        if ((raw >> 8) & 0xFF) < 240 {
            raw & 0x3FF00
        } else {
            raw
        }
    }

    pub fn source_address(self) -> u8 {
        self.0 as u8
    }

    /// The destination address: the PS byte for PDU1 groups, broadcast
    /// otherwise.
    pub fn destination_address(self) -> u8 {
        let raw = (self.0 >> 8) & 0x3FFFF;
        if ((raw >> 8) & 0xFF) < 240 {
            raw as u8
        } else {
            BROADCAST_ADDRESS
        }
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pgn={:#07X} sa={:#04X} da={:#04X} p={}",
            self.pgn(),
            self.source_address(),
            self.destination_address(),
            self.priority()
        )
    }
}

/// A classic CAN data frame with a 29-bit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    pub id: CanId,
    pub data: [u8; 8],
    pub dlc: u8,
}

impl CanFrame {
    /// Builds a frame from a payload of at most 8 bytes.
    pub fn new(id: CanId, payload: &[u8]) -> Result<Self, TcError> {
        if payload.len() > 8 {
            return Err(TcError::InvalidCanFrame);
        }
        let mut data = [0xFFu8; 8];
        data[..payload.len()].copy_from_slice(payload);
        Ok(CanFrame {
            id,
            data,
            dlc: payload.len() as u8,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }
}
