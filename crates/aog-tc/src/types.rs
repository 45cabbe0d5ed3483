use core::fmt;

/// Number of section states carried by one condensed work state value
/// (16 sections, 2 bits each, in a 32-bit process data value).
pub const SECTIONS_PER_CONDENSED_MESSAGE: u16 = 16;

/// Upper bound on sections addressable through the condensed work state DDIs
/// (16 DDIs x 16 sections).
pub const MAX_SECTIONS: u16 = 256;

/// Represents a 64-bit ISO 11783 NAME, the stable identity of a control
/// function on the bus. Partners are keyed by NAME rather than by their
/// (reclaimable) 8-bit address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoName(pub u64);

impl fmt::Display for IsoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018X}", self.0)
    }
}

impl IsoName {
    /// Serializes the NAME into the 8-byte little-endian wire form used by
    /// the address claim message.
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        IsoName(u64::from_le_bytes(bytes))
    }
}

/// The individual NAME fields, assembled into a 64-bit NAME per the J1939
/// bit layout (identity number in the low 21 bits, arbitrary-address-capable
/// in bit 63).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameFields {
    pub arbitrary_address_capable: bool,
    pub industry_group: u8,
    pub device_class_instance: u8,
    pub device_class: u8,
    pub function: u8,
    pub function_instance: u8,
    pub ecu_instance: u8,
    pub manufacturer_code: u16,
    pub identity_number: u32,
}

impl NameFields {
    pub fn to_name(&self) -> IsoName {
        let mut raw: u64 = 0;
        raw |= (self.identity_number as u64) & 0x1F_FFFF;
        raw |= ((self.manufacturer_code as u64) & 0x7FF) << 21;
        raw |= ((self.ecu_instance as u64) & 0x07) << 32;
        raw |= ((self.function_instance as u64) & 0x1F) << 35;
        raw |= (self.function as u64) << 40;
        // Bit 48 is reserved and transmitted as zero.
        raw |= ((self.device_class as u64) & 0x7F) << 49;
        raw |= ((self.device_class_instance as u64) & 0x0F) << 56;
        raw |= ((self.industry_group as u64) & 0x07) << 60;
        if self.arbitrary_address_capable {
            raw |= 1 << 63;
        }
        IsoName(raw)
    }
}

/// The 2-bit section state code used by the condensed work state DDIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SectionState {
    Off = 0,
    On = 1,
    Error = 2,
    NotInstalled = 3,
}

impl SectionState {
    /// Decodes a state from the low two bits of `bits`.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => SectionState::Off,
            1 => SectionState::On,
            2 => SectionState::Error,
            _ => SectionState::NotInstalled,
        }
    }
}

/// Data Description Indices from ISO 11783-11 used by this server.
pub mod ddi {
    /// Actual Working Width (mm), attached to section elements.
    pub const ACTUAL_WORKING_WIDTH: u16 = 67;
    /// Device Element Offset X (mm).
    pub const DEVICE_ELEMENT_OFFSET_X: u16 = 134;
    /// Device Element Offset Y (mm).
    pub const DEVICE_ELEMENT_OFFSET_Y: u16 = 135;
    /// Device Element Offset Z (mm).
    pub const DEVICE_ELEMENT_OFFSET_Z: u16 = 136;
    /// Setpoint Work State (overall on/off commanded by the TC).
    pub const SETPOINT_WORK_STATE: u16 = 140;
    /// Actual Work State (overall on/off reported by the implement).
    pub const ACTUAL_WORK_STATE: u16 = 141;
    /// Section Control State (1 = automatic, 0 = manual).
    pub const SECTION_CONTROL_STATE: u16 = 161;
    /// Setpoint Condensed Work State, sections 1-16. The following 15 DDIs
    /// cover sections 17-256 in contiguous blocks of 16.
    pub const SETPOINT_CONDENSED_WORK_STATE_1_16: u16 = 290;
    /// Setpoint Condensed Work State, sections 241-256.
    pub const SETPOINT_CONDENSED_WORK_STATE_241_256: u16 = 305;
    /// Actual Condensed Work State, sections 1-16.
    pub const ACTUAL_CONDENSED_WORK_STATE_1_16: u16 = 306;
    /// Actual Condensed Work State, sections 241-256.
    pub const ACTUAL_CONDENSED_WORK_STATE_241_256: u16 = 321;

    /// True for the 16 actual condensed work state DDIs.
    pub fn is_actual_condensed_work_state(ddi: u16) -> bool {
        (ACTUAL_CONDENSED_WORK_STATE_1_16..=ACTUAL_CONDENSED_WORK_STATE_241_256).contains(&ddi)
    }

    /// True for the 16 setpoint condensed work state DDIs.
    pub fn is_setpoint_condensed_work_state(ddi: u16) -> bool {
        (SETPOINT_CONDENSED_WORK_STATE_1_16..=SETPOINT_CONDENSED_WORK_STATE_241_256)
            .contains(&ddi)
    }
}
