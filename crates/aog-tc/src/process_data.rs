//! ISO 11783-10 process data payload codec.
//!
//! Every process data message is an 8-byte payload. For value and
//! measurement commands the low nibble of byte 0 is the command, the
//! remaining 12 bits of bytes 0-1 are the element number, bytes 2-3 the DDI
//! and bytes 4-7 the 32-bit value, all little-endian. The technical
//! capabilities and device descriptor commands use the high nibble of
//! byte 0 as a sub-command mux instead of an element number.

use crate::hal::TcError;

/// Process data command nibbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessDataCommand {
    TechnicalCapabilities = 0x00,
    DeviceDescriptor = 0x01,
    RequestValue = 0x02,
    Value = 0x03,
    MeasurementTimeInterval = 0x04,
    MeasurementDistanceInterval = 0x05,
    MeasurementMinimumThreshold = 0x06,
    MeasurementMaximumThreshold = 0x07,
    MeasurementChangeThreshold = 0x08,
    PeerControlAssignment = 0x09,
    SetValueAndAcknowledge = 0x0A,
    Acknowledge = 0x0D,
    StatusMessage = 0x0E,
    ClientTask = 0x0F,
}

impl ProcessDataCommand {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble & 0x0F {
            0x00 => Some(Self::TechnicalCapabilities),
            0x01 => Some(Self::DeviceDescriptor),
            0x02 => Some(Self::RequestValue),
            0x03 => Some(Self::Value),
            0x04 => Some(Self::MeasurementTimeInterval),
            0x05 => Some(Self::MeasurementDistanceInterval),
            0x06 => Some(Self::MeasurementMinimumThreshold),
            0x07 => Some(Self::MeasurementMaximumThreshold),
            0x08 => Some(Self::MeasurementChangeThreshold),
            0x09 => Some(Self::PeerControlAssignment),
            0x0A => Some(Self::SetValueAndAcknowledge),
            0x0D => Some(Self::Acknowledge),
            0x0E => Some(Self::StatusMessage),
            0x0F => Some(Self::ClientTask),
            _ => None,
        }
    }
}

/// Sub-commands of `TechnicalCapabilities`, carried in the high nibble of
/// byte 0.
pub mod technical {
    pub const REQUEST_VERSION: u8 = 0x0;
    pub const VERSION_RESPONSE: u8 = 0x1;
}

/// Sub-commands of `DeviceDescriptor`, carried in the high nibble of byte 0.
pub mod descriptor {
    pub const REQUEST_STRUCTURE_LABEL: u8 = 0x0;
    pub const STRUCTURE_LABEL_REPLY: u8 = 0x1;
    pub const REQUEST_LOCALIZATION_LABEL: u8 = 0x2;
    pub const LOCALIZATION_LABEL_REPLY: u8 = 0x3;
    pub const REQUEST_OBJECT_POOL_TRANSFER: u8 = 0x4;
    pub const REQUEST_OBJECT_POOL_TRANSFER_RESPONSE: u8 = 0x5;
    pub const OBJECT_POOL_TRANSFER: u8 = 0x6;
    pub const OBJECT_POOL_TRANSFER_RESPONSE: u8 = 0x7;
    pub const OBJECT_POOL_ACTIVATE_DEACTIVATE: u8 = 0x8;
    pub const OBJECT_POOL_ACTIVATE_DEACTIVATE_RESPONSE: u8 = 0x9;
    pub const OBJECT_POOL_DELETE: u8 = 0xA;
    pub const OBJECT_POOL_DELETE_RESPONSE: u8 = 0xB;
    pub const CHANGE_DESIGNATOR: u8 = 0xC;
    pub const CHANGE_DESIGNATOR_RESPONSE: u8 = 0xD;
}

/// A decoded value or measurement command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueCommand {
    pub command: ProcessDataCommand,
    pub element_number: u16,
    pub ddi: u16,
    pub value: i32,
}

/// Encodes a value or measurement command into the 8-byte payload form.
pub fn encode_value_command(
    command: ProcessDataCommand,
    element_number: u16,
    ddi: u16,
    value: i32,
) -> [u8; 8] {
    let mut payload = [0u8; 8];
    payload[0] = (command as u8) | (((element_number & 0x0F) as u8) << 4);
    payload[1] = (element_number >> 4) as u8;
    payload[2..4].copy_from_slice(&ddi.to_le_bytes());
    payload[4..8].copy_from_slice(&value.to_le_bytes());
    payload
}

/// Decodes a value or measurement command payload.
pub fn decode_value_command(payload: &[u8]) -> Result<ValueCommand, TcError> {
    if payload.len() < 8 {
        return Err(TcError::BufferTooShort);
    }
    let command = ProcessDataCommand::from_nibble(payload[0])
        .ok_or(TcError::InternalError("reserved process data command"))?;
    Ok(ValueCommand {
        command,
        element_number: ((payload[0] >> 4) as u16) | ((payload[1] as u16) << 4),
        ddi: u16::from_le_bytes(payload[2..4].try_into()?),
        value: i32::from_le_bytes(payload[4..8].try_into()?),
    })
}

/// The command nibble of a payload's first byte.
pub fn command_nibble(payload: &[u8]) -> Option<ProcessDataCommand> {
    payload.first().and_then(|&b| ProcessDataCommand::from_nibble(b))
}

/// The sub-command mux of a technical/descriptor payload.
pub fn sub_command(payload: &[u8]) -> u8 {
    payload.first().map_or(0, |&b| b >> 4)
}

/// Builds the version response: version, boot time, option bits and the
/// supported boom/section/channel counts.
pub fn version_response(
    version: u8,
    boot_time_s: u8,
    options: u8,
    booms: u8,
    sections: u8,
    channels: u8,
) -> [u8; 8] {
    [
        ProcessDataCommand::TechnicalCapabilities as u8 | (technical::VERSION_RESPONSE << 4),
        version,
        boot_time_s,
        options,
        0x00,
        booms,
        sections,
        channels,
    ]
}

/// Builds a structure or localization label reply with the given mux. A
/// label of all 0xFF means "no pool stored under this label".
pub fn label_reply(sub: u8, label: &[u8; 7]) -> [u8; 8] {
    let mut payload = [0u8; 8];
    payload[0] = ProcessDataCommand::DeviceDescriptor as u8 | (sub << 4);
    payload[1..8].copy_from_slice(label);
    payload
}

/// Builds the request-object-pool-transfer response (error code 0 accepts).
pub fn pool_transfer_response(error_code: u8) -> [u8; 8] {
    let mut payload = [0xFFu8; 8];
    payload[0] = ProcessDataCommand::DeviceDescriptor as u8
        | (descriptor::REQUEST_OBJECT_POOL_TRANSFER_RESPONSE << 4);
    payload[1] = error_code;
    payload
}

/// Builds the object-pool-transfer response.
pub fn object_pool_transfer_response(error_code: u8, size: u32) -> [u8; 8] {
    let mut payload = [0xFFu8; 8];
    payload[0] = ProcessDataCommand::DeviceDescriptor as u8
        | (descriptor::OBJECT_POOL_TRANSFER_RESPONSE << 4);
    payload[1] = error_code;
    payload[2..6].copy_from_slice(&size.to_le_bytes());
    payload
}

/// Builds the activate/deactivate response. On activation failure the
/// faulting object ids and pool error bits are reported back.
pub fn activate_response(
    activation_error: u8,
    parent_object: u16,
    faulting_object: u16,
    pool_error: u8,
) -> [u8; 8] {
    let mut payload = [0xFFu8; 8];
    payload[0] = ProcessDataCommand::DeviceDescriptor as u8
        | (descriptor::OBJECT_POOL_ACTIVATE_DEACTIVATE_RESPONSE << 4);
    payload[1] = activation_error;
    payload[2..4].copy_from_slice(&parent_object.to_le_bytes());
    payload[4..6].copy_from_slice(&faulting_object.to_le_bytes());
    payload[6] = pool_error;
    payload
}

/// Builds the delete-object-pool response.
pub fn delete_response(error_code: u8) -> [u8; 8] {
    let mut payload = [0xFFu8; 8];
    payload[0] =
        ProcessDataCommand::DeviceDescriptor as u8 | (descriptor::OBJECT_POOL_DELETE_RESPONSE << 4);
    payload[1] = error_code;
    payload
}

/// Builds the change-designator response.
pub fn change_designator_response(object_id: u16, error_code: u8) -> [u8; 8] {
    let mut payload = [0xFFu8; 8];
    payload[0] =
        ProcessDataCommand::DeviceDescriptor as u8 | (descriptor::CHANGE_DESIGNATOR_RESPONSE << 4);
    payload[1..3].copy_from_slice(&object_id.to_le_bytes());
    payload[3] = error_code;
    payload
}

/// Builds the process data acknowledge (PDACK).
pub fn acknowledge(element_number: u16, ddi: u16, error_codes: u8, command: u8) -> [u8; 8] {
    let mut payload = [0xFFu8; 8];
    payload[0] = ProcessDataCommand::Acknowledge as u8 | (((element_number & 0x0F) as u8) << 4);
    payload[1] = (element_number >> 4) as u8;
    payload[2..4].copy_from_slice(&ddi.to_le_bytes());
    payload[4] = error_codes;
    payload[5] = command & 0x0F;
    payload
}

/// Builds the cyclic task controller status message. Bit 0 of the status
/// byte signals an active task; this server never runs tasks.
pub fn status_message(task_active: bool) -> [u8; 8] {
    [
        ProcessDataCommand::StatusMessage as u8 | 0xF0,
        0xFF,
        0xFF,
        0xFF,
        task_active as u8,
        0xFF,
        0xFF,
        0xFF,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ddi;

    #[test]
    fn value_command_roundtrip() {
        let payload = encode_value_command(
            ProcessDataCommand::Value,
            0x123,
            ddi::SETPOINT_CONDENSED_WORK_STATE_1_16,
            0x0105_0400,
        );
        let decoded = decode_value_command(&payload).unwrap();
        assert_eq!(decoded.command, ProcessDataCommand::Value);
        assert_eq!(decoded.element_number, 0x123);
        assert_eq!(decoded.ddi, ddi::SETPOINT_CONDENSED_WORK_STATE_1_16);
        assert_eq!(decoded.value, 0x0105_0400);
    }

    #[test]
    fn element_number_straddles_bytes() {
        let payload = encode_value_command(ProcessDataCommand::Value, 5, ddi::ACTUAL_WORK_STATE, 1);
        assert_eq!(payload[0], 0x03 | (5 << 4));
        assert_eq!(payload[1], 0);
        let payload = encode_value_command(ProcessDataCommand::Value, 0x21, 0, 0);
        assert_eq!(payload[0], 0x03 | 0x10);
        assert_eq!(payload[1], 0x02);
    }

    #[test]
    fn negative_values_survive() {
        let payload =
            encode_value_command(ProcessDataCommand::Value, 1, ddi::ACTUAL_WORK_STATE, -7);
        assert_eq!(decode_value_command(&payload).unwrap().value, -7);
    }

    #[test]
    fn reserved_command_is_rejected() {
        let payload = [0x0B, 0, 0, 0, 0, 0, 0, 0];
        assert!(decode_value_command(&payload).is_err());
    }

    #[test]
    fn sub_command_extraction() {
        let payload = label_reply(descriptor::STRUCTURE_LABEL_REPLY, &[0xFF; 7]);
        assert_eq!(
            command_nibble(&payload),
            Some(ProcessDataCommand::DeviceDescriptor)
        );
        assert_eq!(sub_command(&payload), descriptor::STRUCTURE_LABEL_REPLY);
    }

    #[test]
    fn version_response_layout() {
        let payload = version_response(4, 0xFF, 0x01, 1, 16, 16);
        assert_eq!(payload[0], 0x10);
        assert_eq!(payload[1], 4);
        assert_eq!(payload[5..8], [1, 16, 16]);
    }
}
