//! Cyclic machine selected speed broadcast.
//!
//! AOG reports ground speed with each steer data packet; the implement
//! expects it on the bus as the machine selected speed message every
//! 100 ms.

use crate::can::{CanFrame, CanId, BROADCAST_ADDRESS, PGN_MACHINE_SELECTED_SPEED};
use crate::hal::TcError;

const TRANSMIT_INTERVAL_MS: u64 = 100;
/// Highest valid speed value on the wire; larger values saturate.
const MAX_SPEED_MM_PER_S: u32 = 0xFAFF;

/// Converts a speed in tenths of km/h to mm/s. The widening multiply keeps
/// the full input range exact.
pub fn kmh_tenths_to_mm_per_s(tenths: u16) -> u32 {
    ((tenths as u64 * 100_000) / 3600) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MachineDirection {
    Reverse = 0,
    Forward = 1,
    Error = 2,
    NotAvailable = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpeedSource {
    WheelBased = 0,
    GroundBased = 1,
    NavigationBased = 2,
    Blended = 3,
    Simulated = 4,
}

/// Builds the machine selected speed message on a 100 ms cadence.
///
/// Wire layout (8 bytes): speed in mm/s (u16 LE), distance in mm (u32 LE),
/// one reserved byte, then direction (bits 0-1), speed source (bits 2-4)
/// and limit status (bits 5-7, sent as "not available").
pub struct SpeedMessagesInterface {
    machine_speed_mm_per_s: u32,
    machine_distance_mm: u32,
    direction: MachineDirection,
    source: SpeedSource,
    last_transmit_ms: Option<u64>,
}

impl SpeedMessagesInterface {
    pub fn new() -> Self {
        SpeedMessagesInterface {
            machine_speed_mm_per_s: 0,
            machine_distance_mm: 0,
            direction: MachineDirection::NotAvailable,
            source: SpeedSource::NavigationBased,
            last_transmit_ms: None,
        }
    }

    pub fn set_machine_speed(&mut self, speed_mm_per_s: u32) {
        self.machine_speed_mm_per_s = speed_mm_per_s;
    }

    pub fn set_machine_direction(&mut self, direction: MachineDirection) {
        self.direction = direction;
    }

    pub fn set_machine_distance(&mut self, distance_mm: u32) {
        self.machine_distance_mm = distance_mm;
    }

    pub fn set_speed_source(&mut self, source: SpeedSource) {
        self.source = source;
    }

    /// Emits the next broadcast frame once per interval, stamped with the
    /// local source address.
    pub fn update(&mut self, now_ms: u64, source_address: u8) -> Result<Option<CanFrame>, TcError> {
        let due = self
            .last_transmit_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= TRANSMIT_INTERVAL_MS);
        if !due {
            return Ok(None);
        }
        self.last_transmit_ms = Some(now_ms);

        let speed = self.machine_speed_mm_per_s.min(MAX_SPEED_MM_PER_S) as u16;
        let mut payload = [0xFFu8; 8];
        payload[0..2].copy_from_slice(&speed.to_le_bytes());
        payload[2..6].copy_from_slice(&self.machine_distance_mm.to_le_bytes());
        payload[7] = (self.direction as u8) | ((self.source as u8) << 2) | (0x07 << 5);

        let id = CanId::new(3, PGN_MACHINE_SELECTED_SPEED, BROADCAST_ADDRESS, source_address);
        Ok(Some(CanFrame::new(id, &payload)?))
    }
}

impl Default for SpeedMessagesInterface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_conversion_uses_integer_form() {
        // 36.0 km/h = 10 m/s = 10000 mm/s
        assert_eq!(kmh_tenths_to_mm_per_s(360), 10_000);
        assert_eq!(kmh_tenths_to_mm_per_s(0), 0);
        // 0.1 km/h rounds down to 27 mm/s
        assert_eq!(kmh_tenths_to_mm_per_s(1), 27);
        // Maximum wire value stays within u32
        assert_eq!(kmh_tenths_to_mm_per_s(u16::MAX), 1_820_416);
    }

    #[test]
    fn transmits_on_cadence() {
        let mut interface = SpeedMessagesInterface::new();
        assert!(interface.update(0, 0xF7).unwrap().is_some());
        assert!(interface.update(50, 0xF7).unwrap().is_none());
        assert!(interface.update(100, 0xF7).unwrap().is_some());
        assert!(interface.update(150, 0xF7).unwrap().is_none());
    }

    #[test]
    fn frame_layout() {
        let mut interface = SpeedMessagesInterface::new();
        interface.set_machine_speed(10_000);
        interface.set_machine_direction(MachineDirection::Forward);
        let frame = interface.update(0, 0xF7).unwrap().unwrap();
        assert_eq!(frame.id.pgn(), PGN_MACHINE_SELECTED_SPEED);
        assert_eq!(frame.id.source_address(), 0xF7);
        assert_eq!(&frame.data[0..2], &10_000u16.to_le_bytes());
        assert_eq!(frame.data[7] & 0x03, MachineDirection::Forward as u8);
        assert_eq!((frame.data[7] >> 2) & 0x07, SpeedSource::NavigationBased as u8);
    }

    #[test]
    fn speed_saturates_at_wire_maximum() {
        let mut interface = SpeedMessagesInterface::new();
        interface.set_machine_speed(u32::MAX);
        let frame = interface.update(0, 0xF7).unwrap().unwrap();
        assert_eq!(&frame.data[0..2], &(MAX_SPEED_MM_PER_S as u16).to_le_bytes());
    }
}
