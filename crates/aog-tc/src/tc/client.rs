use crate::ddop::DevicePool;
use crate::types::{SectionState, MAX_SECTIONS};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use log::warn;

/// Per-client state: the activated pool, the section state vectors and the
/// DDI-to-element binding learned from the pool.
///
/// The setpoint and actual vectors always have exactly
/// `number_of_sections` entries. Writes past the end are dropped, reads
/// past the end answer `NotInstalled`.
pub struct ClientState {
    pool: DevicePool,
    measurement_commands_sent: bool,
    ddi_to_element_number: BTreeMap<u16, u16>,
    number_of_sections: u16,
    section_setpoint_states: Vec<SectionState>,
    section_actual_states: Vec<SectionState>,
    setpoint_work_state: bool,
    actual_work_state: bool,
    /// Per-element master override (sub-boom work state). Stored but not
    /// currently driven by any inbound path.
    element_work_states: BTreeMap<u16, bool>,
    section_control_enabled: bool,
}

impl ClientState {
    pub fn new(pool: DevicePool) -> Self {
        ClientState {
            pool,
            measurement_commands_sent: false,
            ddi_to_element_number: BTreeMap::new(),
            number_of_sections: 0,
            section_setpoint_states: Vec::new(),
            section_actual_states: Vec::new(),
            setpoint_work_state: false,
            actual_work_state: false,
            element_work_states: BTreeMap::new(),
            section_control_enabled: false,
        }
    }

    pub fn pool(&self) -> &DevicePool {
        &self.pool
    }

    pub fn number_of_sections(&self) -> u16 {
        self.number_of_sections
    }

    pub fn set_number_of_sections(&mut self, number: u16) {
        let number = number.min(MAX_SECTIONS);
        self.number_of_sections = number;
        self.section_setpoint_states
            .resize(number as usize, SectionState::Off);
        self.section_actual_states
            .resize(number as usize, SectionState::Off);
    }

    pub fn section_setpoint_state(&self, section: u16) -> SectionState {
        self.section_setpoint_states
            .get(section as usize)
            .copied()
            .unwrap_or(SectionState::NotInstalled)
    }

    pub fn set_section_setpoint_state(&mut self, section: u16, state: SectionState) {
        if let Some(slot) = self.section_setpoint_states.get_mut(section as usize) {
            *slot = state;
        }
    }

    pub fn section_actual_state(&self, section: u16) -> SectionState {
        self.section_actual_states
            .get(section as usize)
            .copied()
            .unwrap_or(SectionState::NotInstalled)
    }

    pub fn set_section_actual_state(&mut self, section: u16, state: SectionState) {
        if let Some(slot) = self.section_actual_states.get_mut(section as usize) {
            *slot = state;
        }
    }

    pub fn any_section_setpoint_on(&self) -> bool {
        self.section_setpoint_states
            .iter()
            .any(|&s| s == SectionState::On)
    }

    pub fn setpoint_work_state(&self) -> bool {
        self.setpoint_work_state
    }

    pub fn set_setpoint_work_state(&mut self, state: bool) {
        self.setpoint_work_state = state;
    }

    pub fn actual_work_state(&self) -> bool {
        self.actual_work_state
    }

    pub fn set_actual_work_state(&mut self, state: bool) {
        self.actual_work_state = state;
    }

    pub fn section_control_enabled(&self) -> bool {
        self.section_control_enabled
    }

    pub fn set_section_control_enabled(&mut self, state: bool) {
        self.section_control_enabled = state;
    }

    pub fn measurement_commands_sent(&self) -> bool {
        self.measurement_commands_sent
    }

    pub fn mark_measurement_commands_sent(&mut self) {
        self.measurement_commands_sent = true;
    }

    pub fn element_number_for_ddi(&self, ddi: u16) -> Option<u16> {
        let element = self.ddi_to_element_number.get(&ddi).copied();
        if element.is_none() {
            warn!("No cached element number for DDI {}", ddi);
        }
        element
    }

    pub fn set_element_number_for_ddi(&mut self, ddi: u16, element_number: u16) {
        self.ddi_to_element_number.insert(ddi, element_number);
    }

    pub fn set_element_work_state(&mut self, element_number: u16, is_working: bool) {
        self.element_work_states.insert(element_number, is_working);
    }

    pub fn element_work_state(&self, element_number: u16) -> Option<bool> {
        self.element_work_states.get(&element_number).copied()
    }
}
