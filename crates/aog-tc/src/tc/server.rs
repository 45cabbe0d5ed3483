use super::client::ClientState;
use crate::ddop::{implement_geometry, DevicePool, TriggerMethod};
use crate::hal::TcError;
use crate::types::{ddi, IsoName, SectionState, MAX_SECTIONS, SECTIONS_PER_CONDENSED_MESSAGE};
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use log::{debug, info, trace, warn};

/// Activation error bits reported in the activate response.
pub mod activation_error {
    pub const NONE: u8 = 0x00;
    /// There are errors in the device descriptor object pool.
    pub const DDOP_ERRORS: u8 = 0x01;
    /// The task controller ran out of memory during activation.
    pub const OUT_OF_MEMORY: u8 = 0x02;
    /// Any other error.
    pub const OTHER: u8 = 0x04;
}

/// Pool error bits reported alongside a failed activation.
pub mod pool_error {
    pub const NONE: u8 = 0x00;
    /// A method or attribute in the pool is not supported.
    pub const METHOD_OR_ATTRIBUTE_NOT_SUPPORTED: u8 = 0x01;
    /// An object references an object id that is not in the pool.
    pub const UNKNOWN_OBJECT_REFERENCE: u8 = 0x02;
    /// Any other error.
    pub const OTHER: u8 = 0x04;
}

/// Outcome of a pool activation attempt, mirrored into the activate
/// response sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolActivationResult {
    pub ok: bool,
    pub activation_error: u8,
    pub pool_error: u8,
    pub faulting_parent_object: u16,
    pub faulting_object: u16,
}

impl PoolActivationResult {
    fn success() -> Self {
        PoolActivationResult {
            ok: true,
            activation_error: activation_error::NONE,
            pool_error: pool_error::NONE,
            faulting_parent_object: 0xFFFF,
            faulting_object: 0xFFFF,
        }
    }

    fn failure(activation: u8, pool: u8) -> Self {
        PoolActivationResult {
            ok: false,
            activation_error: activation,
            pool_error: pool,
            faulting_parent_object: 0xFFFF,
            faulting_object: 0xFFFF,
        }
    }
}

/// An outbound process data command queued by the server, to be encoded and
/// transmitted by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcCommand {
    SetValue {
        partner: IsoName,
        element_number: u16,
        ddi: u16,
        value: i32,
    },
    /// Subscribe to a value with an on-change threshold.
    ChangeThresholdMeasurement {
        partner: IsoName,
        element_number: u16,
        ddi: u16,
        threshold: i32,
    },
    /// Subscribe to a value with a time interval trigger.
    TimeIntervalMeasurement {
        partner: IsoName,
        element_number: u16,
        ddi: u16,
        interval_ms: i32,
    },
}

/// The task controller server state machine.
///
/// The session layer invokes the `store_pool`/`activate_pool`/
/// `on_value_command`/... hooks when the corresponding process data
/// messages arrive; the application drives `request_measurement_commands`,
/// `update_section_states` and `update_section_control_enabled` from its
/// event loop. Outbound commands accumulate in a queue drained by the
/// session layer each tick.
pub struct TaskControllerServer {
    clients: BTreeMap<IsoName, ClientState>,
    uploaded_pools: BTreeMap<IsoName, Vec<Vec<u8>>>,
    pending_commands: VecDeque<TcCommand>,
}

impl TaskControllerServer {
    pub fn new() -> Self {
        TaskControllerServer {
            clients: BTreeMap::new(),
            uploaded_pools: BTreeMap::new(),
            pending_commands: VecDeque::new(),
        }
    }

    // --- Hooks invoked by the session layer ---

    /// Stores one uploaded pool fragment. Never parses; always succeeds.
    pub fn store_pool(&mut self, partner: IsoName, chunk: &[u8], append: bool) -> bool {
        let chunks = self.uploaded_pools.entry(partner).or_default();
        if !append {
            chunks.clear();
        }
        chunks.push(chunk.to_vec());
        trace!(
            "Stored pool chunk of {} bytes for {} ({} chunks pending)",
            chunk.len(),
            partner,
            chunks.len()
        );
        true
    }

    /// Deserialises the uploaded fragments and installs the client state.
    /// The fragments are consumed either way, so a client can start a fresh
    /// upload after a failure.
    pub fn activate_pool(&mut self, partner: IsoName) -> PoolActivationResult {
        let data = {
            let chunks = match self.uploaded_pools.get_mut(&partner) {
                Some(chunks) if !chunks.is_empty() => chunks,
                _ => {
                    warn!("Activation requested by {} without an uploaded pool", partner);
                    return PoolActivationResult::failure(
                        activation_error::OTHER,
                        pool_error::NONE,
                    );
                }
            };
            let mut data = Vec::with_capacity(chunks.iter().map(Vec::len).sum());
            for chunk in chunks.iter() {
                data.extend_from_slice(chunk);
            }
            chunks.clear();
            data
        };

        let pool = match DevicePool::deserialize(&data) {
            Ok(pool) => pool,
            Err(e) => {
                warn!("Failed to deserialize object pool from {}: {}", partner, e);
                let pool_bits = match e {
                    TcError::PoolObjectNotFound(_) => pool_error::UNKNOWN_OBJECT_REFERENCE,
                    TcError::UnknownObjectType(_) | TcError::InvalidElementType(_) => {
                        pool_error::METHOD_OR_ATTRIBUTE_NOT_SUPPORTED
                    }
                    _ => pool_error::OTHER,
                };
                return PoolActivationResult::failure(activation_error::DDOP_ERRORS, pool_bits);
            }
        };

        info!("Successfully deserialized device descriptor object pool from {}", partner);
        let implement = implement_geometry(&pool);
        for boom in &implement.booms {
            info!("Boom: element={}", boom.element_number);
            for sub_boom in &boom.sub_booms {
                info!("  SubBoom: element={}", sub_boom.element_number);
                for section in &sub_boom.sections {
                    info!(
                        "    Section: element={} x={:?} y={:?} z={:?} width={:?}",
                        section.element_number,
                        section.x_offset_mm,
                        section.y_offset_mm,
                        section.z_offset_mm,
                        section.width_mm
                    );
                }
            }
            for section in &boom.sections {
                info!(
                    "  Section: element={} x={:?} y={:?} z={:?} width={:?}",
                    section.element_number,
                    section.x_offset_mm,
                    section.y_offset_mm,
                    section.z_offset_mm,
                    section.width_mm
                );
            }
        }

        let number_of_sections = implement.section_count().min(MAX_SECTIONS as usize) as u16;
        let element_index = pool.ddi_to_element_index();

        let mut state = ClientState::new(pool);
        state.set_number_of_sections(number_of_sections);
        for (data_index, element_number) in element_index {
            state.set_element_number_for_ddi(data_index, element_number);
        }
        info!("Activated pool for {} with {} sections", partner, number_of_sections);
        self.clients.insert(partner, state);
        PoolActivationResult::success()
    }

    pub fn deactivate_pool(&mut self, partner: IsoName) -> bool {
        info!("Deactivating pool for {}", partner);
        self.clients.remove(&partner);
        self.uploaded_pools.remove(&partner);
        true
    }

    pub fn delete_pool(&mut self, partner: IsoName) -> bool {
        info!("Deleting pool for {}", partner);
        self.clients.remove(&partner);
        self.uploaded_pools.remove(&partner);
        true
    }

    /// Pools are never persisted across sessions, so label lookups always
    /// answer "not stored" and clients re-upload every time.
    pub fn pool_stored_by_structure_label(
        &self,
        _partner: IsoName,
        _label: &[u8; 7],
        _extended_label: &[u8],
    ) -> bool {
        false
    }

    pub fn pool_stored_by_localization_label(&self, _partner: IsoName, _label: &[u8; 7]) -> bool {
        false
    }

    pub fn enough_memory(&self, _required_bytes: u32) -> bool {
        true
    }

    /// The TC number would be shown on a display for a few seconds; this
    /// server has no display surface.
    pub fn identify_task_controller(&self, tc_number: u8) {
        debug!("Asked to identify ourselves as TC number {}", tc_number);
    }

    pub fn change_designator(&mut self, partner: IsoName, object_id: u16, designator: &[u8]) -> bool {
        debug!(
            "Client {} changed designator of object {} ({} bytes)",
            partner,
            object_id,
            designator.len()
        );
        true
    }

    /// Drops the client's activated state after bus silence. Any uploaded
    /// fragments are left behind so a reconnecting client can start over.
    pub fn on_client_timeout(&mut self, partner: IsoName) {
        if self.clients.remove(&partner).is_some() {
            info!("Client {} timed out, dropping its state", partner);
        }
    }

    pub fn on_process_data_acknowledge(
        &self,
        partner: IsoName,
        data_index: u16,
        element_number: u16,
        error_codes: u8,
        command: u8,
    ) {
        debug!(
            "PDACK from {} for DDI {} element {} error_codes={:#010b} command={}",
            partner, data_index, element_number, error_codes, command
        );
    }

    /// Handles an inbound set value command from a client.
    pub fn on_value_command(
        &mut self,
        partner: IsoName,
        data_index: u16,
        element_number: u16,
        value: i32,
    ) -> bool {
        let state = match self.clients.get_mut(&partner) {
            Some(state) => state,
            None => {
                warn!("Value command from {} without an active pool", partner);
                return false;
            }
        };

        if ddi::is_actual_condensed_work_state(data_index) {
            let section_offset = (data_index - ddi::ACTUAL_CONDENSED_WORK_STATE_1_16)
                * SECTIONS_PER_CONDENSED_MESSAGE;
            for i in 0..SECTIONS_PER_CONDENSED_MESSAGE {
                state.set_section_actual_state(
                    section_offset + i,
                    SectionState::from_bits((value >> (2 * i)) as u8),
                );
            }
            debug!(
                "Actual condensed work state for element {} DDI {}: {:#034b}",
                element_number, data_index, value
            );
        } else if data_index == ddi::SECTION_CONTROL_STATE {
            info!("Client {} reports section control state {}", partner, value);
            state.set_section_control_enabled(value == 1);
        } else if data_index == ddi::ACTUAL_WORK_STATE {
            debug!("Client {} reports actual work state {}", partner, value);
            state.set_actual_work_state(value == 1);
        } else {
            trace!(
                "Accepting value {} for DDI {} element {} from {}",
                value,
                data_index,
                element_number,
                partner
            );
        }
        true
    }

    // --- Application-driven operations ---

    /// Issues the measurement subscriptions for every freshly activated
    /// client: actual (condensed) work state on change and on a 1 s timer,
    /// the setpoint mirror group on change only. Runs once per client.
    pub fn request_measurement_commands(&mut self) {
        let Self {
            clients,
            pending_commands,
            ..
        } = self;
        for (partner, state) in clients.iter_mut() {
            if state.measurement_commands_sent() {
                continue;
            }

            for pd in state.pool().process_data() {
                let actual_group = pd.ddi == ddi::ACTUAL_WORK_STATE
                    || ddi::is_actual_condensed_work_state(pd.ddi);
                let setpoint_group = pd.ddi == ddi::SECTION_CONTROL_STATE
                    || pd.ddi == ddi::SETPOINT_WORK_STATE
                    || ddi::is_setpoint_condensed_work_state(pd.ddi);
                if !actual_group && !setpoint_group {
                    continue;
                }
                let element_number = match state.element_number_for_ddi(pd.ddi) {
                    Some(element_number) => element_number,
                    None => continue,
                };

                if pd.has_trigger_method(TriggerMethod::OnChange) {
                    debug!(
                        "Requesting on-change trigger for element {} DDI {}",
                        element_number, pd.ddi
                    );
                    pending_commands.push_back(TcCommand::ChangeThresholdMeasurement {
                        partner: *partner,
                        element_number,
                        ddi: pd.ddi,
                        threshold: 1,
                    });
                }
                if actual_group && pd.has_trigger_method(TriggerMethod::TimeInterval) {
                    debug!(
                        "Requesting time interval trigger for element {} DDI {}",
                        element_number, pd.ddi
                    );
                    pending_commands.push_back(TcCommand::TimeIntervalMeasurement {
                        partner: *partner,
                        element_number,
                        ddi: pd.ddi,
                        interval_ms: 1000,
                    });
                }
            }

            info!("Measurement commands sent for client {}", partner);
            state.mark_measurement_commands_sent();
        }
    }

    /// Applies the desired section states from AOG and flushes every 16-wide
    /// window that changed as one condensed setpoint. Clients in manual mode
    /// are skipped entirely; the standard only allows setpoints in auto mode.
    pub fn update_section_states(&mut self, desired: &[bool]) {
        let Self {
            clients,
            pending_commands,
            ..
        } = self;
        for (partner, state) in clients.iter_mut() {
            if !state.section_control_enabled() {
                continue;
            }

            let number_of_sections = state.number_of_sections();
            let windows = number_of_sections.div_ceil(SECTIONS_PER_CONDENSED_MESSAGE);
            let mut flushed_any = false;
            for window in 0..windows {
                let start = window * SECTIONS_PER_CONDENSED_MESSAGE;
                let end = (start + SECTIONS_PER_CONDENSED_MESSAGE).min(number_of_sections);
                let mut changed = false;
                for section in start..end {
                    let Some(&want_on) = desired.get(section as usize) else {
                        continue;
                    };
                    if want_on != (state.section_setpoint_state(section) == SectionState::On) {
                        state.set_section_setpoint_state(
                            section,
                            if want_on { SectionState::On } else { SectionState::Off },
                        );
                        changed = true;
                    }
                }
                if changed {
                    let ddi_target = ddi::SETPOINT_CONDENSED_WORK_STATE_1_16 + window;
                    let mut value: u32 = 0;
                    for i in 0..SECTIONS_PER_CONDENSED_MESSAGE {
                        value |= (state.section_setpoint_state(start + i) as u32) << (2 * i);
                    }
                    let element_number = state.element_number_for_ddi(ddi_target).unwrap_or(0);
                    debug!(
                        "Sending setpoint condensed work state window {} = {:#010X}",
                        window, value
                    );
                    pending_commands.push_back(TcCommand::SetValue {
                        partner: *partner,
                        element_number,
                        ddi: ddi_target,
                        value: value as i32,
                    });
                    flushed_any = true;
                }
            }

            if flushed_any {
                let any_on = state.any_section_setpoint_on();
                if any_on != state.setpoint_work_state() {
                    debug!("Sending setpoint work state {}", any_on);
                    let element_number = state
                        .element_number_for_ddi(ddi::SETPOINT_WORK_STATE)
                        .unwrap_or(0);
                    pending_commands.push_back(TcCommand::SetValue {
                        partner: *partner,
                        element_number,
                        ddi: ddi::SETPOINT_WORK_STATE,
                        value: any_on as i32,
                    });
                    state.set_setpoint_work_state(any_on);
                }
            }
        }
    }

    /// Propagates an auto/manual switch to every client whose cached mode
    /// differs.
    pub fn update_section_control_enabled(&mut self, enabled: bool) {
        let Self {
            clients,
            pending_commands,
            ..
        } = self;
        for (partner, state) in clients.iter_mut() {
            if state.section_control_enabled() != enabled {
                state.set_section_control_enabled(enabled);
                info!(
                    "Sending section control state {} to {}",
                    if enabled { "enabled" } else { "disabled" },
                    partner
                );
                let element_number = state
                    .element_number_for_ddi(ddi::SECTION_CONTROL_STATE)
                    .unwrap_or(0);
                pending_commands.push_back(TcCommand::SetValue {
                    partner: *partner,
                    element_number,
                    ddi: ddi::SECTION_CONTROL_STATE,
                    value: enabled as i32,
                });
            }
        }
    }

    // --- Accessors ---

    pub fn clients(&self) -> impl Iterator<Item = (&IsoName, &ClientState)> {
        self.clients.iter()
    }

    pub fn client(&self, partner: &IsoName) -> Option<&ClientState> {
        self.clients.get(partner)
    }

    pub fn client_mut(&mut self, partner: &IsoName) -> Option<&mut ClientState> {
        self.clients.get_mut(partner)
    }

    pub fn has_uploaded_chunks(&self, partner: &IsoName) -> bool {
        self.uploaded_pools
            .get(partner)
            .is_some_and(|chunks| !chunks.is_empty())
    }

    /// Drains the queued outbound commands.
    pub fn take_pending_commands(&mut self) -> VecDeque<TcCommand> {
        core::mem::take(&mut self.pending_commands)
    }
}

impl Default for TaskControllerServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddop::test_pool::TestPoolBuilder;
    use crate::ddop::ElementType;

    const PARTNER: IsoName = IsoName(0xA00A_2000_1CFF_0014);

    /// Pool with one boom (element 5) carrying `sections` sections and the
    /// process data objects this server subscribes to.
    fn pool_bytes(sections: u16) -> Vec<u8> {
        let mut builder = TestPoolBuilder::new()
            .device(0, "Sprayer", IsoName(1))
            .element(1, ElementType::Device, "Main", 0, 0xFFFF, &[2, 3, 4])
            .process_data(2, ddi::ACTUAL_WORK_STATE, 0x09, "ActualWork")
            .process_data(3, ddi::SETPOINT_WORK_STATE, 0x08, "SetpointWork")
            .process_data(4, ddi::SECTION_CONTROL_STATE, 0x08, "SectionControl")
            .element(5, ElementType::Function, "Boom", 5, 1, &[6, 7, 8])
            .process_data(6, ddi::ACTUAL_CONDENSED_WORK_STATE_1_16, 0x08, "ActCondensed1")
            .process_data(7, ddi::SETPOINT_CONDENSED_WORK_STATE_1_16, 0x08, "SetCondensed1")
            .process_data(
                8,
                ddi::SETPOINT_CONDENSED_WORK_STATE_1_16 + 1,
                0x08,
                "SetCondensed2",
            );
        for i in 0..sections {
            builder = builder.element(
                100 + i,
                ElementType::Section,
                "S",
                10 + i,
                5,
                &[],
            );
        }
        builder.build()
    }

    fn activated_server(sections: u16) -> TaskControllerServer {
        let mut server = TaskControllerServer::new();
        assert!(server.store_pool(PARTNER, &pool_bytes(sections), false));
        assert!(server.activate_pool(PARTNER).ok);
        server
    }

    #[test]
    fn activation_without_upload_fails() {
        let mut server = TaskControllerServer::new();
        let result = server.activate_pool(PARTNER);
        assert!(!result.ok);
        assert_eq!(result.activation_error, activation_error::OTHER);
        assert!(server.client(&PARTNER).is_none());
    }

    #[test]
    fn activation_failure_reports_pool_error_and_installs_nothing() {
        let mut server = TaskControllerServer::new();
        server.store_pool(PARTNER, b"garbage-data", false);
        let result = server.activate_pool(PARTNER);
        assert!(!result.ok);
        assert_eq!(result.activation_error, activation_error::DDOP_ERRORS);
        assert_ne!(result.pool_error, pool_error::NONE);
        assert!(server.client(&PARTNER).is_none());
    }

    #[test]
    fn chunked_upload_activates() {
        let data = pool_bytes(3);
        let (first, second) = data.split_at(data.len() / 2);
        let mut server = TaskControllerServer::new();
        server.store_pool(PARTNER, first, false);
        server.store_pool(PARTNER, second, true);
        assert!(server.activate_pool(PARTNER).ok);
        let client = server.client(&PARTNER).unwrap();
        assert_eq!(client.number_of_sections(), 3);
        assert_eq!(
            client.element_number_for_ddi(ddi::ACTUAL_CONDENSED_WORK_STATE_1_16),
            Some(5)
        );
    }

    #[test]
    fn non_append_upload_replaces_previous_chunks() {
        let mut server = TaskControllerServer::new();
        server.store_pool(PARTNER, b"stale", false);
        server.store_pool(PARTNER, &pool_bytes(2), false);
        assert!(server.activate_pool(PARTNER).ok);
    }

    #[test]
    fn measurement_commands_sent_once() {
        let mut server = activated_server(3);
        server.request_measurement_commands();
        let commands = server.take_pending_commands();
        assert!(!commands.is_empty());
        // ActualWorkState advertises both triggers, the others on-change only.
        let time_interval = commands
            .iter()
            .filter(|c| matches!(c, TcCommand::TimeIntervalMeasurement { .. }))
            .count();
        let on_change = commands
            .iter()
            .filter(|c| matches!(c, TcCommand::ChangeThresholdMeasurement { .. }))
            .count();
        assert_eq!(time_interval, 1);
        assert_eq!(on_change, 6);

        server.request_measurement_commands();
        assert!(server.take_pending_commands().is_empty());
    }

    #[test]
    fn condensed_actual_state_is_unpacked() {
        let mut server = activated_server(3);
        // Sections 0 and 1 on.
        let value = 0b01_01;
        assert!(server.on_value_command(PARTNER, ddi::ACTUAL_CONDENSED_WORK_STATE_1_16, 5, value));
        let client = server.client(&PARTNER).unwrap();
        assert_eq!(client.section_actual_state(0), SectionState::On);
        assert_eq!(client.section_actual_state(1), SectionState::On);
        assert_eq!(client.section_actual_state(2), SectionState::Off);
        // Writes past number_of_sections were dropped.
        assert_eq!(client.section_actual_state(3), SectionState::NotInstalled);
    }

    #[test]
    fn actual_work_state_updates_actual_not_setpoint() {
        let mut server = activated_server(3);
        server.on_value_command(PARTNER, ddi::ACTUAL_WORK_STATE, 0, 1);
        let client = server.client(&PARTNER).unwrap();
        assert!(client.actual_work_state());
        assert!(!client.setpoint_work_state());
    }

    #[test]
    fn manual_mode_emits_no_setpoints() {
        let mut server = activated_server(3);
        server.update_section_states(&[true, true, true]);
        assert!(server.take_pending_commands().is_empty());
    }

    #[test]
    fn auto_mode_flushes_one_window_per_change() {
        let mut server = activated_server(3);
        server.update_section_control_enabled(true);
        server.take_pending_commands();

        server.update_section_states(&[true, false, true]);
        let commands = server.take_pending_commands();
        assert_eq!(commands.len(), 2);
        match commands[0] {
            TcCommand::SetValue {
                element_number,
                ddi: ddi_target,
                value,
                ..
            } => {
                assert_eq!(ddi_target, ddi::SETPOINT_CONDENSED_WORK_STATE_1_16);
                assert_eq!(element_number, 5);
                // Sections 0 and 2 on, section 1 off, everything else not installed.
                let expected: u32 = 0b01 | (0b01 << 4) | (0xFFFF_FFC0);
                assert_eq!(value as u32, expected);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        match commands[1] {
            TcCommand::SetValue { ddi: ddi_target, value, .. } => {
                assert_eq!(ddi_target, ddi::SETPOINT_WORK_STATE);
                assert_eq!(value, 1);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        // No diff, no traffic.
        server.update_section_states(&[true, false, true]);
        assert!(server.take_pending_commands().is_empty());
    }

    #[test]
    fn seventeen_sections_flush_two_windows() {
        let mut server = activated_server(20);
        server.update_section_control_enabled(true);
        server.take_pending_commands();

        let mut desired = [true; 17].to_vec();
        desired.extend_from_slice(&[false; 3]);
        server.update_section_states(&desired);
        let commands = server.take_pending_commands();
        let set_values: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                TcCommand::SetValue { ddi: d, value, .. } => Some((*d, *value as u32)),
                _ => None,
            })
            .collect();
        assert_eq!(set_values.len(), 3); // two windows + work state
        assert_eq!(
            set_values[0],
            (ddi::SETPOINT_CONDENSED_WORK_STATE_1_16, 0x5555_5555)
        );
        // Section 17 on, 18-20 off, the rest not installed.
        let window2: u32 = 0x01 | 0xFFFF_FF00;
        assert_eq!(set_values[1].0, ddi::SETPOINT_CONDENSED_WORK_STATE_1_16 + 1);
        assert_eq!(set_values[1].1, window2);
        assert_eq!(set_values[2].0, ddi::SETPOINT_WORK_STATE);
    }

    #[test]
    fn section_control_toggle_emits_once() {
        let mut server = activated_server(3);
        server.update_section_control_enabled(true);
        let commands = server.take_pending_commands();
        assert_eq!(commands.len(), 1);
        match commands[0] {
            TcCommand::SetValue { ddi: d, value, element_number, .. } => {
                assert_eq!(d, ddi::SECTION_CONTROL_STATE);
                assert_eq!(value, 1);
                assert_eq!(element_number, 0);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        server.update_section_control_enabled(true);
        assert!(server.take_pending_commands().is_empty());
    }

    #[test]
    fn timeout_drops_client_state_only() {
        let mut server = activated_server(3);
        server.store_pool(PARTNER, b"partial", true);
        server.on_client_timeout(PARTNER);
        assert!(server.client(&PARTNER).is_none());
        assert!(server.has_uploaded_chunks(&PARTNER));
    }

    #[test]
    fn deactivate_drops_everything() {
        let mut server = activated_server(3);
        server.store_pool(PARTNER, b"partial", true);
        assert!(server.deactivate_pool(PARTNER));
        assert!(server.client(&PARTNER).is_none());
        assert!(!server.has_uploaded_chunks(&PARTNER));
    }

    #[test]
    fn label_lookups_never_report_stored_pools() {
        let server = TaskControllerServer::new();
        assert!(!server.pool_stored_by_structure_label(PARTNER, &[0u8; 7], &[]));
        assert!(!server.pool_stored_by_localization_label(PARTNER, &[0u8; 7]));
        assert!(server.enough_memory(u32::MAX));
    }
}
