//! Thin session layer between the CAN link and the task controller server.
//!
//! Owns what the server itself stays agnostic of: the local address claim,
//! the partner table mapping bus addresses to NAMEs, reassembly of
//! multi-frame pool transfers, the cyclic TC status broadcast and the
//! client keep-alive timeout. Inbound process data is decoded here and
//! routed into the server hooks; the server's queued commands are encoded
//! into frames on the way out.

use crate::can::{
    CanFrame, CanId, BROADCAST_ADDRESS, PGN_ADDRESS_CLAIM, PGN_LANGUAGE_COMMAND,
    PGN_PROCESS_DATA, PGN_REQUEST, PGN_TP_CM, PGN_TP_DT, TASK_CONTROLLER_PREFERRED_ADDRESS,
};
use crate::process_data::{
    self, command_nibble, decode_value_command, descriptor, encode_value_command, sub_command,
    technical, ProcessDataCommand,
};
use crate::tc::{TaskControllerServer, TcCommand};
use crate::types::{IsoName, NameFields};
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use log::{debug, error, info, trace, warn};

/// TC version advertised in the version response (second edition draft).
pub const TC_VERSION_SECOND_EDITION_DRAFT: u8 = 4;
/// Version response option bit: implement section control supported.
pub const OPTION_IMPLEMENT_SECTION_CONTROL: u8 = 0x10;

const STATUS_INTERVAL_MS: u64 = 2_000;
const CLIENT_TIMEOUT_MS: u64 = 6_000;
/// A claim is considered settled when nobody contests it for this long.
const ADDRESS_CLAIM_SETTLE_MS: u64 = 250;

const ADDRESS_CLAIM_PRIORITY: u8 = 6;
const PROCESS_DATA_PRIORITY: u8 = 5;
const TP_PRIORITY: u8 = 7;

// TP.CM control bytes.
const TP_CM_RTS: u8 = 16;
const TP_CM_CTS: u8 = 17;
const TP_CM_END_OF_MSG_ACK: u8 = 19;
const TP_CM_BAM: u8 = 32;
const TP_CM_ABORT: u8 = 255;

/// Identity and capabilities announced on the bus.
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    pub name: IsoName,
    pub preferred_address: u8,
    pub version: u8,
    pub number_of_booms: u8,
    pub number_of_sections: u8,
    pub number_of_channels: u8,
    pub options: u8,
    pub language_code: [u8; 2],
    pub country_code: [u8; 2],
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            name: NameFields {
                arbitrary_address_capable: true,
                industry_group: 2,
                device_class_instance: 0,
                device_class: 0,
                function: 130, // task controller
                function_instance: 0,
                ecu_instance: 0,
                manufacturer_code: 1407,
                identity_number: 20,
            }
            .to_name(),
            preferred_address: TASK_CONTROLLER_PREFERRED_ADDRESS,
            version: TC_VERSION_SECOND_EDITION_DRAFT,
            number_of_booms: 1,
            number_of_sections: 16,
            number_of_channels: 16,
            options: OPTION_IMPLEMENT_SECTION_CONTROL,
            language_code: *b"en",
            country_code: *b"US",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressState {
    Idle,
    Claiming { since_ms: u64 },
    Claimed,
    Lost,
}

struct PartnerEntry {
    name: IsoName,
    last_seen_ms: u64,
    /// Set by a request-to-transfer; the next pool chunk replaces instead of
    /// appending.
    expect_fresh_pool: bool,
}

struct TpSession {
    pgn: u32,
    total_size: usize,
    total_packets: u8,
    next_sequence: u8,
    is_bam: bool,
    data: Vec<u8>,
}

/// The session layer state machine.
pub struct Transport {
    config: TransportConfig,
    address_state: AddressState,
    partners: BTreeMap<u8, PartnerEntry>,
    tp_sessions: BTreeMap<u8, TpSession>,
    last_status_ms: Option<u64>,
    tx_queue: VecDeque<CanFrame>,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Transport {
            config,
            address_state: AddressState::Idle,
            partners: BTreeMap::new(),
            tp_sessions: BTreeMap::new(),
            last_status_ms: None,
            tx_queue: VecDeque::new(),
        }
    }

    /// Claims the preferred address. The claim settles unless contested
    /// within the settle window.
    pub fn start(&mut self, now_ms: u64) {
        info!(
            "Claiming address {:#04X} with NAME {}",
            self.config.preferred_address, self.config.name
        );
        self.queue_address_claim();
        self.address_state = AddressState::Claiming { since_ms: now_ms };
    }

    pub fn address_claimed(&self) -> bool {
        self.address_state == AddressState::Claimed
    }

    pub fn claim_lost(&self) -> bool {
        self.address_state == AddressState::Lost
    }

    pub fn local_address(&self) -> u8 {
        self.config.preferred_address
    }

    /// Drains the frames queued for transmission.
    pub fn take_tx(&mut self) -> VecDeque<CanFrame> {
        core::mem::take(&mut self.tx_queue)
    }

    /// Routes one received frame.
    pub fn process_frame(
        &mut self,
        server: &mut TaskControllerServer,
        frame: &CanFrame,
        now_ms: u64,
    ) {
        let pgn = frame.id.pgn();
        let source = frame.id.source_address();
        let destination = frame.id.destination_address();

        if let Some(partner) = self.partners.get_mut(&source) {
            partner.last_seen_ms = now_ms;
        }

        let for_us =
            destination == self.config.preferred_address || destination == BROADCAST_ADDRESS;
        match pgn {
            PGN_ADDRESS_CLAIM => self.handle_address_claim(frame, source, now_ms),
            PGN_REQUEST if for_us => self.handle_request(frame),
            PGN_TP_CM if for_us => self.handle_tp_cm(frame, source),
            PGN_TP_DT if for_us => self.handle_tp_dt(server, frame, source, now_ms),
            PGN_PROCESS_DATA if for_us => {
                self.dispatch_process_data(server, source, frame.payload(), now_ms)
            }
            _ => trace!("Ignoring frame {}", frame.id),
        }
    }

    /// Periodic work: claim settling, status broadcast, client timeouts and
    /// encoding the server's queued commands.
    pub fn update(&mut self, server: &mut TaskControllerServer, now_ms: u64) {
        if let AddressState::Claiming { since_ms } = self.address_state {
            if now_ms.saturating_sub(since_ms) >= ADDRESS_CLAIM_SETTLE_MS {
                info!("Address claim settled at {:#04X}", self.config.preferred_address);
                self.address_state = AddressState::Claimed;
            }
        }
        if self.address_state != AddressState::Claimed {
            return;
        }

        // Cyclic TC status; clients expect it as our keep-alive.
        let status_due = self
            .last_status_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= STATUS_INTERVAL_MS);
        if status_due {
            self.last_status_ms = Some(now_ms);
            self.queue_process_data(BROADCAST_ADDRESS, process_data::status_message(false));
        }

        // Drop clients that stopped talking to us.
        let timed_out: Vec<u8> = self
            .partners
            .iter()
            .filter(|(_, partner)| {
                now_ms.saturating_sub(partner.last_seen_ms) >= CLIENT_TIMEOUT_MS
            })
            .map(|(&address, _)| address)
            .collect();
        for address in timed_out {
            if let Some(partner) = self.partners.remove(&address) {
                warn!(
                    "Partner {} at {:#04X} silent for {} ms, dropping",
                    partner.name, address, CLIENT_TIMEOUT_MS
                );
                self.tp_sessions.remove(&address);
                server.on_client_timeout(partner.name);
            }
        }

        // Encode and queue the server's outbound commands.
        for command in server.take_pending_commands() {
            let (partner, payload) = match command {
                TcCommand::SetValue {
                    partner,
                    element_number,
                    ddi,
                    value,
                } => (
                    partner,
                    encode_value_command(ProcessDataCommand::Value, element_number, ddi, value),
                ),
                TcCommand::ChangeThresholdMeasurement {
                    partner,
                    element_number,
                    ddi,
                    threshold,
                } => (
                    partner,
                    encode_value_command(
                        ProcessDataCommand::MeasurementChangeThreshold,
                        element_number,
                        ddi,
                        threshold,
                    ),
                ),
                TcCommand::TimeIntervalMeasurement {
                    partner,
                    element_number,
                    ddi,
                    interval_ms,
                } => (
                    partner,
                    encode_value_command(
                        ProcessDataCommand::MeasurementTimeInterval,
                        element_number,
                        ddi,
                        interval_ms,
                    ),
                ),
            };
            match self.address_of(partner) {
                Some(address) => self.queue_process_data(address, payload),
                None => warn!("Dropping command for unknown partner {}", partner),
            }
        }
    }

    fn address_of(&self, name: IsoName) -> Option<u8> {
        self.partners
            .iter()
            .find(|(_, partner)| partner.name == name)
            .map(|(&address, _)| address)
    }

    fn handle_address_claim(&mut self, frame: &CanFrame, source: u8, now_ms: u64) {
        let name = IsoName::from_le_bytes(frame.data);
        if source == self.config.preferred_address && name != self.config.name {
            // Somebody claims our address: the numerically lower NAME wins.
            if name.0 < self.config.name.0 {
                error!("Address claim for {:#04X} lost to {}", source, name);
                self.address_state = AddressState::Lost;
            } else {
                debug!("Re-asserting address claim against {}", name);
                self.queue_address_claim();
            }
            return;
        }

        debug!("Partner {} claimed address {:#04X}", name, source);
        self.partners.insert(
            source,
            PartnerEntry {
                name,
                last_seen_ms: now_ms,
                expect_fresh_pool: false,
            },
        );
    }

    fn handle_request(&mut self, frame: &CanFrame) {
        if frame.dlc < 3 {
            return;
        }
        let requested = u32::from_le_bytes([frame.data[0], frame.data[1], frame.data[2], 0]);
        match requested {
            PGN_ADDRESS_CLAIM => self.queue_address_claim(),
            PGN_LANGUAGE_COMMAND => self.queue_language_command(),
            _ => trace!("Not answering request for PGN {:#07X}", requested),
        }
    }

    fn handle_tp_cm(&mut self, frame: &CanFrame, source: u8) {
        let control = frame.data[0];
        let pgn = u32::from_le_bytes([frame.data[5], frame.data[6], frame.data[7], 0]);
        match control {
            TP_CM_RTS | TP_CM_BAM => {
                let total_size =
                    u16::from_le_bytes([frame.data[1], frame.data[2]]) as usize;
                let total_packets = frame.data[3];
                if self.tp_sessions.contains_key(&source) {
                    warn!("New transport session from {:#04X} replaces unfinished one", source);
                }
                self.tp_sessions.insert(
                    source,
                    TpSession {
                        pgn,
                        total_size,
                        total_packets,
                        next_sequence: 1,
                        is_bam: control == TP_CM_BAM,
                        data: Vec::with_capacity(total_size),
                    },
                );
                if control == TP_CM_RTS {
                    // Clear the whole message in one go.
                    let cts = [
                        TP_CM_CTS,
                        total_packets,
                        1,
                        0xFF,
                        0xFF,
                        frame.data[5],
                        frame.data[6],
                        frame.data[7],
                    ];
                    self.queue_frame(TP_PRIORITY, PGN_TP_CM, source, &cts);
                }
            }
            TP_CM_ABORT => {
                warn!("Transport session from {:#04X} aborted by sender", source);
                self.tp_sessions.remove(&source);
            }
            TP_CM_CTS | TP_CM_END_OF_MSG_ACK => {
                // We never originate multi-frame messages.
                trace!("Ignoring TP.CM control {} from {:#04X}", control, source);
            }
            _ => warn!("Unknown TP.CM control byte {} from {:#04X}", control, source),
        }
    }

    fn handle_tp_dt(
        &mut self,
        server: &mut TaskControllerServer,
        frame: &CanFrame,
        source: u8,
        now_ms: u64,
    ) {
        let Some(session) = self.tp_sessions.get_mut(&source) else {
            trace!("TP.DT from {:#04X} without a session", source);
            return;
        };

        let sequence = frame.data[0];
        if sequence != session.next_sequence {
            warn!(
                "TP.DT sequence error from {:#04X}: expected {}, got {}",
                source, session.next_sequence, sequence
            );
            let pgn_bytes = session.pgn.to_le_bytes();
            let abort = [
                TP_CM_ABORT,
                0x02, // resources freed: sequence error
                0xFF,
                0xFF,
                0xFF,
                pgn_bytes[0],
                pgn_bytes[1],
                pgn_bytes[2],
            ];
            self.tp_sessions.remove(&source);
            self.queue_frame(TP_PRIORITY, PGN_TP_CM, source, &abort);
            return;
        }
        session.next_sequence = session.next_sequence.wrapping_add(1);
        session.data.extend_from_slice(&frame.data[1..8]);

        if sequence < session.total_packets {
            return;
        }

        // Last packet: strip the padding, acknowledge, dispatch.
        let Some(mut session) = self.tp_sessions.remove(&source) else {
            return;
        };
        session.data.truncate(session.total_size);
        if !session.is_bam {
            let pgn_bytes = session.pgn.to_le_bytes();
            let size_bytes = (session.total_size as u16).to_le_bytes();
            let ack = [
                TP_CM_END_OF_MSG_ACK,
                size_bytes[0],
                size_bytes[1],
                session.total_packets,
                0xFF,
                pgn_bytes[0],
                pgn_bytes[1],
                pgn_bytes[2],
            ];
            self.queue_frame(TP_PRIORITY, PGN_TP_CM, source, &ack);
        }

        if session.pgn == PGN_PROCESS_DATA {
            debug!(
                "Reassembled {} byte process data message from {:#04X}",
                session.data.len(),
                source
            );
            let data = session.data;
            self.dispatch_process_data(server, source, &data, now_ms);
        } else {
            trace!("Ignoring reassembled message for PGN {:#07X}", session.pgn);
        }
    }

    fn dispatch_process_data(
        &mut self,
        server: &mut TaskControllerServer,
        source: u8,
        data: &[u8],
        now_ms: u64,
    ) {
        let name = match self.partners.get_mut(&source) {
            Some(partner) => {
                partner.last_seen_ms = now_ms;
                partner.name
            }
            None => {
                warn!("Process data from {:#04X} before an address claim, ignoring", source);
                return;
            }
        };
        if data.len() < 8 {
            warn!("Process data message from {} shorter than 8 bytes", name);
            return;
        }
        let Some(command) = command_nibble(data) else {
            warn!("Reserved process data command {:#04X} from {}", data[0], name);
            return;
        };

        match command {
            ProcessDataCommand::TechnicalCapabilities => match sub_command(data) {
                technical::REQUEST_VERSION => {
                    let response = process_data::version_response(
                        self.config.version,
                        0xFF,
                        self.config.options,
                        self.config.number_of_booms,
                        self.config.number_of_sections,
                        self.config.number_of_channels,
                    );
                    self.queue_process_data(source, response);
                }
                technical::VERSION_RESPONSE => {
                    debug!("Client {} runs TC client version {}", name, data[1]);
                }
                sub => trace!("Ignoring technical capabilities sub-command {}", sub),
            },
            ProcessDataCommand::DeviceDescriptor => {
                self.handle_device_descriptor(server, source, name, data)
            }
            ProcessDataCommand::Value => {
                if let Ok(command) = decode_value_command(data) {
                    server.on_value_command(
                        name,
                        command.ddi,
                        command.element_number,
                        command.value,
                    );
                }
            }
            ProcessDataCommand::SetValueAndAcknowledge => {
                if let Ok(value_command) = decode_value_command(data) {
                    let ok = server.on_value_command(
                        name,
                        value_command.ddi,
                        value_command.element_number,
                        value_command.value,
                    );
                    let ack = process_data::acknowledge(
                        value_command.element_number,
                        value_command.ddi,
                        if ok { 0x00 } else { 0x01 },
                        ProcessDataCommand::SetValueAndAcknowledge as u8,
                    );
                    self.queue_process_data(source, ack);
                }
            }
            ProcessDataCommand::Acknowledge => {
                if let Ok(value_command) = decode_value_command(data) {
                    server.on_process_data_acknowledge(
                        name,
                        value_command.ddi,
                        value_command.element_number,
                        data[4],
                        data[5] & 0x0F,
                    );
                }
            }
            ProcessDataCommand::ClientTask => {
                trace!("Client task keep-alive from {}", name);
            }
            other => trace!("Ignoring process data command {:?} from {}", other, name),
        }
    }

    fn handle_device_descriptor(
        &mut self,
        server: &mut TaskControllerServer,
        source: u8,
        name: IsoName,
        data: &[u8],
    ) {
        match sub_command(data) {
            descriptor::REQUEST_STRUCTURE_LABEL => {
                let label: [u8; 7] = data[1..8].try_into().unwrap_or([0xFF; 7]);
                let stored = server.pool_stored_by_structure_label(name, &label, &data[8..]);
                let reply_label = if stored { label } else { [0xFF; 7] };
                self.queue_process_data(
                    source,
                    process_data::label_reply(descriptor::STRUCTURE_LABEL_REPLY, &reply_label),
                );
            }
            descriptor::REQUEST_LOCALIZATION_LABEL => {
                let label: [u8; 7] = data[1..8].try_into().unwrap_or([0xFF; 7]);
                let stored = server.pool_stored_by_localization_label(name, &label);
                let reply_label = if stored { label } else { [0xFF; 7] };
                self.queue_process_data(
                    source,
                    process_data::label_reply(descriptor::LOCALIZATION_LABEL_REPLY, &reply_label),
                );
            }
            descriptor::REQUEST_OBJECT_POOL_TRANSFER => {
                let size = u32::from_le_bytes(data[1..5].try_into().unwrap_or([0; 4]));
                let accepted = server.enough_memory(size);
                if let Some(partner) = self.partners.get_mut(&source) {
                    partner.expect_fresh_pool = true;
                }
                debug!("Client {} announces a {} byte pool transfer", name, size);
                self.queue_process_data(
                    source,
                    process_data::pool_transfer_response(if accepted { 0x00 } else { 0x01 }),
                );
            }
            descriptor::OBJECT_POOL_TRANSFER => {
                let chunk = &data[1..];
                let append = self
                    .partners
                    .get(&source)
                    .is_some_and(|partner| !partner.expect_fresh_pool);
                server.store_pool(name, chunk, append);
                if let Some(partner) = self.partners.get_mut(&source) {
                    partner.expect_fresh_pool = false;
                }
                self.queue_process_data(
                    source,
                    process_data::object_pool_transfer_response(0x00, data.len() as u32),
                );
            }
            descriptor::OBJECT_POOL_ACTIVATE_DEACTIVATE => {
                let response = if data[1] == 0x00 {
                    server.deactivate_pool(name);
                    process_data::activate_response(0x00, 0xFFFF, 0xFFFF, 0x00)
                } else {
                    let result = server.activate_pool(name);
                    process_data::activate_response(
                        result.activation_error,
                        result.faulting_parent_object,
                        result.faulting_object,
                        result.pool_error,
                    )
                };
                self.queue_process_data(source, response);
            }
            descriptor::OBJECT_POOL_DELETE => {
                server.delete_pool(name);
                self.queue_process_data(source, process_data::delete_response(0x00));
            }
            descriptor::CHANGE_DESIGNATOR => {
                let object_id = u16::from_le_bytes(data[1..3].try_into().unwrap_or([0; 2]));
                server.change_designator(name, object_id, &data[3..]);
                self.queue_process_data(
                    source,
                    process_data::change_designator_response(object_id, 0x00),
                );
            }
            sub => trace!("Ignoring device descriptor sub-command {} from {}", sub, name),
        }
    }

    // --- Outbound helpers ---

    fn queue_frame(&mut self, priority: u8, pgn: u32, destination: u8, payload: &[u8]) {
        let id = CanId::new(priority, pgn, destination, self.config.preferred_address);
        match CanFrame::new(id, payload) {
            Ok(frame) => self.tx_queue.push_back(frame),
            Err(e) => error!("Failed to build frame for PGN {:#07X}: {}", pgn, e),
        }
    }

    fn queue_process_data(&mut self, destination: u8, payload: [u8; 8]) {
        self.queue_frame(PROCESS_DATA_PRIORITY, PGN_PROCESS_DATA, destination, &payload);
    }

    fn queue_address_claim(&mut self) {
        let name = self.config.name.to_le_bytes();
        self.queue_frame(
            ADDRESS_CLAIM_PRIORITY,
            PGN_ADDRESS_CLAIM,
            BROADCAST_ADDRESS,
            &name,
        );
    }

    fn queue_language_command(&mut self) {
        // Formats and units are reported as not available; AOG only cares
        // about the language and country codes.
        let payload = [
            self.config.language_code[0],
            self.config.language_code[1],
            0xFF,
            0xFF,
            0xFF,
            0xFF,
            self.config.country_code[0],
            self.config.country_code[1],
        ];
        self.queue_frame(PROCESS_DATA_PRIORITY, PGN_LANGUAGE_COMMAND, BROADCAST_ADDRESS, &payload);
    }
}
