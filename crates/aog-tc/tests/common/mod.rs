//! Shared helpers: a simulated ISOBUS client and a binary pool builder.
#![allow(dead_code)] // not every test binary uses every helper

use aog_tc::can::{CanFrame, CanId, BROADCAST_ADDRESS, PGN_ADDRESS_CLAIM, PGN_PROCESS_DATA, PGN_TP_CM, PGN_TP_DT};
use aog_tc::ddop::ElementType;
use aog_tc::process_data::{descriptor, ProcessDataCommand};
use aog_tc::types::ddi;
use aog_tc::IsoName;

pub const CLIENT_ADDRESS: u8 = 0x85;
pub const CLIENT_NAME: IsoName = IsoName(0xA00A_2000_1CFF_0099);

/// Builds binary pool data object by object.
pub struct PoolBuilder {
    data: Vec<u8>,
}

impl PoolBuilder {
    pub fn new() -> Self {
        PoolBuilder { data: Vec::new() }
    }

    fn push_string(&mut self, s: &str) {
        self.data.push(s.len() as u8);
        self.data.extend_from_slice(s.as_bytes());
    }

    pub fn device(mut self, object_id: u16, designator: &str, name: IsoName) -> Self {
        self.data.extend_from_slice(b"DVC");
        self.data.extend_from_slice(&object_id.to_le_bytes());
        self.push_string(designator);
        self.push_string("1.0");
        self.data.extend_from_slice(&name.to_le_bytes());
        self.push_string("123");
        self.data.extend_from_slice(b"STRUCT0");
        self.data.extend_from_slice(b"en\xFF\xFF\xFF\xFF\xFF");
        self
    }

    pub fn element(
        mut self,
        object_id: u16,
        element_type: ElementType,
        designator: &str,
        element_number: u16,
        parent_object: u16,
        children: &[u16],
    ) -> Self {
        self.data.extend_from_slice(b"DET");
        self.data.extend_from_slice(&object_id.to_le_bytes());
        self.data.push(element_type as u8);
        self.push_string(designator);
        self.data.extend_from_slice(&element_number.to_le_bytes());
        self.data.extend_from_slice(&parent_object.to_le_bytes());
        self.data
            .extend_from_slice(&(children.len() as u16).to_le_bytes());
        for &child in children {
            self.data.extend_from_slice(&child.to_le_bytes());
        }
        self
    }

    pub fn process_data(
        mut self,
        object_id: u16,
        data_index: u16,
        trigger_methods: u8,
        designator: &str,
    ) -> Self {
        self.data.extend_from_slice(b"DPD");
        self.data.extend_from_slice(&object_id.to_le_bytes());
        self.data.extend_from_slice(&data_index.to_le_bytes());
        self.data.push(0x01);
        self.data.push(trigger_methods);
        self.push_string(designator);
        self.data.extend_from_slice(&0xFFFFu16.to_le_bytes());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// The canonical sprayer pool: one boom (element number 5) carrying
/// `sections` sections (element numbers 10, 11, ...) and the process data
/// objects this server binds to.
pub fn sprayer_pool(sections: u16) -> Vec<u8> {
    let mut builder = PoolBuilder::new()
        .device(0, "Sprayer", IsoName(0x0102))
        .element(1, ElementType::Device, "Main", 0, 0xFFFF, &[2, 3, 4])
        .process_data(2, ddi::ACTUAL_WORK_STATE, 0x09, "ActualWork")
        .process_data(3, ddi::SETPOINT_WORK_STATE, 0x08, "SetpointWork")
        .process_data(4, ddi::SECTION_CONTROL_STATE, 0x08, "SectionControl")
        .element(5, ElementType::Function, "Boom", 5, 1, &[6, 7, 8])
        .process_data(6, ddi::ACTUAL_CONDENSED_WORK_STATE_1_16, 0x08, "ActCond1")
        .process_data(7, ddi::SETPOINT_CONDENSED_WORK_STATE_1_16, 0x08, "SetCond1")
        .process_data(
            8,
            ddi::SETPOINT_CONDENSED_WORK_STATE_1_16 + 1,
            0x08,
            "SetCond2",
        );
    for i in 0..sections {
        builder = builder.element(100 + i, ElementType::Section, "S", 10 + i, 5, &[]);
    }
    builder.build()
}

/// A simulated implement ECU on the bus.
pub struct ClientSim {
    pub address: u8,
    pub name: IsoName,
}

impl ClientSim {
    pub fn new() -> Self {
        ClientSim {
            address: CLIENT_ADDRESS,
            name: CLIENT_NAME,
        }
    }

    pub fn address_claim(&self) -> CanFrame {
        let id = CanId::new(6, PGN_ADDRESS_CLAIM, BROADCAST_ADDRESS, self.address);
        CanFrame::new(id, &self.name.to_le_bytes()).unwrap()
    }

    pub fn process_data(&self, tc_address: u8, payload: &[u8; 8]) -> CanFrame {
        let id = CanId::new(5, PGN_PROCESS_DATA, tc_address, self.address);
        CanFrame::new(id, payload).unwrap()
    }

    /// Set value command from the implement to the TC.
    pub fn value_command(
        &self,
        tc_address: u8,
        data_index: u16,
        element_number: u16,
        value: i32,
    ) -> CanFrame {
        let mut payload = [0u8; 8];
        payload[0] =
            ProcessDataCommand::Value as u8 | (((element_number & 0x0F) as u8) << 4);
        payload[1] = (element_number >> 4) as u8;
        payload[2..4].copy_from_slice(&data_index.to_le_bytes());
        payload[4..8].copy_from_slice(&value.to_le_bytes());
        self.process_data(tc_address, &payload)
    }

    pub fn request_pool_transfer(&self, tc_address: u8, total_size: u32) -> CanFrame {
        let mut payload = [0xFFu8; 8];
        payload[0] = ProcessDataCommand::DeviceDescriptor as u8
            | (descriptor::REQUEST_OBJECT_POOL_TRANSFER << 4);
        payload[1..5].copy_from_slice(&total_size.to_le_bytes());
        self.process_data(tc_address, &payload)
    }

    /// An object pool transfer carried over the transport protocol:
    /// one RTS followed by the data packets.
    pub fn pool_transfer_frames(&self, tc_address: u8, pool_chunk: &[u8]) -> Vec<CanFrame> {
        let mut message = Vec::with_capacity(1 + pool_chunk.len());
        message.push(
            ProcessDataCommand::DeviceDescriptor as u8 | (descriptor::OBJECT_POOL_TRANSFER << 4),
        );
        message.extend_from_slice(pool_chunk);

        let total_packets = message.len().div_ceil(7) as u8;
        let size = message.len() as u16;
        let mut frames = Vec::new();

        let rts = [
            16,
            size.to_le_bytes()[0],
            size.to_le_bytes()[1],
            total_packets,
            0xFF,
            (PGN_PROCESS_DATA & 0xFF) as u8,
            ((PGN_PROCESS_DATA >> 8) & 0xFF) as u8,
            ((PGN_PROCESS_DATA >> 16) & 0xFF) as u8,
        ];
        let cm_id = CanId::new(7, PGN_TP_CM, tc_address, self.address);
        frames.push(CanFrame::new(cm_id, &rts).unwrap());

        for (index, chunk) in message.chunks(7).enumerate() {
            let mut payload = [0xFFu8; 8];
            payload[0] = index as u8 + 1;
            payload[1..1 + chunk.len()].copy_from_slice(chunk);
            let dt_id = CanId::new(7, PGN_TP_DT, tc_address, self.address);
            frames.push(CanFrame::new(dt_id, &payload).unwrap());
        }
        frames
    }

    pub fn activate_pool(&self, tc_address: u8) -> CanFrame {
        let mut payload = [0xFFu8; 8];
        payload[0] = ProcessDataCommand::DeviceDescriptor as u8
            | (descriptor::OBJECT_POOL_ACTIVATE_DEACTIVATE << 4);
        payload[1] = 0xFF;
        self.process_data(tc_address, &payload)
    }
}
