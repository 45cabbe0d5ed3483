//! Builder producing binary pool data for unit tests.

use super::object::ElementType;
use crate::types::IsoName;
use alloc::vec::Vec;

pub struct TestPoolBuilder {
    data: Vec<u8>,
}

impl TestPoolBuilder {
    pub fn new() -> Self {
        TestPoolBuilder { data: Vec::new() }
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
        ddi: u16,
        trigger_methods: u8,
        designator: &str,
    ) -> Self {
        self.data.extend_from_slice(b"DPD");
        self.data.extend_from_slice(&object_id.to_le_bytes());
        self.data.extend_from_slice(&ddi.to_le_bytes());
        self.data.push(0x01);
        self.data.push(trigger_methods);
        self.push_string(designator);
        self.data.extend_from_slice(&0xFFFFu16.to_le_bytes());
        self
    }

    pub fn property(mut self, object_id: u16, ddi: u16, value: i32, designator: &str) -> Self {
        self.data.extend_from_slice(b"DPT");
        self.data.extend_from_slice(&object_id.to_le_bytes());
        self.data.extend_from_slice(&ddi.to_le_bytes());
        self.data.extend_from_slice(&value.to_le_bytes());
        self.push_string(designator);
        self.data.extend_from_slice(&0xFFFFu16.to_le_bytes());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}
