use crate::types::IsoName;
use alloc::string::String;
use alloc::vec::Vec;

/// The kind of structural node a device element represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElementType {
    Device = 1,
    Function = 2,
    Bin = 3,
    Section = 4,
    Unit = 5,
    Connector = 6,
    NavigationReference = 7,
}

impl ElementType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ElementType::Device),
            2 => Some(ElementType::Function),
            3 => Some(ElementType::Bin),
            4 => Some(ElementType::Section),
            5 => Some(ElementType::Unit),
            6 => Some(ElementType::Connector),
            7 => Some(ElementType::NavigationReference),
            _ => None,
        }
    }
}

/// Trigger methods a process data object advertises for measurement
/// subscriptions, as a bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TriggerMethod {
    TimeInterval = 0x01,
    DistanceInterval = 0x02,
    ThresholdLimits = 0x04,
    OnChange = 0x08,
    Total = 0x10,
}

/// Root object of a pool ("DVC"): the device identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub object_id: u16,
    pub designator: String,
    pub software_version: String,
    pub name: IsoName,
    pub serial_number: String,
    pub structure_label: [u8; 7],
    pub localization_label: [u8; 7],
}

/// A structural node ("DET"): boom, section, bin, ... with its children.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceElement {
    pub object_id: u16,
    pub element_type: ElementType,
    pub designator: String,
    pub element_number: u16,
    pub parent_object: u16,
    pub child_objects: Vec<u16>,
}

/// A process data variable ("DPD") identified by its DDI.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProcessData {
    pub object_id: u16,
    pub ddi: u16,
    pub properties: u8,
    pub trigger_methods: u8,
    pub designator: String,
    pub presentation_object: u16,
}

impl DeviceProcessData {
    pub fn has_trigger_method(&self, method: TriggerMethod) -> bool {
        self.trigger_methods & method as u8 != 0
    }
}

/// A static property ("DPT"), e.g. a section offset or width.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProperty {
    pub object_id: u16,
    pub ddi: u16,
    pub value: i32,
    pub designator: String,
    pub presentation_object: u16,
}

/// Display scaling information ("DVP"). Parsed for completeness; the server
/// works with raw values.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceValuePresentation {
    pub object_id: u16,
    pub offset: i32,
    pub scale: f32,
    pub decimals: u8,
    pub designator: String,
}

/// Any object that can appear in a device descriptor pool.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceObject {
    Device(Device),
    Element(DeviceElement),
    ProcessData(DeviceProcessData),
    Property(DeviceProperty),
    ValuePresentation(DeviceValuePresentation),
}

impl DeviceObject {
    pub fn object_id(&self) -> u16 {
        match self {
            DeviceObject::Device(o) => o.object_id,
            DeviceObject::Element(o) => o.object_id,
            DeviceObject::ProcessData(o) => o.object_id,
            DeviceObject::Property(o) => o.object_id,
            DeviceObject::ValuePresentation(o) => o.object_id,
        }
    }
}
