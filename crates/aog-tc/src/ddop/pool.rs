use super::object::{
    Device, DeviceElement, DeviceObject, DeviceProcessData, DeviceProperty,
    DeviceValuePresentation, ElementType,
};
use crate::hal::TcError;
use crate::types::IsoName;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use log::{debug, trace};

/// A deserialised device descriptor object pool.
pub struct DevicePool {
    objects: Vec<DeviceObject>,
    by_id: BTreeMap<u16, usize>,
}

/// Sequential reader over the binary pool data.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], TcError> {
        if self.remaining() < count {
            return Err(TcError::TruncatedPool);
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, TcError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, TcError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into()?))
    }

    fn read_i32(&mut self) -> Result<i32, TcError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into()?))
    }

    fn read_f32(&mut self) -> Result<f32, TcError> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into()?))
    }

    /// Reads a length-prefixed designator string.
    fn read_string(&mut self) -> Result<String, TcError> {
        let len = self.read_u8()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

impl DevicePool {
    /// Deserialises a complete binary pool. Clients may upload the pool in
    /// several fragments; the caller concatenates them before parsing.
    pub fn deserialize(data: &[u8]) -> Result<Self, TcError> {
        let mut reader = Reader::new(data);
        let mut objects = Vec::new();
        let mut by_id = BTreeMap::new();

        while reader.remaining() > 0 {
            let table: [u8; 3] = reader.take(3)?.try_into()?;
            let object = match &table {
                b"DVC" => DeviceObject::Device(Self::parse_device(&mut reader)?),
                b"DET" => DeviceObject::Element(Self::parse_element(&mut reader)?),
                b"DPD" => DeviceObject::ProcessData(Self::parse_process_data(&mut reader)?),
                b"DPT" => DeviceObject::Property(Self::parse_property(&mut reader)?),
                b"DVP" => {
                    DeviceObject::ValuePresentation(Self::parse_value_presentation(&mut reader)?)
                }
                _ => return Err(TcError::UnknownObjectType(table)),
            };
            trace!("Parsed pool object id {} ({:?})", object.object_id(), table);
            by_id.insert(object.object_id(), objects.len());
            objects.push(object);
        }

        let device_count = objects
            .iter()
            .filter(|o| matches!(o, DeviceObject::Device(_)))
            .count();
        if device_count != 1 {
            return Err(TcError::MalformedPool("expected exactly one DVC object"));
        }

        debug!("Deserialized device descriptor pool with {} objects", objects.len());
        Ok(DevicePool { objects, by_id })
    }

    fn parse_device(reader: &mut Reader) -> Result<Device, TcError> {
        Ok(Device {
            object_id: reader.read_u16()?,
            designator: reader.read_string()?,
            software_version: reader.read_string()?,
            name: IsoName::from_le_bytes(reader.take(8)?.try_into()?),
            serial_number: reader.read_string()?,
            structure_label: reader.take(7)?.try_into()?,
            localization_label: reader.take(7)?.try_into()?,
        })
    }

    fn parse_element(reader: &mut Reader) -> Result<DeviceElement, TcError> {
        let object_id = reader.read_u16()?;
        let raw_type = reader.read_u8()?;
        let element_type =
            ElementType::from_u8(raw_type).ok_or(TcError::InvalidElementType(raw_type))?;
        let designator = reader.read_string()?;
        let element_number = reader.read_u16()?;
        let parent_object = reader.read_u16()?;
        let child_count = reader.read_u16()?;
        let mut child_objects = Vec::with_capacity(child_count as usize);
        for _ in 0..child_count {
            child_objects.push(reader.read_u16()?);
        }
        Ok(DeviceElement {
            object_id,
            element_type,
            designator,
            element_number,
            parent_object,
            child_objects,
        })
    }

    fn parse_process_data(reader: &mut Reader) -> Result<DeviceProcessData, TcError> {
        Ok(DeviceProcessData {
            object_id: reader.read_u16()?,
            ddi: reader.read_u16()?,
            properties: reader.read_u8()?,
            trigger_methods: reader.read_u8()?,
            designator: reader.read_string()?,
            presentation_object: reader.read_u16()?,
        })
    }

    fn parse_property(reader: &mut Reader) -> Result<DeviceProperty, TcError> {
        Ok(DeviceProperty {
            object_id: reader.read_u16()?,
            ddi: reader.read_u16()?,
            value: reader.read_i32()?,
            designator: reader.read_string()?,
            presentation_object: reader.read_u16()?,
        })
    }

    fn parse_value_presentation(reader: &mut Reader) -> Result<DeviceValuePresentation, TcError> {
        Ok(DeviceValuePresentation {
            object_id: reader.read_u16()?,
            offset: reader.read_i32()?,
            scale: reader.read_f32()?,
            decimals: reader.read_u8()?,
            designator: reader.read_string()?,
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> impl Iterator<Item = &DeviceObject> {
        self.objects.iter()
    }

    pub fn object_by_id(&self, object_id: u16) -> Option<&DeviceObject> {
        self.by_id.get(&object_id).map(|&i| &self.objects[i])
    }

    /// The device (DVC) object. Guaranteed present after `deserialize`.
    pub fn device(&self) -> Option<&Device> {
        self.objects.iter().find_map(|o| match o {
            DeviceObject::Device(d) => Some(d),
            _ => None,
        })
    }

    pub fn elements(&self) -> impl Iterator<Item = &DeviceElement> {
        self.objects.iter().filter_map(|o| match o {
            DeviceObject::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn process_data(&self) -> impl Iterator<Item = &DeviceProcessData> {
        self.objects.iter().filter_map(|o| match o {
            DeviceObject::ProcessData(p) => Some(p),
            _ => None,
        })
    }

    /// Builds the element-number index for process data objects: for every
    /// DPD referenced by a device element's child list, maps the DPD's DDI
    /// to the parent element's number. One walk over the pool.
    pub fn ddi_to_element_index(&self) -> BTreeMap<u16, u16> {
        let mut object_to_element: BTreeMap<u16, u16> = BTreeMap::new();
        for element in self.elements() {
            for &child in &element.child_objects {
                object_to_element.insert(child, element.element_number);
            }
        }

        let mut index = BTreeMap::new();
        for pd in self.process_data() {
            if let Some(&element_number) = object_to_element.get(&pd.object_id) {
                index.insert(pd.ddi, element_number);
            }
        }
        index
    }
}
