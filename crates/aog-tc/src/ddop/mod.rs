//! Device Descriptor Object Pool (DDOP) handling.
//!
//! An implement describes itself to the task controller by uploading a
//! binary pool of device / element / process-data / property objects
//! (ISO 11783-10 Annex B). This module deserialises that pool and derives
//! the implement geometry (booms, sub-booms, sections) from it.

mod geometry;
mod object;
mod pool;
#[cfg(test)]
pub(crate) mod test_pool;

pub use geometry::{implement_geometry, Boom, Implement, SectionGeometry, SubBoom};
pub use object::{
    Device, DeviceElement, DeviceObject, DeviceProcessData, DeviceProperty,
    DeviceValuePresentation, ElementType, TriggerMethod,
};
pub use pool::DevicePool;
