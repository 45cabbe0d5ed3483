use super::object::{DeviceElement, DeviceObject, ElementType};
use super::pool::DevicePool;
use crate::types::ddi;
use alloc::vec::Vec;

/// Physical layout of the implement as described by its pool: booms carrying
/// sections directly and/or through sub-booms.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Implement {
    pub booms: Vec<Boom>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boom {
    pub element_number: u16,
    pub sub_booms: Vec<SubBoom>,
    pub sections: Vec<SectionGeometry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubBoom {
    pub element_number: u16,
    pub sections: Vec<SectionGeometry>,
}

/// One section with its offsets relative to the device reference point.
/// Pools are not required to carry every property, hence the options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionGeometry {
    pub element_number: u16,
    pub x_offset_mm: Option<i32>,
    pub y_offset_mm: Option<i32>,
    pub z_offset_mm: Option<i32>,
    pub width_mm: Option<i32>,
}

impl Implement {
    /// Total number of sections across all booms and sub-booms.
    pub fn section_count(&self) -> usize {
        self.booms
            .iter()
            .map(|boom| {
                boom.sections.len()
                    + boom
                        .sub_booms
                        .iter()
                        .map(|sub| sub.sections.len())
                        .sum::<usize>()
            })
            .sum()
    }
}

/// Derives the implement geometry from a deserialised pool.
///
/// Booms are function elements parented to the device element, sub-booms
/// are function elements parented to a boom, and sections hang off either.
/// Sections parented straight to the device element are grouped under an
/// implicit boom carrying the device element's number.
pub fn implement_geometry(pool: &DevicePool) -> Implement {
    let mut implement = Implement::default();

    let device_element = match pool
        .elements()
        .find(|e| e.element_type == ElementType::Device)
    {
        Some(element) => element,
        None => return implement,
    };

    for boom_element in children_of_type(pool, device_element, ElementType::Function) {
        let mut boom = Boom {
            element_number: boom_element.element_number,
            sub_booms: Vec::new(),
            sections: Vec::new(),
        };
        for sub_element in children_of_type(pool, boom_element, ElementType::Function) {
            boom.sub_booms.push(SubBoom {
                element_number: sub_element.element_number,
                sections: sections_of(pool, sub_element),
            });
        }
        boom.sections = sections_of(pool, boom_element);
        implement.booms.push(boom);
    }

    // Some pools attach sections directly under the device element.
    let direct_sections = sections_of(pool, device_element);
    if !direct_sections.is_empty() {
        implement.booms.push(Boom {
            element_number: device_element.element_number,
            sub_booms: Vec::new(),
            sections: direct_sections,
        });
    }

    implement
}

fn children_of_type<'a>(
    pool: &'a DevicePool,
    parent: &'a DeviceElement,
    element_type: ElementType,
) -> impl Iterator<Item = &'a DeviceElement> {
    let parent_id = parent.object_id;
    pool.elements()
        .filter(move |e| e.parent_object == parent_id && e.element_type == element_type)
}

fn sections_of(pool: &DevicePool, parent: &DeviceElement) -> Vec<SectionGeometry> {
    children_of_type(pool, parent, ElementType::Section)
        .map(|section| {
            let mut geometry = SectionGeometry {
                element_number: section.element_number,
                x_offset_mm: None,
                y_offset_mm: None,
                z_offset_mm: None,
                width_mm: None,
            };
            for &child in &section.child_objects {
                if let Some(DeviceObject::Property(property)) = pool.object_by_id(child) {
                    match property.ddi {
                        ddi::DEVICE_ELEMENT_OFFSET_X => geometry.x_offset_mm = Some(property.value),
                        ddi::DEVICE_ELEMENT_OFFSET_Y => geometry.y_offset_mm = Some(property.value),
                        ddi::DEVICE_ELEMENT_OFFSET_Z => geometry.z_offset_mm = Some(property.value),
                        ddi::ACTUAL_WORKING_WIDTH => geometry.width_mm = Some(property.value),
                        _ => {}
                    }
                }
            }
            geometry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddop::test_pool::TestPoolBuilder;
    use crate::types::IsoName;

    fn sprayer_pool() -> DevicePool {
        // Device element 1 -> boom 10 -> sections 20/21, sub-boom 11 -> section 22
        let data = TestPoolBuilder::new()
            .device(0, "Sprayer", IsoName(1))
            .element(1, ElementType::Device, "Main", 0, 0xFFFF, &[])
            .element(10, ElementType::Function, "Boom", 5, 1, &[])
            .element(11, ElementType::Function, "SubBoom", 6, 10, &[])
            .element(20, ElementType::Section, "S1", 10, 10, &[40, 41])
            .element(21, ElementType::Section, "S2", 11, 10, &[])
            .element(22, ElementType::Section, "S3", 12, 11, &[])
            .property(40, crate::types::ddi::DEVICE_ELEMENT_OFFSET_X, -250, "ofsX")
            .property(41, crate::types::ddi::ACTUAL_WORKING_WIDTH, 3000, "width")
            .build();
        DevicePool::deserialize(&data).unwrap()
    }

    #[test]
    fn derives_booms_sub_booms_and_sections() {
        let implement = implement_geometry(&sprayer_pool());
        assert_eq!(implement.booms.len(), 1);
        let boom = &implement.booms[0];
        assert_eq!(boom.element_number, 5);
        assert_eq!(boom.sections.len(), 2);
        assert_eq!(boom.sub_booms.len(), 1);
        assert_eq!(boom.sub_booms[0].sections.len(), 1);
        assert_eq!(implement.section_count(), 3);
    }

    #[test]
    fn section_properties_are_picked_up() {
        let implement = implement_geometry(&sprayer_pool());
        let section = &implement.booms[0].sections[0];
        assert_eq!(section.element_number, 10);
        assert_eq!(section.x_offset_mm, Some(-250));
        assert_eq!(section.width_mm, Some(3000));
        assert_eq!(section.y_offset_mm, None);
    }

    #[test]
    fn sections_directly_under_device_form_implicit_boom() {
        let data = TestPoolBuilder::new()
            .device(0, "Seeder", IsoName(2))
            .element(1, ElementType::Device, "Main", 3, 0xFFFF, &[])
            .element(20, ElementType::Section, "S1", 10, 1, &[])
            .build();
        let pool = DevicePool::deserialize(&data).unwrap();
        let implement = implement_geometry(&pool);
        assert_eq!(implement.booms.len(), 1);
        assert_eq!(implement.booms[0].element_number, 3);
        assert_eq!(implement.section_count(), 1);
    }

    #[test]
    fn pool_without_device_element_yields_empty_geometry() {
        let data = TestPoolBuilder::new().device(0, "Bare", IsoName(3)).build();
        let pool = DevicePool::deserialize(&data).unwrap();
        assert_eq!(implement_geometry(&pool).section_count(), 0);
    }
}
