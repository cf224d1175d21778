//! Concrete memory layout of a peripheral: [`MappingElement`]s grouped into
//! non-overlapping [`PeripheralMapping`]s (§3.1, §4.5).

use super::chipset::ChipSet;
use super::component::NodeBase;
use crate::error::Result;

/// What a [`MappingElement`] binds its name+address to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MappingTarget {
    /// A register defined directly on the owning peripheral, by name.
    Register(String),
    /// A sub-peripheral occurrence, by the peripheral's name.
    Peripheral(String),
}

impl MappingTarget {
    /// The referenced component's name, regardless of target kind.
    pub fn name(&self) -> &str {
        match self {
            MappingTarget::Register(name) | MappingTarget::Peripheral(name) => name,
        }
    }
}

/// Binds a name+address (optionally an array stride/count) to a register or
/// sub-peripheral (§3.1).
#[derive(Clone, Debug)]
pub struct MappingElement {
    base: NodeBase,
    address: u32,
    target: MappingTarget,
    target_size_bits: u32,
    array_size: u32,
    array_stride: u32,
}

impl MappingElement {
    /// Creates a scalar (non-array) mapping element.
    pub fn new(
        chips: ChipSet,
        name: impl Into<String>,
        brief: Option<String>,
        address: u32,
        target: MappingTarget,
        target_size_bits: u32,
    ) -> Self {
        Self {
            base: NodeBase::new(Some(name.into()), brief, chips),
            address,
            target,
            target_size_bits,
            array_size: 0,
            array_stride: 0,
        }
    }

    /// Shared node bookkeeping.
    pub fn base(&self) -> &NodeBase {
        &self.base
    }

    /// Mutable shared node bookkeeping.
    pub fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    /// The element's name.
    pub fn name(&self) -> &str {
        self.base.name().unwrap_or_default()
    }

    /// Byte address, relative to the enclosing peripheral's base address.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// What this element refers to.
    pub fn target(&self) -> &MappingTarget {
        &self.target
    }

    /// Array element count, or `0` for a scalar element.
    pub fn array_size(&self) -> u32 {
        self.array_size
    }

    /// Byte stride between array elements' starts minus the element's own
    /// byte size (i.e. the gap), or `0` for a scalar element.
    pub fn array_stride(&self) -> u32 {
        self.array_stride
    }

    /// The chips on which this element is valid.
    pub fn chips(&self) -> &ChipSet {
        self.base.chips()
    }

    /// Converts this element into an array of `array_size` occurrences
    /// spaced `array_stride` bytes apart on top of the target's own size
    /// (§4.5 `create_array_for_component`).
    pub fn make_array(&mut self, array_size: u32, array_stride: u32) -> Result<()> {
        self.array_size = array_size;
        self.array_stride = array_stride;
        self.base.invalidate()
    }

    /// Total byte size of this element: `component.size` for a scalar,
    /// or `array_size*(component.size + array_stride) - array_stride` for
    /// an array (§3.1).
    pub fn byte_size(&self) -> u32 {
        let component_bytes = self.target_size_bits.div_ceil(8);
        if self.array_size == 0 {
            component_bytes
        } else {
            self.array_size * (component_bytes + self.array_stride) - self.array_stride
        }
    }

    /// Retargets this element, used when a register it names is renamed
    /// during absorb's name-collision resolution (§4.3, §8.3 Scenario E).
    pub fn retarget(&mut self, target: MappingTarget) -> Result<()> {
        self.target = target;
        self.base.invalidate()
    }

    /// Locks this element against further mutation (§4.2, §4.7 Finalised state).
    pub fn lock(&mut self) {
        self.base.lock();
    }

    /// Whether `self` and `other`'s byte ranges intersect (§3.1).
    pub fn overlaps(&self, other: &MappingElement) -> bool {
        let (first, second) = if self.address <= other.address { (self, other) } else { (other, self) };
        first.address + first.byte_size() > second.address
    }
}

/// Two mapping elements are equal iff address, name, array shape and target
/// identity/size all match (§3.1, mirroring the source's `MappingElement.__eq__`).
impl PartialEq for MappingElement {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.name() == other.name()
            && self.array_size == other.array_size
            && self.array_stride == other.array_stride
            && self.target_size_bits == other.target_size_bits
            && self.target.name() == other.target.name()
    }
}

impl Eq for MappingElement {}

/// Ordering by `(address, name)`, used to keep mappings' elements sorted and
/// to give the printer a deterministic traversal order (§5 ordering guarantee).
impl PartialOrd for MappingElement {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MappingElement {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.address.cmp(&other.address).then_with(|| self.name().cmp(other.name()))
    }
}

/// One concrete, non-overlapping placement of a peripheral's registers and
/// sub-peripherals (§3.1).
#[derive(Clone, Debug, Default)]
pub struct PeripheralMapping {
    elements: Vec<MappingElement>,
}

impl PeripheralMapping {
    /// An empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// The mapping's elements, in ascending-address order (§5).
    pub fn elements(&self) -> &[MappingElement] {
        &self.elements
    }

    /// Mutable access to the elements.
    pub fn elements_mut(&mut self) -> &mut Vec<MappingElement> {
        &mut self.elements
    }

    /// Whether `element` overlaps any element already in this mapping.
    pub fn overlaps(&self, element: &MappingElement) -> bool {
        self.elements.iter().any(|e| e.overlaps(element))
    }

    /// Finds an existing element equal to `element`, if any.
    pub fn find_equal(&self, element: &MappingElement) -> Option<usize> {
        self.elements.iter().position(|e| e == element)
    }

    /// Inserts `element`, keeping the mapping sorted by address then name.
    pub fn insert_sorted(&mut self, element: MappingElement) {
        let index = self.elements.partition_point(|e| e < &element);
        self.elements.insert(index, element);
    }

    /// Whether every pair of elements sharing an address agrees on
    /// `(name, target)` (§3.1 "compatible").
    pub fn compatible_with(&self, other: &PeripheralMapping) -> bool {
        for a in &self.elements {
            for b in &other.elements {
                if a.address == b.address && (a.name() != b.name() || a.target.name() != b.target.name()) {
                    return false;
                }
            }
        }
        true
    }

    /// Locks every element of this mapping against further mutation.
    pub fn lock(&mut self) {
        for element in &mut self.elements {
            element.lock();
        }
    }

    /// Checks invariant 2 (§8.1): no two elements of this mapping overlap.
    /// Returns the `(name, name)` pairs of violating elements.
    pub fn check_overlap_invariant(&self) -> Vec<(String, String)> {
        let mut problems = Vec::new();
        for (i, a) in self.elements.iter().enumerate() {
            for b in &self.elements[i + 1..] {
                if a.overlaps(b) {
                    problems.push((a.name().to_owned(), b.name().to_owned()));
                }
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elem(name: &str, address: u32, size_bits: u32) -> MappingElement {
        MappingElement::new(
            ChipSet::new(),
            name,
            None,
            address,
            MappingTarget::Register(name.to_owned()),
            size_bits,
        )
    }

    #[test]
    fn overlap_detects_shared_bytes() {
        assert!(elem("A", 0, 32).overlaps(&elem("B", 2, 32)));
        assert!(!elem("A", 0, 32).overlaps(&elem("B", 4, 32)));
    }

    #[test]
    fn array_size_formula() {
        let mut e = elem("CH", 0x10, 32);
        e.make_array(4, 0).unwrap();
        assert_eq!(e.byte_size(), 16);
    }

    #[test]
    fn mapping_keeps_address_order() {
        let mut mapping = PeripheralMapping::new();
        mapping.insert_sorted(elem("B", 4, 32));
        mapping.insert_sorted(elem("A", 0, 32));
        let names: Vec<&str> = mapping.elements().iter().map(MappingElement::name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
