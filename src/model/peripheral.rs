//! Registers, alternative memory layouts and chip-visible occurrences of one
//! peripheral (§3.1, §4.5).

use super::chipset::ChipSet;
use super::component::NodeBase;
use super::mapping::{MappingElement, MappingTarget, PeripheralMapping};
use super::register::Register;
use crate::error::{MergeError, Result};

/// A named, addressed occurrence of a peripheral on some chips (§3.1).
#[derive(Clone, Debug)]
pub struct PeripheralInstance {
    base: NodeBase,
    base_address: u32,
}

impl PeripheralInstance {
    /// Creates an instance at `base_address`.
    pub fn new(chips: ChipSet, name: impl Into<String>, base_address: u32) -> Self {
        Self { base: NodeBase::new(Some(name.into()), None, chips), base_address }
    }

    /// Shared node bookkeeping.
    pub fn base(&self) -> &NodeBase {
        &self.base
    }

    /// Mutable shared node bookkeeping.
    pub fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    /// The instance's chip-visible name (e.g. `USART1`).
    pub fn name(&self) -> &str {
        self.base.name().unwrap_or_default()
    }

    /// Base address in the chip's memory map.
    pub fn base_address(&self) -> u32 {
        self.base_address
    }

    /// The chips on which this instance exists.
    pub fn chips(&self) -> &ChipSet {
        self.base.chips()
    }

    /// Locks this instance against further mutation (§4.2, §4.7 Finalised state).
    pub fn lock(&mut self) {
        self.base.lock();
    }
}

/// Registers, alternative mappings, chip-visible instances and optional
/// single inheritance, all under one peripheral name (§3.1).
#[derive(Clone, Debug)]
pub struct Peripheral {
    base: NodeBase,
    registers: Vec<Register>,
    mappings: Vec<PeripheralMapping>,
    instances: Vec<PeripheralInstance>,
    inherit_from: Option<String>,
}

impl Peripheral {
    /// Creates an empty peripheral.
    pub fn new(chips: ChipSet, name: impl Into<String>, brief: Option<String>) -> Self {
        Self {
            base: NodeBase::new(Some(name.into()), brief, chips),
            registers: Vec::new(),
            mappings: Vec::new(),
            instances: Vec::new(),
            inherit_from: None,
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

    /// The peripheral's name.
    pub fn name(&self) -> &str {
        self.base.name().unwrap_or_default()
    }

    /// The chips on which this peripheral is valid.
    pub fn chips(&self) -> &ChipSet {
        self.base.chips()
    }

    /// Register definitions, in declaration order.
    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    /// Mutable access to register definitions.
    pub fn registers_mut(&mut self) -> &mut Vec<Register> {
        &mut self.registers
    }

    /// Finds a register definition by name.
    pub fn register(&self, name: &str) -> Option<&Register> {
        self.registers.iter().find(|r| r.name() == name)
    }

    /// Finds a register definition by name, mutably.
    pub fn register_mut(&mut self, name: &str) -> Option<&mut Register> {
        self.registers.iter_mut().find(|r| r.name() == name)
    }

    /// Adds a register definition.
    pub fn add_register(&mut self, register: Register) -> Result<()> {
        self.base.union_chips(register.chips())?;
        self.base.invalidate()?;
        self.registers.push(register);
        Ok(())
    }

    /// Alternative memory layouts of this peripheral.
    pub fn mappings(&self) -> &[PeripheralMapping] {
        &self.mappings
    }

    /// Mutable access to the alternative memory layouts.
    pub fn mappings_mut(&mut self) -> &mut Vec<PeripheralMapping> {
        &mut self.mappings
    }

    /// Chip-visible occurrences of this peripheral.
    pub fn instances(&self) -> &[PeripheralInstance] {
        &self.instances
    }

    /// Adds a chip-visible instance.
    pub fn add_instance(&mut self, instance: PeripheralInstance) -> Result<()> {
        self.base.union_chips(instance.chips())?;
        self.base.invalidate()?;
        self.instances.push(instance);
        Ok(())
    }

    /// The name of the peripheral this one inherits register definitions
    /// from, if any (resolved against the owning [`Group`](super::group::Group)).
    pub fn inherit_from(&self) -> Option<&str> {
        self.inherit_from.as_deref()
    }

    /// Sets the single-inheritance parent.
    pub fn set_inherit_from(&mut self, name: Option<String>) -> Result<()> {
        self.inherit_from = name;
        self.base.invalidate()
    }

    /// Places `element` into this peripheral's mappings, following the
    /// placement algebra (§4.5):
    ///
    /// 1. resolve `element.target` to an existing register with the same
    ///    name (the caller is expected to have already constructed the
    ///    element against a name that exists on this peripheral);
    /// 2. find the first mapping `element` doesn't overlap; if an equal
    ///    element already sits there, union chipsets instead of inserting;
    /// 3. otherwise open a new mapping.
    pub fn place_element(&mut self, element: MappingElement) -> Result<()> {
        if let MappingTarget::Register(name) = element.target() {
            if self.register(name).is_none() {
                return Err(MergeError::Parse {
                    path: self.name().to_owned(),
                    source: eyre::eyre!(
                        "mapping element `{}` references unknown register `{name}`",
                        element.name()
                    ),
                });
            }
        }

        for mapping in &mut self.mappings {
            if let Some(index) = mapping.find_equal(&element) {
                mapping.elements_mut()[index].base_mut().union_chips(element.chips())?;
                self.base.invalidate()?;
                return Ok(());
            }
            if !mapping.overlaps(&element) {
                mapping.insert_sorted(element);
                self.base.invalidate()?;
                return Ok(());
            }
        }

        let mut mapping = PeripheralMapping::new();
        mapping.insert_sorted(element);
        self.mappings.push(mapping);
        self.base.invalidate()
    }

    /// Collapses pairwise-compatible mappings into one (§4.5): two mappings
    /// are compatible iff their element sets, restricted to shared
    /// addresses, agree on `(name, target)`. Runs until no further pair
    /// collapses.
    pub fn collapse_compatible_mappings(&mut self) -> Result<()> {
        let mut i = 0;
        while i < self.mappings.len() {
            let mut j = i + 1;
            let mut merged_any = false;
            while j < self.mappings.len() {
                if self.mappings[i].compatible_with(&self.mappings[j]) {
                    let other = self.mappings.remove(j);
                    let target = &mut self.mappings[i];
                    for element in other.elements().iter().cloned() {
                        if let Some(index) = target.find_equal(&element) {
                            target.elements_mut()[index].base_mut().union_chips(element.chips())?;
                        } else {
                            target.insert_sorted(element);
                        }
                    }
                    merged_any = true;
                } else {
                    j += 1;
                }
            }
            if merged_any {
                self.base.invalidate()?;
            } else {
                i += 1;
            }
        }
        Ok(())
    }

    /// Array inference (§4.5 `create_array_for_component`): within
    /// `mapping_index`, finds all elements targeting `target_name` at
    /// strides forming an arithmetic progression `a, a+s, a+2s, ...`, unions
    /// their chipsets, and replaces them with a single array element named
    /// `name`. Elements that break the progression are left untouched.
    /// Returns `true` if an array was created.
    pub fn create_array_for_component(
        &mut self,
        mapping_index: usize,
        target_name: &str,
        name: &str,
    ) -> Result<bool> {
        let target_size_bits = match self.register(target_name) {
            Some(register) => register.size(),
            None => return Ok(false),
        };
        let Some(mapping) = self.mappings.get_mut(mapping_index) else { return Ok(false) };

        let mut candidates: Vec<usize> = mapping
            .elements()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.target().name() == target_name && e.array_size() == 0)
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by_key(|&i| mapping.elements()[i].address());
        if candidates.len() < 2 {
            return Ok(false);
        }

        let component_bytes = target_size_bits.div_ceil(8);
        let base_address = mapping.elements()[candidates[0]].address();
        let stride = mapping.elements()[candidates[1]].address() - base_address;
        if stride < component_bytes {
            return Ok(false);
        }
        let array_stride = stride - component_bytes;

        let mut run = vec![candidates[0]];
        for &index in &candidates[1..] {
            let expected = base_address + (run.len() as u32) * stride;
            if mapping.elements()[index].address() == expected {
                run.push(index);
            } else {
                break;
            }
        }
        if run.len() < 2 {
            return Ok(false);
        }

        let mut chips = ChipSet::new();
        for &index in &run {
            chips.union_in_place(mapping.elements()[index].chips());
        }
        let mut array_element = MappingElement::new(
            chips,
            name,
            None,
            base_address,
            MappingTarget::Register(target_name.to_owned()),
            target_size_bits,
        );
        array_element.make_array(run.len() as u32, array_stride)?;

        let run_set: std::collections::HashSet<usize> = run.into_iter().collect();
        let remaining: Vec<MappingElement> = mapping
            .elements()
            .iter()
            .enumerate()
            .filter(|(i, _)| !run_set.contains(i))
            .map(|(_, e)| e.clone())
            .collect();
        *mapping.elements_mut() = remaining;
        mapping.insert_sorted(array_element);
        self.base.invalidate()?;
        Ok(true)
    }

    /// Absorbs `other` into `self` (§4.3 `intra_svd_merge`/`inter_svd_merge`):
    /// union of chipsets, register-set absorb, and appended instances and
    /// mappings (placed through the normal placement algebra so overlaps are
    /// still rejected cleanly).
    pub fn absorb(&mut self, other: &Peripheral) -> Result<()> {
        self.base.adopt_brief(other.base.brief());
        self.base.union_chips(other.chips())?;

        for other_register in &other.registers {
            if let Some(self_register) = self.registers.iter_mut().find(|r| *r == other_register) {
                self_register.absorb(other_register)?;
            } else {
                self.registers.push(other_register.clone());
                self.base.invalidate()?;
            }
        }

        for instance in &other.instances {
            if let Some(existing) = self.instances.iter_mut().find(|i| i.name() == instance.name()) {
                existing.base_mut().union_chips(instance.chips())?;
            } else {
                self.instances.push(instance.clone());
                self.base.invalidate()?;
            }
        }

        for mapping in &other.mappings {
            for element in mapping.elements() {
                self.place_element(element.clone())?;
            }
        }

        Ok(())
    }

    /// Folds any two registers that have become field-for-field equal (most
    /// often because a corrector just renamed one into collision with
    /// another) into a single register, computing its name via
    /// [`Register::merge_names`] and propagating the rename to every mapping
    /// element that referenced either original name (§4.3 `merge_children`,
    /// §8.3 Scenario E). Returns [`MergeError::UnresolvableRename`] if two
    /// equal registers have shapes `merge_names` can't reconcile, or if every
    /// slot in the `x -> y -> z -> n` substitution chain is already taken by
    /// an unrelated register.
    pub fn merge_equal_registers(&mut self) -> Result<()> {
        let mut i = 0;
        while i < self.registers.len() {
            let mut merged_here = false;
            let mut j = i + 1;
            while j < self.registers.len() {
                if self.registers[i] != self.registers[j] {
                    j += 1;
                    continue;
                }
                let name_a = self.registers[i].name().to_owned();
                let name_b = self.registers[j].name().to_owned();
                let merged_name = if name_a == name_b {
                    name_a.clone()
                } else {
                    Register::merge_names(&name_a, &name_b).ok_or_else(|| {
                        MergeError::UnresolvableRename { name_a: name_a.clone(), name_b: name_b.clone() }
                    })?
                };
                let final_name = self
                    .resolve_name_collision(&merged_name, &[name_a.clone(), name_b.clone()])
                    .ok_or_else(|| MergeError::UnresolvableRename {
                        name_a: name_a.clone(),
                        name_b: name_b.clone(),
                    })?;

                let other = self.registers.remove(j);
                self.registers[i].absorb(&other)?;
                if self.registers[i].name() != final_name {
                    self.registers[i].set_name(final_name.clone())?;
                }
                self.rename_mapping_target(&name_a, &final_name)?;
                self.rename_mapping_target(&name_b, &final_name)?;
                self.base.invalidate()?;
                merged_here = true;
            }
            if !merged_here {
                i += 1;
            }
        }
        Ok(())
    }

    /// Tries `candidate` as a register name, and on collision with a register
    /// other than `excluded`, substitutes its `x` filler character for `y`,
    /// then `z`, then `n` in turn (§9 Open Question, `x -> y -> z -> n`).
    fn resolve_name_collision(&self, candidate: &str, excluded: &[String]) -> Option<String> {
        for replacement in ['x', 'y', 'z', 'n'] {
            let name = candidate.replacen('x', &replacement.to_string(), 1);
            let taken =
                self.registers.iter().any(|r| r.name() == name && !excluded.contains(&r.name().to_owned()));
            if !taken {
                return Some(name);
            }
        }
        None
    }

    /// Retargets every mapping element naming register `old` (by target or
    /// by its own display name) to `new`, following a register rename.
    fn rename_mapping_target(&mut self, old: &str, new: &str) -> Result<()> {
        for mapping in &mut self.mappings {
            for element in mapping.elements_mut() {
                if element.target().name() == old {
                    element.retarget(MappingTarget::Register(new.to_owned()))?;
                }
                if element.name() == old {
                    element.base_mut().set_name(new)?;
                }
            }
        }
        Ok(())
    }

    /// Locks this peripheral and everything it owns -- registers, fields,
    /// mappings and instances -- against further mutation (§4.2, §4.7
    /// Finalised state). Called once the printer phase starts.
    pub fn lock(&mut self) {
        self.base.lock();
        for register in &mut self.registers {
            register.lock();
        }
        for mapping in &mut self.mappings {
            mapping.lock();
        }
        for instance in &mut self.instances {
            instance.lock();
        }
    }

    /// The flattened set of every element across every mapping, used by
    /// peripheral equality (§3.1).
    fn flattened_elements(&self) -> Vec<&MappingElement> {
        self.mappings.iter().flat_map(PeripheralMapping::elements).collect()
    }
}

/// Two peripherals are equal iff their names match and their flattened sets
/// of mapping elements are equal (§3.1).
impl PartialEq for Peripheral {
    fn eq(&self, other: &Self) -> bool {
        if self.name() != other.name() {
            return false;
        }
        let (a, b) = (self.flattened_elements(), other.flattened_elements());
        a.len() == b.len() && a.iter().all(|e| b.contains(e)) && b.iter().all(|e| a.contains(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::access::Access;

    fn register(name: &str, size: u32) -> Register {
        Register::new(ChipSet::new(), name, None, size, Access::ReadWrite)
    }

    fn elem(name: &str, address: u32) -> MappingElement {
        MappingElement::new(ChipSet::new(), name, None, address, MappingTarget::Register(name.to_owned()), 32)
    }

    // Scenario D (§8.3): CH0@0x10, CH1@0x14, CH2@0x18, CH3@0x1C all referring
    // to the same 32-bit register CHn collapse into one array element.
    #[test]
    fn array_inference_scenario_d() {
        let mut p = Peripheral::new(ChipSet::new(), "DMA", None);
        p.add_register(register("CHn", 32)).unwrap();
        for (name, addr) in [("CH0", 0x10), ("CH1", 0x14), ("CH2", 0x18), ("CH3", 0x1C)] {
            let mut e = elem(name, addr);
            e.base_mut().set_name("CHn").unwrap();
            p.place_element(MappingElement::new(
                ChipSet::new(),
                name,
                None,
                addr,
                MappingTarget::Register("CHn".to_owned()),
                32,
            ))
            .unwrap();
        }
        let created = p.create_array_for_component(0, "CHn", "CH").unwrap();
        assert!(created);
        assert_eq!(p.mappings()[0].elements().len(), 1);
        let array = &p.mappings()[0].elements()[0];
        assert_eq!(array.array_size(), 4);
        assert_eq!(array.array_stride(), 0);
        assert_eq!(array.address(), 0x10);
    }

    #[test]
    fn placement_rejects_overlap_into_same_mapping_but_opens_new_one() {
        let mut p = Peripheral::new(ChipSet::new(), "TIM", None);
        p.add_register(register("CR1", 32)).unwrap();
        p.add_register(register("CR2", 32)).unwrap();
        p.place_element(MappingElement::new(
            ChipSet::new(),
            "CR1",
            None,
            0x0,
            MappingTarget::Register("CR1".to_owned()),
            32,
        ))
        .unwrap();
        // Overlapping element referring to a different register: must open
        // a second mapping rather than colliding with the first.
        p.place_element(MappingElement::new(
            ChipSet::new(),
            "CR2",
            None,
            0x0,
            MappingTarget::Register("CR2".to_owned()),
            32,
        ))
        .unwrap();
        assert_eq!(p.mappings().len(), 2);
    }
}
