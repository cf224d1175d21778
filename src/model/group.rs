//! A named collection of [`Peripheral`]s emitted as one output header (§3.1).

use super::chipset::ChipSet;
use super::component::NodeBase;
use super::peripheral::Peripheral;
use crate::error::Result;

/// One emitted C++ header's worth of peripherals.
#[derive(Clone, Debug)]
pub struct Group {
    base: NodeBase,
    peripherals: Vec<Peripheral>,
}

impl Group {
    /// Creates an empty group.
    pub fn new(chips: ChipSet, name: impl Into<String>) -> Self {
        Self { base: NodeBase::new(Some(name.into()), None, chips), peripherals: Vec::new() }
    }

    /// Shared node bookkeeping.
    pub fn base(&self) -> &NodeBase {
        &self.base
    }

    /// Mutable shared node bookkeeping.
    pub fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    /// The group's name; also the emitted header's file stem (`<GROUP>_struct.h`).
    pub fn name(&self) -> &str {
        self.base.name().unwrap_or_default()
    }

    /// The chips on which this group is valid.
    pub fn chips(&self) -> &ChipSet {
        self.base.chips()
    }

    /// The group's peripherals, in merge order (§5 ordering guarantee).
    pub fn peripherals(&self) -> &[Peripheral] {
        &self.peripherals
    }

    /// Mutable access to the group's peripherals.
    pub fn peripherals_mut(&mut self) -> &mut Vec<Peripheral> {
        &mut self.peripherals
    }

    /// Finds a peripheral by name.
    pub fn peripheral(&self, name: &str) -> Option<&Peripheral> {
        self.peripherals.iter().find(|p| p.name() == name)
    }

    /// Finds a peripheral by name, mutably.
    pub fn peripheral_mut(&mut self, name: &str) -> Option<&mut Peripheral> {
        self.peripherals.iter_mut().find(|p| p.name() == name)
    }

    /// Adds a peripheral that merges with an existing same-named one, or
    /// appends it outright (§4.3 `inter_svd_merge`). Peripherals are merged
    /// rather than deduplicated by full equality, since chips contribute
    /// different instances/mappings for the same logical peripheral.
    pub fn add_peripheral(&mut self, peripheral: Peripheral) -> Result<()> {
        self.base.union_chips(peripheral.chips())?;
        if let Some(existing) = self.peripheral_mut(peripheral.name()) {
            existing.absorb(&peripheral)?;
        } else {
            self.peripherals.push(peripheral);
            self.base.invalidate()?;
        }
        Ok(())
    }

    /// Locks this group and every peripheral it owns against further
    /// mutation (§4.2, §4.7 Finalised state). Called once the printer phase
    /// starts; nothing after this point may mutate the tree.
    pub fn lock(&mut self) {
        self.base.lock();
        for peripheral in &mut self.peripherals {
            peripheral.lock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_peripheral_merges_same_name() {
        let mut group = Group::new(ChipSet::new(), "GPIO");
        group.add_peripheral(Peripheral::new(ChipSet::new(), "GPIOA", None)).unwrap();
        group.add_peripheral(Peripheral::new(ChipSet::new(), "GPIOA", None)).unwrap();
        assert_eq!(group.peripherals().len(), 1);
    }

    #[test]
    fn add_peripheral_appends_distinct_names() {
        let mut group = Group::new(ChipSet::new(), "GPIO");
        group.add_peripheral(Peripheral::new(ChipSet::new(), "GPIOA", None)).unwrap();
        group.add_peripheral(Peripheral::new(ChipSet::new(), "GPIOB", None)).unwrap();
        assert_eq!(group.peripherals().len(), 2);
    }
}
