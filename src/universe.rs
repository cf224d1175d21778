//! A threadable alternative to [`ChipSet::reference`](crate::model::ChipSet)'s
//! process-wide singleton (§9 Design Notes, SPEC_FULL §5 expansion).
//!
//! The source model keeps one global reference `ChipSet` that every guard
//! expression is printed against. A thread-local singleton is convenient but
//! makes it impossible to run two isolated engines (e.g. two tests, or two
//! families in the same process) without one polluting the other. A
//! [`ChipUniverse`] is a small value callers can construct explicitly and
//! thread through ingest and merge instead; [`ChipUniverse::ambient`] is
//! still provided for callers that want the old singleton behaviour.

use crate::model::{Chip, ChipSet};
use std::cell::RefCell;
use std::rc::Rc;

/// An explicit, non-singleton home for the reference chipset that guard
/// expressions (§4.1) are printed relative to.
#[derive(Clone, Debug)]
pub struct ChipUniverse {
    reference: Rc<RefCell<ChipSet>>,
}

impl ChipUniverse {
    /// Creates a fresh, empty universe, independent of any other instance
    /// and of the process-wide singleton.
    pub fn new() -> Self {
        Self { reference: Rc::new(RefCell::new(ChipSet::new())) }
    }

    /// A universe backed by the process-wide ambient singleton
    /// ([`ChipSet::reference`]), for callers that want one engine per
    /// process and don't need test isolation.
    pub fn ambient() -> Self {
        Self { reference: ChipSet::reference() }
    }

    /// Registers `chip` into this universe's reference set.
    pub fn observe_chip(&self, chip: Chip) {
        self.reference.borrow_mut().add_chip(chip);
    }

    /// Registers every chip of `chips` into this universe's reference set.
    pub fn observe(&self, chips: &ChipSet) {
        self.reference.borrow_mut().union_in_place(chips);
    }

    /// A snapshot of the current reference chipset.
    pub fn reference(&self) -> ChipSet {
        self.reference.borrow().clone()
    }

    /// Prints `chips`'s guard expression relative to this universe's
    /// reference set (§4.1).
    pub fn defined_list(&self, chips: &ChipSet, chips_per_line: usize, prefix: &str) -> String {
        chips.defined_list(chips_per_line, &self.reference.borrow(), prefix)
    }
}

impl Default for ChipUniverse {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_universes_do_not_share_reference() {
        let a = ChipUniverse::new();
        let b = ChipUniverse::new();
        a.observe_chip(Chip::new("STM32F401xE", "f401.h", "f401.svd"));
        assert_eq!(a.reference().len(), 1);
        assert_eq!(b.reference().len(), 0);
    }
}
