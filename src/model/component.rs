//! Shared behaviour of every node in the component tree (§3.1, §4.2).
//!
//! The source model gives every component a child->parent back-reference so
//! that [`invalidate`](NodeBase::invalidate) can walk up to the root. Rust's
//! ownership rules make that reference awkward to keep (see the Design Notes
//! cyclic-graph hazard); instead `edited` is tracked purely locally and
//! [`Component::is_edited`] recurses *down* into children, which is
//! equivalent because the fixpoint loop (§4.4) already visits the tree
//! top-down on every iteration. The only genuine cross-tree references in
//! this model -- `Peripheral::inherit_from` and `MappingElement`'s target --
//! are resolved by name against the owning arena at merge/placement time,
//! matching the "index handles, not shared ownership" guidance.

use super::chipset::ChipSet;
use crate::error::{MergeError, Result};

/// Fields and bookkeeping common to every concrete component type.
#[derive(Clone, Debug)]
pub struct NodeBase {
    name: Option<String>,
    brief: Option<String>,
    chips: ChipSet,
    edited: bool,
    locked: bool,
}

impl NodeBase {
    /// Creates a node. `name`, if present, must be a C identifier; this is
    /// checked with a `debug_assert` since malformed names should already
    /// have been rejected by the ingest layer.
    pub fn new(name: Option<String>, brief: Option<String>, chips: ChipSet) -> Self {
        if let Some(name) = &name {
            debug_assert!(is_c_identifier(name), "component name `{name}` is not a C identifier");
        }
        let brief = brief.filter(|b| Some(b.as_str()) != name.as_deref()).map(|b| {
            b.split_whitespace().collect::<Vec<_>>().join(" ")
        });
        Self { name, brief, chips, edited: true, locked: false }
    }

    /// The component's name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Renames the component, marking it edited if the name actually changed.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.name.as_deref() != Some(name.as_str()) {
            debug_assert!(is_c_identifier(&name), "component name `{name}` is not a C identifier");
            self.name = Some(name);
            self.invalidate()?;
        }
        Ok(())
    }

    /// One-line documentation string, if any.
    pub fn brief(&self) -> Option<&str> {
        self.brief.as_deref()
    }

    /// Adopts `brief` if this node doesn't already carry one (absorb semantics, §4.3).
    pub fn adopt_brief(&mut self, brief: Option<&str>) {
        if self.brief.is_none() {
            self.brief = brief.map(ToOwned::to_owned);
        }
    }

    /// Forces `brief` outright, regardless of what this node already carries
    /// (the corrector `modify` primitive, as opposed to absorb's
    /// adopt-if-missing rule).
    pub fn set_brief(&mut self, brief: Option<String>) -> Result<()> {
        if self.brief != brief {
            self.brief = brief;
            self.invalidate()?;
        }
        Ok(())
    }

    /// The set of chips on which this component is valid.
    pub fn chips(&self) -> &ChipSet {
        &self.chips
    }

    /// Mutable access to the chipset; any caller that touches it is
    /// responsible for calling [`NodeBase::invalidate`] if the change is
    /// semantically meaningful (most callers go through
    /// [`NodeBase::union_chips`] instead).
    pub fn chips_mut(&mut self) -> &mut ChipSet {
        &mut self.chips
    }

    /// Unions `other` into this node's chipset and marks it edited if that
    /// actually grew the set.
    pub fn union_chips(&mut self, other: &ChipSet) -> Result<()> {
        if !self.chips.is_superset(other) {
            self.chips.union_in_place(other);
            self.invalidate()?;
        }
        Ok(())
    }

    /// Sets `edited = true`. Fails if the node is locked (§4.2,
    /// `LockedComponentError`).
    pub fn invalidate(&mut self) -> Result<()> {
        if self.locked {
            let alias = self.name.clone().unwrap_or_else(|| "<anonymous>".to_owned());
            tracing::error!(alias, "mutation attempted on locked component");
            return Err(MergeError::LockedComponent { alias });
        }
        self.edited = true;
        Ok(())
    }

    /// Clears the local edited flag. Callers recurse into children themselves.
    pub fn validate(&mut self) {
        self.edited = false;
    }

    /// Whether this node (not counting children) was edited since the last validate.
    pub fn is_edited(&self) -> bool {
        self.edited
    }

    /// Locks the node against further mutation; called once the printer
    /// phase starts (§4.2, §4.7).
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Whether the node has been finalisation-locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// `"<parent_alias>_<name>"`, or just one of the two if the other is absent (§4.1).
    pub fn alias(&self, parent_alias: Option<&str>) -> Option<String> {
        match (parent_alias, &self.name) {
            (Some(parent), Some(name)) => Some(format!("{parent}_{name}")),
            (Some(parent), None) => Some(parent.to_owned()),
            (None, name) => name.clone(),
        }
    }
}

/// Whether `s` is a valid (non-empty) C identifier.
pub fn is_c_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_fails_once_locked() {
        let mut node = NodeBase::new(Some("FOO".to_owned()), None, ChipSet::new());
        node.validate();
        node.lock();
        assert!(node.invalidate().is_err());
    }

    #[test]
    fn alias_combines_parent_and_name() {
        let node = NodeBase::new(Some("CR1".to_owned()), None, ChipSet::new());
        assert_eq!(node.alias(Some("GPIOA")), Some("GPIOA_CR1".to_owned()));
        assert_eq!(node.alias(None), Some("CR1".to_owned()));
    }

    #[test]
    fn brief_equal_to_name_is_dropped() {
        let node = NodeBase::new(Some("CR1".to_owned()), Some("CR1".to_owned()), ChipSet::new());
        assert_eq!(node.brief(), None);
    }
}
