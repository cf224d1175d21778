//! Corrector DSL and fixpoint loop (§4.4): a glob-pattern-indexed tree of
//! rewrite actions, applied top-down and re-applied to any component an
//! action invalidates until the tree stabilises or the iteration cap is hit.

use std::rc::Rc;

use crate::error::{MergeError, Result};
use crate::model::component::NodeBase;
use crate::model::field::Field;
use crate::model::group::Group;
use crate::model::peripheral::Peripheral;
use crate::model::register::Register;

/// A component a [`Corrector`] can be matched against and applied to.
///
/// Implemented by every node the fixpoint loop walks (§4.4): a peripheral's
/// children are its registers, a register's children are its fields, and a
/// field has none. The loop is generic over this trait rather than the
/// concrete tree so one corrector definition can reach down from a
/// peripheral into its fields without the tree knowing its own shape.
pub trait Correctable {
    /// The name matched against corrector patterns.
    fn corrector_name(&self) -> &str;

    /// Clears the node's own edited flag, ahead of one fixpoint pass.
    fn validate(&mut self);

    /// Whether an action has invalidated this node since the last `validate`.
    fn is_edited(&self) -> bool;

    /// Visits every direct child with `visitor`, short-circuiting on the
    /// first error.
    fn visit_children(&mut self, visitor: &mut dyn FnMut(&mut dyn Correctable) -> Result<()>) -> Result<()>;

    /// Renames the component (`corrector.py::modify`'s name-only case).
    fn rename(&mut self, name: &str) -> Result<()>;

    /// Shared node bookkeeping, for the `modify` primitive's `brief` argument.
    fn node_mut(&mut self) -> &mut NodeBase;

    /// Forces the component's width (the corrector `modify` primitive's
    /// `size` argument). Only a [`Register`] carries a size, so every other
    /// component's default is a no-op.
    fn set_size(&mut self, _size: u32) -> Result<()> {
        Ok(())
    }

    /// Duplicates a field of this component under a new name
    /// (`corrector.py::clone_field`). Only a [`Register`] has fields, so
    /// every other component's default is a no-op.
    fn clone_field(&mut self, _source: &str, _new_name: &str) -> Result<()> {
        Ok(())
    }

    /// Folds pairwise-equal children into one another (§4.3 `merge_children`),
    /// run once per fixpoint iteration after correctors have had a chance to
    /// rename things into collision. A field has no children, so the default
    /// is a no-op.
    fn merge_children(&mut self) -> Result<()> {
        Ok(())
    }

    /// How many physical instances this component has (only meaningful on a
    /// [`Peripheral`]; the one-instance-peripheral exception in
    /// [`crate::correctors`]'s catch-all prefix-stripping corrector, §9).
    /// Everything else reports 1, i.e. "not a peripheral, don't special-case
    /// it".
    fn instance_count(&self) -> usize {
        1
    }

    /// Whether any instance carries a name different from the component's
    /// own (the other half of the §9 one-instance-peripheral exception).
    fn has_aliased_instance(&self) -> bool {
        false
    }
}

impl Correctable for Group {
    fn corrector_name(&self) -> &str {
        self.name()
    }

    fn validate(&mut self) {
        self.base_mut().validate();
    }

    fn is_edited(&self) -> bool {
        self.base().is_edited()
    }

    fn visit_children(&mut self, visitor: &mut dyn FnMut(&mut dyn Correctable) -> Result<()>) -> Result<()> {
        for peripheral in self.peripherals_mut() {
            visitor(peripheral)?;
        }
        Ok(())
    }

    fn rename(&mut self, name: &str) -> Result<()> {
        self.base_mut().set_name(name)
    }

    fn node_mut(&mut self) -> &mut NodeBase {
        self.base_mut()
    }

    fn merge_children(&mut self) -> Result<()> {
        merge_equal(self.peripherals_mut(), Peripheral::absorb)
    }
}

impl Correctable for Peripheral {
    fn corrector_name(&self) -> &str {
        self.name()
    }

    fn validate(&mut self) {
        self.base_mut().validate();
    }

    fn is_edited(&self) -> bool {
        self.base().is_edited()
    }

    fn visit_children(&mut self, visitor: &mut dyn FnMut(&mut dyn Correctable) -> Result<()>) -> Result<()> {
        for register in self.registers_mut() {
            visitor(register)?;
        }
        Ok(())
    }

    fn rename(&mut self, name: &str) -> Result<()> {
        self.base_mut().set_name(name)
    }

    fn node_mut(&mut self) -> &mut NodeBase {
        self.base_mut()
    }

    fn merge_children(&mut self) -> Result<()> {
        self.merge_equal_registers()
    }

    fn instance_count(&self) -> usize {
        self.instances().len().max(1)
    }

    fn has_aliased_instance(&self) -> bool {
        self.instances().iter().any(|i| i.name() != self.name())
    }
}

impl Correctable for Register {
    fn corrector_name(&self) -> &str {
        self.name()
    }

    fn validate(&mut self) {
        self.base_mut().validate();
    }

    fn is_edited(&self) -> bool {
        self.base().is_edited()
    }

    fn visit_children(&mut self, visitor: &mut dyn FnMut(&mut dyn Correctable) -> Result<()>) -> Result<()> {
        for field in self.fields_mut() {
            visitor(field)?;
        }
        Ok(())
    }

    fn rename(&mut self, name: &str) -> Result<()> {
        self.set_name(name)
    }

    fn node_mut(&mut self) -> &mut NodeBase {
        self.base_mut()
    }

    fn set_size(&mut self, size: u32) -> Result<()> {
        Register::set_size(self, size)
    }

    fn clone_field(&mut self, source: &str, new_name: &str) -> Result<()> {
        self.duplicate_field(source, new_name)
    }

    fn merge_children(&mut self) -> Result<()> {
        merge_equal(self.fields_mut(), Field::absorb)
    }
}

impl Correctable for Field {
    fn corrector_name(&self) -> &str {
        self.name()
    }

    fn validate(&mut self) {
        self.base_mut().validate();
    }

    fn is_edited(&self) -> bool {
        self.base().is_edited()
    }

    fn visit_children(&mut self, _visitor: &mut dyn FnMut(&mut dyn Correctable) -> Result<()>) -> Result<()> {
        Ok(())
    }

    fn rename(&mut self, name: &str) -> Result<()> {
        self.base_mut().set_name(name)
    }

    fn node_mut(&mut self) -> &mut NodeBase {
        self.base_mut()
    }
}

/// A rewrite applied to a matched [`Correctable`].
pub type Action = Rc<dyn Fn(&mut dyn Correctable) -> Result<()>>;

/// One node of the corrector tree: an optional action to run on a matched
/// component, plus glob-keyed sub-correctors applied to its children.
#[derive(Clone, Default)]
pub struct Corrector {
    action: Option<Action>,
    children: Vec<(String, Corrector)>,
}

impl Corrector {
    /// A corrector with no action and no children; matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A leaf corrector: runs `action` and recurses no further.
    pub fn leaf(action: Action) -> Self {
        Self { action: Some(action), children: Vec::new() }
    }

    /// A branch corrector with no action of its own, only sub-correctors
    /// keyed by glob pattern.
    pub fn branch(children: impl IntoIterator<Item = (&'static str, Corrector)>) -> Self {
        Self { action: None, children: children.into_iter().map(|(p, c)| (p.to_owned(), c)).collect() }
    }

    /// A branch corrector that also runs `action` on the matched component
    /// before recursing into `children` (the `(function, dict)` tuple form).
    pub fn branch_with_action(
        action: Action,
        children: impl IntoIterator<Item = (&'static str, Corrector)>,
    ) -> Self {
        Self { action: Some(action), children: children.into_iter().map(|(p, c)| (p.to_owned(), c)).collect() }
    }

    fn matching_children(&self, name: &str) -> Vec<&Corrector> {
        self.children.iter().filter(|(pattern, _)| glob_match(pattern, name)).map(|(_, c)| c).collect()
    }

    /// Runs the fixpoint loop (§4.4) over `component`, using `self` as the
    /// corrector found for `component`'s parent. Re-validates and re-applies
    /// matched correctors until `component` stops reporting edits, up to
    /// `iteration_cap` passes, then recurses into children with whichever
    /// corrector matched. Returns [`MergeError::FixConvergence`] if the cap
    /// is exhausted with the component still dirty.
    pub fn apply_fixes(&self, component: &mut dyn Correctable, iteration_cap: u32) -> Result<()> {
        for _ in 0..iteration_cap {
            component.validate();
            let name = component.corrector_name().to_owned();
            let matched = self.matching_children(&name);
            for corrector in &matched {
                if let Some(action) = &corrector.action {
                    action(component)?;
                }
                component.visit_children(&mut |child| corrector.apply_fixes(child, iteration_cap))?;
            }
            component.merge_children()?;
            if !component.is_edited() {
                return Ok(());
            }
        }
        Err(MergeError::FixConvergence { alias: component.corrector_name().to_owned(), iterations: iteration_cap })
    }
}

/// Folds pairwise-equal items together (§4.3 `merge_children`): whenever two
/// elements of `items` compare equal, the later one is absorbed into the
/// earlier one and dropped. Used for children whose equality already
/// excludes the property a rename could have changed (a [`Field`]'s name is
/// part of its identity, so two fields only collide if a corrector gave them
/// the same name on purpose); register children need the name-merging
/// variant, [`Peripheral::merge_equal_registers`].
fn merge_equal<T: PartialEq>(items: &mut Vec<T>, absorb: impl Fn(&mut T, &T) -> Result<()>) -> Result<()> {
    let mut i = 0;
    while i < items.len() {
        let mut j = i + 1;
        while j < items.len() {
            if items[i] == items[j] {
                let other = items.remove(j);
                absorb(&mut items[i], &other)?;
            } else {
                j += 1;
            }
        }
        i += 1;
    }
    Ok(())
}

/// Renames the matched component to a fixed name (`corrector.py::modify`'s
/// name-only case, e.g. the `"AES?" -> partial(modify, name="AES")` entries).
pub fn rename(name: impl Into<String> + Clone + 'static) -> Action {
    Rc::new(move |c: &mut dyn Correctable| c.rename(&name.clone().into()))
}

/// Sets any combination of name, brief and size on the matched component
/// (`corrector.py::modify`, the general case beyond the name-only shorthand
/// covered by [`rename`]). Any argument left `None` is left untouched; `size`
/// is a no-op on anything but a register.
pub fn modify(name: Option<&'static str>, brief: Option<&'static str>, size: Option<u32>) -> Action {
    Rc::new(move |c: &mut dyn Correctable| {
        if let Some(name) = name {
            c.rename(name)?;
        }
        if let Some(brief) = brief {
            c.node_mut().set_brief(Some(brief.to_owned()))?;
        }
        if let Some(size) = size {
            c.set_size(size)?;
        }
        Ok(())
    })
}

/// Duplicates a field under a new name, if the name isn't already taken
/// (`corrector.py::clone_field`). A no-op on anything but a register.
pub fn clone_field(source: &'static str, new_name: &'static str) -> Action {
    Rc::new(move |c: &mut dyn Correctable| c.clone_field(source, new_name))
}

/// Strips everything up to and including the first `_`, `times` times
/// (`corrector.py::remove_prefix`). A no-op once the name carries no more
/// underscores.
pub fn remove_prefix(times: u32) -> Action {
    Rc::new(move |c: &mut dyn Correctable| {
        let mut name = c.corrector_name().to_owned();
        for _ in 0..times {
            match name.find('_') {
                Some(index) => name = name[index + 1..].to_owned(),
                None => break,
            }
        }
        c.rename(&name)
    })
}

/// The catch-all base-tree entry's own nested catch-all (§4.4, §9): strips a
/// peripheral-name prefix from every register and field name of the shape
/// `<peripheral><suffix>_<tail>`, but only when the peripheral has more than
/// one instance, or carries an instance whose name differs from its own
/// (§9 Open Question, pinned against §8.3 Scenario E and a one-instance
/// regression). Meant to sit at a Peripheral-level node in the corrector
/// tree; it reaches down into registers and fields itself rather than
/// relying on further nested patterns, since the eligibility check only
/// makes sense once, at the peripheral.
pub fn strip_instance_prefix() -> Action {
    Rc::new(|c: &mut dyn Correctable| {
        let prefix = c.corrector_name().to_owned();
        if c.instance_count() <= 1 && !c.has_aliased_instance() {
            return Ok(());
        }
        c.visit_children(&mut |register| {
            strip_prefix_once(register, &prefix)?;
            register.visit_children(&mut |field| strip_prefix_once(field, &prefix))
        })
    })
}

/// Strips `prefix` plus any trailing chars up to and including the first
/// `_` found after it, leaving only the tail. A no-op if `name` doesn't
/// start with `prefix`, has no `_` after it, or the tail would be empty.
fn strip_prefix_once(c: &mut dyn Correctable, prefix: &str) -> Result<()> {
    let name = c.corrector_name().to_owned();
    let Some(rest) = name.strip_prefix(prefix) else { return Ok(()) };
    let Some(underscore) = rest.find('_') else { return Ok(()) };
    let tail = &rest[underscore + 1..];
    if !tail.is_empty() {
        c.rename(tail)?;
    }
    Ok(())
}

/// Shell-style glob match (`fnmatch` semantics): `*` matches any run of
/// characters, `?` matches exactly one, `[abc]`/`[!abc]` matches/excludes one
/// character from a set. Matching is case-sensitive, as component names are.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    match_from(&pattern, &name)
}

fn match_from(pattern: &[char], name: &[char]) -> bool {
    match pattern.first() {
        None => name.is_empty(),
        Some('*') => {
            if match_from(&pattern[1..], name) {
                return true;
            }
            !name.is_empty() && match_from(pattern, &name[1..])
        }
        Some('?') => !name.is_empty() && match_from(&pattern[1..], &name[1..]),
        Some('[') => {
            let Some(close) = pattern.iter().position(|&c| c == ']').filter(|&i| i > 0) else {
                return !name.is_empty() && name[0] == '[' && match_from(&pattern[1..], &name[1..]);
            };
            if name.is_empty() {
                return false;
            }
            let mut set = &pattern[1..close];
            let negate = set.first() == Some(&'!');
            if negate {
                set = &set[1..];
            }
            let hit = set.contains(&name[0]);
            (hit != negate) && match_from(&pattern[close + 1..], &name[1..])
        }
        Some(&c) => !name.is_empty() && name[0] == c && match_from(&pattern[1..], &name[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::access::Access;
    use crate::model::chipset::ChipSet;
    use crate::model::peripheral::Peripheral;

    #[test]
    fn glob_matches_wildcards() {
        assert!(glob_match("TIM?*", "TIM2"));
        assert!(glob_match("AES?", "AES2"));
        assert!(!glob_match("AES?", "AES"));
        assert!(glob_match("*_*", "CR1_EN"));
        assert!(!glob_match("*_*", "CR1"));
        assert!(glob_match("[ABC]*", "B12"));
        assert!(!glob_match("[!ABC]*", "B12"));
    }

    #[test]
    fn glob_matches_exact_and_star() {
        assert!(glob_match("*", "ANYTHING"));
        assert!(glob_match("CRC", "CRC"));
        assert!(!glob_match("CRC", "CRC2"));
    }

    #[test]
    fn fixpoint_renames_and_recurses_into_fields() {
        let mut register = Register::new(ChipSet::new(), "AES2", None, 32, Access::ReadWrite);
        register.add_field(Field::new(ChipSet::new(), "AES2_EN", None, 0, 1)).unwrap();

        let tree = Corrector::branch([(
            "AES?",
            Corrector::branch_with_action(rename("AES"), [("AES2_*", Corrector::leaf(remove_prefix(1)))]),
        )]);

        tree.apply_fixes(&mut register, 100).unwrap();
        assert_eq!(register.name(), "AES");
        assert_eq!(register.fields()[0].name(), "EN");
    }

    // Scenario E (§8.3): two registers differing only in a trailing
    // variable character, but with identical fields, must fold into one
    // register under the merged name once the fixpoint loop runs a
    // `merge_children` pass, even with no corrector action involved.
    #[test]
    fn fixpoint_merges_equal_registers_scenario_e() {
        let mut cry = Register::new(ChipSet::new(), "CRy", None, 32, Access::ReadWrite);
        cry.add_field(Field::new(ChipSet::new(), "EN", None, 0, 1)).unwrap();
        let mut crz = Register::new(ChipSet::new(), "CRz", None, 32, Access::ReadWrite);
        crz.add_field(Field::new(ChipSet::new(), "EN", None, 0, 1)).unwrap();

        let mut peripheral = Peripheral::new(ChipSet::new(), "GPIO", None);
        peripheral.add_register(cry).unwrap();
        peripheral.add_register(crz).unwrap();

        Corrector::empty().apply_fixes(&mut peripheral, 100).unwrap();
        assert_eq!(peripheral.registers().len(), 1);
        assert_eq!(peripheral.registers()[0].name(), "CRx");
    }

    // Scenario F (§8.3): a corrector that alternates a name back and forth
    // never settles, so the loop must fail once the cap is spent rather than
    // looping forever.
    #[test]
    fn convergence_error_after_cap() {
        let toggle = std::cell::Cell::new(false);
        let flip: Action = Rc::new(move |c| {
            let next = if toggle.get() { "X" } else { "X_SUFFIX" };
            toggle.set(!toggle.get());
            c.rename(next)
        });
        let tree = Corrector::branch([("X*", Corrector::leaf(flip))]);
        let mut register = Register::new(ChipSet::new(), "X", None, 32, Access::ReadWrite);
        let result = tree.apply_fixes(&mut register, 5);
        assert!(matches!(result, Err(MergeError::FixConvergence { iterations: 5, .. })));
    }

    #[test]
    fn modify_sets_name_brief_and_size() {
        let mut register = Register::new(ChipSet::new(), "CR", None, 16, Access::ReadWrite);
        let tree = Corrector::leaf(modify(Some("CR1"), Some("control register"), Some(32)));
        tree.apply_fixes(&mut register, 100).unwrap();
        assert_eq!(register.name(), "CR1");
        assert_eq!(register.base().brief(), Some("control register"));
        assert_eq!(register.size(), 32);
    }

    #[test]
    fn clone_field_duplicates_existing_field() {
        let mut register = Register::new(ChipSet::new(), "CR", None, 32, Access::ReadWrite);
        register.add_field(Field::new(ChipSet::new(), "EN", None, 0, 1)).unwrap();

        let tree = Corrector::leaf(clone_field("EN", "EN2"));
        tree.apply_fixes(&mut register, 100).unwrap();

        assert_eq!(register.fields().len(), 2);
        assert!(register.fields().iter().any(|f| f.name() == "EN2"));
    }

    #[test]
    fn strip_instance_prefix_skipped_for_single_instance() {
        use crate::model::peripheral::PeripheralInstance;

        let mut peripheral = Peripheral::new(ChipSet::new(), "GPIOA", None);
        let mut register = Register::new(ChipSet::new(), "GPIOA_MODER", None, 32, Access::ReadWrite);
        register.add_field(Field::new(ChipSet::new(), "GPIOA_MODER_0", None, 0, 2)).unwrap();
        peripheral.add_register(register).unwrap();
        peripheral.add_instance(PeripheralInstance::new(ChipSet::new(), "GPIOA", 0x4000)).unwrap();

        let tree = Corrector::leaf(strip_instance_prefix());
        tree.apply_fixes(&mut peripheral, 100).unwrap();
        assert_eq!(peripheral.registers()[0].name(), "GPIOA_MODER");
    }

    #[test]
    fn strip_instance_prefix_applied_for_multi_instance() {
        use crate::model::peripheral::PeripheralInstance;

        let mut peripheral = Peripheral::new(ChipSet::new(), "GPIO", None);
        let mut register = Register::new(ChipSet::new(), "GPIO_MODER", None, 32, Access::ReadWrite);
        register.add_field(Field::new(ChipSet::new(), "GPIO_MODER_BIT0", None, 0, 2)).unwrap();
        peripheral.add_register(register).unwrap();
        peripheral.add_instance(PeripheralInstance::new(ChipSet::new(), "GPIOA", 0x4000)).unwrap();
        peripheral.add_instance(PeripheralInstance::new(ChipSet::new(), "GPIOB", 0x4400)).unwrap();

        let tree = Corrector::leaf(strip_instance_prefix());
        tree.apply_fixes(&mut peripheral, 100).unwrap();
        assert_eq!(peripheral.registers()[0].name(), "MODER");
        assert_eq!(peripheral.registers()[0].fields()[0].name(), "BIT0");
    }

    #[test]
    fn clone_field_is_noop_when_target_name_taken() {
        let mut register = Register::new(ChipSet::new(), "CR", None, 32, Access::ReadWrite);
        register.add_field(Field::new(ChipSet::new(), "EN", None, 0, 1)).unwrap();
        register.add_field(Field::new(ChipSet::new(), "EN2", None, 1, 1)).unwrap();

        let tree = Corrector::leaf(clone_field("EN", "EN2"));
        tree.apply_fixes(&mut register, 100).unwrap();

        assert_eq!(register.fields().len(), 2);
    }
}
