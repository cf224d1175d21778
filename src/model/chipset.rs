//! The set-of-chips algebra (§4.1) and the family-collapsing guard-expression
//! printer that is the principal compactness lever of the generated headers.

use super::chip::Chip;
use indexmap::IndexSet;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// An unordered set of [`Chip`]s, plus a lazily rebuilt family index.
///
/// `ChipSet` is the unit every [`Component`](crate::model::component::Component)
/// carries: the set of chips on which that component is valid. Every guard
/// expression printed by the tool is a `ChipSet` rendered relative to a
/// process-wide reference set (§4.1 point 1; `ChipSet::reference` never
/// shrinks).
#[derive(Clone, Debug, Default)]
pub struct ChipSet {
    chips: IndexSet<Chip>,
    families: RefCell<Option<BTreeMap<String, IndexSet<Chip>>>>,
}

thread_local! {
    static REFERENCE: RefCell<Option<Rc<RefCell<ChipSet>>>> = const { RefCell::new(None) };
}

impl ChipSet {
    /// An empty chipset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a chipset from an iterator of chips.
    pub fn from_chips(chips: impl IntoIterator<Item = Chip>) -> Self {
        let mut set = Self::new();
        for chip in chips {
            set.add_chip(chip);
        }
        set
    }

    /// The shared, process-wide reference chipset (§3.1): every chip ever
    /// observed during ingest. Guard expressions are always printed relative
    /// to it. Lazily initialised on first use.
    ///
    /// A driver that wants an isolated engine (e.g. for tests run in
    /// parallel) should call [`ChipSet::reset_reference`] between runs
    /// rather than rely on process exit; see the Design Notes open question
    /// about threading a context object instead of a singleton.
    pub fn reference() -> Rc<RefCell<ChipSet>> {
        REFERENCE.with(|cell| {
            cell.borrow_mut().get_or_insert_with(|| Rc::new(RefCell::new(ChipSet::new()))).clone()
        })
    }

    /// Clears the process-wide reference chipset. Intended for test isolation.
    pub fn reset_reference() {
        REFERENCE.with(|cell| *cell.borrow_mut() = None);
    }

    /// Registers `chips` into the reference chipset, growing it.
    pub fn observe(chips: &ChipSet) {
        ChipSet::reference().borrow_mut().union_in_place(chips);
    }

    fn invalidate(&mut self) {
        *self.families.borrow_mut() = None;
    }

    /// Number of chips in the set.
    pub fn len(&self) -> usize {
        self.chips.len()
    }

    /// Whether the set has no chips.
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    /// Iterates the chips in the set, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Chip> {
        self.chips.iter()
    }

    /// Adds a single chip.
    pub fn add_chip(&mut self, chip: Chip) {
        self.chips.insert(chip);
        self.invalidate();
    }

    /// Removes a single chip.
    pub fn remove_chip(&mut self, chip: &Chip) {
        self.chips.shift_remove(chip);
        self.invalidate();
    }

    /// Unions `other` into `self` in place.
    pub fn union_in_place(&mut self, other: &ChipSet) {
        for chip in &other.chips {
            self.chips.insert(chip.clone());
        }
        self.invalidate();
    }

    /// Returns the union of `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &ChipSet) -> ChipSet {
        let mut out = self.clone();
        out.union_in_place(other);
        out
    }

    /// Returns the intersection of `self` and `other`.
    #[must_use]
    pub fn intersection(&self, other: &ChipSet) -> ChipSet {
        ChipSet::from_chips(self.chips.iter().filter(|c| other.chips.contains(*c)).cloned())
    }

    /// Returns `self` minus `other`.
    #[must_use]
    pub fn difference(&self, other: &ChipSet) -> ChipSet {
        ChipSet::from_chips(self.chips.iter().filter(|c| !other.chips.contains(*c)).cloned())
    }

    /// Whether every chip of `other` is present in `self`.
    pub fn is_superset(&self, other: &ChipSet) -> bool {
        other.chips.iter().all(|c| self.chips.contains(c))
    }

    /// Whether every chip of `self` is present in `other`.
    pub fn is_subset(&self, other: &ChipSet) -> bool {
        other.is_superset(self)
    }

    /// Whether `self` is a *strict* subset of `other`: a subset, but not equal.
    pub fn is_strict_subset(&self, other: &ChipSet) -> bool {
        self.is_subset(other) && self != other
    }

    /// Rebuilds (if stale) and returns the family -> chips index, sorted by
    /// family name.
    pub fn families(&self) -> BTreeMap<String, IndexSet<Chip>> {
        if let Some(families) = self.families.borrow().as_ref() {
            return families.clone();
        }
        let mut families: BTreeMap<String, IndexSet<Chip>> = BTreeMap::new();
        for chip in &self.chips {
            families.entry(chip.family()).or_default().insert(chip.clone());
        }
        *self.families.borrow_mut() = Some(families.clone());
        families
    }

    /// Produces the minimal `#if defined(...) || ...` disjunction of chip
    /// defines that is true exactly on this chipset, relative to
    /// `reference` (§4.1).
    ///
    /// Contract:
    /// 1. `self == reference` prints the literal `"1"`.
    /// 2. A family wholly contained in `self` collapses to `defined(FAMILY)`
    ///    and suppresses its individual chip defines.
    /// 3. Remaining chips are emitted individually.
    /// 4. Lines wrap every `chips_per_line` tokens with `\` + newline + `prefix`.
    /// 5. Families are emitted sorted lexicographically, then chips by name.
    pub fn defined_list(&self, chips_per_line: usize, reference: &ChipSet, prefix: &str) -> String {
        if self == reference {
            return "1".to_owned();
        }

        let reference_families = reference.families();
        let mut matched_family: BTreeMap<String, bool> = BTreeMap::new();
        for (family, chips) in &reference_families {
            if chips.iter().all(|c| self.chips.contains(c)) {
                matched_family.insert(family.clone(), true);
            }
        }

        let mut tokens = Vec::new();
        for family in matched_family.keys() {
            tokens.push(format!("defined({family})"));
        }

        let mut sorted_chips: Vec<&Chip> = self.chips.iter().collect();
        sorted_chips.sort_by_key(|c| c.name());
        for chip in sorted_chips {
            let family = chip.family();
            if !matched_family.contains_key(&family) {
                tokens.push(format!("defined({})", chip.name()));
            }
        }

        let mut output = String::new();
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                if i % chips_per_line.max(1) == 0 {
                    output.push_str(" ||\\\n");
                    output.push_str(prefix);
                } else {
                    output.push_str(" || ");
                }
            }
            output.push_str(token);
        }
        output
    }

    /// Whether this chipset, rendered against itself as reference, matches
    /// any of the chips in `pattern` under shell-glob rules.
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        self.chips.iter().any(|c| c.matches(pattern))
    }

    /// The complement of `self` relative to `reference`: every chip of
    /// `reference` not present in `self` (§3.1 expansion, grounded in
    /// `chipset.py::reverse`/`reversed`).
    #[must_use]
    pub fn reversed(&self, reference: &ChipSet) -> ChipSet {
        reference.difference(self)
    }

    /// Replaces `self` with its complement relative to `reference`, in place.
    pub fn reverse(&mut self, reference: &ChipSet) {
        *self = self.reversed(reference);
    }

    /// Claims every name in `names` that matches `pattern` and that
    /// `reference` can resolve to a chip, moving the matching chips into
    /// `self` and removing the claimed names from `names` (§3.1 expansion,
    /// grounded in `chipset.py::fill_from_name_list`). Used when resolving
    /// an ambiguous SVD/define association: each candidate list is narrowed
    /// as names get claimed by successive, increasingly specific patterns.
    pub fn fill_from_name_list(&mut self, names: &mut Vec<String>, reference: &ChipSet, pattern: &str) {
        let mut claimed = Vec::new();
        names.retain(|name| {
            if !crate::corrector::glob_match(pattern, name) {
                return true;
            }
            match reference.chips.iter().find(|c| c.name() == *name) {
                Some(chip) => {
                    claimed.push(chip.clone());
                    false
                }
                None => true,
            }
        });
        for chip in claimed {
            self.add_chip(chip);
        }
    }
}

impl PartialEq for ChipSet {
    fn eq(&self, other: &Self) -> bool {
        self.chips.len() == other.chips.len() && self.chips.iter().all(|c| other.chips.contains(c))
    }
}

impl Eq for ChipSet {}

impl Hash for ChipSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut names: Vec<String> = self.chips.iter().map(Chip::name).collect();
        names.sort();
        names.hash(state);
    }
}

impl fmt::Display for ChipSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.chips.iter().map(Chip::name).collect();
        names.sort();
        write!(f, "{}", names.join("\t"))
    }
}

impl FromIterator<Chip> for ChipSet {
    fn from_iter<T: IntoIterator<Item = Chip>>(iter: T) -> Self {
        ChipSet::from_chips(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chip(name: &str) -> Chip {
        Chip::new(name, format!("{name}.h"), format!("{name}.svd"))
    }

    // Scenario C (§8.3): reference contains exactly FAM1_A/B/C (family FAM1)
    // and FAM2_A. A chipset equal to the whole of FAM1 prints as
    // `defined(FAM1)`, never as three individual defines.
    #[test]
    fn family_collapse_scenario_c() {
        // First 7 characters shared within a family, so FAM1CHIP{A,B,C} all
        // collapse to family `FAM1CHI` while FAM2CHIPA stays its own family.
        let fam1_a = Chip::new("FAM1CHIPA", "a.h", "a.svd");
        let fam1_b = Chip::new("FAM1CHIPB", "b.h", "b.svd");
        let fam1_c = Chip::new("FAM1CHIPC", "c.h", "c.svd");
        let fam2_a = Chip::new("FAM2CHIPA", "d.h", "d.svd");
        let reference =
            ChipSet::from_chips([fam1_a.clone(), fam1_b.clone(), fam1_c.clone(), fam2_a]);
        let set = ChipSet::from_chips([fam1_a, fam1_b, fam1_c]);
        let printed = set.defined_list(5, &reference, "    ");
        assert_eq!(printed, "defined(FAM1CHI)");
    }

    #[test]
    fn defined_list_equals_reference_prints_one() {
        let a = chip("STM32F401xE");
        let reference = ChipSet::from_chips([a.clone()]);
        let set = ChipSet::from_chips([a]);
        assert_eq!(set.defined_list(5, &reference, "    "), "1");
    }

    #[test]
    fn defined_list_wraps_lines() {
        let chips: Vec<Chip> =
            (0..12).map(|i| Chip::new(format!("ZZZ{i:02}AAAAA"), "h", "s")).collect();
        let reference = ChipSet::from_chips(chips.iter().take(11).cloned());
        let set = ChipSet::from_chips(chips.iter().take(7).cloned());
        let printed = set.defined_list(5, &reference, "    ");
        assert!(printed.contains("\\\n    "));
    }

    #[test]
    fn is_strict_subset() {
        let a = chip("A");
        let b = chip("B");
        let small = ChipSet::from_chips([a.clone()]);
        let big = ChipSet::from_chips([a, b]);
        assert!(small.is_strict_subset(&big));
        assert!(!big.is_strict_subset(&small));
        assert!(!big.is_strict_subset(&big));
    }

    #[test]
    fn reversed_is_complement_against_reference() {
        let a = chip("A");
        let b = chip("B");
        let reference = ChipSet::from_chips([a.clone(), b.clone()]);
        let set = ChipSet::from_chips([a]);
        let complement = set.reversed(&reference);
        assert_eq!(complement, ChipSet::from_chips([b]));
    }

    #[test]
    fn fill_from_name_list_claims_matching_names_only() {
        let a = chip("STM32F401xE");
        let b = chip("STM32F411xE");
        let reference = ChipSet::from_chips([a.clone(), b.clone()]);
        let mut names = vec!["STM32F401xE".to_owned(), "STM32F411xE".to_owned(), "OTHER".to_owned()];
        let mut set = ChipSet::new();
        set.fill_from_name_list(&mut names, &reference, "STM32F40*");
        assert_eq!(set, ChipSet::from_chips([a]));
        assert_eq!(names, vec!["STM32F411xE".to_owned(), "OTHER".to_owned()]);
    }
}
