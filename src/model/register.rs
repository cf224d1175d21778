//! An ordered set of [`Field`]s sharing one register (§3.1).

use super::access::Access;
use super::chipset::ChipSet;
use super::component::NodeBase;
use super::field::Field;
use crate::error::Result;

/// Default register width in bits, used when an SVD document leaves `size`
/// unspecified at every level (device/peripheral/register).
pub const DEFAULT_SIZE: u32 = 32;

/// A register: a fixed-width memory cell decomposed into [`Field`]s.
#[derive(Clone, Debug)]
pub struct Register {
    base: NodeBase,
    size: u32,
    access: Access,
    fields: Vec<Field>,
}

impl Register {
    /// Creates an empty register of the given size and access class.
    pub fn new(
        chips: ChipSet,
        name: impl Into<String>,
        brief: Option<String>,
        size: u32,
        access: Access,
    ) -> Self {
        Self { base: NodeBase::new(Some(name.into()), brief, chips), size, access, fields: Vec::new() }
    }

    /// Shared node bookkeeping.
    pub fn base(&self) -> &NodeBase {
        &self.base
    }

    /// Mutable shared node bookkeeping.
    pub fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    /// The register's name.
    pub fn name(&self) -> &str {
        self.base.name().unwrap_or_default()
    }

    /// Renames the register. Callers that need to propagate the rename to
    /// sibling [`MappingElement`](super::mapping::MappingElement)s that
    /// share the old name must do so themselves (this mirrors the source's
    /// `apply_fixes` post-rename fixup, performed one level up by the owning
    /// peripheral).
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.base.set_name(name)
    }

    /// Width in bits.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Size in bytes, rounded up.
    pub fn byte_size(&self) -> u32 {
        self.size.div_ceil(8)
    }

    /// Access class.
    pub fn access(&self) -> Access {
        self.access
    }

    /// The register's fields, in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Mutable access to the register's fields.
    pub fn fields_mut(&mut self) -> &mut Vec<Field> {
        &mut self.fields
    }

    /// Adds a field. Unions the register's chipset with the field's (bottom-up
    /// closure invariant, §8.1 property 1).
    pub fn add_field(&mut self, field: Field) -> Result<()> {
        self.base.union_chips(field.chips())?;
        self.base.invalidate()?;
        self.fields.push(field);
        Ok(())
    }

    /// Removes and returns the field named `name`.
    pub fn remove_field(&mut self, name: &str) -> Option<Field> {
        let index = self.fields.iter().position(|f| f.name() == name)?;
        Some(self.fields.remove(index))
    }

    /// Checks invariant 3 (§8.1): every field fits within the register and no
    /// two fields overlap. Returns the names of violating fields.
    pub fn check_field_invariants(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for field in &self.fields {
            if field.position() + field.size() > self.size {
                problems.push(field.name().to_owned());
            }
        }
        for (i, a) in self.fields.iter().enumerate() {
            for b in &self.fields[i + 1..] {
                if a.overlaps(b) {
                    problems.push(format!("{}/{}", a.name(), b.name()));
                }
            }
        }
        problems
    }

    /// Forces the register's width (the corrector `modify` primitive's
    /// `size` argument, grounded in `corrector.py::modify`).
    pub fn set_size(&mut self, size: u32) -> Result<()> {
        if self.size != size {
            self.size = size;
            self.base.invalidate()?;
        }
        Ok(())
    }

    /// Duplicates the field named `source` under `new_name`, if `new_name`
    /// isn't already taken (`corrector.py::clone_field`). A no-op if
    /// `source` doesn't exist or `new_name` is already present.
    pub fn duplicate_field(&mut self, source: &str, new_name: &str) -> Result<()> {
        if self.fields.iter().any(|f| f.name() == new_name) {
            return Ok(());
        }
        let Some(original) = self.fields.iter().find(|f| f.name() == source) else { return Ok(()) };
        let mut clone = original.clone();
        clone.base_mut().set_name(new_name)?;
        self.fields.push(clone);
        self.base.invalidate()
    }

    /// Absorbs `other`'s fields into `self` (§4.3): union of chipsets, adopt
    /// `brief` if missing, recursively absorb fields that already have an
    /// equal counterpart, otherwise adopt the new field outright.
    pub fn absorb(&mut self, other: &Register) -> Result<()> {
        self.base.adopt_brief(other.base.brief());
        self.base.union_chips(other.chips())?;
        for other_field in &other.fields {
            if let Some(self_field) = self.fields.iter_mut().find(|f| *f == other_field) {
                self_field.absorb(other_field)?;
            } else {
                self.fields.push(other_field.clone());
                self.base.invalidate()?;
            }
        }
        Ok(())
    }

    /// The chips on which this register is valid.
    pub fn chips(&self) -> &ChipSet {
        self.base.chips()
    }

    /// Locks this register and every field it owns against further mutation
    /// (§4.2, §4.7 Finalised state).
    pub fn lock(&mut self) {
        self.base.lock();
        for field in &mut self.fields {
            field.lock();
        }
    }

    /// Scenario-E register-name merge (§8.3 Scenario E): given two colliding
    /// register names with the same shape (differing only in the usual
    /// `n`/`x`/`y`/`z`/digit run), compute a single generalised name; returns
    /// `None` if the two names have genuinely incompatible shapes.
    pub fn merge_names(name_a: &str, name_b: &str) -> Option<String> {
        let (short, long) = if name_a.len() <= name_b.len() {
            (name_a, name_b)
        } else {
            (name_b, name_a)
        };
        if long.starts_with(short) {
            return Some(short.to_owned());
        }

        let tokens_a = tokenize(name_a);
        let tokens_b = tokenize(name_b);
        let no_digit_a = collapse(&tokens_a);
        let no_digit_b = collapse(&tokens_b);
        if no_digit_a == no_digit_b {
            if tokens_a.len() >= 2 && tokens_b.len() >= 2 {
                let head_tail_a = format!("{}{}", tokens_a[0], tokens_a[2..].concat());
                let head_tail_b = format!("{}{}", tokens_b[0], tokens_b[2..].concat());
                if head_tail_a == head_tail_b {
                    return Some(format!("{}x{}", tokens_a[0], tokens_a[2..].concat()));
                }
                if head_tail_b == name_a {
                    return Some(name_a.to_owned());
                }
            }
            if tokens_a.len() >= 2 && tokens_b.len() >= 2 {
                let n = tokens_a.len();
                let m = tokens_b.len();
                let prefix_tail_a = format!("{}{}", tokens_a[..n - 2].concat(), tokens_a[n - 1]);
                let prefix_tail_b = format!("{}{}", tokens_b[..m - 2].concat(), tokens_b[m - 1]);
                if prefix_tail_a == prefix_tail_b {
                    return Some(format!("{}x{}", tokens_a[..n - 2].concat(), tokens_a[n - 1]));
                }
                if prefix_tail_b == name_a {
                    return Some(name_a.to_owned());
                }
            }
            return Some(no_digit_a);
        }

        let mut suffix_len = name_a.len().min(name_b.len());
        while suffix_len > 0 {
            let suffix = &name_a[name_a.len() - suffix_len..];
            if !suffix.starts_with('_') && name_b.ends_with(suffix) {
                break;
            }
            suffix_len -= 1;
        }
        let suffix = &name_a[name_a.len() - suffix_len..];

        let mut prefix_len = name_a.len().min(name_b.len());
        while prefix_len > 0 {
            let prefix = &name_a[..prefix_len];
            if !prefix.ends_with('_') && name_b.starts_with(prefix) {
                break;
            }
            prefix_len -= 1;
        }
        let prefix = &name_a[..prefix_len];

        let filler_length = if !prefix.is_empty() && !suffix.is_empty() {
            name_a.len().saturating_sub(prefix.len()).saturating_sub(suffix.len())
        } else {
            0
        };

        if (filler_length > 0 && name_a.len() != name_b.len())
            || filler_length > 2
            || prefix.len() + suffix.len() < 2
        {
            None
        } else {
            Some(format!("{prefix}x{suffix}"))
        }
    }
}

/// Whether `c` belongs to the "variable" character class used to spot the
/// part of a register name that differs between variants: `n`, `x`, `y`, `z`
/// or a decimal digit.
fn is_variable_char(c: char) -> bool {
    matches!(c, 'n' | 'x' | 'y' | 'z') || c.is_ascii_digit()
}

/// Splits `name` into alternating literal/variable runs: `[literal,
/// variable, literal, variable, ..., literal]`, where a variable run is a
/// maximal span of [`is_variable_char`] characters. Literal runs may be
/// empty (e.g. a name starting or ending with a variable run), mirroring
/// Python's `re.split` with a single capturing group.
fn tokenize(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < chars.len() {
        if is_variable_char(chars[i]) {
            tokens.push(std::mem::take(&mut literal));
            let mut variable = String::new();
            while i < chars.len() && is_variable_char(chars[i]) {
                variable.push(chars[i]);
                i += 1;
            }
            tokens.push(variable);
        } else {
            literal.push(chars[i]);
            i += 1;
        }
    }
    tokens.push(literal);
    tokens
}

/// Replaces every variable run with a literal `x`, producing a shape key.
fn collapse(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| if t.chars().all(is_variable_char) && !t.is_empty() { "x" } else { t.as_str() })
        .collect()
}

/// Two registers are equal iff they carry the same multiset of fields
/// (§3.1); name is deliberately excluded so that absorb can detect
/// differently-named-but-identical registers and fold them under a merged
/// name (§8.3 Scenario E).
impl PartialEq for Register {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self.fields.iter().all(|f| other.fields.contains(f))
            && other.fields.iter().all(|f| self.fields.contains(f))
    }
}

impl Eq for Register {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_names_scenario_e() {
        assert_eq!(Register::merge_names("CRy", "CRz").as_deref(), Some("CRx"));
    }

    #[test]
    fn merge_names_prefix_containment() {
        assert_eq!(Register::merge_names("CR", "CR1").as_deref(), Some("CR"));
    }

    #[test]
    fn field_overlap_detected() {
        let mut reg = Register::new(ChipSet::new(), "RX", None, 32, Access::ReadWrite);
        reg.add_field(Field::new(ChipSet::new(), "A", None, 0, 4)).unwrap();
        reg.add_field(Field::new(ChipSet::new(), "B", None, 2, 4)).unwrap();
        assert_eq!(reg.check_field_invariants(), vec!["A/B".to_owned()]);
    }

    #[test]
    fn field_out_of_range_detected() {
        let mut reg = Register::new(ChipSet::new(), "RX", None, 8, Access::ReadWrite);
        reg.add_field(Field::new(ChipSet::new(), "A", None, 4, 8)).unwrap();
        assert_eq!(reg.check_field_invariants(), vec!["A".to_owned()]);
    }
}
