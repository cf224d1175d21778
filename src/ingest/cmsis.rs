//! CMSIS C header table adapter (§4.6, §6): the shape a header-tokenising
//! collaborator is specified to hand back, used by [`crate::cmsis_check`]
//! and by the `IRQn.h` builder in [`crate::output`].
//!
//! Tokenising the vendor header text itself is out of scope (§1).

use std::collections::HashMap;

/// One field CMSIS declares inside a peripheral's register struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CmsisField {
    /// The declared member name.
    pub name: String,
    /// The declared C type, e.g. `"uint32_t"`, `"GPIO_TypeDef"`.
    pub c_type: String,
    /// Array length, or `0` for a scalar member.
    pub array_size: u32,
}

impl CmsisField {
    /// Whether [`CmsisField::c_type`] names a struct (sub-peripheral),
    /// rather than a scalar integer type, by heuristic: CMSIS scalar
    /// register types are always one of the fixed-width `uintN_t` spellings.
    pub fn is_struct_type(&self) -> bool {
        !matches!(self.c_type.as_str(), "uint8_t" | "uint16_t" | "uint32_t" | "uint64_t")
    }
}

/// One chip's CMSIS header tables: the peripheral member table and the IRQ
/// number table (§6).
#[derive(Clone, Debug, Default)]
pub struct CmsisHeaderTables {
    /// `peripheral_name -> declared members`, in declaration order.
    pub peripherals: HashMap<String, Vec<CmsisField>>,
    /// `irq_name -> irq_number`.
    pub irqs: HashMap<String, i32>,
}

impl CmsisHeaderTables {
    /// Whether `name` matches the CMSIS reserved-padding convention
    /// `RESERVED[0-9]?`, which the cross-check (§4.6) skips entirely.
    pub fn is_reserved(name: &str) -> bool {
        let Some(rest) = name.strip_prefix("RESERVED") else { return false };
        rest.is_empty() || (rest.len() == 1 && rest.chars().next().unwrap().is_ascii_digit())
    }

    /// Fields of `peripheral_name`, skipping reserved padding members.
    pub fn fields_of(&self, peripheral_name: &str) -> impl Iterator<Item = &CmsisField> {
        self.peripherals
            .get(peripheral_name)
            .into_iter()
            .flatten()
            .filter(|field| !Self::is_reserved(&field.name))
    }
}
