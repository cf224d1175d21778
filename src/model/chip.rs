//! A single target-hardware variant identified by a preprocessor define.

use std::fmt;

/// One chip variant drawn from a vendor pack: a preprocessor define, the
/// paths to its SVD and CMSIS header, and an optional secondary processor
/// identifier for multi-core parts.
///
/// Equality and hashing are by `(define, header, svd, processor)` (§3.1):
/// two `Chip`s that happen to share a define but come from different
/// header/SVD pairs are distinct chips.
#[derive(Clone, Debug, Eq)]
pub struct Chip {
    define: String,
    header: String,
    svd: String,
    processor: Option<String>,
    processor_define: Option<String>,
    cmsis_options: Vec<(String, String)>,
}

impl Chip {
    /// Creates a chip from its PDSC-derived fields.
    pub fn new(define: impl Into<String>, header: impl Into<String>, svd: impl Into<String>) -> Self {
        Self {
            define: define.into(),
            header: header.into(),
            svd: svd.into(),
            processor: None,
            processor_define: None,
            cmsis_options: Vec::new(),
        }
    }

    /// Attaches a secondary-processor identifier, for multi-core packages.
    #[must_use]
    pub fn with_processor(
        mut self,
        processor: impl Into<String>,
        processor_define: impl Into<String>,
    ) -> Self {
        self.processor = Some(processor.into());
        self.processor_define = Some(processor_define.into());
        self
    }

    /// Attaches the vendor CMSIS options (`__NVIC_PRIO_BITS` and friends)
    /// this chip's header expects to see predefined (§3.1 expansion,
    /// grounded in `sool/structure/chip.py`). Feeds
    /// [`crate::output::print_cmsis_config`] once collected per chip.
    #[must_use]
    pub fn with_cmsis_options(mut self, options: impl IntoIterator<Item = (String, String)>) -> Self {
        self.cmsis_options = options.into_iter().collect();
        self
    }

    /// This chip's vendor CMSIS options, in the order they were attached.
    pub fn cmsis_options(&self) -> &[(String, String)] {
        &self.cmsis_options
    }

    /// The raw vendor define, e.g. `STM32F401xE`.
    pub fn define(&self) -> &str {
        &self.define
    }

    /// Path to the chip's CMSIS C header.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Path to the chip's SVD file.
    pub fn svd(&self) -> &str {
        &self.svd
    }

    /// The secondary-processor identifier, if any.
    pub fn processor(&self) -> Option<&str> {
        self.processor.as_deref()
    }

    /// `define["_"+processor_define]` (§3.1).
    pub fn computed_define(&self) -> String {
        match &self.processor_define {
            Some(pdefine) => format!("{}_{pdefine}", self.define),
            None => self.define.clone(),
        }
    }

    /// The chip's preprocessor-visible name; an alias for [`Chip::computed_define`].
    pub fn name(&self) -> String {
        self.computed_define()
    }

    /// Family prefix: first 7 characters, or first 8 for the `STM32MP` sub-family.
    ///
    /// Panics if `name` is shorter than the prefix it asks for; callers are
    /// expected to have already validated chip names at ingest time.
    pub fn family_of(name: &str) -> String {
        let prefix_len = if name.starts_with("STM32MP") { 8 } else { 7 };
        name.chars().take(prefix_len).collect::<String>().to_uppercase()
    }

    /// This chip's family, per [`Chip::family_of`].
    pub fn family(&self) -> String {
        Self::family_of(&self.name())
    }

    /// Shell-glob match (`?`, `*`, character classes) against this chip's name.
    pub fn matches(&self, pattern: &str) -> bool {
        crate::corrector::glob_match(pattern, &self.name())
    }

    /// Canonicalises path separators and define casing in place (§3.1
    /// expansion, grounded in `sool/structure/chip.py`): PDSC tuples are
    /// handed over with whatever separator and case the vendor archive used
    /// on disk, and the merge engine compares `header`/`svd` paths and
    /// `define` strings by simple equality, so they must agree before a
    /// chip ever enters a [`super::ChipSet`].
    pub fn normalize(&mut self) {
        self.define = self.define.to_uppercase();
        self.header = self.header.replace('\\', "/");
        self.svd = self.svd.replace('\\', "/");
    }
}

impl PartialEq for Chip {
    fn eq(&self, other: &Self) -> bool {
        self.define == other.define
            && self.header == other.header
            && self.svd == other.svd
            && self.processor == other.processor
    }
}

impl std::hash::Hash for Chip {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.define.hash(state);
        self.header.hash(state);
        self.svd.hash(state);
        self.processor.hash(state);
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computed_define_appends_processor() {
        let chip = Chip::new("STM32H745", "h745.h", "h745.svd").with_processor("cm7", "CM7");
        assert_eq!(chip.computed_define(), "STM32H745_CM7");
    }

    #[test]
    fn family_of_collapses_to_seven_chars() {
        assert_eq!(Chip::family_of("STM32F401xE"), "STM32F4");
    }

    #[test]
    fn family_of_mp_series_keeps_eight_chars() {
        assert_eq!(Chip::family_of("STM32MP157C"), "STM32MP1");
    }

    #[test]
    fn equality_ignores_computed_define_and_uses_identity_fields() {
        let a = Chip::new("STM32F401xE", "h.h", "s.svd");
        let b = Chip::new("STM32F401xE", "h.h", "s.svd");
        assert_eq!(a, b);
        let c = Chip::new("STM32F401xE", "other.h", "s.svd");
        assert_ne!(a, c);
    }

    #[test]
    fn cmsis_options_round_trip() {
        let chip = Chip::new("STM32F401xE", "h.h", "s.svd")
            .with_cmsis_options([("__NVIC_PRIO_BITS".to_owned(), "4".to_owned())]);
        assert_eq!(chip.cmsis_options(), [("__NVIC_PRIO_BITS".to_owned(), "4".to_owned())]);
    }

    #[test]
    fn normalize_uppercases_define_and_unifies_separators() {
        let mut chip = Chip::new("stm32f401xe", r"vendor\f401.h", r"vendor\f401.svd");
        chip.normalize();
        assert_eq!(chip.define(), "STM32F401XE");
        assert_eq!(chip.header(), "vendor/f401.h");
        assert_eq!(chip.svd(), "vendor/f401.svd");
    }
}
