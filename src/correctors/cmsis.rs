//! The CMSIS corrector tree (§4.4): a lighter-weight normalisation pass run
//! over a vendor header's parsed field table before the §4.6 cross-check, so
//! that header-only name drift doesn't read as a structural mismatch.
//!
//! Unlike the base and advanced trees, this one doesn't walk the
//! `Correctable` component tree at all -- a [`CmsisHeaderTables`] is a flat
//! ingest shape, not a merged component -- so it's expressed as plain
//! glob-keyed rename rules applied directly to [`CmsisField`] names.

use crate::corrector::glob_match;
use crate::ingest::cmsis::CmsisHeaderTables;

/// One `pattern -> replacement` rewrite, applied to every field name on
/// every peripheral's member table that matches `pattern`.
pub struct CmsisRename {
    /// Shell-glob pattern matched against a [`CmsisField`]'s name.
    pub pattern: &'static str,
    /// Replacement name used when `pattern` matches.
    pub replacement: &'static str,
}

/// The CMSIS tree's rewrite rules, grounded in the vendor-header section of
/// `cleaners/corrector.py`: some ST headers emit a stray `X` suffix on the
/// GPIO lock register's member name that the SVD-derived model never
/// carries.
pub fn cmsis_renames() -> Vec<CmsisRename> {
    vec![CmsisRename { pattern: "LCKRX", replacement: "LCKR" }]
}

/// Applies every rule from [`cmsis_renames`] to `tables`, in place.
pub fn normalize(tables: &mut CmsisHeaderTables) {
    let rules = cmsis_renames();
    for fields in tables.peripherals.values_mut() {
        for field in fields.iter_mut() {
            for rule in &rules {
                if glob_match(rule.pattern, &field.name) {
                    field.name = rule.replacement.to_owned();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::cmsis::CmsisField;

    #[test]
    fn stray_lock_register_suffix_normalised() {
        let mut tables = CmsisHeaderTables::default();
        tables.peripherals.insert(
            "GPIOA".to_owned(),
            vec![CmsisField { name: "LCKRX".to_owned(), c_type: "uint32_t".to_owned(), array_size: 0 }],
        );
        normalize(&mut tables);
        assert_eq!(tables.peripherals["GPIOA"][0].name, "LCKR");
    }
}
