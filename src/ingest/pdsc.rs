//! PDSC chip-index adapter (§6): turns the raw `(define, processor?,
//! processor_define?, svd_path, header_path)` tuples a pack-retrieval
//! collaborator hands over into [`Chip`]s, dropping incomplete ones with a
//! warning rather than failing the whole pack (§7 "Parse errors").
//!
//! Traversing the PDSC XML itself is out of scope (§1); this module starts
//! from the already-extracted tuple shape the external collaborator is
//! specified to produce.

use crate::model::Chip;

/// One raw row as handed over by a PDSC-traversal collaborator, before it is
/// known to be complete enough to build a [`Chip`].
#[derive(Clone, Debug, Default)]
pub struct RawChipRow {
    /// The chip's preprocessor define, e.g. `STM32F401xE`.
    pub define: Option<String>,
    /// Path to the chip's SVD file.
    pub svd_path: Option<String>,
    /// Path to the chip's CMSIS C header.
    pub header_path: Option<String>,
    /// Secondary-processor identifier (the `Pname` attribute), for
    /// multi-core parts.
    pub processor: Option<String>,
    /// Secondary-processor define (the `Pdefine` attribute).
    pub processor_define: Option<String>,
}

/// Builds [`Chip`]s out of `rows`, dropping any row missing `define`,
/// `svd_path` or `header_path` and logging a warning naming which field was
/// absent (§7 "Incomplete tuples are dropped with a warning").
pub fn collect_chips(rows: impl IntoIterator<Item = RawChipRow>) -> Vec<Chip> {
    let mut chips = Vec::new();
    for row in rows {
        let (Some(define), Some(svd_path), Some(header_path)) =
            (row.define.clone(), row.svd_path.clone(), row.header_path.clone())
        else {
            tracing::warn!(?row, "dropping incomplete PDSC chip row");
            continue;
        };
        let mut chip = Chip::new(define, header_path, svd_path);
        if let (Some(processor), Some(processor_define)) = (row.processor, row.processor_define) {
            chip = chip.with_processor(processor, processor_define);
        }
        chips.push(chip);
    }
    chips
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_incomplete_rows() {
        let rows = [
            RawChipRow {
                define: Some("STM32F401xE".to_owned()),
                svd_path: Some("f401.svd".to_owned()),
                header_path: Some("f401.h".to_owned()),
                ..Default::default()
            },
            RawChipRow { define: Some("STM32F411xE".to_owned()), ..Default::default() },
        ];
        let chips = collect_chips(rows);
        assert_eq!(chips.len(), 1);
        assert_eq!(chips[0].define(), "STM32F401xE");
    }
}
