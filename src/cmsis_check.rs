//! Cross-checks a merged [`Peripheral`] against vendor CMSIS header tables
//! (§4.6). Every discrepancy is a warning, never a failure: it is both
//! `tracing::warn!`-logged at the point of detection and appended to the
//! returned diagnostics list, per §10.1's "nothing logged only in one of the
//! two channels" rule.

use crate::ingest::cmsis::CmsisHeaderTables;
use crate::model::{MappingTarget, Peripheral};
use std::collections::HashMap;

/// One cross-check discrepancy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CmsisMismatch {
    /// The peripheral the mismatch was found on.
    pub peripheral: String,
    /// The chip define whose header table produced the mismatch, or `None`
    /// for the "no header carries this peripheral at all" case.
    pub chip: Option<String>,
    /// Human-readable description of the discrepancy.
    pub message: String,
}

/// Cross-checks `peripheral` against one header table per chip define that
/// carries it (§4.6). `chip_headers` maps a chip define to the CMSIS tables
/// parsed from that chip's header.
pub fn cross_check(
    peripheral: &Peripheral,
    chip_headers: &HashMap<String, CmsisHeaderTables>,
) -> Vec<CmsisMismatch> {
    let mut diagnostics = Vec::new();
    let mut any_header_carries = false;

    for chip in peripheral.chips().iter() {
        let Some(header) = chip_headers.get(chip.define()) else { continue };
        let Some(fields) = header.peripherals.get(peripheral.name()) else { continue };
        any_header_carries = true;

        for field in header.fields_of(peripheral.name()) {
            let element = peripheral
                .mappings()
                .iter()
                .flat_map(|m| m.elements())
                .find(|e| e.name() == field.name);
            let Some(element) = element else { continue };

            if field.array_size > 1 && element.array_size() != field.array_size {
                diagnostics.push(warn_mismatch(
                    peripheral.name(),
                    Some(chip.name()),
                    format!(
                        "array size mismatch on `{}`: header declares {} but merged element has {}",
                        field.name,
                        field.array_size,
                        element.array_size().max(1)
                    ),
                ));
            }

            let is_sub_peripheral = matches!(element.target(), MappingTarget::Peripheral(_));
            if !field.is_struct_type() && is_sub_peripheral {
                diagnostics.push(warn_mismatch(
                    peripheral.name(),
                    Some(chip.name()),
                    format!(
                        "`{}` is a scalar type in the header but resolves to a sub-peripheral",
                        field.name
                    ),
                ));
            }
            if field.is_struct_type() && !is_sub_peripheral {
                diagnostics.push(warn_mismatch(
                    peripheral.name(),
                    Some(chip.name()),
                    format!(
                        "`{}` is a struct type in the header but resolves to a plain register",
                        field.name
                    ),
                ));
            }
        }
        let _ = fields;
    }

    if !any_header_carries {
        diagnostics.push(warn_mismatch(
            peripheral.name(),
            None,
            "no CMSIS header carries this peripheral".to_owned(),
        ));
    }

    diagnostics
}

fn warn_mismatch(peripheral: &str, chip: Option<String>, message: String) -> CmsisMismatch {
    tracing::warn!(peripheral, chip = chip.as_deref(), %message, "CMSIS cross-check mismatch");
    CmsisMismatch { peripheral: peripheral.to_owned(), chip, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::cmsis::CmsisField;
    use crate::model::{Chip, ChipSet, Field, MappingElement, Register};

    fn peripheral_with_register() -> (Peripheral, Chip) {
        let chip = Chip::new("STM32F401xE", "f401.h", "f401.svd");
        let chips = ChipSet::from_chips([chip.clone()]);
        let mut p = Peripheral::new(chips.clone(), "GPIOA", None);
        let mut reg = Register::new(chips.clone(), "MODER", None, 32, crate::model::Access::ReadWrite);
        reg.add_field(Field::new(chips.clone(), "MODER0", None, 0, 2)).unwrap();
        p.add_register(reg).unwrap();
        p.place_element(MappingElement::new(
            chips.clone(),
            "MODER",
            None,
            0x00,
            MappingTarget::Register("MODER".to_owned()),
            32,
        ))
        .unwrap();
        (p, chip)
    }

    #[test]
    fn missing_header_warns_once() {
        let (peripheral, _chip) = peripheral_with_register();
        let diagnostics = cross_check(&peripheral, &HashMap::new());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("no CMSIS header"));
    }

    #[test]
    fn struct_vs_scalar_mismatch_detected() {
        let (peripheral, chip) = peripheral_with_register();
        let mut headers = HashMap::new();
        let mut table = CmsisHeaderTables::default();
        table.peripherals.insert(
            "GPIOA".to_owned(),
            vec![CmsisField { name: "MODER".to_owned(), c_type: "GPIOA_Type".to_owned(), array_size: 0 }],
        );
        headers.insert(chip.define().to_owned(), table);
        let diagnostics = cross_check(&peripheral, &headers);
        assert!(diagnostics.iter().any(|d| d.message.contains("struct type")));
    }
}
