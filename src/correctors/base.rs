//! The base corrector tree (§4.4): applied to each peripheral right after
//! parse, before structural merge, to normalise vendor SVD naming quirks
//! that would otherwise stop two chips' descriptions of the "same"
//! peripheral from comparing equal.
//!
//! Grounded in `cleaners/corrector.py`'s top-level dict: a handful of
//! peripheral-name entries for the families that need bespoke treatment,
//! plus a catch-all that runs on everything else.

use crate::corrector::{modify, rename, strip_instance_prefix, Corrector};

/// Builds the base tree. Keyed at the first level on peripheral name
/// (literal names for the families below, `"*"` for everything else).
pub fn base_tree() -> Corrector {
    Corrector::branch([("GPIO", gpio_tree()), ("*", Corrector::leaf(strip_instance_prefix()))])
}

/// GPIO ports across a chip family share one register layout; only the
/// naming drifts between vendor SVDs (`MODE` vs the CMSIS-standard `MODER`,
/// a `LCKR` brief vendors routinely omit).
fn gpio_tree() -> Corrector {
    Corrector::branch([
        ("MODE", Corrector::leaf(rename("MODER"))),
        ("LCKR", Corrector::leaf(modify(None, Some("port configuration lock register"), None))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::access::Access;
    use crate::model::chipset::ChipSet;
    use crate::model::peripheral::Peripheral;
    use crate::model::register::Register;

    #[test]
    fn gpio_register_naming_normalised() {
        let mut peripheral = Peripheral::new(ChipSet::new(), "GPIO", None);
        peripheral.add_register(Register::new(ChipSet::new(), "MODE", None, 32, Access::ReadWrite)).unwrap();
        peripheral.add_register(Register::new(ChipSet::new(), "LCKR", None, 32, Access::ReadWrite)).unwrap();

        base_tree().apply_fixes(&mut peripheral, 100).unwrap();

        let moder = peripheral.register("MODER").expect("MODE renamed to MODER");
        assert_eq!(moder.name(), "MODER");
        let lckr = peripheral.register("LCKR").unwrap();
        assert_eq!(lckr.base().brief(), Some("port configuration lock register"));
    }

    #[test]
    fn unrelated_peripheral_falls_through_to_prefix_strip() {
        let mut peripheral = Peripheral::new(ChipSet::new(), "TIM", None);
        peripheral.add_register(Register::new(ChipSet::new(), "TIM_CR1", None, 32, Access::ReadWrite)).unwrap();
        base_tree().apply_fixes(&mut peripheral, 100).unwrap();
        // Single-instance peripheral (no instances declared): prefix is left alone.
        assert_eq!(peripheral.registers()[0].name(), "TIM_CR1");
    }
}
