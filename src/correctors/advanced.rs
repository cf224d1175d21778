//! The advanced corrector tree (§4.4): applied after structural merge, once
//! every SVD's view of a peripheral has been absorbed into one tree, so its
//! actions can rely on the merged shape rather than any single vendor's.
//!
//! Grounded in the `RCC` section of `cleaners/corrector.py`: some vendor SVDs
//! only describe a clock-enable bit for the first port of a family (e.g.
//! `GPIOAEN`) and leave the rest for the driver to infer by pattern. The
//! advanced tree clones that seed field out to the rest of the family once
//! the merged register is available to inspect.
use crate::corrector::{Action, Corrector};
use std::rc::Rc;

/// Ports cloned from the `GPIOAEN` template, in family order.
const CLONED_PORTS: [&str; 7] = ["GPIOBEN", "GPIOCEN", "GPIODEN", "GPIOEEN", "GPIOFEN", "GPIOGEN", "GPIOHEN"];

/// Builds the advanced tree.
pub fn advanced_tree() -> Corrector {
    Corrector::branch([("RCC", Corrector::branch([("AHB1ENR", Corrector::leaf(clone_gpio_enable_bits()))]))])
}

/// `AHB1ENR`'s `GPIOAEN` bit is the template every other port's enable bit
/// is cloned from; `clone_field` is a no-op once a vendor's own SVD already
/// defines the port's bit, so later absorb doesn't double it up.
fn clone_gpio_enable_bits() -> Action {
    Rc::new(|c: &mut dyn crate::corrector::Correctable| {
        for port in CLONED_PORTS {
            c.clone_field("GPIOAEN", port)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::access::Access;
    use crate::model::chipset::ChipSet;
    use crate::model::field::Field;
    use crate::model::peripheral::Peripheral;
    use crate::model::register::Register;

    #[test]
    fn gpio_enable_bit_cloned_to_every_port() {
        let mut peripheral = Peripheral::new(ChipSet::new(), "RCC", None);
        let mut ahb1enr = Register::new(ChipSet::new(), "AHB1ENR", None, 32, Access::ReadWrite);
        ahb1enr.add_field(Field::new(ChipSet::new(), "GPIOAEN", None, 0, 1)).unwrap();
        peripheral.add_register(ahb1enr).unwrap();

        advanced_tree().apply_fixes(&mut peripheral, 100).unwrap();

        let register = peripheral.register("AHB1ENR").unwrap();
        assert!(register.fields().iter().any(|f| f.name() == "GPIOBEN"));
        assert!(register.fields().iter().any(|f| f.name() == "GPIOHEN"));
        assert_eq!(register.fields().len(), 8);
    }
}
