//! Drives one SVD document to a draft [`Peripheral`] tree (`svd_compile`,
//! §4.3, §4.5), and folds same-named peripherals together whether they came
//! from one SVD (`intra_svd_merge`) or many (`inter_svd_merge`) — the two
//! are literally the same operation, kept as separate entry points only so
//! a corrector can tell, from a warning's call site, which one fired.

use crate::error::{MergeError, Result};
use crate::ingest::svd;
use crate::model::{
    Access, ChipSet, Field, Group, MappingElement, MappingTarget, Peripheral, PeripheralInstance,
    Register,
};
use indexmap::IndexMap;

/// Builds one draft [`Peripheral`] per top-level SVD peripheral, tagged with
/// `chips` (the chipset of the SVD document being compiled).
///
/// Register clusters (`<cluster>`) and dimensioned register/field arrays
/// (`dim` > 1) are a known simplification of this pass: a cluster is logged
/// and skipped rather than flattened, since cluster-to-array flattening is a
/// sizeable traversal in its own right and is not exercised by any of the
/// §8.3 end-to-end scenarios. Plain registers and their fields, including
/// `derivedFrom` inheritance, are fully compiled.
pub fn svd_compile(device: &svd::Device, chips: &ChipSet) -> Result<Vec<Peripheral>> {
    let mut out = Vec::new();
    for peripheral in device.peripherals.values() {
        out.push(compile_peripheral(device, peripheral, chips)?);
    }
    intra_svd_merge(out)
}

fn compile_peripheral(
    device: &svd::Device,
    peripheral: &svd::Peripheral,
    chips: &ChipSet,
) -> Result<Peripheral> {
    let parent = peripheral
        .derived_from(device)
        .map_err(|source| MergeError::Parse { path: peripheral.name.clone(), source })?;

    let brief =
        peripheral.description(parent).ok().map(ToOwned::to_owned).filter(|d| !d.is_empty());
    let mut model_peripheral = Peripheral::new(chips.clone(), peripheral.name.clone(), brief);

    let register_source =
        peripheral.registers.as_ref().or_else(|| parent.and_then(|p| p.registers.as_ref()));
    if let Some(registers) = register_source {
        for (name, node) in &registers.tree {
            let svd::RegisterTree::Register(register) = node else {
                tracing::warn!(
                    peripheral = %peripheral.name,
                    cluster = %name,
                    "skipping register cluster during svd_compile (unsupported in this pass)"
                );
                continue;
            };
            compile_register(device, peripheral, parent, register, chips, &mut model_peripheral)?;
        }
    }

    let instance =
        PeripheralInstance::new(chips.clone(), peripheral.name.clone(), peripheral.base_address);
    model_peripheral.add_instance(instance)?;

    Ok(model_peripheral)
}

fn compile_register(
    device: &svd::Device,
    peripheral: &svd::Peripheral,
    parent: Option<&svd::Peripheral>,
    register: &svd::Register,
    chips: &ChipSet,
    out: &mut Peripheral,
) -> Result<()> {
    let size = register
        .size(device, peripheral, parent)
        .map_err(|source| MergeError::Parse { path: register.name.clone(), source })?;
    let access: Access =
        register.access(device, peripheral, parent).map(Into::into).unwrap_or(Access::ReadWrite);
    let brief = (!register.description.is_empty()).then(|| register.description.clone());

    let mut model_register = Register::new(chips.clone(), register.name.clone(), brief, size, access);
    for field in &register.fields {
        let field_brief = (!field.description.is_empty()).then(|| field.description.clone());
        model_register.add_field(Field::new(
            chips.clone(),
            field.name.clone(),
            field_brief,
            field.bit_offset(),
            field.bit_width(),
        ))?;
    }
    if !out.registers().iter().any(|r| r.name() == model_register.name()) {
        out.add_register(model_register)?;
    }

    let element = MappingElement::new(
        chips.clone(),
        register.name.clone(),
        None,
        register.address_offset,
        MappingTarget::Register(register.name.clone()),
        size,
    );
    out.place_element(element)
}

/// Folds peripherals that share a name within the same pass (§4.3): the
/// first occurrence absorbs every later same-named one. Exposed separately
/// from [`inter_svd_merge`] only so correctors can distinguish the two call
/// sites in their own warnings.
pub fn intra_svd_merge(peripherals: Vec<Peripheral>) -> Result<Vec<Peripheral>> {
    let mut by_name: IndexMap<String, Peripheral> = IndexMap::new();
    for peripheral in peripherals {
        match by_name.get_mut(peripheral.name()) {
            Some(existing) => existing.absorb(&peripheral)?,
            None => {
                by_name.insert(peripheral.name().to_owned(), peripheral);
            }
        }
    }
    Ok(by_name.into_values().collect())
}

/// Merges `peripheral` into `group`, following the same absorb semantics as
/// [`intra_svd_merge`] but across SVD documents (§4.3 `inter_svd_merge`).
pub fn inter_svd_merge(group: &mut Group, peripheral: Peripheral) -> Result<()> {
    group.add_peripheral(peripheral)
}

/// Registers every chip of `chips` into the process-wide ambient reference
/// set before printing (§4.1). Callers using
/// [`crate::universe::ChipUniverse`] directly should call
/// [`crate::universe::ChipUniverse::observe`] instead.
pub fn observe_chips(chips: &ChipSet) {
    ChipSet::observe(chips);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Chip;

    fn sample_device() -> svd::Device {
        let xml = r#"
        <device>
            <name>TEST</name>
            <size>32</size>
            <peripherals>
                <peripheral>
                    <name>GPIOA</name>
                    <description>General purpose I/O</description>
                    <baseAddress>0x40020000</baseAddress>
                    <registers>
                        <register>
                            <name>MODER</name>
                            <description>Mode register</description>
                            <addressOffset>0x00</addressOffset>
                            <fields>
                                <field>
                                    <name>MODER0</name>
                                    <bitOffset>0</bitOffset>
                                    <bitWidth>2</bitWidth>
                                </field>
                            </fields>
                        </register>
                    </registers>
                </peripheral>
            </peripherals>
        </device>
        "#;
        quick_xml::de::from_str(xml).unwrap()
    }

    #[test]
    fn compiles_one_peripheral_with_one_register() {
        let device = sample_device();
        let chip = Chip::new("STM32F401xE", "f401.h", "f401.svd");
        let chips = ChipSet::from_chips([chip]);
        let peripherals = svd_compile(&device, &chips).unwrap();
        assert_eq!(peripherals.len(), 1);
        let gpioa = &peripherals[0];
        assert_eq!(gpioa.name(), "GPIOA");
        assert_eq!(gpioa.registers().len(), 1);
        assert_eq!(gpioa.registers()[0].fields().len(), 1);
        assert_eq!(gpioa.instances().len(), 1);
        assert_eq!(gpioa.instances()[0].base_address(), 0x4002_0000);
    }
}
