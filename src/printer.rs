//! Guard-expression and C++ printer (§4.7, §11.1, §11.2).
//!
//! A tree walk that `writeln!`s straight into a caller-supplied sink rather
//! than building an intermediate AST, since the output is a fixed textual
//! shape with no further transformation downstream.

use crate::config::Config;
use crate::model::{ChipSet, Field, Group, MappingTarget, Peripheral, PeripheralInstance, Register};
use crate::universe::ChipUniverse;
use eyre::Result;
use std::io::Write;

/// Emits one `<GROUP>_struct.h`'s worth of C++ for `group` into `output`
/// (§4.7). Peripherals are declared in their stored order (§5 ordering
/// guarantee: merge order within a Group), followed by every peripheral's
/// virtual instances (§11.2), declared only after every class body so no
/// instance pointer references an incomplete type.
pub fn print_group(output: &mut impl Write, group: &Group, universe: &ChipUniverse, config: &Config) -> Result<()> {
    writeln!(output, "#pragma once")?;
    writeln!(output)?;

    for peripheral in group.peripherals() {
        if config.is_excluded(peripheral.name()) {
            continue;
        }
        print_peripheral(output, peripheral, group.chips(), universe, config)?;
        writeln!(output)?;
    }

    for peripheral in group.peripherals() {
        if config.is_excluded(peripheral.name()) {
            continue;
        }
        print_instances(output, peripheral, group.chips(), universe, config)?;
    }

    Ok(())
}

fn needs_guard(chips: &ChipSet, parent_chips: &ChipSet) -> bool {
    chips.is_strict_subset(parent_chips)
}

fn guard_expr(chips: &ChipSet, universe: &ChipUniverse, config: &Config) -> String {
    universe.defined_list(chips, config.chips_per_line, &config.newline_prefix)
}

fn print_peripheral(
    output: &mut impl Write,
    peripheral: &Peripheral,
    group_chips: &ChipSet,
    universe: &ChipUniverse,
    config: &Config,
) -> Result<()> {
    if let Some(brief) = peripheral.base().brief() {
        writeln!(output, "/// {brief}")?;
    }

    let guarded = needs_guard(peripheral.chips(), group_chips);
    if guarded {
        writeln!(output, "#ifdef PERIPH_{}", peripheral.name())?;
    }
    writeln!(output, "#define SOOL_{}_AVAILABLE", peripheral.name().to_uppercase())?;

    match peripheral.inherit_from() {
        Some(base) => writeln!(output, "class {} : public {base} {{", peripheral.name())?,
        None => writeln!(output, "class {} {{", peripheral.name())?,
    }
    writeln!(output, "public:")?;

    let mut registers: Vec<&Register> = peripheral.registers().iter().collect();
    registers.sort_by_key(|r| r.name());
    for register in &registers {
        print_register(output, register, peripheral.chips(), universe, config)?;
    }

    let mappings = peripheral.mappings();
    if mappings.len() > 1 {
        writeln!(output, "    union {{")?;
        for mapping in mappings {
            writeln!(output, "        struct {{")?;
            for element in mapping.elements() {
                writeln!(
                    output,
                    "            {} {};",
                    element.target().name(),
                    element.name()
                )?;
            }
            writeln!(output, "        }};")?;
        }
        writeln!(output, "    }};")?;
    } else if let Some(mapping) = mappings.first() {
        for element in mapping.elements() {
            if element.array_size() > 0 {
                writeln!(
                    output,
                    "    {} {}[{}];",
                    element.target().name(),
                    element.name(),
                    element.array_size()
                )?;
            } else {
                writeln!(output, "    {} {};", element.target().name(), element.name())?;
            }
        }
    }

    writeln!(output, "    uintptr_t get_addr() const;")?;
    writeln!(output, "private:")?;
    writeln!(output, "    {}() = delete;", peripheral.name())?;
    writeln!(output, "}};")?;
    writeln!(output, "#undef SOOL_{}_AVAILABLE", peripheral.name().to_uppercase())?;
    if guarded {
        writeln!(output, "#endif")?;
    }
    Ok(())
}

fn print_register(
    output: &mut impl Write,
    register: &Register,
    peripheral_chips: &ChipSet,
    universe: &ChipUniverse,
    config: &Config,
) -> Result<()> {
    let guarded = needs_guard(register.chips(), peripheral_chips);
    if guarded {
        writeln!(output, "    #if {}", guard_expr(register.chips(), universe, config))?;
    }
    writeln!(output, "    struct {}_t : public Reg{}_t {{", register.name(), register.size())?;
    writeln!(output, "        using Reg{}_t::operator=;", register.size())?;
    for field in register.fields() {
        print_field(output, field, register, peripheral_chips, universe, config)?;
    }
    writeln!(output, "    }};")?;
    if guarded {
        writeln!(output, "    #endif")?;
    }
    Ok(())
}

fn print_field(
    output: &mut impl Write,
    field: &Field,
    register: &Register,
    peripheral_chips: &ChipSet,
    universe: &ChipUniverse,
    config: &Config,
) -> Result<()> {
    let guarded = needs_guard(field.chips(), peripheral_chips);
    if guarded {
        writeln!(output, "        #if {}", guard_expr(field.chips(), universe, config))?;
    }
    write!(
        output,
        "        {} {} : {};",
        bitfield_int_type(field.position(), field.size(), register.size()),
        field.name(),
        field.size()
    )?;
    match field.base().brief() {
        Some(brief) => writeln!(output, " /// {brief}")?,
        None => writeln!(output)?,
    }
    if guarded {
        writeln!(output, "        #endif")?;
    }
    Ok(())
}

/// The smallest standard integer width whose natural alignment doesn't
/// straddle the field's bit range, without exceeding the enclosing
/// register's own width (§11.1, grounded in `field.py`).
fn bitfield_int_type(position: u32, size: u32, register_size: u32) -> &'static str {
    for bits in [8u32, 16, 32, 64] {
        if bits < size || bits > register_size {
            continue;
        }
        if position / bits == (position + size - 1) / bits {
            return int_type_name(bits);
        }
    }
    int_type_name(register_size.max(8))
}

fn int_type_name(bits: u32) -> &'static str {
    match bits {
        8 => "uint8_t",
        16 => "uint16_t",
        32 => "uint32_t",
        _ => "uint64_t",
    }
}

/// Declares `peripheral`'s virtual instances (§11.2): same-named instances
/// across chips are folded into one before declaration, then sorted
/// unguarded-first, then by name, so the always-present instances read
/// first in the header.
fn print_instances(
    output: &mut impl Write,
    peripheral: &Peripheral,
    group_chips: &ChipSet,
    universe: &ChipUniverse,
    config: &Config,
) -> Result<()> {
    let virtual_instances = fold_virtual_instances(peripheral.instances());
    let mut ordered: Vec<&PeripheralInstance> = virtual_instances.iter().collect();
    ordered.sort_by_key(|i| (needs_guard(i.chips(), group_chips), i.name().to_owned()));

    for instance in ordered {
        let instance_guarded = needs_guard(instance.chips(), group_chips);
        let peripheral_guarded = needs_guard(peripheral.chips(), group_chips);
        if instance_guarded || peripheral_guarded {
            write!(output, "#if defined({}_BASE_ADDR)", instance.name())?;
            if peripheral_guarded {
                write!(output, " && defined(PERIPH_{})", peripheral.name())?;
            }
            writeln!(output)?;
        }
        writeln!(
            output,
            "volatile class {} * const {} = reinterpret_cast<class {} * const>({}_BASE_ADDR);",
            peripheral.name(),
            instance.name(),
            peripheral.name(),
            instance.name()
        )?;
        if instance_guarded || peripheral_guarded {
            writeln!(output, "#endif")?;
        }
    }
    Ok(())
}

/// Folds same-named instances across chips into one, unioning their
/// chipsets, so a chip defining the same conceptual instance doesn't
/// produce a second declaration (§11.2).
fn fold_virtual_instances(instances: &[PeripheralInstance]) -> Vec<PeripheralInstance> {
    let mut out: Vec<PeripheralInstance> = Vec::new();
    for instance in instances {
        match out.iter_mut().find(|i| i.name() == instance.name()) {
            Some(existing) => {
                let _ = existing.base_mut().union_chips(instance.chips());
            }
            None => out.push(instance.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Access, Chip, MappingElement};

    // Scenario A (§8.3): a single-chip register whose chipset equals the
    // peripheral's own prints unguarded, with guard "1".
    #[test]
    fn scenario_a_single_field_bitmask_register() {
        let chip = Chip::new("CHIPA", "a.h", "a.svd");
        let chips = ChipSet::from_chips([chip]);
        ChipSet::reset_reference();
        ChipSet::observe(&chips);

        let mut register = Register::new(chips.clone(), "RX", None, 32, Access::ReadWrite);
        register.add_field(Field::new(chips.clone(), "EN", None, 0, 1)).unwrap();
        register.add_field(Field::new(chips.clone(), "IE", None, 1, 1)).unwrap();

        let mut peripheral = Peripheral::new(chips.clone(), "PERIPHA", None);
        peripheral.add_register(register).unwrap();
        peripheral
            .place_element(MappingElement::new(
                chips.clone(),
                "RX",
                None,
                0x00,
                MappingTarget::Register("RX".to_owned()),
                32,
            ))
            .unwrap();

        let mut group = Group::new(chips.clone(), "GROUPA");
        group.add_peripheral(peripheral).unwrap();

        let universe = ChipUniverse::ambient();
        let config = Config::default();
        let mut out = Vec::new();
        print_group(&mut out, &group, &universe, &config).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("struct RX_t"));
        assert!(!text.contains("#if defined(CHIPA)"));
    }

    #[test]
    fn field_bitfield_type_respects_byte_alignment() {
        assert_eq!(bitfield_int_type(0, 4, 32), "uint8_t");
        assert_eq!(bitfield_int_type(6, 4, 32), "uint16_t");
        assert_eq!(bitfield_int_type(0, 32, 32), "uint32_t");
    }

    #[test]
    fn virtual_instances_dedup_by_name() {
        let chip_a = Chip::new("CHIPA", "a.h", "a.svd");
        let chip_b = Chip::new("CHIPB", "b.h", "b.svd");
        let a = PeripheralInstance::new(ChipSet::from_chips([chip_a]), "USART1", 0x4001_1000);
        let b = PeripheralInstance::new(ChipSet::from_chips([chip_b]), "USART1", 0x4001_1000);
        let folded = fold_virtual_instances(&[a, b]);
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0].chips().len(), 2);
    }
}
