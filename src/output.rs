//! Optional side-output builders (§6, §11.3): everything beyond the
//! `<GROUP>_struct.h` headers [`crate::printer`] already covers.
//!
//! Per §6's expansion note, every builder here hands back an in-memory
//! value -- a `String` written into a caller-supplied `impl Write`, or a
//! typed row collection against a [`RelationalSink`] the driver implements
//! -- rather than touching a filesystem or a SQL connection itself. The
//! manifest builder goes one step further: it takes the digest *function*
//! as a parameter instead of hardcoding an algorithm, so the core's
//! dependency footprint doesn't grow with however many hash algorithms a
//! driver might eventually want. [`sha1_digest`] is provided as the obvious
//! default a driver can pass in.

use crate::ingest::cmsis::CmsisHeaderTables;
use crate::model::{Chip, ChipSet, Group, MappingTarget, Peripheral};
use crate::universe::ChipUniverse;
use crate::Config;
use eyre::Result;
use indexmap::IndexMap;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::writer::Writer;
use std::collections::HashMap;
use std::io::Write as IoWrite;

// ---------------------------------------------------------------------
// IRQn.h
// ---------------------------------------------------------------------

/// One interrupt enumerator, folded across every chip that agrees on both
/// its name and number (grounded in `sool_irqn_table.py::generate_sool_irqn`).
#[derive(Clone, Debug)]
pub struct IrqEntry {
    /// The enumerator name, e.g. `USART1_IRQn`.
    pub name: String,
    /// The interrupt number CMSIS assigns it.
    pub number: i32,
    /// Chips on which `name` resolves to `number`.
    pub chips: ChipSet,
}

/// Builds the union of every `(irq_name, irq_number)` pair declared across
/// `headers` (keyed by [`Chip::define`]), unioning chipsets for pairs that
/// agree and warning (without dropping either) when the same name resolves
/// to different numbers on different chips -- an ambiguous-mapping
/// structural warning, §7.
pub fn build_irq_table(headers: &HashMap<String, CmsisHeaderTables>, universe: &ChipUniverse) -> Vec<IrqEntry> {
    let reference = universe.reference();
    let mut synthesis: IndexMap<(String, i32), ChipSet> = IndexMap::new();

    for (define, table) in headers {
        let Some(chip) = reference.iter().find(|c| c.define() == define) else { continue };
        for (irq_name, &number) in &table.irqs {
            synthesis.entry((irq_name.clone(), number)).or_insert_with(ChipSet::new).add_chip(chip.clone());
        }
    }

    let mut numbers_by_name: HashMap<&str, Vec<i32>> = HashMap::new();
    for (name, number) in synthesis.keys() {
        numbers_by_name.entry(name.as_str()).or_default().push(*number);
    }
    for (name, numbers) in &numbers_by_name {
        if numbers.iter().any(|n| n != &numbers[0]) {
            tracing::warn!(irq = name, ?numbers, "IRQ name resolves to differing numbers across chips");
        }
    }

    synthesis.into_iter().map(|((name, number), chips)| IrqEntry { name, number, chips }).collect()
}

/// Prints `IRQn.h` (§6): entries are grouped by identical chipset (not by
/// contiguous position) so that chips sharing the exact same interrupt set
/// get one guard block, then each group's members are sorted by
/// `(number, name)` -- mirroring the source's `reverse_synthesis` grouping
/// rather than re-deriving guards per entry.
pub fn print_irqn_header(
    output: &mut impl IoWrite,
    entries: &[IrqEntry],
    universe: &ChipUniverse,
    config: &Config,
) -> Result<()> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.name.cmp(&b.name)));

    let mut groups: IndexMap<ChipSet, Vec<&IrqEntry>> = IndexMap::new();
    for entry in &sorted {
        groups.entry(entry.chips.clone()).or_default().push(entry);
    }

    writeln!(output, "#pragma once")?;
    writeln!(output)?;
    writeln!(output, "#include \"sool_chip_setup.h\"")?;
    writeln!(output)?;
    writeln!(output, "#ifdef __cplusplus")?;
    writeln!(output, "extern \"C\" {{")?;
    writeln!(output, "#endif")?;
    writeln!(output)?;
    writeln!(output, "typedef enum {{")?;

    let reference = universe.reference();
    for (chips, members) in &groups {
        let need_guard = chips != &reference;
        if need_guard {
            writeln!(output, "#if {}", universe.defined_list(chips, config.chips_per_line, &config.newline_prefix))?;
        }
        for entry in members {
            writeln!(output, "    {} = {},", entry.name, entry.number)?;
        }
        if need_guard {
            writeln!(output, "#endif")?;
        }
    }

    writeln!(output, "}} IRQn_Type;")?;
    writeln!(output)?;
    writeln!(output, "#ifdef __cplusplus")?;
    writeln!(output, "}}")?;
    writeln!(output, "#endif")?;
    Ok(())
}

// ---------------------------------------------------------------------
// cmsis_config.h
// ---------------------------------------------------------------------

/// One `#define NAME VALUE` CMSIS expects a chip's header to see before it's
/// included (e.g. `__MPU_PRESENT`, `__NVIC_PRIO_BITS`).
#[derive(Clone, Debug)]
pub struct CmsisConfigOption {
    /// The macro name.
    pub name: String,
    /// The macro's replacement text.
    pub value: String,
}

/// Prints `cmsis_config.h` (§6): one `#ifdef <chip>` block per chip that has
/// options, each defining the options the driver looked up for it. `options`
/// is keyed by [`Chip::define`]; chips are emitted sorted by define so the
/// file is deterministic (§5).
pub fn print_cmsis_config(
    output: &mut impl IoWrite,
    options: &HashMap<String, Vec<CmsisConfigOption>>,
) -> Result<()> {
    writeln!(output, "#pragma once")?;
    writeln!(output)?;

    let mut defines: Vec<&String> = options.keys().collect();
    defines.sort();
    for chip_define in defines {
        let opts = &options[chip_define];
        if opts.is_empty() {
            continue;
        }
        writeln!(output, "#ifdef {chip_define}")?;
        for option in opts {
            writeln!(output, "    #define {} {}", option.name, option.value)?;
        }
        writeln!(output, "#endif")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// sool_chip_setup.h
// ---------------------------------------------------------------------

/// Prints `sool_chip_setup.h` (§6): dispatches on whichever chip define the
/// build actually sets to `#include` that chip's CMSIS header, so the rest
/// of the generated library can `#include` this one file regardless of
/// target. Chips are tried in ascending-define order (§5) and a trailing
/// `#error` catches a build where no known chip define is active.
pub fn print_chip_setup(output: &mut impl IoWrite, chips: &[Chip]) -> Result<()> {
    writeln!(output, "#pragma once")?;
    writeln!(output)?;

    let mut sorted: Vec<&Chip> = chips.iter().collect();
    sorted.sort_by_key(|c| c.name());

    for (i, chip) in sorted.iter().enumerate() {
        let keyword = if i == 0 { "#if" } else { "#elif" };
        writeln!(output, "{keyword} defined({})", chip.name())?;
        writeln!(output, "    #include \"{}\"", chip.header())?;
    }
    if !sorted.is_empty() {
        writeln!(output, "#else")?;
    }
    writeln!(output, "    #error \"No known chip define is active\"")?;
    if !sorted.is_empty() {
        writeln!(output, "#endif")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// RCCF helpers
// ---------------------------------------------------------------------

/// One RCC clock-enable lookup record for a single peripheral instance
/// (grounded in `rcc_functions.py::Record`): the bit position and the
/// enable register it lives in, each keyed by the chipset on which that
/// choice holds.
#[derive(Clone, Debug, Default)]
pub struct RccRecord {
    /// The instance's `<NAME>EN` field name, e.g. `GPIOAEN`.
    pub field_name: String,
    /// Bit position -> chips for which that position is the enable bit.
    pub positions: IndexMap<u32, ChipSet>,
    /// Enable register name -> chips for which that register carries it.
    pub registers: IndexMap<String, ChipSet>,
}

/// Builds one [`RccRecord`] per instance of `peripheral`, by looking up each
/// instance's `<NAME>EN` field across every `...ENR`-named register of
/// `rcc` (grounded in `rcc_functions.py::generate_records`). An instance
/// with no matching field across any `ENR` register is skipped.
pub fn build_rcc_records(peripheral: &Peripheral, rcc: &Peripheral) -> IndexMap<String, RccRecord> {
    let mut records: IndexMap<String, RccRecord> = IndexMap::new();

    for instance in peripheral.instances() {
        let field_name = format!("{}EN", instance.name());
        let mut remaining = instance.chips().clone();

        for register in rcc.registers() {
            if !register.name().contains("ENR") {
                continue;
            }
            for field in register.fields() {
                if field.name() != field_name {
                    continue;
                }
                let common = remaining.intersection(field.chips());
                if common.is_empty() {
                    continue;
                }
                remaining = remaining.difference(&common);
                let record = records.entry(field_name.clone()).or_insert_with(|| RccRecord {
                    field_name: field_name.clone(),
                    ..Default::default()
                });
                record.positions.entry(field.position()).or_insert_with(ChipSet::new).union_in_place(&common);
                record
                    .registers
                    .entry(register.name().to_owned())
                    .or_insert_with(ChipSet::new)
                    .union_in_place(register.chips());
            }
        }
    }

    records
}

/// Prints the `get_clock_enable_bit` member function body for `peripheral`
/// (grounded in `rcc_functions.py::generate_get_bit`): a switch over each
/// instance's base address returning the shifted enable bit, guarded per
/// chipset when more than one position applies across chips.
pub fn print_rcc_get_bit(
    output: &mut impl IoWrite,
    peripheral: &Peripheral,
    records: &IndexMap<String, RccRecord>,
    universe: &ChipUniverse,
    config: &Config,
) -> Result<()> {
    writeln!(
        output,
        "inline constexpr uint32_t {}::get_clock_enable_bit(const uintptr_t addr) {{",
        peripheral.name()
    )?;
    writeln!(output, "    switch (addr) {{")?;
    for instance in peripheral.instances() {
        let field_name = format!("{}EN", instance.name());
        let Some(record) = records.get(&field_name) else { continue };
        writeln!(output, "    #ifdef {}_BASE_ADDR", instance.name())?;
        writeln!(output, "    case {}_BASE_ADDR:", instance.name())?;
        print_guarded_switch_body(output, &record.positions, universe, config, "return 1 << ", ";")?;
        writeln!(output, "    #endif")?;
    }
    writeln!(output, "    }}")?;
    writeln!(output, "}}")?;
    Ok(())
}

/// Prints the `get_clock_enable_reg` member function body for `peripheral`
/// (grounded in `rcc_functions.py::generate_get_reg`).
pub fn print_rcc_get_reg(
    output: &mut impl IoWrite,
    peripheral: &Peripheral,
    records: &IndexMap<String, RccRecord>,
    universe: &ChipUniverse,
    config: &Config,
) -> Result<()> {
    writeln!(
        output,
        "inline constexpr volatile Reg32_t& {}::get_clock_enable_reg(const uintptr_t addr) {{",
        peripheral.name()
    )?;
    writeln!(output, "    switch (addr) {{")?;
    for instance in peripheral.instances() {
        let field_name = format!("{}EN", instance.name());
        let Some(record) = records.get(&field_name) else { continue };
        writeln!(output, "    #ifdef {}_BASE_ADDR", instance.name())?;
        writeln!(output, "    case {}_BASE_ADDR:", instance.name())?;
        print_guarded_switch_body(output, &record.registers, universe, config, "return RCC->", ";")?;
        writeln!(output, "    #endif")?;
    }
    writeln!(output, "    }}")?;
    writeln!(output, "}}")?;
    Ok(())
}

fn print_guarded_switch_body<T: std::fmt::Display>(
    output: &mut impl IoWrite,
    values: &IndexMap<T, ChipSet>,
    universe: &ChipUniverse,
    config: &Config,
    return_prefix: &str,
    return_suffix: &str,
) -> Result<()> {
    for (i, (value, chips)) in values.iter().enumerate() {
        let keyword = if i == 0 { "#if" } else { "#elif" };
        writeln!(output, "        {keyword} {}", universe.defined_list(chips, config.chips_per_line, &config.newline_prefix))?;
        writeln!(output, "            {return_prefix}{value}{return_suffix}")?;
    }
    if !values.is_empty() {
        writeln!(output, "        #endif")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Relational dump
// ---------------------------------------------------------------------

/// One row of the `peripherals` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeripheralRow {
    /// Row id, assigned by insertion order within the dump.
    pub id: u64,
    /// Peripheral name.
    pub name: String,
    /// Owning group's row id.
    pub group_id: u64,
}

/// One row of the `registers` table: either a plain register (`size` set,
/// `sub_peripheral_id` unset) or a reference to a sub-peripheral mapping
/// element (grounded in `peripheral.py::generate_sql`'s `Register`-vs-
/// `Peripheral` branch).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterRow {
    /// Row id.
    pub id: u64,
    /// Register (or element) name.
    pub name: String,
    /// Width in bits, when this row is a plain register.
    pub size: Option<u32>,
    /// Row id of the sub-peripheral this row stands in for, if any.
    pub sub_peripheral_id: Option<u64>,
}

/// One row of the `reg_placements` table: one register placed at one
/// address inside one peripheral.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegPlacementRow {
    /// Row id.
    pub id: u64,
    /// Owning peripheral's row id.
    pub peripheral_id: u64,
    /// Placed register's row id.
    pub register_id: u64,
    /// The mapping element's own name (may differ from the register's).
    pub name: String,
    /// Array length, or `0` for a scalar placement.
    pub array_size: u32,
    /// Byte offset within the peripheral.
    pub address: u32,
}

/// One row of the `fields` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRow {
    /// Row id.
    pub id: u64,
    /// Owning placement's row id.
    pub placement_id: u64,
    /// Field name.
    pub name: String,
    /// Bit position of the field's least-significant bit.
    pub position: u32,
    /// Width in bits.
    pub size: u32,
}

/// One row of the `chips` lookup table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChipRow {
    /// Row id.
    pub id: u64,
    /// The chip's preprocessor define.
    pub define: String,
    /// Family prefix.
    pub family: String,
}

/// The five-table relational dump (§6, §11.3): a driver implements this
/// against whichever storage it prefers (SQLite, in this case, named in the
/// spec, but the core never links a SQL crate itself).
pub trait RelationalSink {
    /// Inserts a peripheral row, returning its assigned id.
    fn insert_peripheral(&mut self, row: PeripheralRow) -> u64;
    /// Inserts a register row, returning its assigned id.
    fn insert_register(&mut self, row: RegisterRow) -> u64;
    /// Inserts a placement row, returning its assigned id.
    fn insert_placement(&mut self, row: RegPlacementRow) -> u64;
    /// Inserts a field row.
    fn insert_field(&mut self, row: FieldRow);
    /// Inserts a chip lookup row.
    fn insert_chip(&mut self, row: ChipRow);
    /// Reports a unicity failure (§11.3): the same `(register, address,
    /// peripheral)` key was seen under two different element names. Logged
    /// and skipped, never fatal.
    fn unicity_failure(&mut self, peripheral: &str, register_id: u64, address: u32, first_name: &str, second_name: &str);
}

/// Dumps `group` into `sink` (§11.3, grounded in `peripheral.py::generate_sql`):
/// a register or sub-peripheral referenced by more than one mapping element
/// is inserted into `registers` once and referenced by id from every
/// placement row; a `(register_id, address, peripheral_id)` key already
/// seen under the same element name is an idempotent re-placement (skipped,
/// not duplicated); the same key under a *different* name is a unicity
/// failure, reported via [`RelationalSink::unicity_failure`] and skipped.
pub fn dump_group(sink: &mut impl RelationalSink, group: &Group, group_id: u64) {
    for peripheral in group.peripherals() {
        dump_peripheral(sink, peripheral, group_id);
    }
}

fn dump_peripheral(sink: &mut impl RelationalSink, peripheral: &Peripheral, group_id: u64) -> u64 {
    let peripheral_id =
        sink.insert_peripheral(PeripheralRow { id: 0, name: peripheral.name().to_owned(), group_id });

    let mut register_ids: HashMap<String, u64> = HashMap::new();
    let mut done: HashMap<(u64, u32), String> = HashMap::new();

    for mapping in peripheral.mappings() {
        for element in mapping.elements() {
            let register_id = match element.target() {
                MappingTarget::Register(name) => *register_ids.entry(name.clone()).or_insert_with(|| {
                    let size = peripheral.register(name).map(crate::model::Register::size);
                    sink.insert_register(RegisterRow { id: 0, name: name.clone(), size, sub_peripheral_id: None })
                }),
                MappingTarget::Peripheral(name) => *register_ids.entry(name.clone()).or_insert_with(|| {
                    sink.insert_register(RegisterRow {
                        id: 0,
                        name: element.name().to_owned(),
                        size: None,
                        sub_peripheral_id: Some(0),
                    })
                }),
            };

            let key = (register_id, element.address());
            let skip = match done.get(&key) {
                Some(existing_name) if existing_name == element.name() => true,
                Some(existing_name) => {
                    sink.unicity_failure(
                        peripheral.name(),
                        register_id,
                        element.address(),
                        existing_name,
                        element.name(),
                    );
                    continue;
                }
                None => {
                    done.insert(key, element.name().to_owned());
                    false
                }
            };
            if skip {
                continue;
            }

            let placement_id = sink.insert_placement(RegPlacementRow {
                id: 0,
                peripheral_id,
                register_id,
                name: element.name().to_owned(),
                array_size: element.array_size(),
                address: element.address(),
            });

            if let MappingTarget::Register(name) = element.target() {
                if let Some(register) = peripheral.register(name) {
                    for field in register.fields() {
                        sink.insert_field(FieldRow {
                            id: 0,
                            placement_id,
                            name: field.name().to_owned(),
                            position: field.position(),
                            size: field.size(),
                        });
                    }
                }
            }
        }
    }

    peripheral_id
}

/// Dumps every chip in `universe`'s reference set into the `chips` lookup
/// table.
pub fn dump_chips(sink: &mut impl RelationalSink, universe: &ChipUniverse) {
    let reference = universe.reference();
    let mut chips: Vec<&Chip> = reference.iter().collect();
    chips.sort_by_key(|c| c.name());
    for chip in chips {
        sink.insert_chip(ChipRow { id: 0, define: chip.define().to_owned(), family: chip.family() });
    }
}

// ---------------------------------------------------------------------
// XML manifest
// ---------------------------------------------------------------------

/// Everything the manifest pins down (§6, grounded in
/// `sool_manifest.py::SoolManifest`): the tool version, each family's
/// pinned pack version, the groups actually emitted this run, and the full
/// chip -> (svd, header) association.
#[derive(Clone, Debug, Default)]
pub struct ManifestData {
    /// The tool's own version/commit identifier (the caller supplies this;
    /// the core doesn't know how it was built).
    pub tool_version: String,
    /// Family name -> pinned pack version string.
    pub pdsc_versions: IndexMap<String, String>,
    /// Every group this run emitted a header for.
    pub generated_groups: Vec<String>,
    /// Every chip this run's merge drew from.
    pub chips: Vec<Chip>,
}

/// Assembles the manifest XML tree and returns its serialised text (§6).
/// Each section (`tool`, `fileset`, `groups`, `chips`) carries a digest
/// computed by calling `digest` over that section's canonical byte
/// representation, rather than this function hardcoding an algorithm; pass
/// [`sha1_digest`] for the source's own choice.
pub fn build_manifest_xml(data: &ManifestData, digest: impl Fn(&[u8]) -> String) -> Result<String> {
    let mut buffer = Vec::new();
    let mut writer = Writer::new_with_indent(&mut buffer, b' ', 2);

    let mut manifest = BytesStart::new("manifest");
    manifest.push_attribute(("tool-version", data.tool_version.as_str()));
    manifest.push_attribute(("tool-version-digest", digest(data.tool_version.as_bytes()).as_str()));
    writer.write_event(Event::Start(manifest))?;

    write_fileset_section(&mut writer, data, &digest)?;
    write_groups_section(&mut writer, data, &digest)?;
    write_chips_section(&mut writer, data, &digest)?;

    writer.write_event(Event::End(BytesEnd::new("manifest")))?;

    Ok(String::from_utf8(buffer)?)
}

fn write_fileset_section(
    writer: &mut Writer<&mut Vec<u8>>,
    data: &ManifestData,
    digest: &impl Fn(&[u8]) -> String,
) -> Result<()> {
    let mut canonical = String::new();
    let mut families: Vec<&String> = data.pdsc_versions.keys().collect();
    families.sort();

    writer.write_event(Event::Start(BytesStart::new("fileset")))?;
    for family in &families {
        let version = &data.pdsc_versions[*family];
        canonical.push_str(&format!("{family}={version}\n"));
        let mut elem = BytesStart::new("family");
        elem.push_attribute(("name", family.as_str()));
        elem.push_attribute(("version", version.as_str()));
        writer.write_event(Event::Empty(elem))?;
    }
    writer.write_event(Event::End(BytesEnd::new("fileset")))?;

    let mut hash_elem = BytesStart::new("hash-fileset");
    hash_elem.push_attribute(("value", digest(canonical.as_bytes()).as_str()));
    writer.write_event(Event::Empty(hash_elem))?;
    Ok(())
}

fn write_groups_section(
    writer: &mut Writer<&mut Vec<u8>>,
    data: &ManifestData,
    digest: &impl Fn(&[u8]) -> String,
) -> Result<()> {
    let mut sorted = data.generated_groups.clone();
    sorted.sort();

    writer.write_event(Event::Start(BytesStart::new("groups")))?;
    let mut canonical = String::new();
    for group in &sorted {
        canonical.push_str(group);
        canonical.push('\n');
        let mut elem = BytesStart::new("group");
        elem.push_attribute(("name", group.as_str()));
        writer.write_event(Event::Empty(elem))?;
    }
    writer.write_event(Event::End(BytesEnd::new("groups")))?;

    let mut hash_elem = BytesStart::new("hash-groups");
    hash_elem.push_attribute(("value", digest(canonical.as_bytes()).as_str()));
    writer.write_event(Event::Empty(hash_elem))?;
    Ok(())
}

fn write_chips_section(
    writer: &mut Writer<&mut Vec<u8>>,
    data: &ManifestData,
    digest: &impl Fn(&[u8]) -> String,
) -> Result<()> {
    let mut sorted: Vec<&Chip> = data.chips.iter().collect();
    sorted.sort_by_key(|c| c.name());

    writer.write_event(Event::Start(BytesStart::new("chips")))?;
    let mut canonical = String::new();
    let mut current_family: Option<String> = None;
    for chip in &sorted {
        let family = chip.family();
        if current_family.as_deref() != Some(family.as_str()) {
            if current_family.is_some() {
                writer.write_event(Event::End(BytesEnd::new("family")))?;
            }
            let mut family_elem = BytesStart::new("family");
            family_elem.push_attribute(("name", family.as_str()));
            writer.write_event(Event::Start(family_elem))?;
            current_family = Some(family);
        }
        canonical.push_str(&format!("{}|{}|{}\n", chip.define(), chip.header(), chip.svd()));
        let mut elem = BytesStart::new("chip");
        elem.push_attribute(("define", chip.define()));
        elem.push_attribute(("header", chip.header()));
        elem.push_attribute(("svd", chip.svd()));
        writer.write_event(Event::Empty(elem))?;
    }
    if current_family.is_some() {
        writer.write_event(Event::End(BytesEnd::new("family")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("chips")))?;

    let mut hash_elem = BytesStart::new("hash-chips");
    hash_elem.push_attribute(("value", digest(canonical.as_bytes()).as_str()));
    writer.write_event(Event::Empty(hash_elem))?;
    Ok(())
}

/// The source's own digest choice (`sool_manifest.py` uses `hashlib.sha1`):
/// hex-encoded SHA-1 over `bytes`. Pass this to [`build_manifest_xml`] for
/// drop-in parity with the original tool's manifest.
pub fn sha1_digest(bytes: &[u8]) -> String {
    use sha1::{Digest, Sha1};
    let digest = Sha1::digest(bytes);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Access, ChipSet as ModelChipSet, Field, MappingElement, Register};
    use std::collections::HashMap as StdHashMap;

    #[test]
    fn sha1_digest_matches_known_vector() {
        assert_eq!(sha1_digest(b"hello world"), "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
    }

    #[test]
    fn manifest_builds_with_deterministic_section_digests() {
        let mut data = ManifestData { tool_version: "v1".to_owned(), ..Default::default() };
        data.pdsc_versions.insert("STM32F4".to_owned(), "1.2.3".to_owned());
        data.generated_groups.push("GPIO".to_owned());
        data.chips.push(Chip::new("STM32F401xE", "f401.h", "f401.svd"));

        let xml = build_manifest_xml(&data, sha1_digest).unwrap();
        assert!(xml.contains("<manifest"));
        assert!(xml.contains("STM32F401xE"));
        assert!(xml.contains("hash-chips"));
    }

    #[derive(Default)]
    struct VecSink {
        peripherals: Vec<PeripheralRow>,
        registers: Vec<RegisterRow>,
        placements: Vec<RegPlacementRow>,
        fields: Vec<FieldRow>,
        chips: Vec<ChipRow>,
        failures: Vec<(String, u64, u32, String, String)>,
    }

    impl RelationalSink for VecSink {
        fn insert_peripheral(&mut self, mut row: PeripheralRow) -> u64 {
            row.id = self.peripherals.len() as u64 + 1;
            let id = row.id;
            self.peripherals.push(row);
            id
        }
        fn insert_register(&mut self, mut row: RegisterRow) -> u64 {
            row.id = self.registers.len() as u64 + 1;
            let id = row.id;
            self.registers.push(row);
            id
        }
        fn insert_placement(&mut self, mut row: RegPlacementRow) -> u64 {
            row.id = self.placements.len() as u64 + 1;
            let id = row.id;
            self.placements.push(row);
            id
        }
        fn insert_field(&mut self, row: FieldRow) {
            self.fields.push(row);
        }
        fn insert_chip(&mut self, row: ChipRow) {
            self.chips.push(row);
        }
        fn unicity_failure(&mut self, peripheral: &str, register_id: u64, address: u32, a: &str, b: &str) {
            self.failures.push((peripheral.to_owned(), register_id, address, a.to_owned(), b.to_owned()));
        }
    }

    #[test]
    fn dump_inserts_one_register_row_shared_across_placements() {
        let mut p = Peripheral::new(ModelChipSet::new(), "GPIOA", None);
        let mut reg = Register::new(ModelChipSet::new(), "MODER", None, 32, Access::ReadWrite);
        reg.add_field(Field::new(ModelChipSet::new(), "MODER0", None, 0, 2)).unwrap();
        p.add_register(reg).unwrap();
        p.place_element(MappingElement::new(
            ModelChipSet::new(),
            "MODER",
            None,
            0x00,
            MappingTarget::Register("MODER".to_owned()),
            32,
        ))
        .unwrap();

        let mut group = Group::new(ModelChipSet::new(), "GPIO");
        group.add_peripheral(p).unwrap();

        let mut sink = VecSink::default();
        dump_group(&mut sink, &group, 1);

        assert_eq!(sink.peripherals.len(), 1);
        assert_eq!(sink.registers.len(), 1);
        assert_eq!(sink.placements.len(), 1);
        assert_eq!(sink.fields.len(), 1);
        assert!(sink.failures.is_empty());
    }

    #[test]
    fn cmsis_config_skips_chips_with_no_options() {
        let mut options: StdHashMap<String, Vec<CmsisConfigOption>> = StdHashMap::new();
        options.insert("STM32F401xE".to_owned(), vec![]);
        let mut out = Vec::new();
        print_cmsis_config(&mut out, &options).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), "#pragma once");
    }

    #[test]
    fn chip_setup_dispatches_on_every_chip() {
        let chips =
            vec![Chip::new("STM32F401xE", "f401.h", "f401.svd"), Chip::new("STM32F411xE", "f411.h", "f411.svd")];
        let mut out = Vec::new();
        print_chip_setup(&mut out, &chips).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("#if defined(STM32F401xE)"));
        assert!(text.contains("#elif defined(STM32F411xE)"));
        assert!(text.contains("#error"));
    }
}
