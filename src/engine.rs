//! Phase-boundary orchestration tying [`ingest`](crate::ingest),
//! [`merge`](crate::merge), [`correctors`](crate::correctors),
//! [`cmsis_check`](crate::cmsis_check) and [`printer`](crate::printer)
//! together into the pipeline §2's flow describes: PDSC ingest -> per-SVD
//! parse -> merge -> cross-check -> print (§6 CLI surface's
//! `POST_PDSC -> POST_SVD -> POST_MERGE -> POST_ANALYZE` stages).
//!
//! An [`Engine`] owns nothing the driver doesn't hand it: a [`Config`], a
//! [`ChipUniverse`] (defaulting to a fresh, isolated one rather than the
//! ambient singleton, per the Design Notes open question about test
//! isolation) and a [`Checkpoint`]. It performs no I/O and no serialisation;
//! it only drives the component tree through the phases and records which
//! one it's reached.

use crate::checkpoint::{Checkpoint, Stage};
use crate::cmsis_check::{self, CmsisMismatch};
use crate::config::Config;
use crate::correctors::{advanced_tree, base_tree};
use crate::error::Result;
use crate::ingest::cmsis::CmsisHeaderTables;
use crate::ingest::svd;
use crate::merge;
use crate::model::{Chip, ChipSet, Group, Peripheral};
use crate::universe::ChipUniverse;
use std::collections::HashMap;
use std::io::Write;

/// Drives one vendor family's chip set through every core phase.
pub struct Engine {
    config: Config,
    universe: ChipUniverse,
    checkpoint: Checkpoint,
}

impl Engine {
    /// Builds an engine with a fresh, isolated [`ChipUniverse`] -- two
    /// engines constructed this way never share a reference chipset.
    pub fn new(config: Config) -> Self {
        Self { config, universe: ChipUniverse::new(), checkpoint: Checkpoint::new() }
    }

    /// Builds an engine against a caller-supplied universe, e.g.
    /// [`ChipUniverse::ambient`] for a driver that's fine with one engine
    /// per process.
    pub fn with_universe(config: Config, universe: ChipUniverse) -> Self {
        Self { config, universe, checkpoint: Checkpoint::new() }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The chipset universe this engine's guard expressions are printed
    /// relative to.
    pub fn universe(&self) -> &ChipUniverse {
        &self.universe
    }

    /// The phase-boundary checkpoint state.
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// PDSC phase (§6): registers every chip of `chips` into this engine's
    /// universe and records [`Stage::PostPdsc`] as passed. The PDSC
    /// traversal itself (raw XML -> [`Chip`] rows) is the external
    /// collaborator's job (§1); this only does the reconciliation the core
    /// owns.
    pub fn ingest_chips(&mut self, chips: impl IntoIterator<Item = Chip>) {
        for chip in chips {
            self.universe.observe_chip(chip);
        }
        self.checkpoint.record(Stage::PostPdsc, true);
    }

    /// Compiles one SVD document into draft peripherals tagged with `chips`
    /// (§4.3 `svd_compile`) and runs the base corrector tree (§4.4) over
    /// each one before structural merge sees it. Does not itself record
    /// [`Stage::PostSvd`]: a driver compiling many SVDs for one family
    /// should call [`Engine::finish_svd_phase`] once every document has
    /// gone through.
    pub fn compile_svd(&mut self, device: &svd::Device, chips: &ChipSet) -> Result<Vec<Peripheral>> {
        self.universe.observe(chips);
        let mut peripherals = merge::svd_compile(device, chips)?;
        for peripheral in &mut peripherals {
            base_tree().apply_fixes(peripheral, self.config.fix_iteration_cap)?;
        }
        Ok(peripherals)
    }

    /// Records the SVD-compile phase's outcome across every document of the
    /// current family.
    pub fn finish_svd_phase(&mut self, passed: bool) {
        self.checkpoint.record(Stage::PostSvd, passed);
    }

    /// Folds `peripherals` into `group` (§4.3 `inter_svd_merge`), one SVD's
    /// worth at a time, in the order the driver hands them over (§5
    /// ordering guarantee: merge order follows SVD processing order).
    pub fn merge_into_group(&mut self, group: &mut Group, peripherals: Vec<Peripheral>) -> Result<()> {
        for peripheral in peripherals {
            merge::inter_svd_merge(group, peripheral)?;
        }
        Ok(())
    }

    /// Finalises structural merge for `group` (§4.4): runs the advanced
    /// corrector tree peripheral-by-peripheral (it composes hierarchically
    /// starting at the peripheral level, unlike the Group-level base tree),
    /// then collapses compatible mappings and folds any registers that
    /// absorb left field-for-field equal (§4.3 Scenario E), and records
    /// [`Stage::PostMerge`].
    pub fn finalize_merge(&mut self, group: &mut Group) -> Result<()> {
        let result = (|| -> Result<()> {
            for peripheral in group.peripherals_mut() {
                advanced_tree().apply_fixes(peripheral, self.config.fix_iteration_cap)?;
                peripheral.collapse_compatible_mappings()?;
                peripheral.merge_equal_registers()?;
            }
            Ok(())
        })();
        self.checkpoint.record(Stage::PostMerge, result.is_ok());
        result
    }

    /// CMSIS cross-check phase (§4.6): validates every peripheral of `group`
    /// against `chip_headers` (keyed by [`Chip::define`]) and records
    /// [`Stage::PostAnalyze`]. Never fails the phase -- every discrepancy is
    /// a warning, per §7's "recover-and-warn for data" policy.
    pub fn cross_check(
        &mut self,
        group: &Group,
        chip_headers: &HashMap<String, CmsisHeaderTables>,
    ) -> Vec<CmsisMismatch> {
        let mut diagnostics = Vec::new();
        for peripheral in group.peripherals() {
            diagnostics.extend(cmsis_check::cross_check(peripheral, chip_headers));
        }
        self.checkpoint.record(Stage::PostAnalyze, true);
        diagnostics
    }

    /// Locks `group`'s entire tree (§4.2, §4.7 Finalised state) and prints
    /// its `<GROUP>_struct.h` into `output`. Output/filesystem failures are
    /// plain [`eyre::Result`]s (§7: not part of the fatal-only error enum),
    /// so this returns that instead of [`crate::error::Result`].
    pub fn finalize_and_print(&self, group: &mut Group, output: &mut impl Write) -> eyre::Result<()> {
        group.lock();
        crate::printer::print_group(output, group, &self.universe, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Access, MappingElement, MappingTarget, Register};

    fn device_with_one_register(periph: &str, reg: &str) -> svd::Device {
        let xml = format!(
            r#"
            <device>
                <name>TEST</name>
                <size>32</size>
                <peripherals>
                    <peripheral>
                        <name>{periph}</name>
                        <baseAddress>0x40000000</baseAddress>
                        <registers>
                            <register>
                                <name>{reg}</name>
                                <addressOffset>0x00</addressOffset>
                                <fields>
                                    <field>
                                        <name>EN</name>
                                        <bitOffset>0</bitOffset>
                                        <bitWidth>1</bitWidth>
                                    </field>
                                </fields>
                            </register>
                        </registers>
                    </peripheral>
                </peripherals>
            </device>
            "#
        );
        quick_xml::de::from_str(&xml).unwrap()
    }

    #[test]
    fn full_pipeline_compiles_merges_and_prints() {
        let mut engine = Engine::new(Config::default());
        let chip = Chip::new("CHIPA", "a.h", "a.svd");
        engine.ingest_chips([chip.clone()]);
        assert!(engine.checkpoint().passed(Stage::PostPdsc));

        let chips = ChipSet::from_chips([chip]);
        let device = device_with_one_register("PERIPHA", "RX");
        let peripherals = engine.compile_svd(&device, &chips).unwrap();
        engine.finish_svd_phase(true);
        assert!(engine.checkpoint().passed(Stage::PostSvd));

        let mut group = Group::new(ChipSet::new(), "GROUPA");
        engine.merge_into_group(&mut group, peripherals).unwrap();
        engine.finalize_merge(&mut group).unwrap();
        assert!(engine.checkpoint().passed(Stage::PostMerge));

        let diagnostics = engine.cross_check(&group, &HashMap::new());
        assert_eq!(diagnostics.len(), 1);
        assert!(engine.checkpoint().passed(Stage::PostAnalyze));

        let mut out = Vec::new();
        engine.finalize_and_print(&mut group, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("class PERIPHA"));
        assert!(text.contains("struct RX_t"));
    }

    #[test]
    fn isolated_engines_do_not_share_reference_chipset() {
        let mut a = Engine::new(Config::default());
        let b = Engine::new(Config::default());
        a.ingest_chips([Chip::new("CHIPA", "a.h", "a.svd")]);
        assert_eq!(a.universe().reference().len(), 1);
        assert_eq!(b.universe().reference().len(), 0);
    }

    #[test]
    fn placement_helper_is_available_for_manual_trees() {
        let mut p = Peripheral::new(ChipSet::new(), "X", None);
        p.add_register(Register::new(ChipSet::new(), "R", None, 32, Access::ReadWrite)).unwrap();
        p.place_element(MappingElement::new(
            ChipSet::new(),
            "R",
            None,
            0,
            MappingTarget::Register("R".to_owned()),
            32,
        ))
        .unwrap();
        assert_eq!(p.mappings().len(), 1);
    }
}
