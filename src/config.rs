//! Engine-wide configuration.
//!
//! A [`Config`] is always handed to the engine already constructed; the core
//! never reads a file path itself. A driver may still load one from disk
//! (the type derives `serde`) before constructing the engine.

use serde::{Deserialize, Serialize};

/// Tunables for the fixpoint corrector loop and the guard-expression
/// printer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Maximum number of `apply_fixes` iterations before a subtree is
    /// considered non-convergent (§9; default 100).
    pub fix_iteration_cap: u32,
    /// Number of `defined(...)` tokens per line before a guard expression
    /// wraps onto a continuation line (§4.1; default 5).
    pub chips_per_line: usize,
    /// Indentation prefix inserted after a guard-expression line break.
    pub newline_prefix: String,
    /// Peripheral names excluded from generation entirely.
    pub excluded_peripherals: Vec<String>,
    /// Whether the optional `IRQn.h` interrupt table header is requested.
    pub emit_irqn_header: bool,
    /// Whether the optional `cmsis_config.h` header is requested.
    pub emit_cmsis_config: bool,
    /// Whether the optional `sool_chip_setup.h` dispatch header is
    /// requested.
    pub emit_chip_setup: bool,
    /// Whether the optional per-peripheral RCC helper header pair is
    /// requested.
    pub emit_rcc_helpers: bool,
    /// Whether the optional relational dump is requested.
    pub emit_relational_dump: bool,
    /// Whether the XML manifest is requested.
    pub emit_manifest: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fix_iteration_cap: 100,
            chips_per_line: 5,
            newline_prefix: "    ".to_owned(),
            excluded_peripherals: Vec::new(),
            emit_irqn_header: true,
            emit_cmsis_config: true,
            emit_chip_setup: true,
            emit_rcc_helpers: false,
            emit_relational_dump: false,
            emit_manifest: true,
        }
    }
}

impl Config {
    /// Returns whether `name` was excluded from generation.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_peripherals.iter().any(|p| p == name)
    }
}
