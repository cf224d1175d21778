//! Typed error taxonomy for the merge engine's control-flow invariants.
//!
//! Input-retrieval and output/filesystem failures are deliberately *not*
//! covered here: those are reported as plain [`eyre::Result`]s from the
//! ingestion and output-builder call sites (see the crate's `ingest` and
//! `output` modules) and are free to be recovered by an outer driver. This
//! enum is reserved for the handful of conditions that are programmer errors
//! or unrecoverable structural failures: "recover-and-warn for data,
//! fail-fast for control-flow invariants."

use thiserror::Error;

/// Fatal errors raised by the component tree, the fixpoint loop, or the
/// corrector engine.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A mutation was attempted on a component after the printer phase
    /// locked it.
    #[error("mutation attempted on locked component `{alias}`")]
    LockedComponent {
        /// Dotted alias of the offending component.
        alias: String,
    },

    /// The corrector fixpoint loop exceeded its iteration cap without the
    /// tree settling (`edited` never cleared).
    #[error("component `{alias}` did not converge after {iterations} fix iterations")]
    FixConvergence {
        /// Dotted alias of the component that kept getting re-edited.
        alias: String,
        /// Configured iteration cap that was exceeded.
        iterations: u32,
    },

    /// Absorb tried to rename a register but exhausted the documented
    /// `x -> y -> z -> n` substitution chain without finding a free name.
    #[error(
        "cannot merge register names `{name_a}` and `{name_b}`: \
         substitution chain x/y/z/n exhausted, all candidates already taken"
    )]
    UnresolvableRename {
        /// First of the two colliding register names.
        name_a: String,
        /// Second of the two colliding register names.
        name_b: String,
    },

    /// A source document (SVD, PDSC, or CMSIS header) failed to parse.
    #[error("failed to parse `{path}`: {source}")]
    Parse {
        /// Path of the offending file.
        path: String,
        /// Underlying parser error.
        #[source]
        source: eyre::Error,
    },
}

/// Convenience alias for fallible core operations.
pub type Result<T> = std::result::Result<T, MergeError>;
