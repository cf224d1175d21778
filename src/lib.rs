//! Chip-aware structural merge engine that unifies CMSIS-SVD register maps
//! across a vendor chip family into a single, preprocessor-guarded C++
//! header library.
//!
//! The crate is organised the way the design splits it:
//!
//! - [`model`] is the typed component tree (`Group -> Peripheral -> Register
//!   -> Field`, plus the parallel `Peripheral -> PeripheralMapping ->
//!   MappingElement` placement tree) and the [`model::ChipSet`] algebra.
//! - [`corrector`] is the glob-pattern-indexed rewrite DSL and fixpoint loop
//!   driving normalisation to convergence.
//! - [`correctors`] assembles concrete corrector trees (base, advanced,
//!   CMSIS) out of the primitives in [`corrector`].
//! - [`ingest`] adapts external collaborators' output (SVD documents, PDSC
//!   chip indices, CMSIS header tables) into the component tree; the
//!   traversal of those source formats is itself out of this crate's scope
//!   (see the crate-level design notes), but the shapes it expects are typed
//!   here.
//! - [`merge`] drives parse -> correct -> absorb -> validate to a stable
//!   tree ([`merge::svd_compile`], [`model::Group::add_peripheral`]).
//! - [`cmsis_check`] cross-validates a merged peripheral against CMSIS
//!   header tables.
//! - [`printer`] renders the guard-expression C++ header text.
//! - [`output`] builds the remaining optional artefacts (manifest,
//!   relational dump, `IRQn.h`, `cmsis_config.h`, `sool_chip_setup.h`, RCC
//!   helpers) as in-memory values rather than files.
//! - [`engine`] and [`checkpoint`] provide the phase-boundary orchestration
//!   an outer driver resumes against.

#![warn(missing_docs)]

pub mod checkpoint;
pub mod cmsis_check;
pub mod config;
pub mod corrector;
pub mod correctors;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod merge;
pub mod model;
pub mod output;
pub mod printer;
pub mod universe;

pub use config::Config;
pub use engine::Engine;
pub use error::{MergeError, Result};
