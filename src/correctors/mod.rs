//! Concrete corrector trees (§4.4) assembled from the primitives in
//! [`crate::corrector`]: a **base** tree applied per-peripheral right after
//! parse, an **advanced** tree applied after structural merge, and a
//! simpler **CMSIS** tree applied to parsed vendor headers before
//! cross-check.

pub mod advanced;
pub mod base;
pub mod cmsis;

pub use advanced::advanced_tree;
pub use base::base_tree;
pub use cmsis::normalize as normalize_cmsis_tables;
