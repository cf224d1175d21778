//! Adapters from external-collaborator document shapes (§6) into the types
//! [`crate::merge`] and [`crate::model`] build the component tree from.
//!
//! Three source formats feed the engine: vendor packs' PDSC chip index, each
//! chip's SVD register map, and each chip's CMSIS C header. Traversing the
//! raw XML/C text of all three is explicitly out of this crate's scope (§1):
//! this module only types the *shape* a collaborator is expected to hand
//! over and does the small amount of reconciliation (dropping incomplete
//! tuples, merging derived-from chains) that the core is specified to own.
//!
//! [`svd`] is the exception: the crate still carries a full CMSIS-SVD
//! document parser (deserialising via `quick-xml`/`serde`), since the
//! engine needs *some* concrete SVD reader to be more than an empty
//! interface. [`pdsc`] and [`cmsis`] stay at the interface-only level §6
//! describes.

pub mod cmsis;
pub mod pdsc;
pub mod svd;
