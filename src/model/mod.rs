//! The merged component tree (§3, §3.1): [`Chip`]/[`ChipSet`] annotate every
//! node of a `Group -> Peripheral -> Register -> Field` ownership tree, with a
//! parallel `Peripheral -> PeripheralMapping -> MappingElement` placement tree.

pub mod access;
pub mod chip;
pub mod chipset;
pub mod component;
pub mod field;
pub mod group;
pub mod mapping;
pub mod peripheral;
pub mod register;

pub use access::Access;
pub use chip::Chip;
pub use chipset::ChipSet;
pub use component::NodeBase;
pub use field::Field;
pub use group::Group;
pub use mapping::{MappingElement, MappingTarget, PeripheralMapping};
pub use peripheral::{Peripheral, PeripheralInstance};
pub use register::Register;
