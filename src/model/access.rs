//! Register access class (§3.1): `{RW, RO, WO}`, distinct from the richer
//! SVD-document access enum in [`crate::ingest::svd`] (which also carries
//! CMSIS-SVD's `read-writeOnce` variant not meaningful to the merged model).

use serde::{Deserialize, Serialize};

/// Access rights of a merged [`Register`](super::register::Register).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Access {
    /// Read and write accesses are both permitted.
    ReadWrite,
    /// Read access is permitted; writes have an undefined result.
    ReadOnly,
    /// Write access is permitted; reads have an undefined result.
    WriteOnly,
}

impl From<crate::ingest::svd::Access> for Access {
    fn from(access: crate::ingest::svd::Access) -> Self {
        match access {
            crate::ingest::svd::Access::ReadWrite | crate::ingest::svd::Access::ReadWriteonce => {
                Access::ReadWrite
            }
            crate::ingest::svd::Access::ReadOnly => Access::ReadOnly,
            crate::ingest::svd::Access::WriteOnly => Access::WriteOnly,
        }
    }
}
