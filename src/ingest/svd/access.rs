use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Predefined access rights.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    /// Read operations have an undefined result. Write access is permitted.
    WriteOnly,
    /// Read access is permitted. Write operations have an undefined result.
    ReadOnly,
    /// Read and write accesses are permitted. Writes affect the state of the
    /// register and reads return the register value.
    ReadWrite,
    /// Read access is always permitted. Only the first write access after a
    /// reset will have an effect on the content. Other write operations have an
    /// undefined result.
    ReadWriteonce,
}

/// `serde(with = "AccessWrapper")` shim for `Option<Access>` fields: SVD
/// leaves `access` off most elements, and `#[serde(with = "...")]` needs an
/// explicit module when the field itself is an `Option`.
pub(crate) struct AccessWrapper;

impl AccessWrapper {
    pub(crate) fn serialize<S>(value: &Option<Access>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.serialize(serializer)
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Access>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Access>::deserialize(deserializer)
    }
}
