//! JSON encoding of persisted asset state

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) fn encode<T: Serialize>(value: &T) -> anyhow::Result<Option<Vec<u8>>> {
    let bytes = serde_json::to_vec_pretty(value).context("failed to serialize asset state")?;
    Ok(Some(bytes))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<T> {
    serde_json::from_slice(bytes).context("failed to parse asset state")
}

/// Error for reading an asset that was never resolved
pub(crate) fn unresolved(name: &str) -> anyhow::Error {
    anyhow::anyhow!("{name} has not been resolved")
}
