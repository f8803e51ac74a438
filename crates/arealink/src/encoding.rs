//! JSON encoding of the [`GraphDef`] interchange form.

use crate::def::GraphDef;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("graph definition JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes a JSON graph definition.
pub fn decode(data: &[u8]) -> Result<GraphDef> {
    Ok(serde_json::from_slice(data)?)
}

/// Encodes a graph definition as JSON.
pub fn encode(def: &GraphDef) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(def)?)
}
