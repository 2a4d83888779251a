use thiserror::Error;

use crate::geometry::GeometryError;
use crate::remote::TransportError;

/// Errors surfaced by the parcel, action and vintage stores.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("{collection} document {id} not found")]
    NotFound { collection: &'static str, id: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("could not resolve {path}: {reason}")]
    Resolution { path: String, reason: String },
    #[error("serialization failed: {0}")]
    Serde(String),
}

impl StoreError {
    pub(crate) fn not_found(collection: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            collection,
            id: id.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}
