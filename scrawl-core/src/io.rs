//! Persistence boundary encoding.
//!
//! The engine does not own a store; it hands the host a stable textual
//! snapshot and rebuilds state from one. Unknown fields in stored data are
//! ignored on read, so future writers stay readable.

use serde::{Deserialize, Serialize};

use crate::layer::manager::{LayerManager, RestoreError};
use crate::layer::Layer;

/// Current encoding revision, written into every snapshot.
const FORMAT_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum DocumentCodecError {
    #[error("malformed document encoding: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] RestoreError),
}

/// A full copy of one canvas's layer stack, ready to encode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub layers: Vec<Layer>,
}

fn default_version() -> u32 {
    FORMAT_VERSION
}

impl DocumentSnapshot {
    /// Capture the manager's current layer stack.
    #[must_use]
    pub fn capture(manager: &LayerManager) -> Self {
        Self {
            version: FORMAT_VERSION,
            layers: manager.snapshot(),
        }
    }

    /// Rebuild a manager, re-validating the canvas invariants.
    pub fn restore(self) -> Result<LayerManager, RestoreError> {
        LayerManager::from_layers(self.layers)
    }

    pub fn to_json(&self) -> Result<String, DocumentCodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a snapshot. Corrupt input is an explicit error; a partially
    /// readable document is never returned.
    pub fn from_json(text: &str) -> Result<Self, DocumentCodecError> {
        Ok(serde_json::from_str(text)?)
    }
}
