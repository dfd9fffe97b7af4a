//! JSON configuration helpers.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{MapperParams, MappingError, PerspectiveMapping, Quadrilateral};

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A region of interest plus the tolerances used to rectify it.
///
/// ```json
/// { "quad": [[910, 558], [1073, 558], [1396, 1078], [511, 1078]] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Corners ordered TL, TR, BR, BL.
    pub quad: Quadrilateral,
    #[serde(default)]
    pub params: MapperParams,
}

impl MapperConfig {
    pub fn new(quad: impl Into<Quadrilateral>) -> Self {
        Self {
            quad: quad.into(),
            params: MapperParams::default(),
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Derive the mapping described by this config.
    pub fn build(&self) -> Result<PerspectiveMapping, MappingError> {
        PerspectiveMapping::with_params(self.quad, &self.params)
    }
}
