use serde::{Deserialize, Serialize};

use crate::error::MappingError;

/// Tolerances used while deriving a [`PerspectiveMapping`](crate::PerspectiveMapping).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperParams {
    /// Distance (destination units) by which the right and bottom edges of
    /// the destination rectangle are pulled inside `W` and `H`.
    ///
    /// A point on the far edge then truncates into the last pixel
    /// (`W - 1`, `H - 1`) instead of one past it. Must lie in `[0, 1)`.
    pub far_edge_inset: f64,
    /// Three corners whose angle has a sine at or below this value are
    /// treated as collinear. Must lie in `[0, 1)`.
    pub collinearity_tol: f64,
}

impl Default for MapperParams {
    fn default() -> Self {
        Self {
            far_edge_inset: 1e-6,
            collinearity_tol: 1e-9,
        }
    }
}

impl MapperParams {
    pub fn validate(&self) -> Result<(), MappingError> {
        let unit = 0.0..1.0;
        if !unit.contains(&self.far_edge_inset) {
            return Err(MappingError::InvalidParams(format!(
                "far_edge_inset must be in [0, 1), got {}",
                self.far_edge_inset
            )));
        }
        if !unit.contains(&self.collinearity_tol) {
            return Err(MappingError::InvalidParams(format!(
                "collinearity_tol must be in [0, 1), got {}",
                self.collinearity_tol
            )));
        }
        Ok(())
    }
}
