use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::quad::{Corner, Quadrilateral};

/// Errors returned by homography solvers.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomographyError {
    #[error("correspondence system is singular")]
    Singular,
}

/// Why a quadrilateral cannot be mapped onto a rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DegenerateReason {
    /// At least one corner has a NaN or infinite coordinate.
    NonFinite,
    /// The destination rectangle would have zero area.
    ZeroExtent { width: u32, height: u32 },
    /// Three corners lie on a common line.
    Collinear { corners: [Corner; 3] },
    /// The solver could not invert the correspondence system.
    SingularSystem,
}

impl std::fmt::Display for DegenerateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegenerateReason::NonFinite => write!(f, "non-finite corner coordinate"),
            DegenerateReason::ZeroExtent { width, height } => {
                write!(f, "zero-area destination rectangle ({width}x{height})")
            }
            DegenerateReason::Collinear { corners } => write!(
                f,
                "collinear corners {:?}, {:?}, {:?}",
                corners[0], corners[1], corners[2]
            ),
            DegenerateReason::SingularSystem => write!(f, "singular correspondence system"),
        }
    }
}

/// Diagnostic payload of a failed construction-time self-check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// The quadrilateral as supplied by the caller.
    pub quad: Quadrilateral,
    pub width: u32,
    pub height: u32,
    /// Projected TL, TR, BR, BL. `None` where a corner has no finite image.
    pub projected: [Option<Point2<i64>>; 4],
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "self-check failed for {} ({}x{}): projected corners [",
            self.quad, self.width, self.height
        )?;
        for (k, p) in self.projected.iter().enumerate() {
            if k > 0 {
                write!(f, ", ")?;
            }
            match p {
                Some(p) => write!(f, "({}, {})", p.x, p.y)?,
                None => write!(f, "-")?,
            }
        }
        write!(f, "]")
    }
}

/// Errors returned when building a [`PerspectiveMapping`](crate::PerspectiveMapping).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("degenerate quadrilateral: {0}")]
    DegenerateInput(DegenerateReason),
    #[error("{0}")]
    Validation(Box<ValidationFailure>),
    #[error("invalid mapper parameters: {0}")]
    InvalidParams(String),
}

impl MappingError {
    /// Diagnostic payload when the self-check rejected the mapping.
    pub fn validation_failure(&self) -> Option<&ValidationFailure> {
        match self {
            MappingError::Validation(v) => Some(v),
            _ => None,
        }
    }
}

impl From<HomographyError> for MappingError {
    fn from(_: HomographyError) -> Self {
        MappingError::DegenerateInput(DegenerateReason::SingularSystem)
    }
}

/// Errors returned when projecting a single point.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ProjectionError {
    #[error("point lies on the vanishing line (w={w:e})")]
    VanishingLine { w: f64 },
    #[error("projected coordinate is not representable")]
    OutOfRange,
}
