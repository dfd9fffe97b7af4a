//! Perspective rectification of a quadrilateral region of interest.
//!
//! Given four ordered corners (TL, TR, BR, BL) of a region in some source
//! space, for example a lane marked on an angled camera frame, this crate
//! derives the homography onto an axis-aligned `W x H` rectangle and maps
//! individual points through it. No pixels are resampled.
//!
//! ```
//! use nalgebra::Point2;
//! use quad_rectify::PerspectiveMapping;
//!
//! let mapping = PerspectiveMapping::new([
//!     (910.0, 558.0),
//!     (1073.0, 558.0),
//!     (1396.0, 1078.0),
//!     (511.0, 1078.0),
//! ])?;
//! assert_eq!((mapping.width(), mapping.height()), (885, 655));
//! assert_eq!(mapping.project(Point2::new(1396.0, 1078.0))?, Point2::new(884, 654));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The homography solve is pluggable through [`HomographySolver`]; the
//! default [`FourPointSolver`] solves the exact 8×8 system, [`DltSolver`]
//! takes the SVD null vector instead.

mod error;
mod homography;
pub mod io;
mod logger;
mod mapping;
mod params;
mod quad;

pub use error::{
    DegenerateReason, HomographyError, MappingError, ProjectionError, ValidationFailure,
};
pub use homography::{
    estimate_homography_dlt, homography_from_4pt, DltSolver, FourPointSolver, Homography,
    HomographySolver, DENOMINATOR_EPS,
};
pub use mapping::PerspectiveMapping;
pub use params::MapperParams;
pub use quad::{Corner, Quadrilateral};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
