//! Ordered source quadrilateral and the destination sizing rule.

use std::ops::Index;

use nalgebra::{distance, Point2};
use serde::{Deserialize, Serialize};

/// Corner of a quadrilateral, in canonical clockwise order (image y down).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Corner::TopLeft => 0,
            Corner::TopRight => 1,
            Corner::BottomRight => 2,
            Corner::BottomLeft => 3,
        }
    }
}

/// Four source points ordered TL, TR, BR, BL.
///
/// The order is a caller contract; it is not inspected beyond the
/// construction-time self-check of
/// [`PerspectiveMapping`](crate::PerspectiveMapping).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quadrilateral {
    corners: [Point2<f64>; 4],
}

impl Quadrilateral {
    pub fn new(corners: [Point2<f64>; 4]) -> Self {
        Self { corners }
    }

    pub fn from_tuples(corners: [(f64, f64); 4]) -> Self {
        Self::new(corners.map(|(x, y)| Point2::new(x, y)))
    }

    pub fn corners(&self) -> &[Point2<f64>; 4] {
        &self.corners
    }

    #[inline]
    pub fn corner(&self, c: Corner) -> Point2<f64> {
        self.corners[c.index()]
    }

    pub fn is_finite(&self) -> bool {
        self.corners
            .iter()
            .all(|p| p.x.is_finite() && p.y.is_finite())
    }

    /// Destination rectangle size `(width, height)`.
    ///
    /// Each side takes the longer of the two opposing edges, truncated
    /// toward zero.
    pub fn destination_size(&self) -> (u32, u32) {
        let tl = self.corner(Corner::TopLeft);
        let tr = self.corner(Corner::TopRight);
        let br = self.corner(Corner::BottomRight);
        let bl = self.corner(Corner::BottomLeft);

        let width_a = distance(&br, &bl);
        let width_b = distance(&tr, &tl);
        let height_a = distance(&tr, &br);
        let height_b = distance(&tl, &bl);

        // `as` truncates toward zero and saturates, NaN becomes 0.
        let width = (width_a as u32).max(width_b as u32);
        let height = (height_a as u32).max(height_b as u32);
        (width, height)
    }

    /// First corner triple that is collinear within `sin_tol`.
    ///
    /// The test measures the sine of the angle at the middle corner of each
    /// triple; coincident points always count as collinear.
    pub fn find_collinear(&self, sin_tol: f64) -> Option<[Corner; 3]> {
        for k in 0..4 {
            let triple = [
                Corner::ALL[k],
                Corner::ALL[(k + 1) % 4],
                Corner::ALL[(k + 2) % 4],
            ];
            let a = self.corner(triple[0]);
            let b = self.corner(triple[1]);
            let c = self.corner(triple[2]);

            let u = a - b;
            let v = c - b;
            let nu = u.norm();
            let nv = v.norm();
            if nu == 0.0 || nv == 0.0 {
                return Some(triple);
            }
            let cross = u.x * v.y - u.y * v.x;
            if cross.abs() <= sin_tol * nu * nv {
                return Some(triple);
            }
        }
        None
    }
}

impl Index<Corner> for Quadrilateral {
    type Output = Point2<f64>;

    fn index(&self, c: Corner) -> &Self::Output {
        &self.corners[c.index()]
    }
}

impl From<[Point2<f64>; 4]> for Quadrilateral {
    fn from(corners: [Point2<f64>; 4]) -> Self {
        Self::new(corners)
    }
}

impl From<[(f64, f64); 4]> for Quadrilateral {
    fn from(corners: [(f64, f64); 4]) -> Self {
        Self::from_tuples(corners)
    }
}

impl std::fmt::Display for Quadrilateral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (k, p) in self.corners.iter().enumerate() {
            if k > 0 {
                write!(f, ", ")?;
            }
            write!(f, "({}, {})", p.x, p.y)?;
        }
        write!(f, "]")
    }
}
