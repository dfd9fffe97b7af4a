//! 3×3 projective transforms and the four-point solvers that produce them.

use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{HomographyError, ProjectionError};

/// Relative threshold under which the homogeneous denominator counts as zero.
///
/// Compared against the sum of magnitudes of the terms forming `w`, so the
/// test is independent of the matrix scale and the input magnitude.
pub const DENOMINATOR_EPS: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    /// `H * (x, y, 1)` without the homogeneous division.
    #[inline]
    pub fn apply_homogeneous(&self, p: Point2<f64>) -> Vector3<f64> {
        self.h * Vector3::new(p.x, p.y, 1.0)
    }

    /// Map `p` and normalize by `w`.
    ///
    /// Fails when `w` is zero up to [`DENOMINATOR_EPS`] relative to its own
    /// terms, i.e. `p` sits on the vanishing line of `H`.
    #[inline]
    pub fn try_apply(&self, p: Point2<f64>) -> Result<Point2<f64>, ProjectionError> {
        let v = self.apply_homogeneous(p);
        let w = v[2];
        let scale =
            (self.h[(2, 0)] * p.x).abs() + (self.h[(2, 1)] * p.y).abs() + self.h[(2, 2)].abs();
        // Negated comparison so NaN lands in the error branch too.
        if !(w.abs() > scale * DENOMINATOR_EPS) {
            return Err(ProjectionError::VanishingLine { w });
        }
        let out = Point2::new(v[0] / w, v[1] / w);
        if !out.x.is_finite() || !out.y.is_finite() {
            return Err(ProjectionError::OutOfRange);
        }
        Ok(out)
    }

    pub fn inverse(&self) -> Option<Self> {
        let inv = self.h.try_inverse()?;
        Some(Self::new(normalize_homography(inv)?))
    }
}

/// Black-box "projective transform from four correspondences" primitive.
///
/// Implementations return `H` with `H * [src_i; 1] ~ [dst_i; 1]` for all
/// four pairs, or an error when the pairs do not determine a homography.
pub trait HomographySolver {
    fn solve(
        &self,
        src: &[Point2<f64>; 4],
        dst: &[Point2<f64>; 4],
    ) -> Result<Homography, HomographyError>;
}

impl<F> HomographySolver for F
where
    F: Fn(&[Point2<f64>; 4], &[Point2<f64>; 4]) -> Result<Homography, HomographyError>,
{
    fn solve(
        &self,
        src: &[Point2<f64>; 4],
        dst: &[Point2<f64>; 4],
    ) -> Result<Homography, HomographyError> {
        self(src, dst)
    }
}

/// Exact four-point solve: 8×8 linear system with `h33 = 1`, LU decomposition.
#[derive(Clone, Copy, Debug, Default)]
pub struct FourPointSolver;

impl HomographySolver for FourPointSolver {
    fn solve(
        &self,
        src: &[Point2<f64>; 4],
        dst: &[Point2<f64>; 4],
    ) -> Result<Homography, HomographyError> {
        homography_from_4pt(src, dst)
    }
}

/// Direct linear transform: null vector of the stacked 2N×9 system via SVD.
#[derive(Clone, Copy, Debug, Default)]
pub struct DltSolver;

impl HomographySolver for DltSolver {
    fn solve(
        &self,
        src: &[Point2<f64>; 4],
        dst: &[Point2<f64>; 4],
    ) -> Result<Homography, HomographyError> {
        estimate_homography_dlt(src, dst)
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    // Hartley normalization: translate to centroid, scale so mean distance = sqrt(2)
    let n = pts.len() as f64;
    let (sx, sy) = pts.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let cx = sx / n;
    let cy = sy / n;

    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

/// Scale `h` so that `h33 = 1`, falling back to unit Frobenius norm when the
/// source origin maps to infinity.
fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    if !h.iter().all(|v| v.is_finite()) {
        return None;
    }
    let s = h[(2, 2)];
    if s.abs() >= 1e-12 {
        return Some(h / s);
    }
    let n = h.norm();
    if n < 1e-12 {
        return None;
    }
    Some(h / n)
}

fn denormalize_homography(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Compute H such that: dst ~ H * src (projective), using 4 point correspondences.
///
/// Corner order must be consistent between `src` and `dst`.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
pub fn homography_from_4pt(
    src: &[Point2<f64>; 4],
    dst: &[Point2<f64>; 4],
) -> Result<Homography, HomographyError> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    // For each correspondence (x,y)->(u,v):
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points(src);
    let (dst_n, t_dst) = normalize_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b).ok_or(HomographyError::Singular)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let h_den = denormalize_homography(hn, t_src, t_dst).ok_or(HomographyError::Singular)?;
    let h_den = normalize_homography(h_den).ok_or(HomographyError::Singular)?;
    Ok(Homography::new(h_den))
}

/// Estimate H such that `dst ~ H * src` from `N >= 4` correspondences.
///
/// With exactly four pairs this is an exact solve; with more it is the
/// algebraic least-squares fit.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all, fields(n = src.len())))]
pub fn estimate_homography_dlt(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
) -> Result<Homography, HomographyError> {
    if src.len() != dst.len() || src.len() < 4 {
        return Err(HomographyError::Singular);
    }

    let (s, ts) = normalize_points(src);
    let (d, td) = normalize_points(dst);

    // Pad to a square system so the SVD exposes the full right null space.
    let n = src.len();
    let rows = (2 * n).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);

    for k in 0..n {
        let x = s[k].x;
        let y = s[k].y;
        let u = d[k].x;
        let v = d[k].y;

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    let svd = a.svd(true, true);
    let vt = svd.v_t.ok_or(HomographyError::Singular)?;
    let sv = &svd.singular_values;
    let smallest = sv.imin();

    // A rank below 8 leaves more than one null vector: the pairs are degenerate.
    let second = sv
        .iter()
        .enumerate()
        .filter(|&(k, _)| k != smallest)
        .map(|(_, &v)| v)
        .fold(f64::INFINITY, f64::min);
    if second <= 1e-10 * sv.max() {
        return Err(HomographyError::Singular);
    }

    let h = vt.row(smallest);
    let hn =
        Matrix3::<f64>::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    let h_den = denormalize_homography(hn, ts, td).ok_or(HomographyError::Singular)?;
    let h_den = normalize_homography(h_den).ok_or(HomographyError::Singular)?;
    Ok(Homography::new(h_den))
}
