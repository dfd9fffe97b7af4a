//! Quadrilateral-to-rectangle perspective mapping.
//!
//! A [`PerspectiveMapping`] is derived once from an ordered source
//! quadrilateral and is immutable afterwards. Construction sizes the
//! destination rectangle, solves the homography through a pluggable
//! [`HomographySolver`], and verifies that the two defining corners land on
//! `(0, 0)` and `(W - 1, H - 1)` before handing the mapping out.

use log::debug;
use nalgebra::Point2;

use crate::error::{DegenerateReason, MappingError, ProjectionError, ValidationFailure};
use crate::homography::{FourPointSolver, Homography, HomographySolver};
use crate::params::MapperParams;
use crate::quad::{Corner, Quadrilateral};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Projective mapping from a source quadrilateral onto `[0, W) x [0, H)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerspectiveMapping {
    quad: Quadrilateral,
    h: Homography,
    h_inv: Homography,
    width: u32,
    height: u32,
}

impl PerspectiveMapping {
    /// Derive a mapping with default parameters and the four-point LU solver.
    pub fn new(quad: impl Into<Quadrilateral>) -> Result<Self, MappingError> {
        Self::with_params(quad, &MapperParams::default())
    }

    pub fn with_params(
        quad: impl Into<Quadrilateral>,
        params: &MapperParams,
    ) -> Result<Self, MappingError> {
        Self::with_solver(quad.into(), params, &FourPointSolver)
    }

    /// Derive a mapping using a caller-supplied homography solver.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(quad, solver), fields(quad = %quad)))]
    pub fn with_solver<S>(
        quad: Quadrilateral,
        params: &MapperParams,
        solver: &S,
    ) -> Result<Self, MappingError>
    where
        S: HomographySolver + ?Sized,
    {
        params.validate()?;

        if !quad.is_finite() {
            return Err(MappingError::DegenerateInput(DegenerateReason::NonFinite));
        }

        let (width, height) = quad.destination_size();
        if width == 0 || height == 0 {
            return Err(MappingError::DegenerateInput(
                DegenerateReason::ZeroExtent { width, height },
            ));
        }

        if let Some(corners) = quad.find_collinear(params.collinearity_tol) {
            return Err(MappingError::DegenerateInput(DegenerateReason::Collinear {
                corners,
            }));
        }

        let dst = destination_corners(width, height, params.far_edge_inset);
        let h = solver.solve(quad.corners(), &dst)?;
        let h_inv = h
            .inverse()
            .ok_or(MappingError::DegenerateInput(DegenerateReason::SingularSystem))?;

        let mapping = Self {
            quad,
            h,
            h_inv,
            width,
            height,
        };
        mapping.self_check()?;

        debug!("perspective mapping {} -> {}x{}", quad, width, height);
        Ok(mapping)
    }

    /// Destination width `W`.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Destination height `H`.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn destination_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn quadrilateral(&self) -> &Quadrilateral {
        &self.quad
    }

    /// Source-to-rectangle homography, normalized to `h33 = 1` when possible.
    pub fn homography(&self) -> &Homography {
        &self.h
    }

    pub fn inverse_homography(&self) -> &Homography {
        &self.h_inv
    }

    /// Map a source point into the rectangle and truncate toward zero.
    ///
    /// Points outside the quadrilateral are projected too; the result is
    /// not clamped to the rectangle.
    #[inline]
    pub fn project(&self, p: Point2<f64>) -> Result<Point2<i64>, ProjectionError> {
        truncate(self.h.try_apply(p)?)
    }

    /// Like [`project`](Self::project) but keeps the fractional part.
    #[inline]
    pub fn project_precise(&self, p: Point2<f64>) -> Result<Point2<f64>, ProjectionError> {
        self.h.try_apply(p)
    }

    /// Map a rectangle point back into source coordinates.
    #[inline]
    pub fn unproject(&self, q: Point2<f64>) -> Result<Point2<f64>, ProjectionError> {
        self.h_inv.try_apply(q)
    }

    /// The four source corners projected (TL, TR, BR, BL).
    pub fn projected_corners(&self) -> [Option<Point2<i64>>; 4] {
        Corner::ALL.map(|c| self.project(self.quad.corner(c)).ok())
    }

    fn self_check(&self) -> Result<(), MappingError> {
        let projected = self.projected_corners();
        let expected_tl = Point2::new(0_i64, 0);
        let expected_br = Point2::new(self.width as i64 - 1, self.height as i64 - 1);

        if projected[Corner::TopLeft.index()] == Some(expected_tl)
            && projected[Corner::BottomRight.index()] == Some(expected_br)
        {
            return Ok(());
        }

        let failure = ValidationFailure {
            quad: self.quad,
            width: self.width,
            height: self.height,
            projected,
        };
        debug!("{}", failure);
        Err(MappingError::Validation(Box::new(failure)))
    }
}

fn destination_corners(width: u32, height: u32, inset: f64) -> [Point2<f64>; 4] {
    let w = width as f64 - inset;
    let h = height as f64 - inset;
    [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ]
}

fn truncate(q: Point2<f64>) -> Result<Point2<i64>, ProjectionError> {
    const LIMIT: f64 = i64::MAX as f64;
    if q.x.abs() >= LIMIT || q.y.abs() >= LIMIT {
        return Err(ProjectionError::OutOfRange);
    }
    Ok(Point2::new(q.x.trunc() as i64, q.y.trunc() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HomographyError;
    use crate::homography::DltSolver;

    fn lane() -> Quadrilateral {
        Quadrilateral::from_tuples([
            (910.0, 558.0),
            (1073.0, 558.0),
            (1396.0, 1078.0),
            (511.0, 1078.0),
        ])
    }

    #[test]
    fn lane_quad_maps_onto_rectangle() {
        let m = PerspectiveMapping::new(lane()).expect("mapping");
        assert_eq!(m.width(), 885);
        assert_eq!(m.height(), 655);
        assert_eq!(
            m.project(Point2::new(910.0, 558.0)).expect("tl"),
            Point2::new(0, 0)
        );
        assert_eq!(
            m.project(Point2::new(1396.0, 1078.0)).expect("br"),
            Point2::new(884, 654)
        );
    }

    #[test]
    fn remaining_corners_land_on_rectangle_edges() {
        let m = PerspectiveMapping::new(lane()).expect("mapping");
        let [tl, tr, br, bl] = m.projected_corners();
        assert_eq!(tl, Some(Point2::new(0, 0)));
        assert_eq!(tr, Some(Point2::new(884, 0)));
        assert_eq!(br, Some(Point2::new(884, 654)));
        assert_eq!(bl, Some(Point2::new(0, 654)));
    }

    #[test]
    fn dlt_solver_passes_self_check() {
        let m = PerspectiveMapping::with_solver(lane(), &MapperParams::default(), &DltSolver)
            .expect("mapping");
        assert_eq!(
            m.project(Point2::new(1396.0, 1078.0)).expect("br"),
            Point2::new(884, 654)
        );
    }

    #[test]
    fn axis_aligned_rectangle_is_near_identity() {
        let q = Quadrilateral::from_tuples([(10.0, 20.0), (110.0, 20.0), (110.0, 70.0), (10.0, 70.0)]);
        let m = PerspectiveMapping::new(q).expect("mapping");
        assert_eq!(m.destination_size(), (100, 50));
        let p = m.project_precise(Point2::new(35.5, 41.25)).expect("inside");
        assert!((p.x - 25.5).abs() < 1e-4, "{}", p.x);
        assert!((p.y - 21.25).abs() < 1e-4, "{}", p.y);
    }

    #[test]
    fn points_outside_quad_are_not_clamped() {
        let m = PerspectiveMapping::new(lane()).expect("mapping");
        let p = m.project(Point2::new(200.0, 1200.0)).expect("finite");
        assert!(p.x < 0, "{:?}", p);
        assert!(p.y > 654, "{:?}", p);
    }

    #[test]
    fn unproject_inverts_precise_projection() {
        let m = PerspectiveMapping::new(lane()).expect("mapping");
        for p in [
            Point2::new(950.0, 600.0),
            Point2::new(1200.0, 900.0),
            Point2::new(700.0, 1050.0),
        ] {
            let q = m.project_precise(p).expect("forward");
            let back = m.unproject(q).expect("backward");
            assert!((back - p).norm() < 1e-6, "{:?} vs {:?}", back, p);
        }
    }

    #[test]
    fn vanishing_line_fails_projection() {
        let m = PerspectiveMapping::new(lane()).expect("mapping");
        let h = m.homography().h;
        let x = 1000.0;
        let y = -(h[(2, 0)] * x + h[(2, 2)]) / h[(2, 1)];
        assert!(matches!(
            m.project(Point2::new(x, y)),
            Err(ProjectionError::VanishingLine { .. })
        ));
        assert!(m.project_precise(Point2::new(x, y)).is_err());
    }

    #[test]
    fn three_collinear_corners_are_degenerate() {
        let q = Quadrilateral::from_tuples([(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (0.0, 10.0)]);
        let err = PerspectiveMapping::new(q).expect_err("collinear");
        assert!(matches!(
            err,
            MappingError::DegenerateInput(DegenerateReason::Collinear { .. })
        ));
    }

    #[test]
    fn all_corners_on_a_line_is_degenerate() {
        let q = Quadrilateral::from_tuples([(0.0, 0.0), (10.0, 10.0), (20.0, 20.0), (30.0, 30.0)]);
        assert!(matches!(
            PerspectiveMapping::new(q),
            Err(MappingError::DegenerateInput(_))
        ));

        let flat = Quadrilateral::from_tuples([(0.0, 5.0), (40.0, 5.0), (40.0, 5.0), (0.0, 5.0)]);
        assert_eq!(
            PerspectiveMapping::new(flat),
            Err(MappingError::DegenerateInput(
                DegenerateReason::ZeroExtent {
                    width: 40,
                    height: 0
                }
            ))
        );
    }

    #[test]
    fn non_finite_corner_is_degenerate() {
        let q = Quadrilateral::from_tuples([
            (0.0, 0.0),
            (10.0, f64::INFINITY),
            (10.0, 10.0),
            (0.0, 10.0),
        ]);
        assert_eq!(
            PerspectiveMapping::new(q),
            Err(MappingError::DegenerateInput(DegenerateReason::NonFinite))
        );
    }

    #[test]
    fn wrong_matrix_fails_self_check_with_payload() {
        let identity = |_: &[Point2<f64>; 4], _: &[Point2<f64>; 4]| {
            Ok::<_, HomographyError>(Homography::identity())
        };
        let err = PerspectiveMapping::with_solver(lane(), &MapperParams::default(), &identity)
            .expect_err("identity cannot rectify the lane");

        let failure = err.validation_failure().expect("validation payload");
        assert_eq!(failure.quad, lane());
        assert_eq!((failure.width, failure.height), (885, 655));
        assert_eq!(failure.projected[0], Some(Point2::new(910, 558)));
        assert_eq!(failure.projected[2], Some(Point2::new(1396, 1078)));
    }

    #[test]
    fn solver_failure_is_degenerate() {
        let failing = |_: &[Point2<f64>; 4], _: &[Point2<f64>; 4]| {
            Err::<Homography, _>(HomographyError::Singular)
        };
        assert_eq!(
            PerspectiveMapping::with_solver(lane(), &MapperParams::default(), &failing),
            Err(MappingError::DegenerateInput(DegenerateReason::SingularSystem))
        );
    }

    #[test]
    fn invalid_params_are_rejected_before_solving() {
        let params = MapperParams {
            far_edge_inset: 2.0,
            ..MapperParams::default()
        };
        assert!(matches!(
            PerspectiveMapping::with_params(lane(), &params),
            Err(MappingError::InvalidParams(_))
        ));
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = PerspectiveMapping::new(lane()).expect("a");
        let b = PerspectiveMapping::new(lane()).expect("b");
        assert_eq!(a, b);
        let p = Point2::new(1111.0, 777.0);
        assert_eq!(a.project(p), b.project(p));
    }

    #[test]
    fn truncation_rounds_toward_zero() {
        assert_eq!(truncate(Point2::new(-0.7, 2.9)), Ok(Point2::new(0, 2)));
        assert_eq!(truncate(Point2::new(-3.2, -0.0)), Ok(Point2::new(-3, 0)));
        assert_eq!(
            truncate(Point2::new(1e300, 0.0)),
            Err(ProjectionError::OutOfRange)
        );
    }
}
