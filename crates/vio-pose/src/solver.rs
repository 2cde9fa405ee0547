use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::chirality::{select_hypothesis, ChiralitySelection};
use crate::essential::{
    decompose_essential, essential_8point, EssentialDecomposition, PoseHypothesis,
};
use crate::ransac::{ransac_essential, RansacParams};
use crate::Correspondence;

/// Errors returned by the relative pose solver.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RelativePoseError {
    /// Not enough correspondences for a well-conditioned solve.
    #[error("Need at least {required} correspondences, got {actual}")]
    InsufficientData {
        /// Minimum number of correspondences.
        required: usize,
        /// Number of usable correspondences received.
        actual: usize,
    },
}

/// Configuration of the relative pose solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelativePoseConfig {
    /// Minimum number of correspondences; never lower than eight.
    pub min_correspondences: usize,
    /// `R1` is treated as a reflection when `det(R1) + 1` is below this value.
    pub reflection_tolerance: f64,
    /// RANSAC settings, or `None` for a single least-squares fit on all correspondences.
    pub ransac: Option<RansacParams>,
}

impl Default for RelativePoseConfig {
    fn default() -> Self {
        Self {
            min_correspondences: 9,
            reflection_tolerance: 1e-9,
            ransac: Some(RansacParams::default()),
        }
    }
}

/// Relative pose of the second view with respect to the first one.
///
/// A point `X₂` in second view coordinates is `X₁ = rotation · X₂ + translation` in the first
/// view. The translation is a unit direction since scale is not observable from two views.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativePose {
    /// Rotation of the second view in the first view frame.
    pub rotation: DMat3,
    /// Unit translation of the second view in the first view frame.
    pub translation: DVec3,
}

impl RelativePose {
    /// No motion: identity rotation and zero translation.
    pub fn identity() -> Self {
        Self {
            rotation: DMat3::IDENTITY,
            translation: DVec3::ZERO,
        }
    }
}

impl Default for RelativePose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Recovers the relative pose between two views from bearing correspondences.
///
/// The solver is stateless across calls and only holds its configuration, so one instance can be
/// shared between threads.
///
/// # Example
///
/// ```
/// use glam::{DMat3, DVec3};
/// use vio_pose::{Correspondence, RelativePoseSolver};
///
/// let r = DMat3::from_axis_angle(DVec3::Y, 0.1);
/// let t = DVec3::new(0.5, 0.0, 0.0);
/// let correspondences: Vec<Correspondence> = (0..20)
///     .map(|i| {
///         let f = i as f64;
///         let x = DVec3::new((f * 0.7).sin(), (f * 1.3).cos(), 4.0 + (f * 0.4).sin());
///         Correspondence::new(x, r * x + t)
///     })
///     .collect();
///
/// let pose = RelativePoseSolver::default().solve(&correspondences).unwrap();
/// // the pose maps second view points back into the first view
/// assert!((pose.rotation * r).abs_diff_eq(DMat3::IDENTITY, 1e-6));
/// ```
#[derive(Clone, Debug, Default)]
pub struct RelativePoseSolver {
    config: RelativePoseConfig,
}

impl RelativePoseSolver {
    /// Create a solver with the given configuration.
    pub fn new(config: RelativePoseConfig) -> Self {
        Self { config }
    }

    /// The solver configuration.
    pub fn config(&self) -> &RelativePoseConfig {
        &self.config
    }

    /// Minimum number of forward-pointing correspondences accepted by [`Self::solve`].
    pub fn required_correspondences(&self) -> usize {
        self.config
            .min_correspondences
            .max(crate::essential::MIN_CORRESPONDENCES_8POINT)
    }

    /// Recover the relative rotation and translation direction.
    ///
    /// Correspondences whose bearings do not point forward are ignored. When fewer than
    /// [`Self::required_correspondences`] remain, [`RelativePoseError::InsufficientData`] is
    /// returned and callers are expected to fall back to [`RelativePose::identity`].
    pub fn solve(
        &self,
        correspondences: &[Correspondence],
    ) -> Result<RelativePose, RelativePoseError> {
        let forward = self.usable(correspondences)?;

        let e = self.estimate_essential(&forward)?;
        let hypotheses = self.hypotheses(&e);
        let selection = select_hypothesis(&forward, &hypotheses);
        log_selection(&selection);

        let best = hypotheses[selection.index];

        // the hypothesis maps first view points into the second view; invert it
        let rotation = best.rotation.transpose();
        let translation = (-(rotation * best.translation)).normalize_or_zero();

        Ok(RelativePose {
            rotation,
            translation,
        })
    }

    /// Recover only the relative rotation.
    pub fn solve_rotation(
        &self,
        correspondences: &[Correspondence],
    ) -> Result<DMat3, RelativePoseError> {
        self.solve(correspondences).map(|pose| pose.rotation)
    }

    /// Estimate the essential matrix, with RANSAC when configured.
    ///
    /// The RANSAC consensus is refitted on its inliers. Without consensus every correspondence is
    /// used.
    pub fn estimate_essential(
        &self,
        correspondences: &[Correspondence],
    ) -> Result<DMat3, RelativePoseError> {
        if let Some(params) = &self.config.ransac {
            if let Some(res) = ransac_essential(correspondences, params) {
                let inliers: Vec<Correspondence> = correspondences
                    .iter()
                    .zip(res.inliers.iter())
                    .filter(|(_, inlier)| **inlier)
                    .map(|(c, _)| *c)
                    .collect();
                log::debug!(
                    "essential RANSAC: {} of {} inliers",
                    res.inlier_count,
                    correspondences.len()
                );
                return essential_8point(&inliers).or(Ok(res.model));
            }
        }
        essential_8point(correspondences)
    }

    /// The four pose hypotheses of an essential matrix with the reflection guard applied.
    ///
    /// When the first rotation comes out as a reflection the essential matrix is negated and
    /// decomposed again. Any remaining reflection is corrected so that every hypothesis is a
    /// proper rotation.
    pub fn hypotheses(&self, e: &DMat3) -> [PoseHypothesis; 4] {
        self.guard_reflection(e, decompose_essential(e))
            .hypotheses()
            .map(PoseHypothesis::proper)
    }

    /// Decompose `-E` instead when `decomposition` of `E` has a reflection as first rotation.
    ///
    /// The check is `det(R1) + 1 < reflection_tolerance`.
    pub fn guard_reflection(
        &self,
        e: &DMat3,
        decomposition: EssentialDecomposition,
    ) -> EssentialDecomposition {
        if decomposition.r1.determinant() + 1.0 < self.config.reflection_tolerance {
            log::debug!("reflection in essential decomposition, negating E");
            decompose_essential(&(*e * -1.0))
        } else {
            decomposition
        }
    }

    fn usable(
        &self,
        correspondences: &[Correspondence],
    ) -> Result<Vec<Correspondence>, RelativePoseError> {
        let forward: Vec<Correspondence> = correspondences
            .iter()
            .filter(|c| c.is_forward())
            .copied()
            .collect();
        if forward.len() < correspondences.len() {
            log::debug!(
                "ignoring {} correspondences not in front of the cameras",
                correspondences.len() - forward.len()
            );
        }

        let required = self.required_correspondences();
        if forward.len() < required {
            return Err(RelativePoseError::InsufficientData {
                required,
                actual: forward.len(),
            });
        }
        Ok(forward)
    }
}

fn log_selection(selection: &ChiralitySelection) {
    log::debug!(
        "chirality scores {:?}, selected hypothesis {}",
        selection.scores,
        selection.index
    );
    if selection.best_score() < 0.5 {
        log::warn!(
            "weak chirality support: only {:.1}% of points in front of both views",
            selection.best_score() * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vio_linalg::rotation::{is_rotation, rotation_angle_deg, skew};

    fn scene(r_cv: DMat3, t_cv: DVec3, n: usize) -> Vec<Correspondence> {
        (0..n)
            .map(|i| {
                let fi = i as f64;
                let x = DVec3::new(
                    (fi * 0.83).sin() * 2.0,
                    (fi * 0.47).cos() * 1.5,
                    5.0 + (fi * 0.31).cos() * 2.5,
                );
                Correspondence::new(x.normalize(), (r_cv * x + t_cv).normalize())
            })
            .collect()
    }

    #[test]
    fn test_solve_insufficient_data() {
        let c = scene(DMat3::IDENTITY, DVec3::X, 8);
        let err = RelativePoseSolver::default().solve(&c).unwrap_err();
        assert_eq!(
            err,
            RelativePoseError::InsufficientData {
                required: 9,
                actual: 8
            }
        );
    }

    #[test]
    fn test_min_correspondences_clamped_to_eight() {
        let solver = RelativePoseSolver::new(RelativePoseConfig {
            min_correspondences: 3,
            ..Default::default()
        });
        assert_eq!(solver.required_correspondences(), 8);
    }

    #[test]
    fn test_backward_bearings_are_not_counted() {
        let mut c = scene(DMat3::IDENTITY, DVec3::X, 9);
        c[0].second.z = -1.0;
        let err = RelativePoseSolver::default().solve(&c).unwrap_err();
        assert_eq!(
            err,
            RelativePoseError::InsufficientData {
                required: 9,
                actual: 8
            }
        );
    }

    #[test]
    fn test_solve_recovers_inverse_motion() -> Result<(), RelativePoseError> {
        let r_cv = DMat3::from_axis_angle(DVec3::new(0.2, 1.0, -0.1).normalize(), 0.25);
        let t_cv = DVec3::new(0.9, -0.2, 0.15);
        let c = scene(r_cv, t_cv, 30);

        for ransac in [None, Some(RansacParams::default())] {
            let solver = RelativePoseSolver::new(RelativePoseConfig {
                ransac,
                ..Default::default()
            });
            let pose = solver.solve(&c)?;
            assert!(is_rotation(&pose.rotation, 1e-9));
            assert!(rotation_angle_deg(&pose.rotation, &r_cv.transpose()) < 1e-4);

            let t_expected = (-(r_cv.transpose() * t_cv)).normalize();
            assert_relative_eq!(pose.translation.dot(t_expected), 1.0, epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_hypotheses_are_proper_rotations() {
        let solver = RelativePoseSolver::default();
        let e = DMat3::from_cols(
            DVec3::new(0.1, 0.2, -0.3),
            DVec3::new(0.4, -0.1, 0.2),
            DVec3::new(-0.2, 0.5, 0.3),
        );
        for m in [e, e * -1.0, e.transpose()] {
            for h in solver.hypotheses(&m) {
                assert!(is_rotation(&h.rotation, 1e-9));
            }
        }
    }

    fn reflected_decomposition() -> EssentialDecomposition {
        EssentialDecomposition {
            // exact determinant -1
            r1: DMat3::from_diagonal(DVec3::new(1.0, 1.0, -1.0)),
            r2: DMat3::from_axis_angle(DVec3::X, 0.4),
            t: DVec3::Z,
        }
    }

    #[test]
    fn test_guard_reflection_negates_essential() {
        let e = skew(DVec3::new(0.8, 0.1, -0.2)) * DMat3::from_axis_angle(DVec3::Y, 0.3);
        let solver = RelativePoseSolver::default();

        let guarded = solver.guard_reflection(&e, reflected_decomposition());
        let expected = decompose_essential(&(e * -1.0));
        assert_eq!(guarded.r1, expected.r1);
        assert_eq!(guarded.r2, expected.r2);
        assert_eq!(guarded.t, expected.t);
    }

    #[test]
    fn test_guard_reflection_keeps_proper_decomposition() {
        let e = skew(DVec3::new(0.8, 0.1, -0.2)) * DMat3::from_axis_angle(DVec3::Y, 0.3);
        let solver = RelativePoseSolver::default();

        let proper = EssentialDecomposition {
            r1: DMat3::from_axis_angle(DVec3::Y, 0.2),
            ..reflected_decomposition()
        };
        let kept = solver.guard_reflection(&e, proper);
        assert_eq!(kept.r1, proper.r1);
        assert_eq!(kept.r2, proper.r2);
        assert_eq!(kept.t, proper.t);
    }

    #[test]
    fn test_guard_reflection_disabled_by_zero_tolerance() {
        let e = skew(DVec3::new(0.8, 0.1, -0.2)) * DMat3::from_axis_angle(DVec3::Y, 0.3);
        let solver = RelativePoseSolver::new(RelativePoseConfig {
            reflection_tolerance: 0.0,
            ..Default::default()
        });

        let reflected = reflected_decomposition();
        let kept = solver.guard_reflection(&e, reflected);
        assert_eq!(kept.r1, reflected.r1);
        assert!(kept.r1.determinant() < 0.0);
    }

    #[test]
    fn test_hypotheses_follow_guard() {
        let solver = RelativePoseSolver::default();
        let e = DMat3::from_cols(
            DVec3::new(0.1, 0.2, -0.3),
            DVec3::new(0.4, -0.1, 0.2),
            DVec3::new(-0.2, 0.5, 0.3),
        );
        for m in [e, e * -1.0] {
            let expected = solver
                .guard_reflection(&m, decompose_essential(&m))
                .hypotheses()
                .map(PoseHypothesis::proper);
            assert_eq!(solver.hypotheses(&m), expected);
        }
    }

    #[test]
    fn test_relative_pose_identity() {
        let p = RelativePose::default();
        assert_eq!(p.rotation, DMat3::IDENTITY);
        assert_eq!(p.translation, DVec3::ZERO);
    }
}
