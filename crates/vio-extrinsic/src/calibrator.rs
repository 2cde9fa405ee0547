use glam::{DMat3, DQuat};
use serde::{Deserialize, Serialize};
use vio_linalg::svd::dense_svd;
use vio_pose::{Correspondence, RelativePoseConfig, RelativePoseSolver};

use crate::history::{CalibrationHistory, FrameRecord};
use crate::quaternion::{quat_left, quat_right};

/// Errors returned by the extrinsic rotation calibrator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// The estimate has not reached the required number of frames and confidence yet.
    #[error("Calibration not converged after {frames} frames (confidence {confidence:.3})")]
    NotConverged {
        /// Number of frames processed so far.
        frames: usize,
        /// Confidence of the latest solve.
        confidence: f64,
    },
}

/// Configuration of the extrinsic rotation calibrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Minimum number of processed frames before convergence can be reported.
    pub window_size: usize,
    /// Second smallest singular value of the system required for convergence.
    pub confidence_threshold: f64,
    /// Angular residual in degrees beyond which a frame is down-weighted.
    pub huber_cutoff_deg: f64,
    /// Keep only the latest `window_size` frames once converged.
    pub bound_history_after_convergence: bool,
    /// Settings of the camera rotation solver.
    pub pose: RelativePoseConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            confidence_threshold: 0.25,
            huber_cutoff_deg: 5.0,
            bound_history_after_convergence: true,
            pose: RelativePoseConfig::default(),
        }
    }
}

/// The current extrinsic rotation estimate.
///
/// `camera_from_imu` solves `q_cam ⊗ q_ci = q_ci ⊗ q_imu`; its inverse is
/// [`Self::imu_from_camera`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtrinsicEstimate {
    /// Rotation mapping IMU frame directions into camera frame directions.
    pub camera_from_imu: DMat3,
    /// Second smallest singular value of the latest solve.
    pub confidence: f64,
    /// Whether the estimate can be trusted.
    pub converged: bool,
}

impl ExtrinsicEstimate {
    /// Rotation mapping camera frame directions into IMU frame directions.
    pub fn imu_from_camera(&self) -> DMat3 {
        self.camera_from_imu.transpose()
    }
}

impl Default for ExtrinsicEstimate {
    fn default() -> Self {
        Self {
            camera_from_imu: DMat3::IDENTITY,
            confidence: 0.0,
            converged: false,
        }
    }
}

/// Online estimator of the rotation between a camera and an IMU.
///
/// Feed one frame at a time with [`Self::process_frame`]. Every call re-solves the whole stored
/// history, so each instance must be driven by a single writer; the `&mut self` receivers enforce
/// it.
///
/// # Example
///
/// ```
/// use glam::{DMat3, DVec3};
/// use vio_extrinsic::{CalibrationConfig, ExtrinsicRotationCalibrator};
///
/// let truth = DMat3::from_axis_angle(DVec3::new(1.0, 0.0, 1.0).normalize(), 0.3);
/// let mut calib = ExtrinsicRotationCalibrator::new(CalibrationConfig::default());
///
/// for i in 0..20 {
///     let axis = DVec3::new((i as f64).sin(), (i as f64 * 0.7).cos(), 0.5).normalize();
///     let camera = DMat3::from_axis_angle(axis, 0.3);
///     let imu = truth.transpose() * camera * truth;
///     calib.process_rotations(camera, imu);
/// }
///
/// let calibrated = calib.calibrated_rotation().unwrap();
/// assert!((calibrated.transpose() * truth).abs_diff_eq(DMat3::IDENTITY, 1e-6));
/// ```
#[derive(Clone, Debug)]
pub struct ExtrinsicRotationCalibrator {
    config: CalibrationConfig,
    solver: RelativePoseSolver,
    history: CalibrationHistory,
    estimate: ExtrinsicEstimate,
    calibrated: Option<DMat3>,
    frame_count: usize,
}

impl Default for ExtrinsicRotationCalibrator {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}

impl ExtrinsicRotationCalibrator {
    /// Create a calibrator starting from the identity rotation.
    pub fn new(config: CalibrationConfig) -> Self {
        let solver = RelativePoseSolver::new(config.pose.clone());
        Self {
            config,
            solver,
            history: CalibrationHistory::new(),
            estimate: ExtrinsicEstimate::default(),
            calibrated: None,
            frame_count: 0,
        }
    }

    /// The calibrator configuration.
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Process one frame from its correspondences and the IMU delta rotation.
    ///
    /// The camera rotation is recovered from the correspondences; with too few of them the frame
    /// is treated as a pure identity rotation.
    ///
    /// # Arguments
    ///
    /// * `correspondences` - Bearing pairs between the previous and the current frame.
    /// * `imu_delta` - Unit quaternion of the IMU rotation between the same frames.
    ///
    /// # Returns
    ///
    /// The updated estimate. Only trust it when `converged` is set. Its `camera_from_imu` is the
    /// null vector `q_ci` of the stacked system itself; the rotation taking camera directions into
    /// the IMU frame (`q_ci⁻¹`, often called `ric`) is [`ExtrinsicEstimate::imu_from_camera`].
    pub fn process_frame(
        &mut self,
        correspondences: &[Correspondence],
        imu_delta: DQuat,
    ) -> ExtrinsicEstimate {
        let camera_rotation = match self.solver.solve_rotation(correspondences) {
            Ok(r) => r,
            Err(err) => {
                log::debug!("camera rotation unavailable, using identity: {err}");
                DMat3::IDENTITY
            }
        };
        self.process_rotations(camera_rotation, DMat3::from_quat(imu_delta.normalize()))
    }

    /// Process one frame from already known camera and IMU relative rotations.
    ///
    /// A frame with a non-finite rotation (for instance from a zero IMU quaternion) is skipped:
    /// it is neither stored nor counted and the current estimate is returned unchanged.
    pub fn process_rotations(
        &mut self,
        camera_rotation: DMat3,
        imu_rotation: DMat3,
    ) -> ExtrinsicEstimate {
        if !camera_rotation.is_finite() || !imu_rotation.is_finite() {
            log::warn!(
                "skipping frame {} with a non-finite rotation",
                self.frame_count + 1
            );
            return self.estimate;
        }

        self.frame_count += 1;
        let record = FrameRecord::new(
            camera_rotation,
            imu_rotation,
            &self.estimate.camera_from_imu,
            self.config.huber_cutoff_deg,
        );
        log::debug!(
            "frame {}: residual {:.3} deg, weight {:.3}",
            self.frame_count,
            record.residual_deg,
            record.weight
        );
        self.history.push(record);

        let (camera_from_imu, confidence) = solve_history(&self.history);
        let converged = self.frame_count >= self.config.window_size
            && confidence > self.config.confidence_threshold;

        self.estimate = ExtrinsicEstimate {
            camera_from_imu,
            confidence,
            converged,
        };

        if converged {
            if self.calibrated.is_none() {
                log::info!(
                    "extrinsic rotation converged after {} frames (confidence {:.3})",
                    self.frame_count,
                    confidence
                );
            }
            self.calibrated = Some(camera_from_imu);
            if self.config.bound_history_after_convergence {
                self.history.truncate_front(self.config.window_size);
            }
        }

        self.estimate
    }

    /// The latest estimate, trusted or not.
    pub fn current_estimate(&self) -> ExtrinsicEstimate {
        self.estimate
    }

    /// The last converged `camera_from_imu` rotation.
    pub fn calibrated_rotation(&self) -> Result<DMat3, CalibrationError> {
        self.calibrated.ok_or(CalibrationError::NotConverged {
            frames: self.frame_count,
            confidence: self.estimate.confidence,
        })
    }

    /// Number of frames processed since creation or the last reset.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// The stored per-frame records.
    pub fn history(&self) -> &CalibrationHistory {
        &self.history
    }

    /// Forget every frame and restart from the identity rotation.
    pub fn reset(&mut self) {
        self.history.clear();
        self.estimate = ExtrinsicEstimate::default();
        self.calibrated = None;
        self.frame_count = 0;
    }
}

/// Solve the stacked system `wᵢ · (L(q_cam,i) - R(q_imu,i)) · x = 0`.
///
/// Returns the rotation of the null vector and the second smallest singular value.
fn solve_history(history: &CalibrationHistory) -> (DMat3, f64) {
    let mut a = faer::Mat::<f64>::zeros(4 * history.len(), 4);
    for (i, record) in history.iter().enumerate() {
        let block =
            (quat_left(&record.camera_quat()) - quat_right(&record.imu_quat())) * record.weight;
        for c in 0..4 {
            let col = block.col(c);
            for r in 0..4 {
                a.write(4 * i + r, c, col[r]);
            }
        }
    }

    let svd = match dense_svd(a.as_ref()) {
        Ok(svd) => svd,
        Err(_) => return (DMat3::IDENTITY, 0.0),
    };

    let x = svd.null_vector();
    let q = DQuat::from_xyzw(x[0], x[1], x[2], x[3]).normalize();
    let confidence = svd.singular_values()[2];
    (DMat3::from_quat(q), confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use vio_linalg::rotation::{is_rotation, rotation_angle_deg};

    fn camera_motion(i: usize) -> DMat3 {
        let fi = i as f64;
        let axis = DVec3::new((fi * 1.3).sin(), (fi * 0.7).cos(), 0.4 + (fi * 0.5).sin() * 0.3);
        DMat3::from_axis_angle(axis.normalize(), 0.3 + 0.1 * (fi * 0.9).cos())
    }

    #[test]
    fn test_converges_to_truth() {
        let truth = DMat3::from_axis_angle(DVec3::new(0.3, -1.0, 0.2).normalize(), 0.5);
        let mut calib = ExtrinsicRotationCalibrator::default();

        let mut estimate = ExtrinsicEstimate::default();
        for i in 0..25 {
            let camera = camera_motion(i);
            estimate = calib.process_rotations(camera, truth.transpose() * camera * truth);
        }

        assert!(estimate.converged);
        assert!(is_rotation(&estimate.camera_from_imu, 1e-9));
        assert!(rotation_angle_deg(&estimate.camera_from_imu, &truth) < 0.01);
        let calibrated = calib.calibrated_rotation().unwrap();
        assert!(rotation_angle_deg(&calibrated, &truth) < 0.01);
    }

    #[test]
    fn test_not_converged_before_window() {
        let truth = DMat3::from_axis_angle(DVec3::Y, 0.2);
        let mut calib = ExtrinsicRotationCalibrator::default();
        for i in 0..9 {
            let camera = camera_motion(i);
            let est = calib.process_rotations(camera, truth.transpose() * camera * truth);
            assert!(!est.converged);
        }
        assert!(matches!(
            calib.calibrated_rotation(),
            Err(CalibrationError::NotConverged { frames: 9, .. })
        ));
    }

    #[test]
    fn test_identical_rotations_do_not_converge() {
        let mut calib = ExtrinsicRotationCalibrator::default();
        for _ in 0..30 {
            let est = calib.process_rotations(DMat3::IDENTITY, DMat3::IDENTITY);
            assert!(!est.converged);
            assert!(est.confidence < 1e-9);
        }
    }

    #[test]
    fn test_history_bounded_after_convergence() {
        let truth = DMat3::from_axis_angle(DVec3::X, 0.1);
        let mut calib = ExtrinsicRotationCalibrator::default();
        for i in 0..40 {
            let camera = camera_motion(i);
            calib.process_rotations(camera, truth.transpose() * camera * truth);
        }
        assert_eq!(calib.frame_count(), 40);
        assert!(calib.history().len() <= calib.config().window_size + 1);
    }

    #[test]
    fn test_unbounded_history_keeps_everything() {
        let truth = DMat3::from_axis_angle(DVec3::X, 0.1);
        let mut calib = ExtrinsicRotationCalibrator::new(CalibrationConfig {
            bound_history_after_convergence: false,
            ..Default::default()
        });
        for i in 0..15 {
            let camera = camera_motion(i);
            calib.process_rotations(camera, truth.transpose() * camera * truth);
        }
        assert_eq!(calib.history().len(), 15);
    }

    #[test]
    fn test_reset() {
        let truth = DMat3::from_axis_angle(DVec3::Z, 0.3);
        let mut calib = ExtrinsicRotationCalibrator::default();
        for i in 0..15 {
            let camera = camera_motion(i);
            calib.process_rotations(camera, truth.transpose() * camera * truth);
        }
        assert!(calib.calibrated_rotation().is_ok());

        calib.reset();
        assert_eq!(calib.frame_count(), 0);
        assert!(calib.history().is_empty());
        assert_eq!(calib.current_estimate(), ExtrinsicEstimate::default());
        assert!(calib.calibrated_rotation().is_err());
    }

    #[test]
    fn test_zero_imu_quaternion_is_skipped() {
        let truth = DMat3::from_axis_angle(DVec3::new(0.3, -1.0, 0.2).normalize(), 0.5);
        let mut calib = ExtrinsicRotationCalibrator::default();

        let est = calib.process_frame(&[], DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0));
        assert_eq!(est, ExtrinsicEstimate::default());
        assert_eq!(calib.frame_count(), 0);
        assert!(calib.history().is_empty());

        let mut estimate = est;
        for i in 0..20 {
            let camera = camera_motion(i);
            estimate = calib.process_rotations(camera, truth.transpose() * camera * truth);
        }
        assert!(estimate.converged);
        assert!(estimate.confidence.is_finite());
        assert!(rotation_angle_deg(&estimate.camera_from_imu, &truth) < 0.01);
    }

    #[test]
    fn test_non_finite_rotation_keeps_estimate() {
        let truth = DMat3::from_axis_angle(DVec3::Z, 0.3);
        let mut calib = ExtrinsicRotationCalibrator::default();
        for i in 0..12 {
            let camera = camera_motion(i);
            calib.process_rotations(camera, truth.transpose() * camera * truth);
        }
        let before = calib.current_estimate();
        let stored = calib.history().len();

        let nan = DMat3::from_diagonal(DVec3::splat(f64::NAN));
        assert_eq!(calib.process_rotations(camera_motion(12), nan), before);
        assert_eq!(calib.process_rotations(nan, DMat3::IDENTITY), before);
        assert_eq!(calib.frame_count(), 12);
        assert_eq!(calib.history().len(), stored);

        let camera = camera_motion(13);
        let after = calib.process_rotations(camera, truth.transpose() * camera * truth);
        assert!(after.converged);
        assert_eq!(calib.frame_count(), 13);
    }

    #[test]
    fn test_process_frame_without_correspondences_uses_identity() {
        let mut calib = ExtrinsicRotationCalibrator::default();
        calib.process_frame(&[], DQuat::from_axis_angle(DVec3::Z, 0.1));
        let record = calib.history().last().unwrap();
        assert_eq!(record.camera_rotation, DMat3::IDENTITY);
        assert!((record.residual_deg - 0.1f64.to_degrees()).abs() < 1e-6);
    }
}
