use std::collections::VecDeque;

use glam::{DMat3, DQuat};
use vio_linalg::rotation::{quat_from_rotation, rotation_angle_deg};

/// Observations of one frame-to-frame motion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameRecord {
    /// Relative rotation measured by the camera.
    pub camera_rotation: DMat3,
    /// Relative rotation integrated by the IMU.
    pub imu_rotation: DMat3,
    /// IMU rotation expressed in the camera frame with the estimate current at insertion time.
    pub imu_in_camera: DMat3,
    /// Angle in degrees between `camera_rotation` and `imu_in_camera`.
    pub residual_deg: f64,
    /// Robust weight of the frame in the linear system.
    pub weight: f64,
}

impl FrameRecord {
    /// Build a record and its Huber weight.
    ///
    /// `camera_from_imu` is the extrinsic estimate before this frame is solved.
    pub fn new(
        camera_rotation: DMat3,
        imu_rotation: DMat3,
        camera_from_imu: &DMat3,
        huber_cutoff_deg: f64,
    ) -> Self {
        let imu_in_camera = *camera_from_imu * imu_rotation * camera_from_imu.transpose();
        let residual_deg = rotation_angle_deg(&camera_rotation, &imu_in_camera);
        Self {
            camera_rotation,
            imu_rotation,
            imu_in_camera,
            residual_deg,
            weight: huber_weight(residual_deg, huber_cutoff_deg),
        }
    }

    /// Camera rotation as a unit quaternion with non-negative scalar part.
    pub fn camera_quat(&self) -> DQuat {
        quat_from_rotation(&self.camera_rotation)
    }

    /// IMU rotation as a unit quaternion with non-negative scalar part.
    pub fn imu_quat(&self) -> DQuat {
        quat_from_rotation(&self.imu_rotation)
    }
}

/// Huber weight of an angular residual: `cutoff / residual` beyond the cutoff, one otherwise.
pub fn huber_weight(residual_deg: f64, cutoff_deg: f64) -> f64 {
    if residual_deg > cutoff_deg {
        cutoff_deg / residual_deg
    } else {
        1.0
    }
}

/// Ordered per-frame records, oldest first.
#[derive(Clone, Debug, Default)]
pub struct CalibrationHistory {
    records: VecDeque<FrameRecord>,
}

impl CalibrationHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the newest record.
    pub fn push(&mut self, record: FrameRecord) {
        self.records.push_back(record);
    }

    /// Drop the oldest records so that at most `capacity` remain.
    pub fn truncate_front(&mut self, capacity: usize) {
        while self.records.len() > capacity {
            self.records.pop_front();
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate the records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &FrameRecord> {
        self.records.iter()
    }

    /// The newest record.
    pub fn last(&self) -> Option<&FrameRecord> {
        self.records.back()
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
