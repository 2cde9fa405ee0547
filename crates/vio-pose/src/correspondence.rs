use glam::{DVec2, DVec3};

/// A pair of bearing vectors observing the same point in two views.
///
/// Bearings are directions in the camera frame (not pixel coordinates) and may have any positive
/// scale. The epipolar estimators work on the normalized image plane, so bearings are expected to
/// point forward (`z > 0`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Correspondence {
    /// Bearing in the first view.
    pub first: DVec3,
    /// Bearing in the second view.
    pub second: DVec3,
}

impl Correspondence {
    /// Create a correspondence from two bearings.
    pub fn new(first: DVec3, second: DVec3) -> Self {
        Self { first, second }
    }

    /// Whether both bearings point in front of their camera.
    pub fn is_forward(&self) -> bool {
        self.first.z > 1e-9 && self.second.z > 1e-9
    }

    /// Both bearings projected on the normalized image plane `z = 1`.
    pub fn normalized(&self) -> (DVec2, DVec2) {
        (
            DVec2::new(self.first.x / self.first.z, self.first.y / self.first.z),
            DVec2::new(self.second.x / self.second.z, self.second.y / self.second.z),
        )
    }
}

impl From<(DVec3, DVec3)> for Correspondence {
    fn from((first, second): (DVec3, DVec3)) -> Self {
        Self::new(first, second)
    }
}
