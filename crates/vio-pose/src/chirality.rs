use vio_linalg::triangulation::{triangulate_point_linear, two_view_depths};

use crate::essential::PoseHypothesis;
use crate::Correspondence;

/// Fraction of correspondences that triangulate in front of both cameras.
///
/// The first camera is `[I | 0]` and the second camera is the hypothesis `[R | t]`. Points that
/// cannot be triangulated (at infinity) count as failures. An empty batch scores zero.
pub fn chirality_score(correspondences: &[Correspondence], hypothesis: &PoseHypothesis) -> f64 {
    if correspondences.is_empty() {
        return 0.0;
    }

    let r = &hypothesis.rotation;
    let t = &hypothesis.translation;
    let front_count = correspondences
        .iter()
        .filter_map(|c| triangulate_point_linear(&c.first, &c.second, r, t))
        .filter(|x| {
            let (z1, z2) = two_view_depths(x, r, t);
            z1 > 0.0 && z2 > 0.0
        })
        .count();

    front_count as f64 / correspondences.len() as f64
}

/// Outcome of scoring the four hypotheses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChiralitySelection {
    /// Index of the selected hypothesis.
    pub index: usize,
    /// Positive-depth fraction of every hypothesis, in input order.
    pub scores: [f64; 4],
}

impl ChiralitySelection {
    /// Score of the selected hypothesis.
    pub fn best_score(&self) -> f64 {
        self.scores[self.index]
    }
}

/// Select the physically consistent hypothesis.
///
/// The hypotheses must be ordered `(R1, t)`, `(R1, -t)`, `(R2, t)`, `(R2, -t)`. For each
/// rotation the translation sign with the higher score is kept (`t` on ties), then `R1` wins only
/// when its best score is strictly higher than the one of `R2`.
pub fn select_hypothesis(
    correspondences: &[Correspondence],
    hypotheses: &[PoseHypothesis; 4],
) -> ChiralitySelection {
    let scores = hypotheses.map(|h| chirality_score(correspondences, &h));

    let best_r1 = if scores[0] >= scores[1] { 0 } else { 1 };
    let best_r2 = if scores[2] >= scores[3] { 2 } else { 3 };
    let index = if scores[best_r1] > scores[best_r2] {
        best_r1
    } else {
        best_r2
    };

    ChiralitySelection { index, scores }
}
