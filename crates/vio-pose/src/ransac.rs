use glam::DMat3;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::essential::{essential_8point, sampson_distance, MIN_CORRESPONDENCES_8POINT};
use crate::Correspondence;

/// Parameters for RANSAC model estimation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Maximum number of RANSAC iterations.
    pub max_iterations: usize,
    /// Inlier threshold on the normalized image plane (compared against the squared Sampson
    /// distance as `threshold²`).
    pub threshold: f64,
    /// Minimum number of inliers required for acceptance.
    pub min_inliers: usize,
    /// Desired probability that at least one drawn sample is outlier-free.
    pub confidence: f64,
    /// Optional RNG seed for deterministic runs.
    pub random_seed: Option<u64>,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            // about 3 pixels for a 460 pixel focal length
            threshold: 3.0 / 460.0,
            min_inliers: 15,
            confidence: 0.99,
            random_seed: Some(0),
        }
    }
}

/// Result of a RANSAC model fit.
#[derive(Clone, Debug)]
pub struct RansacResult<M> {
    /// Estimated model.
    pub model: M,
    /// Per-correspondence inlier mask.
    pub inliers: Vec<bool>,
    /// Total inlier count.
    pub inlier_count: usize,
    /// Truncated cost `Σ min(rᵢ, threshold²)` over all correspondences (lower is better).
    pub score: f64,
}

/// A model fitted from minimal samples of correspondences.
pub trait RansacEstimator {
    /// Type of the fitted model.
    type Model: Clone;

    /// Number of correspondences drawn per hypothesis.
    fn sample_size(&self) -> usize;

    /// Fit a model to a sample, or `None` when the sample is degenerate.
    fn fit(&self, sample: &[Correspondence]) -> Option<Self::Model>;

    /// Squared residual of one correspondence under `model`.
    fn residual(&self, model: &Self::Model, correspondence: &Correspondence) -> f64;
}

/// Essential matrices from eight-point samples, scored by Sampson distance.
#[derive(Clone, Copy, Debug, Default)]
pub struct EssentialEstimator;

impl RansacEstimator for EssentialEstimator {
    type Model = DMat3;

    fn sample_size(&self) -> usize {
        MIN_CORRESPONDENCES_8POINT
    }

    fn fit(&self, sample: &[Correspondence]) -> Option<DMat3> {
        essential_8point(sample).ok()
    }

    fn residual(&self, model: &DMat3, correspondence: &Correspondence) -> f64 {
        sampson_distance(model, correspondence)
    }
}

/// Number of draws needed to see one clean sample with probability `confidence`.
///
/// `inlier_ratio` is the fraction of inliers of the best model so far.
pub fn required_iterations(inlier_ratio: f64, sample_size: usize, confidence: f64) -> usize {
    let p_clean = inlier_ratio.clamp(0.0, 1.0).powi(sample_size as i32);
    if p_clean >= 1.0 {
        return 1;
    }
    if p_clean <= 0.0 {
        return usize::MAX;
    }
    let log_fail = (1.0 - confidence.clamp(0.0, 1.0)).max(f64::MIN_POSITIVE).ln();
    let k = log_fail / (-p_clean).ln_1p();
    if k.is_finite() {
        k.ceil().max(1.0) as usize
    } else {
        usize::MAX
    }
}

/// Robustly fit a model with MSAC: hypotheses are ranked by their truncated residual cost.
///
/// The iteration budget shrinks as better models are found, following
/// [`required_iterations`], and never exceeds `params.max_iterations`.
///
/// Returns `None` when there are fewer correspondences than a sample needs or when the best model
/// has fewer than `min_inliers` inliers.
pub fn ransac<E: RansacEstimator>(
    estimator: &E,
    correspondences: &[Correspondence],
    params: &RansacParams,
) -> Option<RansacResult<E::Model>> {
    let n = correspondences.len();
    let sample_size = estimator.sample_size();
    if sample_size == 0 || n < sample_size {
        return None;
    }

    let mut rng = match params.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => {
            let mut tr = rand::rng();
            StdRng::from_rng(&mut tr)
        }
    };

    let threshold_sq = params.threshold * params.threshold;
    let mut indices: Vec<usize> = (0..n).collect();
    let mut sample = Vec::with_capacity(sample_size);
    let mut best: Option<RansacResult<E::Model>> = None;
    let mut budget = params.max_iterations;
    let mut iterations = 0;

    while iterations < budget {
        iterations += 1;

        let (drawn, _) = indices.partial_shuffle(&mut rng, sample_size);
        sample.clear();
        sample.extend(drawn.iter().map(|&idx| correspondences[idx]));

        let model = match estimator.fit(&sample) {
            Some(m) => m,
            None => continue,
        };

        let residuals: Vec<f64> = correspondences
            .iter()
            .map(|c| estimator.residual(&model, c))
            .collect();
        let cost: f64 = residuals.iter().map(|r| r.min(threshold_sq)).sum();
        if best.as_ref().is_some_and(|b| cost >= b.score) {
            continue;
        }

        let inliers: Vec<bool> = residuals.iter().map(|&r| r <= threshold_sq).collect();
        let inlier_count = inliers.iter().filter(|&&inlier| inlier).count();
        budget = budget.min(required_iterations(
            inlier_count as f64 / n as f64,
            sample_size,
            params.confidence,
        ));
        best = Some(RansacResult {
            model,
            inliers,
            inlier_count,
            score: cost,
        });
    }

    match best {
        Some(res) if res.inlier_count >= params.min_inliers => {
            log::debug!(
                "RANSAC stopped after {} iterations with {} of {} inliers",
                iterations,
                res.inlier_count,
                n
            );
            Some(res)
        }
        res => {
            log::debug!(
                "RANSAC found no consensus: best {} of {} inliers",
                res.map_or(0, |r| r.inlier_count),
                n
            );
            None
        }
    }
}

/// Estimate an essential matrix with RANSAC using the 8-point solver.
pub fn ransac_essential(
    correspondences: &[Correspondence],
    params: &RansacParams,
) -> Option<RansacResult<DMat3>> {
    ransac(&EssentialEstimator, correspondences, params)
}
