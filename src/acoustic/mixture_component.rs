//! A single diagonal-covariance Gaussian.

use std::sync::Arc;

use tracing::trace;

use super::logmath::LogMath;
use super::simd::weighted_sq_distance;
use crate::error::{ModelError, Result};
use crate::telemetry;

/// An affine transform `y = A·x + b` applied to Gaussian statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    matrix: Arc<[Vec<f32>]>,
    vector: Arc<[f32]>,
}

impl Transform {
    /// Create a transform from a square matrix and an offset vector.
    pub fn new(matrix: Vec<Vec<f32>>, vector: Vec<f32>) -> Result<Self> {
        let dim = vector.len();
        if matrix.len() != dim {
            return Err(ModelError::InvalidTransform(format!(
                "matrix has {} rows, vector has {} entries",
                matrix.len(),
                dim
            ))
            .into());
        }
        if let Some((row, r)) = matrix.iter().enumerate().find(|(_, r)| r.len() != dim) {
            return Err(ModelError::InvalidTransform(format!(
                "row {} has {} columns, expected {}",
                row,
                r.len(),
                dim
            ))
            .into());
        }
        Ok(Self {
            matrix: matrix.into(),
            vector: vector.into(),
        })
    }

    /// Dimension of the transform.
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    fn apply(&self, x: &[f32]) -> Box<[f32]> {
        self.matrix
            .iter()
            .zip(self.vector.iter())
            .map(|(row, &b)| row.iter().zip(x).map(|(&a, &v)| a * v).sum::<f32>() + b)
            .collect()
    }
}

/// One Gaussian of a mixture, with cached values derived for fast scoring.
///
/// Precisions are stored as `1 / (-2 · variance)` so that the weighted squared
/// distance is already the (negative) Gaussian exponent.
#[derive(Debug)]
pub struct MixtureComponent {
    mean: Arc<[f32]>,
    variance: Arc<[f32]>,
    mean_transform: Option<Transform>,
    variance_transform: Option<Transform>,
    mean_transformed: Box<[f32]>,
    precision_transformed: Box<[f32]>,
    log_precomputed_gaussian_factor: f32,
    variance_floor: f32,
    dist_floor: f32,
    log_math: LogMath,
}

impl MixtureComponent {
    /// Create a component from pooled mean and variance vectors.
    ///
    /// `dist_floor` is linear; 0.0 disables the score floor.
    pub fn new(
        mean: Arc<[f32]>,
        variance: Arc<[f32]>,
        log_math: LogMath,
        variance_floor: f32,
        dist_floor: f32,
    ) -> Result<Self> {
        Self::with_transforms(mean, variance, None, None, log_math, variance_floor, dist_floor)
    }

    /// Create a component whose statistics pass through mean and variance transforms.
    pub fn with_transforms(
        mean: Arc<[f32]>,
        variance: Arc<[f32]>,
        mean_transform: Option<Transform>,
        variance_transform: Option<Transform>,
        log_math: LogMath,
        variance_floor: f32,
        dist_floor: f32,
    ) -> Result<Self> {
        if mean.len() != variance.len() {
            return Err(ModelError::DimensionMismatch {
                what: "variance",
                expected: mean.len(),
                actual: variance.len(),
            }
            .into());
        }
        if mean.is_empty() {
            return Err(ModelError::DimensionMismatch {
                what: "mean",
                expected: 1,
                actual: 0,
            }
            .into());
        }

        let mut component = Self {
            mean,
            variance,
            mean_transform,
            variance_transform,
            mean_transformed: Box::default(),
            precision_transformed: Box::default(),
            log_precomputed_gaussian_factor: 0.0,
            variance_floor,
            dist_floor: log_math.linear_to_log(dist_floor as f64),
            log_math,
        };
        component.transform_stats()?;
        Ok(component)
    }

    /// Recompute the transformed mean and precision caches.
    pub fn transform_stats(&mut self) -> Result<()> {
        let dim = self.mean.len();
        for transform in [&self.mean_transform, &self.variance_transform].into_iter().flatten() {
            if transform.dimension() != dim {
                return Err(ModelError::DimensionMismatch {
                    what: "transform",
                    expected: dim,
                    actual: transform.dimension(),
                }
                .into());
            }
        }
        self.compute_caches();
        Ok(())
    }

    fn compute_caches(&mut self) {
        self.mean_transformed = match &self.mean_transform {
            Some(t) => t.apply(&self.mean),
            None => self.mean.iter().copied().collect(),
        };

        let variance: Box<[f32]> = match &self.variance_transform {
            Some(t) => t.apply(&self.variance),
            None => self.variance.iter().copied().collect(),
        };

        let floor = self.variance_floor;
        self.precision_transformed = variance
            .iter()
            .map(|&v| {
                let v = if v < floor || v.is_nan() { floor } else { v };
                1.0 / (-2.0 * v)
            })
            .collect();

        self.precompute_distance();
    }

    fn precompute_distance(&mut self) {
        let dim = self.precision_transformed.len() as f64;
        let log_det: f64 = self
            .precision_transformed
            .iter()
            .map(|&p| (-2.0 * p as f64).ln())
            .sum();
        let ln_two_pi = (2.0 * std::f64::consts::PI).ln();
        self.log_precomputed_gaussian_factor = (-0.5 * (dim * ln_two_pi - log_det)) as f32;
    }

    /// Log-likelihood of `feature` in the model's log base.
    pub fn score(&self, feature: &[f32]) -> f32 {
        debug_assert_eq!(feature.len(), self.mean_transformed.len());
        let log_dval = self.log_precomputed_gaussian_factor
            + weighted_sq_distance(feature, &self.mean_transformed, &self.precision_transformed);

        if log_dval.is_nan() {
            trace!("NaN Gaussian score, clamping to log-zero");
            telemetry::record_nan_score();
            return LogMath::LOG_ZERO;
        }

        let score = self.log_math.ln_to_log(log_dval);
        if score < self.dist_floor {
            self.dist_floor
        } else {
            score
        }
    }

    /// A new component with `matrix`·mean + `vector` as its mean transform.
    ///
    /// The receiver is left untouched so decoders holding it are unaffected.
    pub fn adapted(&self, matrix: Vec<Vec<f32>>, vector: Vec<f32>) -> Result<Self> {
        let mut component = self.clone();
        component.mean_transform = Some(Transform::new(matrix, vector)?);
        component.transform_stats()?;
        Ok(component)
    }

    /// Feature dimension.
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn variance(&self) -> &[f32] {
        &self.variance
    }

    pub fn mean_transformed(&self) -> &[f32] {
        &self.mean_transformed
    }

    pub fn precision_transformed(&self) -> &[f32] {
        &self.precision_transformed
    }

    pub fn log_precomputed_gaussian_factor(&self) -> f32 {
        self.log_precomputed_gaussian_factor
    }
}

impl Clone for MixtureComponent {
    /// Deep copy: parameter vectors are duplicated and the caches rebuilt.
    fn clone(&self) -> Self {
        let mut component = Self {
            mean: Arc::from(&*self.mean),
            variance: Arc::from(&*self.variance),
            mean_transform: self.mean_transform.as_ref().map(|t| Transform {
                matrix: Arc::from(&*t.matrix),
                vector: Arc::from(&*t.vector),
            }),
            variance_transform: self.variance_transform.as_ref().map(|t| Transform {
                matrix: Arc::from(&*t.matrix),
                vector: Arc::from(&*t.vector),
            }),
            mean_transformed: Box::default(),
            precision_transformed: Box::default(),
            log_precomputed_gaussian_factor: 0.0,
            variance_floor: self.variance_floor,
            dist_floor: self.dist_floor,
            log_math: self.log_math,
        };
        component.compute_caches();
        component
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(mean: &[f32], variance: &[f32], floor: f32) -> MixtureComponent {
        let lm = LogMath::new(std::f64::consts::E).unwrap();
        MixtureComponent::new(mean.into(), variance.into(), lm, floor, 0.0).unwrap()
    }

    fn reference_ln_density(x: &[f32], mean: &[f32], var: &[f32]) -> f64 {
        x.iter()
            .zip(mean)
            .zip(var)
            .map(|((&x, &m), &v)| {
                let (x, m, v) = (x as f64, m as f64, v as f64);
                -0.5 * (2.0 * std::f64::consts::PI * v).ln() - (x - m).powi(2) / (2.0 * v)
            })
            .sum()
    }

    #[test]
    fn test_matches_gaussian_density() {
        let mean = [0.5, -1.0, 2.0];
        let var = [1.0, 0.25, 4.0];
        let c = component(&mean, &var, 1e-4);
        let x = [0.0, -0.5, 3.0];
        let expected = reference_ln_density(&x, &mean, &var);
        assert!((c.score(&x) as f64 - expected).abs() < 1e-4);
    }

    #[test]
    fn test_factor_formula() {
        let c = component(&[0.0, 0.0], &[1.0, 1.0], 1e-4);
        let expected = -(2.0 * std::f32::consts::PI).ln();
        assert!((c.log_precomputed_gaussian_factor() - expected).abs() < 1e-6);
        assert!(c.precision_transformed().iter().all(|&p| (p + 0.5).abs() < 1e-7));
    }

    #[test]
    fn test_score_determinism_and_clone() {
        let mean: Vec<f32> = (0..39).map(|i| i as f32 * 0.1).collect();
        let var: Vec<f32> = (0..39).map(|i| 0.5 + i as f32 * 0.01).collect();
        let lm = LogMath::default();
        let c = MixtureComponent::new(mean.clone().into(), var.into(), lm, 1e-4, 0.0).unwrap();
        let x: Vec<f32> = mean.iter().map(|m| m + 0.3).collect();

        let first = c.score(&x);
        for _ in 0..10 {
            let again = c.score(&x);
            assert!((again - first).abs() <= 1e-5 * first.abs());
        }

        let copy = c.clone();
        assert!(!std::ptr::eq(copy.mean().as_ptr(), c.mean().as_ptr()));
        let cloned = copy.score(&x);
        assert!((cloned - first).abs() <= 1e-5 * first.abs());
    }

    #[test]
    fn test_variance_floor_is_idempotent() {
        let x = [0.3, 0.1];
        let at_floor = component(&[0.0, 0.0], &[1e-4, 1.0], 1e-4).score(&x);
        for tiny in [5e-5, 1e-6, 0.0, -1.0] {
            let below = component(&[0.0, 0.0], &[tiny, 1.0], 1e-4).score(&x);
            assert_eq!(below, at_floor, "variance {}", tiny);
        }
    }

    #[test]
    fn test_dist_floor_clamps() {
        let lm = LogMath::new(std::f64::consts::E).unwrap();
        let floor = 1e-3f32;
        let c = MixtureComponent::new([0.0].into(), [1.0].into(), lm, 1e-4, floor).unwrap();
        let far = c.score(&[100.0]);
        assert!((far - floor.ln()).abs() < 1e-4);
    }

    #[test]
    fn test_nan_maps_to_log_zero() {
        let c = component(&[0.0], &[1.0], 1e-4);
        assert_eq!(c.score(&[f32::NAN]), LogMath::LOG_ZERO);
    }

    #[test]
    fn test_dimension_mismatch() {
        let lm = LogMath::default();
        let err = MixtureComponent::new([0.0, 1.0].into(), [1.0].into(), lm, 1e-4, 0.0).unwrap_err();
        assert!(err.to_string().contains("Dimension mismatch"));
    }

    #[test]
    fn test_transforms() {
        let lm = LogMath::new(std::f64::consts::E).unwrap();
        let shift = Transform::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![1.0, 2.0]).unwrap();
        let c = MixtureComponent::with_transforms(
            [0.0, 0.0].into(),
            [1.0, 1.0].into(),
            Some(shift),
            None,
            lm,
            1e-4,
            0.0,
        )
        .unwrap();
        assert_eq!(c.mean_transformed(), &[1.0, 2.0]);
        assert_eq!(c.mean(), &[0.0, 0.0]);

        let bad = Transform::new(vec![vec![1.0]], vec![0.0]).unwrap();
        assert!(MixtureComponent::with_transforms(
            [0.0, 0.0].into(),
            [1.0, 1.0].into(),
            None,
            Some(bad),
            lm,
            1e-4,
            0.0
        )
        .is_err());
        assert!(Transform::new(vec![vec![1.0, 0.0]], vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn test_adapted_leaves_original() {
        let c = component(&[0.0, 0.0], &[1.0, 1.0], 1e-4);
        let adapted = c
            .adapted(vec![vec![2.0, 0.0], vec![0.0, 2.0]], vec![0.5, 0.5])
            .unwrap();
        assert_eq!(c.mean_transformed(), &[0.0, 0.0]);
        assert_eq!(adapted.mean_transformed(), &[0.5, 0.5]);
        assert!(adapted.score(&[0.5, 0.5]) > c.score(&[0.5, 0.5]) - 1e-6);
    }
}
