//! SIMD kernel for diagonal Gaussian evaluation.
//!
//! The hot loop of acoustic scoring is `Σ (x[i] - m[i])² · p[i]`, executed for
//! every mixture component of every active senone in every frame. The
//! implementation selects AVX2 at runtime with a scalar fallback.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "x86_64")]
use crate::constants::acoustic::SIMD_LANES;

/// Precision-weighted squared distance between a feature and a mean.
///
/// Only the common prefix of the three slices is used.
pub fn weighted_sq_distance(feature: &[f32], mean: &[f32], precision: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            // SAFETY: the avx2 feature was detected above.
            unsafe { weighted_sq_distance_avx2(feature, mean, precision) }
        } else {
            weighted_sq_distance_scalar(feature, mean, precision)
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        weighted_sq_distance_scalar(feature, mean, precision)
    }
}

/// AVX2 implementation of [`weighted_sq_distance`].
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn weighted_sq_distance_avx2(feature: &[f32], mean: &[f32], precision: &[f32]) -> f32 {
    let len = feature.len().min(mean.len()).min(precision.len());
    let (feature, mean, precision) = (&feature[..len], &mean[..len], &precision[..len]);

    if len < SIMD_LANES {
        return weighted_sq_distance_scalar(feature, mean, precision);
    }

    let mut sum_vec = _mm256_setzero_ps();
    let chunks = len / SIMD_LANES;
    for c in 0..chunks {
        let offset = c * SIMD_LANES;
        let x = _mm256_loadu_ps(feature.as_ptr().add(offset));
        let m = _mm256_loadu_ps(mean.as_ptr().add(offset));
        let p = _mm256_loadu_ps(precision.as_ptr().add(offset));
        let diff = _mm256_sub_ps(x, m);
        let sq = _mm256_mul_ps(diff, diff);
        sum_vec = _mm256_add_ps(sum_vec, _mm256_mul_ps(sq, p));
    }

    // Horizontal sum
    let mut lanes = [0.0f32; SIMD_LANES];
    _mm256_storeu_ps(lanes.as_mut_ptr(), sum_vec);
    let mut result: f32 = lanes.iter().sum();

    let tail = chunks * SIMD_LANES;
    result += weighted_sq_distance_scalar(&feature[tail..], &mean[tail..], &precision[tail..]);
    result
}

/// Scalar fallback for [`weighted_sq_distance`].
fn weighted_sq_distance_scalar(feature: &[f32], mean: &[f32], precision: &[f32]) -> f32 {
    feature
        .iter()
        .zip(mean.iter())
        .zip(precision.iter())
        .map(|((&x, &m), &p)| {
            let diff = x - m;
            diff * diff * p
        })
        .sum()
}
