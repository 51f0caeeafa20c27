//! Senones that stand in for a set of senones of unknown context.

use std::sync::Arc;

use super::mixture_component::MixtureComponent;
use super::senone::Senone;
use crate::constants::acoustic::MAX_SENONES;
use crate::error::{DecoderError, ModelError, Result};
use crate::types::SenoneId;

/// How the constituent scores are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeScorePolicy {
    /// Best constituent score.
    #[default]
    Max,
    /// Arithmetic mean of the constituent log scores.
    Average,
}

/// A senone that aggregates several senones plus a constant log weight.
#[derive(Debug, Clone)]
pub struct CompositeSenone {
    id: SenoneId,
    senones: Box<[Arc<dyn Senone>]>,
    weight: f32,
    policy: CompositeScorePolicy,
}

impl CompositeSenone {
    /// Create a max-scoring composite.
    pub fn new(senones: Vec<Arc<dyn Senone>>, weight: f32) -> Result<Self> {
        Self::with_policy(senones, weight, CompositeScorePolicy::Max)
    }

    /// Create a composite with an explicit score policy.
    pub fn with_policy(senones: Vec<Arc<dyn Senone>>, weight: f32, policy: CompositeScorePolicy) -> Result<Self> {
        if senones.is_empty() {
            return Err(ModelError::EmptySenone("composite senone with no constituents".into()).into());
        }
        let id = composite_id(&senones)?;
        Ok(Self {
            id,
            senones: senones.into_boxed_slice(),
            weight,
            policy,
        })
    }

    /// The constituent senones.
    pub fn senones(&self) -> &[Arc<dyn Senone>] {
        &self.senones
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn policy(&self) -> CompositeScorePolicy {
        self.policy
    }
}

/// Mixed-radix id: `Σ id_i · MAX_SENONES^i`.
fn composite_id(senones: &[Arc<dyn Senone>]) -> Result<SenoneId> {
    let overflow = || ModelError::CompositeIdOverflow { count: senones.len() };
    let mut id: u64 = 0;
    let mut factor: u64 = 1;
    for (i, senone) in senones.iter().enumerate() {
        if i > 0 {
            factor = factor.checked_mul(MAX_SENONES).ok_or_else(overflow)?;
        }
        let term = senone.id().value().checked_mul(factor).ok_or_else(overflow)?;
        id = id.checked_add(term).ok_or_else(overflow)?;
    }
    Ok(SenoneId::new(id))
}

impl Senone for CompositeSenone {
    fn id(&self) -> SenoneId {
        self.id
    }

    fn score(&self, feature: &[f32]) -> f32 {
        let scores = self.senones.iter().map(|s| s.score(feature));
        let combined = match self.policy {
            CompositeScorePolicy::Max => scores.fold(f32::NEG_INFINITY, f32::max),
            CompositeScorePolicy::Average => scores.sum::<f32>() / self.senones.len() as f32,
        };
        combined + self.weight
    }

    fn component_scores(&self, _feature: &[f32]) -> Result<Vec<f32>> {
        Err(DecoderError::Unsupported("component scores of a composite senone"))
    }

    fn mixture_components(&self) -> Option<&[Arc<MixtureComponent>]> {
        None
    }

    fn log_mixture_weights(&self) -> Option<Vec<f32>> {
        None
    }

    fn is_composite(&self) -> bool {
        true
    }
}
