//! Gaussian mixture senones and their shared weight table.

use std::sync::Arc;

use super::logmath::LogMath;
use super::mixture_component::MixtureComponent;
use super::senone::Senone;
use crate::error::{ModelError, Result};
use crate::types::SenoneId;

/// Log mixture weights for every senone of a model.
///
/// Stored densely as `[gaussian][state * streams + stream]`.
#[derive(Debug, Clone)]
pub struct GaussianWeights {
    name: String,
    num_states: usize,
    num_streams: usize,
    num_gaussians_per_state: usize,
    weights: Box<[f32]>,
}

impl GaussianWeights {
    /// Create a table with every weight at log-zero.
    pub fn new(name: impl Into<String>, num_states: usize, num_streams: usize, num_gaussians_per_state: usize) -> Self {
        Self {
            name: name.into(),
            num_states,
            num_streams,
            num_gaussians_per_state,
            weights: vec![LogMath::LOG_ZERO; num_states * num_streams * num_gaussians_per_state]
                .into_boxed_slice(),
        }
    }

    fn index(&self, state: usize, stream: usize, gaussian: usize) -> Option<usize> {
        if state >= self.num_states || stream >= self.num_streams || gaussian >= self.num_gaussians_per_state {
            return None;
        }
        let column = state * self.num_streams + stream;
        Some(gaussian * self.num_states * self.num_streams + column)
    }

    /// Store a log weight.
    pub fn put(&mut self, state: usize, stream: usize, gaussian: usize, log_weight: f32) -> Result<()> {
        let idx = self.index(state, stream, gaussian).ok_or_else(|| ModelError::UnknownPoolEntry {
            pool: self.name.clone(),
            id: state,
        })?;
        self.weights[idx] = log_weight;
        Ok(())
    }

    /// Log weight of one Gaussian, or log-zero outside the table.
    pub fn get(&self, state: usize, stream: usize, gaussian: usize) -> f32 {
        self.index(state, stream, gaussian)
            .map(|idx| self.weights[idx])
            .unwrap_or(LogMath::LOG_ZERO)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_streams(&self) -> usize {
        self.num_streams
    }

    pub fn num_gaussians_per_state(&self) -> usize {
        self.num_gaussians_per_state
    }
}

/// A senone modelled as a weighted sum of Gaussians.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    id: SenoneId,
    weights: Arc<GaussianWeights>,
    state: usize,
    components: Box<[Arc<MixtureComponent>]>,
    log_math: LogMath,
}

impl GaussianMixture {
    /// Create a mixture reading its weights from row `state` of `weights`.
    pub fn new(
        id: SenoneId,
        weights: Arc<GaussianWeights>,
        state: usize,
        components: Vec<Arc<MixtureComponent>>,
        log_math: LogMath,
    ) -> Result<Self> {
        if components.is_empty() {
            return Err(ModelError::EmptySenone(id.to_string()).into());
        }
        if state >= weights.num_states() {
            return Err(ModelError::UnknownPoolEntry {
                pool: weights.name().to_string(),
                id: state,
            }
            .into());
        }
        if components.len() > weights.num_gaussians_per_state() {
            return Err(ModelError::DimensionMismatch {
                what: "mixture weights",
                expected: components.len(),
                actual: weights.num_gaussians_per_state(),
            }
            .into());
        }
        Ok(Self {
            id,
            weights,
            state,
            components: components.into_boxed_slice(),
            log_math,
        })
    }

    fn log_weight(&self, gaussian: usize) -> f32 {
        self.weights.get(self.state, 0, gaussian)
    }
}

impl Senone for GaussianMixture {
    fn id(&self) -> SenoneId {
        self.id
    }

    fn score(&self, feature: &[f32]) -> f32 {
        self.components
            .iter()
            .enumerate()
            .fold(LogMath::LOG_ZERO, |total, (i, component)| {
                self.log_math
                    .add_as_linear(total, component.score(feature) + self.log_weight(i))
            })
    }

    fn component_scores(&self, feature: &[f32]) -> Result<Vec<f32>> {
        Ok(self
            .components
            .iter()
            .enumerate()
            .map(|(i, component)| component.score(feature) + self.log_weight(i))
            .collect())
    }

    fn mixture_components(&self) -> Option<&[Arc<MixtureComponent>]> {
        Some(&self.components)
    }

    fn log_mixture_weights(&self) -> Option<Vec<f32>> {
        Some((0..self.components.len()).map(|i| self.log_weight(i)).collect())
    }
}

impl PartialEq for GaussianMixture {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GaussianMixture {}

impl std::hash::Hash for GaussianMixture {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
