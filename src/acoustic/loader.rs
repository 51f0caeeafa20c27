//! Assembling pooled model parameters into senones and HMMs.
//!
//! Parsing model files is left to implementations of [`ModelLoader`]; what they
//! hand over is plain float data. [`ModelBuilder`] is the in-memory loader: it
//! takes those floats and creates the shared structures the decoder scores with.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::gaussian_mixture::{GaussianMixture, GaussianWeights};
use super::hmm::{HmmPosition, SenoneSequence, TransitionMatrix};
use super::hmm_manager::{HmmKey, HmmManager, HmmPool};
use super::logmath::LogMath;
use super::mixture_component::{MixtureComponent, Transform};
use super::pool::{Pool, PoolFeature};
use super::senone::Senone;
use super::unit::UnitManager;
use crate::config::AcousticConfig;
use crate::error::{ModelError, Result};
use crate::types::{SenoneId, UnitId};

/// Everything a loaded acoustic model provides to the decoder.
#[derive(Debug, Clone)]
pub struct ModelPools {
    pub log_math: LogMath,
    pub units: Arc<UnitManager>,
    pub means: Pool<Arc<[f32]>>,
    pub variances: Pool<Arc<[f32]>>,
    pub mixture_weights: Arc<GaussianWeights>,
    pub transition_matrices: Pool<Arc<TransitionMatrix>>,
    pub senones: Pool<Arc<dyn Senone>>,
    pub hmm_manager: Arc<HmmManager>,
    pub left_context_size: usize,
    pub right_context_size: usize,
}

impl ModelPools {
    /// A context-resolving HMM pool over the loaded HMMs.
    pub fn hmm_pool(&self, config: &AcousticConfig) -> HmmPool {
        HmmPool::new(self.hmm_manager.clone(), self.units.clone(), config.exact_context_match)
    }
}

/// Source of acoustic model pools.
pub trait ModelLoader {
    fn load(&self) -> Result<ModelPools>;
}

#[derive(Debug, Clone)]
struct SenoneSpec {
    gaussians: Vec<usize>,
    weights: Vec<f32>,
}

#[derive(Debug, Clone)]
struct HmmSpec {
    base: String,
    left: Option<String>,
    right: Option<String>,
    position: HmmPosition,
    senones: Vec<usize>,
    transition_matrix: usize,
}

/// Builds [`ModelPools`] from in-memory parameters.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    config: AcousticConfig,
    log_math: LogMath,
    units: UnitManager,
    dimension: Option<usize>,
    means: Pool<Arc<[f32]>>,
    variances: Pool<Arc<[f32]>>,
    senones: Vec<SenoneSpec>,
    transitions: Pool<Vec<Vec<f32>>>,
    hmms: Vec<HmmSpec>,
    mean_transform: Option<Transform>,
    variance_transform: Option<Transform>,
}

impl ModelBuilder {
    pub fn new(config: AcousticConfig) -> Result<Self> {
        let log_math = LogMath::new(config.log_base)?;
        Ok(Self {
            config,
            log_math,
            units: UnitManager::new(),
            dimension: None,
            means: Pool::new("means"),
            variances: Pool::new("variances"),
            senones: Vec::new(),
            transitions: Pool::new("transition_matrices"),
            hmms: Vec::new(),
            mean_transform: None,
            variance_transform: None,
        })
    }

    /// Declare a context-independent unit.
    pub fn add_unit(&mut self, name: &str, filler: bool) -> UnitId {
        self.units.get_or_create(name, filler).base_id()
    }

    /// Add a Gaussian and return its pool id.
    pub fn add_gaussian(&mut self, mean: Vec<f32>, variance: Vec<f32>) -> Result<usize> {
        if mean.len() != variance.len() {
            return Err(ModelError::DimensionMismatch {
                what: "variance",
                expected: mean.len(),
                actual: variance.len(),
            }
            .into());
        }
        match self.dimension {
            Some(dim) if dim != mean.len() => {
                return Err(ModelError::DimensionMismatch {
                    what: "mean",
                    expected: dim,
                    actual: mean.len(),
                }
                .into())
            }
            _ => self.dimension = Some(mean.len()),
        }
        let id = self.means.push(mean.into());
        self.variances.put(id, variance.into());
        Ok(id)
    }

    /// Add a senone mixing the given Gaussians with linear weights; returns its id.
    pub fn add_senone(&mut self, gaussians: &[usize], weights: &[f32]) -> Result<usize> {
        if gaussians.len() != weights.len() {
            return Err(ModelError::DimensionMismatch {
                what: "mixture weights",
                expected: gaussians.len(),
                actual: weights.len(),
            }
            .into());
        }
        if gaussians.is_empty() {
            return Err(ModelError::EmptySenone(format!("senone {}", self.senones.len())).into());
        }
        for &g in gaussians {
            self.means.try_get(g)?;
        }
        self.senones.push(SenoneSpec {
            gaussians: gaussians.to_vec(),
            weights: weights.to_vec(),
        });
        Ok(self.senones.len() - 1)
    }

    /// Add a transition matrix of linear probabilities; returns its pool id.
    pub fn add_transition_matrix(&mut self, rows: Vec<Vec<f32>>) -> Result<usize> {
        // validates the shape
        TransitionMatrix::from_linear(rows.clone(), &self.log_math)?;
        Ok(self.transitions.push(rows))
    }

    /// Add an HMM; units are referred to by name and must have been declared.
    pub fn add_hmm(
        &mut self,
        base: &str,
        left: Option<&str>,
        right: Option<&str>,
        position: HmmPosition,
        senones: &[usize],
        transition_matrix: usize,
    ) -> Result<()> {
        for name in std::iter::once(base).chain(left).chain(right) {
            if self.units.get(name).is_none() {
                return Err(ModelError::MissingResource(format!("unit '{}'", name)).into());
            }
        }
        if let Some(&bad) = senones.iter().find(|&&s| s >= self.senones.len()) {
            return Err(ModelError::UnknownPoolEntry {
                pool: "senones".into(),
                id: bad,
            }
            .into());
        }
        self.transitions.try_get(transition_matrix)?;
        self.hmms.push(HmmSpec {
            base: base.to_string(),
            left: left.map(str::to_string),
            right: right.map(str::to_string),
            position,
            senones: senones.to_vec(),
            transition_matrix,
        });
        Ok(())
    }

    /// Apply `transform` to every mean.
    pub fn with_mean_transform(mut self, transform: Transform) -> Self {
        self.mean_transform = Some(transform);
        self
    }

    /// Apply `transform` to every variance.
    pub fn with_variance_transform(mut self, transform: Transform) -> Self {
        self.variance_transform = Some(transform);
        self
    }

    pub fn log_math(&self) -> LogMath {
        self.log_math
    }

    /// Create the senone pool and the HMMs.
    pub fn build(self) -> Result<ModelPools> {
        let Self {
            config,
            log_math,
            mut units,
            means,
            variances,
            senones: senone_specs,
            transitions,
            hmms,
            mean_transform,
            variance_transform,
            ..
        } = self;

        // Components are shared by every senone that references the Gaussian.
        let mut components: Vec<Arc<MixtureComponent>> = Vec::with_capacity(means.len());
        for (id, mean) in means.iter() {
            let variance = variances.try_get(id)?;
            components.push(Arc::new(MixtureComponent::with_transforms(
                mean.clone(),
                variance.clone(),
                mean_transform.clone(),
                variance_transform.clone(),
                log_math,
                config.variance_floor,
                config.dist_floor,
            )?));
        }

        let gaussians_per_state = senone_specs.iter().map(|s| s.gaussians.len()).max().unwrap_or(0);
        let mut weights = GaussianWeights::new("mixture_weights", senone_specs.len(), 1, gaussians_per_state);
        for (state, spec) in senone_specs.iter().enumerate() {
            for (g, &w) in spec.weights.iter().enumerate() {
                let floored = w.max(config.mixture_weight_floor);
                weights.put(state, 0, g, log_math.linear_to_log(floored as f64))?;
            }
        }
        let weights = Arc::new(weights);

        let mut senone_pool: Pool<Arc<dyn Senone>> = Pool::new("senones");
        senone_pool.set_feature(PoolFeature::NumSenones, senone_specs.len());
        senone_pool.set_feature(PoolFeature::NumGaussiansPerState, gaussians_per_state);
        senone_pool.set_feature(PoolFeature::NumStreams, 1);
        for (state, spec) in senone_specs.iter().enumerate() {
            let mixture = GaussianMixture::new(
                SenoneId::new(state as u64),
                weights.clone(),
                state,
                spec.gaussians.iter().map(|&g| components[g].clone()).collect(),
                log_math,
            )?;
            senone_pool.put(state, Arc::new(mixture));
        }

        let mut matrix_pool: Pool<Arc<TransitionMatrix>> = Pool::new("transition_matrices");
        for (id, rows) in transitions.iter() {
            matrix_pool.put(id, Arc::new(TransitionMatrix::from_linear(rows.clone(), &log_math)?));
        }

        let mut sequences: HashMap<Vec<usize>, Arc<SenoneSequence>> = HashMap::new();
        let mut manager = HmmManager::new();
        let (mut left_context_size, mut right_context_size) = (0, 0);
        for spec in &hmms {
            let lookup = |name: &str| {
                units
                    .get(name)
                    .ok_or_else(|| ModelError::MissingResource(format!("unit '{}'", name)))
            };
            let base = lookup(&spec.base)?;
            let left = spec.left.as_deref().map(lookup).transpose()?;
            let right = spec.right.as_deref().map(lookup).transpose()?;
            left_context_size = left_context_size.max(left.is_some() as usize);
            right_context_size = right_context_size.max(right.is_some() as usize);

            let sequence = match sequences.get(&spec.senones) {
                Some(seq) => seq.clone(),
                None => {
                    let senones = spec
                        .senones
                        .iter()
                        .map(|&s| senone_pool.try_get(s).cloned())
                        .collect::<Result<Vec<_>>>()?;
                    let seq = Arc::new(SenoneSequence::new(senones));
                    sequences.insert(spec.senones.clone(), seq.clone());
                    seq
                }
            };

            let left_id = left.as_ref().map(|u| u.base_id());
            let right_id = right.as_ref().map(|u| u.base_id());
            let unit = units.get_context_unit(&base, left_id, right_id);
            manager.add(
                HmmKey::new(base.base_id(), left_id, right_id, spec.position),
                unit,
                base,
                sequence,
                matrix_pool.try_get(spec.transition_matrix)?.clone(),
            )?;
        }

        info!(
            "Acoustic model assembled: {} units, {} gaussians, {} senones, {} HMMs, {} distinct senone sequences",
            units.len(),
            components.len(),
            senone_pool.len(),
            manager.len(),
            sequences.len()
        );
        debug!("Context sizes: left={}, right={}", left_context_size, right_context_size);

        Ok(ModelPools {
            log_math,
            units: Arc::new(units),
            means,
            variances,
            mixture_weights: weights,
            transition_matrices: matrix_pool,
            senones: senone_pool,
            hmm_manager: Arc::new(manager),
            left_context_size,
            right_context_size,
        })
    }
}

impl ModelLoader for ModelBuilder {
    fn load(&self) -> Result<ModelPools> {
        self.clone().build()
    }
}
