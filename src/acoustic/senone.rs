//! The senone abstraction shared by Gaussian mixtures and composite senones.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::mixture_component::MixtureComponent;
use crate::error::Result;
use crate::types::SenoneId;

/// A tied acoustic state that can score a feature vector.
pub trait Senone: Send + Sync + fmt::Debug {
    /// Model-unique identity of the senone.
    fn id(&self) -> SenoneId;

    /// Log-likelihood of `feature` in the model's log base.
    fn score(&self, feature: &[f32]) -> f32;

    /// Per-component scores, for inspection.
    fn component_scores(&self, feature: &[f32]) -> Result<Vec<f32>>;

    /// The mixture components, if this senone has its own.
    fn mixture_components(&self) -> Option<&[Arc<MixtureComponent>]>;

    /// The log mixture weights, if this senone has its own.
    fn log_mixture_weights(&self) -> Option<Vec<f32>>;

    /// Whether the senone aggregates several senones of unknown context.
    fn is_composite(&self) -> bool {
        false
    }

    /// Score a feature frame of either precision.
    fn score_data(&self, data: &Data) -> f32 {
        self.score(&data.float_values())
    }
}

/// A feature frame handed over by the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// Single precision features, scored as-is.
    Float(Vec<f32>),
    /// Double precision features, converted before scoring.
    Double(Vec<f64>),
}

impl Data {
    /// The feature values as `f32`.
    ///
    /// Double precision data is narrowed explicitly, with a warning, since the
    /// scorer only operates on single precision values.
    pub fn float_values(&self) -> Cow<'_, [f32]> {
        match self {
            Data::Float(values) => Cow::Borrowed(values.as_slice()),
            Data::Double(values) => {
                warn!("Converting {} double precision features to f32 for scoring", values.len());
                Cow::Owned(values.iter().map(|&v| v as f32).collect())
            }
        }
    }

    /// Number of feature dimensions.
    pub fn len(&self) -> usize {
        match self {
            Data::Float(values) => values.len(),
            Data::Double(values) => values.len(),
        }
    }

    /// Whether the frame is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-session memo of senone scores for the current frame.
///
/// Senones themselves are immutable and shared between decoding threads, so
/// the "already scored this frame" bookkeeping lives here instead.
///
/// Entries are keyed by the senone's address rather than its [`SenoneId`]: a
/// composite senone can carry the same id as one of its constituents.
#[derive(Debug, Default)]
pub struct ScoreCache {
    frame: Option<u64>,
    scores: HashMap<usize, f32>,
}

impl ScoreCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Score `senone` on `feature`, reusing the result within the same frame.
    pub fn score(&mut self, senone: &dyn Senone, frame: u64, feature: &[f32]) -> f32 {
        if self.frame != Some(frame) {
            self.scores.clear();
            self.frame = Some(frame);
        }
        *self
            .scores
            .entry(senone_key(senone))
            .or_insert_with(|| senone.score(feature))
    }

    /// Number of scores memoised for the current frame.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether nothing has been scored in the current frame.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Address of the shared senone, stable for as long as the model holds it.
fn senone_key(senone: &dyn Senone) -> usize {
    senone as *const dyn Senone as *const () as usize
}
