//! Left-to-right senone HMMs.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::logmath::LogMath;
use super::senone::Senone;
use super::unit::Unit;
use crate::error::{ModelError, Result};
use crate::types::HmmId;

/// Position of a unit within a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HmmPosition {
    Begin,
    End,
    Single,
    Internal,
    Undefined,
}

impl HmmPosition {
    /// Short name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            HmmPosition::Begin => "begin",
            HmmPosition::End => "end",
            HmmPosition::Single => "single",
            HmmPosition::Internal => "internal",
            HmmPosition::Undefined => "undefined",
        }
    }

    /// Whether a unit at this position starts a word.
    pub fn is_word_beginning(self) -> bool {
        matches!(self, HmmPosition::Begin | HmmPosition::Single)
    }

    /// Whether a unit at this position ends a word.
    pub fn is_word_end(self) -> bool {
        matches!(self, HmmPosition::End | HmmPosition::Single)
    }
}

impl fmt::Display for HmmPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Square matrix of log transition probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    size: usize,
    data: Box<[f32]>,
}

impl TransitionMatrix {
    /// Build from rows of log probabilities.
    pub fn from_log(rows: Vec<Vec<f32>>) -> Result<Self> {
        let size = rows.len();
        if size < 2 {
            return Err(ModelError::InvalidTransitionMatrix(format!("{} states, need at least 2", size)).into());
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != size) {
            return Err(ModelError::InvalidTransitionMatrix(format!(
                "row {} has {} entries, expected {}",
                i,
                row.len(),
                size
            ))
            .into());
        }
        Ok(Self {
            size,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Build from rows of linear probabilities.
    pub fn from_linear(rows: Vec<Vec<f32>>, log_math: &LogMath) -> Result<Self> {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(|p| log_math.linear_to_log(p as f64)).collect())
            .collect();
        Self::from_log(rows)
    }

    /// Number of states, including the final non-emitting one.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Log probability of `from → to`; log-zero outside the matrix.
    pub fn get(&self, from: usize, to: usize) -> f32 {
        if from >= self.size || to >= self.size {
            return LogMath::LOG_ZERO;
        }
        self.data[from * self.size + to]
    }
}

/// An ordered run of senones, one per emitting state.
#[derive(Debug, Clone)]
pub struct SenoneSequence {
    senones: Box<[Arc<dyn Senone>]>,
}

impl SenoneSequence {
    pub fn new(senones: Vec<Arc<dyn Senone>>) -> Self {
        Self {
            senones: senones.into_boxed_slice(),
        }
    }

    pub fn senones(&self) -> &[Arc<dyn Senone>] {
        &self.senones
    }

    pub fn len(&self) -> usize {
        self.senones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senones.is_empty()
    }
}

impl PartialEq for SenoneSequence {
    fn eq(&self, other: &Self) -> bool {
        self.senones.len() == other.senones.len()
            && self.senones.iter().zip(other.senones.iter()).all(|(a, b)| a.id() == b.id())
    }
}

impl Eq for SenoneSequence {}

impl std::hash::Hash for SenoneSequence {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for senone in self.senones.iter() {
            senone.id().hash(state);
        }
    }
}

/// A transition out of an HMM state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HmmStateArc {
    /// Index of the target state.
    pub target: usize,
    /// Log transition probability.
    pub log_probability: f32,
}

/// The HMM of one unit in context.
#[derive(Debug)]
pub struct SenoneHmm {
    id: HmmId,
    unit: Arc<Unit>,
    base_unit: Arc<Unit>,
    senone_sequence: Arc<SenoneSequence>,
    transitions: Arc<TransitionMatrix>,
    position: HmmPosition,
    successors: Box<[OnceCell<Box<[HmmStateArc]>>]>,
}

impl SenoneHmm {
    /// Create an HMM; the transition matrix must have one more state than the sequence.
    pub fn new(
        id: HmmId,
        unit: Arc<Unit>,
        base_unit: Arc<Unit>,
        senone_sequence: Arc<SenoneSequence>,
        transitions: Arc<TransitionMatrix>,
        position: HmmPosition,
    ) -> Result<Self> {
        if senone_sequence.is_empty() {
            return Err(ModelError::EmptySenone(format!("HMM for {} has no senones", unit)).into());
        }
        if transitions.size() != senone_sequence.len() + 1 {
            return Err(ModelError::InvalidTransitionMatrix(format!(
                "HMM for {} has {} senones but a {}-state matrix",
                unit,
                senone_sequence.len(),
                transitions.size()
            ))
            .into());
        }
        let successors = (0..transitions.size()).map(|_| OnceCell::new()).collect();
        Ok(Self {
            id,
            unit,
            base_unit,
            senone_sequence,
            transitions,
            position,
            successors,
        })
    }

    pub fn id(&self) -> HmmId {
        self.id
    }

    /// The (possibly context-dependent) unit modelled.
    pub fn unit(&self) -> &Arc<Unit> {
        &self.unit
    }

    /// The context-independent unit.
    pub fn base_unit(&self) -> &Arc<Unit> {
        &self.base_unit
    }

    pub fn senone_sequence(&self) -> &Arc<SenoneSequence> {
        &self.senone_sequence
    }

    pub fn transition_matrix(&self) -> &Arc<TransitionMatrix> {
        &self.transitions
    }

    pub fn position(&self) -> HmmPosition {
        self.position
    }

    /// Number of emitting states.
    pub fn order(&self) -> usize {
        self.senone_sequence.len()
    }

    /// Number of states, including the exit state.
    pub fn num_states(&self) -> usize {
        self.transitions.size()
    }

    /// Log probability of `from → to`.
    pub fn transition_probability(&self, from: usize, to: usize) -> f32 {
        self.transitions.get(from, to)
    }

    /// Whether any senone of the HMM is composite.
    pub fn is_composite(&self) -> bool {
        self.senone_sequence.senones().iter().any(|s| s.is_composite())
    }

    /// State `index`, if it exists.
    pub fn state(self: &Arc<Self>, index: usize) -> Option<SenoneHmmState> {
        (index < self.num_states()).then(|| SenoneHmmState {
            hmm: self.clone(),
            index,
        })
    }

    /// The first state.
    pub fn initial_state(self: &Arc<Self>) -> SenoneHmmState {
        SenoneHmmState {
            hmm: self.clone(),
            index: 0,
        }
    }

    /// Outgoing arcs of state `index`, built on first use.
    fn state_successors(&self, index: usize) -> &[HmmStateArc] {
        match self.successors.get(index) {
            Some(cell) => cell.get_or_init(|| {
                (0..self.num_states())
                    .filter_map(|to| {
                        let p = self.transitions.get(index, to);
                        (p != LogMath::LOG_ZERO).then_some(HmmStateArc {
                            target: to,
                            log_probability: p,
                        })
                    })
                    .collect()
            }),
            None => &[],
        }
    }
}

impl PartialEq for SenoneHmm {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SenoneHmm {}

impl std::hash::Hash for SenoneHmm {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for SenoneHmm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HMM({} {} {})", self.id, self.unit, self.position)
    }
}

/// A state of a [`SenoneHmm`].
#[derive(Debug, Clone)]
pub struct SenoneHmmState {
    hmm: Arc<SenoneHmm>,
    index: usize,
}

impl SenoneHmmState {
    pub fn hmm(&self) -> &Arc<SenoneHmm> {
        &self.hmm
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// All states except the last one emit.
    pub fn is_emitting(&self) -> bool {
        self.index < self.hmm.order()
    }

    /// Whether this is the final non-emitting state.
    pub fn is_exit_state(&self) -> bool {
        !self.is_emitting()
    }

    /// The senone of an emitting state.
    pub fn senone(&self) -> Option<&Arc<dyn Senone>> {
        self.hmm.senone_sequence.senones().get(self.index)
    }

    /// Acoustic score of `feature`; log-one for the exit state.
    pub fn score(&self, feature: &[f32]) -> f32 {
        self.senone().map_or(LogMath::LOG_ONE, |s| s.score(feature))
    }

    /// Outgoing arcs, excluding log-zero transitions.
    pub fn successors(&self) -> &[HmmStateArc] {
        self.hmm.state_successors(self.index)
    }
}

impl PartialEq for SenoneHmmState {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.hmm.id == other.hmm.id
    }
}

impl Eq for SenoneHmmState {}
