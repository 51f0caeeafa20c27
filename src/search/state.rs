//! Search states over the lexicon tree.
//!
//! A state is a position in the tree together with the word history that led
//! there and the smear bookkeeping needed to pay back the look-ahead bound once
//! the real language probability is known.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::acoustic::{LogMath, ScoreCache, SenoneHmmState};
use crate::constants::state_order;
use crate::lextree::{HmmNodeRef, NodeId};
use crate::linguist::WordSequence;

/// Where in the tree a state sits.
#[derive(Debug, Clone)]
pub enum StateKind {
    /// A word leaf, entered from `last_unit`.
    Word { node: NodeId, last_unit: HmmNodeRef },
    /// A word-final unit whose right context is not yet known.
    EndUnit { node: NodeId },
    /// A unit before its HMM is entered.
    Unit {
        node: HmmNodeRef,
        /// End node the unit was expanded from, if any.
        parent: Option<NodeId>,
    },
    /// A state inside the HMM of a unit.
    Hmm {
        node: HmmNodeRef,
        state: SenoneHmmState,
        parent: Option<NodeId>,
    },
}

/// A search state.
///
/// Two states are equal when they sit at the same place in the tree with the
/// same history and smear values.
#[derive(Debug, Clone)]
pub struct LexTreeState {
    kind: StateKind,
    history: WordSequence,
    smear_term: f32,
    smear_prob: f32,
    final_word: bool,
}

impl LexTreeState {
    pub(crate) fn word(
        node: NodeId,
        last_unit: HmmNodeRef,
        history: WordSequence,
        smear_term: f32,
        smear_prob: f32,
        final_word: bool,
    ) -> Self {
        Self {
            kind: StateKind::Word { node, last_unit },
            history,
            smear_term,
            smear_prob,
            final_word,
        }
    }

    pub(crate) fn end_unit(node: NodeId, history: WordSequence, smear_term: f32, smear_prob: f32) -> Self {
        Self {
            kind: StateKind::EndUnit { node },
            history,
            smear_term,
            smear_prob,
            final_word: false,
        }
    }

    pub(crate) fn unit(
        node: HmmNodeRef,
        parent: Option<NodeId>,
        history: WordSequence,
        smear_term: f32,
        smear_prob: f32,
    ) -> Self {
        Self {
            kind: StateKind::Unit { node, parent },
            history,
            smear_term,
            smear_prob,
            final_word: false,
        }
    }

    pub(crate) fn hmm(
        node: HmmNodeRef,
        state: SenoneHmmState,
        parent: Option<NodeId>,
        history: WordSequence,
        smear_term: f32,
        smear_prob: f32,
    ) -> Self {
        Self {
            kind: StateKind::Hmm { node, state, parent },
            history,
            smear_term,
            smear_prob,
            final_word: false,
        }
    }

    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    /// Words recognised so far, bounded by the language model depth.
    pub fn history(&self) -> &WordSequence {
        &self.history
    }

    /// Smear bound carried over from the last word.
    pub fn smear_term(&self) -> f32 {
        self.smear_term
    }

    /// Smeared language probability already applied on the way here.
    pub fn smear_prob(&self) -> f32 {
        self.smear_prob
    }

    /// Tie-break priority among states that collide in the active list.
    pub fn order(&self) -> usize {
        match &self.kind {
            StateKind::Word { .. } if self.final_word => state_order::END_WORD,
            StateKind::Word { .. } => state_order::WORD,
            StateKind::EndUnit { .. } => state_order::END_UNIT,
            StateKind::Unit { .. } => state_order::UNIT,
            StateKind::Hmm { state, .. } if state.is_emitting() => state_order::EMITTING_HMM,
            StateKind::Hmm { .. } => state_order::NON_EMITTING_HMM,
        }
    }

    pub fn is_emitting(&self) -> bool {
        matches!(&self.kind, StateKind::Hmm { state, .. } if state.is_emitting())
    }

    /// Whether this is the sentence-end word.
    pub fn is_final(&self) -> bool {
        self.final_word
    }

    pub fn is_word(&self) -> bool {
        matches!(self.kind, StateKind::Word { .. })
    }

    /// The tree node of word and end-unit states.
    pub fn tree_node(&self) -> Option<NodeId> {
        match &self.kind {
            StateKind::Word { node, .. } | StateKind::EndUnit { node } => Some(*node),
            StateKind::Unit { node, .. } | StateKind::Hmm { node, .. } => node.tree_node(),
        }
    }

    /// The HMM node of unit and HMM states.
    pub fn hmm_node(&self) -> Option<&HmmNodeRef> {
        match &self.kind {
            StateKind::Unit { node, .. } | StateKind::Hmm { node, .. } => Some(node),
            _ => None,
        }
    }

    pub fn hmm_state(&self) -> Option<&SenoneHmmState> {
        match &self.kind {
            StateKind::Hmm { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Acoustic score of `feature`; log-one for non-emitting states.
    pub fn score(&self, feature: &[f32]) -> f32 {
        match &self.kind {
            StateKind::Hmm { state, .. } if state.is_emitting() => state.score(feature),
            _ => LogMath::LOG_ONE,
        }
    }

    /// [`LexTreeState::score`] through a per-session cache.
    pub fn score_cached(&self, cache: &mut ScoreCache, frame: u64, feature: &[f32]) -> f32 {
        match &self.kind {
            StateKind::Hmm { state, .. } => match state.senone() {
                Some(senone) => cache.score(senone.as_ref(), frame, feature),
                None => LogMath::LOG_ONE,
            },
            _ => LogMath::LOG_ONE,
        }
    }

    pub(crate) fn is_composite(&self) -> bool {
        self.hmm_node().map_or(false, |node| node.hmm().is_composite())
    }
}

impl PartialEq for LexTreeState {
    fn eq(&self, other: &Self) -> bool {
        let same_place = match (&self.kind, &other.kind) {
            (StateKind::Word { node: a, last_unit: la }, StateKind::Word { node: b, last_unit: lb }) => {
                a == b && la == lb
            }
            (StateKind::EndUnit { node: a }, StateKind::EndUnit { node: b }) => a == b,
            (StateKind::Unit { node: a, parent: pa }, StateKind::Unit { node: b, parent: pb }) => {
                a == b && pa == pb
            }
            (
                StateKind::Hmm {
                    node: a,
                    state: sa,
                    parent: pa,
                },
                StateKind::Hmm {
                    node: b,
                    state: sb,
                    parent: pb,
                },
            ) => a == b && sa.index() == sb.index() && pa == pb,
            _ => false,
        };
        same_place
            && self.smear_term.to_bits() == other.smear_term.to_bits()
            && self.smear_prob.to_bits() == other.smear_prob.to_bits()
            && self.history == other.history
    }
}

impl Eq for LexTreeState {}

impl Hash for LexTreeState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.kind {
            StateKind::Word { node, last_unit } => {
                0u8.hash(state);
                node.hash(state);
                last_unit.hash(state);
            }
            StateKind::EndUnit { node } => {
                1u8.hash(state);
                node.hash(state);
            }
            StateKind::Unit { node, parent } => {
                2u8.hash(state);
                node.hash(state);
                parent.hash(state);
            }
            StateKind::Hmm {
                node,
                state: hmm_state,
                parent,
            } => {
                3u8.hash(state);
                node.hash(state);
                hmm_state.index().hash(state);
                parent.hash(state);
            }
        }
        self.smear_term.to_bits().hash(state);
        self.smear_prob.to_bits().hash(state);
        self.history.hash(state);
    }
}

impl fmt::Display for LexTreeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StateKind::Word { node, .. } => write!(f, "word {} {}", node, self.history),
            StateKind::EndUnit { node } => write!(f, "end-unit {} {}", node, self.history),
            StateKind::Unit { node, .. } => write!(f, "unit {} {}", node, self.history),
            StateKind::Hmm { node, state, .. } => {
                write!(f, "hmm {} s{} {}", node, state.index(), self.history)
            }
        }
    }
}

/// A transition to a successor state.
#[derive(Debug, Clone)]
pub struct LexTreeArc {
    pub state: LexTreeState,
    pub language_probability: f32,
    pub insertion_probability: f32,
}

impl LexTreeArc {
    pub fn new(state: LexTreeState, language_probability: f32, insertion_probability: f32) -> Self {
        Self {
            state,
            language_probability,
            insertion_probability,
        }
    }

    /// Language and insertion probability combined.
    pub fn probability(&self) -> f32 {
        self.language_probability + self.insertion_probability
    }
}
