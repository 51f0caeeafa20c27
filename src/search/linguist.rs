//! Successor generation over the lexicon tree.

use std::sync::Arc;

use tracing::{debug, info};

use super::cache::ArcCache;
use super::state::{LexTreeArc, LexTreeState, StateKind};
use crate::acoustic::{LogMath, SenoneHmm, SenoneHmmState};
use crate::config::LinguistConfig;
use crate::error::{DecoderError, Result};
use crate::lextree::{HmmNodeRef, HmmTree, NodeId, NodeKind};
use crate::linguist::{LanguageModel, WordSequence};
use crate::types::UnitId;

/// Insertion probabilities in the log domain.
#[derive(Debug, Clone, Copy)]
struct InsertionProbabilities {
    word: f32,
    silence: f32,
    filler: f32,
    unit: f32,
}

/// Presents the lexicon tree to a search as a graph of [`LexTreeState`]s.
///
/// The linguist only reads the tree and the language model, so one instance can
/// serve several decoding threads. The optional arc cache is the only shared
/// mutable part.
pub struct LexTreeLinguist {
    tree: Arc<HmmTree>,
    lm: Arc<dyn LanguageModel>,
    config: LinguistConfig,
    max_depth: usize,
    insertion: InsertionProbabilities,
    initial_state: LexTreeState,
    arc_cache: Option<ArcCache>,
}

impl LexTreeLinguist {
    /// Create a linguist over a compiled tree.
    ///
    /// # Arguments
    /// * `tree` - The compiled lexicon tree
    /// * `lm` - The language model the tree was compiled against
    /// * `config` - Weights, insertion probabilities and cache size
    /// * `log_math` - Log base shared with the acoustic model
    pub fn new(
        tree: Arc<HmmTree>,
        lm: Arc<dyn LanguageModel>,
        config: LinguistConfig,
        log_math: LogMath,
    ) -> Result<Self> {
        let max_depth = lm.max_depth();
        let insertion = InsertionProbabilities {
            word: log_math.linear_to_log(config.word_insertion_probability as f64),
            silence: log_math.linear_to_log(config.silence_insertion_probability as f64),
            filler: log_math.linear_to_log(config.filler_insertion_probability as f64),
            unit: log_math.linear_to_log(config.unit_insertion_probability as f64),
        };

        let start = match tree.node(tree.initial_node()).kind() {
            NodeKind::Word { word, .. } => word.clone(),
            _ => return Err(DecoderError::Internal("initial node is not a word".to_string())),
        };
        let history = WordSequence::new(vec![start]).trim(max_depth.saturating_sub(1));
        let initial_state = LexTreeState::word(
            tree.initial_node(),
            tree.initial_parent().clone(),
            history,
            LogMath::LOG_ONE,
            LogMath::LOG_ONE,
            false,
        );

        let arc_cache = config.cache_enabled().then(|| ArcCache::new(config.arc_cache_size));
        info!(
            "Linguist ready: max depth {}, smear {}, unit states {}, arc cache {}",
            max_depth, config.want_unigram_smear, config.generate_unit_states, config.arc_cache_size
        );

        Ok(Self {
            tree,
            lm,
            config,
            max_depth,
            insertion,
            initial_state,
            arc_cache,
        })
    }

    /// The sentence-start word state every utterance begins in.
    pub fn initial_state(&self) -> LexTreeState {
        self.initial_state.clone()
    }

    pub fn tree(&self) -> &Arc<HmmTree> {
        &self.tree
    }

    pub fn language_model(&self) -> &Arc<dyn LanguageModel> {
        &self.lm
    }

    pub fn config(&self) -> &LinguistConfig {
        &self.config
    }

    pub fn arc_cache(&self) -> Option<&ArcCache> {
        self.arc_cache.as_ref()
    }

    /// Outgoing arcs of `state`.
    pub fn successors(&self, state: &LexTreeState) -> Result<Arc<[LexTreeArc]>> {
        let cache = match &self.arc_cache {
            Some(cache) if !state.is_composite() => cache,
            _ => return Ok(self.compute_successors(state)?.into()),
        };
        if let Some(arcs) = cache.get(state) {
            return Ok(arcs);
        }
        let arcs: Arc<[LexTreeArc]> = self.compute_successors(state)?.into();
        cache.put(state.clone(), arcs.clone());
        Ok(arcs)
    }

    fn compute_successors(&self, state: &LexTreeState) -> Result<Vec<LexTreeArc>> {
        match state.kind() {
            StateKind::Word { node, last_unit } => self.word_successors(state, *node, last_unit),
            StateKind::EndUnit { node } => self.end_unit_successors(state, *node),
            StateKind::Unit { node, parent } => {
                let next = LexTreeState::hmm(
                    node.clone(),
                    node.hmm().initial_state(),
                    *parent,
                    state.history().clone(),
                    state.smear_term(),
                    state.smear_prob(),
                );
                Ok(vec![LexTreeArc::new(next, LogMath::LOG_ONE, LogMath::LOG_ONE)])
            }
            StateKind::Hmm {
                node,
                state: hmm_state,
                parent,
            } => self.hmm_successors(state, node, hmm_state, *parent),
        }
    }

    /// Entry points of every right context of the word, plus the sentence end.
    fn word_successors(&self, state: &LexTreeState, node: NodeId, last_unit: &HmmNodeRef) -> Result<Vec<LexTreeArc>> {
        if state.is_final() {
            return Ok(Vec::new());
        }
        let last = match self.tree.node(node).kind() {
            NodeKind::Word { pronunciation, .. } => pronunciation
                .units()
                .last()
                .map(|u| u.base_id())
                .ok_or_else(|| DecoderError::Internal(format!("{} has an empty pronunciation", node)))?,
            _ => return Err(DecoderError::Internal(format!("{} is not a word node", node))),
        };

        let mut arcs = Vec::new();
        for &rc in self.tree.rc_set(last_unit) {
            for &entry in self.tree.get_entry_point(last, rc) {
                arcs.push(self.unit_arc(entry, state, true)?);
            }
        }
        arcs.push(self.word_arc(self.tree.sentence_end_word_node(), last_unit, state)?);
        Ok(arcs)
    }

    fn end_unit_successors(&self, state: &LexTreeState, node: NodeId) -> Result<Vec<LexTreeArc>> {
        let nodes = self.tree.get_hmm_nodes(node)?;
        Ok(nodes
            .iter()
            .map(|hmm_node| {
                let next = self.enter(hmm_node.clone(), Some(node), state, state.smear_prob());
                LexTreeArc::new(next, LogMath::LOG_ONE, LogMath::LOG_ONE)
            })
            .collect())
    }

    fn hmm_successors(
        &self,
        state: &LexTreeState,
        node: &HmmNodeRef,
        hmm_state: &SenoneHmmState,
        parent: Option<NodeId>,
    ) -> Result<Vec<LexTreeArc>> {
        if hmm_state.is_exit_state() {
            let below = match parent {
                Some(end) => end,
                None => node
                    .tree_node()
                    .ok_or_else(|| DecoderError::Internal(format!("{} has neither tree node nor parent", node)))?,
            };
            return self.node_successors(state, below, node);
        }

        let hmm = hmm_state.hmm();
        hmm_state
            .successors()
            .iter()
            .map(|arc| {
                let target = hmm.state(arc.target).ok_or_else(|| {
                    DecoderError::Internal(format!("{} has no state {}", hmm, arc.target))
                })?;
                let next = LexTreeState::hmm(
                    node.clone(),
                    target,
                    parent,
                    state.history().clone(),
                    state.smear_term(),
                    state.smear_prob(),
                );
                Ok(LexTreeArc::new(next, LogMath::LOG_ONE, arc.log_probability))
            })
            .collect()
    }

    /// Arcs to the tree children of `parent`, reached by leaving `last_unit`.
    fn node_successors(&self, state: &LexTreeState, parent: NodeId, last_unit: &HmmNodeRef) -> Result<Vec<LexTreeArc>> {
        self.tree
            .successors(parent)
            .iter()
            .map(|&child| match self.tree.node(child).kind() {
                NodeKind::Word { .. } => self.word_arc(child, last_unit, state),
                NodeKind::End { .. } => self.end_unit_arc(child, state),
                NodeKind::Hmm { .. } => self.unit_arc(child, state, false),
                NodeKind::Branch => Err(DecoderError::Internal(format!("unexpected branch {} below {}", child, parent))),
            })
            .collect()
    }

    fn unit_arc(&self, node: NodeId, previous: &LexTreeState, word_beginning: bool) -> Result<LexTreeArc> {
        let hmm_node = self
            .tree
            .hmm_node(node)
            .ok_or_else(|| DecoderError::Internal(format!("{} is not an HMM node", node)))?;
        let smear_prob = self.unigram_smear(self.tree.unigram_probability(&hmm_node)) + previous.smear_term();
        let language_probability = smear_prob - previous.smear_prob();
        let insertion_probability = self.hmm_insertion_probability(hmm_node.hmm(), word_beginning);
        let next = self.enter(hmm_node, None, previous, smear_prob);
        Ok(LexTreeArc::new(next, language_probability, insertion_probability))
    }

    fn end_unit_arc(&self, node: NodeId, previous: &LexTreeState) -> Result<LexTreeArc> {
        let end = self.tree.node(node);
        let base = match end.kind() {
            NodeKind::End { base, .. } => *base,
            _ => return Err(DecoderError::Internal(format!("{} is not an end node", node))),
        };
        let smear_prob = self.unigram_smear(end.unigram_probability()) + previous.smear_term();
        let language_probability = smear_prob - previous.smear_prob();
        let insertion_probability = self.end_insertion_probability(base);
        let next = LexTreeState::end_unit(node, previous.history().clone(), previous.smear_term(), smear_prob);
        Ok(LexTreeArc::new(next, language_probability, insertion_probability))
    }

    /// Arc into a word state. The smear applied so far is paid back here.
    fn word_arc(&self, node: NodeId, last_unit: &HmmNodeRef, previous: &LexTreeState) -> Result<LexTreeArc> {
        let word = match self.tree.node(node).kind() {
            NodeKind::Word { word, .. } => word.clone(),
            _ => return Err(DecoderError::Internal(format!("{} is not a word node", node))),
        };

        if word.is_filler() && !word.is_sentence_end() {
            let next = LexTreeState::word(
                node,
                last_unit.clone(),
                previous.history().clone(),
                previous.smear_term(),
                LogMath::LOG_ONE,
                false,
            );
            return Ok(LexTreeArc::new(next, LogMath::LOG_ONE, LogMath::LOG_ONE));
        }

        let final_word = word.is_sentence_end();
        let sequence = previous.history().add_word(word, self.max_depth);
        let probability = LogMath::scale(self.lm.probability(&sequence), self.config.language_weight);
        let smear_term = if self.config.want_unigram_smear {
            self.lm.smear(&sequence)
        } else {
            LogMath::LOG_ONE
        };
        let language_probability = probability - previous.smear_prob();
        debug!("Word arc {} p={} lang={}", sequence, probability, language_probability);

        let next = LexTreeState::word(
            node,
            last_unit.clone(),
            sequence.trim(self.max_depth.saturating_sub(1)),
            smear_term,
            LogMath::LOG_ONE,
            final_word,
        );
        Ok(LexTreeArc::new(next, language_probability, LogMath::LOG_ONE))
    }

    /// A unit state, or the first HMM state when unit states are not generated.
    fn enter(&self, node: HmmNodeRef, parent: Option<NodeId>, previous: &LexTreeState, smear_prob: f32) -> LexTreeState {
        let history = previous.history().clone();
        if self.config.generate_unit_states {
            LexTreeState::unit(node, parent, history, previous.smear_term(), smear_prob)
        } else {
            let initial = node.hmm().initial_state();
            LexTreeState::hmm(node, initial, parent, history, previous.smear_term(), smear_prob)
        }
    }

    fn unigram_smear(&self, unigram_probability: f32) -> f32 {
        if self.config.want_unigram_smear {
            LogMath::scale(unigram_probability, self.config.unigram_smear_weight)
        } else {
            LogMath::LOG_ONE
        }
    }

    fn hmm_insertion_probability(&self, hmm: &SenoneHmm, word_beginning: bool) -> f32 {
        let unit = hmm.base_unit();
        if unit.is_silence() {
            self.insertion.silence
        } else if unit.is_filler() {
            self.insertion.filler
        } else if word_beginning || hmm.position().is_word_beginning() {
            self.insertion.unit + self.insertion.word
        } else {
            self.insertion.unit
        }
    }

    fn end_insertion_probability(&self, base: UnitId) -> f32 {
        match self.tree.units().by_id(base) {
            Some(unit) if unit.is_silence() => self.insertion.silence,
            Some(unit) if unit.is_filler() => self.insertion.filler,
            _ => self.insertion.unit,
        }
    }
}

impl std::fmt::Debug for LexTreeLinguist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexTreeLinguist")
            .field("nodes", &self.tree.node_count())
            .field("max_depth", &self.max_depth)
            .field("config", &self.config)
            .field("arc_cache", &self.arc_cache.as_ref().map(|c| c.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acoustic::HmmPosition;
    use crate::config::AcousticConfig;
    use crate::lextree::test_support::{AdjustedModel, ToyModel};
    use crate::types::HmmId;
    use std::collections::{BTreeSet, HashSet};

    fn linguist(toy: &ToyModel, config: LinguistConfig) -> LexTreeLinguist {
        let tree = Arc::new(toy.tree(&config));
        LexTreeLinguist::new(tree, Arc::new(toy.lm.clone()), config, toy.log_math()).unwrap()
    }

    fn spelling(linguist: &LexTreeLinguist, state: &LexTreeState) -> Option<String> {
        match state.kind() {
            StateKind::Word { node, .. } => match linguist.tree().node(*node).kind() {
                NodeKind::Word { word, .. } => Some(word.spelling().to_string()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Follow arcs from `from` until a word state for `target` is reached and
    /// return it with the language probability summed along the way.
    fn reach_word(linguist: &LexTreeLinguist, from: &LexTreeState, target: &str) -> Option<(LexTreeState, f32)> {
        let mut stack = vec![(from.clone(), 0.0f32)];
        let mut seen = HashSet::new();
        while let Some((state, language)) = stack.pop() {
            for arc in linguist.successors(&state).unwrap().iter() {
                let total = language + arc.language_probability;
                if arc.state.is_word() {
                    if spelling(linguist, &arc.state).as_deref() == Some(target) {
                        return Some((arc.state.clone(), total));
                    }
                    continue;
                }
                if seen.insert(arc.state.clone()) {
                    stack.push((arc.state.clone(), total));
                }
            }
        }
        None
    }

    /// Every word state for `target` reachable from `from` without passing
    /// through another word, each with its summed language probability.
    fn word_states(linguist: &LexTreeLinguist, from: &LexTreeState, target: &str) -> Vec<(LexTreeState, f32)> {
        let mut found = Vec::new();
        let mut stack = vec![(from.clone(), 0.0f32)];
        let mut seen = HashSet::new();
        while let Some((state, language)) = stack.pop() {
            for arc in linguist.successors(&state).unwrap().iter() {
                let total = language + arc.language_probability;
                if arc.state.is_word() {
                    if spelling(linguist, &arc.state).as_deref() == Some(target) {
                        found.push((arc.state.clone(), total));
                    }
                } else if seen.insert(arc.state.clone()) {
                    stack.push((arc.state.clone(), total));
                }
            }
        }
        found
    }

    fn smeared() -> LinguistConfig {
        LinguistConfig {
            language_weight: 2.0,
            want_unigram_smear: true,
            unigram_smear_weight: 1.0,
            ..LinguistConfig::default()
        }
    }

    #[test]
    fn test_initial_state() {
        let toy = ToyModel::new();
        let linguist = linguist(&toy, LinguistConfig::default());
        let initial = linguist.initial_state();
        assert_eq!(spelling(&linguist, &initial).unwrap(), "<s>");
        assert_eq!(initial.history().to_string(), "[<s>]");
        assert_eq!(initial.order(), 1);
        assert!(!initial.is_final());

        let arcs = linguist.successors(&initial).unwrap();
        let bases: HashSet<UnitId> = arcs
            .iter()
            .filter_map(|a| a.state.hmm_node().map(|n| n.hmm().base_unit().base_id()))
            .collect();
        assert_eq!(bases, ["K", "D", "SIL"].iter().map(|u| toy.unit(u)).collect::<HashSet<_>>());
        let last = arcs.last().unwrap();
        assert_eq!(spelling(&linguist, &last.state).unwrap(), "</s>");
        assert!(last.state.is_final());
        assert_eq!(last.state.order(), 2);
        assert!(linguist.successors(&last.state).unwrap().is_empty());
    }

    #[test]
    fn test_smear_telescopes_to_language_probability() {
        let toy = ToyModel::new();
        let config = smeared();
        let linguist = linguist(&toy, config.clone());
        let log_math = toy.log_math();
        let initial = linguist.initial_state();

        // the look-ahead bound is applied before the word is known
        let arcs = linguist.successors(&initial).unwrap();
        assert!(arcs.iter().any(|a| a.language_probability < 0.0));

        let (cat, total) = reach_word(&linguist, &initial, "cat").unwrap();
        let expected = log_math.log10_to_log(-0.4) * config.language_weight;
        assert!((total - expected).abs() < 0.5, "{} vs {}", total, expected);
        assert_eq!(cat.history().to_string(), "[cat]");
        assert_eq!(cat.smear_prob(), LogMath::LOG_ONE);

        let (_, total) = reach_word(&linguist, &initial, "dog").unwrap();
        let expected = log_math.log10_to_log(-1.0) * config.language_weight;
        assert!((total - expected).abs() < 0.5, "{} vs {}", total, expected);

        let (end, total) = reach_word(&linguist, &cat, "</s>").unwrap();
        let expected = log_math.log10_to_log(-1.0) * config.language_weight;
        assert!((total - expected).abs() < 0.5, "{} vs {}", total, expected);
        assert!(end.is_final());
    }

    #[test]
    fn test_cache_does_not_change_successors() {
        let toy = ToyModel::new();
        let tree = Arc::new(toy.tree(&smeared()));
        let lm: Arc<dyn LanguageModel> = Arc::new(toy.lm.clone());
        let plain = LexTreeLinguist::new(tree.clone(), lm.clone(), smeared(), toy.log_math()).unwrap();
        let cached = LexTreeLinguist::new(
            tree,
            lm,
            LinguistConfig {
                arc_cache_size: 10_000,
                ..smeared()
            },
            toy.log_math(),
        )
        .unwrap();

        let mut queue = vec![plain.initial_state()];
        let mut seen = HashSet::new();
        while let Some(state) = queue.pop() {
            if seen.len() > 300 || !seen.insert(state.clone()) {
                continue;
            }
            let a = plain.successors(&state).unwrap();
            let b = cached.successors(&state).unwrap();
            let again = cached.successors(&state).unwrap();
            assert!(Arc::ptr_eq(&b, &again));
            assert_eq!(a.len(), b.len());
            for (x, y) in a.iter().zip(b.iter()) {
                assert_eq!(x.state, y.state);
                assert_eq!(x.language_probability, y.language_probability);
                assert_eq!(x.insertion_probability, y.insertion_probability);
                queue.push(x.state.clone());
            }
        }
        assert!(!cached.arc_cache().unwrap().is_empty());
        assert!(plain.arc_cache().is_none());
    }

    #[test]
    fn test_cache_is_cleared_when_full() {
        let toy = ToyModel::new();
        let linguist = linguist(
            &toy,
            LinguistConfig {
                arc_cache_size: 2,
                ..LinguistConfig::default()
            },
        );
        let initial = linguist.initial_state();
        let arcs = linguist.successors(&initial).unwrap();
        for arc in arcs.iter() {
            linguist.successors(&arc.state).unwrap();
        }
        let cache = linguist.arc_cache().unwrap();
        assert!(cache.len() <= 2);
        assert_eq!(cache.capacity(), 2);
    }

    #[test]
    fn test_composite_states_bypass_cache() {
        let toy = ToyModel::new();
        let pool = toy.pools.hmm_pool(&AcousticConfig {
            exact_context_match: true,
            ..AcousticConfig::default()
        });
        let config = LinguistConfig {
            arc_cache_size: 100,
            ..LinguistConfig::default()
        };
        let tree = HmmTree::from_config(Arc::new(pool), &toy.dictionary, &toy.lm, &config).unwrap();
        let end = tree
            .nodes()
            .find(|(_, n)| matches!(n.kind(), NodeKind::End { .. }))
            .map(|(id, _)| id)
            .unwrap();
        let linguist = LexTreeLinguist::new(Arc::new(tree), Arc::new(toy.lm.clone()), config, toy.log_math()).unwrap();

        let end_state = LexTreeState::end_unit(end, WordSequence::empty(), LogMath::LOG_ONE, LogMath::LOG_ONE);
        let arcs = linguist.successors(&end_state).unwrap();
        assert_eq!(linguist.arc_cache().unwrap().len(), 1);
        for arc in arcs.iter() {
            assert!(arc.state.is_composite());
            let next = linguist.successors(&arc.state).unwrap();
            assert!(!next.is_empty());
        }
        assert_eq!(linguist.arc_cache().unwrap().len(), 1);
    }

    #[test]
    fn test_filler_words_keep_history() {
        let mut toy = ToyModel::new();
        toy.dictionary.add_filler("++um++", &["SIL"]).unwrap();
        let linguist = linguist(
            &toy,
            LinguistConfig {
                add_filler_words: true,
                ..smeared()
            },
        );
        let initial = linguist.initial_state();
        let (um, total) = reach_word(&linguist, &initial, "++um++").unwrap();
        assert_eq!(um.history(), initial.history());
        assert_eq!(total, LogMath::LOG_ONE);
        assert!(!um.is_final());
    }

    #[test]
    fn test_insertion_probabilities() {
        let toy = ToyModel::new();
        let config = LinguistConfig {
            word_insertion_probability: 0.5,
            unit_insertion_probability: 0.25,
            silence_insertion_probability: 0.1,
            ..LinguistConfig::default()
        };
        let linguist = linguist(&toy, config);
        let log_math = toy.log_math();
        let initial = linguist.initial_state();
        let arcs = linguist.successors(&initial).unwrap();

        let begin = log_math.linear_to_log(0.25) + log_math.linear_to_log(0.5);
        let silence = log_math.linear_to_log(0.1);
        for arc in arcs.iter() {
            match arc.state.hmm_node() {
                Some(node) if node.hmm().base_unit().is_silence() => {
                    assert_eq!(arc.insertion_probability, silence)
                }
                Some(_) => assert_eq!(arc.insertion_probability, begin),
                None => assert_eq!(arc.insertion_probability, LogMath::LOG_ONE),
            }
        }

        // inside a word only the unit insertion applies
        let k = arcs
            .iter()
            .find(|a| a.state.hmm_node().map_or(false, |n| n.hmm().base_unit().base_id() == toy.unit("K")))
            .unwrap();
        let mut state = k.state.clone();
        while !state.hmm_state().unwrap().is_exit_state() {
            let next = linguist.successors(&state).unwrap();
            state = next.iter().find(|a| a.state != state).unwrap().state.clone();
        }
        let into_ae = linguist.successors(&state).unwrap();
        assert_eq!(into_ae.len(), 1);
        assert_eq!(into_ae[0].insertion_probability, log_math.linear_to_log(0.25));
    }

    #[test]
    fn test_unit_states() {
        let toy = ToyModel::new();
        let linguist = linguist(
            &toy,
            LinguistConfig {
                generate_unit_states: true,
                ..LinguistConfig::default()
            },
        );
        let arcs = linguist.successors(&linguist.initial_state()).unwrap();
        let unit = arcs.iter().find(|a| !a.state.is_word()).unwrap();
        assert_eq!(unit.state.order(), 4);
        assert!(!unit.state.is_emitting());

        let next = linguist.successors(&unit.state).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].probability(), LogMath::LOG_ONE);
        assert_eq!(next[0].state.hmm_state().unwrap().index(), 0);
        assert!(next[0].state.is_emitting());
    }

    #[test]
    fn test_smear_term_carries_into_unit_arcs() {
        let toy = ToyModel::new();
        let config = smeared();
        let smear = -250.0;
        let tree = Arc::new(toy.tree(&config));
        let lm = Arc::new(AdjustedModel::new(toy.lm.clone()).with_smear(smear));
        let linguist = LexTreeLinguist::new(tree, lm, config.clone(), toy.log_math()).unwrap();

        let (cat, _) = reach_word(&linguist, &linguist.initial_state(), "cat").unwrap();
        assert_eq!(cat.smear_term(), smear);
        assert_eq!(cat.smear_prob(), LogMath::LOG_ONE);

        let arcs = linguist.successors(&cat).unwrap();
        let first = arcs.iter().find(|a| !a.state.is_word()).unwrap();
        let node = first.state.hmm_node().unwrap();
        let smeared_unigram = LogMath::scale(linguist.tree().unigram_probability(node), config.unigram_smear_weight);
        assert!((first.language_probability - (smeared_unigram + smear)).abs() < 1e-3);
        assert_eq!(first.state.smear_term(), smear);

        for word in ["dog", "cap", "cat"] {
            let (_, total) = reach_word(&linguist, &cat, word).unwrap();
            let sequence = cat.history().add_word(toy.word(word), 2);
            let expected = toy.lm.probability(&sequence) * config.language_weight;
            assert!((total - expected).abs() < 0.5, "{}: {} vs {}", word, total, expected);
        }
    }

    #[test]
    fn test_impossible_word_has_no_nan_arcs() {
        let toy = ToyModel::new();
        let config = LinguistConfig {
            language_weight: 3.0,
            unigram_smear_weight: 2.0,
            ..smeared()
        };
        let lm = Arc::new(AdjustedModel::new(toy.lm.clone()).ruling_out("dog"));
        let tree = HmmTree::from_config(Arc::new(toy.pool()), &toy.dictionary, lm.as_ref(), &config).unwrap();
        let linguist = LexTreeLinguist::new(Arc::new(tree), lm, config, toy.log_math()).unwrap();

        let dogs = word_states(&linguist, &linguist.initial_state(), "dog");
        assert!(!dogs.is_empty());
        for (dog, total) in dogs {
            assert_eq!(total, LogMath::LOG_ZERO);
            for arc in linguist.successors(&dog).unwrap().iter() {
                assert!(!arc.language_probability.is_nan());
            }
        }
    }

    #[test]
    fn test_triphone_entry_follows_previous_word() {
        let toy = ToyModel::triphone();
        let config = smeared();
        let linguist = linguist(&toy, config.clone());
        let initial = linguist.initial_state();
        let k = toy.unit("K");
        let k_begins = |arcs: &[LexTreeArc]| -> BTreeSet<HmmId> {
            arcs.iter()
                .filter_map(|a| a.state.hmm_node())
                .filter(|n| n.hmm().base_unit().base_id() == k)
                .map(|n| n.hmm().id())
                .collect()
        };

        let first = linguist.successors(&initial).unwrap();
        let after_silence = toy.cd_hmm("K", "SIL", "AE", HmmPosition::Begin).id();
        assert_eq!(k_begins(&first), [after_silence].into_iter().collect::<BTreeSet<_>>());

        // one cat state per distinct word-final T model
        let cats = word_states(&linguist, &initial, "cat");
        assert_eq!(cats.len(), 3);
        let sequence = initial.history().add_word(toy.word("cat"), 2);
        let expected = toy.lm.probability(&sequence) * config.language_weight;
        let mut after_cat = BTreeSet::new();
        for (cat, total) in &cats {
            assert!((total - expected).abs() < 0.5, "{} vs {}", total, expected);
            after_cat.extend(k_begins(&linguist.successors(cat).unwrap()));
        }
        let after_t = toy.cd_hmm("K", "T", "AE", HmmPosition::Begin).id();
        assert_eq!(after_cat, [after_t].into_iter().collect::<BTreeSet<_>>());
    }
}
