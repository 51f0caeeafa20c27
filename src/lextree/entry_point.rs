//! Word-initial fan-in of the lexicon tree.
//!
//! Every unit that starts a word has an [`EntryPoint`]. Words are first added
//! under the entry point's base node without knowing their left context. Once
//! all words are in, [`EntryPoint::create_entry_point_map`] builds, for each
//! possible left context, a node whose children are the word-beginning HMMs for
//! every right context, each linked back into the shared structure below the
//! base node. Begin HMMs that come out identical for different contexts are
//! created once and shared.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use super::node::{NodeArena, NodeId, NodeKind, SuccessorKey};
use crate::acoustic::{HmmPool, HmmPosition, LogMath};
use crate::error::Result;
use crate::linguist::{Pronunciation, Word};
use crate::types::{HmmId, UnitId};

#[derive(Debug, Clone)]
struct SingleUnitWord {
    word: Arc<Word>,
    pronunciation: Arc<Pronunciation>,
    probability: f32,
}

/// Construction state shared by all entry points while their maps are built.
pub(crate) struct EntryPointContext<'a> {
    pub arena: &'a mut NodeArena,
    pub pool: &'a HmmPool,
    pub exit_points: &'a BTreeSet<UnitId>,
    pub entry_units: &'a BTreeSet<UnitId>,
    pub word_nodes: &'a mut HashMap<SuccessorKey, NodeId>,
    pub sentence_end_word_node: &'a mut Option<NodeId>,
}

/// The entry into the tree for one word-initial base unit.
#[derive(Debug)]
pub struct EntryPoint {
    base_unit: UnitId,
    base_node: NodeId,
    probability: f32,
    unit_to_entry_point: BTreeMap<UnitId, NodeId>,
    single_unit_words: Vec<SingleUnitWord>,
    rc_set: Option<BTreeSet<UnitId>>,
}

impl EntryPoint {
    pub(crate) fn new(base_unit: UnitId, arena: &mut NodeArena) -> Self {
        Self {
            base_unit,
            base_node: arena.alloc(NodeKind::Branch, LogMath::LOG_ZERO),
            probability: LogMath::LOG_ZERO,
            unit_to_entry_point: BTreeMap::new(),
            single_unit_words: Vec::new(),
            rc_set: None,
        }
    }

    pub fn base_unit(&self) -> UnitId {
        self.base_unit
    }

    /// Node under which the second and later units of words are attached.
    pub fn base_node(&self) -> NodeId {
        self.base_node
    }

    /// Best unigram probability of any word starting here.
    pub fn probability(&self) -> f32 {
        self.probability
    }

    /// Raise the entry probability to `probability` if higher.
    pub fn add_probability(&mut self, probability: f32) {
        if probability > self.probability {
            self.probability = probability;
        }
    }

    pub(crate) fn add_single_unit_word(&mut self, word: Arc<Word>, pronunciation: Arc<Pronunciation>, probability: f32) {
        self.single_unit_words.push(SingleUnitWord {
            word,
            pronunciation,
            probability,
        });
    }

    /// The fan-out node for words entered after `left_context`.
    pub fn entry_points_from_left_context(&self, left_context: UnitId) -> Option<NodeId> {
        self.unit_to_entry_point.get(&left_context).copied()
    }

    /// Left contexts with an entry map.
    pub fn left_contexts(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.unit_to_entry_point.keys().copied()
    }

    /// Base units of the units that can follow this one inside a word.
    fn entry_point_rc(&mut self, arena: &NodeArena) -> BTreeSet<UnitId> {
        let base_node = self.base_node;
        self.rc_set
            .get_or_insert_with(|| {
                arena
                    .successors(base_node)
                    .iter()
                    .filter_map(|&n| arena.get(n).kind().base_unit())
                    .collect()
            })
            .clone()
    }

    pub(crate) fn create_entry_point_map(&mut self, ctx: &mut EntryPointContext<'_>) -> Result<()> {
        let mut begin_nodes: HashMap<HmmId, NodeId> = HashMap::new();
        let mut single_nodes: HashMap<HmmId, NodeId> = HashMap::new();
        let rcs = self.entry_point_rc(ctx.arena);

        for &lc in ctx.exit_points {
            let ep_node = ctx.arena.alloc(NodeKind::Branch, LogMath::LOG_ZERO);
            for &rc in &rcs {
                let Some(hmm) = ctx.pool.get_hmm(self.base_unit, lc, rc, HmmPosition::Begin) else {
                    warn!("Missing begin HMM for {} lc={} rc={}", self.base_unit, lc, rc);
                    continue;
                };
                let added = match begin_nodes.get(&hmm.id()) {
                    Some(&node) => {
                        ctx.arena.put_successor(ep_node, node)?;
                        node
                    }
                    None => {
                        let id = hmm.id();
                        let node = ctx.arena.add_successor(
                            ep_node,
                            NodeKind::Hmm {
                                hmm,
                                rc_set: BTreeSet::new(),
                            },
                            self.probability,
                        )?;
                        begin_nodes.insert(id, node);
                        node
                    }
                };
                self.connect_entry_point_node(ctx.arena, added, rc)?;
            }
            self.connect_single_unit_words(ctx, lc, ep_node, &mut single_nodes)?;
            self.unit_to_entry_point.insert(lc, ep_node);
        }
        debug!(
            "Entry point {}: {} left contexts, {} begin HMMs",
            self.base_unit,
            self.unit_to_entry_point.len(),
            begin_nodes.len()
        );
        Ok(())
    }

    /// Link `node` to every unit below the base node whose base unit is `rc`.
    fn connect_entry_point_node(&self, arena: &mut NodeArena, node: NodeId, rc: UnitId) -> Result<()> {
        let matching: Vec<NodeId> = arena
            .successors(self.base_node)
            .iter()
            .copied()
            .filter(|&n| arena.get(n).kind().base_unit() == Some(rc))
            .collect();
        for successor in matching {
            arena.put_successor(node, successor)?;
        }
        Ok(())
    }

    fn connect_single_unit_words(
        &self,
        ctx: &mut EntryPointContext<'_>,
        lc: UnitId,
        ep_node: NodeId,
        single_nodes: &mut HashMap<HmmId, NodeId>,
    ) -> Result<()> {
        if self.single_unit_words.is_empty() {
            return Ok(());
        }
        for &rc in ctx.entry_units {
            let Some(hmm) = ctx.pool.get_hmm(self.base_unit, lc, rc, HmmPosition::Single) else {
                continue;
            };
            let tail = match single_nodes.get(&hmm.id()) {
                Some(&node) => {
                    ctx.arena.put_successor(ep_node, node)?;
                    node
                }
                None => {
                    let id = hmm.id();
                    let node = ctx.arena.add_successor(
                        ep_node,
                        NodeKind::Hmm {
                            hmm,
                            rc_set: BTreeSet::new(),
                        },
                        self.probability,
                    )?;
                    single_nodes.insert(id, node);
                    node
                }
            };
            ctx.arena.add_rc(tail, rc)?;

            for single in &self.single_unit_words {
                if single.word.is_sentence_start() {
                    continue;
                }
                let word_node = ctx.arena.add_word_successor(
                    tail,
                    &single.word,
                    &single.pronunciation,
                    single.probability,
                    ctx.word_nodes,
                )?;
                if single.word.is_sentence_end() {
                    *ctx.sentence_end_word_node = Some(word_node);
                }
            }
        }
        Ok(())
    }

    /// Drop construction-only state.
    pub(crate) fn freeze(&mut self) {
        self.single_unit_words = Vec::new();
        self.rc_set = None;
    }
}

/// Entry points by base unit.
#[derive(Debug, Default)]
pub struct EntryPointTable {
    entry_points: BTreeMap<UnitId, EntryPoint>,
}

impl EntryPointTable {
    pub(crate) fn new(entry_units: &BTreeSet<UnitId>, arena: &mut NodeArena) -> Self {
        let entry_points = entry_units
            .iter()
            .map(|&unit| (unit, EntryPoint::new(unit, arena)))
            .collect();
        Self { entry_points }
    }

    pub fn get(&self, base_unit: UnitId) -> Option<&EntryPoint> {
        self.entry_points.get(&base_unit)
    }

    pub(crate) fn get_mut(&mut self, base_unit: UnitId) -> Option<&mut EntryPoint> {
        self.entry_points.get_mut(&base_unit)
    }

    pub(crate) fn create_entry_point_maps(&mut self, ctx: &mut EntryPointContext<'_>) -> Result<()> {
        for ep in self.entry_points.values_mut() {
            ep.create_entry_point_map(ctx)?;
        }
        let maps: usize = self.entry_points.values().map(|ep| ep.unit_to_entry_point.len()).sum();
        debug!("Created {} entry point maps", maps);
        Ok(())
    }

    pub(crate) fn freeze(&mut self) {
        for ep in self.entry_points.values_mut() {
            ep.freeze();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntryPoint> {
        self.entry_points.values()
    }

    pub fn len(&self) -> usize {
        self.entry_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lextree::test_support::ToyModel;

    #[test]
    fn test_add_probability_keeps_max() {
        let mut arena = NodeArena::new();
        let mut ep = EntryPoint::new(UnitId::new(1), &mut arena);
        assert_eq!(ep.probability(), LogMath::LOG_ZERO);
        ep.add_probability(-20.0);
        ep.add_probability(-50.0);
        ep.add_probability(-10.0);
        assert_eq!(ep.probability(), -10.0);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_entry_point_map_shares_begin_hmms() {
        let toy = ToyModel::new();
        let pool = toy.pool();
        let (k, ae, sil, t) = (toy.unit("K"), toy.unit("AE"), toy.unit("SIL"), toy.unit("T"));

        let mut arena = NodeArena::new();
        let mut ep = EntryPoint::new(k, &mut arena);
        let ae_node = arena
            .add_successor(
                ep.base_node(),
                NodeKind::Hmm {
                    hmm: toy.ci_hmm("AE"),
                    rc_set: BTreeSet::new(),
                },
                -3.0,
            )
            .unwrap();
        ep.add_probability(-3.0);

        let exit_points: BTreeSet<UnitId> = [sil, t].into_iter().collect();
        let entry_units: BTreeSet<UnitId> = [k, sil].into_iter().collect();
        let mut word_nodes = HashMap::new();
        let mut sentence_end = None;
        let mut ctx = EntryPointContext {
            arena: &mut arena,
            pool: &pool,
            exit_points: &exit_points,
            entry_units: &entry_units,
            word_nodes: &mut word_nodes,
            sentence_end_word_node: &mut sentence_end,
        };
        ep.create_entry_point_map(&mut ctx).unwrap();

        let after_sil = ep.entry_points_from_left_context(sil).unwrap();
        let after_t = ep.entry_points_from_left_context(t).unwrap();
        assert_ne!(after_sil, after_t);
        // context-independent fallback gives the same begin HMM for both contexts
        assert_eq!(arena.successors(after_sil), arena.successors(after_t));
        let begin = arena.successors(after_sil)[0];
        assert_eq!(arena.get(begin).unigram_probability(), -3.0);
        assert_eq!(arena.successors(begin), &[ae_node]);
        assert!(ep.entry_points_from_left_context(ae).is_none());
        assert_eq!(ep.left_contexts().count(), 2);

        ep.freeze();
        assert!(ep.single_unit_words.is_empty());
    }
}
