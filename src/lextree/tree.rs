//! The shared HMM tree of a vocabulary.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use super::entry_point::{EntryPointContext, EntryPointTable};
use super::node::{Node, NodeArena, NodeId, NodeKind, SuccessorKey};
use crate::acoustic::{HmmPool, HmmPosition, LogMath, SenoneHmm, UnitManager};
use crate::config::LinguistConfig;
use crate::constants::lextree::SENTENCE_END_SPELLING;
use crate::error::{DecoderError, Result, TreeError};
use crate::linguist::{Dictionary, LanguageModel, Pronunciation, Word, WordSequence};
use crate::telemetry;
use crate::types::{HmmId, UnitId};

static NO_CONTEXTS: BTreeSet<UnitId> = BTreeSet::new();

/// A word-final HMM built for a set of right contexts after the tree was frozen.
#[derive(Debug)]
pub struct ExpandedHmmNode {
    hmm: Arc<SenoneHmm>,
    rc_set: BTreeSet<UnitId>,
}

impl ExpandedHmmNode {
    pub fn hmm(&self) -> &Arc<SenoneHmm> {
        &self.hmm
    }

    /// Right contexts this HMM covers.
    pub fn rc_set(&self) -> &BTreeSet<UnitId> {
        &self.rc_set
    }
}

/// An HMM-carrying node, either in the tree or expanded from an end node.
#[derive(Debug, Clone)]
pub enum HmmNodeRef {
    Tree { id: NodeId, hmm: Arc<SenoneHmm> },
    Expanded(Arc<ExpandedHmmNode>),
}

impl HmmNodeRef {
    pub fn hmm(&self) -> &Arc<SenoneHmm> {
        match self {
            HmmNodeRef::Tree { hmm, .. } => hmm,
            HmmNodeRef::Expanded(node) => &node.hmm,
        }
    }

    /// The arena id, for nodes that live in the tree.
    pub fn tree_node(&self) -> Option<NodeId> {
        match self {
            HmmNodeRef::Tree { id, .. } => Some(*id),
            HmmNodeRef::Expanded(_) => None,
        }
    }
}

impl PartialEq for HmmNodeRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HmmNodeRef::Tree { id: a, .. }, HmmNodeRef::Tree { id: b, .. }) => a == b,
            (HmmNodeRef::Expanded(a), HmmNodeRef::Expanded(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for HmmNodeRef {}

impl std::hash::Hash for HmmNodeRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            HmmNodeRef::Tree { id, .. } => {
                0u8.hash(state);
                id.hash(state);
            }
            HmmNodeRef::Expanded(node) => {
                1u8.hash(state);
                (Arc::as_ptr(node) as usize).hash(state);
            }
        }
    }
}

impl fmt::Display for HmmNodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HmmNodeRef::Tree { id, hmm } => write!(f, "{}:{}", id, hmm),
            HmmNodeRef::Expanded(node) => write!(f, "expanded:{}", node.hmm),
        }
    }
}

type EndKey = (UnitId, UnitId);

/// The compiled lexicon tree.
///
/// Built once by [`HmmTree::new`] and read-only afterwards, except for the
/// lazily expanded word-final HMMs, which are created at most once per
/// (unit, left context) and are safe to request from several threads.
#[derive(Debug)]
pub struct HmmTree {
    arena: NodeArena,
    entry_point_table: EntryPointTable,
    entry_units: BTreeSet<UnitId>,
    end_expansions: HashMap<EndKey, OnceCell<Arc<[HmmNodeRef]>>>,
    sentence_end_word_node: NodeId,
    initial_node: NodeId,
    initial_parent: HmmNodeRef,
    pool: Arc<HmmPool>,
}

impl HmmTree {
    /// Compile the tree for every word of `lm` that `dictionary` can pronounce.
    pub fn new(
        pool: Arc<HmmPool>,
        dictionary: &dyn Dictionary,
        lm: &dyn LanguageModel,
        add_filler_words: bool,
        language_weight: f32,
    ) -> Result<Self> {
        let start = Instant::now();
        let builder = TreeBuilder {
            pool: &pool,
            dictionary,
            lm,
            add_filler_words,
            language_weight,
            arena: NodeArena::new(),
            entry_units: BTreeSet::new(),
            exit_points: BTreeSet::new(),
            word_nodes: HashMap::new(),
            sentence_end_word_node: None,
        };
        let parts = builder.compile()?;

        let mut end_expansions = HashMap::new();
        for (_, node) in parts.arena.iter() {
            if let NodeKind::End { base, left } = node.kind() {
                end_expansions.insert((*base, *left), OnceCell::new());
            }
        }

        info!(
            "Lexicon tree compiled in {:?}: {} nodes, {} entry points, {} end-node keys",
            start.elapsed(),
            parts.arena.len(),
            parts.entry_point_table.len(),
            end_expansions.len()
        );

        Ok(Self {
            arena: parts.arena,
            entry_point_table: parts.entry_point_table,
            entry_units: parts.entry_units,
            end_expansions,
            sentence_end_word_node: parts.sentence_end_word_node,
            initial_node: parts.initial_node,
            initial_parent: parts.initial_parent,
            pool,
        })
    }

    /// [`HmmTree::new`] with options from the linguist configuration.
    pub fn from_config(
        pool: Arc<HmmPool>,
        dictionary: &dyn Dictionary,
        lm: &dyn LanguageModel,
        config: &LinguistConfig,
    ) -> Result<Self> {
        Self::new(pool, dictionary, lm, config.add_filler_words, config.language_weight)
    }

    /// Word-initial nodes for words starting with `base` after `left_context`.
    pub fn get_entry_point(&self, left_context: UnitId, base: UnitId) -> &[NodeId] {
        self.entry_point_table
            .get(base)
            .and_then(|ep| ep.entry_points_from_left_context(left_context))
            .map_or(&[], |node| self.arena.successors(node))
    }

    /// The word-final HMM nodes of `end_node`, one per distinct HMM over all
    /// right contexts.
    pub fn get_hmm_nodes(&self, end_node: NodeId) -> Result<Arc<[HmmNodeRef]>> {
        let key = match self.arena.get(end_node).kind() {
            NodeKind::End { base, left } => (*base, *left),
            _ => return Err(DecoderError::Internal(format!("{} is not an end node", end_node))),
        };
        let cell = self
            .end_expansions
            .get(&key)
            .ok_or_else(|| DecoderError::Internal(format!("no expansion slot for {}", end_node)))?;
        cell.get_or_try_init(|| self.expand_end_node(key)).cloned()
    }

    fn expand_end_node(&self, (base, left): EndKey) -> Result<Arc<[HmmNodeRef]>> {
        let mut order: Vec<(Arc<SenoneHmm>, BTreeSet<UnitId>)> = Vec::new();
        let mut index: HashMap<HmmId, usize> = HashMap::new();
        for &rc in &self.entry_units {
            if let Some(hmm) = self.pool.get_hmm(base, left, rc, HmmPosition::End) {
                let slot = *index.entry(hmm.id()).or_insert_with(|| {
                    order.push((hmm.clone(), BTreeSet::new()));
                    order.len() - 1
                });
                order[slot].1.insert(rc);
            }
        }
        if order.is_empty() {
            debug!("No end HMMs for {} lc={}, using a composite", base, left);
            let hmm = self.pool.get_composite_hmm(base, left, HmmPosition::End)?;
            order.push((hmm, self.entry_units.clone()));
        }
        Ok(order
            .into_iter()
            .map(|(hmm, rc_set)| HmmNodeRef::Expanded(Arc::new(ExpandedHmmNode { hmm, rc_set })))
            .collect())
    }

    /// The word node of the sentence-end word.
    pub fn sentence_end_word_node(&self) -> NodeId {
        self.sentence_end_word_node
    }

    /// The word node every utterance starts from.
    pub fn initial_node(&self) -> NodeId {
        self.initial_node
    }

    /// The silence HMM node preceding the initial node; its right contexts are
    /// all word-initial units.
    pub fn initial_parent(&self) -> &HmmNodeRef {
        &self.initial_parent
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.arena.get(id)
    }

    pub fn successors(&self, id: NodeId) -> &[NodeId] {
        self.arena.successors(id)
    }

    /// All nodes with their ids.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.arena.iter()
    }

    /// A reference to the tree node `id` if it carries an HMM.
    pub fn hmm_node(&self, id: NodeId) -> Option<HmmNodeRef> {
        match self.arena.get(id).kind() {
            NodeKind::Hmm { hmm, .. } => Some(HmmNodeRef::Tree { id, hmm: hmm.clone() }),
            _ => None,
        }
    }

    /// Right contexts of an HMM node.
    pub fn rc_set<'a>(&'a self, node: &'a HmmNodeRef) -> &'a BTreeSet<UnitId> {
        match node {
            HmmNodeRef::Tree { id, .. } => self.arena.get(*id).rc_set().unwrap_or(&NO_CONTEXTS),
            HmmNodeRef::Expanded(expanded) => &expanded.rc_set,
        }
    }

    /// Unigram probability of an HMM node; log-one for expanded nodes.
    pub fn unigram_probability(&self, node: &HmmNodeRef) -> f32 {
        match node {
            HmmNodeRef::Tree { id, .. } => self.arena.get(*id).unigram_probability(),
            HmmNodeRef::Expanded(_) => LogMath::LOG_ONE,
        }
    }

    /// Units that start at least one word.
    pub fn entry_units(&self) -> &BTreeSet<UnitId> {
        &self.entry_units
    }

    pub fn entry_point_table(&self) -> &EntryPointTable {
        &self.entry_point_table
    }

    pub fn units(&self) -> &Arc<UnitManager> {
        self.pool.units()
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }
}

struct CompiledParts {
    arena: NodeArena,
    entry_point_table: EntryPointTable,
    entry_units: BTreeSet<UnitId>,
    sentence_end_word_node: NodeId,
    initial_node: NodeId,
    initial_parent: HmmNodeRef,
}

/// Construction-only state; dropped once the tree is frozen.
struct TreeBuilder<'a> {
    pool: &'a HmmPool,
    dictionary: &'a dyn Dictionary,
    lm: &'a dyn LanguageModel,
    add_filler_words: bool,
    language_weight: f32,
    arena: NodeArena,
    entry_units: BTreeSet<UnitId>,
    exit_points: BTreeSet<UnitId>,
    word_nodes: HashMap<SuccessorKey, NodeId>,
    sentence_end_word_node: Option<NodeId>,
}

impl<'a> TreeBuilder<'a> {
    fn compile(mut self) -> Result<CompiledParts> {
        let words = self.all_words()?;
        self.collect_entry_and_exit_units(&words);

        let mut table = EntryPointTable::new(&self.entry_units, &mut self.arena);
        self.add_words(&mut table, &words)?;

        let mut ctx = EntryPointContext {
            arena: &mut self.arena,
            pool: self.pool,
            exit_points: &self.exit_points,
            entry_units: &self.entry_units,
            word_nodes: &mut self.word_nodes,
            sentence_end_word_node: &mut self.sentence_end_word_node,
        };
        table.create_entry_point_maps(&mut ctx)?;

        let (initial_node, initial_parent) = self.create_initial_node()?;
        let sentence_end_word_node = self
            .sentence_end_word_node
            .ok_or(TreeError::MissingWord(SENTENCE_END_SPELLING))?;

        table.freeze();
        self.arena.freeze_all();
        telemetry::record_nodes_created(self.arena.len() as u64);

        Ok(CompiledParts {
            arena: self.arena,
            entry_point_table: table,
            entry_units: self.entry_units,
            sentence_end_word_node,
            initial_node,
            initial_parent,
        })
    }

    /// Words of the language model the dictionary knows, plus fillers or silence.
    fn all_words(&self) -> Result<Vec<Arc<Word>>> {
        let mut words: BTreeMap<String, Arc<Word>> = BTreeMap::new();
        for spelling in self.lm.vocabulary() {
            match self.dictionary.get_word(spelling) {
                Some(word) => {
                    words.insert(spelling.clone(), word);
                }
                None => debug!("'{}' is not in the dictionary", spelling),
            }
        }
        if self.add_filler_words {
            for word in self.dictionary.filler_words() {
                words.insert(word.spelling().to_string(), word);
            }
        } else {
            let silence = self.dictionary.silence_word()?;
            words.insert(silence.spelling().to_string(), silence);
        }

        for word in words.values() {
            if word.pronunciations().iter().any(|p| p.units().is_empty()) {
                return Err(TreeError::EmptyPronunciation(word.spelling().to_string()).into());
            }
        }
        debug!("{} words in the lexicon tree", words.len());
        Ok(words.into_values().collect())
    }

    fn collect_entry_and_exit_units(&mut self, words: &[Arc<Word>]) {
        for word in words {
            for pronunciation in word.pronunciations() {
                let units = pronunciation.units();
                if let (Some(first), Some(last)) = (units.first(), units.last()) {
                    self.entry_units.insert(first.base_id());
                    self.exit_points.insert(last.base_id());
                }
            }
        }
    }

    fn word_unigram_probability(&self, word: &Arc<Word>) -> f32 {
        if word.is_filler() {
            return LogMath::LOG_ONE;
        }
        let sequence = WordSequence::new(vec![word.clone()]);
        LogMath::scale(self.lm.probability(&sequence), self.language_weight)
    }

    fn add_words(&mut self, table: &mut EntryPointTable, words: &[Arc<Word>]) -> Result<()> {
        for word in words {
            let probability = self.word_unigram_probability(word);
            for pronunciation in word.pronunciations() {
                self.add_pronunciation(table, word, pronunciation, probability)?;
            }
        }
        Ok(())
    }

    fn add_pronunciation(
        &mut self,
        table: &mut EntryPointTable,
        word: &Arc<Word>,
        pronunciation: &Arc<Pronunciation>,
        probability: f32,
    ) -> Result<()> {
        let units = pronunciation.units();
        let first = units[0].base_id();
        let ep = table
            .get_mut(first)
            .ok_or_else(|| DecoderError::Internal(format!("no entry point for {}", first)))?;
        ep.add_probability(probability);

        if units.len() == 1 {
            ep.add_single_unit_word(word.clone(), pronunciation.clone(), probability);
            return Ok(());
        }

        let mut node = ep.base_node();
        let mut lc = first;
        for i in 1..units.len() - 1 {
            let base = units[i].base_id();
            let rc = units[i + 1].base_id();
            match self.pool.get_hmm(base, lc, rc, HmmPosition::Internal) {
                Some(hmm) => {
                    node = self.arena.add_successor(
                        node,
                        NodeKind::Hmm {
                            hmm,
                            rc_set: BTreeSet::new(),
                        },
                        probability,
                    )?;
                }
                None => warn!(
                    "Missing HMM for unit {} with lc={} rc={} in '{}'",
                    units[i],
                    lc,
                    rc,
                    word.spelling()
                ),
            }
            lc = base;
        }

        let last = units[units.len() - 1].base_id();
        node = self
            .arena
            .add_successor(node, NodeKind::End { base: last, left: lc }, probability)?;
        let word_node = self
            .arena
            .add_word_successor(node, word, pronunciation, probability, &mut self.word_nodes)?;
        if word.is_sentence_end() {
            self.sentence_end_word_node = Some(word_node);
        }
        Ok(())
    }

    /// The `<s>` word node and its silence predecessor.
    fn create_initial_node(&mut self) -> Result<(NodeId, HmmNodeRef)> {
        let start = self.dictionary.sentence_start_word()?;
        let pronunciation = start
            .pronunciations()
            .first()
            .cloned()
            .ok_or_else(|| TreeError::EmptyPronunciation(start.spelling().to_string()))?;

        let silence = self.pool.units().silence().base_id();
        let hmm = self
            .pool
            .get_hmm(silence, silence, silence, HmmPosition::Single)
            .ok_or_else(|| TreeError::MissingHmm {
                unit: self.pool.units().silence().name().to_string(),
                position: HmmPosition::Single.to_string(),
            })?;

        let parent = self.arena.alloc(
            NodeKind::Hmm {
                hmm: hmm.clone(),
                rc_set: self.entry_units.clone(),
            },
            LogMath::LOG_ONE,
        );
        let initial = self.arena.alloc(
            NodeKind::Word {
                word: start,
                pronunciation,
            },
            LogMath::LOG_ONE,
        );
        Ok((initial, HmmNodeRef::Tree { id: parent, hmm }))
    }
}
