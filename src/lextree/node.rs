//! Tree nodes and the arena that owns them.
//!
//! Nodes refer to each other by [`NodeId`]. While the tree is built every node
//! keeps its successors in an index keyed by the successor's identity so that
//! equal HMMs, end nodes and pronunciations are merged instead of duplicated.
//! Freezing turns that index into a plain slice; a frozen node rejects new
//! successors.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::acoustic::SenoneHmm;
use crate::error::{Result, TreeError};
use crate::linguist::{Pronunciation, Word};
use crate::types::{HmmId, UnitId};

/// Index of a node in a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn value(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// What a node represents.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A fan-out point with no unit of its own.
    Branch,
    /// A unit in context.
    Hmm {
        hmm: Arc<SenoneHmm>,
        /// Right contexts this node was built for (word-final units only).
        rc_set: BTreeSet<UnitId>,
    },
    /// The last unit of one or more words, before its right context is known.
    End { base: UnitId, left: UnitId },
    /// A word leaf.
    Word {
        word: Arc<Word>,
        pronunciation: Arc<Pronunciation>,
    },
}

/// Identity used to merge successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuccessorKey {
    Hmm(HmmId),
    End { base: UnitId, left: UnitId },
    Word(usize),
}

impl NodeKind {
    /// The merge key; branches have none.
    pub fn key(&self) -> Option<SuccessorKey> {
        match self {
            NodeKind::Branch => None,
            NodeKind::Hmm { hmm, .. } => Some(SuccessorKey::Hmm(hmm.id())),
            NodeKind::End { base, left } => Some(SuccessorKey::End {
                base: *base,
                left: *left,
            }),
            NodeKind::Word { pronunciation, .. } => Some(pronunciation_key(pronunciation)),
        }
    }

    /// The base unit of unit nodes.
    pub fn base_unit(&self) -> Option<UnitId> {
        match self {
            NodeKind::Hmm { hmm, .. } => Some(hmm.base_unit().base_id()),
            NodeKind::End { base, .. } => Some(*base),
            NodeKind::Branch | NodeKind::Word { .. } => None,
        }
    }
}

/// Pronunciations are interned by the dictionary, so their address identifies them.
pub(crate) fn pronunciation_key(pronunciation: &Arc<Pronunciation>) -> SuccessorKey {
    SuccessorKey::Word(Arc::as_ptr(pronunciation) as usize)
}

/// Successor storage: an index while building, a slice once frozen.
#[derive(Debug, Clone)]
pub enum Successors {
    Building {
        index: HashMap<SuccessorKey, usize>,
        order: Vec<NodeId>,
    },
    Frozen(Box<[NodeId]>),
}

impl Default for Successors {
    fn default() -> Self {
        Successors::Building {
            index: HashMap::new(),
            order: Vec::new(),
        }
    }
}

/// A tree node.
#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    unigram_probability: f32,
    successors: Successors,
}

impl Node {
    fn new(kind: NodeKind, unigram_probability: f32) -> Self {
        Self {
            kind,
            unigram_probability,
            successors: Successors::default(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Best unigram probability of any word reachable through this node.
    pub fn unigram_probability(&self) -> f32 {
        self.unigram_probability
    }

    /// Successors in insertion order.
    pub fn successors(&self) -> &[NodeId] {
        match &self.successors {
            Successors::Building { order, .. } => order,
            Successors::Frozen(frozen) => frozen,
        }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.successors, Successors::Frozen(_))
    }

    /// Right contexts of an HMM node.
    pub fn rc_set(&self) -> Option<&BTreeSet<UnitId>> {
        match &self.kind {
            NodeKind::Hmm { rc_set, .. } => Some(rc_set),
            _ => None,
        }
    }

    /// Switch to the frozen representation; a no-op if already frozen.
    pub fn freeze(&mut self) {
        if let Successors::Building { order, .. } = &mut self.successors {
            let frozen = std::mem::take(order).into_boxed_slice();
            self.successors = Successors::Frozen(frozen);
        }
    }

    fn successor(&self, key: &SuccessorKey) -> Option<NodeId> {
        match &self.successors {
            Successors::Building { index, order } => index.get(key).map(|&i| order[i]),
            Successors::Frozen(_) => None,
        }
    }

    fn promote(&mut self, probability: f32) {
        if self.unigram_probability < probability {
            self.unigram_probability = probability;
        }
    }
}

/// Owner of every node of a tree.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node with no successors.
    pub fn alloc(&mut self, kind: NodeKind, unigram_probability: f32) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind, unigram_probability));
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn successors(&self, id: NodeId) -> &[NodeId] {
        self.get(id).successors()
    }

    /// Add a child of `kind` under `parent`, or reuse the existing child with the
    /// same key and raise its unigram probability to `probability` if higher.
    pub fn add_successor(&mut self, parent: NodeId, kind: NodeKind, probability: f32) -> Result<NodeId> {
        self.check_building(parent)?;
        if let Some(key) = kind.key() {
            if let Some(existing) = self.nodes[parent.index()].successor(&key) {
                self.nodes[existing.index()].promote(probability);
                return Ok(existing);
            }
        }
        let child = self.alloc(kind, probability);
        self.put_successor(parent, child)?;
        Ok(child)
    }

    /// Add the word node for `pronunciation` under `parent`.
    ///
    /// Word nodes are shared tree-wide through `word_nodes`.
    pub fn add_word_successor(
        &mut self,
        parent: NodeId,
        word: &Arc<Word>,
        pronunciation: &Arc<Pronunciation>,
        probability: f32,
        word_nodes: &mut HashMap<SuccessorKey, NodeId>,
    ) -> Result<NodeId> {
        self.check_building(parent)?;
        let key = pronunciation_key(pronunciation);
        if let Some(existing) = self.nodes[parent.index()].successor(&key) {
            self.nodes[existing.index()].promote(probability);
            return Ok(existing);
        }
        let child = match word_nodes.get(&key) {
            Some(&node) => node,
            None => {
                let node = self.alloc(
                    NodeKind::Word {
                        word: word.clone(),
                        pronunciation: pronunciation.clone(),
                    },
                    probability,
                );
                word_nodes.insert(key, node);
                node
            }
        };
        self.put_successor(parent, child)?;
        Ok(child)
    }

    /// Link `child` under `parent` by its key, replacing any child with that key.
    pub fn put_successor(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let key = self.nodes[child.index()].kind.key();
        match &mut self.nodes[parent.index()].successors {
            Successors::Frozen(_) => Err(TreeError::FrozenNode(parent.value()).into()),
            Successors::Building { index, order } => {
                match key {
                    Some(key) => match index.get(&key) {
                        Some(&slot) => order[slot] = child,
                        None => {
                            index.insert(key, order.len());
                            order.push(child);
                        }
                    },
                    None => order.push(child),
                }
                Ok(())
            }
        }
    }

    /// Record that the HMM node `id` serves right context `rc`.
    pub fn add_rc(&mut self, id: NodeId, rc: UnitId) -> Result<()> {
        self.check_building(id)?;
        if let NodeKind::Hmm { rc_set, .. } = &mut self.nodes[id.index()].kind {
            rc_set.insert(rc);
        }
        Ok(())
    }

    fn check_building(&self, id: NodeId) -> Result<()> {
        if self.nodes[id.index()].is_frozen() {
            Err(TreeError::FrozenNode(id.value()).into())
        } else {
            Ok(())
        }
    }

    /// Freeze one node.
    pub fn freeze(&mut self, id: NodeId) -> &[NodeId] {
        let node = &mut self.nodes[id.index()];
        node.freeze();
        node.successors()
    }

    /// Freeze every node.
    pub fn freeze_all(&mut self) {
        for node in &mut self.nodes {
            node.freeze();
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }
}
