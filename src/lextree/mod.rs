//! Lexicon tree: the vocabulary compiled into a prefix-shared graph of HMMs.

pub mod entry_point;
pub mod node;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_support;

pub use entry_point::{EntryPoint, EntryPointTable};
pub use node::{Node, NodeArena, NodeId, NodeKind, SuccessorKey};
pub use tree::{ExpandedHmmNode, HmmNodeRef, HmmTree};
