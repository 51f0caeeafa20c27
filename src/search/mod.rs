//! Search-graph view of the lexicon tree.

pub mod cache;
pub mod linguist;
pub mod state;

pub use cache::ArcCache;
pub use linguist::LexTreeLinguist;
pub use state::{LexTreeArc, LexTreeState, StateKind};
