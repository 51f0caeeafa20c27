//! The `lextree_decoder` core library.
//!
//! This crate compiles a pronunciation dictionary and a language model into a
//! shared lexicon tree of context-dependent HMMs and scores feature frames
//! against it. The tree is built once, frozen, and then read concurrently by
//! any number of decoding threads through [`search::LexTreeLinguist`].
//!
//! ```text
//! ModelBuilder ──► ModelPools ──► HmmPool ─┐
//! SimpleDictionary ────────────────────────┼──► HmmTree ──► LexTreeLinguist
//! BackoffNGramModel ───────────────────────┘
//! ```

pub mod acoustic;
pub mod config;
pub mod constants;
pub mod error;
pub mod lextree;
pub mod linguist;
pub mod search;
pub mod telemetry;
pub mod types;

pub use error::{DecoderError, Result};
