//! Words, pronunciations and language models.

pub mod dictionary;
pub mod language_model;
pub mod word_sequence;

pub use dictionary::{Dictionary, Pronunciation, SimpleDictionary, Word};
pub use language_model::{BackoffNGramModel, LanguageModel};
pub use word_sequence::WordSequence;
