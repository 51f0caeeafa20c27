//! Language models.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use super::word_sequence::WordSequence;
use crate::acoustic::LogMath;
use crate::error::{ConfigError, Result};

/// N-gram probabilities over word sequences, in the model's log base.
pub trait LanguageModel: Send + Sync {
    /// Spellings of every word the model knows.
    fn vocabulary(&self) -> &BTreeSet<String>;

    /// Log probability of the newest word of `sequence` given the older ones.
    fn probability(&self, sequence: &WordSequence) -> f32;

    /// Longest n-gram the model uses.
    fn max_depth(&self) -> usize;

    /// Look-ahead smear term for a history; log-one when the model has none.
    fn smear(&self, _sequence: &WordSequence) -> f32 {
        LogMath::LOG_ONE
    }
}

#[derive(Debug, Clone, Copy)]
struct NGramEntry {
    probability: f32,
    backoff: f32,
}

/// In-memory back-off n-gram model.
///
/// Entries are given as base-10 logarithms, the way ARPA files store them.
#[derive(Debug, Clone)]
pub struct BackoffNGramModel {
    log_math: LogMath,
    max_depth: usize,
    vocabulary: BTreeSet<String>,
    ngrams: HashMap<Vec<String>, NGramEntry>,
}

impl BackoffNGramModel {
    pub fn new(max_depth: usize, log_math: LogMath) -> Result<Self> {
        if max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_depth",
                value: "0".into(),
            }
            .into());
        }
        Ok(Self {
            log_math,
            max_depth,
            vocabulary: BTreeSet::new(),
            ngrams: HashMap::new(),
        })
    }

    /// Add an n-gram with its log10 probability and log10 back-off weight.
    pub fn add_ngram(&mut self, words: &[&str], log10_probability: f32, log10_backoff: f32) -> Result<()> {
        if words.is_empty() || words.len() > self.max_depth {
            return Err(ConfigError::InvalidValue {
                field: "ngram",
                value: format!("{:?} (max depth {})", words, self.max_depth),
            }
            .into());
        }
        if words.len() == 1 {
            self.vocabulary.insert(words[0].to_string());
        }
        self.ngrams.insert(
            words.iter().map(|w| w.to_string()).collect(),
            NGramEntry {
                probability: self.log_math.log10_to_log(log10_probability),
                backoff: self.log_math.log10_to_log(log10_backoff),
            },
        );
        Ok(())
    }

    /// Add a unigram with no back-off weight.
    pub fn add_unigram(&mut self, word: &str, log10_probability: f32) -> Result<()> {
        self.add_ngram(&[word], log10_probability, 0.0)
    }

    fn key(sequence: &WordSequence) -> Vec<String> {
        sequence.spellings().map(str::to_string).collect()
    }

    fn backoff(&self, history: &WordSequence) -> f32 {
        self.ngrams
            .get(&Self::key(history))
            .map_or(LogMath::LOG_ONE, |e| e.backoff)
    }

    pub fn len(&self) -> usize {
        self.ngrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ngrams.is_empty()
    }
}

impl LanguageModel for BackoffNGramModel {
    fn vocabulary(&self) -> &BTreeSet<String> {
        &self.vocabulary
    }

    fn probability(&self, sequence: &WordSequence) -> f32 {
        let sequence = sequence.trim(self.max_depth);
        if sequence.is_empty() {
            return LogMath::LOG_ONE;
        }
        if let Some(entry) = self.ngrams.get(&Self::key(&sequence)) {
            return entry.probability;
        }
        if sequence.len() == 1 {
            debug!("Word {} is not in the language model", sequence);
            return LogMath::LOG_ZERO;
        }
        let backed_off = self.probability(&sequence.newest());
        if backed_off <= LogMath::LOG_ZERO {
            return LogMath::LOG_ZERO;
        }
        self.backoff(&sequence.oldest()) + backed_off
    }

    fn max_depth(&self) -> usize {
        self.max_depth
    }
}
