//! Bounded word histories.

use std::fmt;
use std::sync::Arc;

use super::dictionary::Word;

/// An immutable sequence of words, oldest first.
///
/// Equality and hashing compare spellings.
#[derive(Debug, Clone)]
pub struct WordSequence {
    words: Arc<[Arc<Word>]>,
}

impl WordSequence {
    pub fn new(words: Vec<Arc<Word>>) -> Self {
        Self { words: words.into() }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn words(&self) -> &[Arc<Word>] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, index: usize) -> Option<&Arc<Word>> {
        self.words.get(index)
    }

    /// The most recent word.
    pub fn last(&self) -> Option<&Arc<Word>> {
        self.words.last()
    }

    /// A new sequence with `word` appended, keeping at most `max_size` newest words.
    pub fn add_word(&self, word: Arc<Word>, max_size: usize) -> Self {
        let mut words: Vec<Arc<Word>> = self.words.iter().cloned().collect();
        words.push(word);
        let skip = words.len().saturating_sub(max_size);
        Self::new(words.split_off(skip))
    }

    /// A new sequence of at most the `max_size` newest words.
    pub fn trim(&self, max_size: usize) -> Self {
        if self.words.len() <= max_size {
            return self.clone();
        }
        let skip = self.words.len() - max_size;
        Self::new(self.words[skip..].to_vec())
    }

    /// The sequence without its newest word (the history of an n-gram).
    pub fn oldest(&self) -> Self {
        let end = self.words.len().saturating_sub(1);
        Self::new(self.words[..end].to_vec())
    }

    /// The sequence without its oldest word (the back-off n-gram).
    pub fn newest(&self) -> Self {
        let start = 1.min(self.words.len());
        Self::new(self.words[start..].to_vec())
    }

    /// Spellings, oldest first.
    pub fn spellings(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(|w| w.spelling())
    }
}

impl PartialEq for WordSequence {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.words, &other.words) || self.spellings().eq(other.spellings())
    }
}

impl Eq for WordSequence {}

impl std::hash::Hash for WordSequence {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.words.len().hash(state);
        for spelling in self.spellings() {
            spelling.hash(state);
        }
    }
}

impl fmt::Display for WordSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, s) in self.spellings().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "]")
    }
}
