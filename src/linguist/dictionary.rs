//! Pronunciation dictionary.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::acoustic::{Unit, UnitManager};
use crate::constants::lextree::{SENTENCE_END_SPELLING, SENTENCE_START_SPELLING, SILENCE_SPELLING};
use crate::error::{ModelError, Result, TreeError};

/// One way of pronouncing a word.
#[derive(Debug, Clone, PartialEq)]
pub struct Pronunciation {
    units: Box<[Arc<Unit>]>,
    probability: f32,
}

impl Pronunciation {
    pub fn new(units: Vec<Arc<Unit>>, probability: f32) -> Self {
        Self {
            units: units.into_boxed_slice(),
            probability,
        }
    }

    pub fn units(&self) -> &[Arc<Unit>] {
        &self.units
    }

    pub fn probability(&self) -> f32 {
        self.probability
    }
}

impl fmt::Display for Pronunciation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.units.iter().map(|u| u.name()).collect();
        write!(f, "/{}/", names.join(" "))
    }
}

/// A dictionary entry.
#[derive(Debug, Clone)]
pub struct Word {
    spelling: String,
    pronunciations: Vec<Arc<Pronunciation>>,
    filler: bool,
}

impl Word {
    pub fn new(spelling: impl Into<String>, pronunciations: Vec<Arc<Pronunciation>>, filler: bool) -> Self {
        Self {
            spelling: spelling.into(),
            pronunciations,
            filler,
        }
    }

    pub fn spelling(&self) -> &str {
        &self.spelling
    }

    pub fn pronunciations(&self) -> &[Arc<Pronunciation>] {
        &self.pronunciations
    }

    /// Whether the word is a non-speech filler.
    pub fn is_filler(&self) -> bool {
        self.filler
    }

    pub fn is_sentence_start(&self) -> bool {
        self.spelling == SENTENCE_START_SPELLING
    }

    pub fn is_sentence_end(&self) -> bool {
        self.spelling == SENTENCE_END_SPELLING
    }
}

impl PartialEq for Word {
    fn eq(&self, other: &Self) -> bool {
        self.spelling == other.spelling
    }
}

impl Eq for Word {}

impl std::hash::Hash for Word {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.spelling.hash(state);
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spelling)
    }
}

/// Lookup of words and their pronunciations.
pub trait Dictionary: Send + Sync {
    /// The word spelled `spelling`.
    fn get_word(&self, spelling: &str) -> Option<Arc<Word>>;

    /// All filler words, in a stable order.
    fn filler_words(&self) -> Vec<Arc<Word>>;

    fn sentence_start_word(&self) -> Result<Arc<Word>> {
        self.get_word(SENTENCE_START_SPELLING)
            .ok_or_else(|| TreeError::MissingWord(SENTENCE_START_SPELLING).into())
    }

    fn sentence_end_word(&self) -> Result<Arc<Word>> {
        self.get_word(SENTENCE_END_SPELLING)
            .ok_or_else(|| TreeError::MissingWord(SENTENCE_END_SPELLING).into())
    }

    fn silence_word(&self) -> Result<Arc<Word>> {
        self.get_word(SILENCE_SPELLING)
            .ok_or_else(|| TreeError::MissingWord(SILENCE_SPELLING).into())
    }
}

/// In-memory dictionary over the units of one acoustic model.
///
/// `<s>`, `</s>` and `<sil>` are always present as fillers pronounced with the
/// silence unit.
#[derive(Debug, Clone)]
pub struct SimpleDictionary {
    units: Arc<UnitManager>,
    words: BTreeMap<String, Arc<Word>>,
}

impl SimpleDictionary {
    pub fn new(units: Arc<UnitManager>) -> Self {
        let mut dictionary = Self {
            units,
            words: BTreeMap::new(),
        };
        let silence = dictionary.units.silence().clone();
        for spelling in [SENTENCE_START_SPELLING, SENTENCE_END_SPELLING, SILENCE_SPELLING] {
            dictionary.insert(spelling, vec![silence.clone()], true);
        }
        dictionary
    }

    /// Add a pronunciation of a regular word.
    pub fn add_word(&mut self, spelling: &str, phones: &[&str]) -> Result<()> {
        let units = self.resolve(spelling, phones)?;
        self.insert(spelling, units, false);
        Ok(())
    }

    /// Add a pronunciation of a filler word.
    pub fn add_filler(&mut self, spelling: &str, phones: &[&str]) -> Result<()> {
        let units = self.resolve(spelling, phones)?;
        self.insert(spelling, units, true);
        Ok(())
    }

    fn resolve(&self, spelling: &str, phones: &[&str]) -> Result<Vec<Arc<Unit>>> {
        if phones.is_empty() {
            return Err(TreeError::EmptyPronunciation(spelling.to_string()).into());
        }
        phones
            .iter()
            .map(|&p| {
                self.units
                    .get(p)
                    .ok_or_else(|| ModelError::MissingResource(format!("unit '{}' in '{}'", p, spelling)).into())
            })
            .collect()
    }

    fn insert(&mut self, spelling: &str, units: Vec<Arc<Unit>>, filler: bool) {
        let pronunciation = Arc::new(Pronunciation::new(units, 1.0));
        let entry = self
            .words
            .entry(spelling.to_string())
            .or_insert_with(|| Arc::new(Word::new(spelling, Vec::new(), filler)));
        let word = Arc::make_mut(entry);
        if !word.pronunciations.iter().any(|p| p.units == pronunciation.units) {
            word.pronunciations.push(pronunciation);
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Dictionary for SimpleDictionary {
    fn get_word(&self, spelling: &str) -> Option<Arc<Word>> {
        self.words.get(spelling).cloned()
    }

    fn filler_words(&self) -> Vec<Arc<Word>> {
        self.words.values().filter(|w| w.is_filler()).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> Arc<UnitManager> {
        let mut units = UnitManager::new();
        for p in ["K", "AE", "T", "P"] {
            units.get_or_create(p, false);
        }
        units.get_or_create("+BREATH+", true);
        Arc::new(units)
    }

    #[test]
    fn test_builtin_words() {
        let dict = SimpleDictionary::new(units());
        let start = dict.sentence_start_word().unwrap();
        assert!(start.is_filler());
        assert!(start.is_sentence_start());
        assert_eq!(start.pronunciations()[0].units()[0].name(), "SIL");
        assert!(dict.sentence_end_word().unwrap().is_sentence_end());
        assert!(dict.silence_word().is_ok());
        assert_eq!(dict.filler_words().len(), 3);
    }

    #[test]
    fn test_add_words() {
        let mut dict = SimpleDictionary::new(units());
        dict.add_word("cat", &["K", "AE", "T"]).unwrap();
        dict.add_word("cat", &["K", "AE", "P"]).unwrap();
        dict.add_word("cat", &["K", "AE", "T"]).unwrap();
        dict.add_filler("++breath++", &["+BREATH+"]).unwrap();

        let cat = dict.get_word("cat").unwrap();
        assert!(!cat.is_filler());
        assert_eq!(cat.pronunciations().len(), 2);
        assert_eq!(cat.pronunciations()[1].to_string(), "/K AE P/");
        assert_eq!(dict.filler_words().len(), 4);
    }

    #[test]
    fn test_unknown_phone_and_empty_pronunciation() {
        let mut dict = SimpleDictionary::new(units());
        assert!(dict.add_word("dog", &["D", "AO", "G"]).is_err());
        assert!(dict.add_word("nothing", &[]).is_err());
        assert!(dict.get_word("dog").is_none());
    }
}
