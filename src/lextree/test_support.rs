//! A tiny acoustic model, dictionary and language model for tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::acoustic::{HmmKey, HmmPool, HmmPosition, LogMath, ModelBuilder, ModelPools, SenoneHmm};
use crate::config::{AcousticConfig, LinguistConfig};
use crate::linguist::{BackoffNGramModel, Dictionary, LanguageModel, SimpleDictionary, Word, WordSequence};
use crate::types::UnitId;

use super::tree::HmmTree;

pub(crate) const PHONES: [&str; 7] = ["K", "AE", "T", "P", "D", "AA", "G"];
pub(crate) const DIMENSION: usize = 3;

/// Base, left context, right context and position of a triphone HMM.
pub(crate) type Triphone = (&'static str, &'static str, &'static str, HmmPosition);

/// Triphones of [`ToyModel::triphone`]. Every other context falls back to the
/// context-independent HMM.
pub(crate) const TRIPHONES: [Triphone; 8] = [
    ("K", "SIL", "AE", HmmPosition::Begin),
    ("K", "T", "AE", HmmPosition::Begin),
    ("AE", "K", "T", HmmPosition::Internal),
    ("AE", "K", "P", HmmPosition::Internal),
    ("T", "AE", "K", HmmPosition::End),
    ("T", "AE", "D", HmmPosition::End),
    ("AA", "SIL", "K", HmmPosition::Single),
    ("AA", "SIL", "D", HmmPosition::Single),
];

pub(crate) struct ToyModel {
    pub pools: ModelPools,
    pub dictionary: SimpleDictionary,
    pub lm: BackoffNGramModel,
}

impl ToyModel {
    /// cat /K AE T/, cap /K AE P/, dog /D AA G/ with context-independent HMMs.
    pub fn new() -> Self {
        Self::build(&[], false)
    }

    /// The same vocabulary plus the single-unit word ah /AA/, with the
    /// [`TRIPHONES`] added on top of the context-independent HMMs.
    pub fn triphone() -> Self {
        Self::build(&TRIPHONES, true)
    }

    fn build(triphones: &[Triphone], single_unit_word: bool) -> Self {
        let mut builder = ModelBuilder::new(AcousticConfig::default()).unwrap();
        for p in PHONES {
            builder.add_unit(p, false);
        }
        let tmat = builder
            .add_transition_matrix(vec![
                vec![0.5, 0.5, 0.0, 0.0],
                vec![0.0, 0.5, 0.5, 0.0],
                vec![0.0, 0.0, 0.5, 0.5],
                vec![0.0, 0.0, 0.0, 0.0],
            ])
            .unwrap();

        for (i, name) in std::iter::once("SIL").chain(PHONES).enumerate() {
            let mut senones = Vec::new();
            for state in 0..3 {
                let offset = (i * 3 + state) as f32 * 0.25;
                let g0 = builder
                    .add_gaussian(vec![offset; DIMENSION], vec![1.0; DIMENSION])
                    .unwrap();
                let g1 = builder
                    .add_gaussian(vec![offset + 1.0; DIMENSION], vec![0.5; DIMENSION])
                    .unwrap();
                senones.push(builder.add_senone(&[g0, g1], &[0.6, 0.4]).unwrap());
            }
            builder
                .add_hmm(name, None, None, HmmPosition::Undefined, &senones, tmat)
                .unwrap();
        }

        for (i, &(base, left, right, position)) in triphones.iter().enumerate() {
            let mut senones = Vec::new();
            for state in 0..3 {
                let offset = 10.0 + (i * 3 + state) as f32 * 0.25;
                let g = builder
                    .add_gaussian(vec![offset; DIMENSION], vec![1.0; DIMENSION])
                    .unwrap();
                senones.push(builder.add_senone(&[g], &[1.0]).unwrap());
            }
            builder
                .add_hmm(base, Some(left), Some(right), position, &senones, tmat)
                .unwrap();
        }
        let pools = builder.build().unwrap();

        let mut dictionary = SimpleDictionary::new(pools.units.clone());
        dictionary.add_word("cat", &["K", "AE", "T"]).unwrap();
        dictionary.add_word("cap", &["K", "AE", "P"]).unwrap();
        dictionary.add_word("dog", &["D", "AA", "G"]).unwrap();

        let mut lm = BackoffNGramModel::new(2, pools.log_math).unwrap();
        lm.add_ngram(&["<s>"], -99.0, -0.3).unwrap();
        lm.add_unigram("</s>", -1.0).unwrap();
        lm.add_unigram("cat", -1.0).unwrap();
        lm.add_unigram("cap", -1.3).unwrap();
        lm.add_unigram("dog", -0.7).unwrap();
        lm.add_ngram(&["<s>", "cat"], -0.4, 0.0).unwrap();

        if single_unit_word {
            dictionary.add_word("ah", &["AA"]).unwrap();
            lm.add_unigram("ah", -1.5).unwrap();
        }

        Self {
            pools,
            dictionary,
            lm,
        }
    }

    pub fn pool(&self) -> HmmPool {
        self.pools.hmm_pool(&AcousticConfig::default())
    }

    pub fn unit(&self, name: &str) -> UnitId {
        self.pools.units.get(name).unwrap().base_id()
    }

    pub fn ci_hmm(&self, name: &str) -> Arc<SenoneHmm> {
        self.pools
            .hmm_manager
            .get(&HmmKey::new(self.unit(name), None, None, HmmPosition::Undefined))
            .unwrap()
            .clone()
    }

    /// The triphone loaded for exactly this context.
    pub fn cd_hmm(&self, base: &str, left: &str, right: &str, position: HmmPosition) -> Arc<SenoneHmm> {
        let key = HmmKey::new(self.unit(base), Some(self.unit(left)), Some(self.unit(right)), position);
        self.pools.hmm_manager.get(&key).unwrap().clone()
    }

    pub fn word(&self, spelling: &str) -> Arc<Word> {
        self.dictionary.get_word(spelling).unwrap()
    }

    pub fn tree(&self, config: &LinguistConfig) -> HmmTree {
        HmmTree::from_config(Arc::new(self.pool()), &self.dictionary, &self.lm, config).unwrap()
    }

    pub fn log_math(&self) -> LogMath {
        self.pools.log_math
    }
}

/// A back-off model with a constant smear term and words it gives no probability.
pub(crate) struct AdjustedModel {
    inner: BackoffNGramModel,
    smear: f32,
    ruled_out: BTreeSet<String>,
}

impl AdjustedModel {
    pub fn new(inner: BackoffNGramModel) -> Self {
        Self {
            inner,
            smear: LogMath::LOG_ONE,
            ruled_out: BTreeSet::new(),
        }
    }

    pub fn with_smear(mut self, smear: f32) -> Self {
        self.smear = smear;
        self
    }

    pub fn ruling_out(mut self, spelling: &str) -> Self {
        self.ruled_out.insert(spelling.to_string());
        self
    }
}

impl LanguageModel for AdjustedModel {
    fn vocabulary(&self) -> &BTreeSet<String> {
        self.inner.vocabulary()
    }

    fn probability(&self, sequence: &WordSequence) -> f32 {
        match sequence.last() {
            Some(word) if self.ruled_out.contains(word.spelling()) => LogMath::LOG_ZERO,
            _ => self.inner.probability(sequence),
        }
    }

    fn max_depth(&self) -> usize {
        self.inner.max_depth()
    }

    fn smear(&self, _sequence: &WordSequence) -> f32 {
        self.smear
    }
}
