//! Lexicon tree construction and successor expansion benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lextree_decoder::acoustic::{HmmPosition, ModelBuilder, ModelPools};
use lextree_decoder::config::{AcousticConfig, LinguistConfig};
use lextree_decoder::lextree::HmmTree;
use lextree_decoder::linguist::{BackoffNGramModel, LanguageModel, SimpleDictionary};
use lextree_decoder::search::LexTreeLinguist;
use std::sync::Arc;

const PHONES: [&str; 12] = ["AA", "AE", "B", "D", "EH", "G", "IY", "K", "M", "N", "S", "T"];

fn model() -> ModelPools {
    let mut builder = ModelBuilder::new(AcousticConfig::default()).unwrap();
    for p in PHONES {
        builder.add_unit(p, false);
    }
    let tmat = builder
        .add_transition_matrix(vec![
            vec![0.6, 0.4, 0.0, 0.0],
            vec![0.0, 0.6, 0.4, 0.0],
            vec![0.0, 0.0, 0.6, 0.4],
            vec![0.0, 0.0, 0.0, 0.0],
        ])
        .unwrap();
    for (i, name) in std::iter::once("SIL").chain(PHONES).enumerate() {
        let senones: Vec<usize> = (0..3)
            .map(|s| {
                let g = builder
                    .add_gaussian(vec![(i * 3 + s) as f32 * 0.1; 13], vec![1.0; 13])
                    .unwrap();
                builder.add_senone(&[g], &[1.0]).unwrap()
            })
            .collect();
        builder
            .add_hmm(name, None, None, HmmPosition::Undefined, &senones, tmat)
            .unwrap();
    }
    builder.build().unwrap()
}

/// A deterministic vocabulary of `size` words of two to six phones.
fn vocabulary(pools: &ModelPools, size: usize) -> (SimpleDictionary, BackoffNGramModel) {
    let mut dictionary = SimpleDictionary::new(pools.units.clone());
    let mut lm = BackoffNGramModel::new(2, pools.log_math).unwrap();
    lm.add_ngram(&["<s>"], -99.0, -0.5).unwrap();
    lm.add_unigram("</s>", -1.5).unwrap();

    let mut seed = 7usize;
    for w in 0..size {
        let len = 2 + w % 5;
        let phones: Vec<&str> = (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                PHONES[(seed >> 8) % PHONES.len()]
            })
            .collect();
        let spelling = format!("w{}", w);
        dictionary.add_word(&spelling, &phones).unwrap();
        lm.add_unigram(&spelling, -2.0 - (w % 13) as f32 * 0.1).unwrap();
    }
    (dictionary, lm)
}

/// Benchmark compiling the tree for growing vocabularies
fn benchmark_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_compile");
    group.sample_size(20);
    let pools = model();

    for size in [100usize, 1_000, 5_000] {
        let (dictionary, lm) = vocabulary(&pools, size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let pool = Arc::new(pools.hmm_pool(&AcousticConfig::default()));
                black_box(HmmTree::new(pool, &dictionary, &lm, false, 1.0).unwrap())
            })
        });
    }

    group.finish();
}

/// Benchmark successor expansion from the initial state, cold and cached
fn benchmark_successors(c: &mut Criterion) {
    let mut group = c.benchmark_group("successors");
    let pools = model();
    let (dictionary, lm) = vocabulary(&pools, 1_000);
    let lm: Arc<dyn LanguageModel> = Arc::new(lm);

    for cache in [0usize, 100_000] {
        let config = LinguistConfig {
            want_unigram_smear: true,
            arc_cache_size: cache,
            ..LinguistConfig::default()
        };
        let pool = Arc::new(pools.hmm_pool(&AcousticConfig::default()));
        let tree = Arc::new(HmmTree::from_config(pool, &dictionary, lm.as_ref(), &config).unwrap());
        let linguist = LexTreeLinguist::new(tree, lm.clone(), config, pools.log_math).unwrap();
        let initial = linguist.initial_state();

        group.bench_with_input(BenchmarkId::new("two_levels", cache), &cache, |b, _| {
            b.iter(|| {
                let arcs = linguist.successors(black_box(&initial)).unwrap();
                let mut total = 0usize;
                for arc in arcs.iter() {
                    total += linguist.successors(&arc.state).unwrap().len();
                }
                total
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_compile, benchmark_successors);
criterion_main!(benches);
