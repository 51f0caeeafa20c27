//! Logging setup and diagnostic counters.
//!
//! Logging goes through `tracing`; the subscriber is installed by the embedding
//! application through [`init_logging`]. Counters are recorded with the `metrics`
//! facade and are no-ops until the application installs a recorder.

use metrics::{counter, describe_counter};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{DecoderError, Result};

/// Nodes allocated while compiling the lexicon tree.
pub const NODES_CREATED: &str = "lextree_nodes_created_total";
/// HMM lookups that found no model for a context.
pub const MISSING_HMMS: &str = "lextree_missing_hmms_total";
/// Composite-senone HMMs built for unknown right contexts.
pub const COMPOSITE_HMMS: &str = "lextree_composite_hmms_total";
/// Successor lists served from the arc cache.
pub const ARC_CACHE_HITS: &str = "lextree_arc_cache_hits_total";
/// Successor lists computed because they were not cached.
pub const ARC_CACHE_MISSES: &str = "lextree_arc_cache_misses_total";
/// Times the arc cache was cleared after reaching its size limit.
pub const ARC_CACHE_EVICTIONS: &str = "lextree_arc_cache_evictions_total";
/// Gaussian scores that evaluated to NaN and were clamped.
pub const NAN_SCORES: &str = "acoustic_nan_scores_total";

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| DecoderError::Internal(format!("invalid log filter: {}", e)))?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(config.with_thread_ids)
        .with_level(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| DecoderError::Internal(format!("failed to install subscriber: {}", e)))?;
    register_metrics();
    Ok(())
}

/// Register all counters with their descriptions.
pub fn register_metrics() {
    describe_counter!(NODES_CREATED, "Nodes allocated while compiling the lexicon tree");
    describe_counter!(MISSING_HMMS, "HMM lookups that found no model for a context");
    describe_counter!(COMPOSITE_HMMS, "Composite-senone HMMs built for unknown right contexts");
    describe_counter!(ARC_CACHE_HITS, "Successor lists served from the arc cache");
    describe_counter!(ARC_CACHE_MISSES, "Successor lists computed on a cache miss");
    describe_counter!(ARC_CACHE_EVICTIONS, "Arc cache clears after reaching the size limit");
    describe_counter!(NAN_SCORES, "Gaussian scores clamped from NaN to log-zero");
}

/// Record nodes created during tree compilation.
pub fn record_nodes_created(count: u64) {
    counter!(NODES_CREATED).increment(count);
}

/// Record a context for which no HMM exists.
pub fn record_missing_hmm(position: &'static str) {
    counter!(MISSING_HMMS, "position" => position).increment(1);
}

/// Record a composite HMM construction.
pub fn record_composite_hmm() {
    counter!(COMPOSITE_HMMS).increment(1);
}

/// Record an arc cache lookup.
pub fn record_arc_cache_lookup(hit: bool) {
    if hit {
        counter!(ARC_CACHE_HITS).increment(1);
    } else {
        counter!(ARC_CACHE_MISSES).increment(1);
    }
}

/// Record an arc cache clear.
pub fn record_arc_cache_eviction() {
    counter!(ARC_CACHE_EVICTIONS).increment(1);
}

/// Record a NaN Gaussian score.
pub fn record_nan_score() {
    counter!(NAN_SCORES).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        register_metrics();
        record_nodes_created(3);
        record_missing_hmm("internal");
        record_arc_cache_lookup(true);
        record_arc_cache_lookup(false);
        record_nan_score();
    }

    #[test]
    fn test_invalid_filter_is_an_error() {
        let config = LoggingConfig {
            level: "lextree=notalevel".to_string(),
            ..LoggingConfig::default()
        };
        // Only meaningful when RUST_LOG does not override the level.
        if std::env::var("RUST_LOG").is_err() {
            assert!(init_logging(&config).is_err());
        }
    }
}
