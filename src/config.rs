//! Decoder configuration.
//!
//! Configuration is layered with figment: built-in defaults, then `lextree.toml`,
//! then `lextree.yaml`, then `LEXTREE_`-prefixed environment variables
//! (nested keys separated by `__`, e.g. `LEXTREE_LINGUIST__LANGUAGE_WEIGHT=8`).

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{acoustic, logmath};
use crate::error::{ConfigError, Result};

// Default value functions for serde defaults
fn default_log_base() -> f64 { logmath::DEFAULT_LOG_BASE }
fn default_variance_floor() -> f32 { acoustic::DEFAULT_VARIANCE_FLOOR }
fn default_mixture_weight_floor() -> f32 { acoustic::DEFAULT_MIXTURE_WEIGHT_FLOOR }
fn default_dist_floor() -> f32 { acoustic::DEFAULT_DIST_FLOOR }
fn default_one() -> f32 { 1.0 }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

/// Acoustic scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcousticConfig {
    /// Base of the logarithm used for all scores
    #[serde(default = "default_log_base")]
    pub log_base: f64,

    /// Variances below this value are clamped before inversion
    #[serde(default = "default_variance_floor")]
    pub variance_floor: f32,

    /// Linear floor applied to mixture weights before the log conversion
    #[serde(default = "default_mixture_weight_floor")]
    pub mixture_weight_floor: f32,

    /// Linear floor for Gaussian scores (0.0 means log-zero)
    #[serde(default = "default_dist_floor")]
    pub dist_floor: f32,

    /// Only accept HMMs whose context matches exactly
    #[serde(default)]
    pub exact_context_match: bool,
}

impl Default for AcousticConfig {
    fn default() -> Self {
        Self {
            log_base: default_log_base(),
            variance_floor: default_variance_floor(),
            mixture_weight_floor: default_mixture_weight_floor(),
            dist_floor: default_dist_floor(),
            exact_context_match: false,
        }
    }
}

/// Lexicon tree and search-state configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinguistConfig {
    /// Scale applied to every language model probability
    #[serde(default = "default_one")]
    pub language_weight: f32,

    /// Linear probability applied when a word is entered
    #[serde(default = "default_one")]
    pub word_insertion_probability: f32,

    /// Linear probability applied when a silence unit is entered
    #[serde(default = "default_one")]
    pub silence_insertion_probability: f32,

    /// Linear probability applied when a filler unit is entered
    #[serde(default = "default_one")]
    pub filler_insertion_probability: f32,

    /// Linear probability applied when any other unit is entered
    #[serde(default = "default_one")]
    pub unit_insertion_probability: f32,

    /// Add every filler word of the dictionary to the tree
    #[serde(default)]
    pub add_filler_words: bool,

    /// Insert explicit unit states in front of HMM states
    #[serde(default)]
    pub generate_unit_states: bool,

    /// Spread unigram look-ahead probabilities over the tree
    #[serde(default)]
    pub want_unigram_smear: bool,

    /// Scale applied to the unigram smear
    #[serde(default = "default_one")]
    pub unigram_smear_weight: f32,

    /// Maximum number of cached successor lists (0 disables the cache)
    #[serde(default)]
    pub arc_cache_size: usize,
}

impl Default for LinguistConfig {
    fn default() -> Self {
        Self {
            language_weight: 1.0,
            word_insertion_probability: 1.0,
            silence_insertion_probability: 1.0,
            filler_insertion_probability: 1.0,
            unit_insertion_probability: 1.0,
            add_filler_words: false,
            generate_unit_states: false,
            want_unigram_smear: false,
            unigram_smear_weight: 1.0,
            arc_cache_size: 0,
        }
    }
}

impl LinguistConfig {
    /// Whether successor lists are cached.
    pub fn cache_enabled(&self) -> bool {
        self.arc_cache_size > 0
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Include thread ids in log lines
    #[serde(default = "default_true")]
    pub with_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            with_thread_ids: true,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(default)]
    pub acoustic: AcousticConfig,
    #[serde(default)]
    pub linguist: LinguistConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DecoderConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. lextree.yaml (if exists)
    /// 3. lextree.toml (if exists)
    /// 4. Built-in defaults (lowest priority)
    pub fn load() -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(DecoderConfig::default()))
            .merge(Toml::file("lextree.toml"))
            .merge(Yaml::file("lextree.yaml"))
            .merge(Env::prefixed("LEXTREE_").split("__"));
        Self::extract(figment)
    }

    /// Load configuration from a single TOML or YAML file on top of the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::Load(format!("{} not found", path.display())).into());
        }

        let defaults = Figment::from(Serialized::defaults(DecoderConfig::default()));
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => defaults.merge(Yaml::file(path)),
            _ => defaults.merge(Toml::file(path)),
        };
        debug!("Loading decoder configuration from {:?}", path);
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: DecoderConfig = figment
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let a = &self.acoustic;
        if !(a.log_base > 1.0) {
            return Err(invalid("acoustic.log_base", a.log_base));
        }
        if !(a.variance_floor > 0.0) {
            return Err(invalid("acoustic.variance_floor", a.variance_floor));
        }
        if !(a.mixture_weight_floor >= 0.0 && a.mixture_weight_floor < 1.0) {
            return Err(invalid("acoustic.mixture_weight_floor", a.mixture_weight_floor));
        }
        if !(a.dist_floor >= 0.0) {
            return Err(invalid("acoustic.dist_floor", a.dist_floor));
        }

        let l = &self.linguist;
        if !(l.language_weight > 0.0) {
            return Err(invalid("linguist.language_weight", l.language_weight));
        }
        if !(l.unigram_smear_weight >= 0.0) {
            return Err(invalid("linguist.unigram_smear_weight", l.unigram_smear_weight));
        }

        // Insertion probabilities are penalties or rewards in linear space; they
        // only have to be strictly positive to have a finite log.
        let insertion = [
            ("linguist.word_insertion_probability", l.word_insertion_probability),
            ("linguist.silence_insertion_probability", l.silence_insertion_probability),
            ("linguist.filler_insertion_probability", l.filler_insertion_probability),
            ("linguist.unit_insertion_probability", l.unit_insertion_probability),
        ];
        for (field, value) in insertion {
            if !(value > 0.0 && value.is_finite()) {
                return Err(invalid(field, value));
            }
        }

        if self.logging.level.trim().is_empty() {
            return Err(invalid("logging.level", "<empty>"));
        }

        Ok(())
    }

    /// Export configuration to TOML format
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()).into())
    }

    /// Export configuration to YAML format
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()).into())
    }
}

fn invalid(field: &'static str, value: impl ToString) -> crate::error::DecoderError {
    ConfigError::InvalidValue {
        field,
        value: value.to_string(),
    }
    .into()
}
