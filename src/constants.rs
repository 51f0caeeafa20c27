//! Domain constants for the lexicon-tree decoder.
//!
//! This module contains compile-time constants used throughout the crate.
//! These are separated from runtime configuration to provide clear distinction
//! between values that never change and those that can be configured.

/// Log-domain arithmetic constants.
pub mod logmath {
    /// Default log base used by the acoustic model.
    pub const DEFAULT_LOG_BASE: f64 = 1.0001;

    /// Log-domain representation of zero probability.
    pub const LOG_ZERO: f32 = -f32::MAX;

    /// Log-domain representation of probability one.
    pub const LOG_ONE: f32 = 0.0;
}

/// Acoustic scoring constants.
pub mod acoustic {
    /// Default variance floor applied before inverting to precision.
    pub const DEFAULT_VARIANCE_FLOOR: f32 = 0.0001;

    /// Default linear distance floor (0.0 maps to log-zero).
    pub const DEFAULT_DIST_FLOOR: f32 = 0.0;

    /// Default linear floor for mixture weights.
    pub const DEFAULT_MIXTURE_WEIGHT_FLOOR: f32 = 1e-7;

    /// Radix of the mixed-radix composite senone id.
    pub const MAX_SENONES: u64 = 20000;

    /// Lane width of the AVX2 distance kernel.
    pub const SIMD_LANES: usize = 8;
}

/// Lexicon tree constants.
pub mod lextree {
    /// Spelling of the sentence-start word.
    pub const SENTENCE_START_SPELLING: &str = "<s>";

    /// Spelling of the sentence-end word.
    pub const SENTENCE_END_SPELLING: &str = "</s>";

    /// Spelling of the silence word.
    pub const SILENCE_SPELLING: &str = "<sil>";

    /// Name of the silence unit.
    pub const SILENCE_UNIT_NAME: &str = "SIL";
}

/// Search state ordering used to break ties in the active list.
pub mod state_order {
    /// Non-emitting HMM state.
    pub const NON_EMITTING_HMM: usize = 0;

    /// Word state.
    pub const WORD: usize = 1;

    /// Final (sentence-end) word state.
    pub const END_WORD: usize = 2;

    /// Word-final unit state.
    pub const END_UNIT: usize = 3;

    /// Unit state.
    pub const UNIT: usize = 4;

    /// Emitting HMM state.
    pub const EMITTING_HMM: usize = 5;

    /// Number of distinct state orders.
    pub const NUM_STATE_ORDERS: usize = 6;
}
