//! Custom error types for the lexicon-tree decoder.
//!
//! This module provides a centralized error handling system using the `thiserror` crate
//! to define structured, typed errors with clear messages and proper error conversion.
//!
//! Construction-time problems (model loading, tree compilation, configuration) surface
//! as errors. Scoring never fails: numeric degeneracies are clamped where they occur.

use std::io;
use thiserror::Error;

/// Primary error type for the crate, covering all possible error cases.
#[derive(Debug, Error)]
pub enum DecoderError {
    /// Errors raised while assembling acoustic model parameters.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Errors raised while compiling or mutating the lexicon tree.
    #[error("Lexicon tree error: {0}")]
    Tree(#[from] TreeError),

    /// Errors from invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Operation that is deliberately not implemented for a type.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Errors from the underlying IO system.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal errors wrapped with context.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Acoustic model assembly errors.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Two parameter blocks that must agree in length do not.
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A transform matrix or vector has the wrong shape.
    #[error("Invalid transform: {0}")]
    InvalidTransform(String),

    /// A pool lookup referenced an id that was never stored.
    #[error("Pool '{pool}' has no entry {id}")]
    UnknownPoolEntry { pool: String, id: usize },

    /// A mandatory resource is absent.
    #[error("Missing resource: {0}")]
    MissingResource(String),

    /// The mixed-radix id of a composite senone does not fit in 64 bits.
    #[error("Composite senone id overflows with {count} constituents")]
    CompositeIdOverflow { count: usize },

    /// A transition matrix is not square or has the wrong order.
    #[error("Invalid transition matrix: {0}")]
    InvalidTransitionMatrix(String),

    /// A senone has no mixture components or no constituents.
    #[error("Empty senone: {0}")]
    EmptySenone(String),
}

/// Lexicon tree construction and lifecycle errors.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A successor was added to a node after it was frozen.
    #[error("Node {0} is frozen and cannot accept successors")]
    FrozenNode(u32),

    /// A word the tree cannot be built without is missing from the dictionary.
    #[error("Dictionary has no {0} word")]
    MissingWord(&'static str),

    /// An HMM the tree cannot be built without is missing from the pool.
    #[error("No HMM for unit {unit} at position {position}")]
    MissingHmm { unit: String, position: String },

    /// A word has a pronunciation with no units.
    #[error("Word '{0}' has an empty pronunciation")]
    EmptyPronunciation(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or merge configuration sources.
    #[error("Failed to load configuration: {0}")]
    Load(String),

    /// A configuration value is out of range.
    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: &'static str, value: String },

    /// Failed to export configuration.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),
}

/// Convenience type alias for Results with DecoderError.
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to the error.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to the error.
    fn with_static_context(self, context: &'static str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| DecoderError::Internal(format!("{}: {}", f(), e)))
    }

    fn with_static_context(self, context: &'static str) -> Result<T> {
        self.map_err(|e| DecoderError::Internal(format!("{}: {}", context, e)))
    }
}
