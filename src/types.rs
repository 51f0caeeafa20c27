//! Strong typing with newtypes for domain concepts.
//!
//! This module provides type-safe wrappers around the integer identities used
//! by the acoustic model so that unit, senone and HMM ids cannot be mixed up.

use serde::{Deserialize, Serialize};

/// Identity of a context-independent (base) unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl UnitId {
    /// Create a new unit id.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the id value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unit_{}", self.0)
    }
}

/// Identity of a senone; composite senones use a mixed-radix encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SenoneId(pub u64);

impl SenoneId {
    /// Create a new senone id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the id value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SenoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "senone_{}", self.0)
    }
}

/// Identity of an HMM assigned by the HMM manager.
///
/// HMMs are pool-deduplicated, so equal ids mean the same model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HmmId(pub u32);

impl HmmId {
    /// Create a new HMM id.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the id value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for HmmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "hmm_{}", self.0)
    }
}
