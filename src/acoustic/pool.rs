//! Indexed parameter pools.
//!
//! A pool maps small integer ids to parameter blocks (means, variances,
//! transition matrices, senones). Entries are shared, never copied, by the
//! structures built on top of them.

use std::collections::HashMap;

use crate::error::{ModelError, Result};

/// Named integer properties attached to a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolFeature {
    /// Number of senones described by the pool.
    NumSenones,
    /// Number of Gaussians per senone.
    NumGaussiansPerState,
    /// Number of feature streams.
    NumStreams,
}

/// An indexable container of parameter blocks.
#[derive(Debug, Clone)]
pub struct Pool<T> {
    name: String,
    entries: Vec<Option<T>>,
    features: HashMap<PoolFeature, usize>,
}

impl<T> Pool<T> {
    /// Create an empty pool.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            features: HashMap::new(),
        }
    }

    /// The pool name, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the entry stored under `id`.
    pub fn get(&self, id: usize) -> Option<&T> {
        self.entries.get(id).and_then(Option::as_ref)
    }

    /// Get the entry stored under `id`, failing if it is absent.
    pub fn try_get(&self, id: usize) -> Result<&T> {
        self.get(id).ok_or_else(|| {
            ModelError::UnknownPoolEntry {
                pool: self.name.clone(),
                id,
            }
            .into()
        })
    }

    /// Store an entry under `id`, growing the pool as needed.
    pub fn put(&mut self, id: usize, value: T) {
        if id >= self.entries.len() {
            self.entries.resize_with(id + 1, || None);
        }
        self.entries[id] = Some(value);
    }

    /// Append an entry and return its id.
    pub fn push(&mut self, value: T) -> usize {
        self.entries.push(Some(value));
        self.entries.len() - 1
    }

    /// Number of slots, including empty ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool has no slots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the stored entries with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(id, e)| e.as_ref().map(|v| (id, v)))
    }

    /// Set a feature value.
    pub fn set_feature(&mut self, feature: PoolFeature, value: usize) {
        self.features.insert(feature, value);
    }

    /// Get a feature value, or `default` if it was never set.
    pub fn feature(&self, feature: PoolFeature, default: usize) -> usize {
        self.features.get(&feature).copied().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let mut pool: Pool<Vec<f32>> = Pool::new("means");
        pool.put(2, vec![1.0, 2.0]);
        assert_eq!(pool.len(), 3);
        assert!(pool.get(0).is_none());
        assert_eq!(pool.get(2).unwrap(), &vec![1.0, 2.0]);
        assert_eq!(pool.iter().count(), 1);
    }

    #[test]
    fn test_try_get_names_pool() {
        let pool: Pool<u8> = Pool::new("variances");
        let err = pool.try_get(5).unwrap_err();
        assert_eq!(err.to_string(), "Model error: Pool 'variances' has no entry 5");
    }

    #[test]
    fn test_features() {
        let mut pool: Pool<u8> = Pool::new("senones");
        assert_eq!(pool.feature(PoolFeature::NumSenones, 0), 0);
        pool.set_feature(PoolFeature::NumSenones, 42);
        assert_eq!(pool.feature(PoolFeature::NumSenones, 0), 42);
        assert_eq!(pool.push(1), 0);
    }
}
