//! Shared cache of successor lists.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::state::{LexTreeArc, LexTreeState};
use crate::telemetry;

/// Successor lists keyed by state, shared by every search thread.
///
/// When the cache grows past its capacity it is cleared wholesale.
#[derive(Debug)]
pub struct ArcCache {
    arcs: DashMap<LexTreeState, Arc<[LexTreeArc]>>,
    capacity: usize,
}

impl ArcCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            arcs: DashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, state: &LexTreeState) -> Option<Arc<[LexTreeArc]>> {
        let found = self.arcs.get(state).map(|entry| entry.value().clone());
        telemetry::record_arc_cache_lookup(found.is_some());
        found
    }

    pub fn put(&self, state: LexTreeState, arcs: Arc<[LexTreeArc]>) {
        if self.arcs.len() >= self.capacity {
            debug!("Arc cache reached {} entries, clearing", self.arcs.len());
            self.arcs.clear();
            telemetry::record_arc_cache_eviction();
        }
        self.arcs.insert(state, arcs);
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.arcs.clear();
    }
}
