//! HMM storage and context-aware lookup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::composite_senone::CompositeSenone;
use super::hmm::{HmmPosition, SenoneHmm, SenoneSequence, TransitionMatrix};
use super::senone::Senone;
use super::unit::{Unit, UnitManager};
use crate::error::{Result, TreeError};
use crate::telemetry;
use crate::types::{HmmId, UnitId};

/// Identity of a loaded HMM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HmmKey {
    pub base: UnitId,
    pub left: Option<UnitId>,
    pub right: Option<UnitId>,
    pub position: HmmPosition,
}

impl HmmKey {
    pub fn new(base: UnitId, left: Option<UnitId>, right: Option<UnitId>, position: HmmPosition) -> Self {
        Self {
            base,
            left,
            right,
            position,
        }
    }

    fn context_independent(base: UnitId, position: HmmPosition) -> Self {
        Self::new(base, None, None, position)
    }
}

/// All HMMs of an acoustic model, one per key.
#[derive(Debug, Default)]
pub struct HmmManager {
    hmms: Vec<Arc<SenoneHmm>>,
    by_key: HashMap<HmmKey, Arc<SenoneHmm>>,
}

impl HmmManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an HMM for `key`; an existing HMM for the same key is returned instead.
    pub fn add(
        &mut self,
        key: HmmKey,
        unit: Arc<Unit>,
        base_unit: Arc<Unit>,
        senones: Arc<SenoneSequence>,
        transitions: Arc<TransitionMatrix>,
    ) -> Result<Arc<SenoneHmm>> {
        if let Some(existing) = self.by_key.get(&key) {
            return Ok(existing.clone());
        }
        let id = HmmId::new(self.hmms.len() as u32);
        let hmm = Arc::new(SenoneHmm::new(id, unit, base_unit, senones, transitions, key.position)?);
        self.hmms.push(hmm.clone());
        self.by_key.insert(key, hmm.clone());
        Ok(hmm)
    }

    /// Exact lookup.
    pub fn get(&self, key: &HmmKey) -> Option<&Arc<SenoneHmm>> {
        self.by_key.get(key)
    }

    /// HMMs of `base` with left context `left`, any right context, in id order.
    pub fn with_left_context(&self, base: UnitId, left: UnitId) -> Vec<&Arc<SenoneHmm>> {
        let mut found: Vec<_> = self
            .by_key
            .iter()
            .filter(|(k, _)| k.base == base && k.left == Some(left) && k.right.is_some())
            .map(|(_, hmm)| hmm)
            .collect();
        found.sort_by_key(|hmm| hmm.id());
        found
    }

    pub fn len(&self) -> usize {
        self.hmms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hmms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SenoneHmm>> {
        self.hmms.iter()
    }
}

#[derive(Debug, Default)]
struct CompositeTable {
    hmms: HashMap<(UnitId, UnitId, HmmPosition), Arc<SenoneHmm>>,
    next_id: u32,
}

/// Resolves `(base, left, right, position)` to the best available HMM.
///
/// Lookups fall back from the exact triphone to the position-free triphone and
/// then to the context-independent HMM, unless exact matching is required.
/// Filler units always use their context-independent HMM. Results are memoised,
/// so equal queries return the same `Arc`.
#[derive(Debug)]
pub struct HmmPool {
    manager: Arc<HmmManager>,
    units: Arc<UnitManager>,
    exact_context_match: bool,
    resolved: Mutex<HashMap<HmmKey, Option<Arc<SenoneHmm>>>>,
    composites: Mutex<CompositeTable>,
}

impl HmmPool {
    pub fn new(manager: Arc<HmmManager>, units: Arc<UnitManager>, exact_context_match: bool) -> Self {
        let next_id = manager.len() as u32;
        Self {
            manager,
            units,
            exact_context_match,
            resolved: Mutex::new(HashMap::new()),
            composites: Mutex::new(CompositeTable {
                hmms: HashMap::new(),
                next_id,
            }),
        }
    }

    pub fn units(&self) -> &Arc<UnitManager> {
        &self.units
    }

    pub fn manager(&self) -> &Arc<HmmManager> {
        &self.manager
    }

    /// The HMM for `base` between `left` and `right` at `position`, if the model has one.
    pub fn get_hmm(&self, base: UnitId, left: UnitId, right: UnitId, position: HmmPosition) -> Option<Arc<SenoneHmm>> {
        let key = HmmKey::new(base, Some(left), Some(right), position);
        if let Some(hit) = self.resolved.lock().get(&key) {
            return hit.clone();
        }
        let found = self.resolve(&key);
        if found.is_none() {
            debug!("No HMM for {} lc={} rc={} at {}", base, left, right, position);
            telemetry::record_missing_hmm(position.as_str());
        }
        self.resolved.lock().insert(key, found.clone());
        found
    }

    /// The context-independent HMM of `base` at `position`, falling back to any position.
    pub fn get_ci_hmm(&self, base: UnitId, position: HmmPosition) -> Option<Arc<SenoneHmm>> {
        self.manager
            .get(&HmmKey::context_independent(base, position))
            .or_else(|| self.manager.get(&HmmKey::context_independent(base, HmmPosition::Undefined)))
            .cloned()
    }

    fn resolve(&self, key: &HmmKey) -> Option<Arc<SenoneHmm>> {
        let filler = self.units.by_id(key.base).map_or(false, |u| u.is_filler());
        if !filler {
            let position_free = HmmKey {
                position: HmmPosition::Undefined,
                ..*key
            };
            if let Some(hmm) = self.manager.get(key).or_else(|| self.manager.get(&position_free)) {
                return Some(hmm.clone());
            }
            if self.exact_context_match {
                return None;
            }
        }
        self.get_ci_hmm(key.base, key.position)
    }

    /// An HMM for `base` after `left` whose right context is unknown.
    ///
    /// Each state scores as the best of the senones every known right context
    /// would use at that state.
    pub fn get_composite_hmm(&self, base: UnitId, left: UnitId, position: HmmPosition) -> Result<Arc<SenoneHmm>> {
        let mut table = self.composites.lock();
        if let Some(hmm) = table.hmms.get(&(base, left, position)) {
            return Ok(hmm.clone());
        }

        let base_unit = self.units.by_id(base).cloned().ok_or_else(|| TreeError::MissingHmm {
            unit: base.to_string(),
            position: position.to_string(),
        })?;

        let mut sequences: Vec<&Arc<SenoneSequence>> = Vec::new();
        let mut template: Option<&Arc<SenoneHmm>> = None;
        for hmm in self.manager.with_left_context(base, left) {
            if !sequences.contains(&hmm.senone_sequence()) {
                sequences.push(hmm.senone_sequence());
            }
            if template.map_or(true, |t| hmm.order() > t.order()) {
                template = Some(hmm);
            }
        }
        let ci = self.get_ci_hmm(base, position);
        if sequences.is_empty() {
            if let Some(ci) = &ci {
                sequences.push(ci.senone_sequence());
                template = Some(ci);
            }
        }
        let template = template.ok_or_else(|| TreeError::MissingHmm {
            unit: base_unit.name().to_string(),
            position: position.to_string(),
        })?;

        let order = template.order();
        let mut states: Vec<Arc<dyn Senone>> = Vec::with_capacity(order);
        for i in 0..order {
            let mut constituents: Vec<Arc<dyn Senone>> = Vec::new();
            for seq in &sequences {
                let senones = seq.senones();
                let senone = &senones[i.min(senones.len() - 1)];
                if !constituents.iter().any(|c| c.id() == senone.id()) {
                    constituents.push(senone.clone());
                }
            }
            states.push(Arc::new(CompositeSenone::new(constituents, 0.0)?));
        }

        let id = HmmId::new(table.next_id);
        table.next_id += 1;
        let hmm = Arc::new(SenoneHmm::new(
            id,
            base_unit.clone(),
            base_unit,
            Arc::new(SenoneSequence::new(states)),
            template.transition_matrix().clone(),
            position,
        )?);
        telemetry::record_composite_hmm();
        debug!("Built composite {} from {} senone sequences", hmm, sequences.len());
        table.hmms.insert((base, left, position), hmm.clone());
        Ok(hmm)
    }
}
