//! Phonetic units.
//!
//! A unit is a phone, either context-independent (a base unit such as `AE`)
//! or context-dependent (a triphone such as `AE[K,T]`). Units are interned by
//! [`UnitManager`] so that the same identity is shared across the whole model.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::constants::lextree::SILENCE_UNIT_NAME;
use crate::types::UnitId;

/// Phonetic context of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Context {
    /// No context: the unit is context-independent.
    Empty,
    /// Left and right neighbouring base units.
    LeftRight {
        left: Option<UnitId>,
        right: Option<UnitId>,
    },
}

impl Context {
    /// Build a left/right context; two absent sides collapse to [`Context::Empty`].
    pub fn left_right(left: Option<UnitId>, right: Option<UnitId>) -> Self {
        if left.is_none() && right.is_none() {
            Context::Empty
        } else {
            Context::LeftRight { left, right }
        }
    }
}

/// A phone identity.
#[derive(Debug, Clone)]
pub struct Unit {
    name: String,
    base_id: UnitId,
    filler: bool,
    silence: bool,
    context: Context,
}

impl Unit {
    /// Name of the base phone.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the context-independent unit this unit is derived from.
    pub fn base_id(&self) -> UnitId {
        self.base_id
    }

    /// Whether this is a filler (non-speech) unit.
    pub fn is_filler(&self) -> bool {
        self.filler
    }

    /// Whether this is the silence unit.
    pub fn is_silence(&self) -> bool {
        self.silence
    }

    /// The unit's context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Whether the unit carries a phonetic context.
    pub fn is_context_dependent(&self) -> bool {
        self.context != Context::Empty
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.base_id == other.base_id && self.context == other.context
    }
}

impl Eq for Unit {}

impl std::hash::Hash for Unit {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.base_id.hash(state);
        self.context.hash(state);
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Context::Empty => write!(f, "{}", self.name),
            Context::LeftRight { left, right } => {
                let side = |u: &Option<UnitId>| u.map(|id| id.to_string()).unwrap_or_else(|| "-".into());
                write!(f, "{}[{},{}]", self.name, side(left), side(right))
            }
        }
    }
}

/// Interns context-independent and context-dependent units.
#[derive(Debug, Clone)]
pub struct UnitManager {
    ci_units: Vec<Arc<Unit>>,
    by_name: HashMap<String, UnitId>,
    cd_units: HashMap<(UnitId, Context), Arc<Unit>>,
}

impl Default for UnitManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitManager {
    /// Create a manager holding only the silence unit.
    pub fn new() -> Self {
        let mut manager = Self {
            ci_units: Vec::new(),
            by_name: HashMap::new(),
            cd_units: HashMap::new(),
        };
        manager.get_or_create(SILENCE_UNIT_NAME, true);
        manager
    }

    /// Get or create the context-independent unit named `name`.
    pub fn get_or_create(&mut self, name: &str, filler: bool) -> Arc<Unit> {
        if let Some(id) = self.by_name.get(name) {
            return self.ci_units[id.value() as usize].clone();
        }
        let id = UnitId::new(self.ci_units.len() as u32);
        let unit = Arc::new(Unit {
            name: name.to_string(),
            base_id: id,
            filler,
            silence: name == SILENCE_UNIT_NAME,
            context: Context::Empty,
        });
        self.ci_units.push(unit.clone());
        self.by_name.insert(name.to_string(), id);
        unit
    }

    /// Look up a context-independent unit by name.
    pub fn get(&self, name: &str) -> Option<Arc<Unit>> {
        self.by_name
            .get(name)
            .map(|id| self.ci_units[id.value() as usize].clone())
    }

    /// Look up a context-independent unit by id.
    pub fn by_id(&self, id: UnitId) -> Option<&Arc<Unit>> {
        self.ci_units.get(id.value() as usize)
    }

    /// The silence unit.
    pub fn silence(&self) -> &Arc<Unit> {
        // created in `new`, always at index zero
        &self.ci_units[0]
    }

    /// Get or create the context-dependent version of `base`.
    pub fn get_context_unit(&mut self, base: &Unit, left: Option<UnitId>, right: Option<UnitId>) -> Arc<Unit> {
        let context = Context::left_right(left, right);
        if context == Context::Empty {
            return self.ci_units[base.base_id.value() as usize].clone();
        }
        self.cd_units
            .entry((base.base_id, context.clone()))
            .or_insert_with(|| {
                Arc::new(Unit {
                    name: base.name.clone(),
                    base_id: base.base_id,
                    filler: base.filler,
                    silence: base.silence,
                    context,
                })
            })
            .clone()
    }

    /// Number of context-independent units.
    pub fn len(&self) -> usize {
        self.ci_units.len()
    }

    /// Always false: the silence unit is always present.
    pub fn is_empty(&self) -> bool {
        self.ci_units.is_empty()
    }

    /// Iterate over the context-independent units in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Unit>> {
        self.ci_units.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_preinstalled() {
        let units = UnitManager::new();
        let sil = units.silence();
        assert_eq!(sil.name(), "SIL");
        assert!(sil.is_silence());
        assert!(sil.is_filler());
        assert_eq!(sil.base_id(), UnitId::new(0));
    }

    #[test]
    fn test_interning() {
        let mut units = UnitManager::new();
        let a = units.get_or_create("AE", false);
        let b = units.get_or_create("AE", false);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(units.len(), 2);
        assert!(units.get("K").is_none());
    }

    #[test]
    fn test_context_units() {
        let mut units = UnitManager::new();
        let k = units.get_or_create("K", false);
        let ae = units.get_or_create("AE", false);
        let t = units.get_or_create("T", false);

        let tri = units.get_context_unit(&ae, Some(k.base_id()), Some(t.base_id()));
        let again = units.get_context_unit(&ae, Some(k.base_id()), Some(t.base_id()));
        assert!(Arc::ptr_eq(&tri, &again));
        assert!(tri.is_context_dependent());
        assert_eq!(tri.base_id(), ae.base_id());
        assert_ne!(*tri, *ae);
        assert_eq!(tri.to_string(), "AE[unit_1,unit_3]");

        let ci = units.get_context_unit(&ae, None, None);
        assert!(Arc::ptr_eq(&ci, &ae));
    }
}
