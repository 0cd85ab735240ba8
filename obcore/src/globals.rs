//! The process-wide global slot registry.
//!
//! Named mutable slots shared across every translation unit in the process.
//! The registry hands out shared handles on read, so concurrent readers of
//! the same slot observe the identical value until a writer replaces it.
use std::{collections::BTreeMap, sync::Arc};

use log::trace;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::class::SlotValue;

static GLOBAL_SLOTS: Lazy<SlotRegistry> = Lazy::new(SlotRegistry::new);

/// The process-wide registry. Use this for anything that must be visible
/// across translation units; unit-local state belongs in object slots.
pub fn global_slots() -> &'static SlotRegistry {
    &GLOBAL_SLOTS
}

/// A thread-safe name-to-value slot table.
///
/// Reads share the stored value by handle rather than cloning it; writes
/// replace the handle wholesale, never mutate through it.
#[derive(Debug, Default)]
pub struct SlotRegistry {
    slots: RwLock<BTreeMap<String, Arc<SlotValue>>>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `name`, if the slot has ever been set.
    pub fn get(&self, name: &str) -> Option<Arc<SlotValue>> {
        self.slots.read().get(name).cloned()
    }

    /// Set `name`, replacing any previous value. Readers holding the old
    /// handle keep observing the old value.
    pub fn set(&self, name: impl Into<String>, value: SlotValue) {
        let name = name.into();
        trace!("global slot '{}' set", name);
        self.slots.write().insert(name, Arc::new(value));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_slot_reads_back_as_none() {
        let registry = SlotRegistry::new();
        assert!(registry.get("missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn set_then_get_round_trips() {
        let registry = SlotRegistry::new();
        registry.set("counter", SlotValue::Int(3));
        assert_eq!(*registry.get("counter").unwrap(), SlotValue::Int(3));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn readers_share_one_handle() {
        let registry = SlotRegistry::new();
        registry.set("shared", SlotValue::Str("x".to_string()));
        let a = registry.get("shared").unwrap();
        let b = registry.get("shared").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        registry.set("shared", SlotValue::Str("y".to_string()));
        let c = registry.get("shared").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        // The old handle still sees the value it was handed.
        assert_eq!(*a, SlotValue::Str("x".to_string()));
    }
}
