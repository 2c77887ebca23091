//! WeakMap / WeakSet / WeakRef / FinalizationRegistry storage.
//!
//! Targets are held through `Weak<JsObject>` so they never keep their target
//! alive. Weak tables are keyed by object address; an entry whose key has been
//! dropped is pruned before its address can be reused.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::microtask::Job;
use crate::object::{JsObject, ObjectKind};
use crate::realm::Realm;
use crate::value::Value;

fn address(obj: &Arc<JsObject>) -> usize {
    Arc::as_ptr(obj) as usize
}

/// Backing table for WeakMap (and WeakSet, with `undefined` values)
#[derive(Default)]
pub struct WeakTable {
    entries: Mutex<FxHashMap<usize, (Weak<JsObject>, Value)>>,
}

impl WeakTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_entry<'a>(
        entries: &'a FxHashMap<usize, (Weak<JsObject>, Value)>,
        key: &Arc<JsObject>,
    ) -> Option<&'a Value> {
        let (weak, value) = entries.get(&address(key))?;
        (weak.strong_count() > 0).then_some(value)
    }

    pub fn get(&self, key: &Arc<JsObject>) -> Option<Value> {
        Self::live_entry(&self.entries.lock(), key).cloned()
    }

    pub fn has(&self, key: &Arc<JsObject>) -> bool {
        Self::live_entry(&self.entries.lock(), key).is_some()
    }

    pub fn set(&self, key: &Arc<JsObject>, value: Value) {
        let mut entries = self.entries.lock();
        entries.retain(|_, (weak, _)| weak.strong_count() > 0);
        entries.insert(address(key), (Arc::downgrade(key), value));
    }

    pub fn delete(&self, key: &Arc<JsObject>) -> bool {
        let mut entries = self.entries.lock();
        let live = Self::live_entry(&entries, key).is_some();
        entries.remove(&address(key));
        live
    }

    /// Number of entries whose key is still alive
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|(weak, _)| weak.strong_count() > 0)
            .count()
    }
}

/// `[[WeakRefTarget]]`
pub struct WeakRefCell {
    target: Weak<JsObject>,
}

impl WeakRefCell {
    pub fn new(target: &Arc<JsObject>) -> Self {
        Self {
            target: Arc::downgrade(target),
        }
    }

    /// WeakRefDeref
    pub fn deref(&self) -> Option<Arc<JsObject>> {
        self.target.upgrade()
    }
}

struct FinalizationCell {
    target: Weak<JsObject>,
    held_value: Value,
    unregister_token: Option<Weak<JsObject>>,
}

/// `[[Cells]]` and `[[CleanupCallback]]` of a FinalizationRegistry
pub struct FinalizationRegistryData {
    cleanup: Value,
    cells: Mutex<Vec<FinalizationCell>>,
}

impl FinalizationRegistryData {
    pub fn new(cleanup: Value) -> Self {
        Self {
            cleanup,
            cells: Mutex::new(Vec::new()),
        }
    }

    pub fn cleanup_callback(&self) -> &Value {
        &self.cleanup
    }

    pub fn register(&self, target: &Arc<JsObject>, held_value: Value, token: Option<&Arc<JsObject>>) {
        self.cells.lock().push(FinalizationCell {
            target: Arc::downgrade(target),
            held_value,
            unregister_token: token.map(Arc::downgrade),
        });
    }

    /// Remove every cell registered with `token`. Returns whether any was removed.
    pub fn unregister(&self, token: &Arc<JsObject>) -> bool {
        let mut cells = self.cells.lock();
        let before = cells.len();
        cells.retain(|cell| {
            !cell
                .unregister_token
                .as_ref()
                .and_then(Weak::upgrade)
                .is_some_and(|t| Arc::ptr_eq(&t, token))
        });
        cells.len() != before
    }

    /// Remove cells whose target has been dropped, returning their held values
    pub fn take_dead(&self) -> Vec<Value> {
        let mut cells = self.cells.lock();
        let mut dead = Vec::new();
        cells.retain(|cell| {
            if cell.target.strong_count() == 0 {
                dead.push(cell.held_value.clone());
                false
            } else {
                true
            }
        });
        dead
    }

    pub fn len(&self) -> usize {
        self.cells.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Realm {
    /// Queue cleanup jobs for every registered cell whose target is gone.
    /// Returns the number of jobs queued.
    pub fn cleanup_finalization_registries(&self) -> usize {
        let registries = self.live_finalization_registries();
        let mut queued = 0;
        for registry in registries {
            let ObjectKind::FinalizationRegistry(data) = registry.kind() else {
                continue;
            };
            for held in data.take_dead() {
                let callback = data.cleanup_callback().clone();
                self.enqueue_job(Job::Host(Box::new(move |realm| {
                    realm.call(&callback, &Value::undefined(), &[held])?;
                    Ok(())
                })));
                queued += 1;
            }
        }
        if queued > 0 {
            tracing::debug!(queued, "finalization cleanup jobs queued");
        }
        queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_table_does_not_retain_keys() {
        let table = WeakTable::new();
        let key = Arc::new(JsObject::new(None));
        table.set(&key, Value::from(1));
        assert_eq!(table.get(&key), Some(Value::from(1)));
        assert_eq!(table.live_count(), 1);
        drop(key);
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn test_weak_ref_deref() {
        let target = Arc::new(JsObject::new(None));
        let cell = WeakRefCell::new(&target);
        assert!(cell.deref().is_some());
        drop(target);
        assert!(cell.deref().is_none());
    }

    #[test]
    fn test_registry_take_dead_and_unregister() {
        let data = FinalizationRegistryData::new(Value::undefined());
        let target = Arc::new(JsObject::new(None));
        let other = Arc::new(JsObject::new(None));
        let token = Arc::new(JsObject::new(None));
        data.register(&target, Value::from("held"), None);
        data.register(&other, Value::from("other"), Some(&token));

        assert!(data.take_dead().is_empty());
        drop(target);
        assert_eq!(data.take_dead(), vec![Value::from("held")]);

        assert!(data.unregister(&token));
        assert!(data.is_empty());
        assert!(!data.unregister(&token));
    }
}
