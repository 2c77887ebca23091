//! Backing storage for Map and Set.
//!
//! SameValueZero keys via [`MapKey`], insertion order with tombstone-based
//! deletion so live iterators skip removed entries and still see appended ones.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::value::Value;

/// A value hashed and compared with SameValueZero
#[derive(Clone, Debug)]
pub struct MapKey(Value);

impl MapKey {
    /// Normalizes `-0` to `+0`
    pub fn new(value: Value) -> Self {
        match value {
            Value::Number(n) if n == 0.0 => Self(Value::Number(0.0)),
            other => Self(other),
        }
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.same_value_zero(&other.0)
    }
}

impl Eq for MapKey {}

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Undefined => 0u8.hash(state),
            Value::Null => 1u8.hash(state),
            Value::Boolean(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Number(n) => {
                3u8.hash(state);
                if n.is_nan() {
                    f64::NAN.to_bits().hash(state);
                } else {
                    n.to_bits().hash(state);
                }
            }
            Value::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Value::Symbol(s) => {
                5u8.hash(state);
                s.id.hash(state);
            }
            Value::Object(o) => {
                6u8.hash(state);
                (Arc::as_ptr(o) as usize).hash(state);
            }
        }
    }
}

struct MapDataInner {
    /// Insertion-ordered entries. `None` = tombstone.
    entries: Vec<Option<(MapKey, Value)>>,
    /// Key -> index in `entries`
    index: FxHashMap<MapKey, usize>,
    /// Count of live entries
    size: usize,
}

/// Internal storage for a `Map` (and a `Set`, whose values equal its keys)
pub struct MapData {
    inner: RwLock<MapDataInner>,
}

impl Default for MapData {
    fn default() -> Self {
        Self::new()
    }
}

impl MapData {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MapDataInner {
                entries: Vec::new(),
                index: FxHashMap::default(),
                size: 0,
            }),
        }
    }

    /// Number of live entries
    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    pub fn get(&self, key: &MapKey) -> Option<Value> {
        let inner = self.inner.read();
        let idx = *inner.index.get(key)?;
        match inner.entries.get(idx) {
            Some(Some((_, v))) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn has(&self, key: &MapKey) -> bool {
        self.inner.read().index.contains_key(key)
    }

    /// Insert or update. Returns `true` if this was an update.
    pub fn set(&self, key: MapKey, value: Value) -> bool {
        let mut inner = self.inner.write();
        if let Some(&idx) = inner.index.get(&key) {
            inner.entries[idx] = Some((key, value));
            true
        } else {
            let idx = inner.entries.len();
            inner.index.insert(key.clone(), idx);
            inner.entries.push(Some((key, value)));
            inner.size += 1;
            false
        }
    }

    /// Delete `key`. Returns `true` if it existed.
    pub fn delete(&self, key: &MapKey) -> bool {
        let mut inner = self.inner.write();
        match inner.index.remove(key) {
            Some(idx) => {
                inner.entries[idx] = None;
                inner.size -= 1;
                true
            }
            None => false,
        }
    }

    /// Remove all entries (iterators in progress see "done")
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        for entry in inner.entries.iter_mut() {
            *entry = None;
        }
        inner.index.clear();
        inner.size = 0;
    }

    /// Entry at `position`, or `None` for a tombstone or out of bounds
    pub fn entry_at(&self, position: usize) -> Option<(Value, Value)> {
        match self.inner.read().entries.get(position) {
            Some(Some((k, v))) => Some((k.value().clone(), v.clone())),
            _ => None,
        }
    }

    /// Length of the entries vector, tombstones included
    pub fn entries_len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Snapshot of live entries. The lock is released before callbacks run.
    pub fn live_entries(&self) -> Vec<(Value, Value)> {
        let inner = self.inner.read();
        inner
            .entries
            .iter()
            .flatten()
            .map(|(k, v)| (k.value().clone(), v.clone()))
            .collect()
    }
}

impl std::fmt::Debug for MapData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MapData(size={})", self.size())
    }
}
