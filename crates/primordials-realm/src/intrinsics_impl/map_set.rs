//! Map, Set and their iterator prototypes
//!
//! Both collections keep insertion order with tombstones (see `MapData`), so
//! an iterator created before a `delete` or `clear` keeps walking forward and
//! observes entries appended later.

use std::sync::Arc;

use parking_lot::Mutex;

use super::helpers::{alias_method, define_to_string_tag, species_getter};
use crate::builtin_builder::{BuiltInBuilder, NamespaceBuilder};
use crate::error::{VmError, VmResult};
use crate::function::arg;
use crate::intrinsics::InitContext;
use crate::iterator::{IterationKind, IteratorRecord, MapIteratorState};
use crate::map_data::{MapData, MapKey};
use crate::object::{JsObject, ObjectKind, PropertyKey};
use crate::realm::Realm;
use crate::value::Value;

pub(crate) fn init_map(
    cx: &InitContext<'_>,
    prototype: &Arc<JsObject>,
    _iterator_prototype: &Arc<JsObject>,
) -> Arc<JsObject> {
    let ctor = BuiltInBuilder::new(cx.fn_proto, prototype.clone(), "Map")
        .inherits(cx.object_prototype)
        .constructor_fn(map_construct, 0)
        .static_getter(&cx.symbols.species, species_getter)
        .method("get", map_get, 1)
        .method("set", map_set, 2)
        .method("has", map_has, 1)
        .method("delete", map_delete, 1)
        .method("clear", map_clear, 0)
        .method("forEach", map_for_each, 1)
        .method("entries", |realm, this, _args| {
            create_map_iterator(realm, this, IterationKind::Entries, "Map.prototype.entries")
        }, 0)
        .method("keys", |realm, this, _args| {
            create_map_iterator(realm, this, IterationKind::Keys, "Map.prototype.keys")
        }, 0)
        .method("values", |realm, this, _args| {
            create_map_iterator(realm, this, IterationKind::Values, "Map.prototype.values")
        }, 0)
        .getter("size", |_realm, this, _args| {
            Ok(Value::from(this_map(this, "get Map.prototype.size")?.size()))
        })
        .build();
    alias_method(prototype, "entries", PropertyKey::Symbol(cx.symbols.iterator.clone()));
    define_to_string_tag(prototype, &cx.symbols.to_string_tag, "Map");
    ctor
}

pub(crate) fn init_set(
    cx: &InitContext<'_>,
    prototype: &Arc<JsObject>,
    _iterator_prototype: &Arc<JsObject>,
) -> Arc<JsObject> {
    let ctor = BuiltInBuilder::new(cx.fn_proto, prototype.clone(), "Set")
        .inherits(cx.object_prototype)
        .constructor_fn(set_construct, 0)
        .static_getter(&cx.symbols.species, species_getter)
        .method("add", set_add, 1)
        .method("has", set_has, 1)
        .method("delete", set_delete, 1)
        .method("clear", set_clear, 0)
        .method("forEach", set_for_each, 1)
        .method("entries", |realm, this, _args| {
            create_map_iterator(realm, this, IterationKind::Entries, "Set.prototype.entries")
        }, 0)
        .method("values", |realm, this, _args| {
            create_map_iterator(realm, this, IterationKind::Values, "Set.prototype.values")
        }, 0)
        .getter("size", |_realm, this, _args| {
            Ok(Value::from(this_set(this, "get Set.prototype.size")?.size()))
        })
        .method("union", set_union, 1)
        .method("intersection", set_intersection, 1)
        .method("difference", set_difference, 1)
        .method("symmetricDifference", set_symmetric_difference, 1)
        .method("isSubsetOf", set_is_subset_of, 1)
        .method("isSupersetOf", set_is_superset_of, 1)
        .method("isDisjointFrom", set_is_disjoint_from, 1)
        .build();
    alias_method(prototype, "values", PropertyKey::string("keys"));
    alias_method(prototype, "values", PropertyKey::Symbol(cx.symbols.iterator.clone()));
    define_to_string_tag(prototype, &cx.symbols.to_string_tag, "Set");
    ctor
}

pub(crate) fn init_iterator_prototype(cx: &InitContext<'_>, prototype: &Arc<JsObject>, tag: &str) {
    NamespaceBuilder::new(cx.fn_proto, prototype.clone())
        .method("next", map_iterator_next, 0)
        .build();
    define_to_string_tag(prototype, &cx.symbols.to_string_tag, tag);
}

fn this_map<'a>(this: &'a Value, method: &str) -> VmResult<&'a MapData> {
    match this.as_object().map(|o| o.kind()) {
        Some(ObjectKind::Map(data)) => Ok(data),
        _ => Err(VmError::type_error(format!(
            "Method {method} called on incompatible receiver"
        ))),
    }
}

fn this_set<'a>(this: &'a Value, method: &str) -> VmResult<&'a MapData> {
    match this.as_object().map(|o| o.kind()) {
        Some(ObjectKind::Set(data)) => Ok(data),
        _ => Err(VmError::type_error(format!(
            "Method {method} called on incompatible receiver"
        ))),
    }
}

/// Feed `iterable` into a freshly constructed collection through its
/// (possibly user-replaced) adder method
fn add_entries_from_iterable(
    realm: &Realm,
    target: &Value,
    iterable: &Value,
    adder_name: &str,
    pairs: bool,
) -> VmResult<()> {
    let adder = realm.get(target, adder_name)?;
    if !adder.is_callable() {
        return Err(VmError::type_error(format!(
            "'{}' returned for property '{adder_name}' is not a function",
            realm.describe(&adder)
        )));
    }
    let mut record = realm.get_iterator(iterable)?;
    while let Some(item) = realm.iterator_step_value(&mut record)? {
        let result = if pairs {
            add_pair(realm, target, &adder, &item)
        } else {
            realm.call(&adder, target, &[item]).map(|_| ())
        };
        if let Err(error) = result {
            close_quietly(realm, &record);
            return Err(error);
        }
    }
    Ok(())
}

fn add_pair(realm: &Realm, target: &Value, adder: &Value, item: &Value) -> VmResult<()> {
    if !item.is_object() {
        return Err(VmError::type_error(format!(
            "Iterator value {} is not an entry object",
            realm.describe(item)
        )));
    }
    let key = realm.get(item, 0u32)?;
    let value = realm.get(item, 1u32)?;
    realm.call(adder, target, &[key, value])?;
    Ok(())
}

/// IteratorClose for an abrupt completion: the original error wins
fn close_quietly(realm: &Realm, record: &IteratorRecord) {
    if let Err(error) = realm.iterator_close(record) {
        tracing::trace!(%error, "error while closing iterator ignored");
    }
}

// ============================================================================
// Map
// ============================================================================

fn map_construct(realm: &Realm, args: &[Value], new_target: &Arc<JsObject>) -> VmResult<Value> {
    let map = realm.create_from_constructor(
        new_target,
        &realm.intrinsics().map_prototype,
        ObjectKind::Map(MapData::new()),
    )?;
    let map = Value::object(map);
    let iterable = arg(args, 0);
    if !iterable.is_nullish() {
        add_entries_from_iterable(realm, &map, &iterable, "set", true)?;
    }
    Ok(map)
}

fn map_get(_realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_map(this, "Map.prototype.get")?;
    Ok(data.get(&MapKey::new(arg(args, 0))).unwrap_or_default())
}

fn map_set(_realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_map(this, "Map.prototype.set")?;
    data.set(MapKey::new(arg(args, 0)), arg(args, 1));
    Ok(this.clone())
}

fn map_has(_realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_map(this, "Map.prototype.has")?;
    Ok(Value::boolean(data.has(&MapKey::new(arg(args, 0)))))
}

fn map_delete(_realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_map(this, "Map.prototype.delete")?;
    Ok(Value::boolean(data.delete(&MapKey::new(arg(args, 0)))))
}

fn map_clear(_realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    this_map(this, "Map.prototype.clear")?.clear();
    Ok(Value::undefined())
}

fn map_for_each(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_map(this, "Map.prototype.forEach")?;
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(VmError::type_error("Map.prototype.forEach: callback is not a function"));
    }
    let this_arg = arg(args, 1);
    let mut position = 0;
    while position < data.entries_len() {
        if let Some((key, value)) = data.entry_at(position) {
            realm.call(&callback, &this_arg, &[value, key, this.clone()])?;
        }
        position += 1;
    }
    Ok(Value::undefined())
}

// ============================================================================
// Set
// ============================================================================

fn set_construct(realm: &Realm, args: &[Value], new_target: &Arc<JsObject>) -> VmResult<Value> {
    let set = realm.create_from_constructor(
        new_target,
        &realm.intrinsics().set_prototype,
        ObjectKind::Set(MapData::new()),
    )?;
    let set = Value::object(set);
    let iterable = arg(args, 0);
    if !iterable.is_nullish() {
        add_entries_from_iterable(realm, &set, &iterable, "add", false)?;
    }
    Ok(set)
}

fn set_add(_realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_set(this, "Set.prototype.add")?;
    let key = MapKey::new(arg(args, 0));
    let value = key.value().clone();
    data.set(key, value);
    Ok(this.clone())
}

fn set_has(_realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_set(this, "Set.prototype.has")?;
    Ok(Value::boolean(data.has(&MapKey::new(arg(args, 0)))))
}

fn set_delete(_realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_set(this, "Set.prototype.delete")?;
    Ok(Value::boolean(data.delete(&MapKey::new(arg(args, 0)))))
}

fn set_clear(_realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    this_set(this, "Set.prototype.clear")?.clear();
    Ok(Value::undefined())
}

fn set_for_each(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_set(this, "Set.prototype.forEach")?;
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(VmError::type_error("Set.prototype.forEach: callback is not a function"));
    }
    let this_arg = arg(args, 1);
    let mut position = 0;
    while position < data.entries_len() {
        if let Some((key, _)) = data.entry_at(position) {
            realm.call(&callback, &this_arg, &[key.clone(), key, this.clone()])?;
        }
        position += 1;
    }
    Ok(Value::undefined())
}

// ============================================================================
// Set methods over set-like arguments
// ============================================================================

/// Set Record: the `size`, `has` and `keys` of a set-like argument, read once
struct SetRecord {
    set: Value,
    size: f64,
    has: Value,
    keys: Value,
}

impl SetRecord {
    fn contains(&self, realm: &Realm, value: &Value) -> VmResult<bool> {
        Ok(realm.call(&self.has, &self.set, &[value.clone()])?.to_boolean())
    }

    fn keys_iterator(&self, realm: &Realm) -> VmResult<IteratorRecord> {
        let iterator = realm.call(&self.keys, &self.set, &[])?;
        if !iterator.is_object() {
            return Err(VmError::type_error("keys() result is not an object"));
        }
        let next_method = realm.get(&iterator, "next")?;
        Ok(IteratorRecord {
            iterator,
            next_method,
            done: false,
        })
    }
}

/// GetSetRecord
fn get_set_record(realm: &Realm, other: &Value) -> VmResult<SetRecord> {
    if !other.is_object() {
        return Err(VmError::type_error(format!(
            "{} is not a set-like object",
            realm.describe(other)
        )));
    }
    let raw_size = realm.get(other, "size")?;
    let num_size = realm.to_number(&raw_size)?;
    if num_size.is_nan() {
        return Err(VmError::type_error("The 'size' property must be a number"));
    }
    let size = realm.to_integer_or_infinity(&Value::number(num_size))?;
    if size < 0.0 {
        return Err(VmError::range_error("The 'size' property must not be negative"));
    }
    let has = realm.get(other, "has")?;
    if !has.is_callable() {
        return Err(VmError::type_error("The 'has' property must be a function"));
    }
    let keys = realm.get(other, "keys")?;
    if !keys.is_callable() {
        return Err(VmError::type_error("The 'keys' property must be a function"));
    }
    Ok(SetRecord {
        set: other.clone(),
        size,
        has,
        keys,
    })
}

/// `-0` is stored as `+0`
fn canonicalize_key(value: Value) -> Value {
    match value {
        Value::Number(n) if n == 0.0 => Value::number(0.0),
        other => other,
    }
}

fn new_set_from(realm: &Realm, data: MapData) -> Value {
    Value::object(Arc::new(JsObject::with_kind(
        Some(realm.intrinsics().set_prototype.clone()),
        ObjectKind::Set(data),
    )))
}

fn copy_set_data(source: &MapData) -> MapData {
    let copy = MapData::new();
    for (key, value) in source.live_entries() {
        copy.set(MapKey::new(key), value);
    }
    copy
}

fn insert(data: &MapData, value: Value) {
    let value = canonicalize_key(value);
    data.set(MapKey::new(value.clone()), value);
}

/// Visit the live elements of `data` by position, re-reading the length so
/// that deletions made by user callbacks are honoured
fn for_each_element(
    data: &MapData,
    mut f: impl FnMut(Value) -> VmResult<bool>,
) -> VmResult<bool> {
    let mut position = 0;
    while position < data.entries_len() {
        if let Some((key, _)) = data.entry_at(position)
            && !f(key)?
        {
            return Ok(false);
        }
        position += 1;
    }
    Ok(true)
}

fn set_union(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_set(this, "Set.prototype.union")?;
    let other = get_set_record(realm, &arg(args, 0))?;
    let mut keys = other.keys_iterator(realm)?;
    let result = copy_set_data(data);
    while let Some(next) = realm.iterator_step_value(&mut keys)? {
        insert(&result, next);
    }
    Ok(new_set_from(realm, result))
}

fn set_intersection(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_set(this, "Set.prototype.intersection")?;
    let other = get_set_record(realm, &arg(args, 0))?;
    let result = MapData::new();
    if data.size() as f64 <= other.size {
        for_each_element(data, |element| {
            if other.contains(realm, &element)? {
                insert(&result, element);
            }
            Ok(true)
        })?;
    } else {
        let mut keys = other.keys_iterator(realm)?;
        while let Some(next) = realm.iterator_step_value(&mut keys)? {
            if data.has(&MapKey::new(next.clone())) {
                insert(&result, next);
            }
        }
    }
    Ok(new_set_from(realm, result))
}

fn set_difference(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_set(this, "Set.prototype.difference")?;
    let other = get_set_record(realm, &arg(args, 0))?;
    let result = copy_set_data(data);
    if data.size() as f64 <= other.size {
        for_each_element(data, |element| {
            if other.contains(realm, &element)? {
                result.delete(&MapKey::new(element));
            }
            Ok(true)
        })?;
    } else {
        let mut keys = other.keys_iterator(realm)?;
        while let Some(next) = realm.iterator_step_value(&mut keys)? {
            result.delete(&MapKey::new(next));
        }
    }
    Ok(new_set_from(realm, result))
}

fn set_symmetric_difference(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_set(this, "Set.prototype.symmetricDifference")?;
    let other = get_set_record(realm, &arg(args, 0))?;
    let mut keys = other.keys_iterator(realm)?;
    let result = copy_set_data(data);
    while let Some(next) = realm.iterator_step_value(&mut keys)? {
        let key = MapKey::new(canonicalize_key(next));
        if data.has(&key) {
            result.delete(&key);
        } else if !result.has(&key) {
            let value = key.value().clone();
            result.set(key, value);
        }
    }
    Ok(new_set_from(realm, result))
}

fn set_is_subset_of(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_set(this, "Set.prototype.isSubsetOf")?;
    let other = get_set_record(realm, &arg(args, 0))?;
    if data.size() as f64 > other.size {
        return Ok(Value::boolean(false));
    }
    let all = for_each_element(data, |element| other.contains(realm, &element))?;
    Ok(Value::boolean(all))
}

fn set_is_superset_of(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_set(this, "Set.prototype.isSupersetOf")?;
    let other = get_set_record(realm, &arg(args, 0))?;
    if (data.size() as f64) < other.size {
        return Ok(Value::boolean(false));
    }
    let mut keys = other.keys_iterator(realm)?;
    while let Some(next) = realm.iterator_step_value(&mut keys)? {
        if !data.has(&MapKey::new(next)) {
            close_quietly(realm, &keys);
            return Ok(Value::boolean(false));
        }
    }
    Ok(Value::boolean(true))
}

fn set_is_disjoint_from(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_set(this, "Set.prototype.isDisjointFrom")?;
    let other = get_set_record(realm, &arg(args, 0))?;
    if data.size() as f64 <= other.size {
        let disjoint = for_each_element(data, |element| Ok(!other.contains(realm, &element)?))?;
        return Ok(Value::boolean(disjoint));
    }
    let mut keys = other.keys_iterator(realm)?;
    while let Some(next) = realm.iterator_step_value(&mut keys)? {
        if data.has(&MapKey::new(next)) {
            close_quietly(realm, &keys);
            return Ok(Value::boolean(false));
        }
    }
    Ok(Value::boolean(true))
}

// ============================================================================
// %MapIteratorPrototype% / %SetIteratorPrototype%
// ============================================================================

fn create_map_iterator(
    realm: &Realm,
    this: &Value,
    kind: IterationKind,
    method: &str,
) -> VmResult<Value> {
    let (obj, proto) = match this.as_object() {
        Some(obj) if matches!(obj.kind(), ObjectKind::Map(_)) => {
            (obj.clone(), realm.intrinsics().map_iterator_prototype.clone())
        }
        Some(obj) if matches!(obj.kind(), ObjectKind::Set(_)) => {
            (obj.clone(), realm.intrinsics().set_iterator_prototype.clone())
        }
        _ => {
            return Err(VmError::type_error(format!(
                "Method {method} called on incompatible receiver"
            )));
        }
    };
    let iter = JsObject::with_kind(
        Some(proto),
        ObjectKind::MapIterator(Mutex::new(MapIteratorState {
            iterated: Some(obj),
            position: 0,
            kind,
        })),
    );
    Ok(Value::object(Arc::new(iter)))
}

fn map_iterator_next(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let Some(ObjectKind::MapIterator(state)) = this.as_object().map(|o| o.kind()) else {
        return Err(VmError::type_error(
            "next method called on incompatible receiver",
        ));
    };
    let mut state = state.lock();
    let Some(iterated) = state.iterated.clone() else {
        return Ok(realm.create_iter_result(Value::undefined(), true));
    };
    let (data, is_set) = match iterated.kind() {
        ObjectKind::Map(data) => (data, false),
        ObjectKind::Set(data) => (data, true),
        _ => return Err(VmError::internal("map iterator over a non-collection")),
    };
    while state.position < data.entries_len() {
        let position = state.position;
        state.position += 1;
        let Some((key, value)) = data.entry_at(position) else {
            continue;
        };
        let result = match (state.kind, is_set) {
            (IterationKind::Keys, _) | (IterationKind::Values, true) => key,
            (IterationKind::Values, false) => value,
            (IterationKind::Entries, _) => {
                let second = if is_set { key.clone() } else { value };
                Value::object(realm.new_array(vec![key, second]))
            }
        };
        drop(state);
        return Ok(realm.create_iter_result(result, false));
    }
    state.iterated = None;
    Ok(realm.create_iter_result(Value::undefined(), true))
}

#[cfg(test)]
mod tests {
    use crate::realm::Realm;
    use crate::value::Value;

    fn new_set(realm: &Realm, items: &[i32]) -> Value {
        let ctor = Value::object(realm.intrinsics().set_constructor.clone());
        let list = Value::object(realm.new_array(items.iter().map(|i| Value::from(*i)).collect()));
        realm.construct(&ctor, &[list], None).unwrap()
    }

    fn elements(realm: &Realm, set: &Value) -> Vec<f64> {
        realm
            .iterable_to_list(set)
            .unwrap()
            .iter()
            .map(|v| v.as_number().unwrap())
            .collect()
    }

    #[test]
    fn test_map_iteration_order_and_aliases() {
        let realm = Realm::new();
        let proto = Value::object(realm.intrinsics().map_prototype.clone());
        let entries = realm.get(&proto, "entries").unwrap();
        let iter = realm.get(&proto, &realm.intrinsics().symbols.iterator).unwrap();
        assert!(entries.strict_equals(&iter));

        let ctor = Value::object(realm.intrinsics().map_constructor.clone());
        let map = realm.construct(&ctor, &[], None).unwrap();
        realm.invoke(&map, "set", &[Value::from("b"), Value::from(2)]).unwrap();
        realm.invoke(&map, "set", &[Value::from("a"), Value::from(1)]).unwrap();
        let keys = realm.invoke(&map, "keys", &[]).unwrap();
        let keys = realm.iterable_to_list(&keys).unwrap();
        assert_eq!(keys[0].as_str(), Some("b"));
        assert_eq!(keys[1].as_str(), Some("a"));
        assert_eq!(realm.get(&map, "size").unwrap().as_number(), Some(2.0));
    }

    #[test]
    fn test_iterator_sees_entries_added_during_iteration() {
        let realm = Realm::new();
        let set = new_set(&realm, &[1]);
        let iter = realm.invoke(&set, "values", &[]).unwrap();
        let first = realm.invoke(&iter, "next", &[]).unwrap();
        assert_eq!(realm.get(&first, "value").unwrap().as_number(), Some(1.0));
        realm.invoke(&set, "add", &[Value::from(2)]).unwrap();
        let second = realm.invoke(&iter, "next", &[]).unwrap();
        assert_eq!(realm.get(&second, "value").unwrap().as_number(), Some(2.0));
    }

    #[test]
    fn test_set_algebra() {
        let realm = Realm::new();
        let a = new_set(&realm, &[1, 2, 3]);
        let b = new_set(&realm, &[2, 3, 4]);

        let union = realm.invoke(&a, "union", &[b.clone()]).unwrap();
        assert_eq!(elements(&realm, &union), vec![1.0, 2.0, 3.0, 4.0]);
        let inter = realm.invoke(&a, "intersection", &[b.clone()]).unwrap();
        assert_eq!(elements(&realm, &inter), vec![2.0, 3.0]);
        let diff = realm.invoke(&a, "difference", &[b.clone()]).unwrap();
        assert_eq!(elements(&realm, &diff), vec![1.0]);
        let sym = realm.invoke(&a, "symmetricDifference", &[b.clone()]).unwrap();
        assert_eq!(elements(&realm, &sym), vec![1.0, 4.0]);

        let small = new_set(&realm, &[2]);
        assert_eq!(realm.invoke(&small, "isSubsetOf", &[a.clone()]).unwrap().as_boolean(), Some(true));
        assert_eq!(realm.invoke(&a, "isSupersetOf", &[small.clone()]).unwrap().as_boolean(), Some(true));
        let far = new_set(&realm, &[9]);
        assert_eq!(realm.invoke(&a, "isDisjointFrom", &[far]).unwrap().as_boolean(), Some(true));
    }

    #[test]
    fn test_set_like_argument_requires_size() {
        let realm = Realm::new();
        let a = new_set(&realm, &[1]);
        let bogus = Value::object(realm.new_object());
        assert!(realm.invoke(&a, "union", &[bogus]).is_err());
    }
}
