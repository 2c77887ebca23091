//! Array constructor, Array.prototype and %ArrayIteratorPrototype%
//!
//! Prototype methods are generic: they read `length` and elements through
//! `[[Get]]`, so they also work on array-likes.

use std::sync::Arc;

use parking_lot::Mutex;

use super::helpers::{alias_method, define_to_string_tag, relative_index, species_getter};
use crate::builtin_builder::{BuiltInBuilder, NamespaceBuilder};
use crate::error::{VmError, VmResult};
use crate::function::arg;
use crate::intrinsics::InitContext;
use crate::iterator::{ArrayIteratorState, IterationKind};
use crate::object::{JsObject, ObjectKind, PropertyKey, array_length, check_list_length, holes};
use crate::realm::Realm;
use crate::value::Value;

pub(crate) fn init(
    cx: &InitContext<'_>,
    prototype: &Arc<JsObject>,
    _iterator_prototype: &Arc<JsObject>,
) -> Arc<JsObject> {
    let ctor = BuiltInBuilder::new(cx.fn_proto, prototype.clone(), "Array")
        .inherits(cx.object_prototype)
        .constructor_fn(array_construct, 1)
        .call_fn(|realm, _this, args| array_construct(realm, args, &realm.intrinsics().array_constructor))
        .static_method("isArray", array_is_array, 1)
        .static_method("of", array_of, 0)
        .static_method("from", array_from, 1)
        .static_getter(&cx.symbols.species, species_getter)
        .method("push", array_push, 1)
        .method("pop", array_pop, 0)
        .method("join", array_join, 1)
        .method("slice", array_slice, 2)
        .method("indexOf", array_index_of, 1)
        .method("includes", array_includes, 1)
        .method("forEach", array_for_each, 1)
        .method("map", array_map, 1)
        .method("keys", |realm, this, _args| {
            create_array_iterator(realm, this, IterationKind::Keys)
        }, 0)
        .method("values", |realm, this, _args| {
            create_array_iterator(realm, this, IterationKind::Values)
        }, 0)
        .method("entries", |realm, this, _args| {
            create_array_iterator(realm, this, IterationKind::Entries)
        }, 0)
        .method("toString", array_to_string, 0)
        .build();
    alias_method(prototype, "values", PropertyKey::Symbol(cx.symbols.iterator.clone()));
    ctor
}

pub(crate) fn init_iterator_prototype(cx: &InitContext<'_>, prototype: &Arc<JsObject>) {
    NamespaceBuilder::new(cx.fn_proto, prototype.clone())
        .method("next", array_iterator_next, 0)
        .build();
    define_to_string_tag(prototype, &cx.symbols.to_string_tag, "Array Iterator");
}

// ============================================================================
// Constructor and statics
// ============================================================================

fn array_construct(realm: &Realm, args: &[Value], new_target: &Arc<JsObject>) -> VmResult<Value> {
    let elements = match args {
        [len @ Value::Number(_)] => holes(array_length(len)?)?,
        _ => args.to_vec(),
    };
    let arr = realm.create_from_constructor(
        new_target,
        &realm.intrinsics().array_prototype,
        ObjectKind::Array(parking_lot::RwLock::new(elements)),
    )?;
    Ok(Value::object(arr))
}

fn array_is_array(_realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    Ok(Value::boolean(
        arg(args, 0).as_object().is_some_and(|o| o.is_array()),
    ))
}

fn array_of(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    Ok(Value::object(realm.new_array(args.to_vec())))
}

/// Array.from(items, mapFn?)
fn array_from(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let items = arg(args, 0);
    let map_fn = arg(args, 1);
    if !map_fn.is_undefined() && !map_fn.is_callable() {
        return Err(VmError::type_error("Array.from: mapper is not a function"));
    }
    let using_iterator = realm.get_method(&items, &realm.intrinsics().symbols.iterator)?;
    let values = match using_iterator {
        Some(method) => {
            let mut record = realm.get_iterator_from_method(&items, &method)?;
            let mut values = Vec::new();
            while let Some(v) = realm.iterator_step_value(&mut record)? {
                values.push(v);
            }
            values
        }
        None => {
            let len = realm.list_length_of_array_like(&items)?;
            (0..len)
                .map(|i| realm.get(&items, i))
                .collect::<VmResult<Vec<_>>>()?
        }
    };
    let values = if map_fn.is_callable() {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| realm.call(&map_fn, &Value::undefined(), &[v, Value::from(i)]))
            .collect::<VmResult<Vec<_>>>()?
    } else {
        values
    };
    Ok(Value::object(realm.new_array(values)))
}

// ============================================================================
// Array.prototype
// ============================================================================

fn array_push(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    realm.require_object_coercible(this, "Array.prototype.push")?;
    let mut len = realm.length_of_array_like(this)?;
    for value in args {
        realm.put(this, len, value.clone())?;
        len += 1;
    }
    realm.put(this, "length", Value::from(len))?;
    Ok(Value::from(len))
}

fn array_pop(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    realm.require_object_coercible(this, "Array.prototype.pop")?;
    let len = realm.length_of_array_like(this)?;
    if len == 0 {
        realm.put(this, "length", Value::from(0))?;
        return Ok(Value::undefined());
    }
    let index = len - 1;
    let element = realm.get(this, index)?;
    if let Some(obj) = this.as_object()
        && !obj.delete(&PropertyKey::from(index))
    {
        return Err(VmError::type_error("Cannot delete array element"));
    }
    realm.put(this, "length", Value::from(index))?;
    Ok(element)
}

fn array_join(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    realm.require_object_coercible(this, "Array.prototype.join")?;
    let len = realm.length_of_array_like(this)?;
    let separator = match arg(args, 0) {
        Value::Undefined => Arc::from(","),
        sep => realm.to_string(&sep)?,
    };
    let mut out = String::new();
    for i in 0..len {
        if i > 0 {
            out.push_str(&separator);
        }
        let element = realm.get(this, i)?;
        if !element.is_nullish() {
            out.push_str(&realm.to_string(&element)?);
        }
    }
    Ok(Value::from(out))
}

fn array_slice(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    realm.require_object_coercible(this, "Array.prototype.slice")?;
    let len = realm.length_of_array_like(this)?;
    let start = relative_index(realm.to_integer_or_infinity(&arg(args, 0))?, len);
    let end = match arg(args, 1) {
        Value::Undefined => len,
        end => relative_index(realm.to_integer_or_infinity(&end)?, len),
    };
    check_list_length(end.saturating_sub(start))?;
    let values = (start..end.max(start))
        .map(|i| realm.get(this, i))
        .collect::<VmResult<Vec<_>>>()?;
    Ok(Value::object(realm.new_array(values)))
}

fn search_start(realm: &Realm, from: &Value, len: usize) -> VmResult<usize> {
    let n = realm.to_integer_or_infinity(from)?;
    Ok(relative_index(n, len))
}

fn array_index_of(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    realm.require_object_coercible(this, "Array.prototype.indexOf")?;
    let len = realm.length_of_array_like(this)?;
    let target = arg(args, 0);
    for i in search_start(realm, &arg(args, 1), len)?..len {
        if realm.get(this, i)?.strict_equals(&target) {
            return Ok(Value::from(i));
        }
    }
    Ok(Value::number(-1.0))
}

fn array_includes(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    realm.require_object_coercible(this, "Array.prototype.includes")?;
    let len = realm.length_of_array_like(this)?;
    let target = arg(args, 0);
    for i in search_start(realm, &arg(args, 1), len)?..len {
        if realm.get(this, i)?.same_value_zero(&target) {
            return Ok(Value::boolean(true));
        }
    }
    Ok(Value::boolean(false))
}

fn array_for_each(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(VmError::type_error("Array.prototype.forEach: callback is not a function"));
    }
    let len = realm.length_of_array_like(this)?;
    for i in 0..len {
        let element = realm.get(this, i)?;
        realm.call(&callback, &arg(args, 1), &[element, Value::from(i), this.clone()])?;
    }
    Ok(Value::undefined())
}

fn array_map(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(VmError::type_error("Array.prototype.map: callback is not a function"));
    }
    let len = realm.list_length_of_array_like(this)?;
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let element = realm.get(this, i)?;
        out.push(realm.call(&callback, &arg(args, 1), &[element, Value::from(i), this.clone()])?);
    }
    Ok(Value::object(realm.new_array(out)))
}

fn array_to_string(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let join = realm.get(this, "join")?;
    if join.is_callable() {
        return realm.call(&join, this, &[]);
    }
    Ok(Value::from("[object Array]"))
}

// ============================================================================
// %ArrayIteratorPrototype%
// ============================================================================

/// CreateArrayIterator
pub(crate) fn create_array_iterator(
    realm: &Realm,
    iterated: &Value,
    kind: IterationKind,
) -> VmResult<Value> {
    realm.require_object_coercible(iterated, "Array iterator")?;
    let iter = JsObject::with_kind(
        Some(realm.intrinsics().array_iterator_prototype.clone()),
        ObjectKind::ArrayIterator(Mutex::new(ArrayIteratorState {
            iterated: Some(iterated.clone()),
            index: 0,
            kind,
        })),
    );
    Ok(Value::object(Arc::new(iter)))
}

fn array_iterator_next(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let Some(ObjectKind::ArrayIterator(state)) = this.as_object().map(|o| o.kind()) else {
        return Err(VmError::type_error(
            "%ArrayIteratorPrototype%.next requires that 'this' be an Array Iterator",
        ));
    };
    let (iterated, index, kind) = {
        let state = state.lock();
        match &state.iterated {
            Some(v) => (v.clone(), state.index, state.kind),
            None => return Ok(realm.create_iter_result(Value::undefined(), true)),
        }
    };

    let len = match iterated.as_object() {
        Some(obj) if obj.is_array() => obj.array_len(),
        _ => realm.length_of_array_like(&iterated)?,
    };
    if index >= len {
        state.lock().iterated = None;
        return Ok(realm.create_iter_result(Value::undefined(), true));
    }
    state.lock().index = index + 1;

    let result = match kind {
        IterationKind::Keys => Value::from(index),
        IterationKind::Values => realm.get(&iterated, index)?,
        IterationKind::Entries => {
            let value = realm.get(&iterated, index)?;
            Value::object(realm.new_array(vec![Value::from(index), value]))
        }
    };
    Ok(realm.create_iter_result(result, false))
}
