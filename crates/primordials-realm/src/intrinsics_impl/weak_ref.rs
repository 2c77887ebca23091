//! WeakMap, WeakSet, WeakRef and FinalizationRegistry

use std::sync::Arc;

use super::helpers::define_to_string_tag;
use crate::builtin_builder::BuiltInBuilder;
use crate::error::{VmError, VmResult};
use crate::function::arg;
use crate::intrinsics::InitContext;
use crate::object::{JsObject, ObjectKind};
use crate::realm::Realm;
use crate::value::Value;
use crate::weak::{FinalizationRegistryData, WeakRefCell, WeakTable};

pub(crate) fn init_weak_map(cx: &InitContext<'_>, prototype: &Arc<JsObject>) -> Arc<JsObject> {
    let ctor = BuiltInBuilder::new(cx.fn_proto, prototype.clone(), "WeakMap")
        .inherits(cx.object_prototype)
        .constructor_fn(weak_map_construct, 0)
        .method("get", |_realm, this, args| {
            let table = this_weak_map(this, "WeakMap.prototype.get")?;
            Ok(arg(args, 0)
                .as_object()
                .and_then(|key| table.get(key))
                .unwrap_or_default())
        }, 1)
        .method("set", |realm, this, args| {
            let table = this_weak_map(this, "WeakMap.prototype.set")?;
            let key = weak_key(realm, &arg(args, 0))?;
            table.set(&key, arg(args, 1));
            Ok(this.clone())
        }, 2)
        .method("has", |_realm, this, args| {
            let table = this_weak_map(this, "WeakMap.prototype.has")?;
            Ok(Value::boolean(arg(args, 0).as_object().is_some_and(|k| table.has(k))))
        }, 1)
        .method("delete", |_realm, this, args| {
            let table = this_weak_map(this, "WeakMap.prototype.delete")?;
            Ok(Value::boolean(arg(args, 0).as_object().is_some_and(|k| table.delete(k))))
        }, 1)
        .build();
    define_to_string_tag(prototype, &cx.symbols.to_string_tag, "WeakMap");
    ctor
}

pub(crate) fn init_weak_set(cx: &InitContext<'_>, prototype: &Arc<JsObject>) -> Arc<JsObject> {
    let ctor = BuiltInBuilder::new(cx.fn_proto, prototype.clone(), "WeakSet")
        .inherits(cx.object_prototype)
        .constructor_fn(weak_set_construct, 0)
        .method("add", |realm, this, args| {
            let table = this_weak_set(this, "WeakSet.prototype.add")?;
            let key = weak_key(realm, &arg(args, 0))?;
            table.set(&key, Value::undefined());
            Ok(this.clone())
        }, 1)
        .method("has", |_realm, this, args| {
            let table = this_weak_set(this, "WeakSet.prototype.has")?;
            Ok(Value::boolean(arg(args, 0).as_object().is_some_and(|k| table.has(k))))
        }, 1)
        .method("delete", |_realm, this, args| {
            let table = this_weak_set(this, "WeakSet.prototype.delete")?;
            Ok(Value::boolean(arg(args, 0).as_object().is_some_and(|k| table.delete(k))))
        }, 1)
        .build();
    define_to_string_tag(prototype, &cx.symbols.to_string_tag, "WeakSet");
    ctor
}

pub(crate) fn init_weak_ref(cx: &InitContext<'_>, prototype: &Arc<JsObject>) -> Arc<JsObject> {
    let ctor = BuiltInBuilder::new(cx.fn_proto, prototype.clone(), "WeakRef")
        .inherits(cx.object_prototype)
        .constructor_fn(weak_ref_construct, 1)
        .method("deref", weak_ref_deref, 0)
        .build();
    define_to_string_tag(prototype, &cx.symbols.to_string_tag, "WeakRef");
    ctor
}

pub(crate) fn init_finalization_registry(
    cx: &InitContext<'_>,
    prototype: &Arc<JsObject>,
) -> Arc<JsObject> {
    let ctor = BuiltInBuilder::new(cx.fn_proto, prototype.clone(), "FinalizationRegistry")
        .inherits(cx.object_prototype)
        .constructor_fn(finalization_registry_construct, 1)
        .method("register", finalization_registry_register, 2)
        .method("unregister", finalization_registry_unregister, 1)
        .build();
    define_to_string_tag(prototype, &cx.symbols.to_string_tag, "FinalizationRegistry");
    ctor
}

/// CanBeHeldWeakly: objects only
fn weak_key(realm: &Realm, value: &Value) -> VmResult<Arc<JsObject>> {
    value.as_object().cloned().ok_or_else(|| {
        VmError::type_error(format!("Invalid value used as weak key: {}", realm.describe(value)))
    })
}

fn incompatible(method: &str) -> VmError {
    VmError::type_error(format!("Method {method} called on incompatible receiver"))
}

fn this_weak_map<'a>(this: &'a Value, method: &str) -> VmResult<&'a WeakTable> {
    match this.as_object().map(|o| o.kind()) {
        Some(ObjectKind::WeakMap(table)) => Ok(table),
        _ => Err(incompatible(method)),
    }
}

fn this_weak_set<'a>(this: &'a Value, method: &str) -> VmResult<&'a WeakTable> {
    match this.as_object().map(|o| o.kind()) {
        Some(ObjectKind::WeakSet(table)) => Ok(table),
        _ => Err(incompatible(method)),
    }
}

fn weak_map_construct(realm: &Realm, args: &[Value], new_target: &Arc<JsObject>) -> VmResult<Value> {
    let map = Value::object(realm.create_from_constructor(
        new_target,
        &realm.intrinsics().weak_map_prototype,
        ObjectKind::WeakMap(WeakTable::new()),
    )?);
    let iterable = arg(args, 0);
    if !iterable.is_nullish() {
        let adder = realm.get(&map, "set")?;
        for entry in realm.iterable_to_list(&iterable)? {
            if !entry.is_object() {
                return Err(VmError::type_error("Iterator value is not an entry object"));
            }
            let key = realm.get(&entry, 0u32)?;
            let value = realm.get(&entry, 1u32)?;
            realm.call(&adder, &map, &[key, value])?;
        }
    }
    Ok(map)
}

fn weak_set_construct(realm: &Realm, args: &[Value], new_target: &Arc<JsObject>) -> VmResult<Value> {
    let set = Value::object(realm.create_from_constructor(
        new_target,
        &realm.intrinsics().weak_set_prototype,
        ObjectKind::WeakSet(WeakTable::new()),
    )?);
    let iterable = arg(args, 0);
    if !iterable.is_nullish() {
        let adder = realm.get(&set, "add")?;
        for value in realm.iterable_to_list(&iterable)? {
            realm.call(&adder, &set, &[value])?;
        }
    }
    Ok(set)
}

fn weak_ref_construct(realm: &Realm, args: &[Value], new_target: &Arc<JsObject>) -> VmResult<Value> {
    let target = arg(args, 0);
    let Some(target) = target.as_object() else {
        return Err(VmError::type_error("WeakRef: target must be an object"));
    };
    let weak_ref = realm.create_from_constructor(
        new_target,
        &realm.intrinsics().weak_ref_prototype,
        ObjectKind::WeakRef(WeakRefCell::new(target)),
    )?;
    Ok(Value::object(weak_ref))
}

fn weak_ref_deref(_realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    match this.as_object().map(|o| o.kind()) {
        Some(ObjectKind::WeakRef(cell)) => Ok(cell.deref().map_or(Value::undefined(), Value::object)),
        _ => Err(incompatible("WeakRef.prototype.deref")),
    }
}

fn finalization_registry_construct(
    realm: &Realm,
    args: &[Value],
    new_target: &Arc<JsObject>,
) -> VmResult<Value> {
    let cleanup = arg(args, 0);
    if !cleanup.is_callable() {
        return Err(VmError::type_error(
            "FinalizationRegistry: cleanup must be callable",
        ));
    }
    let registry = realm.create_from_constructor(
        new_target,
        &realm.intrinsics().finalization_registry_prototype,
        ObjectKind::FinalizationRegistry(FinalizationRegistryData::new(cleanup)),
    )?;
    realm.register_finalization_registry(&registry);
    Ok(Value::object(registry))
}

fn this_registry<'a>(this: &'a Value, method: &str) -> VmResult<&'a FinalizationRegistryData> {
    match this.as_object().map(|o| o.kind()) {
        Some(ObjectKind::FinalizationRegistry(data)) => Ok(data),
        _ => Err(incompatible(method)),
    }
}

fn finalization_registry_register(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_registry(this, "FinalizationRegistry.prototype.register")?;
    let target = weak_key(realm, &arg(args, 0))?;
    let held = arg(args, 1);
    if held.as_object().is_some_and(|h| Arc::ptr_eq(h, &target)) {
        return Err(VmError::type_error(
            "FinalizationRegistry.prototype.register: target and holdings must not be same",
        ));
    }
    let token = match arg(args, 2) {
        Value::Undefined => None,
        Value::Object(token) => Some(token),
        other => {
            return Err(VmError::type_error(format!(
                "Invalid unregisterToken: {}",
                realm.describe(&other)
            )));
        }
    };
    data.register(&target, held, token.as_ref());
    Ok(Value::undefined())
}

fn finalization_registry_unregister(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_registry(this, "FinalizationRegistry.prototype.unregister")?;
    let token = arg(args, 0);
    let Some(token) = token.as_object() else {
        return Err(VmError::type_error(format!(
            "Invalid unregisterToken: {}",
            realm.describe(&token)
        )));
    };
    Ok(Value::boolean(data.unregister(token)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::realm::Realm;
    use crate::value::Value;

    #[test]
    fn test_weak_map_rejects_primitive_keys() {
        let realm = Realm::new();
        let ctor = Value::object(realm.intrinsics().weak_map_constructor.clone());
        let map = realm.construct(&ctor, &[], None).unwrap();
        let err = realm.invoke(&map, "set", &[Value::from(1), Value::from(2)]);
        assert!(err.is_err());
    }

    #[test]
    fn test_weak_ref_deref_after_drop() {
        let realm = Realm::new();
        let ctor = Value::object(realm.intrinsics().weak_ref_constructor.clone());
        let target = Value::object(realm.new_object());
        let weak_ref = realm.construct(&ctor, &[target.clone()], None).unwrap();
        assert!(realm.invoke(&weak_ref, "deref", &[]).unwrap().strict_equals(&target));
        drop(target);
        assert!(realm.invoke(&weak_ref, "deref", &[]).unwrap().is_undefined());
    }

    #[test]
    fn test_finalization_cleanup_runs_for_dropped_target() {
        let realm = Realm::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let cleanup = realm.new_function("cleanup", 1, move |_realm, _this, args| {
            sink.lock().push(args[0].clone());
            Ok(Value::undefined())
        });
        let ctor = Value::object(realm.intrinsics().finalization_registry_constructor.clone());
        let registry = realm.construct(&ctor, &[cleanup], None).unwrap();

        let target = Value::object(realm.new_object());
        realm
            .invoke(&registry, "register", &[target.clone(), Value::from("held")])
            .unwrap();
        assert_eq!(realm.cleanup_finalization_registries(), 0);
        drop(target);
        assert_eq!(realm.cleanup_finalization_registries(), 1);
        realm.run_jobs().unwrap();
        assert_eq!(seen.lock()[0].as_str(), Some("held"));
    }
}
