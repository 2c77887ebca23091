//! The `Reflect` namespace

use std::sync::Arc;

use super::helpers::define_to_string_tag;
use super::object::to_property_descriptor;
use crate::builtin_builder::NamespaceBuilder;
use crate::error::{VmError, VmResult};
use crate::function::arg;
use crate::intrinsics::InitContext;
use crate::object::JsObject;
use crate::realm::Realm;
use crate::value::Value;

pub(crate) fn init(cx: &InitContext<'_>, reflect: &Arc<JsObject>) {
    NamespaceBuilder::new(cx.fn_proto, reflect.clone())
        .method("apply", reflect_apply, 3)
        .method("construct", reflect_construct, 2)
        .method("defineProperty", reflect_define_property, 3)
        .method("get", reflect_get, 2)
        .method("getPrototypeOf", reflect_get_prototype_of, 1)
        .method("has", reflect_has, 2)
        .method("ownKeys", reflect_own_keys, 1)
        .method("set", reflect_set, 3)
        .method("setPrototypeOf", reflect_set_prototype_of, 2)
        .build();
    define_to_string_tag(reflect, &cx.symbols.to_string_tag, "Reflect");
}

fn target_object<'a>(target: &'a Value, method: &str) -> VmResult<&'a Arc<JsObject>> {
    target
        .as_object()
        .ok_or_else(|| VmError::type_error(format!("Reflect.{method} called on non-object")))
}

fn reflect_apply(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    if !target.is_callable() {
        return Err(VmError::type_error("Reflect.apply target is not a function"));
    }
    let list = realm.create_list_from_array_like(&arg(args, 2))?;
    realm.call(&target, &arg(args, 1), &list)
}

fn reflect_construct(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    if !target.is_constructor() {
        return Err(VmError::type_error("Reflect.construct target is not a constructor"));
    }
    let new_target = match args.get(2) {
        Some(nt) if !nt.is_constructor() => {
            return Err(VmError::type_error("Reflect.construct newTarget is not a constructor"));
        }
        Some(nt) => nt.clone(),
        None => target.clone(),
    };
    let list = realm.create_list_from_array_like(&arg(args, 1))?;
    realm.construct(&target, &list, Some(&new_target))
}

fn reflect_define_property(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    let obj = target_object(&target, "defineProperty")?;
    let key = realm.to_property_key(&arg(args, 1))?;
    let current = obj.get_own_property(&key);
    let desc = to_property_descriptor(realm, &arg(args, 2), current.as_ref())?;
    Ok(Value::boolean(obj.define_own_property(key, desc)))
}

fn reflect_get(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    let obj = target_object(&target, "get")?;
    let key = realm.to_property_key(&arg(args, 1))?;
    let receiver = args.get(2).cloned().unwrap_or_else(|| target.clone());
    realm.ordinary_get(obj, &key, &receiver)
}

fn reflect_get_prototype_of(_realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    let obj = target_object(&target, "getPrototypeOf")?;
    Ok(obj.prototype().map_or(Value::Null, Value::object))
}

fn reflect_has(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    let obj = target_object(&target, "has")?;
    let key = realm.to_property_key(&arg(args, 1))?;
    Ok(Value::boolean(realm.has_property(obj, &key)))
}

fn reflect_own_keys(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    let obj = target_object(&target, "ownKeys")?;
    let keys = obj.own_keys().iter().map(|k| k.to_value()).collect();
    Ok(Value::object(realm.new_array(keys)))
}

fn reflect_set(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    target_object(&target, "set")?;
    let key = realm.to_property_key(&arg(args, 1))?;
    Ok(Value::boolean(realm.set(&target, key, arg(args, 2))?))
}

fn reflect_set_prototype_of(_realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    let obj = target_object(&target, "setPrototypeOf")?;
    let proto = match arg(args, 1) {
        Value::Object(p) => Some(p),
        Value::Null => None,
        _ => {
            return Err(VmError::type_error(
                "Object prototype may only be an Object or null",
            ));
        }
    };
    Ok(Value::boolean(obj.set_prototype_of(proto)))
}
