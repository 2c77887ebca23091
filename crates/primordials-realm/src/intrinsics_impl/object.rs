//! Object constructor statics and Object.prototype methods

use std::sync::Arc;

use crate::builtin_builder::BuiltInBuilder;
use crate::error::{VmError, VmResult};
use crate::function::arg;
use crate::intrinsics::InitContext;
use crate::object::{JsObject, ObjectKind, PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::realm::Realm;
use crate::value::Value;

pub(crate) fn init(cx: &InitContext<'_>) -> Arc<JsObject> {
    BuiltInBuilder::new(cx.fn_proto, cx.object_prototype.clone(), "Object")
        .constructor_fn(object_construct, 1)
        .call_fn(object_call)
        .static_method("freeze", object_freeze, 1)
        .static_method("isFrozen", object_is_frozen, 1)
        .static_method("isExtensible", object_is_extensible, 1)
        .static_method("preventExtensions", object_prevent_extensions, 1)
        .static_method("getPrototypeOf", object_get_prototype_of, 1)
        .static_method("setPrototypeOf", object_set_prototype_of, 2)
        .static_method("create", object_create, 2)
        .static_method("keys", object_keys, 1)
        .static_method("defineProperty", object_define_property, 3)
        .static_method("getOwnPropertyDescriptor", object_get_own_property_descriptor, 2)
        .method("hasOwnProperty", object_has_own_property, 1)
        .method("propertyIsEnumerable", object_property_is_enumerable, 1)
        .method("toString", object_to_string, 0)
        .method("valueOf", object_value_of, 0)
        .build()
}

fn object_call(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let value = arg(args, 0);
    if value.is_object() {
        return Ok(value);
    }
    Ok(Value::object(realm.new_object()))
}

fn object_construct(realm: &Realm, args: &[Value], _new_target: &Arc<JsObject>) -> VmResult<Value> {
    object_call(realm, &Value::undefined(), args)
}

// ============================================================================
// Statics
// ============================================================================

fn object_freeze(_realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    if let Some(obj) = target.as_object()
        && !obj.freeze()
    {
        return Err(VmError::type_error("Cannot freeze"));
    }
    Ok(target)
}

fn object_is_frozen(_realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    Ok(Value::boolean(
        arg(args, 0).as_object().is_none_or(|o| o.is_frozen()),
    ))
}

fn object_is_extensible(_realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    Ok(Value::boolean(
        arg(args, 0).as_object().is_some_and(|o| o.is_extensible()),
    ))
}

fn object_prevent_extensions(_realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    if let Some(obj) = target.as_object() {
        obj.prevent_extensions();
    }
    Ok(target)
}

fn object_get_prototype_of(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    match &target {
        Value::Object(obj) => Ok(obj.prototype().map_or(Value::Null, Value::object)),
        Value::String(_) => Ok(Value::object(realm.intrinsics().string_prototype.clone())),
        Value::Symbol(_) => Ok(Value::object(realm.intrinsics().symbol_prototype.clone())),
        Value::Undefined | Value::Null => Err(VmError::type_error(
            "Cannot convert undefined or null to object",
        )),
        _ => Ok(Value::object(realm.intrinsics().object_prototype.clone())),
    }
}

fn object_set_prototype_of(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    realm.require_object_coercible(&target, "Object.setPrototypeOf")?;
    let proto = arg(args, 1);
    let new_proto = match &proto {
        Value::Object(p) => Some(p.clone()),
        Value::Null => None,
        _ => {
            return Err(VmError::type_error(
                "Object prototype may only be an Object or null",
            ));
        }
    };
    if let Some(obj) = target.as_object()
        && !obj.set_prototype_of(new_proto)
    {
        return Err(VmError::type_error("Cannot set prototype"));
    }
    Ok(target)
}

fn object_create(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let proto = match arg(args, 0) {
        Value::Object(p) => Some(p),
        Value::Null => None,
        _ => {
            return Err(VmError::type_error(
                "Object prototype may only be an Object or null",
            ));
        }
    };
    let obj = Arc::new(JsObject::new(proto));
    let props = arg(args, 1);
    if let Some(props_obj) = props.as_object() {
        for key in props_obj.own_keys() {
            let Some(desc) = props_obj.get_own_property(&key) else {
                continue;
            };
            if !desc.is_enumerable() {
                continue;
            }
            let desc_obj = realm.get(&props, key.clone())?;
            let desc = to_property_descriptor(realm, &desc_obj, None)?;
            realm.define_property_or_throw(&obj, key, desc)?;
        }
    }
    Ok(Value::object(obj))
}

fn object_keys(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    realm.require_object_coercible(&target, "Object.keys")?;
    let Some(obj) = target.as_object() else {
        return Ok(Value::object(realm.new_array(Vec::new())));
    };
    let keys = obj
        .own_keys()
        .into_iter()
        .filter(|k| !k.is_symbol())
        .filter(|k| obj.get_own_property(k).is_some_and(|d| d.is_enumerable()))
        .map(|k| k.to_value())
        .collect();
    Ok(Value::object(realm.new_array(keys)))
}

fn object_define_property(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = arg(args, 0);
    let Some(obj) = target.as_object() else {
        return Err(VmError::type_error("Object.defineProperty called on non-object"));
    };
    let key = realm.to_property_key(&arg(args, 1))?;
    let current = obj.get_own_property(&key);
    let desc = to_property_descriptor(realm, &arg(args, 2), current.as_ref())?;
    realm.define_property_or_throw(obj, key, desc)?;
    Ok(target)
}

fn object_get_own_property_descriptor(
    realm: &Realm,
    _this: &Value,
    args: &[Value],
) -> VmResult<Value> {
    let target = arg(args, 0);
    let Some(obj) = target.as_object() else {
        return Ok(Value::undefined());
    };
    let key = realm.to_property_key(&arg(args, 1))?;
    let Some(desc) = obj.get_own_property(&key) else {
        return Ok(Value::undefined());
    };
    Ok(Value::object(from_property_descriptor(realm, &desc)))
}

/// FromPropertyDescriptor
pub(crate) fn from_property_descriptor(realm: &Realm, desc: &PropertyDescriptor) -> Arc<JsObject> {
    let out = realm.new_object();
    match desc {
        PropertyDescriptor::Data { value, attributes } => {
            realm.create_data_property(&out, "value", value.clone());
            realm.create_data_property(&out, "writable", Value::boolean(attributes.writable));
        }
        PropertyDescriptor::Accessor { get, set, .. } => {
            realm.create_data_property(&out, "get", get.clone().unwrap_or_default());
            realm.create_data_property(&out, "set", set.clone().unwrap_or_default());
        }
    }
    realm.create_data_property(&out, "enumerable", Value::boolean(desc.is_enumerable()));
    realm.create_data_property(&out, "configurable", Value::boolean(desc.is_configurable()));
    out
}

/// ToPropertyDescriptor, completed from `current` (or defaults) for absent fields
pub(crate) fn to_property_descriptor(
    realm: &Realm,
    desc: &Value,
    current: Option<&PropertyDescriptor>,
) -> VmResult<PropertyDescriptor> {
    let Some(desc_obj) = desc.as_object() else {
        return Err(VmError::type_error("Property description must be an object"));
    };
    let field = |name: &str| -> VmResult<Option<Value>> {
        let key = PropertyKey::string(name);
        if realm.has_property(desc_obj, &key) {
            realm.get(desc, key).map(Some)
        } else {
            Ok(None)
        }
    };

    let base = current.map(|c| c.attributes()).unwrap_or_default();
    let enumerable = field("enumerable")?.map_or(base.enumerable, |v| v.to_boolean());
    let configurable = field("configurable")?.map_or(base.configurable, |v| v.to_boolean());
    let value = field("value")?;
    let writable = field("writable")?.map(|v| v.to_boolean());
    let get = field("get")?;
    let set = field("set")?;

    for accessor in [&get, &set].into_iter().flatten() {
        if !accessor.is_undefined() && !accessor.is_callable() {
            return Err(VmError::type_error("Getter or setter must be a function"));
        }
    }

    if get.is_some() || set.is_some() {
        if value.is_some() || writable.is_some() {
            return Err(VmError::type_error(
                "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute",
            ));
        }
        let (cur_get, cur_set) = match current {
            Some(PropertyDescriptor::Accessor { get, set, .. }) => (get.clone(), set.clone()),
            _ => (None, None),
        };
        let normalize = |v: Option<Value>, fallback: Option<Value>| match v {
            Some(v) if v.is_undefined() => None,
            Some(v) => Some(v),
            None => fallback,
        };
        return Ok(PropertyDescriptor::accessor(
            normalize(get, cur_get),
            normalize(set, cur_set),
            PropertyAttributes {
                writable: false,
                enumerable,
                configurable,
            },
        ));
    }

    let (cur_value, cur_writable) = match current {
        Some(PropertyDescriptor::Data { value, attributes }) => {
            (value.clone(), attributes.writable)
        }
        _ => (Value::undefined(), false),
    };
    Ok(PropertyDescriptor::data_with_attrs(
        value.unwrap_or(cur_value),
        PropertyAttributes {
            writable: writable.unwrap_or(cur_writable),
            enumerable,
            configurable,
        },
    ))
}

// ============================================================================
// Object.prototype
// ============================================================================

fn object_has_own_property(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let key = realm.to_property_key(&arg(args, 0))?;
    realm.require_object_coercible(this, "Object.prototype.hasOwnProperty")?;
    Ok(Value::boolean(
        this.as_object().is_some_and(|o| o.has_own_property(&key)),
    ))
}

fn object_property_is_enumerable(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let key = realm.to_property_key(&arg(args, 0))?;
    Ok(Value::boolean(
        this.as_object()
            .and_then(|o| o.get_own_property(&key))
            .is_some_and(|d| d.is_enumerable()),
    ))
}

fn object_to_string(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let builtin_tag = match this {
        Value::Undefined => return Ok(Value::from("[object Undefined]")),
        Value::Null => return Ok(Value::from("[object Null]")),
        Value::Object(obj) => match obj.kind() {
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Error => "Error",
            ObjectKind::RegExp(_) => "RegExp",
            _ => "Object",
        },
        Value::String(_) => "String",
        Value::Number(_) => "Number",
        Value::Boolean(_) => "Boolean",
        Value::Symbol(_) => "Symbol",
    };
    let tag = realm.get(this, &realm.intrinsics().symbols.to_string_tag)?;
    let tag = match tag.as_str() {
        Some(t) => t.to_string(),
        None => builtin_tag.to_string(),
    };
    Ok(Value::from(format!("[object {tag}]")))
}

fn object_value_of(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    realm.require_object_coercible(this, "Object.prototype.valueOf")?;
    Ok(this.clone())
}
