//! Safe class synthesis.
//!
//! [`make_safe`] completes a hand-written shell class from an unsafe
//! built-in: members the shell lacks are copied over, iterator-returning
//! methods are rewrapped to hand out safe iterators, and the result is
//! detached from every prototype chain and frozen.

use std::sync::Arc;

use primordials_realm::{
    JsObject, PropertyDescriptor, PropertyKey, Realm, Value, VmError, VmResult, arg,
    builtin_builder::function_name_for,
};

use crate::capture::{Owner, capture_object};
use crate::error::{BootstrapError, BootstrapResult};
use crate::safe_iterator::create_safe_iterator;

fn define(target: &Arc<JsObject>, key: PropertyKey, desc: PropertyDescriptor) -> BootstrapResult<()> {
    if target.define_own_property(key.clone(), desc) {
        Ok(())
    } else {
        Err(BootstrapError::Vm(VmError::type_error(format!(
            "Cannot define property {key} on safe class"
        ))))
    }
}

/// Copy every own property of `from` that `to` does not already have
fn copy_props(from: &Arc<JsObject>, to: &Arc<JsObject>) -> BootstrapResult<()> {
    for key in from.own_keys() {
        if to.has_own_property(&key) {
            continue;
        }
        if let Some(desc) = from.get_own_property(&key) {
            define(to, key, desc)?;
        }
    }
    Ok(())
}

fn is_iterator_method(
    realm: &Realm,
    desc: &PropertyDescriptor,
    dummy: &Value,
) -> VmResult<Option<(Value, Value)>> {
    let Some(method) = desc.value().filter(|v| v.is_callable()) else {
        return Ok(None);
    };
    let length = method
        .as_object()
        .and_then(|o| o.as_function())
        .map_or(0, |f| f.length);
    if length != 0 {
        return Ok(None);
    }
    let result = realm.call(method, dummy, &[])?;
    let iterator_key = PropertyKey::from(&realm.intrinsics().symbols.iterator);
    match result.as_object() {
        Some(obj) if realm.has_property(obj, &iterator_key) => Ok(Some((method.clone(), result))),
        _ => Ok(None),
    }
}

/// Finish `shell` from `unsafe_ctor` and freeze it. Returns the shell
/// constructor.
pub fn make_safe(
    realm: &Realm,
    unsafe_ctor: &Arc<JsObject>,
    shell: &Arc<JsObject>,
) -> BootstrapResult<Arc<JsObject>> {
    let unsafe_name = constructor_name(unsafe_ctor);
    let shell_name = constructor_name(shell);
    let unsafe_proto = capture_object(Owner::new(&unsafe_name, unsafe_ctor), "prototype")?;
    let shell_proto = capture_object(Owner::new(&shell_name, shell), "prototype")?;

    let iterator_key = PropertyKey::from(&realm.intrinsics().symbols.iterator);
    let iterable = unsafe_proto
        .get_own_property(&iterator_key)
        .is_some_and(|desc| !desc.is_enumerable());

    if iterable {
        let dummy = realm.construct(&Value::object(unsafe_ctor.clone()), &[], None)?;
        let mut shared_next: Option<Value> = None;
        for key in unsafe_proto.own_keys() {
            if shell_proto.has_own_property(&key) {
                continue;
            }
            let Some(desc) = unsafe_proto.get_own_property(&key) else {
                continue;
            };
            if desc.is_enumerable() {
                let value = desc.value().cloned().unwrap_or_default();
                define(&shell_proto, key, PropertyDescriptor::data(value))?;
                continue;
            }
            let Some((factory, first)) = is_iterator_method(realm, &desc, &dummy)? else {
                define(&shell_proto, key, desc)?;
                continue;
            };
            let next = match &shared_next {
                Some(next) => next.clone(),
                None => {
                    let next = realm.get(&first, "next")?;
                    shared_next = Some(next.clone());
                    next
                }
            };
            let method_name = function_name_for(&key);
            let iterator_type =
                create_safe_iterator(realm, &format!("{shell_name}Iterator"), factory, next)?;
            let wrapper = realm.new_function(&method_name, 0, move |realm, this, _args| {
                iterator_type.create(realm, this.clone())
            });
            tracing::trace!(class = %shell_name, %key, "iterator method rewrapped");
            define(
                &shell_proto,
                key,
                PropertyDescriptor::data_with_attrs(wrapper, desc.attributes()),
            )?;
        }
    } else {
        copy_props(&unsafe_proto, &shell_proto)?;
    }
    copy_props(unsafe_ctor, shell)?;

    if !shell_proto.set_prototype_of(None) {
        return Err(BootstrapError::wrong_shape(
            format!("{shell_name}.prototype"),
            "extensible prototype",
        ));
    }
    shell_proto.freeze();
    shell.freeze();
    tracing::debug!(class = %shell_name, from = %unsafe_name, iterable, "safe class synthesized");
    Ok(shell.clone())
}

fn constructor_name(ctor: &Arc<JsObject>) -> String {
    ctor.as_function()
        .map(|f| f.name.clone())
        .unwrap_or_else(|| String::from("anonymous"))
}

/// `makeSafe(unsafe, safe)` exposed to realm code
pub fn make_safe_function(realm: &Realm) -> Value {
    realm.new_function("makeSafe", 2, |realm, _this, args| {
        let (unsafe_ctor, shell) = match (arg(args, 0), arg(args, 1)) {
            (Value::Object(u), Value::Object(s)) if u.is_constructor() && s.is_constructor() => (u, s),
            _ => return Err(VmError::type_error("makeSafe expects two constructors")),
        };
        make_safe(realm, &unsafe_ctor, &shell)
            .map(Value::object)
            .map_err(|error| match error {
                BootstrapError::Vm(vm) => vm,
                other => VmError::type_error(other.to_string()),
            })
    })
}

#[cfg(test)]
mod tests {
    use primordials_realm::BuiltInBuilder;

    use super::*;

    fn shell_for(realm: &Realm, unsafe_ctor: &Arc<JsObject>, name: &str) -> Arc<JsObject> {
        let unsafe_proto = unsafe_ctor
            .get_own_value(&PropertyKey::string("prototype"))
            .and_then(|p| p.as_object().cloned())
            .unwrap();
        let target = Value::object(unsafe_ctor.clone());
        BuiltInBuilder::new(
            &realm.intrinsics().function_prototype,
            Arc::new(JsObject::new(None)),
            name,
        )
        .inherits(&unsafe_proto)
        .constructor_fn(
            move |realm, args, new_target| {
                realm.construct(&target, args, Some(&Value::object(new_target.clone())))
            },
            0,
        )
        .build()
    }

    #[test]
    fn test_iterable_type_gets_safe_iterators() {
        let realm = Realm::new();
        let map_ctor = realm.intrinsics().map_constructor.clone();
        let shell = shell_for(&realm, &map_ctor, "TestMap");
        let safe = make_safe(&realm, &map_ctor, &shell).unwrap();
        let proto = safe
            .get_own_value(&PropertyKey::string("prototype"))
            .and_then(|p| p.as_object().cloned())
            .unwrap();
        assert!(proto.prototype().is_none());
        assert!(proto.is_frozen() && safe.is_frozen());

        let shell_entries = proto.get_own_value(&PropertyKey::string("entries")).unwrap();
        let unsafe_entries = realm
            .intrinsics()
            .map_prototype
            .get_own_value(&PropertyKey::string("entries"))
            .unwrap();
        assert!(!shell_entries.strict_equals(&unsafe_entries));

        let shell_get = proto.get_own_value(&PropertyKey::string("get")).unwrap();
        let unsafe_get = realm
            .intrinsics()
            .map_prototype
            .get_own_value(&PropertyKey::string("get"))
            .unwrap();
        assert!(shell_get.strict_equals(&unsafe_get));
    }

    #[test]
    fn test_shell_members_win() {
        let realm = Realm::new();
        let set_ctor = realm.intrinsics().set_constructor.clone();
        let shell = shell_for(&realm, &set_ctor, "TestSet");
        let safe = make_safe(&realm, &set_ctor, &shell).unwrap();
        let proto = safe
            .get_own_value(&PropertyKey::string("prototype"))
            .and_then(|p| p.as_object().cloned())
            .unwrap();
        let ctor = proto.get_own_value(&PropertyKey::string("constructor")).unwrap();
        assert!(ctor.strict_equals(&Value::object(safe.clone())));
    }

    #[test]
    fn test_non_iterable_copies_statics_and_methods() {
        let realm = Realm::new();
        let weak_map = realm.intrinsics().weak_map_constructor.clone();
        let shell = shell_for(&realm, &weak_map, "TestWeakMap");
        let safe = make_safe(&realm, &weak_map, &shell).unwrap();
        let proto = safe
            .get_own_value(&PropertyKey::string("prototype"))
            .and_then(|p| p.as_object().cloned())
            .unwrap();
        for name in ["get", "set", "has", "delete"] {
            assert!(proto.has_own_property(&PropertyKey::string(name)), "{name}");
        }
    }
}
