use std::sync::Arc;

use primordials::{BootstrapError, Primordials, RegistryBuilder};
use primordials_realm::{JsObject, PropertyKey, Realm, Value, VmError};
use tracing_subscriber::filter::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Replace every function-valued own data property of `obj` with one that
/// throws
fn poison(realm: &Realm, obj: &Arc<JsObject>) {
    let target = Value::object(obj.clone());
    for key in obj.own_keys() {
        let Some(value) = obj.get_own_value(&key) else {
            continue;
        };
        if !value.is_callable() || key == PropertyKey::string("constructor") {
            continue;
        }
        let label = key.to_string();
        let name = label.clone();
        let poisoned = realm.new_function(&name, 0, move |_realm, _this, _args| {
            Err(VmError::type_error(format!("poisoned {label}")))
        });
        realm.put(&target, &key, poisoned).unwrap();
    }
}

fn poison_everything(realm: &Realm) {
    let i = realm.intrinsics();
    for obj in [
        &i.object_prototype,
        &i.function_prototype,
        &i.array_prototype,
        &i.array_iterator_prototype,
        &i.string_prototype,
        &i.map_prototype,
        &i.set_prototype,
        &i.promise_prototype,
        &i.promise_constructor,
        &i.regexp_prototype,
        &i.math,
        &i.reflect,
        &i.array_constructor,
    ] {
        poison(realm, obj);
    }
}

fn entry(primordials: &Primordials, name: &str) -> Value {
    primordials.registry().require(name).unwrap().clone()
}

fn call(realm: &Realm, f: &Value, args: &[Value]) -> Value {
    realm.call(f, &Value::undefined(), args).unwrap()
}

#[test]
fn test_captures_survive_reassignment_of_every_prototype_method() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    poison_everything(&realm);

    let array = Value::object(realm.new_array(vec![Value::from(1)]));
    let push = entry(&primordials, "ArrayPrototypePush");
    assert_eq!(call(&realm, &push, &[array.clone(), Value::from(2)]).as_number(), Some(2.0));

    let join = entry(&primordials, "ArrayPrototypeJoin");
    assert_eq!(call(&realm, &join, &[array.clone(), Value::from("+")]).as_str(), Some("1+2"));

    let slice = entry(&primordials, "StringPrototypeSlice");
    let out = call(&realm, &slice, &[Value::from("primordials"), Value::from(0), Value::from(5)]);
    assert_eq!(out.as_str(), Some("primo"));

    let max = entry(&primordials, "MathMax");
    assert_eq!(call(&realm, &max, &[Value::from(3), Value::from(7)]).as_number(), Some(7.0));

    let max_apply = entry(&primordials, "MathMaxApply");
    assert_eq!(call(&realm, &max_apply, &[array.clone()]).as_number(), Some(2.0));

    let is_array = entry(&primordials, "ArrayIsArray");
    assert_eq!(call(&realm, &is_array, &[array.clone()]).as_boolean(), Some(true));

    let has_own = entry(&primordials, "ObjectPrototypeHasOwnProperty");
    assert_eq!(call(&realm, &has_own, &[array, Value::from("length")]).as_boolean(), Some(true));
}

#[test]
fn test_getter_captures_read_through_the_original_accessor() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();

    let map = realm
        .construct(&Value::object(realm.intrinsics().map_constructor.clone()), &[], None)
        .unwrap();
    realm.invoke(&map, "set", &[Value::from("k"), Value::from("v")]).unwrap();

    let fake_size = realm.new_function("get size", 0, |_realm, _this, _args| Ok(Value::from(99)));
    realm
        .intrinsics()
        .map_prototype
        .define_own_property(
            PropertyKey::string("size"),
            primordials_realm::PropertyDescriptor::accessor(
                Some(fake_size),
                None,
                primordials_realm::PropertyAttributes::builtin_accessor(),
            ),
        );
    assert_eq!(realm.get(&map, "size").unwrap().as_number(), Some(99.0));

    let size = entry(&primordials, "MapPrototypeGetSize");
    assert_eq!(call(&realm, &size, &[map]).as_number(), Some(1.0));
}

#[test]
fn test_uncurry_this_ignores_patched_function_call() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    poison(&realm, &realm.intrinsics().function_prototype);

    let uncurry = entry(&primordials, "uncurryThis");
    let includes = realm
        .intrinsics()
        .string_prototype
        .get_own_value(&PropertyKey::string("includes"))
        .unwrap();
    let uncurried = call(&realm, &uncurry, &[includes]);
    let found = call(&realm, &uncurried, &[Value::from("hardened"), Value::from("den")]);
    assert_eq!(found.as_boolean(), Some(true));
}

#[test]
fn test_apply_bind_reads_arguments_without_iteration() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    poison(&realm, &realm.intrinsics().array_prototype);

    let push_apply = entry(&primordials, "ArrayPrototypePushApply");
    let target = Value::object(realm.new_array(vec![]));
    let items = Value::object(realm.new_array(vec![Value::from("a"), Value::from("b")]));
    call(&realm, &push_apply, &[target.clone(), items]);
    assert_eq!(target.as_object().unwrap().array_len(), 2);

    let apply_bind = entry(&primordials, "applyBind");
    let of = realm
        .intrinsics()
        .array_constructor
        .get_own_value(&PropertyKey::string("of"))
        .unwrap();
    let of_apply = call(
        &realm,
        &apply_bind,
        &[of, Value::object(realm.intrinsics().array_constructor.clone())],
    );
    let args = Value::object(realm.new_array(vec![Value::from(1), Value::from(2), Value::from(3)]));
    let out = call(&realm, &of_apply, &[args]);
    assert_eq!(out.as_object().unwrap().array_len(), 3);
}

#[test]
fn test_registry_surface_is_immutable() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let object = Value::object(primordials.object().clone());

    let before = realm.get(&object, "ArrayPrototypePush").unwrap();
    assert!(realm.put(&object, "ArrayPrototypePush", Value::from(1)).is_err());
    assert!(realm.put(&object, "Injected", Value::from(1)).is_err());
    assert!(!primordials.object().delete(&PropertyKey::string("MathMax")));
    assert!(realm.get(&object, "ArrayPrototypePush").unwrap().strict_equals(&before));
    assert!(Primordials::get(&realm).is_some());
}

#[test]
fn test_bootstrap_is_one_time() {
    init_tracing();
    let realm = Realm::new();
    Primordials::install(&realm).unwrap();
    assert!(matches!(
        Primordials::install(&realm),
        Err(BootstrapError::AlreadyInstalled)
    ));

    let mut builder = RegistryBuilder::new();
    builder.insert("SymbolIterator", Value::undefined()).unwrap();
    assert!(matches!(
        builder.insert("SymbolIterator", Value::null()),
        Err(BootstrapError::DuplicateEntry(_))
    ));
}

#[test]
fn test_missing_intrinsic_aborts_bootstrap() {
    init_tracing();
    let realm = Realm::new();
    realm
        .intrinsics()
        .array_prototype
        .delete(&PropertyKey::string("push"));
    let err = Primordials::install(&realm).unwrap_err();
    assert!(matches!(err, BootstrapError::MissingIntrinsic { .. }));
    assert!(Primordials::get(&realm).is_none());
}
