use primordials_realm::{PropertyKey, Realm, RealmConfig, Value, VmError};
use tracing_subscriber::filter::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn global(realm: &Realm, name: &str) -> Value {
    realm.get(&Value::object(realm.global().clone()), name).unwrap()
}

fn strings(realm: &Realm, array: &Value) -> Vec<String> {
    realm
        .create_list_from_array_like(array)
        .unwrap()
        .iter()
        .map(|v| realm.to_string(v).unwrap().to_string())
        .collect()
}

#[test]
fn test_overwritten_prototype_method_is_visible_to_get() {
    init_tracing();
    let realm = Realm::new();
    let array_proto = Value::object(realm.intrinsics().array_prototype.clone());
    let original = realm.get(&array_proto, "push").unwrap();
    let replacement = realm.new_function("push", 1, |_realm, _this, _args| Ok(Value::from("patched")));
    realm.put(&array_proto, "push", replacement).unwrap();

    let array = Value::object(realm.new_array(vec![]));
    let result = realm.invoke(&array, "push", &[Value::from(1)]).unwrap();
    assert_eq!(result.as_str(), Some("patched"));

    // the captured function object still works through Call
    realm.call(&original, &array, &[Value::from(1)]).unwrap();
    assert_eq!(realm.length_of_array_like(&array).unwrap(), 1);
}

#[test]
fn test_call_ignores_function_prototype_call() {
    init_tracing();
    let realm = Realm::new();
    let fn_proto = Value::object(realm.intrinsics().function_prototype.clone());
    let hijack = realm.new_function("call", 1, |_realm, _this, _args| Ok(Value::from("hijacked")));
    realm.put(&fn_proto, "call", hijack).unwrap();

    let f = realm.new_function("f", 0, |_realm, _this, _args| Ok(Value::from("direct")));
    assert_eq!(
        realm.call(&f, &Value::undefined(), &[]).unwrap().as_str(),
        Some("direct")
    );
    assert_eq!(realm.invoke(&f, "call", &[]).unwrap().as_str(), Some("hijacked"));
}

#[test]
fn test_global_bindings_exclude_internal_promise() {
    init_tracing();
    let realm = Realm::new();
    for name in ["Array", "Map", "Set", "WeakMap", "Promise", "RegExp", "Reflect", "Math"] {
        assert!(global(&realm, name).is_object(), "{name} should be a global");
    }
    assert!(global(&realm, "InternalPromise").is_undefined());
}

#[test]
fn test_map_preserves_insertion_order() {
    init_tracing();
    let realm = Realm::new();
    let map = realm.construct(&global(&realm, "Map"), &[], None).unwrap();
    for key in ["b", "a", "c"] {
        realm.invoke(&map, "set", &[Value::from(key), Value::from(1)]).unwrap();
    }
    realm.invoke(&map, "delete", &[Value::from("a")]).unwrap();
    let keys = realm.invoke(&map, "keys", &[]).unwrap();
    let array_from = realm.get(&global(&realm, "Array"), "from").unwrap();
    let keys = realm.call(&array_from, &global(&realm, "Array"), &[keys]).unwrap();
    assert_eq!(strings(&realm, &keys), vec!["b", "c"]);
}

#[test]
fn test_frozen_object_rejects_put() {
    init_tracing();
    let realm = Realm::new();
    let obj = realm.new_object();
    realm.create_data_property(&obj, "x", Value::from(1));
    assert!(obj.freeze());
    let err = realm.put(&Value::object(obj.clone()), "x", Value::from(2)).unwrap_err();
    assert!(matches!(err, VmError::TypeError(_)));
    assert_eq!(
        obj.get_own_value(&PropertyKey::string("x")).and_then(|v| v.as_number()),
        Some(1.0)
    );
}

#[test]
fn test_native_depth_limit() {
    init_tracing();
    let realm = Realm::with_config(RealmConfig {
        max_native_depth: 8,
        ..RealmConfig::default()
    });
    let recurse = realm.new_function("recurse", 0, |realm, this, _args| {
        realm.call(this, this, &[])
    });
    let err = realm.call(&recurse, &recurse, &[]).unwrap_err();
    assert!(matches!(err, VmError::StackOverflow));
}

#[test]
fn test_error_to_value_keeps_thrown_value() {
    init_tracing();
    let realm = Realm::new();
    let thrown = Value::object(realm.new_object());
    let err = VmError::exception(thrown.clone());
    assert!(realm.error_to_value(&err).strict_equals(&thrown));

    let type_error = realm.error_to_value(&VmError::type_error("boom"));
    let message = realm.get(&type_error, "message").unwrap();
    assert_eq!(message.as_str(), Some("boom"));
    let name = realm.get(&type_error, "name").unwrap();
    assert_eq!(name.as_str(), Some("TypeError"));
}

#[test]
fn test_array_length_writes_validate_and_stay_bounded() {
    init_tracing();
    let realm = Realm::new();
    let array = Value::object(realm.new_array(vec![Value::from(1)]));

    for bad in [
        Value::number(4_294_967_295.0),
        Value::number(f64::NAN),
        Value::number(-1.0),
        Value::number(2.5),
    ] {
        let err = realm.put(&array, "length", bad).unwrap_err();
        assert!(matches!(err, VmError::RangeError(_)), "{err}");
    }
    let err = realm.put(&array, 4_000_000_000u32, Value::from(0)).unwrap_err();
    assert!(matches!(err, VmError::RangeError(_)));
    assert_eq!(realm.length_of_array_like(&array).unwrap(), 1);

    realm.put(&array, "length", Value::from("3")).unwrap();
    assert_eq!(realm.length_of_array_like(&array).unwrap(), 3);
    realm.put(&array, "length", Value::from(0)).unwrap();
    assert_eq!(realm.length_of_array_like(&array).unwrap(), 0);
}

#[test]
fn test_array_constructor_rejects_oversized_lengths() {
    init_tracing();
    let realm = Realm::new();
    let ctor = global(&realm, "Array");
    for len in [4_294_967_295.0, 4_294_967_296.0, -1.0, f64::NAN] {
        let err = realm.construct(&ctor, &[Value::number(len)], None).unwrap_err();
        assert!(matches!(err, VmError::RangeError(_)), "{len}");
    }
    let small = realm.construct(&ctor, &[Value::from(3)], None).unwrap();
    assert_eq!(realm.length_of_array_like(&small).unwrap(), 3);
}

#[test]
fn test_huge_array_likes_raise_range_error() {
    init_tracing();
    let realm = Realm::new();
    let like = Value::object(realm.new_object());
    realm.put(&like, "length", Value::number(1e15)).unwrap();

    let err = realm.create_list_from_array_like(&like).unwrap_err();
    assert!(matches!(err, VmError::RangeError(_)));

    let from = realm.get(&global(&realm, "Array"), "from").unwrap();
    let err = realm.call(&from, &Value::undefined(), &[like.clone()]).unwrap_err();
    assert!(matches!(err, VmError::RangeError(_)));

    let array_proto = Value::object(realm.intrinsics().array_prototype.clone());
    let map = realm.get(&array_proto, "map").unwrap();
    let identity = realm.new_function("identity", 1, |_realm, _this, args| {
        Ok(primordials_realm::arg(args, 0))
    });
    let err = realm.call(&map, &like, &[identity]).unwrap_err();
    assert!(matches!(err, VmError::RangeError(_)));
}
