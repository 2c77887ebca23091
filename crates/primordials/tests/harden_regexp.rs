use std::sync::Arc;

use primordials::Primordials;
use primordials_realm::{
    JsObject, PropertyAttributes, PropertyDescriptor, PropertyKey, Realm, Value, VmError,
};
use tracing_subscriber::filter::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn regexp(realm: &Realm, pattern: &str, flags: &str) -> Value {
    let ctor = Value::object(realm.intrinsics().regexp_constructor.clone());
    realm
        .construct(&ctor, &[Value::from(pattern), Value::from(flags)], None)
        .unwrap()
}

fn entry(primordials: &Primordials, name: &str) -> Value {
    primordials.registry().require(name).unwrap().clone()
}

fn call(realm: &Realm, f: &Value, args: &[Value]) -> Value {
    realm.call(f, &Value::undefined(), args).unwrap()
}

fn hardened(realm: &Realm, primordials: &Primordials, pattern: &str, flags: &str) -> Value {
    let rx = regexp(realm, pattern, flags);
    let out = call(realm, &entry(primordials, "hardenRegExp"), &[rx.clone()]);
    assert!(out.strict_equals(&rx));
    rx
}

fn strings(realm: &Realm, array: &Value) -> Vec<String> {
    array
        .as_object()
        .unwrap()
        .array_elements()
        .unwrap()
        .iter()
        .map(|v| realm.to_string(v).unwrap().to_string())
        .collect()
}

/// Replace the regexp symbol methods, `exec` and every flag getter on
/// `RegExp.prototype`
fn patch_regexp_prototype(realm: &Realm) {
    let i = realm.intrinsics();
    let proto = i.regexp_prototype.clone();
    let target = Value::object(proto.clone());

    let hacked = realm.new_function("hacked", 0, |_realm, _this, _args| Ok(Value::from("HACKED")));
    for symbol in [
        &i.symbols.r#match,
        &i.symbols.match_all,
        &i.symbols.replace,
        &i.symbols.search,
        &i.symbols.split,
    ] {
        realm.put(&target, symbol, hacked.clone()).unwrap();
    }
    let exec = realm.new_function("exec", 1, |_realm, _this, _args| {
        Err(VmError::type_error("RegExp.prototype.exec was patched"))
    });
    realm.put(&target, "exec", exec).unwrap();

    for name in ["flags", "global", "sticky", "unicode", "source", "ignoreCase"] {
        let getter = realm.new_function(name, 0, |_realm, _this, _args| Ok(Value::from("HACKED")));
        proto.define_own_property(
            PropertyKey::string(name),
            PropertyDescriptor::accessor(Some(getter), None, PropertyAttributes::builtin_accessor()),
        );
    }
}

#[test]
fn test_hardened_replace_ignores_patched_prototype() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let rx = hardened(&realm, &primordials, "a", "g");
    patch_regexp_prototype(&realm);

    let replace = entry(&primordials, "StringPrototypeReplace");
    let out = call(&realm, &replace, &[Value::from("banana"), rx.clone(), Value::from("o")]);
    assert_eq!(out.as_str(), Some("bonono"));

    let plain = regexp(&realm, "a", "g");
    let out = call(&realm, &replace, &[Value::from("banana"), plain, Value::from("o")]);
    assert_eq!(out.as_str(), Some("HACKED"));
}

#[test]
fn test_hardened_split_match_all_search_and_match() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let separators = hardened(&realm, &primordials, "[,;]", "");
    let digits = hardened(&realm, &primordials, "\\d+", "g");
    let word = hardened(&realm, &primordials, "b+", "");
    patch_regexp_prototype(&realm);

    let split = entry(&primordials, "StringPrototypeSplit");
    let parts = call(&realm, &split, &[Value::from("a,b;c"), separators]);
    assert_eq!(strings(&realm, &parts), vec!["a", "b", "c"]);

    let matched = call(&realm, &entry(&primordials, "StringPrototypeMatch"), &[
        Value::from("r2d22c3"),
        digits.clone(),
    ]);
    assert_eq!(strings(&realm, &matched), vec!["2", "22", "3"]);

    let iterator = call(&realm, &entry(&primordials, "StringPrototypeMatchAll"), &[
        Value::from("x1y22"),
        digits,
    ]);
    let mut found = Vec::new();
    loop {
        let step = realm.invoke(&iterator, "next", &[]).unwrap();
        if realm.get(&step, "done").unwrap().as_boolean() == Some(true) {
            break;
        }
        let result = realm.get(&step, "value").unwrap();
        let text = realm.get(&result, 0u32).unwrap();
        let index = realm.get(&result, "index").unwrap();
        found.push((text.as_str().unwrap().to_string(), index.as_number().unwrap()));
    }
    assert_eq!(found, vec![("1".to_string(), 1.0), ("22".to_string(), 3.0)]);

    let search = entry(&primordials, "StringPrototypeSearch");
    let index = call(&realm, &search, &[Value::from("aabbb"), word.clone()]);
    assert_eq!(index.as_number(), Some(2.0));
    assert_eq!(realm.get(&word, "lastIndex").unwrap().as_number(), Some(0.0));
}

#[test]
fn test_hardened_instance_pins_flags_and_keeps_last_index_writable() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let rx = hardened(&realm, &primordials, "a", "gi");
    patch_regexp_prototype(&realm);

    assert_eq!(realm.get(&rx, "flags").unwrap().as_str(), Some("gi"));
    assert_eq!(realm.get(&rx, "global").unwrap().as_boolean(), Some(true));
    assert_eq!(realm.get(&rx, "source").unwrap().as_str(), Some("a"));

    assert!(realm.put(&rx, "flags", Value::from("")).is_err());
    realm.put(&rx, "lastIndex", Value::from(3)).unwrap();
    assert_eq!(realm.get(&rx, "lastIndex").unwrap().as_number(), Some(3.0));
    let obj = rx.as_object().unwrap();
    assert!(!obj.delete(&PropertyKey::string("lastIndex")));
    assert!(!obj.delete(&PropertyKey::string("exec")));
}

#[test]
fn test_species_holder_and_splitter_shape() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let rx = hardened(&realm, &primordials, "x", "");
    let species = PropertyKey::from(&realm.intrinsics().symbols.species);

    let holder = rx
        .as_object()
        .unwrap()
        .get_own_value(&PropertyKey::string("constructor"))
        .unwrap();
    let holder: Arc<JsObject> = holder.as_object().unwrap().clone();
    assert!(holder.prototype().is_none());
    assert!(holder.is_frozen());
    assert_eq!(holder.own_keys(), vec![species.clone()]);

    let splitter = holder.get_own_value(&species).unwrap();
    assert!(splitter.is_constructor());
    let prototype = realm.get(&splitter, "prototype").unwrap();
    let prototype = prototype.as_object().unwrap();
    assert!(prototype.prototype().is_none());
    let mut keys: Vec<String> = prototype.own_keys().iter().map(|k| k.to_string()).collect();
    keys.sort();
    assert_eq!(keys, vec!["exec".to_string(), "lastIndex".to_string()]);

    let instance = realm
        .construct(&splitter, &[Value::from("b"), Value::from("y")], None)
        .unwrap();
    assert!(instance.as_object().unwrap().own_keys().is_empty());
    realm.put(&instance, "lastIndex", Value::from(1)).unwrap();
    let result = realm.invoke(&instance, "exec", &[Value::from("abc")]).unwrap();
    assert_eq!(realm.get(&result, "index").unwrap().as_number(), Some(1.0));
    assert_eq!(realm.get(&instance, "lastIndex").unwrap().as_number(), Some(2.0));
}

#[test]
fn test_harden_rejects_non_regexp() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let harden = entry(&primordials, "hardenRegExp");
    for value in [
        Value::from("a"),
        Value::object(realm.new_object()),
        Value::undefined(),
    ] {
        let err = realm.call(&harden, &Value::undefined(), &[value]).unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
    }
}

#[test]
fn test_safe_string_search_after_patch() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let i = realm.intrinsics();
    let hacked = realm.new_function("hacked", 0, |_realm, _this, _args| Ok(Value::from(-42)));
    realm
        .put(&Value::object(i.regexp_prototype.clone()), &i.symbols.search, hacked.clone())
        .unwrap();
    realm
        .put(&Value::object(i.string_prototype.clone()), "search", hacked)
        .unwrap();

    let search = entry(&primordials, "SafeStringPrototypeSearch");
    let index = call(&realm, &search, &[Value::from("xxab"), Value::from("a+b")]);
    assert_eq!(index.as_number(), Some(2.0));
    let missing = call(&realm, &search, &[Value::from("xxab"), regexp(&realm, "z", "")]);
    assert_eq!(missing.as_number(), Some(-1.0));
}
