use std::sync::Arc;

use parking_lot::Mutex;
use primordials_realm::{PromiseState, ReactionHandler, Realm, Value};
use tracing_subscriber::filter::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn promise_ctor(realm: &Realm) -> Value {
    Value::object(realm.intrinsics().promise_constructor.clone())
}

fn recorder(realm: &Realm, log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> Value {
    let log = log.clone();
    realm.new_function(label, 1, move |realm, _this, args| {
        let value = args.first().cloned().unwrap_or_default();
        log.lock().push(format!("{label}:{}", realm.to_string(&value)?));
        Ok(Value::undefined())
    })
}

#[test]
fn test_reactions_run_in_fifo_order() {
    init_tracing();
    let realm = Realm::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let ctor = promise_ctor(&realm);
    let a = realm.invoke(&ctor, "resolve", &[Value::from("a")]).unwrap();
    let b = realm.invoke(&ctor, "resolve", &[Value::from("b")]).unwrap();
    realm.invoke(&a, "then", &[recorder(&realm, &log, "first")]).unwrap();
    realm.invoke(&b, "then", &[recorder(&realm, &log, "second")]).unwrap();
    realm.invoke(&a, "then", &[recorder(&realm, &log, "third")]).unwrap();
    assert!(log.lock().is_empty());
    realm.run_jobs().unwrap();
    assert_eq!(*log.lock(), vec!["first:a", "second:b", "third:a"]);
}

#[test]
fn test_thenable_adoption_takes_an_extra_job() {
    init_tracing();
    let realm = Realm::new();
    let thenable = Value::object(realm.new_object());
    let then = realm.new_function("then", 2, |realm, _this, args| {
        realm.call(&args[0], &Value::undefined(), &[Value::from(42)])
    });
    realm.put(&thenable, "then", then).unwrap();

    let ctor = promise_ctor(&realm);
    let promise = realm.invoke(&ctor, "resolve", &[thenable]).unwrap();
    assert!(matches!(realm.promise_state(&promise), Some(PromiseState::Pending)));
    realm.run_jobs().unwrap();
    match realm.promise_state(&promise) {
        Some(PromiseState::Fulfilled(v)) => assert_eq!(v.as_number(), Some(42.0)),
        other => panic!("unexpected state {other:?}"),
    }
}

#[test]
fn test_perform_promise_then_skips_patched_then() {
    init_tracing();
    let realm = Realm::new();
    let proto = Value::object(realm.intrinsics().promise_prototype.clone());
    let hijack = realm.new_function("then", 2, |_realm, _this, _args| Ok(Value::from("hijacked")));
    realm.put(&proto, "then", hijack).unwrap();

    let promise = realm.invoke(&promise_ctor(&realm), "resolve", &[Value::from(7)]).unwrap();
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    let js_promise = promise.as_object().and_then(|o| o.as_promise()).unwrap().clone();
    realm.perform_promise_then(
        &js_promise,
        ReactionHandler::native(move |_realm, value| {
            *sink.lock() = value.as_number();
            Ok(Value::undefined())
        }),
        ReactionHandler::Thrower,
        None,
    );
    realm.run_jobs().unwrap();
    assert_eq!(*seen.lock(), Some(7.0));
}

#[test]
fn test_any_rejects_with_aggregate_error() {
    init_tracing();
    let realm = Realm::new();
    let ctor = promise_ctor(&realm);
    let r1 = realm.invoke(&ctor, "reject", &[Value::from("x")]).unwrap();
    let r2 = realm.invoke(&ctor, "reject", &[Value::from("y")]).unwrap();
    let list = Value::object(realm.new_array(vec![r1, r2]));
    let any = realm.invoke(&ctor, "any", &[list]).unwrap();
    realm.run_jobs().unwrap();
    let Some(PromiseState::Rejected(reason)) = realm.promise_state(&any) else {
        panic!("Promise.any should reject");
    };
    let errors = realm.get(&reason, "errors").unwrap();
    let errors: Vec<String> = realm
        .create_list_from_array_like(&errors)
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(errors, vec!["x", "y"]);
}

#[test]
fn test_internal_promise_is_distinct_from_public() {
    init_tracing();
    let realm = Realm::new();
    let internal = Value::object(realm.intrinsics().internal_promise_constructor.clone());
    let executor = realm.new_function("", 2, |_realm, _this, _args| Ok(Value::undefined()));
    let promise = realm.construct(&internal, &[executor], None).unwrap();
    let proto = promise.as_object().and_then(|o| o.prototype()).unwrap();
    assert!(Arc::ptr_eq(&proto, &realm.intrinsics().internal_promise_prototype));
    assert!(!Arc::ptr_eq(&proto, &realm.intrinsics().promise_prototype));
}
