use std::sync::Arc;

use parking_lot::Mutex;
use primordials::Primordials;
use primordials_realm::{PromiseState, Realm, Value, VmError};
use tracing_subscriber::filter::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn resolved(realm: &Realm, value: Value) -> Value {
    let promise = realm.new_promise_object(&realm.intrinsics().promise_prototype);
    realm.resolve_promise(&promise, value);
    Value::object(promise)
}

fn rejected(realm: &Realm, reason: Value) -> Value {
    let promise = realm.new_promise_object(&realm.intrinsics().promise_prototype);
    realm.reject_promise(&promise, reason);
    Value::object(promise)
}

/// A pending promise and its `(resolve, reject)` functions
fn deferred(realm: &Realm) -> (Value, Value, Value) {
    let promise = realm.new_promise_object(&realm.intrinsics().promise_prototype);
    let (resolve, reject) = realm.create_resolving_functions(&promise);
    (Value::object(promise), resolve, reject)
}

fn array(realm: &Realm, items: Vec<Value>) -> Value {
    Value::object(realm.new_array(items))
}

fn combinator(primordials: &Primordials, name: &str) -> Value {
    primordials.registry().require(name).unwrap().clone()
}

fn run(realm: &Realm, f: &Value, args: &[Value]) -> Value {
    let promise = realm.call(f, &Value::undefined(), args).unwrap();
    realm.run_jobs().unwrap();
    promise
}

fn fulfilled_value(realm: &Realm, promise: &Value) -> Value {
    match realm.promise_state(promise) {
        Some(PromiseState::Fulfilled(value)) => value,
        other => panic!("expected fulfilled, got {other:?}"),
    }
}

fn rejection(realm: &Realm, promise: &Value) -> Value {
    match realm.promise_state(promise) {
        Some(PromiseState::Rejected(reason)) => reason,
        other => panic!("expected rejected, got {other:?}"),
    }
}

fn patch_promise_machinery(realm: &Realm) {
    let i = realm.intrinsics();
    let poisoned = realm.new_function("poisoned", 0, |_realm, _this, _args| {
        Err(VmError::type_error("promise machinery was patched"))
    });
    for key in ["then", "catch", "finally"] {
        realm
            .put(&Value::object(i.promise_prototype.clone()), key, poisoned.clone())
            .unwrap();
    }
    for key in ["resolve", "all", "allSettled", "any", "race"] {
        realm
            .put(&Value::object(i.promise_constructor.clone()), key, poisoned.clone())
            .unwrap();
    }
    let iterator = realm.intrinsics().symbols.iterator.clone();
    realm
        .put(&Value::object(i.array_prototype.clone()), &iterator, poisoned)
        .unwrap();
}

#[test]
fn test_all_rejects_with_first_rejection() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let input = array(
        &realm,
        vec![Value::from(1), rejected(&realm, Value::from("x")), Value::from(2)],
    );
    let out = run(&realm, &combinator(&primordials, "SafePromiseAll"), &[input]);
    assert_eq!(rejection(&realm, &out).as_str(), Some("x"));
}

#[test]
fn test_all_settled_keeps_input_order() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let input = array(
        &realm,
        vec![Value::from(1), rejected(&realm, Value::from("x")), Value::from(2)],
    );
    let out = run(&realm, &combinator(&primordials, "SafePromiseAllSettled"), &[input]);
    let records = fulfilled_value(&realm, &out);
    let records = records.as_object().unwrap().array_elements().unwrap();
    let summary: Vec<(String, String)> = records
        .iter()
        .map(|record| {
            let status = realm.get(record, "status").unwrap();
            let payload = if status.as_str() == Some("fulfilled") {
                realm.get(record, "value").unwrap()
            } else {
                realm.get(record, "reason").unwrap()
            };
            (
                status.as_str().unwrap().to_string(),
                realm.to_string(&payload).unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("fulfilled".to_string(), "1".to_string()),
            ("rejected".to_string(), "x".to_string()),
            ("fulfilled".to_string(), "2".to_string()),
        ]
    );
}

#[test]
fn test_all_orders_by_input_not_completion() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let (slow, resolve_slow, _) = deferred(&realm);
    let (fast, resolve_fast, _) = deferred(&realm);
    let all = combinator(&primordials, "SafePromiseAll");
    let out = realm
        .call(&all, &Value::undefined(), &[array(&realm, vec![slow, fast])])
        .unwrap();

    realm.call(&resolve_fast, &Value::undefined(), &[Value::from("fast")]).unwrap();
    realm.run_jobs().unwrap();
    assert!(matches!(realm.promise_state(&out), Some(PromiseState::Pending)));
    realm.call(&resolve_slow, &Value::undefined(), &[Value::from("slow")]).unwrap();
    realm.run_jobs().unwrap();

    let values = fulfilled_value(&realm, &out);
    let values: Vec<String> = values
        .as_object()
        .unwrap()
        .array_elements()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(values, vec!["slow".to_string(), "fast".to_string()]);
}

#[test]
fn test_any_aggregates_every_reason() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let any = combinator(&primordials, "SafePromiseAny");

    let both_rejected = array(
        &realm,
        vec![rejected(&realm, Value::from(1)), rejected(&realm, Value::from(2))],
    );
    let out = run(&realm, &any, &[both_rejected]);
    let error = rejection(&realm, &out);
    let errors = realm.get(&error, "errors").unwrap();
    let errors: Vec<f64> = errors
        .as_object()
        .unwrap()
        .array_elements()
        .unwrap()
        .iter()
        .map(|v| v.as_number().unwrap())
        .collect();
    assert_eq!(errors, vec![1.0, 2.0]);

    let one_fulfilled = array(
        &realm,
        vec![rejected(&realm, Value::from(1)), resolved(&realm, Value::from(3))],
    );
    let out = run(&realm, &any, &[one_fulfilled]);
    assert_eq!(fulfilled_value(&realm, &out).as_number(), Some(3.0));
}

#[test]
fn test_race_settles_like_first_settled_input() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let race = combinator(&primordials, "SafePromiseRace");
    let (pending, _, _) = deferred(&realm);
    let out = run(
        &realm,
        &race,
        &[array(&realm, vec![pending, rejected(&realm, Value::from("late"))])],
    );
    assert_eq!(rejection(&realm, &out).as_str(), Some("late"));

    let never = run(&realm, &race, &[array(&realm, vec![])]);
    assert!(matches!(realm.promise_state(&never), Some(PromiseState::Pending)));
}

#[test]
fn test_all_rejects_with_earliest_completed_rejection() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let all = combinator(&primordials, "SafePromiseAll");
    let (first, _, reject_first) = deferred(&realm);
    let (second, resolve_second, _) = deferred(&realm);
    let (third, _, reject_third) = deferred(&realm);
    let out = run(&realm, &all, &[array(&realm, vec![first, second, third])]);
    assert!(matches!(realm.promise_state(&out), Some(PromiseState::Pending)));

    realm
        .call(&reject_third, &Value::undefined(), &[Value::from("third settled first")])
        .unwrap();
    realm.run_jobs().unwrap();
    realm
        .call(&reject_first, &Value::undefined(), &[Value::from("first settled last")])
        .unwrap();
    realm.call(&resolve_second, &Value::undefined(), &[Value::from(2)]).unwrap();
    realm.run_jobs().unwrap();

    assert_eq!(rejection(&realm, &out).as_str(), Some("third settled first"));
}

#[test]
fn test_race_fulfills_with_first_fulfilled_input() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let race = combinator(&primordials, "SafePromiseRace");
    let (slow, _, reject_slow) = deferred(&realm);
    let (fast, resolve_fast, _) = deferred(&realm);
    let out = run(&realm, &race, &[array(&realm, vec![slow, fast])]);

    realm.call(&resolve_fast, &Value::undefined(), &[Value::from("fast")]).unwrap();
    realm.run_jobs().unwrap();
    realm.call(&reject_slow, &Value::undefined(), &[Value::from("slow")]).unwrap();
    realm.run_jobs().unwrap();

    assert_eq!(fulfilled_value(&realm, &out).as_str(), Some("fast"));
}

#[test]
fn test_combinators_ignore_patched_promise_machinery() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let inputs = vec![
        resolved(&realm, Value::from("a")),
        Value::from("b"),
        resolved(&realm, Value::from("c")),
    ];
    patch_promise_machinery(&realm);

    let out = run(
        &realm,
        &combinator(&primordials, "SafePromiseAllReturnArrayLike"),
        &[array(&realm, inputs.clone())],
    );
    let values = fulfilled_value(&realm, &out);
    let values = values.as_object().unwrap();
    assert!(values.prototype().is_none());
    assert_eq!(values.array_len(), 3);

    let void = run(
        &realm,
        &combinator(&primordials, "SafePromiseAllReturnVoid"),
        &[array(&realm, inputs.clone())],
    );
    assert!(fulfilled_value(&realm, &void).is_undefined());

    let settled_void = run(
        &realm,
        &combinator(&primordials, "SafePromiseAllSettledReturnVoid"),
        &[array(&realm, inputs)],
    );
    assert!(fulfilled_value(&realm, &settled_void).is_undefined());
}

#[test]
fn test_map_fn_runs_per_element_and_errors_reject() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let all = combinator(&primordials, "SafePromiseAll");

    let double = realm.new_function("double", 2, |realm, _this, args| {
        let n = realm.to_number(&args[0])?;
        Ok(Value::from(n * 2.0))
    });
    let input = array(&realm, vec![Value::from(1), Value::from(2)]);
    let out = run(&realm, &all, &[input.clone(), double]);
    let values = fulfilled_value(&realm, &out);
    assert_eq!(realm.get(&values, 1u32).unwrap().as_number(), Some(4.0));

    let failing = realm.new_function("failing", 2, |_realm, _this, _args| {
        Err(VmError::type_error("mapFn failed"))
    });
    let out = realm.call(&all, &Value::undefined(), &[input, failing]).unwrap();
    let reason = rejection(&realm, &out);
    assert_eq!(
        realm.to_string(&reason).unwrap().as_ref(),
        "TypeError: mapFn failed"
    );

    let not_array = realm.call(&all, &Value::undefined(), &[Value::from(5)]).unwrap();
    assert!(matches!(realm.promise_state(&not_array), Some(PromiseState::Rejected(_))));
}

#[test]
fn test_finally_preserves_outcome() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let finally = combinator(&primordials, "SafePromisePrototypeFinally");
    patch_promise_machinery(&realm);

    let calls = Arc::new(Mutex::new(0));
    let on_finally = {
        let calls = calls.clone();
        realm.new_function("onFinally", 0, move |_realm, _this, _args| {
            *calls.lock() += 1;
            Ok(Value::from("ignored"))
        })
    };

    let out = run(&realm, &finally, &[resolved(&realm, Value::from("value")), on_finally.clone()]);
    assert_eq!(fulfilled_value(&realm, &out).as_str(), Some("value"));

    let out = run(&realm, &finally, &[rejected(&realm, Value::from("reason")), on_finally]);
    assert_eq!(rejection(&realm, &out).as_str(), Some("reason"));
    assert_eq!(*calls.lock(), 2);
}

#[test]
fn test_finally_propagates_on_finally_failures() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let finally = combinator(&primordials, "SafePromisePrototypeFinally");

    let throws = realm.new_function("throws", 0, |realm, _this, _args| {
        Err(VmError::exception(realm.new_error(primordials_realm::ErrorKind::Error, "cleanup failed")))
    });
    let out = run(&realm, &finally, &[resolved(&realm, Value::from(1)), throws]);
    let reason = rejection(&realm, &out);
    assert_eq!(realm.get(&reason, "message").unwrap().as_str(), Some("cleanup failed"));

    let returns_rejection = realm.new_function("returnsRejection", 0, |realm, _this, _args| {
        let promise = realm.new_promise_object(&realm.intrinsics().promise_prototype);
        realm.reject_promise(&promise, Value::from("async cleanup failed"));
        Ok(Value::object(promise))
    });
    let out = run(&realm, &finally, &[resolved(&realm, Value::from(1)), returns_rejection]);
    assert_eq!(rejection(&realm, &out).as_str(), Some("async cleanup failed"));
}

#[test]
fn test_rust_api_matches_registered_functions() {
    init_tracing();
    let realm = Realm::new();
    let primordials = Primordials::install(&realm).unwrap();
    let combinators = primordials.combinators();
    let items = [Value::from(1), resolved(&realm, Value::from(2))];

    let all = combinators.all(&realm, &items, None).unwrap();
    let settled = combinators.all_settled(&realm, &items, None).unwrap();
    let race = combinators.race(&realm, &items, None).unwrap();
    realm.run_jobs().unwrap();

    assert_eq!(fulfilled_value(&realm, &all).as_object().unwrap().array_len(), 2);
    assert_eq!(fulfilled_value(&realm, &settled).as_object().unwrap().array_len(), 2);
    assert_eq!(fulfilled_value(&realm, &race).as_number(), Some(1.0));
}
