//! Promise combinators that never consult `then` or `Promise.resolve`.
//!
//! Every input is first adopted by a fresh `%InternalPromise%` and all
//! chaining happens through host-level reactions on those internal promises.
//! The caller only ever sees the public promise minted for the result.

use std::sync::Arc;

use parking_lot::Mutex;
use primordials_realm::{
    JsObject, JsPromise, PromiseCapability, ReactionHandler, Realm, Value, VmError, VmResult, arg,
};

use crate::capture::{Owner, capture};
use crate::error::{BootstrapError, BootstrapResult};
use crate::uncurry::read_array_like;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    All,
    AllReturnArrayLike,
    AllReturnVoid,
    AllSettled,
    AllSettledReturnVoid,
    Any,
    Race,
}

/// A promise from `%InternalPromise%` that has adopted some input
struct InternalFuture {
    promise: Arc<JsPromise>,
}

impl InternalFuture {
    fn on_settled<F, R>(&self, realm: &Realm, on_fulfilled: F, on_rejected: R)
    where
        F: Fn(&Realm, Value) -> VmResult<Value> + Send + Sync + 'static,
        R: Fn(&Realm, Value) -> VmResult<Value> + Send + Sync + 'static,
    {
        realm.perform_promise_then(
            &self.promise,
            ReactionHandler::native(on_fulfilled),
            ReactionHandler::native(on_rejected),
            None,
        );
    }
}

/// Shared bookkeeping of one combinator call
struct Aggregate {
    mode: Mode,
    capability: PromiseCapability,
    slots: Mutex<Slots>,
}

struct Slots {
    values: Vec<Value>,
    remaining: usize,
}

impl Aggregate {
    fn resolve(&self, realm: &Realm, value: Value) -> VmResult<Value> {
        realm.call(&self.capability.resolve, &Value::undefined(), &[value])
    }

    fn reject(&self, realm: &Realm, reason: Value) -> VmResult<Value> {
        realm.call(&self.capability.reject, &Value::undefined(), &[reason])
    }

    /// Record a branch outcome. The last branch to report completes the
    /// aggregate.
    fn store(&self, realm: &Realm, index: usize, value: Value) -> VmResult<Value> {
        let done = {
            let mut slots = self.slots.lock();
            if let Some(slot) = slots.values.get_mut(index) {
                *slot = value;
            }
            slots.remaining -= 1;
            slots.remaining == 0
        };
        if done {
            self.complete(realm)?;
        }
        Ok(Value::undefined())
    }

    fn complete(&self, realm: &Realm) -> VmResult<Value> {
        let values = std::mem::take(&mut self.slots.lock().values);
        match self.mode {
            Mode::All | Mode::AllSettled => {
                self.resolve(realm, Value::object(realm.new_array(values)))
            }
            Mode::AllReturnArrayLike => {
                let array = Arc::new(JsObject::array(None, values));
                self.resolve(realm, Value::object(array))
            }
            Mode::AllReturnVoid | Mode::AllSettledReturnVoid => {
                self.resolve(realm, Value::undefined())
            }
            Mode::Any => {
                let error = realm.new_aggregate_error(values, "All promises were rejected");
                self.reject(realm, error)
            }
            Mode::Race => Ok(Value::undefined()),
        }
    }
}

/// `{ status, <key>: value }`
fn settled_record(realm: &Realm, status: &str, key: &str, value: Value) -> Value {
    let record = realm.new_object();
    realm.create_data_property(&record, "status", Value::from(status));
    realm.create_data_property(&record, key, value);
    Value::object(record)
}

/// Reject through `reject` instead of failing the reaction job
fn reject_on_error(realm: &Realm, reject: &Value, result: VmResult<Value>) -> VmResult<Value> {
    if let Err(error) = result {
        let reason = realm.error_to_value(&error);
        realm.call(reject, &Value::undefined(), &[reason])?;
    }
    Ok(Value::undefined())
}

/// The safe combinators of one realm
#[derive(Clone, Debug)]
pub struct Combinators {
    promise_ctor: Value,
    internal_ctor: Value,
}

impl Combinators {
    pub fn new(realm: &Realm) -> BootstrapResult<Self> {
        let i = realm.intrinsics();
        let global = realm.global();
        let promise_ctor = capture(Owner::new("globalThis", global), "Promise")?;
        if !promise_ctor.is_constructor() {
            return Err(BootstrapError::wrong_shape("Promise", "constructor"));
        }
        Ok(Self {
            promise_ctor,
            internal_ctor: Value::object(i.internal_promise_constructor.clone()),
        })
    }

    fn public_capability(&self, realm: &Realm) -> VmResult<PromiseCapability> {
        realm.new_promise_capability(&self.promise_ctor)
    }

    /// Adopt `value` into a fresh internal promise. Promises are linked
    /// through their reaction lists; anything else goes through the
    /// internal resolve function.
    fn to_internal(&self, realm: &Realm, value: Value) -> VmResult<InternalFuture> {
        let capability = realm.new_promise_capability(&self.internal_ctor)?;
        let promise = capability
            .promise
            .as_object()
            .and_then(|o| o.as_promise())
            .cloned()
            .ok_or_else(|| VmError::internal("internal promise constructor returned a non-promise"))?;
        match value.as_object().and_then(|o| o.as_promise()) {
            Some(source) => realm.perform_promise_then(
                source,
                ReactionHandler::Js(capability.resolve),
                ReactionHandler::Js(capability.reject),
                None,
            ),
            None => {
                realm.call(&capability.resolve, &Value::undefined(), &[value])?;
            }
        }
        Ok(InternalFuture { promise })
    }

    fn rejected(&self, realm: &Realm, error: &VmError) -> VmResult<Value> {
        let capability = self.public_capability(realm)?;
        let reason = realm.error_to_value(error);
        realm.call(&capability.reject, &Value::undefined(), &[reason])?;
        Ok(capability.promise)
    }

    fn aggregate(
        &self,
        realm: &Realm,
        items: &[Value],
        map_fn: Option<&Value>,
        mode: Mode,
    ) -> VmResult<Value> {
        let capability = self.public_capability(realm)?;
        let aggregate = Arc::new(Aggregate {
            mode,
            capability: capability.clone(),
            slots: Mutex::new(Slots {
                values: vec![Value::undefined(); items.len()],
                remaining: items.len(),
            }),
        });
        let launched = if items.is_empty() {
            aggregate.complete(realm).map(|_| ())
        } else {
            self.launch(realm, items, map_fn, &aggregate)
        };
        if let Err(error) = launched {
            tracing::trace!(%error, "combinator launch failed");
            let reason = realm.error_to_value(&error);
            aggregate.reject(realm, reason)?;
        }
        Ok(capability.promise)
    }

    fn launch(
        &self,
        realm: &Realm,
        items: &[Value],
        map_fn: Option<&Value>,
        aggregate: &Arc<Aggregate>,
    ) -> VmResult<()> {
        for (index, item) in items.iter().enumerate() {
            let item = match map_fn {
                Some(f) => realm.call(f, &Value::undefined(), &[item.clone(), Value::from(index)])?,
                None => item.clone(),
            };
            let future = self.to_internal(realm, item)?;
            let (ok, err) = (aggregate.clone(), aggregate.clone());
            let reject = aggregate.capability.reject.clone();
            match aggregate.mode {
                Mode::All | Mode::AllReturnArrayLike | Mode::AllReturnVoid => future.on_settled(
                    realm,
                    move |realm, value| {
                        let result = ok.store(realm, index, value);
                        reject_on_error(realm, &reject, result)
                    },
                    move |realm, reason| err.reject(realm, reason),
                ),
                Mode::AllSettled | Mode::AllSettledReturnVoid => future.on_settled(
                    realm,
                    move |realm, value| {
                        let record = settled_record(realm, "fulfilled", "value", value);
                        ok.store(realm, index, record)
                    },
                    move |realm, reason| {
                        let record = settled_record(realm, "rejected", "reason", reason);
                        let result = err.store(realm, index, record);
                        reject_on_error(realm, &reject, result)
                    },
                ),
                Mode::Any => future.on_settled(
                    realm,
                    move |realm, value| ok.resolve(realm, value),
                    move |realm, reason| {
                        let result = err.store(realm, index, reason);
                        reject_on_error(realm, &reject, result)
                    },
                ),
                Mode::Race => future.on_settled(
                    realm,
                    move |realm, value| ok.resolve(realm, value),
                    move |realm, reason| err.reject(realm, reason),
                ),
            }
        }
        Ok(())
    }

    /// Fulfills with every value in input order, or rejects with the first
    /// rejection
    pub fn all(&self, realm: &Realm, items: &[Value], map_fn: Option<&Value>) -> VmResult<Value> {
        self.aggregate(realm, items, map_fn, Mode::All)
    }

    /// Like [`Combinators::all`] but fulfills with a null-prototype array
    pub fn all_return_array_like(
        &self,
        realm: &Realm,
        items: &[Value],
        map_fn: Option<&Value>,
    ) -> VmResult<Value> {
        self.aggregate(realm, items, map_fn, Mode::AllReturnArrayLike)
    }

    /// Like [`Combinators::all`] but fulfills with `undefined`
    pub fn all_return_void(
        &self,
        realm: &Realm,
        items: &[Value],
        map_fn: Option<&Value>,
    ) -> VmResult<Value> {
        self.aggregate(realm, items, map_fn, Mode::AllReturnVoid)
    }

    /// Never rejects; fulfills with `{status, value|reason}` records
    pub fn all_settled(
        &self,
        realm: &Realm,
        items: &[Value],
        map_fn: Option<&Value>,
    ) -> VmResult<Value> {
        self.aggregate(realm, items, map_fn, Mode::AllSettled)
    }

    pub fn all_settled_return_void(
        &self,
        realm: &Realm,
        items: &[Value],
        map_fn: Option<&Value>,
    ) -> VmResult<Value> {
        self.aggregate(realm, items, map_fn, Mode::AllSettledReturnVoid)
    }

    /// First fulfillment wins; rejects with an AggregateError when every
    /// input rejected (immediately for an empty input)
    pub fn any(&self, realm: &Realm, items: &[Value], map_fn: Option<&Value>) -> VmResult<Value> {
        self.aggregate(realm, items, map_fn, Mode::Any)
    }

    /// Settles like the first input to settle. An empty input never settles.
    pub fn race(&self, realm: &Realm, items: &[Value], map_fn: Option<&Value>) -> VmResult<Value> {
        self.aggregate(realm, items, map_fn, Mode::Race)
    }

    /// Run `on_finally` after `promise` settles and forward the original
    /// outcome, unless `on_finally` throws or returns a promise that rejects.
    pub fn finally(&self, realm: &Realm, promise: Value, on_finally: Value) -> VmResult<Value> {
        let capability = self.public_capability(realm)?;
        let future = match self.to_internal(realm, promise) {
            Ok(future) => future,
            Err(error) => {
                let reason = realm.error_to_value(&error);
                realm.call(&capability.reject, &Value::undefined(), &[reason])?;
                return Ok(capability.promise);
            }
        };
        let fulfilled = FinallyStep {
            combinators: self.clone(),
            capability: capability.clone(),
            on_finally: on_finally.clone(),
            rejected: false,
        };
        let rejected = FinallyStep {
            rejected: true,
            ..fulfilled.clone()
        };
        future.on_settled(
            realm,
            move |realm, value| fulfilled.run(realm, value),
            move |realm, reason| rejected.run(realm, reason),
        );
        Ok(capability.promise)
    }

    /// The combinators as realm functions, named as registered
    pub fn functions(&self, realm: &Realm) -> Vec<(&'static str, Value)> {
        let modes = [
            ("SafePromiseAll", Mode::All),
            ("SafePromiseAllReturnArrayLike", Mode::AllReturnArrayLike),
            ("SafePromiseAllReturnVoid", Mode::AllReturnVoid),
            ("SafePromiseAllSettled", Mode::AllSettled),
            ("SafePromiseAllSettledReturnVoid", Mode::AllSettledReturnVoid),
            ("SafePromiseAny", Mode::Any),
            ("SafePromiseRace", Mode::Race),
        ];
        let mut functions: Vec<(&'static str, Value)> = modes
            .into_iter()
            .map(|(name, mode)| {
                let combinators = self.clone();
                let func = realm.new_function(name, 1, move |realm, _this, args| {
                    let map_fn = args.get(1).filter(|f| !f.is_undefined());
                    match read_array_like(realm, &arg(args, 0)) {
                        Ok(items) => combinators.aggregate(realm, &items, map_fn, mode),
                        Err(error) => combinators.rejected(realm, &error),
                    }
                });
                (name, func)
            })
            .collect();

        let combinators = self.clone();
        let finally = realm.new_function("SafePromisePrototypeFinally", 2, move |realm, _this, args| {
            combinators.finally(realm, arg(args, 0), arg(args, 1))
        });
        functions.push(("SafePromisePrototypeFinally", finally));
        functions
    }
}

#[derive(Clone)]
struct FinallyStep {
    combinators: Combinators,
    capability: PromiseCapability,
    on_finally: Value,
    rejected: bool,
}

impl FinallyStep {
    fn forward(&self, realm: &Realm, outcome: Value) -> VmResult<Value> {
        let target = if self.rejected {
            &self.capability.reject
        } else {
            &self.capability.resolve
        };
        realm.call(target, &Value::undefined(), &[outcome])
    }

    fn run(&self, realm: &Realm, outcome: Value) -> VmResult<Value> {
        if !self.on_finally.is_callable() {
            return self.forward(realm, outcome);
        }
        let waited = realm
            .call(&self.on_finally, &Value::undefined(), &[])
            .and_then(|result| self.combinators.to_internal(realm, result));
        let future = match waited {
            Ok(future) => future,
            Err(error) => {
                let reason = realm.error_to_value(&error);
                return realm.call(&self.capability.reject, &Value::undefined(), &[reason]);
            }
        };
        let step = self.clone();
        let reject = self.capability.reject.clone();
        future.on_settled(
            realm,
            move |realm, _| step.forward(realm, outcome.clone()),
            move |realm, reason| realm.call(&reject, &Value::undefined(), &[reason]),
        );
        Ok(Value::undefined())
    }
}

#[cfg(test)]
mod tests {
    use primordials_realm::PromiseState;

    use super::*;

    fn rejected(realm: &Realm, reason: Value) -> Value {
        let promise = realm.new_promise_object(&realm.intrinsics().promise_prototype);
        realm.reject_promise(&promise, reason);
        Value::object(promise)
    }

    #[test]
    fn test_all_rejects_with_first_rejection() {
        let realm = Realm::new();
        let combinators = Combinators::new(&realm).unwrap();
        let items = [Value::from(1), rejected(&realm, Value::from("x")), Value::from(2)];
        let out = combinators.all(&realm, &items, None).unwrap();
        realm.run_jobs().unwrap();
        match realm.promise_state(&out) {
            Some(PromiseState::Rejected(reason)) => assert_eq!(reason.as_str(), Some("x")),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_empty_inputs() {
        let realm = Realm::new();
        let combinators = Combinators::new(&realm).unwrap();
        let all = combinators.all(&realm, &[], None).unwrap();
        let race = combinators.race(&realm, &[], None).unwrap();
        let any = combinators.any(&realm, &[], None).unwrap();
        realm.run_jobs().unwrap();
        assert!(matches!(realm.promise_state(&all), Some(PromiseState::Fulfilled(_))));
        assert!(matches!(realm.promise_state(&race), Some(PromiseState::Pending)));
        assert!(matches!(realm.promise_state(&any), Some(PromiseState::Rejected(_))));
    }

    #[test]
    fn test_map_fn_error_rejects_instead_of_throwing() {
        let realm = Realm::new();
        let combinators = Combinators::new(&realm).unwrap();
        let map_fn = realm.new_function("map", 2, |_realm, _this, _args| {
            Err(VmError::type_error("boom"))
        });
        let out = combinators
            .all(&realm, &[Value::from(1)], Some(&map_fn))
            .unwrap();
        assert!(matches!(realm.promise_state(&out), Some(PromiseState::Rejected(_))));
    }

    #[test]
    fn test_oversized_array_like_rejects_with_range_error() {
        let realm = Realm::new();
        let combinators = Combinators::new(&realm).unwrap();
        let like = realm.new_object();
        realm.create_data_property(&like, "length", Value::number(1e15));
        let like = Value::object(like);

        for (name, func) in combinators.functions(&realm) {
            if name == "SafePromisePrototypeFinally" {
                continue;
            }
            let out = realm.call(&func, &Value::undefined(), &[like.clone()]).unwrap();
            let Some(PromiseState::Rejected(reason)) = realm.promise_state(&out) else {
                panic!("{name} did not reject");
            };
            let error_name = realm.get(&reason, "name").unwrap();
            assert_eq!(error_name.as_str(), Some("RangeError"), "{name}");
        }
    }

    #[test]
    fn test_array_like_result_has_no_prototype() {
        let realm = Realm::new();
        let combinators = Combinators::new(&realm).unwrap();
        let out = combinators
            .all_return_array_like(&realm, &[Value::from(1)], None)
            .unwrap();
        realm.run_jobs().unwrap();
        let Some(PromiseState::Fulfilled(value)) = realm.promise_state(&out) else {
            panic!("not fulfilled");
        };
        let array = value.as_object().unwrap();
        assert!(array.prototype().is_none());
        assert_eq!(array.array_len(), 1);
    }
}
