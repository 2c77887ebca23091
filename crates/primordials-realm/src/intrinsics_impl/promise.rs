//! Promise constructor, statics and Promise.prototype.
//!
//! Everything here uses ordinary dispatch: the combinators read
//! `C.resolve` and call `then` through `[[Get]]` on every element, which is
//! exactly what makes them observable to prototype pollution. The same code
//! installs the unexported `%InternalPromise%` pair.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::helpers::{define_to_string_tag, species_getter};
use crate::builtin_builder::BuiltInBuilder;
use crate::error::{VmError, VmResult};
use crate::function::arg;
use crate::intrinsics::InitContext;
use crate::iterator::IteratorRecord;
use crate::object::{JsObject, ObjectKind};
use crate::promise::{JsPromise, PromiseCapability, ReactionHandler};
use crate::realm::Realm;
use crate::value::Value;

/// Which constructor/prototype pair is being installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseFlavor {
    /// `%Promise%`, reachable from the global object
    Public,
    /// `%InternalPromise%`, host-only
    Internal,
}

impl PromiseFlavor {
    fn name(self) -> &'static str {
        match self {
            Self::Public => "Promise",
            Self::Internal => "InternalPromise",
        }
    }

    fn default_constructor(self, realm: &Realm) -> &Arc<JsObject> {
        match self {
            Self::Public => &realm.intrinsics().promise_constructor,
            Self::Internal => &realm.intrinsics().internal_promise_constructor,
        }
    }
}

pub(crate) fn init(
    cx: &InitContext<'_>,
    prototype: &Arc<JsObject>,
    flavor: PromiseFlavor,
) -> Arc<JsObject> {
    let default_proto = prototype.clone();
    let ctor = BuiltInBuilder::new(cx.fn_proto, prototype.clone(), flavor.name())
        .inherits(cx.object_prototype)
        .constructor_fn(
            move |realm, args, new_target| promise_construct(realm, args, new_target, &default_proto),
            1,
        )
        .static_method("all", |realm, this, args| {
            promise_combinator(realm, this, args, Combinator::All)
        }, 1)
        .static_method("allSettled", |realm, this, args| {
            promise_combinator(realm, this, args, Combinator::AllSettled)
        }, 1)
        .static_method("any", |realm, this, args| {
            promise_combinator(realm, this, args, Combinator::Any)
        }, 1)
        .static_method("race", |realm, this, args| {
            promise_combinator(realm, this, args, Combinator::Race)
        }, 1)
        .static_method("resolve", promise_static_resolve, 1)
        .static_method("reject", promise_static_reject, 1)
        .static_method("withResolvers", promise_with_resolvers, 0)
        .static_getter(&cx.symbols.species, species_getter)
        .method("then", move |realm, this, args| promise_then(realm, this, args, flavor), 2)
        .method("catch", |realm, this, args| {
            realm.invoke(this, "then", &[Value::undefined(), arg(args, 0)])
        }, 1)
        .method("finally", move |realm, this, args| promise_finally(realm, this, args, flavor), 1)
        .build();
    define_to_string_tag(prototype, &cx.symbols.to_string_tag, flavor.name());
    ctor
}

fn promise_construct(
    realm: &Realm,
    args: &[Value],
    new_target: &Arc<JsObject>,
    default_proto: &Arc<JsObject>,
) -> VmResult<Value> {
    let executor = arg(args, 0);
    if !executor.is_callable() {
        return Err(VmError::type_error(format!(
            "Promise resolver {} is not a function",
            realm.describe(&executor)
        )));
    }
    let promise = realm.create_from_constructor(
        new_target,
        default_proto,
        ObjectKind::Promise(Arc::new(JsPromise::new())),
    )?;
    let (resolve, reject) = realm.create_resolving_functions(&promise);
    if let Err(error) = realm.call(&executor, &Value::undefined(), &[resolve, reject.clone()]) {
        let reason = realm.error_to_value(&error);
        realm.call(&reject, &Value::undefined(), &[reason])?;
    }
    Ok(Value::object(promise))
}

fn this_constructor<'a>(this: &'a Value, method: &str) -> VmResult<&'a Value> {
    if this.is_object() {
        Ok(this)
    } else {
        Err(VmError::type_error(format!("{method} called on non-object")))
    }
}

fn promise_static_resolve(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let ctor = this_constructor(this, "Promise.resolve")?;
    realm.promise_resolve(ctor, arg(args, 0))
}

fn promise_static_reject(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let capability = realm.new_promise_capability(this)?;
    realm.call(&capability.reject, &Value::undefined(), &[arg(args, 0)])?;
    Ok(capability.promise)
}

fn promise_with_resolvers(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let capability = realm.new_promise_capability(this)?;
    let obj = realm.new_object();
    realm.create_data_property(&obj, "promise", capability.promise);
    realm.create_data_property(&obj, "resolve", capability.resolve);
    realm.create_data_property(&obj, "reject", capability.reject);
    Ok(Value::object(obj))
}

// ============================================================================
// Combinators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    All,
    AllSettled,
    Any,
    Race,
}

/// Shared `[[Values]]` / `[[Errors]]` list and `[[RemainingElements]]`
struct ElementState {
    values: Mutex<Vec<Value>>,
    remaining: AtomicUsize,
}

impl ElementState {
    fn store(&self, index: usize, value: Value) {
        if let Some(slot) = self.values.lock().get_mut(index) {
            *slot = value;
        }
    }

    /// Decrement the counter; true when this was the last element
    fn finish_one(&self) -> bool {
        self.remaining.fetch_sub(1, Ordering::AcqRel) == 1
    }
}

fn promise_combinator(
    realm: &Realm,
    this: &Value,
    args: &[Value],
    kind: Combinator,
) -> VmResult<Value> {
    let capability = realm.new_promise_capability(this)?;
    if let Err(error) = run_combinator(realm, this, &arg(args, 0), &capability, kind) {
        let reason = realm.error_to_value(&error);
        realm.call(&capability.reject, &Value::undefined(), &[reason])?;
    }
    Ok(capability.promise)
}

fn run_combinator(
    realm: &Realm,
    ctor: &Value,
    iterable: &Value,
    capability: &PromiseCapability,
    kind: Combinator,
) -> VmResult<()> {
    let promise_resolve = realm.get(ctor, "resolve")?;
    if !promise_resolve.is_callable() {
        return Err(VmError::type_error("Promise resolve is not a function"));
    }
    let mut record = realm.get_iterator(iterable)?;
    let state = Arc::new(ElementState {
        values: Mutex::new(Vec::new()),
        remaining: AtomicUsize::new(1),
    });

    let mut index = 0;
    while let Some(next) = realm.iterator_step_value(&mut record)? {
        if let Err(error) =
            link_element(realm, ctor, &promise_resolve, next, index, &state, capability, kind)
        {
            close_quietly(realm, &record);
            return Err(error);
        }
        index += 1;
    }

    if state.finish_one() {
        let values = std::mem::take(&mut *state.values.lock());
        match kind {
            Combinator::All | Combinator::AllSettled => {
                let array = Value::object(realm.new_array(values));
                realm.call(&capability.resolve, &Value::undefined(), &[array])?;
            }
            Combinator::Any => {
                let error = realm.new_aggregate_error(values, "All promises were rejected");
                realm.call(&capability.reject, &Value::undefined(), &[error])?;
            }
            Combinator::Race => {}
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn link_element(
    realm: &Realm,
    ctor: &Value,
    promise_resolve: &Value,
    next: Value,
    index: usize,
    state: &Arc<ElementState>,
    capability: &PromiseCapability,
    kind: Combinator,
) -> VmResult<()> {
    let next_promise = realm.call(promise_resolve, ctor, &[next])?;
    let (on_fulfilled, on_rejected) = match kind {
        Combinator::Race => (capability.resolve.clone(), capability.reject.clone()),
        Combinator::All => {
            state.values.lock().push(Value::undefined());
            state.remaining.fetch_add(1, Ordering::AcqRel);
            let resolve = element_function(realm, index, state, capability, None, |_realm, v| Ok(v));
            (resolve, capability.reject.clone())
        }
        Combinator::AllSettled => {
            state.values.lock().push(Value::undefined());
            state.remaining.fetch_add(1, Ordering::AcqRel);
            let called = Arc::new(AtomicBool::new(false));
            let fulfilled = element_function(realm, index, state, capability, Some(&called), |realm, v| {
                Ok(settled_record(realm, "fulfilled", "value", v))
            });
            let rejected = element_function(realm, index, state, capability, Some(&called), |realm, v| {
                Ok(settled_record(realm, "rejected", "reason", v))
            });
            (fulfilled, rejected)
        }
        Combinator::Any => {
            state.values.lock().push(Value::undefined());
            state.remaining.fetch_add(1, Ordering::AcqRel);
            let reject = any_reject_element(realm, index, state, capability);
            (capability.resolve.clone(), reject)
        }
    };
    realm.invoke(&next_promise, "then", &[on_fulfilled, on_rejected])?;
    Ok(())
}

/// `{ status, <key>: value }` for allSettled
fn settled_record(realm: &Realm, status: &str, key: &str, value: Value) -> Value {
    let obj = realm.new_object();
    realm.create_data_property(&obj, "status", Value::from(status));
    realm.create_data_property(&obj, key, value);
    Value::object(obj)
}

/// Promise.all / allSettled resolve element function. `shared_called` ties
/// the fulfilled and rejected functions of one allSettled element together.
fn element_function<F>(
    realm: &Realm,
    index: usize,
    state: &Arc<ElementState>,
    capability: &PromiseCapability,
    shared_called: Option<&Arc<AtomicBool>>,
    wrap: F,
) -> Value
where
    F: Fn(&Realm, Value) -> VmResult<Value> + Send + Sync + 'static,
{
    let state = state.clone();
    let capability = capability.clone();
    let already_called = shared_called
        .cloned()
        .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
    realm.new_function("", 1, move |realm, _this, args| {
        if already_called.swap(true, Ordering::AcqRel) {
            return Ok(Value::undefined());
        }
        state.store(index, wrap(realm, arg(args, 0))?);
        if state.finish_one() {
            let values = std::mem::take(&mut *state.values.lock());
            let array = Value::object(realm.new_array(values));
            realm.call(&capability.resolve, &Value::undefined(), &[array])?;
        }
        Ok(Value::undefined())
    })
}

/// Promise.any reject element function
fn any_reject_element(
    realm: &Realm,
    index: usize,
    state: &Arc<ElementState>,
    capability: &PromiseCapability,
) -> Value {
    let state = state.clone();
    let capability = capability.clone();
    let already_called = AtomicBool::new(false);
    realm.new_function("", 1, move |realm, _this, args| {
        if already_called.swap(true, Ordering::AcqRel) {
            return Ok(Value::undefined());
        }
        state.store(index, arg(args, 0));
        if state.finish_one() {
            let errors = std::mem::take(&mut *state.values.lock());
            let error = realm.new_aggregate_error(errors, "All promises were rejected");
            realm.call(&capability.reject, &Value::undefined(), &[error])?;
        }
        Ok(Value::undefined())
    })
}

fn close_quietly(realm: &Realm, record: &IteratorRecord) {
    if record.done {
        return;
    }
    if let Err(error) = realm.iterator_close(record) {
        tracing::trace!(%error, "error while closing iterator ignored");
    }
}

// ============================================================================
// Promise.prototype
// ============================================================================

fn this_promise<'a>(this: &'a Value, method: &str) -> VmResult<&'a Arc<JsPromise>> {
    this.as_object()
        .and_then(|o| o.as_promise())
        .ok_or_else(|| {
            VmError::type_error(format!(
                "Method {method} called on incompatible receiver"
            ))
        })
}

/// Promise.prototype.then
fn promise_then(realm: &Realm, this: &Value, args: &[Value], flavor: PromiseFlavor) -> VmResult<Value> {
    let promise = this_promise(this, "Promise.prototype.then")?;
    let ctor = realm.species_constructor(this, flavor.default_constructor(realm))?;
    let capability = realm.new_promise_capability(&ctor)?;
    realm.perform_promise_then(
        promise,
        ReactionHandler::from_value(&arg(args, 0), ReactionHandler::Identity),
        ReactionHandler::from_value(&arg(args, 1), ReactionHandler::Thrower),
        Some(capability.clone()),
    );
    Ok(capability.promise)
}

/// Promise.prototype.finally
fn promise_finally(
    realm: &Realm,
    this: &Value,
    args: &[Value],
    flavor: PromiseFlavor,
) -> VmResult<Value> {
    if !this.is_object() {
        return Err(VmError::type_error(
            "Promise.prototype.finally called on non-object",
        ));
    }
    let ctor = realm.species_constructor(this, flavor.default_constructor(realm))?;
    let on_finally = arg(args, 0);
    if !on_finally.is_callable() {
        return realm.invoke(this, "then", &[on_finally.clone(), on_finally]);
    }

    let then_finally = {
        let ctor = ctor.clone();
        let on_finally = on_finally.clone();
        realm.new_function("", 1, move |realm, _this, args| {
            let value = arg(args, 0);
            let result = realm.call(&on_finally, &Value::undefined(), &[])?;
            let promise = realm.promise_resolve(&ctor, result)?;
            let value_thunk = realm.new_function("", 0, move |_realm, _this, _args| Ok(value.clone()));
            realm.invoke(&promise, "then", &[value_thunk])
        })
    };
    let catch_finally = realm.new_function("", 1, move |realm, _this, args| {
        let reason = arg(args, 0);
        let result = realm.call(&on_finally, &Value::undefined(), &[])?;
        let promise = realm.promise_resolve(&ctor, result)?;
        let thrower = realm.new_function("", 0, move |_realm, _this, _args| {
            Err(VmError::exception(reason.clone()))
        });
        realm.invoke(&promise, "then", &[thrower])
    });
    realm.invoke(this, "then", &[then_finally, catch_finally])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::promise::PromiseState;
    use crate::realm::Realm;
    use crate::value::Value;

    fn resolved(realm: &Realm, v: Value) -> Value {
        let ctor = Value::object(realm.intrinsics().promise_constructor.clone());
        realm.invoke(&ctor, "resolve", &[v]).unwrap()
    }

    #[test]
    fn test_then_chains_value() {
        let realm = Realm::new();
        let p = resolved(&realm, Value::from(2));
        let double = realm.new_function("double", 1, |realm, _this, args| {
            Ok(Value::number(realm.to_number(&args[0])? * 2.0))
        });
        let q = realm.invoke(&p, "then", &[double]).unwrap();
        realm.run_jobs().unwrap();
        match realm.promise_state(&q) {
            Some(PromiseState::Fulfilled(v)) => assert_eq!(v.as_number(), Some(4.0)),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_executor_throw_rejects() {
        let realm = Realm::new();
        let ctor = Value::object(realm.intrinsics().promise_constructor.clone());
        let executor = realm.new_function("executor", 2, |_realm, _this, _args| {
            Err(crate::error::VmError::type_error("nope"))
        });
        let p = realm.construct(&ctor, &[executor], None).unwrap();
        assert!(matches!(realm.promise_state(&p), Some(PromiseState::Rejected(_))));
    }

    #[test]
    fn test_internal_promise_is_not_global() {
        let realm = Realm::new();
        let global = Value::object(realm.global().clone());
        assert!(realm.get(&global, "InternalPromise").unwrap().is_undefined());
        let internal = &realm.intrinsics().internal_promise_constructor;
        assert!(!Arc::ptr_eq(internal, &realm.intrinsics().promise_constructor));
    }

    #[test]
    fn test_promise_all_orders_by_input() {
        let realm = Realm::new();
        let ctor = Value::object(realm.intrinsics().promise_constructor.clone());
        let list = realm.new_array(vec![Value::from(1), resolved(&realm, Value::from(2))]);
        let all = realm.invoke(&ctor, "all", &[Value::object(list)]).unwrap();
        realm.run_jobs().unwrap();
        let Some(PromiseState::Fulfilled(values)) = realm.promise_state(&all) else {
            panic!("Promise.all did not fulfill");
        };
        assert_eq!(realm.get(&values, 0u32).unwrap().as_number(), Some(1.0));
        assert_eq!(realm.get(&values, 1u32).unwrap().as_number(), Some(2.0));
    }
}
