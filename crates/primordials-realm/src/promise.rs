//! Promise state and the promise abstract operations.
//!
//! `JsPromise` holds the internal slots; the operations that need the realm
//! (resolving functions, `NewPromiseCapability`, `PerformPromiseThen`,
//! `PromiseResolve`) are implemented on [`Realm`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{VmError, VmResult};
use crate::function::{arg, make_native_fn};
use crate::microtask::Job;
use crate::object::{JsObject, ObjectKind};
use crate::realm::Realm;
use crate::value::Value;

/// Promise state
#[derive(Debug, Clone)]
pub enum PromiseState {
    /// Not yet settled
    Pending,
    /// Resolved with value
    Fulfilled(Value),
    /// Rejected with reason
    Rejected(Value),
}

impl PromiseState {
    /// Check if settled (fulfilled or rejected)
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Host-side reaction callback
pub type NativeReaction = Arc<dyn Fn(&Realm, Value) -> VmResult<Value> + Send + Sync>;

/// `[[Handler]]` of a PromiseReaction
#[derive(Clone)]
pub enum ReactionHandler {
    /// Pass the argument through (fulfill reactions without a handler)
    Identity,
    /// Re-throw the argument (reject reactions without a handler)
    Thrower,
    /// A JS function
    Js(Value),
    /// A host closure
    Native(NativeReaction),
}

impl ReactionHandler {
    /// `Js(f)` when callable, otherwise `fallback`
    pub fn from_value(value: &Value, fallback: ReactionHandler) -> Self {
        if value.is_callable() {
            Self::Js(value.clone())
        } else {
            fallback
        }
    }

    pub fn native<F>(f: F) -> Self
    where
        F: Fn(&Realm, Value) -> VmResult<Value> + Send + Sync + 'static,
    {
        Self::Native(Arc::new(f))
    }
}

/// PromiseCapability Record
#[derive(Clone, Debug)]
pub struct PromiseCapability {
    pub promise: Value,
    pub resolve: Value,
    pub reject: Value,
}

/// PromiseReaction Record
#[derive(Clone)]
pub struct PromiseReaction {
    pub capability: Option<PromiseCapability>,
    pub handler: ReactionHandler,
}

/// Internal slots of a promise object
pub struct JsPromise {
    state: Mutex<PromiseState>,
    fulfill_reactions: Mutex<Vec<PromiseReaction>>,
    reject_reactions: Mutex<Vec<PromiseReaction>>,
    handled: AtomicBool,
}

impl std::fmt::Debug for JsPromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.state.lock() {
            PromiseState::Pending => write!(f, "Promise {{ <pending> }}"),
            PromiseState::Fulfilled(v) => write!(f, "Promise {{ <fulfilled>: {v:?} }}"),
            PromiseState::Rejected(v) => write!(f, "Promise {{ <rejected>: {v:?} }}"),
        }
    }
}

impl Default for JsPromise {
    fn default() -> Self {
        Self::new()
    }
}

impl JsPromise {
    /// A pending promise
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PromiseState::Pending),
            fulfill_reactions: Mutex::new(Vec::new()),
            reject_reactions: Mutex::new(Vec::new()),
            handled: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> PromiseState {
        self.state.lock().clone()
    }

    pub fn is_pending(&self) -> bool {
        !self.state.lock().is_settled()
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(&*self.state.lock(), PromiseState::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(&*self.state.lock(), PromiseState::Rejected(_))
    }

    /// `[[PromiseIsHandled]]`
    pub fn is_handled(&self) -> bool {
        self.handled.load(Ordering::Acquire)
    }

    /// Settle and take the reactions to trigger. `None` if already settled.
    fn settle(&self, state: PromiseState) -> Option<Vec<PromiseReaction>> {
        let fulfilled = matches!(state, PromiseState::Fulfilled(_));
        {
            let mut current = self.state.lock();
            if current.is_settled() {
                return None;
            }
            *current = state;
        }
        let fulfill = std::mem::take(&mut *self.fulfill_reactions.lock());
        let reject = std::mem::take(&mut *self.reject_reactions.lock());
        Some(if fulfilled { fulfill } else { reject })
    }
}

impl Realm {
    /// Allocate a pending promise object with the given prototype
    pub fn new_promise_object(&self, prototype: &Arc<JsObject>) -> Arc<JsObject> {
        Arc::new(JsObject::with_kind(
            Some(prototype.clone()),
            ObjectKind::Promise(Arc::new(JsPromise::new())),
        ))
    }

    /// CreateResolvingFunctions: `(resolve, reject)` sharing one
    /// `[[AlreadyResolved]]` flag
    pub fn create_resolving_functions(&self, promise: &Arc<JsObject>) -> (Value, Value) {
        let fn_proto = &self.intrinsics().function_prototype;
        let already_resolved = Arc::new(AtomicBool::new(false));

        let resolve = {
            let promise = promise.clone();
            let already_resolved = already_resolved.clone();
            make_native_fn(fn_proto, "", 1, move |realm, _this, args| {
                if !already_resolved.swap(true, Ordering::AcqRel) {
                    realm.resolve_promise(&promise, arg(args, 0));
                }
                Ok(Value::undefined())
            })
        };
        let reject = {
            let promise = promise.clone();
            make_native_fn(fn_proto, "", 1, move |realm, _this, args| {
                if !already_resolved.swap(true, Ordering::AcqRel) {
                    realm.reject_promise(&promise, arg(args, 0));
                }
                Ok(Value::undefined())
            })
        };
        (resolve, reject)
    }

    /// Body of a promise resolve function (after the already-resolved check)
    pub fn resolve_promise(&self, promise: &Arc<JsObject>, resolution: Value) {
        if let Some(obj) = resolution.as_object() {
            if Arc::ptr_eq(obj, promise) {
                let err = self.error_to_value(&VmError::type_error(
                    "Chaining cycle detected for promise",
                ));
                self.reject_promise(promise, err);
                return;
            }
            let then = match self.get(&resolution, "then") {
                Ok(then) => then,
                Err(e) => {
                    let reason = self.error_to_value(&e);
                    self.reject_promise(promise, reason);
                    return;
                }
            };
            if then.is_callable() {
                self.enqueue_job(Job::ResolveThenable {
                    promise: promise.clone(),
                    thenable: resolution,
                    then,
                });
                return;
            }
        }
        self.fulfill_promise(promise, resolution);
    }

    /// FulfillPromise
    pub fn fulfill_promise(&self, promise: &Arc<JsObject>, value: Value) {
        let Some(p) = promise.as_promise() else {
            return;
        };
        if let Some(reactions) = p.settle(PromiseState::Fulfilled(value.clone())) {
            self.trigger_reactions(reactions, value);
        }
    }

    /// RejectPromise
    pub fn reject_promise(&self, promise: &Arc<JsObject>, reason: Value) {
        let Some(p) = promise.as_promise() else {
            return;
        };
        if !p.is_handled() {
            tracing::trace!(reason = ?reason, "promise rejected without handler");
        }
        if let Some(reactions) = p.settle(PromiseState::Rejected(reason.clone())) {
            self.trigger_reactions(reactions, reason);
        }
    }

    fn trigger_reactions(&self, reactions: Vec<PromiseReaction>, argument: Value) {
        for reaction in reactions {
            self.enqueue_job(Job::Reaction {
                reaction,
                argument: argument.clone(),
            });
        }
    }

    /// NewPromiseCapability(C)
    pub fn new_promise_capability(&self, constructor: &Value) -> VmResult<PromiseCapability> {
        if !constructor.is_constructor() {
            return Err(VmError::type_error("Promise resolver is not a constructor"));
        }
        let slots: Arc<Mutex<(Value, Value)>> = Arc::default();
        let executor = {
            let slots = slots.clone();
            make_native_fn(
                &self.intrinsics().function_prototype,
                "",
                2,
                move |_realm, _this, args| {
                    let mut slots = slots.lock();
                    if !slots.0.is_undefined() || !slots.1.is_undefined() {
                        return Err(VmError::type_error(
                            "Promise executor has already been invoked with non-undefined arguments",
                        ));
                    }
                    *slots = (arg(args, 0), arg(args, 1));
                    Ok(Value::undefined())
                },
            )
        };
        let promise = self.construct(constructor, &[executor], None)?;
        let (resolve, reject) = slots.lock().clone();
        if !resolve.is_callable() {
            return Err(VmError::type_error("Promise resolve function is not callable"));
        }
        if !reject.is_callable() {
            return Err(VmError::type_error("Promise reject function is not callable"));
        }
        Ok(PromiseCapability {
            promise,
            resolve,
            reject,
        })
    }

    /// PerformPromiseThen. Reactions are queued on the promise itself and
    /// never go through a `then` lookup.
    pub fn perform_promise_then(
        &self,
        promise: &JsPromise,
        on_fulfilled: ReactionHandler,
        on_rejected: ReactionHandler,
        capability: Option<PromiseCapability>,
    ) {
        let fulfill = PromiseReaction {
            capability: capability.clone(),
            handler: on_fulfilled,
        };
        let reject = PromiseReaction {
            capability,
            handler: on_rejected,
        };
        promise.handled.store(true, Ordering::Release);

        let state = promise.state.lock().clone();
        match state {
            PromiseState::Pending => {
                promise.fulfill_reactions.lock().push(fulfill);
                promise.reject_reactions.lock().push(reject);
            }
            PromiseState::Fulfilled(value) => self.enqueue_job(Job::Reaction {
                reaction: fulfill,
                argument: value,
            }),
            PromiseState::Rejected(reason) => self.enqueue_job(Job::Reaction {
                reaction: reject,
                argument: reason,
            }),
        }
    }

    /// PromiseResolve(C, x)
    pub fn promise_resolve(&self, constructor: &Value, x: Value) -> VmResult<Value> {
        if x.as_object().is_some_and(|o| o.as_promise().is_some()) {
            let x_ctor = self.get(&x, "constructor")?;
            if x_ctor.same_value(constructor) {
                return Ok(x);
            }
        }
        let capability = self.new_promise_capability(constructor)?;
        self.call(&capability.resolve, &Value::undefined(), &[x])?;
        Ok(capability.promise)
    }

    /// State of a promise object, `None` for non-promises
    pub fn promise_state(&self, value: &Value) -> Option<PromiseState> {
        value.as_object()?.as_promise().map(|p| p.state())
    }
}
