//! Receiver-explicit adapters.
//!
//! [`Uncurried`] turns `receiver.method(...args)` into
//! `method(receiver, ...args)` over a captured function, and [`ApplyBound`]
//! is the `Function.prototype.apply.bind(fn)` equivalent. Both call through
//! [`Realm::call`], which dispatches on the function's internal slots, so a
//! patched `Function.prototype.call`/`apply` is never consulted.

use std::sync::Arc;

use primordials_realm::object::check_list_length;
use primordials_realm::{JsObject, PropertyKey, Realm, Value, VmError, VmResult, arg};

use crate::error::{BootstrapError, BootstrapResult};

/// A captured function invoked with an explicit receiver
#[derive(Clone, Debug)]
pub struct Uncurried {
    name: String,
    func: Value,
}

impl Uncurried {
    pub fn new(name: impl Into<String>, func: Value) -> BootstrapResult<Self> {
        let name = name.into();
        if !func.is_callable() {
            return Err(BootstrapError::NotCallable { name });
        }
        Ok(Self { name, func })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The captured function itself
    pub fn function(&self) -> &Value {
        &self.func
    }

    /// `func.[[Call]](receiver, args)`
    pub fn call(&self, realm: &Realm, receiver: &Value, args: &[Value]) -> VmResult<Value> {
        realm.call(&self.func, receiver, args)
    }

    /// A realm function `g(receiver, ...args)`
    pub fn to_function(&self, realm: &Realm) -> Value {
        let func = self.func.clone();
        let length = function_length(&func) + 1;
        realm.new_function(&self.name, length, move |realm, _this, args| {
            let (receiver, rest) = match args.split_first() {
                Some((receiver, rest)) => (receiver.clone(), rest),
                None => (Value::undefined(), &[][..]),
            };
            realm.call(&func, &receiver, rest)
        })
    }
}

/// A captured function applied to an arguments array, optionally with a
/// fixed receiver
#[derive(Clone, Debug)]
pub struct ApplyBound {
    name: String,
    func: Value,
    receiver: Option<Value>,
}

impl ApplyBound {
    pub fn new(
        name: impl Into<String>,
        func: Value,
        fixed_receiver: Option<Value>,
    ) -> BootstrapResult<Self> {
        let name = name.into();
        if !func.is_callable() {
            return Err(BootstrapError::NotCallable { name });
        }
        Ok(Self {
            name,
            func,
            receiver: fixed_receiver,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call with the fixed receiver (or `undefined` when there is none)
    pub fn apply(&self, realm: &Realm, args: &Value) -> VmResult<Value> {
        let receiver = self.receiver.clone().unwrap_or_default();
        self.apply_with(realm, &receiver, args)
    }

    /// Call with an explicit receiver
    pub fn apply_with(&self, realm: &Realm, receiver: &Value, args: &Value) -> VmResult<Value> {
        if args.is_nullish() {
            return realm.call(&self.func, receiver, &[]);
        }
        let list = read_array_like(realm, args)?;
        realm.call(&self.func, receiver, &list)
    }

    /// A realm function: `(argsArray)` with a fixed receiver, otherwise
    /// `(receiver, argsArray)`
    pub fn to_function(&self, realm: &Realm) -> Value {
        let bound = self.clone();
        match self.receiver {
            Some(_) => realm.new_function(&self.name, 1, move |realm, _this, args| {
                bound.apply(realm, &arg(args, 0))
            }),
            None => realm.new_function(&self.name, 2, move |realm, _this, args| {
                bound.apply_with(realm, &arg(args, 0), &arg(args, 1))
            }),
        }
    }
}

/// Read the elements of an array-like with own-slot reads only. Arrays are
/// snapshotted directly; other objects are read up to their own `length`,
/// which must fit dense array storage or a `RangeError` is raised.
pub fn read_array_like(realm: &Realm, value: &Value) -> VmResult<Vec<Value>> {
    let Some(obj) = value.as_object() else {
        return Err(VmError::type_error(format!(
            "{} is not an array-like object",
            realm.describe(value)
        )));
    };
    if let Some(elements) = obj.array_elements() {
        return Ok(elements);
    }
    let length = match obj.get_own_value(&PropertyKey::string("length")) {
        Some(length) => realm.to_length(&length)?,
        None => 0,
    };
    check_list_length(length)?;
    let mut elements = Vec::new();
    elements
        .try_reserve_exact(length)
        .map_err(|_| VmError::range_error(format!("Cannot allocate {length} elements")))?;
    elements.extend((0..length).map(|i| own_element(obj, i)));
    Ok(elements)
}

fn own_element(obj: &Arc<JsObject>, index: usize) -> Value {
    obj.get_own_value(&PropertyKey::from(index)).unwrap_or_default()
}

fn function_length(func: &Value) -> u32 {
    func.as_object()
        .and_then(|o| o.as_function())
        .map_or(0, |f| f.length)
}

/// `uncurryThis` exposed to realm code
pub fn uncurry_this_function(realm: &Realm) -> Value {
    realm.new_function("uncurryThis", 1, |realm, _this, args| {
        let func = arg(args, 0);
        let name = func
            .as_object()
            .and_then(|o| o.as_function())
            .map(|f| f.name.clone())
            .unwrap_or_default();
        let uncurried = Uncurried::new(name, func)
            .map_err(|e| VmError::type_error(e.to_string()))?;
        Ok(uncurried.to_function(realm))
    })
}

/// `applyBind` exposed to realm code
pub fn apply_bind_function(realm: &Realm) -> Value {
    realm.new_function("applyBind", 2, |realm, _this, args| {
        let func = arg(args, 0);
        let name = func
            .as_object()
            .and_then(|o| o.as_function())
            .map(|f| f.name.clone())
            .unwrap_or_default();
        let receiver = args.get(1).cloned().filter(|r| !r.is_undefined());
        let bound = ApplyBound::new(name, func, receiver)
            .map_err(|e| VmError::type_error(e.to_string()))?;
        Ok(bound.to_function(realm))
    })
}
