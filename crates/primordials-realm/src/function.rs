//! Native function objects

use std::fmt;
use std::sync::Arc;

use crate::error::VmResult;
use crate::object::{JsObject, ObjectKind, PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::realm::Realm;
use crate::value::Value;

/// `[[Call]]` behaviour: `(realm, this, args)`
pub type NativeFn = Arc<dyn Fn(&Realm, &Value, &[Value]) -> VmResult<Value> + Send + Sync>;

/// `[[Construct]]` behaviour: `(realm, args, new_target)`
pub type NativeCtor =
    Arc<dyn Fn(&Realm, &[Value], &Arc<JsObject>) -> VmResult<Value> + Send + Sync>;

/// Internal slots of a function object
#[derive(Clone)]
pub struct NativeFunction {
    /// Initial `name`
    pub name: String,
    /// Initial `length`
    pub length: u32,
    /// Absent for class-like constructors that throw when called
    pub call: Option<NativeFn>,
    /// Absent for plain functions
    pub construct: Option<NativeCtor>,
}

impl NativeFunction {
    /// A plain callable function
    pub fn new<F>(name: &str, length: u32, f: F) -> Self
    where
        F: Fn(&Realm, &Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            length,
            call: Some(Arc::new(f)),
            construct: None,
        }
    }

    /// A function that returns `undefined` (used for `%Function.prototype%`)
    pub fn noop(name: &str) -> Self {
        Self::new(name, 0, |_, _, _| Ok(Value::undefined()))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("callable", &self.call.is_some())
            .field("constructor", &self.construct.is_some())
            .finish()
    }
}

/// Allocate a function object with own `length` and `name` properties.
pub fn make_function_object(fn_proto: &Arc<JsObject>, func: NativeFunction) -> Arc<JsObject> {
    let length = func.length;
    let name = func.name.clone();
    let obj = Arc::new(JsObject::with_kind(
        Some(fn_proto.clone()),
        ObjectKind::Function(func),
    ));
    obj.define_own_property(
        PropertyKey::string("length"),
        PropertyDescriptor::data_with_attrs(Value::from(length), PropertyAttributes::readonly()),
    );
    obj.define_own_property(
        PropertyKey::string("name"),
        PropertyDescriptor::data_with_attrs(Value::from(name), PropertyAttributes::readonly()),
    );
    obj
}

/// Allocate a plain native function value.
pub fn make_native_fn<F>(fn_proto: &Arc<JsObject>, name: &str, length: u32, f: F) -> Value
where
    F: Fn(&Realm, &Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
{
    Value::object(make_function_object(
        fn_proto,
        NativeFunction::new(name, length, f),
    ))
}

/// Argument `i`, or `undefined` when absent
pub fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}
