//! Snapshot capture of built-in properties.
//!
//! Every read here is an own-slot read: no prototype walk and no getter
//! invocation, so nothing user code installs can intercept it. The captured
//! `Value` is a clone of the slot, which keeps pointing at the original
//! function object after the property is reassigned.

use std::sync::Arc;

use primordials_realm::{JsObject, PropertyDescriptor, PropertyKey, Value};

use crate::error::{BootstrapError, BootstrapResult};

/// An object whose own properties are captured, with a label for errors
#[derive(Clone, Copy)]
pub struct Owner<'a> {
    pub name: &'a str,
    pub object: &'a Arc<JsObject>,
}

impl<'a> Owner<'a> {
    pub fn new(name: &'a str, object: &'a Arc<JsObject>) -> Self {
        Self { name, object }
    }

    fn own_property(&self, key: &PropertyKey) -> BootstrapResult<PropertyDescriptor> {
        self.object
            .get_own_property(key)
            .ok_or_else(|| BootstrapError::missing(self.name, key))
    }

    fn label(&self, key: &PropertyKey) -> String {
        format!("{}.{key}", self.name)
    }
}

/// Capture the value of an own data property
pub fn capture(owner: Owner<'_>, key: impl Into<PropertyKey>) -> BootstrapResult<Value> {
    let key = key.into();
    match owner.own_property(&key)? {
        PropertyDescriptor::Data { value, .. } => {
            tracing::trace!(owner = owner.name, %key, "captured");
            Ok(value)
        }
        PropertyDescriptor::Accessor { .. } => {
            Err(BootstrapError::wrong_shape(owner.label(&key), "data property"))
        }
    }
}

/// Capture an own data property that must hold a function
pub fn capture_function(owner: Owner<'_>, key: impl Into<PropertyKey>) -> BootstrapResult<Value> {
    let key = key.into();
    let value = capture(owner, key.clone())?;
    if !value.is_callable() {
        return Err(BootstrapError::NotCallable {
            name: owner.label(&key),
        });
    }
    Ok(value)
}

/// Capture an own data property that must hold an object
pub fn capture_object(
    owner: Owner<'_>,
    key: impl Into<PropertyKey>,
) -> BootstrapResult<Arc<JsObject>> {
    let key = key.into();
    match capture(owner, key.clone())? {
        Value::Object(obj) => Ok(obj),
        _ => Err(BootstrapError::wrong_shape(owner.label(&key), "object")),
    }
}

/// The getter function of an own accessor (`__lookupGetter__` without the
/// prototype walk)
pub fn capture_getter(owner: Owner<'_>, key: impl Into<PropertyKey>) -> BootstrapResult<Value> {
    let key = key.into();
    match owner.own_property(&key)? {
        PropertyDescriptor::Accessor { get: Some(get), .. } => {
            tracing::trace!(owner = owner.name, %key, "captured getter");
            Ok(get)
        }
        _ => Err(BootstrapError::wrong_shape(owner.label(&key), "accessor with a getter")),
    }
}

/// The setter function of an own accessor
pub fn capture_setter(owner: Owner<'_>, key: impl Into<PropertyKey>) -> BootstrapResult<Value> {
    let key = key.into();
    match owner.own_property(&key)? {
        PropertyDescriptor::Accessor { set: Some(set), .. } => {
            tracing::trace!(owner = owner.name, %key, "captured setter");
            Ok(set)
        }
        _ => Err(BootstrapError::wrong_shape(owner.label(&key), "accessor with a setter")),
    }
}
