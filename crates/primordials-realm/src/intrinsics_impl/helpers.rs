//! Shared helpers for built-in implementations

use std::sync::Arc;

use crate::error::{VmError, VmResult};
use crate::object::{JsObject, PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::value::{Symbol, Value};

/// `this` as an object, or a TypeError naming the method
pub(crate) fn this_object<'a>(this: &'a Value, method: &str) -> VmResult<&'a Arc<JsObject>> {
    this.as_object().ok_or_else(|| {
        VmError::type_error(format!("{method} called on non-object"))
    })
}

/// Define `[Symbol.toStringTag]` as a read-only, configurable string
pub(crate) fn define_to_string_tag(obj: &Arc<JsObject>, tag_symbol: &Arc<Symbol>, tag: &str) {
    obj.define_own_property(
        PropertyKey::Symbol(tag_symbol.clone()),
        PropertyDescriptor::data_with_attrs(Value::from(tag), PropertyAttributes::readonly()),
    );
}

/// Relative index clamp used by slice-like methods
pub(crate) fn relative_index(relative: f64, len: usize) -> usize {
    let len_f = len as f64;
    if relative < 0.0 {
        (len_f + relative).max(0.0) as usize
    } else {
        relative.min(len_f) as usize
    }
}

/// Species getter: returns `this`
pub(crate) fn species_getter(
    _realm: &crate::realm::Realm,
    this: &Value,
    _args: &[Value],
) -> VmResult<Value> {
    Ok(this.clone())
}

/// Install the function stored at `from` under `to` as well (same function
/// object, e.g. `Array.prototype[Symbol.iterator] === Array.prototype.values`)
pub(crate) fn alias_method(obj: &Arc<JsObject>, from: &str, to: PropertyKey) {
    if let Some(func) = obj.get_own_value(&PropertyKey::string(from)) {
        obj.define_own_property(to, PropertyDescriptor::builtin_method(func));
    }
}
