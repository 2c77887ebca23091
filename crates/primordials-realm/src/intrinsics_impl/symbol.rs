//! Symbol constructor (callable, not constructible) and Symbol.prototype

use std::sync::Arc;

use super::helpers::define_to_string_tag;
use crate::builtin_builder::BuiltInBuilder;
use crate::error::{VmError, VmResult};
use crate::function::arg;
use crate::intrinsics::InitContext;
use crate::object::{JsObject, PropertyAttributes};
use crate::realm::Realm;
use crate::value::{Symbol, Value};

pub(crate) fn init(cx: &InitContext<'_>, prototype: &Arc<JsObject>) -> Arc<JsObject> {
    let mut builder = BuiltInBuilder::new(cx.fn_proto, prototype.clone(), "Symbol")
        .inherits(cx.object_prototype)
        .call_fn(symbol_call)
        .method("toString", symbol_to_string, 0)
        .method("valueOf", |_realm, this, _args| this_symbol(this).map(|s| Value::Symbol(s.clone())), 0)
        .getter("description", |_realm, this, _args| {
            Ok(this_symbol(this)?
                .description
                .as_deref()
                .map_or(Value::undefined(), Value::from))
        });
    for (name, symbol) in cx.symbols.entries() {
        builder = builder.static_property(
            name,
            Value::Symbol(symbol.clone()),
            PropertyAttributes::frozen(),
        );
    }
    let ctor = builder.build();
    define_to_string_tag(prototype, &cx.symbols.to_string_tag, "Symbol");
    ctor
}

fn this_symbol(this: &Value) -> VmResult<&Arc<Symbol>> {
    this.as_symbol().ok_or_else(|| {
        VmError::type_error("Symbol.prototype method called on incompatible receiver")
    })
}

fn symbol_call(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let description = match arg(args, 0) {
        Value::Undefined => None,
        value => Some(realm.to_string(&value)?.to_string()),
    };
    Ok(Value::Symbol(realm.new_symbol(description)))
}

fn symbol_to_string(_realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let sym = this_symbol(this)?;
    Ok(Value::from(format!(
        "Symbol({})",
        sym.description.as_deref().unwrap_or("")
    )))
}
