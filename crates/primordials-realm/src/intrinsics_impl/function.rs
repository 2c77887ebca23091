//! Function.prototype methods: call, apply, toString

use crate::builtin_builder::NamespaceBuilder;
use crate::error::{VmError, VmResult};
use crate::function::arg;
use crate::intrinsics::InitContext;
use crate::realm::Realm;
use crate::value::Value;

pub(crate) fn init(cx: &InitContext<'_>) {
    NamespaceBuilder::new(cx.fn_proto, cx.fn_proto.clone())
        .method("call", function_call, 1)
        .method("apply", function_apply, 2)
        .method("toString", function_to_string, 0)
        .build();
}

/// Function.prototype.call(thisArg, ...args)
fn function_call(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    if !this.is_callable() {
        return Err(VmError::type_error("Function.prototype.call called on non-function"));
    }
    let rest = args.get(1..).unwrap_or(&[]);
    realm.call(this, &arg(args, 0), rest)
}

/// Function.prototype.apply(thisArg, argArray)
fn function_apply(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    if !this.is_callable() {
        return Err(VmError::type_error("Function.prototype.apply called on non-function"));
    }
    let arg_array = arg(args, 1);
    let list = if arg_array.is_nullish() {
        Vec::new()
    } else {
        realm.create_list_from_array_like(&arg_array)?
    };
    realm.call(this, &arg(args, 0), &list)
}

fn function_to_string(_realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let func = this
        .as_object()
        .and_then(|o| o.as_function())
        .ok_or_else(|| VmError::type_error("Function.prototype.toString requires that 'this' be a Function"))?;
    Ok(Value::from(format!(
        "function {}() {{ [native code] }}",
        func.name
    )))
}
