//! Error, the native error subclasses and AggregateError

use std::sync::Arc;

use crate::builtin_builder::BuiltInBuilder;
use crate::error::{VmError, VmResult};
use crate::function::arg;
use crate::intrinsics::InitContext;
use crate::object::{JsObject, PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::realm::Realm;
use crate::value::Value;

/// Install `name` on `prototype`. Subclasses pass the `Error` constructor as
/// `parent`, which becomes the constructor's `[[Prototype]]`.
pub(crate) fn init(
    cx: &InitContext<'_>,
    prototype: &Arc<JsObject>,
    name: &str,
    parent: Option<&Arc<JsObject>>,
) -> Arc<JsObject> {
    let construct_proto = prototype.clone();
    let call_proto = prototype.clone();
    let mut builder = BuiltInBuilder::new(cx.fn_proto, prototype.clone(), name)
        .constructor_fn(
            move |realm, args, new_target| {
                let proto = realm.get_prototype_from_constructor(new_target, &construct_proto)?;
                create_error(realm, &proto, &arg(args, 0), &arg(args, 1))
            },
            1,
        )
        .call_fn(move |realm, _this, args| {
            create_error(realm, &call_proto, &arg(args, 0), &arg(args, 1))
        })
        .property("name", Value::from(name), PropertyAttributes::builtin())
        .property("message", Value::from(""), PropertyAttributes::builtin());
    if parent.is_none() {
        builder = builder
            .inherits(cx.object_prototype)
            .method("toString", error_to_string, 0);
    }
    let ctor = builder.build();
    if let Some(parent) = parent {
        ctor.set_prototype_of(Some(parent.clone()));
    }
    ctor
}

/// AggregateError(errors, message, options)
pub(crate) fn init_aggregate(
    cx: &InitContext<'_>,
    prototype: &Arc<JsObject>,
    error_constructor: &Arc<JsObject>,
) -> Arc<JsObject> {
    let construct_proto = prototype.clone();
    let call_proto = prototype.clone();
    let ctor = BuiltInBuilder::new(cx.fn_proto, prototype.clone(), "AggregateError")
        .constructor_fn(
            move |realm, args, new_target| {
                let proto = realm.get_prototype_from_constructor(new_target, &construct_proto)?;
                create_aggregate_error(realm, &proto, args)
            },
            2,
        )
        .call_fn(move |realm, _this, args| create_aggregate_error(realm, &call_proto, args))
        .property("name", Value::from("AggregateError"), PropertyAttributes::builtin())
        .property("message", Value::from(""), PropertyAttributes::builtin())
        .build();
    ctor.set_prototype_of(Some(error_constructor.clone()));
    ctor
}

fn create_error(
    realm: &Realm,
    proto: &Arc<JsObject>,
    message: &Value,
    options: &Value,
) -> VmResult<Value> {
    let message = match message {
        Value::Undefined => None,
        message => Some(realm.to_string(message)?),
    };
    let obj = realm.error_object(proto, message.as_deref());
    install_cause(realm, &obj, options)?;
    Ok(Value::object(obj))
}

fn create_aggregate_error(realm: &Realm, proto: &Arc<JsObject>, args: &[Value]) -> VmResult<Value> {
    let error = create_error(realm, proto, &arg(args, 1), &arg(args, 2))?;
    let errors = realm.iterable_to_list(&arg(args, 0))?;
    if let Some(obj) = error.as_object() {
        obj.define_own_property(
            PropertyKey::string("errors"),
            PropertyDescriptor::builtin_method(Value::object(realm.new_array(errors))),
        );
    }
    Ok(error)
}

/// InstallErrorCause
fn install_cause(realm: &Realm, obj: &Arc<JsObject>, options: &Value) -> VmResult<()> {
    let Some(options_obj) = options.as_object() else {
        return Ok(());
    };
    let key = PropertyKey::string("cause");
    if realm.has_property(options_obj, &key) {
        let cause = realm.get(options, key.clone())?;
        obj.define_own_property(key, PropertyDescriptor::builtin_method(cause));
    }
    Ok(())
}

/// Error.prototype.toString
fn error_to_string(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    if !this.is_object() {
        return Err(VmError::type_error(
            "Error.prototype.toString called on non-object",
        ));
    }
    let name = match realm.get(this, "name")? {
        Value::Undefined => Arc::from("Error"),
        name => realm.to_string(&name)?,
    };
    let message = match realm.get(this, "message")? {
        Value::Undefined => Arc::from(""),
        message => realm.to_string(&message)?,
    };
    Ok(Value::from(match (name.is_empty(), message.is_empty()) {
        (_, true) => name.to_string(),
        (true, false) => message.to_string(),
        (false, false) => format!("{name}: {message}"),
    }))
}

#[cfg(test)]
mod tests {
    use crate::realm::{ErrorKind, Realm};
    use crate::value::Value;

    #[test]
    fn test_error_to_string_uses_name_and_message() {
        let realm = Realm::new();
        let err = realm.new_error(ErrorKind::TypeError, "boom");
        let text = realm.invoke(&err, "toString", &[]).unwrap();
        assert_eq!(text.as_str(), Some("TypeError: boom"));
    }

    #[test]
    fn test_subclass_constructor_inherits_from_error() {
        let realm = Realm::new();
        let range = Value::object(realm.intrinsics().range_error_constructor.clone());
        let proto = range.as_object().unwrap().prototype().unwrap();
        assert!(std::sync::Arc::ptr_eq(&proto, &realm.intrinsics().error_constructor));
    }

    #[test]
    fn test_called_without_new_creates_instance() {
        let realm = Realm::new();
        let ctor = Value::object(realm.intrinsics().error_constructor.clone());
        let err = realm.call(&ctor, &Value::undefined(), &[Value::from("x")]).unwrap();
        assert!(err.as_object().unwrap().is_error());
        assert_eq!(realm.get(&err, "message").unwrap().as_str(), Some("x"));
    }

    #[test]
    fn test_aggregate_error_collects_iterable() {
        let realm = Realm::new();
        let ctor = Value::object(realm.intrinsics().aggregate_error_constructor.clone());
        let list = Value::object(realm.new_array(vec![Value::from(1), Value::from(2)]));
        let err = realm.construct(&ctor, &[list, Value::from("all failed")], None).unwrap();
        let errors = realm.get(&err, "errors").unwrap();
        assert_eq!(realm.length_of_array_like(&errors).unwrap(), 2);
        assert_eq!(realm.get(&err, "message").unwrap().as_str(), Some("all failed"));
    }
}
