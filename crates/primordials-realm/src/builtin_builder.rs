//! Builder for built-in constructors and prototypes.
//!
//! Every method gets `{ writable: true, enumerable: false, configurable: true }`
//! and every function object gets its own `length` and `name`.
//!
//! ```ignore
//! let ctor = BuiltInBuilder::new(&fn_proto, map_proto, "Map")
//!     .inherits(&obj_proto)
//!     .constructor_fn(map_construct, 0)
//!     .method("get", map_get, 1)
//!     .static_getter(&species, "[Symbol.species]", species_getter)
//!     .build();
//! ```

use std::sync::Arc;

use crate::error::VmResult;
use crate::function::{NativeCtor, NativeFn, NativeFunction, make_function_object};
use crate::object::{JsObject, PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::realm::Realm;
use crate::value::Value;

/// Derive a function `name` from a property key (`[description]` for symbols)
pub fn function_name_for(key: &PropertyKey) -> String {
    match key {
        PropertyKey::String(s) => s.to_string(),
        PropertyKey::Index(i) => i.to_string(),
        PropertyKey::Symbol(sym) => match &sym.description {
            Some(desc) => format!("[{desc}]"),
            None => String::new(),
        },
    }
}

enum DeferredProperty {
    Method {
        key: PropertyKey,
        func: NativeFn,
        length: u32,
        on_ctor: bool,
    },
    Property {
        key: PropertyKey,
        value: Value,
        attrs: PropertyAttributes,
        on_ctor: bool,
    },
    Accessor {
        key: PropertyKey,
        getter: Option<NativeFn>,
        setter: Option<NativeFn>,
        on_ctor: bool,
    },
}

/// Builder for a constructor + prototype pair
pub struct BuiltInBuilder {
    fn_proto: Arc<JsObject>,
    prototype: Arc<JsObject>,
    name: String,
    parent_proto: Option<Arc<JsObject>>,
    call: Option<NativeFn>,
    construct: Option<NativeCtor>,
    ctor_length: u32,
    properties: Vec<DeferredProperty>,
}

impl BuiltInBuilder {
    /// `prototype` is pre-allocated so that other built-ins can reference it
    /// before this constructor exists.
    pub fn new(fn_proto: &Arc<JsObject>, prototype: Arc<JsObject>, name: &str) -> Self {
        Self {
            fn_proto: fn_proto.clone(),
            prototype,
            name: name.to_string(),
            parent_proto: None,
            call: None,
            construct: None,
            ctor_length: 0,
            properties: Vec::new(),
        }
    }

    /// Set the prototype's `[[Prototype]]`
    pub fn inherits(mut self, parent: &Arc<JsObject>) -> Self {
        self.parent_proto = Some(parent.clone());
        self
    }

    /// `[[Construct]]` implementation and arity
    pub fn constructor_fn<F>(mut self, f: F, length: u32) -> Self
    where
        F: Fn(&Realm, &[Value], &Arc<JsObject>) -> VmResult<Value> + Send + Sync + 'static,
    {
        self.construct = Some(Arc::new(f));
        self.ctor_length = length;
        self
    }

    /// `[[Call]]` implementation. Without one, calling the constructor throws.
    pub fn call_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Realm, &Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
    {
        self.call = Some(Arc::new(f));
        self
    }

    /// Add a method to the prototype
    pub fn method<F>(mut self, key: impl Into<PropertyKey>, f: F, length: u32) -> Self
    where
        F: Fn(&Realm, &Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
    {
        self.properties.push(DeferredProperty::Method {
            key: key.into(),
            func: Arc::new(f),
            length,
            on_ctor: false,
        });
        self
    }

    /// Add a static method to the constructor
    pub fn static_method<F>(mut self, key: impl Into<PropertyKey>, f: F, length: u32) -> Self
    where
        F: Fn(&Realm, &Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
    {
        self.properties.push(DeferredProperty::Method {
            key: key.into(),
            func: Arc::new(f),
            length,
            on_ctor: true,
        });
        self
    }

    /// Add a data property to the prototype
    pub fn property(
        mut self,
        key: impl Into<PropertyKey>,
        value: Value,
        attrs: PropertyAttributes,
    ) -> Self {
        self.properties.push(DeferredProperty::Property {
            key: key.into(),
            value,
            attrs,
            on_ctor: false,
        });
        self
    }

    /// Add a data property to the constructor
    pub fn static_property(
        mut self,
        key: impl Into<PropertyKey>,
        value: Value,
        attrs: PropertyAttributes,
    ) -> Self {
        self.properties.push(DeferredProperty::Property {
            key: key.into(),
            value,
            attrs,
            on_ctor: true,
        });
        self
    }

    /// Add a getter to the prototype
    pub fn getter<F>(self, key: impl Into<PropertyKey>, f: F) -> Self
    where
        F: Fn(&Realm, &Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
    {
        self.accessor(key, Some(Arc::new(f)), None)
    }

    /// Add a getter (and optional setter) to the prototype
    pub fn accessor(
        mut self,
        key: impl Into<PropertyKey>,
        getter: Option<NativeFn>,
        setter: Option<NativeFn>,
    ) -> Self {
        self.properties.push(DeferredProperty::Accessor {
            key: key.into(),
            getter,
            setter,
            on_ctor: false,
        });
        self
    }

    /// Add a getter to the constructor (e.g. `@@species`)
    pub fn static_getter<F>(mut self, key: impl Into<PropertyKey>, f: F) -> Self
    where
        F: Fn(&Realm, &Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
    {
        self.properties.push(DeferredProperty::Accessor {
            key: key.into(),
            getter: Some(Arc::new(f)),
            setter: None,
            on_ctor: true,
        });
        self
    }

    /// Build the pair and return the constructor.
    ///
    /// Wires `constructor.prototype` (non-writable, non-configurable) and
    /// `prototype.constructor` (writable, non-enumerable).
    pub fn build(self) -> Arc<JsObject> {
        let BuiltInBuilder {
            fn_proto,
            prototype,
            name,
            parent_proto,
            call,
            construct,
            ctor_length,
            properties,
        } = self;

        if let Some(parent) = parent_proto {
            prototype.set_prototype_of(Some(parent));
        }

        let constructor = make_function_object(
            &fn_proto,
            NativeFunction {
                name,
                length: ctor_length,
                call,
                construct,
            },
        );

        for prop in properties {
            match prop {
                DeferredProperty::Method {
                    key,
                    func,
                    length,
                    on_ctor,
                } => {
                    let target = if on_ctor { &constructor } else { &prototype };
                    let fn_val = native_fn_value(&fn_proto, func, &function_name_for(&key), length);
                    target.define_own_property(key, PropertyDescriptor::builtin_method(fn_val));
                }
                DeferredProperty::Property {
                    key,
                    value,
                    attrs,
                    on_ctor,
                } => {
                    let target = if on_ctor { &constructor } else { &prototype };
                    target.define_own_property(key, PropertyDescriptor::data_with_attrs(value, attrs));
                }
                DeferredProperty::Accessor {
                    key,
                    getter,
                    setter,
                    on_ctor,
                } => {
                    let target = if on_ctor { &constructor } else { &prototype };
                    let acc_name = function_name_for(&key);
                    let get = getter
                        .map(|g| native_fn_value(&fn_proto, g, &format!("get {acc_name}"), 0));
                    let set = setter
                        .map(|s| native_fn_value(&fn_proto, s, &format!("set {acc_name}"), 1));
                    target.define_own_property(
                        key,
                        PropertyDescriptor::accessor(
                            get,
                            set,
                            PropertyAttributes::builtin_accessor(),
                        ),
                    );
                }
            }
        }

        constructor.define_own_property(
            PropertyKey::string("prototype"),
            PropertyDescriptor::data_with_attrs(
                Value::object(prototype.clone()),
                PropertyAttributes::frozen(),
            ),
        );
        prototype.define_own_property(
            PropertyKey::string("constructor"),
            PropertyDescriptor::builtin_method(Value::object(constructor.clone())),
        );

        constructor
    }
}

fn native_fn_value(fn_proto: &Arc<JsObject>, func: NativeFn, name: &str, length: u32) -> Value {
    Value::object(make_function_object(
        fn_proto,
        NativeFunction {
            name: name.to_string(),
            length,
            call: Some(func),
            construct: None,
        },
    ))
}

/// Builder for namespace objects (`Math`, `Reflect`) and plain prototypes
/// that have no constructor (`%IteratorPrototype%`, `%ArrayIteratorPrototype%`).
pub struct NamespaceBuilder {
    fn_proto: Arc<JsObject>,
    object: Arc<JsObject>,
}

impl NamespaceBuilder {
    pub fn new(fn_proto: &Arc<JsObject>, object: Arc<JsObject>) -> Self {
        Self {
            fn_proto: fn_proto.clone(),
            object,
        }
    }

    /// Add a method
    pub fn method<F>(self, key: impl Into<PropertyKey>, f: F, length: u32) -> Self
    where
        F: Fn(&Realm, &Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
    {
        let key = key.into();
        let fn_val = native_fn_value(&self.fn_proto, Arc::new(f), &function_name_for(&key), length);
        self.object
            .define_own_property(key, PropertyDescriptor::builtin_method(fn_val));
        self
    }

    /// Add a data property
    pub fn property(
        self,
        key: impl Into<PropertyKey>,
        value: Value,
        attrs: PropertyAttributes,
    ) -> Self {
        self.object
            .define_own_property(key.into(), PropertyDescriptor::data_with_attrs(value, attrs));
        self
    }

    pub fn build(self) -> Arc<JsObject> {
        self.object
    }
}
