//! The safe collection, promise and iterator types.
//!
//! Each safe class starts as a shell that extends the unsafe built-in and
//! forwards construction to it with itself as `new.target`, so instances
//! carry the built-in's internal slots but the shell's prototype.
//! [`make_safe`] then fills in the rest.
//!
//! Rust callers get typed handles ([`SafeMap`], [`SafeSet`], [`SafeWeakMap`],
//! [`SafeWeakSet`], [`SafePromise`]) whose methods call functions captured
//! from the built-in prototypes when the types were built.

use std::sync::Arc;

use parking_lot::Mutex;
use primordials_realm::{
    BuiltInBuilder, JsObject, PromiseState, PropertyDescriptor, PropertyKey, Realm, Value,
    VmError, VmResult, arg,
};

use crate::capture::{Owner, capture_function, capture_getter, capture_object};
use crate::error::{BootstrapError, BootstrapResult};
use crate::make_safe::make_safe;
use crate::safe_iterator::{SafeIteratorType, create_safe_iterator};

/// `Promise` statics re-bound to `SafePromise` so they work detached
const PROMISE_STATICS: [(&str, u32); 7] = [
    ("all", 1),
    ("allSettled", 1),
    ("any", 1),
    ("race", 1),
    ("resolve", 1),
    ("reject", 1),
    ("withResolvers", 0),
];

/// All frozen safe types of a realm
#[derive(Clone, Debug)]
pub struct SafeTypes {
    pub map: Arc<JsObject>,
    pub set: Arc<JsObject>,
    pub weak_map: Arc<JsObject>,
    pub weak_set: Arc<JsObject>,
    pub weak_ref: Arc<JsObject>,
    pub finalization_registry: Arc<JsObject>,
    pub promise: Arc<JsObject>,
    pub array_iterator: SafeIteratorType,
    pub string_iterator: SafeIteratorType,
    map_methods: Arc<MapMethods>,
    set_methods: Arc<SetMethods>,
    weak_map_methods: Arc<KeyedMethods>,
    weak_set_methods: Arc<KeyedMethods>,
    promise_methods: Arc<PromiseMethods>,
}

impl SafeTypes {
    pub fn build(realm: &Realm) -> BootstrapResult<Self> {
        let i = realm.intrinsics();
        let safe = |name: &str, unsafe_ctor: &Arc<JsObject>, length: u32| -> BootstrapResult<Arc<JsObject>> {
            let shell = shell(realm, name, unsafe_ctor, length)?;
            make_safe(realm, unsafe_ctor, &shell)
        };
        let map = safe("SafeMap", &i.map_constructor, 0)?;
        let set = safe("SafeSet", &i.set_constructor, 0)?;
        let weak_map = safe("SafeWeakMap", &i.weak_map_constructor, 0)?;
        let weak_set = safe("SafeWeakSet", &i.weak_set_constructor, 0)?;

        let promise_shell = shell(realm, "SafePromise", &i.promise_constructor, 1)?;
        pin_promise_statics(realm, &i.promise_constructor, &promise_shell)?;
        let promise = make_safe(realm, &i.promise_constructor, &promise_shell)?;

        let types = Self {
            map_methods: Arc::new(MapMethods::capture(&i.map_prototype, &map)?),
            set_methods: Arc::new(SetMethods::capture(&i.set_prototype, &set)?),
            weak_map_methods: Arc::new(KeyedMethods::capture(
                Owner::new("WeakMap.prototype", &i.weak_map_prototype),
                &weak_map,
                "set",
            )?),
            weak_set_methods: Arc::new(KeyedMethods::capture(
                Owner::new("WeakSet.prototype", &i.weak_set_prototype),
                &weak_set,
                "add",
            )?),
            promise_methods: Arc::new(PromiseMethods::capture(
                &i.promise_prototype,
                &i.promise_constructor,
                &promise,
            )?),
            map,
            set,
            weak_map,
            weak_set,
            weak_ref: safe("SafeWeakRef", &i.weak_ref_constructor, 1)?,
            finalization_registry: safe(
                "SafeFinalizationRegistry",
                &i.finalization_registry_constructor,
                1,
            )?,
            promise,
            array_iterator: builtin_iterator(
                realm,
                "SafeArrayIterator",
                Owner::new("Array.prototype", &i.array_prototype),
                Owner::new("%ArrayIteratorPrototype%", &i.array_iterator_prototype),
            )?,
            string_iterator: builtin_iterator(
                realm,
                "SafeStringIterator",
                Owner::new("String.prototype", &i.string_prototype),
                Owner::new("%StringIteratorPrototype%", &i.string_iterator_prototype),
            )?,
        };
        tracing::debug!("safe types built");
        Ok(types)
    }

    /// `(name, constructor)` pairs in registration order
    pub fn constructors(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("SafeMap", Value::object(self.map.clone())),
            ("SafeSet", Value::object(self.set.clone())),
            ("SafeWeakMap", Value::object(self.weak_map.clone())),
            ("SafeWeakSet", Value::object(self.weak_set.clone())),
            ("SafeWeakRef", Value::object(self.weak_ref.clone())),
            (
                "SafeFinalizationRegistry",
                Value::object(self.finalization_registry.clone()),
            ),
            ("SafePromise", Value::object(self.promise.clone())),
            (
                "SafeArrayIterator",
                Value::object(self.array_iterator.constructor().clone()),
            ),
            (
                "SafeStringIterator",
                Value::object(self.string_iterator.constructor().clone()),
            ),
        ]
    }

    /// `new SafeMap()`
    pub fn new_map(&self, realm: &Realm) -> VmResult<SafeMap> {
        Ok(SafeMap {
            instance: realm.construct(&self.map_methods.ctor, &[], None)?,
            methods: self.map_methods.clone(),
        })
    }

    /// `new SafeSet()`
    pub fn new_set(&self, realm: &Realm) -> VmResult<SafeSet> {
        Ok(SafeSet {
            instance: realm.construct(&self.set_methods.ctor, &[], None)?,
            methods: self.set_methods.clone(),
        })
    }

    /// `new SafeWeakMap()`
    pub fn new_weak_map(&self, realm: &Realm) -> VmResult<SafeWeakMap> {
        Ok(SafeWeakMap {
            instance: realm.construct(&self.weak_map_methods.ctor, &[], None)?,
            methods: self.weak_map_methods.clone(),
        })
    }

    /// `new SafeWeakSet()`
    pub fn new_weak_set(&self, realm: &Realm) -> VmResult<SafeWeakSet> {
        Ok(SafeWeakSet {
            instance: realm.construct(&self.weak_set_methods.ctor, &[], None)?,
            methods: self.weak_set_methods.clone(),
        })
    }

    /// `SafePromise.resolve(value)`
    pub fn promise_resolve(&self, realm: &Realm, value: Value) -> VmResult<SafePromise> {
        let methods = &self.promise_methods;
        let instance = realm.call(&methods.resolve, &methods.ctor, &[value])?;
        Ok(SafePromise {
            instance,
            methods: methods.clone(),
        })
    }

    /// `SafePromise.reject(reason)`
    pub fn promise_reject(&self, realm: &Realm, reason: Value) -> VmResult<SafePromise> {
        let methods = &self.promise_methods;
        let instance = realm.call(&methods.reject, &methods.ctor, &[reason])?;
        Ok(SafePromise {
            instance,
            methods: methods.clone(),
        })
    }
}

/// Collect `(key, value)` pairs through a captured `forEach`
fn drain_for_each(realm: &Realm, for_each: &Value, instance: &Value) -> VmResult<Vec<(Value, Value)>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback = realm.new_function("", 2, move |_realm, _this, args| {
        sink.lock().push((arg(args, 1), arg(args, 0)));
        Ok(Value::undefined())
    });
    realm.call(for_each, instance, &[callback])?;
    let entries = std::mem::take(&mut *seen.lock());
    Ok(entries)
}

#[derive(Debug)]
struct MapMethods {
    ctor: Value,
    get: Value,
    set: Value,
    has: Value,
    delete: Value,
    for_each: Value,
    size: Value,
}

impl MapMethods {
    fn capture(proto: &Arc<JsObject>, ctor: &Arc<JsObject>) -> BootstrapResult<Self> {
        let owner = Owner::new("Map.prototype", proto);
        Ok(Self {
            ctor: Value::object(ctor.clone()),
            get: capture_function(owner, "get")?,
            set: capture_function(owner, "set")?,
            has: capture_function(owner, "has")?,
            delete: capture_function(owner, "delete")?,
            for_each: capture_function(owner, "forEach")?,
            size: capture_getter(owner, "size")?,
        })
    }
}

/// A `SafeMap` instance driven from Rust
#[derive(Clone, Debug)]
pub struct SafeMap {
    instance: Value,
    methods: Arc<MapMethods>,
}

impl SafeMap {
    pub fn get(&self, realm: &Realm, key: &Value) -> VmResult<Value> {
        realm.call(&self.methods.get, &self.instance, &[key.clone()])
    }

    pub fn set(&self, realm: &Realm, key: Value, value: Value) -> VmResult<()> {
        realm.call(&self.methods.set, &self.instance, &[key, value])?;
        Ok(())
    }

    pub fn has(&self, realm: &Realm, key: &Value) -> VmResult<bool> {
        Ok(realm.call(&self.methods.has, &self.instance, &[key.clone()])?.to_boolean())
    }

    pub fn delete(&self, realm: &Realm, key: &Value) -> VmResult<bool> {
        Ok(realm.call(&self.methods.delete, &self.instance, &[key.clone()])?.to_boolean())
    }

    pub fn size(&self, realm: &Realm) -> VmResult<usize> {
        let size = realm.call(&self.methods.size, &self.instance, &[])?;
        realm.to_length(&size)
    }

    /// Entries in insertion order
    pub fn entries(&self, realm: &Realm) -> VmResult<Vec<(Value, Value)>> {
        drain_for_each(realm, &self.methods.for_each, &self.instance)
    }

    pub fn as_value(&self) -> &Value {
        &self.instance
    }
}

#[derive(Debug)]
struct SetMethods {
    ctor: Value,
    add: Value,
    has: Value,
    delete: Value,
    for_each: Value,
    size: Value,
}

impl SetMethods {
    fn capture(proto: &Arc<JsObject>, ctor: &Arc<JsObject>) -> BootstrapResult<Self> {
        let owner = Owner::new("Set.prototype", proto);
        Ok(Self {
            ctor: Value::object(ctor.clone()),
            add: capture_function(owner, "add")?,
            has: capture_function(owner, "has")?,
            delete: capture_function(owner, "delete")?,
            for_each: capture_function(owner, "forEach")?,
            size: capture_getter(owner, "size")?,
        })
    }
}

/// A `SafeSet` instance driven from Rust
#[derive(Clone, Debug)]
pub struct SafeSet {
    instance: Value,
    methods: Arc<SetMethods>,
}

impl SafeSet {
    pub fn add(&self, realm: &Realm, value: Value) -> VmResult<()> {
        realm.call(&self.methods.add, &self.instance, &[value])?;
        Ok(())
    }

    pub fn has(&self, realm: &Realm, value: &Value) -> VmResult<bool> {
        Ok(realm.call(&self.methods.has, &self.instance, &[value.clone()])?.to_boolean())
    }

    pub fn delete(&self, realm: &Realm, value: &Value) -> VmResult<bool> {
        Ok(realm.call(&self.methods.delete, &self.instance, &[value.clone()])?.to_boolean())
    }

    pub fn size(&self, realm: &Realm) -> VmResult<usize> {
        let size = realm.call(&self.methods.size, &self.instance, &[])?;
        realm.to_length(&size)
    }

    /// Members in insertion order
    pub fn values(&self, realm: &Realm) -> VmResult<Vec<Value>> {
        let entries = drain_for_each(realm, &self.methods.for_each, &self.instance)?;
        Ok(entries.into_iter().map(|(_, value)| value).collect())
    }

    pub fn as_value(&self) -> &Value {
        &self.instance
    }
}

/// Weak collection methods. `insert` is `WeakMap#set` or `WeakSet#add`;
/// `get` only exists on maps.
#[derive(Debug)]
struct KeyedMethods {
    ctor: Value,
    insert: Value,
    get: Option<Value>,
    has: Value,
    delete: Value,
}

impl KeyedMethods {
    fn capture(owner: Owner<'_>, ctor: &Arc<JsObject>, insert: &str) -> BootstrapResult<Self> {
        let get = match insert {
            "set" => Some(capture_function(owner, "get")?),
            _ => None,
        };
        Ok(Self {
            ctor: Value::object(ctor.clone()),
            insert: capture_function(owner, insert)?,
            get,
            has: capture_function(owner, "has")?,
            delete: capture_function(owner, "delete")?,
        })
    }

    fn has(&self, realm: &Realm, instance: &Value, key: &Value) -> VmResult<bool> {
        Ok(realm.call(&self.has, instance, &[key.clone()])?.to_boolean())
    }

    fn delete(&self, realm: &Realm, instance: &Value, key: &Value) -> VmResult<bool> {
        Ok(realm.call(&self.delete, instance, &[key.clone()])?.to_boolean())
    }
}

/// A `SafeWeakMap` instance driven from Rust. Keys must be objects.
#[derive(Clone, Debug)]
pub struct SafeWeakMap {
    instance: Value,
    methods: Arc<KeyedMethods>,
}

impl SafeWeakMap {
    pub fn get(&self, realm: &Realm, key: &Value) -> VmResult<Value> {
        let get = self
            .methods
            .get
            .as_ref()
            .ok_or_else(|| VmError::internal("SafeWeakMap built without WeakMap.prototype.get"))?;
        realm.call(get, &self.instance, &[key.clone()])
    }

    pub fn set(&self, realm: &Realm, key: Value, value: Value) -> VmResult<()> {
        realm.call(&self.methods.insert, &self.instance, &[key, value])?;
        Ok(())
    }

    pub fn has(&self, realm: &Realm, key: &Value) -> VmResult<bool> {
        self.methods.has(realm, &self.instance, key)
    }

    pub fn delete(&self, realm: &Realm, key: &Value) -> VmResult<bool> {
        self.methods.delete(realm, &self.instance, key)
    }

    pub fn as_value(&self) -> &Value {
        &self.instance
    }
}

/// A `SafeWeakSet` instance driven from Rust
#[derive(Clone, Debug)]
pub struct SafeWeakSet {
    instance: Value,
    methods: Arc<KeyedMethods>,
}

impl SafeWeakSet {
    pub fn add(&self, realm: &Realm, value: Value) -> VmResult<()> {
        realm.call(&self.methods.insert, &self.instance, &[value])?;
        Ok(())
    }

    pub fn has(&self, realm: &Realm, value: &Value) -> VmResult<bool> {
        self.methods.has(realm, &self.instance, value)
    }

    pub fn delete(&self, realm: &Realm, value: &Value) -> VmResult<bool> {
        self.methods.delete(realm, &self.instance, value)
    }

    pub fn as_value(&self) -> &Value {
        &self.instance
    }
}

#[derive(Debug)]
struct PromiseMethods {
    ctor: Value,
    then: Value,
    resolve: Value,
    reject: Value,
}

impl PromiseMethods {
    fn capture(
        proto: &Arc<JsObject>,
        unsafe_ctor: &Arc<JsObject>,
        ctor: &Arc<JsObject>,
    ) -> BootstrapResult<Self> {
        let statics = Owner::new("Promise", unsafe_ctor);
        Ok(Self {
            ctor: Value::object(ctor.clone()),
            then: capture_function(Owner::new("Promise.prototype", proto), "then")?,
            resolve: capture_function(statics, "resolve")?,
            reject: capture_function(statics, "reject")?,
        })
    }
}

/// A `SafePromise` instance driven from Rust
#[derive(Clone, Debug)]
pub struct SafePromise {
    instance: Value,
    methods: Arc<PromiseMethods>,
}

impl SafePromise {
    /// `then` with the captured `Promise.prototype.then`. Pass `undefined`
    /// to skip a handler.
    pub fn then(&self, realm: &Realm, on_fulfilled: Value, on_rejected: Value) -> VmResult<SafePromise> {
        let instance = realm.call(&self.methods.then, &self.instance, &[on_fulfilled, on_rejected])?;
        Ok(SafePromise {
            instance,
            methods: self.methods.clone(),
        })
    }

    pub fn state(&self, realm: &Realm) -> Option<PromiseState> {
        realm.promise_state(&self.instance)
    }

    pub fn as_value(&self) -> &Value {
        &self.instance
    }
}

/// Define the `Promise` statics on the `SafePromise` shell, each calling the
/// captured original with the shell as receiver. Runs before [`make_safe`]
/// so these win over the copied unbound statics.
fn pin_promise_statics(
    realm: &Realm,
    unsafe_ctor: &Arc<JsObject>,
    shell: &Arc<JsObject>,
) -> BootstrapResult<()> {
    let owner = Owner::new("Promise", unsafe_ctor);
    for (name, length) in PROMISE_STATICS {
        let original = capture_function(owner, name)?;
        let receiver = Value::object(shell.clone());
        let pinned = realm.new_function(name, length, move |realm, _this, args| {
            realm.call(&original, &receiver, args)
        });
        if !shell.define_own_property(PropertyKey::string(name), PropertyDescriptor::builtin_method(pinned)) {
            return Err(BootstrapError::wrong_shape(
                format!("SafePromise.{name}"),
                "definable static",
            ));
        }
    }
    Ok(())
}

/// `class <name> extends <unsafe> { constructor(...args) { super(...args) } }`
fn shell(
    realm: &Realm,
    name: &str,
    unsafe_ctor: &Arc<JsObject>,
    length: u32,
) -> BootstrapResult<Arc<JsObject>> {
    let i = realm.intrinsics();
    let unsafe_proto = capture_object(Owner::new(name, unsafe_ctor), "prototype")?;
    let parent = Value::object(unsafe_ctor.clone());
    Ok(
        BuiltInBuilder::new(&i.function_prototype, Arc::new(JsObject::new(None)), name)
            .inherits(&unsafe_proto)
            .constructor_fn(
                move |realm, args, new_target| {
                    realm.construct(&parent, args, Some(&Value::object(new_target.clone())))
                },
                length,
            )
            .build(),
    )
}

/// A safe iterator over `owner[Symbol.iterator]` advanced by
/// `iterator_proto.next`
fn builtin_iterator(
    realm: &Realm,
    name: &str,
    owner: Owner<'_>,
    iterator_proto: Owner<'_>,
) -> BootstrapResult<SafeIteratorType> {
    let factory = capture_function(owner, PropertyKey::from(&realm.intrinsics().symbols.iterator))?;
    let next = capture_function(iterator_proto, "next")?;
    create_safe_iterator(realm, name, factory, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_prototypes_are_rootless() {
        let realm = Realm::new();
        let types = SafeTypes::build(&realm).unwrap();
        for (name, ctor) in types.constructors() {
            let ctor = ctor.as_object().unwrap();
            let proto = ctor
                .get_own_value(&PropertyKey::string("prototype"))
                .and_then(|p| p.as_object().cloned())
                .unwrap();
            assert!(proto.prototype().is_none(), "{name}");
            assert!(proto.is_frozen() && ctor.is_frozen(), "{name}");
        }
    }

    #[test]
    fn test_map_handle_uses_captured_methods() {
        let realm = Realm::new();
        let types = SafeTypes::build(&realm).unwrap();
        let map = types.new_map(&realm).unwrap();
        map.set(&realm, Value::from("a"), Value::from(1)).unwrap();
        map.set(&realm, Value::from("b"), Value::from(2)).unwrap();

        let proto = Value::object(realm.intrinsics().map_prototype.clone());
        for name in ["get", "set", "has", "delete", "forEach"] {
            let broken = realm.new_function(name, 0, |_realm, _this, _args| {
                Err(VmError::type_error("patched"))
            });
            realm.put(&proto, name, broken).unwrap();
        }

        assert_eq!(map.get(&realm, &Value::from("b")).unwrap(), Value::from(2));
        assert!(map.has(&realm, &Value::from("a")).unwrap());
        assert!(map.delete(&realm, &Value::from("a")).unwrap());
        assert!(!map.has(&realm, &Value::from("a")).unwrap());
        assert_eq!(map.size(&realm).unwrap(), 1);
        assert_eq!(
            map.entries(&realm).unwrap(),
            vec![(Value::from("b"), Value::from(2))]
        );
    }

    #[test]
    fn test_promise_statics_work_detached() {
        let realm = Realm::new();
        let types = SafeTypes::build(&realm).unwrap();
        let safe_proto = types
            .promise
            .get_own_value(&PropertyKey::string("prototype"))
            .and_then(|p| p.as_object().cloned())
            .unwrap();

        let resolve = types.promise.get_own_value(&PropertyKey::string("resolve")).unwrap();
        let out = realm.call(&resolve, &Value::undefined(), &[Value::from(7)]).unwrap();
        let out_proto = out.as_object().unwrap().prototype().unwrap();
        assert!(Arc::ptr_eq(&out_proto, &safe_proto));

        let all = types.promise.get_own_value(&PropertyKey::string("all")).unwrap();
        let items = Value::object(realm.new_array(vec![Value::from(1), out]));
        let combined = realm.call(&all, &Value::undefined(), &[items]).unwrap();
        realm.run_jobs().unwrap();
        let Some(PromiseState::Fulfilled(values)) = realm.promise_state(&combined) else {
            panic!("detached all did not fulfill");
        };
        assert_eq!(
            values.as_object().unwrap().array_elements(),
            Some(vec![Value::from(1), Value::from(7)])
        );
    }

    #[test]
    fn test_safe_map_instances_use_safe_prototype() {
        let realm = Realm::new();
        let types = SafeTypes::build(&realm).unwrap();
        let map = realm
            .construct(&Value::object(types.map.clone()), &[], None)
            .unwrap();
        let proto = map.as_object().unwrap().prototype().unwrap();
        let safe_proto = types
            .map
            .get_own_value(&PropertyKey::string("prototype"))
            .and_then(|p| p.as_object().cloned())
            .unwrap();
        assert!(Arc::ptr_eq(&proto, &safe_proto));
    }
}
