//! Safe iterator types.
//!
//! A safe iterator holds one raw iterator in a host slot and advances it
//! with a `next` captured at bootstrap. Its prototype has no `[[Prototype]]`
//! and exposes only `next` and `[Symbol.iterator]`.

use std::sync::Arc;

use primordials_realm::{
    BuiltInBuilder, JsObject, ObjectKind, PropertyKey, Realm, Value, VmError, VmResult, arg,
};

use crate::error::{BootstrapError, BootstrapResult};

/// Internal slot of a safe iterator instance
struct SafeIteratorSlot {
    raw: Value,
    next: Value,
}

fn slot_of<'a>(this: &'a Value, type_name: &str) -> VmResult<&'a SafeIteratorSlot> {
    this.as_object()
        .and_then(|obj| obj.host_data::<SafeIteratorSlot>())
        .ok_or_else(|| VmError::type_error(format!("{type_name}.prototype.next called on incompatible receiver")))
}

/// A frozen iterator class produced by [`create_safe_iterator`]
#[derive(Clone, Debug)]
pub struct SafeIteratorType {
    name: String,
    constructor: Arc<JsObject>,
    prototype: Arc<JsObject>,
}

impl SafeIteratorType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constructor(&self) -> &Arc<JsObject> {
        &self.constructor
    }

    pub fn prototype(&self) -> &Arc<JsObject> {
        &self.prototype
    }

    /// `new SafeIterator(source)`
    pub fn create(&self, realm: &Realm, source: Value) -> VmResult<Value> {
        realm.construct(&Value::object(self.constructor.clone()), &[source], None)
    }

    /// Build an instance over `source` and drive it from Rust
    pub fn iter<'r>(&self, realm: &'r Realm, source: Value) -> VmResult<SafeIter<'r>> {
        let iterator = self.create(realm, source)?;
        SafeIter::new(realm, &iterator)
    }
}

/// Build a safe iterator class.
///
/// `factory` is called once per instance with the source as receiver and
/// must return the raw iterator; `next` is called with the raw iterator as
/// receiver on every step. Both are used as given, so callers pass captured
/// functions.
pub fn create_safe_iterator(
    realm: &Realm,
    name: &str,
    factory: Value,
    next: Value,
) -> BootstrapResult<SafeIteratorType> {
    for (label, func) in [("factory", &factory), ("next", &next)] {
        if !func.is_callable() {
            return Err(BootstrapError::NotCallable {
                name: format!("{name} {label}"),
            });
        }
    }

    let intrinsics = realm.intrinsics();
    let prototype = Arc::new(JsObject::new(None));
    let type_name = name.to_string();

    let instance_proto = prototype.clone();
    let constructor = BuiltInBuilder::new(&intrinsics.function_prototype, prototype.clone(), name)
        .constructor_fn(
            move |realm, args, _new_target| {
                let raw = realm.call(&factory, &arg(args, 0), &[])?;
                let slot = SafeIteratorSlot {
                    raw,
                    next: next.clone(),
                };
                Ok(Value::object(Arc::new(JsObject::with_kind(
                    Some(instance_proto.clone()),
                    ObjectKind::Host(Box::new(slot)),
                ))))
            },
            1,
        )
        .method(
            "next",
            move |realm, this, _args| {
                let slot = slot_of(this, &type_name)?;
                realm.call(&slot.next, &slot.raw, &[])
            },
            0,
        )
        .method(&intrinsics.symbols.iterator, |_realm, this, _args| Ok(this.clone()), 0)
        .build();

    // Instances see only `next` and `[Symbol.iterator]`.
    prototype.delete(&PropertyKey::string("constructor"));
    prototype.freeze();
    constructor.freeze();
    tracing::debug!(name, "safe iterator type created");

    Ok(SafeIteratorType {
        name: name.to_string(),
        constructor,
        prototype,
    })
}

/// Drives a safe iterator (or any iterator whose slot came from
/// [`create_safe_iterator`]) as a Rust iterator. Each step goes straight to
/// the captured `next`.
pub struct SafeIter<'r> {
    realm: &'r Realm,
    raw: Value,
    next: Value,
    done: bool,
}

impl<'r> SafeIter<'r> {
    pub fn new(realm: &'r Realm, safe_iterator: &Value) -> VmResult<Self> {
        let slot = slot_of(safe_iterator, "SafeIterator")?;
        Ok(Self {
            realm,
            raw: slot.raw.clone(),
            next: slot.next.clone(),
            done: false,
        })
    }

    fn step(&mut self) -> VmResult<Option<Value>> {
        let result = self.realm.call(&self.next, &self.raw, &[])?;
        let Some(record) = result.as_object() else {
            return Err(VmError::type_error(format!(
                "Iterator result {} is not an object",
                self.realm.describe(&result)
            )));
        };
        let done = record
            .get_own_value(&PropertyKey::string("done"))
            .unwrap_or_default();
        if done.to_boolean() {
            return Ok(None);
        }
        Ok(Some(
            record
                .get_own_value(&PropertyKey::string("value"))
                .unwrap_or_default(),
        ))
    }
}

impl Iterator for SafeIter<'_> {
    type Item = VmResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array_iterator_type(realm: &Realm) -> SafeIteratorType {
        let i = realm.intrinsics();
        let factory = i
            .array_prototype
            .get_own_value(&PropertyKey::from(&i.symbols.iterator))
            .unwrap();
        let next = i
            .array_iterator_prototype
            .get_own_value(&PropertyKey::string("next"))
            .unwrap();
        create_safe_iterator(realm, "SafeArrayIterator", factory, next).unwrap()
    }

    #[test]
    fn test_prototype_exposes_only_next_and_iterator() {
        let realm = Realm::new();
        let ty = array_iterator_type(&realm);
        let keys = ty.prototype().own_keys();
        assert_eq!(keys.len(), 2);
        assert!(ty.prototype().prototype().is_none());
        assert!(ty.prototype().is_frozen());
        assert!(ty.constructor().is_frozen());
    }

    #[test]
    fn test_survives_patched_array_iterator_next() {
        let realm = Realm::new();
        let ty = array_iterator_type(&realm);
        let proto = Value::object(realm.intrinsics().array_iterator_prototype.clone());
        let hijack = realm.new_function("next", 0, |_realm, _this, _args| {
            Err(VmError::type_error("hijacked"))
        });
        realm.put(&proto, "next", hijack).unwrap();

        let source = Value::object(realm.new_array(vec![Value::from(1), Value::from(2)]));
        let values: Vec<f64> = ty
            .iter(&realm, source)
            .unwrap()
            .map(|v| v.unwrap().as_number().unwrap())
            .collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_next_rejects_foreign_receiver() {
        let realm = Realm::new();
        let ty = array_iterator_type(&realm);
        let next = ty.prototype().get_own_value(&PropertyKey::string("next")).unwrap();
        let err = realm
            .call(&next, &Value::object(realm.new_object()), &[])
            .unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
    }

    #[test]
    fn test_rejects_non_callable_next() {
        let realm = Realm::new();
        let factory = realm.new_function("f", 0, |_realm, this, _args| Ok(this.clone()));
        assert!(matches!(
            create_safe_iterator(&realm, "Broken", factory, Value::from(1)),
            Err(BootstrapError::NotCallable { .. })
        ));
    }
}
