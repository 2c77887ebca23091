//! Instance-level RegExp hardening.
//!
//! A hardened regexp carries its own copies of every method and flag the
//! RegExp algorithms read back from the receiver, so they never reach
//! `RegExp.prototype`. Species lookups land on a private splitter class
//! whose instances wrap a fresh regexp and expose only `exec` and
//! `lastIndex`.

use std::sync::Arc;

use primordials_realm::{
    BuiltInBuilder, JsObject, NativeFn, ObjectKind, PropertyAttributes, PropertyDescriptor,
    PropertyKey, Realm, Value, VmError, VmResult, arg,
};

use crate::capture::{Owner, capture, capture_function, capture_getter};
use crate::error::BootstrapResult;

/// Symbol-keyed methods copied onto hardened instances
const SYMBOL_METHODS: [&str; 5] = ["match", "matchAll", "replace", "search", "split"];

/// Accessors whose current values are pinned on hardened instances
const PINNED_GETTERS: [&str; 9] = [
    "source",
    "flags",
    "global",
    "sticky",
    "unicode",
    "dotAll",
    "hasIndices",
    "ignoreCase",
    "multiline",
];

/// Private regexp behind a splitter instance
struct SplitterSlot {
    inner: Value,
}

fn splitter_inner(this: &Value) -> VmResult<&Value> {
    this.as_object()
        .and_then(|obj| obj.host_data::<SplitterSlot>())
        .map(|slot| &slot.inner)
        .ok_or_else(|| VmError::type_error("incompatible receiver for RegExp splitter"))
}

#[derive(Clone, Debug)]
pub struct RegExpHardener {
    regexp_ctor: Value,
    exec: Value,
    symbol_methods: Vec<(PropertyKey, Value)>,
    getters: Vec<(&'static str, Value)>,
    search: Value,
    species_holder: Arc<JsObject>,
}

impl RegExpHardener {
    pub fn new(realm: &Realm) -> BootstrapResult<Self> {
        let i = realm.intrinsics();
        let proto = Owner::new("RegExp.prototype", &i.regexp_prototype);
        let regexp_ctor = capture(Owner::new("globalThis", realm.global()), "RegExp")?;
        let exec = capture_function(proto, "exec")?;

        let mut symbol_methods = Vec::with_capacity(SYMBOL_METHODS.len());
        for (name, symbol) in i.symbols.entries() {
            if SYMBOL_METHODS.contains(&name) {
                let key = PropertyKey::from(symbol);
                let method = capture_function(proto, key.clone())?;
                symbol_methods.push((key, method));
            }
        }
        let search = capture_function(proto, PropertyKey::from(&i.symbols.search))?;

        let getters = PINNED_GETTERS
            .iter()
            .map(|&name| Ok((name, capture_getter(proto, name)?)))
            .collect::<BootstrapResult<Vec<_>>>()?;

        let splitter = build_splitter(realm, regexp_ctor.clone(), exec.clone());
        let species_holder = Arc::new(JsObject::new(None));
        species_holder.define_own_property(
            PropertyKey::from(&i.symbols.species),
            PropertyDescriptor::data_with_attrs(Value::object(splitter), PropertyAttributes::frozen()),
        );
        species_holder.freeze();

        tracing::debug!(methods = symbol_methods.len(), getters = getters.len(), "regexp hardener ready");
        Ok(Self {
            regexp_ctor,
            exec,
            symbol_methods,
            getters,
            search,
            species_holder,
        })
    }

    /// Pin the methods, flags and species of `pattern` onto the instance.
    /// Returns the same object.
    pub fn harden(&self, realm: &Realm, pattern: &Value) -> VmResult<Value> {
        let Some(rx) = pattern.as_object().filter(|o| o.as_regexp().is_some()) else {
            return Err(VmError::type_error(format!(
                "hardenRegExp expects a RegExp, got {}",
                realm.describe(pattern)
            )));
        };

        let mut pinned: Vec<(PropertyKey, Value)> = self.symbol_methods.clone();
        pinned.push((PropertyKey::string("exec"), self.exec.clone()));
        for (name, getter) in &self.getters {
            let value = realm.call(getter, pattern, &[])?;
            pinned.push((PropertyKey::string(name), value));
        }
        pinned.push((
            PropertyKey::string("constructor"),
            Value::object(self.species_holder.clone()),
        ));
        for (key, value) in pinned {
            realm.define_property_or_throw(
                rx,
                key,
                PropertyDescriptor::data_with_attrs(value, PropertyAttributes::frozen()),
            )?;
        }

        let last_index_key = PropertyKey::string("lastIndex");
        let last_index = rx.get_own_value(&last_index_key).unwrap_or_else(|| Value::from(0));
        realm.define_property_or_throw(
            rx,
            last_index_key,
            PropertyDescriptor::data_with_attrs(
                last_index,
                PropertyAttributes {
                    writable: true,
                    enumerable: false,
                    configurable: false,
                },
            ),
        )?;
        Ok(pattern.clone())
    }

    /// Index of the first match of `regexp` in `string`, or -1. A
    /// non-RegExp `regexp` is compiled with the captured constructor first.
    pub fn string_search(&self, realm: &Realm, string: &Value, regexp: &Value) -> VmResult<Value> {
        let rx = if regexp.as_object().is_some_and(|o| o.as_regexp().is_some()) {
            regexp.clone()
        } else {
            realm.construct(&self.regexp_ctor, &[regexp.clone()], None)?
        };
        realm.call(&self.search, &rx, &[string.clone()])
    }

    /// `hardenRegExp` and `SafeStringPrototypeSearch` as realm functions
    pub fn functions(&self, realm: &Realm) -> Vec<(&'static str, Value)> {
        let hardener = self.clone();
        let harden = realm.new_function("hardenRegExp", 1, move |realm, _this, args| {
            hardener.harden(realm, &arg(args, 0))
        });
        let hardener = self.clone();
        let search = realm.new_function("SafeStringPrototypeSearch", 2, move |realm, _this, args| {
            hardener.string_search(realm, &arg(args, 0), &arg(args, 1))
        });
        vec![("hardenRegExp", harden), ("SafeStringPrototypeSearch", search)]
    }
}

/// The species target of hardened regexps: `new Splitter(pattern, flags)`
/// compiles a private regexp with the captured constructor.
fn build_splitter(realm: &Realm, regexp_ctor: Value, exec: Value) -> Arc<JsObject> {
    let i = realm.intrinsics();
    let prototype = Arc::new(JsObject::new(None));
    let instance_proto = prototype.clone();

    let get_last_index: NativeFn = Arc::new(|_realm: &Realm, this: &Value, _args: &[Value]| {
        let inner = splitter_inner(this)?;
        Ok(inner
            .as_object()
            .and_then(|o| o.get_own_value(&PropertyKey::string("lastIndex")))
            .unwrap_or_default())
    });
    let set_last_index: NativeFn = Arc::new(|realm: &Realm, this: &Value, args: &[Value]| {
        let inner = splitter_inner(this)?;
        realm.put(inner, "lastIndex", arg(args, 0))?;
        Ok(Value::undefined())
    });

    let constructor = BuiltInBuilder::new(&i.function_prototype, prototype.clone(), "RegExpSplitter")
        .constructor_fn(
            move |realm, args, _new_target| {
                let inner = realm.construct(&regexp_ctor, &[arg(args, 0), arg(args, 1)], None)?;
                Ok(Value::object(Arc::new(JsObject::with_kind(
                    Some(instance_proto.clone()),
                    ObjectKind::Host(Box::new(SplitterSlot { inner })),
                ))))
            },
            2,
        )
        .method(
            "exec",
            move |realm, this, args| {
                let inner = splitter_inner(this)?;
                realm.call(&exec, inner, &[arg(args, 0)])
            },
            1,
        )
        .accessor("lastIndex", Some(get_last_index), Some(set_last_index))
        .build();

    prototype.delete(&PropertyKey::string("constructor"));
    prototype.freeze();
    constructor.freeze();
    constructor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regexp(realm: &Realm, pattern: &str, flags: &str) -> Value {
        let ctor = Value::object(realm.intrinsics().regexp_constructor.clone());
        realm
            .construct(&ctor, &[Value::from(pattern), Value::from(flags)], None)
            .unwrap()
    }

    #[test]
    fn test_harden_rejects_non_regexp() {
        let realm = Realm::new();
        let hardener = RegExpHardener::new(&realm).unwrap();
        let err = hardener.harden(&realm, &Value::from("a")).unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
    }

    #[test]
    fn test_hardened_instance_pins_flags() {
        let realm = Realm::new();
        let hardener = RegExpHardener::new(&realm).unwrap();
        let rx = regexp(&realm, "a", "gi");
        hardener.harden(&realm, &rx).unwrap();
        let obj = rx.as_object().unwrap();
        let flags = obj.get_own_property(&PropertyKey::string("flags")).unwrap();
        assert_eq!(flags.value().and_then(|v| v.as_str()), Some("gi"));
        assert!(!flags.is_writable());
        let last_index = obj.get_own_property(&PropertyKey::string("lastIndex")).unwrap();
        assert!(last_index.is_writable() && !last_index.is_enumerable());
    }

    #[test]
    fn test_string_search_compiles_strings() {
        let realm = Realm::new();
        let hardener = RegExpHardener::new(&realm).unwrap();
        let index = hardener
            .string_search(&realm, &Value::from("xxab"), &Value::from("a+b"))
            .unwrap();
        assert_eq!(index.as_number(), Some(2.0));
    }
}
