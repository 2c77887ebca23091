//! The table of built-ins captured into the registry.
//!
//! Names follow `<Owner><Key>`: `ArrayPrototypePush`, `MathMax`,
//! `MapPrototypeGetSize` for getters, `ArrayPrototypeSymbolIterator` for
//! well-known symbol keys, and an `Apply` suffix for apply-bound variants.
//! Prototype members are registered uncurried (receiver first).

use std::sync::Arc;

use primordials_realm::{Intrinsics, JsObject, PropertyKey, Realm, Value};

use crate::capture::{Owner, capture, capture_function, capture_getter};
use crate::error::{BootstrapError, BootstrapResult};
use crate::registry::RegistryBuilder;
use crate::uncurry::{ApplyBound, Uncurried};

#[derive(Clone, Copy, Debug)]
enum Slot {
    /// A function-valued data property
    Method(&'static str),
    /// A function keyed by a well-known symbol (by its `Symbol.<name>`)
    SymbolMethod(&'static str),
    /// The getter of an accessor
    Getter(&'static str),
    /// A non-function data property
    Constant(&'static str),
}

/// How a captured function receives `this`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Receiver {
    /// Receiver passed as the first argument
    Explicit,
    /// Called with `undefined`
    Unbound,
    /// Called with the owner (statics that use `this` as a constructor)
    Owner,
}

struct OwnerTable<'a> {
    prefix: &'static str,
    label: &'static str,
    object: &'a Arc<JsObject>,
    receiver: Receiver,
    slots: &'static [Slot],
}

use Slot::{Constant, Getter, Method, SymbolMethod};

const OBJECT: &[Slot] = &[
    Method("create"),
    Method("defineProperty"),
    Method("freeze"),
    Method("getOwnPropertyDescriptor"),
    Method("getPrototypeOf"),
    Method("isExtensible"),
    Method("isFrozen"),
    Method("keys"),
    Method("preventExtensions"),
    Method("setPrototypeOf"),
];

const OBJECT_PROTOTYPE: &[Slot] = &[
    Method("hasOwnProperty"),
    Method("propertyIsEnumerable"),
    Method("toString"),
    Method("valueOf"),
];

const FUNCTION_PROTOTYPE: &[Slot] = &[Method("apply"), Method("call"), Method("toString")];

const ARRAY: &[Slot] = &[Method("from"), Method("isArray"), Method("of")];

const ARRAY_PROTOTYPE: &[Slot] = &[
    Method("entries"),
    Method("forEach"),
    Method("includes"),
    Method("indexOf"),
    Method("join"),
    Method("keys"),
    Method("map"),
    Method("pop"),
    Method("push"),
    Method("slice"),
    Method("toString"),
    Method("values"),
    SymbolMethod("iterator"),
];

const ITERATOR_NEXT: &[Slot] = &[Method("next")];

const STRING_PROTOTYPE: &[Slot] = &[
    Method("charAt"),
    Method("endsWith"),
    Method("includes"),
    Method("indexOf"),
    Method("match"),
    Method("matchAll"),
    Method("replace"),
    Method("search"),
    Method("slice"),
    Method("split"),
    Method("startsWith"),
    Method("toLowerCase"),
    Method("toString"),
    Method("toUpperCase"),
    Method("trim"),
    Method("valueOf"),
    SymbolMethod("iterator"),
];

const SYMBOL_PROTOTYPE: &[Slot] = &[Method("toString"), Method("valueOf"), Getter("description")];

const MATH: &[Slot] = &[
    Method("abs"),
    Method("ceil"),
    Method("floor"),
    Method("max"),
    Method("min"),
    Method("pow"),
    Method("round"),
    Method("sign"),
    Method("sqrt"),
    Method("trunc"),
    Constant("E"),
    Constant("PI"),
];

const REFLECT: &[Slot] = &[
    Method("apply"),
    Method("construct"),
    Method("defineProperty"),
    Method("get"),
    Method("getPrototypeOf"),
    Method("has"),
    Method("ownKeys"),
    Method("set"),
    Method("setPrototypeOf"),
];

const MAP_PROTOTYPE: &[Slot] = &[
    Method("clear"),
    Method("delete"),
    Method("entries"),
    Method("forEach"),
    Method("get"),
    Method("has"),
    Method("keys"),
    Method("set"),
    Method("values"),
    Getter("size"),
    SymbolMethod("iterator"),
];

const SET_PROTOTYPE: &[Slot] = &[
    Method("add"),
    Method("clear"),
    Method("delete"),
    Method("difference"),
    Method("entries"),
    Method("forEach"),
    Method("has"),
    Method("intersection"),
    Method("isDisjointFrom"),
    Method("isSubsetOf"),
    Method("isSupersetOf"),
    Method("keys"),
    Method("symmetricDifference"),
    Method("union"),
    Method("values"),
    Getter("size"),
    SymbolMethod("iterator"),
];

const WEAK_MAP_PROTOTYPE: &[Slot] = &[Method("delete"), Method("get"), Method("has"), Method("set")];

const WEAK_SET_PROTOTYPE: &[Slot] = &[Method("add"), Method("delete"), Method("has")];

const WEAK_REF_PROTOTYPE: &[Slot] = &[Method("deref")];

const FINALIZATION_REGISTRY_PROTOTYPE: &[Slot] = &[Method("register"), Method("unregister")];

const PROMISE: &[Slot] = &[
    Method("all"),
    Method("allSettled"),
    Method("any"),
    Method("race"),
    Method("reject"),
    Method("resolve"),
    Method("withResolvers"),
];

const PROMISE_PROTOTYPE: &[Slot] = &[Method("catch"), Method("finally"), Method("then")];

const REGEXP_PROTOTYPE: &[Slot] = &[
    Method("exec"),
    Method("test"),
    Method("toString"),
    SymbolMethod("match"),
    SymbolMethod("matchAll"),
    SymbolMethod("replace"),
    SymbolMethod("search"),
    SymbolMethod("split"),
    Getter("dotAll"),
    Getter("flags"),
    Getter("global"),
    Getter("hasIndices"),
    Getter("ignoreCase"),
    Getter("multiline"),
    Getter("source"),
    Getter("sticky"),
    Getter("unicode"),
    Getter("unicodeSets"),
];

fn tables(i: &Intrinsics) -> Vec<OwnerTable<'_>> {
    use Receiver::{Explicit, Owner, Unbound};
    let table = |prefix, label, object, receiver, slots| OwnerTable {
        prefix,
        label,
        object,
        receiver,
        slots,
    };
    vec![
        table("Object", "Object", &i.object_constructor, Unbound, OBJECT),
        table("ObjectPrototype", "Object.prototype", &i.object_prototype, Explicit, OBJECT_PROTOTYPE),
        table("FunctionPrototype", "Function.prototype", &i.function_prototype, Explicit, FUNCTION_PROTOTYPE),
        table("Array", "Array", &i.array_constructor, Owner, ARRAY),
        table("ArrayPrototype", "Array.prototype", &i.array_prototype, Explicit, ARRAY_PROTOTYPE),
        table("ArrayIteratorPrototype", "%ArrayIteratorPrototype%", &i.array_iterator_prototype, Explicit, ITERATOR_NEXT),
        table("StringPrototype", "String.prototype", &i.string_prototype, Explicit, STRING_PROTOTYPE),
        table("StringIteratorPrototype", "%StringIteratorPrototype%", &i.string_iterator_prototype, Explicit, ITERATOR_NEXT),
        table("SymbolPrototype", "Symbol.prototype", &i.symbol_prototype, Explicit, SYMBOL_PROTOTYPE),
        table("Math", "Math", &i.math, Unbound, MATH),
        table("Reflect", "Reflect", &i.reflect, Unbound, REFLECT),
        table("MapPrototype", "Map.prototype", &i.map_prototype, Explicit, MAP_PROTOTYPE),
        table("MapIteratorPrototype", "%MapIteratorPrototype%", &i.map_iterator_prototype, Explicit, ITERATOR_NEXT),
        table("SetPrototype", "Set.prototype", &i.set_prototype, Explicit, SET_PROTOTYPE),
        table("SetIteratorPrototype", "%SetIteratorPrototype%", &i.set_iterator_prototype, Explicit, ITERATOR_NEXT),
        table("WeakMapPrototype", "WeakMap.prototype", &i.weak_map_prototype, Explicit, WEAK_MAP_PROTOTYPE),
        table("WeakSetPrototype", "WeakSet.prototype", &i.weak_set_prototype, Explicit, WEAK_SET_PROTOTYPE),
        table("WeakRefPrototype", "WeakRef.prototype", &i.weak_ref_prototype, Explicit, WEAK_REF_PROTOTYPE),
        table(
            "FinalizationRegistryPrototype",
            "FinalizationRegistry.prototype",
            &i.finalization_registry_prototype,
            Explicit,
            FINALIZATION_REGISTRY_PROTOTYPE,
        ),
        table("Promise", "Promise", &i.promise_constructor, Owner, PROMISE),
        table("PromisePrototype", "Promise.prototype", &i.promise_prototype, Explicit, PROMISE_PROTOTYPE),
        table("RegExpPrototype", "RegExp.prototype", &i.regexp_prototype, Explicit, REGEXP_PROTOTYPE),
    ]
}

/// `isArray` → `IsArray`
pub(crate) fn pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn well_known_symbol(realm: &Realm, name: &str) -> BootstrapResult<PropertyKey> {
    realm
        .intrinsics()
        .symbols
        .entries()
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, sym)| PropertyKey::from(sym))
        .ok_or_else(|| BootstrapError::missing("Symbol", name))
}

fn register_function(
    realm: &Realm,
    registry: &mut RegistryBuilder,
    name: String,
    func: Value,
    receiver: Receiver,
    owner: &Arc<JsObject>,
) -> BootstrapResult<()> {
    let value = match receiver {
        Receiver::Explicit => Uncurried::new(name.clone(), func)?.to_function(realm),
        Receiver::Unbound => func,
        Receiver::Owner => {
            let owner = Value::object(owner.clone());
            let length = func
                .as_object()
                .and_then(|o| o.as_function())
                .map_or(0, |f| f.length);
            realm.new_function(&name, length, move |realm, _this, args| {
                realm.call(&func, &owner, args)
            })
        }
    };
    registry.insert(name, value)
}

/// Capture every catalog entry into `registry`. Returns the number of
/// entries added.
pub fn capture_catalog(realm: &Realm, registry: &mut RegistryBuilder) -> BootstrapResult<usize> {
    let before = registry.len();
    let intrinsics = realm.intrinsics();

    for (name, symbol) in intrinsics.symbols.entries() {
        registry.insert(
            format!("Symbol{}", pascal_case(name)),
            Value::Symbol(symbol.clone()),
        )?;
    }

    for table in tables(intrinsics) {
        let owner = Owner::new(table.label, table.object);
        for slot in table.slots {
            match *slot {
                Slot::Method(key) => {
                    let func = capture_function(owner, key)?;
                    let name = format!("{}{}", table.prefix, pascal_case(key));
                    register_function(realm, registry, name, func, table.receiver, table.object)?;
                }
                Slot::SymbolMethod(symbol) => {
                    let key = well_known_symbol(realm, symbol)?;
                    let func = capture_function(owner, key)?;
                    let name = format!("{}Symbol{}", table.prefix, pascal_case(symbol));
                    register_function(realm, registry, name, func, table.receiver, table.object)?;
                }
                Slot::Getter(key) => {
                    let getter = capture_getter(owner, key)?;
                    let name = format!("{}Get{}", table.prefix, pascal_case(key));
                    register_function(realm, registry, name, getter, Receiver::Explicit, table.object)?;
                }
                Slot::Constant(key) => {
                    let value = capture(owner, key)?;
                    registry.insert(format!("{}{}", table.prefix, key), value)?;
                }
            }
        }
    }

    register_apply_variants(realm, registry)?;

    let added = registry.len() - before;
    tracing::debug!(added, "catalog captured");
    Ok(added)
}

/// `…Apply` entries: the captured function applied to an arguments array
fn register_apply_variants(realm: &Realm, registry: &mut RegistryBuilder) -> BootstrapResult<()> {
    let i = realm.intrinsics();
    let variants: [(&str, &str, &Arc<JsObject>, &str, Option<&Arc<JsObject>>); 4] = [
        ("ArrayPrototypePushApply", "Array.prototype", &i.array_prototype, "push", None),
        ("ArrayOfApply", "Array", &i.array_constructor, "of", Some(&i.array_constructor)),
        ("MathMaxApply", "Math", &i.math, "max", Some(&i.math)),
        ("MathMinApply", "Math", &i.math, "min", Some(&i.math)),
    ];
    for (name, label, object, key, receiver) in variants {
        let func = capture_function(Owner::new(label, object), key)?;
        let bound = ApplyBound::new(name, func, receiver.map(|r| Value::object(r.clone())))?;
        registry.insert(name, bound.to_function(realm))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("isArray"), "IsArray");
        assert_eq!(pascal_case("matchAll"), "MatchAll");
        assert_eq!(pascal_case(""), "");
    }

    #[test]
    fn test_catalog_names() {
        let realm = Realm::new();
        let mut registry = RegistryBuilder::new();
        let added = capture_catalog(&realm, &mut registry).unwrap();
        assert_eq!(added, registry.len());
        for name in [
            "SymbolIterator",
            "ArrayPrototypePush",
            "ArrayPrototypeSymbolIterator",
            "MapPrototypeGetSize",
            "RegExpPrototypeSymbolSplit",
            "RegExpPrototypeGetFlags",
            "MathPI",
            "PromiseAll",
            "ArrayPrototypePushApply",
        ] {
            assert!(registry.contains(name), "{name} missing");
        }
    }

    #[test]
    fn test_catalog_rejects_second_capture_into_same_registry() {
        let realm = Realm::new();
        let mut registry = RegistryBuilder::new();
        capture_catalog(&realm, &mut registry).unwrap();
        assert!(matches!(
            capture_catalog(&realm, &mut registry),
            Err(BootstrapError::DuplicateEntry(_))
        ));
    }

    #[test]
    fn test_owner_receiver_binds_static() {
        let realm = Realm::new();
        let mut registry = RegistryBuilder::new();
        capture_catalog(&realm, &mut registry).unwrap();
        let array_of = registry.get("ArrayOf").unwrap().clone();
        let out = realm
            .call(&array_of, &Value::undefined(), &[Value::from(1), Value::from(2)])
            .unwrap();
        assert_eq!(realm.length_of_array_like(&out).unwrap(), 2);
    }
}
