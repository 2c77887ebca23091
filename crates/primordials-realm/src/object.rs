//! JavaScript objects
//!
//! Own properties are kept in insertion order; built-in state that must not
//! be reachable through properties (map entries, promise state, the compiled
//! pattern of a RegExp, ...) lives in the immutable [`ObjectKind`] slot.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::error::{VmError, VmResult};
use crate::function::NativeFunction;
use crate::iterator::{
    ArrayIteratorState, MapIteratorState, RegExpStringIteratorState, StringIteratorState,
};
use crate::map_data::MapData;
use crate::promise::JsPromise;
use crate::regexp::JsRegExp;
use crate::value::{Symbol, Value};
use crate::weak::{FinalizationRegistryData, WeakRefCell, WeakTable};

/// Property key (string, symbol or array index)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// String property key
    String(Arc<str>),
    /// Symbol property key
    Symbol(Arc<Symbol>),
    /// Integer index (canonical numeric string below 2^32 - 1)
    Index(u32),
}

impl PropertyKey {
    /// Create a string property key. Canonical array indices become `Index`.
    pub fn string(s: &str) -> Self {
        if let Ok(i) = s.parse::<u32>()
            && i != u32::MAX
            && i.to_string() == s
        {
            return Self::Index(i);
        }
        Self::String(Arc::from(s))
    }

    /// Create an index property key
    pub fn index(i: u32) -> Self {
        Self::Index(i)
    }

    pub fn as_index(&self) -> Option<u32> {
        match self {
            Self::Index(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Self::Symbol(_))
    }

    /// The key as a JS value (strings for indices)
    pub fn to_value(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Symbol(s) => Value::Symbol(s.clone()),
            Self::Index(i) => Value::string(i.to_string()),
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Symbol(s) => match &s.description {
                Some(desc) => write!(f, "[{desc}]"),
                None => write!(f, "[Symbol()]"),
            },
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        Self::Index(i)
    }
}

impl From<usize> for PropertyKey {
    fn from(i: usize) -> Self {
        match u32::try_from(i) {
            Ok(i) if i != u32::MAX => Self::Index(i),
            _ => Self::String(Arc::from(i.to_string())),
        }
    }
}

impl From<&Arc<Symbol>> for PropertyKey {
    fn from(s: &Arc<Symbol>) -> Self {
        Self::Symbol(s.clone())
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(k: &PropertyKey) -> Self {
        k.clone()
    }
}

/// Property attributes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PropertyAttributes {
    /// Property is writable
    pub writable: bool,
    /// Property is enumerable
    pub enumerable: bool,
    /// Property is configurable
    pub configurable: bool,
}

impl PropertyAttributes {
    /// Default data property attributes (plain assignment)
    pub const fn data() -> Self {
        Self {
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Built-in method attributes: writable, non-enumerable, configurable
    pub const fn builtin() -> Self {
        Self {
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    /// Built-in accessor attributes: non-enumerable, configurable
    pub const fn builtin_accessor() -> Self {
        Self {
            writable: false,
            enumerable: false,
            configurable: true,
        }
    }

    /// Read-only but configurable (function `name`/`length`, `@@toStringTag`)
    pub const fn readonly() -> Self {
        Self {
            writable: false,
            enumerable: false,
            configurable: true,
        }
    }

    /// Non-writable, non-enumerable, non-configurable
    pub const fn frozen() -> Self {
        Self {
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }
}

/// Property descriptor
#[derive(Clone, Debug)]
pub enum PropertyDescriptor {
    /// Data property
    Data {
        /// The value
        value: Value,
        /// Attributes
        attributes: PropertyAttributes,
    },
    /// Accessor property (`writable` is ignored)
    Accessor {
        /// Getter function
        get: Option<Value>,
        /// Setter function
        set: Option<Value>,
        /// Attributes
        attributes: PropertyAttributes,
    },
}

impl PropertyDescriptor {
    /// Create a data property
    pub fn data(value: Value) -> Self {
        Self::Data {
            value,
            attributes: PropertyAttributes::data(),
        }
    }

    /// Create a data property with specific attributes
    pub fn data_with_attrs(value: Value, attributes: PropertyAttributes) -> Self {
        Self::Data { value, attributes }
    }

    /// Create a built-in method property
    pub fn builtin_method(value: Value) -> Self {
        Self::Data {
            value,
            attributes: PropertyAttributes::builtin(),
        }
    }

    /// Create an accessor property
    pub fn accessor(get: Option<Value>, set: Option<Value>, attributes: PropertyAttributes) -> Self {
        Self::Accessor {
            get,
            set,
            attributes,
        }
    }

    /// Get the value (for data properties)
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::Accessor { .. } => None,
        }
    }

    /// Getter (for accessor properties)
    pub fn getter(&self) -> Option<&Value> {
        match self {
            Self::Accessor { get, .. } => get.as_ref(),
            Self::Data { .. } => None,
        }
    }

    /// Setter (for accessor properties)
    pub fn setter(&self) -> Option<&Value> {
        match self {
            Self::Accessor { set, .. } => set.as_ref(),
            Self::Data { .. } => None,
        }
    }

    pub fn attributes(&self) -> PropertyAttributes {
        match self {
            Self::Data { attributes, .. } | Self::Accessor { attributes, .. } => *attributes,
        }
    }

    fn attributes_mut(&mut self) -> &mut PropertyAttributes {
        match self {
            Self::Data { attributes, .. } | Self::Accessor { attributes, .. } => attributes,
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }

    /// Check if writable (accessors never are)
    pub fn is_writable(&self) -> bool {
        match self {
            Self::Data { attributes, .. } => attributes.writable,
            Self::Accessor { .. } => false,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        self.attributes().enumerable
    }

    pub fn is_configurable(&self) -> bool {
        self.attributes().configurable
    }
}

/// Internal slots of an object, fixed at creation
pub enum ObjectKind {
    /// Plain object
    Ordinary,
    /// Array exotic object; elements are dense
    Array(RwLock<Vec<Value>>),
    /// Native function (possibly a constructor)
    Function(NativeFunction),
    /// Error instance
    Error,
    /// Map instance
    Map(MapData),
    /// Set instance (keys map to themselves)
    Set(MapData),
    /// WeakMap instance
    WeakMap(WeakTable),
    /// WeakSet instance
    WeakSet(WeakTable),
    /// WeakRef instance
    WeakRef(WeakRefCell),
    /// FinalizationRegistry instance
    FinalizationRegistry(FinalizationRegistryData),
    /// Promise instance (public or internal)
    Promise(Arc<JsPromise>),
    /// RegExp instance
    RegExp(JsRegExp),
    /// %ArrayIterator%
    ArrayIterator(Mutex<ArrayIteratorState>),
    /// %MapIterator% / %SetIterator%
    MapIterator(Mutex<MapIteratorState>),
    /// %StringIterator%
    StringIterator(Mutex<StringIteratorState>),
    /// %RegExpStringIterator%
    RegExpStringIterator(Mutex<RegExpStringIteratorState>),
    /// Host-defined internal slot, invisible to property access
    Host(Box<dyn Any + Send + Sync>),
}

impl ObjectKind {
    fn name(&self) -> &'static str {
        match self {
            Self::Ordinary => "Object",
            Self::Array(_) => "Array",
            Self::Function(_) => "Function",
            Self::Error => "Error",
            Self::Map(_) => "Map",
            Self::Set(_) => "Set",
            Self::WeakMap(_) => "WeakMap",
            Self::WeakSet(_) => "WeakSet",
            Self::WeakRef(_) => "WeakRef",
            Self::FinalizationRegistry(_) => "FinalizationRegistry",
            Self::Promise(_) => "Promise",
            Self::RegExp(_) => "RegExp",
            Self::ArrayIterator(_) => "Array Iterator",
            Self::MapIterator(_) => "Map Iterator",
            Self::StringIterator(_) => "String Iterator",
            Self::RegExpStringIterator(_) => "RegExp String Iterator",
            Self::Host(_) => "Object",
        }
    }
}

/// A JavaScript object
///
/// Thread-safe with interior mutability.
pub struct JsObject {
    /// Prototype (`None` for root-less objects)
    prototype: RwLock<Option<Arc<JsObject>>>,
    /// Own properties in insertion order
    properties: RwLock<IndexMap<PropertyKey, PropertyDescriptor>>,
    /// `[[Extensible]]`
    extensible: AtomicBool,
    /// Set by `freeze`; array elements become read-only
    frozen_elements: AtomicBool,
    /// Internal slots
    kind: ObjectKind,
}

impl JsObject {
    /// Create a new ordinary object
    pub fn new(prototype: Option<Arc<JsObject>>) -> Self {
        Self::with_kind(prototype, ObjectKind::Ordinary)
    }

    /// Create an object with the given internal slots
    pub fn with_kind(prototype: Option<Arc<JsObject>>, kind: ObjectKind) -> Self {
        Self {
            prototype: RwLock::new(prototype),
            properties: RwLock::new(IndexMap::new()),
            extensible: AtomicBool::new(true),
            frozen_elements: AtomicBool::new(false),
            kind,
        }
    }

    /// Create a new array with the given elements
    pub fn array(prototype: Option<Arc<JsObject>>, elements: Vec<Value>) -> Self {
        Self::with_kind(prototype, ObjectKind::Array(RwLock::new(elements)))
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Has a `[[Call]]` slot
    pub fn is_callable(&self) -> bool {
        matches!(&self.kind, ObjectKind::Function(f) if f.call.is_some())
    }

    /// Has a `[[Construct]]` slot
    pub fn is_constructor(&self) -> bool {
        matches!(&self.kind, ObjectKind::Function(f) if f.construct.is_some())
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, ObjectKind::Error)
    }

    pub fn as_function(&self) -> Option<&NativeFunction> {
        match &self.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_promise(&self) -> Option<&Arc<JsPromise>> {
        match &self.kind {
            ObjectKind::Promise(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_regexp(&self) -> Option<&JsRegExp> {
        match &self.kind {
            ObjectKind::RegExp(r) => Some(r),
            _ => None,
        }
    }

    /// Host-defined slot of type `T`
    pub fn host_data<T: Any>(&self) -> Option<&T> {
        match &self.kind {
            ObjectKind::Host(data) => data.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Class name used by debug output
    pub fn class_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Get prototype
    pub fn prototype(&self) -> Option<Arc<JsObject>> {
        self.prototype.read().clone()
    }

    /// `[[SetPrototypeOf]]`. Fails on non-extensible objects and on cycles.
    pub fn set_prototype_of(self: &Arc<Self>, proto: Option<Arc<JsObject>>) -> bool {
        let current = self.prototype();
        let same = match (&current, &proto) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        if same {
            return true;
        }
        if !self.is_extensible() {
            return false;
        }
        let mut cursor = proto.clone();
        while let Some(p) = cursor {
            if Arc::ptr_eq(&p, self) {
                return false;
            }
            cursor = p.prototype();
        }
        *self.prototype.write() = proto;
        true
    }

    pub fn is_extensible(&self) -> bool {
        self.extensible.load(Ordering::Acquire)
    }

    /// `[[PreventExtensions]]`
    pub fn prevent_extensions(&self) -> bool {
        self.extensible.store(false, Ordering::Release);
        true
    }

    /// `[[GetOwnProperty]]`
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        if let ObjectKind::Array(elements) = &self.kind {
            let frozen = self.frozen_elements.load(Ordering::Acquire);
            match key {
                PropertyKey::Index(i) => {
                    let elements = elements.read();
                    return elements.get(*i as usize).map(|v| {
                        PropertyDescriptor::data_with_attrs(
                            v.clone(),
                            PropertyAttributes {
                                writable: !frozen,
                                enumerable: true,
                                configurable: !frozen,
                            },
                        )
                    });
                }
                PropertyKey::String(s) if &**s == "length" => {
                    let len = elements.read().len();
                    return Some(PropertyDescriptor::data_with_attrs(
                        Value::from(len),
                        PropertyAttributes {
                            writable: !frozen,
                            enumerable: false,
                            configurable: false,
                        },
                    ));
                }
                _ => {}
            }
        }
        self.properties.read().get(key).cloned()
    }

    /// Check if object has own property
    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.get_own_property(key).is_some()
    }

    /// `[[DefineOwnProperty]]` (ValidateAndApplyPropertyDescriptor, simplified
    /// to complete descriptors)
    pub fn define_own_property(&self, key: PropertyKey, desc: PropertyDescriptor) -> bool {
        if let ObjectKind::Array(elements) = &self.kind {
            match &key {
                PropertyKey::Index(i) => {
                    let Some(value) = desc.value().cloned() else {
                        return false;
                    };
                    if self.frozen_elements.load(Ordering::Acquire) {
                        return false;
                    }
                    let idx = *i as usize;
                    let mut elements = elements.write();
                    if idx >= elements.len() {
                        if !self.is_extensible() || !grow_elements(&mut elements, idx + 1) {
                            return false;
                        }
                    }
                    elements[idx] = value;
                    return true;
                }
                PropertyKey::String(s) if &**s == "length" => {
                    let Some(Ok(len)) = desc.value().map(array_length) else {
                        return false;
                    };
                    if self.frozen_elements.load(Ordering::Acquire) {
                        return false;
                    }
                    let mut elements = elements.write();
                    if len <= elements.len() {
                        elements.truncate(len);
                        return true;
                    }
                    return grow_elements(&mut elements, len);
                }
                _ => {}
            }
        }

        let mut props = self.properties.write();
        match props.get_mut(&key) {
            None => {
                if !self.is_extensible() {
                    return false;
                }
                props.insert(key, desc);
                true
            }
            Some(current) => {
                if !current.is_configurable() {
                    if desc.is_configurable()
                        || desc.is_enumerable() != current.is_enumerable()
                        || desc.is_accessor() != current.is_accessor()
                    {
                        return false;
                    }
                    match (&*current, &desc) {
                        (
                            PropertyDescriptor::Data { value: old, .. },
                            PropertyDescriptor::Data { value: new, .. },
                        ) => {
                            if !current.is_writable()
                                && (desc.is_writable() || !old.same_value(new))
                            {
                                return false;
                            }
                        }
                        (
                            PropertyDescriptor::Accessor {
                                get: old_get,
                                set: old_set,
                                ..
                            },
                            PropertyDescriptor::Accessor {
                                get: new_get,
                                set: new_set,
                                ..
                            },
                        ) => {
                            if !same_optional(old_get, new_get) || !same_optional(old_set, new_set)
                            {
                                return false;
                            }
                        }
                        _ => return false,
                    }
                }
                *current = desc;
                true
            }
        }
    }

    /// `[[Delete]]`
    pub fn delete(&self, key: &PropertyKey) -> bool {
        if let ObjectKind::Array(elements) = &self.kind {
            match key {
                PropertyKey::Index(i) => {
                    if self.frozen_elements.load(Ordering::Acquire) {
                        return false;
                    }
                    let mut elements = elements.write();
                    let idx = *i as usize;
                    if idx + 1 == elements.len() {
                        elements.pop();
                    } else if idx < elements.len() {
                        elements[idx] = Value::undefined();
                    }
                    return true;
                }
                PropertyKey::String(s) if &**s == "length" => return false,
                _ => {}
            }
        }

        let mut props = self.properties.write();
        match props.get(key) {
            None => true,
            Some(desc) if !desc.is_configurable() => false,
            Some(_) => {
                props.shift_remove(key);
                true
            }
        }
    }

    /// `[[OwnPropertyKeys]]`: indices ascending, then strings, then symbols
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let mut indices: Vec<u32> = Vec::new();
        let mut strings = Vec::new();
        let mut symbols = Vec::new();

        if let ObjectKind::Array(elements) = &self.kind {
            indices.extend(0..elements.read().len() as u32);
            strings.push(PropertyKey::string("length"));
        }
        for key in self.properties.read().keys() {
            match key {
                PropertyKey::Index(i) => indices.push(*i),
                PropertyKey::String(_) => strings.push(key.clone()),
                PropertyKey::Symbol(_) => symbols.push(key.clone()),
            }
        }
        indices.sort_unstable();
        indices.dedup();

        let mut keys: Vec<PropertyKey> = indices.into_iter().map(PropertyKey::Index).collect();
        keys.extend(strings);
        keys.extend(symbols);
        keys
    }

    /// Read an own data property without invoking accessors
    pub fn get_own_value(&self, key: &PropertyKey) -> Option<Value> {
        self.get_own_property(key).and_then(|d| d.value().cloned())
    }

    /// `Object.freeze` (SetIntegrityLevel frozen)
    pub fn freeze(&self) -> bool {
        self.prevent_extensions();
        self.frozen_elements.store(true, Ordering::Release);
        let mut props = self.properties.write();
        for desc in props.values_mut() {
            let is_data = !desc.is_accessor();
            let attrs = desc.attributes_mut();
            attrs.configurable = false;
            if is_data {
                attrs.writable = false;
            }
        }
        true
    }

    /// `Object.isFrozen` (TestIntegrityLevel frozen)
    pub fn is_frozen(&self) -> bool {
        if self.is_extensible() {
            return false;
        }
        if self.is_array()
            && !self.frozen_elements.load(Ordering::Acquire)
            && self.array_len() > 0
        {
            return false;
        }
        self.properties
            .read()
            .values()
            .all(|d| !d.is_configurable() && !d.is_writable())
    }

    /// Snapshot of array elements
    pub fn array_elements(&self) -> Option<Vec<Value>> {
        match &self.kind {
            ObjectKind::Array(elements) => Some(elements.read().clone()),
            _ => None,
        }
    }

    /// Get array length (0 for non-arrays)
    pub fn array_len(&self) -> usize {
        match &self.kind {
            ObjectKind::Array(elements) => elements.read().len(),
            _ => 0,
        }
    }

    /// Push element to array. Returns false for frozen or non-array objects.
    pub fn array_push(&self, value: Value) -> bool {
        match &self.kind {
            ObjectKind::Array(elements) if !self.frozen_elements.load(Ordering::Acquire) => {
                elements.write().push(value);
                true
            }
            _ => false,
        }
    }
}

/// Longest array the dense element storage holds. Writes past it are
/// refused; the realm reports them as a `RangeError`.
pub const MAX_DENSE_ELEMENTS: usize = 1 << 24;

/// ArraySetLength validation: a uint32 that also fits dense storage
pub fn array_length(value: &Value) -> VmResult<usize> {
    let n = value.as_number().unwrap_or(f64::NAN);
    if !(0.0..=u32::MAX as f64).contains(&n) || n.fract() != 0.0 {
        return Err(VmError::range_error("Invalid array length"));
    }
    let len = n as usize;
    if len > MAX_DENSE_ELEMENTS {
        return Err(VmError::range_error(format!(
            "Array length {len} exceeds the dense storage limit of {MAX_DENSE_ELEMENTS}"
        )));
    }
    Ok(len)
}

/// RangeError when a list of `len` elements would not fit dense storage
pub fn check_list_length(len: usize) -> VmResult<()> {
    if len > MAX_DENSE_ELEMENTS {
        return Err(VmError::range_error(format!(
            "Array-like length {len} exceeds the dense storage limit of {MAX_DENSE_ELEMENTS}"
        )));
    }
    Ok(())
}

/// `len` holes, for `new Array(len)`. RangeError when the allocation fails.
pub fn holes(len: usize) -> VmResult<Vec<Value>> {
    let mut elements = Vec::new();
    if !grow_elements(&mut elements, len) {
        return Err(VmError::range_error(format!("Cannot allocate an array of length {len}")));
    }
    Ok(elements)
}

/// Extend with holes up to `len`. False when `len` is past the dense limit
/// or the allocation fails.
fn grow_elements(elements: &mut Vec<Value>, len: usize) -> bool {
    if len > MAX_DENSE_ELEMENTS {
        return false;
    }
    let extra = len.saturating_sub(elements.len());
    if elements.try_reserve_exact(extra).is_err() {
        return false;
    }
    elements.resize(len, Value::undefined());
    true
}

fn same_optional(a: &Option<Value>, b: &Option<Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same_value(b),
        _ => false,
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let props = self.properties.read();
        let mut s = f.debug_struct("JsObject");
        s.field("class", &self.class_name());
        if let Some(func) = self.as_function() {
            s.field("name", &func.name);
        }
        s.field("properties", &props.len())
            .field("extensible", &self.is_extensible())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_key_canonical_index() {
        assert_eq!(PropertyKey::string("0"), PropertyKey::Index(0));
        assert_eq!(PropertyKey::string("42"), PropertyKey::Index(42));
        assert!(matches!(PropertyKey::string("01"), PropertyKey::String(_)));
        assert!(matches!(PropertyKey::string("-1"), PropertyKey::String(_)));
    }

    #[test]
    fn test_define_and_delete() {
        let obj = JsObject::new(None);
        assert!(obj.define_own_property("foo".into(), PropertyDescriptor::data(Value::from(1))));
        assert_eq!(obj.get_own_value(&"foo".into()), Some(Value::from(1)));
        assert!(obj.delete(&"foo".into()));
        assert!(!obj.has_own_property(&"foo".into()));
    }

    #[test]
    fn test_non_configurable_is_sticky() {
        let obj = JsObject::new(None);
        obj.define_own_property(
            "x".into(),
            PropertyDescriptor::data_with_attrs(Value::from(1), PropertyAttributes::frozen()),
        );
        assert!(!obj.delete(&"x".into()));
        assert!(!obj.define_own_property("x".into(), PropertyDescriptor::data(Value::from(2))));
        assert!(obj.define_own_property(
            "x".into(),
            PropertyDescriptor::data_with_attrs(Value::from(1), PropertyAttributes::frozen()),
        ));
    }

    #[test]
    fn test_freeze() {
        let obj = JsObject::new(None);
        obj.define_own_property("a".into(), PropertyDescriptor::data(Value::from(1)));
        assert!(obj.freeze());
        assert!(obj.is_frozen());
        assert!(!obj.define_own_property("b".into(), PropertyDescriptor::data(Value::from(2))));
        assert!(!obj.delete(&"a".into()));
        assert!(!obj.define_own_property("a".into(), PropertyDescriptor::data(Value::from(3))));
    }

    #[test]
    fn test_set_prototype_of() {
        let a = Arc::new(JsObject::new(None));
        let b = Arc::new(JsObject::new(Some(a.clone())));
        assert!(!a.set_prototype_of(Some(b.clone())), "cycle must be rejected");
        assert!(b.set_prototype_of(None));
        b.prevent_extensions();
        assert!(!b.set_prototype_of(Some(a.clone())));
        assert!(b.set_prototype_of(None));
    }

    #[test]
    fn test_own_keys_order() {
        let sym = Arc::new(Symbol {
            id: 1000,
            description: None,
        });
        let obj = JsObject::new(None);
        obj.define_own_property(PropertyKey::Symbol(sym), PropertyDescriptor::data(Value::null()));
        obj.define_own_property("b".into(), PropertyDescriptor::data(Value::null()));
        obj.define_own_property("2".into(), PropertyDescriptor::data(Value::null()));
        obj.define_own_property("a".into(), PropertyDescriptor::data(Value::null()));
        obj.define_own_property("1".into(), PropertyDescriptor::data(Value::null()));

        let keys: Vec<String> = obj.own_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["1", "2", "b", "a", "[Symbol()]"]);
    }

    #[test]
    fn test_array_elements() {
        let arr = JsObject::array(None, vec![Value::from(1), Value::from(2)]);
        assert_eq!(arr.array_len(), 2);
        assert_eq!(arr.get_own_value(&PropertyKey::Index(1)), Some(Value::from(2)));
        assert_eq!(arr.get_own_value(&"length".into()), Some(Value::from(2)));
        assert!(arr.array_push(Value::from(3)));
        arr.freeze();
        assert!(!arr.array_push(Value::from(4)));
        assert!(arr.is_frozen());
    }

    #[test]
    fn test_array_length_validation() {
        assert_eq!(array_length(&Value::from(3)).unwrap(), 3);
        for bad in [
            Value::number(f64::NAN),
            Value::number(-1.0),
            Value::number(1.5),
            Value::number(4_294_967_296.0),
            Value::number(4_294_967_295.0),
            Value::from("3"),
        ] {
            assert!(matches!(array_length(&bad), Err(VmError::RangeError(_))), "{bad:?}");
        }
    }

    #[test]
    fn test_array_storage_refuses_oversized_growth() {
        let arr = JsObject::array(None, vec![Value::from(1), Value::from(2)]);
        let huge = PropertyDescriptor::data(Value::number(4_294_967_295.0));
        assert!(!arr.define_own_property("length".into(), huge));
        let nan = PropertyDescriptor::data(Value::number(f64::NAN));
        assert!(!arr.define_own_property("length".into(), nan));
        let far = PropertyKey::Index(MAX_DENSE_ELEMENTS as u32);
        assert!(!arr.define_own_property(far, PropertyDescriptor::data(Value::from(0))));
        assert_eq!(arr.array_len(), 2);

        assert!(arr.define_own_property("length".into(), PropertyDescriptor::data(Value::from(4))));
        assert_eq!(arr.array_len(), 4);
        assert!(arr.define_own_property("length".into(), PropertyDescriptor::data(Value::from(1))));
        assert_eq!(arr.array_elements(), Some(vec![Value::from(1)]));
    }

    #[test]
    fn test_object_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JsObject>();
    }
}
