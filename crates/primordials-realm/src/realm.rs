//! The realm: intrinsics, global object, job queue and the abstract
//! operations native code is written against.
//!
//! `call` and `construct` never look anything up on the callee; `get`,
//! `set` and `invoke` go through ordinary property lookup and therefore see
//! whatever user code has put on shared prototypes.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::config::RealmConfig;
use crate::error::{VmError, VmResult};
use crate::function::{NativeFunction, make_function_object};
use crate::intrinsics::{Intrinsics, well_known};
use crate::microtask::{Job, JobQueue};
use crate::object::{
    JsObject, MAX_DENSE_ELEMENTS, ObjectKind, PropertyDescriptor, PropertyKey, array_length,
    check_list_length,
};
use crate::promise::ReactionHandler;
use crate::string::utf16_len;
use crate::value::{Symbol, Value, number_to_string};

/// Error constructors a native can throw through [`Realm::new_error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    SyntaxError,
}

/// Hint for ToPrimitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    Default,
    String,
    Number,
}

impl PreferredType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::String => "string",
            Self::Number => "number",
        }
    }
}

struct NativeDepthGuard<'a>(&'a AtomicUsize);

impl Drop for NativeDepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A JavaScript realm driven by native code
pub struct Realm {
    config: RealmConfig,
    intrinsics: Intrinsics,
    global: Arc<JsObject>,
    jobs: JobQueue,
    native_depth: AtomicUsize,
    next_symbol_id: AtomicU64,
    finalization_registries: Mutex<Vec<Weak<JsObject>>>,
    extensions: Mutex<FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realm")
            .field("config", &self.config)
            .field("pending_jobs", &self.jobs.len())
            .finish()
    }
}

impl Realm {
    /// Create a realm with the default configuration
    pub fn new() -> Self {
        Self::with_config(RealmConfig::default())
    }

    pub fn with_config(config: RealmConfig) -> Self {
        let intrinsics = Intrinsics::new();
        let global = Arc::new(JsObject::new(Some(intrinsics.object_prototype.clone())));
        for (name, value) in intrinsics.global_bindings() {
            global.define_own_property(
                PropertyKey::string(name),
                PropertyDescriptor::builtin_method(Value::object(value)),
            );
        }
        global.define_own_property(
            PropertyKey::string("globalThis"),
            PropertyDescriptor::builtin_method(Value::object(global.clone())),
        );
        tracing::debug!(
            max_native_depth = config.max_native_depth,
            "realm created"
        );
        Self {
            config,
            intrinsics,
            global,
            jobs: JobQueue::new(),
            native_depth: AtomicUsize::new(0),
            next_symbol_id: AtomicU64::new(well_known::FIRST_USER_SYMBOL),
            finalization_registries: Mutex::new(Vec::new()),
            extensions: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn config(&self) -> &RealmConfig {
        &self.config
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// The global object
    pub fn global(&self) -> &Arc<JsObject> {
        &self.global
    }

    /// Allocate a fresh unique symbol
    pub fn new_symbol(&self, description: Option<String>) -> Arc<Symbol> {
        Arc::new(Symbol {
            id: self.next_symbol_id.fetch_add(1, Ordering::Relaxed),
            description,
        })
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn enter_native(&self) -> VmResult<NativeDepthGuard<'_>> {
        let depth = self.native_depth.fetch_add(1, Ordering::AcqRel);
        let guard = NativeDepthGuard(&self.native_depth);
        if depth >= self.config.max_native_depth {
            return Err(VmError::StackOverflow);
        }
        Ok(guard)
    }

    /// Call(F, thisArgument, args). No property of `f` is consulted.
    pub fn call(&self, f: &Value, this: &Value, args: &[Value]) -> VmResult<Value> {
        let func = f
            .as_object()
            .and_then(|o| o.as_function())
            .ok_or_else(|| VmError::type_error(format!("{} is not a function", self.describe(f))))?;
        let Some(call) = func.call.clone() else {
            return Err(VmError::type_error(format!(
                "Constructor {} requires 'new'",
                func.name
            )));
        };
        let _guard = self.enter_native()?;
        call(self, this, args)
    }

    /// Construct(F, args, newTarget). `new_target` defaults to `f`.
    pub fn construct(&self, f: &Value, args: &[Value], new_target: Option<&Value>) -> VmResult<Value> {
        let func = f
            .as_object()
            .and_then(|o| o.as_function())
            .ok_or_else(|| {
                VmError::type_error(format!("{} is not a constructor", self.describe(f)))
            })?;
        let Some(construct) = func.construct.clone() else {
            return Err(VmError::type_error(format!(
                "{} is not a constructor",
                self.describe(f)
            )));
        };
        let new_target = new_target.unwrap_or(f);
        let Some(nt) = new_target.as_object().filter(|o| o.is_constructor()) else {
            return Err(VmError::type_error(format!(
                "{} is not a constructor",
                self.describe(new_target)
            )));
        };
        let _guard = self.enter_native()?;
        let result = construct(self, args, nt)?;
        if !result.is_object() {
            return Err(VmError::internal("constructor returned a non-object"));
        }
        Ok(result)
    }

    /// Invoke(V, P, args): the dispatched path, looks `key` up on `target`
    pub fn invoke(&self, target: &Value, key: impl Into<PropertyKey>, args: &[Value]) -> VmResult<Value> {
        let func = self.get(target, key)?;
        self.call(&func, target, args)
    }

    // ------------------------------------------------------------------
    // Property access
    // ------------------------------------------------------------------

    /// GetV(V, P): `[[Get]]` on objects, prototype lookup for primitives
    pub fn get(&self, target: &Value, key: impl Into<PropertyKey>) -> VmResult<Value> {
        let key = key.into();
        match target {
            Value::Object(obj) => self.ordinary_get(obj, &key, target),
            Value::String(s) => {
                match &key {
                    PropertyKey::String(name) if &**name == "length" => {
                        return Ok(Value::from(utf16_len(s)));
                    }
                    PropertyKey::Index(i) => {
                        let units: Vec<u16> = s.encode_utf16().collect();
                        if let Some(unit) = units.get(*i as usize) {
                            return Ok(Value::from(String::from_utf16_lossy(&[*unit])));
                        }
                        return Ok(Value::undefined());
                    }
                    _ => {}
                }
                self.ordinary_get(&self.intrinsics.string_prototype, &key, target)
            }
            Value::Symbol(_) => self.ordinary_get(&self.intrinsics.symbol_prototype, &key, target),
            Value::Boolean(_) | Value::Number(_) => {
                self.ordinary_get(&self.intrinsics.object_prototype, &key, target)
            }
            Value::Undefined | Value::Null => Err(VmError::type_error(format!(
                "Cannot read properties of {} (reading '{key}')",
                self.describe(target)
            ))),
        }
    }

    /// OrdinaryGet with an explicit receiver
    pub fn ordinary_get(
        &self,
        obj: &Arc<JsObject>,
        key: &PropertyKey,
        receiver: &Value,
    ) -> VmResult<Value> {
        let mut current = Some(obj.clone());
        while let Some(o) = current {
            if let Some(desc) = o.get_own_property(key) {
                return match desc {
                    PropertyDescriptor::Data { value, .. } => Ok(value),
                    PropertyDescriptor::Accessor { get: Some(getter), .. } => {
                        self.call(&getter, receiver, &[])
                    }
                    PropertyDescriptor::Accessor { get: None, .. } => Ok(Value::undefined()),
                };
            }
            current = o.prototype();
        }
        Ok(Value::undefined())
    }

    /// GetMethod(V, P): `None` for undefined/null, TypeError if not callable
    pub fn get_method(&self, target: &Value, key: impl Into<PropertyKey>) -> VmResult<Option<Value>> {
        let key = key.into();
        let func = self.get(target, key.clone())?;
        if func.is_nullish() {
            return Ok(None);
        }
        if !func.is_callable() {
            return Err(VmError::type_error(format!(
                "{} is not a function (property '{key}')",
                self.describe(&func)
            )));
        }
        Ok(Some(func))
    }

    /// `[[Set]]` with receiver `target`. Returns false when the assignment
    /// is refused (read-only, no setter, non-extensible).
    pub fn set(&self, target: &Value, key: impl Into<PropertyKey>, value: Value) -> VmResult<bool> {
        let key = key.into();
        let Some(obj) = target.as_object() else {
            return Ok(false);
        };
        let value = if obj.is_array() {
            self.check_array_write(&key, value)?
        } else {
            value
        };

        let mut current = Some(obj.clone());
        let mut found = None;
        while let Some(o) = current {
            if let Some(desc) = o.get_own_property(&key) {
                found = Some(desc);
                break;
            }
            current = o.prototype();
        }

        match found {
            Some(PropertyDescriptor::Accessor { set, .. }) => match set {
                Some(setter) => {
                    self.call(&setter, target, &[value])?;
                    Ok(true)
                }
                None => Ok(false),
            },
            Some(PropertyDescriptor::Data { attributes, .. }) if !attributes.writable => Ok(false),
            _ => match obj.get_own_property(&key) {
                Some(PropertyDescriptor::Accessor { .. }) => Ok(false),
                Some(PropertyDescriptor::Data { attributes, .. }) => {
                    if !attributes.writable {
                        return Ok(false);
                    }
                    Ok(obj.define_own_property(
                        key,
                        PropertyDescriptor::data_with_attrs(value, attributes),
                    ))
                }
                None => Ok(obj.define_own_property(key, PropertyDescriptor::data(value))),
            },
        }
    }

    /// Array exotic writes: `length` goes through ToNumber and
    /// ArraySetLength validation, indices must fit dense storage.
    fn check_array_write(&self, key: &PropertyKey, value: Value) -> VmResult<Value> {
        match key {
            PropertyKey::String(s) if &**s == "length" => {
                let number = Value::from(self.to_number(&value)?);
                array_length(&number)?;
                Ok(number)
            }
            PropertyKey::Index(i) if *i as usize >= MAX_DENSE_ELEMENTS => Err(VmError::range_error(
                format!("Array index {i} exceeds the dense storage limit of {MAX_DENSE_ELEMENTS}"),
            )),
            _ => Ok(value),
        }
    }

    /// Set(O, P, V, true): TypeError when refused
    pub fn put(&self, target: &Value, key: impl Into<PropertyKey>, value: Value) -> VmResult<()> {
        let key = key.into();
        if self.set(target, key.clone(), value)? {
            Ok(())
        } else {
            Err(VmError::type_error(format!(
                "Cannot assign to read only property '{key}' of {}",
                self.describe(target)
            )))
        }
    }

    /// HasProperty
    pub fn has_property(&self, obj: &Arc<JsObject>, key: &PropertyKey) -> bool {
        let mut current = Some(obj.clone());
        while let Some(o) = current {
            if o.has_own_property(key) {
                return true;
            }
            current = o.prototype();
        }
        false
    }

    /// CreateDataProperty
    pub fn create_data_property(
        &self,
        obj: &Arc<JsObject>,
        key: impl Into<PropertyKey>,
        value: Value,
    ) -> bool {
        obj.define_own_property(key.into(), PropertyDescriptor::data(value))
    }

    /// CreateDataPropertyOrThrow
    pub fn create_data_property_or_throw(
        &self,
        obj: &Arc<JsObject>,
        key: impl Into<PropertyKey>,
        value: Value,
    ) -> VmResult<()> {
        let key = key.into();
        if obj.define_own_property(key.clone(), PropertyDescriptor::data(value)) {
            Ok(())
        } else {
            Err(VmError::type_error(format!("Cannot define property {key}")))
        }
    }

    /// DefinePropertyOrThrow
    pub fn define_property_or_throw(
        &self,
        obj: &Arc<JsObject>,
        key: impl Into<PropertyKey>,
        desc: PropertyDescriptor,
    ) -> VmResult<()> {
        let key = key.into();
        if obj.define_own_property(key.clone(), desc) {
            Ok(())
        } else {
            Err(VmError::type_error(format!("Cannot redefine property: {key}")))
        }
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// OrdinaryObjectCreate(%Object.prototype%)
    pub fn new_object(&self) -> Arc<JsObject> {
        Arc::new(JsObject::new(Some(self.intrinsics.object_prototype.clone())))
    }

    /// CreateArrayFromList
    pub fn new_array(&self, elements: Vec<Value>) -> Arc<JsObject> {
        Arc::new(JsObject::array(
            Some(self.intrinsics.array_prototype.clone()),
            elements,
        ))
    }

    /// A native function object whose `[[Prototype]]` is `%Function.prototype%`
    pub fn new_function<F>(&self, name: &str, length: u32, f: F) -> Value
    where
        F: Fn(&Realm, &Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
    {
        Value::object(make_function_object(
            &self.intrinsics.function_prototype,
            NativeFunction::new(name, length, f),
        ))
    }

    /// Create an error object of the given kind
    pub fn new_error(&self, kind: ErrorKind, message: &str) -> Value {
        let proto = match kind {
            ErrorKind::Error => &self.intrinsics.error_prototype,
            ErrorKind::TypeError => &self.intrinsics.type_error_prototype,
            ErrorKind::RangeError => &self.intrinsics.range_error_prototype,
            ErrorKind::SyntaxError => &self.intrinsics.syntax_error_prototype,
        };
        Value::object(self.error_object(proto, Some(message)))
    }

    pub(crate) fn error_object(&self, proto: &Arc<JsObject>, message: Option<&str>) -> Arc<JsObject> {
        let obj = Arc::new(JsObject::with_kind(Some(proto.clone()), ObjectKind::Error));
        if let Some(message) = message {
            obj.define_own_property(
                PropertyKey::string("message"),
                PropertyDescriptor::builtin_method(Value::from(message)),
            );
        }
        obj
    }

    /// An AggregateError carrying `errors`
    pub fn new_aggregate_error(&self, errors: Vec<Value>, message: &str) -> Value {
        let obj = self.error_object(&self.intrinsics.aggregate_error_prototype, Some(message));
        obj.define_own_property(
            PropertyKey::string("errors"),
            PropertyDescriptor::builtin_method(Value::object(self.new_array(errors))),
        );
        Value::object(obj)
    }

    /// The value a `catch` would observe for `error`
    pub fn error_to_value(&self, error: &VmError) -> Value {
        match error {
            VmError::Exception(thrown) => thrown.value.clone(),
            VmError::TypeError(msg) => self.new_error(ErrorKind::TypeError, msg),
            VmError::RangeError(msg) => self.new_error(ErrorKind::RangeError, msg),
            VmError::SyntaxError(msg) => self.new_error(ErrorKind::SyntaxError, msg),
            VmError::InternalError(msg) => self.new_error(ErrorKind::Error, msg),
            VmError::StackOverflow => {
                self.new_error(ErrorKind::RangeError, "Maximum call stack size exceeded")
            }
        }
    }

    /// Short description of a value for error messages
    pub fn describe(&self, value: &Value) -> String {
        match value {
            Value::String(s) => format!("\"{s}\""),
            Value::Number(n) => number_to_string(*n),
            Value::Symbol(s) => format!("{s:?}"),
            Value::Object(o) => match o.as_function() {
                Some(f) if f.name.is_empty() => "function".to_string(),
                Some(f) => format!("function {}", f.name),
                None => format!("#<{}>", o.class_name()),
            },
            Value::Boolean(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::Undefined => "undefined".to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Conversions
    // ------------------------------------------------------------------

    /// ToPrimitive
    pub fn to_primitive(&self, value: &Value, hint: PreferredType) -> VmResult<Value> {
        if !value.is_object() {
            return Ok(value.clone());
        }
        let exotic = self.get_method(value, &self.intrinsics.symbols.to_primitive)?;
        if let Some(exotic) = exotic {
            let result = self.call(&exotic, value, &[Value::from(hint.as_str())])?;
            if result.is_object() {
                return Err(VmError::type_error("Cannot convert object to primitive value"));
            }
            return Ok(result);
        }
        let order = if hint == PreferredType::String {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for name in order {
            let method = self.get(value, name)?;
            if method.is_callable() {
                let result = self.call(&method, value, &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Err(VmError::type_error("Cannot convert object to primitive value"))
    }

    /// ToString
    pub fn to_string(&self, value: &Value) -> VmResult<Arc<str>> {
        match value {
            Value::Undefined => Ok(Arc::from("undefined")),
            Value::Null => Ok(Arc::from("null")),
            Value::Boolean(b) => Ok(Arc::from(if *b { "true" } else { "false" })),
            Value::Number(n) => Ok(Arc::from(number_to_string(*n))),
            Value::String(s) => Ok(s.clone()),
            Value::Symbol(_) => Err(VmError::type_error(
                "Cannot convert a Symbol value to a string",
            )),
            Value::Object(_) => {
                let prim = self.to_primitive(value, PreferredType::String)?;
                self.to_string(&prim)
            }
        }
    }

    /// ToNumber
    pub fn to_number(&self, value: &Value) -> VmResult<f64> {
        match value {
            Value::Undefined => Ok(f64::NAN),
            Value::Null => Ok(0.0),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Ok(*n),
            Value::String(s) => Ok(string_to_number(s)),
            Value::Symbol(_) => Err(VmError::type_error(
                "Cannot convert a Symbol value to a number",
            )),
            Value::Object(_) => {
                let prim = self.to_primitive(value, PreferredType::Number)?;
                self.to_number(&prim)
            }
        }
    }

    /// ToIntegerOrInfinity
    pub fn to_integer_or_infinity(&self, value: &Value) -> VmResult<f64> {
        let n = self.to_number(value)?;
        if n.is_nan() || n == 0.0 {
            return Ok(0.0);
        }
        if n.is_infinite() {
            return Ok(n);
        }
        Ok(n.trunc())
    }

    /// ToLength
    pub fn to_length(&self, value: &Value) -> VmResult<usize> {
        let n = self.to_integer_or_infinity(value)?;
        if n <= 0.0 {
            return Ok(0);
        }
        Ok(n.min(9_007_199_254_740_991.0) as usize)
    }

    /// ToUint32
    pub fn to_uint32(&self, value: &Value) -> VmResult<u32> {
        let n = self.to_number(value)?;
        if !n.is_finite() || n == 0.0 {
            return Ok(0);
        }
        Ok(n.trunc().rem_euclid(4_294_967_296.0) as u32)
    }

    /// ToPropertyKey
    pub fn to_property_key(&self, value: &Value) -> VmResult<PropertyKey> {
        let prim = self.to_primitive(value, PreferredType::String)?;
        match prim {
            Value::Symbol(sym) => Ok(PropertyKey::Symbol(sym)),
            other => Ok(PropertyKey::string(&self.to_string(&other)?)),
        }
    }

    /// RequireObjectCoercible
    pub fn require_object_coercible(&self, value: &Value, method: &str) -> VmResult<()> {
        if value.is_nullish() {
            return Err(VmError::type_error(format!(
                "{method} called on null or undefined"
            )));
        }
        Ok(())
    }

    /// LengthOfArrayLike
    pub fn length_of_array_like(&self, obj: &Value) -> VmResult<usize> {
        let len = self.get(obj, "length")?;
        self.to_length(&len)
    }

    /// LengthOfArrayLike for code about to materialize every element.
    /// RangeError past [`MAX_DENSE_ELEMENTS`].
    pub fn list_length_of_array_like(&self, obj: &Value) -> VmResult<usize> {
        let len = self.length_of_array_like(obj)?;
        check_list_length(len)?;
        Ok(len)
    }

    /// CreateListFromArrayLike. Arrays are read element by element without
    /// consulting `[Symbol.iterator]`.
    pub fn create_list_from_array_like(&self, value: &Value) -> VmResult<Vec<Value>> {
        let Some(obj) = value.as_object() else {
            return Err(VmError::type_error(
                "CreateListFromArrayLike called on non-object",
            ));
        };
        if let Some(elements) = obj.array_elements() {
            return Ok(elements);
        }
        let len = self.list_length_of_array_like(value)?;
        (0..len).map(|i| self.get(value, i)).collect()
    }

    /// IsRegExp
    pub fn is_regexp(&self, value: &Value) -> VmResult<bool> {
        let Some(obj) = value.as_object() else {
            return Ok(false);
        };
        let matcher = self.get(value, &self.intrinsics.symbols.r#match)?;
        if !matcher.is_undefined() {
            return Ok(matcher.to_boolean());
        }
        Ok(obj.as_regexp().is_some())
    }

    /// SpeciesConstructor(O, defaultConstructor)
    pub fn species_constructor(&self, obj: &Value, default: &Arc<JsObject>) -> VmResult<Value> {
        let ctor = self.get(obj, "constructor")?;
        if ctor.is_undefined() {
            return Ok(Value::object(default.clone()));
        }
        if !ctor.is_object() {
            return Err(VmError::type_error("object.constructor is not an object"));
        }
        let species = self.get(&ctor, &self.intrinsics.symbols.species)?;
        if species.is_nullish() {
            return Ok(Value::object(default.clone()));
        }
        if species.is_constructor() {
            return Ok(species);
        }
        Err(VmError::type_error("object.constructor[Symbol.species] is not a constructor"))
    }

    /// GetPrototypeFromConstructor
    pub fn get_prototype_from_constructor(
        &self,
        new_target: &Arc<JsObject>,
        default: &Arc<JsObject>,
    ) -> VmResult<Arc<JsObject>> {
        let proto = self.ordinary_get(new_target, &PropertyKey::string("prototype"), &Value::object(new_target.clone()))?;
        Ok(proto.as_object().cloned().unwrap_or_else(|| default.clone()))
    }

    /// OrdinaryCreateFromConstructor with explicit internal slots
    pub fn create_from_constructor(
        &self,
        new_target: &Arc<JsObject>,
        default: &Arc<JsObject>,
        kind: ObjectKind,
    ) -> VmResult<Arc<JsObject>> {
        let proto = self.get_prototype_from_constructor(new_target, default)?;
        Ok(Arc::new(JsObject::with_kind(Some(proto), kind)))
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    pub fn enqueue_job(&self, job: Job) {
        self.jobs.enqueue(job);
    }

    /// Number of queued jobs
    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Drain the job queue in FIFO order, including jobs queued while
    /// draining. Failing jobs are logged; the first error is returned once the
    /// drain is over.
    pub fn run_jobs(&self) -> VmResult<usize> {
        let mut first_error = None;
        let mut ran = 0;
        while ran < self.config.max_jobs_per_drain {
            let Some(job) = self.jobs.dequeue() else {
                break;
            };
            ran += 1;
            if let Err(error) = self.run_job(job) {
                tracing::warn!(%error, "job failed");
                first_error.get_or_insert(error);
            }
        }
        if !self.jobs.is_empty() {
            tracing::warn!(
                remaining = self.jobs.len(),
                limit = self.config.max_jobs_per_drain,
                "job drain stopped at limit"
            );
        }
        tracing::trace!(ran, "job queue drained");
        match first_error {
            Some(error) => Err(error),
            None => Ok(ran),
        }
    }

    fn run_job(&self, job: Job) -> VmResult<()> {
        match job {
            Job::Reaction { reaction, argument } => {
                let result = match &reaction.handler {
                    ReactionHandler::Identity => Ok(argument),
                    ReactionHandler::Thrower => Err(VmError::exception(argument)),
                    ReactionHandler::Js(f) => self.call(f, &Value::undefined(), &[argument]),
                    ReactionHandler::Native(f) => f(self, argument),
                };
                match reaction.capability {
                    None => result.map(|_| ()),
                    Some(capability) => {
                        match result {
                            Ok(value) => {
                                self.call(&capability.resolve, &Value::undefined(), &[value])?
                            }
                            Err(error) => {
                                let reason = self.error_to_value(&error);
                                self.call(&capability.reject, &Value::undefined(), &[reason])?
                            }
                        };
                        Ok(())
                    }
                }
            }
            Job::ResolveThenable {
                promise,
                thenable,
                then,
            } => {
                let (resolve, reject) = self.create_resolving_functions(&promise);
                if let Err(error) = self.call(&then, &thenable, &[resolve, reject.clone()]) {
                    let reason = self.error_to_value(&error);
                    self.call(&reject, &Value::undefined(), &[reason])?;
                }
                Ok(())
            }
            Job::Host(f) => f(self),
        }
    }

    pub(crate) fn register_finalization_registry(&self, registry: &Arc<JsObject>) {
        let mut registries = self.finalization_registries.lock();
        registries.retain(|r| r.strong_count() > 0);
        registries.push(Arc::downgrade(registry));
    }

    pub(crate) fn live_finalization_registries(&self) -> Vec<Arc<JsObject>> {
        self.finalization_registries
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    // ------------------------------------------------------------------
    // Host extensions
    // ------------------------------------------------------------------

    /// Attach per-realm host state. Returns false if a value of this type is
    /// already attached.
    pub fn insert_extension<T: Any + Send + Sync>(&self, value: Arc<T>) -> bool {
        let mut extensions = self.extensions.lock();
        if extensions.contains_key(&TypeId::of::<T>()) {
            return false;
        }
        extensions.insert(TypeId::of::<T>(), value);
        true
    }

    pub fn extension<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let value = self.extensions.lock().get(&TypeId::of::<T>()).cloned()?;
        value.downcast::<T>().ok()
    }
}

/// StringToNumber
fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match trimmed.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&trimmed[2..], radix)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    if trimmed.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert_eq!(string_to_number("1e3"), 1000.0);
        assert!(string_to_number("abc").is_nan());
        assert!(string_to_number("inf").is_nan());
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn test_call_rejects_non_callable() {
        let realm = Realm::new();
        let err = realm
            .call(&Value::from(1), &Value::undefined(), &[])
            .unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
    }

    #[test]
    fn test_native_depth_limit() {
        let realm = Realm::with_config(RealmConfig {
            max_native_depth: 8,
            ..RealmConfig::default()
        });
        let global = Value::object(realm.global().clone());
        let recurse = realm.new_function("recurse", 0, |realm, _this, _args| {
            let global = Value::object(realm.global().clone());
            realm.invoke(&global, "recurse", &[])
        });
        realm.put(&global, "recurse", recurse).unwrap();
        let err = realm.invoke(&global, "recurse", &[]).unwrap_err();
        assert!(matches!(err, VmError::StackOverflow));
    }

    #[test]
    fn test_to_primitive_dispatches_value_of() {
        let realm = Realm::new();
        let obj = Value::object(realm.new_object());
        let value_of = realm.new_function("valueOf", 0, |_, _, _| Ok(Value::from(7)));
        realm.put(&obj, "valueOf", value_of).unwrap();
        assert_eq!(realm.to_number(&obj).unwrap(), 7.0);
    }

    #[test]
    fn test_extensions_are_single_slot() {
        struct Marker;
        let realm = Realm::new();
        assert!(realm.insert_extension(Arc::new(Marker)));
        assert!(!realm.insert_extension(Arc::new(Marker)));
        assert!(realm.extension::<Marker>().is_some());
    }
}
