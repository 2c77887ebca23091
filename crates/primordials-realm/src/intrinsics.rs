//! Intrinsics registry: built-in constructors, prototypes and well-known symbols.
//!
//! Initialization is two-stage:
//! 1. Allocate empty prototype objects so built-ins can reference each other
//! 2. Populate them in dependency order with `BuiltInBuilder`

use std::sync::Arc;

use crate::function::NativeFunction;
use crate::intrinsics_impl as imp;
use crate::object::{JsObject, ObjectKind};
use crate::value::Symbol;

/// Well-known symbol IDs (fixed, pre-defined)
pub mod well_known {
    /// `Symbol.iterator`
    pub const ITERATOR: u64 = 1;
    /// `Symbol.asyncIterator`
    pub const ASYNC_ITERATOR: u64 = 2;
    /// `Symbol.toStringTag`
    pub const TO_STRING_TAG: u64 = 3;
    /// `Symbol.hasInstance`
    pub const HAS_INSTANCE: u64 = 4;
    /// `Symbol.toPrimitive`
    pub const TO_PRIMITIVE: u64 = 5;
    /// `Symbol.isConcatSpreadable`
    pub const IS_CONCAT_SPREADABLE: u64 = 6;
    /// `Symbol.match`
    pub const MATCH: u64 = 7;
    /// `Symbol.matchAll`
    pub const MATCH_ALL: u64 = 8;
    /// `Symbol.replace`
    pub const REPLACE: u64 = 9;
    /// `Symbol.search`
    pub const SEARCH: u64 = 10;
    /// `Symbol.split`
    pub const SPLIT: u64 = 11;
    /// `Symbol.species`
    pub const SPECIES: u64 = 12;
    /// `Symbol.unscopables`
    pub const UNSCOPABLES: u64 = 13;

    /// First id handed out to `Symbol()` calls
    pub const FIRST_USER_SYMBOL: u64 = 64;
}

/// The well-known symbols
#[derive(Clone, Debug)]
pub struct WellKnownSymbols {
    pub iterator: Arc<Symbol>,
    pub async_iterator: Arc<Symbol>,
    pub to_string_tag: Arc<Symbol>,
    pub has_instance: Arc<Symbol>,
    pub to_primitive: Arc<Symbol>,
    pub is_concat_spreadable: Arc<Symbol>,
    pub r#match: Arc<Symbol>,
    pub match_all: Arc<Symbol>,
    pub replace: Arc<Symbol>,
    pub search: Arc<Symbol>,
    pub split: Arc<Symbol>,
    pub species: Arc<Symbol>,
    pub unscopables: Arc<Symbol>,
}

impl WellKnownSymbols {
    fn new() -> Self {
        let sym = |id: u64, name: &str| {
            Arc::new(Symbol {
                id,
                description: Some(format!("Symbol.{name}")),
            })
        };
        Self {
            iterator: sym(well_known::ITERATOR, "iterator"),
            async_iterator: sym(well_known::ASYNC_ITERATOR, "asyncIterator"),
            to_string_tag: sym(well_known::TO_STRING_TAG, "toStringTag"),
            has_instance: sym(well_known::HAS_INSTANCE, "hasInstance"),
            to_primitive: sym(well_known::TO_PRIMITIVE, "toPrimitive"),
            is_concat_spreadable: sym(well_known::IS_CONCAT_SPREADABLE, "isConcatSpreadable"),
            r#match: sym(well_known::MATCH, "match"),
            match_all: sym(well_known::MATCH_ALL, "matchAll"),
            replace: sym(well_known::REPLACE, "replace"),
            search: sym(well_known::SEARCH, "search"),
            split: sym(well_known::SPLIT, "split"),
            species: sym(well_known::SPECIES, "species"),
            unscopables: sym(well_known::UNSCOPABLES, "unscopables"),
        }
    }

    /// `(property name on Symbol, symbol)` pairs
    pub fn entries(&self) -> [(&'static str, &Arc<Symbol>); 13] {
        [
            ("iterator", &self.iterator),
            ("asyncIterator", &self.async_iterator),
            ("toStringTag", &self.to_string_tag),
            ("hasInstance", &self.has_instance),
            ("toPrimitive", &self.to_primitive),
            ("isConcatSpreadable", &self.is_concat_spreadable),
            ("match", &self.r#match),
            ("matchAll", &self.match_all),
            ("replace", &self.replace),
            ("search", &self.search),
            ("split", &self.split),
            ("species", &self.species),
            ("unscopables", &self.unscopables),
        ]
    }
}

/// Shared inputs of the stage-2 initializers
pub(crate) struct InitContext<'a> {
    pub fn_proto: &'a Arc<JsObject>,
    pub object_prototype: &'a Arc<JsObject>,
    pub iterator_prototype: &'a Arc<JsObject>,
    pub symbols: &'a WellKnownSymbols,
}

/// All intrinsic objects of a realm.
///
/// Provides direct Rust access to built-ins regardless of what user code
/// later does to the global object.
#[derive(Clone)]
pub struct Intrinsics {
    /// `Object.prototype`, `[[Prototype]]` is null
    pub object_prototype: Arc<JsObject>,
    pub object_constructor: Arc<JsObject>,
    /// `Function.prototype`, itself a callable no-op
    pub function_prototype: Arc<JsObject>,
    /// `%IteratorPrototype%`
    pub iterator_prototype: Arc<JsObject>,

    pub array_prototype: Arc<JsObject>,
    pub array_constructor: Arc<JsObject>,
    /// `%ArrayIteratorPrototype%`
    pub array_iterator_prototype: Arc<JsObject>,

    pub string_prototype: Arc<JsObject>,
    pub string_constructor: Arc<JsObject>,
    /// `%StringIteratorPrototype%`
    pub string_iterator_prototype: Arc<JsObject>,

    pub symbol_prototype: Arc<JsObject>,
    pub symbol_constructor: Arc<JsObject>,

    pub error_prototype: Arc<JsObject>,
    pub error_constructor: Arc<JsObject>,
    pub type_error_prototype: Arc<JsObject>,
    pub type_error_constructor: Arc<JsObject>,
    pub range_error_prototype: Arc<JsObject>,
    pub range_error_constructor: Arc<JsObject>,
    pub syntax_error_prototype: Arc<JsObject>,
    pub syntax_error_constructor: Arc<JsObject>,
    pub aggregate_error_prototype: Arc<JsObject>,
    pub aggregate_error_constructor: Arc<JsObject>,

    pub map_prototype: Arc<JsObject>,
    pub map_constructor: Arc<JsObject>,
    /// `%MapIteratorPrototype%`
    pub map_iterator_prototype: Arc<JsObject>,
    pub set_prototype: Arc<JsObject>,
    pub set_constructor: Arc<JsObject>,
    /// `%SetIteratorPrototype%`
    pub set_iterator_prototype: Arc<JsObject>,
    pub weak_map_prototype: Arc<JsObject>,
    pub weak_map_constructor: Arc<JsObject>,
    pub weak_set_prototype: Arc<JsObject>,
    pub weak_set_constructor: Arc<JsObject>,
    pub weak_ref_prototype: Arc<JsObject>,
    pub weak_ref_constructor: Arc<JsObject>,
    pub finalization_registry_prototype: Arc<JsObject>,
    pub finalization_registry_constructor: Arc<JsObject>,

    pub promise_prototype: Arc<JsObject>,
    pub promise_constructor: Arc<JsObject>,
    /// `%InternalPromise%.prototype`: never reachable from the global object
    pub internal_promise_prototype: Arc<JsObject>,
    /// `%InternalPromise%`: same behaviour as `Promise`, private to the host
    pub internal_promise_constructor: Arc<JsObject>,

    pub regexp_prototype: Arc<JsObject>,
    pub regexp_constructor: Arc<JsObject>,
    /// `%RegExpStringIteratorPrototype%`
    pub regexp_string_iterator_prototype: Arc<JsObject>,

    /// `Math` namespace
    pub math: Arc<JsObject>,
    /// `Reflect` namespace
    pub reflect: Arc<JsObject>,

    pub symbols: WellKnownSymbols,
}

impl Intrinsics {
    pub(crate) fn new() -> Self {
        let symbols = WellKnownSymbols::new();

        // Stage 1: allocate
        let object_prototype = Arc::new(JsObject::new(None));
        let function_prototype = Arc::new(JsObject::with_kind(
            Some(object_prototype.clone()),
            ObjectKind::Function(NativeFunction::noop("")),
        ));
        let alloc = |parent: &Arc<JsObject>| Arc::new(JsObject::new(Some(parent.clone())));

        let iterator_prototype = alloc(&object_prototype);
        let array_prototype = alloc(&object_prototype);
        let array_iterator_prototype = alloc(&iterator_prototype);
        let string_prototype = alloc(&object_prototype);
        let string_iterator_prototype = alloc(&iterator_prototype);
        let symbol_prototype = alloc(&object_prototype);
        let error_prototype = alloc(&object_prototype);
        let type_error_prototype = alloc(&error_prototype);
        let range_error_prototype = alloc(&error_prototype);
        let syntax_error_prototype = alloc(&error_prototype);
        let aggregate_error_prototype = alloc(&error_prototype);
        let map_prototype = alloc(&object_prototype);
        let map_iterator_prototype = alloc(&iterator_prototype);
        let set_prototype = alloc(&object_prototype);
        let set_iterator_prototype = alloc(&iterator_prototype);
        let weak_map_prototype = alloc(&object_prototype);
        let weak_set_prototype = alloc(&object_prototype);
        let weak_ref_prototype = alloc(&object_prototype);
        let finalization_registry_prototype = alloc(&object_prototype);
        let promise_prototype = alloc(&object_prototype);
        let internal_promise_prototype = alloc(&object_prototype);
        let regexp_prototype = alloc(&object_prototype);
        let regexp_string_iterator_prototype = alloc(&iterator_prototype);
        let math = alloc(&object_prototype);
        let reflect = alloc(&object_prototype);

        // Stage 2: populate
        let cx = InitContext {
            fn_proto: &function_prototype,
            object_prototype: &object_prototype,
            iterator_prototype: &iterator_prototype,
            symbols: &symbols,
        };

        imp::function::init(&cx);
        let object_constructor = imp::object::init(&cx);
        imp::iterator::init(&cx);

        let array_constructor = imp::array::init(&cx, &array_prototype, &array_iterator_prototype);
        imp::array::init_iterator_prototype(&cx, &array_iterator_prototype);

        let string_constructor =
            imp::string::init(&cx, &string_prototype, &string_iterator_prototype);
        imp::string::init_iterator_prototype(&cx, &string_iterator_prototype);

        let symbol_constructor = imp::symbol::init(&cx, &symbol_prototype);

        let error_constructor = imp::error::init(&cx, &error_prototype, "Error", None);
        let type_error_constructor = imp::error::init(
            &cx,
            &type_error_prototype,
            "TypeError",
            Some(&error_constructor),
        );
        let range_error_constructor = imp::error::init(
            &cx,
            &range_error_prototype,
            "RangeError",
            Some(&error_constructor),
        );
        let syntax_error_constructor = imp::error::init(
            &cx,
            &syntax_error_prototype,
            "SyntaxError",
            Some(&error_constructor),
        );
        let aggregate_error_constructor =
            imp::error::init_aggregate(&cx, &aggregate_error_prototype, &error_constructor);

        let map_constructor = imp::map_set::init_map(&cx, &map_prototype, &map_iterator_prototype);
        imp::map_set::init_iterator_prototype(&cx, &map_iterator_prototype, "Map Iterator");
        let set_constructor = imp::map_set::init_set(&cx, &set_prototype, &set_iterator_prototype);
        imp::map_set::init_iterator_prototype(&cx, &set_iterator_prototype, "Set Iterator");

        let weak_map_constructor = imp::weak_ref::init_weak_map(&cx, &weak_map_prototype);
        let weak_set_constructor = imp::weak_ref::init_weak_set(&cx, &weak_set_prototype);
        let weak_ref_constructor = imp::weak_ref::init_weak_ref(&cx, &weak_ref_prototype);
        let finalization_registry_constructor =
            imp::weak_ref::init_finalization_registry(&cx, &finalization_registry_prototype);

        let promise_constructor =
            imp::promise::init(&cx, &promise_prototype, imp::promise::PromiseFlavor::Public);
        let internal_promise_constructor = imp::promise::init(
            &cx,
            &internal_promise_prototype,
            imp::promise::PromiseFlavor::Internal,
        );

        let regexp_constructor = imp::regexp::init(&cx, &regexp_prototype);
        imp::regexp::init_string_iterator_prototype(&cx, &regexp_string_iterator_prototype);

        imp::math::init(&cx, &math);
        imp::reflect::init(&cx, &reflect);

        Self {
            object_prototype,
            object_constructor,
            function_prototype,
            iterator_prototype,
            array_prototype,
            array_constructor,
            array_iterator_prototype,
            string_prototype,
            string_constructor,
            string_iterator_prototype,
            symbol_prototype,
            symbol_constructor,
            error_prototype,
            error_constructor,
            type_error_prototype,
            type_error_constructor,
            range_error_prototype,
            range_error_constructor,
            syntax_error_prototype,
            syntax_error_constructor,
            aggregate_error_prototype,
            aggregate_error_constructor,
            map_prototype,
            map_constructor,
            map_iterator_prototype,
            set_prototype,
            set_constructor,
            set_iterator_prototype,
            weak_map_prototype,
            weak_map_constructor,
            weak_set_prototype,
            weak_set_constructor,
            weak_ref_prototype,
            weak_ref_constructor,
            finalization_registry_prototype,
            finalization_registry_constructor,
            promise_prototype,
            promise_constructor,
            internal_promise_prototype,
            internal_promise_constructor,
            regexp_prototype,
            regexp_constructor,
            regexp_string_iterator_prototype,
            math,
            reflect,
            symbols,
        }
    }

    /// `(global name, value)` pairs installed on the global object.
    /// `%InternalPromise%` is deliberately absent.
    pub(crate) fn global_bindings(&self) -> Vec<(&'static str, Arc<JsObject>)> {
        vec![
            ("Object", self.object_constructor.clone()),
            ("Array", self.array_constructor.clone()),
            ("String", self.string_constructor.clone()),
            ("Symbol", self.symbol_constructor.clone()),
            ("Error", self.error_constructor.clone()),
            ("TypeError", self.type_error_constructor.clone()),
            ("RangeError", self.range_error_constructor.clone()),
            ("SyntaxError", self.syntax_error_constructor.clone()),
            ("AggregateError", self.aggregate_error_constructor.clone()),
            ("Map", self.map_constructor.clone()),
            ("Set", self.set_constructor.clone()),
            ("WeakMap", self.weak_map_constructor.clone()),
            ("WeakSet", self.weak_set_constructor.clone()),
            ("WeakRef", self.weak_ref_constructor.clone()),
            (
                "FinalizationRegistry",
                self.finalization_registry_constructor.clone(),
            ),
            ("Promise", self.promise_constructor.clone()),
            ("RegExp", self.regexp_constructor.clone()),
            ("Math", self.math.clone()),
            ("Reflect", self.reflect.clone()),
        ]
    }
}
