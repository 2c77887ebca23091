//! Built-in constructors, prototypes and namespaces.
//!
//! Every method is installed as an ordinary writable, configurable property,
//! so user code can replace any of them after the realm is created.
//!
//! - `object` - Object statics and Object.prototype
//! - `function` - Function.prototype (call, apply, toString)
//! - `iterator` - %IteratorPrototype%
//! - `array` - Array and %ArrayIteratorPrototype%
//! - `string` - String.prototype and %StringIteratorPrototype%
//! - `symbol` - Symbol and the well-known symbols
//! - `error` - Error, its native subclasses, AggregateError
//! - `math` / `reflect` - namespaces
//! - `map_set` - Map, Set and their iterators
//! - `weak_ref` - WeakMap, WeakSet, WeakRef, FinalizationRegistry
//! - `promise` - Promise and %InternalPromise%
//! - `regexp` - RegExp and %RegExpStringIteratorPrototype%

pub mod array;
pub mod error;
pub mod function;
pub mod iterator;
pub mod map_set;
pub mod math;
pub mod object;
pub mod promise;
pub mod reflect;
pub mod regexp;
pub mod string;
pub mod symbol;
pub mod weak_ref;

mod helpers;
