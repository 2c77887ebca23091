//! # Primordials Realm
//!
//! A host-side JavaScript realm: objects with prototype chains, the built-in
//! constructors and prototypes, promises with a FIFO job queue, and RegExp
//! backed by `regress`.
//!
//! ## Design Principles
//!
//! - **Thread-safe**: objects are `Arc<JsObject>` with `parking_lot` locks
//! - **Mutable intrinsics**: every built-in method is an ordinary property
//!   that user code may overwrite, delete or shadow
//! - **Unpatchable substrate**: [`Realm::call`] and [`Realm::construct`]
//!   dispatch on the callee's internal slots and never consult properties

#![warn(clippy::all)]

pub mod builtin_builder;
pub mod config;
pub mod error;
pub mod function;
pub mod intrinsics;
pub mod intrinsics_impl;
pub mod iterator;
pub mod map_data;
pub mod microtask;
pub mod object;
pub mod promise;
pub mod realm;
pub mod regexp;
pub mod string;
pub mod value;
pub mod weak;

pub use builtin_builder::{BuiltInBuilder, NamespaceBuilder};
pub use config::RealmConfig;
pub use error::{VmError, VmResult};
pub use function::{NativeFn, NativeFunction, arg};
pub use intrinsics::{Intrinsics, WellKnownSymbols};
pub use intrinsics_impl::promise::PromiseFlavor;
pub use iterator::{IterationKind, IteratorRecord};
pub use microtask::Job;
pub use object::{JsObject, ObjectKind, PropertyAttributes, PropertyDescriptor, PropertyKey};
pub use promise::{JsPromise, PromiseCapability, PromiseState, ReactionHandler};
pub use realm::{ErrorKind, PreferredType, Realm};
pub use regexp::{JsRegExp, RegExpFlags};
pub use value::{Symbol, Value};
