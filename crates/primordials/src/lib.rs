//! # Primordials
//!
//! Tamper-proof access to realm built-ins. [`Primordials::install`] runs
//! once per realm, before untrusted code: it captures built-in methods
//! into a frozen [`Registry`], synthesizes safe collection and promise
//! classes whose prototypes have no inherited chain, and builds promise
//! combinators and regexp hardening on top of the captures. Privileged code
//! that only uses these keeps working however the shared prototypes are
//! patched afterwards.

#![warn(clippy::all)]

pub mod bootstrap;
pub mod capture;
pub mod catalog;
pub mod combinators;
pub mod error;
pub mod make_safe;
pub mod regexp;
pub mod registry;
pub mod safe_iterator;
pub mod safe_types;
pub mod uncurry;

pub use bootstrap::Primordials;
pub use capture::{Owner, capture, capture_function, capture_getter, capture_object, capture_setter};
pub use catalog::capture_catalog;
pub use combinators::Combinators;
pub use error::{BootstrapError, BootstrapResult};
pub use make_safe::make_safe;
pub use regexp::RegExpHardener;
pub use registry::{Registry, RegistryBuilder};
pub use safe_iterator::{SafeIter, SafeIteratorType, create_safe_iterator};
pub use safe_types::{SafeMap, SafePromise, SafeSet, SafeTypes, SafeWeakMap, SafeWeakSet};
pub use uncurry::{ApplyBound, Uncurried, read_array_like};
