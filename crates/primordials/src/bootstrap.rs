//! One-time installation of primordials on a realm.

use std::sync::Arc;

use primordials_realm::{JsObject, PropertyAttributes, PropertyDescriptor, PropertyKey, Realm, Value};

use crate::catalog::capture_catalog;
use crate::combinators::Combinators;
use crate::error::{BootstrapError, BootstrapResult};
use crate::make_safe::make_safe_function;
use crate::regexp::RegExpHardener;
use crate::registry::{Registry, RegistryBuilder};
use crate::safe_types::SafeTypes;
use crate::uncurry::{apply_bind_function, uncurry_this_function};

/// Everything the bootstrap produced for one realm. Stored as a realm
/// extension; read-only after [`Primordials::install`].
#[derive(Debug)]
pub struct Primordials {
    registry: Registry,
    safe_types: SafeTypes,
    combinators: Combinators,
    hardener: RegExpHardener,
    object: Arc<JsObject>,
}

impl Primordials {
    /// Capture, adapt, synthesize, then build combinators and regexp
    /// hardening. Must run before any untrusted code touches the realm.
    pub fn install(realm: &Realm) -> BootstrapResult<Arc<Self>> {
        if realm.extension::<Self>().is_some() {
            return Err(BootstrapError::AlreadyInstalled);
        }

        let mut registry = RegistryBuilder::new();
        let captured = capture_catalog(realm, &mut registry)?;
        tracing::debug!(captured, "capture phase done");

        registry.insert("uncurryThis", uncurry_this_function(realm))?;
        registry.insert("applyBind", apply_bind_function(realm))?;
        registry.insert("makeSafe", make_safe_function(realm))?;
        tracing::debug!("adapter phase done");

        let safe_types = SafeTypes::build(realm)?;
        for (name, ctor) in safe_types.constructors() {
            registry.insert(name, ctor)?;
        }
        tracing::debug!("synthesis phase done");

        let combinators = Combinators::new(realm)?;
        for (name, func) in combinators.functions(realm) {
            registry.insert(name, func)?;
        }
        let hardener = RegExpHardener::new(realm)?;
        for (name, func) in hardener.functions(realm) {
            registry.insert(name, func)?;
        }
        tracing::debug!("combinator and hardening phase done");

        let registry = registry.freeze();
        let object = materialize(&registry);
        let primordials = Arc::new(Self {
            registry,
            safe_types,
            combinators,
            hardener,
            object,
        });
        if !realm.insert_extension(primordials.clone()) {
            return Err(BootstrapError::AlreadyInstalled);
        }
        tracing::debug!(entries = primordials.registry.len(), "primordials installed");
        Ok(primordials)
    }

    /// The installed primordials of `realm`, if any
    pub fn get(realm: &Realm) -> Option<Arc<Self>> {
        realm.extension::<Self>()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn safe_types(&self) -> &SafeTypes {
        &self.safe_types
    }

    pub fn combinators(&self) -> &Combinators {
        &self.combinators
    }

    pub fn harden_regexp(&self, realm: &Realm, pattern: &Value) -> primordials_realm::VmResult<Value> {
        self.hardener.harden(realm, pattern)
    }

    pub fn regexp_hardener(&self) -> &RegExpHardener {
        &self.hardener
    }

    /// The frozen, prototype-less `primordials` object mirroring the
    /// registry
    pub fn object(&self) -> &Arc<JsObject> {
        &self.object
    }
}

fn materialize(registry: &Registry) -> Arc<JsObject> {
    let object = Arc::new(JsObject::new(None));
    for (name, value) in registry.iter() {
        object.define_own_property(
            PropertyKey::string(name),
            PropertyDescriptor::data_with_attrs(value.clone(), PropertyAttributes::data()),
        );
    }
    object.freeze();
    object
}
