//! %IteratorPrototype%

use crate::builtin_builder::NamespaceBuilder;
use crate::error::VmResult;
use crate::intrinsics::InitContext;
use crate::realm::Realm;
use crate::value::Value;

pub(crate) fn init(cx: &InitContext<'_>) {
    NamespaceBuilder::new(cx.fn_proto, cx.iterator_prototype.clone())
        .method(&cx.symbols.iterator, iterator_self, 0)
        .build();
}

/// `%IteratorPrototype%[Symbol.iterator]()`
pub(crate) fn iterator_self(_realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(this.clone())
}
