//! String constructor, String.prototype and %StringIteratorPrototype%
//!
//! `replace`, `split`, `match`, `matchAll` and `search` first look for the
//! matching `Symbol.*` method on their argument and defer to it.

use std::sync::Arc;

use parking_lot::Mutex;

use super::helpers::{define_to_string_tag, relative_index};
use super::regexp::{get_substitution, regexp_create};
use crate::builtin_builder::{BuiltInBuilder, NamespaceBuilder};
use crate::error::{VmError, VmResult};
use crate::function::arg;
use crate::intrinsics::InitContext;
use crate::iterator::StringIteratorState;
use crate::object::{JsObject, ObjectKind};
use crate::realm::Realm;
use crate::string::{from_utf16, index_of, substring, to_utf16};
use crate::value::{Symbol, Value};

pub(crate) fn init(
    cx: &InitContext<'_>,
    prototype: &Arc<JsObject>,
    _iterator_prototype: &Arc<JsObject>,
) -> Arc<JsObject> {
    BuiltInBuilder::new(cx.fn_proto, prototype.clone(), "String")
        .inherits(cx.object_prototype)
        .call_fn(string_call)
        .method("indexOf", string_index_of, 1)
        .method("includes", string_includes, 1)
        .method("startsWith", string_starts_with, 1)
        .method("endsWith", string_ends_with, 1)
        .method("slice", string_slice, 2)
        .method("charAt", string_char_at, 1)
        .method("toLowerCase", |realm, this, _args| {
            let s = this_string(realm, this, "String.prototype.toLowerCase")?;
            Ok(Value::from(s.to_lowercase()))
        }, 0)
        .method("toUpperCase", |realm, this, _args| {
            let s = this_string(realm, this, "String.prototype.toUpperCase")?;
            Ok(Value::from(s.to_uppercase()))
        }, 0)
        .method("trim", |realm, this, _args| {
            let s = this_string(realm, this, "String.prototype.trim")?;
            Ok(Value::from(s.trim()))
        }, 0)
        .method("toString", string_value_of, 0)
        .method("valueOf", string_value_of, 0)
        .method("replace", string_replace, 2)
        .method("split", string_split, 2)
        .method("match", string_match, 1)
        .method("matchAll", string_match_all, 1)
        .method("search", string_search, 1)
        .method(&cx.symbols.iterator, string_iterator, 0)
        .build()
}

pub(crate) fn init_iterator_prototype(cx: &InitContext<'_>, prototype: &Arc<JsObject>) {
    NamespaceBuilder::new(cx.fn_proto, prototype.clone())
        .method("next", string_iterator_next, 0)
        .build();
    define_to_string_tag(prototype, &cx.symbols.to_string_tag, "String Iterator");
}

fn this_string(realm: &Realm, this: &Value, method: &str) -> VmResult<Arc<str>> {
    realm.require_object_coercible(this, method)?;
    realm.to_string(this)
}

/// `String(value)`; symbols are rendered instead of throwing
fn string_call(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    match args.first() {
        None => Ok(Value::from("")),
        Some(Value::Symbol(sym)) => Ok(Value::from(format!(
            "Symbol({})",
            sym.description.as_deref().unwrap_or("")
        ))),
        Some(value) => Ok(Value::String(realm.to_string(value)?)),
    }
}

fn string_value_of(_realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    match this {
        Value::String(_) => Ok(this.clone()),
        _ => Err(VmError::type_error(
            "String.prototype.valueOf requires that 'this' be a String",
        )),
    }
}

fn string_index_of(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = to_utf16(&this_string(realm, this, "String.prototype.indexOf")?);
    let search = to_utf16(&realm.to_string(&arg(args, 0))?);
    let pos = realm.to_integer_or_infinity(&arg(args, 1))?.clamp(0.0, s.len() as f64) as usize;
    Ok(match index_of(&s, &search, pos) {
        Some(i) => Value::from(i),
        None => Value::number(-1.0),
    })
}

fn reject_regexp(realm: &Realm, value: &Value, method: &str) -> VmResult<()> {
    if realm.is_regexp(value)? {
        return Err(VmError::type_error(format!(
            "First argument to {method} must not be a regular expression"
        )));
    }
    Ok(())
}

fn string_includes(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = to_utf16(&this_string(realm, this, "String.prototype.includes")?);
    reject_regexp(realm, &arg(args, 0), "String.prototype.includes")?;
    let search = to_utf16(&realm.to_string(&arg(args, 0))?);
    let pos = realm.to_integer_or_infinity(&arg(args, 1))?.clamp(0.0, s.len() as f64) as usize;
    Ok(Value::boolean(index_of(&s, &search, pos).is_some()))
}

fn string_starts_with(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = to_utf16(&this_string(realm, this, "String.prototype.startsWith")?);
    reject_regexp(realm, &arg(args, 0), "String.prototype.startsWith")?;
    let search = to_utf16(&realm.to_string(&arg(args, 0))?);
    let start = realm.to_integer_or_infinity(&arg(args, 1))?.clamp(0.0, s.len() as f64) as usize;
    Ok(Value::boolean(s[start..].starts_with(&search)))
}

fn string_ends_with(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = to_utf16(&this_string(realm, this, "String.prototype.endsWith")?);
    reject_regexp(realm, &arg(args, 0), "String.prototype.endsWith")?;
    let search = to_utf16(&realm.to_string(&arg(args, 0))?);
    let end = match arg(args, 1) {
        Value::Undefined => s.len(),
        pos => realm.to_integer_or_infinity(&pos)?.clamp(0.0, s.len() as f64) as usize,
    };
    Ok(Value::boolean(s[..end].ends_with(&search)))
}

fn string_slice(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = to_utf16(&this_string(realm, this, "String.prototype.slice")?);
    let start = relative_index(realm.to_integer_or_infinity(&arg(args, 0))?, s.len());
    let end = match arg(args, 1) {
        Value::Undefined => s.len(),
        end => relative_index(realm.to_integer_or_infinity(&end)?, s.len()),
    };
    Ok(Value::from(substring(&s, start, end)))
}

fn string_char_at(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = to_utf16(&this_string(realm, this, "String.prototype.charAt")?);
    let pos = realm.to_integer_or_infinity(&arg(args, 0))?;
    if pos < 0.0 || pos >= s.len() as f64 {
        return Ok(Value::from(""));
    }
    let pos = pos as usize;
    Ok(Value::from(substring(&s, pos, pos + 1)))
}

// ============================================================================
// Symbol-dispatched methods
// ============================================================================

/// `String.prototype.replace(searchValue, replaceValue)`
fn string_replace(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    realm.require_object_coercible(this, "String.prototype.replace")?;
    let search_value = arg(args, 0);
    let replace_value = arg(args, 1);
    if !search_value.is_nullish()
        && let Some(replacer) =
            realm.get_method(&search_value, &realm.intrinsics().symbols.replace)?
    {
        return realm.call(&replacer, &search_value, &[this.clone(), replace_value]);
    }

    let string = to_utf16(&realm.to_string(this)?);
    let search = to_utf16(&realm.to_string(&search_value)?);
    let functional = replace_value.is_callable();
    let replace_template = if functional {
        Vec::new()
    } else {
        to_utf16(&realm.to_string(&replace_value)?)
    };

    let Some(pos) = index_of(&string, &search, 0) else {
        return Ok(Value::from(from_utf16(&string)));
    };
    let replacement = if functional {
        let replaced = realm.call(
            &replace_value,
            &Value::undefined(),
            &[
                Value::from(from_utf16(&search)),
                Value::from(pos),
                Value::from(from_utf16(&string)),
            ],
        )?;
        to_utf16(&realm.to_string(&replaced)?)
    } else {
        get_substitution(
            realm,
            &search,
            &string,
            pos,
            &[],
            &Value::undefined(),
            &replace_template,
        )?
    };

    let mut out = string[..pos].to_vec();
    out.extend_from_slice(&replacement);
    out.extend_from_slice(&string[pos + search.len()..]);
    Ok(Value::from(from_utf16(&out)))
}

/// `String.prototype.split(separator, limit)`
fn string_split(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    realm.require_object_coercible(this, "String.prototype.split")?;
    let separator = arg(args, 0);
    let limit = arg(args, 1);
    if !separator.is_nullish()
        && let Some(splitter) = realm.get_method(&separator, &realm.intrinsics().symbols.split)?
    {
        return realm.call(&splitter, &separator, &[this.clone(), limit]);
    }

    let string = to_utf16(&realm.to_string(this)?);
    let lim = match limit {
        Value::Undefined => u32::MAX,
        limit => realm.to_uint32(&limit)?,
    } as usize;
    let sep = to_utf16(&realm.to_string(&separator)?);
    if lim == 0 {
        return Ok(Value::object(realm.new_array(Vec::new())));
    }
    if separator.is_undefined() {
        return Ok(Value::object(realm.new_array(vec![Value::from(from_utf16(&string))])));
    }
    if sep.is_empty() {
        let parts = string
            .iter()
            .take(lim)
            .map(|unit| Value::from(from_utf16(&[*unit])))
            .collect();
        return Ok(Value::object(realm.new_array(parts)));
    }
    if string.is_empty() {
        return Ok(Value::object(realm.new_array(vec![Value::from("")])));
    }

    let mut parts = Vec::new();
    let mut start = 0;
    while let Some(found) = index_of(&string, &sep, start) {
        parts.push(Value::from(substring(&string, start, found)));
        if parts.len() >= lim {
            return Ok(Value::object(realm.new_array(parts)));
        }
        start = found + sep.len();
    }
    parts.push(Value::from(substring(&string, start, string.len())));
    Ok(Value::object(realm.new_array(parts)))
}

/// Shared shape of `match` and `search`: defer to `regexp[symbol]`, or wrap
/// the argument in a fresh RegExp and invoke the symbol method on it.
fn dispatch_to_regexp(
    realm: &Realm,
    this: &Value,
    regexp: Value,
    symbol: &Arc<Symbol>,
    flags: Value,
    method: &str,
) -> VmResult<Value> {
    realm.require_object_coercible(this, method)?;
    if !regexp.is_nullish()
        && let Some(matcher) = realm.get_method(&regexp, symbol)?
    {
        return realm.call(&matcher, &regexp, &[this.clone()]);
    }
    let string = realm.to_string(this)?;
    let rx = regexp_create(realm, &regexp, &flags)?;
    realm.invoke(&rx, symbol, &[Value::String(string)])
}

fn string_match(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let symbol = realm.intrinsics().symbols.r#match.clone();
    dispatch_to_regexp(
        realm,
        this,
        arg(args, 0),
        &symbol,
        Value::undefined(),
        "String.prototype.match",
    )
}

fn string_search(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    let symbol = realm.intrinsics().symbols.search.clone();
    dispatch_to_regexp(
        realm,
        this,
        arg(args, 0),
        &symbol,
        Value::undefined(),
        "String.prototype.search",
    )
}

fn string_match_all(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    realm.require_object_coercible(this, "String.prototype.matchAll")?;
    let regexp = arg(args, 0);
    if !regexp.is_nullish() && realm.is_regexp(&regexp)? {
        let flags = realm.get(&regexp, "flags")?;
        realm.require_object_coercible(&flags, "String.prototype.matchAll")?;
        if !realm.to_string(&flags)?.contains('g') {
            return Err(VmError::type_error(
                "String.prototype.matchAll called with a non-global RegExp argument",
            ));
        }
    }
    let symbol = realm.intrinsics().symbols.match_all.clone();
    dispatch_to_regexp(
        realm,
        this,
        regexp,
        &symbol,
        Value::from("g"),
        "String.prototype.matchAll",
    )
}

// ============================================================================
// %StringIteratorPrototype%
// ============================================================================

fn string_iterator(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let s = this_string(realm, this, "String.prototype[Symbol.iterator]")?;
    let iter = JsObject::with_kind(
        Some(realm.intrinsics().string_iterator_prototype.clone()),
        ObjectKind::StringIterator(Mutex::new(StringIteratorState {
            units: Some(to_utf16(&s)),
            position: 0,
        })),
    );
    Ok(Value::object(Arc::new(iter)))
}

fn string_iterator_next(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let Some(ObjectKind::StringIterator(state)) = this.as_object().map(|o| o.kind()) else {
        return Err(VmError::type_error(
            "%StringIteratorPrototype%.next requires that 'this' be a String Iterator",
        ));
    };
    let mut state = state.lock();
    let position = state.position;
    let Some(units) = state.units.as_ref() else {
        return Ok(realm.create_iter_result(Value::undefined(), true));
    };
    if position >= units.len() {
        state.units = None;
        return Ok(realm.create_iter_result(Value::undefined(), true));
    }
    let first = units[position];
    let width = if (0xD800..=0xDBFF).contains(&first)
        && units
            .get(position + 1)
            .is_some_and(|u| (0xDC00..=0xDFFF).contains(u))
    {
        2
    } else {
        1
    };
    let code_point = from_utf16(&units[position..position + width]);
    state.position = position + width;
    drop(state);
    Ok(realm.create_iter_result(Value::from(code_point), false))
}
