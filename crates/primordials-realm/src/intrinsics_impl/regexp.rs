//! RegExp constructor, RegExp.prototype and %RegExpStringIteratorPrototype%
//!
//! - Accessors: source, flags, global, ignoreCase, multiline, dotAll,
//!   unicode, unicodeSets, sticky, hasIndices
//! - Methods: exec, test, toString
//! - Symbol methods: [Symbol.match], [Symbol.matchAll], [Symbol.replace],
//!   [Symbol.search], [Symbol.split]
//!
//! The symbol methods go through RegExpExec, which looks `exec` up on the
//! receiver every time, and read `flags`/`lastIndex` with `[[Get]]`. Indices
//! are UTF-16 code units throughout.

use std::sync::Arc;

use parking_lot::Mutex;

use super::helpers::{define_to_string_tag, species_getter, this_object};
use crate::builtin_builder::{BuiltInBuilder, NamespaceBuilder};
use crate::error::{VmError, VmResult};
use crate::function::arg;
use crate::intrinsics::InitContext;
use crate::iterator::RegExpStringIteratorState;
use crate::object::{JsObject, ObjectKind, PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::realm::Realm;
use crate::regexp::{JsRegExp, RegExpFlags, advance_string_index};
use crate::string::{from_utf16, substring, to_utf16};
use crate::value::Value;

pub(crate) fn init(cx: &InitContext<'_>, prototype: &Arc<JsObject>) -> Arc<JsObject> {
    let mut builder = BuiltInBuilder::new(cx.fn_proto, prototype.clone(), "RegExp")
        .inherits(cx.object_prototype)
        .constructor_fn(regexp_construct, 2)
        .call_fn(regexp_call)
        .static_getter(&cx.symbols.species, species_getter)
        .getter("source", regexp_source)
        .getter("flags", regexp_flags);
    for &(name, flag) in FLAG_GETTERS {
        builder = builder.getter(name, move |realm, this, _args| flag_getter(realm, this, name, flag));
    }
    builder
        .method("exec", regexp_exec, 1)
        .method("test", regexp_test, 1)
        .method("toString", regexp_to_string, 0)
        .method(&cx.symbols.r#match, regexp_symbol_match, 1)
        .method(&cx.symbols.match_all, regexp_symbol_match_all, 1)
        .method(&cx.symbols.replace, regexp_symbol_replace, 2)
        .method(&cx.symbols.search, regexp_symbol_search, 1)
        .method(&cx.symbols.split, regexp_symbol_split, 2)
        .build()
}

pub(crate) fn init_string_iterator_prototype(cx: &InitContext<'_>, prototype: &Arc<JsObject>) {
    NamespaceBuilder::new(cx.fn_proto, prototype.clone())
        .method("next", regexp_string_iterator_next, 0)
        .build();
    define_to_string_tag(prototype, &cx.symbols.to_string_tag, "RegExp String Iterator");
}

type FlagSelector = fn(&RegExpFlags) -> bool;

/// Boolean flag accessors in `flags` getter order
const FLAG_GETTERS: &[(&str, FlagSelector)] = &[
    ("hasIndices", |f| f.has_indices),
    ("global", |f| f.global),
    ("ignoreCase", |f| f.ignore_case),
    ("multiline", |f| f.multiline),
    ("dotAll", |f| f.dot_all),
    ("unicode", |f| f.unicode),
    ("unicodeSets", |f| f.unicode_sets),
    ("sticky", |f| f.sticky),
];

/// Flag characters matching `FLAG_GETTERS`
const FLAG_CHARS: &[char] = &['d', 'g', 'i', 'm', 's', 'u', 'v', 'y'];

// ============================================================================
// Construction
// ============================================================================

/// RegExpAlloc + RegExpInitialize
fn regexp_alloc(
    realm: &Realm,
    new_target: &Arc<JsObject>,
    pattern: &Value,
    flags: &Value,
) -> VmResult<Value> {
    let pattern = match pattern {
        Value::Undefined => Arc::from(""),
        p => realm.to_string(p)?,
    };
    let flags = match flags {
        Value::Undefined => Arc::from(""),
        f => realm.to_string(f)?,
    };
    let matcher = JsRegExp::new(&pattern, &flags)?;
    let obj = realm.create_from_constructor(
        new_target,
        &realm.intrinsics().regexp_prototype,
        ObjectKind::RegExp(matcher),
    )?;
    obj.define_own_property(
        PropertyKey::string("lastIndex"),
        PropertyDescriptor::data_with_attrs(
            Value::from(0),
            PropertyAttributes {
                writable: true,
                enumerable: false,
                configurable: false,
            },
        ),
    );
    Ok(Value::object(obj))
}

/// RegExpCreate(P, F) with `%RegExp%`
pub(crate) fn regexp_create(realm: &Realm, pattern: &Value, flags: &Value) -> VmResult<Value> {
    let ctor = realm.intrinsics().regexp_constructor.clone();
    regexp_alloc(realm, &ctor, pattern, flags)
}

/// Steps shared by `new RegExp(...)` and `RegExp(...)` once the early
/// return for an unchanged RegExp argument is ruled out
fn regexp_from_pattern(
    realm: &Realm,
    new_target: &Arc<JsObject>,
    pattern: &Value,
    flags: &Value,
    pattern_is_regexp: bool,
) -> VmResult<Value> {
    if let Some(existing) = pattern.as_object().and_then(|o| o.as_regexp()) {
        let source = Value::from(existing.source());
        let flags = match flags {
            Value::Undefined => Value::from(existing.flags().to_flag_string()),
            f => f.clone(),
        };
        return regexp_alloc(realm, new_target, &source, &flags);
    }
    if pattern_is_regexp {
        let source = realm.get(pattern, "source")?;
        let flags = match flags {
            Value::Undefined => realm.get(pattern, "flags")?,
            f => f.clone(),
        };
        return regexp_alloc(realm, new_target, &source, &flags);
    }
    regexp_alloc(realm, new_target, pattern, flags)
}

fn regexp_construct(realm: &Realm, args: &[Value], new_target: &Arc<JsObject>) -> VmResult<Value> {
    let pattern = arg(args, 0);
    let pattern_is_regexp = realm.is_regexp(&pattern)?;
    regexp_from_pattern(realm, new_target, &pattern, &arg(args, 1), pattern_is_regexp)
}

fn regexp_call(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let pattern = arg(args, 0);
    let flags = arg(args, 1);
    let ctor = realm.intrinsics().regexp_constructor.clone();
    let pattern_is_regexp = realm.is_regexp(&pattern)?;
    if pattern_is_regexp && flags.is_undefined() {
        let pattern_ctor = realm.get(&pattern, "constructor")?;
        if pattern_ctor.same_value(&Value::object(ctor.clone())) {
            return Ok(pattern);
        }
    }
    regexp_from_pattern(realm, &ctor, &pattern, &flags, pattern_is_regexp)
}

// ============================================================================
// Accessors
// ============================================================================

fn is_regexp_prototype(realm: &Realm, this: &Value) -> bool {
    this.as_object()
        .is_some_and(|o| Arc::ptr_eq(o, &realm.intrinsics().regexp_prototype))
}

fn flag_getter(realm: &Realm, this: &Value, name: &str, flag: FlagSelector) -> VmResult<Value> {
    let obj = this_object(this, &format!("RegExp.prototype.{name} getter"))?;
    if let Some(rx) = obj.as_regexp() {
        return Ok(Value::boolean(flag(&rx.flags())));
    }
    if is_regexp_prototype(realm, this) {
        return Ok(Value::undefined());
    }
    Err(VmError::type_error(format!(
        "RegExp.prototype.{name} getter called on non-RegExp object"
    )))
}

fn regexp_source(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let obj = this_object(this, "RegExp.prototype.source getter")?;
    if let Some(rx) = obj.as_regexp() {
        return Ok(Value::from(rx.escaped_source()));
    }
    if is_regexp_prototype(realm, this) {
        return Ok(Value::from("(?:)"));
    }
    Err(VmError::type_error(
        "RegExp.prototype.source getter called on non-RegExp object",
    ))
}

/// `flags` is assembled from the individual (overridable) flag getters
fn regexp_flags(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    this_object(this, "RegExp.prototype.flags getter")?;
    let mut out = String::new();
    for ((name, _), ch) in FLAG_GETTERS.iter().zip(FLAG_CHARS) {
        if realm.get(this, *name)?.to_boolean() {
            out.push(*ch);
        }
    }
    Ok(Value::from(out))
}

// ============================================================================
// exec / test / toString
// ============================================================================

fn get_last_index(realm: &Realm, rx: &Value) -> VmResult<usize> {
    let last_index = realm.get(rx, "lastIndex")?;
    realm.to_length(&last_index)
}

fn set_last_index(realm: &Realm, rx: &Value, index: usize) -> VmResult<()> {
    realm.put(rx, "lastIndex", Value::from(index))
}

/// RegExpBuiltinExec
fn regexp_builtin_exec(realm: &Realm, rx: &Value, string: &Arc<str>) -> VmResult<Value> {
    let Some(matcher) = rx.as_object().and_then(|o| o.as_regexp()) else {
        return Err(VmError::type_error("RegExp exec called on incompatible receiver"));
    };
    let flags = matcher.flags();
    let global_or_sticky = flags.global || flags.sticky;
    let mut last_index = get_last_index(realm, rx)?;
    if !global_or_sticky {
        last_index = 0;
    }

    let units = to_utf16(string);
    let found = if last_index > units.len() {
        None
    } else {
        matcher
            .find_from(&units, last_index)
            .filter(|m| !flags.sticky || m.start == last_index)
    };
    let Some(m) = found else {
        if global_or_sticky {
            set_last_index(realm, rx, 0)?;
        }
        return Ok(Value::Null);
    };
    if global_or_sticky {
        set_last_index(realm, rx, m.end)?;
    }

    let mut elements = Vec::with_capacity(m.captures.len() + 1);
    elements.push(Value::from(substring(&units, m.start, m.end)));
    for capture in &m.captures {
        elements.push(match capture {
            Some((s, e)) => Value::from(substring(&units, *s, *e)),
            None => Value::undefined(),
        });
    }
    let result = realm.new_array(elements);
    realm.create_data_property(&result, "index", Value::from(m.start));
    realm.create_data_property(&result, "input", Value::String(string.clone()));

    let groups = if matcher.has_named_groups() {
        let groups = Arc::new(JsObject::new(None));
        for (name, capture) in matcher.capture_group_names().iter().zip(&m.captures) {
            if let Some(name) = name {
                let value = capture.map_or(Value::undefined(), |(s, e)| {
                    Value::from(substring(&units, s, e))
                });
                realm.create_data_property(&groups, name.as_str(), value);
            }
        }
        Value::object(groups)
    } else {
        Value::undefined()
    };
    realm.create_data_property(&result, "groups", groups);

    if flags.has_indices {
        let pair = |s: usize, e: usize| {
            Value::object(realm.new_array(vec![Value::from(s), Value::from(e)]))
        };
        let mut indices = vec![pair(m.start, m.end)];
        indices.extend(
            m.captures
                .iter()
                .map(|c| c.map_or(Value::undefined(), |(s, e)| pair(s, e))),
        );
        let indices = realm.new_array(indices);
        let index_groups = if matcher.has_named_groups() {
            let groups = Arc::new(JsObject::new(None));
            for (name, capture) in matcher.capture_group_names().iter().zip(&m.captures) {
                if let Some(name) = name {
                    let value = capture.map_or(Value::undefined(), |(s, e)| pair(s, e));
                    realm.create_data_property(&groups, name.as_str(), value);
                }
            }
            Value::object(groups)
        } else {
            Value::undefined()
        };
        realm.create_data_property(&indices, "groups", index_groups);
        realm.create_data_property(&result, "indices", Value::object(indices));
    }

    Ok(Value::object(result))
}

/// RegExpExec: a user-visible `exec` wins over the built-in matcher
pub(crate) fn regexp_exec_dispatch(realm: &Realm, rx: &Value, string: &Arc<str>) -> VmResult<Value> {
    let exec = realm.get(rx, "exec")?;
    if exec.is_callable() {
        let result = realm.call(&exec, rx, &[Value::String(string.clone())])?;
        if !result.is_object() && !result.is_null() {
            return Err(VmError::type_error(
                "RegExp exec method returned something other than an Object or null",
            ));
        }
        return Ok(result);
    }
    regexp_builtin_exec(realm, rx, string)
}

fn regexp_exec(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    if this.as_object().and_then(|o| o.as_regexp()).is_none() {
        return Err(VmError::type_error(
            "RegExp.prototype.exec called on incompatible receiver",
        ));
    }
    let string = realm.to_string(&arg(args, 0))?;
    regexp_builtin_exec(realm, this, &string)
}

fn regexp_test(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    this_object(this, "RegExp.prototype.test")?;
    let string = realm.to_string(&arg(args, 0))?;
    Ok(Value::boolean(!regexp_exec_dispatch(realm, this, &string)?.is_null()))
}

fn regexp_to_string(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    this_object(this, "RegExp.prototype.toString")?;
    let source = realm.to_string(&realm.get(this, "source")?)?;
    let flags = realm.to_string(&realm.get(this, "flags")?)?;
    Ok(Value::from(format!("/{source}/{flags}")))
}

// ============================================================================
// Symbol methods
// ============================================================================

fn flags_string(realm: &Realm, rx: &Value) -> VmResult<Arc<str>> {
    let flags = realm.get(rx, "flags")?;
    realm.to_string(&flags)
}

fn is_full_unicode(flags: &str) -> bool {
    flags.contains('u') || flags.contains('v')
}

/// After an empty match, step `lastIndex` past it
fn advance_after_empty_match(
    realm: &Realm,
    rx: &Value,
    units: &[u16],
    full_unicode: bool,
) -> VmResult<()> {
    let this_index = get_last_index(realm, rx)?;
    set_last_index(realm, rx, advance_string_index(units, this_index, full_unicode))
}

fn match_string(realm: &Realm, result: &Value) -> VmResult<Arc<str>> {
    let matched = realm.get(result, 0u32)?;
    realm.to_string(&matched)
}

/// RegExp.prototype[Symbol.match]
fn regexp_symbol_match(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    this_object(this, "RegExp.prototype[Symbol.match]")?;
    let string = realm.to_string(&arg(args, 0))?;
    let flags = flags_string(realm, this)?;
    if !flags.contains('g') {
        return regexp_exec_dispatch(realm, this, &string);
    }
    let full_unicode = is_full_unicode(&flags);
    let units = to_utf16(&string);
    set_last_index(realm, this, 0)?;
    let mut matches = Vec::new();
    loop {
        let result = regexp_exec_dispatch(realm, this, &string)?;
        if result.is_null() {
            if matches.is_empty() {
                return Ok(Value::Null);
            }
            return Ok(Value::object(realm.new_array(matches)));
        }
        let matched = match_string(realm, &result)?;
        if matched.is_empty() {
            advance_after_empty_match(realm, this, &units, full_unicode)?;
        }
        matches.push(Value::String(matched));
    }
}

/// RegExp.prototype[Symbol.matchAll]
fn regexp_symbol_match_all(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    this_object(this, "RegExp.prototype[Symbol.matchAll]")?;
    let string = realm.to_string(&arg(args, 0))?;
    let ctor = realm.species_constructor(this, &realm.intrinsics().regexp_constructor)?;
    let flags = flags_string(realm, this)?;
    let matcher = realm.construct(&ctor, &[this.clone(), Value::String(flags.clone())], None)?;
    let last_index = get_last_index(realm, this)?;
    set_last_index(realm, &matcher, last_index)?;

    let iter = JsObject::with_kind(
        Some(realm.intrinsics().regexp_string_iterator_prototype.clone()),
        ObjectKind::RegExpStringIterator(Mutex::new(RegExpStringIteratorState {
            matcher,
            string,
            global: flags.contains('g'),
            full_unicode: is_full_unicode(&flags),
            done: false,
        })),
    );
    Ok(Value::object(Arc::new(iter)))
}

fn regexp_string_iterator_next(realm: &Realm, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let Some(ObjectKind::RegExpStringIterator(state)) = this.as_object().map(|o| o.kind()) else {
        return Err(VmError::type_error(
            "%RegExpStringIteratorPrototype%.next called on incompatible receiver",
        ));
    };
    let (matcher, string, global, full_unicode) = {
        let state = state.lock();
        if state.done {
            return Ok(realm.create_iter_result(Value::undefined(), true));
        }
        (
            state.matcher.clone(),
            state.string.clone(),
            state.global,
            state.full_unicode,
        )
    };

    let result = regexp_exec_dispatch(realm, &matcher, &string)?;
    if result.is_null() {
        state.lock().done = true;
        return Ok(realm.create_iter_result(Value::undefined(), true));
    }
    if global {
        if match_string(realm, &result)?.is_empty() {
            advance_after_empty_match(realm, &matcher, &to_utf16(&string), full_unicode)?;
        }
    } else {
        state.lock().done = true;
    }
    Ok(realm.create_iter_result(result, false))
}

/// RegExp.prototype[Symbol.replace]
fn regexp_symbol_replace(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    this_object(this, "RegExp.prototype[Symbol.replace]")?;
    let string = realm.to_string(&arg(args, 0))?;
    let units = to_utf16(&string);
    let replace_value = arg(args, 1);
    let functional = replace_value.is_callable();
    let template = if functional {
        Vec::new()
    } else {
        to_utf16(&realm.to_string(&replace_value)?)
    };

    let flags = flags_string(realm, this)?;
    let global = flags.contains('g');
    let full_unicode = is_full_unicode(&flags);
    if global {
        set_last_index(realm, this, 0)?;
    }

    let mut results = Vec::new();
    loop {
        let result = regexp_exec_dispatch(realm, this, &string)?;
        if result.is_null() {
            break;
        }
        results.push(result.clone());
        if !global {
            break;
        }
        if match_string(realm, &result)?.is_empty() {
            advance_after_empty_match(realm, this, &units, full_unicode)?;
        }
    }

    let mut accumulated: Vec<u16> = Vec::new();
    let mut next_source_position = 0;
    for result in results {
        let capture_count = realm.list_length_of_array_like(&result)?.saturating_sub(1);
        let matched = to_utf16(&match_string(realm, &result)?);
        let index = realm.get(&result, "index")?;
        let position = realm
            .to_integer_or_infinity(&index)?
            .clamp(0.0, units.len() as f64) as usize;

        let mut captures = Vec::with_capacity(capture_count);
        for n in 1..=capture_count {
            let capture = realm.get(&result, n)?;
            captures.push(match capture {
                Value::Undefined => Value::undefined(),
                c => Value::String(realm.to_string(&c)?),
            });
        }
        let named_captures = realm.get(&result, "groups")?;

        let replacement = if functional {
            let mut replacer_args = vec![Value::from(from_utf16(&matched))];
            replacer_args.extend(captures.iter().cloned());
            replacer_args.push(Value::from(position));
            replacer_args.push(Value::String(string.clone()));
            if !named_captures.is_undefined() {
                replacer_args.push(named_captures);
            }
            let replaced = realm.call(&replace_value, &Value::undefined(), &replacer_args)?;
            to_utf16(&realm.to_string(&replaced)?)
        } else {
            if named_captures.is_null() {
                return Err(VmError::type_error("Cannot convert null to object"));
            }
            get_substitution(
                realm,
                &matched,
                &units,
                position,
                &captures,
                &named_captures,
                &template,
            )?
        };

        if position >= next_source_position {
            accumulated.extend_from_slice(&units[next_source_position..position]);
            accumulated.extend_from_slice(&replacement);
            next_source_position = position + matched.len();
        }
    }
    if next_source_position < units.len() {
        accumulated.extend_from_slice(&units[next_source_position..]);
    }
    Ok(Value::from(from_utf16(&accumulated)))
}

/// GetSubstitution: expand `$$`, `$&`, `` $` ``, `$'`, `$n`, `$nn` and
/// `$<name>` in `template`
pub(crate) fn get_substitution(
    realm: &Realm,
    matched: &[u16],
    string: &[u16],
    position: usize,
    captures: &[Value],
    named_captures: &Value,
    template: &[u16],
) -> VmResult<Vec<u16>> {
    const DOLLAR: u16 = b'$' as u16;
    let is_digit = |u: u16| (b'0' as u16..=b'9' as u16).contains(&u);
    let digit = |u: u16| (u - b'0' as u16) as usize;
    let capture_units = |value: &Value| -> Vec<u16> {
        value.as_str().map(to_utf16).unwrap_or_default()
    };

    let mut out = Vec::with_capacity(template.len());
    let mut i = 0;
    while i < template.len() {
        let unit = template[i];
        if unit != DOLLAR || i + 1 >= template.len() {
            out.push(unit);
            i += 1;
            continue;
        }
        let next = template[i + 1];
        match next {
            DOLLAR => {
                out.push(DOLLAR);
                i += 2;
            }
            n if n == b'&' as u16 => {
                out.extend_from_slice(matched);
                i += 2;
            }
            n if n == b'`' as u16 => {
                out.extend_from_slice(&string[..position.min(string.len())]);
                i += 2;
            }
            n if n == b'\'' as u16 => {
                let tail = (position + matched.len()).min(string.len());
                out.extend_from_slice(&string[tail..]);
                i += 2;
            }
            n if is_digit(n) => {
                let m = captures.len();
                let one = digit(n);
                let two = template
                    .get(i + 2)
                    .copied()
                    .filter(|u| is_digit(*u))
                    .map(|u| one * 10 + digit(u));
                match two {
                    Some(nn) if (1..=m).contains(&nn) => {
                        out.extend(capture_units(&captures[nn - 1]));
                        i += 3;
                    }
                    _ if (1..=m).contains(&one) => {
                        out.extend(capture_units(&captures[one - 1]));
                        i += 2;
                    }
                    _ => {
                        out.push(DOLLAR);
                        i += 1;
                    }
                }
            }
            n if n == b'<' as u16 => {
                let close = template[i + 2..]
                    .iter()
                    .position(|u| *u == b'>' as u16)
                    .map(|p| i + 2 + p);
                match (named_captures.is_undefined(), close) {
                    (false, Some(close)) => {
                        let name = from_utf16(&template[i + 2..close]);
                        let capture = realm.get(named_captures, name.as_str())?;
                        if !capture.is_undefined() {
                            out.extend(to_utf16(&realm.to_string(&capture)?));
                        }
                        i = close + 1;
                    }
                    _ => {
                        out.push(DOLLAR);
                        i += 1;
                    }
                }
            }
            _ => {
                out.push(DOLLAR);
                i += 1;
            }
        }
    }
    Ok(out)
}

/// RegExp.prototype[Symbol.search]
fn regexp_symbol_search(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    this_object(this, "RegExp.prototype[Symbol.search]")?;
    let string = realm.to_string(&arg(args, 0))?;
    let previous = realm.get(this, "lastIndex")?;
    let zero = Value::from(0);
    if !previous.same_value(&zero) {
        realm.put(this, "lastIndex", zero)?;
    }
    let result = regexp_exec_dispatch(realm, this, &string)?;
    let current = realm.get(this, "lastIndex")?;
    if !current.same_value(&previous) {
        realm.put(this, "lastIndex", previous)?;
    }
    if result.is_null() {
        return Ok(Value::number(-1.0));
    }
    realm.get(&result, "index")
}

/// RegExp.prototype[Symbol.split]: matches with a species-constructed
/// sticky copy of the receiver
fn regexp_symbol_split(realm: &Realm, this: &Value, args: &[Value]) -> VmResult<Value> {
    this_object(this, "RegExp.prototype[Symbol.split]")?;
    let string = realm.to_string(&arg(args, 0))?;
    let units = to_utf16(&string);
    let ctor = realm.species_constructor(this, &realm.intrinsics().regexp_constructor)?;
    let flags = flags_string(realm, this)?;
    let unicode_matching = is_full_unicode(&flags);
    let new_flags = if flags.contains('y') {
        flags.to_string()
    } else {
        format!("{flags}y")
    };
    let splitter = realm.construct(&ctor, &[this.clone(), Value::from(new_flags)], None)?;

    let limit = match arg(args, 1) {
        Value::Undefined => u32::MAX,
        limit => realm.to_uint32(&limit)?,
    } as usize;
    let mut parts = Vec::new();
    if limit == 0 {
        return Ok(Value::object(realm.new_array(parts)));
    }

    let size = units.len();
    if size == 0 {
        if regexp_exec_dispatch(realm, &splitter, &string)?.is_null() {
            parts.push(Value::String(string));
        }
        return Ok(Value::object(realm.new_array(parts)));
    }

    let mut p = 0;
    let mut q = 0;
    while q < size {
        set_last_index(realm, &splitter, q)?;
        let z = regexp_exec_dispatch(realm, &splitter, &string)?;
        if z.is_null() {
            q = advance_string_index(&units, q, unicode_matching);
            continue;
        }
        let e = get_last_index(realm, &splitter)?.min(size);
        if e == p {
            q = advance_string_index(&units, q, unicode_matching);
            continue;
        }
        parts.push(Value::from(substring(&units, p, q)));
        if parts.len() == limit {
            return Ok(Value::object(realm.new_array(parts)));
        }
        p = e;
        let capture_count = realm.length_of_array_like(&z)?.saturating_sub(1);
        for i in 1..=capture_count {
            parts.push(realm.get(&z, i)?);
            if parts.len() == limit {
                return Ok(Value::object(realm.new_array(parts)));
            }
        }
        q = p;
    }
    parts.push(Value::from(substring(&units, p, size)));
    Ok(Value::object(realm.new_array(parts)))
}
