//! The `Math` namespace

use std::sync::Arc;

use super::helpers::define_to_string_tag;
use crate::builtin_builder::NamespaceBuilder;
use crate::error::VmResult;
use crate::function::arg;
use crate::intrinsics::InitContext;
use crate::object::{JsObject, PropertyAttributes};
use crate::realm::Realm;
use crate::value::Value;

pub(crate) fn init(cx: &InitContext<'_>, math: &Arc<JsObject>) {
    NamespaceBuilder::new(cx.fn_proto, math.clone())
        .property("E", Value::number(std::f64::consts::E), PropertyAttributes::frozen())
        .property("PI", Value::number(std::f64::consts::PI), PropertyAttributes::frozen())
        .method("abs", |realm, _this, args| unary(realm, args, f64::abs), 1)
        .method("ceil", |realm, _this, args| unary(realm, args, f64::ceil), 1)
        .method("floor", |realm, _this, args| unary(realm, args, f64::floor), 1)
        .method("sqrt", |realm, _this, args| unary(realm, args, f64::sqrt), 1)
        .method("trunc", |realm, _this, args| unary(realm, args, f64::trunc), 1)
        .method("round", |realm, _this, args| unary(realm, args, js_round), 1)
        .method("sign", |realm, _this, args| unary(realm, args, js_sign), 1)
        .method("pow", math_pow, 2)
        .method("max", |realm, _this, args| fold(realm, args, f64::NEG_INFINITY, true), 2)
        .method("min", |realm, _this, args| fold(realm, args, f64::INFINITY, false), 2)
        .build();
    define_to_string_tag(math, &cx.symbols.to_string_tag, "Math");
}

fn unary(realm: &Realm, args: &[Value], op: fn(f64) -> f64) -> VmResult<Value> {
    Ok(Value::number(op(realm.to_number(&arg(args, 0))?)))
}

/// Rounds half toward +Infinity and keeps the sign of zero
fn js_round(n: f64) -> f64 {
    if !n.is_finite() || n == 0.0 {
        return n;
    }
    if n > 0.0 && n < 0.5 {
        return 0.0;
    }
    if n < 0.0 && n >= -0.5 {
        return -0.0;
    }
    (n + 0.5).floor()
}

fn js_sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        n
    } else {
        n.signum()
    }
}

fn math_pow(realm: &Realm, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let base = realm.to_number(&arg(args, 0))?;
    let exponent = realm.to_number(&arg(args, 1))?;
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return Ok(Value::number(f64::NAN));
    }
    Ok(Value::number(base.powf(exponent)))
}

/// `Math.max` / `Math.min`: every argument is converted before any NaN
/// short-circuits the result
fn fold(realm: &Realm, args: &[Value], init: f64, max: bool) -> VmResult<Value> {
    let mut numbers = Vec::with_capacity(args.len());
    for value in args {
        numbers.push(realm.to_number(value)?);
    }
    let mut acc = init;
    for n in numbers {
        if n.is_nan() {
            return Ok(Value::number(f64::NAN));
        }
        let replace = if max {
            n > acc || (n == 0.0 && acc == 0.0 && acc.is_sign_negative() && n.is_sign_positive())
        } else {
            n < acc || (n == 0.0 && acc == 0.0 && acc.is_sign_positive() && n.is_sign_negative())
        };
        if replace {
            acc = n;
        }
    }
    Ok(Value::number(acc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up() {
        assert_eq!(js_round(2.5), 3.0);
        assert_eq!(js_round(-2.5), -2.0);
        assert!(js_round(-0.2).is_sign_negative());
    }

    #[test]
    fn test_max_min_with_signed_zero() {
        let realm = Realm::new();
        let max = fold(&realm, &[Value::number(-0.0), Value::number(0.0)], f64::NEG_INFINITY, true)
            .unwrap();
        assert!(max.as_number().unwrap().is_sign_positive());
        let min = fold(&realm, &[Value::number(0.0), Value::number(-0.0)], f64::INFINITY, false)
            .unwrap();
        assert!(min.as_number().unwrap().is_sign_negative());
        let nan = fold(&realm, &[Value::number(1.0), Value::number(f64::NAN)], f64::INFINITY, false)
            .unwrap();
        assert!(nan.as_number().unwrap().is_nan());
    }
}
