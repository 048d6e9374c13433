//! Numeric functions (0x0020 - 0x0026)

use heluna_core::{HelunaError, Result, Value};

use crate::args::Args;

/// Numbers as f64, anything else 0
pub(crate) fn as_f64(value: &Value) -> f64 {
    value.as_number().unwrap_or(0.0)
}

/// Keep the integer/float kind of `reference`
fn like(number: f64, reference: &Value) -> Value {
    match reference {
        Value::Integer(_) => Value::Integer(number as i64),
        _ => Value::Float(number),
    }
}

pub fn abs(args: &Args<'_>) -> Result<Value> {
    match args.value("value") {
        Value::Integer(i) => Ok(Value::Integer(i.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(HelunaError::Type(format!(
            "abs: expected number, got {}",
            other.type_name()
        ))),
    }
}

pub fn ceil(args: &Args<'_>) -> Result<Value> {
    Ok(Value::Integer(args.num("value").ceil() as i64))
}

pub fn floor(args: &Args<'_>) -> Result<Value> {
    Ok(Value::Integer(args.num("value").floor() as i64))
}

/// Half-up rounding: 2.5 becomes 3, -2.5 becomes -2
pub fn round(args: &Args<'_>) -> Result<Value> {
    Ok(Value::Integer((args.num("value") + 0.5).floor() as i64))
}

pub fn min(args: &Args<'_>) -> Result<Value> {
    let (a, b) = (args.value("a"), args.value("b"));
    Ok(if as_f64(&a) <= as_f64(&b) { a } else { b })
}

pub fn max(args: &Args<'_>) -> Result<Value> {
    let (a, b) = (args.value("a"), args.value("b"));
    Ok(if as_f64(&a) >= as_f64(&b) { a } else { b })
}

/// Bounds are read from `low`/`high`, or `min`/`max` when those are absent
pub fn clamp(args: &Args<'_>) -> Result<Value> {
    let value = args.value("value");
    let bound = |name: &str, alias: &str| {
        if args.is_missing(name) {
            args.num(alias)
        } else {
            args.num(name)
        }
    };
    let low = bound("low", "min");
    let high = bound("high", "max");

    let v = as_f64(&value);
    Ok(if v < low {
        like(low, &value)
    } else if v > high {
        like(high, &value)
    } else {
        value
    })
}
