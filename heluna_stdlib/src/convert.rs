//! Conversions (0x0074 - 0x0076) and list folding (0x0078)

use heluna_core::{HelunaError, Result, Value};

use crate::args::Args;
use crate::numeric::as_f64;

pub fn to_string(args: &Args<'_>) -> Result<Value> {
    Ok(Value::String(args.value("value").to_string()))
}

pub fn to_float(args: &Args<'_>) -> Result<Value> {
    Ok(Value::Float(args.value("value").to_float()?))
}

/// Floats truncate; strings are read as integers, then as floats
pub fn to_integer(args: &Args<'_>) -> Result<Value> {
    match args.value("value") {
        Value::Boolean(_) => Err(HelunaError::Type(
            "to-integer: cannot convert boolean".to_string(),
        )),
        value => Ok(Value::Integer(value.to_integer()?)),
    }
}

/// Reduce `list` from `initial` with `fn` = "add" | "multiply".
///
/// Two integers combine with wrapping integer arithmetic; any other pair
/// is computed in floating point with non-numbers read as 0.
pub fn fold(args: &Args<'_>) -> Result<Value> {
    let combine: fn(Value, &Value) -> Value = match args.str("fn").as_str() {
        "add" => |acc: Value, item: &Value| match (&acc, item) {
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_add(*b)),
            _ => Value::Float(as_f64(&acc) + as_f64(item)),
        },
        "multiply" => |acc: Value, item: &Value| match (&acc, item) {
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_mul(*b)),
            _ => Value::Float(as_f64(&acc) * as_f64(item)),
        },
        other => {
            return Err(HelunaError::Domain(format!("fold: unknown fn {other}")));
        }
    };
    let list = args.list("list");
    let result = list.items().iter().fold(args.value("initial"), combine);
    Ok(result)
}
