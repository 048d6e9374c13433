//! String functions (0x0001 - 0x0011)
//!
//! Positions and lengths count Unicode scalar values, not bytes.

use heluna_core::{HelunaError, List, Result, Value};
use regex::{NoExpand, Regex};

use crate::args::Args;

pub fn upper(args: &Args<'_>) -> Result<Value> {
    Ok(Value::String(args.str("value").to_uppercase()))
}

pub fn lower(args: &Args<'_>) -> Result<Value> {
    Ok(Value::String(args.str("value").to_lowercase()))
}

pub fn trim(args: &Args<'_>) -> Result<Value> {
    Ok(Value::from(args.str("value").trim()))
}

pub fn trim_start(args: &Args<'_>) -> Result<Value> {
    Ok(Value::from(args.str("value").trim_start()))
}

pub fn trim_end(args: &Args<'_>) -> Result<Value> {
    Ok(Value::from(args.str("value").trim_end()))
}

/// Characters `start..end`, clamped to the string
pub fn substring(args: &Args<'_>) -> Result<Value> {
    let s = args.str("value");
    let len = s.chars().count() as i64;
    let start = args.int("start").max(0);
    let end = args.int("end").min(len);
    if start >= end {
        return Ok(Value::from(""));
    }
    let text: String = s
        .chars()
        .skip(start as usize)
        .take((end - start) as usize)
        .collect();
    Ok(Value::String(text))
}

pub fn replace(args: &Args<'_>) -> Result<Value> {
    let s = args.str("value");
    let find = args.str("find");
    if find.is_empty() {
        return Ok(Value::String(s));
    }
    Ok(Value::String(s.replace(&find, &args.str("replacement"))))
}

/// Split on a literal delimiter; an empty delimiter splits into characters
pub fn split(args: &Args<'_>) -> Result<Value> {
    let s = args.str("value");
    let delimiter = args.str("delimiter");
    let parts: List = if delimiter.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(delimiter.as_str()).map(Value::from).collect()
    };
    Ok(Value::List(parts))
}

pub fn join(args: &Args<'_>) -> Result<Value> {
    let delimiter = args.str("delimiter");
    let text = args
        .list("list")
        .items()
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(delimiter.as_str());
    Ok(Value::String(text))
}

pub fn starts_with(args: &Args<'_>) -> Result<Value> {
    Ok(Value::Boolean(
        args.str("value").starts_with(&args.str("prefix")),
    ))
}

pub fn ends_with(args: &Args<'_>) -> Result<Value> {
    Ok(Value::Boolean(args.str("value").ends_with(&args.str("suffix"))))
}

/// Substring test; the needle may be passed as `substring` or `search`
pub fn contains(args: &Args<'_>) -> Result<Value> {
    let needle = match args.value("substring") {
        Value::Nothing => args.value("search"),
        other => other,
    };
    match needle {
        Value::String(needle) => Ok(Value::Boolean(args.str("value").contains(&needle))),
        _ => Err(HelunaError::Type(
            "contains: missing substring/search argument".to_string(),
        )),
    }
}

/// Length of `list` when given a list, else character count of `value`
pub fn length(args: &Args<'_>) -> Result<Value> {
    let len = match args.value("list") {
        Value::List(list) => list.len(),
        _ => args.str("value").chars().count(),
    };
    Ok(Value::Integer(len as i64))
}

pub fn pad_left(args: &Args<'_>) -> Result<Value> {
    pad(args, true)
}

pub fn pad_right(args: &Args<'_>) -> Result<Value> {
    pad(args, false)
}

/// Extend `value` to `width` characters by repeating `fill` (default a
/// space). A multi-character fill is cut so the result is exactly `width`.
fn pad(args: &Args<'_>, left: bool) -> Result<Value> {
    let s = args.str("value");
    let width = usize::try_from(args.int("width")).unwrap_or(0);
    let mut fill = args.str("fill");
    if fill.is_empty() {
        fill = " ".to_string();
    }

    let len = s.chars().count();
    if len >= width {
        return Ok(Value::String(s));
    }
    let needed = width - len;
    let fill_len = fill.chars().count();
    let total = needed.div_ceil(fill_len) * fill_len;
    let repeated = fill.chars().cycle().take(total);
    let padding: String = if left {
        repeated.skip(total - needed).collect()
    } else {
        repeated.take(needed).collect()
    };

    Ok(Value::String(if left {
        padding + &s
    } else {
        s + &padding
    }))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|_| HelunaError::Domain(format!("invalid regex: {pattern}")))
}

/// Whole-string match, `.` also matching newlines
pub fn regex_match(args: &Args<'_>) -> Result<Value> {
    let pattern = args.str("pattern");
    let re = Regex::new(&format!("(?s)^(?:{pattern})$"))
        .map_err(|_| HelunaError::Domain(format!("invalid regex: {pattern}")))?;
    Ok(Value::Boolean(re.is_match(&args.str("value"))))
}

/// Replace every match with a literal replacement
pub fn regex_replace(args: &Args<'_>) -> Result<Value> {
    let re = compile(&args.str("pattern"))?;
    let replacement = args.str("replacement");
    let text = re
        .replace_all(&args.str("value"), NoExpand(&replacement))
        .into_owned();
    Ok(Value::String(text))
}
