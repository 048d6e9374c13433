//! Date and time functions (0x0050 - 0x0054)
//!
//! Dates travel as ISO-8601 strings without zone handling: a trailing `Z`
//! is dropped on input and appended again on date-time output. Formats use
//! strftime syntax (`%Y-%m-%d %H:%M:%S`).

use std::fmt::Write as _;

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use heluna_core::{HelunaError, Record, Result, Value};

use crate::args::Args;

const ISO_DATE: &str = "%Y-%m-%d";
const ISO_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn domain(message: String) -> HelunaError {
    HelunaError::Domain(message)
}

/// Parse `value` with `format`, accepting date-only formats as midnight
fn parse_with(value: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, format).ok().or_else(|| {
        NaiveDate::parse_from_str(value, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

/// Parse an ISO date or date-time; date-only strings are midnight
fn parse_iso(text: &str) -> Result<NaiveDateTime> {
    let cleaned = text.replace('Z', "");
    let parsed = if cleaned.contains('T') {
        NaiveDateTime::parse_from_str(&cleaned, ISO_DATE_TIME)
            .or_else(|_| NaiveDateTime::parse_from_str(&cleaned, "%Y-%m-%dT%H:%M"))
            .ok()
    } else {
        NaiveDate::parse_from_str(&cleaned, ISO_DATE)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    };
    parsed.ok_or_else(|| domain(format!("invalid ISO date: {text}")))
}

fn render(dt: &NaiveDateTime, format: &str) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", dt.format(format))
        .map_err(|_| domain(format!("invalid date format: {format}")))?;
    Ok(out)
}

/// `{year, month, day, hour, minute, second}` from a formatted string
pub fn parse_date(args: &Args<'_>) -> Result<Value> {
    let value = args.str("value");
    let format = args.str("format");
    let dt = parse_with(&value, &format)
        .ok_or_else(|| domain(format!("cannot parse '{value}' with format '{format}'")))?;

    let parts: Record = [
        ("year", i64::from(dt.year())),
        ("month", i64::from(dt.month())),
        ("day", i64::from(dt.day())),
        ("hour", i64::from(dt.hour())),
        ("minute", i64::from(dt.minute())),
        ("second", i64::from(dt.second())),
    ]
    .into_iter()
    .map(|(k, v)| (k, Value::Integer(v)))
    .collect();
    Ok(Value::Record(parts))
}

/// Render a `{year, month, ...}` record; missing components are 0
pub fn format_date(args: &Args<'_>) -> Result<Value> {
    let date = args.record("date");
    let part = |name: &str| date.get(name).as_int().unwrap_or(0);
    let component = |name: &str| u32::try_from(part(name)).ok();

    let dt = i32::try_from(part("year"))
        .ok()
        .zip(component("month").zip(component("day")))
        .and_then(|(y, (m, d))| NaiveDate::from_ymd_opt(y, m, d))
        .zip(component("hour").zip(component("minute").zip(component("second"))))
        .and_then(|(d, (h, (mi, s)))| d.and_hms_opt(h, mi, s))
        .ok_or_else(|| domain("format-date: invalid date components".to_string()))?;

    Ok(Value::String(render(&dt, &args.str("format"))?))
}

/// Whole units from `from` (or `a`) to `to` (or `b`), truncated toward zero
pub fn date_diff(args: &Args<'_>) -> Result<Value> {
    let from = parse_iso(&args.str_either("from", "a"))?;
    let to = parse_iso(&args.str_either("to", "b"))?;
    let delta = to - from;
    let unit = args.str("unit");
    let diff = match unit.as_str() {
        "seconds" => delta.num_seconds(),
        "minutes" => delta.num_minutes(),
        "hours" => delta.num_hours(),
        "days" => delta.num_days(),
        _ => return Err(domain(format!("date-diff: unknown unit {unit}"))),
    };
    Ok(Value::Integer(diff))
}

/// Shift a date by `amount` units. Month arithmetic clamps to the last day
/// of the target month. Date-only input gives date-only output.
pub fn date_add(args: &Args<'_>) -> Result<Value> {
    let date = args.str("date");
    let amount = args.int("amount");
    let unit = args.str("unit");
    let dt = parse_iso(&date)?;

    let delta = |make: fn(i64) -> Option<TimeDelta>| {
        make(amount).and_then(|d| dt.checked_add_signed(d))
    };
    let shifted = match unit.as_str() {
        "seconds" => delta(TimeDelta::try_seconds),
        "minutes" => delta(TimeDelta::try_minutes),
        "hours" => delta(TimeDelta::try_hours),
        "days" => delta(TimeDelta::try_days),
        "months" => add_months(dt, amount),
        "years" => amount.checked_mul(12).and_then(|m| add_months(dt, m)),
        _ => return Err(domain(format!("date-add: unknown unit {unit}"))),
    }
    .ok_or_else(|| domain(format!("date-add: {amount} {unit} out of range")))?;

    if date.contains('T') {
        Ok(Value::String(format!("{}Z", render(&shifted, ISO_DATE_TIME)?)))
    } else {
        Ok(Value::String(render(&shifted, ISO_DATE)?))
    }
}

fn add_months(dt: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let count = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        dt.checked_add_months(count)
    } else {
        dt.checked_sub_months(count)
    }
}

/// The invocation timestamp, unchanged
pub fn now(args: &Args<'_>) -> Result<Value> {
    Ok(Value::from(args.timestamp()))
}
