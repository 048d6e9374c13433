//! Heluna Standard Library
//!
//! The numbered function table packets call through STDLIB_CALL. Ids are
//! grouped by family: strings from 0x0001, numbers from 0x0020, lists from
//! 0x0030, records from 0x0040, dates from 0x0050, encodings from 0x0060,
//! crypto from 0x0070, conversions from 0x0074 and folds at 0x0078.

mod args;
pub mod convert;
pub mod crypto;
pub mod datetime;
pub mod encoding;
pub mod list;
pub mod numeric;
pub mod record;
pub mod string;

use heluna_core::{
    FixtureOutcome, FunctionTable, HelunaError, HelunaVm, InvocationContext, Packet, Record,
    Result, Value,
};

pub use args::Args;

/// Signature shared by every standard function
pub type Builtin = fn(&Args<'_>) -> Result<Value>;

const FUNCTIONS: &[(u16, &str, Builtin)] = &[
    (0x0001, "upper", string::upper),
    (0x0002, "lower", string::lower),
    (0x0003, "trim", string::trim),
    (0x0004, "trim-start", string::trim_start),
    (0x0005, "trim-end", string::trim_end),
    (0x0006, "substring", string::substring),
    (0x0007, "replace", string::replace),
    (0x0008, "split", string::split),
    (0x0009, "join", string::join),
    (0x000A, "starts-with", string::starts_with),
    (0x000B, "ends-with", string::ends_with),
    (0x000C, "contains", string::contains),
    (0x000D, "length", string::length),
    (0x000E, "pad-left", string::pad_left),
    (0x000F, "pad-right", string::pad_right),
    (0x0010, "regex-match", string::regex_match),
    (0x0011, "regex-replace", string::regex_replace),
    (0x0020, "abs", numeric::abs),
    (0x0021, "ceil", numeric::ceil),
    (0x0022, "floor", numeric::floor),
    (0x0023, "round", numeric::round),
    (0x0024, "min", numeric::min),
    (0x0025, "max", numeric::max),
    (0x0026, "clamp", numeric::clamp),
    (0x0030, "sort", list::sort),
    (0x0031, "sort-by", list::sort_by),
    (0x0032, "reverse", list::reverse),
    (0x0033, "unique", list::unique),
    (0x0034, "flatten", list::flatten),
    (0x0035, "zip", list::zip),
    (0x0036, "range", list::range),
    (0x0037, "slice", list::slice),
    (0x0040, "keys", record::keys),
    (0x0041, "values", record::values),
    (0x0042, "merge", record::merge),
    (0x0043, "pick", record::pick),
    (0x0044, "omit", record::omit),
    (0x0050, "parse-date", datetime::parse_date),
    (0x0051, "format-date", datetime::format_date),
    (0x0052, "date-diff", datetime::date_diff),
    (0x0053, "date-add", datetime::date_add),
    (0x0054, "now", datetime::now),
    (0x0060, "base64-encode", encoding::base64_encode),
    (0x0061, "base64-decode", encoding::base64_decode),
    (0x0062, "url-encode", encoding::url_encode),
    (0x0063, "url-decode", encoding::url_decode),
    (0x0064, "json-encode", encoding::json_encode),
    (0x0065, "json-parse", encoding::json_parse),
    (0x0070, "sha256", crypto::sha256),
    (0x0071, "hmac-sha256", crypto::hmac_sha256),
    (0x0072, "uuid", crypto::uuid),
    (0x0074, "to-string", convert::to_string),
    (0x0075, "to-float", convert::to_float),
    (0x0076, "to-integer", convert::to_integer),
    (0x0078, "fold", convert::fold),
];

fn lookup(id: u16) -> Option<&'static (u16, &'static str, Builtin)> {
    FUNCTIONS.iter().find(|(fid, _, _)| *fid == id)
}

/// The standard function table
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardLibrary;

impl StandardLibrary {
    pub fn new() -> Self {
        Self
    }

    /// Name of the function registered under `id`
    pub fn function_name(id: u16) -> Option<&'static str> {
        lookup(id).map(|(_, name, _)| *name)
    }
}

impl FunctionTable for StandardLibrary {
    fn call(&self, id: u16, args: &Record, ctx: &InvocationContext) -> Result<Value> {
        let (_, name, function) = lookup(id).ok_or(HelunaError::UnknownFunction(id))?;
        tracing::trace!(function = name, "Standard function call");
        function(&Args::new(args, ctx))
    }

    fn provides(&self, id: u16) -> bool {
        lookup(id).is_some()
    }
}

/// Execute a packet with the standard library and default settings
pub fn execute(packet: &Packet, input: &Record, timestamp: &str) -> Result<Record> {
    HelunaVm::new().execute(packet, input, timestamp, &StandardLibrary)
}

/// JSON-in, JSON-out form of [`execute`]
pub fn execute_json(packet: &Packet, input_json: &str, timestamp: &str) -> Result<String> {
    HelunaVm::new().execute_json(packet, input_json, timestamp, &StandardLibrary)
}

/// Run a packet's embedded fixtures against the standard library
pub fn run_fixtures(packet: &Packet) -> Vec<FixtureOutcome> {
    HelunaVm::new().run_fixtures(packet, &StandardLibrary)
}
