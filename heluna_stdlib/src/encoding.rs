//! Encoding functions (0x0060 - 0x0065)

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use heluna_core::{json, HelunaError, Result, Value};
use url::form_urlencoded;

use crate::args::Args;

pub fn base64_encode(args: &Args<'_>) -> Result<Value> {
    Ok(Value::String(STANDARD.encode(args.str("value"))))
}

/// Decoded bytes are read as UTF-8, replacing invalid sequences
pub fn base64_decode(args: &Args<'_>) -> Result<Value> {
    let bytes = STANDARD
        .decode(args.str("value"))
        .map_err(|e| HelunaError::Domain(format!("base64-decode: {e}")))?;
    Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Form encoding with spaces as `%20`
pub fn url_encode(args: &Args<'_>) -> Result<Value> {
    let value = args.str("value");
    let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    Ok(Value::String(encoded.replace('+', "%20")))
}

/// Decode `%XX` escapes and `+` as space
pub fn url_decode(args: &Args<'_>) -> Result<Value> {
    // keep separators literal; the form parser would split on them
    let escaped = args.str("value").replace('&', "%26").replace('=', "%3D");
    let decoded = form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default();
    Ok(Value::String(decoded))
}

pub fn json_encode(args: &Args<'_>) -> Result<Value> {
    Ok(Value::String(json::to_string(&args.value("value"))?))
}

/// Parse JSON text; blank input gives nothing
pub fn json_parse(args: &Args<'_>) -> Result<Value> {
    let text = args.str("value");
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Nothing);
    }
    json::parse(text).map_err(|e| HelunaError::Domain(format!("json-parse: {e}")))
}
