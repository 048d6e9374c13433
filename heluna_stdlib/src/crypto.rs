//! Hashing and identifiers (0x0070 - 0x0072)

use heluna_core::{HelunaError, Result, Value};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::args::Args;

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex SHA-256 of the UTF-8 bytes of `value`
pub fn sha256(args: &Args<'_>) -> Result<Value> {
    let digest = Sha256::digest(args.str("value").as_bytes());
    Ok(Value::String(hex::encode(digest)))
}

pub fn hmac_sha256(args: &Args<'_>) -> Result<Value> {
    let mut mac = HmacSha256::new_from_slice(args.str("key").as_bytes())
        .map_err(|e| HelunaError::Domain(format!("hmac-sha256: {e}")))?;
    mac.update(args.str("value").as_bytes());
    Ok(Value::String(hex::encode(mac.finalize().into_bytes())))
}

/// Random version 4 UUID. This is the only non-deterministic function.
pub fn uuid(_args: &Args<'_>) -> Result<Value> {
    Ok(Value::String(Uuid::new_v4().to_string()))
}
