//! Interface to the standard-function table

use crate::error::{HelunaError, Result};
use crate::value::{Record, Value};

/// Reserved id: returns the `value` argument unchanged
pub const PASSTHROUGH_FUNCTION: u16 = 0;

/// Per-invocation state visible to standard functions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    /// Fixed "current time" for the whole invocation
    pub timestamp: String,
}

impl InvocationContext {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
        }
    }
}

/// Numbered functions callable from bytecode
///
/// Implementations must not keep invocation state of their own; anything
/// that varies per call travels in the [`InvocationContext`].
pub trait FunctionTable {
    /// Invoke function `id` with a record of named arguments
    fn call(&self, id: u16, args: &Record, ctx: &InvocationContext) -> Result<Value>;

    /// Whether `id` resolves in this table
    fn provides(&self, id: u16) -> bool;
}

/// Table with no functions; only the pass-through id resolves
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFunctions;

impl FunctionTable for NoFunctions {
    fn call(&self, id: u16, _args: &Record, _ctx: &InvocationContext) -> Result<Value> {
        Err(HelunaError::UnknownFunction(id))
    }

    fn provides(&self, _id: u16) -> bool {
        false
    }
}
