//! Error types for Heluna Core

use thiserror::Error;

/// Result type for Heluna operations
pub type Result<T> = std::result::Result<T, HelunaError>;

/// Errors that can occur while loading or executing a packet.
///
/// Every variant is fatal to the invocation that raised it.
#[derive(Error, Debug)]
pub enum HelunaError {
    /// Malformed packet bytes, raised before any execution
    #[error("Format error: {0}")]
    Format(String),

    /// Operand variant mismatch
    #[error("Type error: {0}")]
    Type(String),

    /// Division by zero, bad numeric string, unresolvable date and similar
    #[error("Domain error: {0}")]
    Domain(String),

    /// Malformed bytecode: unknown opcode, bad register, broken iteration layout
    #[error("Program error: {0}")]
    Program(String),

    /// Standard-function id not present in the function table
    #[error("Program error: unknown function 0x{0:04X}")]
    UnknownFunction(u16),

    /// Output carries data the contract forbids
    #[error("Policy violation: {0}")]
    Policy(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl HelunaError {
    /// True for errors raised while decoding packet bytes.
    pub fn is_format_error(&self) -> bool {
        matches!(self, HelunaError::Format(_))
    }

    /// True when execution completed but the output was rejected.
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, HelunaError::Policy(_))
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        HelunaError::Format(msg.into())
    }

    pub(crate) fn program(msg: impl Into<String>) -> Self {
        HelunaError::Program(msg.into())
    }
}
