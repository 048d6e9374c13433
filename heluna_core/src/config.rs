//! VM configuration
//!
//! ```yaml
//! max_instructions: 1000000
//! max_iteration_depth: 32
//! default_timestamp: "2024-01-01T00:00:00Z"
//! enforce_policy: true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::executor::ExecutionLimits;

pub const DEFAULT_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

/// Runtime settings for [`crate::HelunaVm`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Instruction budget per invocation, unbounded when absent
    pub max_instructions: Option<u64>,

    /// Cap on simultaneously open iteration frames
    pub max_iteration_depth: Option<usize>,

    /// Timestamp used when running embedded fixtures
    pub default_timestamp: String,

    /// Reject outputs that break forbid-tagged rules; when off they are
    /// only logged
    pub enforce_policy: bool,
}

impl VmConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            max_instructions: self.max_instructions,
            max_iteration_depth: self.max_iteration_depth,
        }
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_instructions: None,
            max_iteration_depth: None,
            default_timestamp: DEFAULT_TIMESTAMP.to_string(),
            enforce_policy: true,
        }
    }
}
