//! Output assembly and contract validation

use crate::error::{HelunaError, Result};
use crate::executor::Executor;
use crate::packet::{Packet, Rule};
use crate::value::{Record, Value};

/// Output record together with the tags it leaves the program with
#[derive(Debug, Clone)]
pub struct CollectedOutput {
    pub record: Record,
    pub tags: u64,
}

/// Contract validator
pub struct ContractValidator {
    /// Fail on violations instead of logging them
    strict: bool,
}

impl ContractValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self { strict: true }
    }

    /// Create a permissive validator that only logs violations
    pub fn permissive() -> Self {
        Self { strict: false }
    }

    /// Build the output record from the scratchpad after execution.
    ///
    /// The register after all declared fields normally holds the finished
    /// record. Otherwise the record is assembled from the declared output
    /// registers. Either way the output carries the tags of that slot
    /// register, which is what forbid-tagged rules are checked against.
    pub fn collect_output(&self, packet: &Packet, exec: &Executor<'_>) -> CollectedOutput {
        let slot = packet.output_register();
        let tags = exec.tags(slot);
        if let Some(Value::Record(record)) = exec.register(slot) {
            return CollectedOutput {
                record: record.clone(),
                tags,
            };
        }

        let record = Record::new();
        for field in &packet.contract.outputs {
            let reg = usize::from(field.register);
            record.set(
                field.name.clone(),
                exec.register(reg).cloned().unwrap_or_default(),
            );
        }
        CollectedOutput { record, tags }
    }

    /// Check the collected output against the contract's rules
    pub fn validate(&self, packet: &Packet, output: &CollectedOutput) -> Result<()> {
        for rule in &packet.contract.rules {
            match rule {
                Rule::ForbidTagged { tag_bits, .. } => {
                    let offending = output.tags & tag_bits;
                    if offending != 0 {
                        let message = describe_violation(packet, offending);
                        if self.strict {
                            return Err(HelunaError::Policy(message));
                        }
                        tracing::warn!("Policy violation ignored: {}", message);
                    }
                }
                // compiled into the bytecode
                Rule::ForbidField { .. } | Rule::Require { .. } | Rule::Match { .. } => {}
            }
        }
        Ok(())
    }
}

impl Default for ContractValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_violation(packet: &Packet, bits: u64) -> String {
    let mut message = format!("output contains forbidden tags: 0x{bits:x}");
    let names = packet.tag_names(bits);
    if !names.is_empty() {
        message.push_str(&format!(" ({})", names.join(", ")));
    }
    let sanitizers: Vec<&str> = packet
        .sanitizers_for(bits)
        .map(|s| s.name.as_str())
        .collect();
    if !sanitizers.is_empty() {
        message.push_str(&format!("; sanitize with: {}", sanitizers.join(", ")));
    }
    message
}
