//! Entry points for loading and running packets

use std::path::Path;
use std::time::Instant;

use crate::config::VmConfig;
use crate::contracts::ContractValidator;
use crate::error::{HelunaError, Result};
use crate::executor::Executor;
use crate::functions::{FunctionTable, InvocationContext, PASSTHROUGH_FUNCTION};
use crate::json;
use crate::loader::PacketLoader;
use crate::packet::{Packet, TestFixture};
use crate::value::{Record, Value};

/// Result of running one embedded fixture
#[derive(Debug, Clone)]
pub struct FixtureOutcome {
    /// Fixture name
    pub name: String,
    /// Whether the output matched the expectation
    pub passed: bool,
    /// Output JSON when execution succeeded
    pub actual: Option<String>,
    /// Error message when execution failed
    pub error: Option<String>,
    /// Execution duration in milliseconds
    pub duration_ms: f64,
}

/// Loads packets and runs them against input records
#[derive(Debug, Default)]
pub struct HelunaVm {
    config: VmConfig,
    loader: PacketLoader,
}

impl HelunaVm {
    /// Create a VM with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            config,
            loader: PacketLoader::new(),
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Decode a packet from bytes
    pub fn load(&self, bytes: &[u8]) -> Result<Packet> {
        self.loader.load_bytes(bytes)
    }

    /// Decode a packet from a file
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<Packet> {
        self.loader.load_file(path)
    }

    /// Run a packet against one input record.
    ///
    /// `timestamp` is what date functions see as the current time for this
    /// invocation. The returned record has already passed the contract's
    /// rules.
    pub fn execute(
        &self,
        packet: &Packet,
        input: &Record,
        timestamp: &str,
        functions: &dyn FunctionTable,
    ) -> Result<Record> {
        let start = Instant::now();
        let contract = &packet.contract.name;
        tracing::debug!(%contract, %timestamp, "Executing packet");

        let context = InvocationContext::new(timestamp);
        let mut exec =
            Executor::new(packet, functions, &context).with_limits(self.config.limits());
        exec.load_inputs(input)?;
        exec.run()?;

        let validator = if self.config.enforce_policy {
            ContractValidator::new()
        } else {
            ContractValidator::permissive()
        };
        let output = validator.collect_output(packet, &exec);
        validator.validate(packet, &output)?;

        tracing::debug!(
            %contract,
            instructions = exec.instructions_executed(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Execution finished"
        );
        Ok(output.record)
    }

    /// Run a packet on a JSON object and return the output as JSON
    pub fn execute_json(
        &self,
        packet: &Packet,
        input_json: &str,
        timestamp: &str,
        functions: &dyn FunctionTable,
    ) -> Result<String> {
        let input = json::parse_record(input_json)?;
        let output = self.execute(packet, &input, timestamp, functions)?;
        json::to_string(&Value::Record(output))
    }

    /// Run every fixture embedded in the packet at the configured default
    /// timestamp
    pub fn run_fixtures(
        &self,
        packet: &Packet,
        functions: &dyn FunctionTable,
    ) -> Vec<FixtureOutcome> {
        packet
            .fixtures
            .iter()
            .map(|fixture| self.run_fixture(packet, fixture, functions))
            .collect()
    }

    fn run_fixture(
        &self,
        packet: &Packet,
        fixture: &TestFixture,
        functions: &dyn FunctionTable,
    ) -> FixtureOutcome {
        let start = Instant::now();
        let result = json::parse(&fixture.output_json).and_then(|expected| {
            let actual = self.execute_json(
                packet,
                &fixture.input_json,
                &self.config.default_timestamp,
                functions,
            )?;
            let passed = json::parse(&actual)? == expected;
            Ok((actual, passed))
        });
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok((actual, passed)) => {
                if !passed {
                    tracing::warn!(
                        "Fixture {} failed: expected {}, got {}",
                        fixture.name,
                        fixture.output_json,
                        actual
                    );
                }
                FixtureOutcome {
                    name: fixture.name.clone(),
                    passed,
                    actual: Some(actual),
                    error: None,
                    duration_ms,
                }
            }
            Err(e) => {
                tracing::warn!("Fixture {} errored: {}", fixture.name, e);
                FixtureOutcome {
                    name: fixture.name.clone(),
                    passed: false,
                    actual: None,
                    error: Some(e.to_string()),
                    duration_ms,
                }
            }
        }
    }

    /// Ensure the function table provides every id the packet depends on
    pub fn check_dependencies(&self, packet: &Packet, functions: &dyn FunctionTable) -> Result<()> {
        match packet
            .stdlib_deps
            .iter()
            .find(|&&id| id != PASSTHROUGH_FUNCTION && !functions.provides(id))
        {
            Some(&missing) => Err(HelunaError::UnknownFunction(missing)),
            None => Ok(()),
        }
    }
}
