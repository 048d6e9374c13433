//! Heluna Core
//!
//! Virtual machine for sandboxed Heluna packets: compiled programs that
//! turn a JSON-like input record into an output record while tracking
//! sensitivity tags through every register. The standard-function bodies
//! live elsewhere and plug in through [`FunctionTable`].

pub mod config;
pub mod contracts;
pub mod error;
pub mod executor;
pub mod functions;
pub mod json;
pub mod loader;
pub mod opcode;
pub mod packet;
pub mod value;
pub mod vm;

pub use config::VmConfig;
pub use contracts::{CollectedOutput, ContractValidator};
pub use error::{HelunaError, Result};
pub use executor::{ExecutionLimits, Executor};
pub use functions::{FunctionTable, InvocationContext, NoFunctions};
pub use loader::PacketLoader;
pub use opcode::Opcode;
pub use packet::{Contract, Instruction, Packet, TagMode, TestFixture};
pub use value::{List, Record, Value, ValueType};
pub use vm::{FixtureOutcome, HelunaVm};
