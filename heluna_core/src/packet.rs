//! Type definitions for loaded packets
//!
//! A packet is immutable once the loader returns it and may be shared
//! between any number of concurrent invocations.

use serde::{Deserialize, Serialize};

use crate::value::{Value, ValueType};

/// Magic number at the start of every packet ("HLNA")
pub const PACKET_MAGIC: u32 = 0x484C_4E41;

/// Format version written by current compilers
pub const FORMAT_VERSION: u16 = 1;

/// A complete loaded packet
#[derive(Debug, Clone, Default)]
pub struct Packet {
    /// Header fields, informational only
    pub header: PacketHeader,

    /// Declared field layout, tags, sanitizers and rules
    pub contract: Contract,

    /// Constant pool, indexed by LOAD_CONST and friends
    pub constants: Vec<Constant>,

    /// Standard-function ids the bytecode calls
    pub stdlib_deps: Vec<u16>,

    /// Flat instruction stream
    pub instructions: Vec<Instruction>,

    /// Embedded regression fixtures
    pub fixtures: Vec<TestFixture>,
}

impl Packet {
    /// Register holding the assembled output record by convention
    pub fn output_register(&self) -> usize {
        self.contract.inputs.len() + self.contract.outputs.len()
    }

    /// Names of the declared tags whose bits are set in `bits`
    pub fn tag_names(&self, bits: u64) -> Vec<&str> {
        self.contract
            .tags
            .iter()
            .filter(|tag| tag.bit_index < 64 && bits & (1u64 << tag.bit_index) != 0)
            .map(|tag| tag.name.as_str())
            .collect()
    }

    /// Sanitizers declared as stripping any of `bits`
    pub fn sanitizers_for(&self, bits: u64) -> impl Iterator<Item = &SanitizerDef> {
        self.contract
            .sanitizers
            .iter()
            .filter(move |s| s.strips_tags & bits != 0)
    }
}

/// Fixed header values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PacketHeader {
    pub format_version: u16,
    pub min_spec_version: u16,
    pub total_size: u32,
    pub section_count: u16,
}

/// Contract metadata
#[derive(Debug, Clone, Default, Serialize)]
pub struct Contract {
    pub name: String,
    pub scratchpad_size: u16,
    pub inputs: Vec<FieldDef>,
    pub outputs: Vec<FieldDef>,
    pub tags: Vec<TagDef>,
    pub sanitizers: Vec<SanitizerDef>,
    pub rules: Vec<Rule>,
}

/// Sensitivity tag declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagDef {
    pub bit_index: u8,
    pub name: String,
    pub description: String,
}

/// Input or output field declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: ValueType,
    /// Tags attached to the field's value on entry
    pub tag_bits: u64,
    /// Scratchpad register bound to this field
    pub register: u16,
}

/// Sanitizer declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanitizerDef {
    pub name: String,
    /// Backing standard function, 0 for a pass-through
    pub function_id: u16,
    pub strips_tags: u64,
}

/// Validation rule
///
/// Only `ForbidTagged` is checked after execution; the others are enforced
/// by bytecode the compiler emits and are kept as metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    ForbidField { scope: u8, field_index: u16 },
    ForbidTagged { tag_bits: u64, scope: u8 },
    Require { field: String, message: String },
    Match { field: String, message: String },
}

impl Rule {
    pub const FORBID_FIELD: u8 = 0x01;
    pub const FORBID_TAGGED: u8 = 0x02;
    pub const REQUIRE: u8 = 0x03;
    pub const MATCH: u8 = 0x04;
}

/// Constant pool entry
///
/// The pool only ever holds scalars, so it is kept apart from [`Value`]
/// and stays thread-safe.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Nothing,
}

impl Constant {
    pub fn to_value(&self) -> Value {
        match self {
            Constant::String(s) => Value::String(s.clone()),
            Constant::Integer(i) => Value::Integer(*i),
            Constant::Float(f) => Value::Float(*f),
            Constant::Boolean(b) => Value::Boolean(*b),
            Constant::Nothing => Value::Nothing,
        }
    }
}

/// Fixed-width instruction record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u8,
    pub flags: u8,
    pub dest: u16,
    pub op1: u16,
    pub op2: u16,
}

impl Instruction {
    pub fn new(opcode: u8, flags: u8, dest: u16, op1: u16, op2: u16) -> Self {
        Self {
            opcode,
            flags,
            dest,
            op1,
            op2,
        }
    }

    /// Tag propagation mode, flags bits 3-4
    pub fn tag_mode(&self) -> TagMode {
        match (self.flags >> 3) & 0x03 {
            0 => TagMode::Propagate,
            1 => TagMode::Clear,
            _ => TagMode::Set,
        }
    }

    /// Iteration mode, flags bits 0-1
    pub fn iter_mode(&self) -> IterMode {
        match self.flags & 0x03 {
            0 => IterMode::Map,
            1 => IterMode::Filter,
            2 => IterMode::Fold,
            _ => IterMode::MapFilter,
        }
    }
}

/// How an instruction updates its destination's tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMode {
    /// OR of the source operands' tags
    Propagate,
    /// Always zero
    Clear,
    /// Left as the opcode body wrote them
    Set,
}

impl TagMode {
    /// Flag bits selecting this mode
    pub fn flags(self) -> u8 {
        match self {
            TagMode::Propagate => 0,
            TagMode::Clear => 1 << 3,
            TagMode::Set => 2 << 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterMode {
    Map = 0,
    Filter = 1,
    Fold = 2,
    MapFilter = 3,
}

/// Embedded regression fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFixture {
    pub name: String,
    pub input_json: String,
    pub output_json: String,
}
