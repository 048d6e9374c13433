//! Binary packet loader
//!
//! All integers are little-endian and every variable-length field carries
//! its length up front. Any read past the end of a section is a format
//! error rather than a panic.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{HelunaError, Result};
use crate::packet::{
    Constant, Contract, FieldDef, Instruction, Packet, PacketHeader, Rule, SanitizerDef, TagDef,
    TestFixture, PACKET_MAGIC,
};
use crate::value::ValueType;

pub const HEADER_SIZE: usize = 88;
pub const SECTION_ENTRY_SIZE: usize = 10;
pub const INSTRUCTION_SIZE: usize = 8;

pub const SECTION_CONTRACT: u16 = 0x0001;
pub const SECTION_CONSTANTS: u16 = 0x0002;
pub const SECTION_STDLIB_DEPS: u16 = 0x0003;
pub const SECTION_BYTECODE: u16 = 0x0004;
pub const SECTION_TESTS: u16 = 0x0101;

const REQUIRED_SECTIONS: [u16; 4] = [
    SECTION_CONTRACT,
    SECTION_CONSTANTS,
    SECTION_STDLIB_DEPS,
    SECTION_BYTECODE,
];

/// Nesting limit for maybe/list/record type descriptors
const MAX_TYPE_DEPTH: usize = 64;

/// Loads compiled packets
#[derive(Debug, Default)]
pub struct PacketLoader;

impl PacketLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self
    }

    /// Load a packet from a file
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<Packet> {
        let bytes = std::fs::read(path)?;
        self.load_bytes(&bytes)
    }

    /// Load a packet from raw bytes
    pub fn load_bytes(&self, data: &[u8]) -> Result<Packet> {
        if data.len() < HEADER_SIZE {
            return Err(HelunaError::format(format!(
                "packet too small: {} bytes",
                data.len()
            )));
        }

        let mut header = Cursor::new(data, 0, HEADER_SIZE, "header")?;
        let magic = header.u32()?;
        if magic != PACKET_MAGIC {
            return Err(HelunaError::format(format!(
                "bad magic: 0x{magic:08X} (expected 0x{PACKET_MAGIC:08X})"
            )));
        }
        let header = PacketHeader {
            format_version: header.u16()?,
            min_spec_version: header.u16()?,
            total_size: header.u32()?,
            section_count: header.u16()?,
        };

        let sections = self.read_directory(data, header.section_count)?;
        for required in REQUIRED_SECTIONS {
            if !sections.contains_key(&required) {
                return Err(HelunaError::format(format!(
                    "missing required section 0x{required:04X}"
                )));
            }
        }
        let section = |kind: u16, name: &'static str| -> Result<Option<Cursor<'_>>> {
            sections
                .get(&kind)
                .map(|&(offset, len)| Cursor::new(data, offset, len, name))
                .transpose()
        };
        let required = |kind: u16, name: &'static str| -> Result<Cursor<'_>> {
            section(kind, name)?
                .ok_or_else(|| HelunaError::format(format!("missing section {name}")))
        };

        let packet = Packet {
            header,
            contract: parse_contract(&mut required(SECTION_CONTRACT, "contract")?)?,
            constants: parse_constants(&mut required(SECTION_CONSTANTS, "constants")?)?,
            stdlib_deps: parse_stdlib_deps(&mut required(SECTION_STDLIB_DEPS, "stdlib deps")?)?,
            instructions: parse_bytecode(&mut required(SECTION_BYTECODE, "bytecode")?)?,
            fixtures: match section(SECTION_TESTS, "tests")? {
                Some(mut cursor) => parse_tests(&mut cursor)?,
                None => Vec::new(),
            },
        };

        self.validate(&packet);
        Ok(packet)
    }

    /// Section directory: type -> (offset, length)
    fn read_directory(&self, data: &[u8], count: u16) -> Result<BTreeMap<u16, (usize, usize)>> {
        let len = usize::from(count) * SECTION_ENTRY_SIZE;
        let mut dir = Cursor::new(data, HEADER_SIZE, len, "section directory")?;
        let mut sections = BTreeMap::new();
        for _ in 0..count {
            let kind = dir.u16()?;
            let offset = dir.u32()? as usize;
            let length = dir.u32()? as usize;
            sections.insert(kind, (offset, length));
        }
        Ok(sections)
    }

    /// Warn about packets that load but look suspicious
    fn validate(&self, packet: &Packet) {
        let contract = &packet.contract;
        let size = usize::from(contract.scratchpad_size);
        for field in contract.inputs.iter().chain(&contract.outputs) {
            if usize::from(field.register) >= size {
                tracing::warn!(
                    "Field {} bound to register {} outside scratchpad of {}",
                    field.name,
                    field.register,
                    size
                );
            }
        }
        if packet.instructions.is_empty() {
            tracing::warn!("Packet {} has no instructions", contract.name);
        }
        tracing::debug!(
            contract = %contract.name,
            inputs = contract.inputs.len(),
            outputs = contract.outputs.len(),
            constants = packet.constants.len(),
            instructions = packet.instructions.len(),
            fixtures = packet.fixtures.len(),
            "Loaded packet"
        );
    }
}

fn parse_contract(cur: &mut Cursor<'_>) -> Result<Contract> {
    let name = cur.str16()?;
    let scratchpad_size = cur.u16()?;
    let input_count = cur.u16()?;
    let output_count = cur.u16()?;
    let tag_count = cur.u16()?;
    let sanitizer_count = cur.u16()?;
    let rule_count = cur.u16()?;

    let mut tags = Vec::with_capacity(usize::from(tag_count));
    for _ in 0..tag_count {
        tags.push(TagDef {
            bit_index: cur.u8()?,
            name: cur.str16()?,
            description: cur.str16()?,
        });
    }

    let inputs = (0..input_count)
        .map(|_| parse_field(cur))
        .collect::<Result<Vec<_>>>()?;
    let outputs = (0..output_count)
        .map(|_| parse_field(cur))
        .collect::<Result<Vec<_>>>()?;

    let mut sanitizers = Vec::with_capacity(usize::from(sanitizer_count));
    for _ in 0..sanitizer_count {
        sanitizers.push(SanitizerDef {
            name: cur.str16()?,
            function_id: cur.u16()?,
            strips_tags: cur.u64()?,
        });
    }

    let rules = (0..rule_count)
        .map(|_| parse_rule(cur))
        .collect::<Result<Vec<_>>>()?;

    Ok(Contract {
        name,
        scratchpad_size,
        inputs,
        outputs,
        tags,
        sanitizers,
        rules,
    })
}

fn parse_field(cur: &mut Cursor<'_>) -> Result<FieldDef> {
    let name = cur.str16()?;
    let type_id = cur.u8()?;
    skip_type_detail(cur, type_id, 0)?;
    Ok(FieldDef {
        name,
        field_type: ValueType::from_id(type_id),
        tag_bits: cur.u64()?,
        register: cur.u16()?,
    })
}

/// Step over the detail block of a type descriptor without interpreting it
fn skip_type_detail(cur: &mut Cursor<'_>, type_id: u8, depth: usize) -> Result<()> {
    if depth > MAX_TYPE_DEPTH {
        return Err(HelunaError::format("type descriptor nested too deeply"));
    }
    match ValueType::from_id(type_id) {
        ValueType::Maybe | ValueType::List => {
            let inner = cur.u8()?;
            skip_type_detail(cur, inner, depth + 1)
        }
        ValueType::Record => {
            let field_count = cur.u16()?;
            for _ in 0..field_count {
                let name_len = cur.u16()?;
                cur.skip(usize::from(name_len))?;
                let field_type = cur.u8()?;
                skip_type_detail(cur, field_type, depth + 1)?;
                // tag bits + register
                cur.skip(8 + 2)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn parse_rule(cur: &mut Cursor<'_>) -> Result<Rule> {
    match cur.u8()? {
        Rule::FORBID_TAGGED => Ok(Rule::ForbidTagged {
            tag_bits: cur.u64()?,
            scope: cur.u8()?,
        }),
        Rule::FORBID_FIELD => Ok(Rule::ForbidField {
            scope: cur.u8()?,
            field_index: cur.u16()?,
        }),
        Rule::REQUIRE => Ok(Rule::Require {
            field: cur.str16()?,
            message: cur.str16()?,
        }),
        Rule::MATCH => Ok(Rule::Match {
            field: cur.str16()?,
            message: cur.str16()?,
        }),
        other => Err(HelunaError::format(format!("unknown rule type: {other}"))),
    }
}

fn parse_constants(cur: &mut Cursor<'_>) -> Result<Vec<Constant>> {
    let mut constants = Vec::new();
    while !cur.at_end() {
        let type_id = cur.u8()?;
        let len = cur.u32()? as usize;
        let mut payload = cur.sub(len)?;
        let constant = match ValueType::from_id(type_id) {
            ValueType::String => Constant::String(payload.string(len)?),
            ValueType::Integer => Constant::Integer(payload.u64()? as i64),
            ValueType::Float => Constant::Float(f64::from_bits(payload.u64()?)),
            ValueType::Boolean => Constant::Boolean(payload.u8()? != 0),
            ValueType::Nothing => Constant::Nothing,
            _ => {
                return Err(HelunaError::format(format!(
                    "unknown constant type: {type_id}"
                )))
            }
        };
        constants.push(constant);
    }
    Ok(constants)
}

fn parse_stdlib_deps(cur: &mut Cursor<'_>) -> Result<Vec<u16>> {
    let count = cur.u16()?;
    (0..count).map(|_| cur.u16()).collect()
}

fn parse_bytecode(cur: &mut Cursor<'_>) -> Result<Vec<Instruction>> {
    let count = cur.remaining() / INSTRUCTION_SIZE;
    let mut instructions = Vec::with_capacity(count);
    for _ in 0..count {
        instructions.push(Instruction {
            opcode: cur.u8()?,
            flags: cur.u8()?,
            dest: cur.u16()?,
            op1: cur.u16()?,
            op2: cur.u16()?,
        });
    }
    Ok(instructions)
}

fn parse_tests(cur: &mut Cursor<'_>) -> Result<Vec<TestFixture>> {
    let count = cur.u16()?;
    let mut fixtures = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        fixtures.push(TestFixture {
            name: cur.str16()?,
            input_json: cur.str32()?,
            output_json: cur.str32()?,
        });
    }
    Ok(fixtures)
}

/// Bounds-checked little-endian reader over one section
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
    section: &'static str,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], offset: usize, len: usize, section: &'static str) -> Result<Self> {
        match offset.checked_add(len) {
            Some(end) if end <= data.len() => Ok(Self {
                data,
                pos: offset,
                end,
                section,
            }),
            _ => Err(HelunaError::format(format!(
                "{section} section ({len} bytes at offset {offset}) exceeds packet of {} bytes",
                data.len()
            ))),
        }
    }

    fn remaining(&self) -> usize {
        self.end - self.pos
    }

    fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(HelunaError::format(format!(
                "{} section truncated: need {n} bytes at offset {}, {} left",
                self.section,
                self.pos,
                self.remaining()
            )));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Split off the next `n` bytes as their own cursor
    fn sub(&mut self, n: usize) -> Result<Cursor<'a>> {
        let start = self.pos;
        self.take(n)?;
        Cursor::new(self.data, start, n, self.section)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn string(&mut self, len: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    fn str16(&mut self) -> Result<String> {
        let len = self.u16()?;
        self.string(usize::from(len))
    }

    fn str32(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        self.string(len)
    }
}
