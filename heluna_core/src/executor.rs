//! Register-machine interpreter for packet bytecode
//!
//! Each register holds a value and a 64-bit tag set. Iteration runs on an
//! explicit frame stack, so nesting depth never grows the native call stack.

use crate::error::{HelunaError, Result};
use crate::functions::{FunctionTable, InvocationContext, PASSTHROUGH_FUNCTION};
use crate::opcode::Opcode;
use crate::packet::{Constant, Instruction, IterMode, Packet, TagMode};
use crate::value::{List, Record, Value};

/// Caller-side guards against runaway bytecode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Abort after this many dispatched instructions
    pub max_instructions: Option<u64>,
    /// Maximum number of simultaneously open iteration frames
    pub max_iteration_depth: Option<usize>,
}

/// State of one open ITER_SETUP .. ITER_COLLECT loop
#[derive(Debug)]
struct IterFrame {
    mode: IterMode,
    element_reg: usize,
    body_start: usize,
    collect_pc: usize,
    result_reg: usize,
    slot_a: usize,
    slot_b: usize,
    source_tags: u64,
    /// Snapshot of the source list taken at setup
    items: Vec<Value>,
    cursor: usize,
    results: List,
}

/// Interpreter for a single invocation
///
/// The scratchpad lives and dies with the executor; the packet is only
/// ever read.
pub struct Executor<'a> {
    packet: &'a Packet,
    functions: &'a dyn FunctionTable,
    context: &'a InvocationContext,
    limits: ExecutionLimits,
    values: Vec<Value>,
    tags: Vec<u64>,
    frames: Vec<IterFrame>,
    executed: u64,
}

impl<'a> Executor<'a> {
    /// Create an executor with a zeroed scratchpad sized by the contract
    pub fn new(
        packet: &'a Packet,
        functions: &'a dyn FunctionTable,
        context: &'a InvocationContext,
    ) -> Self {
        let size = usize::from(packet.contract.scratchpad_size);
        Self {
            packet,
            functions,
            context,
            limits: ExecutionLimits::default(),
            values: vec![Value::Nothing; size],
            tags: vec![0; size],
            frames: Vec::new(),
            executed: 0,
        }
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Write every declared input field into its register with the
    /// field's fixed tags. Absent fields load as nothing.
    pub fn load_inputs(&mut self, input: &Record) -> Result<()> {
        let packet = self.packet;
        for field in &packet.contract.inputs {
            self.set_register(field.register, input.get(&field.name), field.tag_bits)?;
        }
        Ok(())
    }

    /// Overwrite a register's value and tags
    pub fn set_register(&mut self, reg: u16, value: Value, tags: u64) -> Result<()> {
        let slot = self.slot(reg)?;
        self.values[slot] = value;
        self.tags[slot] = tags;
        Ok(())
    }

    /// Current value of a register, `None` past the end of the scratchpad
    pub fn register(&self, reg: usize) -> Option<&Value> {
        self.values.get(reg)
    }

    /// Tags of a register; registers past the end carry none
    pub fn tags(&self, reg: usize) -> u64 {
        self.tags.get(reg).copied().unwrap_or(0)
    }

    /// Number of instructions dispatched so far
    pub fn instructions_executed(&self) -> u64 {
        self.executed
    }

    /// Run the instruction stream from the top until the program counter
    /// leaves it
    pub fn run(&mut self) -> Result<()> {
        let packet = self.packet;
        let code = &packet.instructions;
        let mut pc = 0;
        while let Some(&instr) = code.get(pc) {
            self.executed += 1;
            if let Some(max) = self.limits.max_instructions {
                if self.executed > max {
                    return Err(HelunaError::program("instruction budget exhausted"));
                }
            }
            pc = self.step(pc, instr)?;
        }
        if !self.frames.is_empty() {
            return Err(HelunaError::program(format!(
                "execution ended with {} open iteration frame(s)",
                self.frames.len()
            )));
        }
        Ok(())
    }

    /// Execute one instruction and return the next program counter
    fn step(&mut self, pc: usize, instr: Instruction) -> Result<usize> {
        let op = Opcode::from_byte(instr.opcode).ok_or_else(|| {
            HelunaError::program(format!(
                "unknown opcode 0x{:02X} at pc={pc}",
                instr.opcode
            ))
        })?;

        match op {
            Opcode::LoadConst => {
                let value = self.constant(instr.op1)?.to_value();
                self.store(instr, value, 0)?;
            }
            Opcode::LoadField => {
                let source = self
                    .packet
                    .contract
                    .inputs
                    .get(usize::from(instr.op1))
                    .map(|field| field.register)
                    .filter(|&reg| reg != instr.dest);
                if let Some(reg) = source {
                    let value = self.value(reg)?.clone();
                    let tags = self.tag(reg)?;
                    self.set_register(instr.dest, value, tags)?;
                }
            }
            Opcode::LoadNothing => self.store(instr, Value::Nothing, 0)?,
            Opcode::Copy => {
                let value = self.value(instr.op1)?.clone();
                let tags = self.tag(instr.op1)?;
                self.set_register(instr.dest, value, tags)?;
            }

            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                let value = arithmetic(op, self.value(instr.op1)?, self.value(instr.op2)?)?;
                let tags = self.tag(instr.op1)? | self.tag(instr.op2)?;
                self.store(instr, value, tags)?;
            }
            Opcode::Negate => {
                let value = match self.value(instr.op1)? {
                    Value::Integer(i) => Value::Integer(i.wrapping_neg()),
                    Value::Float(f) => Value::Float(-f),
                    other => {
                        return Err(HelunaError::Type(format!(
                            "NEGATE requires numeric, got {}",
                            other.type_name()
                        )))
                    }
                };
                let tags = self.tag(instr.op1)?;
                self.store(instr, value, tags)?;
            }

            Opcode::Eq | Opcode::Neq | Opcode::Lt | Opcode::Gt | Opcode::Lte | Opcode::Gte => {
                let result = self.compare(op, instr.op1, instr.op2)?;
                let tags = self.tag(instr.op1)? | self.tag(instr.op2)?;
                self.store(instr, Value::Boolean(result), tags)?;
            }

            Opcode::And | Opcode::Or => {
                let a = self.boolean(instr.op1)?;
                let b = self.boolean(instr.op2)?;
                let result = if op == Opcode::And { a && b } else { a || b };
                let tags = self.tag(instr.op1)? | self.tag(instr.op2)?;
                self.store(instr, Value::Boolean(result), tags)?;
            }
            Opcode::Not => {
                let result = !self.boolean(instr.op1)?;
                let tags = self.tag(instr.op1)?;
                self.store(instr, Value::Boolean(result), tags)?;
            }

            Opcode::StrConcat => {
                let text = format!("{}{}", self.value(instr.op1)?, self.value(instr.op2)?);
                let tags = self.tag(instr.op1)? | self.tag(instr.op2)?;
                self.store(instr, Value::String(text), tags)?;
            }

            Opcode::IsString
            | Opcode::IsInt
            | Opcode::IsFloat
            | Opcode::IsBool
            | Opcode::IsNothing
            | Opcode::IsList
            | Opcode::IsRecord => {
                let v = self.value(instr.op1)?;
                let result = match op {
                    Opcode::IsString => matches!(v, Value::String(_)),
                    Opcode::IsInt => matches!(v, Value::Integer(_)),
                    Opcode::IsFloat => matches!(v, Value::Float(_)),
                    Opcode::IsBool => matches!(v, Value::Boolean(_)),
                    Opcode::IsNothing => v.is_nothing(),
                    Opcode::IsList => matches!(v, Value::List(_)),
                    _ => matches!(v, Value::Record(_)),
                };
                let tags = self.tag(instr.op1)?;
                self.store(instr, Value::Boolean(result), tags)?;
            }
            Opcode::ToString | Opcode::ToInt | Opcode::ToFloat | Opcode::ToBool => {
                let v = self.value(instr.op1)?;
                let value = match op {
                    Opcode::ToString => Value::String(v.to_string()),
                    Opcode::ToInt => Value::Integer(v.to_integer()?),
                    Opcode::ToFloat => Value::Float(v.to_float()?),
                    _ => Value::Boolean(v.is_truthy()),
                };
                let tags = self.tag(instr.op1)?;
                self.store(instr, value, tags)?;
            }

            Opcode::RecordNew => self.store(instr, Value::Record(Record::new()), 0)?,
            Opcode::RecordSet => {
                let key = self.string(instr.op1)?.to_string();
                let value = self.value(instr.op2)?.clone();
                self.record(instr.dest)?.set(key, value);
                self.merge_tags(instr.dest, instr.op2)?;
            }
            Opcode::RecordGet | Opcode::RecordHas => {
                let record = self.record(instr.op1)?;
                let key = self.string(instr.op2)?;
                let value = if op == Opcode::RecordGet {
                    record.get(key)
                } else {
                    Value::Boolean(record.has(key))
                };
                let tags = self.tag(instr.op1)?;
                self.store(instr, value, tags)?;
            }

            Opcode::ListNew => self.store(instr, Value::List(List::new()), 0)?,
            Opcode::ListAppend => {
                let value = self.value(instr.op1)?.clone();
                self.list(instr.dest)?.push(value);
                self.merge_tags(instr.dest, instr.op1)?;
            }
            Opcode::ListGet => {
                let list = self.list(instr.op1)?;
                let value = match self.value(instr.op2)? {
                    Value::Integer(i) => list.get(*i),
                    other => {
                        return Err(HelunaError::Type(format!(
                            "LIST_GET index must be integer, got {}",
                            other.type_name()
                        )))
                    }
                };
                let tags = self.tag(instr.op1)?;
                self.store(instr, value, tags)?;
            }
            Opcode::ListLength => {
                let len = self.list(instr.op1)?.len() as i64;
                let tags = self.tag(instr.op1)?;
                self.store(instr, Value::Integer(len), tags)?;
            }

            Opcode::Jump => return self.jump(instr.dest),
            Opcode::JumpIf => {
                if self.boolean(instr.op1)? {
                    return self.jump(instr.dest);
                }
            }
            Opcode::JumpIfNot => {
                if !self.boolean(instr.op1)? {
                    return self.jump(instr.dest);
                }
            }
            Opcode::Coalesce => {
                let chosen = if self.value(instr.op1)?.is_nothing() {
                    instr.op2
                } else {
                    instr.op1
                };
                let value = self.value(chosen)?.clone();
                let tags = self.tag(chosen)?;
                self.store(instr, value, tags)?;
            }

            Opcode::IterSetup => return self.iter_setup(pc, instr),
            Opcode::IterCollect => return self.iter_collect(pc),

            Opcode::StdlibCall => {
                let args = self.record(instr.op2)?;
                let value = if instr.op1 == PASSTHROUGH_FUNCTION {
                    args.get("value")
                } else {
                    self.functions.call(instr.op1, &args, self.context)?
                };
                let tags = self.tag(instr.op2)?;
                self.store(instr, value, tags)?;
            }
            Opcode::StdlibCall1 => {
                let arg = self.value(instr.op2)?.clone();
                let value = if instr.op1 == PASSTHROUGH_FUNCTION {
                    arg
                } else {
                    let args = Record::new();
                    args.set("value", arg);
                    self.functions.call(instr.op1, &args, self.context)?
                };
                let tags = self.tag(instr.op2)?;
                self.store(instr, value, tags)?;
            }

            Opcode::TagSet => match self.constant(instr.op1)? {
                Constant::Integer(bits) => {
                    let slot = self.slot(instr.dest)?;
                    self.tags[slot] = *bits as u64;
                }
                other => {
                    tracing::warn!(pc, constant = ?other, "TAG_SET constant is not an integer, ignored");
                }
            },
            Opcode::TagCheck => {
                let mask = match self.constant(instr.op2)? {
                    Constant::Integer(bits) => *bits as u64,
                    _ => 0,
                };
                let result = self.tag(instr.op1)? & mask == mask;
                self.store(instr, Value::Boolean(result), 0)?;
            }

            Opcode::RecordGetC => {
                let record = self.record(instr.op1)?;
                let value = record.get(self.constant_key(instr.op2)?);
                let tags = self.tag(instr.op1)?;
                self.store(instr, value, tags)?;
            }
            Opcode::RecordSetC => {
                let key = self.constant_key(instr.op1)?.to_string();
                let value = self.value(instr.op2)?.clone();
                self.record(instr.dest)?.set(key, value);
                self.merge_tags(instr.dest, instr.op2)?;
            }
            Opcode::RecordNewSetC => {
                let record = Record::new();
                record.set(self.constant_key(instr.op1)?, self.value(instr.op2)?.clone());
                let tags = self.tag(instr.op2)?;
                self.store(instr, Value::Record(record), tags)?;
            }

            Opcode::CmpJumpEq
            | Opcode::CmpJumpNeq
            | Opcode::CmpJumpLt
            | Opcode::CmpJumpGt
            | Opcode::CmpJumpLte
            | Opcode::CmpJumpGte => {
                if !self.compare(op, instr.op1, instr.op2)? {
                    return self.jump(instr.dest);
                }
            }
            Opcode::IsNothingJump => {
                if self.value(instr.op1)?.is_nothing() {
                    return self.jump(instr.dest);
                }
            }
        }

        Ok(pc + 1)
    }

    fn iter_setup(&mut self, pc: usize, instr: Instruction) -> Result<usize> {
        let items = match self.value(instr.op1)? {
            Value::List(list) => list.to_vec(),
            other => {
                return Err(HelunaError::program(format!(
                    "ITER_SETUP source must be list, got {}",
                    other.type_name()
                )))
            }
        };
        let source_tags = self.tag(instr.op1)?;
        let body_start = pc + 1;
        let collect_pc = body_start + usize::from(instr.op2);
        let collect = self
            .packet
            .instructions
            .get(collect_pc)
            .copied()
            .filter(|c| c.opcode == Opcode::IterCollect.byte())
            .ok_or_else(|| {
                HelunaError::program(format!(
                    "ITER_SETUP at pc={pc} is not closed by ITER_COLLECT at pc={collect_pc}"
                ))
            })?;

        let mode = instr.iter_mode();
        let element_reg = self.slot(instr.dest)?;
        let result_reg = self.slot(collect.dest)?;
        let slot_a = self.slot(collect.op1)?;
        let slot_b = self.slot(collect.op2)?;

        let Some(first) = items.first().cloned() else {
            if mode == IterMode::Fold {
                self.values[result_reg] = self.values[slot_a].clone();
                self.tags[result_reg] = self.tags[slot_a];
            } else {
                self.values[result_reg] = Value::List(List::new());
                self.tags[result_reg] = source_tags;
            }
            return Ok(collect_pc + 1);
        };

        if let Some(max) = self.limits.max_iteration_depth {
            if self.frames.len() >= max {
                return Err(HelunaError::program(format!(
                    "iteration nested deeper than {max}"
                )));
            }
        }

        self.values[element_reg] = first;
        self.tags[element_reg] = source_tags;
        let results = List::with_capacity(items.len());
        self.frames.push(IterFrame {
            mode,
            element_reg,
            body_start,
            collect_pc,
            result_reg,
            slot_a,
            slot_b,
            source_tags,
            items,
            cursor: 0,
            results,
        });
        tracing::trace!(pc, ?mode, depth = self.frames.len(), "Iteration frame pushed");
        Ok(body_start)
    }

    fn iter_collect(&mut self, pc: usize) -> Result<usize> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| HelunaError::program(format!("ITER_COLLECT at pc={pc} without open iteration")))?;
        if frame.collect_pc != pc {
            return Err(HelunaError::program(format!(
                "ITER_COLLECT at pc={pc} does not close the iteration opened for pc={}",
                frame.collect_pc
            )));
        }

        match frame.mode {
            IterMode::Map => frame.results.push(self.values[frame.slot_a].clone()),
            IterMode::Filter | IterMode::MapFilter => {
                if let Value::Boolean(true) = self.values[frame.slot_a] {
                    frame.results.push(self.values[frame.slot_b].clone());
                }
            }
            // accumulator is updated in place by the body
            IterMode::Fold => {}
        }

        frame.cursor += 1;
        if let Some(item) = frame.items.get(frame.cursor) {
            self.values[frame.element_reg] = item.clone();
            self.tags[frame.element_reg] = frame.source_tags;
            return Ok(frame.body_start);
        }

        if let Some(frame) = self.frames.pop() {
            if frame.mode == IterMode::Fold {
                self.values[frame.result_reg] = self.values[frame.slot_a].clone();
                self.tags[frame.result_reg] = self.tags[frame.slot_a];
            } else {
                self.values[frame.result_reg] = Value::List(frame.results);
                self.tags[frame.result_reg] = frame.source_tags;
            }
            tracing::trace!(pc, depth = self.frames.len(), "Iteration frame popped");
        }
        Ok(pc + 1)
    }

    /// Write an instruction's result and apply its tag mode
    fn store(&mut self, instr: Instruction, value: Value, source_tags: u64) -> Result<()> {
        let dest = self.slot(instr.dest)?;
        self.values[dest] = value;
        match instr.tag_mode() {
            TagMode::Propagate => self.tags[dest] = source_tags,
            TagMode::Clear => self.tags[dest] = 0,
            TagMode::Set => {}
        }
        Ok(())
    }

    fn merge_tags(&mut self, dest: u16, source: u16) -> Result<()> {
        let bits = self.tag(source)?;
        let dest = self.slot(dest)?;
        self.tags[dest] |= bits;
        Ok(())
    }

    fn compare(&self, op: Opcode, a: u16, b: u16) -> Result<bool> {
        let (a, b) = (self.value(a)?, self.value(b)?);
        Ok(match op {
            Opcode::Eq | Opcode::CmpJumpEq => a == b,
            Opcode::Neq | Opcode::CmpJumpNeq => a != b,
            Opcode::Lt | Opcode::CmpJumpLt => a.compare(b)?.is_lt(),
            Opcode::Gt | Opcode::CmpJumpGt => a.compare(b)?.is_gt(),
            Opcode::Lte | Opcode::CmpJumpLte => a.compare(b)?.is_le(),
            _ => a.compare(b)?.is_ge(),
        })
    }

    /// Any target at or past the end of the code halts the program
    fn jump(&self, target: u16) -> Result<usize> {
        Ok(usize::from(target))
    }

    fn slot(&self, reg: u16) -> Result<usize> {
        let slot = usize::from(reg);
        if slot < self.values.len() {
            Ok(slot)
        } else {
            Err(HelunaError::program(format!(
                "register {reg} outside scratchpad of {}",
                self.values.len()
            )))
        }
    }

    fn value(&self, reg: u16) -> Result<&Value> {
        Ok(&self.values[self.slot(reg)?])
    }

    fn tag(&self, reg: u16) -> Result<u64> {
        Ok(self.tags[self.slot(reg)?])
    }

    fn constant(&self, index: u16) -> Result<&'a Constant> {
        let packet: &'a Packet = self.packet;
        packet
            .constants
            .get(usize::from(index))
            .ok_or_else(|| HelunaError::program(format!("constant {index} out of range")))
    }

    fn constant_key(&self, index: u16) -> Result<&'a str> {
        match self.constant(index)? {
            Constant::String(key) => Ok(key),
            other => Err(HelunaError::Type(format!(
                "record key constant {index} is not a string: {other:?}"
            ))),
        }
    }

    fn boolean(&self, reg: u16) -> Result<bool> {
        match self.value(reg)? {
            Value::Boolean(b) => Ok(*b),
            other => Err(HelunaError::Type(format!(
                "expected boolean at register {reg}, got {}",
                other.type_name()
            ))),
        }
    }

    fn string(&self, reg: u16) -> Result<&str> {
        match self.value(reg)? {
            Value::String(s) => Ok(s),
            other => Err(HelunaError::Type(format!(
                "expected string at register {reg}, got {}",
                other.type_name()
            ))),
        }
    }

    fn record(&self, reg: u16) -> Result<Record> {
        match self.value(reg)? {
            Value::Record(rec) => Ok(rec.clone()),
            other => Err(HelunaError::Type(format!(
                "expected record at register {reg}, got {}",
                other.type_name()
            ))),
        }
    }

    fn list(&self, reg: u16) -> Result<List> {
        match self.value(reg)? {
            Value::List(list) => Ok(list.clone()),
            other => Err(HelunaError::Type(format!(
                "expected list at register {reg}, got {}",
                other.type_name()
            ))),
        }
    }
}

/// Binary arithmetic with integer wrapping and float promotion
fn arithmetic(op: Opcode, a: &Value, b: &Value) -> Result<Value> {
    if let (Value::Integer(x), Value::Integer(y)) = (a, b) {
        let (x, y) = (*x, *y);
        return Ok(Value::Integer(match op {
            Opcode::Add => x.wrapping_add(y),
            Opcode::Sub => x.wrapping_sub(y),
            Opcode::Mul => x.wrapping_mul(y),
            Opcode::Div if y == 0 => return Err(division_by_zero()),
            Opcode::Div => x.wrapping_div(y),
            Opcode::Mod if y == 0 => return Err(division_by_zero()),
            _ => x.wrapping_rem(y),
        }));
    }

    let (Some(x), Some(y)) = (a.as_number(), b.as_number()) else {
        return Err(HelunaError::Type(format!(
            "arithmetic requires numeric operands, got {} and {}",
            a.type_name(),
            b.type_name()
        )));
    };
    Ok(Value::Float(match op {
        Opcode::Add => x + y,
        Opcode::Sub => x - y,
        Opcode::Mul => x * y,
        Opcode::Div if y == 0.0 => return Err(division_by_zero()),
        Opcode::Div => x / y,
        Opcode::Mod if y == 0.0 => return Err(division_by_zero()),
        _ => x % y,
    }))
}

fn division_by_zero() -> HelunaError {
    HelunaError::Domain("division by zero".to_string())
}
