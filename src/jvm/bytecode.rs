//! Decoded JVM instructions
//!
//! Variants that only differ in encoding (`iload_0` vs. `iload 0` vs. `wide iload 0`, `ldc` vs.
//! `ldc_w`, `goto` vs. `goto_w`, `iconst_1` vs. `bipush 1`) are folded together. Branch targets
//! are absolute offsets into the code array.

use crate::jvm::class_file::ConstantIndex;
use crate::jvm::{BaseType, Error};
use crate::util::Offset;

/// Kinds of values held in locals and on the operand stack
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

/// Numeric kinds for arithmetic
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum NumericKind {
    Int,
    Long,
    Float,
    Double,
}

/// Integral kinds, for shifts and bitwise operations
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum IntegralKind {
    Int,
    Long,
}

/// Element kinds of `xaload`/`xastore` (`baload`/`bastore` cover both `byte[]` and `boolean[]`)
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ArrayKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
    ByteOrBoolean,
    Char,
    Short,
}

/// Binary arithmetic operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Bitwise operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Primitive conversions (`i2l`, `f2i`, `i2b`, ...)
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Conversion {
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
}

impl Conversion {
    /// Kinds of the input and output
    pub fn kinds(self) -> (NumericKind, NumericKind) {
        use NumericKind::*;
        match self {
            Conversion::I2L => (Int, Long),
            Conversion::I2F => (Int, Float),
            Conversion::I2D => (Int, Double),
            Conversion::L2I => (Long, Int),
            Conversion::L2F => (Long, Float),
            Conversion::L2D => (Long, Double),
            Conversion::F2I => (Float, Int),
            Conversion::F2L => (Float, Long),
            Conversion::F2D => (Float, Double),
            Conversion::D2I => (Double, Int),
            Conversion::D2L => (Double, Long),
            Conversion::D2F => (Double, Float),
            Conversion::I2B | Conversion::I2C | Conversion::I2S => (Int, Int),
        }
    }
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

/// Binary comparison operators available for reference branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    /// Interface calls carry the argument count (in slots, including the receiver)
    Interface(u8),
}

/// Non-branching instructions
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-6.html#jvms-6.5
#[derive(Clone, PartialEq, Debug)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConst(i32), // covers `iconst_<n>`, `bipush`, and `sipush`
    LConst(i64),
    FConst(f32),
    DConst(f64),
    Ldc(ConstantIndex),  // covers both `ldc` and `ldc_w`
    Ldc2(ConstantIndex), // `ldc2_w`
    Load(ValueKind, u16),  // covers `xload`, `xload_<n>`, and `wide xload`
    Store(ValueKind, u16), // covers `xstore`, `xstore_<n>`, and `wide xstore`
    ArrayLoad(ArrayKind),
    ArrayStore(ArrayKind),
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    Arithmetic(NumericKind, ArithmeticOp),
    Neg(NumericKind),
    Shift(IntegralKind, ShiftType),
    Bitwise(IntegralKind, BitwiseOp),
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    Convert(Conversion),
    LCmp,
    FCmp(CompareMode),
    DCmp(CompareMode),
    GetStatic(ConstantIndex),
    PutStatic(ConstantIndex),
    GetField(ConstantIndex),
    PutField(ConstantIndex),
    Invoke(InvokeType, ConstantIndex),
    InvokeDynamic(ConstantIndex),
    New(ConstantIndex),
    NewArray(BaseType),
    ANewArray(ConstantIndex),
    MultiANewArray(ConstantIndex, u8),
    ArrayLength,
    CheckCast(ConstantIndex),
    InstanceOf(ConstantIndex),
    MonitorEnter,
    MonitorExit,
}

/// Instructions that end a basic block
#[derive(Clone, PartialEq, Debug)]
pub enum BranchInstruction {
    If(OrdComparison, Offset),
    IfICmp(OrdComparison, Offset),
    IfACmp(EqComparison, Offset),
    IfNull(EqComparison, Offset),
    Goto(Offset), // covers `goto` and `goto_w`
    TableSwitch {
        default: Offset,
        low: i32,
        targets: Vec<Offset>,
    },
    LookupSwitch {
        default: Offset,
        targets: Vec<(i32, Offset)>,
    },
    /// `None` is a `void` return
    Return(Option<ValueKind>),
    AThrow,
    Jsr(Offset), // covers `jsr` and `jsr_w`
    Ret(u16),
}

impl BranchInstruction {
    /// Whether control can continue to the next instruction
    pub fn falls_through(&self) -> bool {
        matches!(
            self,
            BranchInstruction::If(..)
                | BranchInstruction::IfICmp(..)
                | BranchInstruction::IfACmp(..)
                | BranchInstruction::IfNull(..)
        )
    }

    /// Explicit jump targets
    pub fn jump_targets(&self) -> Vec<Offset> {
        match self {
            BranchInstruction::If(_, target)
            | BranchInstruction::IfICmp(_, target)
            | BranchInstruction::IfACmp(_, target)
            | BranchInstruction::IfNull(_, target)
            | BranchInstruction::Goto(target)
            | BranchInstruction::Jsr(target) => vec![*target],
            BranchInstruction::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default).chain(targets.iter().copied()).collect(),
            BranchInstruction::LookupSwitch { default, targets } => std::iter::once(*default)
                .chain(targets.iter().map(|(_, target)| *target))
                .collect(),
            BranchInstruction::Return(_) | BranchInstruction::AThrow | BranchInstruction::Ret(_) => {
                vec![]
            }
        }
    }
}

/// Coarse grouping of instructions
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InstructionCategory {
    Constant,
    StackManipulation,
    LocalAccess,
    Arithmetic,
    Comparison,
    ControlTransfer,
    Allocation,
    FieldAccess,
    ArrayAccess,
    Invocation,
    TypeCheck,
    Monitor,
    Return,
    Throw,
}

/// One decoded instruction
#[derive(Clone, PartialEq, Debug)]
pub enum InstructionNode {
    Plain(Instruction),
    Branch(BranchInstruction),
}

impl InstructionNode {
    pub fn category(&self) -> InstructionCategory {
        use InstructionCategory as C;
        match self {
            InstructionNode::Plain(insn) => match insn {
                Instruction::AConstNull
                | Instruction::IConst(_)
                | Instruction::LConst(_)
                | Instruction::FConst(_)
                | Instruction::DConst(_)
                | Instruction::Ldc(_)
                | Instruction::Ldc2(_) => C::Constant,
                Instruction::Nop
                | Instruction::Pop
                | Instruction::Pop2
                | Instruction::Dup
                | Instruction::DupX1
                | Instruction::DupX2
                | Instruction::Dup2
                | Instruction::Dup2X1
                | Instruction::Dup2X2
                | Instruction::Swap => C::StackManipulation,
                Instruction::Load(..) | Instruction::Store(..) | Instruction::IInc(..) => {
                    C::LocalAccess
                }
                Instruction::Arithmetic(..)
                | Instruction::Neg(_)
                | Instruction::Shift(..)
                | Instruction::Bitwise(..)
                | Instruction::Convert(_) => C::Arithmetic,
                Instruction::LCmp | Instruction::FCmp(_) | Instruction::DCmp(_) => C::Comparison,
                Instruction::GetStatic(_)
                | Instruction::PutStatic(_)
                | Instruction::GetField(_)
                | Instruction::PutField(_) => C::FieldAccess,
                Instruction::ArrayLoad(_)
                | Instruction::ArrayStore(_)
                | Instruction::ArrayLength => C::ArrayAccess,
                Instruction::Invoke(..) | Instruction::InvokeDynamic(_) => C::Invocation,
                Instruction::New(_)
                | Instruction::NewArray(_)
                | Instruction::ANewArray(_)
                | Instruction::MultiANewArray(..) => C::Allocation,
                Instruction::CheckCast(_) | Instruction::InstanceOf(_) => C::TypeCheck,
                Instruction::MonitorEnter | Instruction::MonitorExit => C::Monitor,
            },
            InstructionNode::Branch(branch) => match branch {
                BranchInstruction::Return(_) => C::Return,
                BranchInstruction::AThrow => C::Throw,
                _ => C::ControlTransfer,
            },
        }
    }
}

/// Opcodes needed when emitting bytecode
pub mod opcode {
    pub const NOP: u8 = 0x00;
    pub const SIPUSH: u8 = 0x11;
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const LDC2_W: u8 = 0x14;
    pub const ILOAD: u8 = 0x15;
    pub const LLOAD: u8 = 0x16;
    pub const FLOAD: u8 = 0x17;
    pub const DLOAD: u8 = 0x18;
    pub const ALOAD: u8 = 0x19;
    pub const IRETURN: u8 = 0xac;
    pub const LRETURN: u8 = 0xad;
    pub const FRETURN: u8 = 0xae;
    pub const DRETURN: u8 = 0xaf;
    pub const ARETURN: u8 = 0xb0;
    pub const RETURN: u8 = 0xb1;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEDYNAMIC: u8 = 0xba;
}

/// Decode a complete code array
///
/// Branch targets are checked to be inside the code array, but not yet to land on instruction
/// boundaries (that needs the full list of instructions, see [`check_branch_targets`]).
pub fn decode_code(code: &[u8]) -> Result<Vec<(Offset, InstructionNode)>, Error> {
    let mut reader = BytecodeReader { code, pos: 0 };
    let mut instructions = vec![];
    while reader.pos < code.len() {
        let offset = reader.pos;
        let node = reader
            .next_instruction()
            .map_err(|msg| Error::malformed(format!("bytecode at {}: {}", offset, msg)))?;
        instructions.push((Offset(offset), node));
    }
    check_branch_targets(&instructions)?;
    Ok(instructions)
}

/// Check that every jump target is the start of some instruction
pub fn check_branch_targets(instructions: &[(Offset, InstructionNode)]) -> Result<(), Error> {
    let is_boundary = |target: &Offset| {
        instructions
            .binary_search_by_key(target, |(offset, _)| *offset)
            .is_ok()
    };
    for (offset, node) in instructions {
        if let InstructionNode::Branch(branch) = node {
            if let Some(bad) = branch.jump_targets().iter().find(|t| !is_boundary(t)) {
                return Err(Error::malformed(format!(
                    "bytecode at {}: branch target {} is not an instruction boundary",
                    offset, bad
                )));
            }
        }
    }
    Ok(())
}

struct BytecodeReader<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> BytecodeReader<'a> {
    fn u8(&mut self) -> Result<u8, String> {
        let byte = *self
            .code
            .get(self.pos)
            .ok_or_else(|| String::from("truncated instruction"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn u16(&mut self) -> Result<u16, String> {
        Ok(u16::from_be_bytes([self.u8()?, self.u8()?]))
    }

    fn i16(&mut self) -> Result<i16, String> {
        Ok(self.u16()? as i16)
    }

    fn i32(&mut self) -> Result<i32, String> {
        Ok(i32::from_be_bytes([self.u8()?, self.u8()?, self.u8()?, self.u8()?]))
    }

    fn constant(&mut self) -> Result<ConstantIndex, String> {
        Ok(ConstantIndex(self.u16()?))
    }

    fn target(&self, base: usize, delta: i32) -> Result<Offset, String> {
        let target = base as i64 + delta as i64;
        if target < 0 || target >= self.code.len() as i64 {
            Err(format!("branch target {} outside of code", target))
        } else {
            Ok(Offset(target as usize))
        }
    }

    fn branch16(&mut self, base: usize) -> Result<Offset, String> {
        let delta = self.i16()? as i32;
        self.target(base, delta)
    }

    fn branch32(&mut self, base: usize) -> Result<Offset, String> {
        let delta = self.i32()?;
        self.target(base, delta)
    }

    fn next_instruction(&mut self) -> Result<InstructionNode, String> {
        use Instruction::*;
        use InstructionNode::{Branch, Plain};

        let base = self.pos;
        let opcode = self.u8()?;
        let node = match opcode {
            0x00 => Plain(Nop),
            0x01 => Plain(AConstNull),
            0x02..=0x08 => Plain(IConst(opcode as i32 - 0x03)),
            0x09 | 0x0a => Plain(LConst((opcode - 0x09) as i64)),
            0x0b..=0x0d => Plain(FConst((opcode - 0x0b) as f32)),
            0x0e | 0x0f => Plain(DConst((opcode - 0x0e) as f64)),
            0x10 => Plain(IConst(self.u8()? as i8 as i32)),
            0x11 => Plain(IConst(self.i16()? as i32)),
            0x12 => Plain(Ldc(ConstantIndex(self.u8()? as u16))),
            0x13 => Plain(Ldc(self.constant()?)),
            0x14 => Plain(Ldc2(self.constant()?)),
            0x15..=0x19 => Plain(Load(local_kind(opcode - 0x15), self.u8()? as u16)),
            0x1a..=0x2d => {
                let short = opcode - 0x1a;
                Plain(Load(local_kind(short / 4), (short % 4) as u16))
            }
            0x2e..=0x35 => Plain(ArrayLoad(array_kind(opcode - 0x2e))),
            0x36..=0x3a => Plain(Store(local_kind(opcode - 0x36), self.u8()? as u16)),
            0x3b..=0x4e => {
                let short = opcode - 0x3b;
                Plain(Store(local_kind(short / 4), (short % 4) as u16))
            }
            0x4f..=0x56 => Plain(ArrayStore(array_kind(opcode - 0x4f))),
            0x57 => Plain(Pop),
            0x58 => Plain(Pop2),
            0x59 => Plain(Dup),
            0x5a => Plain(DupX1),
            0x5b => Plain(DupX2),
            0x5c => Plain(Dup2),
            0x5d => Plain(Dup2X1),
            0x5e => Plain(Dup2X2),
            0x5f => Plain(Swap),
            0x60..=0x73 => {
                let op = match (opcode - 0x60) / 4 {
                    0 => ArithmeticOp::Add,
                    1 => ArithmeticOp::Sub,
                    2 => ArithmeticOp::Mul,
                    3 => ArithmeticOp::Div,
                    _ => ArithmeticOp::Rem,
                };
                Plain(Arithmetic(numeric_kind((opcode - 0x60) % 4), op))
            }
            0x74..=0x77 => Plain(Neg(numeric_kind(opcode - 0x74))),
            0x78..=0x7d => {
                let shift = match (opcode - 0x78) / 2 {
                    0 => ShiftType::Left,
                    1 => ShiftType::ArithmeticRight,
                    _ => ShiftType::LogicalRight,
                };
                Plain(Shift(integral_kind(opcode), shift))
            }
            0x7e..=0x83 => {
                let op = match (opcode - 0x7e) / 2 {
                    0 => BitwiseOp::And,
                    1 => BitwiseOp::Or,
                    _ => BitwiseOp::Xor,
                };
                Plain(Bitwise(integral_kind(opcode), op))
            }
            0x84 => Plain(IInc(self.u8()? as u16, self.u8()? as i8 as i16)),
            0x85..=0x93 => Plain(Convert(
                [
                    Conversion::I2L,
                    Conversion::I2F,
                    Conversion::I2D,
                    Conversion::L2I,
                    Conversion::L2F,
                    Conversion::L2D,
                    Conversion::F2I,
                    Conversion::F2L,
                    Conversion::F2D,
                    Conversion::D2I,
                    Conversion::D2L,
                    Conversion::D2F,
                    Conversion::I2B,
                    Conversion::I2C,
                    Conversion::I2S,
                ][(opcode - 0x85) as usize],
            )),
            0x94 => Plain(LCmp),
            0x95 => Plain(FCmp(CompareMode::L)),
            0x96 => Plain(FCmp(CompareMode::G)),
            0x97 => Plain(DCmp(CompareMode::L)),
            0x98 => Plain(DCmp(CompareMode::G)),
            0x99..=0x9e => {
                let target = self.branch16(base)?;
                Branch(BranchInstruction::If(ord_comparison(opcode - 0x99), target))
            }
            0x9f..=0xa4 => {
                let target = self.branch16(base)?;
                Branch(BranchInstruction::IfICmp(ord_comparison(opcode - 0x9f), target))
            }
            0xa5 | 0xa6 => {
                let target = self.branch16(base)?;
                let cmp = if opcode == 0xa5 { EqComparison::EQ } else { EqComparison::NE };
                Branch(BranchInstruction::IfACmp(cmp, target))
            }
            0xa7 => Branch(BranchInstruction::Goto(self.branch16(base)?)),
            0xa8 => Branch(BranchInstruction::Jsr(self.branch16(base)?)),
            0xa9 => Branch(BranchInstruction::Ret(self.u8()? as u16)),
            0xaa => {
                self.skip_padding()?;
                let default = self.branch32(base)?;
                let low = self.i32()?;
                let high = self.i32()?;
                if high < low {
                    return Err(format!("tableswitch high {} is below low {}", high, low));
                }
                let count = (high as i64 - low as i64 + 1) as usize;
                if count > self.code.len() {
                    return Err(String::from("truncated tableswitch"));
                }
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(self.branch32(base)?);
                }
                Branch(BranchInstruction::TableSwitch {
                    default,
                    low,
                    targets,
                })
            }
            0xab => {
                self.skip_padding()?;
                let default = self.branch32(base)?;
                let npairs = self.i32()?;
                if npairs < 0 || npairs as usize > self.code.len() {
                    return Err(format!("lookupswitch has {} pairs", npairs));
                }
                let mut targets: Vec<(i32, Offset)> = Vec::with_capacity(npairs as usize);
                for _ in 0..npairs {
                    let key = self.i32()?;
                    if matches!(targets.last(), Some((prev, _)) if *prev >= key) {
                        return Err(String::from("lookupswitch keys are not sorted"));
                    }
                    targets.push((key, self.branch32(base)?));
                }
                Branch(BranchInstruction::LookupSwitch { default, targets })
            }
            0xac..=0xb0 => Branch(BranchInstruction::Return(Some(local_kind(opcode - 0xac)))),
            0xb1 => Branch(BranchInstruction::Return(None)),
            0xb2 => Plain(GetStatic(self.constant()?)),
            0xb3 => Plain(PutStatic(self.constant()?)),
            0xb4 => Plain(GetField(self.constant()?)),
            0xb5 => Plain(PutField(self.constant()?)),
            0xb6 => Plain(Invoke(InvokeType::Virtual, self.constant()?)),
            0xb7 => Plain(Invoke(InvokeType::Special, self.constant()?)),
            0xb8 => Plain(Invoke(InvokeType::Static, self.constant()?)),
            0xb9 => {
                let method = self.constant()?;
                let count = self.u8()?;
                if count == 0 || self.u8()? != 0 {
                    return Err(String::from("invalid invokeinterface operands"));
                }
                Plain(Invoke(InvokeType::Interface(count), method))
            }
            0xba => {
                let call_site = self.constant()?;
                if self.u16()? != 0 {
                    return Err(String::from("invalid invokedynamic operands"));
                }
                Plain(InvokeDynamic(call_site))
            }
            0xbb => Plain(New(self.constant()?)),
            0xbc => {
                let code = self.u8()?;
                let base_type = BaseType::from_newarray_code(code)
                    .ok_or_else(|| format!("invalid newarray type {}", code))?;
                Plain(NewArray(base_type))
            }
            0xbd => Plain(ANewArray(self.constant()?)),
            0xbe => Plain(ArrayLength),
            0xbf => Branch(BranchInstruction::AThrow),
            0xc0 => Plain(CheckCast(self.constant()?)),
            0xc1 => Plain(InstanceOf(self.constant()?)),
            0xc2 => Plain(MonitorEnter),
            0xc3 => Plain(MonitorExit),
            0xc4 => self.wide()?,
            0xc5 => {
                let class = self.constant()?;
                let dimensions = self.u8()?;
                if dimensions == 0 {
                    return Err(String::from("multianewarray with zero dimensions"));
                }
                Plain(MultiANewArray(class, dimensions))
            }
            0xc6 | 0xc7 => {
                let target = self.branch16(base)?;
                let cmp = if opcode == 0xc6 { EqComparison::EQ } else { EqComparison::NE };
                Branch(BranchInstruction::IfNull(cmp, target))
            }
            0xc8 => Branch(BranchInstruction::Goto(self.branch32(base)?)),
            0xc9 => Branch(BranchInstruction::Jsr(self.branch32(base)?)),
            other => return Err(format!("invalid opcode {:#04x}", other)),
        };
        Ok(node)
    }

    /// Operand of a `wide` prefix
    fn wide(&mut self) -> Result<InstructionNode, String> {
        let opcode = self.u8()?;
        let node = match opcode {
            0x15..=0x19 => InstructionNode::Plain(Instruction::Load(
                local_kind(opcode - 0x15),
                self.u16()?,
            )),
            0x36..=0x3a => InstructionNode::Plain(Instruction::Store(
                local_kind(opcode - 0x36),
                self.u16()?,
            )),
            0x84 => InstructionNode::Plain(Instruction::IInc(self.u16()?, self.i16()?)),
            0xa9 => InstructionNode::Branch(BranchInstruction::Ret(self.u16()?)),
            other => return Err(format!("opcode {:#04x} cannot be widened", other)),
        };
        Ok(node)
    }

    /// Switch operands are aligned to 4 bytes from the start of the code array
    fn skip_padding(&mut self) -> Result<(), String> {
        while self.pos % 4 != 0 {
            if self.u8()? != 0 {
                return Err(String::from("non-zero switch padding"));
            }
        }
        Ok(())
    }
}

/// Order shared by `xload`, `xstore`, and `xreturn` opcode families
fn local_kind(idx: u8) -> ValueKind {
    match idx {
        0 => ValueKind::Int,
        1 => ValueKind::Long,
        2 => ValueKind::Float,
        3 => ValueKind::Double,
        _ => ValueKind::Reference,
    }
}

fn array_kind(idx: u8) -> ArrayKind {
    match idx {
        0 => ArrayKind::Int,
        1 => ArrayKind::Long,
        2 => ArrayKind::Float,
        3 => ArrayKind::Double,
        4 => ArrayKind::Reference,
        5 => ArrayKind::ByteOrBoolean,
        6 => ArrayKind::Char,
        _ => ArrayKind::Short,
    }
}

fn numeric_kind(idx: u8) -> NumericKind {
    match idx {
        0 => NumericKind::Int,
        1 => NumericKind::Long,
        2 => NumericKind::Float,
        _ => NumericKind::Double,
    }
}

/// Shift and bitwise opcodes alternate between `int` (even) and `long` (odd)
fn integral_kind(opcode: u8) -> IntegralKind {
    if opcode % 2 == 0 {
        IntegralKind::Int
    } else {
        IntegralKind::Long
    }
}

fn ord_comparison(idx: u8) -> OrdComparison {
    match idx {
        0 => OrdComparison::EQ,
        1 => OrdComparison::NE,
        2 => OrdComparison::LT,
        3 => OrdComparison::GE,
        4 => OrdComparison::GT,
        _ => OrdComparison::LE,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn decode(code: &[u8]) -> Vec<(usize, InstructionNode)> {
        decode_code(code)
            .unwrap()
            .into_iter()
            .map(|(offset, node)| (offset.0, node))
            .collect()
    }

    #[test]
    fn short_and_wide_forms_fold_together() {
        let code = [
            0x1b, // iload_1
            0x15, 0x01, // iload 1
            0xc4, 0x15, 0x00, 0x01, // wide iload 1
            0x84, 0x01, 0xff, // iinc 1 -1
            0x10, 0xfe, // bipush -2
            0xac, // ireturn
        ];
        assert_eq!(
            decode(&code),
            vec![
                (0, InstructionNode::Plain(Instruction::Load(ValueKind::Int, 1))),
                (1, InstructionNode::Plain(Instruction::Load(ValueKind::Int, 1))),
                (3, InstructionNode::Plain(Instruction::Load(ValueKind::Int, 1))),
                (7, InstructionNode::Plain(Instruction::IInc(1, -1))),
                (10, InstructionNode::Plain(Instruction::IConst(-2))),
                (12, InstructionNode::Branch(BranchInstruction::Return(Some(ValueKind::Int)))),
            ]
        );
    }

    #[test]
    fn switch_padding_depends_on_offset() {
        let code = [
            0x03, // iconst_0
            0xaa, 0x00, 0x00, // tableswitch, padded to offset 4
            0x00, 0x00, 0x00, 0x13, // default: 1 + 19 = 20
            0x00, 0x00, 0x00, 0x01, // low
            0x00, 0x00, 0x00, 0x01, // high
            0x00, 0x00, 0x00, 0x14, // 1 -> 1 + 20 = 21
            0xb1, // return
            0xb1, // return
        ];
        let decoded = decode(&code);
        assert_eq!(
            decoded[1],
            (
                1,
                InstructionNode::Branch(BranchInstruction::TableSwitch {
                    default: Offset(20),
                    low: 1,
                    targets: vec![Offset(21)],
                })
            )
        );
        assert_eq!(decoded[2].0, 20);
    }

    #[test]
    fn malformed_code() {
        // truncated sipush
        assert!(decode_code(&[0x11, 0x00]).is_err());
        // invalid opcode
        assert!(decode_code(&[0xcb]).is_err());
        // goto into the middle of sipush
        assert!(decode_code(&[0xa7, 0x00, 0x04, 0x11, 0x00, 0x01, 0xb1]).is_err());
        // goto past the end
        assert!(decode_code(&[0xa7, 0x00, 0x10]).is_err());
    }

    #[test]
    fn categories() {
        let node = InstructionNode::Plain(Instruction::MonitorEnter);
        assert_eq!(node.category(), InstructionCategory::Monitor);
        let node = InstructionNode::Branch(BranchInstruction::AThrow);
        assert_eq!(node.category(), InstructionCategory::Throw);
        let node = InstructionNode::Branch(BranchInstruction::Goto(Offset(0)));
        assert_eq!(node.category(), InstructionCategory::ControlTransfer);
    }
}
