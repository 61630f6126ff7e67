//! Translation of one method body into native IR
//!
//! Blocks are translated by abstract interpretation over the control flow graph: each block is
//! translated from the frame it is entered with, and retranslated whenever a new predecessor
//! changes that frame. Stack map frames, where present, fix the entry frame outright.

use super::cfg::{BlockInfo, ControlFlow};
use super::exceptions::ExceptionRegions;
use super::hidden::HiddenMethods;
use super::types::{Frame, TypeError};
use super::Error;
use crate::jvm::model::{ClassUnit, ConstantEntry, MethodCode, MethodUnit};
use crate::jvm::{
    ArithmeticOp, BinaryName, BitwiseOp, BranchInstruction, CompareMode, EqComparison, FieldType,
    Instruction, InstructionNode, IntegralKind, InvokeType, MethodDescriptor, Name, NumericKind,
    OrdComparison, RefType, RenderDescriptor, ShiftType,
};
use crate::jvm::class_file::ConstantIndex;
use crate::native::{
    BinaryOp, Block, BridgeCall, ClassId, CompareOp, Condition, Constant, Dispatcher, InvokeKind,
    NativeMethod, SlotType, Stmt, SwitchTable, SymbolTable, Terminator, Unwind, Var,
};
use crate::protect::ProtectedPool;
use crate::util::Offset;
use std::collections::BTreeSet;

/// Translate a method with code
///
/// Symbols, protected constants and hidden methods used by the method are added to the class's
/// tables. On failure the tables may contain unused entries, so callers translate against copies.
pub fn translate_method(
    class: &ClassUnit,
    method: &MethodUnit,
    symbols: &mut SymbolTable,
    pool: &mut ProtectedPool,
    hidden: &mut HiddenMethods,
) -> Result<NativeMethod, Error> {
    let code = method.code.as_ref().ok_or_else(|| {
        Error::RewriteConflict(format!("{} has no code", method.describe()))
    })?;
    let cfg = ControlFlow::analyze(code)
        .map_err(|msg| Error::MalformedClass(format!("{}: {}", method.describe(), msg)))?;
    let regions = ExceptionRegions::analyze(&code.handlers);

    let mut translator = MethodTranslator {
        class,
        method,
        code,
        cfg,
        regions,
        symbols,
        pool,
        hidden,
    };
    translator.translate()
}

struct MethodTranslator<'a> {
    class: &'a ClassUnit,
    method: &'a MethodUnit,
    code: &'a MethodCode,
    cfg: ControlFlow,
    regions: ExceptionRegions,
    symbols: &'a mut SymbolTable,
    pool: &'a mut ProtectedPool,
    hidden: &'a mut HiddenMethods,
}

/// State while translating the instructions of one block
struct BlockState {
    frame: Frame,
    stmts: Vec<Stmt>,
    offset: Offset,
    unwind: Unwind,
    /// First scratch stack slot
    scratch: u16,
}

impl BlockState {
    fn fail(&self, err: TypeError) -> Error {
        Error::type_inference(self.offset, err.0)
    }

    fn push(&mut self, ty: SlotType) -> Result<Var, Error> {
        self.frame.push(ty).map_err(|err| self.fail(err))
    }

    fn pop(&mut self) -> Result<Var, Error> {
        self.frame.pop().map_err(|err| self.fail(err))
    }

    fn pop_expect(&mut self, ty: SlotType) -> Result<Var, Error> {
        self.frame.pop_expect(ty).map_err(|err| self.fail(err))
    }

    fn pop_narrow(&mut self) -> Result<Var, Error> {
        let var = self.pop()?;
        if var.ty.is_wide() {
            return Err(Error::type_inference(
                self.offset,
                format!("{:?} used where a category 1 value is required", var.ty),
            ));
        }
        Ok(var)
    }

    fn peek(&self, depth: usize) -> Result<Var, Error> {
        self.frame.peek(depth).map_err(|err| self.fail(err))
    }

    fn bridge(&mut self, call: BridgeCall, args: Vec<Var>, dst: Option<Var>) {
        self.stmts.push(Stmt::Bridge {
            call,
            args,
            dst,
            unwind: self.unwind,
        });
    }

    /// Pop `count` values and push them back in `order` (indices count from the deepest popped)
    fn shuffle(&mut self, count: usize, order: &[usize]) -> Result<(), Error> {
        let mut popped = vec![];
        for _ in 0..count {
            popped.push(self.pop()?);
        }
        popped.reverse();

        let mut saved = vec![];
        let mut scratch = self.scratch;
        for value in &popped {
            let dst = Var::stack(scratch, value.ty);
            self.stmts.push(Stmt::Move { dst, src: *value });
            saved.push(dst);
            scratch += if value.ty.is_wide() { 2 } else { 1 };
        }
        for idx in order {
            let dst = self.push(popped[*idx].ty)?;
            if dst != popped[*idx] {
                self.stmts.push(Stmt::Move {
                    dst,
                    src: saved[*idx],
                });
            }
        }
        Ok(())
    }
}

impl<'a> MethodTranslator<'a> {
    fn translate(&mut self) -> Result<NativeMethod, Error> {
        let code = self.code;
        let block_count = self.cfg.blocks.len();
        let mut entries: Vec<Option<Frame>> = vec![None; block_count];
        let mut translated: Vec<Option<Block>> = vec![None; block_count];
        let mut worklist = BTreeSet::new();

        let entry = Frame::entry(self.method, code.max_locals, code.max_stack)
            .map_err(|err| Error::type_inference(Offset(0), err.0))?;
        self.flow_into(Offset(0), &entry, &mut entries, &mut worklist)?;

        while let Some(idx) = worklist.pop_first() {
            let info = self.cfg.blocks[idx];
            let frame = match &entries[idx] {
                Some(frame) => frame.clone(),
                None => continue,
            };
            let (block, exits) = self.translate_block(&info, frame)?;
            translated[idx] = Some(block);
            for (target, frame) in exits {
                self.flow_into(target, &frame, &mut entries, &mut worklist)?;
            }
        }

        let blocks: Vec<Block> = translated.into_iter().flatten().collect();
        log::trace!(
            "{}: {} of {} blocks reachable",
            self.method.describe(),
            blocks.len(),
            block_count
        );
        let dispatchers = self.dispatchers(&blocks);

        Ok(NativeMethod {
            index: self.method.index,
            name: self.method.name.clone(),
            descriptor: self.method.descriptor.clone(),
            is_static: self.method.is_static(),
            max_locals: code.max_locals,
            stack_size: code.max_stack + NativeMethod::SCRATCH_SLOTS,
            blocks,
            dispatchers,
        })
    }

    /// Record that control reaches `target` with `frame`
    fn flow_into(
        &self,
        target: Offset,
        frame: &Frame,
        entries: &mut [Option<Frame>],
        worklist: &mut BTreeSet<usize>,
    ) -> Result<(), Error> {
        let idx = self.cfg.block_index(target).ok_or_else(|| {
            Error::MalformedClass(format!(
                "{}: control reaches {} which does not start a block",
                self.method.describe(),
                target
            ))
        })?;
        let code = self.code;
        let fail = |err: TypeError| Error::type_inference(target, err.0);

        if let Some(hint) = code.frames.get(&target) {
            let declared = Frame::from_hint(hint, code.max_locals, code.max_stack).map_err(fail)?;
            let mut incoming = frame.clone();
            incoming.apply_hint(&declared).map_err(fail)?;
            if entries[idx].is_none() {
                entries[idx] = Some(declared);
                worklist.insert(idx);
            }
            return Ok(());
        }

        match &mut entries[idx] {
            Some(existing) => {
                if existing.merge(frame).map_err(fail)? {
                    worklist.insert(idx);
                }
            }
            slot @ None => {
                *slot = Some(frame.clone());
                worklist.insert(idx);
            }
        }
        Ok(())
    }

    fn translate_block(
        &mut self,
        info: &BlockInfo,
        frame: Frame,
    ) -> Result<(Block, Vec<(Offset, Frame)>), Error> {
        let unwind = match self.regions.dispatcher_at(info.start) {
            Some(dispatcher) => Unwind::Dispatch(dispatcher),
            None => Unwind::Return,
        };
        let handlers: Vec<Offset> = self
            .code
            .handlers
            .iter()
            .filter(|handler| handler.covers(info.start))
            .map(|handler| handler.handler)
            .collect();

        let mut state = BlockState {
            frame,
            stmts: vec![],
            offset: info.start,
            unwind,
            scratch: self.code.max_stack,
        };
        let mut exits = vec![];
        let mut terminator = None;

        let code = self.code;
        for (offset, node) in &code.instructions[info.first..=info.last] {
            state.offset = *offset;
            for handler in &handlers {
                exits.push((*handler, state.frame.handler_entry()));
            }
            match node {
                InstructionNode::Plain(instruction) => {
                    self.translate_instruction(&mut state, instruction)?
                }
                InstructionNode::Branch(branch) => {
                    terminator = Some(self.translate_branch(&mut state, branch, info, &mut exits)?);
                }
            }
        }

        let terminator = match terminator {
            Some(terminator) => terminator,
            None => {
                exits.push((info.end, state.frame.clone()));
                Terminator::FallThrough(info.end)
            }
        };
        let block = Block {
            label: info.start,
            stmts: state.stmts,
            terminator,
        };
        Ok((block, exits))
    }

    fn unsupported(&self, offset: Offset, instruction: impl std::fmt::Debug) -> Error {
        Error::unsupported(offset, instruction)
    }

    fn malformed(&self, offset: Offset, msg: impl std::fmt::Display) -> Error {
        Error::MalformedClass(format!("{} at {}: {}", self.method.describe(), offset, msg))
    }

    fn protected_number(&mut self, bytes: &[u8], ty: SlotType) -> Constant {
        Constant::Protected {
            index: self.pool.intern(bytes),
            ty,
        }
    }

    fn class_symbol(&mut self, offset: Offset, index: ConstantIndex) -> Result<ClassId, Error> {
        let class: &'a ClassUnit = self.class;
        let class = class
            .constants
            .class(index)
            .map_err(|err| self.malformed(offset, err))?;
        Ok(self.symbols.class(self.pool, &class.class_constant_name()))
    }

    fn translate_instruction(
        &mut self,
        state: &mut BlockState,
        instruction: &Instruction,
    ) -> Result<(), Error> {
        let offset = state.offset;
        let class: &'a ClassUnit = self.class;
        let constants = &class.constants;
        match instruction {
            Instruction::Nop => (),
            Instruction::AConstNull => {
                let dst = state.push(SlotType::Ref)?;
                state.stmts.push(Stmt::Const {
                    dst,
                    value: Constant::Null,
                });
            }
            Instruction::IConst(value) => self.constant(state, SlotType::Int, Constant::Int(*value))?,
            Instruction::LConst(value) => self.constant(state, SlotType::Long, Constant::Long(*value))?,
            Instruction::FConst(value) => {
                self.constant(state, SlotType::Float, Constant::Float(*value))?
            }
            Instruction::DConst(value) => {
                self.constant(state, SlotType::Double, Constant::Double(*value))?
            }
            Instruction::Ldc(index) | Instruction::Ldc2(index) => {
                let numbers = self.pool.protection().encodes_numbers();
                let entry = constants
                    .get(*index)
                    .map_err(|err| self.malformed(offset, err))?;
                match entry {
                    ConstantEntry::Integer(value) => {
                        let value = if numbers {
                            self.protected_number(&value.to_be_bytes(), SlotType::Int)
                        } else {
                            Constant::Int(*value)
                        };
                        self.constant(state, SlotType::Int, value)?;
                    }
                    ConstantEntry::Float(value) => {
                        let value = if numbers {
                            self.protected_number(&value.to_bits().to_be_bytes(), SlotType::Float)
                        } else {
                            Constant::Float(*value)
                        };
                        self.constant(state, SlotType::Float, value)?;
                    }
                    ConstantEntry::Long(value) => {
                        let value = if numbers {
                            self.protected_number(&value.to_be_bytes(), SlotType::Long)
                        } else {
                            Constant::Long(*value)
                        };
                        self.constant(state, SlotType::Long, value)?;
                    }
                    ConstantEntry::Double(value) => {
                        let value = if numbers {
                            self.protected_number(&value.to_bits().to_be_bytes(), SlotType::Double)
                        } else {
                            Constant::Double(*value)
                        };
                        self.constant(state, SlotType::Double, value)?;
                    }
                    ConstantEntry::String(value) => {
                        let string = self.symbols.string(self.pool, value);
                        let dst = state.push(SlotType::Ref)?;
                        state.bridge(BridgeCall::LoadString(string), vec![], Some(dst));
                    }
                    ConstantEntry::Class(class) => {
                        let class = self.symbols.class(self.pool, &class.class_constant_name());
                        let dst = state.push(SlotType::Ref)?;
                        state.bridge(BridgeCall::LoadClass(class), vec![], Some(dst));
                    }
                    ConstantEntry::MethodHandle => {
                        self.load_hidden_constant(state, *index, BinaryName::METHODHANDLE)?
                    }
                    ConstantEntry::MethodType(_) => {
                        self.load_hidden_constant(state, *index, BinaryName::METHODTYPE)?
                    }
                    ConstantEntry::Dynamic { descriptor, .. } => {
                        let method = self.hidden.constant(*index, descriptor);
                        let (name, descriptor) = (method.name.clone(), method.descriptor.clone());
                        self.invoke_own_static(state, name.as_str(), &descriptor)?;
                    }
                    other => {
                        return Err(self.malformed(offset, format!("cannot load {:?}", other)))
                    }
                }
            }
            Instruction::Load(kind, index) => {
                let ty = SlotType::from_value_kind(*kind);
                let src = state.frame.local(*index, ty).map_err(|err| state.fail(err))?;
                let dst = state.push(ty)?;
                state.stmts.push(Stmt::Move { dst, src });
            }
            Instruction::Store(kind, index) => {
                let ty = SlotType::from_value_kind(*kind);
                let src = state.pop_expect(ty)?;
                let dst = state
                    .frame
                    .set_local(*index, ty)
                    .map_err(|err| state.fail(err))?;
                state.stmts.push(Stmt::Move { dst, src });
            }
            Instruction::ArrayLoad(kind) => {
                let index = state.pop_expect(SlotType::Int)?;
                let array = state.pop_expect(SlotType::Ref)?;
                let dst = state.push(SlotType::from_array_kind(*kind))?;
                state.bridge(BridgeCall::ArrayLoad(*kind), vec![array, index], Some(dst));
            }
            Instruction::ArrayStore(kind) => {
                let value = state.pop_expect(SlotType::from_array_kind(*kind))?;
                let index = state.pop_expect(SlotType::Int)?;
                let array = state.pop_expect(SlotType::Ref)?;
                state.bridge(BridgeCall::ArrayStore(*kind), vec![array, index, value], None);
            }
            Instruction::Pop => {
                state.pop_narrow()?;
            }
            Instruction::Pop2 => {
                if !state.pop()?.ty.is_wide() {
                    state.pop_narrow()?;
                }
            }
            Instruction::Dup => {
                let src = state.peek(0)?;
                if src.ty.is_wide() {
                    return Err(Error::type_inference(offset, "dup of a category 2 value"));
                }
                let dst = state.push(src.ty)?;
                state.stmts.push(Stmt::Move { dst, src });
            }
            Instruction::DupX1 => {
                self.expect_categories(state, &[1, 1])?;
                state.shuffle(2, &[1, 0, 1])?;
            }
            Instruction::DupX2 => {
                if self.categories(state, 2)? == [1, 2] {
                    state.shuffle(2, &[1, 0, 1])?;
                } else {
                    self.expect_categories(state, &[1, 1, 1])?;
                    state.shuffle(3, &[2, 0, 1, 2])?;
                }
            }
            Instruction::Dup2 => {
                if self.categories(state, 1)? == [2] {
                    state.shuffle(1, &[0, 0])?;
                } else {
                    self.expect_categories(state, &[1, 1])?;
                    state.shuffle(2, &[0, 1, 0, 1])?;
                }
            }
            Instruction::Dup2X1 => {
                if self.categories(state, 1)? == [2] {
                    self.expect_categories(state, &[2, 1])?;
                    state.shuffle(2, &[1, 0, 1])?;
                } else {
                    self.expect_categories(state, &[1, 1, 1])?;
                    state.shuffle(3, &[1, 2, 0, 1, 2])?;
                }
            }
            Instruction::Dup2X2 => {
                let top = self.categories(state, 2)?;
                if top == [2, 2] {
                    state.shuffle(2, &[1, 0, 1])?;
                } else if top[0] == 2 {
                    self.expect_categories(state, &[2, 1, 1])?;
                    state.shuffle(3, &[2, 0, 1, 2])?;
                } else if self.categories(state, 3)? == [1, 1, 2] {
                    state.shuffle(3, &[1, 2, 0, 1, 2])?;
                } else {
                    self.expect_categories(state, &[1, 1, 1, 1])?;
                    state.shuffle(4, &[2, 3, 0, 1, 2, 3])?;
                }
            }
            Instruction::Swap => {
                self.expect_categories(state, &[1, 1])?;
                state.shuffle(2, &[1, 0])?;
            }
            Instruction::Arithmetic(kind, op) => {
                let ty = SlotType::from_numeric_kind(*kind);
                let rhs = state.pop_expect(ty)?;
                let lhs = state.pop_expect(ty)?;
                let dst = state.push(ty)?;
                let call = match (kind, op) {
                    (NumericKind::Int, ArithmeticOp::Div) => Some(BridgeCall::IntDiv),
                    (NumericKind::Int, ArithmeticOp::Rem) => Some(BridgeCall::IntRem),
                    (NumericKind::Long, ArithmeticOp::Div) => Some(BridgeCall::LongDiv),
                    (NumericKind::Long, ArithmeticOp::Rem) => Some(BridgeCall::LongRem),
                    _ => None,
                };
                match call {
                    Some(call) => state.bridge(call, vec![lhs, rhs], Some(dst)),
                    None => {
                        let op = match op {
                            ArithmeticOp::Add => BinaryOp::Add,
                            ArithmeticOp::Sub => BinaryOp::Sub,
                            ArithmeticOp::Mul => BinaryOp::Mul,
                            ArithmeticOp::Div => BinaryOp::Div,
                            ArithmeticOp::Rem => BinaryOp::Rem,
                        };
                        state.stmts.push(Stmt::Binary { op, dst, lhs, rhs });
                    }
                }
            }
            Instruction::Neg(kind) => {
                let ty = SlotType::from_numeric_kind(*kind);
                let src = state.pop_expect(ty)?;
                let dst = state.push(ty)?;
                state.stmts.push(Stmt::Negate { dst, src });
            }
            Instruction::Shift(kind, shift) => {
                let ty = integral(*kind);
                let rhs = state.pop_expect(SlotType::Int)?;
                let lhs = state.pop_expect(ty)?;
                let dst = state.push(ty)?;
                let op = match shift {
                    ShiftType::Left => BinaryOp::Shl,
                    ShiftType::ArithmeticRight => BinaryOp::Shr,
                    ShiftType::LogicalRight => BinaryOp::UShr,
                };
                state.stmts.push(Stmt::Binary { op, dst, lhs, rhs });
            }
            Instruction::Bitwise(kind, bitwise) => {
                let ty = integral(*kind);
                let rhs = state.pop_expect(ty)?;
                let lhs = state.pop_expect(ty)?;
                let dst = state.push(ty)?;
                let op = match bitwise {
                    BitwiseOp::And => BinaryOp::And,
                    BitwiseOp::Or => BinaryOp::Or,
                    BitwiseOp::Xor => BinaryOp::Xor,
                };
                state.stmts.push(Stmt::Binary { op, dst, lhs, rhs });
            }
            Instruction::IInc(index, delta) => {
                state
                    .frame
                    .local(*index, SlotType::Int)
                    .map_err(|err| state.fail(err))?;
                state.stmts.push(Stmt::IInc {
                    local: *index,
                    delta: i32::from(*delta),
                });
            }
            Instruction::Convert(conversion) => {
                let (from, to) = conversion.kinds();
                let src = state.pop_expect(SlotType::from_numeric_kind(from))?;
                let dst = state.push(SlotType::from_numeric_kind(to))?;
                state.stmts.push(Stmt::Convert {
                    conversion: *conversion,
                    dst,
                    src,
                });
            }
            Instruction::LCmp => self.compare(state, SlotType::Long, CompareOp::LCmp)?,
            Instruction::FCmp(mode) => {
                let op = match mode {
                    CompareMode::L => CompareOp::FCmpL,
                    CompareMode::G => CompareOp::FCmpG,
                };
                self.compare(state, SlotType::Float, op)?;
            }
            Instruction::DCmp(mode) => {
                let op = match mode {
                    CompareMode::L => CompareOp::DCmpL,
                    CompareMode::G => CompareOp::DCmpG,
                };
                self.compare(state, SlotType::Double, op)?;
            }
            Instruction::GetStatic(index)
            | Instruction::PutStatic(index)
            | Instruction::GetField(index)
            | Instruction::PutField(index) => {
                let field = constants
                    .field_ref(*index)
                    .map_err(|err| self.malformed(offset, err))?;
                let is_static = matches!(
                    instruction,
                    Instruction::GetStatic(_) | Instruction::PutStatic(_)
                );
                let ty = SlotType::from_field_type(&field.descriptor);
                let (class, field_id) = self.symbols.field(
                    self.pool,
                    field.class.as_str(),
                    field.name.as_str(),
                    &field.descriptor.render(),
                    is_static,
                );
                match instruction {
                    Instruction::GetStatic(_) => {
                        let dst = state.push(ty)?;
                        state.bridge(BridgeCall::GetStatic(class, field_id), vec![], Some(dst));
                    }
                    Instruction::PutStatic(_) => {
                        let value = state.pop_expect(ty)?;
                        state.bridge(BridgeCall::SetStatic(class, field_id), vec![value], None);
                    }
                    Instruction::GetField(_) => {
                        let object = state.pop_expect(SlotType::Ref)?;
                        let dst = state.push(ty)?;
                        state.bridge(BridgeCall::GetField(field_id), vec![object], Some(dst));
                    }
                    _ => {
                        let value = state.pop_expect(ty)?;
                        let object = state.pop_expect(SlotType::Ref)?;
                        state.bridge(BridgeCall::SetField(field_id), vec![object, value], None);
                    }
                }
            }
            Instruction::Invoke(invoke, index) => {
                let method = constants
                    .method_ref(*index)
                    .map_err(|err| self.malformed(offset, err))?;
                let kind = match invoke {
                    InvokeType::Virtual => InvokeKind::Virtual,
                    InvokeType::Special => InvokeKind::Special,
                    InvokeType::Static => InvokeKind::Static,
                    InvokeType::Interface(_) => InvokeKind::Interface,
                };
                self.invoke(
                    state,
                    kind,
                    &method.class.class_constant_name(),
                    method.name.as_str(),
                    &method.descriptor,
                )?;
            }
            Instruction::InvokeDynamic(index) => {
                let (_, descriptor) = constants
                    .call_site(*index)
                    .map_err(|err| self.malformed(offset, err))?;
                let method = self
                    .hidden
                    .call_site(self.method.index, offset, *index, descriptor);
                let (name, descriptor) = (method.name.clone(), method.descriptor.clone());
                self.invoke_own_static(state, name.as_str(), &descriptor)?;
            }
            Instruction::New(index) => {
                let class = constants
                    .object_class(*index)
                    .map_err(|err| self.malformed(offset, err))?;
                let class = self.symbols.class(self.pool, class.as_str());
                let dst = state.push(SlotType::Ref)?;
                state.bridge(BridgeCall::Allocate(class), vec![], Some(dst));
            }
            Instruction::NewArray(element) => {
                let length = state.pop_expect(SlotType::Int)?;
                let dst = state.push(SlotType::Ref)?;
                state.bridge(BridgeCall::NewArray(*element), vec![length], Some(dst));
            }
            Instruction::ANewArray(index) => {
                let class = self.class_symbol(offset, *index)?;
                let length = state.pop_expect(SlotType::Int)?;
                let dst = state.push(SlotType::Ref)?;
                state.bridge(BridgeCall::NewObjectArray(class), vec![length], Some(dst));
            }
            Instruction::MultiANewArray(index, dimensions) => {
                let class = self.class_symbol(offset, *index)?;
                let mut lengths = vec![];
                for _ in 0..*dimensions {
                    lengths.push(state.pop_expect(SlotType::Int)?);
                }
                lengths.reverse();
                let dst = state.push(SlotType::Ref)?;
                state.bridge(BridgeCall::NewMultiArray(class), lengths, Some(dst));
            }
            Instruction::ArrayLength => {
                let array = state.pop_expect(SlotType::Ref)?;
                let dst = state.push(SlotType::Int)?;
                state.bridge(BridgeCall::ArrayLength, vec![array], Some(dst));
            }
            Instruction::CheckCast(index) => {
                let class = self.class_symbol(offset, *index)?;
                let object = state.pop_expect(SlotType::Ref)?;
                let dst = state.push(SlotType::Ref)?;
                state.bridge(BridgeCall::CheckCast(class), vec![object], Some(dst));
            }
            Instruction::InstanceOf(index) => {
                let class = self.class_symbol(offset, *index)?;
                let object = state.pop_expect(SlotType::Ref)?;
                let dst = state.push(SlotType::Int)?;
                state.bridge(BridgeCall::InstanceOf(class), vec![object], Some(dst));
            }
            Instruction::MonitorEnter => {
                let object = state.pop_expect(SlotType::Ref)?;
                state.bridge(BridgeCall::MonitorEnter, vec![object], None);
            }
            Instruction::MonitorExit => {
                let object = state.pop_expect(SlotType::Ref)?;
                state.bridge(BridgeCall::MonitorExit, vec![object], None);
            }
        }
        Ok(())
    }

    /// Pop the arguments, call, and push the result
    fn invoke(
        &mut self,
        state: &mut BlockState,
        kind: InvokeKind,
        class: &str,
        name: &str,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> Result<(), Error> {
        let (class, method_id) = self.symbols.method(
            self.pool,
            class,
            name,
            &descriptor.render(),
            kind == InvokeKind::Static,
        );

        let mut args = vec![];
        for parameter in descriptor.parameters.iter().rev() {
            args.push(state.pop_expect(SlotType::from_field_type(parameter))?);
        }
        if kind != InvokeKind::Static {
            args.push(state.pop_expect(SlotType::Ref)?);
        }
        args.reverse();
        let dst = match &descriptor.return_type {
            Some(return_type) => Some(state.push(SlotType::from_field_type(return_type))?),
            None => None,
        };
        state.bridge(
            BridgeCall::Invoke {
                kind,
                class,
                method: method_id,
            },
            args,
            dst,
        );
        Ok(())
    }

    /// Call a hidden method of the class being translated
    fn invoke_own_static(
        &mut self,
        state: &mut BlockState,
        name: &str,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> Result<(), Error> {
        let class: &'a ClassUnit = self.class;
        self.invoke(state, InvokeKind::Static, class.name.as_str(), name, descriptor)
    }

    /// `ldc` of a method handle or method type, through a hidden method returning it
    fn load_hidden_constant(
        &mut self,
        state: &mut BlockState,
        index: ConstantIndex,
        class: BinaryName,
    ) -> Result<(), Error> {
        let ty = FieldType::Ref(RefType::Object(class));
        let method = self.hidden.constant(index, &ty);
        let (name, descriptor) = (method.name.clone(), method.descriptor.clone());
        self.invoke_own_static(state, name.as_str(), &descriptor)
    }

    fn constant(&self, state: &mut BlockState, ty: SlotType, value: Constant) -> Result<(), Error> {
        let dst = state.push(ty)?;
        state.stmts.push(Stmt::Const { dst, value });
        Ok(())
    }

    fn compare(&self, state: &mut BlockState, ty: SlotType, op: CompareOp) -> Result<(), Error> {
        let rhs = state.pop_expect(ty)?;
        let lhs = state.pop_expect(ty)?;
        let dst = state.push(SlotType::Int)?;
        state.stmts.push(Stmt::Compare { op, dst, lhs, rhs });
        Ok(())
    }

    /// Categories of the top `count` stack values, top first
    fn categories(&self, state: &BlockState, count: usize) -> Result<Vec<u8>, Error> {
        let mut categories = vec![];
        for depth in 0..count {
            let var = state.peek(depth)?;
            categories.push(if var.ty.is_wide() { 2 } else { 1 });
        }
        Ok(categories)
    }

    /// Check the categories of the top stack values (top first)
    fn expect_categories(&self, state: &BlockState, expected: &[u8]) -> Result<(), Error> {
        let found = self.categories(state, expected.len())?;
        if found != expected {
            return Err(Error::type_inference(
                state.offset,
                format!(
                    "stack shuffle needs value categories {:?} but found {:?}",
                    expected, found
                ),
            ));
        }
        Ok(())
    }

    fn translate_branch(
        &mut self,
        state: &mut BlockState,
        branch: &BranchInstruction,
        info: &BlockInfo,
        exits: &mut Vec<(Offset, Frame)>,
    ) -> Result<Terminator, Error> {
        let offset = state.offset;
        let next = info.end;
        let terminator = match branch {
            BranchInstruction::If(cmp, target) => {
                let value = state.pop_expect(SlotType::Int)?;
                conditional(Condition::Zero(*cmp, value), *target, next)
            }
            BranchInstruction::IfICmp(cmp, target) => {
                let rhs = state.pop_expect(SlotType::Int)?;
                let lhs = state.pop_expect(SlotType::Int)?;
                conditional(Condition::IntCompare(*cmp, lhs, rhs), *target, next)
            }
            BranchInstruction::IfACmp(cmp, target) => {
                let rhs = state.pop_expect(SlotType::Ref)?;
                let lhs = state.pop_expect(SlotType::Ref)?;
                let same = state.push(SlotType::Int)?;
                state.bridge(BridgeCall::SameObject, vec![lhs, rhs], Some(same));
                state.pop()?;
                let cmp = match cmp {
                    EqComparison::EQ => OrdComparison::NE,
                    EqComparison::NE => OrdComparison::EQ,
                };
                conditional(Condition::Zero(cmp, same), *target, next)
            }
            BranchInstruction::IfNull(cmp, target) => {
                let value = state.pop_expect(SlotType::Ref)?;
                conditional(Condition::Null(*cmp, value), *target, next)
            }
            BranchInstruction::Goto(target) => Terminator::Goto(*target),
            BranchInstruction::TableSwitch {
                default,
                low,
                targets,
            } => {
                let key = state.pop_expect(SlotType::Int)?;
                Terminator::Switch {
                    key,
                    table: SwitchTable::from_table(*low, targets, *default),
                }
            }
            BranchInstruction::LookupSwitch { default, targets } => {
                let key = state.pop_expect(SlotType::Int)?;
                Terminator::Switch {
                    key,
                    table: SwitchTable::from_lookup(targets, *default),
                }
            }
            BranchInstruction::Return(kind) => {
                let expected = self
                    .method
                    .descriptor
                    .return_type
                    .as_ref()
                    .map(SlotType::from_field_type);
                let found = kind.map(SlotType::from_value_kind);
                if expected != found {
                    return Err(Error::type_inference(
                        offset,
                        format!("{:?} return from a method returning {:?}", found, expected),
                    ));
                }
                match found {
                    Some(ty) => Terminator::Return(Some(state.pop_expect(ty)?)),
                    None => Terminator::Return(None),
                }
            }
            BranchInstruction::AThrow => {
                let value = state.pop_expect(SlotType::Ref)?;
                Terminator::Throw {
                    value,
                    unwind: state.unwind,
                }
            }
            BranchInstruction::Jsr(_) | BranchInstruction::Ret(_) => {
                return Err(self.unsupported(offset, branch))
            }
        };
        for target in terminator.successors() {
            exits.push((target, state.frame.clone()));
        }
        Ok(terminator)
    }

    /// Dispatchers for the regions reachable code can throw from
    ///
    /// The rest are left empty so they reference neither symbols nor unreachable handlers.
    fn dispatchers(&mut self, blocks: &[Block]) -> Vec<Dispatcher> {
        let mut used = BTreeSet::new();
        let mut mark = |unwind: &Unwind| {
            if let Unwind::Dispatch(idx) = unwind {
                used.insert(*idx);
            }
        };
        for block in blocks {
            for stmt in &block.stmts {
                if let Stmt::Bridge { unwind, .. } = stmt {
                    mark(unwind);
                }
            }
            if let Terminator::Throw { unwind, .. } = &block.terminator {
                mark(unwind);
            }
        }
        let mut pending: Vec<usize> = used.iter().copied().collect();
        while let Some(idx) = pending.pop() {
            if let Some(parent) = self.regions.dispatchers[idx].fallback {
                if used.insert(parent) {
                    pending.push(parent);
                }
            }
        }

        let plans = self.regions.dispatchers.clone();
        plans
            .into_iter()
            .enumerate()
            .map(|(idx, plan)| {
                if !used.contains(&idx) {
                    return Dispatcher {
                        handlers: vec![],
                        fallback: None,
                    };
                }
                let handlers = plan
                    .handlers
                    .iter()
                    .map(|(catch_type, handler)| {
                        let class = catch_type
                            .as_ref()
                            .map(|class| self.symbols.class(self.pool, class.as_str()));
                        (class, *handler)
                    })
                    .collect();
                Dispatcher {
                    handlers,
                    fallback: plan.fallback,
                }
            })
            .collect()
    }
}

fn integral(kind: IntegralKind) -> SlotType {
    match kind {
        IntegralKind::Int => SlotType::Int,
        IntegralKind::Long => SlotType::Long,
    }
}

fn conditional(condition: Condition, target: Offset, otherwise: Offset) -> Terminator {
    Terminator::Branch {
        condition,
        target,
        otherwise,
    }
}
