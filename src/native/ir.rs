use super::{ClassId, FieldId, MethodId, StringId, SymbolTable};
use crate::jvm::{
    ArrayKind, BaseType, BinaryName, Conversion, EqComparison, FieldType, MethodDescriptor,
    NumericKind, OrdComparison, UnqualifiedName, ValueKind,
};
use crate::bridge::BridgeOp;
use crate::jvm::class_file::ConstantIndex;
use crate::protect::ProtectedPool;
use crate::util::{Offset, Width};

/// Computational type of a stack or local slot
///
/// `boolean`, `byte`, `char`, and `short` are all `Int`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum SlotType {
    Int,
    Float,
    Long,
    Double,
    Ref,
    /// Unusable (unassigned, second half of a wide value, or conflicting assignments)
    Top,
}

impl SlotType {
    pub fn from_value_kind(kind: ValueKind) -> SlotType {
        match kind {
            ValueKind::Int => SlotType::Int,
            ValueKind::Long => SlotType::Long,
            ValueKind::Float => SlotType::Float,
            ValueKind::Double => SlotType::Double,
            ValueKind::Reference => SlotType::Ref,
        }
    }

    pub fn from_numeric_kind(kind: NumericKind) -> SlotType {
        match kind {
            NumericKind::Int => SlotType::Int,
            NumericKind::Long => SlotType::Long,
            NumericKind::Float => SlotType::Float,
            NumericKind::Double => SlotType::Double,
        }
    }

    pub fn from_array_kind(kind: ArrayKind) -> SlotType {
        match kind {
            ArrayKind::Long => SlotType::Long,
            ArrayKind::Float => SlotType::Float,
            ArrayKind::Double => SlotType::Double,
            ArrayKind::Reference => SlotType::Ref,
            ArrayKind::Int | ArrayKind::ByteOrBoolean | ArrayKind::Char | ArrayKind::Short => {
                SlotType::Int
            }
        }
    }

    pub fn from_base_type(base: BaseType) -> SlotType {
        match base {
            BaseType::Long => SlotType::Long,
            BaseType::Float => SlotType::Float,
            BaseType::Double => SlotType::Double,
            _ => SlotType::Int,
        }
    }

    pub fn from_field_type<C>(field_type: &FieldType<C>) -> SlotType {
        match field_type {
            FieldType::Base(base) => SlotType::from_base_type(*base),
            FieldType::Ref(_) => SlotType::Ref,
        }
    }

    /// `long` and `double` are category 2
    pub fn is_wide(self) -> bool {
        matches!(self, SlotType::Long | SlotType::Double)
    }

    /// Member of the `jvalue` union holding this type
    pub fn jvalue_member(self) -> char {
        match self {
            SlotType::Int | SlotType::Top => 'i',
            SlotType::Float => 'f',
            SlotType::Long => 'j',
            SlotType::Double => 'd',
            SlotType::Ref => 'l',
        }
    }
}

impl Width for SlotType {
    fn width(&self) -> usize {
        if self.is_wide() {
            2
        } else {
            1
        }
    }
}

/// Storage location in the native frame
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Place {
    /// Operand stack slot at this stack offset
    Stack(u16),
    /// Local variable slot
    Local(u16),
}

/// Typed place
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Var {
    pub place: Place,
    pub ty: SlotType,
}

impl Var {
    pub fn stack(offset: u16, ty: SlotType) -> Var {
        Var {
            place: Place::Stack(offset),
            ty,
        }
    }

    pub fn local(index: u16, ty: SlotType) -> Var {
        Var {
            place: Place::Local(index),
            ty,
        }
    }
}

/// Constant values materialized directly
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    /// Numeric constant stored big-endian in the class's protected pool
    Protected { index: usize, ty: SlotType },
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Only ever `float` or `double` (integer division goes through the bridge)
    Div,
    /// Only ever `float` or `double` (integer remainder goes through the bridge)
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    UShr,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum CompareOp {
    LCmp,
    FCmpL,
    FCmpG,
    DCmpL,
    DCmpG,
}

/// Where control goes when a statement leaves an exception pending
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Unwind {
    /// Index into [`NativeMethod::dispatchers`]
    Dispatch(usize),
    /// Leave the exception pending and return a zero value
    Return,
}

/// Operations that go through the runtime bridge
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BridgeCall {
    Allocate(ClassId),
    /// Arguments are the receiver (except for static calls) followed by the parameters
    Invoke {
        kind: InvokeKind,
        class: ClassId,
        method: MethodId,
    },
    GetField(FieldId),
    SetField(FieldId),
    GetStatic(ClassId, FieldId),
    SetStatic(ClassId, FieldId),
    MonitorEnter,
    MonitorExit,
    NewArray(BaseType),
    NewObjectArray(ClassId),
    /// Class is the array type being created
    NewMultiArray(ClassId),
    ArrayLength,
    ArrayLoad(ArrayKind),
    ArrayStore(ArrayKind),
    CheckCast(ClassId),
    InstanceOf(ClassId),
    LoadString(StringId),
    LoadClass(ClassId),
    SameObject,
    IntDiv,
    IntRem,
    LongDiv,
    LongRem,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

impl BridgeCall {
    /// Bridge symbol used to perform the call
    pub fn op(&self) -> BridgeOp {
        match self {
            BridgeCall::Allocate(_) => BridgeOp::Allocate,
            BridgeCall::Invoke { kind, .. } => match kind {
                InvokeKind::Virtual => BridgeOp::InvokeVirtual,
                InvokeKind::Special => BridgeOp::InvokeSpecial,
                InvokeKind::Static => BridgeOp::InvokeStatic,
                InvokeKind::Interface => BridgeOp::InvokeInterface,
            },
            BridgeCall::GetField(_) => BridgeOp::GetField,
            BridgeCall::SetField(_) => BridgeOp::SetField,
            BridgeCall::GetStatic(..) => BridgeOp::GetStatic,
            BridgeCall::SetStatic(..) => BridgeOp::SetStatic,
            BridgeCall::MonitorEnter => BridgeOp::MonitorEnter,
            BridgeCall::MonitorExit => BridgeOp::MonitorExit,
            BridgeCall::NewArray(_) => BridgeOp::NewArray,
            BridgeCall::NewObjectArray(_) => BridgeOp::NewObjectArray,
            BridgeCall::NewMultiArray(_) => BridgeOp::NewMultiArray,
            BridgeCall::ArrayLength => BridgeOp::ArrayLength,
            BridgeCall::ArrayLoad(_) => BridgeOp::ArrayLoad,
            BridgeCall::ArrayStore(_) => BridgeOp::ArrayStore,
            BridgeCall::CheckCast(_) => BridgeOp::CheckCast,
            BridgeCall::InstanceOf(_) => BridgeOp::InstanceOf,
            BridgeCall::LoadString(_) => BridgeOp::LoadString,
            BridgeCall::LoadClass(_) => BridgeOp::LoadClass,
            BridgeCall::SameObject => BridgeOp::SameObject,
            BridgeCall::IntDiv => BridgeOp::IntDiv,
            BridgeCall::IntRem => BridgeOp::IntRem,
            BridgeCall::LongDiv => BridgeOp::LongDiv,
            BridgeCall::LongRem => BridgeOp::LongRem,
        }
    }

    /// Class whose handle must be resolved before the call
    pub fn class(&self) -> Option<ClassId> {
        match self {
            BridgeCall::Allocate(class)
            | BridgeCall::Invoke { class, .. }
            | BridgeCall::GetStatic(class, _)
            | BridgeCall::SetStatic(class, _)
            | BridgeCall::NewObjectArray(class)
            | BridgeCall::NewMultiArray(class)
            | BridgeCall::CheckCast(class)
            | BridgeCall::InstanceOf(class)
            | BridgeCall::LoadClass(class) => Some(*class),
            _ => None,
        }
    }
}

/// Straight-line statement
#[derive(Clone, PartialEq, Debug)]
pub enum Stmt {
    Const {
        dst: Var,
        value: Constant,
    },
    Move {
        dst: Var,
        src: Var,
    },
    Binary {
        op: BinaryOp,
        dst: Var,
        lhs: Var,
        rhs: Var,
    },
    Negate {
        dst: Var,
        src: Var,
    },
    Convert {
        conversion: Conversion,
        dst: Var,
        src: Var,
    },
    Compare {
        op: CompareOp,
        dst: Var,
        lhs: Var,
        rhs: Var,
    },
    IInc {
        local: u16,
        delta: i32,
    },
    /// Runtime bridge call, followed by a pending exception check
    Bridge {
        call: BridgeCall,
        args: Vec<Var>,
        dst: Option<Var>,
        unwind: Unwind,
    },
}

#[derive(Clone, PartialEq, Debug)]
pub enum Condition {
    /// Compare an `int` against zero
    Zero(OrdComparison, Var),
    IntCompare(OrdComparison, Var, Var),
    Null(EqComparison, Var),
}

/// Cases of a `tableswitch` or `lookupswitch`, sorted by key
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SwitchTable {
    pub cases: Vec<(i32, Offset)>,
    pub default: Offset,
}

impl SwitchTable {
    pub fn from_table(low: i32, targets: &[Offset], default: Offset) -> SwitchTable {
        let cases = targets
            .iter()
            .enumerate()
            .map(|(i, target)| (low.wrapping_add(i as i32), *target))
            .collect();
        SwitchTable { cases, default }
    }

    pub fn from_lookup(targets: &[(i32, Offset)], default: Offset) -> SwitchTable {
        let mut cases = targets.to_vec();
        cases.sort_by_key(|(key, _)| *key);
        SwitchTable { cases, default }
    }

    /// Block selected for a key
    pub fn target(&self, key: i32) -> Offset {
        match self.cases.binary_search_by_key(&key, |(case, _)| *case) {
            Ok(idx) => self.cases[idx].1,
            Err(_) => self.default,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Terminator {
    Goto(Offset),
    Branch {
        condition: Condition,
        target: Offset,
        otherwise: Offset,
    },
    Switch {
        key: Var,
        table: SwitchTable,
    },
    Return(Option<Var>),
    Throw {
        value: Var,
        unwind: Unwind,
    },
    /// Continue into the block starting right after this one
    FallThrough(Offset),
}

impl Terminator {
    pub fn successors(&self) -> Vec<Offset> {
        match self {
            Terminator::Goto(target) | Terminator::FallThrough(target) => vec![*target],
            Terminator::Branch {
                target, otherwise, ..
            } => vec![*target, *otherwise],
            Terminator::Switch { table, .. } => std::iter::once(table.default)
                .chain(table.cases.iter().map(|(_, target)| *target))
                .collect(),
            Terminator::Return(_) | Terminator::Throw { .. } => vec![],
        }
    }
}

/// Basic block, labelled by its starting bytecode offset
#[derive(Clone, PartialEq, Debug)]
pub struct Block {
    pub label: Offset,
    pub stmts: Vec<Stmt>,
    pub terminator: Terminator,
}

/// Exception dispatcher
///
/// Stores the pending exception into stack slot 0 and then tries each handler in order. When none
/// accepts the exception, control continues at `fallback` (or the method returns with the
/// exception still pending).
#[derive(Clone, PartialEq, Debug)]
pub struct Dispatcher {
    /// `None` accepts any exception
    pub handlers: Vec<(Option<ClassId>, Offset)>,
    pub fallback: Option<usize>,
}

/// Translated method body
#[derive(Clone, Debug)]
pub struct NativeMethod {
    /// Position of the method in its class (used to name the native function)
    pub index: usize,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub is_static: bool,
    pub max_locals: u16,
    /// Operand stack size, including scratch slots used for stack shuffling
    pub stack_size: u16,
    /// Reachable blocks in bytecode order
    pub blocks: Vec<Block>,
    pub dispatchers: Vec<Dispatcher>,
}

impl NativeMethod {
    /// Extra stack slots past `max_stack` used as scratch space
    pub const SCRATCH_SLOTS: u16 = 4;

    pub fn block(&self, label: Offset) -> Option<&Block> {
        self.blocks
            .binary_search_by_key(&label, |block| block.label)
            .ok()
            .map(|idx| &self.blocks[idx])
    }

    /// Type of the value returned
    pub fn return_type(&self) -> Option<SlotType> {
        self.descriptor
            .return_type
            .as_ref()
            .map(SlotType::from_field_type)
    }
}

/// Native method registered against a Java method
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Registration {
    /// Index of the method in the class and in [`NativeClass::methods`] order
    pub method_index: usize,
    /// Protected pool entries for the `RegisterNatives` name and signature
    pub name: usize,
    pub descriptor: usize,
}

/// Every translated method of a class, along with the per-class tables they share
#[derive(Clone, Debug)]
pub struct NativeClass {
    /// Registration index (also passed by the class's bootstrap code)
    pub index: u32,
    pub name: BinaryName,
    pub methods: Vec<NativeMethod>,
    pub registrations: Vec<Registration>,
    pub symbols: SymbolTable,
    pub pool: ProtectedPool,
    /// Bytecode methods to add to the class, called by the native code
    pub hidden: Vec<HiddenMethod>,
}

/// Private static bytecode method holding one instruction JNI cannot express
///
/// `invokedynamic` call sites and loads of method handles, method types and dynamic constants
/// only exist in bytecode. Each one moves into a method of its own in the same class (so linkage
/// still happens against that class), and the native code calls it as a static method.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct HiddenMethod {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub body: HiddenBody,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum HiddenBody {
    /// Pass every argument on to `invokedynamic` of this call site, returning its result
    InvokeDynamic(ConstantIndex),
    /// Return this loadable constant
    Constant(ConstantIndex),
}

impl NativeClass {
    pub fn method(&self, index: usize) -> Option<&NativeMethod> {
        self.methods.iter().find(|method| method.index == index)
    }
}
