//! In-process execution of translated methods
//!
//! The evaluator runs [`NativeMethod`]s with the same semantics the generated C++ has: the same
//! per-symbol lazy caches, the same dispatcher walk, and the same treatment of every operation
//! that goes through the bridge. It is what lets translated code be checked against the
//! behaviour of the original bytecode without a C++ toolchain or a JVM.

use super::{
    BinaryOp, BridgeCall, ClassId, CompareOp, Condition, Constant, FieldId, InvokeKind, MethodId,
    NativeClass, NativeMethod, Place, SlotType, Stmt, StringId, Terminator, Unwind, Var,
};
use crate::bridge::{ClassHandle, LazyHandle, MemberHandle, ObjectRef, RuntimeBridge, Thrown, Value};
use crate::jvm::{BaseType, BinaryName, Conversion, EqComparison, FieldType, OrdComparison};
use crate::util::Offset;
use std::cmp::Ordering;
use std::fmt;

/// How a method run ended
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Completion {
    /// `None` for `void` methods
    Return(Option<Value>),
    /// Exception left pending for the caller
    Throw(Thrown),
}

/// Translated code that cannot be run (these indicate a bug in translation, not in the program)
#[derive(Clone, PartialEq, Debug)]
pub enum EvalError {
    UnknownMethod(usize),
    MissingBlock(Offset),
    MissingDispatcher(usize),
    EmptyMethod,
    UninitializedSlot(Place),
    TypeMismatch { place: Place, expected: SlotType },
    BadArguments(String),
    BadPoolEntry(usize),
    OutOfFuel,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnknownMethod(index) => write!(f, "no translated method {}", index),
            EvalError::MissingBlock(label) => write!(f, "no block at {}", label),
            EvalError::MissingDispatcher(index) => write!(f, "no dispatcher {}", index),
            EvalError::EmptyMethod => write!(f, "method has no blocks"),
            EvalError::UninitializedSlot(place) => write!(f, "read of unset slot {:?}", place),
            EvalError::TypeMismatch { place, expected } => {
                write!(f, "slot {:?} does not hold a {:?}", place, expected)
            }
            EvalError::BadArguments(msg) => write!(f, "bad arguments: {}", msg),
            EvalError::BadPoolEntry(index) => write!(f, "protected pool entry {} is unusable", index),
            EvalError::OutOfFuel => write!(f, "step limit reached"),
        }
    }
}

impl std::error::Error for EvalError {}

enum Fault {
    Thrown(Thrown),
    Error(EvalError),
}

impl From<Thrown> for Fault {
    fn from(thrown: Thrown) -> Fault {
        Fault::Thrown(thrown)
    }
}

impl From<EvalError> for Fault {
    fn from(err: EvalError) -> Fault {
        Fault::Error(err)
    }
}

enum Control {
    Jump(Offset),
    Complete(Completion),
}

struct Frame {
    stack: Vec<Option<Value>>,
    locals: Vec<Option<Value>>,
}

impl Frame {
    fn slot(&mut self, place: Place) -> &mut Option<Value> {
        match place {
            Place::Stack(offset) => &mut self.stack[offset as usize],
            Place::Local(index) => &mut self.locals[index as usize],
        }
    }

    fn read(&mut self, var: Var) -> Result<Value, EvalError> {
        match *self.slot(var.place) {
            None => Err(EvalError::UninitializedSlot(var.place)),
            Some(value) if value.slot_type() == var.ty => Ok(value),
            Some(_) => Err(EvalError::TypeMismatch {
                place: var.place,
                expected: var.ty,
            }),
        }
    }

    fn int(&mut self, var: Var) -> Result<i32, EvalError> {
        match self.read(var)? {
            Value::Int(i) => Ok(i),
            _ => Err(mismatch(var)),
        }
    }

    fn long(&mut self, var: Var) -> Result<i64, EvalError> {
        match self.read(var)? {
            Value::Long(l) => Ok(l),
            _ => Err(mismatch(var)),
        }
    }

    fn reference(&mut self, var: Var) -> Result<Option<ObjectRef>, EvalError> {
        match self.read(var)? {
            Value::Ref(r) => Ok(r),
            _ => Err(mismatch(var)),
        }
    }

    fn write(&mut self, var: Var, value: Value) {
        *self.slot(var.place) = Some(value);
    }
}

fn mismatch(var: Var) -> EvalError {
    EvalError::TypeMismatch {
        place: var.place,
        expected: var.ty,
    }
}

/// Runs the translated methods of one class
///
/// Resolved handles are cached for the lifetime of the evaluator, just like the cache slots of
/// a generated unit live for the lifetime of the loaded library.
pub struct Evaluator<'a, R: RuntimeBridge> {
    class: &'a NativeClass,
    bridge: &'a mut R,
    classes: Vec<LazyHandle<ClassHandle>>,
    methods: Vec<LazyHandle<MemberHandle>>,
    fields: Vec<LazyHandle<MemberHandle>>,
    strings: Vec<LazyHandle<ObjectRef>>,
    fuel: Option<u64>,
}

impl<'a, R: RuntimeBridge> Evaluator<'a, R> {
    pub fn new(class: &'a NativeClass, bridge: &'a mut R) -> Evaluator<'a, R> {
        let symbols = &class.symbols;
        Evaluator {
            class,
            bridge,
            classes: symbols.classes.iter().map(|_| LazyHandle::new()).collect(),
            methods: symbols.methods.iter().map(|_| LazyHandle::new()).collect(),
            fields: symbols.fields.iter().map(|_| LazyHandle::new()).collect(),
            strings: symbols.strings.iter().map(|_| LazyHandle::new()).collect(),
            fuel: None,
        }
    }

    /// Give up after executing this many blocks
    pub fn with_fuel(mut self, blocks: u64) -> Self {
        self.fuel = Some(blocks);
        self
    }

    pub fn bridge(&mut self) -> &mut R {
        self.bridge
    }

    /// Run a translated method
    ///
    /// For instance methods, `args` starts with the receiver.
    pub fn run(&mut self, method_index: usize, args: &[Value]) -> Result<Completion, EvalError> {
        let class = self.class;
        let method = class
            .method(method_index)
            .ok_or(EvalError::UnknownMethod(method_index))?;
        let mut frame = self.enter(method, args)?;

        let mut label = method
            .blocks
            .first()
            .map(|block| block.label)
            .ok_or(EvalError::EmptyMethod)?;
        loop {
            if let Some(fuel) = self.fuel.as_mut() {
                *fuel = fuel.checked_sub(1).ok_or(EvalError::OutOfFuel)?;
            }
            let block = method.block(label).ok_or(EvalError::MissingBlock(label))?;

            let mut control = None;
            for stmt in &block.stmts {
                match self.execute(stmt, &mut frame) {
                    Ok(()) => (),
                    Err(Fault::Error(err)) => return Err(err),
                    Err(Fault::Thrown(thrown)) => {
                        let unwind = match stmt {
                            Stmt::Bridge { unwind, .. } => *unwind,
                            _ => Unwind::Return,
                        };
                        control = Some(self.unwind(method, thrown, unwind, &mut frame)?);
                        break;
                    }
                }
            }
            let control = match control {
                Some(control) => control,
                None => self.terminate(method, &block.terminator, &mut frame)?,
            };
            match control {
                Control::Jump(target) => label = target,
                Control::Complete(completion) => return Ok(completion),
            }
        }
    }

    fn enter(&self, method: &NativeMethod, args: &[Value]) -> Result<Frame, EvalError> {
        let mut frame = Frame {
            stack: vec![None; method.stack_size.max(1) as usize],
            locals: vec![None; method.max_locals.max(1) as usize],
        };
        let receiver = usize::from(!method.is_static);
        if args.len() != method.descriptor.parameters.len() + receiver {
            return Err(EvalError::BadArguments(format!(
                "{} expects {} arguments but got {}",
                method.name,
                method.descriptor.parameters.len() + receiver,
                args.len()
            )));
        }

        let mut slot = 0;
        if !method.is_static {
            if args[0].slot_type() != SlotType::Ref {
                return Err(EvalError::BadArguments(String::from("receiver is not a reference")));
            }
            frame.locals[0] = Some(args[0]);
            slot = 1;
        }
        for (parameter, arg) in method.descriptor.parameters.iter().zip(&args[receiver..]) {
            let ty = SlotType::from_field_type(parameter);
            if arg.slot_type() != ty {
                return Err(EvalError::BadArguments(format!(
                    "expected {:?} but got {:?}",
                    ty, arg
                )));
            }
            if slot >= frame.locals.len() {
                return Err(EvalError::BadArguments(String::from("arguments overflow the locals")));
            }
            frame.locals[slot] = Some(*arg);
            slot += if ty.is_wide() { 2 } else { 1 };
        }
        Ok(frame)
    }

    fn pool_str(&self, index: usize) -> Result<String, EvalError> {
        self.class
            .pool
            .decode_str(index)
            .ok_or(EvalError::BadPoolEntry(index))
    }

    fn class_handle(&mut self, id: ClassId) -> Result<ClassHandle, Fault> {
        let name = self.pool_str(self.class.symbols.classes[id.0])?;
        let bridge = &mut *self.bridge;
        let handle = self.classes[id.0].get_or_resolve(|| bridge.find_class(&name))?;
        Ok(*handle)
    }

    fn method_handle(&mut self, id: MethodId) -> Result<MemberHandle, Fault> {
        let symbol = self.class.symbols.methods[id.0];
        let class = self.class_handle(symbol.class)?;
        let name = self.pool_str(symbol.name)?;
        let descriptor = self.pool_str(symbol.descriptor)?;
        let bridge = &mut *self.bridge;
        let handle = self.methods[id.0].get_or_resolve(|| {
            bridge.method_id(class, &name, &descriptor, symbol.is_static)
        })?;
        Ok(*handle)
    }

    fn field_handle(&mut self, id: FieldId) -> Result<MemberHandle, Fault> {
        let symbol = self.class.symbols.fields[id.0];
        let class = self.class_handle(symbol.class)?;
        let name = self.pool_str(symbol.name)?;
        let descriptor = self.pool_str(symbol.descriptor)?;
        let bridge = &mut *self.bridge;
        let handle = self.fields[id.0]
            .get_or_resolve(|| bridge.field_id(class, &name, &descriptor, symbol.is_static))?;
        Ok(*handle)
    }

    fn string(&mut self, id: StringId) -> Result<ObjectRef, Fault> {
        let value = self.pool_str(self.class.symbols.strings[id.0])?;
        let bridge = &mut *self.bridge;
        let string = self.strings[id.0].get_or_resolve(|| bridge.load_string(&value))?;
        Ok(*string)
    }

    fn protected_constant(&self, index: usize, ty: SlotType) -> Result<Value, EvalError> {
        let bytes = self
            .class
            .pool
            .decode(index)
            .ok_or(EvalError::BadPoolEntry(index))?;
        let bad = || EvalError::BadPoolEntry(index);
        let value = match ty {
            SlotType::Int => Value::Int(i32::from_be_bytes(bytes.try_into().map_err(|_| bad())?)),
            SlotType::Float => Value::Float(f32::from_bits(u32::from_be_bytes(
                bytes.try_into().map_err(|_| bad())?,
            ))),
            SlotType::Long => Value::Long(i64::from_be_bytes(bytes.try_into().map_err(|_| bad())?)),
            SlotType::Double => Value::Double(f64::from_bits(u64::from_be_bytes(
                bytes.try_into().map_err(|_| bad())?,
            ))),
            SlotType::Ref | SlotType::Top => return Err(bad()),
        };
        Ok(value)
    }

    fn execute(&mut self, stmt: &Stmt, frame: &mut Frame) -> Result<(), Fault> {
        match stmt {
            Stmt::Const { dst, value } => {
                let value = match *value {
                    Constant::Int(i) => Value::Int(i),
                    Constant::Long(l) => Value::Long(l),
                    Constant::Float(f) => Value::Float(f),
                    Constant::Double(d) => Value::Double(d),
                    Constant::Null => Value::Ref(None),
                    Constant::Protected { index, ty } => self.protected_constant(index, ty)?,
                };
                frame.write(*dst, value);
            }
            Stmt::Move { dst, src } => {
                let value = frame.read(*src)?;
                frame.write(*dst, value);
            }
            Stmt::Binary { op, dst, lhs, rhs } => {
                let value = binary(*op, frame.read(*lhs)?, frame.read(*rhs)?)
                    .ok_or_else(|| mismatch(*rhs))?;
                frame.write(*dst, value);
            }
            Stmt::Negate { dst, src } => {
                let value = match frame.read(*src)? {
                    Value::Int(i) => Value::Int(i.wrapping_neg()),
                    Value::Long(l) => Value::Long(l.wrapping_neg()),
                    Value::Float(f) => Value::Float(-f),
                    Value::Double(d) => Value::Double(-d),
                    Value::Ref(_) => return Err(mismatch(*src).into()),
                };
                frame.write(*dst, value);
            }
            Stmt::Convert {
                conversion,
                dst,
                src,
            } => {
                let value =
                    convert(*conversion, frame.read(*src)?).ok_or_else(|| mismatch(*src))?;
                frame.write(*dst, value);
            }
            Stmt::Compare { op, dst, lhs, rhs } => {
                let ordering = match (frame.read(*lhs)?, frame.read(*rhs)?) {
                    (Value::Long(a), Value::Long(b)) => Some(a.cmp(&b)),
                    (Value::Float(a), Value::Float(b)) => a.partial_cmp(&b),
                    (Value::Double(a), Value::Double(b)) => a.partial_cmp(&b),
                    _ => return Err(mismatch(*rhs).into()),
                };
                let result = match ordering {
                    Some(Ordering::Less) => -1,
                    Some(Ordering::Equal) => 0,
                    Some(Ordering::Greater) => 1,
                    None if matches!(op, CompareOp::FCmpG | CompareOp::DCmpG) => 1,
                    None => -1,
                };
                frame.write(*dst, Value::Int(result));
            }
            Stmt::IInc { local, delta } => {
                let var = Var::local(*local, SlotType::Int);
                let value = frame.int(var)?.wrapping_add(*delta);
                frame.write(var, Value::Int(value));
            }
            Stmt::Bridge {
                call, args, dst, ..
            } => {
                let result = self.bridge_call(*call, args, frame)?;
                if let (Some(dst), Some(value)) = (dst, result) {
                    frame.write(*dst, value);
                }
            }
        }
        Ok(())
    }

    fn bridge_call(
        &mut self,
        call: BridgeCall,
        args: &[Var],
        frame: &mut Frame,
    ) -> Result<Option<Value>, Fault> {
        let arg = |idx: usize| {
            args.get(idx)
                .copied()
                .ok_or_else(|| EvalError::BadArguments(format!("{:?} is missing operand {}", call, idx)))
        };
        let value = match call {
            BridgeCall::Allocate(class) => {
                let class = self.class_handle(class)?;
                Some(Value::Ref(Some(self.bridge.allocate(class)?)))
            }
            BridgeCall::Invoke {
                kind,
                class,
                method,
            } => {
                let method = self.method_handle(method)?;
                let class = self.class_handle(class)?;
                let (receiver, params) = match kind {
                    InvokeKind::Static => (None, args),
                    _ => (
                        Some(frame.reference(arg(0)?)?),
                        args.get(1..).unwrap_or_default(),
                    ),
                };
                let values = params
                    .iter()
                    .map(|param| frame.read(*param))
                    .collect::<Result<Vec<_>, _>>()?;
                self.bridge.invoke(kind, class, method, receiver, &values)?
            }
            BridgeCall::GetField(field) => {
                let object = frame.reference(arg(0)?)?;
                let field = self.field_handle(field)?;
                Some(self.bridge.get_field(object, field)?)
            }
            BridgeCall::SetField(field) => {
                let object = frame.reference(arg(0)?)?;
                let value = frame.read(arg(1)?)?;
                let field = self.field_handle(field)?;
                self.bridge.set_field(object, field, value)?;
                None
            }
            BridgeCall::GetStatic(class, field) => {
                let field = self.field_handle(field)?;
                let class = self.class_handle(class)?;
                Some(self.bridge.get_static(class, field)?)
            }
            BridgeCall::SetStatic(class, field) => {
                let value = frame.read(arg(0)?)?;
                let field = self.field_handle(field)?;
                let class = self.class_handle(class)?;
                self.bridge.set_static(class, field, value)?;
                None
            }
            BridgeCall::MonitorEnter => {
                self.bridge.monitor_enter(frame.reference(arg(0)?)?)?;
                None
            }
            BridgeCall::MonitorExit => {
                self.bridge.monitor_exit(frame.reference(arg(0)?)?)?;
                None
            }
            BridgeCall::NewArray(element) => {
                let length = frame.int(arg(0)?)?;
                Some(Value::Ref(Some(self.bridge.new_array(element, length)?)))
            }
            BridgeCall::NewObjectArray(class) => {
                let length = frame.int(arg(0)?)?;
                let class = self.class_handle(class)?;
                Some(Value::Ref(Some(self.bridge.new_object_array(class, length)?)))
            }
            BridgeCall::NewMultiArray(class) => {
                let lengths = args
                    .iter()
                    .map(|length| frame.int(*length))
                    .collect::<Result<Vec<_>, _>>()?;
                let class = self.class_handle(class)?;
                Some(Value::Ref(Some(self.bridge.new_multi_array(class, &lengths)?)))
            }
            BridgeCall::ArrayLength => {
                let array = frame.reference(arg(0)?)?;
                Some(Value::Int(self.bridge.array_length(array)?))
            }
            BridgeCall::ArrayLoad(kind) => {
                let array = frame.reference(arg(0)?)?;
                let index = frame.int(arg(1)?)?;
                Some(self.bridge.array_load(array, index, kind)?)
            }
            BridgeCall::ArrayStore(kind) => {
                let array = frame.reference(arg(0)?)?;
                let index = frame.int(arg(1)?)?;
                let value = frame.read(arg(2)?)?;
                self.bridge.array_store(array, index, kind, value)?;
                None
            }
            BridgeCall::CheckCast(class) => {
                let object = frame.reference(arg(0)?)?;
                let class = self.class_handle(class)?;
                self.bridge.check_cast(object, class)?;
                Some(Value::Ref(object))
            }
            BridgeCall::InstanceOf(class) => {
                let object = frame.reference(arg(0)?)?;
                let class = self.class_handle(class)?;
                Some(Value::Int(i32::from(self.bridge.is_instance_of(object, class))))
            }
            BridgeCall::LoadString(string) => Some(Value::Ref(Some(self.string(string)?))),
            BridgeCall::LoadClass(class) => {
                let class = self.class_handle(class)?;
                Some(Value::Ref(Some(self.bridge.load_class(class)?)))
            }
            BridgeCall::SameObject => {
                let a = frame.reference(arg(0)?)?;
                let b = frame.reference(arg(1)?)?;
                Some(Value::Int(i32::from(self.bridge.same_object(a, b))))
            }
            BridgeCall::IntDiv | BridgeCall::IntRem => {
                let a = frame.int(arg(0)?)?;
                let b = frame.int(arg(1)?)?;
                if b == 0 {
                    return Err(self.divide_by_zero().into());
                }
                Some(Value::Int(if call == BridgeCall::IntDiv {
                    a.wrapping_div(b)
                } else {
                    a.wrapping_rem(b)
                }))
            }
            BridgeCall::LongDiv | BridgeCall::LongRem => {
                let a = frame.long(arg(0)?)?;
                let b = frame.long(arg(1)?)?;
                if b == 0 {
                    return Err(self.divide_by_zero().into());
                }
                Some(Value::Long(if call == BridgeCall::LongDiv {
                    a.wrapping_div(b)
                } else {
                    a.wrapping_rem(b)
                }))
            }
        };
        Ok(value)
    }

    fn divide_by_zero(&mut self) -> Thrown {
        self.bridge
            .throw_new(&BinaryName::ARITHMETICEXCEPTION, "/ by zero")
    }

    fn terminate(
        &mut self,
        method: &NativeMethod,
        terminator: &Terminator,
        frame: &mut Frame,
    ) -> Result<Control, EvalError> {
        let control = match terminator {
            Terminator::Goto(target) | Terminator::FallThrough(target) => Control::Jump(*target),
            Terminator::Branch {
                condition,
                target,
                otherwise,
            } => {
                let taken = match condition {
                    Condition::Zero(cmp, value) => ord_holds(*cmp, frame.int(*value)?.cmp(&0)),
                    Condition::IntCompare(cmp, lhs, rhs) => {
                        ord_holds(*cmp, frame.int(*lhs)?.cmp(&frame.int(*rhs)?))
                    }
                    Condition::Null(cmp, value) => {
                        let is_null = frame.reference(*value)?.is_none();
                        is_null == (*cmp == EqComparison::EQ)
                    }
                };
                Control::Jump(if taken { *target } else { *otherwise })
            }
            Terminator::Switch { key, table } => Control::Jump(table.target(frame.int(*key)?)),
            Terminator::Return(None) => Control::Complete(Completion::Return(None)),
            Terminator::Return(Some(value)) => {
                let value = narrow_return(method, frame.read(*value)?);
                Control::Complete(Completion::Return(Some(value)))
            }
            Terminator::Throw { value, unwind } => {
                let object = frame.reference(*value)?;
                let thrown = self.bridge.throw_object(object);
                self.unwind(method, thrown, *unwind, frame)?
            }
        };
        Ok(control)
    }

    /// Walk the dispatcher chain the way the generated `D<n>`/`T<n>` labels do
    fn unwind(
        &mut self,
        method: &NativeMethod,
        thrown: Thrown,
        unwind: Unwind,
        frame: &mut Frame,
    ) -> Result<Control, EvalError> {
        let mut current = match unwind {
            Unwind::Return => return Ok(Control::Complete(Completion::Throw(thrown))),
            Unwind::Dispatch(dispatcher) => dispatcher,
        };
        frame.stack[0] = Some(Value::Ref(Some(thrown.0)));
        loop {
            let dispatcher = method
                .dispatchers
                .get(current)
                .ok_or(EvalError::MissingDispatcher(current))?;
            for (catch_type, handler) in &dispatcher.handlers {
                let class = match catch_type {
                    None => return Ok(Control::Jump(*handler)),
                    Some(class) => *class,
                };
                match self.class_handle(class) {
                    Ok(class) => {
                        if self.bridge.is_instance_of(Some(thrown.0), class) {
                            return Ok(Control::Jump(*handler));
                        }
                    }
                    Err(Fault::Thrown(failure)) => {
                        return Ok(Control::Complete(Completion::Throw(failure)))
                    }
                    Err(Fault::Error(err)) => return Err(err),
                }
            }
            match dispatcher.fallback {
                Some(parent) => current = parent,
                None => return Ok(Control::Complete(Completion::Throw(thrown))),
            }
        }
    }
}

fn ord_holds(cmp: OrdComparison, ordering: Ordering) -> bool {
    match cmp {
        OrdComparison::EQ => ordering == Ordering::Equal,
        OrdComparison::NE => ordering != Ordering::Equal,
        OrdComparison::LT => ordering == Ordering::Less,
        OrdComparison::GE => ordering != Ordering::Less,
        OrdComparison::GT => ordering == Ordering::Greater,
        OrdComparison::LE => ordering != Ordering::Greater,
    }
}

/// Same truncation as the casts on `return` in generated code
fn narrow_return(method: &NativeMethod, value: Value) -> Value {
    match (&method.descriptor.return_type, value) {
        (Some(FieldType::Base(BaseType::Boolean)), Value::Int(i)) => Value::Int(i as u8 as i32),
        (Some(FieldType::Base(BaseType::Byte)), Value::Int(i)) => Value::Int(i as i8 as i32),
        (Some(FieldType::Base(BaseType::Char)), Value::Int(i)) => Value::Int(i as u16 as i32),
        (Some(FieldType::Base(BaseType::Short)), Value::Int(i)) => Value::Int(i as i16 as i32),
        (_, value) => value,
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Option<Value> {
    let value = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Value::Int(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div | BinaryOp::Rem => return None,
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
            BinaryOp::Xor => a ^ b,
            BinaryOp::Shl => a.wrapping_shl(b as u32),
            BinaryOp::Shr => a.wrapping_shr(b as u32),
            BinaryOp::UShr => (a as u32).wrapping_shr(b as u32) as i32,
        }),
        (Value::Long(a), Value::Long(b)) => Value::Long(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
            BinaryOp::Xor => a ^ b,
            _ => return None,
        }),
        (Value::Long(a), Value::Int(b)) => Value::Long(match op {
            BinaryOp::Shl => a.wrapping_shl(b as u32),
            BinaryOp::Shr => a.wrapping_shr(b as u32),
            BinaryOp::UShr => (a as u64).wrapping_shr(b as u32) as i64,
            _ => return None,
        }),
        (Value::Float(a), Value::Float(b)) => Value::Float(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Rem => a % b,
            _ => return None,
        }),
        (Value::Double(a), Value::Double(b)) => Value::Double(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Rem => a % b,
            _ => return None,
        }),
        _ => return None,
    };
    Some(value)
}

/// Float to integer `as` casts saturate and send NaN to zero, exactly like `f2i` and friends
fn convert(conversion: Conversion, value: Value) -> Option<Value> {
    let converted = match (conversion, value) {
        (Conversion::I2L, Value::Int(i)) => Value::Long(i as i64),
        (Conversion::I2F, Value::Int(i)) => Value::Float(i as f32),
        (Conversion::I2D, Value::Int(i)) => Value::Double(i as f64),
        (Conversion::I2B, Value::Int(i)) => Value::Int(i as i8 as i32),
        (Conversion::I2C, Value::Int(i)) => Value::Int(i as u16 as i32),
        (Conversion::I2S, Value::Int(i)) => Value::Int(i as i16 as i32),
        (Conversion::L2I, Value::Long(l)) => Value::Int(l as i32),
        (Conversion::L2F, Value::Long(l)) => Value::Float(l as f32),
        (Conversion::L2D, Value::Long(l)) => Value::Double(l as f64),
        (Conversion::F2I, Value::Float(f)) => Value::Int(f as i32),
        (Conversion::F2L, Value::Float(f)) => Value::Long(f as i64),
        (Conversion::F2D, Value::Float(f)) => Value::Double(f as f64),
        (Conversion::D2I, Value::Double(d)) => Value::Int(d as i32),
        (Conversion::D2L, Value::Double(d)) => Value::Long(d as i64),
        (Conversion::D2F, Value::Double(d)) => Value::Float(d as f32),
        _ => return None,
    };
    Some(converted)
}
