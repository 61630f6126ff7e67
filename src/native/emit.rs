//! Rendering of the native IR as C++ on top of the bridge support header

use super::{
    BinaryOp, Block, BridgeCall, CompareOp, Condition, Constant, CppStringLiteral, CppWriter,
    Dispatcher, InvokeKind, NativeClass, NativeMethod, Place, SlotType, Stmt, Terminator, Unwind,
    Var,
};
use crate::bridge::{BridgeOp, BRIDGE_VERSION, SUPPORT_HEADER_NAME};
use crate::jvm::{
    ArrayKind, BaseType, BinaryName, Conversion, EqComparison, FieldType, Name, OrdComparison,
};
use crate::util::{Offset, Width};
use std::collections::BTreeSet;
use std::io::{Result, Write};

/// Namespace holding the code generated for a class
pub fn class_namespace(index: u32) -> String {
    format!("jvm2native::gen::c{}", index)
}

/// File name of the unit generated for a class
pub fn unit_file_name(index: u32, class: &BinaryName) -> String {
    format!("{}_{}.cpp", index, mangle_jni(class.as_str()))
}

/// Mangle a binary name or method name the way JNI does for `Java_<class>_<method>` symbols
pub fn mangle_jni(name: &str) -> String {
    let mut mangled = String::with_capacity(name.len());
    let mut units = [0u16; 2];
    for c in name.chars() {
        match c {
            '/' => mangled.push('_'),
            '_' => mangled.push_str("_1"),
            ';' => mangled.push_str("_2"),
            '[' => mangled.push_str("_3"),
            c if c.is_ascii_alphanumeric() => mangled.push(c),
            c => {
                for unit in c.encode_utf16(&mut units) {
                    mangled.push_str(&format!("_0{:04x}", unit));
                }
            }
        }
    }
    mangled
}

/// Write the translation unit for a class
///
/// Returns the bridge operations the unit references, for the link check.
pub fn emit_class_unit<W: Write>(
    class: &NativeClass,
    out: &mut CppWriter<W>,
) -> Result<BTreeSet<BridgeOp>> {
    let mut emitter = UnitEmitter {
        class,
        out,
        ops: BTreeSet::new(),
    };
    emitter.emit()?;
    Ok(emitter.ops)
}

struct UnitEmitter<'a, W: Write> {
    class: &'a NativeClass,
    out: &'a mut CppWriter<W>,
    ops: BTreeSet<BridgeOp>,
}

impl<'a, W: Write> UnitEmitter<'a, W> {
    fn emit(&mut self) -> Result<()> {
        let class = self.class;
        writeln!(self.out, "// Generated by jvm2native. Do not edit.")?;
        writeln!(self.out, "#include \"../{}\"", SUPPORT_HEADER_NAME)?;
        self.out.newline()?;
        writeln!(
            self.out,
            "static_assert(NJB_BRIDGE_VERSION == {}, \"jvm2native bridge version mismatch\");",
            BRIDGE_VERSION
        )?;
        self.out.newline()?;

        write!(self.out, "namespace {}", class_namespace(class.index))?;
        self.out.open_curly_block()?;
        write!(self.out, "namespace")?;
        self.out.open_curly_block()?;

        self.emit_pool()?;
        self.emit_caches()?;
        for method in &class.methods {
            self.out.newline()?;
            self.emit_method(method)?;
        }

        self.out.close_curly_block_with(" // namespace")?;
        self.out.newline()?;
        self.emit_registration()?;
        self.out
            .close_curly_block_with(&format!(" // namespace {}", class_namespace(class.index)))?;
        Ok(())
    }

    /// Accessors `s<i>()` for every protected pool entry
    fn emit_pool(&mut self) -> Result<()> {
        let pool = &self.class.pool;
        let encode = pool.protection().encodes_strings();
        for index in 0..pool.len() {
            if encode {
                self.ops.insert(BridgeOp::Decode);
                let encoded = pool.encoded(index).unwrap_or_default();
                let key = pool.key(index).unwrap_or_default();
                write!(self.out, "const unsigned char e{}[] = {{", index)?;
                for byte in &encoded {
                    write!(self.out, "0x{:02x}, ", byte)?;
                }
                writeln!(self.out, "0x00}};")?;
                writeln!(self.out, "std::once_flag o{};", index)?;
                writeln!(self.out, "char d{}[{}];", index, encoded.len() + 1)?;
                writeln!(
                    self.out,
                    "const char* s{}() {{ return njb_decode(&o{0}, d{0}, e{0}, {}, (jlong)0x{:016x}ULL, {0}); }}",
                    index,
                    encoded.len(),
                    key
                )?;
            } else {
                let plain = pool.plain(index).unwrap_or_default();
                writeln!(
                    self.out,
                    "const char* s{}() {{ return {}; }}",
                    index,
                    CppStringLiteral(plain)
                )?;
            }
        }
        Ok(())
    }

    /// Lazily filled handle caches along with their accessors
    fn emit_caches(&mut self) -> Result<()> {
        let symbols = &self.class.symbols;
        if !symbols.classes.is_empty() {
            self.ops.insert(BridgeOp::ResolveClass);
            self.out.newline()?;
            writeln!(self.out, "std::atomic<jclass> classes[{}];", symbols.classes.len())?;
            for (idx, name) in symbols.classes.iter().enumerate() {
                writeln!(
                    self.out,
                    "jclass cls{}(JNIEnv* env) {{ return njb_resolve_class(env, &classes[{0}], s{}()); }}",
                    idx, name
                )?;
            }
        }
        if !symbols.methods.is_empty() {
            self.ops.insert(BridgeOp::ResolveMethod);
            self.out.newline()?;
            writeln!(self.out, "std::atomic<jmethodID> methods[{}];", symbols.methods.len())?;
            for (idx, method) in symbols.methods.iter().enumerate() {
                writeln!(
                    self.out,
                    "jmethodID mid{}(JNIEnv* env) {{ jclass c = cls{}(env); return c == nullptr ? nullptr : njb_resolve_method(env, &methods[{0}], c, s{}(), s{}(), {}); }}",
                    idx,
                    method.class.0,
                    method.name,
                    method.descriptor,
                    jboolean(method.is_static)
                )?;
            }
        }
        if !symbols.fields.is_empty() {
            self.ops.insert(BridgeOp::ResolveField);
            self.out.newline()?;
            writeln!(self.out, "std::atomic<jfieldID> fields[{}];", symbols.fields.len())?;
            for (idx, field) in symbols.fields.iter().enumerate() {
                writeln!(
                    self.out,
                    "jfieldID fid{}(JNIEnv* env) {{ jclass c = cls{}(env); return c == nullptr ? nullptr : njb_resolve_field(env, &fields[{0}], c, s{}(), s{}(), {}); }}",
                    idx,
                    field.class.0,
                    field.name,
                    field.descriptor,
                    jboolean(field.is_static)
                )?;
            }
        }
        if !symbols.strings.is_empty() {
            self.ops.insert(BridgeOp::LoadString);
            self.out.newline()?;
            writeln!(self.out, "std::atomic<jstring> strings[{}];", symbols.strings.len())?;
            for (idx, value) in symbols.strings.iter().enumerate() {
                writeln!(
                    self.out,
                    "jstring str{}(JNIEnv* env) {{ return njb_load_string(env, &strings[{0}], s{}()); }}",
                    idx, value
                )?;
            }
        }
        Ok(())
    }

    fn emit_registration(&mut self) -> Result<()> {
        let class = self.class;
        write!(self.out, "void register_natives(JNIEnv* env, jclass clazz)")?;
        self.out.open_curly_block()?;
        if class.registrations.is_empty() {
            writeln!(self.out, "(void)env;")?;
            writeln!(self.out, "(void)clazz;")?;
        } else {
            write!(self.out, "JNINativeMethod natives[] =")?;
            self.out.open_curly_block()?;
            for registration in &class.registrations {
                writeln!(
                    self.out,
                    "{{const_cast<char*>(s{}()), const_cast<char*>(s{}()), reinterpret_cast<void*>(&m{})}},",
                    registration.name, registration.descriptor, registration.method_index
                )?;
            }
            self.out.close_curly_block_with(";")?;
            writeln!(
                self.out,
                "env->RegisterNatives(clazz, natives, {});",
                class.registrations.len()
            )?;
        }
        self.out.close_curly_block()
    }

    fn emit_method(&mut self, method: &NativeMethod) -> Result<()> {
        write!(
            self.out,
            "{} JNICALL m{}(JNIEnv* env, {}",
            return_c_type(method.descriptor.return_type.as_ref()),
            method.index,
            if method.is_static {
                "jclass"
            } else {
                "jobject self"
            }
        )?;
        for (idx, parameter) in method.descriptor.parameters.iter().enumerate() {
            write!(self.out, ", {} p{}", c_type(parameter), idx)?;
        }
        write!(self.out, ")")?;
        self.out.open_curly_block()?;

        writeln!(self.out, "jvalue cstack[{}] = {{}};", method.stack_size.max(1))?;
        writeln!(self.out, "jvalue clocals[{}] = {{}};", method.max_locals.max(1))?;
        let mut slot = 0;
        if !method.is_static {
            writeln!(self.out, "clocals[0].l = self;")?;
            slot += 1;
        }
        for (idx, parameter) in method.descriptor.parameters.iter().enumerate() {
            let ty = SlotType::from_field_type(parameter);
            let widen = match parameter {
                FieldType::Base(BaseType::Boolean)
                | FieldType::Base(BaseType::Byte)
                | FieldType::Base(BaseType::Char)
                | FieldType::Base(BaseType::Short) => "(jint)",
                _ => "",
            };
            writeln!(
                self.out,
                "clocals[{}].{} = {}p{};",
                slot,
                ty.jvalue_member(),
                widen,
                idx
            )?;
            slot += parameter.width();
        }

        for (idx, block) in method.blocks.iter().enumerate() {
            let next = method.blocks.get(idx + 1).map(|block| block.label);
            self.emit_block(method, block, next)?;
        }
        for (idx, dispatcher) in method.dispatchers.iter().enumerate() {
            self.emit_dispatcher(method, idx, dispatcher)?;
        }

        self.out.close_curly_block()
    }

    fn emit_block(&mut self, method: &NativeMethod, block: &Block, next: Option<Offset>) -> Result<()> {
        self.out.label(format!("L{}", block.label.0))?;
        for stmt in &block.stmts {
            self.emit_stmt(method, stmt)?;
        }
        match &block.terminator {
            Terminator::Goto(target) => writeln!(self.out, "goto L{};", target.0)?,
            Terminator::FallThrough(target) => {
                if next != Some(*target) {
                    writeln!(self.out, "goto L{};", target.0)?;
                }
            }
            Terminator::Branch {
                condition,
                target,
                otherwise,
            } => {
                let test = match condition {
                    Condition::Zero(cmp, value) => {
                        format!("{} {} 0", var(*value), ord_operator(*cmp))
                    }
                    Condition::IntCompare(cmp, lhs, rhs) => {
                        format!("{} {} {}", var(*lhs), ord_operator(*cmp), var(*rhs))
                    }
                    Condition::Null(cmp, value) => format!(
                        "{} {} nullptr",
                        var(*value),
                        match cmp {
                            EqComparison::EQ => "==",
                            EqComparison::NE => "!=",
                        }
                    ),
                };
                writeln!(self.out, "if ({}) goto L{};", test, target.0)?;
                if next != Some(*otherwise) {
                    writeln!(self.out, "goto L{};", otherwise.0)?;
                }
            }
            Terminator::Switch { key, table } => {
                write!(self.out, "switch ({})", var(*key))?;
                self.out.open_curly_block()?;
                for (case, target) in &table.cases {
                    writeln!(self.out, "case {}: goto L{};", int_literal(*case), target.0)?;
                }
                writeln!(self.out, "default: goto L{};", table.default.0)?;
                self.out.close_curly_block()?;
            }
            Terminator::Return(None) => writeln!(self.out, "return;")?,
            Terminator::Return(Some(value)) => {
                let narrow = match &method.descriptor.return_type {
                    Some(FieldType::Base(BaseType::Boolean)) => "(jboolean)",
                    Some(FieldType::Base(BaseType::Byte)) => "(jbyte)",
                    Some(FieldType::Base(BaseType::Char)) => "(jchar)",
                    Some(FieldType::Base(BaseType::Short)) => "(jshort)",
                    _ => "",
                };
                writeln!(self.out, "return {}{};", narrow, var(*value))?;
            }
            Terminator::Throw { value, unwind } => {
                self.ops.insert(BridgeOp::Throw);
                writeln!(self.out, "njb_throw(env, {});", var(*value))?;
                match unwind {
                    Unwind::Dispatch(dispatcher) => writeln!(self.out, "goto D{};", dispatcher)?,
                    Unwind::Return => writeln!(self.out, "{}", zero_return(method))?,
                }
            }
        }
        Ok(())
    }

    /// Exception dispatcher `D<n>`, with its type tests starting at `T<n>`
    fn emit_dispatcher(&mut self, method: &NativeMethod, idx: usize, dispatcher: &Dispatcher) -> Result<()> {
        self.ops.insert(BridgeOp::TakeException);
        self.out.label(format!("D{}", idx))?;
        writeln!(self.out, "cstack[0].l = njb_take_exception(env);")?;
        self.out.label(format!("T{}", idx))?;
        for (catch_type, handler) in &dispatcher.handlers {
            match catch_type {
                None => {
                    writeln!(self.out, "goto L{};", handler.0)?;
                    return Ok(());
                }
                Some(class) => {
                    self.ops.insert(BridgeOp::InstanceOf);
                    writeln!(
                        self.out,
                        "if (njb_instance_of(env, cstack[0].l, cls{}(env))) goto L{};",
                        class.0, handler.0
                    )?;
                    writeln!(self.out, "if (env->ExceptionCheck()) {}", zero_return(method))?;
                }
            }
        }
        match dispatcher.fallback {
            Some(parent) => writeln!(self.out, "goto T{};", parent)?,
            None => {
                self.ops.insert(BridgeOp::Throw);
                writeln!(self.out, "njb_throw(env, cstack[0].l);")?;
                writeln!(self.out, "{}", zero_return(method))?;
            }
        }
        Ok(())
    }

    fn emit_stmt(&mut self, method: &NativeMethod, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Const { dst, value } => {
                let value = match value {
                    Constant::Int(i) => int_literal(*i),
                    Constant::Long(l) => long_literal(*l),
                    Constant::Float(f) => format!("njb_float_bits(0x{:08x}u)", f.to_bits()),
                    Constant::Double(d) => format!("njb_double_bits(0x{:016x}ULL)", d.to_bits()),
                    Constant::Null => String::from("nullptr"),
                    Constant::Protected { index, ty } => {
                        let reader = match ty {
                            SlotType::Long => "njb_be_long",
                            SlotType::Float => "njb_be_float",
                            SlotType::Double => "njb_be_double",
                            _ => "njb_be_int",
                        };
                        format!("{}(s{}())", reader, index)
                    }
                };
                writeln!(self.out, "{} = {};", var(*dst), value)
            }
            Stmt::Move { dst, src } => writeln!(self.out, "{} = {};", var(*dst), var(*src)),
            Stmt::Binary { op, dst, lhs, rhs } => {
                let expr = self.binary(*op, *lhs, *rhs);
                writeln!(self.out, "{} = {};", var(*dst), expr)
            }
            Stmt::Negate { dst, src } => {
                let expr = match src.ty {
                    SlotType::Int => format!("(jint)(0u - (uint32_t){})", var(*src)),
                    SlotType::Long => format!("(jlong)(0ull - (uint64_t){})", var(*src)),
                    _ => format!("-{}", var(*src)),
                };
                writeln!(self.out, "{} = {};", var(*dst), expr)
            }
            Stmt::Convert {
                conversion,
                dst,
                src,
            } => {
                let expr = self.conversion(*conversion, *src);
                writeln!(self.out, "{} = {};", var(*dst), expr)
            }
            Stmt::Compare { op, dst, lhs, rhs } => {
                let bridge_op = match op {
                    CompareOp::LCmp => BridgeOp::LongCompare,
                    CompareOp::FCmpL => BridgeOp::FloatCompareL,
                    CompareOp::FCmpG => BridgeOp::FloatCompareG,
                    CompareOp::DCmpL => BridgeOp::DoubleCompareL,
                    CompareOp::DCmpG => BridgeOp::DoubleCompareG,
                };
                self.ops.insert(bridge_op);
                writeln!(
                    self.out,
                    "{} = {}({}, {});",
                    var(*dst),
                    bridge_op.symbol(),
                    var(*lhs),
                    var(*rhs)
                )
            }
            Stmt::IInc { local, delta } => writeln!(
                self.out,
                "clocals[{0}].i = (jint)((uint32_t)clocals[{0}].i + (uint32_t)({1}));",
                local,
                int_literal(*delta)
            ),
            Stmt::Bridge {
                call,
                args,
                dst,
                unwind,
            } => {
                self.emit_bridge_call(*call, args, *dst)?;
                if *call != BridgeCall::SameObject {
                    match unwind {
                        Unwind::Dispatch(dispatcher) => writeln!(
                            self.out,
                            "if (env->ExceptionCheck()) goto D{};",
                            dispatcher
                        )?,
                        Unwind::Return => writeln!(
                            self.out,
                            "if (env->ExceptionCheck()) {}",
                            zero_return(method)
                        )?,
                    }
                }
                Ok(())
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: Var, rhs: Var) -> String {
        let (l, r) = (var(lhs), var(rhs));
        let wrapping = |operator: &str| match lhs.ty {
            SlotType::Int => format!("(jint)((uint32_t){} {} (uint32_t){})", l, operator, r),
            SlotType::Long => format!("(jlong)((uint64_t){} {} (uint64_t){})", l, operator, r),
            _ => format!("{} {} {}", l, operator, r),
        };
        let helper = |this: &mut Self, op: BridgeOp| {
            this.ops.insert(op);
            format!("{}({}, {})", op.symbol(), l, r)
        };
        let wide = lhs.ty == SlotType::Long;
        match op {
            BinaryOp::Add => wrapping("+"),
            BinaryOp::Sub => wrapping("-"),
            BinaryOp::Mul => wrapping("*"),
            BinaryOp::Div => format!("{} / {}", l, r),
            BinaryOp::Rem if lhs.ty == SlotType::Float => helper(self, BridgeOp::FloatRem),
            BinaryOp::Rem => helper(self, BridgeOp::DoubleRem),
            BinaryOp::And => format!("{} & {}", l, r),
            BinaryOp::Or => format!("{} | {}", l, r),
            BinaryOp::Xor => format!("{} ^ {}", l, r),
            BinaryOp::Shl if wide => helper(self, BridgeOp::LongShl),
            BinaryOp::Shl => helper(self, BridgeOp::IntShl),
            BinaryOp::Shr if wide => helper(self, BridgeOp::LongShr),
            BinaryOp::Shr => helper(self, BridgeOp::IntShr),
            BinaryOp::UShr if wide => helper(self, BridgeOp::LongUShr),
            BinaryOp::UShr => helper(self, BridgeOp::IntUShr),
        }
    }

    fn conversion(&mut self, conversion: Conversion, src: Var) -> String {
        let s = var(src);
        let helper = |this: &mut Self, op: BridgeOp| {
            this.ops.insert(op);
            format!("{}({})", op.symbol(), s)
        };
        match conversion {
            Conversion::I2L => format!("(jlong){}", s),
            Conversion::I2F | Conversion::L2F | Conversion::D2F => format!("(jfloat){}", s),
            Conversion::I2D | Conversion::L2D | Conversion::F2D => format!("(jdouble){}", s),
            Conversion::L2I => format!("(jint)(uint32_t)(uint64_t){}", s),
            Conversion::F2I => helper(self, BridgeOp::FloatToInt),
            Conversion::F2L => helper(self, BridgeOp::FloatToLong),
            Conversion::D2I => helper(self, BridgeOp::DoubleToInt),
            Conversion::D2L => helper(self, BridgeOp::DoubleToLong),
            Conversion::I2B => format!("(jint)(jbyte){}", s),
            Conversion::I2C => format!("(jint)(jchar){}", s),
            Conversion::I2S => format!("(jint)(jshort){}", s),
        }
    }

    fn emit_bridge_call(&mut self, call: BridgeCall, args: &[Var], dst: Option<Var>) -> Result<()> {
        let op = call.op();
        self.ops.insert(op);
        let symbol = op.symbol();
        let assign = |expr: String| match dst {
            Some(dst) => format!("{} = {};", var(dst), expr),
            None => format!("{};", expr),
        };
        let assign_slot = |expr: String| match dst {
            Some(dst) => format!("{} = {};", slot(dst.place), expr),
            None => format!("{};", expr),
        };
        let arg = |idx: usize| args.get(idx).map(|a| var(*a)).unwrap_or_default();

        let line = match call {
            BridgeCall::Allocate(class) => format!(
                "if (jclass c = cls{}(env)) {}",
                class.0,
                assign(format!("{}(env, c)", symbol))
            ),
            BridgeCall::Invoke {
                kind,
                class,
                method,
            } => {
                let descriptor = self.class.symbols.methods[method.0].descriptor;
                let (receiver, params) = match kind {
                    InvokeKind::Static => (None, args),
                    _ => (Some(arg(0)), args.get(1..).unwrap_or_default()),
                };
                let array = if params.is_empty() {
                    String::from("jvalue* a = nullptr;")
                } else {
                    let values: Vec<String> = params.iter().map(|p| slot(p.place)).collect();
                    format!("jvalue a[] = {{{}}};", values.join(", "))
                };
                let call = match (kind, receiver) {
                    (InvokeKind::Static, _) => format!(
                        "{}(env, cls{}(env), m, s{}(), a)",
                        symbol, class.0, descriptor
                    ),
                    (InvokeKind::Special, Some(receiver)) => format!(
                        "{}(env, {}, cls{}(env), m, s{}(), a)",
                        symbol, receiver, class.0, descriptor
                    ),
                    (_, receiver) => format!(
                        "{}(env, {}, m, s{}(), a)",
                        symbol,
                        receiver.unwrap_or_default(),
                        descriptor
                    ),
                };
                format!(
                    "if (jmethodID m = mid{}(env)) {{ {} {} }}",
                    method.0,
                    array,
                    assign_slot(call)
                )
            }
            BridgeCall::GetField(field) => format!(
                "if (jfieldID f = fid{}(env)) {}",
                field.0,
                assign_slot(format!(
                    "{}(env, {}, f, '{}')",
                    symbol,
                    arg(0),
                    self.field_type_char(field.0)
                ))
            ),
            BridgeCall::SetField(field) => format!(
                "if (jfieldID f = fid{}(env)) {}(env, {}, f, '{}', {});",
                field.0,
                symbol,
                arg(0),
                self.field_type_char(field.0),
                args.get(1).map(|a| slot(a.place)).unwrap_or_default()
            ),
            BridgeCall::GetStatic(class, field) => format!(
                "if (jfieldID f = fid{}(env)) {}",
                field.0,
                assign_slot(format!(
                    "{}(env, cls{}(env), f, '{}')",
                    symbol,
                    class.0,
                    self.field_type_char(field.0)
                ))
            ),
            BridgeCall::SetStatic(class, field) => format!(
                "if (jfieldID f = fid{}(env)) {}(env, cls{}(env), f, '{}', {});",
                field.0,
                symbol,
                class.0,
                self.field_type_char(field.0),
                args.first().map(|a| slot(a.place)).unwrap_or_default()
            ),
            BridgeCall::MonitorEnter | BridgeCall::MonitorExit | BridgeCall::ArrayLength => {
                assign(format!("{}(env, {})", symbol, arg(0)))
            }
            BridgeCall::NewArray(element) => assign(format!(
                "{}(env, '{}', {})",
                symbol,
                base_type_char(element),
                arg(0)
            )),
            BridgeCall::NewObjectArray(class) => format!(
                "if (jclass c = cls{}(env)) {}",
                class.0,
                assign(format!("{}(env, c, {})", symbol, arg(0)))
            ),
            BridgeCall::NewMultiArray(class) => {
                let lengths: Vec<String> = args.iter().map(|a| var(*a)).collect();
                format!(
                    "if (jclass c = cls{}(env)) {{ jint n[] = {{{}}}; {} }}",
                    class.0,
                    lengths.join(", "),
                    assign(format!("{}(env, c, {}, n)", symbol, lengths.len()))
                )
            }
            BridgeCall::ArrayLoad(kind) => assign_slot(format!(
                "{}(env, {}, {}, '{}')",
                symbol,
                arg(0),
                arg(1),
                array_kind_char(kind)
            )),
            BridgeCall::ArrayStore(kind) => format!(
                "{}(env, {}, {}, '{}', {});",
                symbol,
                arg(0),
                arg(1),
                array_kind_char(kind),
                args.get(2).map(|a| slot(a.place)).unwrap_or_default()
            ),
            BridgeCall::CheckCast(class) | BridgeCall::InstanceOf(class) => format!(
                "if (jclass c = cls{}(env)) {}",
                class.0,
                assign(format!("{}(env, {}, c)", symbol, arg(0)))
            ),
            BridgeCall::LoadString(string) => assign(format!("str{}(env)", string.0)),
            BridgeCall::LoadClass(class) => format!(
                "if (jclass c = cls{}(env)) {}",
                class.0,
                assign(format!("{}(env, c)", symbol))
            ),
            BridgeCall::SameObject
            | BridgeCall::IntDiv
            | BridgeCall::IntRem
            | BridgeCall::LongDiv
            | BridgeCall::LongRem => assign(format!("{}(env, {}, {})", symbol, arg(0), arg(1))),
        };
        writeln!(self.out, "{}", line)
    }

    /// Descriptor character the bridge uses to pick the right JNI accessor for a field
    fn field_type_char(&self, field: usize) -> char {
        let descriptor = self.class.symbols.fields[field].descriptor;
        match self.class.pool.plain(descriptor).and_then(|d| d.first()) {
            Some(b'[') | Some(b'L') | None => 'L',
            Some(c) => *c as char,
        }
    }
}

fn jboolean(value: bool) -> &'static str {
    if value {
        "JNI_TRUE"
    } else {
        "JNI_FALSE"
    }
}

fn slot(place: Place) -> String {
    match place {
        Place::Stack(offset) => format!("cstack[{}]", offset),
        Place::Local(index) => format!("clocals[{}]", index),
    }
}

fn var(var: Var) -> String {
    format!("{}.{}", slot(var.place), var.ty.jvalue_member())
}

fn ord_operator(cmp: OrdComparison) -> &'static str {
    match cmp {
        OrdComparison::EQ => "==",
        OrdComparison::NE => "!=",
        OrdComparison::LT => "<",
        OrdComparison::GE => ">=",
        OrdComparison::GT => ">",
        OrdComparison::LE => "<=",
    }
}

/// `INT_MIN` cannot be written as a negated literal
fn int_literal(value: i32) -> String {
    if value == i32::MIN {
        String::from("(jint)(-2147483647 - 1)")
    } else {
        value.to_string()
    }
}

fn long_literal(value: i64) -> String {
    if value == i64::MIN {
        String::from("(jlong)(-9223372036854775807LL - 1)")
    } else {
        format!("(jlong){}LL", value)
    }
}

fn base_type_char(base: BaseType) -> char {
    use crate::jvm::RenderDescriptor;
    base.render().chars().next().unwrap_or('I')
}

fn array_kind_char(kind: ArrayKind) -> char {
    match kind {
        ArrayKind::Int => 'I',
        ArrayKind::Long => 'J',
        ArrayKind::Float => 'F',
        ArrayKind::Double => 'D',
        ArrayKind::Reference => 'L',
        ArrayKind::ByteOrBoolean => 'B',
        ArrayKind::Char => 'C',
        ArrayKind::Short => 'S',
    }
}

fn c_type(field_type: &FieldType<BinaryName>) -> &'static str {
    match field_type {
        FieldType::Base(BaseType::Boolean) => "jboolean",
        FieldType::Base(BaseType::Byte) => "jbyte",
        FieldType::Base(BaseType::Char) => "jchar",
        FieldType::Base(BaseType::Short) => "jshort",
        FieldType::Base(BaseType::Int) => "jint",
        FieldType::Base(BaseType::Long) => "jlong",
        FieldType::Base(BaseType::Float) => "jfloat",
        FieldType::Base(BaseType::Double) => "jdouble",
        FieldType::Ref(_) => "jobject",
    }
}

fn return_c_type(return_type: Option<&FieldType<BinaryName>>) -> &'static str {
    return_type.map(c_type).unwrap_or("void")
}

/// Return leaving the pending exception for the caller
fn zero_return(method: &NativeMethod) -> &'static str {
    match &method.descriptor.return_type {
        None => "return;",
        Some(FieldType::Ref(_)) => "return nullptr;",
        Some(_) => "return 0;",
    }
}

/// Write the unit holding the JNI entry point of the loader class
///
/// `Loader.registerNatives(int, Class)` is dispatched on the class index to the registration
/// function of that class's unit.
pub fn emit_entry_point<W: Write>(
    loader: &BinaryName,
    classes: &[(u32, BinaryName)],
    out: &mut CppWriter<W>,
) -> Result<()> {
    writeln!(out, "// Generated by jvm2native. Do not edit.")?;
    writeln!(out, "#include \"{}\"", SUPPORT_HEADER_NAME)?;
    out.newline()?;

    for (index, class) in classes {
        write!(out, "namespace {}", class_namespace(*index))?;
        out.open_curly_block()?;
        writeln!(out, "// {}", class)?;
        writeln!(out, "void register_natives(JNIEnv* env, jclass clazz);")?;
        out.close_curly_block()?;
    }
    out.newline()?;

    write!(
        out,
        "extern \"C\" JNIEXPORT void JNICALL Java_{}_registerNatives(JNIEnv* env, jclass, jint index, jclass clazz)",
        mangle_jni(loader.as_str())
    )?;
    out.open_curly_block()?;
    write!(out, "switch (index)")?;
    out.open_curly_block()?;
    for (index, _) in classes {
        writeln!(
            out,
            "case {}: {}::register_natives(env, clazz); break;",
            index,
            class_namespace(*index)
        )?;
    }
    writeln!(out, "default: break;")?;
    out.close_curly_block()?;
    out.close_curly_block()?;
    out.newline()?;

    write!(out, "extern \"C\" JNIEXPORT jint JNICALL JNI_OnLoad(JavaVM*, void*)")?;
    out.open_curly_block()?;
    writeln!(out, "return JNI_VERSION_1_6;")?;
    out.close_curly_block()?;
    Ok(())
}
