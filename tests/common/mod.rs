//! Test-side class assembler and an in-memory stand-in for the JVM behind the bridge

#![allow(dead_code)]

use jvm2native::bridge::{
    ClassHandle, MemberHandle, ObjectRef, RuntimeBridge, Thrown, Value,
};
use jvm2native::jvm::class_file::{
    Annotations, Attribute, BytecodeArray, BytecodeIndex, ClassConstantIndex, ClassFile, Code,
    Constant, ConstantIndex, ConstantsPool, ExceptionHandler, HandleKind, Method, RawAnnotation,
    RuntimeInvisibleAnnotations, Version,
};
use jvm2native::jvm::{ArrayKind, BaseType, BinaryName, ClassAccessFlags, MethodAccessFlags, Name};
use jvm2native::native::InvokeKind;
use std::collections::HashMap;

/// Opcodes used by the test programs
pub mod op {
    pub const NOP: u8 = 0x00;
    pub const ACONST_NULL: u8 = 0x01;
    pub const ICONST_M1: u8 = 0x02;
    pub const ICONST_0: u8 = 0x03;
    pub const ICONST_1: u8 = 0x04;
    pub const ICONST_2: u8 = 0x05;
    pub const ICONST_3: u8 = 0x06;
    pub const LCONST_1: u8 = 0x0a;
    pub const BIPUSH: u8 = 0x10;
    pub const SIPUSH: u8 = 0x11;
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const ILOAD: u8 = 0x15;
    pub const LLOAD: u8 = 0x16;
    pub const ILOAD_0: u8 = 0x1a;
    pub const ILOAD_1: u8 = 0x1b;
    pub const ILOAD_2: u8 = 0x1c;
    pub const LLOAD_0: u8 = 0x1e;
    pub const DLOAD_0: u8 = 0x26;
    pub const DLOAD_2: u8 = 0x28;
    pub const ALOAD_0: u8 = 0x2a;
    pub const ALOAD_1: u8 = 0x2b;
    pub const IALOAD: u8 = 0x2e;
    pub const ISTORE: u8 = 0x36;
    pub const LSTORE: u8 = 0x37;
    pub const ISTORE_1: u8 = 0x3c;
    pub const ISTORE_2: u8 = 0x3d;
    pub const ASTORE_1: u8 = 0x4c;
    pub const IASTORE: u8 = 0x4f;
    pub const POP: u8 = 0x57;
    pub const POP2: u8 = 0x58;
    pub const DUP: u8 = 0x59;
    pub const DUP_X1: u8 = 0x5a;
    pub const DUP_X2: u8 = 0x5b;
    pub const DUP2: u8 = 0x5c;
    pub const DUP2_X1: u8 = 0x5d;
    pub const DUP2_X2: u8 = 0x5e;
    pub const SWAP: u8 = 0x5f;
    pub const IADD: u8 = 0x60;
    pub const ISUB: u8 = 0x64;
    pub const IMUL: u8 = 0x68;
    pub const IDIV: u8 = 0x6c;
    pub const LSHL: u8 = 0x79;
    pub const LUSHR: u8 = 0x7d;
    pub const LXOR: u8 = 0x83;
    pub const IINC: u8 = 0x84;
    pub const L2I: u8 = 0x88;
    pub const DCMPG: u8 = 0x98;
    pub const IFGE: u8 = 0x9c;
    pub const IF_ICMPGT: u8 = 0xa3;
    pub const GOTO: u8 = 0xa7;
    pub const JSR: u8 = 0xa8;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const IRETURN: u8 = 0xac;
    pub const LRETURN: u8 = 0xad;
    pub const ARETURN: u8 = 0xb0;
    pub const RETURN: u8 = 0xb1;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const NEW: u8 = 0xbb;
    pub const NEWARRAY: u8 = 0xbc;
    pub const ARRAYLENGTH: u8 = 0xbe;
    pub const ATHROW: u8 = 0xbf;
    pub const MONITORENTER: u8 = 0xc2;
    pub const MONITOREXIT: u8 = 0xc3;
}

/// Bytecode with symbolic jump labels
#[derive(Default)]
pub struct Asm {
    code: Vec<u8>,
    labels: HashMap<&'static str, usize>,
    /// (operand position, instruction start, label, 4-byte operand)
    fixups: Vec<(usize, usize, &'static str, bool)>,
}

impl Asm {
    pub fn new() -> Asm {
        Asm::default()
    }

    pub fn offset(&self) -> u16 {
        self.code.len() as u16
    }

    pub fn op(&mut self, opcode: u8) -> &mut Asm {
        self.code.push(opcode);
        self
    }

    pub fn op_u8(&mut self, opcode: u8, operand: u8) -> &mut Asm {
        self.code.extend_from_slice(&[opcode, operand]);
        self
    }

    pub fn op_u16(&mut self, opcode: u8, operand: u16) -> &mut Asm {
        self.code.push(opcode);
        self.code.extend_from_slice(&operand.to_be_bytes());
        self
    }

    pub fn invokedynamic(&mut self, call_site: u16) -> &mut Asm {
        self.op_u16(op::INVOKEDYNAMIC, call_site).op(0).op(0)
    }

    pub fn label(&mut self, label: &'static str) -> &mut Asm {
        self.labels.insert(label, self.code.len());
        self
    }

    pub fn jump(&mut self, opcode: u8, label: &'static str) -> &mut Asm {
        let start = self.code.len();
        self.code.push(opcode);
        self.fixups.push((self.code.len(), start, label, false));
        self.code.extend_from_slice(&[0, 0]);
        self
    }

    fn pad(&mut self) {
        while self.code.len() % 4 != 0 {
            self.code.push(0);
        }
    }

    fn wide_target(&mut self, start: usize, label: &'static str) {
        self.fixups.push((self.code.len(), start, label, true));
        self.code.extend_from_slice(&[0; 4]);
    }

    pub fn tableswitch(&mut self, low: i32, targets: &[&'static str], default: &'static str) -> &mut Asm {
        let start = self.code.len();
        self.code.push(op::TABLESWITCH);
        self.pad();
        self.wide_target(start, default);
        let high = low + targets.len() as i32 - 1;
        self.code.extend_from_slice(&low.to_be_bytes());
        self.code.extend_from_slice(&high.to_be_bytes());
        for target in targets {
            self.wide_target(start, target);
        }
        self
    }

    pub fn lookupswitch(&mut self, pairs: &[(i32, &'static str)], default: &'static str) -> &mut Asm {
        let start = self.code.len();
        self.code.push(op::LOOKUPSWITCH);
        self.pad();
        self.wide_target(start, default);
        self.code.extend_from_slice(&(pairs.len() as i32).to_be_bytes());
        for (key, target) in pairs {
            self.code.extend_from_slice(&key.to_be_bytes());
            self.wide_target(start, target);
        }
        self
    }

    pub fn label_offset(&self, label: &str) -> u16 {
        self.labels[label] as u16
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut code = self.code.clone();
        for (at, start, label, wide) in &self.fixups {
            let target = self.labels[label] as i64 - *start as i64;
            if *wide {
                code[*at..*at + 4].copy_from_slice(&(target as i32).to_be_bytes());
            } else {
                code[*at..*at + 2].copy_from_slice(&(target as i16).to_be_bytes());
            }
        }
        code
    }
}

/// Exception table entry: `[start, end)`, handler, catch type (`None` catches everything)
pub struct Handler {
    pub start: u16,
    pub end: u16,
    pub handler: u16,
    pub catch_type: Option<&'static str>,
}

/// Builder for a class file
pub struct ClassAssembler {
    pub pool: ConstantsPool,
    name: String,
    this_class: ClassConstantIndex,
    super_class: ClassConstantIndex,
    access_flags: ClassAccessFlags,
    major_version: u16,
    methods: Vec<Method>,
    attributes: Vec<Attribute>,
    /// Bootstrap method handle and static arguments of each `BootstrapMethods` entry
    bootstrap_methods: Vec<(u16, Vec<u16>)>,
}

/// Descriptor of `StringConcatFactory.makeConcatWithConstants`
const MAKE_CONCAT_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;\
    Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;";

impl ClassAssembler {
    pub fn new(name: &str) -> ClassAssembler {
        let mut pool = ConstantsPool::new();
        let this_class = pool.get_class(name).unwrap();
        let super_class = pool.get_class("java/lang/Object").unwrap();
        ClassAssembler {
            pool,
            name: name.to_owned(),
            this_class,
            super_class,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            major_version: 49,
            methods: vec![],
            attributes: vec![],
            bootstrap_methods: vec![],
        }
    }

    pub fn version(mut self, major_version: u16) -> ClassAssembler {
        self.major_version = major_version;
        self
    }

    pub fn interface(mut self) -> ClassAssembler {
        self.access_flags = ClassAccessFlags::PUBLIC
            | ClassAccessFlags::INTERFACE
            | ClassAccessFlags::ABSTRACT;
        self
    }

    pub fn class_ref(&mut self, name: &str) -> u16 {
        self.pool.get_class(name).unwrap().0 .0
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.pool
            .get_method_ref(class, name, descriptor, false)
            .unwrap()
            .0
            .0
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.pool.get_field_ref(class, name, descriptor).unwrap().0 .0
    }

    pub fn string(&mut self, value: &str) -> u16 {
        self.pool.get_string(value).unwrap().0 .0
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        self.pool.get_integer(value).unwrap().0
    }

    /// Append a constant the pool has no helper for
    pub fn raw_constant(&mut self, constant: Constant) -> u16 {
        let mut constants = std::mem::replace(&mut self.pool, ConstantsPool::new()).into_offset_vec();
        let index = constants.push(constant).0 as u16;
        self.pool = ConstantsPool::from_offset_vec(constants);
        index
    }

    pub fn method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor = self.pool.get_utf8(descriptor).unwrap();
        self.raw_constant(Constant::MethodType { descriptor })
    }

    /// Call site of `javac`'s string concatenation, `recipe` using `\u{1}` for each argument
    pub fn string_concat(&mut self, recipe: &str, descriptor: &str) -> u16 {
        let factory = self
            .pool
            .get_method_ref(
                "java/lang/invoke/StringConcatFactory",
                "makeConcatWithConstants",
                &MAKE_CONCAT_DESCRIPTOR.replace(' ', ""),
                false,
            )
            .unwrap();
        let handle = self.raw_constant(Constant::MethodHandle {
            handle_kind: HandleKind::InvokeStatic,
            member: factory.0,
        });
        let recipe = self.string(recipe);
        self.bootstrap_methods.push((handle, vec![recipe]));
        let method_descriptor = self
            .pool
            .get_name_and_type("makeConcatWithConstants", descriptor)
            .unwrap();
        self.raw_constant(Constant::InvokeDynamic {
            bootstrap_method: (self.bootstrap_methods.len() - 1) as u16,
            method_descriptor,
        })
    }

    /// Method with code
    pub fn method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
        handlers: &[Handler],
    ) -> &mut ClassAssembler {
        let exception_table = handlers
            .iter()
            .map(|handler| ExceptionHandler {
                start_pc: BytecodeIndex(handler.start),
                end_pc: BytecodeIndex(handler.end),
                handler_pc: BytecodeIndex(handler.handler),
                catch_type: match handler.catch_type {
                    Some(class) => self.pool.get_class(class).unwrap(),
                    None => ClassConstantIndex(ConstantIndex::NONE),
                },
            })
            .collect();
        let code = Code {
            max_stack,
            max_locals,
            code_array: BytecodeArray(code),
            exception_table,
            attributes: vec![],
        };
        let method = Method {
            access_flags,
            name_index: self.pool.get_utf8(name).unwrap(),
            descriptor_index: self.pool.get_utf8(descriptor).unwrap(),
            attributes: vec![self.pool.get_attribute(&code).unwrap()],
        };
        self.methods.push(method);
        self
    }

    /// `static` method with no exception handlers
    pub fn static_method(
        &mut self,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
    ) -> &mut ClassAssembler {
        self.method(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            name,
            descriptor,
            max_stack,
            max_locals,
            code,
            &[],
        )
    }

    /// Method without code (`native` or `abstract`)
    pub fn bodiless_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
    ) -> &mut ClassAssembler {
        let method = Method {
            access_flags,
            name_index: self.pool.get_utf8(name).unwrap(),
            descriptor_index: self.pool.get_utf8(descriptor).unwrap(),
            attributes: vec![],
        };
        self.methods.push(method);
        self
    }

    /// `public <init>()V` calling `Object.<init>`
    pub fn default_constructor(&mut self) -> &mut ClassAssembler {
        let init = self.method_ref("java/lang/Object", "<init>", "()V");
        let mut asm = Asm::new();
        asm.op(op::ALOAD_0)
            .op_u16(op::INVOKESPECIAL, init)
            .op(op::RETURN);
        self.method(
            MethodAccessFlags::PUBLIC,
            "<init>",
            "()V",
            1,
            1,
            asm.finish(),
            &[],
        )
    }

    /// Invisible annotation on the last method added (or the class, when there are none)
    pub fn annotate(&mut self, descriptor: &str, on_class: bool) -> &mut ClassAssembler {
        let type_index = self.pool.get_utf8(descriptor).unwrap();
        let mut bytes = type_index.0 .0.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0, 0]);
        let annotations = RuntimeInvisibleAnnotations(Annotations(vec![RawAnnotation {
            type_index,
            bytes,
        }]));
        let attribute = self.pool.get_attribute(&annotations).unwrap();
        match self.methods.last_mut() {
            Some(method) if !on_class => method.attributes.push(attribute),
            _ => self.attributes.push(attribute),
        }
        self
    }

    pub fn name(&self) -> BinaryName {
        BinaryName::from_string(self.name.clone()).unwrap()
    }

    /// Java 5 class files carry no stack maps, so test programs need not provide frames
    ///
    /// Programs using `invokedynamic` need a later version, and must stick to straight-line code.
    pub fn finish(mut self) -> Vec<u8> {
        if !self.bootstrap_methods.is_empty() {
            let mut info = (self.bootstrap_methods.len() as u16).to_be_bytes().to_vec();
            for (handle, arguments) in &self.bootstrap_methods {
                info.extend_from_slice(&handle.to_be_bytes());
                info.extend_from_slice(&(arguments.len() as u16).to_be_bytes());
                for argument in arguments {
                    info.extend_from_slice(&argument.to_be_bytes());
                }
            }
            let name_index = self.pool.get_utf8("BootstrapMethods").unwrap();
            self.attributes.push(Attribute { name_index, info });
        }
        let class = ClassFile {
            version: Version {
                minor_version: 0,
                major_version: self.major_version,
            },
            constants: self.pool.into_offset_vec(),
            access_flags: self.access_flags,
            this_class: self.this_class,
            super_class: self.super_class,
            interfaces: vec![],
            fields: vec![],
            methods: self.methods,
            attributes: self.attributes,
        };
        class.to_bytes().unwrap()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MockObject {
    Instance {
        class: String,
        fields: HashMap<u32, Value>,
    },
    Array {
        class: String,
        elements: Vec<Value>,
    },
    Str(String),
    ClassObject(String),
}

/// Static method implemented by the mock
pub type MockMethod = fn(&mut MockJvm, &[Value]) -> Result<Option<Value>, Thrown>;

/// Just enough of a JVM to run translated test programs
pub struct MockJvm {
    pub classes: Vec<String>,
    supers: HashMap<String, String>,
    pub objects: Vec<MockObject>,
    /// (class, name, descriptor, is_static)
    pub members: Vec<(u32, String, String, bool)>,
    pub statics: HashMap<u32, Value>,
    pub strings: HashMap<String, ObjectRef>,
    pub methods: HashMap<String, MockMethod>,
    pub monitors: HashMap<ObjectRef, i32>,
    pub class_lookups: usize,
    pub calls: Vec<String>,
}

impl Default for MockJvm {
    fn default() -> Self {
        MockJvm::new()
    }
}

impl MockJvm {
    pub fn new() -> MockJvm {
        let mut jvm = MockJvm {
            classes: vec![],
            supers: HashMap::new(),
            objects: vec![],
            members: vec![],
            statics: HashMap::new(),
            strings: HashMap::new(),
            methods: HashMap::new(),
            monitors: HashMap::new(),
            class_lookups: 0,
            calls: vec![],
        };
        for (class, superclass) in [
            ("java/lang/Throwable", "java/lang/Object"),
            ("java/lang/Exception", "java/lang/Throwable"),
            ("java/lang/RuntimeException", "java/lang/Exception"),
            ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
            ("java/lang/NullPointerException", "java/lang/RuntimeException"),
            ("java/lang/ClassCastException", "java/lang/RuntimeException"),
            ("java/lang/NegativeArraySizeException", "java/lang/RuntimeException"),
            ("java/lang/IllegalMonitorStateException", "java/lang/RuntimeException"),
            ("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException"),
            (
                "java/lang/ArrayIndexOutOfBoundsException",
                "java/lang/IndexOutOfBoundsException",
            ),
        ] {
            jvm.extend(class, superclass);
        }
        jvm
    }

    /// Declare `class extends superclass`
    pub fn extend(&mut self, class: &str, superclass: &str) -> &mut MockJvm {
        self.supers.insert(class.to_owned(), superclass.to_owned());
        self
    }

    pub fn define_static(&mut self, owner_name_descriptor: &str, method: MockMethod) {
        self.methods.insert(owner_name_descriptor.to_owned(), method);
    }

    pub fn new_object(&mut self, object: MockObject) -> ObjectRef {
        self.objects.push(object);
        ObjectRef(self.objects.len() as u32 - 1)
    }

    /// Allocate an instance of a class, to pass in as an argument or throw
    pub fn instance(&mut self, class: &str) -> ObjectRef {
        self.new_object(MockObject::Instance {
            class: class.to_owned(),
            fields: HashMap::new(),
        })
    }

    pub fn object(&self, object: ObjectRef) -> &MockObject {
        &self.objects[object.0 as usize]
    }

    pub fn class_of(&self, object: ObjectRef) -> String {
        match self.object(object) {
            MockObject::Instance { class, .. } | MockObject::Array { class, .. } => class.clone(),
            MockObject::Str(_) => String::from("java/lang/String"),
            MockObject::ClassObject(_) => String::from("java/lang/Class"),
        }
    }

    pub fn is_subclass(&self, class: &str, of: &str) -> bool {
        let mut current = Some(class.to_owned());
        while let Some(name) = current {
            if name == of {
                return true;
            }
            current = self.supers.get(&name).cloned();
        }
        of == "java/lang/Object"
    }

    fn raise(&mut self, class: &str) -> Thrown {
        Thrown(self.instance(class))
    }

    fn npe(&mut self) -> Thrown {
        self.raise("java/lang/NullPointerException")
    }

    fn array(&mut self, array: Option<ObjectRef>, index: i32) -> Result<(ObjectRef, usize), Thrown> {
        let array = array.ok_or_else(|| self.npe())?;
        let length = match self.object(array) {
            MockObject::Array { elements, .. } => elements.len(),
            _ => return Err(self.raise("java/lang/ClassCastException")),
        };
        if index < 0 || index as usize >= length {
            return Err(self.raise("java/lang/ArrayIndexOutOfBoundsException"));
        }
        Ok((array, index as usize))
    }

    fn elements(&mut self, array: ObjectRef) -> &mut Vec<Value> {
        match &mut self.objects[array.0 as usize] {
            MockObject::Array { elements, .. } => elements,
            _ => unreachable!("checked by MockJvm::array"),
        }
    }
}

fn zero_of(kind: BaseType) -> Value {
    match kind {
        BaseType::Long => Value::Long(0),
        BaseType::Float => Value::Float(0.0),
        BaseType::Double => Value::Double(0.0),
        _ => Value::Int(0),
    }
}

impl RuntimeBridge for MockJvm {
    fn find_class(&mut self, name: &str) -> Result<ClassHandle, Thrown> {
        self.class_lookups += 1;
        let index = match self.classes.iter().position(|class| class == name) {
            Some(index) => index,
            None => {
                self.classes.push(name.to_owned());
                self.classes.len() - 1
            }
        };
        Ok(ClassHandle(index as u32))
    }

    fn method_id(
        &mut self,
        class: ClassHandle,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Result<MemberHandle, Thrown> {
        self.members
            .push((class.0, name.to_owned(), descriptor.to_owned(), is_static));
        Ok(MemberHandle(self.members.len() as u32 - 1))
    }

    fn field_id(
        &mut self,
        class: ClassHandle,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Result<MemberHandle, Thrown> {
        self.method_id(class, name, descriptor, is_static)
    }

    fn load_string(&mut self, value: &str) -> Result<ObjectRef, Thrown> {
        if let Some(string) = self.strings.get(value) {
            return Ok(*string);
        }
        let string = self.new_object(MockObject::Str(value.to_owned()));
        self.strings.insert(value.to_owned(), string);
        Ok(string)
    }

    fn load_class(&mut self, class: ClassHandle) -> Result<ObjectRef, Thrown> {
        let name = self.classes[class.0 as usize].clone();
        Ok(self.new_object(MockObject::ClassObject(name)))
    }

    fn allocate(&mut self, class: ClassHandle) -> Result<ObjectRef, Thrown> {
        let name = self.classes[class.0 as usize].clone();
        Ok(self.instance(&name))
    }

    fn invoke(
        &mut self,
        _kind: InvokeKind,
        class: ClassHandle,
        method: MemberHandle,
        receiver: Option<Option<ObjectRef>>,
        args: &[Value],
    ) -> Result<Option<Value>, Thrown> {
        let (_, name, descriptor, _) = self.members[method.0 as usize].clone();
        let owner = self.classes[class.0 as usize].clone();
        let key = format!("{}.{}{}", owner, name, descriptor);
        self.calls.push(key.clone());
        if let Some(Option::None) = receiver {
            return Err(self.npe());
        }
        if name == "<init>" {
            return Ok(None);
        }
        match self.methods.get(&key).copied() {
            Some(implementation) => implementation(self, args),
            None => panic!("mock has no implementation of {}", key),
        }
    }

    fn get_field(&mut self, object: Option<ObjectRef>, field: MemberHandle) -> Result<Value, Thrown> {
        let object = object.ok_or_else(|| self.npe())?;
        let descriptor = self.members[field.0 as usize].2.clone();
        match self.object(object) {
            MockObject::Instance { fields, .. } => Ok(fields.get(&field.0).copied().unwrap_or(
                match descriptor.as_str() {
                    "J" => Value::Long(0),
                    "F" => Value::Float(0.0),
                    "D" => Value::Double(0.0),
                    d if d.starts_with('L') || d.starts_with('[') => Value::Ref(None),
                    _ => Value::Int(0),
                },
            )),
            _ => panic!("field read on a non-instance"),
        }
    }

    fn set_field(
        &mut self,
        object: Option<ObjectRef>,
        field: MemberHandle,
        value: Value,
    ) -> Result<(), Thrown> {
        let object = object.ok_or_else(|| self.npe())?;
        match &mut self.objects[object.0 as usize] {
            MockObject::Instance { fields, .. } => {
                fields.insert(field.0, value);
                Ok(())
            }
            _ => panic!("field write on a non-instance"),
        }
    }

    fn get_static(&mut self, _class: ClassHandle, field: MemberHandle) -> Result<Value, Thrown> {
        Ok(self.statics.get(&field.0).copied().unwrap_or(Value::Int(0)))
    }

    fn set_static(
        &mut self,
        _class: ClassHandle,
        field: MemberHandle,
        value: Value,
    ) -> Result<(), Thrown> {
        self.statics.insert(field.0, value);
        Ok(())
    }

    fn throw_object(&mut self, object: Option<ObjectRef>) -> Thrown {
        match object {
            Some(object) => Thrown(object),
            None => self.npe(),
        }
    }

    fn throw_new(&mut self, class: &BinaryName, _message: &str) -> Thrown {
        self.raise(class.as_str())
    }

    fn monitor_enter(&mut self, object: Option<ObjectRef>) -> Result<(), Thrown> {
        let object = object.ok_or_else(|| self.npe())?;
        *self.monitors.entry(object).or_insert(0) += 1;
        Ok(())
    }

    fn monitor_exit(&mut self, object: Option<ObjectRef>) -> Result<(), Thrown> {
        let object = object.ok_or_else(|| self.npe())?;
        match self.monitors.get_mut(&object) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Ok(())
            }
            _ => Err(self.raise("java/lang/IllegalMonitorStateException")),
        }
    }

    fn new_array(&mut self, element: BaseType, length: i32) -> Result<ObjectRef, Thrown> {
        if length < 0 {
            return Err(self.raise("java/lang/NegativeArraySizeException"));
        }
        Ok(self.new_object(MockObject::Array {
            class: format!("[{:?}", element),
            elements: vec![zero_of(element); length as usize],
        }))
    }

    fn new_object_array(&mut self, element: ClassHandle, length: i32) -> Result<ObjectRef, Thrown> {
        if length < 0 {
            return Err(self.raise("java/lang/NegativeArraySizeException"));
        }
        let class = format!("[L{};", self.classes[element.0 as usize]);
        Ok(self.new_object(MockObject::Array {
            class,
            elements: vec![Value::Ref(None); length as usize],
        }))
    }

    fn new_multi_array(&mut self, class: ClassHandle, lengths: &[i32]) -> Result<ObjectRef, Thrown> {
        let class = self.classes[class.0 as usize].clone();
        let length = *lengths.first().unwrap_or(&0);
        if length < 0 {
            return Err(self.raise("java/lang/NegativeArraySizeException"));
        }
        Ok(self.new_object(MockObject::Array {
            class,
            elements: vec![Value::Ref(None); length as usize],
        }))
    }

    fn array_length(&mut self, array: Option<ObjectRef>) -> Result<i32, Thrown> {
        let array = array.ok_or_else(|| self.npe())?;
        match self.object(array) {
            MockObject::Array { elements, .. } => Ok(elements.len() as i32),
            _ => Err(self.raise("java/lang/ClassCastException")),
        }
    }

    fn array_load(
        &mut self,
        array: Option<ObjectRef>,
        index: i32,
        _kind: ArrayKind,
    ) -> Result<Value, Thrown> {
        let (array, index) = self.array(array, index)?;
        Ok(self.elements(array)[index])
    }

    fn array_store(
        &mut self,
        array: Option<ObjectRef>,
        index: i32,
        _kind: ArrayKind,
        value: Value,
    ) -> Result<(), Thrown> {
        let (array, index) = self.array(array, index)?;
        self.elements(array)[index] = value;
        Ok(())
    }

    fn check_cast(&mut self, object: Option<ObjectRef>, class: ClassHandle) -> Result<(), Thrown> {
        if self.is_instance_of(object, class) || object.is_none() {
            Ok(())
        } else {
            Err(self.raise("java/lang/ClassCastException"))
        }
    }

    fn is_instance_of(&mut self, object: Option<ObjectRef>, class: ClassHandle) -> bool {
        match object {
            None => false,
            Some(object) => {
                let target = self.classes[class.0 as usize].clone();
                let actual = self.class_of(object);
                self.is_subclass(&actual, &target)
            }
        }
    }
}
