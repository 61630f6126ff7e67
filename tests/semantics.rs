//! Translated methods behave like the bytecode they came from

mod common;

use common::{op, Asm, ClassAssembler, Handler, MockJvm, MockObject};
use jvm2native::bridge::{Thrown, Value};
use jvm2native::jvm::class_file::ConstantIndex;
use jvm2native::jvm::model::ClassUnit;
use jvm2native::jvm::{MethodAccessFlags, Name};
use jvm2native::native::eval::{Completion, Evaluator};
use jvm2native::native::{HiddenBody, NativeClass};
use jvm2native::protect::Protection;
use jvm2native::translate::{translate_class, ClassMethodFilter, Error};

fn translate(bytes: &[u8], protection: Protection) -> NativeClass {
    let class = ClassUnit::load(bytes).unwrap();
    let translation =
        translate_class(&class, 0, &ClassMethodFilter::all(), protection, 7).unwrap();
    assert!(
        translation.diagnostics.is_empty(),
        "{:?}",
        translation.diagnostics
    );
    translation.native.unwrap()
}

fn run(native: &NativeClass, jvm: &mut MockJvm, method: usize, args: &[Value]) -> Completion {
    Evaluator::new(native, jvm)
        .with_fuel(10_000)
        .run(method, args)
        .unwrap()
}

fn returns_int(completion: Completion) -> i32 {
    match completion {
        Completion::Return(Some(Value::Int(i))) => i,
        other => panic!("expected an int return, got {:?}", other),
    }
}

fn thrown_class(jvm: &MockJvm, completion: Completion) -> String {
    match completion {
        Completion::Throw(Thrown(object)) => jvm.class_of(object),
        other => panic!("expected an exception, got {:?}", other),
    }
}

/// `(a * 3 + b) / (b - 1)`
#[test]
fn integer_arithmetic() {
    let mut class = ClassAssembler::new("test/Arith");
    let mut asm = Asm::new();
    asm.op(op::ILOAD_0)
        .op(op::ICONST_3)
        .op(op::IMUL)
        .op(op::ILOAD_1)
        .op(op::IADD)
        .op(op::ILOAD_1)
        .op(op::ICONST_1)
        .op(op::ISUB)
        .op(op::IDIV)
        .op(op::IRETURN);
    class.static_method("arith", "(II)I", 3, 2, asm.finish());
    let native = translate(&class.finish(), Protection::Strings);

    let mut jvm = MockJvm::new();
    for (a, b) in [(4, 3), (-7, 0), (i32::MAX, 5), (100, -9)] {
        let expected = a.wrapping_mul(3).wrapping_add(b) / (b - 1);
        let result = run(&native, &mut jvm, 0, &[Value::Int(a), Value::Int(b)]);
        assert_eq!(returns_int(result), expected, "arith({}, {})", a, b);
    }

    let result = run(&native, &mut jvm, 0, &[Value::Int(5), Value::Int(1)]);
    assert_eq!(thrown_class(&jvm, result), "java/lang/ArithmeticException");
}

/// `(x << s) ^ (x >>> 3)`
#[test]
fn long_shifts() {
    let mut class = ClassAssembler::new("test/Shifts");
    let mut asm = Asm::new();
    asm.op(op::LLOAD_0)
        .op_u8(op::ILOAD, 2)
        .op(op::LSHL)
        .op(op::LLOAD_0)
        .op(op::ICONST_3)
        .op(op::LUSHR)
        .op(op::LXOR)
        .op(op::LRETURN);
    class.static_method("mix", "(JI)J", 5, 3, asm.finish());
    let native = translate(&class.finish(), Protection::Strings);

    let mut jvm = MockJvm::new();
    for (x, s) in [(1i64, 3), (-1, 65), (0x1234_5678_9abc_def0, 200), (i64::MIN, 0)] {
        let expected = x.wrapping_shl(s as u32) ^ ((x as u64) >> 3) as i64;
        let result = run(&native, &mut jvm, 0, &[Value::Long(x), Value::Int(s)]);
        assert_eq!(result, Completion::Return(Some(Value::Long(expected))));
    }
}

/// `int acc = 0; for (int i = 1; i <= n; i++) acc += i; return acc;`
#[test]
fn counting_loop() {
    let mut class = ClassAssembler::new("test/Loop");
    let mut asm = Asm::new();
    asm.op(op::ICONST_0)
        .op(op::ISTORE_1)
        .op(op::ICONST_1)
        .op(op::ISTORE_2)
        .label("loop")
        .op(op::ILOAD_2)
        .op(op::ILOAD_0)
        .jump(op::IF_ICMPGT, "end")
        .op(op::ILOAD_1)
        .op(op::ILOAD_2)
        .op(op::IADD)
        .op(op::ISTORE_1)
        .op_u16(op::IINC, 0x0201)
        .jump(op::GOTO, "loop")
        .label("end")
        .op(op::ILOAD_1)
        .op(op::IRETURN);
    class.static_method("sum", "(I)I", 2, 3, asm.finish());
    let native = translate(&class.finish(), Protection::Strings);

    let mut jvm = MockJvm::new();
    for n in [0, 1, 10, 100] {
        let result = run(&native, &mut jvm, 0, &[Value::Int(n)]);
        assert_eq!(returns_int(result), n * (n + 1) / 2);
    }
}

/// `a < b ? -1 : 1`, compiled with `dcmpg` so NaN goes to the `1` side
#[test]
fn double_comparison() {
    let mut class = ClassAssembler::new("test/Compare");
    let mut asm = Asm::new();
    asm.op(op::DLOAD_0)
        .op(op::DLOAD_2)
        .op(op::DCMPG)
        .jump(op::IFGE, "ge")
        .op(op::ICONST_M1)
        .op(op::IRETURN)
        .label("ge")
        .op(op::ICONST_1)
        .op(op::IRETURN);
    class.static_method("order", "(DD)I", 4, 4, asm.finish());
    let native = translate(&class.finish(), Protection::Strings);

    let mut jvm = MockJvm::new();
    for (a, b, expected) in [
        (1.0, 2.0, -1),
        (2.0, 1.0, 1),
        (3.5, 3.5, 1),
        (f64::NAN, 1.0, 1),
        (f64::NEG_INFINITY, -1e300, -1),
    ] {
        let result = run(&native, &mut jvm, 0, &[Value::Double(a), Value::Double(b)]);
        assert_eq!(returns_int(result), expected, "order({}, {})", a, b);
    }
}

#[test]
fn switch_dispatch() {
    let mut class = ClassAssembler::new("test/Switch");

    // switch (k) { case 1: return 10; case 5: return 50; default: return 99; }
    let mut sparse = Asm::new();
    sparse
        .op(op::ILOAD_0)
        .lookupswitch(&[(1, "a"), (5, "b")], "d")
        .label("a")
        .op_u8(op::BIPUSH, 10)
        .op(op::IRETURN)
        .label("b")
        .op_u8(op::BIPUSH, 50)
        .op(op::IRETURN)
        .label("d")
        .op_u8(op::BIPUSH, 99)
        .op(op::IRETURN);
    class.static_method("sparse", "(I)I", 1, 1, sparse.finish());

    // switch (k) { case 2: return 20; case 3: return 30; case 4: return 40; default: return -1; }
    let mut dense = Asm::new();
    dense
        .op(op::NOP)
        .op(op::ILOAD_0)
        .tableswitch(2, &["x", "y", "z"], "d")
        .label("x")
        .op_u8(op::BIPUSH, 20)
        .op(op::IRETURN)
        .label("y")
        .op_u8(op::BIPUSH, 30)
        .op(op::IRETURN)
        .label("z")
        .op_u8(op::BIPUSH, 40)
        .op(op::IRETURN)
        .label("d")
        .op(op::ICONST_M1)
        .op(op::IRETURN);
    class.static_method("dense", "(I)I", 1, 1, dense.finish());
    let native = translate(&class.finish(), Protection::Strings);

    let mut jvm = MockJvm::new();
    for (key, expected) in [(1, 10), (5, 50), (3, 99), (-1, 99), (6, 99), (i32::MIN, 99)] {
        let result = run(&native, &mut jvm, 0, &[Value::Int(key)]);
        assert_eq!(returns_int(result), expected, "sparse({})", key);
    }
    for (key, expected) in [(2, 20), (3, 30), (4, 40), (1, -1), (5, -1), (i32::MAX, -1)] {
        let result = run(&native, &mut jvm, 1, &[Value::Int(key)]);
        assert_eq!(returns_int(result), expected, "dense({})", key);
    }
}

/// `try { return a / b; } catch (<catch_type> e) { return -1; }`
fn guarded_division(catch_type: &'static str) -> NativeClass {
    let mut class = ClassAssembler::new("test/Guarded");
    let mut asm = Asm::new();
    asm.op(op::ILOAD_0)
        .op(op::ILOAD_1)
        .op(op::IDIV)
        .op(op::IRETURN)
        .label("handler")
        .op(op::POP)
        .op(op::ICONST_M1)
        .op(op::IRETURN);
    let handler = Handler {
        start: 0,
        end: 4,
        handler: asm.label_offset("handler"),
        catch_type: Some(catch_type),
    };
    class.method(
        MethodAccessFlags::STATIC,
        "safe",
        "(II)I",
        2,
        2,
        asm.finish(),
        &[handler],
    );
    translate(&class.finish(), Protection::Strings)
}

#[test]
fn matching_handler_catches() {
    let native = guarded_division("java/lang/ArithmeticException");
    let mut jvm = MockJvm::new();
    assert_eq!(returns_int(run(&native, &mut jvm, 0, &[Value::Int(10), Value::Int(2)])), 5);
    assert_eq!(returns_int(run(&native, &mut jvm, 0, &[Value::Int(1), Value::Int(0)])), -1);

    let native = guarded_division("java/lang/RuntimeException");
    assert_eq!(returns_int(run(&native, &mut jvm, 0, &[Value::Int(1), Value::Int(0)])), -1);
}

#[test]
fn unrelated_handler_lets_exception_escape() {
    let native = guarded_division("java/lang/NullPointerException");
    let mut jvm = MockJvm::new();
    let result = run(&native, &mut jvm, 0, &[Value::Int(1), Value::Int(0)]);
    assert_eq!(thrown_class(&jvm, result), "java/lang/ArithmeticException");
}

/// Handlers R1 `[0, 10)` catching `TypeA` and R2 `[5, 15)` catching everything, with an `athrow`
/// at offset 7 (inside both)
#[test]
fn first_matching_handler_wins() {
    let mut class = ClassAssembler::new("test/Priority");
    let mut asm = Asm::new();
    for _ in 0..6 {
        asm.op(op::NOP);
    }
    asm.op(op::ALOAD_0);
    assert_eq!(asm.offset(), 7);
    asm.op(op::ATHROW);
    for _ in 0..7 {
        asm.op(op::NOP);
    }
    assert_eq!(asm.offset(), 15);
    asm.op(op::ICONST_0)
        .op(op::IRETURN)
        .label("r1")
        .op(op::POP)
        .op(op::ICONST_1)
        .op(op::IRETURN)
        .label("r2")
        .op(op::POP)
        .op(op::ICONST_2)
        .op(op::IRETURN);
    let handlers = [
        Handler {
            start: 0,
            end: 10,
            handler: asm.label_offset("r1"),
            catch_type: Some("test/TypeA"),
        },
        Handler {
            start: 5,
            end: 15,
            handler: asm.label_offset("r2"),
            catch_type: None,
        },
    ];
    class.method(
        MethodAccessFlags::STATIC,
        "which",
        "(Ljava/lang/Throwable;)I",
        1,
        1,
        asm.finish(),
        &handlers,
    );
    let native = translate(&class.finish(), Protection::Strings);

    let mut jvm = MockJvm::new();
    jvm.extend("test/TypeA", "java/lang/Exception");
    jvm.extend("test/TypeB", "java/lang/Exception");
    jvm.extend("test/SubA", "test/TypeA");

    let type_a = jvm.instance("test/TypeA");
    let type_b = jvm.instance("test/TypeB");
    let sub_a = jvm.instance("test/SubA");
    assert_eq!(returns_int(run(&native, &mut jvm, 0, &[Value::Ref(Some(type_a))])), 1);
    assert_eq!(returns_int(run(&native, &mut jvm, 0, &[Value::Ref(Some(sub_a))])), 1);
    assert_eq!(returns_int(run(&native, &mut jvm, 0, &[Value::Ref(Some(type_b))])), 2);

    // `athrow` of null raises a NullPointerException, which only R2 catches
    assert_eq!(returns_int(run(&native, &mut jvm, 0, &[Value::Ref(None)])), 2);
}

/// `Holder h = new Holder(); h.value = v; return h.value + 1;`
#[test]
fn objects_and_fields() {
    let mut class = ClassAssembler::new("test/Objects");
    let holder = class.class_ref("test/Holder");
    let init = class.method_ref("test/Holder", "<init>", "()V");
    let value = class.field_ref("test/Holder", "value", "I");
    let mut asm = Asm::new();
    asm.op_u16(op::NEW, holder)
        .op(op::DUP)
        .op_u16(op::INVOKESPECIAL, init)
        .op(op::ASTORE_1)
        .op(op::ALOAD_1)
        .op(op::ILOAD_0)
        .op_u16(op::PUTFIELD, value)
        .op(op::ALOAD_1)
        .op_u16(op::GETFIELD, value)
        .op(op::ICONST_1)
        .op(op::IADD)
        .op(op::IRETURN);
    class.static_method("boxed", "(I)I", 3, 2, asm.finish());
    let native = translate(&class.finish(), Protection::Strings);

    let mut jvm = MockJvm::new();
    assert_eq!(returns_int(run(&native, &mut jvm, 0, &[Value::Int(41)])), 42);
    assert_eq!(jvm.calls, vec![String::from("test/Holder.<init>()V")]);
}

/// `int[] a = new int[n]; a[2] = 3; return a[2] + a.length;`
#[test]
fn arrays() {
    let mut class = ClassAssembler::new("test/Arrays");
    let mut asm = Asm::new();
    asm.op(op::ILOAD_0)
        .op_u8(op::NEWARRAY, 10)
        .op(op::ASTORE_1)
        .op(op::ALOAD_1)
        .op(op::ICONST_2)
        .op(op::ICONST_3)
        .op(op::IASTORE)
        .op(op::ALOAD_1)
        .op(op::ICONST_2)
        .op(op::IALOAD)
        .op(op::ALOAD_1)
        .op(op::ARRAYLENGTH)
        .op(op::IADD)
        .op(op::IRETURN);
    class.static_method("element", "(I)I", 3, 2, asm.finish());
    let native = translate(&class.finish(), Protection::Strings);

    let mut jvm = MockJvm::new();
    assert_eq!(returns_int(run(&native, &mut jvm, 0, &[Value::Int(5)])), 8);

    let result = run(&native, &mut jvm, 0, &[Value::Int(2)]);
    assert_eq!(
        thrown_class(&jvm, result),
        "java/lang/ArrayIndexOutOfBoundsException"
    );
    let result = run(&native, &mut jvm, 0, &[Value::Int(-1)]);
    assert_eq!(
        thrown_class(&jvm, result),
        "java/lang/NegativeArraySizeException"
    );
}

/// `return Util.twice(x) + 1;`
#[test]
fn static_calls_resolve_once() {
    let mut class = ClassAssembler::new("test/Calls");
    let twice = class.method_ref("test/Util", "twice", "(I)I");
    let mut asm = Asm::new();
    asm.op(op::ILOAD_0)
        .op_u16(op::INVOKESTATIC, twice)
        .op(op::ICONST_1)
        .op(op::IADD)
        .op(op::IRETURN);
    class.static_method("call", "(I)I", 2, 1, asm.finish());
    let native = translate(&class.finish(), Protection::Full);

    let mut jvm = MockJvm::new();
    jvm.define_static("test/Util.twice(I)I", |_, args| match args {
        [Value::Int(i)] => Ok(Some(Value::Int(i * 2))),
        other => panic!("bad arguments {:?}", other),
    });

    let mut evaluator = Evaluator::new(&native, &mut jvm);
    let first = evaluator.run(0, &[Value::Int(20)]).unwrap();
    let lookups = evaluator.bridge().class_lookups;
    let second = evaluator.run(0, &[Value::Int(-3)]).unwrap();
    assert_eq!(returns_int(first), 41);
    assert_eq!(returns_int(second), -5);
    assert_eq!(evaluator.bridge().class_lookups, lookups);
    assert_eq!(evaluator.bridge().members.len(), 1);
}

/// `return "hello";` and `return 123456;`, under every protection level
#[test]
fn constants_survive_protection() {
    for protection in [Protection::None, Protection::Strings, Protection::Full] {
        let mut class = ClassAssembler::new("test/Constants");
        let hello = class.string("hello, wörld");
        let number = class.integer(123_456);
        let mut greet = Asm::new();
        greet.op_u8(op::LDC, hello as u8).op(op::ARETURN);
        class.static_method("greet", "()Ljava/lang/String;", 1, 0, greet.finish());
        let mut big = Asm::new();
        big.op_u8(op::LDC, number as u8).op(op::IRETURN);
        class.static_method("big", "()I", 1, 0, big.finish());
        let native = translate(&class.finish(), protection);

        let mut jvm = MockJvm::new();
        match run(&native, &mut jvm, 0, &[]) {
            Completion::Return(Some(Value::Ref(Some(string)))) => assert_eq!(
                jvm.object(string),
                &MockObject::Str(String::from("hello, wörld"))
            ),
            other => panic!("expected a string, got {:?}", other),
        }
        assert_eq!(returns_int(run(&native, &mut jvm, 1, &[])), 123_456);
    }
}

/// `synchronized (o) { return 1; }` without the exception path
#[test]
fn monitors_pair_up() {
    let mut class = ClassAssembler::new("test/Monitors");
    let mut asm = Asm::new();
    asm.op(op::ALOAD_0)
        .op(op::MONITORENTER)
        .op(op::ICONST_1)
        .op(op::ALOAD_0)
        .op(op::MONITOREXIT)
        .op(op::IRETURN);
    class.static_method("locked", "(Ljava/lang/Object;)I", 2, 1, asm.finish());
    let native = translate(&class.finish(), Protection::Strings);

    let mut jvm = MockJvm::new();
    let lock = jvm.instance("java/lang/Object");
    assert_eq!(returns_int(run(&native, &mut jvm, 0, &[Value::Ref(Some(lock))])), 1);
    assert_eq!(jvm.monitors.get(&lock), Some(&0));

    let result = run(&native, &mut jvm, 0, &[Value::Ref(None)]);
    assert_eq!(thrown_class(&jvm, result), "java/lang/NullPointerException");
}

#[derive(Clone, Copy)]
enum Kind {
    Int,
    Long,
}

impl Kind {
    fn width(self) -> u8 {
        match self {
            Kind::Int => 1,
            Kind::Long => 2,
        }
    }
}

/// Pop `stack` (deepest first) into fresh locals from `first`, then fold the values into one
/// decimal number, deepest value first
fn fold_digits(asm: &mut Asm, stack: &[Kind], first: u8) -> u8 {
    let mut locals = vec![];
    let mut next = first;
    for kind in stack {
        locals.push(next);
        next += kind.width();
    }
    for (kind, local) in stack.iter().zip(&locals).rev() {
        match kind {
            Kind::Int => asm.op_u8(op::ISTORE, *local),
            Kind::Long => asm.op_u8(op::LSTORE, *local),
        };
    }
    for (i, (kind, local)) in stack.iter().zip(&locals).enumerate() {
        if i > 0 {
            asm.op_u8(op::BIPUSH, 10).op(op::IMUL);
        }
        match kind {
            Kind::Int => asm.op_u8(op::ILOAD, *local),
            Kind::Long => asm.op_u8(op::LLOAD, *local).op(op::L2I),
        };
        if i > 0 {
            asm.op(op::IADD);
        }
    }
    next
}

/// Every form of the stack shuffles, with the arguments pushed in order and each shuffled stack
/// read back deepest first
#[test]
fn stack_shuffles() {
    use Kind::{Int, Long};
    let cases: [(&str, &str, &[Kind], u8, &[Kind], &[Value], i32); 12] = [
        ("dup_x1", "(II)I", &[Int, Int], op::DUP_X1, &[Int, Int, Int], &[Value::Int(1), Value::Int(2)], 212),
        ("dup_x2", "(III)I", &[Int, Int, Int], op::DUP_X2, &[Int, Int, Int, Int], &[Value::Int(1), Value::Int(2), Value::Int(3)], 3123),
        ("dup_x2_wide", "(JI)I", &[Long, Int], op::DUP_X2, &[Int, Long, Int], &[Value::Long(4), Value::Int(3)], 343),
        ("dup2", "(II)I", &[Int, Int], op::DUP2, &[Int, Int, Int, Int], &[Value::Int(1), Value::Int(2)], 1212),
        ("dup2_wide", "(J)I", &[Long], op::DUP2, &[Long, Long], &[Value::Long(4)], 44),
        ("dup2_x1", "(III)I", &[Int, Int, Int], op::DUP2_X1, &[Int, Int, Int, Int, Int], &[Value::Int(1), Value::Int(2), Value::Int(3)], 23123),
        ("dup2_x1_wide", "(IJ)I", &[Int, Long], op::DUP2_X1, &[Long, Int, Long], &[Value::Int(1), Value::Long(4)], 414),
        ("dup2_x2", "(IIII)I", &[Int, Int, Int, Int], op::DUP2_X2, &[Int, Int, Int, Int, Int, Int], &[Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)], 341234),
        ("dup2_x2_wide_top", "(IIJ)I", &[Int, Int, Long], op::DUP2_X2, &[Long, Int, Int, Long], &[Value::Int(1), Value::Int(2), Value::Long(4)], 4124),
        ("dup2_x2_wide_bottom", "(JII)I", &[Long, Int, Int], op::DUP2_X2, &[Int, Int, Long, Int, Int], &[Value::Long(4), Value::Int(1), Value::Int(2)], 12412),
        ("dup2_x2_wide_both", "(JJ)I", &[Long, Long], op::DUP2_X2, &[Long, Long, Long], &[Value::Long(4), Value::Long(5)], 545),
        ("swap", "(II)I", &[Int, Int], op::SWAP, &[Int, Int], &[Value::Int(1), Value::Int(2)], 21),
    ];

    let mut class = ClassAssembler::new("test/Shuffle");
    for (name, descriptor, params, opcode, shuffled, _, _) in cases.iter() {
        let mut asm = Asm::new();
        let mut local = 0;
        for kind in params.iter() {
            match kind {
                Int => asm.op_u8(op::ILOAD, local),
                Long => asm.op_u8(op::LLOAD, local),
            };
            local += kind.width();
        }
        asm.op(*opcode);
        let max_locals = fold_digits(&mut asm, shuffled, local);
        asm.op(op::IRETURN);
        class.static_method(name, descriptor, 8, max_locals as u16, asm.finish());
    }
    let native = translate(&class.finish(), Protection::Strings);

    let mut jvm = MockJvm::new();
    for (method, (name, _, _, _, _, args, expected)) in cases.iter().enumerate() {
        let result = run(&native, &mut jvm, method, args);
        assert_eq!(returns_int(result), *expected, "{}", name);
    }
}

#[test]
fn dup_of_a_wide_value_is_rejected() {
    let mut class = ClassAssembler::new("test/BadDup");
    let mut asm = Asm::new();
    asm.op(op::LLOAD_0).op(op::DUP).op(op::POP2).op(op::LRETURN);
    class.static_method("twice", "(J)J", 4, 2, asm.finish());
    let unit = ClassUnit::load(&class.finish()).unwrap();

    let translation =
        translate_class(&unit, 0, &ClassMethodFilter::all(), Protection::Strings, 7).unwrap();
    assert!(translation.translated_methods().is_empty());
    assert_eq!(translation.diagnostics.len(), 1);
    let diagnostic = &translation.diagnostics[0];
    assert_eq!(diagnostic.method.as_deref(), Some("test/BadDup.twice(J)J"));
    match &diagnostic.error {
        Error::TypeInference { offset, .. } => assert_eq!(offset.0, 1),
        other => panic!("expected a type inference error, got {:?}", other),
    }
}

/// `return s + "=" + i;` as `javac` compiles it for Java 9 and later
#[test]
fn string_concatenation_runs_through_its_call_site() {
    let mut class = ClassAssembler::new("test/Concat").version(53);
    let call_site = class.string_concat("\u{1}=\u{1}", "(Ljava/lang/String;I)Ljava/lang/String;");
    let mut asm = Asm::new();
    asm.op(op::ALOAD_0)
        .op(op::ILOAD_1)
        .invokedynamic(call_site)
        .op(op::ARETURN);
    class.static_method("show", "(Ljava/lang/String;I)Ljava/lang/String;", 2, 2, asm.finish());
    let native = translate(&class.finish(), Protection::Strings);

    assert_eq!(native.hidden.len(), 1);
    let hidden = &native.hidden[0];
    assert_eq!(hidden.name.as_str(), "jvm2native$indy$0");
    assert_eq!(hidden.body, HiddenBody::InvokeDynamic(ConstantIndex(call_site)));

    let mut jvm = MockJvm::new();
    jvm.define_static(
        "test/Concat.jvm2native$indy$0(Ljava/lang/String;I)Ljava/lang/String;",
        |jvm, args| match args {
            [Value::Ref(Some(string)), Value::Int(i)] => {
                let joined = match jvm.object(*string) {
                    MockObject::Str(s) => format!("{}={}", s, i),
                    other => panic!("expected a string, got {:?}", other),
                };
                Ok(Some(Value::Ref(Some(jvm.new_object(MockObject::Str(joined))))))
            }
            other => panic!("bad arguments {:?}", other),
        },
    );
    let key = jvm.new_object(MockObject::Str(String::from("answer")));
    match run(&native, &mut jvm, 0, &[Value::Ref(Some(key)), Value::Int(42)]) {
        Completion::Return(Some(Value::Ref(Some(string)))) => {
            assert_eq!(jvm.object(string), &MockObject::Str(String::from("answer=42")))
        }
        other => panic!("expected a string, got {:?}", other),
    }
}

/// Two identical concatenations are still two call sites; two loads of one method type share
#[test]
fn call_sites_stay_apart_while_constants_are_shared() {
    let mut class = ClassAssembler::new("test/Sites").version(53);
    let call_site = class.string_concat("<\u{1}>", "(I)Ljava/lang/String;");
    let method_type = class.method_type("(I)V");
    let mut asm = Asm::new();
    asm.op(op::ILOAD_0)
        .invokedynamic(call_site)
        .op(op::POP)
        .op(op::ILOAD_0)
        .invokedynamic(call_site)
        .op(op::POP)
        .op_u16(op::LDC_W, method_type)
        .op(op::POP)
        .op_u16(op::LDC_W, method_type)
        .op(op::ARETURN);
    class.static_method("twice", "(I)Ljava/lang/Object;", 1, 1, asm.finish());
    let native = translate(&class.finish(), Protection::Strings);

    let names: Vec<&str> = native.hidden.iter().map(|hidden| hidden.name.as_str()).collect();
    assert_eq!(
        names,
        ["jvm2native$indy$0", "jvm2native$indy$1", "jvm2native$ldc$2"]
    );
    assert_eq!(native.hidden[2].body, HiddenBody::Constant(ConstantIndex(method_type)));
}
