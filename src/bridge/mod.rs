//! Narrow surface through which native code re-enters the JVM
//!
//! Each [`BridgeOp`] is one C function implemented (on top of JNI) in the generated support
//! source. Translated code only ever touches objects through these functions, so the surface is
//! also modelled as the [`RuntimeBridge`] trait, which lets translated methods be executed
//! in-process (see [`crate::native::eval`]).

mod support;

pub use support::*;

use crate::jvm::{ArrayKind, BaseType, BinaryName};
use crate::native::{InvokeKind, SlotType};
use once_cell::sync::OnceCell;
use std::collections::BTreeSet;
use std::fmt;

/// Version of the bridge surface. Generated units refuse to compile against a support header with
/// a different version.
pub const BRIDGE_VERSION: u32 = 1;

macro_rules! bridge_ops {
    ($($op:ident => $symbol:literal / $arity:literal,)*) => {
        /// Functions exported by the bridge support source
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        pub enum BridgeOp {
            $($op,)*
        }

        impl BridgeOp {
            pub const ALL: &'static [BridgeOp] = &[$(BridgeOp::$op,)*];

            /// Exported C symbol
            pub fn symbol(self) -> &'static str {
                match self {
                    $(BridgeOp::$op => $symbol,)*
                }
            }

            /// Number of C parameters (including the `JNIEnv*` when there is one)
            pub fn arity(self) -> usize {
                match self {
                    $(BridgeOp::$op => $arity,)*
                }
            }
        }
    };
}

bridge_ops! {
    ResolveClass => "njb_resolve_class" / 3,
    ResolveMethod => "njb_resolve_method" / 6,
    ResolveField => "njb_resolve_field" / 6,
    Decode => "njb_decode" / 6,
    TakeException => "njb_take_exception" / 1,
    LoadString => "njb_load_string" / 3,
    LoadClass => "njb_load_class" / 2,
    Allocate => "njb_allocate" / 2,
    InvokeVirtual => "njb_invoke_virtual" / 5,
    InvokeInterface => "njb_invoke_interface" / 5,
    InvokeSpecial => "njb_invoke_special" / 6,
    InvokeStatic => "njb_invoke_static" / 5,
    GetField => "njb_get_field" / 4,
    SetField => "njb_set_field" / 5,
    GetStatic => "njb_get_static" / 4,
    SetStatic => "njb_set_static" / 5,
    Throw => "njb_throw" / 2,
    MonitorEnter => "njb_monitor_enter" / 2,
    MonitorExit => "njb_monitor_exit" / 2,
    NewArray => "njb_new_array" / 3,
    NewObjectArray => "njb_new_object_array" / 3,
    NewMultiArray => "njb_new_multi_array" / 4,
    ArrayLength => "njb_array_length" / 2,
    ArrayLoad => "njb_array_load" / 4,
    ArrayStore => "njb_array_store" / 5,
    CheckCast => "njb_check_cast" / 3,
    InstanceOf => "njb_instance_of" / 3,
    SameObject => "njb_same_object" / 3,
    IntDiv => "njb_idiv" / 3,
    IntRem => "njb_irem" / 3,
    LongDiv => "njb_ldiv" / 3,
    LongRem => "njb_lrem" / 3,
    IntShl => "njb_ishl" / 2,
    IntShr => "njb_ishr" / 2,
    IntUShr => "njb_iushr" / 2,
    LongShl => "njb_lshl" / 2,
    LongShr => "njb_lshr" / 2,
    LongUShr => "njb_lushr" / 2,
    FloatToInt => "njb_f2i" / 1,
    FloatToLong => "njb_f2l" / 1,
    DoubleToInt => "njb_d2i" / 1,
    DoubleToLong => "njb_d2l" / 1,
    LongCompare => "njb_lcmp" / 2,
    FloatCompareL => "njb_fcmpl" / 2,
    FloatCompareG => "njb_fcmpg" / 2,
    DoubleCompareL => "njb_dcmpl" / 2,
    DoubleCompareG => "njb_dcmpg" / 2,
    FloatRem => "njb_frem" / 2,
    DoubleRem => "njb_drem" / 2,
}

/// Opaque reference to a live object
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ObjectRef(pub u32);

/// Resolved class (`jclass` global reference)
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ClassHandle(pub u32);

/// Resolved method or field (`jmethodID` or `jfieldID`)
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct MemberHandle(pub u32);

/// Exception left pending by a bridge call
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Thrown(pub ObjectRef);

/// Value held in a stack or local slot
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// `None` is `null`
    Ref(Option<ObjectRef>),
}

impl Value {
    /// Value returned from a method whose exception is left pending
    pub fn zero(ty: SlotType) -> Value {
        match ty {
            SlotType::Int | SlotType::Top => Value::Int(0),
            SlotType::Long => Value::Long(0),
            SlotType::Float => Value::Float(0.0),
            SlotType::Double => Value::Double(0.0),
            SlotType::Ref => Value::Ref(None),
        }
    }

    pub fn slot_type(&self) -> SlotType {
        match self {
            Value::Int(_) => SlotType::Int,
            Value::Long(_) => SlotType::Long,
            Value::Float(_) => SlotType::Float,
            Value::Double(_) => SlotType::Double,
            Value::Ref(_) => SlotType::Ref,
        }
    }
}

/// Runtime services needed by translated code
///
/// Every method mirrors a [`BridgeOp`] (or the JNI lookup behind one of the resolving ops).
/// Methods that can raise return the raised object as `Err`. As in the JVM, a `null` object
/// operand raises `java/lang/NullPointerException`.
pub trait RuntimeBridge {
    fn find_class(&mut self, name: &str) -> Result<ClassHandle, Thrown>;

    fn method_id(
        &mut self,
        class: ClassHandle,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Result<MemberHandle, Thrown>;

    fn field_id(
        &mut self,
        class: ClassHandle,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Result<MemberHandle, Thrown>;

    /// Interned string with these contents
    fn load_string(&mut self, value: &str) -> Result<ObjectRef, Thrown>;

    /// `java/lang/Class` object of a class
    fn load_class(&mut self, class: ClassHandle) -> Result<ObjectRef, Thrown>;

    fn allocate(&mut self, class: ClassHandle) -> Result<ObjectRef, Thrown>;

    /// `receiver` is `None` only for static calls. `void` methods return `None`.
    fn invoke(
        &mut self,
        kind: InvokeKind,
        class: ClassHandle,
        method: MemberHandle,
        receiver: Option<Option<ObjectRef>>,
        args: &[Value],
    ) -> Result<Option<Value>, Thrown>;

    fn get_field(&mut self, object: Option<ObjectRef>, field: MemberHandle)
        -> Result<Value, Thrown>;

    fn set_field(
        &mut self,
        object: Option<ObjectRef>,
        field: MemberHandle,
        value: Value,
    ) -> Result<(), Thrown>;

    fn get_static(&mut self, class: ClassHandle, field: MemberHandle) -> Result<Value, Thrown>;

    fn set_static(
        &mut self,
        class: ClassHandle,
        field: MemberHandle,
        value: Value,
    ) -> Result<(), Thrown>;

    /// Object to raise for `athrow` (`NullPointerException` when `null`)
    fn throw_object(&mut self, object: Option<ObjectRef>) -> Thrown;

    /// Create a fresh exception of the given class
    fn throw_new(&mut self, class: &BinaryName, message: &str) -> Thrown;

    fn monitor_enter(&mut self, object: Option<ObjectRef>) -> Result<(), Thrown>;

    fn monitor_exit(&mut self, object: Option<ObjectRef>) -> Result<(), Thrown>;

    fn new_array(&mut self, element: BaseType, length: i32) -> Result<ObjectRef, Thrown>;

    fn new_object_array(&mut self, element: ClassHandle, length: i32)
        -> Result<ObjectRef, Thrown>;

    fn new_multi_array(&mut self, class: ClassHandle, lengths: &[i32])
        -> Result<ObjectRef, Thrown>;

    fn array_length(&mut self, array: Option<ObjectRef>) -> Result<i32, Thrown>;

    fn array_load(
        &mut self,
        array: Option<ObjectRef>,
        index: i32,
        kind: ArrayKind,
    ) -> Result<Value, Thrown>;

    fn array_store(
        &mut self,
        array: Option<ObjectRef>,
        index: i32,
        kind: ArrayKind,
        value: Value,
    ) -> Result<(), Thrown>;

    /// `null` passes any cast
    fn check_cast(&mut self, object: Option<ObjectRef>, class: ClassHandle) -> Result<(), Thrown>;

    /// `null` is never an instance
    fn is_instance_of(&mut self, object: Option<ObjectRef>, class: ClassHandle) -> bool;

    fn same_object(&mut self, a: Option<ObjectRef>, b: Option<ObjectRef>) -> bool {
        a == b
    }
}

/// Handle resolved on first use and cached for every use after that
///
/// This is the Rust counterpart of the atomic cache slots in generated code: however many threads
/// race on the first use, resolution succeeds at most once and every caller sees the same handle.
/// A failed resolution caches nothing, so the next use tries again.
#[derive(Debug)]
pub struct LazyHandle<T> {
    cell: OnceCell<T>,
}

impl<T> LazyHandle<T> {
    pub const fn new() -> LazyHandle<T> {
        LazyHandle {
            cell: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn get_or_resolve<E>(&self, resolve: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        self.cell.get_or_try_init(resolve)
    }
}

impl<T> Default for LazyHandle<T> {
    fn default() -> Self {
        LazyHandle::new()
    }
}

/// Mismatch between the bridge symbols generated code uses and those the support header declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkError {
    pub missing: Vec<String>,
    /// Version found in the header, when it is not [`BRIDGE_VERSION`]
    pub version_mismatch: Option<Option<u32>>,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(found) = self.version_mismatch {
            match found {
                Some(version) => write!(
                    f,
                    "bridge header has version {} but {} is required",
                    version, BRIDGE_VERSION
                )?,
                None => write!(f, "bridge header does not declare a version")?,
            }
            if !self.missing.is_empty() {
                write!(f, "; ")?;
            }
        }
        if !self.missing.is_empty() {
            write!(f, "undeclared bridge symbols: {}", self.missing.join(", "))?;
        }
        Ok(())
    }
}

/// Check that every referenced operation is declared (with `NJB_API`) in the support header
pub fn check_link(header: &str, referenced: &BTreeSet<BridgeOp>) -> Result<(), LinkError> {
    let version = header.lines().find_map(|line| {
        line.trim()
            .strip_prefix("#define NJB_BRIDGE_VERSION")
            .and_then(|rest| rest.trim().parse::<u32>().ok())
    });
    let declared: BTreeSet<&str> = header
        .lines()
        .filter_map(|line| line.trim().strip_prefix("NJB_API "))
        .filter_map(|decl| {
            let name_end = decl.find('(')?;
            decl[..name_end].split_whitespace().last()
        })
        .map(|name| name.trim_start_matches('*'))
        .collect();

    let missing: Vec<String> = referenced
        .iter()
        .map(|op| op.symbol())
        .filter(|symbol| !declared.contains(symbol))
        .map(String::from)
        .collect();
    let version_mismatch = if version == Some(BRIDGE_VERSION) {
        None
    } else {
        Some(version)
    };

    if missing.is_empty() && version_mismatch.is_none() {
        Ok(())
    } else {
        Err(LinkError {
            missing,
            version_mismatch,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    #[test]
    fn symbols_are_unique() {
        let symbols: BTreeSet<&str> = BridgeOp::ALL.iter().map(|op| op.symbol()).collect();
        assert_eq!(symbols.len(), BridgeOp::ALL.len());
        assert!(symbols.iter().all(|symbol| symbol.starts_with("njb_")));
    }

    #[test]
    fn concurrent_first_use_resolves_once() {
        const THREADS: usize = 16;
        let handle: LazyHandle<ClassHandle> = LazyHandle::new();
        let resolutions = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);
        let (handle, resolutions, barrier) = (&handle, &resolutions, &barrier);

        let results: Vec<ClassHandle> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(move || {
                        barrier.wait();
                        *handle
                            .get_or_resolve(|| {
                                resolutions.fetch_add(1, Ordering::SeqCst);
                                Ok::<_, ()>(ClassHandle(7))
                            })
                            .unwrap()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(resolutions.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), THREADS);
        assert!(results.iter().all(|h| *h == ClassHandle(7)));
    }

    #[test]
    fn failed_resolution_is_retried() {
        let handle: LazyHandle<u32> = LazyHandle::new();
        assert_eq!(handle.get_or_resolve(|| Err("not yet")), Err("not yet"));
        assert!(handle.get().is_none());
        assert_eq!(handle.get_or_resolve(|| Ok::<_, &str>(3)), Ok(&3));
        assert_eq!(handle.get_or_resolve(|| Ok::<_, &str>(4)), Ok(&3));
    }

    #[test]
    fn generated_header_links() {
        let header = support_header();
        let all: BTreeSet<BridgeOp> = BridgeOp::ALL.iter().copied().collect();
        assert_eq!(check_link(&header, &all), Ok(()));
    }

    #[test]
    fn missing_symbols_fail_to_link() {
        let header = support_header().replace("njb_idiv(", "njb_idiv_renamed(");
        let referenced: BTreeSet<BridgeOp> = [BridgeOp::IntDiv, BridgeOp::Allocate].into();
        let err = check_link(&header, &referenced).unwrap_err();
        assert_eq!(err.missing, vec![String::from("njb_idiv")]);
        assert_eq!(err.version_mismatch, None);

        let header = support_header().replace(
            &format!("#define NJB_BRIDGE_VERSION {}", BRIDGE_VERSION),
            "#define NJB_BRIDGE_VERSION 0",
        );
        let err = check_link(&header, &referenced).unwrap_err();
        assert_eq!(err.version_mismatch, Some(Some(0)));
    }
}
