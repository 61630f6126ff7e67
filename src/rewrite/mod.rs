//! Bytecode side of a translation
//!
//! Translated methods become `native` stubs, and the class's static initializer is prefixed with
//! a call to the loader that registers the native implementations before anything else in the
//! class can run. Hidden methods the native code calls back into are appended. The class is also
//! tagged with a [`Jvm2NativeMarker`] so it is never translated twice.

mod bootstrap;
mod hidden;
mod loader;

pub use bootstrap::{PROLOGUE_LENGTH, REGISTER_NATIVES_DESCRIPTOR};
pub use loader::generate_loader;

use crate::jvm::class_file::{
    Annotations, Attribute, AttributeLike, ClassFile, Code, ConstantsPool, Jvm2NativeMarker,
    RuntimeInvisibleAnnotations, RuntimeVisibleAnnotations,
};
use crate::jvm::model::ClassUnit;
use crate::jvm::{BinaryName, MethodAccessFlags, Name};
use crate::native::HiddenMethod;
use crate::translate::{ClassMethodFilter, Error};

/// Rewrite a class whose methods at positions `translated` now have native implementations
///
/// Constants are only ever appended, so indices in the original class stay valid. That includes
/// the call sites and constants the `hidden` methods refer to.
pub fn rewrite_class(
    class: &ClassUnit,
    translated: &[usize],
    hidden: &[HiddenMethod],
    index: u32,
    loader: &BinaryName,
    strip_markers: bool,
) -> Result<Vec<u8>, Error> {
    let original = &class.class_file;
    let mut file = original.clone();
    let mut pool = ConstantsPool::from_offset_vec(original.constants.clone());

    for &method_index in translated {
        let method = file.methods.get_mut(method_index).ok_or_else(|| {
            Error::RewriteConflict(format!("no method at position {}", method_index))
        })?;
        method.access_flags.insert(MethodAccessFlags::NATIVE);
        method
            .attributes
            .retain(|attribute| original.attribute_name(attribute) != Some(Code::NAME));
    }

    let prologue = bootstrap::prologue(&mut pool, class.name.as_str(), index, loader)?;
    bootstrap::install(original, &mut file, &mut pool, prologue)?;

    if strip_markers {
        file.attributes = strip_marker_annotations(original, &mut pool, &file.attributes)?;
        for method in &mut file.methods {
            method.attributes = strip_marker_annotations(original, &mut pool, &method.attributes)?;
        }
    }

    for method in hidden {
        file.methods.push(hidden::method(&mut pool, method)?);
    }

    let marker = pool.get_attribute(&Jvm2NativeMarker {
        class_index: index,
    })?;
    file.attributes.push(marker);

    file.constants = pool.into_offset_vec();
    Ok(file.to_bytes()?)
}

/// Remove the selection annotations, dropping annotation attributes left empty
fn strip_marker_annotations(
    original: &ClassFile,
    pool: &mut ConstantsPool,
    attributes: &[Attribute],
) -> Result<Vec<Attribute>, Error> {
    let mut kept = Vec::with_capacity(attributes.len());
    for attribute in attributes {
        let name = original.attribute_name(attribute);
        let stripped = if name == Some(RuntimeVisibleAnnotations::NAME) {
            let RuntimeVisibleAnnotations(annotations) = decode(attribute)?;
            without_markers(original, annotations)
                .map(|annotations| pool.get_attribute(&RuntimeVisibleAnnotations(annotations)))
                .transpose()?
        } else if name == Some(RuntimeInvisibleAnnotations::NAME) {
            let RuntimeInvisibleAnnotations(annotations) = decode(attribute)?;
            without_markers(original, annotations)
                .map(|annotations| pool.get_attribute(&RuntimeInvisibleAnnotations(annotations)))
                .transpose()?
        } else {
            Some(attribute.clone())
        };
        kept.extend(stripped);
    }
    Ok(kept)
}

fn without_markers(original: &ClassFile, mut annotations: Annotations) -> Option<Annotations> {
    annotations.0.retain(|annotation| {
        !original
            .utf8(annotation.type_index)
            .map_or(false, ClassMethodFilter::is_marker)
    });
    if annotations.0.is_empty() {
        None
    } else {
        Some(annotations)
    }
}

fn decode<A: AttributeLike>(attribute: &Attribute) -> Result<A, Error> {
    attribute
        .decode()
        .map_err(|err| Error::from(crate::jvm::Error::from_read(err, A::NAME)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{
        BytecodeArray, BytecodeIndex, ClassConstantIndex, Constant, ConstantIndex,
        LineNumber, LineNumberTable, Method, RawAnnotation, Version,
    };
    use crate::jvm::{opcode, ClassAccessFlags};

    const SAMPLE: &str = "com/example/Sample";

    fn method(
        pool: &mut ConstantsPool,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        code: Vec<u8>,
        attributes: Vec<Attribute>,
    ) -> Method {
        let code = Code {
            max_stack,
            max_locals: 0,
            code_array: BytecodeArray(code),
            exception_table: vec![],
            attributes,
        };
        Method {
            access_flags: MethodAccessFlags::STATIC,
            name_index: pool.get_utf8(name).unwrap(),
            descriptor_index: pool.get_utf8(descriptor).unwrap(),
            attributes: vec![pool.get_attribute(&code).unwrap()],
        }
    }

    /// `static int answer() { return 42; }`, annotated with the include marker
    fn sample(with_clinit: bool) -> ClassUnit {
        let mut pool = ConstantsPool::new();
        let this_class = pool.get_class(SAMPLE).unwrap();
        let super_class = pool.get_class("java/lang/Object").unwrap();

        let mut methods = vec![method(&mut pool, "answer", "()I", 1, vec![0x10, 42, 0xac], vec![])];
        if with_clinit {
            let lines = pool
                .get_attribute(&LineNumberTable(vec![LineNumber {
                    start_pc: BytecodeIndex(0),
                    line_number: 7,
                }]))
                .unwrap();
            let code = vec![opcode::NOP, opcode::RETURN];
            methods.push(method(&mut pool, "<clinit>", "()V", 0, code, vec![lines]));
        }

        let marker = pool.get_utf8(ClassMethodFilter::INCLUDE_MARKER).unwrap();
        let mut bytes = marker.0 .0.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0, 0]);
        let annotation = RawAnnotation {
            type_index: marker,
            bytes,
        };
        let annotations = pool
            .get_attribute(&RuntimeInvisibleAnnotations(Annotations(vec![annotation])))
            .unwrap();

        let file = ClassFile {
            version: Version::JAVA8,
            constants: pool.into_offset_vec(),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods,
            attributes: vec![annotations],
        };
        ClassUnit::load(&file.to_bytes().unwrap()).unwrap()
    }

    fn loader() -> BinaryName {
        BinaryName::from_string(String::from("native0/Loader")).unwrap()
    }

    fn clinit_code(file: &ClassFile) -> Code {
        let method = file
            .methods
            .iter()
            .find(|method| file.utf8(method.name_index) == Some("<clinit>"))
            .unwrap();
        file.find_attribute(&method.attributes, Code::NAME)
            .unwrap()
            .decode()
            .unwrap()
    }

    fn u16_at(code: &[u8], at: usize) -> u16 {
        u16::from_be_bytes([code[at], code[at + 1]])
    }

    #[test]
    fn translated_methods_become_native() {
        let class = sample(true);
        let bytes = rewrite_class(&class, &[0], &[], 3, &loader(), false).unwrap();
        let rewritten = ClassUnit::load(&bytes).unwrap();

        assert_eq!(rewritten.marker, Some(Jvm2NativeMarker { class_index: 3 }));
        let answer = rewritten.method("answer", "()I").unwrap();
        assert!(answer.access_flags.contains(MethodAccessFlags::NATIVE));
        assert!(answer.code.is_none());
        assert_eq!(
            rewritten.annotations,
            vec![String::from(ClassMethodFilter::INCLUDE_MARKER)]
        );
    }

    #[test]
    fn existing_clinit_is_prefixed() {
        let class = sample(true);
        let bytes = rewrite_class(&class, &[0], &[], 3, &loader(), false).unwrap();
        let file = ClassFile::parse(&bytes).unwrap();
        let code = clinit_code(&file);
        let array = &code.code_array.0;

        assert_eq!(array.len(), PROLOGUE_LENGTH as usize + 2);
        assert_eq!(array[0], opcode::SIPUSH);
        assert_eq!(u16_at(array, 1), 3);
        assert_eq!(array[3], opcode::LDC_W);
        let this_class = ClassConstantIndex(ConstantIndex(u16_at(array, 4)));
        assert_eq!(file.class_name(this_class), Some(SAMPLE));
        assert_eq!(array[6], opcode::INVOKESTATIC);
        assert_eq!(&array[9..12], &[opcode::NOP; 3]);
        assert_eq!(&array[12..], &[opcode::NOP, opcode::RETURN]);
        assert_eq!(code.max_stack, 2);

        let lines: LineNumberTable = file
            .find_attribute(&code.attributes, LineNumberTable::NAME)
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(lines.0[0].start_pc, BytecodeIndex(PROLOGUE_LENGTH));
    }

    #[test]
    fn missing_clinit_is_created() {
        let class = sample(false);
        let bytes = rewrite_class(&class, &[0], &[], 0, &loader(), false).unwrap();
        let file = ClassFile::parse(&bytes).unwrap();

        assert_eq!(file.methods.len(), 2);
        let code = clinit_code(&file);
        assert_eq!(code.code_array.0.len(), PROLOGUE_LENGTH as usize + 1);
        assert_eq!(code.code_array.0.last(), Some(&opcode::RETURN));
        assert_eq!(code.max_locals, 0);
    }

    #[test]
    fn large_index_uses_integer_constant() {
        let class = sample(true);
        let bytes = rewrite_class(&class, &[0], &[], 40_000, &loader(), false).unwrap();
        let file = ClassFile::parse(&bytes).unwrap();
        let array = clinit_code(&file).code_array.0;

        assert_eq!(array[0], opcode::LDC_W);
        assert_eq!(
            file.constant(ConstantIndex(u16_at(&array, 1))),
            Some(&Constant::Integer(40_000))
        );
    }

    #[test]
    fn markers_are_stripped() {
        let class = sample(true);
        let bytes = rewrite_class(&class, &[0], &[], 1, &loader(), true).unwrap();
        let rewritten = ClassUnit::load(&bytes).unwrap();

        assert!(rewritten.annotations.is_empty());
        assert!(rewritten
            .class_file
            .find_attribute(&rewritten.class_file.attributes, RuntimeInvisibleAnnotations::NAME)
            .is_none());
    }

    #[test]
    fn unknown_method_position_is_a_conflict() {
        let class = sample(true);
        assert!(matches!(
            rewrite_class(&class, &[9], &[], 1, &loader(), false),
            Err(Error::RewriteConflict(_))
        ));
    }
}
