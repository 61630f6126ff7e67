use super::bootstrap::REGISTER_NATIVES_DESCRIPTOR;
use crate::jvm::class_file::{BytecodeArray, ClassFile, Code, ConstantsPool, Method, Version};
use crate::jvm::{opcode, BinaryName, ClassAccessFlags, Error, MethodAccessFlags, Name, UnqualifiedName};

/// Generate the loader class
///
/// ```java
/// public final class Loader {
///     public static native void registerNatives(int index, Class<?> clazz);
///     static { System.loadLibrary(library); }
/// }
/// ```
pub fn generate_loader(loader: &BinaryName, library: &str) -> Result<Vec<u8>, Error> {
    let mut constants = ConstantsPool::new();
    let this_class = constants.get_class(loader.as_str())?;
    let super_class = constants.get_class(BinaryName::OBJECT.as_str())?;

    let register_natives = Method {
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC | MethodAccessFlags::NATIVE,
        name_index: constants.get_utf8(UnqualifiedName::REGISTERNATIVES.as_str())?,
        descriptor_index: constants.get_utf8(REGISTER_NATIVES_DESCRIPTOR)?,
        attributes: vec![],
    };

    let library_string = constants.get_string(library)?;
    let load_library = constants.get_method_ref(
        BinaryName::SYSTEM.as_str(),
        UnqualifiedName::LOADLIBRARY.as_str(),
        "(Ljava/lang/String;)V",
        false,
    )?;
    let mut code_array = vec![opcode::LDC_W];
    code_array.extend_from_slice(&library_string.0 .0.to_be_bytes());
    code_array.push(opcode::INVOKESTATIC);
    code_array.extend_from_slice(&load_library.0 .0.to_be_bytes());
    code_array.push(opcode::RETURN);
    let code = Code {
        max_stack: 1,
        max_locals: 0,
        code_array: BytecodeArray(code_array),
        exception_table: vec![],
        attributes: vec![],
    };
    let static_init = Method {
        access_flags: MethodAccessFlags::STATIC,
        name_index: constants.get_utf8(UnqualifiedName::CLINIT.as_str())?,
        descriptor_index: constants.get_utf8("()V")?,
        attributes: vec![constants.get_attribute(&code)?],
    };

    let class = ClassFile {
        version: Version::JAVA8,
        constants: constants.into_offset_vec(),
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL | ClassAccessFlags::SUPER,
        this_class,
        super_class,
        interfaces: vec![],
        fields: vec![],
        methods: vec![register_natives, static_init],
        attributes: vec![],
    };
    class.to_bytes()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::model::{ClassUnit, ConstantEntry};

    #[test]
    fn loader_round_trips() {
        let loader = BinaryName::from_string(String::from("native0/Loader")).unwrap();
        let bytes = generate_loader(&loader, "jvm2native").unwrap();
        let class = ClassUnit::load(&bytes).unwrap();

        assert_eq!(class.name, loader);
        assert_eq!(class.methods.len(), 2);

        let register = class
            .method("registerNatives", REGISTER_NATIVES_DESCRIPTOR)
            .unwrap();
        assert!(register.access_flags.contains(MethodAccessFlags::NATIVE));
        assert!(register.code.is_none());

        let clinit = class.method("<clinit>", "()V").unwrap();
        assert!(clinit.code.is_some());
        assert!(class
            .constants
            .iter()
            .any(|(_, constant)| matches!(constant, ConstantEntry::String(s) if s == "jvm2native")));
    }
}
