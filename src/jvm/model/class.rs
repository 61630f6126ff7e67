use super::{annotation_types, ConstantPool, MethodUnit};
use crate::jvm::class_file::{AttributeLike, ClassFile, ConstantIndex, Field, Jvm2NativeMarker};
use crate::jvm::{
    BinaryName, ClassAccessFlags, Error, FieldAccessFlags, FieldType, Name, ParseDescriptor,
    RenderDescriptor, UnqualifiedName,
};

/// Field of a loaded class
#[derive(Clone, Debug)]
pub struct FieldUnit {
    pub access_flags: FieldAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
}

/// Fully loaded class
///
/// Immutable once loaded. The raw class file is kept alongside, since rewriting starts from a copy
/// of it.
#[derive(Clone, Debug)]
pub struct ClassUnit {
    pub name: BinaryName,
    /// `None` only for `java/lang/Object` and `module-info`
    pub super_class: Option<BinaryName>,
    pub interfaces: Vec<BinaryName>,
    pub access_flags: ClassAccessFlags,
    pub constants: ConstantPool,
    pub fields: Vec<FieldUnit>,
    pub methods: Vec<MethodUnit>,
    /// Descriptors of annotation types on the class
    pub annotations: Vec<String>,
    /// Present if the class was already produced by a previous translation
    pub marker: Option<Jvm2NativeMarker>,
    pub class_file: ClassFile,
}

impl ClassUnit {
    /// Load a class from its bytes
    ///
    /// The version is checked before anything else is parsed, so classes from newer JVMs are
    /// reported as unsupported rather than as malformed.
    pub fn load(bytes: &[u8]) -> Result<ClassUnit, Error> {
        let version = ClassFile::read_version(bytes)?;
        if !version.is_supported() {
            return Err(Error::UnsupportedVersion(version));
        }
        let class_file = ClassFile::parse(bytes)?;
        ClassUnit::from_class_file(class_file)
    }

    pub fn from_class_file(class_file: ClassFile) -> Result<ClassUnit, Error> {
        let constants = ConstantPool::resolve(&class_file.constants)?;

        let name = constants.object_class(class_file.this_class.0)?.clone();
        log::trace!("resolving {}", name);
        let super_class = if class_file.super_class.0 == ConstantIndex::NONE {
            None
        } else {
            Some(constants.object_class(class_file.super_class.0)?.clone())
        };
        let interfaces = class_file
            .interfaces
            .iter()
            .map(|interface| constants.object_class(interface.0).cloned())
            .collect::<Result<Vec<_>, Error>>()?;

        let fields = class_file
            .fields
            .iter()
            .map(|field| load_field(field, &constants))
            .collect::<Result<Vec<_>, Error>>()?;
        let methods = class_file
            .methods
            .iter()
            .enumerate()
            .map(|(index, method)| MethodUnit::load(&name, index, method, &class_file, &constants))
            .collect::<Result<Vec<_>, Error>>()?;

        let annotations = annotation_types(&class_file, &class_file.attributes)?;
        let marker = match class_file.find_attribute(&class_file.attributes, Jvm2NativeMarker::NAME) {
            Some(attribute) => Some(
                attribute
                    .decode::<Jvm2NativeMarker>()
                    .map_err(|err| Error::from_read(err, "Jvm2Native attribute"))?,
            ),
            None => None,
        };

        Ok(ClassUnit {
            name,
            super_class,
            interfaces,
            access_flags: class_file.access_flags,
            constants,
            fields,
            methods,
            annotations,
            marker,
            class_file,
        })
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodUnit> {
        self.methods
            .iter()
            .find(|method| method.name.as_str() == name && method.descriptor.render() == descriptor)
    }
}

fn load_field(field: &Field, constants: &ConstantPool) -> Result<FieldUnit, Error> {
    let name = constants.utf8(field.name_index.0)?;
    let descriptor = constants.utf8(field.descriptor_index.0)?;
    Ok(FieldUnit {
        access_flags: field.access_flags,
        name: UnqualifiedName::from_string(name.to_owned())
            .map_err(|err| Error::malformed(format!("field {}: {}", name, err)))?,
        descriptor: FieldType::parse(descriptor).map_err(|err| {
            Error::malformed(format!("field {} descriptor {:?}: {}", name, descriptor, err))
        })?,
    })
}
