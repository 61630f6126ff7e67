use crate::jvm::class_file::{Constant, ConstantIndex};
use crate::jvm::{
    BinaryName, Error, FieldType, MethodDescriptor, Name, ParseDescriptor, RefType,
    UnqualifiedName,
};
use crate::util::{Offset, OffsetVec, Width};

/// Class referenced from the constant pool (arrays are possible, eg. `[I.clone()`)
pub type ClassRef = RefType<BinaryName>;

/// Resolved field reference
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FieldRef {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
}

/// Resolved method reference
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodRef {
    pub class: ClassRef,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub is_interface: bool,
}

/// Constant pool entry with every cross reference followed
///
/// Method handles are checked for well-formedness but kept shallow: translation only ever needs
/// their index. Dynamic constants and call sites keep their name and type, which fix the type of
/// the value they produce.
#[derive(Clone, PartialEq, Debug)]
pub enum ConstantEntry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(ClassRef),
    FieldRef(FieldRef),
    MethodRef(MethodRef),
    NameAndType { name: String, descriptor: String },
    MethodHandle,
    MethodType(String),
    Dynamic {
        name: String,
        descriptor: FieldType<BinaryName>,
    },
    InvokeDynamic {
        name: String,
        descriptor: MethodDescriptor<BinaryName>,
    },
    Module(String),
    Package(String),
}

impl Width for ConstantEntry {
    fn width(&self) -> usize {
        match self {
            ConstantEntry::Long(_) | ConstantEntry::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Constant pool of a loaded class
#[derive(Clone, Debug)]
pub struct ConstantPool {
    entries: OffsetVec<ConstantEntry>,
}

impl ConstantPool {
    /// Resolve every entry of a raw pool
    pub fn resolve(raw: &OffsetVec<Constant>) -> Result<ConstantPool, Error> {
        let resolver = Resolver { raw };
        let mut entries = OffsetVec::new_starting_at(Offset(1));
        for (offset, constant) in raw.iter() {
            let entry = resolver
                .resolve(constant)
                .map_err(|msg| Error::malformed(format!("constant #{}: {}", offset.0, msg)))?;
            entries.push(entry);
        }
        Ok(ConstantPool { entries })
    }

    /// Look up an entry
    pub fn get(&self, index: ConstantIndex) -> Result<&ConstantEntry, Error> {
        self.entries
            .get_offset(Offset(index.0 as usize))
            .ok_or_else(|| Error::malformed(format!("no usable constant at #{}", index.0)))
    }

    pub fn class(&self, index: ConstantIndex) -> Result<&ClassRef, Error> {
        match self.get(index)? {
            ConstantEntry::Class(class) => Ok(class),
            other => Err(wrong_kind(index, "class", other)),
        }
    }

    /// Class constant which must not be an array type
    pub fn object_class(&self, index: ConstantIndex) -> Result<&BinaryName, Error> {
        match self.class(index)? {
            RefType::Object(name) => Ok(name),
            other => Err(Error::malformed(format!(
                "constant #{} is the array class {:?} where a plain class is required",
                index.0, other
            ))),
        }
    }

    pub fn field_ref(&self, index: ConstantIndex) -> Result<&FieldRef, Error> {
        match self.get(index)? {
            ConstantEntry::FieldRef(field) => Ok(field),
            other => Err(wrong_kind(index, "field reference", other)),
        }
    }

    pub fn method_ref(&self, index: ConstantIndex) -> Result<&MethodRef, Error> {
        match self.get(index)? {
            ConstantEntry::MethodRef(method) => Ok(method),
            other => Err(wrong_kind(index, "method reference", other)),
        }
    }

    /// Name and descriptor of an `invokedynamic` call site
    pub fn call_site(
        &self,
        index: ConstantIndex,
    ) -> Result<(&str, &MethodDescriptor<BinaryName>), Error> {
        match self.get(index)? {
            ConstantEntry::InvokeDynamic { name, descriptor } => Ok((name, descriptor)),
            other => Err(wrong_kind(index, "call site", other)),
        }
    }

    pub fn utf8(&self, index: ConstantIndex) -> Result<&str, Error> {
        match self.get(index)? {
            ConstantEntry::Utf8(utf8) => Ok(utf8),
            other => Err(wrong_kind(index, "utf8", other)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConstantIndex, &ConstantEntry)> {
        self.entries
            .iter()
            .map(|(offset, entry)| (ConstantIndex(offset.0 as u16), entry))
    }
}

fn wrong_kind(index: ConstantIndex, expected: &str, found: &ConstantEntry) -> Error {
    Error::malformed(format!(
        "constant #{} should be a {} but is {:?}",
        index.0, expected, found
    ))
}

struct Resolver<'a> {
    raw: &'a OffsetVec<Constant>,
}

impl<'a> Resolver<'a> {
    fn raw(&self, index: ConstantIndex) -> Result<&'a Constant, String> {
        self.raw
            .get_offset(Offset(index.0 as usize))
            .ok_or_else(|| format!("dangling reference to #{}", index.0))
    }

    fn utf8(&self, index: ConstantIndex) -> Result<&'a str, String> {
        match self.raw(index)? {
            Constant::Utf8(utf8) => Ok(utf8),
            _ => Err(format!("#{} is not a utf8 constant", index.0)),
        }
    }

    fn class(&self, index: ConstantIndex) -> Result<ClassRef, String> {
        match self.raw(index)? {
            Constant::Class(name) => RefType::from_class_constant(self.utf8(name.0)?)
                .map_err(|err| format!("bad class name: {}", err)),
            _ => Err(format!("#{} is not a class constant", index.0)),
        }
    }

    fn name_and_type(&self, index: ConstantIndex) -> Result<(&'a str, &'a str), String> {
        match self.raw(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(name.0)?, self.utf8(descriptor.0)?))
            }
            _ => Err(format!("#{} is not a name and type constant", index.0)),
        }
    }

    fn member_name(name: &str) -> Result<UnqualifiedName, String> {
        UnqualifiedName::from_string(name.to_owned())
    }

    fn resolve(&self, constant: &Constant) -> Result<ConstantEntry, String> {
        Ok(match constant {
            Constant::Utf8(utf8) => ConstantEntry::Utf8(utf8.clone()),
            Constant::Integer(integer) => ConstantEntry::Integer(*integer),
            Constant::Float(float) => ConstantEntry::Float(*float),
            Constant::Long(long) => ConstantEntry::Long(*long),
            Constant::Double(double) => ConstantEntry::Double(*double),
            Constant::String(utf8) => ConstantEntry::String(self.utf8(utf8.0)?.to_owned()),
            Constant::Class(name) => ConstantEntry::Class(
                RefType::from_class_constant(self.utf8(name.0)?)
                    .map_err(|err| format!("bad class name: {}", err))?,
            ),
            Constant::FieldRef(class, name_and_type) => {
                let class = match self.class(class.0)? {
                    RefType::Object(name) => name,
                    other => return Err(format!("field owner {:?} is an array", other)),
                };
                let (name, descriptor) = self.name_and_type(name_and_type.0)?;
                ConstantEntry::FieldRef(FieldRef {
                    class,
                    name: Self::member_name(name)?,
                    descriptor: FieldType::parse(descriptor)
                        .map_err(|err| format!("bad field descriptor {:?}: {}", descriptor, err))?,
                })
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                let (name, descriptor) = self.name_and_type(name_and_type.0)?;
                ConstantEntry::MethodRef(MethodRef {
                    class: self.class(class.0)?,
                    name: Self::member_name(name)?,
                    descriptor: MethodDescriptor::parse(descriptor).map_err(|err| {
                        format!("bad method descriptor {:?}: {}", descriptor, err)
                    })?,
                    is_interface: *is_interface,
                })
            }
            Constant::NameAndType { name, descriptor } => ConstantEntry::NameAndType {
                name: self.utf8(name.0)?.to_owned(),
                descriptor: self.utf8(descriptor.0)?.to_owned(),
            },
            Constant::MethodHandle { member, .. } => match self.raw(*member)? {
                Constant::FieldRef(..) | Constant::MethodRef { .. } => ConstantEntry::MethodHandle,
                _ => return Err(String::from("method handle does not point at a member")),
            },
            Constant::MethodType { descriptor } => {
                ConstantEntry::MethodType(self.utf8(descriptor.0)?.to_owned())
            }
            Constant::Dynamic { name_and_type, .. } => {
                let (name, descriptor) = self.name_and_type(name_and_type.0)?;
                ConstantEntry::Dynamic {
                    name: name.to_owned(),
                    descriptor: FieldType::parse(descriptor).map_err(|err| {
                        format!("bad dynamic constant type {:?}: {}", descriptor, err)
                    })?,
                }
            }
            Constant::InvokeDynamic {
                method_descriptor, ..
            } => {
                let (name, descriptor) = self.name_and_type(method_descriptor.0)?;
                ConstantEntry::InvokeDynamic {
                    name: name.to_owned(),
                    descriptor: MethodDescriptor::parse(descriptor).map_err(|err| {
                        format!("bad call site descriptor {:?}: {}", descriptor, err)
                    })?,
                }
            }
            Constant::Module(name) => ConstantEntry::Module(self.utf8(name.0)?.to_owned()),
            Constant::Package(name) => ConstantEntry::Package(self.utf8(name.0)?.to_owned()),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{
        ClassConstantIndex, NameAndTypeConstantIndex, Utf8ConstantIndex,
    };

    fn utf8(idx: u16) -> Utf8ConstantIndex {
        Utf8ConstantIndex(ConstantIndex(idx))
    }

    #[test]
    fn resolves_member_references() {
        let mut raw = OffsetVec::new_starting_at(Offset(1));
        raw.push(Constant::Utf8(String::from("[I"))); // 1
        raw.push(Constant::Class(utf8(1))); // 2
        raw.push(Constant::Utf8(String::from("clone"))); // 3
        raw.push(Constant::Utf8(String::from("()Ljava/lang/Object;"))); // 4
        raw.push(Constant::NameAndType {
            name: utf8(3),
            descriptor: utf8(4),
        }); // 5
        raw.push(Constant::MethodRef {
            class: ClassConstantIndex(ConstantIndex(2)),
            name_and_type: NameAndTypeConstantIndex(ConstantIndex(5)),
            is_interface: false,
        }); // 6

        let pool = ConstantPool::resolve(&raw).unwrap();
        let method = pool.method_ref(ConstantIndex(6)).unwrap();
        assert_eq!(method.class.class_constant_name(), "[I");
        assert_eq!(method.name.as_str(), "clone");
        assert!(pool.object_class(ConstantIndex(2)).is_err());
        assert!(pool.field_ref(ConstantIndex(6)).is_err());
    }

    #[test]
    fn rejects_dangling_and_mistyped_references() {
        let mut raw = OffsetVec::new_starting_at(Offset(1));
        raw.push(Constant::Class(utf8(7)));
        assert!(matches!(ConstantPool::resolve(&raw), Err(Error::Malformed(_))));

        let mut raw = OffsetVec::new_starting_at(Offset(1));
        raw.push(Constant::Integer(3));
        raw.push(Constant::String(utf8(1)));
        assert!(matches!(ConstantPool::resolve(&raw), Err(Error::Malformed(_))));

        let mut raw = OffsetVec::new_starting_at(Offset(1));
        raw.push(Constant::Long(3));
        raw.push(Constant::String(utf8(2)));
        assert!(ConstantPool::resolve(&raw).is_err(), "second half of a long is unusable");
    }
}
