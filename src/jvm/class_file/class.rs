use crate::jvm::class_file::{
    invalid_data, Attribute, ClassConstantIndex, Constant, ConstantIndex, Deserialize, Field,
    Method, Serialize, Utf8ConstantIndex, Version,
};
use crate::jvm::{ClassAccessFlags, Error};
use crate::util::{Offset, OffsetVec};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub version: Version,
    pub constants: OffsetVec<Constant>,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,
    /// Index `0` for `java/lang/Object` and `module-info`
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    pub const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Check for the magic header without parsing anything else
    pub fn has_magic(bytes: &[u8]) -> bool {
        bytes.starts_with(&ClassFile::MAGIC)
    }

    /// Read just the magic and version, so that unsupported versions can be rejected before
    /// attempting to parse constants they may have introduced
    pub fn read_version(bytes: &[u8]) -> Result<Version, Error> {
        let mut reader = bytes;
        read_magic(&mut reader).map_err(|err| Error::from_read(err, "header"))?;
        Version::deserialize(&mut reader).map_err(|err| Error::from_read(err, "header"))
    }

    /// Parse a complete class file. Trailing bytes are rejected.
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, Error> {
        let mut reader = bytes;
        let class_file =
            ClassFile::deserialize(&mut reader).map_err(|err| Error::from_read(err, "class"))?;
        if !reader.is_empty() {
            return Err(Error::malformed(format!(
                "{} trailing bytes after class file",
                reader.len()
            )));
        }
        Ok(class_file)
    }

    /// Encode the class file into bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = vec![];
        self.serialize(&mut bytes).map_err(Error::IoError)?;
        Ok(bytes)
    }

    /// Look up a utf8 constant
    pub fn utf8(&self, index: Utf8ConstantIndex) -> Option<&str> {
        match self.constants.get_offset(Offset(index.0 .0 as usize)) {
            Some(Constant::Utf8(utf8)) => Some(utf8),
            _ => None,
        }
    }

    /// Look up the name inside a class constant
    pub fn class_name(&self, index: ClassConstantIndex) -> Option<&str> {
        match self.constants.get_offset(Offset(index.0 .0 as usize)) {
            Some(Constant::Class(name)) => self.utf8(*name),
            _ => None,
        }
    }

    /// Name of this class
    pub fn this_class_name(&self) -> Option<&str> {
        self.class_name(self.this_class)
    }

    /// Name of an attribute
    pub fn attribute_name(&self, attribute: &Attribute) -> Option<&str> {
        self.utf8(attribute.name_index)
    }

    /// Find the first attribute with a given name
    pub fn find_attribute<'a>(&self, attributes: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
        attributes
            .iter()
            .find(|attribute| self.attribute_name(attribute) == Some(name))
    }

    /// Look up a constant (there is none at the second half of an 8-byte constant, nor outside
    /// of the pool)
    pub fn constant(&self, index: ConstantIndex) -> Option<&Constant> {
        self.constants.get_offset(Offset(index.0 as usize))
    }
}

fn read_magic<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<()> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != ClassFile::MAGIC {
        return Err(invalid_data("missing 0xCAFEBABE magic"));
    }
    Ok(())
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ClassFile {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
        read_magic(reader)?;
        Ok(ClassFile {
            version: Version::deserialize(reader)?,
            constants: OffsetVec::deserialize(reader)?,
            access_flags: ClassAccessFlags::deserialize(reader)?,
            this_class: ClassConstantIndex::deserialize(reader)?,
            super_class: ClassConstantIndex::deserialize(reader)?,
            interfaces: Vec::deserialize(reader)?,
            fields: Vec::deserialize(reader)?,
            methods: Vec::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}
