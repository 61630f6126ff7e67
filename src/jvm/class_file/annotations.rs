use crate::jvm::class_file::{invalid_data, AttributeLike, Deserialize, Serialize, Utf8ConstantIndex};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result};

/// Annotation attributes, holding each annotation as its type plus its raw encoded bytes
///
/// Only the annotation type is ever inspected (to select or unselect members for translation),
/// so element values are validated while reading but not modelled.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16
#[derive(Debug, Clone, PartialEq)]
pub struct Annotations(pub Vec<RawAnnotation>);

#[derive(Debug, Clone, PartialEq)]
pub struct RawAnnotation {
    /// Field descriptor of the annotation type (eg. `Ljava/lang/Deprecated;`)
    pub type_index: Utf8ConstantIndex,

    /// Encoded `annotation` structure, starting with `type_index`
    pub bytes: Vec<u8>,
}

/// Runtime visible annotations use the same layout as invisible ones
pub struct RuntimeVisibleAnnotations(pub Annotations);
pub struct RuntimeInvisibleAnnotations(pub Annotations);

impl Serialize for Annotations {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.0.len() as u16).serialize(writer)?;
        for annotation in &self.0 {
            writer.write_all(&annotation.bytes)?;
        }
        Ok(())
    }
}

impl Deserialize for Annotations {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let count = u16::deserialize(reader)?;
        let mut annotations = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut recording = Recording {
                inner: reader,
                bytes: vec![],
            };
            let type_index = Utf8ConstantIndex::deserialize(&mut recording)?;
            skip_element_value_pairs(&mut recording)?;
            annotations.push(RawAnnotation {
                type_index,
                bytes: recording.bytes,
            });
        }
        Ok(Annotations(annotations))
    }
}

macro_rules! annotations_attribute {
    ($attr:ident, $name:literal) => {
        impl AttributeLike for $attr {
            const NAME: &'static str = $name;
        }

        impl Serialize for $attr {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                self.0.serialize(writer)
            }
        }

        impl Deserialize for $attr {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
                Ok($attr(Annotations::deserialize(reader)?))
            }
        }
    };
}

annotations_attribute!(RuntimeVisibleAnnotations, "RuntimeVisibleAnnotations");
annotations_attribute!(RuntimeInvisibleAnnotations, "RuntimeInvisibleAnnotations");

/// Reader that keeps a copy of everything read through it
struct Recording<'a, R> {
    inner: &'a mut R,
    bytes: Vec<u8>,
}

impl<'a, R: Read> Read for Recording<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let read = self.inner.read(buf)?;
        self.bytes.extend_from_slice(&buf[..read]);
        Ok(read)
    }
}

fn skip_element_value_pairs<R: ReadBytesExt>(reader: &mut R) -> Result<()> {
    let pairs = u16::deserialize(reader)?;
    for _ in 0..pairs {
        let _name_index = u16::deserialize(reader)?;
        skip_element_value(reader)?;
    }
    Ok(())
}

fn skip_element_value<R: ReadBytesExt>(reader: &mut R) -> Result<()> {
    match u8::deserialize(reader)? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            u16::deserialize(reader)?;
        }
        b'e' => {
            u16::deserialize(reader)?;
            u16::deserialize(reader)?;
        }
        b'@' => {
            u16::deserialize(reader)?;
            skip_element_value_pairs(reader)?;
        }
        b'[' => {
            let values = u16::deserialize(reader)?;
            for _ in 0..values {
                skip_element_value(reader)?;
            }
        }
        tag => {
            return Err(invalid_data(format!(
                "unknown annotation element tag {:?}",
                tag as char
            )))
        }
    }
    Ok(())
}
