//! Class files with every cross reference resolved and every method body decoded
//!
//! Loading is strict: anything the later stages would have to second-guess (dangling constant
//! references, bad descriptors, branches into the middle of instructions, stack map frames off
//! instruction boundaries) is rejected here with [`Error::Malformed`].

mod class;
mod constant_pool;
mod method;

pub use class::*;
pub use constant_pool::*;
pub use method::*;

use crate::jvm::class_file::{
    Attribute, AttributeLike, ClassFile, RuntimeInvisibleAnnotations, RuntimeVisibleAnnotations,
};
use crate::jvm::Error;

/// Descriptors of the annotation types found in visible and invisible annotation attributes
fn annotation_types(class_file: &ClassFile, attributes: &[Attribute]) -> Result<Vec<String>, Error> {
    let mut types = vec![];
    for attribute in attributes {
        let name = class_file.attribute_name(attribute);
        let annotations = if name == Some(RuntimeVisibleAnnotations::NAME) {
            attribute.decode::<RuntimeVisibleAnnotations>().map(|attr| attr.0)
        } else if name == Some(RuntimeInvisibleAnnotations::NAME) {
            attribute.decode::<RuntimeInvisibleAnnotations>().map(|attr| attr.0)
        } else {
            continue;
        }
        .map_err(|err| Error::from_read(err, "annotations"))?;
        for annotation in annotations.0 {
            let descriptor = class_file.utf8(annotation.type_index).ok_or_else(|| {
                Error::malformed(format!(
                    "annotation type #{} is not a utf8 constant",
                    annotation.type_index.0 .0
                ))
            })?;
            types.push(descriptor.to_owned());
        }
    }
    Ok(types)
}
