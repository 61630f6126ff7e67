//! Everything about reading, modelling and writing JVM classes

mod access_flags;
mod bytecode;
pub mod class_file;
mod descriptors;
mod errors;
pub mod model;
mod names;

pub use access_flags::*;
pub use bytecode::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
