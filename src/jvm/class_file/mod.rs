//! Raw class file structures, read and written without interpretation
//!
//! Everything here mirrors the binary layout. Cross references between constants are plain
//! indices; resolving them is the job of [`crate::jvm::model`].

mod annotations;
mod attribute;
mod binary_format;
mod class;
mod constants;
mod field;
mod method;
mod verification;
mod version;

pub use annotations::*;
pub use attribute::*;
pub use binary_format::*;
pub use class::*;
pub use constants::*;
pub use field::*;
pub use method::*;
pub use verification::*;
pub use version::*;
