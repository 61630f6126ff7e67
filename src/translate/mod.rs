//! Translation of classes into native units
//!
//! [`translate_method`] turns the bytecode of one method into the native IR, [`translate_class`]
//! does that for every selected method of a class, and [`translate_input`] drives a whole build
//! (reading classes, rewriting them, writing the C++ sources).

mod cfg;
mod class;
mod errors;
mod exceptions;
mod filter;
mod hidden;
mod method;
mod orchestrator;
mod progress;
mod settings;
mod types;

pub use cfg::*;
pub use class::*;
pub use errors::*;
pub use exceptions::*;
pub use filter::*;
pub use hidden::*;
pub use method::*;
pub use orchestrator::*;
pub use progress::*;
pub use settings::*;
