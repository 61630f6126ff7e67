//! Native form of translated methods
//!
//! [`ir`] is what the translator produces for each method. From there it is either rendered as a
//! C++ translation unit ([`emit`]) or executed directly against a [`crate::bridge::RuntimeBridge`]
//! ([`eval`]).

mod emit;
pub mod eval;
mod ir;
mod literal;
mod symbols;
mod writer;

pub use emit::*;
pub use ir::*;
pub use literal::*;
pub use symbols::*;
pub use writer::*;
