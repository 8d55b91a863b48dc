//! Mutable classes, methods, and fields
//!
//! Builders are either made from scratch or by wrapping a parsed `ClassFile`. Wrapping checks
//! every index against the constant pool, so inconsistent input gets reported immediately rather
//! than when the class is next serialized.

mod class;
mod field;
mod method;

pub use class::*;
pub use field::*;
pub use method::*;
