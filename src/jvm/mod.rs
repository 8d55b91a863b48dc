//! Reading, building, and writing JVM class files
//!
//! [`class_file`] is the immutable image of a class, close to the binary format. Everything that
//! needs to change a class goes through the builders in [`model`], which own a
//! [`constant_pool::ConstantPool`] and represent method bodies as editable
//! [`code::InstructionList`]s. Building produces a fresh `ClassFile`.

mod access_flags;
pub mod annotations;
pub mod class_file;
pub mod class_set;
pub mod code;
pub mod constant_pool;
mod descriptors;
mod errors;
pub mod model;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
