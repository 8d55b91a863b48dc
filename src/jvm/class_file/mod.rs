//! Binary layout of class files
//!
//! Everything in here is a plain image of the bytes: constant indices are not resolved or
//! checked. The builders in `jvm::model` are the mutable counterpart.

mod attribute;
mod binary_format;
mod class;
mod constants;
mod field;
mod method;
mod version;

pub use attribute::*;
pub use binary_format::*;
pub use class::*;
pub use constants::*;
pub use field::*;
pub use method::*;
pub use version::*;
