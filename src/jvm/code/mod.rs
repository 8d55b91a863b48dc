//! Bytecode representation, editing, and encoding
//!
//! ### Structure
//!
//! Method code is an [`InstructionList`]: an ordered sequence of [`Instruction`]s addressed by
//! stable [`InstructionHandle`]s. Branches target handles rather than offsets, so the list can
//! be edited freely (inserting, removing, or replacing instructions) without any fix-ups.
//!
//! Offsets only come into existence when the list is laid out (see [`jump_encoding`]), which
//! happens lazily when something asks for an offset or for the encoded code array. Going the
//! other way, [`decode`] turns a code array from a parsed class file back into a list.
//!
//! ### Visiting
//!
//! Instructions are grouped into overlapping families (stack consumers, local variable
//! instructions, branches, ...). [`InstructionVisitor`] has a hook for each family and one for
//! each opcode, which [`Instruction::accept`] calls from most general to most specific.
//!
//! The [JVM instruction set][0] is modelled in full, including the reserved opcodes.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-6.html#jvms-6.5

mod decode;
mod encode;
mod instruction_list;
mod instructions;
pub mod jump_encoding;
mod opcode;
mod visitor;

pub use decode::*;
pub use instruction_list::*;
pub use instructions::*;
pub use opcode::*;
pub use visitor::*;
