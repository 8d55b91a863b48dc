use super::class_file::Constant;
use super::code::InstructionHandle;
use crate::util::Offset;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// The constant pool has no room left for this constant
    ConstantPoolOverflow {
        constant: Constant,
        offset: usize,
    },

    /// Constant index is zero, past the end of the pool, or the phantom slot of a wide entry
    InvalidConstantIndex(u16),

    /// Constant index points to the wrong kind of constant
    UnexpectedConstant {
        index: u16,
        expected: &'static str,
    },

    /// A branch at `offset` needs a displacement its encoding cannot represent
    BranchOutOfRange {
        offset: Offset,
        displacement: isize,
    },

    /// Removing an instruction would leave these instructions (branches, exception handlers, or
    /// debug table entries) pointing at nothing
    TargetLost(Vec<InstructionHandle>),

    /// Handle does not refer to a live instruction of this list
    StaleHandle(InstructionHandle),

    /// Method code is longer than 65535 bytes
    MethodCodeOverflow(Offset),

    /// Class file bytes or structures are inconsistent
    MalformedClass(String),

    /// Bytecode could not be decoded
    MalformedCode {
        offset: Offset,
        reason: String,
    },

    /// Constant value does not match the field descriptor
    IncompatibleConstant {
        descriptor: String,
        constant: Constant,
    },

    MissingMember(String),
    IoError(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConstantPoolOverflow { constant, offset } => write!(
                f,
                "constant pool overflow adding {:?} at offset {}",
                constant, offset
            ),
            Error::InvalidConstantIndex(index) => write!(f, "invalid constant index #{}", index),
            Error::UnexpectedConstant { index, expected } => {
                write!(f, "constant #{} is not a {}", index, expected)
            }
            Error::BranchOutOfRange {
                offset,
                displacement,
            } => write!(
                f,
                "branch at offset {} cannot encode displacement {}",
                offset.0, displacement
            ),
            Error::TargetLost(targeters) => write!(
                f,
                "instruction is still targeted by {} instruction(s)",
                targeters.len()
            ),
            Error::StaleHandle(handle) => write!(f, "stale instruction handle {:?}", handle),
            Error::MethodCodeOverflow(offset) => {
                write!(f, "method code is too long ({} bytes)", offset.0)
            }
            Error::MalformedClass(msg) => write!(f, "malformed class: {}", msg),
            Error::MalformedCode { offset, reason } => {
                write!(f, "malformed code at offset {}: {}", offset.0, reason)
            }
            Error::IncompatibleConstant {
                descriptor,
                constant,
            } => write!(
                f,
                "constant {:?} cannot initialize a field of type {}",
                constant, descriptor
            ),
            Error::MissingMember(member) => write!(f, "missing member {}", member),
            Error::IoError(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
