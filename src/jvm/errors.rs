use super::model::Label;
use std::fmt;

/// Errors surfaced while reading, writing, or transforming classes
#[derive(Debug)]
pub enum Error {
    /// The input bytes do not parse as a class file
    MalformedClassFile(Malformed),

    /// A class tree violates an invariant at write (or transform) time
    InconsistentClassFile(Inconsistency),

    /// A class-file feature that is recognized but not handled
    UnsupportedFeature(String),

    /// The byte source did not know the resource path
    ClassNotFound(String),

    IoError(std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Malformed {
    /// Input ended while reading something at this offset
    UnexpectedEnd { offset: usize },
    BadMagic(u32),
    BadConstantTag { index: u16, tag: u8 },

    /// Index is out of bounds or points into the middle of a wide constant
    BadConstantIndex { index: u16, expected: &'static str },

    /// Index points to a constant, but not of the expected kind
    WrongConstantKind {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },
    BadModifiedUtf8 { index: u16 },
    BadOpcode { opcode: u8, offset: usize },

    /// Bytecode offset which isn't the start of an instruction
    BadBytecodeOffset { offset: usize },
    BadDescriptor(String),
    BadName(String),
    BadAttribute { name: String, message: String },
    TrailingBytes { offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// A label is referenced but never placed in the instruction stream
    UnresolvedLabel { method: String, label: Label },

    /// A label is placed more than once in the instruction stream
    DuplicateLabel { method: String, label: Label },
    BadDescriptor(String),
    BadName(String),
    CodeTooLarge { method: String, length: usize },
    ConstantPoolOverflow,

    /// A conditional jump is too far, and frames for the widened code cannot be computed
    JumpOutOfRange { method: String },
    RecursiveSubroutine { method: String },
    RetOutsideSubroutine { method: String },

    /// The instruction at this index cannot be typed while computing frames or maximums
    Verification {
        method: String,
        index: usize,
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedClassFile(malformed) => {
                write!(f, "malformed class file: {}", malformed)
            }
            Error::InconsistentClassFile(inconsistency) => {
                write!(f, "inconsistent class: {}", inconsistency)
            }
            Error::UnsupportedFeature(feature) => write!(f, "unsupported feature: {}", feature),
            Error::ClassNotFound(path) => write!(f, "class not found: {}", path),
            Error::IoError(err) => write!(f, "i/o error: {}", err),
        }
    }
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Malformed::UnexpectedEnd { offset } => {
                write!(f, "unexpected end of input at offset {}", offset)
            }
            Malformed::BadMagic(magic) => write!(f, "bad magic number 0x{:08X}", magic),
            Malformed::BadConstantTag { index, tag } => {
                write!(f, "constant #{} has unknown tag {}", index, tag)
            }
            Malformed::BadConstantIndex { index, expected } => {
                write!(f, "constant #{} is not a valid {}", index, expected)
            }
            Malformed::WrongConstantKind {
                index,
                expected,
                found,
            } => write!(f, "constant #{} is a {} instead of a {}", index, found, expected),
            Malformed::BadModifiedUtf8 { index } => {
                write!(f, "constant #{} is not valid modified UTF-8", index)
            }
            Malformed::BadOpcode { opcode, offset } => {
                write!(f, "unknown opcode 0x{:02X} at offset {}", opcode, offset)
            }
            Malformed::BadBytecodeOffset { offset } => {
                write!(f, "bytecode offset {} is not an instruction boundary", offset)
            }
            Malformed::BadDescriptor(desc) => write!(f, "bad descriptor '{}'", desc),
            Malformed::BadName(msg) => write!(f, "bad name: {}", msg),
            Malformed::BadAttribute { name, message } => {
                write!(f, "bad '{}' attribute: {}", name, message)
            }
            Malformed::TrailingBytes { offset } => {
                write!(f, "trailing bytes starting at offset {}", offset)
            }
        }
    }
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::UnresolvedLabel { method, label } => {
                write!(f, "{}: label {:?} is never placed", method, label)
            }
            Inconsistency::DuplicateLabel { method, label } => {
                write!(f, "{}: label {:?} is placed twice", method, label)
            }
            Inconsistency::BadDescriptor(desc) => write!(f, "bad descriptor '{}'", desc),
            Inconsistency::BadName(msg) => write!(f, "bad name: {}", msg),
            Inconsistency::CodeTooLarge { method, length } => {
                write!(f, "{}: code length {} exceeds 65535 bytes", method, length)
            }
            Inconsistency::ConstantPoolOverflow => f.write_str("constant pool overflow"),
            Inconsistency::JumpOutOfRange { method } => write!(
                f,
                "{}: conditional jump out of range (requires computed frames)",
                method
            ),
            Inconsistency::RecursiveSubroutine { method } => {
                write!(f, "{}: recursive subroutine", method)
            }
            Inconsistency::RetOutsideSubroutine { method } => {
                write!(f, "{}: `ret` outside of a subroutine", method)
            }
            Inconsistency::Verification {
                method,
                index,
                message,
            } => write!(f, "{}: instruction {}: {}", method, index, message),
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

impl From<Malformed> for Error {
    fn from(malformed: Malformed) -> Error {
        Error::MalformedClassFile(malformed)
    }
}

impl From<Inconsistency> for Error {
    fn from(inconsistency: Inconsistency) -> Error {
        Error::InconsistentClassFile(inconsistency)
    }
}
