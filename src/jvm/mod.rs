//! Object model of JVM classes, along with a reader and writer for class files
//!
//! There are two levels of representation:
//!
//!   - [`class_file`] mirrors the binary format: constant pool indices, encoded attributes
//!   - [`model`] is the tree that gets edited: everything is referred to by name, and code is a
//!     list of instructions with labels as jump targets
//!
//! [`reader`] goes from bytes to the tree and [`writer`] goes back, optionally recomputing the
//! maximum stack and locals and the stack map frames (see [`verifier`]).

mod access_flags;
mod binary_format;
pub mod class_file;
mod descriptors;
mod errors;
pub mod model;
mod names;
pub mod opcodes;
pub mod reader;
pub mod source;
pub mod verifier;
pub mod writer;

pub use access_flags::*;
pub use binary_format::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
pub use reader::{read_class, read_class_header, ClassHeader, ReaderFlags};
pub use source::{ClassSource, DirectoryClassSource};
pub use writer::{write_class, write_class_with_hierarchy, WriterFlags};
