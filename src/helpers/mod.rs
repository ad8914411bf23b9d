//! Helpers for inspecting and editing class trees
//!
//! These sit on top of [`crate::jvm`]: finding and replacing members, copying method bodies
//! (optionally without line numbers or subroutines), rendering declarations and transcripts, and
//! naming things after methods.
//!
//! Queries return `Option`s and never fail. Transformations leave their input untouched and
//! return new nodes.

mod copy;
mod declaration;
mod naming;
mod query;
mod subroutines;
mod transcript;

pub use copy::*;
pub use declaration::*;
pub use naming::*;
pub use query::*;
pub use subroutines::*;
pub use transcript::*;

use crate::jvm::model::ClassNode;
use crate::jvm::{read_class, write_class, Error, ReaderFlags, WriterFlags};

/// Read a class, dropping its stack map frames (they get recomputed by [`class_node_to_bytes`])
pub fn class_node_from_bytes(bytes: &[u8]) -> Result<ClassNode, Error> {
    read_class(bytes, ReaderFlags::SKIP_FRAMES)
}

/// Write a class, computing maximums and stack map frames
pub fn class_node_to_bytes(class: &ClassNode) -> Result<Vec<u8>, Error> {
    write_class(class, WriterFlags::COMPUTE_FRAMES | WriterFlags::COMPUTE_MAXS)
}
