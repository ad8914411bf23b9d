//! Tree representation of classes
//!
//! This is the representation to use while inspecting or editing classes. Everything is referred
//! to by name (internal names for classes, plain strings for member names and descriptors), so a
//! tree holds no references into the class file it was read from.
//!
//!   - __Class__ is represented using [`ClassNode`]
//!   - __Method__ is represented using [`MethodNode`], with its body in an [`InsnList`]
//!   - __Field__ is represented using [`FieldNode`]

mod builder;
mod class;
mod field;
mod instructions;
mod label;
mod method;

pub use builder::*;
pub use class::*;
pub use field::*;
pub use instructions::*;
pub use label::*;
pub use method::*;
