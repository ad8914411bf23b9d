//! Binary-level structures of the class file format
//!
//! Everything here refers to constants by index: these types are what the reader decodes and
//! what the writer encodes, while the name-based tree lives in [`crate::jvm::model`].

mod attribute;
mod class;
mod constants;
mod version;

pub use attribute::*;
pub use class::*;
pub use constants::*;
pub use version::*;
