//! Reading, editing, and writing JVM class files
//!
//! [`jvm`] has the class tree along with the reader and writer (which can recompute maximums and
//! stack map frames), and [`helpers`] has the edits and renderings built on top of the tree.

pub mod helpers;
pub mod jvm;
mod util;
