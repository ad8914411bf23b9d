//! Stack map frames and the dataflow used to compute them
//!
//! For any specific instruction inside a method body, the stack and locals should have the same
//! structure, regardless of which control flow was used to reach that instruction. In other words:
//! although the values on the stack and in the locals may obviously be different, the types and
//! order of the stack and local variables cannot. This information is referred to as the _stack
//! map frame_ (represented using [`Frame`]) and the set of stack map frames for all possible jump
//! targets in a method is the _stack map table_.
//!
//! The "types" used in frames (represented using [`VerificationType`]) are slightly augmented to
//! take into account initialization and null. Since classes of version 50 and up must carry a
//! [`crate::jvm::class_file::StackMapTable`], rewriting their code means recomputing frames. That
//! is a fix-point computation ([`compute_frames`]): frames from the different paths reaching an
//! instruction are merged until nothing changes, and merging two object types needs to know
//! their closest common superclass (see [`TypeHierarchy`]).
//!
//! When only `max_stack` and `max_locals` are needed, [`compute_maxs`] tracks stack depths
//! instead of types. This works for old class files with subroutines too.
//!
//! See <https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1>

mod analysis;
mod frame;
mod hierarchy;
mod java_classes;
mod types;

pub use analysis::*;
pub use frame::*;
pub use hierarchy::*;
pub use types::*;
