use super::{ConstantValue, RawAttribute};
use crate::jvm::FieldAccessFlags;

/// Field of a class tree
#[derive(Clone, Debug, PartialEq)]
pub struct FieldNode {
    pub access_flags: FieldAccessFlags,
    pub name: String,
    pub descriptor: String,

    /// Generic signature
    pub signature: Option<String>,

    /// Initial value (from the `ConstantValue` attribute, only meaningful on static fields)
    pub value: Option<ConstantValue>,

    /// Attributes which are carried through without being interpreted
    pub attributes: Vec<RawAttribute>,
}

impl FieldNode {
    pub fn new(
        access_flags: FieldAccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> FieldNode {
        FieldNode {
            access_flags,
            name: name.into(),
            descriptor: descriptor.into(),
            signature: None,
            value: None,
            attributes: vec![],
        }
    }
}
