use super::{FieldNode, MethodNode};
use crate::jvm::class_file::{ConstantTable, Version};
use crate::jvm::{BinaryName, ClassAccessFlags, InnerClassAccessFlags, Name};

/// Attribute which is not modelled in the tree, kept as its name and encoded body
///
/// Any constant pool indices in the body refer to the constant pool of the class the attribute
/// was read from (see [`ClassNode::constant_pool`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawAttribute {
    pub name: String,
    pub info: Vec<u8>,
}

/// Entry of the `InnerClasses` attribute
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InnerClass {
    /// Internal name of the inner class
    pub name: String,

    /// Internal name of the enclosing class (`None` for local and anonymous classes)
    pub outer_name: Option<String>,

    /// Simple name (`None` for anonymous classes)
    pub inner_name: Option<String>,
    pub access_flags: InnerClassAccessFlags,
}

/// Class tree
#[derive(Clone, Debug, PartialEq)]
pub struct ClassNode {
    pub version: Version,
    pub access_flags: ClassAccessFlags,

    /// Internal name of the class
    pub name: String,

    /// Internal name of the super class (`None` only for `java/lang/Object` and modules)
    pub super_name: Option<String>,

    /// Internal names of the directly implemented interfaces
    pub interfaces: Vec<String>,

    /// Generic signature
    pub signature: Option<String>,

    /// Name of the source file the class was compiled from
    pub source_file: Option<String>,
    pub inner_classes: Vec<InnerClass>,
    pub fields: Vec<FieldNode>,
    pub methods: Vec<MethodNode>,

    /// Attributes which are carried through without being interpreted
    pub attributes: Vec<RawAttribute>,

    /// Constant pool the class was read from (`None` for classes built directly)
    ///
    /// The writer starts off with these constants so that raw attributes stay valid.
    pub constant_pool: Option<ConstantTable>,
}

impl ClassNode {
    /// Empty class extending `java/lang/Object`
    pub fn new(
        version: Version,
        access_flags: ClassAccessFlags,
        name: impl Into<String>,
    ) -> ClassNode {
        ClassNode {
            version,
            access_flags,
            name: name.into(),
            super_name: Some(BinaryName::OBJECT.as_str().to_owned()),
            interfaces: vec![],
            signature: None,
            source_file: None,
            inner_classes: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
            constant_pool: None,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }
}
