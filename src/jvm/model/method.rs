use super::{InsnList, Label, RawAttribute};
use crate::jvm::{MethodAccessFlags, MethodDescriptor, ParseDescriptor, UnqualifiedName, Name};

/// Exception handler range
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TryCatchBlock {
    /// Start of the protected range (inclusive)
    pub start: Label,

    /// End of the protected range (exclusive)
    pub end: Label,

    /// Start of the handler code
    pub handler: Label,

    /// Internal name of the exception class caught (`None` catches everything, as for `finally`)
    pub catch_type: Option<String>,
}

/// Entry in the local variable table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVariable {
    pub name: String,
    pub descriptor: String,

    /// Generic signature (from the `LocalVariableTypeTable`)
    pub signature: Option<String>,

    /// Start of the scope of the variable (inclusive)
    pub start: Label,

    /// End of the scope of the variable (exclusive)
    pub end: Label,

    /// Slot of the variable
    pub index: u16,
}

/// Method of a class tree
#[derive(Clone, Debug, PartialEq)]
pub struct MethodNode {
    pub access_flags: MethodAccessFlags,
    pub name: String,
    pub descriptor: String,

    /// Generic method signature
    ///
    /// [Format](https://docs.oracle.com/javase/specs/jvms/se11/html/jvms-4.html#jvms-4.7.9.1)
    pub signature: Option<String>,

    /// Internal names of the exceptions declared to be thrown
    pub exceptions: Vec<String>,

    /// Body of the method (empty for abstract and native methods)
    pub instructions: InsnList,
    pub try_catch_blocks: Vec<TryCatchBlock>,

    /// Local variable table (`None` when the class had none or it was skipped while reading)
    pub local_variables: Option<Vec<LocalVariable>>,
    pub max_stack: u16,
    pub max_locals: u16,

    /// Attributes which are carried through without being interpreted
    pub attributes: Vec<RawAttribute>,
}

impl MethodNode {
    /// Method with an empty body
    pub fn new(
        access_flags: MethodAccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> MethodNode {
        MethodNode {
            access_flags,
            name: name.into(),
            descriptor: descriptor.into(),
            signature: None,
            exceptions: vec![],
            instructions: InsnList::new(),
            try_catch_blocks: vec![],
            local_variables: None,
            max_stack: 0,
            max_locals: 0,
            attributes: vec![],
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT.as_str()
    }

    pub fn is_class_initializer(&self) -> bool {
        self.name == UnqualifiedName::CLINIT.as_str()
    }

    /// Abstract and native methods have no code
    pub fn has_code(&self) -> bool {
        !self
            .access_flags
            .intersects(MethodAccessFlags::ABSTRACT | MethodAccessFlags::NATIVE)
    }

    pub fn parse_descriptor(&self) -> std::io::Result<MethodDescriptor> {
        MethodDescriptor::parse(&self.descriptor)
    }

    /// Does this method have the given name and descriptor?
    pub fn matches(&self, name: &str, descriptor: &str) -> bool {
        self.name == name && self.descriptor == descriptor
    }

    /// `name` followed by the descriptor, as used in diagnostics
    pub fn display_name(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }
}
