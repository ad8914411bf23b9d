use std::borrow::Cow;
use std::fmt::{Debug, Error as FmtError, Formatter};

/// Names of methods, fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces in their internal form (`a/b/C`)
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct BinaryName(Cow<'static, str>);

/// Extracts the raw underlying string name
impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extact the raw underlying string data:
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extact the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(format!("Unqualified name '{}' is empty", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(UnqualifiedName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(format!("Binary name '{}' is empty", name))
        } else {
            name.split('/').map(UnqualifiedName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(BinaryName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    /// Check a method name, which additionally allows the two special initializer names
    pub fn check_valid_method(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name == Self::INIT.as_str() || name == Self::CLINIT.as_str() {
            Ok(())
        } else if name.contains(&['<', '>'][..]) {
            Err(format!("Method name '{}' contains an angle bracket", name))
        } else {
            Self::check_valid(name)
        }
    }

    // Special unqualified names - only these are allowed to have angle brackets in them
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");
}

impl BinaryName {
    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    /// Build a name from its class-name form (`a.b.C`)
    pub fn from_class_name(class_name: &str) -> Result<BinaryName, String> {
        BinaryName::from_string(class_to_internal_name(class_name))
    }

    /// Render in class-name form (`a.b.C`)
    pub fn class_name(&self) -> String {
        internal_to_class_name(self.as_str())
    }

    /// Path under which a class loader would find the class file (`a/b/C.class`)
    pub fn resource_path(&self) -> String {
        format!("{}.class", self.as_str())
    }

    /// Last segment of the name (`C` for `a/b/C`)
    pub fn simple_name(&self) -> &str {
        let name = self.as_str();
        match name.rfind('/') {
            Some(idx) => &name[idx + 1..],
            None => name,
        }
    }

    // JDK names
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const METHODHANDLE: Self = Self::name("java/lang/invoke/MethodHandle");
    pub const METHODTYPE: Self = Self::name("java/lang/invoke/MethodType");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
}

/// Convert an internal name (`a/b/C`) to a class name (`a.b.C`)
pub fn internal_to_class_name(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

/// Convert a class name (`a.b.C`) to an internal name (`a/b/C`)
pub fn class_to_internal_name(class_name: &str) -> String {
    class_name.replace('.', "/")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn name_forms() {
        let name = BinaryName::from_class_name("java.util.Map$Entry").unwrap();
        assert_eq!(name.as_str(), "java/util/Map$Entry");
        assert_eq!(name.class_name(), "java.util.Map$Entry");
        assert_eq!(name.resource_path(), "java/util/Map$Entry.class");
        assert_eq!(name.simple_name(), "Map$Entry");
        assert_eq!(BinaryName::OBJECT.simple_name(), "Object");
    }

    #[test]
    fn invalid_names() {
        assert!(BinaryName::check_valid("").is_err());
        assert!(BinaryName::check_valid("a//b").is_err());
        assert!(BinaryName::check_valid("a/b;").is_err());
        assert!(UnqualifiedName::check_valid("a.b").is_err());
        assert!(UnqualifiedName::check_valid_method("<init>").is_ok());
        assert!(UnqualifiedName::check_valid_method("<foo>").is_err());
        assert!(UnqualifiedName::check_valid_method("foo").is_ok());
    }
}
