use super::java_classes::java_class;
use crate::jvm::reader::read_class_header;
use crate::jvm::source::{resource_path, ClassSource};
use crate::jvm::{internal_to_class_name, BinaryName, ClassAccessFlags, Name};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// Knowledge of the class hierarchy needed to merge reference types when computing frames
///
/// Class names are internal names (never array descriptors: arrays are merged before the
/// hierarchy is consulted).
pub trait TypeHierarchy {
    /// Internal name of the closest superclass shared by two classes
    fn common_superclass(&self, class1: &str, class2: &str) -> String;
}

/// Superclass and interface-ness of a class, as far as merging is concerned
#[derive(Debug, Clone)]
struct ClassInfo {
    super_name: Option<String>,
    is_interface: bool,
}

impl ClassInfo {
    fn java_library(class: &str) -> Option<ClassInfo> {
        java_class(class).map(|(super_name, is_interface)| ClassInfo {
            super_name: super_name.map(str::to_owned),
            is_interface,
        })
    }
}

/// Closest common superclass, walking superclass chains with `class_info`
///
/// Interfaces merge with anything to `java/lang/Object` (just as the verifier treats them), and
/// so does any class whose chain can't be fully resolved.
fn common_superclass_with(
    class1: &str,
    class2: &str,
    class_info: impl Fn(&str) -> Option<ClassInfo>,
) -> String {
    let object = BinaryName::OBJECT;
    let object = object.as_str();
    if class1 == class2 {
        return class1.to_owned();
    }
    if class1 == object || class2 == object {
        return object.to_owned();
    }

    let is_interface = |class: &str| class_info(class).map(|info| info.is_interface);
    match (is_interface(class1), is_interface(class2)) {
        (Some(false), Some(false)) => (),
        _ => return object.to_owned(),
    }

    let chain1 = superclass_chain(class1, &class_info);
    let chain2 = superclass_chain(class2, &class_info);
    match (chain1, chain2) {
        (Some(chain1), Some(chain2)) => chain2
            .into_iter()
            .find(|class| chain1.contains(class))
            .unwrap_or_else(|| object.to_owned()),
        _ => object.to_owned(),
    }
}

/// Class followed by all of its superclasses (`None` if the chain could not be resolved)
fn superclass_chain(
    class: &str,
    class_info: &impl Fn(&str) -> Option<ClassInfo>,
) -> Option<Vec<String>> {
    let object = BinaryName::OBJECT;
    let mut chain = vec![];
    let mut seen = HashSet::new();
    let mut current = Some(class.to_owned());
    while let Some(name) = current {
        if name == object.as_str() {
            chain.push(name);
            break;
        }
        if !seen.insert(name.clone()) {
            log::warn!("Cyclic superclass chain through {}", name);
            return None;
        }
        current = class_info(&name)?.super_name;
        chain.push(name);
    }
    Some(chain)
}

/// Hierarchy that knows the common classes of the Java class library
///
/// Common JDK classes (exceptions and collections above all) merge to their real common
/// superclass. Any other pair of different classes merges to `java/lang/Object`, which is enough
/// for code where branches never join values of different application classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaLibraryHierarchy;

impl TypeHierarchy for JavaLibraryHierarchy {
    fn common_superclass(&self, class1: &str, class2: &str) -> String {
        common_superclass_with(class1, class2, ClassInfo::java_library)
    }
}

/// Hierarchy which reads superclass chains out of class files supplied by a [`ClassSource`]
///
/// Class headers are cached, so every class is read at most once. Classes of the Java class
/// library known to [`JavaLibraryHierarchy`] don't need to be in the source.
pub struct ClassSourceHierarchy<S> {
    source: S,
    cache: RefCell<HashMap<String, Option<ClassInfo>>>,
}

impl<S: ClassSource> ClassSourceHierarchy<S> {
    pub fn new(source: S) -> ClassSourceHierarchy<S> {
        ClassSourceHierarchy {
            source,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn class_info(&self, class: &str) -> Option<ClassInfo> {
        if let Some(info) = ClassInfo::java_library(class) {
            return Some(info);
        }
        if let Some(info) = self.cache.borrow().get(class) {
            return info.clone();
        }

        let path = resource_path(&internal_to_class_name(class));
        let info = match self.source.class_bytes(&path) {
            None => {
                log::warn!("Class {} not found while merging types", class);
                None
            }
            Some(bytes) => match read_class_header(&bytes) {
                Ok(header) => Some(ClassInfo {
                    super_name: header.super_name,
                    is_interface: header.access_flags.contains(ClassAccessFlags::INTERFACE),
                }),
                Err(err) => {
                    log::warn!("Could not read class {} while merging types: {}", class, err);
                    None
                }
            },
        };
        self.cache
            .borrow_mut()
            .insert(class.to_owned(), info.clone());
        info
    }
}

impl<S: ClassSource> TypeHierarchy for ClassSourceHierarchy<S> {
    fn common_superclass(&self, class1: &str, class2: &str) -> String {
        common_superclass_with(class1, class2, |class| self.class_info(class))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::Version;
    use crate::jvm::model::ClassBuilder;
    use crate::jvm::writer::{write_class, WriterFlags};

    fn class_bytes(name: &str, super_name: &str, flags: ClassAccessFlags) -> Vec<u8> {
        let class = ClassBuilder::new(Version::JAVA8, flags, name, Some(super_name)).build();
        write_class(&class, WriterFlags::empty()).unwrap()
    }

    #[test]
    fn java_library_hierarchy() {
        let merge = |a: &str, b: &str| JavaLibraryHierarchy.common_superclass(a, b);
        assert_eq!(merge("a/B", "a/B"), "a/B");
        assert_eq!(merge("a/B", "a/C"), "java/lang/Object");
        assert_eq!(
            merge("java/lang/IllegalArgumentException", "java/lang/IllegalStateException"),
            "java/lang/RuntimeException"
        );
        assert_eq!(
            merge("java/io/IOException", "java/lang/ArithmeticException"),
            "java/lang/Exception"
        );
        assert_eq!(
            merge("java/lang/NumberFormatException", "java/lang/IllegalArgumentException"),
            "java/lang/IllegalArgumentException"
        );
        assert_eq!(
            merge("java/util/LinkedList", "java/util/ArrayList"),
            "java/util/AbstractList"
        );
        assert_eq!(merge("java/util/List", "java/util/ArrayList"), "java/lang/Object");
        assert_eq!(merge("java/lang/Error", "p/Custom"), "java/lang/Object");
    }

    #[test]
    fn superclass_chains() {
        let public = ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER;
        let interface =
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
        let mut source: HashMap<String, Vec<u8>> = HashMap::new();
        let mut add = |name: &str, super_name: &str, flags: ClassAccessFlags| {
            let path = format!("{}.class", name);
            source.insert(path, class_bytes(name, super_name, flags));
        };
        add("p/Animal", "java/lang/Object", public);
        add("p/Dog", "p/Animal", public);
        add("p/Puppy", "p/Dog", public);
        add("p/Cat", "p/Animal", public);
        add("p/Pet", "java/lang/Object", interface);
        add("p/Oops", "java/lang/IllegalStateException", public);

        let hierarchy = ClassSourceHierarchy::new(source);
        assert_eq!(hierarchy.common_superclass("p/Puppy", "p/Cat"), "p/Animal");
        assert_eq!(hierarchy.common_superclass("p/Dog", "p/Puppy"), "p/Dog");
        assert_eq!(hierarchy.common_superclass("p/Pet", "p/Dog"), "java/lang/Object");
        assert_eq!(hierarchy.common_superclass("p/Dog", "p/Missing"), "java/lang/Object");

        // Library classes don't have to be in the source
        assert_eq!(
            hierarchy.common_superclass("p/Oops", "java/lang/IllegalArgumentException"),
            "java/lang/RuntimeException"
        );
    }
}
