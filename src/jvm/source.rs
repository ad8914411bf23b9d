//! Byte sources for class files
//!
//! Reading a class by name goes through a [`ClassSource`], which maps resource paths
//! (`a/b/C.class`) to class file bytes. How those bytes are found is entirely up to the source.

use super::model::ClassNode;
use super::reader::{read_class, ReaderFlags};
use super::Error;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

/// Supplier of raw class file bytes
pub trait ClassSource {
    /// Bytes of the class file at a resource path (eg. `java/lang/String.class`)
    fn class_bytes(&self, resource_path: &str) -> Option<Vec<u8>>;
}

impl ClassSource for HashMap<String, Vec<u8>> {
    fn class_bytes(&self, resource_path: &str) -> Option<Vec<u8>> {
        self.get(resource_path).cloned()
    }
}

impl<S: ClassSource + ?Sized> ClassSource for &S {
    fn class_bytes(&self, resource_path: &str) -> Option<Vec<u8>> {
        (**self).class_bytes(resource_path)
    }
}

impl<S: ClassSource> ClassSource for Vec<S> {
    fn class_bytes(&self, resource_path: &str) -> Option<Vec<u8>> {
        self.iter()
            .find_map(|source| source.class_bytes(resource_path))
    }
}

/// Class files laid out under a root directory (as in an unpacked jar or a compiler's output)
#[derive(Debug, Clone)]
pub struct DirectoryClassSource {
    root: PathBuf,
}

impl DirectoryClassSource {
    pub fn new(root: impl Into<PathBuf>) -> DirectoryClassSource {
        DirectoryClassSource { root: root.into() }
    }
}

impl ClassSource for DirectoryClassSource {
    fn class_bytes(&self, resource_path: &str) -> Option<Vec<u8>> {
        let path = self.root.join(resource_path);
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                log::log!(
                    read_failure_level(&err),
                    "No class at {}: {}",
                    path.display(),
                    err
                );
                None
            }
        }
    }
}

/// Missing files are expected when searching several sources, other failures are not
fn read_failure_level(err: &io::Error) -> log::Level {
    if err.kind() == io::ErrorKind::NotFound {
        log::Level::Trace
    } else {
        log::Level::Warn
    }
}

/// Resource path of a class, given its binary name (`a.b.C` becomes `a/b/C.class`)
pub fn resource_path(binary_name: &str) -> String {
    format!("{}.class", binary_name.replace('.', "/"))
}

/// Read a class by binary name (`a.b.C`) from a byte source
pub fn read_class_from_source(
    source: &impl ClassSource,
    binary_name: &str,
    flags: ReaderFlags,
) -> Result<ClassNode, Error> {
    let path = resource_path(binary_name);
    let bytes = source
        .class_bytes(&path)
        .ok_or(Error::ClassNotFound(path))?;
    read_class(&bytes, flags)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resource_paths() {
        assert_eq!(resource_path("java.lang.String"), "java/lang/String.class");
        assert_eq!(resource_path("Top"), "Top.class");
        assert_eq!(resource_path("a.b.C$D"), "a/b/C$D.class");
    }

    #[test]
    fn directory_sources() {
        let root = std::env::temp_dir().join(format!("bytekit-source-{}", std::process::id()));
        std::fs::create_dir_all(root.join("p/Dir.class")).unwrap();
        std::fs::write(root.join("p/Present.class"), [0xCA, 0xFE]).unwrap();

        let source = DirectoryClassSource::new(&root);
        assert_eq!(source.class_bytes("p/Present.class"), Some(vec![0xCA, 0xFE]));
        assert_eq!(source.class_bytes("p/Absent.class"), None);
        // A directory can't be read as a file
        assert_eq!(source.class_bytes("p/Dir.class"), None);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn only_missing_files_are_quiet() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "missing");
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(read_failure_level(&missing), log::Level::Trace);
        assert_eq!(read_failure_level(&denied), log::Level::Warn);
    }

    #[test]
    fn missing_class() {
        let source: HashMap<String, Vec<u8>> = HashMap::new();
        match read_class_from_source(&source, "p.Missing", ReaderFlags::empty()) {
            Err(Error::ClassNotFound(path)) => assert_eq!(path, "p/Missing.class"),
            other => panic!("expected a missing class, got {:?}", other.map(|c| c.name)),
        }
    }
}
