use crate::jvm::Serialize;
use byteorder::WriteBytesExt;
use std::io::Result;

/// Version of the class file, which is used to verify that the JVM has the
/// necessary features to interpret the class
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Version {
    pub major_version: u16,
    pub minor_version: u16,
}

impl Version {
    /// JVM class file version corresponding to Java SE 5.0 (last version without stack maps)
    pub const JAVA5: Version = Version::new(49);

    /// JVM class file version corresponding to Java SE 6 (first version with stack maps)
    pub const JAVA6: Version = Version::new(50);

    /// JVM class file version corresponding to Java SE 8 (released March 2014)
    pub const JAVA8: Version = Version::new(52);

    /// JVM class file version corresponding to Java SE 11 (released September 2018)
    pub const JAVA11: Version = Version::new(55);

    /// JVM class file version corresponding to Java SE 17 (released September 2021)
    pub const JAVA17: Version = Version::new(61);

    /// JVM class file version corresponding to Java SE 21 (released September 2023)
    pub const JAVA21: Version = Version::new(65);

    /// Newest version that can be read
    pub const LATEST: Version = Version::JAVA21;

    const fn new(major_version: u16) -> Version {
        Version {
            major_version,
            minor_version: 0,
        }
    }

    /// Does the verifier for this version use (and require) the `StackMapTable` attribute?
    pub fn uses_stack_map_frames(&self) -> bool {
        self.major_version >= Version::JAVA6.major_version
    }

    /// Is the version too new to be understood by this library?
    ///
    /// Preview features (minor version `0xFFFF`) are accepted on any known major version.
    pub fn is_supported(&self) -> bool {
        self.major_version <= Version::LATEST.major_version
    }
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}
