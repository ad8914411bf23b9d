use crate::jvm::class_file::ClassConstantIndex;
use crate::jvm::{BaseType, FieldType, RenderDescriptor, Serialize, RefType};
use crate::util::Width;
use byteorder::WriteBytesExt;

/// These types are from [this hierarchy][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType<Cls, U> {
    /// Unusable slot (eg. the second half of a `long`, or a local whose type differs between the
    /// paths reaching an instruction)
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object type
    Object(Cls),

    /// State of an object after `new` has been called but `<init>` has not been called
    ///
    /// `U` identifies the `new` instruction: a label in the tree, an instruction index while
    /// computing frames, and a bytecode offset in the class file.
    Uninitialized(U),
}

impl<Cls, U> VerificationType<Cls, U> {
    /// Is this type is a reference type?
    pub fn is_reference(&self) -> bool {
        match self {
            VerificationType::Top
            | VerificationType::Integer
            | VerificationType::Float
            | VerificationType::Double
            | VerificationType::Long => false,

            VerificationType::Null
            | VerificationType::UninitializedThis
            | VerificationType::Object(_)
            | VerificationType::Uninitialized(_) => true,
        }
    }

    pub fn map<C2, U2>(
        &self,
        mut map_class: impl FnMut(&Cls) -> C2,
        mut map_uninitialized: impl FnMut(&U) -> U2,
    ) -> VerificationType<C2, U2> {
        match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(cls) => VerificationType::Object(map_class(cls)),
            VerificationType::Uninitialized(uninit) => {
                VerificationType::Uninitialized(map_uninitialized(uninit))
            }
        }
    }

    /// Same as `map`, but the mapping functions can fail
    pub fn try_map<C2, U2, E>(
        &self,
        mut map_class: impl FnMut(&Cls) -> Result<C2, E>,
        mut map_uninitialized: impl FnMut(&U) -> Result<U2, E>,
    ) -> Result<VerificationType<C2, U2>, E> {
        Ok(match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(cls) => VerificationType::Object(map_class(cls)?),
            VerificationType::Uninitialized(uninit) => {
                VerificationType::Uninitialized(map_uninitialized(uninit)?)
            }
        })
    }
}

/// Class names in verification types are internal names for classes and descriptors for arrays,
/// just as in `CONSTANT_Class_info`
impl<U> From<&FieldType> for VerificationType<String, U> {
    fn from(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::Base(BaseType::Int)
            | FieldType::Base(BaseType::Char)
            | FieldType::Base(BaseType::Short)
            | FieldType::Base(BaseType::Byte)
            | FieldType::Base(BaseType::Boolean) => VerificationType::Integer,
            FieldType::Base(BaseType::Float) => VerificationType::Float,
            FieldType::Base(BaseType::Long) => VerificationType::Long,
            FieldType::Base(BaseType::Double) => VerificationType::Double,
            FieldType::Ref(RefType::Object(name)) => {
                VerificationType::Object(name.as_ref().to_owned())
            }
            FieldType::Ref(ref_type) => VerificationType::Object(ref_type.render()),
        }
    }
}

impl Serialize for VerificationType<ClassConstantIndex, u16> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationType::Top => 0u8.serialize(writer)?,
            VerificationType::Integer => 1u8.serialize(writer)?,
            VerificationType::Float => 2u8.serialize(writer)?,
            VerificationType::Double => 3u8.serialize(writer)?,
            VerificationType::Long => 4u8.serialize(writer)?,
            VerificationType::Null => 5u8.serialize(writer)?,
            VerificationType::UninitializedThis => 6u8.serialize(writer)?,
            VerificationType::Object(cls) => {
                7u8.serialize(writer)?;
                cls.serialize(writer)?;
            }
            VerificationType::Uninitialized(off) => {
                8u8.serialize(writer)?;
                off.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl<Cls, A> Width for VerificationType<Cls, A> {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::ParseDescriptor;

    type VType = VerificationType<String, usize>;

    #[test]
    fn from_field_types() {
        let typ = |desc: &str| VType::from(&FieldType::parse(desc).unwrap());
        assert_eq!(typ("Z"), VType::Integer);
        assert_eq!(typ("J"), VType::Long);
        assert_eq!(typ("Ljava/lang/String;"), VType::Object(String::from("java/lang/String")));
        assert_eq!(typ("[[I"), VType::Object(String::from("[[I")));
        assert_eq!(typ("D").width(), 2);
        assert!(typ("[I").is_reference());
        assert!(!VType::Top.is_reference());
    }
}
