use crate::jvm::model::{ConstantValue, Handle};
use crate::jvm::{Error, Inconsistency, Malformed, Serialize};
use crate::util::{Offset, OffsetResult, OffsetVec, Width};
use byteorder::WriteBytesExt;
use std::collections::HashMap;
use std::result::Result;

/// Constants as in the constant pool
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the
    /// null character `\u{0000}` and the encoding of supplementary characters
    /// is different).
    Utf8(String),

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        handle_kind: HandleKind,

        /// Depending on the method kind, this points to different things:
        ///
        ///   - `FieldRef` for `GetField`, `GetStatic`, `PutField`, `PutStatic`
        ///   - `MethodRef` for the rest
        member: ConstantIndex,
    },

    /// Method type
    MethodType { descriptor: Utf8ConstantIndex },

    /// Dynamically-computed constant
    Dynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        method_descriptor: NameAndTypeConstantIndex,
    },

    /// Module (only in `module-info` classes)
    Module(Utf8ConstantIndex),

    /// Package exported or opened by a module
    Package(Utf8ConstantIndex),
}

impl Constant {
    /// Name of the constant kind, as used in the JVM specification
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constant::Class(_) => "Class",
            Constant::FieldRef(_, _) => "Fieldref",
            Constant::MethodRef {
                is_interface: false,
                ..
            } => "Methodref",
            Constant::MethodRef { .. } => "InterfaceMethodref",
            Constant::String(_) => "String",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Long(_) => "Long",
            Constant::Double(_) => "Double",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::Utf8(_) => "Utf8",
            Constant::MethodHandle { .. } => "MethodHandle",
            Constant::MethodType { .. } => "MethodType",
            Constant::Dynamic { .. } => "Dynamic",
            Constant::InvokeDynamic { .. } => "InvokeDynamic",
            Constant::Module(_) => "Module",
            Constant::Package(_) => "Package",
        }
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                1u8.serialize(writer)?;
                let buffer: Vec<u8> = encode_modified_utf8(string);
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                4u8.serialize(writer)?;
                float.serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                6u8.serialize(writer)?;
                double.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(bytes) => {
                8u8.serialize(writer)?;
                bytes.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if !is_interface { 10u8 } else { 11u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                15u8.serialize(writer)?;
                handle_kind.serialize(writer)?;
                member.serialize(writer)?;
            }
            Constant::MethodType { descriptor } => {
                16u8.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                17u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                18u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                method_descriptor.serialize(writer)?;
            }
            Constant::Module(name) => {
                19u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::Package(name) => {
                20u8.serialize(writer)?;
                name.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// Almost all constants have width 1, except for `Constant::Long` and `Constant::Double`. From
/// the JVMS:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
/// >
/// > In retrospect, making 8-byte constants take two constant pool entries was a poor choice.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Constant pool serializes as its count (one past the last index) followed by the entries
impl Serialize for OffsetVec<Constant> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        (self.offset_len().0 as u16).serialize(writer)?;
        for (_, _, constant) in self {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for c in string.chars() {
        // Handle the exception for how `\u{0000}` is represented
        let len: usize = if c == '\u{0000}' { 2 } else { c.len_utf8() };
        let code: u32 = c as u32;

        match len {
            1 => buffer.push(code as u8),
            2 => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            3 => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }

            // Supplementary characters: main divergence from unicode
            _ => {
                buffer.push(0b1110_1101);
                buffer.push(((code >> 16 & 0x0F) as u8).wrapping_sub(1) & 0x0F | 0b1010_0000);
                buffer.push((code >> 10 & 0x3F) as u8 | 0b1000_0000);

                buffer.push(0b1110_1101);
                buffer.push(((code >> 6 & 0x0F) as u8) | 0b1011_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// Inverse of [`encode_modified_utf8`]
///
/// Returns `None` if the bytes are not valid modified UTF-8 or encode an unpaired surrogate.
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    while let Some(b0) = iter.next() {
        let unit: u16 = if b0 & 0x80 == 0 {
            b0 as u16
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = continuation(iter.next())?;
            ((b0 as u16 & 0x1F) << 6) | b1
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = continuation(iter.next())?;
            let b2 = continuation(iter.next())?;
            ((b0 as u16 & 0x0F) << 12) | (b1 << 6) | b2
        } else {
            return None;
        };
        units.push(unit);
    }
    String::from_utf16(&units).ok()
}

fn continuation(byte: Option<u8>) -> Option<u16> {
    match byte {
        Some(b) if b & 0xC0 == 0x80 => Some(b as u16 & 0x3F),
        _ => None,
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ConstantIndex(pub u16);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct NameAndTypeConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

impl From<Utf8ConstantIndex> for ConstantIndex {
    fn from(index: Utf8ConstantIndex) -> ConstantIndex {
        index.0
    }
}
impl From<NameAndTypeConstantIndex> for ConstantIndex {
    fn from(index: NameAndTypeConstantIndex) -> ConstantIndex {
        index.0
    }
}
impl From<ClassConstantIndex> for ConstantIndex {
    fn from(index: ClassConstantIndex) -> ConstantIndex {
        index.0
    }
}

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}
impl Serialize for Utf8ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}
impl Serialize for NameAndTypeConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}
impl Serialize for ClassConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

/// Type of method handle
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-5.html#jvms-5.4.3.5-220
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl HandleKind {
    pub const fn reference_kind(&self) -> u8 {
        match self {
            HandleKind::GetField => 1,
            HandleKind::GetStatic => 2,
            HandleKind::PutField => 3,
            HandleKind::PutStatic => 4,
            HandleKind::InvokeVirtual => 5,
            HandleKind::InvokeStatic => 6,
            HandleKind::InvokeSpecial => 7,
            HandleKind::NewInvokeSpecial => 8,
            HandleKind::InvokeInterface => 9,
        }
    }

    pub const fn from_reference_kind(kind: u8) -> Option<HandleKind> {
        Some(match kind {
            1 => HandleKind::GetField,
            2 => HandleKind::GetStatic,
            3 => HandleKind::PutField,
            4 => HandleKind::PutStatic,
            5 => HandleKind::InvokeVirtual,
            6 => HandleKind::InvokeStatic,
            7 => HandleKind::InvokeSpecial,
            8 => HandleKind::NewInvokeSpecial,
            9 => HandleKind::InvokeInterface,
            _ => return None,
        })
    }

    /// Does the handle refer to a field (as opposed to a method)?
    pub const fn is_field(&self) -> bool {
        matches!(
            self,
            HandleKind::GetField
                | HandleKind::GetStatic
                | HandleKind::PutField
                | HandleKind::PutStatic
        )
    }
}

impl Serialize for HandleKind {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.reference_kind().serialize(writer)
    }
}

/// Entry in the `BootstrapMethods` attribute
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.23
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BootstrapMethod {
    pub bootstrap_method: ConstantIndex,
    pub bootstrap_arguments: Vec<ConstantIndex>,
}

impl Serialize for BootstrapMethod {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.bootstrap_method.serialize(writer)?;
        self.bootstrap_arguments.serialize(writer)?;
        Ok(())
    }
}

/// Member reference resolved from the constant pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
    pub is_interface: bool,
}

/// Constant pool of a class file that has been read, along with its bootstrap methods
///
/// This is kept around on the class tree after reading so that attributes which are carried
/// through as opaque bytes still refer to valid constants when the class is written back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstantTable {
    constants: OffsetVec<Constant>,
    pub bootstrap_methods: Vec<BootstrapMethod>,
}

impl ConstantTable {
    pub fn new(constants: OffsetVec<Constant>) -> ConstantTable {
        ConstantTable {
            constants,
            bootstrap_methods: vec![],
        }
    }

    pub fn constants(&self) -> &OffsetVec<Constant> {
        &self.constants
    }

    fn bad_index(index: u16, expected: &'static str) -> Malformed {
        Malformed::BadConstantIndex { index, expected }
    }

    /// Error for a lookup which didn't find the kind of constant it expected
    fn wrong_kind(&self, index: u16, expected: &'static str) -> Malformed {
        match self.get(index) {
            Ok(found) => Malformed::WrongConstantKind {
                index,
                expected,
                found: found.kind_name(),
            },
            Err(err) => err,
        }
    }

    /// Look up any constant
    pub fn get(&self, index: u16) -> Result<&Constant, Malformed> {
        match self.constants.get_offset(Offset(index as usize)) {
            OffsetResult::Ok(_, constant) => Ok(constant),
            OffsetResult::InvalidOffset(_) | OffsetResult::TooLarge => {
                Err(Self::bad_index(index, "constant"))
            }
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&str, Malformed> {
        match self.get(index) {
            Ok(Constant::Utf8(string)) => Ok(string),
            _ => Err(self.wrong_kind(index, "Utf8")),
        }
    }

    /// Name stored in a `CONSTANT_Class_info`
    pub fn class_name(&self, index: u16) -> Result<&str, Malformed> {
        match self.get(index) {
            Ok(Constant::Class(name)) => self.utf8(name.0 .0),
            _ => Err(self.wrong_kind(index, "Class")),
        }
    }

    /// Same as [`ConstantTable::class_name`], but index 0 means "no class"
    pub fn optional_class_name(&self, index: u16) -> Result<Option<&str>, Malformed> {
        if index == 0 {
            Ok(None)
        } else {
            self.class_name(index).map(Some)
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), Malformed> {
        match self.get(index) {
            Ok(Constant::NameAndType { name, descriptor }) => {
                Ok((self.utf8(name.0 .0)?, self.utf8(descriptor.0 .0)?))
            }
            _ => Err(self.wrong_kind(index, "NameAndType")),
        }
    }

    /// Field or method reference
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>, Malformed> {
        let (class, name_and_type, is_interface) = match self.get(index) {
            Ok(Constant::FieldRef(class, name_and_type)) => (class, name_and_type, false),
            Ok(Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            }) => (class, name_and_type, *is_interface),
            _ => return Err(self.wrong_kind(index, "Fieldref or Methodref")),
        };
        let (name, descriptor) = self.name_and_type(name_and_type.0 .0)?;
        Ok(MemberRef {
            owner: self.class_name(class.0 .0)?,
            name,
            descriptor,
            is_interface,
        })
    }

    pub fn method_handle(&self, index: u16) -> Result<Handle, Malformed> {
        match self.get(index) {
            Ok(Constant::MethodHandle {
                handle_kind,
                member,
            }) => {
                let member = self.member_ref(member.0)?;
                Ok(Handle {
                    kind: *handle_kind,
                    owner: member.owner.to_owned(),
                    name: member.name.to_owned(),
                    descriptor: member.descriptor.to_owned(),
                    is_interface: member.is_interface,
                })
            }
            _ => Err(self.wrong_kind(index, "MethodHandle")),
        }
    }

    /// Constant which can be pushed with `ldc` or used as a bootstrap argument
    pub fn loadable(&self, index: u16) -> Result<ConstantValue, Error> {
        Ok(match self.get(index)? {
            Constant::Integer(integer) => ConstantValue::Integer(*integer),
            Constant::Float(float) => ConstantValue::Float(*float),
            Constant::Long(long) => ConstantValue::Long(*long),
            Constant::Double(double) => ConstantValue::Double(*double),
            Constant::String(utf8) => ConstantValue::String(self.utf8(utf8.0 .0)?.to_owned()),
            Constant::Class(name) => ConstantValue::Class(self.utf8(name.0 .0)?.to_owned()),
            Constant::MethodType { descriptor } => {
                ConstantValue::MethodType(self.utf8(descriptor.0 .0)?.to_owned())
            }
            Constant::MethodHandle { .. } => {
                ConstantValue::MethodHandle(self.method_handle(index)?)
            }
            Constant::Dynamic { .. } => {
                return Err(Error::UnsupportedFeature(format!(
                    "dynamically-computed constant #{}",
                    index
                )))
            }
            _ => return Err(self.wrong_kind(index, "loadable constant").into()),
        })
    }

    /// Bootstrap method handle and arguments of a bootstrap table entry
    pub fn bootstrap_method(&self, index: u16) -> Result<(Handle, Vec<ConstantValue>), Error> {
        let entry = self
            .bootstrap_methods
            .get(index as usize)
            .ok_or_else(|| Malformed::BadAttribute {
                name: String::from("BootstrapMethods"),
                message: format!("missing entry {}", index),
            })?;
        let handle = self.method_handle(entry.bootstrap_method.0)?;
        let arguments = entry
            .bootstrap_arguments
            .iter()
            .map(|argument| self.loadable(argument.0))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok((handle, arguments))
    }
}

#[derive(Debug)]
pub struct ConstantPoolOverflow {
    pub constant: Constant,
    pub offset: u16,
}

impl From<ConstantPoolOverflow> for Error {
    fn from(overflow: ConstantPoolOverflow) -> Error {
        log::debug!(
            "Constant pool overflowed at offset {} with {:?}",
            overflow.offset,
            overflow.constant
        );
        Error::InconsistentClassFile(Inconsistency::ConstantPoolOverflow)
    }
}

/// Class file constants pool builder
///
/// The pool is append only: constants are deduplicated as they are inserted, and only after the
/// pool is fully built up can it be consumed into a regular [`OffsetVec`]. Entries are keyed by
/// the strings of the class tree (rather than by resolved classes or members) since the tree
/// refers to everything by name.
#[derive(Default)]
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,
    bootstrap_methods: Vec<BootstrapMethod>,

    utf8s: HashMap<String, Utf8ConstantIndex>,
    classes: HashMap<Utf8ConstantIndex, ClassConstantIndex>,
    strings: HashMap<Utf8ConstantIndex, ConstantIndex>,
    integers: HashMap<i32, ConstantIndex>,
    floats: HashMap<u32, ConstantIndex>,
    longs: HashMap<i64, ConstantIndex>,
    doubles: HashMap<u64, ConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    fieldrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex), ConstantIndex>,
    methodrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex, bool), ConstantIndex>,
    method_handles: HashMap<(HandleKind, ConstantIndex), ConstantIndex>,
    method_types: HashMap<Utf8ConstantIndex, ConstantIndex>,
    invoke_dynamics: HashMap<(u16, NameAndTypeConstantIndex), ConstantIndex>,
    bootstrap_indices: HashMap<BootstrapMethod, u16>,
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            ..ConstantsPool::default()
        }
    }

    /// Make a constants pool which starts off with the same constants (at the same indices) and
    /// bootstrap methods as a pool that was read in
    pub fn seeded(table: &ConstantTable) -> ConstantsPool {
        let mut pool = ConstantsPool::new();
        for (offset, _, constant) in table.constants() {
            let index = ConstantIndex(offset.0 as u16);
            match constant {
                Constant::Utf8(string) => {
                    pool.utf8s
                        .entry(string.clone())
                        .or_insert(Utf8ConstantIndex(index));
                }
                Constant::Class(name) => {
                    pool.classes
                        .entry(*name)
                        .or_insert(ClassConstantIndex(index));
                }
                Constant::String(utf8) => {
                    pool.strings.entry(*utf8).or_insert(index);
                }
                Constant::Integer(integer) => {
                    pool.integers.entry(*integer).or_insert(index);
                }
                Constant::Float(float) => {
                    pool.floats.entry(float.to_bits()).or_insert(index);
                }
                Constant::Long(long) => {
                    pool.longs.entry(*long).or_insert(index);
                }
                Constant::Double(double) => {
                    pool.doubles.entry(double.to_bits()).or_insert(index);
                }
                Constant::NameAndType { name, descriptor } => {
                    pool.name_and_types
                        .entry((*name, *descriptor))
                        .or_insert(NameAndTypeConstantIndex(index));
                }
                Constant::FieldRef(class, name_and_type) => {
                    pool.fieldrefs
                        .entry((*class, *name_and_type))
                        .or_insert(index);
                }
                Constant::MethodRef {
                    class,
                    name_and_type,
                    is_interface,
                } => {
                    pool.methodrefs
                        .entry((*class, *name_and_type, *is_interface))
                        .or_insert(index);
                }
                Constant::MethodHandle {
                    handle_kind,
                    member,
                } => {
                    pool.method_handles
                        .entry((*handle_kind, *member))
                        .or_insert(index);
                }
                Constant::MethodType { descriptor } => {
                    pool.method_types.entry(*descriptor).or_insert(index);
                }
                Constant::InvokeDynamic {
                    bootstrap_method,
                    method_descriptor,
                } => {
                    pool.invoke_dynamics
                        .entry((*bootstrap_method, *method_descriptor))
                        .or_insert(index);
                }
                Constant::Dynamic { .. } | Constant::Module(_) | Constant::Package(_) => (),
            }
            pool.constants.push(constant.clone());
        }
        for (idx, bootstrap) in table.bootstrap_methods.iter().enumerate() {
            pool.bootstrap_indices
                .entry(bootstrap.clone())
                .or_insert(idx as u16);
            pool.bootstrap_methods.push(bootstrap.clone());
        }
        pool
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65535, indexing starts at 1, and some constants take two
    /// spaces.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, ConstantPoolOverflow> {
        // Compute the offset at which this constant will be inserted
        let offset = self.constants.offset_len().0;

        // Detect if the next constant would overflow the pool
        if offset + constant.width() > u16::MAX as usize {
            return Err(ConstantPoolOverflow {
                constant,
                offset: offset as u16,
            });
        }

        self.constants.push(constant);
        Ok(ConstantIndex(offset as u16))
    }

    /// Bootstrap methods registered so far
    pub fn bootstrap_methods(&self) -> &[BootstrapMethod] {
        &self.bootstrap_methods
    }

    /// Consume the pool and return the final vector of constants and bootstrap methods
    pub fn into_parts(self) -> (OffsetVec<Constant>, Vec<BootstrapMethod>) {
        (self.constants, self.bootstrap_methods)
    }

    /// Get or insert a utf8 constant
    pub fn get_utf8(&mut self, utf8: &str) -> Result<Utf8ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.utf8s.get(utf8) {
            Ok(*idx)
        } else {
            let constant = Constant::Utf8(utf8.to_owned());
            let idx = Utf8ConstantIndex(self.push_constant(constant)?);
            self.utf8s.insert(utf8.to_owned(), idx);
            Ok(idx)
        }
    }

    /// Get or insert a class constant
    ///
    /// The name is an internal name for classes and a descriptor for arrays.
    pub fn get_class(&mut self, name: &str) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        let utf8 = self.get_utf8(name)?;
        if let Some(idx) = self.classes.get(&utf8) {
            Ok(*idx)
        } else {
            let idx = ClassConstantIndex(self.push_constant(Constant::Class(utf8))?);
            self.classes.insert(utf8, idx);
            Ok(idx)
        }
    }

    /// Get or insert a string constant
    pub fn get_string(&mut self, string: &str) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let utf8 = self.get_utf8(string)?;
        if let Some(idx) = self.strings.get(&utf8) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::String(utf8))?;
            self.strings.insert(utf8, idx);
            Ok(idx)
        }
    }

    pub fn get_integer(&mut self, integer: i32) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.integers.get(&integer) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Integer(integer))?;
            self.integers.insert(integer, idx);
            Ok(idx)
        }
    }

    /// Floats are keyed by their bits, so `NaN`s with different payloads and `-0.0` stay distinct
    pub fn get_float(&mut self, float: f32) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.floats.get(&float.to_bits()) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Float(float))?;
            self.floats.insert(float.to_bits(), idx);
            Ok(idx)
        }
    }

    pub fn get_long(&mut self, long: i64) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.longs.get(&long) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Long(long))?;
            self.longs.insert(long, idx);
            Ok(idx)
        }
    }

    pub fn get_double(&mut self, double: f64) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.doubles.get(&double.to_bits()) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Double(double))?;
            self.doubles.insert(double.to_bits(), idx);
            Ok(idx)
        }
    }

    /// Get or insert a name & type constant
    pub fn get_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<NameAndTypeConstantIndex, ConstantPoolOverflow> {
        let name = self.get_utf8(name)?;
        let descriptor = self.get_utf8(descriptor)?;
        let name_and_type_key = (name, descriptor);
        if let Some(idx) = self.name_and_types.get(&name_and_type_key) {
            Ok(*idx)
        } else {
            let constant = Constant::NameAndType { name, descriptor };
            let idx = NameAndTypeConstantIndex(self.push_constant(constant)?);
            self.name_and_types.insert(name_and_type_key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a `CONSTANT_Fieldref_info`
    pub fn get_field_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let class = self.get_class(owner)?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        if let Some(idx) = self.fieldrefs.get(&(class, name_and_type)) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::FieldRef(class, name_and_type))?;
            self.fieldrefs.insert((class, name_and_type), idx);
            Ok(idx)
        }
    }

    /// Get or insert a `CONSTANT_Methodref_info` or `CONSTANT_InterfaceMethodref_info`
    pub fn get_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let class = self.get_class(owner)?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        let key = (class, name_and_type, is_interface);
        if let Some(idx) = self.methodrefs.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            };
            let idx = self.push_constant(constant)?;
            self.methodrefs.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a method handle constant
    pub fn get_method_handle(
        &mut self,
        handle: &Handle,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let member = if handle.kind.is_field() {
            self.get_field_ref(&handle.owner, &handle.name, &handle.descriptor)?
        } else {
            self.get_method_ref(
                &handle.owner,
                &handle.name,
                &handle.descriptor,
                handle.is_interface,
            )?
        };
        let handle_key = (handle.kind, member);
        if let Some(idx) = self.method_handles.get(&handle_key) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodHandle {
                handle_kind: handle.kind,
                member,
            };
            let idx = self.push_constant(constant)?;
            self.method_handles.insert(handle_key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a method type constant
    pub fn get_method_type(
        &mut self,
        descriptor: &str,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let descriptor = self.get_utf8(descriptor)?;
        if let Some(idx) = self.method_types.get(&descriptor) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::MethodType { descriptor })?;
            self.method_types.insert(descriptor, idx);
            Ok(idx)
        }
    }

    /// Get or insert a loadable constant (as for `ldc` or a bootstrap argument)
    pub fn get_constant_value(
        &mut self,
        value: &ConstantValue,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        match value {
            ConstantValue::Integer(integer) => self.get_integer(*integer),
            ConstantValue::Float(float) => self.get_float(*float),
            ConstantValue::Long(long) => self.get_long(*long),
            ConstantValue::Double(double) => self.get_double(*double),
            ConstantValue::String(string) => self.get_string(string),
            ConstantValue::Class(name) => self.get_class(name).map(ConstantIndex::from),
            ConstantValue::MethodType(descriptor) => self.get_method_type(descriptor),
            ConstantValue::MethodHandle(handle) => self.get_method_handle(handle),
        }
    }

    /// Get or insert an entry in the bootstrap methods table
    pub fn get_bootstrap_method(
        &mut self,
        handle: &Handle,
        arguments: &[ConstantValue],
    ) -> Result<u16, ConstantPoolOverflow> {
        let bootstrap_method = self.get_method_handle(handle)?;
        let bootstrap_arguments = arguments
            .iter()
            .map(|argument| self.get_constant_value(argument))
            .collect::<Result<Vec<_>, _>>()?;
        let entry = BootstrapMethod {
            bootstrap_method,
            bootstrap_arguments,
        };
        if let Some(idx) = self.bootstrap_indices.get(&entry) {
            Ok(*idx)
        } else {
            let idx = self.bootstrap_methods.len() as u16;
            self.bootstrap_indices.insert(entry.clone(), idx);
            self.bootstrap_methods.push(entry);
            Ok(idx)
        }
    }

    /// Get or insert an invoke dynamic constant
    pub fn get_invoke_dynamic(
        &mut self,
        name: &str,
        descriptor: &str,
        bootstrap_handle: &Handle,
        bootstrap_arguments: &[ConstantValue],
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let bootstrap_method = self.get_bootstrap_method(bootstrap_handle, bootstrap_arguments)?;
        let method_descriptor = self.get_name_and_type(name, descriptor)?;
        let indy_key = (bootstrap_method, method_descriptor);
        if let Some(idx) = self.invoke_dynamics.get(&indy_key) {
            Ok(*idx)
        } else {
            let constant = Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            };
            let idx = self.push_constant(constant)?;
            self.invoke_dynamics.insert(indy_key, idx);
            Ok(idx)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookups_of_the_wrong_kind() {
        let mut constants = OffsetVec::new_starting_at(Offset(1));
        constants.push(Constant::Integer(7));
        constants.push(Constant::Long(8));
        constants.push(Constant::Utf8(String::from("p/Q")));
        let table = ConstantTable::new(constants);

        assert_eq!(table.utf8(4), Ok("p/Q"));
        assert_eq!(
            table.utf8(1),
            Err(Malformed::WrongConstantKind {
                index: 1,
                expected: "Utf8",
                found: "Integer"
            })
        );
        assert_eq!(
            table.class_name(2),
            Err(Malformed::WrongConstantKind {
                index: 2,
                expected: "Class",
                found: "Long"
            })
        );
        // The slot after a long is unusable
        assert_eq!(
            table.utf8(3),
            Err(Malformed::BadConstantIndex {
                index: 3,
                expected: "constant"
            })
        );
        assert!(matches!(
            table.utf8(9),
            Err(Malformed::BadConstantIndex { index: 9, .. })
        ));
    }

    #[test]
    fn containing_null_byte() {
        assert_eq!(encode_modified_utf8("a\x00a"), vec![97, 192, 128, 97]);
        assert_eq!(
            decode_modified_utf8(&[97, 192, 128, 97]).as_deref(),
            Some("a\x00a")
        );
    }

    #[test]
    fn simple_ascii() {
        assert_eq!(encode_modified_utf8("foo"), vec![102, 111, 111]);
        assert_eq!(
            encode_modified_utf8("hel10_World"),
            vec![104, 101, 108, 49, 48, 95, 87, 111, 114, 108, 100]
        );
    }

    #[test]
    fn two_and_three_byte_encodings() {
        assert_eq!(
            encode_modified_utf8("ĄǍǞǠǺȀȂȦȺӐӒ"),
            vec![
                196, 132, 199, 141, 199, 158, 199, 160, 199, 186, 200, 128, 200, 130, 200, 166,
                200, 186, 211, 144, 211, 146
            ]
        );
        let text = "ऄअॲঅਅઅଅஅఅಅഅะະ༁ཨ";
        assert_eq!(
            decode_modified_utf8(&encode_modified_utf8(text)).as_deref(),
            Some(text)
        );
    }

    #[test]
    fn supplementary_characters() {
        let encoded = vec![
            237, 160, 128, 237, 176, 128, 237, 172, 191, 237, 191, 191, 237, 175, 191, 237, 191,
            191,
        ];
        assert_eq!(encode_modified_utf8("\u{10000}\u{dffff}\u{10FFFF}"), encoded);
        assert_eq!(
            decode_modified_utf8(&encoded).as_deref(),
            Some("\u{10000}\u{dffff}\u{10FFFF}")
        );
    }

    #[test]
    fn invalid_modified_utf8() {
        assert_eq!(decode_modified_utf8(&[0xC0]), None);
        assert_eq!(decode_modified_utf8(&[0xFF, 0x80]), None);
        // lone high surrogate
        assert_eq!(decode_modified_utf8(&[237, 160, 128]), None);
    }

    #[test]
    fn pool_deduplicates() {
        let mut pool = ConstantsPool::new();
        let first = pool.get_method_ref("p/Q", "m", "()V", false).unwrap();
        let second = pool.get_method_ref("p/Q", "m", "()V", false).unwrap();
        let interface = pool.get_method_ref("p/Q", "m", "()V", true).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, interface);

        let long = pool.get_long(7).unwrap();
        let after_long = pool.get_integer(7).unwrap();
        assert_eq!(after_long.0, long.0 + 2);
    }

    #[test]
    fn seeded_pool_keeps_indices() {
        let mut pool = ConstantsPool::new();
        let class = pool.get_class("p/Q").unwrap();
        let string = pool.get_string("hello").unwrap();
        let (constants, bootstrap_methods) = pool.into_parts();
        let mut table = ConstantTable::new(constants);
        table.bootstrap_methods = bootstrap_methods;
        assert_eq!(table.class_name(class.0 .0), Ok("p/Q"));

        let mut seeded = ConstantsPool::seeded(&table);
        assert_eq!(seeded.get_class("p/Q").unwrap(), class);
        assert_eq!(seeded.get_string("hello").unwrap(), string);
        let fresh = seeded.get_utf8("fresh").unwrap();
        assert_eq!(fresh.0 .0 as usize, table.constants().offset_len().0);
    }

    #[test]
    fn table_lookup_errors() {
        let mut pool = ConstantsPool::new();
        let utf8 = pool.get_utf8("x").unwrap();
        let long = pool.get_long(1).unwrap();
        let (constants, _) = pool.into_parts();
        let table = ConstantTable::new(constants);
        assert_eq!(table.utf8(utf8.0 .0), Ok("x"));
        assert!(table.class_name(utf8.0 .0).is_err());
        assert!(table.get(0).is_err());
        assert!(table.get(long.0 + 1).is_err());
        assert!(table.get(100).is_err());
    }
}
