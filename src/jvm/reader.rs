//! Parsing class files into class trees
//!
//! Reading happens in two steps: first the class file is split into its constant pool and raw
//! members/attributes (all still borrowing the input), then everything is converted into the
//! owned tree. Bytecode is decoded into canonical instructions (`iload_1` becomes `iload 1`,
//! `goto_w` becomes `goto`, ...) and every bytecode offset that something refers to becomes a
//! label placed in the instruction stream.

use super::binary_format::ByteCursor;
use super::class_file::*;
use super::model::*;
use super::opcodes::*;
use super::verifier::VerificationType;
use super::{
    BinaryName, ClassAccessFlags, Error, FieldAccessFlags, InnerClassAccessFlags, Malformed,
    MethodAccessFlags, MethodDescriptor, Name, ParseDescriptor,
};
use crate::util::{Offset, OffsetVec};
use bitflags::bitflags;
use std::collections::BTreeMap;

bitflags! {
    /// Parts of the class file to leave out of the tree
    pub struct ReaderFlags: u8 {
        /// Drop line numbers, local variable tables, source file names, and method parameters
        const SKIP_DEBUG = 0x01;

        /// Drop stack map frames (they'll need to be recomputed when writing)
        const SKIP_FRAMES = 0x02;
    }
}

/// Start of a class file: everything up to (and excluding) the fields
#[derive(Debug, Clone, PartialEq)]
pub struct ClassHeader {
    pub version: Version,
    pub access_flags: ClassAccessFlags,
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
}

/// Attribute whose body has not been interpreted yet
struct AttributeBody<'b> {
    name: String,
    info: ByteCursor<'b>,
}

impl<'b> AttributeBody<'b> {
    fn raw(mut self) -> Result<RawAttribute, Malformed> {
        let len = self.info.remaining();
        Ok(RawAttribute {
            name: self.name,
            info: self.info.bytes(len)?.to_vec(),
        })
    }

    fn bad(&self, message: impl Into<String>) -> Malformed {
        Malformed::BadAttribute {
            name: self.name.clone(),
            message: message.into(),
        }
    }
}

/// Field or method whose attributes have not been interpreted yet
struct MemberBody<'b> {
    access_flags: u16,
    name: String,
    descriptor: String,
    attributes: Vec<AttributeBody<'b>>,
}

/// Read the header of a class file, without looking at its members
pub fn read_class_header(bytes: &[u8]) -> Result<ClassHeader, Error> {
    let mut cursor = ByteCursor::new(bytes);
    let (version, table) = read_prelude(&mut cursor)?;
    read_header(&mut cursor, version, &table)
}

/// Read a class file into a class tree
pub fn read_class(bytes: &[u8], flags: ReaderFlags) -> Result<ClassNode, Error> {
    let mut cursor = ByteCursor::new(bytes);
    let (version, mut table) = read_prelude(&mut cursor)?;
    let header = read_header(&mut cursor, version, &table)?;
    let fields = read_members(&mut cursor, &table)?;
    let methods = read_members(&mut cursor, &table)?;
    let attributes = read_attributes(&mut cursor, &table)?;
    if !cursor.is_empty() {
        return Err(Malformed::TrailingBytes {
            offset: cursor.absolute_position(),
        }
        .into());
    }

    let mut class = ClassNode::new(version, header.access_flags, header.name);
    class.super_name = header.super_name;
    class.interfaces = header.interfaces;

    // Class attributes come first, since instructions need the bootstrap methods
    for mut attribute in attributes {
        match attribute.name.as_str() {
            "SourceFile" | "SourceDebugExtension" if flags.contains(ReaderFlags::SKIP_DEBUG) => {
                log::debug!("Skipping {} of {}", attribute.name, class.name)
            }
            "SourceFile" => {
                class.source_file = Some(table.utf8(attribute.info.u16()?)?.to_owned());
            }
            "Signature" => {
                class.signature = Some(table.utf8(attribute.info.u16()?)?.to_owned());
            }
            "InnerClasses" => {
                let count = attribute.info.u16()?;
                for _ in 0..count {
                    let inner_class = attribute.info.u16()?;
                    let outer_class = attribute.info.u16()?;
                    let inner_name = attribute.info.u16()?;
                    let access_flags = attribute.info.u16()?;
                    class.inner_classes.push(InnerClass {
                        name: table.class_name(inner_class)?.to_owned(),
                        outer_name: table.optional_class_name(outer_class)?.map(str::to_owned),
                        inner_name: if inner_name == 0 {
                            None
                        } else {
                            Some(table.utf8(inner_name)?.to_owned())
                        },
                        access_flags: InnerClassAccessFlags::from_bits_truncate(access_flags),
                    });
                }
            }
            "BootstrapMethods" => {
                let count = attribute.info.u16()?;
                for _ in 0..count {
                    let bootstrap_method = ConstantIndex(attribute.info.u16()?);
                    let argument_count = attribute.info.u16()?;
                    let mut bootstrap_arguments = vec![];
                    for _ in 0..argument_count {
                        bootstrap_arguments.push(ConstantIndex(attribute.info.u16()?));
                    }
                    table.bootstrap_methods.push(BootstrapMethod {
                        bootstrap_method,
                        bootstrap_arguments,
                    });
                }
            }
            _ => class.attributes.push(attribute.raw()?),
        }
    }

    for field in fields {
        class.fields.push(read_field(field, &table)?);
    }
    for method in methods {
        let method = read_method(method, &class.name, &table, flags)?;
        class.methods.push(method);
    }

    class.constant_pool = Some(table);
    Ok(class)
}

/// Magic, version, and constant pool
fn read_prelude(cursor: &mut ByteCursor) -> Result<(Version, ConstantTable), Error> {
    let magic = cursor.u32()?;
    if magic != ClassFile::MAGIC {
        return Err(Malformed::BadMagic(magic).into());
    }
    let minor_version = cursor.u16()?;
    let major_version = cursor.u16()?;
    let version = Version {
        major_version,
        minor_version,
    };
    if !version.is_supported() {
        return Err(Error::UnsupportedFeature(format!(
            "class file version {}.{}",
            major_version, minor_version
        )));
    }

    let constants = read_constant_pool(cursor)?;
    Ok((version, ConstantTable::new(constants)))
}

fn read_constant_pool(cursor: &mut ByteCursor) -> Result<OffsetVec<Constant>, Malformed> {
    let count = cursor.u16()? as usize;
    let mut constants = OffsetVec::new_starting_at(Offset(1));
    while constants.offset_len().0 < count {
        let index = constants.offset_len().0 as u16;
        let utf8 = |idx: u16| Utf8ConstantIndex(ConstantIndex(idx));
        let class = |idx: u16| ClassConstantIndex(ConstantIndex(idx));
        let name_and_type = |idx: u16| NameAndTypeConstantIndex(ConstantIndex(idx));

        let tag = cursor.u8()?;
        let constant = match tag {
            1 => {
                let len = cursor.u16()? as usize;
                let bytes = cursor.bytes(len)?;
                let string =
                    decode_modified_utf8(bytes).ok_or(Malformed::BadModifiedUtf8 { index })?;
                Constant::Utf8(string)
            }
            3 => Constant::Integer(cursor.i32()?),
            4 => Constant::Float(cursor.f32()?),
            5 => Constant::Long(cursor.i64()?),
            6 => Constant::Double(cursor.f64()?),
            7 => Constant::Class(utf8(cursor.u16()?)),
            8 => Constant::String(utf8(cursor.u16()?)),
            9 => Constant::FieldRef(class(cursor.u16()?), name_and_type(cursor.u16()?)),
            10 | 11 => Constant::MethodRef {
                class: class(cursor.u16()?),
                name_and_type: name_and_type(cursor.u16()?),
                is_interface: tag == 11,
            },
            12 => Constant::NameAndType {
                name: utf8(cursor.u16()?),
                descriptor: utf8(cursor.u16()?),
            },
            15 => {
                let kind = cursor.u8()?;
                let handle_kind =
                    HandleKind::from_reference_kind(kind).ok_or(Malformed::BadConstantIndex {
                        index,
                        expected: "method handle kind",
                    })?;
                Constant::MethodHandle {
                    handle_kind,
                    member: ConstantIndex(cursor.u16()?),
                }
            }
            16 => Constant::MethodType {
                descriptor: utf8(cursor.u16()?),
            },
            17 => Constant::Dynamic {
                bootstrap_method: cursor.u16()?,
                name_and_type: name_and_type(cursor.u16()?),
            },
            18 => Constant::InvokeDynamic {
                bootstrap_method: cursor.u16()?,
                method_descriptor: name_and_type(cursor.u16()?),
            },
            19 => Constant::Module(utf8(cursor.u16()?)),
            20 => Constant::Package(utf8(cursor.u16()?)),
            _ => return Err(Malformed::BadConstantTag { index, tag }),
        };
        constants.push(constant);
    }
    Ok(constants)
}

fn read_header(
    cursor: &mut ByteCursor,
    version: Version,
    table: &ConstantTable,
) -> Result<ClassHeader, Error> {
    let access_flags = ClassAccessFlags::from_bits_truncate(cursor.u16()?);
    let name = table.class_name(cursor.u16()?)?.to_owned();
    let super_name = table.optional_class_name(cursor.u16()?)?.map(str::to_owned);
    let interface_count = cursor.u16()?;
    let mut interfaces = vec![];
    for _ in 0..interface_count {
        interfaces.push(table.class_name(cursor.u16()?)?.to_owned());
    }
    Ok(ClassHeader {
        version,
        access_flags,
        name,
        super_name,
        interfaces,
    })
}

fn read_attributes<'b>(
    cursor: &mut ByteCursor<'b>,
    table: &ConstantTable,
) -> Result<Vec<AttributeBody<'b>>, Malformed> {
    let count = cursor.u16()?;
    let mut attributes = vec![];
    for _ in 0..count {
        let name = table.utf8(cursor.u16()?)?.to_owned();
        let len = cursor.u32()? as usize;
        let info = cursor.sub_cursor(len)?;
        attributes.push(AttributeBody { name, info });
    }
    Ok(attributes)
}

fn read_members<'b>(
    cursor: &mut ByteCursor<'b>,
    table: &ConstantTable,
) -> Result<Vec<MemberBody<'b>>, Malformed> {
    let count = cursor.u16()?;
    let mut members = vec![];
    for _ in 0..count {
        let access_flags = cursor.u16()?;
        let name = table.utf8(cursor.u16()?)?.to_owned();
        let descriptor = table.utf8(cursor.u16()?)?.to_owned();
        let attributes = read_attributes(cursor, table)?;
        members.push(MemberBody {
            access_flags,
            name,
            descriptor,
            attributes,
        });
    }
    Ok(members)
}

fn read_field(member: MemberBody, table: &ConstantTable) -> Result<FieldNode, Error> {
    let mut field = FieldNode::new(
        FieldAccessFlags::from_bits_truncate(member.access_flags),
        member.name,
        member.descriptor,
    );
    for mut attribute in member.attributes {
        match attribute.name.as_str() {
            "ConstantValue" => field.value = Some(table.loadable(attribute.info.u16()?)?),
            "Signature" => field.signature = Some(table.utf8(attribute.info.u16()?)?.to_owned()),
            _ => field.attributes.push(attribute.raw()?),
        }
    }
    Ok(field)
}

fn read_method(
    member: MemberBody,
    owner: &str,
    table: &ConstantTable,
    flags: ReaderFlags,
) -> Result<MethodNode, Error> {
    let mut method = MethodNode::new(
        MethodAccessFlags::from_bits_truncate(member.access_flags),
        member.name,
        member.descriptor,
    );
    for mut attribute in member.attributes {
        match attribute.name.as_str() {
            "Code" => read_code(&mut method, attribute, owner, table, flags)?,
            "Exceptions" => {
                let count = attribute.info.u16()?;
                for _ in 0..count {
                    let exception = table.class_name(attribute.info.u16()?)?;
                    method.exceptions.push(exception.to_owned());
                }
            }
            "Signature" => method.signature = Some(table.utf8(attribute.info.u16()?)?.to_owned()),
            "MethodParameters" if flags.contains(ReaderFlags::SKIP_DEBUG) => {
                log::debug!("Skipping MethodParameters of {}", method.display_name())
            }
            _ => method.attributes.push(attribute.raw()?),
        }
    }
    Ok(method)
}

/// Labels for bytecode offsets, created on demand
struct OffsetLabels {
    labels: BTreeMap<usize, Label>,
}

impl OffsetLabels {
    fn at(&mut self, instructions: &mut InsnList, offset: usize) -> Label {
        *self
            .labels
            .entry(offset)
            .or_insert_with(|| instructions.new_label())
    }

    fn at_relative(
        &mut self,
        instructions: &mut InsnList,
        base: usize,
        relative: i32,
    ) -> Result<Label, Malformed> {
        let offset = base as i64 + relative as i64;
        if offset < 0 {
            return Err(Malformed::BadBytecodeOffset { offset: base });
        }
        Ok(self.at(instructions, offset as usize))
    }
}

/// Everything placed at one bytecode offset, in the order it goes into the instruction stream
#[derive(Default)]
struct AtOffset {
    line_numbers: Vec<u16>,
    frame: Option<FrameNode>,
    instruction: Option<Instruction>,
}

fn read_code(
    method: &mut MethodNode,
    mut attribute: AttributeBody,
    owner: &str,
    table: &ConstantTable,
    flags: ReaderFlags,
) -> Result<(), Error> {
    let code = &mut attribute.info;
    method.max_stack = code.u16()?;
    method.max_locals = code.u16()?;
    let code_length = code.u32()? as usize;
    let mut bytecode = code.sub_cursor(code_length)?;

    let mut instructions = InsnList::new();
    let mut labels = OffsetLabels {
        labels: BTreeMap::new(),
    };
    let mut contents: BTreeMap<usize, AtOffset> = BTreeMap::new();

    while !bytecode.is_empty() {
        let offset = bytecode.position();
        let insn = read_instruction(&mut bytecode, offset, table, &mut instructions, &mut labels)?;
        contents.entry(offset).or_default().instruction = Some(insn);
    }

    let handler_count = code.u16()?;
    for _ in 0..handler_count {
        let start_pc = code.u16()? as usize;
        let end_pc = code.u16()? as usize;
        let handler_pc = code.u16()? as usize;
        let catch_type = table.optional_class_name(code.u16()?)?.map(str::to_owned);
        method.try_catch_blocks.push(TryCatchBlock {
            start: labels.at(&mut instructions, start_pc),
            end: labels.at(&mut instructions, end_pc),
            handler: labels.at(&mut instructions, handler_pc),
            catch_type,
        });
    }

    let skip_debug = flags.contains(ReaderFlags::SKIP_DEBUG);
    let mut local_variables: Vec<LocalVariable> = vec![];
    let mut local_variable_types: Vec<(LocalVariableKey, String)> = vec![];
    let mut has_local_variables = false;
    for mut attribute in read_attributes(code, table)? {
        let info = &mut attribute.info;
        match attribute.name.as_str() {
            "LineNumberTable" if !skip_debug => {
                let count = info.u16()?;
                for _ in 0..count {
                    let start_pc = info.u16()? as usize;
                    let line = info.u16()?;
                    labels.at(&mut instructions, start_pc);
                    contents.entry(start_pc).or_default().line_numbers.push(line);
                }
            }
            "LocalVariableTable" if !skip_debug => {
                has_local_variables = true;
                for (key, descriptor) in read_local_variables(info, table)? {
                    local_variables.push(LocalVariable {
                        name: key.name.clone(),
                        descriptor,
                        signature: None,
                        start: labels.at(&mut instructions, key.start_pc),
                        end: labels.at(&mut instructions, key.start_pc + key.length),
                        index: key.index,
                    });
                }
            }
            "LocalVariableTypeTable" if !skip_debug => {
                local_variable_types.extend(read_local_variables(info, table)?);
            }
            "StackMapTable" if !flags.contains(ReaderFlags::SKIP_FRAMES) => {
                let initial_locals = initial_frame_locals(method, owner)?;
                for (offset, frame) in read_stack_map_table(
                    &attribute,
                    initial_locals,
                    table,
                    &mut instructions,
                    &mut labels,
                )? {
                    contents.entry(offset).or_default().frame = Some(frame);
                }
            }
            "LineNumberTable"
            | "LocalVariableTable"
            | "LocalVariableTypeTable"
            | "StackMapTable" => {
                log::trace!("Skipping {} of {}", attribute.name, method.display_name())
            }
            other => log::debug!(
                "Dropping code attribute {} of {}",
                other,
                method.display_name()
            ),
        }
    }

    // Signatures are matched back to their local variables
    for (key, signature) in local_variable_types {
        let matching = local_variables.iter_mut().find(|local| {
            local.index == key.index
                && local.name == key.name
                && labels.labels.get(&key.start_pc) == Some(&local.start)
                && labels.labels.get(&(key.start_pc + key.length)) == Some(&local.end)
        });
        match matching {
            Some(local) => local.signature = Some(signature),
            None => log::debug!(
                "Local variable type of {} in {} has no matching local variable",
                key.name,
                method.display_name()
            ),
        }
    }
    if has_local_variables {
        method.local_variables = Some(local_variables);
    }

    // Every label must sit on an instruction boundary (or at the very end of the code)
    for offset in labels.labels.keys() {
        let is_instruction = contents
            .get(offset)
            .map_or(false, |at_offset| at_offset.instruction.is_some());
        if *offset != code_length && !is_instruction {
            return Err(Malformed::BadBytecodeOffset { offset: *offset }.into());
        }
    }

    for (offset, at_offset) in contents {
        if let Some(label) = labels.labels.get(&offset) {
            instructions.push(Instruction::Label(*label));
            for line in at_offset.line_numbers {
                instructions.push(Instruction::LineNumber { line, start: *label });
            }
        }
        if let Some(frame) = at_offset.frame {
            instructions.push(Instruction::Frame(frame));
        }
        if let Some(insn) = at_offset.instruction {
            instructions.push(insn);
        }
    }
    if let Some(label) = labels.labels.get(&code_length) {
        instructions.push(Instruction::Label(*label));
    }

    method.instructions = instructions;
    Ok(())
}

/// Identity of a local variable table entry
struct LocalVariableKey {
    start_pc: usize,
    length: usize,
    name: String,
    index: u16,
}

/// Entries of a `LocalVariableTable` or `LocalVariableTypeTable`, along with their descriptor or
/// signature
fn read_local_variables(
    info: &mut ByteCursor,
    table: &ConstantTable,
) -> Result<Vec<(LocalVariableKey, String)>, Malformed> {
    let count = info.u16()?;
    let mut entries = vec![];
    for _ in 0..count {
        let start_pc = info.u16()? as usize;
        let length = info.u16()? as usize;
        let name = table.utf8(info.u16()?)?.to_owned();
        let descriptor = table.utf8(info.u16()?)?.to_owned();
        let index = info.u16()?;
        let key = LocalVariableKey {
            start_pc,
            length,
            name,
            index,
        };
        entries.push((key, descriptor));
    }
    Ok(entries)
}

/// Locals implied on method entry, as the starting point for stack map frame deltas
fn initial_frame_locals(method: &MethodNode, owner: &str) -> Result<Vec<FrameType>, Malformed> {
    let descriptor = MethodDescriptor::parse(&method.descriptor)
        .map_err(|_| Malformed::BadDescriptor(method.descriptor.clone()))?;
    let mut locals = vec![];
    if !method.is_static() {
        if method.is_constructor() && owner != BinaryName::OBJECT.as_str() {
            locals.push(VerificationType::UninitializedThis);
        } else {
            locals.push(VerificationType::Object(owner.to_owned()));
        }
    }
    for parameter in &descriptor.parameters {
        locals.push(VerificationType::from(parameter));
    }
    Ok(locals)
}

fn read_verification_type(
    info: &mut ByteCursor,
    table: &ConstantTable,
    instructions: &mut InsnList,
    labels: &mut OffsetLabels,
) -> Result<FrameType, Malformed> {
    Ok(match info.u8()? {
        0 => VerificationType::Top,
        1 => VerificationType::Integer,
        2 => VerificationType::Float,
        3 => VerificationType::Double,
        4 => VerificationType::Long,
        5 => VerificationType::Null,
        6 => VerificationType::UninitializedThis,
        7 => VerificationType::Object(table.class_name(info.u16()?)?.to_owned()),
        8 => {
            let offset = info.u16()? as usize;
            VerificationType::Uninitialized(labels.at(instructions, offset))
        }
        tag => {
            return Err(Malformed::BadAttribute {
                name: String::from("StackMapTable"),
                message: format!("unknown verification type tag {}", tag),
            })
        }
    })
}

/// Expand the frames of a `StackMapTable` into full frames, keyed by bytecode offset
fn read_stack_map_table(
    attribute: &AttributeBody,
    initial_locals: Vec<FrameType>,
    table: &ConstantTable,
    instructions: &mut InsnList,
    labels: &mut OffsetLabels,
) -> Result<Vec<(usize, FrameNode)>, Malformed> {
    let mut info = attribute.info.clone();
    let count = info.u16()?;
    let mut frames = vec![];
    let mut locals = initial_locals;
    let mut previous_offset: Option<usize> = None;

    for _ in 0..count {
        let frame_type = info.u8()?;
        let mut stack = vec![];
        let offset_delta = match frame_type {
            0..=63 => frame_type as u16,
            64..=127 => {
                stack.push(read_verification_type(&mut info, table, instructions, labels)?);
                (frame_type - 64) as u16
            }
            247 => {
                let offset_delta = info.u16()?;
                stack.push(read_verification_type(&mut info, table, instructions, labels)?);
                offset_delta
            }
            248..=250 => {
                let offset_delta = info.u16()?;
                let chopped = (251 - frame_type) as usize;
                if chopped > locals.len() {
                    return Err(attribute.bad("chop frame removes too many locals"));
                }
                locals.truncate(locals.len() - chopped);
                offset_delta
            }
            251 => info.u16()?,
            252..=254 => {
                let offset_delta = info.u16()?;
                for _ in 0..(frame_type - 251) {
                    locals.push(read_verification_type(&mut info, table, instructions, labels)?);
                }
                offset_delta
            }
            255 => {
                let offset_delta = info.u16()?;
                let local_count = info.u16()?;
                locals = vec![];
                for _ in 0..local_count {
                    locals.push(read_verification_type(&mut info, table, instructions, labels)?);
                }
                let stack_count = info.u16()?;
                for _ in 0..stack_count {
                    stack.push(read_verification_type(&mut info, table, instructions, labels)?);
                }
                offset_delta
            }
            _ => return Err(attribute.bad(format!("reserved frame type {}", frame_type))),
        };

        let offset = match previous_offset {
            None => offset_delta as usize,
            Some(previous) => previous + offset_delta as usize + 1,
        };
        previous_offset = Some(offset);
        labels.at(instructions, offset);
        frames.push((
            offset,
            FrameNode {
                locals: locals.clone(),
                stack,
            },
        ));
    }
    Ok(frames)
}

/// Decode the instruction at `offset`
fn read_instruction(
    code: &mut ByteCursor,
    offset: usize,
    table: &ConstantTable,
    instructions: &mut InsnList,
    labels: &mut OffsetLabels,
) -> Result<Instruction, Error> {
    let opcode = code.u8()?;
    Ok(match opcode {
        NOP..=DCONST_1 => Instruction::Plain(opcode),
        BIPUSH => Instruction::Int {
            opcode,
            operand: code.i8()? as i32,
        },
        SIPUSH => Instruction::Int {
            opcode,
            operand: code.i16()? as i32,
        },
        NEWARRAY => Instruction::Int {
            opcode,
            operand: code.u8()? as i32,
        },
        LDC => Instruction::Ldc(table.loadable(code.u8()? as u16)?),
        LDC_W | LDC2_W => Instruction::Ldc(table.loadable(code.u16()?)?),
        ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Instruction::Var {
            opcode,
            var: code.u8()? as u16,
        },
        ILOAD_0..=ALOAD_3 => Instruction::Var {
            opcode: ILOAD + (opcode - ILOAD_0) / 4,
            var: ((opcode - ILOAD_0) % 4) as u16,
        },
        ISTORE_0..=ASTORE_3 => Instruction::Var {
            opcode: ISTORE + (opcode - ISTORE_0) / 4,
            var: ((opcode - ISTORE_0) % 4) as u16,
        },
        IALOAD..=SALOAD
        | IASTORE..=LXOR
        | I2L..=DCMPG
        | IRETURN..=RETURN
        | ARRAYLENGTH
        | ATHROW
        | MONITORENTER
        | MONITOREXIT => Instruction::Plain(opcode),
        IINC => Instruction::Iinc {
            var: code.u8()? as u16,
            increment: code.i8()? as i16,
        },
        IFEQ..=JSR | IFNULL | IFNONNULL => {
            let relative = code.i16()? as i32;
            Instruction::Jump {
                opcode,
                target: labels.at_relative(instructions, offset, relative)?,
            }
        }
        GOTO_W | JSR_W => {
            let relative = code.i32()?;
            Instruction::Jump {
                opcode: if opcode == GOTO_W { GOTO } else { JSR },
                target: labels.at_relative(instructions, offset, relative)?,
            }
        }
        TABLESWITCH => {
            code.align4()?;
            let default = labels.at_relative(instructions, offset, code.i32()?)?;
            let low = code.i32()?;
            let high = code.i32()?;
            if high < low {
                return Err(Malformed::BadOpcode { opcode, offset }.into());
            }
            let mut targets = vec![];
            for _ in low..=high {
                targets.push(labels.at_relative(instructions, offset, code.i32()?)?);
            }
            Instruction::TableSwitch {
                low,
                high,
                default,
                targets,
            }
        }
        LOOKUPSWITCH => {
            code.align4()?;
            let default = labels.at_relative(instructions, offset, code.i32()?)?;
            let pair_count = code.i32()?;
            if pair_count < 0 {
                return Err(Malformed::BadOpcode { opcode, offset }.into());
            }
            let mut pairs = vec![];
            for _ in 0..pair_count {
                let key = code.i32()?;
                pairs.push((key, labels.at_relative(instructions, offset, code.i32()?)?));
            }
            Instruction::LookupSwitch { default, pairs }
        }
        GETSTATIC..=PUTFIELD => {
            let member = table.member_ref(code.u16()?)?;
            Instruction::Field(FieldInsn {
                opcode,
                owner: member.owner.to_owned(),
                name: member.name.to_owned(),
                descriptor: member.descriptor.to_owned(),
            })
        }
        INVOKEVIRTUAL..=INVOKEINTERFACE => {
            let member = table.member_ref(code.u16()?)?;
            if opcode == INVOKEINTERFACE {
                let _count = code.u8()?;
                let _zero = code.u8()?;
            }
            Instruction::Method(MethodInsn {
                opcode,
                owner: member.owner.to_owned(),
                name: member.name.to_owned(),
                descriptor: member.descriptor.to_owned(),
                is_interface: member.is_interface,
            })
        }
        INVOKEDYNAMIC => {
            let index = code.u16()?;
            let _zero = code.u16()?;
            let (bootstrap_method, name_and_type) = match table.get(index)? {
                Constant::InvokeDynamic {
                    bootstrap_method,
                    method_descriptor,
                } => (*bootstrap_method, method_descriptor.0 .0),
                _ => {
                    return Err(Malformed::BadConstantIndex {
                        index,
                        expected: "InvokeDynamic",
                    }
                    .into())
                }
            };
            let (name, descriptor) = table.name_and_type(name_and_type)?;
            let (handle, arguments) = table.bootstrap_method(bootstrap_method)?;
            Instruction::InvokeDynamic(InvokeDynamicInsn {
                name: name.to_owned(),
                descriptor: descriptor.to_owned(),
                bootstrap_method: handle,
                bootstrap_arguments: arguments,
            })
        }
        NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => Instruction::Type {
            opcode,
            class: table.class_name(code.u16()?)?.to_owned(),
        },
        WIDE => {
            let wide_opcode = code.u8()?;
            match wide_opcode {
                ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Instruction::Var {
                    opcode: wide_opcode,
                    var: code.u16()?,
                },
                IINC => Instruction::Iinc {
                    var: code.u16()?,
                    increment: code.i16()?,
                },
                _ => {
                    return Err(Malformed::BadOpcode {
                        opcode: wide_opcode,
                        offset,
                    }
                    .into())
                }
            }
        }
        MULTIANEWARRAY => Instruction::MultiANewArray {
            descriptor: table.class_name(code.u16()?)?.to_owned(),
            dimensions: code.u8()?,
        },
        _ => return Err(Malformed::BadOpcode { opcode, offset }.into()),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBF, 0, 0, 0, 52];
        match read_class(&bytes, ReaderFlags::empty()) {
            Err(Error::MalformedClassFile(Malformed::BadMagic(0xCAFEBABF))) => (),
            other => panic!("unexpected result {:?}", other.map(|c| c.name)),
        }
    }

    #[test]
    fn rejects_newer_versions() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 66, 0, 1];
        assert!(matches!(
            read_class(&bytes, ReaderFlags::empty()),
            Err(Error::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52, 0, 3, 1, 0];
        assert!(matches!(
            read_class(&bytes, ReaderFlags::empty()),
            Err(Error::MalformedClassFile(Malformed::UnexpectedEnd { .. }))
        ));
    }

    #[test]
    fn rejects_unknown_constant_tags() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52, 0, 2, 2, 0, 0];
        assert!(matches!(
            read_class(&bytes, ReaderFlags::empty()),
            Err(Error::MalformedClassFile(Malformed::BadConstantTag { index: 1, tag: 2 }))
        ));
    }

    #[test]
    fn decodes_short_forms() {
        let table = ConstantTable::default();
        let mut instructions = InsnList::new();
        let mut labels = OffsetLabels {
            labels: BTreeMap::new(),
        };
        let bytes = [ALOAD_2, LSTORE_3, WIDE, IINC, 0x01, 0x00, 0xFF, 0xFE];
        let mut code = ByteCursor::new(&bytes);
        let mut decoded = vec![];
        while !code.is_empty() {
            let offset = code.position();
            decoded.push(
                read_instruction(&mut code, offset, &table, &mut instructions, &mut labels)
                    .unwrap(),
            );
        }
        assert_eq!(
            decoded,
            vec![
                Instruction::Var {
                    opcode: ALOAD,
                    var: 2
                },
                Instruction::Var {
                    opcode: LSTORE,
                    var: 3
                },
                Instruction::Iinc {
                    var: 256,
                    increment: -2
                },
            ]
        );
    }
}
