//! Serializing class trees into class files
//!
//! The constant pool is rebuilt while writing. When the class was read from a class file, the
//! new pool starts off as a copy of the old one so that attributes carried through as raw bytes
//! still point at the right constants.

mod code;

use super::class_file::{
    Attribute, BootstrapMethods, ClassFile, ConstantIndex, ConstantsPool, Exceptions, Field,
    FieldConstantValue, InnerClassEntry, InnerClasses, Method, Signature, SourceFile,
};
use super::model::{ClassNode, FieldNode, MethodNode, RawAttribute};
use super::verifier::{JavaLibraryHierarchy, TypeHierarchy};
use super::{Error, Serialize};
use bitflags::bitflags;
use code::CodeWriter;

bitflags! {
    /// What to recompute while writing
    pub struct WriterFlags: u8 {
        /// Recompute `max_stack` and `max_locals`
        const COMPUTE_MAXS = 0x01;

        /// Recompute stack map frames (and the maximums). Unreachable code is replaced with
        /// `nop`s ending in `athrow`, since it could not be given frames otherwise.
        const COMPUTE_FRAMES = 0x02;
    }
}

/// Write a class into the bytes of a class file
///
/// When frames are computed, only common classes of the Java class library have their real
/// superclasses (see [`JavaLibraryHierarchy`]); any other two classes merge to `java/lang/Object`.
/// Use [`write_class_with_hierarchy`] to resolve the superclasses of application classes.
pub fn write_class(class: &ClassNode, flags: WriterFlags) -> Result<Vec<u8>, Error> {
    write_class_with_hierarchy(class, flags, &JavaLibraryHierarchy)
}

/// Write a class into the bytes of a class file, merging types in frames using `hierarchy`
pub fn write_class_with_hierarchy(
    class: &ClassNode,
    flags: WriterFlags,
    hierarchy: &dyn TypeHierarchy,
) -> Result<Vec<u8>, Error> {
    let mut pool = match &class.constant_pool {
        Some(table) => ConstantsPool::seeded(table),
        None => ConstantsPool::new(),
    };

    let this_class = pool.get_class(&class.name)?;
    let super_class = match &class.super_name {
        Some(super_name) => pool.get_class(super_name)?.0 .0,
        None => 0,
    };
    let mut interfaces = vec![];
    for interface in &class.interfaces {
        interfaces.push(pool.get_class(interface)?);
    }

    let mut fields = vec![];
    for field in &class.fields {
        fields.push(write_field(field, &mut pool)?);
    }

    let code_writer = CodeWriter {
        owner: &class.name,
        version: class.version,
        flags,
        hierarchy,
    };
    let mut methods = vec![];
    for method in &class.methods {
        methods.push(write_method(method, &code_writer, &mut pool)?);
    }

    let mut attributes = vec![];
    if let Some(source_file) = &class.source_file {
        let source_file = pool.get_utf8(source_file)?;
        attributes.push(pool.get_attribute(SourceFile(source_file))?);
    }
    if let Some(signature) = &class.signature {
        let signature = pool.get_utf8(signature)?;
        attributes.push(pool.get_attribute(Signature { signature })?);
    }
    if !class.inner_classes.is_empty() {
        let mut entries = vec![];
        for inner_class in &class.inner_classes {
            entries.push(InnerClassEntry {
                inner_class: pool.get_class(&inner_class.name)?,
                outer_class: match &inner_class.outer_name {
                    Some(outer_name) => pool.get_class(outer_name)?.0 .0,
                    None => 0,
                },
                inner_name: match &inner_class.inner_name {
                    Some(inner_name) => pool.get_utf8(inner_name)?.0 .0,
                    None => 0,
                },
                access_flags: inner_class.access_flags,
            });
        }
        attributes.push(pool.get_attribute(InnerClasses(entries))?);
    }
    for attribute in &class.attributes {
        attributes.push(raw_attribute(attribute, &mut pool)?);
    }

    // Instructions may have added bootstrap methods, so this goes last
    if !pool.bootstrap_methods().is_empty() {
        let bootstrap_methods = BootstrapMethods(pool.bootstrap_methods().to_vec());
        attributes.push(pool.get_attribute(bootstrap_methods)?);
    }

    let (constants, _) = pool.into_parts();
    let class_file = ClassFile {
        version: class.version,
        constants,
        access_flags: class.access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    };

    let mut bytes = vec![];
    class_file.serialize(&mut bytes)?;
    log::debug!("Wrote {} ({} bytes)", class.name, bytes.len());
    Ok(bytes)
}

fn raw_attribute(
    attribute: &RawAttribute,
    pool: &mut ConstantsPool,
) -> Result<Attribute, Error> {
    Ok(pool.get_raw_attribute(&attribute.name, attribute.info.clone())?)
}

fn write_field(field: &FieldNode, pool: &mut ConstantsPool) -> Result<Field, Error> {
    let name_index = pool.get_utf8(&field.name)?;
    let descriptor_index = pool.get_utf8(&field.descriptor)?;

    let mut attributes = vec![];
    if let Some(value) = &field.value {
        let value: ConstantIndex = pool.get_constant_value(value)?;
        attributes.push(pool.get_attribute(FieldConstantValue(value))?);
    }
    if let Some(signature) = &field.signature {
        let signature = pool.get_utf8(signature)?;
        attributes.push(pool.get_attribute(Signature { signature })?);
    }
    for attribute in &field.attributes {
        attributes.push(raw_attribute(attribute, pool)?);
    }

    Ok(Field {
        access_flags: field.access_flags,
        name_index,
        descriptor_index,
        attributes,
    })
}

fn write_method(
    method: &MethodNode,
    code_writer: &CodeWriter,
    pool: &mut ConstantsPool,
) -> Result<Method, Error> {
    let name_index = pool.get_utf8(&method.name)?;
    let descriptor_index = pool.get_utf8(&method.descriptor)?;

    let mut attributes = vec![];
    if method.has_code() && !method.instructions.is_empty() {
        let code = code_writer.write_code(method, pool)?;
        attributes.push(pool.get_attribute(code)?);
    }
    if !method.exceptions.is_empty() {
        let mut exceptions = vec![];
        for exception in &method.exceptions {
            exceptions.push(pool.get_class(exception)?);
        }
        attributes.push(pool.get_attribute(Exceptions(exceptions))?);
    }
    if let Some(signature) = &method.signature {
        let signature = pool.get_utf8(signature)?;
        attributes.push(pool.get_attribute(Signature { signature })?);
    }
    for attribute in &method.attributes {
        attributes.push(raw_attribute(attribute, pool)?);
    }

    Ok(Method {
        access_flags: method.access_flags,
        name_index,
        descriptor_index,
        attributes,
    })
}
