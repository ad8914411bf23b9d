//! Builder-call transcripts
//!
//! A transcript is the Rust code which would rebuild a class or method through [`ClassBuilder`]
//! and [`MethodBuilder`]. It is meant for looking at classes while debugging, and for pasting
//! into tests. Labels are named in order of first appearance within each method (`l0`, `l1`, ...)
//! so that the same input always gives the same transcript.
//!
//! [`ClassBuilder`]: crate::jvm::model::ClassBuilder
//! [`MethodBuilder`]: crate::jvm::model::MethodBuilder

use crate::jvm::model::{
    ClassNode, ConstantValue, FieldNode, FrameType, Handle, Instruction, Label, MethodNode,
    RawAttribute,
};
use crate::jvm::opcodes;
use crate::jvm::verifier::VerificationType;
use crate::jvm::{read_class, Error, ReaderFlags};
use std::collections::HashMap;
use std::fmt::{Debug, Write};

/// Transcript of a whole class
///
/// Without `debug`, line numbers and local variables are left out.
pub fn transcribe_class(class: &ClassNode, debug: bool) -> String {
    let mut transcript = Transcript::default();
    transcript.class(class, debug);
    transcript.output
}

/// Transcript of a single method, ending with `let method = method.build();`
pub fn transcribe_method(method: &MethodNode, debug: bool) -> String {
    let mut transcript = Transcript::default();
    transcript.method(method, debug);
    transcript.line("let method = method.build();");
    transcript.output
}

/// Transcript of a class file
///
/// Without `debug`, the class is read without its debug information.
pub fn transcribe_bytes(bytes: &[u8], debug: bool) -> Result<String, Error> {
    let flags = if debug {
        ReaderFlags::empty()
    } else {
        ReaderFlags::SKIP_DEBUG
    };
    let class = read_class(bytes, flags)?;
    Ok(transcribe_class(&class, debug))
}

#[derive(Default)]
struct Transcript {
    output: String,
    indent: usize,
}

impl Transcript {
    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
        self.output.push_str(text.as_ref());
        self.output.push('\n');
    }

    fn class(&mut self, class: &ClassNode, debug: bool) {
        self.line(format!(
            "let mut class = ClassBuilder::new(Version {{ major_version: {}, minor_version: {} }}, \
             {}, {:?}, {});",
            class.version.major_version,
            class.version.minor_version,
            flags("ClassAccessFlags", class.access_flags, class.access_flags.is_empty()),
            class.name,
            option_str(class.super_name.as_deref()),
        ));
        for interface in &class.interfaces {
            self.line(format!("class.interface({:?});", interface));
        }
        if let Some(signature) = &class.signature {
            self.line(format!("class.signature({:?});", signature));
        }
        if let Some(source_file) = &class.source_file {
            self.line(format!("class.source_file({:?});", source_file));
        }
        for inner in &class.inner_classes {
            self.line(format!(
                "class.inner_class({:?}, {}, {}, {});",
                inner.name,
                option_str(inner.outer_name.as_deref()),
                option_str(inner.inner_name.as_deref()),
                flags("InnerClassAccessFlags", inner.access_flags, inner.access_flags.is_empty()),
            ));
        }
        for attribute in &class.attributes {
            self.line(format!("class.{};", attribute_call(attribute)));
        }

        for field in &class.fields {
            self.line("{");
            self.indent += 1;
            self.field(field);
            self.indent -= 1;
            self.line("}");
        }
        for method in &class.methods {
            self.line("{");
            self.indent += 1;
            self.method(method, debug);
            self.line("class.method(method.build());");
            self.indent -= 1;
            self.line("}");
        }
        self.line("let class = class.build();");
    }

    fn field(&mut self, field: &FieldNode) {
        self.line(format!(
            "let mut field = FieldNode::new({}, {:?}, {:?});",
            flags("FieldAccessFlags", field.access_flags, field.access_flags.is_empty()),
            field.name,
            field.descriptor,
        ));
        if let Some(signature) = &field.signature {
            self.line(format!("field.signature = Some(String::from({:?}));", signature));
        }
        if let Some(value) = &field.value {
            self.line(format!("field.value = Some({});", constant(value)));
        }
        for attribute in &field.attributes {
            self.line(format!(
                "field.attributes.push(RawAttribute {{ name: String::from({:?}), info: vec!{} }});",
                attribute.name,
                bytes(&attribute.info),
            ));
        }
        self.line("class.field(field);");
    }

    fn method(&mut self, method: &MethodNode, debug: bool) {
        self.line(format!(
            "let mut method = MethodBuilder::new({}, {:?}, {:?});",
            flags("MethodAccessFlags", method.access_flags, method.access_flags.is_empty()),
            method.name,
            method.descriptor,
        ));
        if let Some(signature) = &method.signature {
            self.line(format!("method.signature({:?});", signature));
        }
        for exception in &method.exceptions {
            self.line(format!("method.exception({:?});", exception));
        }

        let labels = LabelNames::of(method, debug);
        for index in 0..labels.names.len() {
            self.line(format!("let l{} = method.label();", index));
        }

        for insn in &method.instructions {
            if !debug && matches!(insn, Instruction::LineNumber { .. }) {
                continue;
            }
            self.line(format!("method.{};", instruction_call(insn, &labels)));
        }
        for block in &method.try_catch_blocks {
            self.line(format!(
                "method.try_catch({}, {}, {}, {});",
                labels.name(block.start),
                labels.name(block.end),
                labels.name(block.handler),
                option_str(block.catch_type.as_deref()),
            ));
        }
        if debug {
            for local in method.local_variables.iter().flatten() {
                self.line(format!(
                    "method.local_variable({:?}, {:?}, {}, {}, {}, {});",
                    local.name,
                    local.descriptor,
                    option_str(local.signature.as_deref()),
                    labels.name(local.start),
                    labels.name(local.end),
                    local.index,
                ));
            }
        }
        if method.max_stack != 0 || method.max_locals != 0 {
            self.line(format!(
                "method.maxs({}, {});",
                method.max_stack, method.max_locals
            ));
        }
        for attribute in &method.attributes {
            self.line(format!("method.{};", attribute_call(attribute)));
        }
    }
}

/// Names of the labels of a method, by order of first appearance
struct LabelNames {
    names: HashMap<Label, usize>,
}

impl LabelNames {
    fn of(method: &MethodNode, debug: bool) -> LabelNames {
        let mut names = HashMap::new();
        let mut see = |label: Label| {
            let next = names.len();
            names.entry(label).or_insert(next);
        };
        for insn in &method.instructions {
            if !debug && matches!(insn, Instruction::LineNumber { .. }) {
                continue;
            }
            if let Instruction::Label(label) = insn {
                see(*label);
            }
            for label in insn.referenced_labels() {
                see(label);
            }
        }
        for block in &method.try_catch_blocks {
            see(block.start);
            see(block.end);
            see(block.handler);
        }
        if debug {
            for local in method.local_variables.iter().flatten() {
                see(local.start);
                see(local.end);
            }
        }
        LabelNames { names }
    }

    fn name(&self, label: Label) -> String {
        match self.names.get(&label) {
            Some(index) => format!("l{}", index),
            None => format!("{:?}", label),
        }
    }
}

fn option_str(value: Option<&str>) -> String {
    match value {
        Some(value) => format!("Some({:?})", value),
        None => String::from("None"),
    }
}

/// Flags as an expression, using the `Debug` rendering of the flag set (`A | B`)
fn flags(type_name: &str, flags: impl Debug, is_empty: bool) -> String {
    if is_empty {
        return format!("{}::empty()", type_name);
    }
    format!("{:?}", flags)
        .split(" | ")
        .map(|name| {
            if name.starts_with("0x") {
                format!("{}::from_bits_truncate({})", type_name, name)
            } else {
                format!("{}::{}", type_name, name)
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn bytes(info: &[u8]) -> String {
    let rendered: Vec<String> = info.iter().map(|byte| format!("0x{:02x}", byte)).collect();
    format!("[{}]", rendered.join(", "))
}

fn attribute_call(attribute: &RawAttribute) -> String {
    format!("attribute({:?}, &{})", attribute.name, bytes(&attribute.info))
}

fn mnemonic(opcode: u8) -> String {
    match opcodes::mnemonic(opcode) {
        Some(mnemonic) => mnemonic.to_owned(),
        None => format!("0x{:02x}", opcode),
    }
}


fn handle(handle: &Handle) -> String {
    format!(
        "Handle {{ kind: HandleKind::{:?}, owner: String::from({:?}), name: String::from({:?}), \
         descriptor: String::from({:?}), is_interface: {} }}",
        handle.kind, handle.owner, handle.name, handle.descriptor, handle.is_interface
    )
}

fn constant(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Integer(value) => format!("ConstantValue::Integer({})", value),
        ConstantValue::Float(value) if value.is_finite() => {
            format!("ConstantValue::Float({:?})", value)
        }
        ConstantValue::Float(value) => format!(
            "ConstantValue::Float(f32::from_bits(0x{:x}))",
            value.to_bits()
        ),
        ConstantValue::Long(value) => format!("ConstantValue::Long({})", value),
        ConstantValue::Double(value) if value.is_finite() => {
            format!("ConstantValue::Double({:?})", value)
        }
        ConstantValue::Double(value) => format!(
            "ConstantValue::Double(f64::from_bits(0x{:x}))",
            value.to_bits()
        ),
        ConstantValue::String(value) => {
            format!("ConstantValue::String(String::from({:?}))", value)
        }
        ConstantValue::Class(value) => format!("ConstantValue::Class(String::from({:?}))", value),
        ConstantValue::MethodType(value) => {
            format!("ConstantValue::MethodType(String::from({:?}))", value)
        }
        ConstantValue::MethodHandle(value) => {
            format!("ConstantValue::MethodHandle({})", handle(value))
        }
    }
}

fn frame_type(typ: &FrameType, labels: &LabelNames) -> String {
    match typ {
        VerificationType::Object(class) => {
            format!("VerificationType::Object(String::from({:?}))", class)
        }
        VerificationType::Uninitialized(label) => {
            format!("VerificationType::Uninitialized({})", labels.name(*label))
        }
        other => format!("VerificationType::{:?}", other),
    }
}

fn frame_types(types: &[FrameType], labels: &LabelNames) -> String {
    let rendered: Vec<String> = types.iter().map(|typ| frame_type(typ, labels)).collect();
    format!("vec![{}]", rendered.join(", "))
}

fn instruction_call(insn: &Instruction, labels: &LabelNames) -> String {
    let mut call = String::new();
    let _ = match insn {
        Instruction::Plain(opcode) => write!(call, "insn({})", mnemonic(*opcode)),
        Instruction::Int { opcode, operand } => {
            write!(call, "int_insn({}, {})", mnemonic(*opcode), operand)
        }
        Instruction::Var { opcode, var } => {
            write!(call, "var_insn({}, {})", mnemonic(*opcode), var)
        }
        Instruction::Type { opcode, class } => {
            write!(call, "type_insn({}, {:?})", mnemonic(*opcode), class)
        }
        Instruction::Field(field) => write!(
            call,
            "field_insn({}, {:?}, {:?}, {:?})",
            mnemonic(field.opcode),
            field.owner,
            field.name,
            field.descriptor
        ),
        Instruction::Method(invocation) => write!(
            call,
            "method_insn({}, {:?}, {:?}, {:?}, {})",
            mnemonic(invocation.opcode),
            invocation.owner,
            invocation.name,
            invocation.descriptor,
            invocation.is_interface
        ),
        Instruction::InvokeDynamic(indy) => {
            let arguments: Vec<String> = indy.bootstrap_arguments.iter().map(constant).collect();
            write!(
                call,
                "invoke_dynamic({:?}, {:?}, {}, vec![{}])",
                indy.name,
                indy.descriptor,
                handle(&indy.bootstrap_method),
                arguments.join(", ")
            )
        }
        Instruction::Jump { opcode, target } => {
            write!(call, "jump({}, {})", mnemonic(*opcode), labels.name(*target))
        }
        Instruction::Label(label) => write!(call, "place({})", labels.name(*label)),
        Instruction::Ldc(value) => write!(call, "ldc({})", constant(value)),
        Instruction::Iinc { var, increment } => write!(call, "iinc({}, {})", var, increment),
        Instruction::TableSwitch {
            low,
            high,
            default,
            targets,
        } => {
            let targets: Vec<String> = targets.iter().map(|label| labels.name(*label)).collect();
            write!(
                call,
                "table_switch({}, {}, {}, &[{}])",
                low,
                high,
                labels.name(*default),
                targets.join(", ")
            )
        }
        Instruction::LookupSwitch { default, pairs } => {
            let pairs: Vec<String> = pairs
                .iter()
                .map(|(key, label)| format!("({}, {})", key, labels.name(*label)))
                .collect();
            write!(
                call,
                "lookup_switch({}, &[{}])",
                labels.name(*default),
                pairs.join(", ")
            )
        }
        Instruction::MultiANewArray {
            descriptor,
            dimensions,
        } => write!(call, "multi_anew_array({:?}, {})", descriptor, dimensions),
        Instruction::LineNumber { line, start } => {
            write!(call, "line_number({}, {})", line, labels.name(*start))
        }
        Instruction::Frame(frame) => write!(
            call,
            "frame({}, {})",
            frame_types(&frame.locals, labels),
            frame_types(&frame.stack, labels)
        ),
    };
    call
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::Version;
    use crate::jvm::model::{ClassBuilder, MethodBuilder};
    use crate::jvm::opcodes::*;
    use crate::jvm::{ClassAccessFlags, MethodAccessFlags};

    fn counting_method() -> MethodNode {
        let mut method = MethodBuilder::new(MethodAccessFlags::STATIC, "count", "(I)I");
        let start = method.label();
        let end = method.label();
        method.place(start);
        method.line_number(7, start);
        method.iinc(0, -1);
        method.var_insn(ILOAD, 0);
        method.jump(IFNE, start);
        method.var_insn(ILOAD, 0);
        method.insn(IRETURN);
        method.place(end);
        method.local_variable("n", "I", None, start, end, 0);
        method.maxs(1, 1);
        method.build()
    }

    #[test]
    fn method_transcript() {
        let transcript = transcribe_method(&counting_method(), true);
        let expected = "\
let mut method = MethodBuilder::new(MethodAccessFlags::STATIC, \"count\", \"(I)I\");
let l0 = method.label();
let l1 = method.label();
method.place(l0);
method.line_number(7, l0);
method.iinc(0, -1);
method.var_insn(ILOAD, 0);
method.jump(IFNE, l0);
method.var_insn(ILOAD, 0);
method.insn(IRETURN);
method.place(l1);
method.local_variable(\"n\", \"I\", None, l0, l1, 0);
method.maxs(1, 1);
let method = method.build();
";
        assert_eq!(transcript, expected);
    }

    #[test]
    fn debug_information_is_optional() {
        let transcript = transcribe_method(&counting_method(), false);
        assert!(!transcript.contains("line_number"));
        assert!(!transcript.contains("local_variable"));
        assert!(transcript.contains("method.jump(IFNE, l0);"));
    }

    #[test]
    fn class_transcript() {
        let mut class = ClassBuilder::new(
            Version::JAVA8,
            ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            "p/Q",
            Some("java/lang/Object"),
        );
        class.source_file("Q.java");
        class.method(counting_method());
        let class = class.build();

        let transcript = transcribe_class(&class, true);
        assert!(transcript.starts_with(
            "let mut class = ClassBuilder::new(Version { major_version: 52, minor_version: 0 }, \
             ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER, \"p/Q\", \
             Some(\"java/lang/Object\"));\n"
        ));
        assert!(transcript.contains("class.source_file(\"Q.java\");\n"));
        assert!(transcript.contains("    method.insn(IRETURN);\n"));
        assert!(transcript.ends_with("let class = class.build();\n"));
        assert_eq!(transcript, transcribe_class(&class, true));
    }

    #[test]
    fn constants() {
        assert_eq!(constant(&ConstantValue::Float(1.5)), "ConstantValue::Float(1.5)");
        assert_eq!(
            constant(&ConstantValue::Double(f64::INFINITY)),
            "ConstantValue::Double(f64::from_bits(0x7ff0000000000000))"
        );
        assert_eq!(
            constant(&ConstantValue::String(String::from("a\"b"))),
            "ConstantValue::String(String::from(\"a\\\"b\"))"
        );
    }
}
