use super::*;
use crate::jvm::class_file::Version;
use crate::jvm::{ClassAccessFlags, InnerClassAccessFlags, MethodAccessFlags};

/// Incrementally build a [`ClassNode`]
///
/// ```
/// use bytekit::jvm::class_file::Version;
/// use bytekit::jvm::model::{ClassBuilder, MethodBuilder};
/// use bytekit::jvm::opcodes::*;
/// use bytekit::jvm::{ClassAccessFlags, MethodAccessFlags};
///
/// let mut class = ClassBuilder::new(
///     Version::JAVA8,
///     ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
///     "me/alec/Point",
///     Some("java/lang/Object"),
/// );
/// let mut method = MethodBuilder::new(MethodAccessFlags::PUBLIC, "<init>", "()V");
/// method.var_insn(ALOAD, 0);
/// method.method_insn(INVOKESPECIAL, "java/lang/Object", "<init>", "()V", false);
/// method.insn(RETURN);
/// class.method(method.build());
/// let class = class.build();
/// assert_eq!(class.methods[0].instructions.len(), 3);
/// ```
pub struct ClassBuilder {
    class: ClassNode,
}

impl ClassBuilder {
    pub fn new(
        version: Version,
        access_flags: ClassAccessFlags,
        name: &str,
        super_name: Option<&str>,
    ) -> ClassBuilder {
        let mut class = ClassNode::new(version, access_flags, name);
        class.super_name = super_name.map(str::to_owned);
        ClassBuilder { class }
    }

    pub fn interface(&mut self, name: &str) -> &mut Self {
        self.class.interfaces.push(name.to_owned());
        self
    }

    pub fn signature(&mut self, signature: &str) -> &mut Self {
        self.class.signature = Some(signature.to_owned());
        self
    }

    pub fn source_file(&mut self, source_file: &str) -> &mut Self {
        self.class.source_file = Some(source_file.to_owned());
        self
    }

    pub fn inner_class(
        &mut self,
        name: &str,
        outer_name: Option<&str>,
        inner_name: Option<&str>,
        access_flags: InnerClassAccessFlags,
    ) -> &mut Self {
        self.class.inner_classes.push(InnerClass {
            name: name.to_owned(),
            outer_name: outer_name.map(str::to_owned),
            inner_name: inner_name.map(str::to_owned),
            access_flags,
        });
        self
    }

    pub fn field(&mut self, field: FieldNode) -> &mut Self {
        self.class.fields.push(field);
        self
    }

    pub fn method(&mut self, method: MethodNode) -> &mut Self {
        self.class.methods.push(method);
        self
    }

    pub fn attribute(&mut self, name: &str, info: &[u8]) -> &mut Self {
        self.class.attributes.push(RawAttribute {
            name: name.to_owned(),
            info: info.to_vec(),
        });
        self
    }

    pub fn build(self) -> ClassNode {
        self.class
    }
}

/// Incrementally build a [`MethodNode`]
///
/// Instructions are appended in order. Labels are generated with [`MethodBuilder::label`] and
/// placed with [`MethodBuilder::place`], so forward jumps just refer to a label placed later.
pub struct MethodBuilder {
    method: MethodNode,
}

impl MethodBuilder {
    pub fn new(access_flags: MethodAccessFlags, name: &str, descriptor: &str) -> MethodBuilder {
        MethodBuilder {
            method: MethodNode::new(access_flags, name, descriptor),
        }
    }

    pub fn signature(&mut self, signature: &str) -> &mut Self {
        self.method.signature = Some(signature.to_owned());
        self
    }

    pub fn exception(&mut self, name: &str) -> &mut Self {
        self.method.exceptions.push(name.to_owned());
        self
    }

    /// Fresh label (not yet placed)
    pub fn label(&mut self) -> Label {
        self.method.instructions.new_label()
    }

    fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.method.instructions.push(instruction);
        self
    }

    pub fn place(&mut self, label: Label) -> &mut Self {
        self.push(Instruction::Label(label))
    }

    pub fn insn(&mut self, opcode: u8) -> &mut Self {
        self.push(Instruction::Plain(opcode))
    }

    pub fn int_insn(&mut self, opcode: u8, operand: i32) -> &mut Self {
        self.push(Instruction::Int { opcode, operand })
    }

    pub fn var_insn(&mut self, opcode: u8, var: u16) -> &mut Self {
        self.push(Instruction::Var { opcode, var })
    }

    pub fn type_insn(&mut self, opcode: u8, class: &str) -> &mut Self {
        self.push(Instruction::Type {
            opcode,
            class: class.to_owned(),
        })
    }

    pub fn field_insn(
        &mut self,
        opcode: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> &mut Self {
        self.push(Instruction::Field(FieldInsn {
            opcode,
            owner: owner.to_owned(),
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
        }))
    }

    pub fn method_insn(
        &mut self,
        opcode: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> &mut Self {
        self.push(Instruction::Method(MethodInsn {
            opcode,
            owner: owner.to_owned(),
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            is_interface,
        }))
    }

    pub fn invoke_dynamic(
        &mut self,
        name: &str,
        descriptor: &str,
        bootstrap_method: Handle,
        bootstrap_arguments: Vec<ConstantValue>,
    ) -> &mut Self {
        self.push(Instruction::InvokeDynamic(InvokeDynamicInsn {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            bootstrap_method,
            bootstrap_arguments,
        }))
    }

    pub fn jump(&mut self, opcode: u8, target: Label) -> &mut Self {
        self.push(Instruction::Jump { opcode, target })
    }

    pub fn ldc(&mut self, value: ConstantValue) -> &mut Self {
        self.push(Instruction::Ldc(value))
    }

    pub fn iinc(&mut self, var: u16, increment: i16) -> &mut Self {
        self.push(Instruction::Iinc { var, increment })
    }

    pub fn table_switch(
        &mut self,
        low: i32,
        high: i32,
        default: Label,
        targets: &[Label],
    ) -> &mut Self {
        self.push(Instruction::TableSwitch {
            low,
            high,
            default,
            targets: targets.to_vec(),
        })
    }

    pub fn lookup_switch(&mut self, default: Label, pairs: &[(i32, Label)]) -> &mut Self {
        self.push(Instruction::LookupSwitch {
            default,
            pairs: pairs.to_vec(),
        })
    }

    pub fn multi_anew_array(&mut self, descriptor: &str, dimensions: u8) -> &mut Self {
        self.push(Instruction::MultiANewArray {
            descriptor: descriptor.to_owned(),
            dimensions,
        })
    }

    pub fn line_number(&mut self, line: u16, start: Label) -> &mut Self {
        self.push(Instruction::LineNumber { line, start })
    }

    pub fn frame(&mut self, locals: Vec<FrameType>, stack: Vec<FrameType>) -> &mut Self {
        self.push(Instruction::Frame(FrameNode { locals, stack }))
    }

    pub fn try_catch(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<&str>,
    ) -> &mut Self {
        self.method.try_catch_blocks.push(TryCatchBlock {
            start,
            end,
            handler,
            catch_type: catch_type.map(str::to_owned),
        });
        self
    }

    pub fn local_variable(
        &mut self,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        start: Label,
        end: Label,
        index: u16,
    ) -> &mut Self {
        self.method
            .local_variables
            .get_or_insert_with(Vec::new)
            .push(LocalVariable {
                name: name.to_owned(),
                descriptor: descriptor.to_owned(),
                signature: signature.map(str::to_owned),
                start,
                end,
                index,
            });
        self
    }

    pub fn maxs(&mut self, max_stack: u16, max_locals: u16) -> &mut Self {
        self.method.max_stack = max_stack;
        self.method.max_locals = max_locals;
        self
    }

    pub fn attribute(&mut self, name: &str, info: &[u8]) -> &mut Self {
        self.method.attributes.push(RawAttribute {
            name: name.to_owned(),
            info: info.to_vec(),
        });
        self
    }

    pub fn build(self) -> MethodNode {
        self.method
    }
}
