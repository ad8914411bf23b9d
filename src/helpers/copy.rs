use crate::jvm::model::{
    InsnList, Instruction, Label, LocalVariable, MethodNode, TryCatchBlock,
};
use std::collections::HashMap;

/// Method with the same header (access, name, descriptor, signature, exceptions) as `source` and
/// an empty body
pub fn new_method_node(source: &MethodNode) -> MethodNode {
    let mut method = MethodNode::new(source.access_flags, &source.name, &source.descriptor);
    method.signature = source.signature.clone();
    method.exceptions = source.exceptions.clone();
    method
}

/// Maps the labels of one method onto fresh labels of another
///
/// Labels are allocated lazily, in order of first appearance, so copying the same method twice
/// produces the same labels.
pub struct Relabeler<'a> {
    target: &'a mut InsnList,
    mapping: HashMap<Label, Label>,
}

impl<'a> Relabeler<'a> {
    pub fn new(target: &'a mut InsnList) -> Relabeler<'a> {
        Relabeler {
            target,
            mapping: HashMap::new(),
        }
    }

    pub fn label(&mut self, label: Label) -> Label {
        let target = &mut self.target;
        *self
            .mapping
            .entry(label)
            .or_insert_with(|| target.new_label())
    }

    pub fn instruction(&mut self, instruction: &Instruction) -> Instruction {
        instruction.map_labels(|label| self.label(label))
    }

    pub fn try_catch_block(&mut self, block: &TryCatchBlock) -> TryCatchBlock {
        TryCatchBlock {
            start: self.label(block.start),
            end: self.label(block.end),
            handler: self.label(block.handler),
            catch_type: block.catch_type.clone(),
        }
    }

    pub fn local_variable(&mut self, local: &LocalVariable) -> LocalVariable {
        LocalVariable {
            start: self.label(local.start),
            end: self.label(local.end),
            ..local.clone()
        }
    }
}

/// Copy the body of `source` into `target`, keeping only the instructions `keep` accepts
///
/// Every label of the source gets a fresh counterpart in the target.
fn copy_body(
    source: &MethodNode,
    target: &mut MethodNode,
    mut keep: impl FnMut(&Instruction) -> bool,
) {
    let mut instructions = InsnList::new();
    let mut relabeler = Relabeler::new(&mut instructions);

    let body: Vec<Instruction> = source
        .instructions
        .iter()
        .filter(|insn| keep(insn))
        .map(|insn| relabeler.instruction(insn))
        .collect();
    let try_catch_blocks = source
        .try_catch_blocks
        .iter()
        .map(|block| relabeler.try_catch_block(block))
        .collect();
    let local_variables = source.local_variables.as_ref().map(|locals| {
        locals
            .iter()
            .map(|local| relabeler.local_variable(local))
            .collect()
    });

    instructions.replace_instructions(body);
    target.instructions = instructions;
    target.try_catch_blocks = try_catch_blocks;
    target.local_variables = local_variables;
    target.max_stack = source.max_stack;
    target.max_locals = source.max_locals;
    target.attributes = source.attributes.clone();
}

/// Deep copy of a method, with fresh labels in one-to-one correspondence with the originals
pub fn copy(method: &MethodNode) -> MethodNode {
    let mut copied = new_method_node(method);
    copy_body(method, &mut copied, |_| true);
    copied
}

/// Copy of a method without any line number pseudo-instructions
pub fn remove_line_numbers(method: &MethodNode) -> MethodNode {
    let mut copied = new_method_node(method);
    copy_body(method, &mut copied, |insn| {
        !matches!(insn, Instruction::LineNumber { .. })
    });
    copied
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::model::MethodBuilder;
    use crate::jvm::opcodes::*;
    use crate::jvm::MethodAccessFlags;

    fn looping_method() -> MethodNode {
        let mut method = MethodBuilder::new(MethodAccessFlags::STATIC, "spin", "(I)I");
        method.signature("(I)I").exception("java/lang/Exception");
        let start = method.label();
        let end = method.label();
        method.place(start);
        method.line_number(3, start);
        method.iinc(0, -1);
        method.var_insn(ILOAD, 0);
        method.jump(IFNE, start);
        method.place(end);
        method.line_number(4, end);
        method.var_insn(ILOAD, 0);
        method.insn(IRETURN);
        method.try_catch(start, end, end, Some("java/lang/Exception"));
        method.local_variable("n", "I", None, start, end, 0);
        method.maxs(1, 1);
        method.build()
    }

    #[test]
    fn header_only() {
        let method = looping_method();
        let header = new_method_node(&method);
        assert_eq!(header.name, "spin");
        assert_eq!(header.signature.as_deref(), Some("(I)I"));
        assert_eq!(header.exceptions, vec![String::from("java/lang/Exception")]);
        assert!(header.instructions.is_empty());
        assert!(header.local_variables.is_none());
    }

    #[test]
    fn copies_are_structurally_equal() {
        let method = looping_method();
        let copied = copy(&method);
        assert_eq!(copied.instructions.len(), method.instructions.len());
        assert_eq!(copied.try_catch_blocks.len(), 1);
        assert_eq!(copied.max_stack, 1);

        // Labels correspond one-to-one
        let block = &copied.try_catch_blocks[0];
        assert_eq!(copied.instructions.label_position(block.start), Some(0));
        assert_ne!(block.start, block.end);
        assert_eq!(block.end, block.handler);
        let local = &copied.local_variables.as_ref().unwrap()[0];
        assert_eq!(local.start, block.start);
    }

    #[test]
    fn line_numbers_are_removed() {
        let method = looping_method();
        let stripped = remove_line_numbers(&method);
        assert!(stripped
            .instructions
            .iter()
            .all(|insn| !matches!(insn, Instruction::LineNumber { .. })));
        assert_eq!(stripped.instructions.len(), method.instructions.len() - 2);
        assert_eq!(remove_line_numbers(&stripped), stripped);
    }
}
