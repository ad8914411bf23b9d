use bytekit::helpers::*;
use bytekit::jvm::class_file::Version;
use bytekit::jvm::model::{ClassBuilder, ClassNode, Instruction, MethodBuilder, MethodNode};
use bytekit::jvm::opcodes::*;
use bytekit::jvm::{
    read_class, write_class, ClassAccessFlags, Error, MethodAccessFlags, ReaderFlags, WriterFlags,
};

/// `static int f(int x)` written the way old compilers wrote `try { x++ } finally { x-- }`
fn finally_method() -> MethodNode {
    let mut method = MethodBuilder::new(MethodAccessFlags::STATIC, "f", "(I)I");
    let start = method.label();
    let end = method.label();
    let handler = method.label();
    let finally = method.label();
    method.place(start);
    method.line_number(10, start);
    method.iinc(0, 1);
    method.jump(JSR, finally);
    method.place(end);
    method.line_number(11, end);
    method.var_insn(ILOAD, 0);
    method.insn(IRETURN);
    method.place(handler);
    method.var_insn(ASTORE, 1);
    method.jump(JSR, finally);
    method.var_insn(ALOAD, 1);
    method.insn(ATHROW);
    method.place(finally);
    method.var_insn(ASTORE, 2);
    method.iinc(0, -1);
    method.var_insn(RET, 2);
    method.try_catch(start, end, handler, None);
    method.local_variable("x", "I", None, start, end, 0);
    method.build()
}

fn class_with(version: Version, method: MethodNode) -> ClassNode {
    let mut class = ClassBuilder::new(
        version,
        ClassAccessFlags::PUBLIC,
        "p/Old",
        Some("java/lang/Object"),
    );
    class.method(method);
    class.build()
}

fn count(method: &MethodNode, opcode: u8) -> usize {
    method
        .instructions
        .iter()
        .filter(|insn| insn.opcode() == Some(opcode))
        .count()
}

#[test]
fn subroutines_in_old_class_files() {
    // Subroutines are fine in old class files, as long as frames aren't needed
    let bytes = write_class(
        &class_with(Version::JAVA5, finally_method()),
        WriterFlags::COMPUTE_MAXS,
    )
    .unwrap();
    let class = read_class(&bytes, ReaderFlags::empty()).unwrap();
    assert_eq!(count(&class.methods[0], JSR), 2);

    let inlined = remove_subroutines(&class.methods[0]).unwrap();
    assert_eq!(count(&inlined, JSR), 0);
    assert_eq!(count(&inlined, RET), 0);
    // Once per call site
    assert_eq!(count(&inlined, IINC), 3);

    // With the subroutines gone, the method can move to a class file with frames
    let upgraded = class_with(Version::JAVA8, inlined);
    let bytes = class_node_to_bytes(&upgraded).unwrap();
    let reread = read_class(&bytes, ReaderFlags::empty()).unwrap();
    assert_eq!(count(&reread.methods[0], JSR), 0);
    assert!(reread.methods[0]
        .instructions
        .iter()
        .any(|insn| matches!(insn, Instruction::Frame(_))));
}

#[test]
fn subroutines_need_inlining_for_frames() {
    let class = class_with(Version::JAVA8, finally_method());
    assert!(matches!(
        class_node_to_bytes(&class),
        Err(Error::UnsupportedFeature(_))
    ));
}

#[test]
fn copies_are_independent() {
    let original = finally_method();
    let mut copied = copy(&original);
    assert_eq!(copied.instructions.len(), original.instructions.len());
    assert_eq!(copied.try_catch_blocks.len(), original.try_catch_blocks.len());

    copied.instructions.insert(0, Instruction::Plain(NOP));
    copied.try_catch_blocks.clear();
    if let Some(locals) = copied.local_variables.as_mut() {
        locals[0].name = String::from("renamed");
    }
    copied.exceptions.push(String::from("java/lang/Error"));

    let pristine = finally_method();
    assert_eq!(original, pristine);
    assert_eq!(original.local_variables.as_ref().unwrap()[0].name, "x");
}

#[test]
fn copies_can_be_extended_without_label_clashes() {
    let original = finally_method();
    let mut copied = copy(&original);
    let fresh = copied.instructions.new_label();
    let used: Vec<_> = copied
        .instructions
        .iter()
        .filter_map(|insn| match insn {
            Instruction::Label(label) => Some(*label),
            _ => None,
        })
        .collect();
    assert!(!used.contains(&fresh));
}

#[test]
fn line_number_removal_is_idempotent() {
    let method = finally_method();
    let once = remove_line_numbers(&method);
    let twice = remove_line_numbers(&once);
    assert_eq!(once, twice);
    assert!(once
        .instructions
        .iter()
        .all(|insn| !matches!(insn, Instruction::LineNumber { .. })));
    assert_eq!(once.instructions.real_len(), method.instructions.real_len());
    assert_eq!(once.try_catch_blocks.len(), 1);
}

#[test]
fn header_copies() {
    let mut method = finally_method();
    method.exceptions.push(String::from("java/io/IOException"));
    method.signature = Some(String::from("(I)I"));
    let header = new_method_node(&method);
    assert_eq!(header.access_flags, method.access_flags);
    assert_eq!(header.exceptions, method.exceptions);
    assert_eq!(header.signature, method.signature);
    assert!(header.instructions.is_empty());
    assert!(header.try_catch_blocks.is_empty());
}
