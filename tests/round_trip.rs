use bytekit::helpers::{class_node_from_bytes, class_node_to_bytes, transcribe_bytes};
use bytekit::jvm::class_file::Version;
use bytekit::jvm::model::{
    ClassBuilder, ClassNode, ConstantValue, FieldNode, FrameNode, Instruction, MethodBuilder,
};
use bytekit::jvm::opcodes::*;
use bytekit::jvm::verifier::VerificationType;
use bytekit::jvm::{
    read_class, read_class_header, write_class, ClassAccessFlags, Error, FieldAccessFlags,
    InnerClassAccessFlags, Malformed, MethodAccessFlags, ReaderFlags, WriterFlags,
};

/// Class with a bit of everything the tree models
fn sample_class() -> ClassNode {
    let mut class = ClassBuilder::new(
        Version::JAVA8,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        "p/Sample",
        Some("java/lang/Object"),
    );
    class.interface("java/lang/Runnable");
    class.signature("Ljava/lang/Object;Ljava/lang/Runnable;");
    class.source_file("Sample.java");
    class.inner_class(
        "p/Sample$Inner",
        Some("p/Sample"),
        Some("Inner"),
        InnerClassAccessFlags::PUBLIC | InnerClassAccessFlags::STATIC,
    );
    class.attribute("Deprecated", &[]);

    let mut answer = FieldNode::new(
        FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
        "ANSWER",
        "I",
    );
    answer.value = Some(ConstantValue::Integer(42));
    class.field(answer);
    class.field(FieldNode::new(FieldAccessFlags::PRIVATE, "count", "J"));

    let mut init = MethodBuilder::new(MethodAccessFlags::PUBLIC, "<init>", "()V");
    init.var_insn(ALOAD, 0);
    init.method_insn(INVOKESPECIAL, "java/lang/Object", "<init>", "()V", false);
    init.insn(RETURN);
    class.method(init.build());

    // static int max(int a, int b) { return a > b ? a : b; }
    let mut max = MethodBuilder::new(MethodAccessFlags::STATIC, "max", "(II)I");
    let smaller = max.label();
    max.var_insn(ILOAD, 0);
    max.var_insn(ILOAD, 1);
    max.jump(IF_ICMPLE, smaller);
    max.var_insn(ILOAD, 0);
    max.insn(IRETURN);
    max.place(smaller);
    max.var_insn(ILOAD, 1);
    max.insn(IRETURN);
    class.method(max.build());

    // public void run() { try { count++; } catch (RuntimeException e) { count = 0; } }
    let mut run = MethodBuilder::new(MethodAccessFlags::PUBLIC, "run", "()V");
    let start = run.label();
    let end = run.label();
    let handler = run.label();
    let done = run.label();
    run.place(start);
    run.var_insn(ALOAD, 0);
    run.insn(DUP);
    run.field_insn(GETFIELD, "p/Sample", "count", "J");
    run.insn(LCONST_1);
    run.insn(LADD);
    run.field_insn(PUTFIELD, "p/Sample", "count", "J");
    run.place(end);
    run.jump(GOTO, done);
    run.place(handler);
    run.var_insn(ASTORE, 1);
    run.var_insn(ALOAD, 0);
    run.insn(LCONST_0);
    run.field_insn(PUTFIELD, "p/Sample", "count", "J");
    run.place(done);
    run.insn(RETURN);
    run.try_catch(start, end, handler, Some("java/lang/RuntimeException"));
    class.method(run.build());

    // static String describe(int n) {
    //   switch (n) { case 1: return "one"; default: return "many"; }
    // }
    let mut describe = MethodBuilder::new(
        MethodAccessFlags::STATIC,
        "describe",
        "(I)Ljava/lang/String;",
    );
    let one = describe.label();
    let many = describe.label();
    describe.var_insn(ILOAD, 0);
    describe.lookup_switch(many, &[(1, one)]);
    describe.place(one);
    describe.ldc(ConstantValue::String(String::from("one")));
    describe.insn(ARETURN);
    describe.place(many);
    describe.ldc(ConstantValue::String(String::from("many")));
    describe.insn(ARETURN);
    class.method(describe.build());

    let mut abstract_like = MethodBuilder::new(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::NATIVE,
        "poke",
        "(D)V",
    );
    abstract_like.exception("java/io/IOException");
    class.method(abstract_like.build());

    class.build()
}

fn frames(instructions: &[Instruction]) -> Vec<&FrameNode> {
    instructions
        .iter()
        .filter_map(|insn| match insn {
            Instruction::Frame(frame) => Some(frame),
            _ => None,
        })
        .collect()
}

fn real_opcodes(instructions: &[Instruction]) -> Vec<u8> {
    instructions.iter().filter_map(Instruction::opcode).collect()
}

#[test]
fn round_trip_preserves_structure() {
    let class = sample_class();
    let bytes = class_node_to_bytes(&class).unwrap();
    let reread = class_node_from_bytes(&bytes).unwrap();

    assert_eq!(reread.name, "p/Sample");
    assert_eq!(reread.super_name.as_deref(), Some("java/lang/Object"));
    assert_eq!(reread.interfaces, class.interfaces);
    assert_eq!(reread.signature, class.signature);
    assert_eq!(reread.source_file, class.source_file);
    assert_eq!(reread.inner_classes, class.inner_classes);
    assert_eq!(reread.attributes, class.attributes);
    assert_eq!(reread.fields, class.fields);
    assert_eq!(reread.methods.len(), class.methods.len());

    for (original, reread) in class.methods.iter().zip(&reread.methods) {
        assert_eq!(original.name, reread.name);
        assert_eq!(original.access_flags, reread.access_flags);
        assert_eq!(original.exceptions, reread.exceptions);
        assert_eq!(
            real_opcodes(original.instructions.as_slice()),
            real_opcodes(reread.instructions.as_slice()),
            "instructions of {}",
            original.name
        );
        assert_eq!(original.try_catch_blocks.len(), reread.try_catch_blocks.len());
    }
}

#[test]
fn maximums_are_computed() {
    let bytes = class_node_to_bytes(&sample_class()).unwrap();
    let class = read_class(&bytes, ReaderFlags::SKIP_FRAMES).unwrap();
    let max = class.methods.iter().find(|m| m.name == "max").unwrap();
    assert_eq!((max.max_stack, max.max_locals), (2, 2));
    let run = class.methods.iter().find(|m| m.name == "run").unwrap();
    assert_eq!((run.max_stack, run.max_locals), (5, 2));
    let poke = class.methods.iter().find(|m| m.name == "poke").unwrap();
    assert!(poke.instructions.is_empty());
}

#[test]
fn frames_at_branch_targets() {
    let bytes = class_node_to_bytes(&sample_class()).unwrap();
    let class = read_class(&bytes, ReaderFlags::empty()).unwrap();

    let max = class.methods.iter().find(|m| m.name == "max").unwrap();
    let max_frames = frames(max.instructions.as_slice());
    assert_eq!(max_frames.len(), 1);
    assert_eq!(
        max_frames[0].locals,
        vec![VerificationType::Integer, VerificationType::Integer]
    );
    assert!(max_frames[0].stack.is_empty());

    // Handler entry and the join after it
    let run = class.methods.iter().find(|m| m.name == "run").unwrap();
    let run_frames = frames(run.instructions.as_slice());
    assert_eq!(run_frames.len(), 2);
    assert_eq!(
        run_frames[0].stack,
        vec![VerificationType::Object(String::from(
            "java/lang/RuntimeException"
        ))]
    );
    assert!(run_frames[1].stack.is_empty());

    let describe = class.methods.iter().find(|m| m.name == "describe").unwrap();
    assert_eq!(frames(describe.instructions.as_slice()).len(), 2);

    let init = class.methods.iter().find(|m| m.name == "<init>").unwrap();
    assert!(frames(init.instructions.as_slice()).is_empty());
}

#[test]
fn rewriting_is_stable() {
    let bytes = class_node_to_bytes(&sample_class()).unwrap();
    let again = class_node_to_bytes(&class_node_from_bytes(&bytes).unwrap()).unwrap();
    assert_eq!(bytes, again);
}

#[test]
fn header_only() {
    let bytes = class_node_to_bytes(&sample_class()).unwrap();
    let header = read_class_header(&bytes).unwrap();
    assert_eq!(header.name, "p/Sample");
    assert_eq!(header.version, Version::JAVA8);
    assert_eq!(header.interfaces, vec![String::from("java/lang/Runnable")]);
}

#[test]
fn truncated_class_files_are_malformed() {
    let bytes = class_node_to_bytes(&sample_class()).unwrap();
    for cut in [0, 4, 9, bytes.len() / 2, bytes.len() - 1] {
        match read_class(&bytes[..cut], ReaderFlags::empty()) {
            Err(Error::MalformedClassFile(_)) => (),
            other => panic!(
                "cut at {} should be malformed, got {:?}",
                cut,
                other.map(|class| class.name)
            ),
        }
    }
}

#[test]
fn bad_magic_is_malformed() {
    let mut bytes = class_node_to_bytes(&sample_class()).unwrap();
    bytes[0] = 0xBA;
    assert!(matches!(
        read_class(&bytes, ReaderFlags::empty()),
        Err(Error::MalformedClassFile(Malformed::BadMagic(_)))
    ));
}

#[test]
fn newer_versions_are_unsupported() {
    let mut bytes = class_node_to_bytes(&sample_class()).unwrap();
    // Major version lives at bytes 6 and 7
    bytes[6] = 0x00;
    bytes[7] = 0x7F;
    assert!(matches!(
        read_class(&bytes, ReaderFlags::empty()),
        Err(Error::UnsupportedFeature(_))
    ));
}

#[test]
fn transcripts_are_deterministic() {
    let bytes = write_class(&sample_class(), WriterFlags::COMPUTE_FRAMES).unwrap();
    let first = transcribe_bytes(&bytes, true).unwrap();
    let second = transcribe_bytes(&bytes, true).unwrap();
    assert_eq!(first, second);
    assert!(first.contains(
        "let mut method = MethodBuilder::new(MethodAccessFlags::STATIC, \"max\", \"(II)I\");"
    ));
    assert!(first.contains("method.lookup_switch("));
    assert!(first.contains("method.frame("));

    let without_debug = transcribe_bytes(&bytes, false).unwrap();
    assert!(!without_debug.contains("line_number"));
}
