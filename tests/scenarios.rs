use bytekit::helpers::*;
use bytekit::jvm::class_file::Version;
use bytekit::jvm::model::{ClassBuilder, ClassNode, Instruction, MethodBuilder, MethodNode};
use bytekit::jvm::opcodes::*;
use bytekit::jvm::{
    read_class, write_class, ClassAccessFlags, MethodAccessFlags, ReaderFlags, WriterFlags,
};

/// `public int add(int a, int b) { return a + b; }` in class `p/Q`
fn adder_class_bytes() -> Vec<u8> {
    let mut class = ClassBuilder::new(
        Version::JAVA8,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        "p/Q",
        Some("java/lang/Object"),
    );
    class.source_file("Q.java");

    let mut add = MethodBuilder::new(MethodAccessFlags::PUBLIC, "add", "(II)I");
    let start = add.label();
    let end = add.label();
    add.place(start);
    add.line_number(3, start);
    add.var_insn(ILOAD, 1);
    add.var_insn(ILOAD, 2);
    add.insn(IADD);
    add.insn(IRETURN);
    add.place(end);
    add.local_variable("this", "Lp/Q;", None, start, end, 0);
    add.local_variable("a", "I", None, start, end, 1);
    add.local_variable("b", "I", None, start, end, 2);
    class.method(add.build());

    write_class(&class.build(), WriterFlags::COMPUTE_MAXS).unwrap()
}

#[test]
fn parameter_names_with_and_without_debug_information() {
    let bytes = adder_class_bytes();

    let class = read_class(&bytes, ReaderFlags::empty()).unwrap();
    let add = find_method(&class.methods, "add", "(II)I").unwrap();
    assert_eq!(parameter_names(add), vec!["a", "b"]);

    let stripped = read_class(&bytes, ReaderFlags::SKIP_DEBUG).unwrap();
    let add = find_method(&stripped.methods, "add", "(II)I").unwrap();
    assert!(add.local_variables.is_none());
    assert_eq!(parameter_names(add), vec!["int", "int"]);
}

#[test]
fn declaration_of_static_final_method() {
    let method = MethodNode::new(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC | MethodAccessFlags::FINAL,
        "foo",
        "(Ljava/lang/String;I)V",
    );
    assert_eq!(
        method_declaration("p/Q", &method),
        "public static final void foo(java.lang.String, int)"
    );
}

#[test]
fn declaration_of_constructor() {
    let mut method = MethodBuilder::new(MethodAccessFlags::PUBLIC, "<init>", "(I)V");
    method.exception("java/io/IOException");
    assert_eq!(
        method_declaration("p/Q", &method.build()),
        "public p.Q(int) throws java.io.IOException"
    );
}

#[test]
fn chained_constructor_call() {
    let mut method = MethodBuilder::new(MethodAccessFlags::PUBLIC, "<init>", "()V");
    method.type_insn(NEW, "p/Q");
    method.insn(DUP);
    method.method_insn(INVOKESPECIAL, "p/Q", "<init>", "()V", false);
    method.var_insn(ASTORE, 1);
    method.var_insn(ALOAD, 0);
    method.method_insn(INVOKESPECIAL, "p/R", "<init>", "()V", false);
    method.insn(RETURN);
    let method = method.build();

    let body = find_init_constructor_instruction(&method).unwrap();
    assert_eq!(body, 6);
    assert_eq!(method.instructions.get(body), Some(&Instruction::Plain(RETURN)));
    assert_eq!(
        method.instructions.get(body - 1),
        Some(&Instruction::Method(bytekit::jvm::model::MethodInsn {
            opcode: INVOKESPECIAL,
            owner: String::from("p/R"),
            name: String::from("<init>"),
            descriptor: String::from("()V"),
            is_interface: false,
        }))
    );
}

#[test]
fn chained_constructor_call_comes_after_arguments() {
    // `super(new p.Q())`: the argument's construction is nested inside the chained call
    let mut method = MethodBuilder::new(MethodAccessFlags::PUBLIC, "<init>", "()V");
    method.var_insn(ALOAD, 0);
    method.type_insn(NEW, "p/Q");
    method.insn(DUP);
    method.method_insn(INVOKESPECIAL, "p/Q", "<init>", "()V", false);
    method.method_insn(INVOKESPECIAL, "p/R", "<init>", "(Lp/Q;)V", false);
    method.var_insn(ALOAD, 0);
    method.insn(RETURN);
    let method = method.build();

    let body = find_init_constructor_instruction(&method).unwrap();
    assert_eq!(
        method.instructions.get(body),
        Some(&Instruction::Var {
            opcode: ALOAD,
            var: 0
        })
    );
    assert_eq!(body, 5);
}

#[test]
fn unique_name_sanitizes_arrays() {
    assert_eq!(unique_name_for("p/Q", "m", "(Lp/R;[I)V"), "p_Q_m_p_R_int__");
}

#[test]
fn unique_name_uses_only_identifier_characters() {
    let name = unique_name_for("a/b/C$D", "run", "([[Ljava/lang/String;JLa/b/E;)V");
    assert!(name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$'));
}

#[test]
fn replacing_duplicated_methods() {
    let mut class = ClassNode::new(Version::JAVA8, ClassAccessFlags::PUBLIC, "p/Q");
    let mut first = MethodNode::new(MethodAccessFlags::PUBLIC, "m", "()V");
    first.max_stack = 1;
    let mut second = MethodNode::new(MethodAccessFlags::PUBLIC, "m", "()V");
    second.max_stack = 2;
    let other = MethodNode::new(MethodAccessFlags::PUBLIC, "n", "()V");
    class.methods = vec![first, other, second];

    let mut replacement = MethodNode::new(MethodAccessFlags::PRIVATE, "m", "()V");
    replacement.max_stack = 7;
    replace_method(&mut class, replacement.clone());

    assert_eq!(class.methods[0], replacement);
    assert_eq!(class.methods[1].name, "n");
    assert_eq!(class.methods[2], replacement);
    assert_eq!(find_method(&class.methods, "m", "()V"), Some(&replacement));
}
