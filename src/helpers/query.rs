use crate::jvm::model::{ClassNode, FieldNode, Instruction, MethodInsn, MethodNode};
use crate::jvm::opcodes::{INVOKESPECIAL, INVOKESTATIC, NEW};
use crate::jvm::{Name, UnqualifiedName};

/// Replace every method of the class with the same name and descriptor as `method`
///
/// Positions of the replaced methods are unchanged. If nothing matches, the class is left as is.
pub fn replace_method(class: &mut ClassNode, method: MethodNode) {
    let matching: Vec<usize> = class
        .methods
        .iter()
        .enumerate()
        .filter(|(_, existing)| existing.matches(&method.name, &method.descriptor))
        .map(|(index, _)| index)
        .collect();
    if matching.len() > 1 {
        log::debug!(
            "Replacing {} methods matching {} in {}",
            matching.len(),
            method.display_name(),
            class.name
        );
    }
    for index in matching {
        class.methods[index] = method.clone();
    }
}

pub fn find_first_method<'a>(methods: &'a [MethodNode], name: &str) -> Option<&'a MethodNode> {
    methods.iter().find(|method| method.name == name)
}

pub fn find_methods<'a>(methods: &'a [MethodNode], name: &str) -> Vec<&'a MethodNode> {
    methods.iter().filter(|method| method.name == name).collect()
}

/// First method with exactly this name and descriptor
pub fn find_method<'a>(
    methods: &'a [MethodNode],
    name: &str,
    descriptor: &str,
) -> Option<&'a MethodNode> {
    methods
        .iter()
        .find(|method| method.matches(name, descriptor))
}

/// First field with this name (whatever its descriptor)
pub fn find_field<'a>(fields: &'a [FieldNode], name: &str) -> Option<&'a FieldNode> {
    fields.iter().find(|field| field.name == name)
}

pub fn is_static(method: &MethodNode) -> bool {
    method.is_static()
}

pub fn is_static_invocation(invocation: &MethodInsn) -> bool {
    invocation.opcode == INVOKESTATIC
}

pub fn is_constructor(method: &MethodNode) -> bool {
    method.is_constructor()
}

/// Find where the body of a constructor starts, after its `this(...)` or `super(...)` call
///
/// Every `new` is expected to be matched by a later `invokespecial <init>`. The first
/// `invokespecial <init>` that has no `new` left to match is the chained constructor call, and
/// the index returned is that of the element right after it. Nesting is only tracked by counting,
/// so unbalanced `new`s can make an unrelated call look like the chained one.
pub fn find_init_constructor_instruction(method: &MethodNode) -> Option<usize> {
    let mut nested: isize = 0;
    for (index, insn) in method.instructions.iter().enumerate() {
        match insn {
            Instruction::Type { opcode: NEW, .. } => nested += 1,
            Instruction::Method(invocation)
                if invocation.opcode == INVOKESPECIAL
                    && invocation.name == UnqualifiedName::INIT.as_str() =>
            {
                nested -= 1;
                if nested < 0 {
                    return method.instructions.next(index);
                }
            }
            _ => (),
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::Version;
    use crate::jvm::model::MethodBuilder;
    use crate::jvm::opcodes::*;
    use crate::jvm::{ClassAccessFlags, MethodAccessFlags};

    fn method(name: &str, descriptor: &str, max_stack: u16) -> MethodNode {
        let mut method = MethodNode::new(MethodAccessFlags::PUBLIC, name, descriptor);
        method.max_stack = max_stack;
        method
    }

    #[test]
    fn lookups() {
        let methods = vec![
            method("a", "()V", 1),
            method("b", "()V", 2),
            method("a", "(I)V", 3),
        ];
        assert_eq!(find_first_method(&methods, "a").map(|m| m.max_stack), Some(1));
        assert_eq!(find_methods(&methods, "a").len(), 2);
        assert_eq!(find_method(&methods, "a", "(I)V").map(|m| m.max_stack), Some(3));
        assert!(find_method(&methods, "a", "(J)V").is_none());
        assert!(find_first_method(&methods, "c").is_none());
    }

    #[test]
    fn replacing_keeps_positions() {
        let mut class = ClassNode::new(Version::JAVA8, ClassAccessFlags::PUBLIC, "p/Q");
        class.methods = vec![method("a", "()V", 1), method("b", "()V", 2)];

        replace_method(&mut class, method("a", "()V", 9));
        assert_eq!(class.methods[0].max_stack, 9);
        assert_eq!(class.methods[1].max_stack, 2);

        replace_method(&mut class, method("c", "()V", 7));
        assert_eq!(class.methods.len(), 2);
        assert!(find_method(&class.methods, "c", "()V").is_none());
    }

    #[test]
    fn invocation_predicates() {
        let invocation = MethodInsn {
            opcode: INVOKESTATIC,
            owner: String::from("p/Q"),
            name: String::from("m"),
            descriptor: String::from("()V"),
            is_interface: false,
        };
        assert!(is_static_invocation(&invocation));
        let mut constructor = MethodNode::new(MethodAccessFlags::PUBLIC, "<init>", "()V");
        assert!(is_constructor(&constructor));
        assert!(!is_static(&constructor));
        constructor.access_flags |= MethodAccessFlags::STATIC;
        assert!(is_static(&constructor));
    }

    #[test]
    fn no_chained_constructor() {
        let mut method = MethodBuilder::new(MethodAccessFlags::PUBLIC, "m", "()V");
        method.type_insn(NEW, "p/Q");
        method.insn(DUP);
        method.method_insn(INVOKESPECIAL, "p/Q", "<init>", "()V", false);
        method.insn(POP);
        method.insn(RETURN);
        assert_eq!(find_init_constructor_instruction(&method.build()), None);
    }
}
