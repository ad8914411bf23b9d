use crate::jvm::model::{MethodInsn, MethodNode};
use crate::jvm::opcodes::INVOKESTATIC;
use crate::jvm::{
    internal_to_class_name, MethodDescriptor, Name, ParseDescriptor, RenderClassName,
    UnqualifiedName,
};

/// Java-like declaration of a method of class `owner` (an internal name)
///
/// For example `public static final void foo(java.lang.String, int)` or, for a constructor,
/// `public p.Q(int) throws java.io.IOException`.
pub fn method_declaration(owner: &str, method: &MethodNode) -> String {
    let mut declaration = String::new();
    for modifier in method.access_flags.modifiers() {
        declaration.push_str(modifier);
        declaration.push(' ');
    }
    signature_to(&mut declaration, owner, &method.name, &method.descriptor);

    if !method.exceptions.is_empty() {
        declaration.push_str(" throws");
        let exceptions: Vec<String> = method
            .exceptions
            .iter()
            .map(|exception| format!(" {}", internal_to_class_name(exception)))
            .collect();
        declaration.push_str(&exceptions.join(","));
    }
    declaration
}

/// Declaration of the method called by an invocation
///
/// Only `static` is inferred (from `invokestatic`), since nothing else about the callee is known.
pub fn invocation_declaration(invocation: &MethodInsn) -> String {
    let mut declaration = String::new();
    if invocation.opcode == INVOKESTATIC {
        declaration.push_str("static ");
    }
    signature_to(
        &mut declaration,
        &invocation.owner,
        &invocation.name,
        &invocation.descriptor,
    );
    declaration
}

/// Write the return type, name and parameters (constructors are named after their class)
fn signature_to(write_to: &mut String, owner: &str, name: &str, descriptor: &str) {
    let parsed = match MethodDescriptor::parse(descriptor) {
        Ok(parsed) => parsed,
        Err(err) => {
            log::warn!("Cannot render descriptor '{}' of {}: {}", descriptor, name, err);
            if name == UnqualifiedName::INIT.as_str() {
                write_to.push_str(&internal_to_class_name(owner));
            } else {
                write_to.push_str(name);
            }
            write_to.push_str(descriptor);
            return;
        }
    };

    if name == UnqualifiedName::INIT.as_str() {
        write_to.push_str(&internal_to_class_name(owner));
    } else {
        write_to.push_str(&parsed.return_class_name());
        write_to.push(' ');
        write_to.push_str(name);
    }

    write_to.push('(');
    for (index, parameter) in parsed.parameters.iter().enumerate() {
        if index > 0 {
            write_to.push_str(", ");
        }
        parameter.class_name_to(write_to);
    }
    write_to.push(')');
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::opcodes::{INVOKESPECIAL, INVOKEVIRTUAL};
    use crate::jvm::MethodAccessFlags;

    fn invocation(opcode: u8, owner: &str, name: &str, descriptor: &str) -> MethodInsn {
        MethodInsn {
            opcode,
            owner: owner.to_owned(),
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            is_interface: false,
        }
    }

    #[test]
    fn static_final_method() {
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
    fn constructor_with_exceptions() {
        let mut method = MethodNode::new(MethodAccessFlags::PUBLIC, "<init>", "(I)V");
        method.exceptions.push(String::from("java/io/IOException"));
        assert_eq!(
            method_declaration("p/Q", &method),
            "public p.Q(int) throws java.io.IOException"
        );

        method.exceptions.push(String::from("p/Oops"));
        assert_eq!(
            method_declaration("p/Q", &method),
            "public p.Q(int) throws java.io.IOException, p.Oops"
        );
    }

    #[test]
    fn arrays_and_no_modifiers() {
        let method = MethodNode::new(
            MethodAccessFlags::empty(),
            "f",
            "([[J[Lp/R;)[Ljava/lang/Object;",
        );
        assert_eq!(
            method_declaration("p/Q", &method),
            "java.lang.Object[] f(long[][], p.R[])"
        );
    }

    #[test]
    fn invocations() {
        assert_eq!(
            invocation_declaration(&invocation(INVOKESTATIC, "p/Q", "m", "(I)J")),
            "static long m(int)"
        );
        assert_eq!(
            invocation_declaration(&invocation(INVOKESPECIAL, "p/Q", "<init>", "(ZC)V")),
            "p.Q(boolean, char)"
        );
        assert_eq!(
            invocation_declaration(&invocation(INVOKEVIRTUAL, "p/Q", "run", "()V")),
            "void run()"
        );
    }

    #[test]
    fn unparseable_descriptor() {
        let method = MethodNode::new(MethodAccessFlags::PUBLIC, "f", "(X)V");
        assert_eq!(method_declaration("p/Q", &method), "public f(X)V");
    }
}
