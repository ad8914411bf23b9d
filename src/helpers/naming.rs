use crate::jvm::model::{LocalVariable, MethodNode};
use crate::jvm::{MethodDescriptor, ParseDescriptor, RenderClassName};

/// Best guess at the source names of the parameters of a method
///
/// When the local variable table has enough entries, its entries are taken in slot order (after
/// the receiver for instance methods). Otherwise each parameter is named after its type, as in
/// `String` or `int[]`.
///
/// Entries are matched to parameters by position only, so `long` and `double` parameters (which
/// take two slots) can shift the names of the parameters after them.
pub fn parameter_names(method: &MethodNode) -> Vec<String> {
    let descriptor = match method.parse_descriptor() {
        Ok(descriptor) => descriptor,
        Err(err) => {
            log::warn!("Cannot name parameters of {}: {}", method.display_name(), err);
            return vec![];
        }
    };
    let argument_count = descriptor.parameters.len();
    if argument_count == 0 {
        return vec![];
    }
    let first = if method.is_static() { 0 } else { 1 };

    match &method.local_variables {
        Some(locals) if locals.len() > first && argument_count + first <= locals.len() => {
            let mut sorted: Vec<&LocalVariable> = locals.iter().collect();
            sorted.sort_by_key(|local| local.index);
            sorted[first..first + argument_count]
                .iter()
                .map(|local| local.name.clone())
                .collect()
        }
        _ => descriptor
            .parameters
            .iter()
            .map(|parameter| {
                let class_name = parameter.class_name();
                match class_name.rfind('.') {
                    Some(dot) => class_name[dot + 1..].to_owned(),
                    None => class_name,
                }
            })
            .collect(),
    }
}

/// Identifier for a method which is distinct across overloads
///
/// Made of the class, the method name, and the parameter types, each with the characters
/// `[]<>;/.` replaced by `_`. This is a hint for naming generated code: it is not guaranteed to be
/// collision-free.
pub fn unique_name_for(class: &str, method_name: &str, method_descriptor: &str) -> String {
    let mut name = clean_class_name(class);
    name.push('_');
    name.push_str(method_name);
    match MethodDescriptor::parse(method_descriptor) {
        Ok(descriptor) => {
            for parameter in &descriptor.parameters {
                name.push('_');
                name.push_str(&clean_class_name(&parameter.class_name()));
            }
        }
        Err(err) => log::warn!(
            "Cannot name parameters of {}{}: {}",
            method_name,
            method_descriptor,
            err
        ),
    }
    name
}

fn clean_class_name(class_name: &str) -> String {
    class_name
        .chars()
        .map(|c| match c {
            '[' | ']' | '<' | '>' | ';' | '/' | '.' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::model::{MethodBuilder, MethodNode};
    use crate::jvm::opcodes::*;
    use crate::jvm::MethodAccessFlags;

    fn add(with_locals: bool) -> MethodNode {
        let mut method = MethodBuilder::new(MethodAccessFlags::PUBLIC, "add", "(II)I");
        let start = method.label();
        let end = method.label();
        method.place(start);
        method.var_insn(ILOAD, 1);
        method.var_insn(ILOAD, 2);
        method.insn(IADD);
        method.insn(IRETURN);
        method.place(end);
        if with_locals {
            // Deliberately out of slot order
            method.local_variable("b", "I", None, start, end, 2);
            method.local_variable("this", "Lp/Q;", None, start, end, 0);
            method.local_variable("a", "I", None, start, end, 1);
        }
        method.build()
    }

    #[test]
    fn names_from_local_variables() {
        let method = add(true);
        assert_eq!(parameter_names(&method), vec!["a", "b"]);

        // The table itself is left in its original order
        let locals = method.local_variables.as_ref().unwrap();
        assert_eq!(locals[0].name, "b");
    }

    #[test]
    fn names_from_types() {
        assert_eq!(parameter_names(&add(false)), vec!["int", "int"]);

        let method = MethodNode::new(
            MethodAccessFlags::STATIC,
            "f",
            "(Ljava/lang/String;[Lp/R;J)V",
        );
        assert_eq!(parameter_names(&method), vec!["String", "R[]", "long"]);
    }

    #[test]
    fn too_few_local_variables() {
        let mut method = add(true);
        if let Some(locals) = method.local_variables.as_mut() {
            locals.truncate(2);
        }
        assert_eq!(parameter_names(&method), vec!["int", "int"]);
    }

    #[test]
    fn no_parameters() {
        let method = MethodNode::new(MethodAccessFlags::PUBLIC, "f", "()V");
        assert!(parameter_names(&method).is_empty());
    }

    #[test]
    fn unique_names() {
        assert_eq!(unique_name_for("p/Q", "m", "(Lp/R;[I)V"), "p_Q_m_p_R_int__");
        assert_eq!(unique_name_for("p/Q", "m", "()V"), "p_Q_m");
        assert_eq!(
            unique_name_for("Outer$Inner", "<init>", "(Ljava/util/List;)V"),
            "Outer$Inner_<init>_java_util_List"
        );
    }
}
