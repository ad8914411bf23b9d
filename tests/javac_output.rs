//! Class files produced by `javac` (from `fixtures/Catches.java`, compiled for Java 8 and Java 17)

use bytekit::helpers::{class_node_from_bytes, class_node_to_bytes};
use bytekit::jvm::model::{FrameType, Instruction, MethodNode};
use bytekit::jvm::verifier::VerificationType;
use bytekit::jvm::{read_class, ReaderFlags};

const CATCHES_8: &[u8] = include_bytes!("fixtures/Catches8.class");
const CATCHES_17: &[u8] = include_bytes!("fixtures/Catches17.class");

/// Stack of the frame at the entry of each exception handler, in handler order
fn handler_stacks(method: &MethodNode) -> Vec<Vec<FrameType>> {
    method
        .try_catch_blocks
        .iter()
        .map(|block| {
            let position = method.instructions.label_position(block.handler).unwrap();
            method.instructions.as_slice()[position..]
                .iter()
                .take_while(|insn| insn.is_pseudo())
                .find_map(|insn| match insn {
                    Instruction::Frame(frame) => Some(frame.stack.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| panic!("no frame at a handler of {}", method.name))
        })
        .collect()
}

fn object(class: &str) -> FrameType {
    VerificationType::Object(String::from(class))
}

fn rewrite(bytes: &[u8]) -> Vec<u8> {
    let class = class_node_from_bytes(bytes).unwrap();
    class_node_to_bytes(&class).unwrap()
}

#[test]
fn handler_frames_match_javac() {
    for bytes in [CATCHES_8, CATCHES_17] {
        let original = read_class(bytes, ReaderFlags::empty()).unwrap();
        let rewritten = read_class(&rewrite(bytes), ReaderFlags::empty()).unwrap();
        assert_eq!(original.methods.len(), rewritten.methods.len());

        for (before, after) in original.methods.iter().zip(&rewritten.methods) {
            assert_eq!(before.name, after.name);
            assert_eq!(
                handler_stacks(before),
                handler_stacks(after),
                "handler frames of {}",
                before.name
            );
        }
    }
}

#[test]
fn multi_catch_handlers_get_the_common_exception_type() {
    let rewritten = read_class(&rewrite(CATCHES_17), ReaderFlags::empty()).unwrap();

    let tick = rewritten.methods.iter().find(|m| m.name == "tick").unwrap();
    assert_eq!(
        handler_stacks(tick),
        vec![
            vec![object("java/lang/RuntimeException")],
            vec![object("java/lang/RuntimeException")],
        ]
    );

    // `catch (IOException | ArithmeticException e)` followed by a `finally`
    let read = rewritten.methods.iter().find(|m| m.name == "read").unwrap();
    let stacks = handler_stacks(read);
    assert!(stacks.contains(&vec![object("java/lang/Exception")]));
    assert!(stacks.contains(&vec![object("java/lang/Throwable")]));
    assert!(!stacks.contains(&vec![object("java/lang/Object")]));
}

#[test]
fn rewritten_code_is_unchanged() {
    for bytes in [CATCHES_8, CATCHES_17] {
        let original = read_class(bytes, ReaderFlags::SKIP_FRAMES).unwrap();
        let rewritten = read_class(&rewrite(bytes), ReaderFlags::SKIP_FRAMES).unwrap();
        assert_eq!(rewritten.name, "p/Catches");
        assert_eq!(rewritten.attributes, original.attributes);
        assert_eq!(rewritten.inner_classes, original.inner_classes);

        for (before, after) in original.methods.iter().zip(&rewritten.methods) {
            let opcodes = |method: &MethodNode| -> Vec<u8> {
                method.instructions.iter().filter_map(Instruction::opcode).collect()
            };
            assert_eq!(opcodes(before), opcodes(after), "code of {}", before.name);
            assert_eq!(before.try_catch_blocks.len(), after.try_catch_blocks.len());
            assert_eq!(
                (before.max_stack, before.max_locals),
                (after.max_stack, after.max_locals),
                "maximums of {}",
                before.name
            );
        }
    }
}

#[test]
fn rewriting_twice_is_stable() {
    for bytes in [CATCHES_8, CATCHES_17] {
        let once = rewrite(bytes);
        assert_eq!(rewrite(&once), once);
    }
}
