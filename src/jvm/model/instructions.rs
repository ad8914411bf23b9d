use super::{Label, LabelGenerator};
use crate::jvm::class_file::HandleKind;
use crate::jvm::opcodes;
use crate::jvm::verifier::VerificationType;
use std::slice;

/// Reference to a field or method, as it appears in a method handle constant
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    pub kind: HandleKind,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub is_interface: bool,
}

/// Constant which can be loaded with `ldc`, used as a bootstrap method argument, or used as the
/// initial value of a field
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantValue {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),

    /// Internal name of a class, or the descriptor of an array type
    Class(String),

    /// Method descriptor
    MethodType(String),
    MethodHandle(Handle),
}

impl ConstantValue {
    /// Does this constant take two stack slots (and need `ldc2_w`)?
    pub fn is_wide(&self) -> bool {
        matches!(self, ConstantValue::Long(_) | ConstantValue::Double(_))
    }
}

/// Field access (`getstatic`, `putstatic`, `getfield`, `putfield`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInsn {
    pub opcode: u8,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

/// Method invocation (`invokevirtual`, `invokespecial`, `invokestatic`, `invokeinterface`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodInsn {
    pub opcode: u8,
    pub owner: String,
    pub name: String,
    pub descriptor: String,

    /// Is the owner an interface?
    pub is_interface: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InvokeDynamicInsn {
    pub name: String,
    pub descriptor: String,
    pub bootstrap_method: Handle,
    pub bootstrap_arguments: Vec<ConstantValue>,
}

/// Verification type in a frame pseudo-instruction
///
/// Object types are internal names (or array descriptors) and uninitialized types point to the
/// label right before their `new` instruction.
pub type FrameType = VerificationType<String, Label>;

/// Expanded stack map frame
///
/// Locals and stack are listed in the same form as in a class file: `long` and `double` take up
/// one entry each.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FrameNode {
    pub locals: Vec<FrameType>,
    pub stack: Vec<FrameType>,
}

/// Element of the instruction stream of a method
///
/// Besides the real instructions, the stream contains pseudo-instructions: labels, line numbers,
/// and stack map frames. Opcodes are always the canonical ones (eg. `iload` and never `iload_0`,
/// `goto` and never `goto_w`).
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// Instruction without operands (eg. `iadd`, `return`)
    Plain(u8),

    /// `bipush`, `sipush`, and `newarray` (where the operand is the array type code)
    Int { opcode: u8, operand: i32 },

    /// Loads and stores of locals, and `ret`
    Var { opcode: u8, var: u16 },

    /// `new`, `anewarray`, `checkcast`, and `instanceof`
    Type { opcode: u8, class: String },
    Field(FieldInsn),
    Method(MethodInsn),
    InvokeDynamic(InvokeDynamicInsn),

    /// Conditional jumps, `goto`, and `jsr`
    Jump { opcode: u8, target: Label },
    Label(Label),
    Ldc(ConstantValue),
    Iinc { var: u16, increment: i16 },
    TableSwitch {
        low: i32,
        high: i32,
        default: Label,
        targets: Vec<Label>,
    },
    LookupSwitch {
        default: Label,
        pairs: Vec<(i32, Label)>,
    },
    MultiANewArray { descriptor: String, dimensions: u8 },

    /// Line number for the code starting at the label
    LineNumber { line: u16, start: Label },
    Frame(FrameNode),
}

impl Instruction {
    /// Opcode of the instruction (`None` for pseudo-instructions)
    pub fn opcode(&self) -> Option<u8> {
        Some(match self {
            Instruction::Plain(opcode)
            | Instruction::Int { opcode, .. }
            | Instruction::Var { opcode, .. }
            | Instruction::Type { opcode, .. }
            | Instruction::Jump { opcode, .. } => *opcode,
            Instruction::Field(insn) => insn.opcode,
            Instruction::Method(insn) => insn.opcode,
            Instruction::InvokeDynamic(_) => opcodes::INVOKEDYNAMIC,
            Instruction::Ldc(_) => opcodes::LDC,
            Instruction::Iinc { .. } => opcodes::IINC,
            Instruction::TableSwitch { .. } => opcodes::TABLESWITCH,
            Instruction::LookupSwitch { .. } => opcodes::LOOKUPSWITCH,
            Instruction::MultiANewArray { .. } => opcodes::MULTIANEWARRAY,
            Instruction::Label(_) | Instruction::LineNumber { .. } | Instruction::Frame(_) => {
                return None
            }
        })
    }

    /// Is this a label, line number, or frame?
    pub fn is_pseudo(&self) -> bool {
        self.opcode().is_none()
    }

    /// Labels the instruction refers to (not counting the label a `Label` places)
    pub fn referenced_labels(&self) -> Vec<Label> {
        match self {
            Instruction::Jump { target, .. } => vec![*target],
            Instruction::TableSwitch {
                default, targets, ..
            } => {
                let mut labels = vec![*default];
                labels.extend(targets.iter().copied());
                labels
            }
            Instruction::LookupSwitch { default, pairs } => {
                let mut labels = vec![*default];
                labels.extend(pairs.iter().map(|(_, label)| *label));
                labels
            }
            Instruction::LineNumber { start, .. } => vec![*start],
            Instruction::Frame(frame) => frame
                .locals
                .iter()
                .chain(frame.stack.iter())
                .filter_map(|typ| match typ {
                    VerificationType::Uninitialized(label) => Some(*label),
                    _ => None,
                })
                .collect(),
            _ => vec![],
        }
    }

    /// Copy of the instruction with every label (including a placed one) mapped through `f`
    pub fn map_labels(&self, mut f: impl FnMut(Label) -> Label) -> Instruction {
        match self {
            Instruction::Jump { opcode, target } => Instruction::Jump {
                opcode: *opcode,
                target: f(*target),
            },
            Instruction::Label(label) => Instruction::Label(f(*label)),
            Instruction::TableSwitch {
                low,
                high,
                default,
                targets,
            } => Instruction::TableSwitch {
                low: *low,
                high: *high,
                default: f(*default),
                targets: targets.iter().map(|label| f(*label)).collect(),
            },
            Instruction::LookupSwitch { default, pairs } => Instruction::LookupSwitch {
                default: f(*default),
                pairs: pairs.iter().map(|(key, label)| (*key, f(*label))).collect(),
            },
            Instruction::LineNumber { line, start } => Instruction::LineNumber {
                line: *line,
                start: f(*start),
            },
            Instruction::Frame(frame) => {
                let mut map_type = |typ: &FrameType| typ.map(Clone::clone, |label| f(*label));
                Instruction::Frame(FrameNode {
                    locals: frame.locals.iter().map(&mut map_type).collect(),
                    stack: frame.stack.iter().map(&mut map_type).collect(),
                })
            }
            other => other.clone(),
        }
    }
}

/// Instruction stream of a method
///
/// The stream is an owned sequence addressed by position: stepping forwards and backwards is by
/// index, and labels are resolved to positions by searching for the `Label` pseudo-instruction.
/// The list also owns the generator for its labels, so fresh labels never collide with the ones
/// already in use.
#[derive(Clone, Debug, Default)]
pub struct InsnList {
    instructions: Vec<Instruction>,
    labels: LabelGenerator,
}

impl InsnList {
    pub fn new() -> InsnList {
        InsnList::default()
    }

    /// Generate a label that is fresh within this list
    ///
    /// The label still needs to be placed with [`Instruction::Label`].
    pub fn new_label(&mut self) -> Label {
        self.labels.fresh_label()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Insert an instruction before the one at `index`
    pub fn insert(&mut self, index: usize, instruction: Instruction) {
        self.instructions.insert(index, instruction);
    }

    pub fn remove(&mut self, index: usize) -> Instruction {
        self.instructions.remove(index)
    }

    /// Keep only the instructions satisfying the predicate
    pub fn retain(&mut self, keep: impl FnMut(&Instruction) -> bool) {
        self.instructions.retain(keep);
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Instruction> {
        self.instructions.get_mut(index)
    }

    pub fn first(&self) -> Option<&Instruction> {
        self.instructions.first()
    }

    pub fn last(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    /// Index of the element after `index` (if there is one)
    pub fn next(&self, index: usize) -> Option<usize> {
        let next = index + 1;
        if next < self.instructions.len() {
            Some(next)
        } else {
            None
        }
    }

    /// Index of the element before `index` (if there is one)
    pub fn previous(&self, index: usize) -> Option<usize> {
        index.checked_sub(1).filter(|prev| *prev < self.instructions.len())
    }

    /// Position of the `Label` pseudo-instruction placing the label
    pub fn label_position(&self, label: Label) -> Option<usize> {
        self.instructions
            .iter()
            .position(|insn| matches!(insn, Instruction::Label(placed) if *placed == label))
    }

    pub fn as_slice(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Swap in a whole new sequence of instructions, keeping the label generator
    pub fn replace_instructions(&mut self, instructions: Vec<Instruction>) -> Vec<Instruction> {
        std::mem::replace(&mut self.instructions, instructions)
    }

    pub fn iter(&self) -> slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, Instruction> {
        self.instructions.iter_mut()
    }

    /// Number of real (non-pseudo) instructions
    pub fn real_len(&self) -> usize {
        self.instructions.iter().filter(|insn| !insn.is_pseudo()).count()
    }
}

impl<'a> IntoIterator for &'a InsnList {
    type Item = &'a Instruction;
    type IntoIter = slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

impl Extend<Instruction> for InsnList {
    fn extend<T: IntoIterator<Item = Instruction>>(&mut self, iter: T) {
        self.instructions.extend(iter);
    }
}

/// Instruction lists are equal when their instructions are (regardless of how many labels each
/// has generated)
impl PartialEq for InsnList {
    fn eq(&self, other: &Self) -> bool {
        self.instructions == other.instructions
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::opcodes::*;

    #[test]
    fn navigation() {
        let mut insns = InsnList::new();
        let start = insns.new_label();
        insns.push(Instruction::Label(start));
        insns.push(Instruction::Plain(ICONST_0));
        insns.push(Instruction::Jump {
            opcode: IFEQ,
            target: start,
        });
        insns.push(Instruction::Plain(RETURN));

        assert_eq!(insns.len(), 4);
        assert_eq!(insns.real_len(), 3);
        assert_eq!(insns.label_position(start), Some(0));
        assert_eq!(insns.next(2), Some(3));
        assert_eq!(insns.next(3), None);
        assert_eq!(insns.previous(0), None);
        assert_eq!(insns.previous(1), Some(0));
        assert_eq!(insns.get(2).and_then(Instruction::opcode), Some(IFEQ));
        assert_eq!(insns.get(2).map(Instruction::referenced_labels), Some(vec![start]));
        assert!(insns.get(0).map_or(false, Instruction::is_pseudo));

        let fresh = insns.new_label();
        assert_ne!(fresh, start);
        assert_eq!(insns.label_position(fresh), None);
    }

    #[test]
    fn label_mapping() {
        let mut insns = InsnList::new();
        let a = insns.new_label();
        let b = insns.new_label();
        let switch = Instruction::LookupSwitch {
            default: a,
            pairs: vec![(1, b), (5, a)],
        };
        let swapped = switch.map_labels(|l| if l == a { b } else { a });
        assert_eq!(
            swapped,
            Instruction::LookupSwitch {
                default: b,
                pairs: vec![(1, a), (5, b)],
            }
        );

        let frame = Instruction::Frame(FrameNode {
            locals: vec![VerificationType::Integer],
            stack: vec![VerificationType::Uninitialized(a)],
        });
        assert_eq!(frame.referenced_labels(), vec![a]);
    }
}
