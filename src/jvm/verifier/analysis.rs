use super::{Frame, TypeHierarchy, VerificationType};
use crate::jvm::model::{ConstantValue, Instruction, Label};
use crate::jvm::opcodes::{self, *};
use crate::jvm::{
    BaseType, BinaryName, Error, FieldType, Inconsistency, MethodDescriptor, Name,
    ParseDescriptor, RenderDescriptor, UnqualifiedName,
};
use crate::util::Width;
use std::collections::HashMap;

/// Verification type while computing frames
///
/// Uninitialized types are identified by the index of their `new` instruction.
pub type AnalysisType = VerificationType<String, usize>;

/// Types of the locals and stack before an instruction
///
/// Unlike [`Frame`], both vectors are in slot form: a `long` or `double` is followed by a `Top`
/// entry for its second half.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct AnalysisFrame {
    pub locals: Vec<AnalysisType>,
    pub stack: Vec<AnalysisType>,
}

/// Method whose code is being analyzed
pub struct MethodContext<'a> {
    /// Internal name of the class declaring the method
    pub owner: &'a str,
    pub name: &'a str,
    pub descriptor: &'a MethodDescriptor,
    pub is_static: bool,
}

/// Exception handler, with instruction indices instead of labels
///
/// The protected range is `start..end`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerRange {
    pub start: usize,
    pub end: usize,
    pub handler: usize,
    pub catch_type: Option<String>,
}

/// Outcome of the type-level dataflow
#[derive(Debug)]
pub struct TypeAnalysis {
    /// Frame before every instruction (`None` for unreachable instructions)
    pub frames: Vec<Option<AnalysisFrame>>,
    pub max_stack: usize,
    pub max_locals: usize,
}

impl AnalysisFrame {
    /// Compact form of the frame
    pub fn to_frame(&self) -> Frame<String, usize> {
        Frame::from_slots(&self.locals, &self.stack)
    }

    fn push(&mut self, typ: AnalysisType) {
        push_slots(&mut self.stack, typ);
    }

    fn pop(&mut self) -> Result<AnalysisType, String> {
        match self.stack.pop() {
            None => Err(String::from("stack underflow")),
            Some(VerificationType::Top) => match self.stack.pop() {
                Some(typ) if typ.width() == 2 => Ok(typ),
                _ => Err(String::from("stack contains a half of a long or double")),
            },
            Some(typ) => Ok(typ),
        }
    }

    fn pop_expecting(&mut self, expected: AnalysisType) -> Result<(), String> {
        let found = self.pop()?;
        if found == expected {
            Ok(())
        } else {
            Err(format!("expected {:?} on the stack but found {:?}", expected, found))
        }
    }

    fn pop_reference(&mut self) -> Result<AnalysisType, String> {
        let found = self.pop()?;
        if found.is_reference() {
            Ok(found)
        } else {
            Err(format!("expected a reference on the stack but found {:?}", found))
        }
    }

    /// Pop a value of a field type (the class of references is not checked)
    fn pop_field_type(&mut self, field_type: &FieldType) -> Result<(), String> {
        match field_type {
            FieldType::Ref(_) => self.pop_reference().map(|_| ()),
            base => self.pop_expecting(VerificationType::from(base)),
        }
    }

    fn pop_arguments(&mut self, descriptor: &MethodDescriptor) -> Result<(), String> {
        for parameter in descriptor.parameters.iter().rev() {
            self.pop_field_type(parameter)?;
        }
        Ok(())
    }

    fn push_return(&mut self, descriptor: &MethodDescriptor) {
        if let Some(return_type) = &descriptor.return_type {
            self.push(VerificationType::from(return_type));
        }
    }

    /// Copy the top `count` slots of the stack and insert them `depth` slots lower
    fn dup(&mut self, count: usize, depth: usize) -> Result<(), String> {
        let len = self.stack.len();
        if len < count + depth {
            return Err(String::from("stack underflow"));
        }
        self.check_boundary(len - count)?;
        self.check_boundary(len - count - depth)?;
        let copied = self.stack[len - count..].to_vec();
        let at = len - count - depth;
        self.stack.splice(at..at, copied);
        Ok(())
    }

    fn pop_slots(&mut self, count: usize) -> Result<(), String> {
        let len = self.stack.len();
        if len < count {
            return Err(String::from("stack underflow"));
        }
        self.check_boundary(len - count)?;
        self.stack.truncate(len - count);
        Ok(())
    }

    fn swap(&mut self) -> Result<(), String> {
        let len = self.stack.len();
        if len < 2 {
            return Err(String::from("stack underflow"));
        }
        self.check_boundary(len - 1)?;
        self.check_boundary(len - 2)?;
        self.stack.swap(len - 1, len - 2);
        Ok(())
    }

    /// Check that a stack slot starts a value
    fn check_boundary(&self, slot: usize) -> Result<(), String> {
        match self.stack.get(slot) {
            Some(VerificationType::Top) => {
                Err(String::from("operation splits a long or double on the stack"))
            }
            _ => Ok(()),
        }
    }

    fn load(&mut self, opcode: u8, var: u16) -> Result<(), String> {
        let found = self
            .locals
            .get(var as usize)
            .cloned()
            .ok_or_else(|| format!("local {} is not defined", var))?;
        let matches = match opcode {
            ILOAD => found == VerificationType::Integer,
            LLOAD => found == VerificationType::Long,
            FLOAD => found == VerificationType::Float,
            DLOAD => found == VerificationType::Double,
            _ => found.is_reference(),
        };
        if !matches {
            return Err(format!("local {} has type {:?}", var, found));
        }
        self.push(found);
        Ok(())
    }

    fn store(&mut self, var: u16, typ: AnalysisType) {
        let var = var as usize;
        let width = typ.width();
        if self.locals.len() < var + width {
            self.locals.resize(var + width, VerificationType::Top);
        }
        if var > 0 && self.locals[var - 1].width() == 2 {
            self.locals[var - 1] = VerificationType::Top;
        }
        self.locals[var] = typ;
        if width == 2 {
            self.locals[var + 1] = VerificationType::Top;
        }
    }

    /// Replace an uninitialized type everywhere once its constructor has been called
    fn initialize(&mut self, uninitialized: &AnalysisType, initialized: AnalysisType) {
        for typ in self.locals.iter_mut().chain(self.stack.iter_mut()) {
            if typ == uninitialized {
                *typ = initialized.clone();
            }
        }
    }
}

impl MethodContext<'_> {
    fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT.as_str()
    }

    /// Locals on entry (receiver and then parameters), in slot form
    pub fn initial_locals(&self) -> Vec<AnalysisType> {
        let mut locals = vec![];
        if !self.is_static {
            if self.is_constructor() && self.owner != BinaryName::OBJECT.as_str() {
                locals.push(VerificationType::UninitializedThis);
            } else {
                locals.push(VerificationType::Object(self.owner.to_owned()));
            }
        }
        for parameter in &self.descriptor.parameters {
            push_slots(&mut locals, VerificationType::from(parameter));
        }
        locals
    }

    fn error(&self, index: usize, message: String) -> Error {
        Error::InconsistentClassFile(Inconsistency::Verification {
            method: format!("{}.{}{}", self.owner, self.name, self.descriptor.render()),
            index,
            message,
        })
    }
}

fn push_slots(slots: &mut Vec<AnalysisType>, typ: AnalysisType) {
    let width = typ.width();
    slots.push(typ);
    if width == 2 {
        slots.push(VerificationType::Top);
    }
}

/// Instructions waiting to be (re)visited, each at most once in the queue
struct Worklist {
    pending: Vec<usize>,
    queued: Vec<bool>,
}

impl Worklist {
    fn new(len: usize) -> Worklist {
        Worklist {
            pending: vec![],
            queued: vec![false; len],
        }
    }

    fn push(&mut self, index: usize) {
        if !self.queued[index] {
            self.queued[index] = true;
            self.pending.push(index);
        }
    }

    fn pop(&mut self) -> Option<usize> {
        let index = self.pending.pop()?;
        self.queued[index] = false;
        Some(index)
    }
}

fn label_index(labels: &HashMap<Label, usize>, label: &Label) -> Result<usize, String> {
    labels
        .get(label)
        .copied()
        .ok_or_else(|| format!("label {:?} is never placed", label))
}

/// Instructions control can reach after the one at `index` (ignoring exceptions and `jsr`)
fn successors(
    instructions: &[Instruction],
    index: usize,
    labels: &HashMap<Label, usize>,
) -> Result<Vec<usize>, String> {
    let mut targets = vec![];
    let falls_through = match &instructions[index] {
        Instruction::Jump { opcode, target } => {
            targets.push(label_index(labels, target)?);
            !matches!(*opcode, GOTO | GOTO_W)
        }
        Instruction::TableSwitch {
            default, targets: cases, ..
        } => {
            targets.push(label_index(labels, default)?);
            for case in cases {
                targets.push(label_index(labels, case)?);
            }
            false
        }
        Instruction::LookupSwitch { default, pairs } => {
            targets.push(label_index(labels, default)?);
            for (_, case) in pairs {
                targets.push(label_index(labels, case)?);
            }
            false
        }
        Instruction::Var { opcode: RET, .. } => false,
        Instruction::Plain(opcode) => !opcodes::ends_block(*opcode),
        _ => true,
    };
    if falls_through {
        if index + 1 == instructions.len() {
            return Err(String::from("execution falls off the end of the code"));
        }
        targets.push(index + 1);
    }
    Ok(targets)
}

/// Merge two verification types
///
/// Identical types merge to themselves, `null` merges into any object type, and two object
/// types merge to their closest common superclass. Anything else merges to `Top`.
pub fn merge_types(
    type1: &AnalysisType,
    type2: &AnalysisType,
    hierarchy: &dyn TypeHierarchy,
) -> AnalysisType {
    match (type1, type2) {
        _ if type1 == type2 => type1.clone(),
        (VerificationType::Null, VerificationType::Object(_)) => type2.clone(),
        (VerificationType::Object(_), VerificationType::Null) => type1.clone(),
        (VerificationType::Object(class1), VerificationType::Object(class2)) => {
            VerificationType::Object(merge_references(class1, class2, hierarchy))
        }
        _ => VerificationType::Top,
    }
}

/// Merge two class references (internal names or array descriptors)
fn merge_references(class1: &str, class2: &str, hierarchy: &dyn TypeHierarchy) -> String {
    let object = BinaryName::OBJECT;
    let object = object.as_str();
    if class1 == class2 {
        return class1.to_owned();
    }
    match (class1.strip_prefix('['), class2.strip_prefix('[')) {
        (Some(element1), Some(element2)) => {
            match (element_reference(element1), element_reference(element2)) {
                (Some(element1), Some(element2)) => {
                    array_of(&merge_references(element1, element2, hierarchy))
                }
                _ => object.to_owned(),
            }
        }
        (None, None) => hierarchy.common_superclass(class1, class2),
        _ => object.to_owned(),
    }
}

/// Class reference for an array element descriptor (`None` for primitive elements)
fn element_reference(descriptor: &str) -> Option<&str> {
    if descriptor.starts_with('[') {
        Some(descriptor)
    } else {
        descriptor.strip_prefix('L')?.strip_suffix(';')
    }
}

/// Class reference for an array whose elements have the given class reference
fn array_of(class_reference: &str) -> String {
    if class_reference.starts_with('[') {
        format!("[{}", class_reference)
    } else {
        format!("[L{};", class_reference)
    }
}

/// Type on the stack when entering each handler (keyed by the handler's instruction index)
///
/// Several ranges can share a handler (as with multi-catch), in which case their catch types are
/// merged. Caught values are always throwables, so a merge the hierarchy can only resolve to
/// `java/lang/Object` becomes `java/lang/Throwable`.
fn handler_entry_types(
    handlers: &[HandlerRange],
    hierarchy: &dyn TypeHierarchy,
) -> HashMap<usize, String> {
    let throwable = BinaryName::THROWABLE;
    let object = BinaryName::OBJECT;
    let mut entry_types: HashMap<usize, String> = HashMap::new();
    for handler in handlers {
        let catch_type = handler.catch_type.as_deref().unwrap_or(throwable.as_str());
        let merged = match entry_types.get(&handler.handler) {
            None => catch_type.to_owned(),
            Some(existing) => {
                let merged = hierarchy.common_superclass(existing, catch_type);
                if merged == object.as_str() {
                    throwable.as_str().to_owned()
                } else {
                    merged
                }
            }
        };
        entry_types.insert(handler.handler, merged);
    }
    entry_types
}

/// Merge an incoming frame into the frame of an instruction, queueing the instruction if its
/// frame changed
fn merge_into(
    frames: &mut [Option<AnalysisFrame>],
    target: usize,
    incoming: &AnalysisFrame,
    hierarchy: &dyn TypeHierarchy,
    worklist: &mut Worklist,
) -> Result<(), String> {
    if frames[target].is_none() {
        frames[target] = Some(incoming.clone());
        worklist.push(target);
        return Ok(());
    }
    let existing = match &mut frames[target] {
        Some(existing) => existing,
        None => return Ok(()),
    };

    if existing.stack.len() != incoming.stack.len() {
        return Err(format!(
            "stack height {} does not match height {} on another path",
            incoming.stack.len(),
            existing.stack.len()
        ));
    }

    let mut changed = false;
    for (current, other) in existing.stack.iter_mut().zip(&incoming.stack) {
        let merged = merge_types(current, other, hierarchy);
        if merged == VerificationType::Top && *current != VerificationType::Top {
            return Err(format!(
                "stack types {:?} and {:?} cannot be merged",
                current, other
            ));
        }
        if merged != *current {
            *current = merged;
            changed = true;
        }
    }

    if incoming.locals.len() < existing.locals.len() {
        existing.locals.truncate(incoming.locals.len());
        changed = true;
    }
    for (current, other) in existing.locals.iter_mut().zip(&incoming.locals) {
        let merged = merge_types(current, other, hierarchy);
        if merged != *current {
            *current = merged;
            changed = true;
        }
    }

    if changed {
        worklist.push(target);
    }
    Ok(())
}

/// Compute the frame before every reachable instruction
///
/// `labels` maps every placed label to the index of its `Label` pseudo-instruction. Methods
/// containing `jsr` or `ret` are rejected: their frames cannot be expressed.
pub fn compute_frames(
    context: &MethodContext,
    instructions: &[Instruction],
    labels: &HashMap<Label, usize>,
    handlers: &[HandlerRange],
    hierarchy: &dyn TypeHierarchy,
) -> Result<TypeAnalysis, Error> {
    let len = instructions.len();
    let initial = AnalysisFrame {
        locals: context.initial_locals(),
        stack: vec![],
    };
    let mut max_stack = 0;
    let mut max_locals = initial.locals.len();
    let mut frames: Vec<Option<AnalysisFrame>> = vec![None; len];
    if len == 0 {
        return Err(context.error(0, String::from("method body is empty")));
    }

    let entry_types = handler_entry_types(handlers, hierarchy);
    let mut worklist = Worklist::new(len);
    frames[0] = Some(initial);
    worklist.push(0);

    while let Some(index) = worklist.pop() {
        let input = match &frames[index] {
            Some(frame) => frame.clone(),
            None => continue,
        };
        let insn = &instructions[index];
        let mut output = input.clone();
        execute(&mut output, index, insn, context, instructions)
            .map_err(|message| context.error(index, message))?;
        max_stack = max_stack.max(output.stack.len());
        max_locals = max_locals.max(output.locals.len());

        if !insn.is_pseudo() {
            for handler in handlers {
                if handler.start <= index && index < handler.end {
                    let catch_type = match entry_types.get(&handler.handler) {
                        Some(catch_type) => catch_type.clone(),
                        None => BinaryName::THROWABLE.as_str().to_owned(),
                    };
                    for locals in [&input.locals, &output.locals] {
                        let handler_frame = AnalysisFrame {
                            locals: locals.clone(),
                            stack: vec![VerificationType::Object(catch_type.clone())],
                        };
                        merge_into(
                            &mut frames,
                            handler.handler,
                            &handler_frame,
                            hierarchy,
                            &mut worklist,
                        )
                        .map_err(|message| context.error(handler.handler, message))?;
                    }
                    max_stack = max_stack.max(1);
                }
            }
        }

        let targets = successors(instructions, index, labels)
            .map_err(|message| context.error(index, message))?;
        for target in targets {
            merge_into(&mut frames, target, &output, hierarchy, &mut worklist)
                .map_err(|message| context.error(target, message))?;
        }
    }

    log::trace!(
        "Computed frames for {}.{}: max_stack = {}, max_locals = {}",
        context.owner,
        context.name,
        max_stack,
        max_locals
    );
    Ok(TypeAnalysis {
        frames,
        max_stack,
        max_locals,
    })
}

/// Type of a numeric operation, from its position in a group of opcodes ordered `int`, `long`,
/// `float`, `double`
fn numeric(position: u8) -> AnalysisType {
    match position {
        0 => VerificationType::Integer,
        1 => VerificationType::Long,
        2 => VerificationType::Float,
        _ => VerificationType::Double,
    }
}

fn parse_field_type(descriptor: &str) -> Result<FieldType, String> {
    FieldType::parse(descriptor).map_err(|err| format!("bad descriptor '{}': {}", descriptor, err))
}

fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor, String> {
    MethodDescriptor::parse(descriptor)
        .map_err(|err| format!("bad descriptor '{}': {}", descriptor, err))
}

/// Simulate the effect of an instruction on a frame
fn execute(
    frame: &mut AnalysisFrame,
    index: usize,
    insn: &Instruction,
    context: &MethodContext,
    instructions: &[Instruction],
) -> Result<(), String> {
    use VerificationType::*;

    match insn {
        Instruction::Label(_) | Instruction::LineNumber { .. } | Instruction::Frame(_) => (),
        Instruction::Plain(opcode) => execute_plain(frame, *opcode)?,
        Instruction::Int {
            opcode: NEWARRAY,
            operand,
        } => {
            frame.pop_expecting(Integer)?;
            let element = u8::try_from(*operand)
                .ok()
                .and_then(BaseType::from_array_type_code)
                .ok_or_else(|| format!("bad array type code {}", operand))?;
            frame.push(Object(format!("[{}", element.render())));
        }
        Instruction::Int { .. } => frame.push(Integer),
        Instruction::Var { opcode: RET, .. } => {
            return Err(String::from("`ret` cannot be described by stack map frames"))
        }
        Instruction::Var { opcode, var } => match *opcode {
            ILOAD..=ALOAD => frame.load(*opcode, *var)?,
            ISTORE => {
                frame.pop_expecting(Integer)?;
                frame.store(*var, Integer);
            }
            LSTORE => {
                frame.pop_expecting(Long)?;
                frame.store(*var, Long);
            }
            FSTORE => {
                frame.pop_expecting(Float)?;
                frame.store(*var, Float);
            }
            DSTORE => {
                frame.pop_expecting(Double)?;
                frame.store(*var, Double);
            }
            ASTORE => {
                let value = frame.pop_reference()?;
                frame.store(*var, value);
            }
            other => return Err(format!("unexpected local variable opcode {}", other)),
        },
        Instruction::Type { opcode, class } => match *opcode {
            NEW => frame.push(Uninitialized(index)),
            ANEWARRAY => {
                frame.pop_expecting(Integer)?;
                frame.push(Object(array_of(class)));
            }
            CHECKCAST => {
                frame.pop_reference()?;
                frame.push(Object(class.clone()));
            }
            INSTANCEOF => {
                frame.pop_reference()?;
                frame.push(Integer);
            }
            other => return Err(format!("unexpected type opcode {}", other)),
        },
        Instruction::Field(field) => {
            let field_type = parse_field_type(&field.descriptor)?;
            match field.opcode {
                GETSTATIC => frame.push(VerificationType::from(&field_type)),
                PUTSTATIC => frame.pop_field_type(&field_type)?,
                GETFIELD => {
                    frame.pop_reference()?;
                    frame.push(VerificationType::from(&field_type));
                }
                _ => {
                    frame.pop_field_type(&field_type)?;
                    frame.pop_reference()?;
                }
            }
        }
        Instruction::Method(method) => {
            let descriptor = parse_method_descriptor(&method.descriptor)?;
            frame.pop_arguments(&descriptor)?;
            if method.opcode != INVOKESTATIC {
                let receiver = frame.pop_reference()?;
                if method.opcode == INVOKESPECIAL && method.name == UnqualifiedName::INIT.as_str() {
                    let initialized = match &receiver {
                        UninitializedThis => Object(context.owner.to_owned()),
                        Uninitialized(new_index) => match instructions.get(*new_index) {
                            Some(Instruction::Type { class, .. }) => Object(class.clone()),
                            _ => return Err(String::from("uninitialized value without a `new`")),
                        },
                        other => {
                            return Err(format!("constructor called on initialized {:?}", other))
                        }
                    };
                    frame.initialize(&receiver, initialized);
                }
            }
            frame.push_return(&descriptor);
        }
        Instruction::InvokeDynamic(indy) => {
            let descriptor = parse_method_descriptor(&indy.descriptor)?;
            frame.pop_arguments(&descriptor)?;
            frame.push_return(&descriptor);
        }
        Instruction::Jump { opcode, .. } => match *opcode {
            IFEQ..=IFLE => frame.pop_expecting(Integer)?,
            IF_ICMPEQ..=IF_ICMPLE => {
                frame.pop_expecting(Integer)?;
                frame.pop_expecting(Integer)?;
            }
            IF_ACMPEQ | IF_ACMPNE => {
                frame.pop_reference()?;
                frame.pop_reference()?;
            }
            IFNULL | IFNONNULL => {
                frame.pop_reference()?;
            }
            GOTO | GOTO_W => (),
            _ => return Err(String::from("`jsr` cannot be described by stack map frames")),
        },
        Instruction::Ldc(constant) => frame.push(match constant {
            ConstantValue::Integer(_) => Integer,
            ConstantValue::Float(_) => Float,
            ConstantValue::Long(_) => Long,
            ConstantValue::Double(_) => Double,
            ConstantValue::String(_) => Object(BinaryName::STRING.as_str().to_owned()),
            ConstantValue::Class(_) => Object(BinaryName::CLASS.as_str().to_owned()),
            ConstantValue::MethodType(_) => Object(BinaryName::METHODTYPE.as_str().to_owned()),
            ConstantValue::MethodHandle(_) => {
                Object(BinaryName::METHODHANDLE.as_str().to_owned())
            }
        }),
        Instruction::Iinc { var, .. } => {
            if frame.locals.get(*var as usize) != Some(&Integer) {
                return Err(format!("local {} incremented but is not an int", var));
            }
        }
        Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } => {
            frame.pop_expecting(Integer)?
        }
        Instruction::MultiANewArray {
            descriptor,
            dimensions,
        } => {
            for _ in 0..*dimensions {
                frame.pop_expecting(Integer)?;
            }
            frame.push(Object(descriptor.clone()));
        }
    }
    Ok(())
}

fn execute_plain(frame: &mut AnalysisFrame, opcode: u8) -> Result<(), String> {
    use VerificationType::*;

    match opcode {
        NOP => (),
        ACONST_NULL => frame.push(Null),
        ICONST_M1..=ICONST_5 => frame.push(Integer),
        LCONST_0 | LCONST_1 => frame.push(Long),
        FCONST_0..=FCONST_2 => frame.push(Float),
        DCONST_0 | DCONST_1 => frame.push(Double),
        IALOAD..=SALOAD => {
            frame.pop_expecting(Integer)?;
            let array = frame.pop_reference()?;
            let element = match opcode {
                LALOAD => Long,
                FALOAD => Float,
                DALOAD => Double,
                AALOAD => match array {
                    Null => Null,
                    Object(class) => match class.strip_prefix('[').and_then(element_reference) {
                        Some(element) => Object(element.to_owned()),
                        None => return Err(format!("`aaload` from non-reference array {}", class)),
                    },
                    other => return Err(format!("`aaload` from {:?}", other)),
                },
                _ => Integer,
            };
            frame.push(element);
        }
        IASTORE..=SASTORE => {
            match opcode {
                LASTORE => frame.pop_expecting(Long)?,
                FASTORE => frame.pop_expecting(Float)?,
                DASTORE => frame.pop_expecting(Double)?,
                AASTORE => {
                    frame.pop_reference()?;
                }
                _ => frame.pop_expecting(Integer)?,
            }
            frame.pop_expecting(Integer)?;
            frame.pop_reference()?;
        }
        POP => frame.pop_slots(1)?,
        POP2 => frame.pop_slots(2)?,
        DUP => frame.dup(1, 0)?,
        DUP_X1 => frame.dup(1, 1)?,
        DUP_X2 => frame.dup(1, 2)?,
        DUP2 => frame.dup(2, 0)?,
        DUP2_X1 => frame.dup(2, 1)?,
        DUP2_X2 => frame.dup(2, 2)?,
        SWAP => frame.swap()?,
        IADD..=DREM => {
            let typ = numeric((opcode - IADD) % 4);
            frame.pop_expecting(typ.clone())?;
            frame.pop_expecting(typ.clone())?;
            frame.push(typ);
        }
        INEG..=DNEG => {
            let typ = numeric(opcode - INEG);
            frame.pop_expecting(typ.clone())?;
            frame.push(typ);
        }
        ISHL..=LUSHR => {
            let typ = numeric((opcode - ISHL) % 2);
            frame.pop_expecting(Integer)?;
            frame.pop_expecting(typ.clone())?;
            frame.push(typ);
        }
        IAND..=LXOR => {
            let typ = numeric((opcode - IAND) % 2);
            frame.pop_expecting(typ.clone())?;
            frame.pop_expecting(typ.clone())?;
            frame.push(typ);
        }
        I2L..=D2F => {
            let from = (opcode - I2L) / 3;
            let mut to = (opcode - I2L) % 3;
            if to >= from {
                to += 1;
            }
            frame.pop_expecting(numeric(from))?;
            frame.push(numeric(to));
        }
        I2B | I2C | I2S => {
            frame.pop_expecting(Integer)?;
            frame.push(Integer);
        }
        LCMP..=DCMPG => {
            let typ = match opcode {
                LCMP => Long,
                FCMPL | FCMPG => Float,
                _ => Double,
            };
            frame.pop_expecting(typ.clone())?;
            frame.pop_expecting(typ)?;
            frame.push(Integer);
        }
        IRETURN => frame.pop_expecting(Integer)?,
        LRETURN => frame.pop_expecting(Long)?,
        FRETURN => frame.pop_expecting(Float)?,
        DRETURN => frame.pop_expecting(Double)?,
        ARETURN | ATHROW | MONITORENTER | MONITOREXIT => {
            frame.pop_reference()?;
        }
        RETURN => (),
        ARRAYLENGTH => {
            frame.pop_reference()?;
            frame.push(Integer);
        }
        other => {
            return Err(format!(
                "unexpected opcode {}",
                opcodes::mnemonic(other).unwrap_or("<unknown>")
            ))
        }
    }
    Ok(())
}

/// Change in stack depth (in slots) caused by an instruction
///
/// For `jsr`, this is the depth change on entry to the subroutine.
fn stack_delta(insn: &Instruction) -> Result<isize, String> {
    let field_width = |descriptor: &str| parse_field_type(descriptor).map(|t| t.width() as isize);
    let method_delta = |descriptor: &str, has_receiver: bool| {
        parse_method_descriptor(descriptor).map(|desc| {
            desc.return_width() as isize - desc.parameter_length(has_receiver) as isize
        })
    };

    Ok(match insn {
        Instruction::Label(_) | Instruction::LineNumber { .. } | Instruction::Frame(_) => 0,
        Instruction::Plain(opcode) => plain_stack_delta(*opcode)?,
        Instruction::Int { opcode: NEWARRAY, .. } => 0,
        Instruction::Int { .. } => 1,
        Instruction::Var { opcode, .. } => match *opcode {
            LLOAD | DLOAD => 2,
            ILOAD | FLOAD | ALOAD => 1,
            LSTORE | DSTORE => -2,
            ISTORE | FSTORE | ASTORE => -1,
            _ => 0,
        },
        Instruction::Type { opcode: NEW, .. } => 1,
        Instruction::Type { .. } => 0,
        Instruction::Field(field) => {
            let width = field_width(&field.descriptor)?;
            match field.opcode {
                GETSTATIC => width,
                PUTSTATIC => -width,
                GETFIELD => width - 1,
                _ => -width - 1,
            }
        }
        Instruction::Method(method) => {
            method_delta(&method.descriptor, method.opcode != INVOKESTATIC)?
        }
        Instruction::InvokeDynamic(indy) => method_delta(&indy.descriptor, false)?,
        Instruction::Jump { opcode, .. } => match *opcode {
            IFEQ..=IFLE | IFNULL | IFNONNULL => -1,
            IF_ICMPEQ..=IF_ACMPNE => -2,
            JSR | JSR_W => 1,
            _ => 0,
        },
        Instruction::Ldc(constant) if constant.is_wide() => 2,
        Instruction::Ldc(_) => 1,
        Instruction::Iinc { .. } => 0,
        Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } => -1,
        Instruction::MultiANewArray { dimensions, .. } => 1 - *dimensions as isize,
    })
}

fn plain_stack_delta(opcode: u8) -> Result<isize, String> {
    Ok(match opcode {
        NOP | SWAP | INEG..=DNEG | I2F | L2D | F2I | D2L | I2B | I2C | I2S | ARRAYLENGTH
        | RETURN | LALOAD | DALOAD => 0,
        ACONST_NULL..=FCONST_2 if !matches!(opcode, LCONST_0 | LCONST_1) => 1,
        LCONST_0 | LCONST_1 | DCONST_0 | DCONST_1 => 2,
        IALOAD | FALOAD | AALOAD | BALOAD | CALOAD | SALOAD => -1,
        IASTORE | FASTORE | AASTORE | BASTORE | CASTORE | SASTORE => -3,
        LASTORE | DASTORE => -4,
        POP => -1,
        POP2 => -2,
        DUP | DUP_X1 | DUP_X2 => 1,
        DUP2 | DUP2_X1 | DUP2_X2 => 2,
        IADD..=DREM => {
            if (opcode - IADD) % 2 == 0 {
                -1
            } else {
                -2
            }
        }
        ISHL..=LUSHR => -1,
        IAND..=LXOR => {
            if (opcode - IAND) % 2 == 0 {
                -1
            } else {
                -2
            }
        }
        I2L | I2D | F2L | F2D => 1,
        L2I | L2F | D2I | D2F => -1,
        LCMP | DCMPL | DCMPG => -3,
        FCMPL | FCMPG => -1,
        IRETURN | FRETURN | ARETURN | ATHROW | MONITORENTER | MONITOREXIT => -1,
        LRETURN | DRETURN => -2,
        other => {
            return Err(format!(
                "unexpected opcode {}",
                opcodes::mnemonic(other).unwrap_or("<unknown>")
            ))
        }
    })
}

/// Compute `max_stack` and `max_locals` without tracking types
///
/// Unlike [`compute_frames`], this understands subroutines: `jsr` pushes a return address on
/// entry to the subroutine and execution resumes after the `jsr` with the original depth.
pub fn compute_maxs(
    context: &MethodContext,
    instructions: &[Instruction],
    labels: &HashMap<Label, usize>,
    handlers: &[HandlerRange],
) -> Result<(usize, usize), Error> {
    let mut max_locals = context.initial_locals().len();
    for insn in instructions {
        let end = match insn {
            Instruction::Var { opcode, var } => match *opcode {
                LLOAD | DLOAD | LSTORE | DSTORE => *var as usize + 2,
                _ => *var as usize + 1,
            },
            Instruction::Iinc { var, .. } => *var as usize + 1,
            _ => continue,
        };
        max_locals = max_locals.max(end);
    }

    let len = instructions.len();
    let mut depths: Vec<Option<isize>> = vec![None; len];
    let mut max_stack: isize = 0;
    if len == 0 {
        return Ok((0, max_locals));
    }

    let mut worklist = Worklist::new(len);
    depths[0] = Some(0);
    worklist.push(0);

    let reach = |depths: &mut Vec<Option<isize>>,
                     worklist: &mut Worklist,
                     target: usize,
                     depth: isize|
     -> Result<(), String> {
        match depths[target] {
            None => {
                depths[target] = Some(depth);
                worklist.push(target);
                Ok(())
            }
            Some(existing) if existing == depth => Ok(()),
            Some(existing) => Err(format!(
                "stack height {} does not match height {} on another path",
                depth, existing
            )),
        }
    };

    while let Some(index) = worklist.pop() {
        let depth = match depths[index] {
            Some(depth) => depth,
            None => continue,
        };
        let insn = &instructions[index];
        let delta = stack_delta(insn).map_err(|message| context.error(index, message))?;
        let after = depth + delta;
        if after < 0 {
            return Err(context.error(index, String::from("stack underflow")));
        }
        max_stack = max_stack.max(after);

        if !insn.is_pseudo() {
            for handler in handlers {
                if handler.start <= index && index < handler.end {
                    reach(&mut depths, &mut worklist, handler.handler, 1)
                        .map_err(|message| context.error(handler.handler, message))?;
                    max_stack = max_stack.max(1);
                }
            }
        }

        if let Instruction::Jump {
            opcode: JSR | JSR_W,
            target,
        } = insn
        {
            let target =
                label_index(labels, target).map_err(|message| context.error(index, message))?;
            reach(&mut depths, &mut worklist, target, after)
                .map_err(|message| context.error(target, message))?;
            if index + 1 < len {
                reach(&mut depths, &mut worklist, index + 1, depth)
                    .map_err(|message| context.error(index + 1, message))?;
            }
            continue;
        }

        let targets = successors(instructions, index, labels)
            .map_err(|message| context.error(index, message))?;
        for target in targets {
            reach(&mut depths, &mut worklist, target, after)
                .map_err(|message| context.error(target, message))?;
        }
    }

    Ok((max_stack as usize, max_locals))
}

#[cfg(test)]
mod test {
    use super::super::JavaLibraryHierarchy;
    use super::*;
    use crate::jvm::model::{InsnList, MethodInsn};
    use VerificationType::*;

    fn labels_of(instructions: &InsnList) -> HashMap<Label, usize> {
        instructions
            .iter()
            .enumerate()
            .filter_map(|(index, insn)| match insn {
                Instruction::Label(label) => Some((*label, index)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn branches_merge_types() {
        // static Object pick(boolean b) { return b ? "s" : new Integer[0]; }
        let descriptor = MethodDescriptor::parse("(Z)Ljava/lang/Object;").unwrap();
        let context = MethodContext {
            owner: "p/Q",
            name: "pick",
            descriptor: &descriptor,
            is_static: true,
        };
        let mut code = InsnList::new();
        let other = code.new_label();
        let join = code.new_label();
        code.push(Instruction::Var { opcode: ILOAD, var: 0 });
        code.push(Instruction::Jump { opcode: IFEQ, target: other });
        code.push(Instruction::Ldc(ConstantValue::String(String::from("s"))));
        code.push(Instruction::Jump { opcode: GOTO, target: join });
        code.push(Instruction::Label(other));
        code.push(Instruction::Plain(ICONST_0));
        code.push(Instruction::Type {
            opcode: ANEWARRAY,
            class: String::from("java/lang/Integer"),
        });
        code.push(Instruction::Label(join));
        code.push(Instruction::Plain(ARETURN));

        let instructions: Vec<Instruction> = code.iter().cloned().collect();
        let analysis =
            compute_frames(&context, &instructions, &labels_of(&code), &[], &JavaLibraryHierarchy)
                .unwrap();

        assert_eq!(analysis.max_stack, 1);
        assert_eq!(analysis.max_locals, 1);
        let at_join = analysis.frames[7].as_ref().unwrap();
        assert_eq!(at_join.locals, vec![Integer]);
        assert_eq!(at_join.stack, vec![Object(String::from("java/lang/Object"))]);
    }

    #[test]
    fn constructor_initializes_values() {
        let descriptor = MethodDescriptor::parse("()V").unwrap();
        let context = MethodContext {
            owner: "p/Q",
            name: "<init>",
            descriptor: &descriptor,
            is_static: false,
        };
        let init = |owner: &str| {
            Instruction::Method(MethodInsn {
                opcode: INVOKESPECIAL,
                owner: owner.to_owned(),
                name: String::from("<init>"),
                descriptor: String::from("()V"),
                is_interface: false,
            })
        };
        let instructions = vec![
            Instruction::Var { opcode: ALOAD, var: 0 },
            init("java/lang/Object"),
            Instruction::Type {
                opcode: NEW,
                class: String::from("p/R"),
            },
            Instruction::Plain(DUP),
            init("p/R"),
            Instruction::Var { opcode: ASTORE, var: 1 },
            Instruction::Plain(RETURN),
        ];
        let analysis =
            compute_frames(&context, &instructions, &HashMap::new(), &[], &JavaLibraryHierarchy)
                .unwrap();

        let frames: Vec<&AnalysisFrame> = analysis.frames.iter().flatten().collect();
        assert_eq!(frames[0].locals, vec![UninitializedThis]);
        assert_eq!(frames[2].locals, vec![Object(String::from("p/Q"))]);
        assert_eq!(frames[4].stack, vec![Uninitialized(2), Uninitialized(2)]);
        assert_eq!(
            frames[6].locals,
            vec![Object(String::from("p/Q")), Object(String::from("p/R"))]
        );
        assert_eq!(analysis.max_stack, 2);
        assert_eq!(analysis.max_locals, 2);
    }

    #[test]
    fn wide_values_take_two_slots() {
        let descriptor = MethodDescriptor::parse("(JI)J").unwrap();
        let context = MethodContext {
            owner: "p/Q",
            name: "widen",
            descriptor: &descriptor,
            is_static: false,
        };
        let instructions = vec![
            Instruction::Var { opcode: LLOAD, var: 1 },
            Instruction::Var { opcode: ILOAD, var: 3 },
            Instruction::Plain(I2L),
            Instruction::Plain(LADD),
            Instruction::Plain(DUP2),
            Instruction::Var { opcode: LSTORE, var: 4 },
            Instruction::Plain(LRETURN),
        ];
        let analysis =
            compute_frames(&context, &instructions, &HashMap::new(), &[], &JavaLibraryHierarchy)
                .unwrap();
        assert_eq!(analysis.max_stack, 4);
        assert_eq!(analysis.max_locals, 6);

        let (max_stack, max_locals) =
            compute_maxs(&context, &instructions, &HashMap::new(), &[]).unwrap();
        assert_eq!((max_stack, max_locals), (4, 6));
    }

    #[test]
    fn stack_errors_are_reported() {
        let descriptor = MethodDescriptor::parse("()V").unwrap();
        let context = MethodContext {
            owner: "p/Q",
            name: "broken",
            descriptor: &descriptor,
            is_static: true,
        };
        let instructions = vec![Instruction::Plain(POP), Instruction::Plain(RETURN)];
        let err = compute_frames(
            &context,
            &instructions,
            &HashMap::new(),
            &[],
            &JavaLibraryHierarchy,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::InconsistentClassFile(Inconsistency::Verification { index: 0, .. })
        ));

        let falls_off = vec![Instruction::Plain(NOP)];
        assert!(compute_maxs(&context, &falls_off, &HashMap::new(), &[]).is_err());
    }

    #[test]
    fn shared_handlers_merge_catch_types() {
        // static String parse(String s) {
        //   try { Integer.parseInt(s); } catch (A | B e) { return e.getMessage(); }
        //   return s;
        // }
        let descriptor = MethodDescriptor::parse("(Ljava/lang/String;)Ljava/lang/String;").unwrap();
        let context = MethodContext {
            owner: "p/Q",
            name: "parse",
            descriptor: &descriptor,
            is_static: true,
        };
        let mut code = InsnList::new();
        let start = code.new_label();
        let end = code.new_label();
        let handler = code.new_label();
        code.push(Instruction::Label(start));
        code.push(Instruction::Var { opcode: ALOAD, var: 0 });
        code.push(Instruction::Method(MethodInsn {
            opcode: INVOKESTATIC,
            owner: String::from("java/lang/Integer"),
            name: String::from("parseInt"),
            descriptor: String::from("(Ljava/lang/String;)I"),
            is_interface: false,
        }));
        code.push(Instruction::Plain(POP));
        code.push(Instruction::Label(end));
        code.push(Instruction::Var { opcode: ALOAD, var: 0 });
        code.push(Instruction::Plain(ARETURN));
        code.push(Instruction::Label(handler));
        code.push(Instruction::Method(MethodInsn {
            opcode: INVOKEVIRTUAL,
            owner: String::from("java/lang/Throwable"),
            name: String::from("getMessage"),
            descriptor: String::from("()Ljava/lang/String;"),
            is_interface: false,
        }));
        code.push(Instruction::Plain(ARETURN));
        let instructions: Vec<Instruction> = code.iter().cloned().collect();
        let labels = labels_of(&code);

        let handler_stack = |catch_types: [&str; 2]| {
            let handlers: Vec<HandlerRange> = catch_types
                .iter()
                .map(|catch_type| HandlerRange {
                    start: labels[&start],
                    end: labels[&end],
                    handler: labels[&handler],
                    catch_type: Some(catch_type.to_string()),
                })
                .collect();
            let analysis =
                compute_frames(&context, &instructions, &labels, &handlers, &JavaLibraryHierarchy)
                    .unwrap();
            analysis.frames[labels[&handler]].as_ref().unwrap().stack.clone()
        };

        assert_eq!(
            handler_stack([
                "java/lang/IllegalArgumentException",
                "java/lang/IllegalStateException",
            ]),
            vec![Object(String::from("java/lang/RuntimeException"))]
        );
        assert_eq!(
            handler_stack(["java/io/IOException", "java/lang/ArithmeticException"]),
            vec![Object(String::from("java/lang/Exception"))]
        );

        // Without knowing the classes, the handler still receives a throwable
        assert_eq!(
            handler_stack(["p/FirstProblem", "p/SecondProblem"]),
            vec![Object(String::from("java/lang/Throwable"))]
        );
    }

    #[test]
    fn array_merging() {
        let hierarchy = JavaLibraryHierarchy;
        let merge = |a: &str, b: &str| merge_references(a, b, &hierarchy);
        assert_eq!(merge("[Ljava/lang/String;", "[Ljava/lang/Integer;"), "[Ljava/lang/Object;");
        assert_eq!(merge("[[I", "[Ljava/lang/String;"), "[Ljava/lang/Object;");
        assert_eq!(merge("[I", "[J"), "java/lang/Object");
        assert_eq!(merge("[I", "p/Q"), "java/lang/Object");
    }
}
