//! Laying out and encoding method bodies

use super::WriterFlags;
use crate::jvm::class_file::{
    BytecodeArray, ClassConstantIndex, Code, ConstantsPool, ExceptionHandler,
    LineNumberTable, LocalVariableEntry, LocalVariableTable, LocalVariableTypeTable, StackMapTable,
    Version,
};
use crate::jvm::model::{
    FrameNode, FrameType, InsnList, Instruction, Label, MethodNode, TryCatchBlock,
};
use crate::jvm::opcodes::{self, *};
use crate::jvm::verifier::{
    compute_frames, compute_maxs, AnalysisFrame, Frame, HandlerRange, MethodContext,
    TypeHierarchy, VerificationType,
};
use crate::jvm::{
    BinaryName, Error, Inconsistency, MethodDescriptor, Name, ParseDescriptor, Serialize,
};
use crate::util::OffsetVec;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Largest code array a method can have
const MAX_CODE_LENGTH: usize = 65535;

type ClassFileFrame = Frame<ClassConstantIndex, u16>;

/// Settings shared by every method of the class being written
pub struct CodeWriter<'a> {
    pub owner: &'a str,
    pub version: Version,
    pub flags: WriterFlags,
    pub hierarchy: &'a dyn TypeHierarchy,
}

impl CodeWriter<'_> {
    /// Encode the body of a method into a `Code` attribute
    pub fn write_code(&self, method: &MethodNode, pool: &mut ConstantsPool) -> Result<Code, Error> {
        let method_name = format!("{}.{}", self.owner, method.display_name());
        check_labels(method, &method_name)?;

        let compute_frames_here = self.flags.contains(WriterFlags::COMPUTE_FRAMES)
            && self.version.uses_stack_map_frames();
        let compute_maxs_here = !compute_frames_here
            && self
                .flags
                .intersects(WriterFlags::COMPUTE_MAXS | WriterFlags::COMPUTE_FRAMES);

        let mut list = method.instructions.clone();
        let mut try_catch_blocks = method.try_catch_blocks.clone();
        if compute_frames_here {
            let has_subroutines = list.iter().any(|insn| {
                matches!(
                    insn.opcode(),
                    Some(JSR) | Some(JSR_W) | Some(RET)
                )
            });
            if has_subroutines {
                return Err(Error::UnsupportedFeature(format!(
                    "{}: frames cannot be computed for subroutines (inline jsr/ret first)",
                    method_name
                )));
            }
            list.retain(|insn| !matches!(insn, Instruction::Frame(_)));
        }
        let has_frames = list.iter().any(|insn| matches!(insn, Instruction::Frame(_)));
        let mut offsets = widen_jumps(&mut list, pool, &method_name, has_frames)?;

        let mut frames: BTreeMap<usize, ClassFileFrame> = BTreeMap::new();
        let max_stack;
        let max_locals;
        if compute_frames_here {
            let descriptor = parse_descriptor(method)?;
            let context = self.context(method, &descriptor);
            let positions = label_positions(list.as_slice());
            let handlers = handler_ranges(&try_catch_blocks, &positions);
            let analysis = compute_frames(
                &context,
                list.as_slice(),
                &positions,
                &handlers,
                self.hierarchy,
            )?;

            // Frames go at every reachable branch target and handler
            let mut frame_points: Vec<usize> = vec![];
            for insn in list.iter() {
                if let Instruction::Jump { .. }
                | Instruction::TableSwitch { .. }
                | Instruction::LookupSwitch { .. } = insn
                {
                    for label in insn.referenced_labels() {
                        frame_points.extend(positions.get(&label));
                    }
                }
            }
            for block in &try_catch_blocks {
                frame_points.extend(positions.get(&block.handler));
            }
            for index in frame_points {
                if let Some(frame) = &analysis.frames[index] {
                    let frame = class_file_frame(frame, &offsets, pool)?;
                    frames.insert(offsets[index], frame);
                }
            }

            let dead_runs = replace_dead_code(&mut list, &analysis.frames, &offsets);
            let mut stack_needed = analysis.max_stack;
            if !dead_runs.is_empty() {
                log::debug!(
                    "Replaced {} unreachable run(s) of code in {}",
                    dead_runs.len(),
                    method_name
                );
                let throwable = pool.get_class(BinaryName::THROWABLE.as_str())?;
                for run in &dead_runs {
                    frames.insert(
                        run.start_offset,
                        Frame {
                            locals: OffsetVec::new(),
                            stack: std::iter::once(VerificationType::Object(throwable)).collect(),
                        },
                    );
                }
                stack_needed = stack_needed.max(1);
                offsets = layout(list.as_slice(), pool)?;
                let label_offsets = resolve_label_offsets(list.as_slice(), &offsets);
                try_catch_blocks = split_handlers(&try_catch_blocks, &dead_runs, &label_offsets);
            }

            max_stack = stack_needed;
            max_locals = analysis.max_locals;
        } else if compute_maxs_here {
            let descriptor = parse_descriptor(method)?;
            let context = self.context(method, &descriptor);
            let positions = label_positions(list.as_slice());
            let handlers = handler_ranges(&try_catch_blocks, &positions);
            let (stack, locals) = compute_maxs(&context, list.as_slice(), &positions, &handlers)?;
            max_stack = stack;
            max_locals = locals;
        } else {
            max_stack = method.max_stack as usize;
            max_locals = method.max_locals as usize;
        }

        let label_offsets = resolve_label_offsets(list.as_slice(), &offsets);
        let code_length = offsets.last().copied().unwrap_or(0);

        // Frames placed by hand
        if has_frames && !compute_frames_here {
            if self.version.uses_stack_map_frames() {
                for (index, insn) in list.iter().enumerate() {
                    if let Instruction::Frame(frame) = insn {
                        if offsets[index] < code_length {
                            let frame = frame_node_frame(frame, &label_offsets, pool)?;
                            frames.insert(offsets[index], frame);
                        }
                    }
                }
            } else {
                log::debug!(
                    "Dropping frames of {} (class version {} has no stack maps)",
                    method_name,
                    self.version.major_version
                );
            }
        }

        let bytecode = encode(list.as_slice(), &offsets, &label_offsets, pool)?;

        let mut exception_table = vec![];
        for block in &try_catch_blocks {
            let start_pc = label_offsets[&block.start];
            let end_pc = label_offsets[&block.end];
            if start_pc >= end_pc {
                log::debug!("Dropping empty exception handler range in {}", method_name);
                continue;
            }
            let catch_type = match &block.catch_type {
                Some(catch_type) => pool.get_class(catch_type)?.0 .0,
                None => 0,
            };
            exception_table.push(ExceptionHandler {
                start_pc: start_pc as u16,
                end_pc: end_pc as u16,
                handler_pc: label_offsets[&block.handler] as u16,
                catch_type,
            });
        }

        let mut attributes = vec![];

        let line_numbers: Vec<(u16, u16)> = list
            .iter()
            .filter_map(|insn| match insn {
                Instruction::LineNumber { line, start } => {
                    Some((label_offsets[start] as u16, *line))
                }
                _ => None,
            })
            .collect();
        if !line_numbers.is_empty() {
            attributes.push(pool.get_attribute(LineNumberTable(line_numbers))?);
        }

        if let Some(local_variables) = &method.local_variables {
            let mut variables = vec![];
            let mut variable_types = vec![];
            for local in local_variables {
                let start_pc = label_offsets[&local.start];
                let end_pc = label_offsets[&local.end];
                if end_pc < start_pc {
                    log::debug!(
                        "Dropping local variable {} of {} whose scope ends before it starts",
                        local.name,
                        method_name
                    );
                    continue;
                }
                let name = pool.get_utf8(&local.name)?;
                variables.push(LocalVariableEntry {
                    start_pc: start_pc as u16,
                    length: (end_pc - start_pc) as u16,
                    name,
                    descriptor: pool.get_utf8(&local.descriptor)?,
                    index: local.index,
                });
                if let Some(signature) = &local.signature {
                    variable_types.push(LocalVariableEntry {
                        start_pc: start_pc as u16,
                        length: (end_pc - start_pc) as u16,
                        name,
                        descriptor: pool.get_utf8(signature)?,
                        index: local.index,
                    });
                }
            }
            attributes.push(pool.get_attribute(LocalVariableTable(variables))?);
            if !variable_types.is_empty() {
                attributes.push(pool.get_attribute(LocalVariableTypeTable(variable_types))?);
            }
        }

        if !frames.is_empty() {
            let descriptor = parse_descriptor(method)?;
            let context = self.context(method, &descriptor);
            let initial = AnalysisFrame {
                locals: context.initial_locals(),
                stack: vec![],
            };
            let mut previous = class_file_frame(&initial, &offsets, pool)?;
            let mut previous_offset: Option<usize> = None;
            let mut entries = vec![];
            for (offset, frame) in frames {
                let offset_delta = match previous_offset {
                    None => offset,
                    Some(previous_offset) => offset - previous_offset - 1,
                };
                entries.push(frame.stack_map_frame(offset_delta as u16, &previous));
                previous = frame;
                previous_offset = Some(offset);
            }
            attributes.push(pool.get_attribute(StackMapTable(entries))?);
        }

        log::trace!(
            "Encoded {}: {} bytes, max_stack = {}, max_locals = {}",
            method_name,
            bytecode.len(),
            max_stack,
            max_locals
        );
        Ok(Code {
            max_stack: max_stack.min(u16::MAX as usize) as u16,
            max_locals: max_locals.min(u16::MAX as usize) as u16,
            code_array: BytecodeArray(bytecode),
            exception_table,
            attributes,
        })
    }

    fn context<'a>(
        &'a self,
        method: &'a MethodNode,
        descriptor: &'a MethodDescriptor,
    ) -> MethodContext<'a> {
        MethodContext {
            owner: self.owner,
            name: &method.name,
            descriptor,
            is_static: method.is_static(),
        }
    }
}

fn parse_descriptor(method: &MethodNode) -> Result<MethodDescriptor, Error> {
    MethodDescriptor::parse(&method.descriptor)
        .map_err(|_| Inconsistency::BadDescriptor(method.descriptor.clone()).into())
}

/// Every label must be placed exactly once, and everything referenced must be placed
fn check_labels(method: &MethodNode, method_name: &str) -> Result<(), Error> {
    let mut placed = HashSet::new();
    for insn in &method.instructions {
        if let Instruction::Label(label) = insn {
            if !placed.insert(*label) {
                return Err(Inconsistency::DuplicateLabel {
                    method: method_name.to_owned(),
                    label: *label,
                }
                .into());
            }
        }
    }

    let mut referenced: Vec<Label> = method
        .instructions
        .iter()
        .flat_map(Instruction::referenced_labels)
        .collect();
    for block in &method.try_catch_blocks {
        referenced.extend([block.start, block.end, block.handler]);
    }
    for local in method.local_variables.iter().flatten() {
        referenced.extend([local.start, local.end]);
    }
    for label in referenced {
        if !placed.contains(&label) {
            return Err(Inconsistency::UnresolvedLabel {
                method: method_name.to_owned(),
                label,
            }
            .into());
        }
    }
    Ok(())
}

/// Index of the `Label` pseudo-instruction placing each label
fn label_positions(instructions: &[Instruction]) -> HashMap<Label, usize> {
    instructions
        .iter()
        .enumerate()
        .filter_map(|(index, insn)| match insn {
            Instruction::Label(label) => Some((*label, index)),
            _ => None,
        })
        .collect()
}

/// Bytecode offset of each label
fn resolve_label_offsets(instructions: &[Instruction], offsets: &[usize]) -> HashMap<Label, usize> {
    label_positions(instructions)
        .into_iter()
        .map(|(label, index)| (label, offsets[index]))
        .collect()
}

fn handler_ranges(
    try_catch_blocks: &[TryCatchBlock],
    positions: &HashMap<Label, usize>,
) -> Vec<HandlerRange> {
    try_catch_blocks
        .iter()
        .map(|block| HandlerRange {
            start: positions[&block.start],
            end: positions[&block.end],
            handler: positions[&block.handler],
            catch_type: block.catch_type.clone(),
        })
        .collect()
}

/// Convert a computed frame, resolving classes in the pool and `new` instructions to offsets
fn class_file_frame(
    frame: &AnalysisFrame,
    offsets: &[usize],
    pool: &mut ConstantsPool,
) -> Result<ClassFileFrame, Error> {
    frame.to_frame().try_map(
        |class: &String| pool.get_class(class).map_err(Error::from),
        |index: &usize| Ok(offsets[*index] as u16),
    )
}

fn frame_node_frame(
    frame: &FrameNode,
    label_offsets: &HashMap<Label, usize>,
    pool: &mut ConstantsPool,
) -> Result<ClassFileFrame, Error> {
    let mut convert = |typ: &FrameType| {
        typ.try_map(
            |class: &String| pool.get_class(class).map_err(Error::from),
            |label: &Label| Ok(label_offsets[label] as u16),
        )
    };
    Ok(Frame {
        locals: frame
            .locals
            .iter()
            .map(&mut convert)
            .collect::<Result<_, Error>>()?,
        stack: frame
            .stack
            .iter()
            .map(&mut convert)
            .collect::<Result<_, Error>>()?,
    })
}

/// Number of bytes the instruction takes when it starts at `offset`
fn instruction_size(
    insn: &Instruction,
    offset: usize,
    pool: &mut ConstantsPool,
) -> Result<usize, Error> {
    Ok(match insn {
        Instruction::Plain(_) => 1,
        Instruction::Int { opcode, .. } => {
            if *opcode == SIPUSH {
                3
            } else {
                2
            }
        }
        Instruction::Var { opcode, var } => {
            if *var <= 3 && *opcode != RET {
                1
            } else if *var <= u8::MAX as u16 {
                2
            } else {
                4
            }
        }
        Instruction::Type { .. } | Instruction::Field(_) => 3,
        Instruction::Method(insn) => {
            if insn.opcode == INVOKEINTERFACE {
                5
            } else {
                3
            }
        }
        Instruction::InvokeDynamic(_) => 5,
        Instruction::Jump { opcode, .. } => {
            if matches!(*opcode, GOTO_W | JSR_W) {
                5
            } else {
                3
            }
        }
        Instruction::Ldc(value) => {
            let index = pool.get_constant_value(value)?;
            if !value.is_wide() && index.0 <= u8::MAX as u16 {
                2
            } else {
                3
            }
        }
        Instruction::Iinc { var, increment } => {
            if *var <= u8::MAX as u16 && i8::try_from(*increment).is_ok() {
                3
            } else {
                6
            }
        }
        Instruction::TableSwitch { targets, .. } => {
            1 + switch_padding(offset) + 12 + 4 * targets.len()
        }
        Instruction::LookupSwitch { pairs, .. } => 1 + switch_padding(offset) + 8 + 8 * pairs.len(),
        Instruction::MultiANewArray { .. } => 4,
        Instruction::Label(_) | Instruction::LineNumber { .. } | Instruction::Frame(_) => 0,
    })
}

/// Zero bytes after a switch opcode at `offset`, so that its operands are 4-byte aligned
fn switch_padding(offset: usize) -> usize {
    (4 - (offset + 1) % 4) % 4
}

/// Offset of every instruction, followed by the code length
fn layout(instructions: &[Instruction], pool: &mut ConstantsPool) -> Result<Vec<usize>, Error> {
    let mut offsets = Vec::with_capacity(instructions.len() + 1);
    let mut offset = 0;
    for insn in instructions {
        offsets.push(offset);
        offset += instruction_size(insn, offset, pool)?;
    }
    offsets.push(offset);
    Ok(offsets)
}

/// Lay out the code, widening jumps that can't reach their targets until everything fits
///
/// `goto` and `jsr` turn into `goto_w` and `jsr_w`. A conditional jump has no wide form, so it
/// becomes the inverted condition jumping over a `goto_w` to the original target.
fn widen_jumps(
    list: &mut InsnList,
    pool: &mut ConstantsPool,
    method_name: &str,
    has_frames: bool,
) -> Result<Vec<usize>, Error> {
    loop {
        let offsets = layout(list.as_slice(), pool)?;
        let code_length = offsets.last().copied().unwrap_or(0);
        if code_length > MAX_CODE_LENGTH {
            return Err(Inconsistency::CodeTooLarge {
                method: method_name.to_owned(),
                length: code_length,
            }
            .into());
        }

        let positions = label_positions(list.as_slice());
        let mut far_jumps = vec![];
        for (index, insn) in list.iter().enumerate() {
            if let Instruction::Jump { opcode, target } = insn {
                let distance = offsets[positions[target]] as isize - offsets[index] as isize;
                let fits = i16::try_from(distance).is_ok();
                if !fits && !matches!(*opcode, GOTO_W | JSR_W) {
                    far_jumps.push(index);
                }
            }
        }
        if far_jumps.is_empty() {
            return Ok(offsets);
        }

        log::debug!("Widening {} jump(s) in {}", far_jumps.len(), method_name);
        for index in far_jumps.into_iter().rev() {
            let (opcode, target) = match list.get(index) {
                Some(Instruction::Jump { opcode, target }) => (*opcode, *target),
                _ => continue,
            };
            match opcode {
                GOTO | JSR => {
                    let wide = if opcode == GOTO { GOTO_W } else { JSR_W };
                    if let Some(insn) = list.get_mut(index) {
                        *insn = Instruction::Jump {
                            opcode: wide,
                            target,
                        };
                    }
                }
                _ => {
                    if has_frames {
                        return Err(Inconsistency::JumpOutOfRange {
                            method: method_name.to_owned(),
                        }
                        .into());
                    }
                    let skip = list.new_label();
                    let inverted = Instruction::Jump {
                        opcode: opcodes::invert_jump(opcode),
                        target: skip,
                    };
                    if let Some(insn) = list.get_mut(index) {
                        *insn = inverted;
                    }
                    list.insert(index + 1, Instruction::Jump { opcode: GOTO_W, target });
                    list.insert(index + 2, Instruction::Label(skip));
                }
            }
        }
    }
}

/// Maximal stretch of unreachable code, replaced by `nop`s ending in `athrow`
struct DeadRun {
    start: Label,
    end: Label,
    start_offset: usize,
}

/// Replace unreachable instructions with `nop ... nop athrow` of the same length
///
/// Offsets of everything are unchanged, so frames computed before the replacement stay valid.
/// Each run gets fresh labels placed around it.
fn replace_dead_code(
    list: &mut InsnList,
    frames: &[Option<AnalysisFrame>],
    offsets: &[usize],
) -> Vec<DeadRun> {
    let is_dead = |index: usize, insn: &Instruction| !insn.is_pseudo() && frames[index].is_none();
    if !list
        .iter()
        .enumerate()
        .any(|(index, insn)| is_dead(index, insn))
    {
        return vec![];
    }

    // For each dead instruction, is it the last one of its run?
    let old = list.replace_instructions(vec![]);
    let mut ends_run = vec![false; old.len()];
    let mut last_dead: Option<usize> = None;
    for (index, insn) in old.iter().enumerate() {
        if insn.is_pseudo() {
            continue;
        }
        if let Some(last) = last_dead.take() {
            ends_run[last] = !is_dead(index, insn);
        }
        if is_dead(index, insn) {
            last_dead = Some(index);
        }
    }
    if let Some(last) = last_dead {
        ends_run[last] = true;
    }

    let mut runs = vec![];
    let mut rewritten = Vec::with_capacity(old.len());
    let mut current: Option<(Label, usize)> = None;
    for (index, insn) in old.into_iter().enumerate() {
        if !is_dead(index, &insn) {
            rewritten.push(insn);
            continue;
        }
        if current.is_none() {
            let start = list.new_label();
            rewritten.push(Instruction::Label(start));
            current = Some((start, offsets[index]));
        }
        let size = offsets[index + 1] - offsets[index];
        if ends_run[index] {
            rewritten.extend((1..size).map(|_| Instruction::Plain(NOP)));
            rewritten.push(Instruction::Plain(ATHROW));
            if let Some((start, start_offset)) = current.take() {
                let end = list.new_label();
                rewritten.push(Instruction::Label(end));
                runs.push(DeadRun {
                    start,
                    end,
                    start_offset,
                });
            }
        } else {
            rewritten.extend((0..size).map(|_| Instruction::Plain(NOP)));
        }
    }
    list.replace_instructions(rewritten);
    runs
}

/// Cut dead runs out of exception handler ranges
fn split_handlers(
    try_catch_blocks: &[TryCatchBlock],
    dead_runs: &[DeadRun],
    label_offsets: &HashMap<Label, usize>,
) -> Vec<TryCatchBlock> {
    let mut split = vec![];
    for block in try_catch_blocks {
        let end_offset = label_offsets[&block.end];
        let mut start = block.start;
        let mut start_offset = label_offsets[&block.start];
        for run in dead_runs {
            let run_end_offset = label_offsets[&run.end];
            if run_end_offset <= start_offset || run.start_offset >= end_offset {
                continue;
            }
            if run.start_offset > start_offset {
                split.push(TryCatchBlock {
                    start,
                    end: run.start,
                    ..block.clone()
                });
            }
            start = run.end;
            start_offset = run_end_offset;
        }
        if start_offset < end_offset {
            split.push(TryCatchBlock {
                start,
                ..block.clone()
            });
        }
    }
    split
}

/// Encode the laid out instructions
fn encode(
    instructions: &[Instruction],
    offsets: &[usize],
    label_offsets: &HashMap<Label, usize>,
    pool: &mut ConstantsPool,
) -> Result<Vec<u8>, Error> {
    let mut code: Vec<u8> = Vec::with_capacity(offsets.last().copied().unwrap_or(0));
    let relative = |offset: usize, label: &Label| label_offsets[label] as i32 - offset as i32;

    for (insn, offset) in instructions.iter().zip(offsets.iter().copied()) {
        match insn {
            Instruction::Plain(opcode) => opcode.serialize(&mut code)?,
            Instruction::Int { opcode, operand } => {
                opcode.serialize(&mut code)?;
                match *opcode {
                    SIPUSH => (*operand as i16).serialize(&mut code)?,
                    BIPUSH => (*operand as i8).serialize(&mut code)?,
                    _ => (*operand as u8).serialize(&mut code)?,
                }
            }
            Instruction::Var { opcode, var } => {
                if *var <= 3 && *opcode != RET {
                    let short = if *opcode >= ISTORE {
                        ISTORE_0 + (*opcode - ISTORE) * 4
                    } else {
                        ILOAD_0 + (*opcode - ILOAD) * 4
                    };
                    (short + *var as u8).serialize(&mut code)?;
                } else if *var <= u8::MAX as u16 {
                    opcode.serialize(&mut code)?;
                    (*var as u8).serialize(&mut code)?;
                } else {
                    WIDE.serialize(&mut code)?;
                    opcode.serialize(&mut code)?;
                    var.serialize(&mut code)?;
                }
            }
            Instruction::Type { opcode, class } => {
                opcode.serialize(&mut code)?;
                pool.get_class(class)?.serialize(&mut code)?;
            }
            Instruction::Field(field) => {
                field.opcode.serialize(&mut code)?;
                pool.get_field_ref(&field.owner, &field.name, &field.descriptor)?
                    .serialize(&mut code)?;
            }
            Instruction::Method(method) => {
                method.opcode.serialize(&mut code)?;
                pool.get_method_ref(
                    &method.owner,
                    &method.name,
                    &method.descriptor,
                    method.is_interface,
                )?
                .serialize(&mut code)?;
                if method.opcode == INVOKEINTERFACE {
                    let descriptor = MethodDescriptor::parse(&method.descriptor)
                        .map_err(|_| Inconsistency::BadDescriptor(method.descriptor.clone()))?;
                    (descriptor.parameter_length(true) as u8).serialize(&mut code)?;
                    0u8.serialize(&mut code)?;
                }
            }
            Instruction::InvokeDynamic(indy) => {
                INVOKEDYNAMIC.serialize(&mut code)?;
                pool.get_invoke_dynamic(
                    &indy.name,
                    &indy.descriptor,
                    &indy.bootstrap_method,
                    &indy.bootstrap_arguments,
                )?
                .serialize(&mut code)?;
                0u16.serialize(&mut code)?;
            }
            Instruction::Jump { opcode, target } => {
                opcode.serialize(&mut code)?;
                if matches!(*opcode, GOTO_W | JSR_W) {
                    relative(offset, target).serialize(&mut code)?;
                } else {
                    (relative(offset, target) as i16).serialize(&mut code)?;
                }
            }
            Instruction::Ldc(value) => {
                let index = pool.get_constant_value(value)?;
                if value.is_wide() {
                    LDC2_W.serialize(&mut code)?;
                    index.serialize(&mut code)?;
                } else if index.0 <= u8::MAX as u16 {
                    LDC.serialize(&mut code)?;
                    (index.0 as u8).serialize(&mut code)?;
                } else {
                    LDC_W.serialize(&mut code)?;
                    index.serialize(&mut code)?;
                }
            }
            Instruction::Iinc { var, increment } => {
                if *var <= u8::MAX as u16 && i8::try_from(*increment).is_ok() {
                    IINC.serialize(&mut code)?;
                    (*var as u8).serialize(&mut code)?;
                    (*increment as i8).serialize(&mut code)?;
                } else {
                    WIDE.serialize(&mut code)?;
                    IINC.serialize(&mut code)?;
                    var.serialize(&mut code)?;
                    increment.serialize(&mut code)?;
                }
            }
            Instruction::TableSwitch {
                low,
                high,
                default,
                targets,
            } => {
                TABLESWITCH.serialize(&mut code)?;
                code.extend(std::iter::repeat(0).take(switch_padding(offset)));
                relative(offset, default).serialize(&mut code)?;
                low.serialize(&mut code)?;
                high.serialize(&mut code)?;
                for target in targets {
                    relative(offset, target).serialize(&mut code)?;
                }
            }
            Instruction::LookupSwitch { default, pairs } => {
                LOOKUPSWITCH.serialize(&mut code)?;
                code.extend(std::iter::repeat(0).take(switch_padding(offset)));
                relative(offset, default).serialize(&mut code)?;
                (pairs.len() as i32).serialize(&mut code)?;
                let mut sorted = pairs.clone();
                sorted.sort_by_key(|(key, _)| *key);
                for (key, target) in &sorted {
                    key.serialize(&mut code)?;
                    relative(offset, target).serialize(&mut code)?;
                }
            }
            Instruction::MultiANewArray {
                descriptor,
                dimensions,
            } => {
                MULTIANEWARRAY.serialize(&mut code)?;
                pool.get_class(descriptor)?.serialize(&mut code)?;
                dimensions.serialize(&mut code)?;
            }
            Instruction::Label(_) | Instruction::LineNumber { .. } | Instruction::Frame(_) => (),
        }
    }
    Ok(code)
}
