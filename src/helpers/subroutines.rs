//! Inlining of `jsr`/`ret` subroutines
//!
//! Every call site gets its own copy of the subroutine it calls. The `jsr` becomes an
//! `aconst_null` (standing in for the return address) followed by a `goto` to the copy, and every
//! `ret` in the copy becomes a `goto` back to just after the call site.
//!
//! Subroutines are found by walking the control flow from their entry point without following
//! calls to other subroutines. An instruction reached from more than one subroutine (typically
//! when a subroutine falls through into code of its caller) is only emitted by the outermost
//! copy claiming it. Exception handlers protecting any part of a subroutine are part of it, so
//! they get copied along with it.

use super::copy::{copy, new_method_node};
use crate::jvm::model::{
    InsnList, Instruction, Label, LocalVariable, MethodNode, TryCatchBlock,
};
use crate::jvm::opcodes::{ends_block, ACONST_NULL, GOTO, JSR, RET};
use crate::jvm::{Error, Inconsistency};
use std::collections::{HashMap, VecDeque};

/// Copy of the method with every subroutine inlined at its call sites
///
/// Methods without `jsr` come back as a plain copy. Stack map frames are dropped from inlined
/// methods, since they no longer describe the code.
pub fn remove_subroutines(method: &MethodNode) -> Result<MethodNode, Error> {
    let has_subroutines = method
        .instructions
        .iter()
        .any(|insn| matches!(insn, Instruction::Jump { opcode: JSR, .. }));
    if !has_subroutines {
        return Ok(copy(method));
    }

    let mut inliner = Inliner::new(method)?;
    inliner.mark_subroutines()?;
    log::debug!(
        "Inlining {} subroutine(s) of {}",
        inliner.subroutines.len() - 1,
        method.display_name()
    );
    inliner.emit()
}

struct Subroutine {
    /// Label of the first instruction (`None` for the body of the method itself)
    entry: Option<Label>,

    /// Which instructions of the method are reachable in the subroutine
    instructions: Vec<bool>,
}

/// Copy of a subroutine at one call site
struct Instantiation {
    parent: Option<usize>,
    subroutine: usize,

    /// Label right after the call site (`None` for the body of the method itself)
    return_label: Option<Label>,

    /// Copy of every label of the method, for this instantiation
    cloned_labels: HashMap<Label, Label>,
}

struct Inliner<'a> {
    method: &'a MethodNode,
    positions: HashMap<Label, usize>,

    /// Subroutines in order of first call, after the body of the method at index 0
    subroutines: Vec<Subroutine>,

    /// Instructions which belong to more than one subroutine
    dual_citizens: Vec<bool>,
    instantiations: Vec<Instantiation>,
    output: InsnList,
}

impl<'a> Inliner<'a> {
    fn new(method: &'a MethodNode) -> Result<Inliner<'a>, Error> {
        let length = method.instructions.len();
        let mut positions = HashMap::new();
        let mut subroutines = vec![Subroutine {
            entry: None,
            instructions: vec![false; length],
        }];
        for (index, insn) in method.instructions.iter().enumerate() {
            match insn {
                Instruction::Label(label) => {
                    if positions.insert(*label, index).is_some() {
                        return Err(Error::from(Inconsistency::DuplicateLabel {
                            method: method.display_name(),
                            label: *label,
                        }));
                    }
                }
                Instruction::Jump {
                    opcode: JSR,
                    target,
                } => {
                    if subroutines.iter().all(|sub| sub.entry != Some(*target)) {
                        subroutines.push(Subroutine {
                            entry: Some(*target),
                            instructions: vec![false; length],
                        });
                    }
                }
                _ => (),
            }
        }

        Ok(Inliner {
            method,
            positions,
            subroutines,
            dual_citizens: vec![false; length],
            instantiations: vec![],
            output: InsnList::new(),
        })
    }

    fn unresolved(&self, label: Label) -> Error {
        Error::from(Inconsistency::UnresolvedLabel {
            method: self.method.display_name(),
            label,
        })
    }

    fn position(&self, label: Label) -> Result<usize, Error> {
        self.positions
            .get(&label)
            .copied()
            .ok_or_else(|| self.unresolved(label))
    }

    fn mark_subroutines(&mut self) -> Result<(), Error> {
        let mut visited = vec![false; self.method.instructions.len()];
        self.mark_subroutine(0, 0, &mut visited)?;
        for subroutine in 1..self.subroutines.len() {
            if let Some(entry) = self.subroutines[subroutine].entry {
                let start = self.position(entry)?;
                self.mark_subroutine(subroutine, start, &mut visited)?;
            }
        }
        Ok(())
    }

    /// Mark what is reachable from `start`, including handlers protecting any of it
    fn mark_subroutine(
        &mut self,
        subroutine: usize,
        start: usize,
        visited: &mut [bool],
    ) -> Result<(), Error> {
        let method = self.method;
        self.mark_reachable(subroutine, start, visited)?;

        let mut found_handler = true;
        while found_handler {
            found_handler = false;
            for block in &method.try_catch_blocks {
                let handler = self.position(block.handler)?;
                if self.subroutines[subroutine].instructions[handler] {
                    continue;
                }
                let start = self.position(block.start)?;
                let end = self.position(block.end)?;
                let protects_subroutine = start < end
                    && self.subroutines[subroutine].instructions[start..end]
                        .iter()
                        .any(|marked| *marked);
                if protects_subroutine {
                    self.mark_reachable(subroutine, handler, visited)?;
                    found_handler = true;
                }
            }
        }
        Ok(())
    }

    fn mark_reachable(
        &mut self,
        subroutine: usize,
        start: usize,
        visited: &mut [bool],
    ) -> Result<(), Error> {
        let method = self.method;
        let instructions = method.instructions.as_slice();
        let mut pending = vec![start];
        while let Some(index) = pending.pop() {
            if self.subroutines[subroutine].instructions[index] {
                continue;
            }
            self.subroutines[subroutine].instructions[index] = true;
            if visited[index] {
                self.dual_citizens[index] = true;
            }
            visited[index] = true;

            let insn = &instructions[index];
            match insn {
                // Calls are followed separately
                Instruction::Jump { opcode: JSR, .. } => (),
                Instruction::Jump { target, .. } => pending.push(self.position(*target)?),
                Instruction::TableSwitch {
                    default, targets, ..
                } => {
                    pending.push(self.position(*default)?);
                    for target in targets {
                        pending.push(self.position(*target)?);
                    }
                }
                Instruction::LookupSwitch { default, pairs } => {
                    pending.push(self.position(*default)?);
                    for (_, target) in pairs {
                        pending.push(self.position(*target)?);
                    }
                }
                _ => (),
            }

            let falls_through = insn.opcode().map_or(true, |opcode| !ends_block(opcode));
            if falls_through && index + 1 < instructions.len() {
                pending.push(index + 1);
            }
        }
        Ok(())
    }

    fn instantiate(&mut self, parent: Option<usize>, subroutine: usize) -> Result<usize, Error> {
        let mut ancestor = parent;
        while let Some(current) = ancestor {
            if self.instantiations[current].subroutine == subroutine {
                return Err(Error::from(Inconsistency::RecursiveSubroutine {
                    method: self.method.display_name(),
                }));
            }
            ancestor = self.instantiations[current].parent;
        }

        let id = self.instantiations.len();
        let return_label = parent.map(|_| self.output.new_label());
        self.instantiations.push(Instantiation {
            parent,
            subroutine,
            return_label,
            cloned_labels: HashMap::new(),
        });

        // Consecutive labels with no emitted instruction in between share one copy
        let mut cloned_labels = HashMap::new();
        let mut current_clone: Option<Label> = None;
        let method = self.method;
        for (index, insn) in method.instructions.iter().enumerate() {
            if let Instruction::Label(label) = insn {
                let clone = match current_clone {
                    Some(clone) => clone,
                    None => {
                        let clone = self.output.new_label();
                        current_clone = Some(clone);
                        clone
                    }
                };
                cloned_labels.insert(*label, clone);
            } else if self.find_owner(id, index) == Some(id) {
                current_clone = None;
            }
        }
        self.instantiations[id].cloned_labels = cloned_labels;
        Ok(id)
    }

    /// Instantiation which emits the instruction at `index`, as seen from instantiation `id`
    fn find_owner(&self, id: usize, index: usize) -> Option<usize> {
        let instantiation = &self.instantiations[id];
        if !self.subroutines[instantiation.subroutine].instructions[index] {
            return None;
        }
        if !self.dual_citizens[index] {
            return Some(id);
        }
        let mut owner = id;
        let mut ancestor = instantiation.parent;
        while let Some(current) = ancestor {
            let outer = &self.instantiations[current];
            if self.subroutines[outer.subroutine].instructions[index] {
                owner = current;
            }
            ancestor = outer.parent;
        }
        Some(owner)
    }

    /// Copy of a label for delimiting ranges (handlers, local variables) in an instantiation
    fn range_label(&self, id: usize, label: Label) -> Result<Label, Error> {
        self.instantiations[id]
            .cloned_labels
            .get(&label)
            .copied()
            .ok_or_else(|| self.unresolved(label))
    }

    /// Copy of a label for jumping to from an instantiation
    fn jump_label(&self, id: usize, label: Label) -> Result<Label, Error> {
        let index = self.position(label)?;
        self.find_owner(id, index)
            .and_then(|owner| self.instantiations[owner].cloned_labels.get(&label).copied())
            .ok_or_else(|| self.unresolved(label))
    }

    fn subroutine_at(&self, entry: Label) -> Result<usize, Error> {
        self.subroutines
            .iter()
            .position(|subroutine| subroutine.entry == Some(entry))
            .ok_or_else(|| self.unresolved(entry))
    }

    fn emit(mut self) -> Result<MethodNode, Error> {
        let mut emitted = Emitted::default();
        let main = self.instantiate(None, 0)?;
        let mut worklist = VecDeque::from(vec![main]);
        while let Some(id) = worklist.pop_front() {
            self.emit_instantiation(id, &mut worklist, &mut emitted)?;
        }

        let mut inlined = new_method_node(self.method);
        self.output.replace_instructions(emitted.instructions);
        inlined.instructions = self.output;
        inlined.try_catch_blocks = emitted.try_catch_blocks;
        inlined.local_variables = self
            .method
            .local_variables
            .as_ref()
            .map(|_| emitted.local_variables);
        inlined.max_stack = self.method.max_stack;
        inlined.max_locals = self.method.max_locals;
        inlined.attributes = self.method.attributes.clone();
        Ok(inlined)
    }

    fn emit_instantiation(
        &mut self,
        id: usize,
        worklist: &mut VecDeque<usize>,
        emitted: &mut Emitted,
    ) -> Result<(), Error> {
        let method = self.method;
        let mut previous_label: Option<Label> = None;
        for (index, insn) in method.instructions.iter().enumerate() {
            if let Instruction::Label(label) = insn {
                let clone = self.range_label(id, *label)?;
                if previous_label != Some(clone) {
                    emitted.instructions.push(Instruction::Label(clone));
                    previous_label = Some(clone);
                }
                continue;
            }
            if self.find_owner(id, index) != Some(id) {
                continue;
            }

            match insn {
                Instruction::Var { opcode: RET, .. } => {
                    // A subroutine can fall through into the `ret` of an enclosing one
                    let mut return_label = None;
                    let mut owner = Some(id);
                    while let Some(current) = owner {
                        let instantiation = &self.instantiations[current];
                        if self.subroutines[instantiation.subroutine].instructions[index] {
                            return_label = instantiation.return_label;
                        }
                        owner = instantiation.parent;
                    }
                    let target = return_label.ok_or_else(|| {
                        Error::from(Inconsistency::RetOutsideSubroutine {
                            method: method.display_name(),
                        })
                    })?;
                    emitted.instructions.push(Instruction::Jump {
                        opcode: GOTO,
                        target,
                    });
                }
                Instruction::Jump {
                    opcode: JSR,
                    target,
                } => {
                    let subroutine = self.subroutine_at(*target)?;
                    let called = self.instantiate(Some(id), subroutine)?;
                    let entry = self.jump_label(called, *target)?;
                    emitted.instructions.push(Instruction::Plain(ACONST_NULL));
                    emitted.instructions.push(Instruction::Jump {
                        opcode: GOTO,
                        target: entry,
                    });
                    if let Some(return_label) = self.instantiations[called].return_label {
                        emitted.instructions.push(Instruction::Label(return_label));
                    }
                    worklist.push_back(called);
                }
                Instruction::Frame(_) => (),
                other => {
                    let mut resolved = HashMap::new();
                    for label in other.referenced_labels() {
                        resolved.insert(label, self.jump_label(id, label)?);
                    }
                    emitted.instructions.push(
                        other.map_labels(|label| resolved.get(&label).copied().unwrap_or(label)),
                    );
                }
            }
        }

        for block in &method.try_catch_blocks {
            let start = self.range_label(id, block.start)?;
            let end = self.range_label(id, block.end)?;
            if start != end {
                emitted.try_catch_blocks.push(TryCatchBlock {
                    start,
                    end,
                    handler: self.jump_label(id, block.handler)?,
                    catch_type: block.catch_type.clone(),
                });
            }
        }

        for local in method.local_variables.iter().flatten() {
            let start = self.range_label(id, local.start)?;
            let end = self.range_label(id, local.end)?;
            if start != end {
                emitted.local_variables.push(LocalVariable {
                    start,
                    end,
                    ..local.clone()
                });
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Emitted {
    instructions: Vec<Instruction>,
    try_catch_blocks: Vec<TryCatchBlock>,
    local_variables: Vec<LocalVariable>,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::model::MethodBuilder;
    use crate::jvm::opcodes::*;
    use crate::jvm::MethodAccessFlags;

    fn opcodes(method: &MethodNode) -> Vec<u8> {
        method
            .instructions
            .iter()
            .filter_map(Instruction::opcode)
            .collect()
    }

    #[test]
    fn single_call_site() {
        let mut method = MethodBuilder::new(MethodAccessFlags::STATIC, "m", "()V");
        let sub = method.label();
        method.jump(JSR, sub);
        method.insn(RETURN);
        method.place(sub);
        method.var_insn(ASTORE, 1);
        method.insn(NOP);
        method.var_insn(RET, 1);
        let method = method.build();

        let inlined = remove_subroutines(&method).unwrap();
        assert_eq!(
            opcodes(&inlined),
            vec![ACONST_NULL, GOTO, RETURN, ASTORE, NOP, GOTO]
        );

        // The `ret` goes back to right after the call
        let targets: Vec<Label> = inlined
            .instructions
            .iter()
            .filter_map(|insn| match insn {
                Instruction::Jump { target, .. } => Some(*target),
                _ => None,
            })
            .collect();
        assert_eq!(inlined.instructions.label_position(targets[1]), Some(2));
        let entry = inlined.instructions.label_position(targets[0]).unwrap();
        assert!(matches!(
            inlined.instructions.get(entry + 1),
            Some(Instruction::Var { opcode: ASTORE, var: 1 })
        ));
    }

    #[test]
    fn every_call_site_gets_a_copy() {
        let mut method = MethodBuilder::new(MethodAccessFlags::STATIC, "m", "()V");
        let sub = method.label();
        let start = method.label();
        let end = method.label();
        let handler = method.label();
        method.jump(JSR, sub);
        method.jump(JSR, sub);
        method.insn(RETURN);
        method.place(sub);
        method.var_insn(ASTORE, 1);
        method.place(start);
        method.insn(NOP);
        method.place(end);
        method.var_insn(RET, 1);
        method.place(handler);
        method.insn(ATHROW);
        method.try_catch(start, end, handler, None);
        let method = method.build();

        let inlined = remove_subroutines(&method).unwrap();
        let stores = opcodes(&inlined).iter().filter(|op| **op == ASTORE).count();
        let throws = opcodes(&inlined).iter().filter(|op| **op == ATHROW).count();
        assert_eq!(stores, 2);
        assert_eq!(throws, 2);
        assert_eq!(inlined.try_catch_blocks.len(), 2);
        assert!(!opcodes(&inlined).contains(&JSR));
        assert!(!opcodes(&inlined).contains(&RET));
    }

    #[test]
    fn recursion_is_rejected() {
        let mut method = MethodBuilder::new(MethodAccessFlags::STATIC, "m", "()V");
        let sub = method.label();
        method.jump(JSR, sub);
        method.insn(RETURN);
        method.place(sub);
        method.var_insn(ASTORE, 1);
        method.jump(JSR, sub);
        method.var_insn(RET, 1);
        let method = method.build();

        assert!(matches!(
            remove_subroutines(&method),
            Err(Error::InconsistentClassFile(
                Inconsistency::RecursiveSubroutine { .. }
            ))
        ));
    }

    #[test]
    fn stray_ret_is_rejected() {
        let mut method = MethodBuilder::new(MethodAccessFlags::STATIC, "m", "()V");
        let sub = method.label();
        method.jump(JSR, sub);
        method.var_insn(RET, 1);
        method.place(sub);
        method.var_insn(ASTORE, 1);
        method.var_insn(RET, 1);
        let method = method.build();

        assert!(matches!(
            remove_subroutines(&method),
            Err(Error::InconsistentClassFile(
                Inconsistency::RetOutsideSubroutine { .. }
            ))
        ));
    }

    #[test]
    fn no_subroutines() {
        let mut method = MethodBuilder::new(MethodAccessFlags::STATIC, "m", "()V");
        method.insn(RETURN);
        let method = method.build();
        assert_eq!(remove_subroutines(&method).unwrap(), method);
    }
}
