use super::*;
use crate::jvm::class_file::{ClassConstantIndex, StackMapFrame};
use crate::util::{OffsetVec, Width};

/// Snapshot of the stack and local variables at a point in the bytecode
///
/// Both vectors are in the compact form used by stack map frames: a `long` or `double` is a
/// single entry, but it occupies two offsets. Offsets into `locals` are therefore local variable
/// indices, and the offset length of `stack` is the stack depth.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Frame<Cls, U> {
    /// Local variables in scope
    pub locals: OffsetVec<VerificationType<Cls, U>>,

    /// Types of values on the stack
    pub stack: OffsetVec<VerificationType<Cls, U>>,
}

impl<Cls: Clone, U: Clone> Frame<Cls, U> {
    /// Build a frame from locals and stack in slot form (one entry per slot, with `Top` in the
    /// slot after a `long` or `double`)
    ///
    /// Trailing `Top` locals are dropped since they carry no information.
    pub fn from_slots(
        locals: &[VerificationType<Cls, U>],
        stack: &[VerificationType<Cls, U>],
    ) -> Frame<Cls, U> {
        let mut compact_locals = compact(locals);
        while let Some(VerificationType::Top) = compact_locals.last() {
            compact_locals.pop();
        }

        Frame {
            locals: compact_locals.into_iter().collect(),
            stack: compact(stack).into_iter().collect(),
        }
    }

    /// Locals in slot form (see [`Frame::from_slots`])
    pub fn local_slots(&self) -> Vec<VerificationType<Cls, U>> {
        let mut slots = vec![];
        for (_, _, typ) in &self.locals {
            slots.push(typ.clone());
            if typ.width() == 2 {
                slots.push(VerificationType::Top);
            }
        }
        slots
    }

    /// Map the class and uninitialized parts of every type in the frame
    pub fn try_map<C2, U2, E>(
        &self,
        mut map_class: impl FnMut(&Cls) -> Result<C2, E>,
        mut map_uninitialized: impl FnMut(&U) -> Result<U2, E>,
    ) -> Result<Frame<C2, U2>, E> {
        let mut map_type = |typ: &VerificationType<Cls, U>| {
            typ.try_map(&mut map_class, &mut map_uninitialized)
        };
        Ok(Frame {
            locals: self
                .locals
                .iter()
                .map(|(_, _, t)| map_type(t))
                .collect::<Result<_, _>>()?,
            stack: self
                .stack
                .iter()
                .map(|(_, _, t)| map_type(t))
                .collect::<Result<_, _>>()?,
        })
    }
}

fn compact<Cls: Clone, U: Clone>(
    slots: &[VerificationType<Cls, U>],
) -> Vec<VerificationType<Cls, U>> {
    let mut compacted = vec![];
    let mut slot = 0;
    while slot < slots.len() {
        let typ = &slots[slot];
        compacted.push(typ.clone());
        slot += typ.width();
    }
    compacted
}

impl Frame<ClassConstantIndex, u16> {
    /// Compute a stack map frame for this frame, given the previous frame
    ///
    /// This will fall back to the `Full` option using [`Self::full_stack_map_frame`] only if none
    /// of the other stack map frame variants are enough to encode the transition.
    pub fn stack_map_frame(&self, offset_delta: u16, previous_frame: &Self) -> StackMapFrame {
        match self.stack.len() {
            0 => {
                let this_locals_len = self.locals.len();
                let prev_locals_len = previous_frame.locals.len();

                if this_locals_len <= prev_locals_len {
                    let len_difference = prev_locals_len - this_locals_len;
                    if len_difference < 4 {
                        let this_is_prefix_of_prev = self
                            .locals
                            .iter()
                            .zip(previous_frame.locals.iter())
                            .all(|((_, _, t1), (_, _, t2))| t1 == t2);

                        if this_is_prefix_of_prev {
                            if len_difference == 0 {
                                return StackMapFrame::SameLocalsNoStack { offset_delta };
                            } else {
                                return StackMapFrame::ChopLocalsNoStack {
                                    offset_delta,
                                    chopped_k: len_difference as u8,
                                };
                            }
                        }
                    }
                } else if this_locals_len - prev_locals_len < 4 {
                    let prev_is_prefix_of_this = previous_frame
                        .locals
                        .iter()
                        .zip(self.locals.iter())
                        .all(|((_, _, t1), (_, _, t2))| t1 == t2);

                    if prev_is_prefix_of_this {
                        return StackMapFrame::AppendLocalsNoStack {
                            offset_delta,
                            locals: self
                                .locals
                                .iter()
                                .skip(prev_locals_len)
                                .map(|(_, _, t)| *t)
                                .collect(),
                        };
                    }
                }
            }
            1 if self.locals == previous_frame.locals => {
                if let Some((_, _, stack)) = self.stack.iter().next() {
                    return StackMapFrame::SameLocalsOneStack {
                        offset_delta,
                        stack: *stack,
                    };
                }
            }
            _ => (),
        }

        self.full_stack_map_frame(offset_delta)
    }

    /// Compute a `Full` stack map frame
    pub fn full_stack_map_frame(&self, offset_delta: u16) -> StackMapFrame {
        StackMapFrame::Full {
            offset_delta,
            stack: self.stack.iter().map(|(_, _, t)| *t).collect(),
            locals: self.locals.iter().map(|(_, _, t)| *t).collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::ConstantIndex;
    use VerificationType::*;

    type SFrame = Frame<ClassConstantIndex, u16>;

    fn new_frame<const N: usize, const M: usize>(
        locals: [VerificationType<ClassConstantIndex, u16>; N],
        stack: [VerificationType<ClassConstantIndex, u16>; M],
    ) -> SFrame {
        Frame {
            locals: locals.into_iter().collect(),
            stack: stack.into_iter().collect(),
        }
    }

    #[test]
    fn slot_conversion() {
        let slots: Vec<VerificationType<String, usize>> = vec![Integer, Long, Top, Top, Float, Top];
        let frame = Frame::from_slots(&slots, &[Double, Top]);
        assert_eq!(frame.locals.len(), 4);
        assert_eq!(frame.locals.offset_len().0, 5);
        assert_eq!(frame.stack.offset_len().0, 2);
        assert_eq!(frame.local_slots(), vec![Integer, Long, Top, Top, Float]);
    }

    #[test]
    fn compression() {
        let class = Object(ClassConstantIndex(ConstantIndex(7)));
        let base = new_frame([Integer, class], []);

        assert_eq!(
            new_frame([Integer, class], []).stack_map_frame(3, &base),
            StackMapFrame::SameLocalsNoStack { offset_delta: 3 }
        );
        assert_eq!(
            new_frame([Integer, class], [Long]).stack_map_frame(4, &base),
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 4,
                stack: Long
            }
        );
        assert_eq!(
            new_frame([Integer], []).stack_map_frame(5, &base),
            StackMapFrame::ChopLocalsNoStack {
                offset_delta: 5,
                chopped_k: 1
            }
        );
        assert_eq!(
            new_frame([Integer, class, Double, Float], []).stack_map_frame(6, &base),
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 6,
                locals: vec![Double, Float]
            }
        );
        assert_eq!(
            new_frame([Float], [Integer]).stack_map_frame(7, &base),
            StackMapFrame::Full {
                offset_delta: 7,
                locals: vec![Float],
                stack: vec![Integer]
            }
        );
    }
}
