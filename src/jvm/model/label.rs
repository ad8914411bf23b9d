use std::fmt;

/// Opaque label
///
/// Labels are only meaningful within the instruction list that created them: they are
/// identity-unique markers which jumps, exception handler ranges, line numbers, and local variable
/// scopes refer to.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Label(usize);

impl Label {
    /// Position of the label in the sequence of labels created by its generator
    pub const fn index(&self) -> usize {
        self.0
    }

    /// Get the next fresh label
    pub fn next(&self) -> Label {
        Label(self.0 + 1)
    }
}

/// Generates new labels
///
/// Cloning does not split the generator source - the cloned generator will produce the same
/// sequence of labels as the original.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelGenerator(Label);

impl LabelGenerator {
    pub fn new() -> LabelGenerator {
        LabelGenerator(Label(0))
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> Label {
        let to_return = self.0;
        self.0 = self.0.next();
        to_return
    }

    /// Number of labels generated so far
    pub fn generated(&self) -> usize {
        (self.0).0
    }
}

impl Default for Label {
    fn default() -> Label {
        Label(0)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_labels_are_distinct() {
        let mut generator = LabelGenerator::new();
        let l0 = generator.fresh_label();
        let mut forked = generator.clone();
        let l1 = generator.fresh_label();
        assert_ne!(l0, l1);
        assert_eq!(forked.fresh_label(), l1);
        assert_eq!(generator.generated(), 2);
        assert_eq!(format!("{:?}", l1), "l1");
    }
}
