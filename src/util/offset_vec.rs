use std::fmt::{Debug, Error, Formatter};
use std::iter::{Extend, FromIterator};
use std::result::Result;
use std::slice::Iter;

/// Elements with a width (eg. when used in an `OffsetVec`)
pub trait Width {
    fn width(&self) -> usize;
}

/// A vector of elements of different logical "widths", where offsets into the vector are given in
/// terms of the sum of the widths of the previous elements (as opposed to the number of preceding
/// elements).
///
/// Class files use this layout for the constant pool: most entries have width 1, but `long` and
/// `double` entries take up two indices, the second of which is unusable.
#[derive(Clone)]
pub struct OffsetVec<T: Sized> {
    /// Entries, along with their offset
    entries: Vec<(Offset, T)>,

    /// Offset of the next element to be added
    offset_len: Offset,

    /// Offset for the first element (usually 0, but 1 for constant pools)
    initial_offset: Offset,
}

/// Offset into an `OffsetVec`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl<T: Sized + Width> OffsetVec<T> {
    /// New empty offset vector
    pub fn new() -> OffsetVec<T> {
        OffsetVec::new_starting_at(Offset(0))
    }

    /// New empty offset vector, with a custom starting offset
    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
            initial_offset,
        }
    }

    /// Length of the `OffsetVec` (aka. number of entries)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current offset size of the `OffsetVec` (aka. offset of the next element
    /// to be added)
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Offset of the first element
    pub fn initial_offset(&self) -> Offset {
        self.initial_offset
    }

    /// Add an entry to the back
    pub fn push(&mut self, slot: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += slot.width();
        self.entries.push((offset, slot));

        offset
    }

    /// Get an entry (and its index) by its offset in the vector
    ///
    /// Note: this uses binary search to find the offset
    pub fn get_offset(&self, offset: Offset) -> OffsetResult<T> {
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Err(insert_at) if insert_at == self.entries.len() => OffsetResult::TooLarge,
            Err(insert_at) => OffsetResult::InvalidOffset(insert_at),
            Ok(found_idx) => OffsetResult::Ok(found_idx, &self.entries[found_idx].1),
        }
    }

    pub fn iter(&self) -> OffsetVecIter<'_, T> {
        self.into_iter()
    }
}

impl<A: PartialEq> PartialEq for OffsetVec<A> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<A: Eq> Eq for OffsetVec<A> {}

impl<A: Width> Default for OffsetVec<A> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

pub enum OffsetResult<'a, T> {
    /// Element was accessed
    Ok(usize, &'a T),

    /// Offset was invalid, and falls in the middle of the element at this index
    InvalidOffset(usize),

    /// Offset is too big
    TooLarge,
}

impl<'a, T> OffsetResult<'a, T> {
    /// Convert to an `Option` and keep only the value found
    pub fn ok(&self) -> Option<&'a T> {
        match self {
            OffsetResult::Ok(_, found) => Some(found),
            OffsetResult::InvalidOffset(_) | OffsetResult::TooLarge => None,
        }
    }
}

/// Iterator for borrowed `OffsetVec`
pub struct OffsetVecIter<'a, T>(std::iter::Enumerate<Iter<'a, (Offset, T)>>);

impl<'a, T> Iterator for OffsetVecIter<'a, T> {
    type Item = (Offset, usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> IntoIterator for &'a OffsetVec<T> {
    type Item = (Offset, usize, &'a T);
    type IntoIter = OffsetVecIter<'a, T>;

    fn into_iter(self) -> OffsetVecIter<'a, T> {
        OffsetVecIter(self.entries.iter().enumerate())
    }
}

impl<T: Width> FromIterator<T> for OffsetVec<T> {
    fn from_iter<A: IntoIterator<Item = T>>(elems: A) -> Self {
        let mut offset_vec = OffsetVec::new();
        for elem in elems {
            offset_vec.push(elem);
        }
        offset_vec
    }
}

impl<T: Width> Extend<T> for OffsetVec<T> {
    fn extend<U: IntoIterator<Item = T>>(&mut self, iter: U) {
        for elem in iter {
            self.push(elem);
        }
    }
}

impl<T: Debug> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let mut list = f.debug_list();
        for (off, elem) in &self.entries {
            list.entry(&format_args!("#{} = {:?}", off.0, elem));
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Entry {
        Narrow(u8),
        Wide(u8),
    }

    impl Width for Entry {
        fn width(&self) -> usize {
            match self {
                Entry::Narrow(_) => 1,
                Entry::Wide(_) => 2,
            }
        }
    }

    #[test]
    fn pool_style_offsets() {
        let mut pool: OffsetVec<Entry> = OffsetVec::new_starting_at(Offset(1));
        assert_eq!(pool.push(Entry::Narrow(1)), Offset(1));
        assert_eq!(pool.push(Entry::Wide(2)), Offset(2));
        assert_eq!(pool.push(Entry::Narrow(3)), Offset(4));
        assert_eq!(pool.offset_len(), Offset(5));
        assert_eq!(pool.len(), 3);

        assert_eq!(pool.get_offset(Offset(2)).ok(), Some(&Entry::Wide(2)));
        assert_eq!(pool.get_offset(Offset(4)).ok(), Some(&Entry::Narrow(3)));
        assert!(matches!(
            pool.get_offset(Offset(3)),
            OffsetResult::InvalidOffset(2)
        ));
        assert!(matches!(pool.get_offset(Offset(5)), OffsetResult::TooLarge));
    }

    #[test]
    fn iteration_reports_offsets_and_indices() {
        let entries: OffsetVec<Entry> = vec![Entry::Wide(1), Entry::Narrow(2), Entry::Wide(3)]
            .into_iter()
            .collect();
        assert_eq!(
            entries.iter().map(|(off, idx, e)| (off, idx, *e)).collect::<Vec<_>>(),
            vec![
                (Offset(0), 0, Entry::Wide(1)),
                (Offset(2), 1, Entry::Narrow(2)),
                (Offset(3), 2, Entry::Wide(3)),
            ]
        );
    }

    #[test]
    fn equal_when_entries_are_equal() {
        fn assert_eq_trait<T: Eq>(_: &T) {}

        let first: OffsetVec<Entry> = vec![Entry::Wide(1), Entry::Narrow(2)].into_iter().collect();
        let mut second: OffsetVec<Entry> = OffsetVec::new();
        second.push(Entry::Wide(1));
        second.push(Entry::Narrow(2));
        assert_eq_trait(&first);
        assert_eq!(first, second);
        second.push(Entry::Narrow(3));
        assert_ne!(first, second);
    }
}
