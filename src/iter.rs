use crate::{GenotypeArray, GenotypeCall};

pub struct VariantRowsIter<'inner> {
    pub(crate) inner: &'inner GenotypeArray,
    // index of next for forward iter, one past the next for reverse iter
    pub(crate) next_row_ind: (usize, usize),
}

/// The calls of one variant, in sample order.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct VariantRow<'inner> {
    pub(crate) id: &'inner str,
    pub(crate) calls: &'inner [GenotypeCall],
}

impl<'inner> VariantRow<'inner> {
    pub fn id(&self) -> &'inner str {
        self.id
    }

    pub fn calls(&self) -> &'inner [GenotypeCall] {
        self.calls
    }

    pub fn num_samples(&self) -> usize {
        self.calls.len()
    }
}

impl<'inner> Iterator for VariantRowsIter<'inner> {
    type Item = VariantRow<'inner>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_row_ind.0 >= self.next_row_ind.1 {
            return None;
        }
        let ret = self.inner.row(self.next_row_ind.0)?;

        self.next_row_ind.0 += 1;
        Some(ret)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len(), Some(self.len()))
    }

    fn count(self) -> usize {
        self.len()
    }

    fn last(mut self) -> Option<Self::Item> {
        self.next_back()
    }

    // recall that skip uses this internally
    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.next_row_ind.0 = self.next_row_ind.0.saturating_add(n).min(self.next_row_ind.1);
        self.next()
    }
}

impl DoubleEndedIterator for VariantRowsIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.next_row_ind.0 >= self.next_row_ind.1 {
            return None;
        }
        self.next_row_ind.1 -= 1;
        self.inner.row(self.next_row_ind.1)
    }

    fn nth_back(&mut self, n: usize) -> Option<Self::Item> {
        self.next_row_ind.1 = self.next_row_ind.1.saturating_sub(n).max(self.next_row_ind.0);
        self.next_back()
    }
}

impl ExactSizeIterator for VariantRowsIter<'_> {
    fn len(&self) -> usize {
        self.next_row_ind.1.saturating_sub(self.next_row_ind.0)
    }
}

#[cfg(test)]
fn make_nonempty_array() -> GenotypeArray {
    use crate::RawCall;

    GenotypeArray::from_tabular((0..4).map(|i| {
        (
            format!("rs{i}"),
            vec![RawCall::unphased(0, i % 2), RawCall::unphased(1, 1)],
        )
    }))
    .unwrap()
}

#[test]
fn test_iteration_over_empty() {
    let array = GenotypeArray::builder(Vec::<String>::new()).build();
    assert_eq!(array.iter().count(), 0);
    assert_eq!(array.iter().rev().count(), 0);
}

#[test]
fn test_iter_count() {
    let array = make_nonempty_array();
    assert_eq!(array.iter().count(), array.num_variants());
    assert_eq!(
        array
            .iter()
            .filter(|row| row.calls()[0] == GenotypeCall::HET)
            .count(),
        2
    );

    let mut iter = array.iter();
    let _ = iter.next().unwrap();
    assert_eq!(iter.count(), 3);
}

#[test]
fn test_nth() {
    let array = make_nonempty_array();
    let mut iter = array.iter();
    assert_eq!(iter.nth(2), array.row(2));
    let mut iter = array.iter();
    let _ = iter.next().unwrap();
    assert_eq!(iter.nth(1), array.row(2));
    assert_eq!(array.iter().nth(10), None);
}

#[test]
fn test_nth_back() {
    let array = make_nonempty_array();
    let mut iter = array.iter();
    assert_eq!(iter.nth_back(0), array.row(3));
    assert_eq!(iter.nth_back(2), array.row(0));
    assert!(iter.next().is_none());
}

#[test]
fn test_exhaust_from_both_ends() {
    let array = make_nonempty_array();
    let mut iter = array.iter();
    assert_eq!(iter.next().map(|r| r.id()), Some("rs0"));
    assert_eq!(iter.next_back().map(|r| r.id()), Some("rs3"));
    assert_eq!(iter.len(), 2);
    assert_eq!(iter.next().map(|r| r.id()), Some("rs1"));
    assert_eq!(iter.next_back().map(|r| r.id()), Some("rs2"));
    assert!(iter.next_back().is_none());
    assert!(iter.next().is_none());
}
