//! Full-factorial enumeration of parameter spans.
//!
//! Points come out in lexicographic product order: the first-inserted span
//! varies slowest and the last-inserted span varies fastest.

use indexmap::IndexMap;
use reprosim_codec::Scalar;

/// Parameter name to ordered candidate values, in insertion order.
pub type Spans = IndexMap<String, Vec<Scalar>>;

/// Named argument values for one model call.
pub type Bindings = IndexMap<String, Scalar>;

/// One combination of span values.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    /// Position in enumeration order, starting at zero.
    pub index: usize,
    pub bindings: Bindings,
}

/// Restartable view over the Cartesian product of a set of spans.
#[derive(Debug, Clone, Copy)]
pub struct Grid<'a> {
    spans: &'a Spans,
}

impl<'a> Grid<'a> {
    pub fn new(spans: &'a Spans) -> Self {
        Self { spans }
    }

    /// Number of grid points: the product of all span lengths.
    ///
    /// Any empty span makes the whole grid empty. No spans at all yields a
    /// single point with no bindings.
    pub fn len(&self) -> usize {
        self.spans
            .values()
            .map(Vec::len)
            .try_fold(1usize, |acc, n| acc.checked_mul(n))
            .unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a fresh enumeration.
    pub fn iter(&self) -> GridIter<'a> {
        let cursor = if self.spans.values().any(Vec::is_empty) {
            None
        } else {
            Some(vec![0; self.spans.len()])
        };
        GridIter {
            spans: self.spans,
            cursor,
            next_index: 0,
        }
    }
}

impl<'a> IntoIterator for Grid<'a> {
    type Item = GridPoint;
    type IntoIter = GridIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Odometer over span indices.
#[derive(Debug, Clone)]
pub struct GridIter<'a> {
    spans: &'a Spans,
    cursor: Option<Vec<usize>>,
    next_index: usize,
}

impl Iterator for GridIter<'_> {
    type Item = GridPoint;

    fn next(&mut self) -> Option<GridPoint> {
        let cursor = self.cursor.as_mut()?;

        let bindings: Bindings = self
            .spans
            .iter()
            .zip(cursor.iter())
            .map(|((name, values), &i)| (name.clone(), values[i].clone()))
            .collect();

        let point = GridPoint {
            index: self.next_index,
            bindings,
        };
        self.next_index += 1;

        // Advance: rightmost dimension fastest, carry leftwards.
        let lens: Vec<usize> = self.spans.values().map(Vec::len).collect();
        let mut exhausted = true;
        for dim in (0..cursor.len()).rev() {
            cursor[dim] += 1;
            if cursor[dim] < lens[dim] {
                exhausted = false;
                break;
            }
            cursor[dim] = 0;
        }
        if exhausted {
            self.cursor = None;
        }

        Some(point)
    }
}
