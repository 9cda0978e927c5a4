//! Time-span algebra
//!
//! `Span<T>` is an interval whose two ends are independently inclusive or
//! exclusive; it may be empty. `Spans<T>` is a normalized collection: sorted by
//! start, pairwise disjoint, never touching, and free of empty members.
//!
//! The loader derives one span per patch event, unions them, and subtracts the
//! result from a search window to find patch-free periods:
//!
//! ```
//! use bitempo_core::{Span, Spans};
//!
//! let window = Span::closed(0, 100);
//! let patches = Spans::from_spans([Span::closed(20, 30)]);
//! let free = Spans::from_span(window).except(&patches);
//! assert_eq!(free.as_slice(), &[Span::closed_open(0, 20), Span::open_closed(30, 100)]);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Whether an end point belongs to the span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundKind {
    /// The end point is part of the span
    Inclusive,
    /// The end point is not part of the span
    Exclusive,
}

impl BoundKind {
    fn flip(self) -> Self {
        match self {
            BoundKind::Inclusive => BoundKind::Exclusive,
            BoundKind::Exclusive => BoundKind::Inclusive,
        }
    }
}

/// An interval over an ordered domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span<T> {
    start: T,
    end: T,
    start_bound: BoundKind,
    end_bound: BoundKind,
}

impl<T: Ord + Copy> Span<T> {
    /// Span with explicit bound kinds
    pub fn new(start: T, start_bound: BoundKind, end: T, end_bound: BoundKind) -> Self {
        Self {
            start,
            end,
            start_bound,
            end_bound,
        }
    }

    /// `[start, end]`
    pub fn closed(start: T, end: T) -> Self {
        Self::new(start, BoundKind::Inclusive, end, BoundKind::Inclusive)
    }

    /// `(start, end)`
    pub fn open(start: T, end: T) -> Self {
        Self::new(start, BoundKind::Exclusive, end, BoundKind::Exclusive)
    }

    /// `[start, end)`
    pub fn closed_open(start: T, end: T) -> Self {
        Self::new(start, BoundKind::Inclusive, end, BoundKind::Exclusive)
    }

    /// `(start, end]`
    pub fn open_closed(start: T, end: T) -> Self {
        Self::new(start, BoundKind::Exclusive, end, BoundKind::Inclusive)
    }

    /// Start point
    pub fn start(&self) -> T {
        self.start
    }

    /// End point
    pub fn end(&self) -> T {
        self.end
    }

    /// Bound kind of the start point
    pub fn start_bound(&self) -> BoundKind {
        self.start_bound
    }

    /// Bound kind of the end point
    pub fn end_bound(&self) -> BoundKind {
        self.end_bound
    }

    /// True if no point lies inside the span
    pub fn is_empty(&self) -> bool {
        match self.start.cmp(&self.end) {
            Ordering::Greater => true,
            Ordering::Equal => {
                self.start_bound == BoundKind::Exclusive || self.end_bound == BoundKind::Exclusive
            }
            Ordering::Less => false,
        }
    }

    /// True if `point` lies inside the span
    pub fn contains(&self, point: T) -> bool {
        let after_start = match self.start_bound {
            BoundKind::Inclusive => point >= self.start,
            BoundKind::Exclusive => point > self.start,
        };
        let before_end = match self.end_bound {
            BoundKind::Inclusive => point <= self.end,
            BoundKind::Exclusive => point < self.end,
        };
        after_start && before_end
    }

    /// Points common to both spans
    pub fn intersection(&self, other: &Span<T>) -> Span<T> {
        let (start, start_bound) = if cmp_start(self, other) == Ordering::Less {
            (other.start, other.start_bound)
        } else {
            (self.start, self.start_bound)
        };
        let (end, end_bound) = if cmp_end(self, other) == Ordering::Greater {
            (other.end, other.end_bound)
        } else {
            (self.end, self.end_bound)
        };
        Span::new(start, start_bound, end, end_bound)
    }

    /// Points in either span; one span when they overlap or touch, two otherwise
    pub fn union(&self, other: &Span<T>) -> Spans<T> {
        Spans::from_spans([*self, *other])
    }

    /// Points of `self` not in `other`; splitting yields two spans
    pub fn except(&self, other: &Span<T>) -> Spans<T> {
        if self.is_empty() {
            return Spans::new();
        }
        if other.is_empty() || self.intersection(other).is_empty() {
            return Spans::from_span(*self);
        }
        let left = Span::new(
            self.start,
            self.start_bound,
            other.start,
            other.start_bound.flip(),
        );
        let right = Span::new(other.end, other.end_bound.flip(), self.end, self.end_bound);
        Spans::from_spans([left, right])
    }

    /// True if `other` starts no later than the end of `self` with no gap between them
    fn joins(&self, other: &Span<T>) -> bool {
        match self.end.cmp(&other.start) {
            Ordering::Greater => true,
            Ordering::Equal => {
                self.end_bound == BoundKind::Inclusive || other.start_bound == BoundKind::Inclusive
            }
            Ordering::Less => false,
        }
    }
}

/// Order two spans by where they start; an inclusive start comes first on ties
fn cmp_start<T: Ord>(a: &Span<T>, b: &Span<T>) -> Ordering {
    a.start.cmp(&b.start).then_with(|| match (a.start_bound, b.start_bound) {
        (BoundKind::Inclusive, BoundKind::Exclusive) => Ordering::Less,
        (BoundKind::Exclusive, BoundKind::Inclusive) => Ordering::Greater,
        _ => Ordering::Equal,
    })
}

/// Order two spans by where they end; an exclusive end comes first on ties
fn cmp_end<T: Ord>(a: &Span<T>, b: &Span<T>) -> Ordering {
    a.end.cmp(&b.end).then_with(|| match (a.end_bound, b.end_bound) {
        (BoundKind::Exclusive, BoundKind::Inclusive) => Ordering::Less,
        (BoundKind::Inclusive, BoundKind::Exclusive) => Ordering::Greater,
        _ => Ordering::Equal,
    })
}

impl<T: fmt::Display> fmt::Display for Span<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = match self.start_bound {
            BoundKind::Inclusive => '[',
            BoundKind::Exclusive => '(',
        };
        let close = match self.end_bound {
            BoundKind::Inclusive => ']',
            BoundKind::Exclusive => ')',
        };
        write!(f, "{}{}, {}{}", open, self.start, self.end, close)
    }
}

/// Normalized set of spans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spans<T> {
    spans: Vec<Span<T>>,
}

impl<T: Ord + Copy> Spans<T> {
    /// The empty set
    pub fn new() -> Self {
        Self { spans: Vec::new() }
    }

    /// Set holding a single span (empty if the span is)
    pub fn from_span(span: Span<T>) -> Self {
        Self::from_spans([span])
    }

    /// Normalize an arbitrary collection of spans
    pub fn from_spans(spans: impl IntoIterator<Item = Span<T>>) -> Self {
        let mut spans: Vec<Span<T>> = spans.into_iter().filter(|s| !s.is_empty()).collect();
        spans.sort_by(cmp_start);

        let mut merged: Vec<Span<T>> = Vec::with_capacity(spans.len());
        for span in spans {
            match merged.last_mut() {
                Some(last) if last.joins(&span) => {
                    if cmp_end(last, &span) == Ordering::Less {
                        last.end = span.end;
                        last.end_bound = span.end_bound;
                    }
                }
                _ => merged.push(span),
            }
        }
        Self { spans: merged }
    }

    /// Add one span
    pub fn union_span(&self, span: Span<T>) -> Self {
        Self::from_spans(self.spans.iter().copied().chain(std::iter::once(span)))
    }

    /// Remove one span
    pub fn except_span(&self, span: Span<T>) -> Self {
        Self::from_spans(self.spans.iter().flat_map(|s| s.except(&span).spans))
    }

    /// Points in either set
    pub fn union(&self, other: &Spans<T>) -> Self {
        other
            .spans
            .iter()
            .fold(self.clone(), |acc, span| acc.union_span(*span))
    }

    /// Points of `self` not in `other`
    pub fn except(&self, other: &Spans<T>) -> Self {
        other
            .spans
            .iter()
            .fold(self.clone(), |acc, span| acc.except_span(*span))
    }

    /// True if some member contains `point`
    pub fn contains(&self, point: T) -> bool {
        self.spans.iter().any(|s| s.contains(point))
    }

    /// Members in ascending order
    pub fn as_slice(&self) -> &[Span<T>] {
        &self.spans
    }

    /// Iterate over members in ascending order
    pub fn iter(&self) -> std::slice::Iter<'_, Span<T>> {
        self.spans.iter()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// True if the set contains no point
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Consume into the member list
    pub fn into_vec(self) -> Vec<Span<T>> {
        self.spans
    }
}

impl<T: Ord + Copy> Default for Spans<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Copy> FromIterator<Span<T>> for Spans<T> {
    fn from_iter<I: IntoIterator<Item = Span<T>>>(iter: I) -> Self {
        Self::from_spans(iter)
    }
}

impl<'a, T> IntoIterator for &'a Spans<T> {
    type Item = &'a Span<T>;
    type IntoIter = std::slice::Iter<'a, Span<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.spans.iter()
    }
}
