//! Pagination and search request types
//!
//! These types describe a page request over a collection of events; the
//! evaluator that applies them lives in the engine crate.

use serde::{Deserialize, Serialize};

/// Comparison operator of a search criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// `field == value`
    Equal,
    /// `field != value`
    NotEqual,
    /// `field > value`
    Greater,
    /// `field >= value`
    GreaterOrEqual,
    /// `field < value`
    Less,
    /// `field <= value`
    LessOrEqual,
    /// `field` matches the regular expression `value`
    Regex,
}

/// One `(field, operator, value)` predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriterion {
    /// Field name, e.g. `"valid_time"`
    pub field: String,
    /// Operator
    pub operator: Operator,
    /// Right-hand side, coerced to the field's type
    pub value: String,
}

impl SearchCriterion {
    /// Create a criterion
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Field name
    pub field: String,
    /// Sort descending instead of ascending
    #[serde(default)]
    pub descending: bool,
}

impl SortKey {
    /// Ascending sort on `field`
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending sort on `field`
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Paging direction relative to the cursor row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Rows after the cursor
    #[default]
    Forward,
    /// Rows before the cursor
    Backward,
}

/// Position in a sorted result
///
/// `values` is the key tuple of a row: its sort-field values in sort order,
/// followed by its id. An empty tuple means "from the beginning".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cursor {
    /// Key tuple of the anchor row
    #[serde(default)]
    pub values: Vec<String>,
    /// Which side of the anchor to read
    #[serde(default)]
    pub direction: Direction,
}

impl Cursor {
    /// Cursor anchored at `values`
    pub fn new(values: Vec<String>, direction: Direction) -> Self {
        Self { values, direction }
    }

    /// True if the cursor has no anchor row
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A page request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageSpec {
    /// Maximum rows per page; 0 means unbounded
    #[serde(default)]
    pub page_size: usize,
    /// Anchor and direction
    #[serde(default)]
    pub cursor: Cursor,
    /// Predicates, all of which must hold
    #[serde(default)]
    pub search: Vec<SearchCriterion>,
    /// Sort keys, most significant first
    #[serde(default)]
    pub sort: Vec<SortKey>,
}

impl PageSpec {
    /// Everything, unsorted beyond the id tiebreaker
    pub fn all() -> Self {
        Self::default()
    }

    /// Set the page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the cursor
    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = cursor;
        self
    }

    /// Add a predicate
    pub fn with_search(mut self, criterion: SearchCriterion) -> Self {
        self.search.push(criterion);
        self
    }

    /// Add a sort key
    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }
}

/// Cursors to the neighbouring pages of a result
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageCursors {
    /// Page before the first returned row, if any rows precede it
    pub previous: Option<Cursor>,
    /// Page after the last returned row, if any rows follow it
    pub next: Option<Cursor>,
}
