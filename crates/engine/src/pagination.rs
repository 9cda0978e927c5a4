//! Search, sort and cursor pagination over event collections
//!
//! Pure functions: nothing here touches storage.
//!
//! Field coercion:
//! - `id`, `tenant_id`, `aggregate_type`, `aggregate_id`, `event_type`, `class`: strings,
//!   compared lexicographically
//! - `version`: unsigned integer
//! - `transaction_time`, `valid_time`: RFC 3339 timestamps
//! - `from_migration`: boolean, equality operators only
//!
//! A row's key tuple is its sort-field values in sort order followed by its
//! stream key (tenant, aggregate type, aggregate id) and its id. Event ids are
//! unique only within a stream, so the stream key is what makes the tuple
//! unique across a tenant. Cursors carry that tuple in string form.

use std::cmp::Ordering;

use bitempo_core::{
    BitempoError, BitempoResult, Cursor, Direction, Operator, PageCursors, PageSpec,
    PersistenceEvent, SearchCriterion, SortKey, Time,
};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

// ============================================================================
// Fields
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    TenantId,
    AggregateType,
    AggregateId,
    EventType,
    Class,
    Version,
    TransactionTime,
    ValidTime,
    FromMigration,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum FieldValue {
    Text(String),
    Integer(u64),
    Timestamp(Time),
    Bool(bool),
}

impl Field {
    fn parse(name: &str) -> BitempoResult<Self> {
        Ok(match name {
            "id" => Field::Id,
            "tenant_id" => Field::TenantId,
            "aggregate_type" => Field::AggregateType,
            "aggregate_id" => Field::AggregateId,
            "event_type" => Field::EventType,
            "class" => Field::Class,
            "version" => Field::Version,
            "transaction_time" => Field::TransactionTime,
            "valid_time" => Field::ValidTime,
            "from_migration" => Field::FromMigration,
            other => {
                return Err(BitempoError::invalid_input(format!(
                    "unknown field '{}'",
                    other
                )))
            }
        })
    }

    fn value(&self, event: &PersistenceEvent) -> FieldValue {
        match self {
            Field::Id => FieldValue::Text(event.id.clone()),
            Field::TenantId => FieldValue::Text(event.tenant_id.clone()),
            Field::AggregateType => FieldValue::Text(event.aggregate_type.clone()),
            Field::AggregateId => FieldValue::Text(event.aggregate_id.clone()),
            Field::EventType => FieldValue::Text(event.event_type.clone()),
            Field::Class => FieldValue::Text(event.class.as_str().to_string()),
            Field::Version => FieldValue::Integer(event.version),
            Field::TransactionTime => FieldValue::Timestamp(event.transaction_time),
            Field::ValidTime => FieldValue::Timestamp(event.valid_time),
            Field::FromMigration => FieldValue::Bool(event.from_migration),
        }
    }

    fn parse_value(&self, raw: &str) -> BitempoResult<FieldValue> {
        match self {
            Field::Version => raw.parse::<u64>().map(FieldValue::Integer).map_err(|e| {
                BitempoError::invalid_input(format!("version '{}' is not an integer: {}", raw, e))
            }),
            Field::TransactionTime | Field::ValidTime => DateTime::parse_from_rfc3339(raw)
                .map(|t| FieldValue::Timestamp(t.with_timezone(&Utc)))
                .map_err(|e| {
                    BitempoError::invalid_input(format!(
                        "'{}' is not an RFC 3339 timestamp: {}",
                        raw, e
                    ))
                }),
            Field::FromMigration => raw.parse::<bool>().map(FieldValue::Bool).map_err(|_| {
                BitempoError::invalid_input(format!("from_migration '{}' is not a boolean", raw))
            }),
            _ => Ok(FieldValue::Text(raw.to_string())),
        }
    }
}

impl FieldValue {
    fn render(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(n) => n.to_string(),
            FieldValue::Timestamp(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            FieldValue::Bool(b) => b.to_string(),
        }
    }
}

// ============================================================================
// Filter
// ============================================================================

enum Test {
    Compare(Operator, FieldValue),
    Matches(Regex),
}

struct Predicate {
    field: Field,
    test: Test,
}

impl Predicate {
    fn compile(criterion: &SearchCriterion) -> BitempoResult<Self> {
        let field = Field::parse(&criterion.field)?;
        if field == Field::FromMigration
            && !matches!(criterion.operator, Operator::Equal | Operator::NotEqual)
        {
            return Err(BitempoError::invalid_input(
                "from_migration supports only equal and not-equal",
            ));
        }
        let test = match criterion.operator {
            Operator::Regex => Test::Matches(Regex::new(&criterion.value).map_err(|e| {
                BitempoError::invalid_input(format!(
                    "invalid regex '{}': {}",
                    criterion.value, e
                ))
            })?),
            op => Test::Compare(op, field.parse_value(&criterion.value)?),
        };
        Ok(Self { field, test })
    }

    fn holds(&self, event: &PersistenceEvent) -> bool {
        let actual = self.field.value(event);
        match &self.test {
            Test::Matches(re) => re.is_match(&actual.render()),
            Test::Compare(op, expected) => {
                let ord = actual.cmp(expected);
                match op {
                    Operator::Equal => ord == Ordering::Equal,
                    Operator::NotEqual => ord != Ordering::Equal,
                    Operator::Greater => ord == Ordering::Greater,
                    Operator::GreaterOrEqual => ord != Ordering::Less,
                    Operator::Less => ord == Ordering::Less,
                    Operator::LessOrEqual => ord != Ordering::Greater,
                    Operator::Regex => false,
                }
            }
        }
    }
}

/// Keep the events satisfying every criterion
pub fn filter(
    events: Vec<PersistenceEvent>,
    criteria: &[SearchCriterion],
) -> BitempoResult<Vec<PersistenceEvent>> {
    let predicates = criteria
        .iter()
        .map(Predicate::compile)
        .collect::<BitempoResult<Vec<_>>>()?;
    Ok(events
        .into_iter()
        .filter(|e| predicates.iter().all(|p| p.holds(e)))
        .collect())
}

// ============================================================================
// Sort
// ============================================================================

/// Ascending tiebreak after the requested sort keys
const ROW_IDENTITY: [Field; 4] = [
    Field::TenantId,
    Field::AggregateType,
    Field::AggregateId,
    Field::Id,
];

struct RowOrder {
    keys: Vec<(Field, bool)>,
}

impl RowOrder {
    fn compile(keys: &[SortKey]) -> BitempoResult<Self> {
        let keys = keys
            .iter()
            .map(|k| Ok((Field::parse(&k.field)?, k.descending)))
            .collect::<BitempoResult<Vec<_>>>()?;
        Ok(Self { keys })
    }

    fn compare(&self, a: &PersistenceEvent, b: &PersistenceEvent) -> Ordering {
        self.keys
            .iter()
            .map(|(field, descending)| {
                let ord = field.value(a).cmp(&field.value(b));
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
            .chain(
                ROW_IDENTITY
                    .iter()
                    .map(|field| field.value(a).cmp(&field.value(b))),
            )
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    fn key_fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.keys
            .iter()
            .map(|(field, _)| *field)
            .chain(ROW_IDENTITY)
    }

    fn key_of(&self, event: &PersistenceEvent) -> Vec<FieldValue> {
        self.key_fields().map(|field| field.value(event)).collect()
    }

    fn parse_key(&self, cursor: &Cursor) -> BitempoResult<Vec<FieldValue>> {
        let expected = self.keys.len() + ROW_IDENTITY.len();
        if cursor.values.len() != expected {
            return Err(BitempoError::invalid_input(format!(
                "cursor has {} values, expected {}",
                cursor.values.len(),
                expected
            )));
        }
        self.key_fields()
            .zip(&cursor.values)
            .map(|(field, raw)| field.parse_value(raw))
            .collect()
    }

    fn cursor_for(&self, event: &PersistenceEvent, direction: Direction) -> Cursor {
        Cursor::new(
            self.key_of(event).iter().map(FieldValue::render).collect(),
            direction,
        )
    }
}

/// Stable sort by `keys`, most significant first, then by stream key and id
pub fn sort(events: &mut [PersistenceEvent], keys: &[SortKey]) -> BitempoResult<()> {
    let ordering = RowOrder::compile(keys)?;
    events.sort_by(|a, b| ordering.compare(a, b));
    Ok(())
}

// ============================================================================
// Paginate
// ============================================================================

/// Filter, sort and cut one page out of `events`
///
/// An empty cursor with page size 0 returns every matching row. A `Forward`
/// cursor yields rows strictly after its anchor, a `Backward` cursor rows
/// strictly before it; an empty `Backward` cursor reads from the end.
pub fn paginate(
    events: Vec<PersistenceEvent>,
    spec: &PageSpec,
) -> BitempoResult<(Vec<PersistenceEvent>, PageCursors)> {
    let ordering = RowOrder::compile(&spec.sort)?;
    let mut rows = filter(events, &spec.search)?;
    rows.sort_by(|a, b| ordering.compare(a, b));

    let anchor = if spec.cursor.is_empty() {
        None
    } else {
        let key = ordering.parse_key(&spec.cursor)?;
        let position = rows
            .iter()
            .position(|e| ordering.key_of(e) == key)
            .ok_or_else(|| BitempoError::invalid_input("cursor matches no row"))?;
        Some(position)
    };

    let (start, end) = window(rows.len(), anchor, spec.cursor.direction, spec.page_size);
    let cursors = PageCursors {
        previous: (start > 0 && start < end)
            .then(|| ordering.cursor_for(&rows[start], Direction::Backward)),
        next: (end < rows.len() && start < end)
            .then(|| ordering.cursor_for(&rows[end - 1], Direction::Forward)),
    };

    rows.truncate(end);
    let page = rows.split_off(start);
    Ok((page, cursors))
}

/// `[start, end)` of the page within `len` sorted rows
fn window(
    len: usize,
    anchor: Option<usize>,
    direction: Direction,
    page_size: usize,
) -> (usize, usize) {
    match direction {
        Direction::Forward => {
            let start = anchor.map_or(0, |a| a + 1);
            let end = if page_size == 0 {
                len
            } else {
                start.saturating_add(page_size).min(len)
            };
            (start, end)
        }
        Direction::Backward => {
            let end = anchor.unwrap_or(len);
            let start = if page_size == 0 {
                0
            } else {
                end.saturating_sub(page_size)
            };
            (start, end)
        }
    }
}
