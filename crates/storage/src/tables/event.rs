//! Event table
//!
//! Rows are keyed by a strictly increasing row id assigned on insert. The row
//! id only identifies the physical row; the logical position of an event is
//! its `version`. Deleting a row requires both keys and fails if they disagree.

use super::{in_stream_prefix, stream_prefix_start};
use crate::index::SecondaryIndex;
use bitempo_core::{AggregateId, BitempoError, BitempoResult, EventClass, PersistenceEvent};
use std::collections::BTreeMap;

/// Physical row identity of an event
pub type RowId = u64;

const TABLE: &str = "event";

/// Raw event rows with their indexes
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    rows: BTreeMap<RowId, PersistenceEvent>,
    next_row_id: RowId,
    by_stream: SecondaryIndex<AggregateId, RowId>,
    by_stream_class: SecondaryIndex<(AggregateId, EventClass), RowId>,
    by_event_id: BTreeMap<(AggregateId, String), RowId>,
    by_tenant: SecondaryIndex<String, RowId>,
}

impl EventTable {
    /// Append an event, returning its new row id
    ///
    /// Fails if the stream already holds an event with the same id.
    pub fn insert(&mut self, event: PersistenceEvent) -> BitempoResult<RowId> {
        let stream = event.stream();
        let unique = (stream.clone(), event.id.clone());
        if self.by_event_id.contains_key(&unique) {
            return Err(BitempoError::UniqueViolation {
                table: TABLE,
                key: format!("{}/{}", stream, event.id),
            });
        }

        self.next_row_id += 1;
        let row_id = self.next_row_id;

        self.by_stream.insert(stream.clone(), row_id);
        self.by_stream_class
            .insert((stream, event.class), row_id);
        self.by_event_id.insert(unique, row_id);
        self.by_tenant.insert(event.tenant_id.clone(), row_id);
        self.rows.insert(row_id, event);
        Ok(row_id)
    }

    /// Overwrite the row in place, keeping its row id
    ///
    /// The replacement must carry the same stream and event id.
    pub fn replace(&mut self, row_id: RowId, event: PersistenceEvent) -> BitempoResult<()> {
        let current = self
            .rows
            .get(&row_id)
            .ok_or_else(|| BitempoError::storage(format!("event row {} does not exist", row_id)))?;
        let stream = current.stream();
        if event.stream() != stream || event.id != current.id {
            return Err(BitempoError::corruption(format!(
                "event row {} holds {}/{}, refusing to overwrite with {}/{}",
                row_id,
                stream,
                current.id,
                event.stream(),
                event.id
            )));
        }

        if current.class != event.class {
            self.by_stream_class
                .remove(&(stream.clone(), current.class), &row_id);
            self.by_stream_class.insert((stream, event.class), row_id);
        }
        self.rows.insert(row_id, event);
        Ok(())
    }

    /// Remove one row addressed by both its row id and its logical key
    pub fn delete(
        &mut self,
        row_id: RowId,
        stream: &AggregateId,
        event_id: &str,
    ) -> BitempoResult<PersistenceEvent> {
        let unique = (stream.clone(), event_id.to_string());
        match self.by_event_id.get(&unique) {
            Some(found) if *found == row_id => {}
            Some(found) => {
                return Err(BitempoError::corruption(format!(
                    "event {}/{} lives in row {}, not row {}",
                    stream, event_id, found, row_id
                )))
            }
            None => {
                return Err(BitempoError::storage(format!(
                    "event {}/{} does not exist",
                    stream, event_id
                )))
            }
        }

        let event = self.rows.remove(&row_id).ok_or_else(|| {
            BitempoError::corruption(format!("event index points at missing row {}", row_id))
        })?;
        self.by_stream.remove(stream, &row_id);
        self.by_stream_class
            .remove(&(stream.clone(), event.class), &row_id);
        self.by_event_id.remove(&unique);
        self.by_tenant.remove(&event.tenant_id, &row_id);
        Ok(event)
    }

    /// Row by id
    pub fn get(&self, row_id: RowId) -> Option<&PersistenceEvent> {
        self.rows.get(&row_id)
    }

    /// Row by stream and event id
    pub fn find(&self, stream: &AggregateId, event_id: &str) -> Option<(RowId, &PersistenceEvent)> {
        let row_id = *self
            .by_event_id
            .get(&(stream.clone(), event_id.to_string()))?;
        self.rows.get(&row_id).map(|e| (row_id, e))
    }

    /// All rows of one stream
    pub fn for_stream(&self, stream: &AggregateId) -> Vec<(RowId, &PersistenceEvent)> {
        self.resolve(self.by_stream.get(stream))
    }

    /// Rows of one stream with the given class
    pub fn for_stream_class(
        &self,
        stream: &AggregateId,
        class: EventClass,
    ) -> Vec<(RowId, &PersistenceEvent)> {
        self.resolve(self.by_stream_class.get(&(stream.clone(), class)))
    }

    /// All rows of one tenant
    pub fn for_tenant(&self, tenant_id: &str) -> Vec<(RowId, &PersistenceEvent)> {
        self.resolve(self.by_tenant.get(&tenant_id.to_string()))
    }

    /// Streams holding at least one event under the prefix
    pub fn streams<'a>(
        &'a self,
        tenant_id: &'a str,
        aggregate_type: Option<&'a str>,
    ) -> impl Iterator<Item = &'a AggregateId> + 'a {
        self.by_stream
            .keys_in(stream_prefix_start(tenant_id, aggregate_type)..)
            .take_while(move |id| in_stream_prefix(id, tenant_id, aggregate_type))
    }

    /// Next row id that an insert would assign
    pub fn next_row_id(&self) -> RowId {
        self.next_row_id + 1
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn resolve<'a>(
        &'a self,
        row_ids: impl Iterator<Item = &'a RowId>,
    ) -> Vec<(RowId, &'a PersistenceEvent)> {
        row_ids
            .filter_map(|row_id| self.rows.get(row_id).map(|e| (*row_id, e)))
            .collect()
    }
}
