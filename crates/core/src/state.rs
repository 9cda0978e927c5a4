//! Per-stream and per-projection rows

use crate::event::PersistenceEvent;
use crate::types::{AggregateId, ProjectionId, QueueKey};
use crate::Time;
use serde::{Deserialize, Serialize};

/// Summary row of one event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateState {
    /// Stream key
    pub id: AggregateId,
    /// Version of the latest event
    pub current_version: u64,
    /// Transaction time of the latest save
    pub last_transaction_time: Time,
    /// Greatest valid time seen in the stream
    pub latest_valid_time: Time,
    /// When the stream was created
    pub create_time: Time,
    /// When the stream was closed; `None` while open
    #[serde(default)]
    pub close_time: Option<Time>,
}

impl AggregateState {
    /// State of a stream created by its first event
    pub fn created(id: AggregateId, first: &PersistenceEvent) -> Self {
        Self {
            id,
            current_version: first.version,
            last_transaction_time: first.transaction_time,
            latest_valid_time: first.valid_time,
            create_time: first.transaction_time,
            close_time: None,
        }
    }

    /// Advance the summary past `event`
    pub fn record(&mut self, event: &PersistenceEvent) {
        self.current_version = self.current_version.max(event.version);
        self.last_transaction_time = self.last_transaction_time.max(event.transaction_time);
        self.latest_valid_time = self.latest_valid_time.max(event.valid_time);
    }

    /// Whether the stream has been closed
    pub fn is_closed(&self) -> bool {
        self.close_time.is_some()
    }
}

/// Persisted state row of a projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionState {
    /// Projection key
    pub id: ProjectionId,
    /// Opaque projection state
    pub state: serde_json::Value,
    /// Last time the state was written
    pub updated_at: Time,
}

/// Projection state plus the queue contents attached at read time
///
/// `events` is transient: it is never written to the projection-state table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionDto {
    /// Projection key
    pub id: ProjectionId,
    /// Opaque projection state
    pub state: serde_json::Value,
    /// Last time the state was written
    pub updated_at: Time,
    /// Pending events delivered with this read, or to enqueue on save
    #[serde(default)]
    pub events: Vec<PersistenceEvent>,
}

impl ProjectionDto {
    /// DTO without events
    pub fn new(id: ProjectionId, state: serde_json::Value, updated_at: Time) -> Self {
        Self {
            id,
            state,
            updated_at,
            events: Vec::new(),
        }
    }

    /// Attach events
    pub fn with_events(mut self, events: Vec<PersistenceEvent>) -> Self {
        self.events = events;
        self
    }

    /// The persisted part of this DTO
    pub fn to_state(&self) -> ProjectionState {
        ProjectionState {
            id: self.id.clone(),
            state: self.state.clone(),
            updated_at: self.updated_at,
        }
    }
}

impl From<ProjectionState> for ProjectionDto {
    fn from(state: ProjectionState) -> Self {
        ProjectionDto::new(state.id, state.state, state.updated_at)
    }
}

/// Undelivered event queued for one projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Target projection
    pub projection: ProjectionId,
    /// The queued event
    pub event: PersistenceEvent,
}

impl QueueEntry {
    /// Queue `event` for `projection`
    pub fn new(projection: ProjectionId, event: PersistenceEvent) -> Self {
        Self { projection, event }
    }

    /// Unique key of this entry
    pub fn key(&self) -> QueueKey {
        QueueKey::new(self.event.id.clone(), &self.projection)
    }
}
