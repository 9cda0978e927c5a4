//! Persistence events
//!
//! A `PersistenceEvent` is one bitemporal fact in an aggregate's stream. The
//! same type is stored in the event table, the snapshot table and (tagged with
//! a projection id) the projection queue.
//!
//! ## Ordering
//!
//! Within a stream, `(valid_time, version)` is the canonical replay order.

use crate::types::AggregateId;
use crate::Time;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Classification of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClass {
    /// First event of a stream
    Create,
    /// Regular change, valid from the time it was recorded
    Patch,
    /// Correction of a past valid time, recorded after the fact
    HistoricalPatch,
    /// Change scheduled for a valid time ahead of its recording
    FuturePatch,
    /// Closes the stream
    Delete,
    /// Tombstone; never returned by a load
    DeletePatch,
}

impl EventClass {
    /// Stable string form, also used by the search evaluator
    pub fn as_str(&self) -> &'static str {
        match self {
            EventClass::Create => "create",
            EventClass::Patch => "patch",
            EventClass::HistoricalPatch => "historical_patch",
            EventClass::FuturePatch => "future_patch",
            EventClass::Delete => "delete",
            EventClass::DeletePatch => "delete_patch",
        }
    }

    /// Historical and future patches span an interval between their two timelines
    pub fn is_interval_patch(&self) -> bool {
        matches!(self, EventClass::HistoricalPatch | EventClass::FuturePatch)
    }
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(EventClass::Create),
            "patch" => Ok(EventClass::Patch),
            "historical_patch" => Ok(EventClass::HistoricalPatch),
            "future_patch" => Ok(EventClass::FuturePatch),
            "delete" => Ok(EventClass::Delete),
            "delete_patch" => Ok(EventClass::DeletePatch),
            other => Err(format!("unknown event class '{}'", other)),
        }
    }
}

/// One fact of an aggregate's event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceEvent {
    /// Event id, unique within its stream
    pub id: String,
    /// Tenant of the stream
    pub tenant_id: String,
    /// Aggregate type of the stream
    pub aggregate_type: String,
    /// Aggregate id of the stream
    pub aggregate_id: String,
    /// Position in the stream, monotonically increasing
    pub version: u64,
    /// Event type tag, resolved by an `EventRegistry` at decode time
    pub event_type: String,
    /// Classification
    pub class: EventClass,
    /// When the fact was recorded
    pub transaction_time: Time,
    /// When the fact holds in the modeled world
    pub valid_time: Time,
    /// Opaque payload
    pub data: serde_json::Value,
    /// Written by a data migration rather than a command
    #[serde(default)]
    pub from_migration: bool,
}

impl PersistenceEvent {
    /// Create an event for `stream` with a fresh UUID v4 id
    pub fn new(
        stream: &AggregateId,
        version: u64,
        event_type: impl Into<String>,
        class: EventClass,
        transaction_time: Time,
        valid_time: Time,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: stream.tenant_id.clone(),
            aggregate_type: stream.aggregate_type.clone(),
            aggregate_id: stream.aggregate_id.clone(),
            version,
            event_type: event_type.into(),
            class,
            transaction_time,
            valid_time,
            data,
            from_migration: false,
        }
    }

    /// Replace the generated id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Mark the event as written by a migration
    pub fn with_from_migration(mut self, from_migration: bool) -> Self {
        self.from_migration = from_migration;
        self
    }

    /// The stream this event belongs to
    pub fn stream(&self) -> AggregateId {
        AggregateId::new(
            self.tenant_id.clone(),
            self.aggregate_type.clone(),
            self.aggregate_id.clone(),
        )
    }

    /// Canonical replay position
    pub fn replay_key(&self) -> (Time, u64) {
        (self.valid_time, self.version)
    }

    /// Tombstones are never returned by a load
    pub fn is_tombstone(&self) -> bool {
        self.class == EventClass::DeletePatch
    }

    /// `(min, max)` of the two timelines
    pub fn time_bounds(&self) -> (Time, Time) {
        if self.valid_time <= self.transaction_time {
            (self.valid_time, self.transaction_time)
        } else {
            (self.transaction_time, self.valid_time)
        }
    }
}
