//! Identifier types
//!
//! - AggregateId: `(tenant, aggregate type, aggregate id)`, the natural key of one event stream
//! - ProjectionId: `(tenant, projection id)`
//! - QueueKey: `(event id, tenant, projection id)`, unique key of a projection-queue row
//!
//! All identifiers order field by field so that `BTreeMap` range scans over a
//! prefix (tenant, or tenant + type) are contiguous.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Natural key of one event stream
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AggregateId {
    /// Tenant identifier (top-level isolation)
    pub tenant_id: String,
    /// Aggregate type, e.g. "contract"
    pub aggregate_type: String,
    /// Identifier of the aggregate within its type
    pub aggregate_id: String,
}

impl AggregateId {
    /// Create a new aggregate id
    pub fn new(
        tenant_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
        }
    }

    /// `(tenant, type)` prefix of this id
    pub fn type_key(&self) -> (String, String) {
        (self.tenant_id.clone(), self.aggregate_type.clone())
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.tenant_id, self.aggregate_type, self.aggregate_id
        )
    }
}

/// Identifier of a projection inside a tenant
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectionId {
    /// Tenant identifier
    pub tenant_id: String,
    /// Projection name, shared across tenants
    pub projection_id: String,
}

impl ProjectionId {
    /// Create a new projection id
    pub fn new(tenant_id: impl Into<String>, projection_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            projection_id: projection_id.into(),
        }
    }
}

impl fmt::Display for ProjectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.projection_id)
    }
}

/// Unique key of a projection-queue row
///
/// Field order matches the table's unique index: event id first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueKey {
    /// Id of the queued event
    pub event_id: String,
    /// Tenant of the projection
    pub tenant_id: String,
    /// Projection the entry is queued for
    pub projection_id: String,
}

impl QueueKey {
    /// Build the queue key of `event_id` for `projection`
    pub fn new(event_id: impl Into<String>, projection: &ProjectionId) -> Self {
        Self {
            event_id: event_id.into(),
            tenant_id: projection.tenant_id.clone(),
            projection_id: projection.projection_id.clone(),
        }
    }

    /// The projection this entry belongs to
    pub fn projection(&self) -> ProjectionId {
        ProjectionId::new(self.tenant_id.clone(), self.projection_id.clone())
    }
}
