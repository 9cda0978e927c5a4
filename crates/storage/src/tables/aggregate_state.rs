//! Aggregate-state table, keyed by (tenant, type, aggregate id)

use crate::index::SecondaryIndex;
use bitempo_core::{AggregateId, AggregateState};
use std::collections::BTreeMap;

/// Per-stream summary rows with tenant and type indexes
#[derive(Debug, Clone, Default)]
pub struct AggregateStateTable {
    rows: BTreeMap<AggregateId, AggregateState>,
    by_type: SecondaryIndex<(String, String), AggregateId>,
    by_tenant: SecondaryIndex<String, AggregateId>,
}

impl AggregateStateTable {
    /// Insert or overwrite the state of `state.id`
    pub fn upsert(&mut self, state: AggregateState) {
        let id = state.id.clone();
        self.by_type.insert(id.type_key(), id.clone());
        self.by_tenant.insert(id.tenant_id.clone(), id.clone());
        self.rows.insert(id, state);
    }

    /// State by key
    pub fn get(&self, id: &AggregateId) -> Option<&AggregateState> {
        self.rows.get(id)
    }

    /// Mutable state by key
    pub fn get_mut(&mut self, id: &AggregateId) -> Option<&mut AggregateState> {
        self.rows.get_mut(id)
    }

    /// Remove the state of one stream
    pub fn delete(&mut self, id: &AggregateId) -> Option<AggregateState> {
        let removed = self.rows.remove(id);
        if removed.is_some() {
            self.by_type.remove(&id.type_key(), id);
            self.by_tenant.remove(&id.tenant_id, id);
        }
        removed
    }

    /// States of one aggregate type within a tenant
    pub fn for_type(&self, tenant_id: &str, aggregate_type: &str) -> Vec<&AggregateState> {
        let key = (tenant_id.to_string(), aggregate_type.to_string());
        self.by_type
            .get(&key)
            .filter_map(|id| self.rows.get(id))
            .collect()
    }

    /// All states of a tenant
    pub fn for_tenant(&self, tenant_id: &str) -> Vec<&AggregateState> {
        self.by_tenant
            .get(&tenant_id.to_string())
            .filter_map(|id| self.rows.get(id))
            .collect()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
