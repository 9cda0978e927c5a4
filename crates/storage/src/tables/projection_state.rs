//! Projection-state table, keyed by (tenant, projection id)

use crate::index::SecondaryIndex;
use bitempo_core::{ProjectionId, ProjectionState};
use std::collections::BTreeMap;

/// Projection state rows with a tenant index
#[derive(Debug, Clone, Default)]
pub struct ProjectionStateTable {
    rows: BTreeMap<ProjectionId, ProjectionState>,
    by_tenant: SecondaryIndex<String, ProjectionId>,
}

impl ProjectionStateTable {
    /// Insert or overwrite a state row
    pub fn upsert(&mut self, state: ProjectionState) {
        self.by_tenant
            .insert(state.id.tenant_id.clone(), state.id.clone());
        self.rows.insert(state.id.clone(), state);
    }

    /// State by key
    pub fn get(&self, id: &ProjectionId) -> Option<&ProjectionState> {
        self.rows.get(id)
    }

    /// Remove one state row
    pub fn delete(&mut self, id: &ProjectionId) -> Option<ProjectionState> {
        let removed = self.rows.remove(id);
        if removed.is_some() {
            self.by_tenant.remove(&id.tenant_id, id);
        }
        removed
    }

    /// States of one tenant
    pub fn for_tenant(&self, tenant_id: &str) -> Vec<&ProjectionState> {
        self.by_tenant
            .get(&tenant_id.to_string())
            .filter_map(|id| self.rows.get(id))
            .collect()
    }

    /// Every state row
    pub fn all(&self) -> impl Iterator<Item = &ProjectionState> + '_ {
        self.rows.values()
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
