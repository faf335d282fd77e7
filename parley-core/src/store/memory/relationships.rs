use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::{ParleyError, Result};
use crate::pagination::{Page, PageRequest};
use crate::store::{authorize_transition, RelationshipStore};
use crate::types::{AccountPair, Relationship, RelationshipId, RelationshipStatus};

#[derive(Default)]
struct RelationshipTable {
    next_id: RelationshipId,
    records: HashMap<RelationshipId, Relationship>,
    by_pair: HashMap<AccountPair, RelationshipId>,
}

impl RelationshipTable {
    fn remove(&mut self, id: RelationshipId) -> Option<Relationship> {
        let record = self.records.remove(&id)?;
        self.by_pair.remove(&record.pair());
        Some(record)
    }

    fn close_pending(
        &mut self,
        id: RelationshipId,
        caller: &str,
        outcome: RelationshipStatus,
    ) -> Result<Relationship> {
        let record = self
            .records
            .get(&id)
            .ok_or(ParleyError::RelationshipNotFound(id))?;
        authorize_transition(record, caller, outcome)?;

        let mut closed = self.remove(id).ok_or(ParleyError::RelationshipNotFound(id))?;
        closed.status = outcome;
        closed.updated_at = Utc::now();
        Ok(closed)
    }
}

#[derive(Default)]
pub struct MemoryRelationshipStore {
    table: Mutex<RelationshipTable>,
}

impl MemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationshipStore for MemoryRelationshipStore {
    async fn create_pending(&self, actor: &str, target: &str) -> Result<Relationship> {
        if actor == target {
            return Err(ParleyError::InvalidSelfReference);
        }

        let key = AccountPair::new(actor, target);
        let mut table = self.table.lock();
        if let Some(existing) = table.by_pair.get(&key).and_then(|id| table.records.get(id)) {
            return Err(ParleyError::RelationshipExists { status: existing.status });
        }

        table.next_id += 1;
        let now = Utc::now();
        let relationship = Relationship {
            id: table.next_id,
            actor_account_id: actor.to_string(),
            target_account_id: target.to_string(),
            status: RelationshipStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        table.by_pair.insert(key, relationship.id);
        table.records.insert(relationship.id, relationship.clone());
        Ok(relationship)
    }

    async fn accept(&self, relationship_id: RelationshipId, caller: &str) -> Result<Relationship> {
        let mut table = self.table.lock();
        let record = table
            .records
            .get_mut(&relationship_id)
            .ok_or(ParleyError::RelationshipNotFound(relationship_id))?;
        authorize_transition(record, caller, RelationshipStatus::Accepted)?;

        record.status = RelationshipStatus::Accepted;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn decline(&self, relationship_id: RelationshipId, caller: &str) -> Result<Relationship> {
        self.table
            .lock()
            .close_pending(relationship_id, caller, RelationshipStatus::Rejected)
    }

    async fn cancel(&self, relationship_id: RelationshipId, caller: &str) -> Result<Relationship> {
        self.table
            .lock()
            .close_pending(relationship_id, caller, RelationshipStatus::Cancelled)
    }

    async fn list_pending(&self, account_id: &str, page: PageRequest) -> Result<Page<Relationship>> {
        let mut matching: Vec<Relationship> = self
            .table
            .lock()
            .records
            .values()
            .filter(|r| r.status == RelationshipStatus::Pending && r.target_account_id == account_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page.slice(matching))
    }

    async fn list_accepted(&self, account_id: &str, page: PageRequest) -> Result<Page<Relationship>> {
        let mut matching: Vec<Relationship> = self
            .table
            .lock()
            .records
            .values()
            .filter(|r| r.status == RelationshipStatus::Accepted && r.involves(account_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(page.slice(matching))
    }

    async fn find_between(&self, a: &str, b: &str) -> Result<Option<Relationship>> {
        let table = self.table.lock();
        Ok(table
            .by_pair
            .get(&AccountPair::new(a, b))
            .and_then(|id| table.records.get(id))
            .cloned())
    }

    async fn delete(&self, a: &str, b: &str) -> Result<Relationship> {
        let mut table = self.table.lock();
        let id = table
            .by_pair
            .get(&AccountPair::new(a, b))
            .copied()
            .ok_or_else(|| ParleyError::NoRelationship(a.to_string(), b.to_string()))?;
        table
            .remove(id)
            .ok_or_else(|| ParleyError::NoRelationship(a.to_string(), b.to_string()))
    }
}
