use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use std::sync::Arc;

use super::RelationshipRow;
use crate::db::{get_connection, DbPool};
use crate::error::{ParleyError, Result};
use crate::pagination::{Page, PageRequest};
use crate::schema::relationships;
use crate::store::{authorize_transition, RelationshipStore};
use crate::types::{pair_key, Relationship, RelationshipId, RelationshipStatus};

#[derive(Insertable)]
#[diesel(table_name = relationships)]
struct NewRelationshipRow<'a> {
    actor_account_id: &'a str,
    target_account_id: &'a str,
    pair_key: &'a str,
    status: &'a str,
}

pub struct PgRelationshipStore {
    pool: Arc<DbPool>,
}

impl PgRelationshipStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Moves a PENDING edge to a terminal status and removes it, under a row lock.
    async fn close_pending(
        &self,
        relationship_id: RelationshipId,
        caller: &str,
        outcome: RelationshipStatus,
    ) -> Result<Relationship> {
        let mut conn = get_connection(&self.pool).await?;

        conn.transaction::<_, ParleyError, _>(|conn| {
            async move {
                let row: Option<RelationshipRow> = relationships::table
                    .find(relationship_id)
                    .select(RelationshipRow::as_select())
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;
                let mut record: Relationship = row
                    .ok_or(ParleyError::RelationshipNotFound(relationship_id))?
                    .try_into()?;
                authorize_transition(&record, caller, outcome)?;

                diesel::delete(relationships::table.find(relationship_id))
                    .execute(conn)
                    .await?;

                record.status = outcome;
                record.updated_at = Utc::now();
                Ok(record)
            }
            .scope_boxed()
        })
        .await
    }
}

#[async_trait]
impl RelationshipStore for PgRelationshipStore {
    async fn create_pending(&self, actor: &str, target: &str) -> Result<Relationship> {
        if actor == target {
            return Err(ParleyError::InvalidSelfReference);
        }

        let key = pair_key(actor, target);
        let mut conn = get_connection(&self.pool).await?;

        // The unique pair_key makes the existence check and the insert one statement.
        let inserted: Option<RelationshipRow> = diesel::insert_into(relationships::table)
            .values(&NewRelationshipRow {
                actor_account_id: actor,
                target_account_id: target,
                pair_key: &key,
                status: RelationshipStatus::Pending.as_str(),
            })
            .on_conflict(relationships::pair_key)
            .do_nothing()
            .returning(RelationshipRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;

        if let Some(row) = inserted {
            return row.try_into();
        }

        let existing: Option<String> = relationships::table
            .filter(relationships::pair_key.eq(&key))
            .select(relationships::status)
            .first(&mut conn)
            .await
            .optional()?;

        match existing {
            Some(status) => Err(ParleyError::RelationshipExists { status: status.parse()? }),
            None => Err(ParleyError::Storage(format!(
                "relationship {} changed concurrently, retry",
                key
            ))),
        }
    }

    async fn accept(&self, relationship_id: RelationshipId, caller: &str) -> Result<Relationship> {
        let mut conn = get_connection(&self.pool).await?;

        conn.transaction::<_, ParleyError, _>(|conn| {
            async move {
                let row: Option<RelationshipRow> = relationships::table
                    .find(relationship_id)
                    .select(RelationshipRow::as_select())
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;
                let record: Relationship = row
                    .ok_or(ParleyError::RelationshipNotFound(relationship_id))?
                    .try_into()?;
                authorize_transition(&record, caller, RelationshipStatus::Accepted)?;

                let updated: RelationshipRow = diesel::update(relationships::table.find(relationship_id))
                    .set((
                        relationships::status.eq(RelationshipStatus::Accepted.as_str()),
                        relationships::updated_at.eq(Utc::now()),
                    ))
                    .returning(RelationshipRow::as_returning())
                    .get_result(conn)
                    .await?;
                updated.try_into()
            }
            .scope_boxed()
        })
        .await
    }

    async fn decline(&self, relationship_id: RelationshipId, caller: &str) -> Result<Relationship> {
        self.close_pending(relationship_id, caller, RelationshipStatus::Rejected).await
    }

    async fn cancel(&self, relationship_id: RelationshipId, caller: &str) -> Result<Relationship> {
        self.close_pending(relationship_id, caller, RelationshipStatus::Cancelled).await
    }

    async fn list_pending(&self, account_id: &str, page: PageRequest) -> Result<Page<Relationship>> {
        let mut conn = get_connection(&self.pool).await?;
        let pending = RelationshipStatus::Pending.as_str();

        let total: i64 = relationships::table
            .filter(relationships::target_account_id.eq(account_id))
            .filter(relationships::status.eq(pending))
            .count()
            .get_result(&mut conn)
            .await?;

        let rows: Vec<RelationshipRow> = relationships::table
            .filter(relationships::target_account_id.eq(account_id))
            .filter(relationships::status.eq(pending))
            .order((relationships::created_at.desc(), relationships::id.desc()))
            .limit(page.limit() as i64)
            .offset(page.offset() as i64)
            .select(RelationshipRow::as_select())
            .load(&mut conn)
            .await?;

        let items = rows.into_iter().map(Relationship::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    async fn list_accepted(&self, account_id: &str, page: PageRequest) -> Result<Page<Relationship>> {
        let mut conn = get_connection(&self.pool).await?;
        let accepted = RelationshipStatus::Accepted.as_str();

        let total: i64 = relationships::table
            .filter(
                relationships::actor_account_id
                    .eq(account_id)
                    .or(relationships::target_account_id.eq(account_id)),
            )
            .filter(relationships::status.eq(accepted))
            .count()
            .get_result(&mut conn)
            .await?;

        let rows: Vec<RelationshipRow> = relationships::table
            .filter(
                relationships::actor_account_id
                    .eq(account_id)
                    .or(relationships::target_account_id.eq(account_id)),
            )
            .filter(relationships::status.eq(accepted))
            .order((relationships::updated_at.desc(), relationships::id.desc()))
            .limit(page.limit() as i64)
            .offset(page.offset() as i64)
            .select(RelationshipRow::as_select())
            .load(&mut conn)
            .await?;

        let items = rows.into_iter().map(Relationship::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    async fn find_between(&self, a: &str, b: &str) -> Result<Option<Relationship>> {
        let mut conn = get_connection(&self.pool).await?;
        let row: Option<RelationshipRow> = relationships::table
            .filter(relationships::pair_key.eq(pair_key(a, b)))
            .select(RelationshipRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        row.map(Relationship::try_from).transpose()
    }

    async fn delete(&self, a: &str, b: &str) -> Result<Relationship> {
        let mut conn = get_connection(&self.pool).await?;
        let removed: Option<RelationshipRow> =
            diesel::delete(relationships::table.filter(relationships::pair_key.eq(pair_key(a, b))))
                .returning(RelationshipRow::as_returning())
                .get_result(&mut conn)
                .await
                .optional()?;

        removed
            .ok_or_else(|| ParleyError::NoRelationship(a.to_string(), b.to_string()))?
            .try_into()
    }
}
