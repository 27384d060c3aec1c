//! Group repository.

use std::sync::Arc;

use relation_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};

use crate::entities::{GroupChat, GroupMember, group_chat, group_member};

/// Repository for group chat and membership operations.
#[derive(Clone)]
pub struct GroupRepository {
    db: Arc<DatabaseConnection>,
}

impl GroupRepository {
    /// Create a new group repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // ==================== Group Operations ====================

    /// Find group by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<group_chat::Model>> {
        GroupChat::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get group by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<group_chat::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group not found: {id}")))
    }

    /// Create a group together with its first membership, atomically.
    ///
    /// Group creation must never leave a group without its admin row, so both
    /// inserts run in one transaction.
    pub async fn create_with_member(
        &self,
        group: group_chat::ActiveModel,
        membership: group_member::ActiveModel,
    ) -> AppResult<group_chat::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = group
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        membership
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Find groups a user is a member of, paginated.
    pub async fn find_joined_by_user(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<group_chat::Model>> {
        let memberships = GroupMember::find()
            .filter(group_member::Column::UserId.eq(user_id))
            .order_by(group_member::Column::JoinedAt, Order::Desc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if memberships.is_empty() {
            return Ok(vec![]);
        }

        let group_ids: Vec<String> = memberships.into_iter().map(|m| m.group_id).collect();

        GroupChat::find()
            .filter(group_chat::Column::Id.is_in(group_ids))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ==================== Membership Operations ====================

    /// Find a membership by group and user.
    pub async fn find_membership(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<Option<group_member::Model>> {
        GroupMember::find()
            .filter(group_member::Column::GroupId.eq(group_id))
            .filter(group_member::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check whether a user is a member of a group.
    pub async fn is_member(&self, group_id: &str, user_id: &str) -> AppResult<bool> {
        Ok(self.find_membership(group_id, user_id).await?.is_some())
    }

    /// Create a membership.
    pub async fn create_membership(
        &self,
        model: group_member::ActiveModel,
    ) -> AppResult<group_member::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a membership by group and user. Returns whether a row existed.
    pub async fn delete_membership(&self, group_id: &str, user_id: &str) -> AppResult<bool> {
        let result = GroupMember::delete_many()
            .filter(group_member::Column::GroupId.eq(group_id))
            .filter(group_member::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// List members of a group, paginated.
    pub async fn find_members(
        &self,
        group_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<group_member::Model>> {
        GroupMember::find()
            .filter(group_member::Column::GroupId.eq(group_id))
            .order_by(group_member::Column::JoinedAt, Order::Asc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
