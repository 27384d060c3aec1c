//! Friendship repository.

use std::sync::Arc;

use crate::entities::{Friendship, friendship};
use relation_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

/// Friendship repository for database operations.
///
/// The friendship table is a cached derivation maintained by the relationship
/// store's write path; this repository only reads it. Because every
/// friendship is stored as two directed rows, a single-direction lookup is
/// sufficient for any pair.
#[derive(Clone)]
pub struct FriendshipRepository {
    db: Arc<DatabaseConnection>,
}

impl FriendshipRepository {
    /// Create a new friendship repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find one half of a friendship pair.
    pub async fn find_by_pair(
        &self,
        user_id: &str,
        friend_id: &str,
    ) -> AppResult<Option<friendship::Model>> {
        Friendship::find()
            .filter(friendship::Column::UserId.eq(user_id))
            .filter(friendship::Column::FriendId.eq(friend_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check whether two accounts are friends. O(1) against the pair index.
    pub async fn are_friends(&self, user_id: &str, friend_id: &str) -> AppResult<bool> {
        Ok(self.find_by_pair(user_id, friend_id).await?.is_some())
    }

    /// Get friends of a user, paginated.
    pub async fn find_friends(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<friendship::Model>> {
        let mut query = Friendship::find()
            .filter(friendship::Column::UserId.eq(user_id))
            .order_by_desc(friendship::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(friendship::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
