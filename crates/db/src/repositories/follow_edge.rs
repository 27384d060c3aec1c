//! Follow edge repository.

use std::sync::Arc;

use crate::entities::{FollowEdge, follow_edge, follow_edge::FollowStatus};
use relation_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

/// Follow edge repository for database operations.
///
/// Read projections over the directed follow relation. All mutations of
/// follow edges go through the relationship store's pair-scoped transactions
/// in `relation-core`; this repository is intentionally read-only.
#[derive(Clone)]
pub struct FollowEdgeRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowEdgeRepository {
    /// Create a new follow edge repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a follow edge by follower and followee.
    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow_edge::Model>> {
        FollowEdge::find()
            .filter(follow_edge::Column::FollowerId.eq(follower_id))
            .filter(follow_edge::Column::FolloweeId.eq(followee_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user is following another (edge exists and is accepted).
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        Ok(self
            .find_by_pair(follower_id, followee_id)
            .await?
            .is_some_and(|edge| edge.status.is_accepted()))
    }

    /// Get accepted edges pointing at a user (their followers), paginated.
    pub async fn find_followers(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        self.find_by_direction_and_status(
            follow_edge::Column::FolloweeId,
            user_id,
            FollowStatus::Accepted,
            limit,
            until_id,
        )
        .await
    }

    /// Get accepted edges originating from a user (who they follow), paginated.
    pub async fn find_following(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        self.find_by_direction_and_status(
            follow_edge::Column::FollowerId,
            user_id,
            FollowStatus::Accepted,
            limit,
            until_id,
        )
        .await
    }

    /// Get pending edges pointing at a user (incoming requests), paginated.
    pub async fn find_pending_incoming(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        self.find_by_direction_and_status(
            follow_edge::Column::FolloweeId,
            user_id,
            FollowStatus::Pending,
            limit,
            until_id,
        )
        .await
    }

    /// Get pending edges originating from a user (outgoing requests), paginated.
    pub async fn find_pending_outgoing(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        self.find_by_direction_and_status(
            follow_edge::Column::FollowerId,
            user_id,
            FollowStatus::Pending,
            limit,
            until_id,
        )
        .await
    }

    async fn find_by_direction_and_status(
        &self,
        column: follow_edge::Column,
        user_id: &str,
        status: FollowStatus,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        let mut query = FollowEdge::find()
            .filter(column.eq(user_id))
            .filter(follow_edge::Column::Status.eq(status))
            .order_by_desc(follow_edge::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(follow_edge::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_edge(
        id: &str,
        follower_id: &str,
        followee_id: &str,
        status: FollowStatus,
    ) -> follow_edge::Model {
        follow_edge::Model {
            id: id.to_string(),
            follower_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
            status,
            last_actor_id: Some(follower_id.to_string()),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_pair_found() {
        let edge = create_test_edge("e1", "user1", "user2", FollowStatus::Accepted);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[edge.clone()]])
                .into_connection(),
        );

        let repo = FollowEdgeRepository::new(db);
        let result = repo.find_by_pair("user1", "user2").await.unwrap();

        assert!(result.is_some());
        assert_eq!(result.unwrap().status, FollowStatus::Accepted);
    }

    #[tokio::test]
    async fn test_find_by_pair_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<follow_edge::Model>::new()])
                .into_connection(),
        );

        let repo = FollowEdgeRepository::new(db);
        let result = repo.find_by_pair("user1", "user3").await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_is_following_requires_accepted_status() {
        let pending = create_test_edge("e1", "user1", "user2", FollowStatus::Pending);
        let accepted = create_test_edge("e2", "user1", "user3", FollowStatus::Accepted);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![pending], vec![accepted]])
                .into_connection(),
        );

        let repo = FollowEdgeRepository::new(db);
        assert!(!repo.is_following("user1", "user2").await.unwrap());
        assert!(repo.is_following("user1", "user3").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_followers() {
        let f1 = create_test_edge("e1", "user2", "user1", FollowStatus::Accepted);
        let f2 = create_test_edge("e2", "user3", "user1", FollowStatus::Accepted);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[f1, f2]])
                .into_connection(),
        );

        let repo = FollowEdgeRepository::new(db);
        let result = repo.find_followers("user1", 10, None).await.unwrap();

        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_find_pending_incoming() {
        let e1 = create_test_edge("e1", "user2", "user1", FollowStatus::Pending);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[e1]])
                .into_connection(),
        );

        let repo = FollowEdgeRepository::new(db);
        let result = repo.find_pending_incoming("user1", 10, None).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].status, FollowStatus::Pending);
    }
}
