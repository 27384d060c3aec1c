//! Group service.

use chrono::Utc;
use relation_common::{AppError, AppResult, IdGenerator};
use relation_db::entities::group_member::GroupRole;
use relation_db::entities::{group_chat, group_member};
use relation_db::repositories::GroupRepository;
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::services::notification::NotificationService;

/// Input for creating a group.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupInput {
    /// Group name.
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    /// Group description.
    #[validate(length(max = 2048))]
    pub description: Option<String>,
}

fn is_duplicate_key(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("duplicate key") || lower.contains("unique constraint")
}

/// Result of a join operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new membership was created.
    Joined,
    /// The account was already a member; nothing changed.
    AlreadyMember,
}

/// Group service for business logic.
#[derive(Clone)]
pub struct GroupService {
    group_repo: GroupRepository,
    notifications: Option<NotificationService>,
    id_gen: IdGenerator,
}

impl GroupService {
    /// Create a new group service.
    #[must_use]
    pub const fn new(group_repo: GroupRepository) -> Self {
        Self {
            group_repo,
            notifications: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the notification sink.
    pub fn set_notifications(&mut self, notifications: NotificationService) {
        self.notifications = Some(notifications);
    }

    /// Get a group by ID.
    pub async fn get_by_id(&self, id: &str) -> AppResult<group_chat::Model> {
        self.group_repo.get_by_id(id).await
    }

    /// Create a new group.
    ///
    /// The creator becomes `admin` atomically with group creation.
    pub async fn create(
        &self,
        creator_id: &str,
        input: CreateGroupInput,
    ) -> AppResult<group_chat::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let group_id = self.id_gen.generate();
        let now = Utc::now();

        let group = group_chat::ActiveModel {
            id: Set(group_id.clone()),
            owner_id: Set(creator_id.to_string()),
            name: Set(input.name),
            description: Set(input.description),
            created_by: Set(Some(creator_id.to_string())),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let membership = group_member::ActiveModel {
            id: Set(self.id_gen.generate()),
            group_id: Set(group_id),
            user_id: Set(creator_id.to_string()),
            role: Set(GroupRole::Admin),
            joined_at: Set(now.into()),
        };

        self.group_repo.create_with_member(group, membership).await
    }

    /// Join a group. Idempotent: joining twice leaves one membership.
    pub async fn join(&self, user_id: &str, group_id: &str) -> AppResult<JoinOutcome> {
        let group = self.group_repo.get_by_id(group_id).await?;

        if self.group_repo.is_member(group_id, user_id).await? {
            return Ok(JoinOutcome::AlreadyMember);
        }

        let model = group_member::ActiveModel {
            id: Set(self.id_gen.generate()),
            group_id: Set(group_id.to_string()),
            user_id: Set(user_id.to_string()),
            role: Set(GroupRole::Member),
            joined_at: Set(Utc::now().into()),
        };

        match self.group_repo.create_membership(model).await {
            Ok(_) => {}
            // A concurrent join may land between the member check and this
            // insert; the unique (group_id, user_id) index reports it as a
            // duplicate key and the outcome is the same membership.
            Err(AppError::Database(msg)) if is_duplicate_key(&msg) => {
                return Ok(JoinOutcome::AlreadyMember);
            }
            Err(e) => return Err(e),
        }

        if let Some(ref notifications) = self.notifications
            && group.owner_id != user_id
            && let Err(e) = notifications
                .create_group_joined_notification(&group.owner_id, user_id, group_id)
                .await
        {
            tracing::warn!(error = %e, "Failed to record group joined notification");
        }

        Ok(JoinOutcome::Joined)
    }

    /// Leave a group.
    pub async fn leave(&self, user_id: &str, group_id: &str) -> AppResult<()> {
        let removed = self.group_repo.delete_membership(group_id, user_id).await?;
        if !removed {
            return Err(AppError::NotFound(format!(
                "Not a member of group: {group_id}"
            )));
        }
        Ok(())
    }

    /// List groups a user is a member of.
    pub async fn list_joined(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<group_chat::Model>> {
        self.group_repo
            .find_joined_by_user(user_id, limit, offset)
            .await
    }

    /// List members of a group.
    pub async fn list_members(
        &self,
        group_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<group_member::Model>> {
        self.group_repo.find_members(group_id, limit, offset).await
    }

    /// Get a user's membership in a group, if any.
    pub async fn membership(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<Option<group_member::Model>> {
        self.group_repo.find_membership(group_id, user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn create_test_group(id: &str, owner_id: &str, name: &str) -> group_chat::Model {
        group_chat::Model {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            description: None,
            created_by: Some(owner_id.to_string()),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_membership(
        id: &str,
        group_id: &str,
        user_id: &str,
        role: GroupRole,
    ) -> group_member::Model {
        group_member::Model {
            id: id.to_string(),
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
            role,
            joined_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = GroupService::new(GroupRepository::new(db));

        let result = service
            .create(
                "user1",
                CreateGroupInput {
                    name: String::new(),
                    description: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_makes_creator_admin() {
        let group = create_test_group("g1", "user1", "trip crew");
        let membership = create_test_membership("m1", "g1", "user1", GroupRole::Admin);

        // One transaction: group insert, membership insert.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[group.clone()]])
                .append_query_results([[membership]])
                .into_connection(),
        );

        let service = GroupService::new(GroupRepository::new(db));
        let result = service
            .create(
                "user1",
                CreateGroupInput {
                    name: "trip crew".to_string(),
                    description: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(result.owner_id, "user1");
        assert_eq!(result.name, "trip crew");
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let group = create_test_group("g1", "owner", "trip crew");
        let existing = create_test_membership("m1", "g1", "user1", GroupRole::Member);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[group]])
                .append_query_results([[existing]])
                .into_connection(),
        );

        let service = GroupService::new(GroupRepository::new(db));
        let outcome = service.join("user1", "g1").await.unwrap();

        assert_eq!(outcome, JoinOutcome::AlreadyMember);
    }

    #[tokio::test]
    async fn test_join_missing_group() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group_chat::Model>::new()])
                .into_connection(),
        );

        let service = GroupService::new(GroupRepository::new(db));
        let result = service.join("user1", "missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_join_creates_member_role() {
        let group = create_test_group("g1", "owner", "trip crew");
        let created = create_test_membership("m2", "g1", "user1", GroupRole::Member);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[group]])
                .append_query_results([Vec::<group_member::Model>::new()])
                .append_query_results([[created]])
                .into_connection(),
        );

        let service = GroupService::new(GroupRepository::new(db));
        let outcome = service.join("user1", "g1").await.unwrap();

        assert_eq!(outcome, JoinOutcome::Joined);
    }

    #[tokio::test]
    async fn test_join_losing_insert_race_is_already_member() {
        let group = create_test_group("g1", "owner", "trip crew");

        // The membership check sees nothing, then a concurrent join wins and
        // the insert trips the unique (group_id, user_id) index.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[group]])
                .append_query_results([Vec::<group_member::Model>::new()])
                .append_query_errors([sea_orm::DbErr::Custom(
                    "duplicate key value violates unique constraint \"idx_group_member_group_user\""
                        .to_string(),
                )])
                .into_connection(),
        );

        let service = GroupService::new(GroupRepository::new(db));
        let outcome = service.join("user1", "g1").await.unwrap();

        assert_eq!(outcome, JoinOutcome::AlreadyMember);
    }

    #[tokio::test]
    async fn test_leave_not_a_member() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let service = GroupService::new(GroupRepository::new(db));
        let result = service.leave("user1", "g1").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_leave_deletes_membership() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let service = GroupService::new(GroupRepository::new(db));
        service.leave("user1", "g1").await.unwrap();
    }
}
