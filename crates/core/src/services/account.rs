//! Account service.
//!
//! Read-side collaborator for the relationship store (existence and
//! visibility lookups) plus the minimal registration and profile surface
//! needed to exercise the subsystem end to end.

use chrono::Utc;
use relation_common::{AppError, AppResult, IdGenerator};
use relation_db::{
    entities::user::{self, Visibility},
    repositories::UserRepository,
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Input for creating an account.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountInput {
    /// Unique handle.
    #[validate(length(min = 1, max = 128))]
    pub username: String,
    /// Display name.
    #[validate(length(max = 256))]
    pub name: Option<String>,
    /// Account visibility.
    #[serde(default)]
    pub visibility: Visibility,
}

/// Account service for business logic.
#[derive(Clone)]
pub struct AccountService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl AccountService {
    /// Create a new account service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new account.
    pub async fn register(&self, input: CreateAccountInput) -> AppResult<user::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Username already taken: {}",
                input.username
            )));
        }

        let id = self.id_gen.generate();
        let model = user::ActiveModel {
            id: Set(id.clone()),
            username: Set(input.username),
            name: Set(input.name),
            avatar_url: Set(None),
            visibility: Set(input.visibility),
            created_by: Set(Some(id)),
            last_modified_by: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        self.user_repo.create(model).await
    }

    /// Get an account by ID.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    /// Check whether an account exists.
    pub async fn exists(&self, id: &str) -> AppResult<bool> {
        self.user_repo.exists(id).await
    }

    /// Look up an account's visibility.
    pub async fn visibility(&self, id: &str) -> AppResult<Visibility> {
        Ok(self.user_repo.get_by_id(id).await?.visibility)
    }

    /// Change an account's visibility. Only the owner may do this.
    pub async fn set_visibility(&self, id: &str, visibility: Visibility) -> AppResult<user::Model> {
        let account = self.user_repo.get_by_id(id).await?;

        let mut active: user::ActiveModel = account.into();
        active.visibility = Set(visibility);
        active.last_modified_by = Set(Some(id.to_string()));
        active.updated_at = Set(Some(Utc::now().into()));

        self.user_repo.update(active).await
    }

    /// Search accounts by username substring.
    pub async fn search(
        &self,
        query: &str,
        searcher_id: &str,
        limit: u64,
    ) -> AppResult<Vec<user::Model>> {
        self.user_repo.search(query, searcher_id, limit).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_user(id: &str, username: &str, visibility: Visibility) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            name: None,
            avatar_url: None,
            visibility,
            created_by: Some(id.to_string()),
            last_modified_by: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_register_rejects_empty_username() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = AccountService::new(UserRepository::new(db));

        let result = service
            .register(CreateAccountInput {
                username: String::new(),
                name: None,
                visibility: Visibility::Public,
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_taken_username() {
        let existing = create_test_user("u1", "alice", Visibility::Public);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .into_connection(),
        );
        let service = AccountService::new(UserRepository::new(db));

        let result = service
            .register(CreateAccountInput {
                username: "alice".to_string(),
                name: None,
                visibility: Visibility::Public,
            })
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_visibility_lookup() {
        let private = create_test_user("u1", "alice", Visibility::Private);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[private]])
                .into_connection(),
        );
        let service = AccountService::new(UserRepository::new(db));

        assert_eq!(
            service.visibility("u1").await.unwrap(),
            Visibility::Private
        );
    }

    #[tokio::test]
    async fn test_visibility_lookup_missing_account() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );
        let service = AccountService::new(UserRepository::new(db));

        let result = service.visibility("missing").await;
        assert!(matches!(result, Err(AppError::AccountNotFound(_))));
    }
}
