//! Notification service.
//!
//! Persisted fire-and-forget sink for relationship events. Callers on the
//! write path treat failures here as best-effort: they log and move on, so a
//! broken notification store can never roll back a relationship mutation.

use relation_common::{AppResult, IdGenerator};
use relation_db::{
    entities::notification::{self, NotificationType},
    repositories::NotificationRepository,
};
use sea_orm::Set;

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self {
            notification_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a follow request notification (private target).
    pub async fn create_follow_request_notification(
        &self,
        notifiee_id: &str,
        actor_id: &str,
    ) -> AppResult<notification::Model> {
        self.create_internal(
            notifiee_id,
            Some(actor_id),
            NotificationType::FollowRequest,
            Some(actor_id),
            Some("user"),
        )
        .await
    }

    /// Create a new follower notification (public target or accepted request).
    pub async fn create_new_follower_notification(
        &self,
        notifiee_id: &str,
        actor_id: &str,
    ) -> AppResult<notification::Model> {
        self.create_internal(
            notifiee_id,
            Some(actor_id),
            NotificationType::NewFollower,
            Some(actor_id),
            Some("user"),
        )
        .await
    }

    /// Create a follow request accepted notification.
    pub async fn create_follow_accepted_notification(
        &self,
        notifiee_id: &str,
        actor_id: &str,
    ) -> AppResult<notification::Model> {
        self.create_internal(
            notifiee_id,
            Some(actor_id),
            NotificationType::FollowAccepted,
            Some(actor_id),
            Some("user"),
        )
        .await
    }

    /// Create a became-friends notification.
    pub async fn create_became_friends_notification(
        &self,
        notifiee_id: &str,
        friend_id: &str,
    ) -> AppResult<notification::Model> {
        self.create_internal(
            notifiee_id,
            Some(friend_id),
            NotificationType::BecameFriends,
            Some(friend_id),
            Some("user"),
        )
        .await
    }

    /// Create a group joined notification for the group owner.
    pub async fn create_group_joined_notification(
        &self,
        notifiee_id: &str,
        actor_id: &str,
        group_id: &str,
    ) -> AppResult<notification::Model> {
        self.create_internal(
            notifiee_id,
            Some(actor_id),
            NotificationType::GroupJoined,
            Some(group_id),
            Some("group_chat"),
        )
        .await
    }

    /// Internal helper to create notifications.
    async fn create_internal(
        &self,
        notifiee_id: &str,
        actor_id: Option<&str>,
        notification_type: NotificationType,
        related_entity_id: Option<&str>,
        related_entity_kind: Option<&str>,
    ) -> AppResult<notification::Model> {
        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            notifiee_id: Set(notifiee_id.to_string()),
            actor_id: Set(actor_id.map(std::string::ToString::to_string)),
            notification_type: Set(notification_type),
            related_entity_id: Set(related_entity_id.map(std::string::ToString::to_string)),
            related_entity_kind: Set(related_entity_kind.map(std::string::ToString::to_string)),
            is_read: Set(false),
            created_at: Set(chrono::Utc::now().into()),
        };

        self.notification_repo.create(model).await
    }

    /// Get notifications for a user.
    pub async fn get_notifications(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        self.notification_repo
            .find_by_user(user_id, limit, until_id, unread_only)
            .await
    }

    /// Mark a notification as read.
    pub async fn mark_as_read(&self, user_id: &str, notification_id: &str) -> AppResult<()> {
        // Verify the notification belongs to the user
        let notification = self.notification_repo.find_by_id(notification_id).await?;
        if let Some(n) = notification
            && n.notifiee_id == user_id
        {
            self.notification_repo.mark_as_read(notification_id).await?;
        }
        Ok(())
    }

    /// Mark all notifications as read for a user.
    pub async fn mark_all_as_read(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(user_id).await
    }

    /// Count unread notifications for a user.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }

    /// Delete a notification.
    pub async fn delete(&self, user_id: &str, notification_id: &str) -> AppResult<()> {
        // Verify the notification belongs to the user
        let notification = self.notification_repo.find_by_id(notification_id).await?;
        if let Some(n) = notification
            && n.notifiee_id == user_id
        {
            self.notification_repo.delete(notification_id).await?;
        }
        Ok(())
    }
}
