//! Notification entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum NotificationType {
    /// Someone requested to follow a private account.
    #[sea_orm(string_value = "follow_request")]
    FollowRequest,
    /// Someone started following (public account, or accepted request).
    #[sea_orm(string_value = "new_follower")]
    NewFollower,
    /// A follow request was accepted.
    #[sea_orm(string_value = "follow_accepted")]
    FollowAccepted,
    /// Both follow directions became accepted.
    #[sea_orm(string_value = "became_friends")]
    BecameFriends,
    /// Someone joined a group the notifiee administers.
    #[sea_orm(string_value = "group_joined")]
    GroupJoined,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The account receiving the notification.
    #[sea_orm(indexed)]
    pub notifiee_id: String,

    /// The account that triggered the notification (optional for some types).
    #[sea_orm(nullable)]
    pub actor_id: Option<String>,

    /// Notification type.
    pub notification_type: NotificationType,

    /// Identifier of the entity this notification refers to.
    #[sea_orm(nullable)]
    pub related_entity_id: Option<String>,

    /// Kind of the related entity ("user", "follow_edge", "group_chat", ...).
    #[sea_orm(nullable)]
    pub related_entity_kind: Option<String>,

    /// Has this notification been read?
    #[sea_orm(default_value = false)]
    pub is_read: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::NotifieeId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Notifiee,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ActorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Actor,
}

impl ActiveModelBehavior for ActiveModel {}
