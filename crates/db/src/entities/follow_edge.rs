//! Follow edge entity (directed follow relations between accounts).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status of a directed follow edge.
///
/// A `Pending` edge can only be created while the followee's account is
/// private; follows towards public accounts are created as `Accepted`
/// directly. `Rejected` edges stay in place so a later re-request can
/// overwrite them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum FollowStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl FollowStatus {
    /// Whether this edge counts towards the friendship derivation.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "follow_edge")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The account doing the following. Unique together with `followee_id`.
    pub follower_id: String,

    /// The account being followed.
    pub followee_id: String,

    /// Current edge status.
    pub status: FollowStatus,

    /// Account that performed the last transition on this edge.
    #[sea_orm(nullable)]
    pub last_actor_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::FollowerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Follower,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::FolloweeId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Followee,
}

impl ActiveModelBehavior for ActiveModel {}
