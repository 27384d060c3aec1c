//! Group member entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a group member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum GroupRole {
    /// Regular member.
    #[sea_orm(string_value = "member")]
    Member,
    /// Moderator - can manage members and content.
    #[sea_orm(string_value = "moderator")]
    Moderator,
    /// Admin - full control; assigned to the creator on group creation.
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Default for GroupRole {
    fn default() -> Self {
        Self::Member
    }
}

/// Group member - tracks which accounts are in which groups.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "group_member")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The group they belong to. Unique together with `user_id`.
    #[sea_orm(indexed)]
    pub group_id: String,

    /// The account that is a member.
    #[sea_orm(indexed)]
    pub user_id: String,

    /// Role of the member in the group.
    pub role: GroupRole,

    /// When the account joined the group.
    pub joined_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::group_chat::Entity",
        from = "Column::GroupId",
        to = "super::group_chat::Column::Id",
        on_delete = "Cascade"
    )]
    Group,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::group_chat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
