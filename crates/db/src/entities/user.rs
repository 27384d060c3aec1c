//! User entity (accounts participating in the social graph).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account visibility.
///
/// Public accounts auto-accept follows; private accounts require explicit
/// acceptance of each follow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum Visibility {
    #[sea_orm(string_value = "public")]
    Public,
    #[sea_orm(string_value = "private")]
    Private,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Public
    }
}

impl Visibility {
    /// Whether a new follow towards this account starts out pending.
    #[must_use]
    pub const fn requires_approval(self) -> bool {
        matches!(self, Self::Private)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Unique handle.
    #[sea_orm(unique)]
    pub username: String,

    /// Display name (optional).
    #[sea_orm(nullable)]
    pub name: Option<String>,

    /// Avatar image URL (optional).
    #[sea_orm(nullable)]
    pub avatar_url: Option<String>,

    /// Account visibility.
    pub visibility: Visibility,

    /// Generic audit metadata, not behaviorally load-bearing.
    #[sea_orm(nullable)]
    pub created_by: Option<String>,

    #[sea_orm(nullable)]
    pub last_modified_by: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::group_member::Entity")]
    GroupMemberships,
}

impl Related<super::group_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GroupMemberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_requires_approval() {
        assert!(Visibility::Private.requires_approval());
        assert!(!Visibility::Public.requires_approval());
    }
}
