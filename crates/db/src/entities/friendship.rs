//! Friendship entity (derived symmetric relation between accounts).
//!
//! A friendship between A and B is materialized as two directed rows,
//! `(A, B)` and `(B, A)`, so lookups from either side hit the unique pair
//! index. The rows are a cached derivation: they exist if and only if both
//! follow edges between the pair are currently accepted, and are created and
//! deleted inside the same transaction as the follow mutation that changed
//! that condition.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "friendship")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning side of this half of the pair. Unique together with `friend_id`.
    pub user_id: String,

    /// The other account of the pair.
    pub friend_id: String,

    pub created_at: DateTimeWithTimeZone,
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
        belongs_to = "super::user::Entity",
        from = "Column::FriendId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Friend,
}

impl ActiveModelBehavior for ActiveModel {}
