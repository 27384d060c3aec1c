//! Create follow edge table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FollowEdge::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FollowEdge::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FollowEdge::FollowerId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowEdge::FolloweeId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(FollowEdge::Status).string_len(10).not_null())
                    .col(ColumnDef::new(FollowEdge::LastActorId).string_len(32))
                    .col(
                        ColumnDef::new(FollowEdge::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(FollowEdge::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_edge_follower")
                            .from(FollowEdge::Table, FollowEdge::FollowerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_edge_followee")
                            .from(FollowEdge::Table, FollowEdge::FolloweeId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (follower_id, followee_id) - one edge per ordered pair
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_edge_follower_followee")
                    .table(FollowEdge::Table)
                    .col(FollowEdge::FollowerId)
                    .col(FollowEdge::FolloweeId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (followee_id, status) for follower/request listings
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_edge_followee_status")
                    .table(FollowEdge::Table)
                    .col(FollowEdge::FolloweeId)
                    .col(FollowEdge::Status)
                    .to_owned(),
            )
            .await?;

        // Index: (follower_id, status) for following/outgoing listings
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_edge_follower_status")
                    .table(FollowEdge::Table)
                    .col(FollowEdge::FollowerId)
                    .col(FollowEdge::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FollowEdge::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FollowEdge {
    Table,
    Id,
    FollowerId,
    FolloweeId,
    Status,
    LastActorId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
