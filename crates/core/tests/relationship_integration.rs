//! Relationship lifecycle integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test relationship_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `relation_test`)
//!   `TEST_DB_PASSWORD` (default: `relation_test`)
//!   `TEST_DB_NAME` (default: `relation_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use relation_core::{
    AcceptOutcome, AccountService, CreateAccountInput, FollowOutcome, RelationshipService,
};
use relation_db::entities::user::{self, Visibility};
use relation_db::repositories::{
    FollowEdgeRepository, FriendshipRepository, UserRepository,
};
use relation_db::test_utils::TestDatabase;
use sea_orm::DatabaseConnection;

struct TestContext {
    db: TestDatabase,
    accounts: AccountService,
    relationships: RelationshipService,
}

impl TestContext {
    async fn create() -> Self {
        let db = TestDatabase::create_unique().await.expect("Failed to create");
        relation_db::migrate(db.connection())
            .await
            .expect("Migration failed");

        let conn: Arc<DatabaseConnection> = db.shared_connection();
        let accounts = AccountService::new(UserRepository::new(conn.clone()));
        let relationships = RelationshipService::new(
            conn.clone(),
            FollowEdgeRepository::new(conn.clone()),
            FriendshipRepository::new(conn.clone()),
            UserRepository::new(conn),
        );

        Self {
            db,
            accounts,
            relationships,
        }
    }

    async fn register(&self, username: &str, visibility: Visibility) -> user::Model {
        self.accounts
            .register(CreateAccountInput {
                username: username.to_string(),
                name: None,
                visibility,
            })
            .await
            .expect("Failed to register account")
    }

    async fn teardown(self) {
        self.db.drop_database().await.unwrap();
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_follow_accept_friendship_lifecycle() {
    let ctx = TestContext::create().await;
    let alice = ctx.register("alice", Visibility::Public).await;
    let bob = ctx.register("bob", Visibility::Private).await;

    // Alice requests to follow private Bob.
    let outcome = ctx
        .relationships
        .request_follow(&alice.id, &bob.id)
        .await
        .unwrap();
    assert_eq!(outcome, FollowOutcome::Requested);

    let pending = ctx
        .relationships
        .list_pending_incoming(&bob.id, 10, None)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].follower_id, alice.id);

    // Bob accepts; no friendship yet since Bob does not follow back.
    let outcome = ctx
        .relationships
        .accept_follow_request(&bob.id, &alice.id)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        AcceptOutcome::Accepted {
            became_friends: false
        }
    );
    assert!(!ctx.relationships.are_friends(&alice.id, &bob.id).await.unwrap());

    // Bob follows Alice back (public, immediate) completing the pair.
    let outcome = ctx
        .relationships
        .request_follow(&bob.id, &alice.id)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        FollowOutcome::Following {
            became_friends: true
        }
    );
    assert!(ctx.relationships.are_friends(&alice.id, &bob.id).await.unwrap());
    assert!(ctx.relationships.are_friends(&bob.id, &alice.id).await.unwrap());

    // Alice unfollows; the friendship cannot survive.
    let outcome = ctx
        .relationships
        .unfollow(&alice.id, &bob.id)
        .await
        .unwrap();
    assert!(outcome.friendship_removed);
    assert!(!ctx.relationships.are_friends(&alice.id, &bob.id).await.unwrap());

    // Bob's edge towards Alice is untouched.
    assert!(ctx
        .relationships
        .is_following(&bob.id, &alice.id)
        .await
        .unwrap());

    ctx.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_mutual_follow_derives_one_friendship() {
    let ctx = TestContext::create().await;
    let alice = ctx.register("alice", Visibility::Public).await;
    let bob = ctx.register("bob", Visibility::Public).await;

    // Fire both directions at once. The row locks serialize the pair, so
    // exactly one of the calls observes the completed reciprocal edge.
    let (a_to_b, b_to_a) = tokio::join!(
        ctx.relationships.request_follow(&alice.id, &bob.id),
        ctx.relationships.request_follow(&bob.id, &alice.id),
    );

    let became: Vec<bool> = [a_to_b.unwrap(), b_to_a.unwrap()]
        .into_iter()
        .map(|o| matches!(o, FollowOutcome::Following { became_friends: true }))
        .collect();
    assert_eq!(became.iter().filter(|b| **b).count(), 1);

    assert!(ctx.relationships.are_friends(&alice.id, &bob.id).await.unwrap());

    let friends = ctx
        .relationships
        .list_friends(&alice.id, 10, None)
        .await
        .unwrap();
    assert_eq!(friends.len(), 1);

    ctx.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_accepts_resolve_idempotently() {
    let ctx = TestContext::create().await;
    let alice = ctx.register("alice", Visibility::Public).await;
    let bob = ctx.register("bob", Visibility::Private).await;

    let outcome = ctx
        .relationships
        .request_follow(&alice.id, &bob.id)
        .await
        .unwrap();
    assert_eq!(outcome, FollowOutcome::Requested);

    // Two accepts race on the same pending edge. The pair locks serialize
    // them: one transitions the edge, the other observes it already done.
    let (first, second) = tokio::join!(
        ctx.relationships.accept_follow_request(&bob.id, &alice.id),
        ctx.relationships.accept_follow_request(&bob.id, &alice.id),
    );

    let outcomes = [first.unwrap(), second.unwrap()];
    let accepted = outcomes
        .iter()
        .filter(|o| matches!(o, AcceptOutcome::Accepted { .. }))
        .count();
    let already = outcomes
        .iter()
        .filter(|o| matches!(o, AcceptOutcome::AlreadyAccepted))
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(already, 1);

    assert!(ctx
        .relationships
        .is_following(&alice.id, &bob.id)
        .await
        .unwrap());
    // One-directional follow only; no friendship yet.
    assert!(!ctx.relationships.are_friends(&alice.id, &bob.id).await.unwrap());

    ctx.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_rejected_request_can_be_rerequested() {
    let ctx = TestContext::create().await;
    let alice = ctx.register("alice", Visibility::Public).await;
    let bob = ctx.register("bob", Visibility::Private).await;

    ctx.relationships
        .request_follow(&alice.id, &bob.id)
        .await
        .unwrap();
    ctx.relationships
        .reject_follow_request(&bob.id, &alice.id)
        .await
        .unwrap();

    // Rejection is not visible as pending from either side.
    assert!(ctx
        .relationships
        .list_pending_incoming(&bob.id, 10, None)
        .await
        .unwrap()
        .is_empty());
    assert!(ctx
        .relationships
        .list_pending_outgoing(&alice.id, 10, None)
        .await
        .unwrap()
        .is_empty());

    // A fresh request reuses the same edge row.
    let outcome = ctx
        .relationships
        .request_follow(&alice.id, &bob.id)
        .await
        .unwrap();
    assert_eq!(outcome, FollowOutcome::Requested);

    ctx.teardown().await;
}
