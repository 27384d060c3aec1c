//! Relationship store.
//!
//! Owns every transition of the directed follow edges and the derived
//! friendship pairs. The friendship table exists iff both directions of a
//! follow relation are accepted, so any write that can change that condition
//! runs its read-check-write sequence inside one transaction that locks the
//! two account rows involved. Locks are always taken in ascending-id order,
//! which linearizes concurrent operations on the same pair regardless of
//! which direction each caller came from.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use relation_common::config::RelationshipConfig;
use relation_common::{AppError, AppResult, IdGenerator};
use relation_db::{
    entities::{
        FollowEdge, Friendship, User,
        follow_edge::{self, FollowStatus},
        friendship, user,
    },
    repositories::{FollowEdgeRepository, FriendshipRepository, UserRepository},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, ModelTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};

use crate::services::notification::NotificationService;

/// Result of a follow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    /// The actor is now following the target.
    Following {
        /// Whether this call completed a mutual follow.
        became_friends: bool,
    },
    /// A follow request towards a private account is now pending.
    Requested,
    /// The edge was already accepted; nothing changed.
    AlreadyFollowing,
    /// The edge was already pending; nothing changed.
    AlreadyRequested,
}

impl FollowOutcome {
    /// Caller-facing status string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Following { .. } => "following",
            Self::Requested => "requested",
            Self::AlreadyFollowing => "already_following",
            Self::AlreadyRequested => "already_requested",
        }
    }
}

/// Result of accepting a follow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The pending edge transitioned to accepted.
    Accepted {
        /// Whether this call completed a mutual follow.
        became_friends: bool,
    },
    /// The edge was already accepted (e.g. by a concurrent call).
    AlreadyAccepted,
}

impl AcceptOutcome {
    /// Caller-facing status string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::AlreadyAccepted => "already_accepted",
        }
    }
}

/// Result of an unfollow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnfollowOutcome {
    /// Whether a friendship pair was torn down alongside the edge.
    pub friendship_removed: bool,
}

/// Relationship service owning follow edge and friendship transitions.
#[derive(Clone)]
pub struct RelationshipService {
    db: Arc<DatabaseConnection>,
    follow_repo: FollowEdgeRepository,
    friendship_repo: FriendshipRepository,
    user_repo: UserRepository,
    notifications: Option<NotificationService>,
    config: RelationshipConfig,
    id_gen: IdGenerator,
}

impl RelationshipService {
    /// Create a new relationship service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        follow_repo: FollowEdgeRepository,
        friendship_repo: FriendshipRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            db,
            follow_repo,
            friendship_repo,
            user_repo,
            notifications: None,
            config: RelationshipConfig::default(),
            id_gen: IdGenerator::new(),
        }
    }

    /// Override the conflict retry tuning.
    #[must_use]
    pub fn with_config(mut self, config: RelationshipConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the notification sink.
    pub fn set_notifications(&mut self, notifications: NotificationService) {
        self.notifications = Some(notifications);
    }

    // ==================== Write Operations ====================

    /// Request to follow a target account.
    ///
    /// Follows towards public accounts are accepted immediately; private
    /// accounts get a pending request. Repeated calls are idempotent, and a
    /// previously rejected edge may be re-requested.
    pub async fn request_follow(&self, actor_id: &str, target_id: &str) -> AppResult<FollowOutcome> {
        if actor_id == target_id {
            return Err(AppError::InvalidOperation(
                "Cannot follow yourself".to_string(),
            ));
        }

        let mut attempt = 0;
        let outcome = loop {
            match self.request_follow_txn(actor_id, target_id).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    self.conflict_backoff(attempt).await;
                }
                other => break other?,
            }
        };

        if let Some(ref notifications) = self.notifications {
            match outcome {
                FollowOutcome::Requested => {
                    if let Err(e) = notifications
                        .create_follow_request_notification(target_id, actor_id)
                        .await
                    {
                        tracing::warn!(error = %e, "Failed to record follow request notification");
                    }
                }
                FollowOutcome::Following { became_friends } => {
                    if let Err(e) = notifications
                        .create_new_follower_notification(target_id, actor_id)
                        .await
                    {
                        tracing::warn!(error = %e, "Failed to record new follower notification");
                    }
                    if became_friends {
                        self.emit_became_friends(notifications, actor_id, target_id)
                            .await;
                    }
                }
                FollowOutcome::AlreadyFollowing | FollowOutcome::AlreadyRequested => {}
            }
        }

        Ok(outcome)
    }

    /// Accept a pending follow request from `requester_id`.
    pub async fn accept_follow_request(
        &self,
        owner_id: &str,
        requester_id: &str,
    ) -> AppResult<AcceptOutcome> {
        if owner_id == requester_id {
            return Err(AppError::InvalidOperation(
                "Cannot accept a follow request from yourself".to_string(),
            ));
        }

        let mut attempt = 0;
        let outcome = loop {
            match self.accept_follow_request_txn(owner_id, requester_id).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    self.conflict_backoff(attempt).await;
                }
                other => break other?,
            }
        };

        if let Some(ref notifications) = self.notifications
            && let AcceptOutcome::Accepted { became_friends } = outcome
        {
            if let Err(e) = notifications
                .create_follow_accepted_notification(requester_id, owner_id)
                .await
            {
                tracing::warn!(error = %e, "Failed to record follow accepted notification");
            }
            if became_friends {
                self.emit_became_friends(notifications, requester_id, owner_id)
                    .await;
            }
        }

        Ok(outcome)
    }

    /// Reject a pending follow request from `requester_id`.
    ///
    /// The edge stays in place as rejected so the requester may re-request
    /// later. Rejection never creates a friendship.
    pub async fn reject_follow_request(&self, owner_id: &str, requester_id: &str) -> AppResult<()> {
        let txn = self.begin().await?;
        self.lock_accounts(&txn, owner_id, requester_id).await?;

        let edge = Self::find_edge(&txn, requester_id, owner_id).await?;
        let Some(edge) = edge else {
            return Err(AppError::NotFound("Follow request not found".to_string()));
        };
        if edge.status != FollowStatus::Pending {
            return Err(AppError::NotFound("Follow request not found".to_string()));
        }

        let mut active: follow_edge::ActiveModel = edge.into();
        active.status = Set(FollowStatus::Rejected);
        active.last_actor_id = Set(Some(owner_id.to_string()));
        active.updated_at = Set(Some(Utc::now().into()));
        active
            .update(&txn)
            .await
            .map_err(|e| Self::classify_db_err(&e))?;

        txn.commit().await.map_err(|e| Self::classify_db_err(&e))?;
        Ok(())
    }

    /// Delete the follow edge from `actor_id` towards `target_id`.
    ///
    /// Works for any edge status, so this doubles as cancelling a pending
    /// request. A friendship pair cannot survive the loss of either accepted
    /// direction, so both halves are torn down in the same transaction.
    pub async fn unfollow(&self, actor_id: &str, target_id: &str) -> AppResult<UnfollowOutcome> {
        if actor_id == target_id {
            return Err(AppError::InvalidOperation(
                "Cannot unfollow yourself".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            match self.unfollow_txn(actor_id, target_id).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    self.conflict_backoff(attempt).await;
                }
                other => break other,
            }
        }
    }

    // ==================== Read Projections ====================

    /// Get accepted followers of an account.
    pub async fn list_followers(
        &self,
        account_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        self.follow_repo
            .find_followers(account_id, limit, until_id)
            .await
    }

    /// Get accounts an account is following.
    pub async fn list_following(
        &self,
        account_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        self.follow_repo
            .find_following(account_id, limit, until_id)
            .await
    }

    /// Get pending follow requests received by an account.
    pub async fn list_pending_incoming(
        &self,
        account_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        self.follow_repo
            .find_pending_incoming(account_id, limit, until_id)
            .await
    }

    /// Get pending follow requests sent by an account.
    pub async fn list_pending_outgoing(
        &self,
        account_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        self.follow_repo
            .find_pending_outgoing(account_id, limit, until_id)
            .await
    }

    /// Check whether an account is following another (accepted edge).
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        self.follow_repo.is_following(follower_id, followee_id).await
    }

    /// Check whether two accounts are friends.
    ///
    /// Constant-time lookup against the derived friendship table; never
    /// recomputed from follow edges at read time.
    pub async fn are_friends(&self, a: &str, b: &str) -> AppResult<bool> {
        self.friendship_repo.are_friends(a, b).await
    }

    /// Get friends of an account.
    pub async fn list_friends(
        &self,
        account_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<friendship::Model>> {
        self.friendship_repo
            .find_friends(account_id, limit, until_id)
            .await
    }

    // ==================== Transaction Scripts ====================

    async fn request_follow_txn(
        &self,
        actor_id: &str,
        target_id: &str,
    ) -> AppResult<FollowOutcome> {
        let txn = self.begin().await?;
        let (_actor, target) = self.lock_accounts(&txn, actor_id, target_id).await?;

        let edge = Self::find_edge(&txn, actor_id, target_id).await?;
        match edge.as_ref().map(|e| e.status) {
            Some(FollowStatus::Accepted) => {
                txn.commit().await.map_err(|e| Self::classify_db_err(&e))?;
                return Ok(FollowOutcome::AlreadyFollowing);
            }
            Some(FollowStatus::Pending) => {
                txn.commit().await.map_err(|e| Self::classify_db_err(&e))?;
                return Ok(FollowOutcome::AlreadyRequested);
            }
            Some(FollowStatus::Rejected) | None => {}
        }

        let now = Utc::now();
        let status = if target.visibility.requires_approval() {
            FollowStatus::Pending
        } else {
            FollowStatus::Accepted
        };

        if let Some(existing) = edge {
            // Re-request after rejection overwrites the edge in place.
            let mut active: follow_edge::ActiveModel = existing.into();
            active.status = Set(status);
            active.last_actor_id = Set(Some(actor_id.to_string()));
            active.updated_at = Set(Some(now.into()));
            active
                .update(&txn)
                .await
                .map_err(|e| Self::classify_db_err(&e))?;
        } else {
            follow_edge::ActiveModel {
                id: Set(self.id_gen.generate()),
                follower_id: Set(actor_id.to_string()),
                followee_id: Set(target_id.to_string()),
                status: Set(status),
                last_actor_id: Set(Some(actor_id.to_string())),
                created_at: Set(now.into()),
                updated_at: Set(None),
            }
            .insert(&txn)
            .await
            .map_err(|e| Self::classify_db_err(&e))?;
        }

        let became_friends = if status == FollowStatus::Accepted {
            self.derive_friendship(&txn, actor_id, target_id).await?
        } else {
            false
        };

        txn.commit().await.map_err(|e| Self::classify_db_err(&e))?;

        Ok(if status == FollowStatus::Accepted {
            FollowOutcome::Following { became_friends }
        } else {
            FollowOutcome::Requested
        })
    }

    async fn accept_follow_request_txn(
        &self,
        owner_id: &str,
        requester_id: &str,
    ) -> AppResult<AcceptOutcome> {
        let txn = self.begin().await?;
        self.lock_accounts(&txn, owner_id, requester_id).await?;

        let edge = Self::find_edge(&txn, requester_id, owner_id).await?;
        let Some(edge) = edge else {
            return Err(AppError::NotFound("Follow request not found".to_string()));
        };

        match edge.status {
            FollowStatus::Accepted => {
                // A concurrent accept got here first; idempotent result.
                txn.commit().await.map_err(|e| Self::classify_db_err(&e))?;
                return Ok(AcceptOutcome::AlreadyAccepted);
            }
            FollowStatus::Rejected => {
                return Err(AppError::InvalidOperation(
                    "Follow request is not pending".to_string(),
                ));
            }
            FollowStatus::Pending => {}
        }

        let mut active: follow_edge::ActiveModel = edge.into();
        active.status = Set(FollowStatus::Accepted);
        active.last_actor_id = Set(Some(owner_id.to_string()));
        active.updated_at = Set(Some(Utc::now().into()));
        active
            .update(&txn)
            .await
            .map_err(|e| Self::classify_db_err(&e))?;

        let became_friends = self.derive_friendship(&txn, requester_id, owner_id).await?;

        txn.commit().await.map_err(|e| Self::classify_db_err(&e))?;

        Ok(AcceptOutcome::Accepted { became_friends })
    }

    async fn unfollow_txn(&self, actor_id: &str, target_id: &str) -> AppResult<UnfollowOutcome> {
        let txn = self.begin().await?;
        self.lock_accounts(&txn, actor_id, target_id).await?;

        let edge = Self::find_edge(&txn, actor_id, target_id).await?;
        let Some(edge) = edge else {
            return Err(AppError::NotFound("Not following this account".to_string()));
        };

        let was_accepted = edge.status.is_accepted();
        edge.delete(&txn)
            .await
            .map_err(|e| Self::classify_db_err(&e))?;

        let friendship_removed = if was_accepted {
            Self::remove_friendship(&txn, actor_id, target_id).await?
        } else {
            false
        };

        txn.commit().await.map_err(|e| Self::classify_db_err(&e))?;

        Ok(UnfollowOutcome { friendship_removed })
    }

    // ==================== Derivation Helpers ====================

    /// Materialize the friendship pair for `a` and `b` if the reciprocal
    /// edge is also accepted. Assumes the `a` -> `b` direction was just
    /// accepted within the same transaction. Returns whether a new pair was
    /// created.
    async fn derive_friendship<C: ConnectionTrait>(
        &self,
        conn: &C,
        a: &str,
        b: &str,
    ) -> AppResult<bool> {
        let reciprocal = Self::find_edge(conn, b, a).await?;
        if !reciprocal.is_some_and(|e| e.status.is_accepted()) {
            return Ok(false);
        }

        // Idempotent: both halves are written together, so one check suffices.
        let existing = Friendship::find()
            .filter(friendship::Column::UserId.eq(a))
            .filter(friendship::Column::FriendId.eq(b))
            .one(conn)
            .await
            .map_err(|e| Self::classify_db_err(&e))?;
        if existing.is_some() {
            return Ok(false);
        }

        let now = Utc::now();
        for (user_id, friend_id) in [(a, b), (b, a)] {
            friendship::ActiveModel {
                id: Set(self.id_gen.generate()),
                user_id: Set(user_id.to_string()),
                friend_id: Set(friend_id.to_string()),
                created_at: Set(now.into()),
            }
            .insert(conn)
            .await
            .map_err(|e| Self::classify_db_err(&e))?;
        }

        tracing::debug!(a, b, "Materialized friendship pair");
        Ok(true)
    }

    /// Delete both halves of a friendship pair, if present.
    async fn remove_friendship<C: ConnectionTrait>(conn: &C, a: &str, b: &str) -> AppResult<bool> {
        let result = Friendship::delete_many()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(friendship::Column::UserId.eq(a))
                            .add(friendship::Column::FriendId.eq(b)),
                    )
                    .add(
                        Condition::all()
                            .add(friendship::Column::UserId.eq(b))
                            .add(friendship::Column::FriendId.eq(a)),
                    ),
            )
            .exec(conn)
            .await
            .map_err(|e| Self::classify_db_err(&e))?;

        Ok(result.rows_affected > 0)
    }

    // ==================== Locking & Retry ====================

    async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| Self::classify_db_err(&e))
    }

    /// Lock both account rows, in ascending-id order to avoid deadlock
    /// between concurrent operations approaching the pair from opposite
    /// directions. Returns the models in argument order.
    async fn lock_accounts(
        &self,
        txn: &DatabaseTransaction,
        a: &str,
        b: &str,
    ) -> AppResult<(user::Model, user::Model)> {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let first_user = Self::lock_account(txn, first).await?;
        let second_user = Self::lock_account(txn, second).await?;

        if first == a {
            Ok((first_user, second_user))
        } else {
            Ok((second_user, first_user))
        }
    }

    async fn lock_account(txn: &DatabaseTransaction, id: &str) -> AppResult<user::Model> {
        User::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(|e| Self::classify_db_err(&e))?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    async fn find_edge<C: ConnectionTrait>(
        conn: &C,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow_edge::Model>> {
        FollowEdge::find()
            .filter(follow_edge::Column::FollowerId.eq(follower_id))
            .filter(follow_edge::Column::FolloweeId.eq(followee_id))
            .one(conn)
            .await
            .map_err(|e| Self::classify_db_err(&e))
    }

    /// Map transient pair-mutation failures to `Conflict` so the retry loop
    /// can resolve them internally; everything else is a database error.
    fn classify_db_err(e: &DbErr) -> AppError {
        let msg = e.to_string();
        let lower = msg.to_lowercase();
        // Postgres phrases serialization failures (SQLSTATE 40001) as
        // "could not serialize access due to ...".
        if lower.contains("duplicate key")
            || lower.contains("unique constraint")
            || lower.contains("could not serialize")
            || lower.contains("40001")
            || lower.contains("deadlock")
        {
            AppError::Conflict(msg)
        } else {
            AppError::Database(msg)
        }
    }

    async fn conflict_backoff(&self, attempt: u32) {
        let base = self.config.conflict_backoff_ms << (attempt - 1);
        let jitter = rand::thread_rng().gen_range(0..=self.config.conflict_backoff_ms);
        tracing::debug!(attempt, delay_ms = base + jitter, "Retrying conflicted pair transaction");
        tokio::time::sleep(Duration::from_millis(base + jitter)).await;
    }

    async fn emit_became_friends(
        &self,
        notifications: &NotificationService,
        a: &str,
        b: &str,
    ) {
        for (notifiee, friend) in [(a, b), (b, a)] {
            if let Err(e) = notifications
                .create_became_friends_notification(notifiee, friend)
                .await
            {
                tracing::warn!(error = %e, "Failed to record became friends notification");
            }
        }
    }
}
