//! Business logic services.

#![allow(missing_docs)]

pub mod account;
pub mod group;
pub mod notification;
pub mod relationship;

pub use account::{AccountService, CreateAccountInput};
pub use group::{CreateGroupInput, GroupService, JoinOutcome};
pub use notification::NotificationService;
pub use relationship::{AcceptOutcome, FollowOutcome, RelationshipService, UnfollowOutcome};
