//! Database entities.

#![allow(missing_docs)]

pub mod follow_edge;
pub mod friendship;
pub mod group_chat;
pub mod group_member;
pub mod notification;
pub mod user;

pub use follow_edge::Entity as FollowEdge;
pub use friendship::Entity as Friendship;
pub use group_chat::Entity as GroupChat;
pub use group_member::Entity as GroupMember;
pub use notification::Entity as Notification;
pub use user::Entity as User;
