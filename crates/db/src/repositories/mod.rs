//! Database repositories.

mod follow_edge;
mod friendship;
mod group;
mod notification;
mod user;

pub use follow_edge::FollowEdgeRepository;
pub use friendship::FriendshipRepository;
pub use group::GroupRepository;
pub use notification::NotificationRepository;
pub use user::UserRepository;
