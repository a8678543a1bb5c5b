//! Lifecycle coordination between the conversation store and the remote
//! collaborators: optimistic sends, history loading, and the push
//! subscription.

pub mod backend;
pub mod loader;
pub mod poll;
pub mod send;
pub mod subscription;

pub use backend::{BackendError, ChannelError, MessageBackend, ProfileLookup, PushChannel};
pub use loader::{ConversationLoader, LoadError};
pub use poll::PollFallback;
pub use send::{SendCoordinator, SendError};
pub use subscription::{SubscriptionHandle, SubscriptionManager};
