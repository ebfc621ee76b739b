pub mod coordinator;
pub mod identity;
pub mod session_store;
pub mod token;
pub mod token_manager;

pub use coordinator::AuthCoordinator;
pub use identity::{
    identity_event_stream, Identity, IdentityEvent, IdentityProvider, PushTokenSource, StaticPushToken,
};
pub use session_store::SessionStore;
pub use token::{Session, SessionState};
pub use token_manager::SessionTokenManager;
