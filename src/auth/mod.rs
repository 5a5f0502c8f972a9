// Authentication module
// Manages the credential session and the shared refresh flight

mod api;
mod coordinator;
mod manager;
mod types;

pub use api::{AuthApi, HttpAuthApi};
pub use coordinator::{RefreshCoordinator, RefreshOutcome};
pub use manager::AuthManager;
pub use types::{RefreshedTokens, TokenPair, User};
