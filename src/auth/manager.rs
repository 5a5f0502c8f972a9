use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::api::AuthApi;
use super::types::User;
use crate::error::{ApiError, Result};

/// Current credential session
///
/// Empty strings mean "absent". `generation` bumps on every sign-in and
/// sign-out so an in-flight refresh can tell its session was replaced.
#[derive(Clone, Default)]
struct Session {
    access_token: String,
    refresh_token: String,
    user: Option<User>,
    generation: u64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &!self.access_token.is_empty())
            .field("has_refresh_token", &!self.refresh_token.is_empty())
            .field("user", &self.user.as_ref().map(|u| u.username.as_str()))
            .finish()
    }
}

/// Authentication manager
/// Owns the credential session and talks to the auth service
pub struct AuthManager {
    /// Auth service calls
    api: Arc<dyn AuthApi>,

    /// Current session
    session: RwLock<Session>,
}

impl fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthManager").finish_non_exhaustive()
    }
}

impl AuthManager {
    /// Create a signed-out manager
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self {
            api,
            session: RwLock::new(Session::default()),
        }
    }

    pub async fn access_token(&self) -> String {
        self.session.read().await.access_token.clone()
    }

    pub async fn current_refresh_token(&self) -> String {
        self.session.read().await.refresh_token.clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.session.read().await.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        !self.session.read().await.access_token.is_empty()
    }

    pub async fn has_refresh_token(&self) -> bool {
        !self.session.read().await.refresh_token.is_empty()
    }

    /// Authorization header value, empty when signed out
    pub async fn bearer(&self) -> String {
        let session = self.session.read().await;
        if session.access_token.is_empty() {
            String::new()
        } else {
            format!("Bearer {}", session.access_token)
        }
    }

    /// Sign in with username and password
    ///
    /// The session is only replaced once both the token pair and the profile
    /// have been fetched; on any error it is left untouched.
    #[tracing::instrument(skip(self, password))]
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<()> {
        let tokens = self.api.login(username, password).await?;
        let user = self.api.get_user(&tokens.access_token).await?;

        let mut session = self.session.write().await;
        *session = Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user: Some(user),
            generation: session.generation + 1,
        };
        tracing::info!("Signed in");
        Ok(())
    }

    /// Re-fetch the profile for the current access token
    pub async fn fetch_user(&self) -> Result<User> {
        let access_token = self.access_token().await;
        let user = self.api.get_user(&access_token).await?;

        let mut session = self.session.write().await;
        if session.access_token == access_token {
            session.user = Some(user.clone());
        }
        Ok(user)
    }

    /// Exchange the held refresh token for a new access token
    ///
    /// Fails fast with `NoRefreshToken` when none is held. The session is
    /// mutated only after the auth service confirms the refresh. If the
    /// session is replaced while the call is in flight the result is
    /// discarded with `SessionChanged`, whatever the service answered.
    pub async fn refresh(&self) -> Result<String> {
        let (refresh_token, generation) = {
            let session = self.session.read().await;
            (session.refresh_token.clone(), session.generation)
        };
        if refresh_token.is_empty() {
            return Err(ApiError::NoRefreshToken);
        }

        tracing::debug!("Refreshing access token...");
        let result = self.api.refresh_token(&refresh_token).await;

        let mut session = self.session.write().await;
        if session.generation != generation {
            // Signed out or signed in again while the call was in flight
            return Err(ApiError::SessionChanged);
        }
        let tokens = result?;

        session.access_token = tokens.access_token;
        if let Some(rotated) = tokens.refresh_token.filter(|t| !t.is_empty()) {
            session.refresh_token = rotated;
        }
        tracing::info!("Access token refreshed");
        Ok(session.access_token.clone())
    }

    /// Clear tokens and profile; safe to call when already signed out
    pub async fn sign_out(&self) {
        let mut session = self.session.write().await;
        if !session.access_token.is_empty() || !session.refresh_token.is_empty() {
            tracing::info!("Signing out");
        }
        *session = Session {
            generation: session.generation + 1,
            ..Session::default()
        };
    }
}
