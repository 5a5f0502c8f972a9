// Authentication service calls

use futures::future::BoxFuture;
use std::sync::Arc;

use super::types::{LoginRequest, RefreshRequest, RefreshedTokens, TokenPair, User};
use crate::error::{ApiError, Result, TransportFailure};
use crate::http_client::{ApiRequest, Transport};

const LOGIN_PATH: &str = "/auth/login";
const REFRESH_PATH: &str = "/auth/refresh";
const PROFILE_PATH: &str = "/auth/me";

/// Authentication collaborator used by `AuthManager`
pub trait AuthApi: Send + Sync {
    /// Exchange username and password for a token pair
    fn login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<TokenPair>>;

    /// Exchange a refresh token for a new access token
    fn refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshedTokens>>;

    /// Fetch the profile belonging to an access token
    fn get_user<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<User>>;
}

/// `AuthApi` over the raw transport
///
/// Calls bypass the request pipeline so a rejected refresh never re-enters
/// the refresh path.
pub struct HttpAuthApi {
    transport: Arc<dyn Transport>,
}

impl HttpAuthApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

/// Client errors (4xx) mean the credential was rejected
fn is_rejection(failure: &TransportFailure) -> bool {
    matches!(failure.status, Some(400..=499))
}

impl AuthApi for HttpAuthApi {
    fn login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<TokenPair>> {
        Box::pin(async move {
            let body = serde_json::to_value(LoginRequest { username, password })
                .map_err(|e| ApiError::Internal(e.into()))?;
            let request = ApiRequest::post(LOGIN_PATH).json(body);

            match self.transport.execute(request).await {
                Ok(response) => response.json(),
                Err(failure) if is_rejection(&failure) => {
                    tracing::warn!(status = ?failure.status, "Login rejected");
                    Err(ApiError::Authentication(failure.message))
                }
                Err(failure) => Err(failure.into()),
            }
        })
    }

    fn refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshedTokens>> {
        Box::pin(async move {
            let body = serde_json::to_value(RefreshRequest { refresh_token })
                .map_err(|e| ApiError::Internal(e.into()))?;
            let request = ApiRequest::post(REFRESH_PATH).json(body);

            let tokens: RefreshedTokens = match self.transport.execute(request).await {
                Ok(response) => response.json()?,
                Err(failure) if is_rejection(&failure) => {
                    return Err(ApiError::Refresh(format!(
                        "refresh token rejected ({}): {}",
                        failure.status.unwrap_or_default(),
                        failure.message
                    )))
                }
                Err(failure) => return Err(failure.into()),
            };

            if tokens.access_token.is_empty() {
                return Err(ApiError::Refresh(
                    "refresh response does not contain accessToken".to_string(),
                ));
            }
            Ok(tokens)
        })
    }

    fn get_user<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<User>> {
        Box::pin(async move {
            if access_token.is_empty() {
                return Err(ApiError::Authentication("not signed in".to_string()));
            }
            let request = ApiRequest::get(PROFILE_PATH).bearer_token(access_token);

            match self.transport.execute(request).await {
                Ok(response) => response.json(),
                Err(failure) if matches!(failure.status, Some(401) | Some(403)) => {
                    Err(ApiError::Authentication(failure.message))
                }
                Err(failure) => Err(failure.into()),
            }
        })
    }
}
