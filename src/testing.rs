// In-memory collaborators for unit tests

use futures::future::BoxFuture;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

use crate::auth::{AuthApi, RefreshedTokens, TokenPair, User};
use crate::error::{ApiError, Result, TransportFailure};
use crate::http_client::{ApiRequest, ApiResponse, Transport};

/// How the fake auth service answers refresh calls
#[derive(Debug, Clone)]
pub enum RefreshBehavior {
    Succeed {
        access_token: String,
        refresh_token: Option<String>,
    },
    Reject,
}

impl RefreshBehavior {
    pub fn succeed(access_token: &str) -> Self {
        RefreshBehavior::Succeed {
            access_token: access_token.to_string(),
            refresh_token: None,
        }
    }

    pub fn rotate(access_token: &str, refresh_token: &str) -> Self {
        RefreshBehavior::Succeed {
            access_token: access_token.to_string(),
            refresh_token: Some(refresh_token.to_string()),
        }
    }
}

/// Auth service double
///
/// Accepts password "secret" and issues `access_token`/`refresh_token`.
/// When gated, refresh calls block until `release_refresh` is called.
pub struct FakeAuthApi {
    access_token: String,
    refresh_token: String,
    refresh: RefreshBehavior,
    gate: Option<Notify>,
    refresh_calls: AtomicUsize,
    last_refresh_token: Mutex<Option<String>>,
}

impl FakeAuthApi {
    pub fn new() -> Self {
        Self {
            access_token: "abc".to_string(),
            refresh_token: "r1".to_string(),
            refresh: RefreshBehavior::Reject,
            gate: None,
            refresh_calls: AtomicUsize::new(0),
            last_refresh_token: Mutex::new(None),
        }
    }

    pub fn with_tokens(mut self, access_token: &str, refresh_token: &str) -> Self {
        self.access_token = access_token.to_string();
        self.refresh_token = refresh_token.to_string();
        self
    }

    pub fn with_refresh(mut self, behavior: RefreshBehavior) -> Self {
        self.refresh = behavior;
        self
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub fn release_refresh(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().unwrap().clone()
    }
}

impl AuthApi for FakeAuthApi {
    fn login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<TokenPair>> {
        Box::pin(async move {
            if username.is_empty() || password != "secret" {
                return Err(ApiError::Authentication("Invalid credentials".to_string()));
            }
            Ok(TokenPair {
                access_token: self.access_token.clone(),
                refresh_token: self.refresh_token.clone(),
            })
        })
    }

    fn refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshedTokens>> {
        Box::pin(async move {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_refresh_token.lock().unwrap() = Some(refresh_token.to_string());

            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            match &self.refresh {
                RefreshBehavior::Succeed {
                    access_token,
                    refresh_token,
                } => Ok(RefreshedTokens {
                    access_token: access_token.clone(),
                    refresh_token: refresh_token.clone(),
                }),
                RefreshBehavior::Reject => {
                    Err(ApiError::Refresh("Invalid refresh token".to_string()))
                }
            }
        })
    }

    fn get_user<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<User>> {
        Box::pin(async move {
            if access_token.is_empty() {
                return Err(ApiError::Authentication("not signed in".to_string()));
            }
            Ok(User {
                id: 1,
                username: "emilys".to_string(),
                email: Some("emily.johnson@x.dummyjson.com".to_string()),
                first_name: Some("Emily".to_string()),
                last_name: Some("Johnson".to_string()),
                image: None,
            })
        })
    }
}

type Handler =
    Box<dyn Fn(&ApiRequest) -> std::result::Result<ApiResponse, TransportFailure> + Send + Sync>;

/// Transport double that records every request it receives
pub struct FakeTransport {
    handler: Handler,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> std::result::Result<ApiResponse, TransportFailure>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers 200 with `{"path": ...}` when the bearer token matches,
    /// 401 otherwise. `/broken` always answers 500.
    pub fn accepting(token: &str) -> Self {
        let expected = format!("Bearer {}", token);
        Self::new(move |request| {
            if request.path == "/broken" {
                return Err(TransportFailure::new(
                    Some(500),
                    "Internal Server Error",
                    request.clone(),
                ));
            }
            if request.authorization() == Some(expected.as_str()) {
                Ok(ApiResponse {
                    status: 200,
                    body: json!({ "path": request.path }),
                })
            } else {
                Err(TransportFailure::new(
                    Some(401),
                    "Token Expired!",
                    request.clone(),
                ))
            }
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.requests()
            .iter()
            .map(|r| r.authorization().map(str::to_string))
            .collect()
    }
}

impl Transport for FakeTransport {
    fn execute(
        &self,
        request: ApiRequest,
    ) -> BoxFuture<'_, std::result::Result<ApiResponse, TransportFailure>> {
        self.requests.lock().unwrap().push(request.clone());
        let result = (self.handler)(&request);
        Box::pin(async move { result })
    }
}
