// Single-flight credential refresh

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use super::manager::AuthManager;
use crate::error::ApiError;

/// Result of a refresh flight, shared by every caller that joined it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New access token
    Refreshed(String),
    /// Refresh rejected or abandoned
    Failed,
}

#[derive(Default)]
struct FlightState {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Collapses concurrent refresh requests into one auth service call
///
/// The first caller runs the refresh; callers arriving while it is in
/// flight queue a waiter and receive the same outcome. The check-and-set
/// of the in-progress flag happens under a lock that is never held across
/// an await.
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<FlightState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FlightState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a refresh flight is currently running
    pub fn is_refreshing(&self) -> bool {
        self.lock().in_progress
    }

    /// Number of callers queued behind the current flight
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Run or join the refresh flight
    ///
    /// On failure the session is signed out before any waiter is released,
    /// unless it was already replaced while the refresh was in flight.
    pub async fn refresh(&self, auth: &AuthManager) -> RefreshOutcome {
        let waiter = {
            let mut state = self.lock();
            if state.in_progress {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                tracing::debug!(waiters = state.waiters.len(), "Joining in-flight refresh");
                Some(rx)
            } else {
                state.in_progress = true;
                None
            }
        };

        if let Some(rx) = waiter {
            // A dropped sender means the flight was abandoned
            return rx.await.unwrap_or(RefreshOutcome::Failed);
        }

        let mut flight = Flight {
            state: &self.state,
            outcome: None,
        };

        let outcome = match auth.refresh().await {
            Ok(token) => RefreshOutcome::Refreshed(token),
            Err(ApiError::SessionChanged) => {
                tracing::debug!("Session replaced during refresh, keeping it");
                RefreshOutcome::Failed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Credential refresh failed, signing out");
                auth.sign_out().await;
                RefreshOutcome::Failed
            }
        };

        flight.outcome = Some(outcome.clone());
        drop(flight);
        outcome
    }
}

/// Settles a flight when the initiating caller finishes or is dropped
struct Flight<'a> {
    state: &'a Mutex<FlightState>,
    outcome: Option<RefreshOutcome>,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let waiters = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.in_progress = false;
            std::mem::take(&mut state.waiters)
        };

        let outcome = self.outcome.take().unwrap_or(RefreshOutcome::Failed);
        tracing::debug!(
            waiters = waiters.len(),
            outcome = outcome_label(&outcome),
            "Refresh settled"
        );
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

fn outcome_label(outcome: &RefreshOutcome) -> &'static str {
    match outcome {
        RefreshOutcome::Refreshed(_) => "refreshed",
        RefreshOutcome::Failed => "failed",
    }
}
