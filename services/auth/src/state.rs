use std::sync::Arc;

use crate::config::Settings;
use crate::infra::mailer::Mailer;
use crate::limiter::AttemptTracker;

/// Shared application state passed to every handler via axum `State`.
/// Generic over the store so tests can run the full stack against an
/// in-memory implementation.
#[derive(Clone)]
pub struct AppState<S> {
    pub store: S,
    pub mailer: Arc<dyn Mailer>,
    pub settings: Arc<Settings>,
    /// Budget for code requests, keyed by email.
    pub email_limit: Arc<AttemptTracker>,
    /// Failure lockout for code verification, keyed by email.
    pub fail_limit: Arc<AttemptTracker>,
    /// IP/device budgets enforced at the edge before dispatch.
    pub edge_limit: Arc<AttemptTracker>,
}

impl<S> AppState<S> {
    pub fn new(store: S, mailer: Arc<dyn Mailer>, settings: Settings) -> Self {
        Self {
            store,
            mailer,
            settings: Arc::new(settings),
            email_limit: Arc::new(AttemptTracker::new()),
            fail_limit: Arc::new(AttemptTracker::new()),
            edge_limit: Arc::new(AttemptTracker::new()),
        }
    }
}
