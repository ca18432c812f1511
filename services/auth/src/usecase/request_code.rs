use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Settings;
use crate::domain::store::AuthStore;
use crate::domain::types::normalize_email;
use crate::error::AuthError;
use crate::infra::mailer::Mailer;
use crate::limiter::AttemptTracker;
use crate::tokens::mint_code;

pub struct RequestCodeInput {
    pub email: String,
}

pub struct RequestCodeUseCase<S: AuthStore> {
    pub store: S,
    pub mailer: Arc<dyn Mailer>,
    pub email_limit: Arc<AttemptTracker>,
    pub settings: Arc<Settings>,
}

impl<S: AuthStore> RequestCodeUseCase<S> {
    pub async fn execute(
        &self,
        input: RequestCodeInput,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let Some((email, _)) = normalize_email(&input.email) else {
            return Err(AuthError::BadInput("a valid email is required"));
        };

        if !self.email_limit.allow(
            &email,
            self.settings.request_code_email_limit,
            self.settings.request_code_email_window,
            now,
        ) {
            return Err(AuthError::RateLimited);
        }

        let code = mint_code();
        self.store
            .create_verification_code(&email, &code, now + self.settings.code_ttl)
            .await?;

        // The row is committed at this point. A delivery failure surfaces
        // as 500 but does not invalidate the stored code; the client can
        // simply request another.
        self.mailer.send_verification_code(&email, &code).await?;

        Ok(())
    }
}
