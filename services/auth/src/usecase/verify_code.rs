use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Settings;
use crate::domain::store::{AuthStore, NewSession, StoreQueries, StoreTx};
use crate::domain::types::{Role, Team, User, normalize_email};
use crate::error::AuthError;
use crate::limiter::AttemptTracker;
use crate::tokens::{hash_string, mint_token, normalize_code};
use crate::usecase::identity::resolve_identity;

pub struct VerifyCodeInput {
    pub email: String,
    pub code: String,
    pub device_id: String,
}

#[derive(Debug)]
pub struct VerifyCodeOutput {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub user: User,
    pub team: Team,
    pub role: Role,
}

pub struct VerifyCodeUseCase<S: AuthStore> {
    pub store: S,
    pub fail_limit: Arc<AttemptTracker>,
    pub settings: Arc<Settings>,
}

impl<S: AuthStore> VerifyCodeUseCase<S> {
    pub async fn execute(
        &self,
        input: VerifyCodeInput,
        now: DateTime<Utc>,
    ) -> Result<VerifyCodeOutput, AuthError> {
        let Some((email, domain)) = normalize_email(&input.email) else {
            return Err(AuthError::BadInput("a valid email is required"));
        };
        let Some(code) = normalize_code(&input.code) else {
            return Err(AuthError::BadInput("a valid code is required"));
        };
        let device_id = input.device_id.trim();
        if device_id.is_empty() {
            return Err(AuthError::BadInput("a device id is required"));
        }

        if self.fail_limit.is_locked(&email, now) {
            return Err(AuthError::Locked);
        }

        // Everything up to the commit runs in one transaction: consuming
        // the code, resolving user/team/membership and persisting the
        // session either all happen or none do.
        let tx = self.store.begin().await?;

        let code_row = match tx.get_verification_code(&email, &code, now).await? {
            Some(row) => row,
            None => {
                if let Err(err) = tx.rollback().await {
                    tracing::warn!(error = %err, "rollback after unknown code failed");
                }
                let locked = self.fail_limit.register_failure(
                    &email,
                    self.settings.verify_code_email_limit,
                    self.settings.verify_code_email_window,
                    self.settings.verify_code_lock,
                    now,
                );
                return Err(if locked {
                    AuthError::Locked
                } else {
                    AuthError::InvalidCode
                });
            }
        };

        tx.mark_verification_code_used(code_row.id, now).await?;

        let identity =
            resolve_identity(&tx, &email, &domain, self.settings.team_size_limit, now).await?;

        let access = mint_token();
        let refresh = mint_token();
        let access_expires_at = now + self.settings.access_ttl;
        let refresh_expires_at = now + self.settings.refresh_ttl;

        tx.create_session(NewSession {
            user_id: identity.user.id,
            device_id_hash: hash_string(device_id),
            access_token_hash: access.hash,
            access_expires_at,
            refresh_token_hash: refresh.hash,
            refresh_expires_at,
        })
        .await?;

        tx.commit().await?;

        self.fail_limit.reset(&email);

        Ok(VerifyCodeOutput {
            access_token: access.token,
            access_expires_at,
            refresh_token: refresh.token,
            refresh_expires_at,
            user: identity.user,
            team: identity.team,
            role: identity.role,
        })
    }
}
