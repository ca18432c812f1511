use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Settings;
use crate::domain::store::{AuthStore, NewSession};
use crate::error::AuthError;
use crate::tokens::{hash_string, hashes_equal, mint_token};

pub struct RefreshInput {
    pub refresh_token: String,
    pub device_id: String,
}

#[derive(Debug)]
pub struct RefreshOutput {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

pub struct RefreshTokenUseCase<S: AuthStore> {
    pub store: S,
    pub settings: Arc<Settings>,
}

impl<S: AuthStore> RefreshTokenUseCase<S> {
    pub async fn execute(
        &self,
        input: RefreshInput,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutput, AuthError> {
        let refresh_token = input.refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AuthError::BadInput("refresh_token is required"));
        }
        let device_id = input.device_id.trim();
        if device_id.is_empty() {
            return Err(AuthError::BadInput("a device id is required"));
        }

        let session = self
            .store
            .get_session_by_refresh_hash(&hash_string(refresh_token), now)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if !hashes_equal(&session.device_id_hash, &hash_string(device_id)) {
            return Err(AuthError::DeviceMismatch);
        }

        // First presentation rotates the session. Within the grace window
        // the same token is accepted once more without re-rotating, so one
        // concurrent retry from the same client survives; after the window
        // the token is dead.
        match session.rotated_at {
            None => self.store.rotate_session(session.id, now).await?,
            Some(rotated_at) => {
                if now - rotated_at > self.settings.refresh_grace {
                    return Err(AuthError::InvalidRefreshToken);
                }
            }
        }

        let access = mint_token();
        let refresh = mint_token();
        let access_expires_at = now + self.settings.access_ttl;
        let refresh_expires_at = now + self.settings.refresh_ttl;

        self.store
            .create_session(NewSession {
                user_id: session.user_id,
                device_id_hash: session.device_id_hash.clone(),
                access_token_hash: access.hash,
                access_expires_at,
                refresh_token_hash: refresh.hash,
                refresh_expires_at,
            })
            .await?;

        // Best-effort bookkeeping; the successor is already persisted.
        if let Err(err) = self.store.mark_session_used(session.id, now).await {
            tracing::warn!(error = %err, "failed to mark predecessor session used");
        }

        Ok(RefreshOutput {
            access_token: access.token,
            access_expires_at,
            refresh_token: refresh.token,
            refresh_expires_at,
        })
    }
}
