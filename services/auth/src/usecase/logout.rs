use chrono::{DateTime, Utc};

use crate::domain::store::AuthStore;
use crate::error::AuthError;
use crate::tokens::{hash_string, hashes_equal};

pub struct LogoutInput {
    pub refresh_token: String,
    pub device_id: String,
}

pub struct LogoutUseCase<S: AuthStore> {
    pub store: S,
}

impl<S: AuthStore> LogoutUseCase<S> {
    pub async fn execute(&self, input: LogoutInput, now: DateTime<Utc>) -> Result<(), AuthError> {
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

        self.store.revoke_session(session.id, now).await?;
        Ok(())
    }
}
