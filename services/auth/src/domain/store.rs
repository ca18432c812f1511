use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{AuthSession, Role, Team, TeamMembership, User, VerificationCode};

/// Store failures. Not-found is carried by `Option` on the query results;
/// unique-constraint violations are surfaced distinctly so a lost insert
/// race can be resolved by re-reading.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violation")]
    UniqueViolation,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Fields of a new session row. The store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub device_id_hash: Vec<u8>,
    pub access_token_hash: Vec<u8>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token_hash: Vec<u8>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// The named operations the auth flows consume. Implemented both by the
/// autocommit store and by open transaction handles, so the verify flow can
/// run the same operations inside its transaction.
#[async_trait]
pub trait StoreQueries: Send + Sync {
    async fn create_verification_code(
        &self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationCode, StoreError>;

    /// Look up a consumable code row: matching email and code, not yet
    /// used, expiring strictly after `expires_after`.
    async fn get_verification_code(
        &self,
        email: &str,
        code: &str,
        expires_after: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, StoreError>;

    async fn mark_verification_code_used(
        &self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn create_user(
        &self,
        email: &str,
        email_domain: &str,
        email_verified_at: DateTime<Utc>,
    ) -> Result<User, StoreError>;

    async fn update_user_verified_at(
        &self,
        id: Uuid,
        email_verified_at: DateTime<Utc>,
    ) -> Result<User, StoreError>;

    async fn get_team_by_domain(&self, domain: &str) -> Result<Option<Team>, StoreError>;

    async fn create_team(&self, domain: &str, name: &str) -> Result<Team, StoreError>;

    async fn get_team_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMembership>, StoreError>;

    async fn count_team_members(&self, team_id: Uuid) -> Result<i64, StoreError>;

    async fn create_team_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: Role,
        joined_at: DateTime<Utc>,
    ) -> Result<TeamMembership, StoreError>;

    async fn create_session(&self, session: NewSession) -> Result<AuthSession, StoreError>;

    /// Look up a live session: matching refresh-token digest, unrevoked,
    /// with `refresh_expires_at` strictly after `expires_after`.
    async fn get_session_by_refresh_hash(
        &self,
        refresh_token_hash: &[u8],
        expires_after: DateTime<Utc>,
    ) -> Result<Option<AuthSession>, StoreError>;

    async fn rotate_session(&self, id: Uuid, rotated_at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn mark_session_used(
        &self,
        id: Uuid,
        last_used_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn revoke_session(&self, id: Uuid, revoked_at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// An open transaction over the same operations. Dropping an uncommitted
/// handle rolls the transaction back.
#[async_trait]
pub trait StoreTx: StoreQueries {
    async fn commit(self) -> Result<(), StoreError>;
    async fn rollback(self) -> Result<(), StoreError>;
}

/// Entry point held by the flows. Operations invoked directly on the store
/// run autocommit; `begin` opens the explicit transaction used by code
/// verification.
#[async_trait]
pub trait AuthStore: StoreQueries {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}
