use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use timesync_auth::config::Settings;
use timesync_auth::domain::store::{
    AuthStore, NewSession, StoreError, StoreQueries, StoreTx,
};
use timesync_auth::domain::types::{
    AuthSession, Role, Team, TeamMembership, User, VerificationCode,
};
use timesync_auth::infra::mailer::Mailer;
use timesync_auth::usecase::verify_code::{VerifyCodeInput, VerifyCodeOutput, VerifyCodeUseCase};

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// Fixed reference instant so tests control the clock completely.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

/// Settings mirroring the documented defaults.
pub fn test_settings() -> Settings {
    Settings {
        access_ttl: Duration::minutes(30),
        refresh_ttl: Duration::hours(720),
        code_ttl: Duration::minutes(10),
        refresh_grace: Duration::seconds(30),
        team_size_limit: 30,
        request_code_email_limit: 3,
        request_code_email_window: Duration::minutes(15),
        request_code_ip_limit: 10,
        request_code_ip_window: Duration::minutes(60),
        verify_code_email_limit: 5,
        verify_code_email_window: Duration::minutes(15),
        verify_code_lock: Duration::minutes(15),
        verify_code_ip_limit: 20,
        verify_code_ip_window: Duration::minutes(60),
        refresh_device_limit: 10,
        refresh_device_window: Duration::minutes(1),
    }
}

/// Seed a code row and run the verify flow for it, returning the minted
/// tokens. Shared by the refresh and logout tests.
pub async fn issue_session(
    store: &MemStore,
    email: &str,
    device_id: &str,
    now: DateTime<Utc>,
) -> VerifyCodeOutput {
    store
        .create_verification_code(email, "ABCDEFGH", now + Duration::minutes(10))
        .await
        .unwrap();

    let usecase = VerifyCodeUseCase {
        store: store.clone(),
        fail_limit: Arc::new(timesync_auth::limiter::AttemptTracker::new()),
        settings: Arc::new(test_settings()),
    };
    usecase
        .execute(
            VerifyCodeInput {
                email: email.to_owned(),
                code: "ABCDEFGH".to_owned(),
                device_id: device_id.to_owned(),
            },
            now,
        )
        .await
        .unwrap()
}

// ── MockMailer ───────────────────────────────────────────────────────────────

/// Capturing mail sink. Clones share the sent list, so tests can hold a
/// handle while the use case owns another.
#[derive(Clone, Default)]
pub struct MockMailer {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
    pub fail: bool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// The code of the most recently delivered mail.
    pub fn last_code(&self) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .last()
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_verification_code(&self, email: &str, code: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("smtp unreachable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((email.to_owned(), code.to_owned()));
        Ok(())
    }
}

// ── MemStore ─────────────────────────────────────────────────────────────────

/// Entity rows held by the in-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemState {
    pub users: Vec<User>,
    pub teams: Vec<Team>,
    pub memberships: Vec<TeamMembership>,
    pub codes: Vec<VerificationCode>,
    pub sessions: Vec<AuthSession>,
}

impl MemState {
    pub fn create_verification_code(
        &mut self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> VerificationCode {
        let row = VerificationCode {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            code: code.to_owned(),
            expires_at,
            used_at: None,
            created_at: Utc::now(),
        };
        self.codes.push(row.clone());
        row
    }

    pub fn get_verification_code(
        &self,
        email: &str,
        code: &str,
        expires_after: DateTime<Utc>,
    ) -> Option<VerificationCode> {
        self.codes
            .iter()
            .find(|c| {
                c.email == email
                    && c.code == code
                    && c.used_at.is_none()
                    && c.expires_at > expires_after
            })
            .cloned()
    }

    pub fn mark_verification_code_used(
        &mut self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let row = self
            .codes
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::Other(anyhow::anyhow!("code not found")))?;
        row.used_at = Some(used_at);
        Ok(())
    }

    pub fn get_user_by_email(&self, email: &str) -> Option<User> {
        self.users.iter().find(|u| u.email == email).cloned()
    }

    pub fn create_user(
        &mut self,
        email: &str,
        email_domain: &str,
        email_verified_at: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        if self.users.iter().any(|u| u.email == email) {
            return Err(StoreError::UniqueViolation);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            email_domain: email_domain.to_owned(),
            email_verified_at: Some(email_verified_at),
            created_at: Utc::now(),
        };
        self.users.push(user.clone());
        Ok(user)
    }

    pub fn update_user_verified_at(
        &mut self,
        id: Uuid,
        email_verified_at: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::Other(anyhow::anyhow!("user not found")))?;
        user.email_verified_at = Some(email_verified_at);
        Ok(user.clone())
    }

    pub fn get_team_by_domain(&self, domain: &str) -> Option<Team> {
        self.teams.iter().find(|t| t.domain == domain).cloned()
    }

    pub fn create_team(&mut self, domain: &str, name: &str) -> Result<Team, StoreError> {
        if self.teams.iter().any(|t| t.domain == domain) {
            return Err(StoreError::UniqueViolation);
        }
        let team = Team {
            id: Uuid::new_v4(),
            domain: domain.to_owned(),
            name: name.to_owned(),
            created_at: Utc::now(),
        };
        self.teams.push(team.clone());
        Ok(team)
    }

    pub fn get_team_membership(&self, team_id: Uuid, user_id: Uuid) -> Option<TeamMembership> {
        self.memberships
            .iter()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
            .cloned()
    }

    pub fn count_team_members(&self, team_id: Uuid) -> i64 {
        self.memberships.iter().filter(|m| m.team_id == team_id).count() as i64
    }

    pub fn create_team_membership(
        &mut self,
        team_id: Uuid,
        user_id: Uuid,
        role: Role,
        joined_at: DateTime<Utc>,
    ) -> Result<TeamMembership, StoreError> {
        if self.get_team_membership(team_id, user_id).is_some() {
            return Err(StoreError::UniqueViolation);
        }
        let membership = TeamMembership {
            team_id,
            user_id,
            role,
            joined_at,
        };
        self.memberships.push(membership.clone());
        Ok(membership)
    }

    pub fn create_session(&mut self, new: NewSession) -> AuthSession {
        let session = AuthSession {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            device_id_hash: new.device_id_hash,
            access_token_hash: new.access_token_hash,
            access_expires_at: new.access_expires_at,
            refresh_token_hash: new.refresh_token_hash,
            refresh_expires_at: new.refresh_expires_at,
            rotated_at: None,
            revoked_at: None,
            last_used_at: None,
            created_at: Utc::now(),
        };
        self.sessions.push(session.clone());
        session
    }

    pub fn get_session_by_refresh_hash(
        &self,
        refresh_token_hash: &[u8],
        expires_after: DateTime<Utc>,
    ) -> Option<AuthSession> {
        self.sessions
            .iter()
            .find(|s| {
                s.refresh_token_hash == refresh_token_hash
                    && s.revoked_at.is_none()
                    && s.refresh_expires_at > expires_after
            })
            .cloned()
    }

    pub fn session_mut(&mut self, id: Uuid) -> Result<&mut AuthSession, StoreError> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::Other(anyhow::anyhow!("session not found")))
    }
}

/// In-memory store with the same contract as the sea-orm one. `begin`
/// snapshots the state; commit publishes the snapshot back.
#[derive(Clone, Default)]
pub struct MemStore {
    state: Arc<Mutex<MemState>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MemState {
        self.state.lock().unwrap().clone()
    }

    /// Directly mutate the backing state, for seeding edge cases the flows
    /// cannot produce.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut MemState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

pub struct MemTx {
    store: MemStore,
    working: Mutex<MemState>,
}

#[async_trait]
impl AuthStore for MemStore {
    type Tx = MemTx;

    async fn begin(&self) -> Result<MemTx, StoreError> {
        Ok(MemTx {
            store: self.clone(),
            working: Mutex::new(self.snapshot()),
        })
    }
}

#[async_trait]
impl StoreTx for MemTx {
    async fn commit(self) -> Result<(), StoreError> {
        let working = self.working.into_inner().unwrap();
        *self.store.state.lock().unwrap() = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl StoreQueries for MemStore {
    async fn create_verification_code(
        &self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationCode, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .create_verification_code(email, code, expires_at))
    }

    async fn get_verification_code(
        &self,
        email: &str,
        code: &str,
        expires_after: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .get_verification_code(email, code, expires_after))
    }

    async fn mark_verification_code_used(
        &self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .mark_verification_code_used(id, used_at)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().unwrap().get_user_by_email(email))
    }

    async fn create_user(
        &self,
        email: &str,
        email_domain: &str,
        email_verified_at: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        self.state
            .lock()
            .unwrap()
            .create_user(email, email_domain, email_verified_at)
    }

    async fn update_user_verified_at(
        &self,
        id: Uuid,
        email_verified_at: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        self.state
            .lock()
            .unwrap()
            .update_user_verified_at(id, email_verified_at)
    }

    async fn get_team_by_domain(&self, domain: &str) -> Result<Option<Team>, StoreError> {
        Ok(self.state.lock().unwrap().get_team_by_domain(domain))
    }

    async fn create_team(&self, domain: &str, name: &str) -> Result<Team, StoreError> {
        self.state.lock().unwrap().create_team(domain, name)
    }

    async fn get_team_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMembership>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .get_team_membership(team_id, user_id))
    }

    async fn count_team_members(&self, team_id: Uuid) -> Result<i64, StoreError> {
        Ok(self.state.lock().unwrap().count_team_members(team_id))
    }

    async fn create_team_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: Role,
        joined_at: DateTime<Utc>,
    ) -> Result<TeamMembership, StoreError> {
        self.state
            .lock()
            .unwrap()
            .create_team_membership(team_id, user_id, role, joined_at)
    }

    async fn create_session(&self, session: NewSession) -> Result<AuthSession, StoreError> {
        Ok(self.state.lock().unwrap().create_session(session))
    }

    async fn get_session_by_refresh_hash(
        &self,
        refresh_token_hash: &[u8],
        expires_after: DateTime<Utc>,
    ) -> Result<Option<AuthSession>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .get_session_by_refresh_hash(refresh_token_hash, expires_after))
    }

    async fn rotate_session(&self, id: Uuid, rotated_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.session_mut(id)?.rotated_at = Some(rotated_at);
        Ok(())
    }

    async fn mark_session_used(
        &self,
        id: Uuid,
        last_used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.session_mut(id)?.last_used_at = Some(last_used_at);
        Ok(())
    }

    async fn revoke_session(&self, id: Uuid, revoked_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.session_mut(id)?.revoked_at = Some(revoked_at);
        Ok(())
    }
}

#[async_trait]
impl StoreQueries for MemTx {
    async fn create_verification_code(
        &self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationCode, StoreError> {
        Ok(self
            .working
            .lock()
            .unwrap()
            .create_verification_code(email, code, expires_at))
    }

    async fn get_verification_code(
        &self,
        email: &str,
        code: &str,
        expires_after: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, StoreError> {
        Ok(self
            .working
            .lock()
            .unwrap()
            .get_verification_code(email, code, expires_after))
    }

    async fn mark_verification_code_used(
        &self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.working
            .lock()
            .unwrap()
            .mark_verification_code_used(id, used_at)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.working.lock().unwrap().get_user_by_email(email))
    }

    async fn create_user(
        &self,
        email: &str,
        email_domain: &str,
        email_verified_at: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        self.working
            .lock()
            .unwrap()
            .create_user(email, email_domain, email_verified_at)
    }

    async fn update_user_verified_at(
        &self,
        id: Uuid,
        email_verified_at: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        self.working
            .lock()
            .unwrap()
            .update_user_verified_at(id, email_verified_at)
    }

    async fn get_team_by_domain(&self, domain: &str) -> Result<Option<Team>, StoreError> {
        Ok(self.working.lock().unwrap().get_team_by_domain(domain))
    }

    async fn create_team(&self, domain: &str, name: &str) -> Result<Team, StoreError> {
        self.working.lock().unwrap().create_team(domain, name)
    }

    async fn get_team_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMembership>, StoreError> {
        Ok(self
            .working
            .lock()
            .unwrap()
            .get_team_membership(team_id, user_id))
    }

    async fn count_team_members(&self, team_id: Uuid) -> Result<i64, StoreError> {
        Ok(self.working.lock().unwrap().count_team_members(team_id))
    }

    async fn create_team_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: Role,
        joined_at: DateTime<Utc>,
    ) -> Result<TeamMembership, StoreError> {
        self.working
            .lock()
            .unwrap()
            .create_team_membership(team_id, user_id, role, joined_at)
    }

    async fn create_session(&self, session: NewSession) -> Result<AuthSession, StoreError> {
        Ok(self.working.lock().unwrap().create_session(session))
    }

    async fn get_session_by_refresh_hash(
        &self,
        refresh_token_hash: &[u8],
        expires_after: DateTime<Utc>,
    ) -> Result<Option<AuthSession>, StoreError> {
        Ok(self
            .working
            .lock()
            .unwrap()
            .get_session_by_refresh_hash(refresh_token_hash, expires_after))
    }

    async fn rotate_session(&self, id: Uuid, rotated_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.working.lock().unwrap();
        state.session_mut(id)?.rotated_at = Some(rotated_at);
        Ok(())
    }

    async fn mark_session_used(
        &self,
        id: Uuid,
        last_used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.working.lock().unwrap();
        state.session_mut(id)?.last_used_at = Some(last_used_at);
        Ok(())
    }

    async fn revoke_session(&self, id: Uuid, revoked_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.working.lock().unwrap();
        state.session_mut(id)?.revoked_at = Some(revoked_at);
        Ok(())
    }
}
