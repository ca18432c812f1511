use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Account holder. Created on first successful code verification; the only
/// later mutation is setting `email_verified_at` when a previously
/// unverified record re-verifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub email_domain: String,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Team namespace keyed by email domain, created lazily on the first
/// verified member. `name` starts out equal to the domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: Uuid,
    pub domain: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Membership role, fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "member" => Some(Role::Member),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership of a user in the team matching their email domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMembership {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// One-time verification code delivered by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCode {
    pub id: Uuid,
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Token pair bound to a user and device. Holds SHA-256 digests only; the
/// tokens themselves exist nowhere but the minting response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id_hash: Vec<u8>,
    pub access_token_hash: Vec<u8>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token_hash: Vec<u8>,
    pub refresh_expires_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Normalize a submitted email: trim + lowercase, then require exactly one
/// `@` with a non-empty local part and domain. Returns `(email, domain)`.
/// No structural validation beyond that.
pub fn normalize_email(raw: &str) -> Option<(String, String)> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    let domain = domain.to_owned();
    Some((email, domain))
}
