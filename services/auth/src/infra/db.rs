use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, PaginatorTrait, QueryFilter, SqlErr,
    TransactionTrait,
};
use uuid::Uuid;

use timesync_auth_schema::{
    auth_sessions, email_verification_codes, team_memberships, teams, users,
};

use crate::domain::store::{AuthStore, NewSession, StoreError, StoreQueries, StoreTx};
use crate::domain::types::{AuthSession, Role, Team, TeamMembership, User, VerificationCode};

/// sea-orm store over the shared connection pool. Operations invoked on it
/// directly run autocommit; `begin` hands out a transaction-bound view.
#[derive(Clone)]
pub struct SeaStore {
    db: DatabaseConnection,
}

impl SeaStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Store view bound to an open transaction. sea-orm rolls the transaction
/// back when the handle is dropped without commit.
pub struct SeaTx {
    txn: DatabaseTransaction,
}

#[async_trait]
impl AuthStore for SeaStore {
    type Tx = SeaTx;

    async fn begin(&self) -> Result<SeaTx, StoreError> {
        let txn = self.db.begin().await.context("begin transaction")?;
        Ok(SeaTx { txn })
    }
}

#[async_trait]
impl StoreTx for SeaTx {
    async fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().await.context("commit transaction")?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.txn.rollback().await.context("rollback transaction")?;
        Ok(())
    }
}

macro_rules! impl_store_queries {
    ($target:ty, $conn:ident) => {
        #[async_trait]
        impl StoreQueries for $target {
            async fn create_verification_code(
                &self,
                email: &str,
                code: &str,
                expires_at: DateTime<Utc>,
            ) -> Result<VerificationCode, StoreError> {
                insert_verification_code(&self.$conn, email, code, expires_at).await
            }

            async fn get_verification_code(
                &self,
                email: &str,
                code: &str,
                expires_after: DateTime<Utc>,
            ) -> Result<Option<VerificationCode>, StoreError> {
                find_verification_code(&self.$conn, email, code, expires_after).await
            }

            async fn mark_verification_code_used(
                &self,
                id: Uuid,
                used_at: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                set_verification_code_used(&self.$conn, id, used_at).await
            }

            async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
                find_user_by_email(&self.$conn, email).await
            }

            async fn create_user(
                &self,
                email: &str,
                email_domain: &str,
                email_verified_at: DateTime<Utc>,
            ) -> Result<User, StoreError> {
                insert_user(&self.$conn, email, email_domain, email_verified_at).await
            }

            async fn update_user_verified_at(
                &self,
                id: Uuid,
                email_verified_at: DateTime<Utc>,
            ) -> Result<User, StoreError> {
                set_user_verified_at(&self.$conn, id, email_verified_at).await
            }

            async fn get_team_by_domain(&self, domain: &str) -> Result<Option<Team>, StoreError> {
                find_team_by_domain(&self.$conn, domain).await
            }

            async fn create_team(&self, domain: &str, name: &str) -> Result<Team, StoreError> {
                insert_team(&self.$conn, domain, name).await
            }

            async fn get_team_membership(
                &self,
                team_id: Uuid,
                user_id: Uuid,
            ) -> Result<Option<TeamMembership>, StoreError> {
                find_team_membership(&self.$conn, team_id, user_id).await
            }

            async fn count_team_members(&self, team_id: Uuid) -> Result<i64, StoreError> {
                count_members(&self.$conn, team_id).await
            }

            async fn create_team_membership(
                &self,
                team_id: Uuid,
                user_id: Uuid,
                role: Role,
                joined_at: DateTime<Utc>,
            ) -> Result<TeamMembership, StoreError> {
                insert_team_membership(&self.$conn, team_id, user_id, role, joined_at).await
            }

            async fn create_session(
                &self,
                session: NewSession,
            ) -> Result<AuthSession, StoreError> {
                insert_session(&self.$conn, session).await
            }

            async fn get_session_by_refresh_hash(
                &self,
                refresh_token_hash: &[u8],
                expires_after: DateTime<Utc>,
            ) -> Result<Option<AuthSession>, StoreError> {
                find_session_by_refresh_hash(&self.$conn, refresh_token_hash, expires_after).await
            }

            async fn rotate_session(
                &self,
                id: Uuid,
                rotated_at: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                set_session_rotated(&self.$conn, id, rotated_at).await
            }

            async fn mark_session_used(
                &self,
                id: Uuid,
                last_used_at: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                set_session_used(&self.$conn, id, last_used_at).await
            }

            async fn revoke_session(
                &self,
                id: Uuid,
                revoked_at: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                set_session_revoked(&self.$conn, id, revoked_at).await
            }
        }
    };
}

impl_store_queries!(SeaStore, db);
impl_store_queries!(SeaTx, txn);

/// Translate an insert failure, keeping unique-constraint violations
/// distinguishable for the lost-race re-read rule.
fn insert_error(err: DbErr, action: &'static str) -> StoreError {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        StoreError::UniqueViolation
    } else {
        StoreError::Other(anyhow::Error::new(err).context(action))
    }
}

// ── Verification codes ───────────────────────────────────────────────────────

async fn insert_verification_code<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    code: &str,
    expires_at: DateTime<Utc>,
) -> Result<VerificationCode, StoreError> {
    let model = email_verification_codes::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_owned()),
        code: Set(code.to_owned()),
        expires_at: Set(expires_at),
        used_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(|e| insert_error(e, "create verification code"))?;
    Ok(verification_code_from_model(model))
}

async fn find_verification_code<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    code: &str,
    expires_after: DateTime<Utc>,
) -> Result<Option<VerificationCode>, StoreError> {
    let model = email_verification_codes::Entity::find()
        .filter(email_verification_codes::Column::Email.eq(email))
        .filter(email_verification_codes::Column::Code.eq(code))
        .filter(email_verification_codes::Column::UsedAt.is_null())
        .filter(email_verification_codes::Column::ExpiresAt.gt(expires_after))
        .one(conn)
        .await
        .context("find verification code")?;
    Ok(model.map(verification_code_from_model))
}

async fn set_verification_code_used<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    used_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    email_verification_codes::ActiveModel {
        id: Set(id),
        used_at: Set(Some(used_at)),
        ..Default::default()
    }
    .update(conn)
    .await
    .context("mark verification code used")?;
    Ok(())
}

fn verification_code_from_model(model: email_verification_codes::Model) -> VerificationCode {
    VerificationCode {
        id: model.id,
        email: model.email,
        code: model.code,
        expires_at: model.expires_at,
        used_at: model.used_at,
        created_at: model.created_at,
    }
}

// ── Users ────────────────────────────────────────────────────────────────────

async fn find_user_by_email<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> Result<Option<User>, StoreError> {
    let model = users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(conn)
        .await
        .context("find user by email")?;
    Ok(model.map(user_from_model))
}

async fn insert_user<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    email_domain: &str,
    email_verified_at: DateTime<Utc>,
) -> Result<User, StoreError> {
    let model = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_owned()),
        email_domain: Set(email_domain.to_owned()),
        email_verified_at: Set(Some(email_verified_at)),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(|e| insert_error(e, "create user"))?;
    Ok(user_from_model(model))
}

async fn set_user_verified_at<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    email_verified_at: DateTime<Utc>,
) -> Result<User, StoreError> {
    let model = users::ActiveModel {
        id: Set(id),
        email_verified_at: Set(Some(email_verified_at)),
        ..Default::default()
    }
    .update(conn)
    .await
    .context("update user verified at")?;
    Ok(user_from_model(model))
}

fn user_from_model(model: users::Model) -> User {
    User {
        id: model.id,
        email: model.email,
        email_domain: model.email_domain,
        email_verified_at: model.email_verified_at,
        created_at: model.created_at,
    }
}

// ── Teams & memberships ──────────────────────────────────────────────────────

async fn find_team_by_domain<C: ConnectionTrait>(
    conn: &C,
    domain: &str,
) -> Result<Option<Team>, StoreError> {
    let model = teams::Entity::find()
        .filter(teams::Column::Domain.eq(domain))
        .one(conn)
        .await
        .context("find team by domain")?;
    Ok(model.map(team_from_model))
}

async fn insert_team<C: ConnectionTrait>(
    conn: &C,
    domain: &str,
    name: &str,
) -> Result<Team, StoreError> {
    let model = teams::ActiveModel {
        id: Set(Uuid::new_v4()),
        domain: Set(domain.to_owned()),
        name: Set(name.to_owned()),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(|e| insert_error(e, "create team"))?;
    Ok(team_from_model(model))
}

fn team_from_model(model: teams::Model) -> Team {
    Team {
        id: model.id,
        domain: model.domain,
        name: model.name,
        created_at: model.created_at,
    }
}

async fn find_team_membership<C: ConnectionTrait>(
    conn: &C,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<Option<TeamMembership>, StoreError> {
    let model = team_memberships::Entity::find_by_id((team_id, user_id))
        .one(conn)
        .await
        .context("find team membership")?;
    model.map(membership_from_model).transpose()
}

async fn count_members<C: ConnectionTrait>(conn: &C, team_id: Uuid) -> Result<i64, StoreError> {
    let count = team_memberships::Entity::find()
        .filter(team_memberships::Column::TeamId.eq(team_id))
        .count(conn)
        .await
        .context("count team members")?;
    Ok(count as i64)
}

async fn insert_team_membership<C: ConnectionTrait>(
    conn: &C,
    team_id: Uuid,
    user_id: Uuid,
    role: Role,
    joined_at: DateTime<Utc>,
) -> Result<TeamMembership, StoreError> {
    let model = team_memberships::ActiveModel {
        team_id: Set(team_id),
        user_id: Set(user_id),
        role: Set(role.as_str().to_owned()),
        joined_at: Set(joined_at),
    }
    .insert(conn)
    .await
    .map_err(|e| insert_error(e, "create team membership"))?;
    membership_from_model(model)
}

fn membership_from_model(
    model: team_memberships::Model,
) -> Result<TeamMembership, StoreError> {
    let role = Role::parse(&model.role).ok_or_else(|| {
        StoreError::Other(anyhow::anyhow!(
            "unknown role '{}' on team membership",
            model.role
        ))
    })?;
    Ok(TeamMembership {
        team_id: model.team_id,
        user_id: model.user_id,
        role,
        joined_at: model.joined_at,
    })
}

// ── Sessions ─────────────────────────────────────────────────────────────────

async fn insert_session<C: ConnectionTrait>(
    conn: &C,
    session: NewSession,
) -> Result<AuthSession, StoreError> {
    let model = auth_sessions::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(session.user_id),
        device_id_hash: Set(session.device_id_hash),
        access_token_hash: Set(session.access_token_hash),
        access_expires_at: Set(session.access_expires_at),
        refresh_token_hash: Set(session.refresh_token_hash),
        refresh_expires_at: Set(session.refresh_expires_at),
        rotated_at: Set(None),
        revoked_at: Set(None),
        last_used_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(|e| insert_error(e, "create auth session"))?;
    Ok(session_from_model(model))
}

async fn find_session_by_refresh_hash<C: ConnectionTrait>(
    conn: &C,
    refresh_token_hash: &[u8],
    expires_after: DateTime<Utc>,
) -> Result<Option<AuthSession>, StoreError> {
    let model = auth_sessions::Entity::find()
        .filter(auth_sessions::Column::RefreshTokenHash.eq(refresh_token_hash.to_vec()))
        .filter(auth_sessions::Column::RevokedAt.is_null())
        .filter(auth_sessions::Column::RefreshExpiresAt.gt(expires_after))
        .one(conn)
        .await
        .context("find session by refresh hash")?;
    Ok(model.map(session_from_model))
}

async fn set_session_rotated<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    rotated_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    auth_sessions::ActiveModel {
        id: Set(id),
        rotated_at: Set(Some(rotated_at)),
        ..Default::default()
    }
    .update(conn)
    .await
    .context("rotate auth session")?;
    Ok(())
}

async fn set_session_used<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    last_used_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    auth_sessions::ActiveModel {
        id: Set(id),
        last_used_at: Set(Some(last_used_at)),
        ..Default::default()
    }
    .update(conn)
    .await
    .context("mark auth session used")?;
    Ok(())
}

async fn set_session_revoked<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    revoked_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    auth_sessions::ActiveModel {
        id: Set(id),
        revoked_at: Set(Some(revoked_at)),
        ..Default::default()
    }
    .update(conn)
    .await
    .context("revoke auth session")?;
    Ok(())
}

fn session_from_model(model: auth_sessions::Model) -> AuthSession {
    AuthSession {
        id: model.id,
        user_id: model.user_id,
        device_id_hash: model.device_id_hash,
        access_token_hash: model.access_token_hash,
        access_expires_at: model.access_expires_at,
        refresh_token_hash: model.refresh_token_hash,
        refresh_expires_at: model.refresh_expires_at,
        rotated_at: model.rotated_at,
        revoked_at: model.revoked_at,
        last_used_at: model.last_used_at,
        created_at: model.created_at,
    }
}
