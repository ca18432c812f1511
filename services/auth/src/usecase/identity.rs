use chrono::{DateTime, Utc};

use crate::domain::store::{StoreError, StoreQueries};
use crate::domain::types::{Role, Team, User};
use crate::error::AuthError;

/// Outcome of resolving a verified email to its user, team and role.
#[derive(Debug)]
pub struct ResolvedIdentity {
    pub user: User,
    pub team: Team,
    pub role: Role,
}

/// Upsert user, team and membership for a verified email, inside the
/// caller's open transaction.
///
/// Concurrent verifications can race on the unique keys (user email, team
/// domain, membership pair). A lost insert surfaces as
/// `StoreError::UniqueViolation` and is resolved by re-reading the row the
/// winner committed.
pub async fn resolve_identity<Q: StoreQueries>(
    queries: &Q,
    email: &str,
    domain: &str,
    team_size_limit: i64,
    now: DateTime<Utc>,
) -> Result<ResolvedIdentity, AuthError> {
    let (user, is_new_user) = resolve_user(queries, email, domain, now).await?;
    let (team, created_team) = resolve_team(queries, domain).await?;
    let role = resolve_membership(
        queries,
        &user,
        &team,
        is_new_user,
        created_team,
        team_size_limit,
        now,
    )
    .await?;

    Ok(ResolvedIdentity { user, team, role })
}

async fn resolve_user<Q: StoreQueries>(
    queries: &Q,
    email: &str,
    domain: &str,
    now: DateTime<Utc>,
) -> Result<(User, bool), AuthError> {
    if let Some(user) = queries.get_user_by_email(email).await? {
        if user.email_verified_at.is_none() {
            let user = queries.update_user_verified_at(user.id, now).await?;
            return Ok((user, false));
        }
        return Ok((user, false));
    }

    match queries.create_user(email, domain, now).await {
        Ok(user) => Ok((user, true)),
        Err(StoreError::UniqueViolation) => {
            let user = queries.get_user_by_email(email).await?.ok_or_else(|| {
                AuthError::Internal(anyhow::anyhow!("user missing after unique violation"))
            })?;
            Ok((user, false))
        }
        Err(err) => Err(err.into()),
    }
}

async fn resolve_team<Q: StoreQueries>(
    queries: &Q,
    domain: &str,
) -> Result<(Team, bool), AuthError> {
    if let Some(team) = queries.get_team_by_domain(domain).await? {
        return Ok((team, false));
    }

    match queries.create_team(domain, domain).await {
        Ok(team) => Ok((team, true)),
        Err(StoreError::UniqueViolation) => {
            let team = queries.get_team_by_domain(domain).await?.ok_or_else(|| {
                AuthError::Internal(anyhow::anyhow!("team missing after unique violation"))
            })?;
            Ok((team, false))
        }
        Err(err) => Err(err.into()),
    }
}

async fn resolve_membership<Q: StoreQueries>(
    queries: &Q,
    user: &User,
    team: &Team,
    is_new_user: bool,
    created_team: bool,
    team_size_limit: i64,
    now: DateTime<Utc>,
) -> Result<Role, AuthError> {
    if let Some(membership) = queries.get_team_membership(team.id, user.id).await? {
        return Ok(membership.role);
    }

    let count = queries.count_team_members(team.id).await?;
    if count >= team_size_limit {
        return Err(AuthError::TeamFull);
    }

    let role = if created_team || (is_new_user && count == 0) {
        Role::Admin
    } else {
        Role::Member
    };

    match queries
        .create_team_membership(team.id, user.id, role, now)
        .await
    {
        Ok(membership) => Ok(membership.role),
        Err(StoreError::UniqueViolation) => {
            let membership = queries
                .get_team_membership(team.id, user.id)
                .await?
                .ok_or_else(|| {
                    AuthError::Internal(anyhow::anyhow!(
                        "membership missing after unique violation"
                    ))
                })?;
            Ok(membership.role)
        }
        Err(err) => Err(err.into()),
    }
}
