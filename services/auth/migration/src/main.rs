use sea_orm_migration::prelude::*;

mod m20260601_000001_create_users;
mod m20260601_000002_create_teams;
mod m20260601_000003_create_team_memberships;
mod m20260601_000004_create_email_verification_codes;
mod m20260601_000005_create_auth_sessions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260601_000001_create_users::Migration),
            Box::new(m20260601_000002_create_teams::Migration),
            Box::new(m20260601_000003_create_team_memberships::Migration),
            Box::new(m20260601_000004_create_email_verification_codes::Migration),
            Box::new(m20260601_000005_create_auth_sessions::Migration),
        ]
    }
}

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
