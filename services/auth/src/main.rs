use std::net::SocketAddr;
use std::sync::Arc;

use sea_orm::Database;
use tracing::info;

use timesync_auth::config::AuthConfig;
use timesync_auth::infra::db::SeaStore;
use timesync_auth::infra::mailer::{LogMailer, Mailer, SmtpMailer};
use timesync_auth::router::build_router;
use timesync_auth::state::AppState;
use timesync_core::{Config, init_tracing};

#[tokio::main]
async fn main() {
    init_tracing("timesync_auth");

    let config = AuthConfig::from_env();
    let settings = config.settings();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let mailer: Arc<dyn Mailer> = match config.smtp_host.as_deref() {
        Some(host) => Arc::new(
            SmtpMailer::new(
                host,
                config.smtp_port,
                &config.smtp_user,
                &config.smtp_pass,
                &config.smtp_from,
                settings.code_ttl,
            )
            .expect("failed to build SMTP mailer"),
        ),
        None => {
            tracing::warn!("SMTP_HOST not set, verification codes will be logged");
            Arc::new(LogMailer)
        }
    };

    let state = AppState::new(SeaStore::new(db), mailer, settings);
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("auth service listening on {addr}");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}
