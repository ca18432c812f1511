use std::sync::Arc;

use chrono::Duration;

use timesync_auth::error::AuthError;
use timesync_auth::usecase::logout::{LogoutInput, LogoutUseCase};
use timesync_auth::usecase::refresh::{RefreshInput, RefreshTokenUseCase};

use crate::helpers::{MemStore, issue_session, t0, test_settings};

fn usecase(store: &MemStore) -> LogoutUseCase<MemStore> {
    LogoutUseCase {
        store: store.clone(),
    }
}

fn input(refresh_token: &str, device_id: &str) -> LogoutInput {
    LogoutInput {
        refresh_token: refresh_token.to_owned(),
        device_id: device_id.to_owned(),
    }
}

#[tokio::test]
async fn should_revoke_the_session() {
    let store = MemStore::new();
    let issued = issue_session(&store, "user@example.com", "dev-1", t0()).await;

    let t1 = t0() + Duration::minutes(1);
    usecase(&store)
        .execute(input(&issued.refresh_token, "dev-1"), t1)
        .await
        .unwrap();

    let state = store.snapshot();
    assert_eq!(state.sessions[0].revoked_at, Some(t1));

    // The revoked token is accepted nowhere afterwards.
    let refresh = RefreshTokenUseCase {
        store: store.clone(),
        settings: Arc::new(test_settings()),
    };
    let result = refresh
        .execute(
            RefreshInput {
                refresh_token: issued.refresh_token.clone(),
                device_id: "dev-1".to_owned(),
            },
            t1,
        )
        .await;
    assert!(
        matches!(result, Err(AuthError::InvalidRefreshToken)),
        "expected InvalidRefreshToken, got {result:?}"
    );

    // A second logout no longer finds the session.
    let result = usecase(&store)
        .execute(input(&issued.refresh_token, "dev-1"), t1)
        .await;
    assert!(
        matches!(result, Err(AuthError::InvalidRefreshToken)),
        "expected InvalidRefreshToken, got {result:?}"
    );
}

#[tokio::test]
async fn should_reject_mismatched_device_without_revoking() {
    let store = MemStore::new();
    let issued = issue_session(&store, "user@example.com", "dev-1", t0()).await;

    let result = usecase(&store)
        .execute(input(&issued.refresh_token, "other-dev"), t0())
        .await;
    assert!(
        matches!(result, Err(AuthError::DeviceMismatch)),
        "expected DeviceMismatch, got {result:?}"
    );
    assert!(store.snapshot().sessions[0].revoked_at.is_none());
}

#[tokio::test]
async fn should_reject_unknown_token() {
    let store = MemStore::new();
    issue_session(&store, "user@example.com", "dev-1", t0()).await;

    let result = usecase(&store)
        .execute(input("not-a-token", "dev-1"), t0())
        .await;
    assert!(
        matches!(result, Err(AuthError::InvalidRefreshToken)),
        "expected InvalidRefreshToken, got {result:?}"
    );
}

#[tokio::test]
async fn should_reject_empty_inputs() {
    let store = MemStore::new();
    let uc = usecase(&store);

    let result = uc.execute(input("", "dev-1"), t0()).await;
    assert!(matches!(result, Err(AuthError::BadInput(_))));

    let result = uc.execute(input("token", ""), t0()).await;
    assert!(matches!(result, Err(AuthError::BadInput(_))));
}
