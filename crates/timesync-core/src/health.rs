/// Handler for `GET /health` — liveness check.
pub async fn health() -> &'static str {
    "ok"
}
