use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: &'static str,
    /// Whether a match store is currently installed.
    pub storage: bool,
}

impl HealthResponse {
    /// Storage reachable.
    pub fn ok() -> Self {
        Self {
            status: "ok",
            storage: true,
        }
    }

    /// No storage installed; commands fail until the supervisor reconnects.
    pub fn degraded() -> Self {
        Self {
            status: "degraded",
            storage: false,
        }
    }
}
