use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::database::connection::DatabaseManager;
use crate::services::supervisor::{BotState, BotStatus};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub database: DatabaseHealth,
    pub bot: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub backend: String,
    pub status: String,
    pub response_time_ms: u64,
}

#[derive(Clone)]
pub struct HealthState {
    pub db: DatabaseManager,
    pub bot_status: BotStatus,
    pub start_time: DateTime<Utc>,
}

pub struct HealthService {
    pub router: Router,
}

impl HealthService {
    pub fn new(db: DatabaseManager, bot_status: BotStatus) -> Self {
        let state = HealthState {
            db,
            bot_status,
            start_time: Utc::now(),
        };

        let router = Router::new()
            .route("/health", get(health_check))
            .route("/health/ready", get(readiness_check))
            .route("/health/live", get(liveness_check))
            .with_state(state);

        Self { router }
    }
}

/// Always answers 200 while the process is up; degraded parts are reported
/// in the body.
async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let start = std::time::Instant::now();
    let db_ok = state.db.store.ping().await.is_ok();
    let response_time_ms = start.elapsed().as_millis() as u64;

    let bot_state = state.bot_status.get();
    let uptime = Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds()
        .max(0) as u64;

    let status = if db_ok && bot_state != BotState::Degraded {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: DatabaseHealth {
            backend: state.db.backend().as_str().to_string(),
            status: if db_ok { "healthy" } else { "unhealthy" }.to_string(),
            response_time_ms,
        },
        bot: bot_state.as_str().to_string(),
        uptime_seconds: uptime,
    })
}

async fn readiness_check(State(state): State<HealthState>) -> Result<Json<&'static str>, StatusCode> {
    match state.db.store.ping().await {
        Ok(_) => Ok(Json("ready")),
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

async fn liveness_check() -> Json<&'static str> {
    Json("alive")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use tempfile::TempDir;

    use crate::config::StorageConfig;

    async fn create_test_health_service() -> (HealthService, BotStatus, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let storage = StorageConfig::Sqlite {
            url: format!("sqlite://{}", db_path.display()),
        };

        let db = DatabaseManager::connect(&storage)
            .await
            .expect("Failed to create test database");
        db.run_migrations().await.expect("Failed to run migrations");

        let bot_status = BotStatus::new();
        (HealthService::new(db, bot_status.clone()), bot_status, temp_dir)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (health_service, bot_status, _temp_dir) = create_test_health_service().await;
        bot_status.set(BotState::Connected);
        let server = TestServer::new(health_service.router).expect("Failed to create test server");

        let response = server.get("/health").await;

        assert_eq!(response.status_code(), StatusCode::OK);

        let health_response: HealthResponse = response.json();
        assert_eq!(health_response.status, "healthy");
        assert_eq!(health_response.database.status, "healthy");
        assert_eq!(health_response.database.backend, "sqlite");
        assert_eq!(health_response.bot, "connected");
        assert_eq!(health_response.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_health_stays_ok_when_bot_degraded() {
        let (health_service, bot_status, _temp_dir) = create_test_health_service().await;
        bot_status.set(BotState::Degraded);
        let server = TestServer::new(health_service.router).expect("Failed to create test server");

        let response = server.get("/health").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let health_response: HealthResponse = response.json();
        assert_eq!(health_response.status, "degraded");
        assert_eq!(health_response.bot, "degraded");
    }

    #[tokio::test]
    async fn test_readiness_endpoint() {
        let (health_service, _bot_status, _temp_dir) = create_test_health_service().await;
        let server = TestServer::new(health_service.router).expect("Failed to create test server");

        let response = server.get("/health/ready").await;

        assert_eq!(response.status_code(), StatusCode::OK);

        let ready_response: String = response.json();
        assert_eq!(ready_response, "ready");
    }

    #[tokio::test]
    async fn test_liveness_endpoint() {
        let (health_service, _bot_status, _temp_dir) = create_test_health_service().await;
        let server = TestServer::new(health_service.router).expect("Failed to create test server");

        let response = server.get("/health/live").await;

        assert_eq!(response.status_code(), StatusCode::OK);

        let alive_response: String = response.json();
        assert_eq!(alive_response, "alive");
    }
}
