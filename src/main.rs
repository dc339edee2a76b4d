use session_auth::auth::{AuthServices, SystemClock};
use session_auth::configuration::{get_configuration, DatabaseSettings};
use session_auth::startup::run;
use session_auth::store::{InMemoryUserStore, PostgresUserStore, UserStore};
use session_auth::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

async fn build_store(database: Option<&DatabaseSettings>) -> std::io::Result<Arc<dyn UserStore>> {
    let Some(database) = database else {
        tracing::warn!("No database configured, identities and sessions are kept in memory");
        return Ok(Arc::new(InMemoryUserStore::new()));
    };

    // 데이터베이스 연결 풀 생성
    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
    })?;

    tracing::info!("Database connection pool created successfully");
    Ok(Arc::new(PostgresUserStore::new(pool)))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // 구조화된 로깅 초기화
    init_telemetry("info");

    tracing::info!("Starting application");

    // 설정 로드
    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let store = build_store(configuration.database.as_ref()).await?;

    let auth = AuthServices::new(
        &configuration.jwt,
        &configuration.hashing,
        store,
        Arc::new(SystemClock),
    )
    .map_err(|e| {
        tracing::error!("Failed to build authentication services: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Authentication setup error")
    })?;

    // 서버 주소 설정
    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, auth)?.await
}
