// ABOUTME: Shared test setup for integration tests
// ABOUTME: In-memory database, scripted provider resources, and seeded users

#![allow(dead_code, clippy::missing_panics_doc)]

//! Shared test utilities for `apuntador`
//!
//! Builds fully wired [`ServerResources`] against an in-memory SQLite
//! database and a scripted provider, so integration tests exercise the
//! real router without network access.

use std::sync::{Arc, Once};

use apuntador::auth::AuthManager;
use apuntador::config::environment::{
    AiConfig, AuthConfig, CaptionConfig, DatabaseConfig, DatabaseUrl, Environment, LockConfig,
    LogLevel, ServerConfig,
};
use apuntador::database::Database;
use apuntador::llm::LlmProvider;
use apuntador::locks::MemoryLockStore;
use apuntador::models::{Conversation, User};
use apuntador::server::ServerResources;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Server configuration suitable for tests: in-memory database, no global
/// API key so the summary pass stays inert and provider call counts track
/// suggestions only. Summary tests opt in with their own `AiConfig`.
#[must_use]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        log_level: LogLevel::from_str_or_default("warn"),
        environment: Environment::from_str_or_default("development"),
        cors_origins: vec!["*".to_owned()],
        database: DatabaseConfig {
            url: DatabaseUrl::Memory,
            auto_migrate: true,
        },
        auth: AuthConfig {
            jwt_secret_path: std::env::temp_dir().join("apuntador-test-jwt.secret"),
            jwt_expiry_hours: 24,
        },
        ai: AiConfig::default(),
        captions: CaptionConfig::default(),
        locks: LockConfig { redis_url: None },
    }
}

/// Standard in-memory test database
pub async fn create_test_database() -> Arc<Database> {
    init_test_logging();
    Arc::new(
        Database::new("sqlite::memory:")
            .await
            .expect("Failed to create test database"),
    )
}

/// Fully wired server resources over an in-memory database
pub async fn create_test_resources(provider: Arc<dyn LlmProvider>) -> Arc<ServerResources> {
    create_test_resources_with_config(provider, test_config()).await
}

/// Server resources with custom tunables, for throttle and lock tests
pub async fn create_test_resources_with_config(
    provider: Arc<dyn LlmProvider>,
    config: ServerConfig,
) -> Arc<ServerResources> {
    let database = create_test_database().await;
    let auth = AuthManager::new(b"test-jwt-secret-for-integration-tests", 24);
    let locks = Arc::new(MemoryLockStore::new());

    Arc::new(ServerResources::new(
        database, auth, locks, provider, config,
    ))
}

/// Seed a user with a known password and issue a token for them
///
/// The bcrypt cost is the minimum allowed; these hashes only need to
/// round-trip through the login path, not resist cracking.
pub async fn seed_user(resources: &ServerResources) -> (User, String) {
    seed_user_with_email(
        resources,
        &format!("user-{}@example.com", uuid::Uuid::new_v4()),
    )
    .await
}

/// Seed a user with a specific email address
pub async fn seed_user_with_email(resources: &ServerResources, email: &str) -> (User, String) {
    let hash = bcrypt::hash(TEST_PASSWORD, 4).expect("Failed to hash test password");
    let user = resources
        .database
        .create_user(email, &hash, Some("Test User"))
        .await
        .expect("Failed to create test user");
    let token = resources
        .auth
        .generate_token(&user)
        .expect("Failed to issue test token");
    (user, token)
}

/// Password used by every seeded test user
pub const TEST_PASSWORD: &str = "s3cure-enough";

/// Seed an untitled conversation for the user
pub async fn seed_conversation(resources: &ServerResources, user: &User) -> Conversation {
    resources
        .database
        .create_conversation(
            &user.id.to_string(),
            Some("Mock interview"),
            None,
            None,
            None,
        )
        .await
        .expect("Failed to create test conversation")
}
