// ABOUTME: Production server binary for the apuntador interview copilot backend
// ABOUTME: Loads config from the environment, wires resources, and serves HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Apuntador.app

//! # Apuntador Server Binary
//!
//! Starts the caption-ingestion and suggestion API: SQLite storage, JWT
//! authentication with a file-backed signing key, an OpenAI-compatible
//! provider, and the generation lock store.

use std::sync::Arc;

use anyhow::Result;
use apuntador::auth::AuthManager;
use apuntador::config::environment::ServerConfig;
use apuntador::database::Database;
use apuntador::llm::OpenAiCompatibleProvider;
use apuntador::locks::create_lock_store;
use apuntador::server::{serve, ServerResources};
use apuntador::{llm::LlmProvider, logging};
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "apuntador-server")]
#[command(about = "Apuntador - live interview caption and suggestion API")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(url) = args.database_url {
        config.database.url = apuntador::config::environment::DatabaseUrl::parse_url(&url);
    }

    logging::init_from_env()?;

    info!("Starting apuntador-server");
    info!(
        port = config.http_port,
        environment = %config.environment,
        database = %config.database.url.to_connection_string(),
        "configuration loaded"
    );

    let database = Arc::new(Database::new(&config.database.url.to_connection_string()).await?);
    info!("Database initialized and migrated");

    let auth = AuthManager::from_secret_file(&config.auth.jwt_secret_path, config.auth.jwt_expiry_hours)?;
    info!("Authentication manager initialized");

    let locks = create_lock_store(&config.locks).await?;
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::from_ai_config(&config.ai)?);
    info!(provider = provider.name(), "LLM provider ready");

    let resources = Arc::new(ServerResources::new(database, auth, locks, provider, config));
    serve(resources).await?;

    Ok(())
}
