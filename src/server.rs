// ABOUTME: HTTP server assembly: shared resources, router construction, serving
// ABOUTME: Builds the resource container once and hands Arc references to routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Apuntador.app

//! # Server Assembly
//!
//! [`ServerResources`] is the dependency container built once at startup;
//! route handlers receive it as shared state and borrow what they need.
//! [`build_router`] merges the per-resource routers and applies the
//! middleware stack; [`serve`] binds the listener and runs until a
//! shutdown signal arrives.

use std::sync::Arc;

use axum::Router;
use http::{header::HeaderName, HeaderValue, Method};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::AuthManager;
use crate::captions::CaptionPipeline;
use crate::completions::{CompletionService, SummaryService};
use crate::config::environment::ServerConfig;
use crate::constants::limits;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::llm::LlmProvider;
use crate::locks::LockStore;
use crate::routes::{AuthRoutes, CaptionRoutes, ConversationRoutes, HealthRoutes, MessageRoutes};

/// Shared resources for all route handlers
///
/// Built once at startup; handlers receive it behind an `Arc` and never
/// construct their own connections or services.
pub struct ServerResources {
    /// Database handle
    pub database: Arc<Database>,
    /// Token issuing and validation
    pub auth: Arc<AuthManager>,
    /// Suggestion generation locks
    pub locks: Arc<dyn LockStore>,
    /// One-shot completion service
    pub completions: CompletionService,
    /// Running-summary maintenance
    pub summaries: SummaryService,
    /// Caption ingestion pipeline
    pub pipeline: CaptionPipeline,
    /// Effective server configuration
    pub config: Arc<ServerConfig>,
}

impl ServerResources {
    /// Wire the resource container from its parts
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        auth: AuthManager,
        locks: Arc<dyn LockStore>,
        provider: Arc<dyn LlmProvider>,
        config: ServerConfig,
    ) -> Self {
        let completions =
            CompletionService::new(database.clone(), provider.clone(), config.ai.clone());
        let summaries = SummaryService::new(database.clone(), provider, config.ai.clone());
        let pipeline = CaptionPipeline::new(
            database.clone(),
            locks.clone(),
            completions.clone(),
            summaries.clone(),
            config.captions.clone(),
        );

        Self {
            database,
            auth: Arc::new(auth),
            locks,
            completions,
            summaries,
            pipeline,
            config: Arc::new(config),
        }
    }
}

/// Assemble the full application router with its middleware stack
pub fn build_router(resources: &Arc<ServerResources>) -> Router {
    let api = Router::new()
        .merge(HealthRoutes::routes())
        .merge(AuthRoutes::routes(resources.clone()))
        .merge(ConversationRoutes::routes(resources.clone()))
        .merge(MessageRoutes::routes(resources.clone()))
        .merge(CaptionRoutes::routes(resources.clone()));

    api.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            // The body limit must wrap CORS: CorsLayer needs the inner
            // response body to implement Default, which the limit layer's
            // body does not
            .layer(RequestBodyLimitLayer::new(limits::MAX_REQUEST_BODY_BYTES))
            .layer(cors_layer(&resources.config.cors_origins)),
    )
}

/// Configure CORS from the comma-separated origin list
///
/// An empty list or a literal `*` allows any origin; otherwise only the
/// listed origins may call the API from a browser.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        if parsed.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(parsed)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("origin"),
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("x-request-id"),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
}

/// Bind the listener and serve until a shutdown signal arrives
///
/// # Errors
///
/// Returns an error when the port cannot be bound or the server loop
/// fails.
pub async fn serve(resources: Arc<ServerResources>) -> AppResult<()> {
    let address = resources.config.bind_address();
    let router = build_router(&resources);

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| AppError::config(format!("Failed to bind {address}: {e}")))?;
    info!(%address, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("HTTP server failed: {e}")))
}

/// Resolve when the process receives ctrl-c or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install ctrl-c handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received ctrl-c, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
