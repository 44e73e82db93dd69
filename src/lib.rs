// ABOUTME: Main library entry point for the apuntador interview copilot backend
// ABOUTME: Caption ingestion, AI suggestion orchestration, and the REST/SSE API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Apuntador.app

#![deny(unsafe_code)]

//! # Apuntador Server
//!
//! Backend for a live interview copilot. A browser extension captures the
//! meeting platform's captions and submits them here; the server merges the
//! overlapping fragments into stable transcript rows, decides when the
//! interviewer has asked something worth answering, and generates suggested
//! replies with an OpenAI-compatible model, streamed to the client over SSE.
//!
//! ## Architecture
//!
//! - **`captions`**: normalization, duplicate/merge decisions, question
//!   heuristics, and the pipeline that drives them
//! - **`completions`**: windowed context assembly, suggested replies, and
//!   the running conversation summary
//! - **`llm`**: provider abstraction with an OpenAI-compatible client
//! - **`locks`**: generation locks, in-process or Redis-backed
//! - **`routes`** / **`server`**: the axum HTTP surface
//! - **`database`**: SQLite persistence for users, conversations, messages
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use apuntador::config::environment::ServerConfig;
//! use apuntador::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("apuntador-server configured for port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// JWT issuing and validation
pub mod auth;

/// Caption normalization, merging, and the ingestion pipeline
pub mod captions;

/// Suggested replies and running summaries
pub mod completions;

/// Environment-driven configuration
pub mod config;

/// Application constants and configuration defaults
pub mod constants;

/// SQLite persistence layer
pub mod database;

/// Unified error handling with standard error codes and HTTP responses
pub mod errors;

/// LLM provider abstraction for AI chat integration
pub mod llm;

/// Suggestion generation locks, in-process or Redis-backed
pub mod locks;

/// Production logging and structured output
pub mod logging;

/// Common data models for conversations, messages, and users
pub mod models;

/// Plain-text transcript report rendering
pub mod reports;

/// `HTTP` routes for the REST and SSE API
pub mod routes;

/// Router assembly and the server loop
pub mod server;
