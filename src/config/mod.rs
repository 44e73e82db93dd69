// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Environment-driven config with typed sections for db, auth, AI, and captions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Apuntador.app

//! Configuration module
//!
//! All runtime settings come from environment variables (`.env` supported),
//! parsed once at startup into a typed [`environment::ServerConfig`].

/// Environment and server configuration
pub mod environment;

// Re-export main configuration types from environment
pub use environment::{
    AiConfig, AuthConfig, CaptionConfig, DatabaseConfig, DatabaseUrl, Environment, LockConfig,
    LogLevel, ServerConfig,
};
