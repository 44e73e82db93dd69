// ABOUTME: Test helper module exports
// ABOUTME: HTTP request builders and the scripted LLM provider

#![allow(dead_code)]

pub mod axum_test;
pub mod scripted_llm;
