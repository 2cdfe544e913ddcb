//! # tidegate-server
//!
//! Axum HTTP server exposing an OpenAI-compatible chat API over the
//! upstream completion stream.
//!
//! - HTTP endpoints: health, liveness/readiness checks, Prometheus metrics
//! - `/v1/models` and `/v1/chat/completions` (streaming SSE and aggregated)
//! - Upstream access through the [`upstream::CompletionBackend`] trait
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod openai;
pub mod server;
pub mod shutdown;
pub mod upstream;
