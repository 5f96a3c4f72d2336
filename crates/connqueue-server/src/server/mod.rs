//! Server-side components of `connqueue-server`.
//!
//! ## Submodules
//!
//! - [`config`] - CLI / environment configuration and validation.
//! - [`http`] - The `GET`-only static-file request handler.
//! - [`mime`] - File extension to `Content-Type` mapping.
//! - [`net`] - TCP acceptor and the shutdown waker used by the signal handler.
//! - [`telemetry`] - `tracing-subscriber` initialization.
//!
//! These are wired together in the binary's `main.rs`.

pub mod config;
pub mod http;
pub mod mime;
pub mod net;
pub mod telemetry;
