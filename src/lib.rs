//! Rust client for the Twitter streaming API.
//!
//! The crate is organized by layer:
//! - `model`: statuses, users, direct messages, lists, and stream notices.
//! - `stream`: line reader, envelope classifier, listener dispatch, the HTTP
//!   client that opens connections, and a reconnecting driver.
//! - `retry`: backoff policy shared by connecting and reconnecting.

/// Data model delivered to listeners.
pub mod model;
/// Backoff and timeout helpers.
pub mod retry;
/// Stream reading, dispatch, and connection management.
pub mod stream;
