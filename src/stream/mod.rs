//! Streaming core and transport.
//!
//! - `line`, `proto`, `event`, `listener`, `reader`: turn newline-delimited
//!   JSON into listener callbacks, one line per `next()` call.
//! - `client`: opens sample, filter, and user stream connections over HTTP.
//! - `driver`: background task that keeps a stream connected.

/// HTTP client for stream endpoints.
pub mod client;
/// Reconnecting read loop.
pub mod driver;
/// Stream error type.
pub mod error;
/// Typed events built from classified envelopes.
pub mod event;
/// Line splitting over a buffered reader.
pub mod line;
/// Listener trait and dispatcher.
pub mod listener;
/// Envelope classification.
pub mod proto;
/// Stream controller.
pub mod reader;

pub use client::{Endpoints, FilterQuery, StreamClient, StreamClientError, StreamClientOptions};
pub use driver::{DriverExit, StreamConnectionStatus, StreamDriver, StreamDriverOptions};
pub use error::StreamError;
pub use event::DomainEvent;
pub use listener::StreamListener;
pub use reader::{ConnectionState, StatusStream, StreamKind};
