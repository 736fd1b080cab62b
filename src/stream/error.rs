use std::io;
use std::str::Utf8Error;
use std::time::Duration;

use thiserror::Error;

use crate::stream::client::StreamClientError;

/// Errors produced while reading and dispatching a stream.
///
/// Content-level variants are reported to listeners through
/// [`StreamListener::on_exception`](crate::stream::listener::StreamListener::on_exception)
/// and never end the stream. Transport-level variants are returned from
/// `next()` and leave the stream closed.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A line was not valid JSON.
    #[error("malformed json line: {0}")]
    Parse(#[from] serde_json::Error),

    /// A line was not valid UTF-8.
    #[error("line is not valid utf-8: {0}")]
    Encoding(#[from] Utf8Error),

    /// A required field was absent or null.
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    /// A required field had the wrong JSON type.
    #[error("field `{field}` is not {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    /// A nested object could not be mapped into its domain type.
    #[error("failed to map {object}: {source}")]
    Mapping {
        object: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The connection failed or reached end of stream.
    #[error("stream closed: {source}")]
    StreamClosed {
        #[source]
        source: io::Error,
    },

    /// `next()` was called after the stream was closed.
    #[error("stream already closed")]
    AlreadyClosed,

    /// No line arrived within the driver's idle timeout.
    #[error("no data received for {0:?}")]
    IdleTimeout(Duration),

    /// The driver could not open a new connection.
    #[error("connect failed: {0}")]
    Client(#[from] StreamClientError),
}

impl StreamError {
    /// Returns true for failures that end the connection.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::StreamClosed { .. }
            | Self::AlreadyClosed
            | Self::IdleTimeout(_)
            | Self::Client(_) => true,
            Self::Parse(_)
            | Self::Encoding(_)
            | Self::MissingField { .. }
            | Self::InvalidField { .. }
            | Self::Mapping { .. } => false,
        }
    }

    pub(crate) fn end_of_stream() -> Self {
        Self::StreamClosed {
            source: io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "the end of the stream has been reached",
            ),
        }
    }
}
