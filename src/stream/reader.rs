//! Stream controller: reads one line per `next()` call, classifies it, and
//! dispatches the resulting event.

use serde_json::Value;
use tokio::io::AsyncBufRead;
use tracing::{debug, warn};

use crate::stream::error::StreamError;
use crate::stream::event::{build_event, DomainEvent};
use crate::stream::line::LineSource;
use crate::stream::listener::{dispatch, StreamListener};
use crate::stream::proto::classify;

/// Which endpoint family a stream was opened against.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamKind {
    /// Sample and filter streams.
    Status,
    /// Account-scoped stream with direct messages and social events.
    User,
}

/// Lifecycle of a stream. `Closed` is terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    /// Lines are being read.
    Open,
    /// The source was released and further reads fail.
    Closed,
}

/// Reader over one long-lived stream connection.
///
/// Call [`StatusStream::next`] in a loop. Malformed lines are reported to
/// listeners through `on_exception` and the stream stays open; transport
/// failures close the stream and are returned to the caller. Reconnecting
/// means opening a new `StatusStream`.
#[derive(Debug)]
pub struct StatusStream<R> {
    kind: StreamKind,
    state: ConnectionState,
    source: LineSource<R>,
}

impl<R> StatusStream<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Wraps a sample or filter stream body.
    pub fn new(reader: R) -> Self {
        Self::with_kind(StreamKind::Status, reader)
    }

    /// Wraps a user stream body.
    pub fn user(reader: R) -> Self {
        Self::with_kind(StreamKind::User, reader)
    }

    /// Wraps a body whose endpoint family is known only at runtime.
    pub fn with_kind(kind: StreamKind, reader: R) -> Self {
        Self {
            kind,
            state: ConnectionState::Open,
            source: LineSource::new(reader),
        }
    }

    /// Caps the length of one line, terminator included. A longer line closes
    /// the stream with an `InvalidData` transport error.
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.source.set_max_line_length(max_line_length);
        self
    }

    /// Endpoint family this stream reads from.
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns true until the stream is closed.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Reads and dispatches the next message.
    ///
    /// Keep-alive lines return without calling any listener. Every other line
    /// that decodes as UTF-8 reaches `on_message` before it is parsed, so
    /// unrecognized and malformed messages are still visible there. Returns [`StreamError::StreamClosed`] when the connection
    /// fails or ends, and [`StreamError::AlreadyClosed`] on any later call.
    pub async fn next(&mut self, listeners: &[&dyn StreamListener]) -> Result<(), StreamError> {
        if self.state == ConnectionState::Closed {
            return Err(StreamError::AlreadyClosed);
        }

        let line = match self.source.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return Err(self.fail(StreamError::end_of_stream())),
            Err(source) => return Err(self.fail(StreamError::StreamClosed { source })),
        };

        if line.is_empty() {
            return Ok(());
        }

        let parsed = std::str::from_utf8(&line)
            .map_err(StreamError::from)
            .and_then(|text| {
                for listener in listeners {
                    listener.on_message(text);
                }
                self.parse_line(text)
            });

        match parsed {
            Ok(Some(event)) => dispatch(self.kind, &event, listeners),
            Ok(None) => {}
            Err(error) => {
                warn!(event = "stream_line_rejected", error = %error);
                dispatch(self.kind, &DomainEvent::ParseException(error), listeners);
            }
        }
        Ok(())
    }

    /// Single-listener form of [`StatusStream::next`].
    pub async fn next_with(&mut self, listener: &dyn StreamListener) -> Result<(), StreamError> {
        self.next(&[listener]).await
    }

    /// Releases the connection. Safe to call more than once.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        if self.source.close() {
            debug!(event = "stream_closed", kind = ?self.kind);
        }
    }

    fn fail(&mut self, error: StreamError) -> StreamError {
        warn!(event = "stream_transport_failed", kind = ?self.kind, error = %error);
        self.close();
        error
    }

    fn parse_line(&self, text: &str) -> Result<Option<DomainEvent>, StreamError> {
        let json: Value = serde_json::from_str(text)?;

        let Some(kind) = classify(&json) else {
            debug!(event = "unrecognized_envelope", line = text);
            return Ok(None);
        };
        if self.kind == StreamKind::Status && kind.is_user_stream_only() {
            debug!(event = "user_envelope_on_status_stream", envelope = ?kind);
            return Ok(None);
        }

        let event = build_event(kind, &json)?;
        debug!(event = "stream_event", kind = event.name());
        Ok(Some(event))
    }
}
