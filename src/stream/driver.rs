//! Background task that keeps a stream connected.
//!
//! The driver owns the read loop: it opens a stream through a caller-supplied
//! connect function, calls [`StatusStream::next`] until the connection drops,
//! then backs off and reconnects. Fatal errors reach listeners through
//! `on_exception` before each reconnect. The current connection status is
//! published through a watch channel, so a slow reader only sees the latest
//! transition.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncBufRead;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use crate::retry::{with_timeout, RetryPolicy};
use crate::stream::client::StreamClientError;
use crate::stream::error::StreamError;
use crate::stream::listener::StreamListener;
use crate::stream::reader::StatusStream;

/// Connection status updates emitted by the driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamConnectionStatus {
    /// A stream is open and being read.
    Connected,
    /// Between connections, or before the first one.
    Disconnected,
}

/// Why the driver task stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DriverExit {
    /// [`StreamDriver::shutdown`] was called or the handle was dropped.
    Shutdown,
    /// Connecting failed with a non-retryable error or the retry budget ran
    /// out.
    GaveUp,
}

/// Options for [`StreamDriver::spawn`].
#[derive(Clone, Debug)]
pub struct StreamDriverOptions {
    /// Backoff after dropped connections and network failures.
    /// `max_attempts` bounds consecutive failed connects, not the lifetime
    /// number of reconnects.
    pub retry_policy: RetryPolicy,
    /// Backoff after the server answers a connect with an HTTP error status,
    /// including 420 and 5xx.
    pub http_error_policy: RetryPolicy,
    /// Reconnect when no line, keep-alives included, arrives for this long.
    pub idle_timeout: Option<Duration>,
}

impl Default for StreamDriverOptions {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::reconnect(),
            http_error_policy: RetryPolicy::http_error(),
            idle_timeout: Some(Duration::from_secs(90)),
        }
    }
}

/// Handle to a running driver task.
///
/// Dropping the handle stops the task at its next await point.
pub struct StreamDriver {
    shutdown_tx: Option<oneshot::Sender<()>>,
    status_rx: watch::Receiver<StreamConnectionStatus>,
    task: JoinHandle<DriverExit>,
}

impl StreamDriver {
    /// Spawns the driver on the current tokio runtime.
    ///
    /// `connect` is called for the first connection and for every reconnect.
    pub fn spawn<F, Fut, R>(
        connect: F,
        listeners: Vec<Arc<dyn StreamListener>>,
        options: StreamDriverOptions,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<StatusStream<R>, StreamClientError>> + Send + 'static,
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (status_tx, status_rx) = watch::channel(StreamConnectionStatus::Disconnected);
        let task = tokio::spawn(driver_worker(
            connect,
            listeners,
            options,
            status_tx,
            shutdown_rx,
        ));

        Self {
            shutdown_tx: Some(shutdown_tx),
            status_rx,
            task,
        }
    }

    /// Waits for the connection status to change and returns the latest
    /// value. Changes that were not observed in between are skipped. Returns
    /// `None` once the task has stopped and the last change was seen.
    pub async fn recv_status(&mut self) -> Option<StreamConnectionStatus> {
        self.status_rx.changed().await.ok()?;
        Some(*self.status_rx.borrow_and_update())
    }

    /// Latest connection status.
    pub fn status(&self) -> StreamConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Signals the task to stop and waits for it.
    ///
    /// A listener panic surfaces here as a [`JoinError`].
    pub async fn shutdown(mut self) -> Result<DriverExit, JoinError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        (&mut self.task).await
    }

    /// Waits for the task to stop on its own.
    pub async fn join(mut self) -> Result<DriverExit, JoinError> {
        (&mut self.task).await
    }
}

enum SessionOutcome {
    Shutdown,
    Reconnect(StreamError),
}

async fn driver_worker<F, Fut, R>(
    mut connect: F,
    listeners: Vec<Arc<dyn StreamListener>>,
    options: StreamDriverOptions,
    status_tx: watch::Sender<StreamConnectionStatus>,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> DriverExit
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<StatusStream<R>, StreamClientError>>,
    R: AsyncBufRead + Unpin,
{
    let listeners: Vec<&dyn StreamListener> = listeners.iter().map(|l| l.as_ref()).collect();
    let mut failures = 0usize;

    loop {
        let connected = tokio::select! {
            _ = &mut shutdown_rx => return DriverExit::Shutdown,
            result = connect() => result,
        };

        let mut stream = match connected {
            Ok(stream) => {
                failures = 0;
                stream
            }
            Err(error) => {
                failures += 1;
                let retryable = error.is_retryable();
                let policy = match error {
                    StreamClientError::HttpStatus { .. } => &options.http_error_policy,
                    _ => &options.retry_policy,
                };
                let max_attempts = policy.max_attempts.max(1);
                let error = StreamError::Client(error);
                warn!(
                    event = "stream_connect_failed",
                    failures,
                    max_attempts,
                    retryable,
                    error = %error
                );
                report(&listeners, &error);
                if !retryable || failures >= max_attempts {
                    return DriverExit::GaveUp;
                }
                if sleep_or_shutdown(policy.delay_for_attempt(failures), &mut shutdown_rx).await {
                    return DriverExit::Shutdown;
                }
                continue;
            }
        };

        info!(event = "stream_connected", kind = ?stream.kind());
        status_tx.send_replace(StreamConnectionStatus::Connected);
        let outcome =
            run_session(&mut stream, &listeners, options.idle_timeout, &mut shutdown_rx).await;
        stream.close();
        status_tx.send_replace(StreamConnectionStatus::Disconnected);

        match outcome {
            SessionOutcome::Shutdown => return DriverExit::Shutdown,
            SessionOutcome::Reconnect(error) => {
                warn!(event = "stream_disconnected", error = %error);
                report(&listeners, &error);
            }
        }

        if sleep_or_shutdown(options.retry_policy.delay_for_attempt(1), &mut shutdown_rx).await {
            return DriverExit::Shutdown;
        }
    }
}

async fn run_session<R>(
    stream: &mut StatusStream<R>,
    listeners: &[&dyn StreamListener],
    idle_timeout: Option<Duration>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> SessionOutcome
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let step = tokio::select! {
            _ = &mut *shutdown_rx => return SessionOutcome::Shutdown,
            step = next_within(stream, listeners, idle_timeout) => step,
        };
        if let Err(error) = step {
            return SessionOutcome::Reconnect(error);
        }
    }
}

async fn next_within<R>(
    stream: &mut StatusStream<R>,
    listeners: &[&dyn StreamListener],
    idle_timeout: Option<Duration>,
) -> Result<(), StreamError>
where
    R: AsyncBufRead + Unpin,
{
    match idle_timeout {
        Some(limit) => with_timeout(limit, stream.next(listeners))
            .await
            .unwrap_or_else(|_| Err(StreamError::IdleTimeout(limit))),
        None => stream.next(listeners).await,
    }
}

/// Returns true when shutdown was requested during the delay.
async fn sleep_or_shutdown(delay: Duration, shutdown_rx: &mut oneshot::Receiver<()>) -> bool {
    tokio::select! {
        _ = shutdown_rx => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

fn report(listeners: &[&dyn StreamListener], error: &StreamError) {
    for listener in listeners {
        listener.on_exception(error);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use reqwest::StatusCode;
    use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    use super::{DriverExit, StreamConnectionStatus, StreamDriver, StreamDriverOptions};
    use crate::model::Status;
    use crate::retry::RetryPolicy;
    use crate::stream::client::StreamClientError;
    use crate::stream::error::StreamError;
    use crate::stream::listener::StreamListener;
    use crate::stream::reader::StatusStream;

    struct Forward {
        tx: mpsc::UnboundedSender<String>,
    }

    impl StreamListener for Forward {
        fn on_status(&self, status: &Status) {
            let _ = self.tx.send(format!("status:{}", status.id));
        }

        fn on_exception(&self, error: &StreamError) {
            let label = match error {
                StreamError::StreamClosed { .. } => "closed",
                StreamError::IdleTimeout(_) => "idle",
                StreamError::Client(_) => "client",
                _ => "other",
            };
            let _ = self.tx.send(label.to_string());
        }
    }

    fn forward() -> (Arc<dyn StreamListener>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Forward { tx }), rx)
    }

    fn options(max_attempts: usize, idle_timeout: Option<Duration>) -> StreamDriverOptions {
        let quick = RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            jitter: Duration::ZERO,
        };
        StreamDriverOptions {
            retry_policy: quick.clone(),
            http_error_policy: quick,
            idle_timeout,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut seen = Vec::new();
        while let Ok(item) = rx.try_recv() {
            seen.push(item);
        }
        seen
    }

    #[tokio::test]
    async fn reconnects_after_end_of_stream_until_connect_fails() {
        let (listener, mut rx) = forward();
        let attempts = Arc::new(AtomicUsize::new(0));
        let connect = {
            let attempts = Arc::clone(&attempts);
            move || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt <= 2 {
                        let body: &'static [u8] = if attempt == 1 {
                            &b"{\"id\":1,\"text\":\"a\"}\n"[..]
                        } else {
                            &b"{\"id\":2,\"text\":\"b\"}\n"[..]
                        };
                        Ok(StatusStream::new(body))
                    } else {
                        Err(StreamClientError::InvalidFilter("stop".to_string()))
                    }
                }
            }
        };

        let driver = StreamDriver::spawn(connect, vec![listener], options(5, None));
        let exit = driver.join().await.expect("driver task");

        assert_eq!(exit, DriverExit::GaveUp);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(
            drain(&mut rx),
            vec!["status:1", "closed", "status:2", "closed", "client"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn http_errors_back_off_longer_than_dropped_connections() {
        let (listener, mut rx) = forward();
        let connects = Arc::new(std::sync::Mutex::new(Vec::new()));
        let connect = {
            let connects = Arc::clone(&connects);
            move || {
                let attempt = connects
                    .lock()
                    .map(|mut seen| {
                        seen.push(Instant::now());
                        seen.len()
                    })
                    .unwrap_or_default();
                async move {
                    match attempt {
                        1 | 2 => Err(StreamClientError::HttpStatus {
                            status: StatusCode::from_u16(420).expect("status"),
                            body: "Enhance Your Calm".to_string(),
                        }),
                        3 => Ok(StatusStream::new(&b"{\"id\":3,\"text\":\"calm\"}\n"[..])),
                        _ => Err(StreamClientError::InvalidFilter("stop".to_string())),
                    }
                }
            }
        };

        let driver = StreamDriver::spawn(connect, vec![listener], StreamDriverOptions::default());
        let exit = driver.join().await.expect("driver task");
        assert_eq!(exit, DriverExit::GaveUp);

        let connects = connects.lock().map(|seen| seen.clone()).unwrap_or_default();
        assert_eq!(connects.len(), 4);
        assert!(connects[1] - connects[0] >= Duration::from_secs(10));
        assert!(connects[2] - connects[1] >= Duration::from_secs(20));
        assert!(connects[3] - connects[2] < Duration::from_secs(1));
        assert_eq!(
            drain(&mut rx),
            vec!["client", "client", "status:3", "closed", "client"]
        );
    }

    #[tokio::test]
    async fn status_watch_keeps_only_the_latest_transition() {
        let (listener, mut rx) = forward();
        let attempts = Arc::new(AtomicUsize::new(0));
        let connect = {
            let attempts = Arc::clone(&attempts);
            move || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt <= 3 {
                        Ok(StatusStream::new(&b"\n"[..]))
                    } else {
                        Err(StreamClientError::InvalidFilter("stop".to_string()))
                    }
                }
            }
        };

        let mut driver = StreamDriver::spawn(connect, vec![listener], options(3, None));
        while rx.recv().await.as_deref() != Some("client") {}

        let mut observed = Vec::new();
        while let Some(status) = driver.recv_status().await {
            observed.push(status);
        }
        assert_eq!(observed, vec![StreamConnectionStatus::Disconnected]);
        assert_eq!(driver.status(), StreamConnectionStatus::Disconnected);

        let exit = driver.join().await.expect("driver task");
        assert_eq!(exit, DriverExit::GaveUp);
    }

    #[tokio::test]
    async fn gives_up_after_consecutive_failure_budget() {
        let (listener, mut rx) = forward();
        let attempts = Arc::new(AtomicUsize::new(0));
        let connect = {
            let attempts = Arc::clone(&attempts);
            move || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<StatusStream<&'static [u8]>, _>(StreamClientError::HttpStatus {
                        status: StatusCode::SERVICE_UNAVAILABLE,
                        body: String::new(),
                    })
                }
            }
        };

        let driver = StreamDriver::spawn(connect, vec![listener], options(3, None));
        let exit = driver.join().await.expect("driver task");

        assert_eq!(exit, DriverExit::GaveUp);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(drain(&mut rx), vec!["client", "client", "client"]);
    }

    #[tokio::test]
    async fn delivers_live_lines_and_stops_on_shutdown() {
        let (listener, mut rx) = forward();
        let (server_tx, mut server_rx) = mpsc::unbounded_channel::<DuplexStream>();
        let connect = move || {
            let (client, server) = tokio::io::duplex(1024);
            let _ = server_tx.send(server);
            async move { Ok(StatusStream::new(BufReader::new(client))) }
        };

        let mut driver = StreamDriver::spawn(connect, vec![listener], options(3, None));
        assert_eq!(
            driver.recv_status().await,
            Some(StreamConnectionStatus::Connected)
        );

        let mut server = server_rx.recv().await.expect("server half");
        server
            .write_all(b"\r\n{\"id\":7,\"text\":\"live\"}\r\n")
            .await
            .expect("write");
        assert_eq!(rx.recv().await.as_deref(), Some("status:7"));

        let exit = driver.shutdown().await.expect("driver task");
        assert_eq!(exit, DriverExit::Shutdown);
        drop(server);
    }

    #[tokio::test]
    async fn idle_connection_is_replaced() {
        let (listener, mut rx) = forward();
        let (server_tx, mut server_rx) = mpsc::unbounded_channel::<DuplexStream>();
        let connect = move || {
            let (client, server) = tokio::io::duplex(64);
            let _ = server_tx.send(server);
            async move { Ok(StatusStream::user(BufReader::new(client))) }
        };

        let driver = StreamDriver::spawn(
            connect,
            vec![listener],
            options(3, Some(Duration::from_millis(20))),
        );

        let _first = server_rx.recv().await.expect("first connection");
        assert_eq!(rx.recv().await.as_deref(), Some("idle"));
        let _second = server_rx.recv().await.expect("reconnected");

        let exit = driver.shutdown().await.expect("driver task");
        assert_eq!(exit, DriverExit::Shutdown);
    }
}
