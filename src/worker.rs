//! Per-connection request handling.
//!
//! A [`Worker`] owns one accepted connection and runs on its own thread.
//! It moves through these states:
//!
//! ```text
//! Receiving -> Parsing -> CacheHit  -> Responding -> Done
//!                      -> Computing -> Responding -> Done
//! ```
//!
//! `Error` is reachable from any step and `Cancelled` only from
//! `Computing`. Whatever the outcome, the socket is closed when
//! [`Worker::exec`] returns.

use bytes::BytesMut;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::cache::Cache;
use crate::command::Request;
use crate::config::{DELAY_POLL_INTERVAL, MAX_REQUEST_BYTES, RECEIVE_POLL_INTERVAL};
use crate::digest::digest;
use crate::error::WorkerError;
use crate::utils::{describe_bytes, request_line};

/// Size of each read from the socket.
const READ_CHUNK: usize = 256;

/// Where a worker is in handling its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Receiving,
    Parsing,
    CacheHit,
    Computing,
    Responding,
    Done,
    Error,
    Cancelled,
}

/// Cloneable handle that asks a worker to stop simulating its computation.
///
/// Cancelling is idempotent and only has an effect while the worker is in
/// its delay loop.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Handles the single request arriving on one connection.
#[derive(Debug)]
pub struct Worker {
    id: u64,
    peer: Option<SocketAddr>,
    stream: Option<TcpStream>,
    cache: Cache<String, String>,
    cancel: CancelHandle,
    state: WorkerState,

    received_at: Option<Instant>,
    text: String,
    digest: String,
    error: bool,
    error_code: Option<i32>,
}

impl Worker {
    /// Create a worker for an accepted connection.
    pub fn new(id: u64, stream: TcpStream, cache: Cache<String, String>) -> Self {
        let peer = stream.peer_addr().ok();
        trace!("[WORKER] Worker #{} is ready", id);
        Self {
            id,
            peer,
            stream: Some(stream),
            cache,
            cancel: CancelHandle::default(),
            state: WorkerState::Receiving,
            received_at: None,
            text: String::new(),
            digest: String::new(),
            error: false,
            error_code: None,
        }
    }

    /// Receive the request, answer it and close the connection.
    ///
    /// Errors are recorded on the worker rather than returned; read them
    /// back with [`Worker::error`] once the worker's thread has finished.
    pub fn exec(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };

        if let Err(err) = self.process(&mut stream) {
            self.fail(err);
        }

        // Dropping the stream closes the connection on every path.
        drop(stream);
        trace!("[WORKER] Worker #{} has finished", self.id);
    }

    /// Request cancellation of this worker.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that can cancel this worker from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether handling the request failed or was cancelled.
    pub fn error(&self) -> bool {
        self.error
    }

    /// The OS error number behind the failure, when there was one.
    pub fn error_code(&self) -> Option<i32> {
        self.error_code
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// The digest sent back, empty if none was produced.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn process(&mut self, stream: &mut TcpStream) -> Result<(), WorkerError> {
        self.state = WorkerState::Receiving;
        let buf = self.receive(stream)?;
        let line = request_line(&buf).unwrap_or(&buf[..]);
        debug!(
            "[WORKER] ID#{} - Message received => '{}'",
            self.id,
            String::from_utf8_lossy(line)
        );

        self.state = WorkerState::Parsing;
        let request = Request::parse(line).map_err(|err| {
            warn!(
                "[WORKER] ID#{} - {} - char buffer: {} ({} bytes received)",
                self.id,
                err,
                describe_bytes(line),
                line.len()
            );
            err
        })?;
        self.text = request.text.clone();

        match self.cache.get(&self.text) {
            Some(cached) => {
                self.state = WorkerState::CacheHit;
                self.digest = cached;
            }
            None => {
                self.state = WorkerState::Computing;
                let delay = request.computation_delay()?;
                let started = self.received_at.unwrap_or_else(Instant::now);
                self.simulate_work(started, delay)?;

                self.digest = digest(&self.text);
                self.cache.set(self.text.clone(), self.digest.clone());
                trace!(
                    "[WORKER] ID#{} - Message processed in {} ms: '{}' =digest=> '{}'",
                    self.id,
                    delay.as_millis(),
                    self.text,
                    self.digest
                );
            }
        }

        self.state = WorkerState::Responding;
        stream
            .write_all(self.digest.as_bytes())
            .and_then(|()| stream.flush())
            .map_err(WorkerError::Send)?;
        trace!(
            "[WORKER] ID#{} - Response sent: '{}' =digest=> '{}'",
            self.id,
            self.text,
            self.digest
        );

        self.state = WorkerState::Done;
        Ok(())
    }

    /// Read until a newline arrives, the peer closes, or a poll interval
    /// passes without data.
    fn receive(&mut self, stream: &mut TcpStream) -> Result<BytesMut, WorkerError> {
        stream
            .set_read_timeout(Some(RECEIVE_POLL_INTERVAL))
            .map_err(WorkerError::Receive)?;

        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    self.received_at.get_or_insert_with(Instant::now);
                    buf.extend_from_slice(&chunk[..n]);
                    if request_line(&buf).is_some() {
                        break;
                    }
                    if buf.len() > MAX_REQUEST_BYTES {
                        return Err(WorkerError::RequestTooLong {
                            limit: MAX_REQUEST_BYTES,
                        });
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    break
                }
                Err(err) => return Err(WorkerError::Receive(err)),
            }
        }

        if request_line(&buf).is_some_and(|line| line.len() > MAX_REQUEST_BYTES) {
            return Err(WorkerError::RequestTooLong {
                limit: MAX_REQUEST_BYTES,
            });
        }
        Ok(buf)
    }

    /// Sleep in small steps until `delay` has passed since `started`,
    /// checking for cancellation at every step.
    fn simulate_work(&self, started: Instant, delay: Duration) -> Result<(), WorkerError> {
        let deadline = started + delay;
        loop {
            if self.cancel.is_cancelled() {
                return Err(WorkerError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(DELAY_POLL_INTERVAL.min(deadline - now));
        }
    }

    fn fail(&mut self, err: WorkerError) {
        self.error = true;
        self.error_code = err.os_code();
        match err {
            WorkerError::Cancelled => {
                self.state = WorkerState::Cancelled;
                info!("[WORKER] ID#{} - Cancelled while computing '{}'", self.id, self.text);
            }
            WorkerError::Malformed { .. } => {
                // Already logged with the raw bytes.
                self.state = WorkerState::Error;
            }
            err => {
                self.state = WorkerState::Error;
                warn!(
                    "[WORKER] ID#{} - {} (peer: {:?}, code: {:?})",
                    self.id, err, self.peer, self.error_code
                );
            }
        }
    }
}
