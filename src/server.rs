//! The digest server.
//!
//! A single control loop owns the listening socket and the set of in-flight
//! tasks. Each accepted connection gets its own [`Worker`] on a dedicated OS
//! thread; there is no pool, so a burst of connections means a burst of
//! threads. Running out of threads or descriptors is the only backpressure:
//! the connection is counted as unattended and the server keeps going.
//!
//! Every iteration of the loop:
//! 1. waits up to [`LISTEN_POLL_INTERVAL`] for a connection or a control
//!    request,
//! 2. launches a worker for an accepted connection,
//! 3. applies pending clear/print requests,
//! 4. sweeps the cache,
//! 5. reaps finished tasks without blocking.
//!
//! The loop stops once [`ServerHandle::finish`] or [`ServerHandle::cancel`]
//! has been requested.

use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, dispatcher, error, info, trace, warn, Dispatch};

use crate::cache::Cache;
use crate::config::{ServerConfig, LISTEN_POLL_INTERVAL};
use crate::error::{ServerError, ServerResult};
use crate::stats::{CacheStats, ServerStats};
use crate::worker::{CancelHandle, Worker};

/// Administrative requests delivered to the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Stop accepting, let in-flight requests complete, then return.
    Finish,
    /// Stop accepting, cancel in-flight requests, then return.
    Cancel,
    /// Empty the cache and log statistics.
    ClearCache,
    /// Log the cache content and statistics.
    PrintCache,
    /// Log the server statistics.
    PrintStatistics,
}

/// Cloneable handle to request control operations from any thread or task.
///
/// Each method only queues a request; the control loop acts on it during
/// its next iteration.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    tx: mpsc::UnboundedSender<Control>,
}

impl ServerHandle {
    /// Request a graceful stop.
    pub fn finish(&self) {
        self.send(Control::Finish);
    }

    /// Request an abrupt stop.
    pub fn cancel(&self) {
        self.send(Control::Cancel);
    }

    pub fn clear_cache(&self) {
        self.send(Control::ClearCache);
    }

    pub fn print_cache(&self) {
        self.send(Control::PrintCache);
    }

    pub fn print_statistics(&self) {
        self.send(Control::PrintStatistics);
    }

    fn send(&self, control: Control) {
        // Only fails once the server is gone, when there is nothing to control.
        if self.tx.send(control).is_err() {
            debug!(?control, "[SERVER] Control request ignored, the server has stopped");
        }
    }
}

/// Control requests received but not yet acted upon.
#[derive(Debug, Default)]
struct Pending {
    finish: bool,
    cancel: bool,
    clear: bool,
    print: bool,
    print_statistics: bool,
}

impl Pending {
    fn record(&mut self, control: Control) {
        match control {
            Control::Finish => self.finish = true,
            Control::Cancel => self.cancel = true,
            Control::ClearCache => self.clear = true,
            Control::PrintCache => self.print = true,
            Control::PrintStatistics => self.print_statistics = true,
        }
    }

    fn should_stop(&self) -> bool {
        self.finish || self.cancel
    }
}

/// How the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stopped by [`ServerHandle::finish`]; every request was completed.
    Finished,
    /// Stopped by [`ServerHandle::cancel`]; in-flight requests were cancelled.
    Cancelled,
}

impl RunOutcome {
    /// The process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Finished => 0,
            RunOutcome::Cancelled => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Finished => "Finished",
            RunOutcome::Cancelled => "Cancelled",
        }
    }
}

/// Final report returned when the server stops.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub outcome: RunOutcome,
    pub server: ServerStats,
    pub cache: CacheStats,
}

impl Summary {
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

/// Pause after an accept that failed for lack of resources.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Whether `err` reports a process or system limit rather than a broken
/// listening socket.
fn is_resource_exhaustion(err: &io::Error) -> bool {
    err.kind() == ErrorKind::OutOfMemory
        || matches!(
            err.raw_os_error(),
            Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
        )
}

/// A worker running on its own thread.
struct Task {
    id: u64,
    cancel: CancelHandle,
    handle: thread::JoinHandle<Worker>,
}

enum Event {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Control(Control),
    Tick,
}

/// The digest server.
pub struct Server {
    config: ServerConfig,
    cache: Cache<String, String>,
    dispatch: Dispatch,

    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    pending: Pending,

    sequence: u64,
    tasks: Vec<Task>,
    stats: ServerStats,
}

impl Server {
    /// Create a server whose workers log through the current default
    /// subscriber.
    pub fn new(config: ServerConfig) -> Self {
        let dispatch = dispatcher::get_default(Dispatch::clone);
        Self::with_dispatch(config, dispatch)
    }

    /// Create a server whose workers log through `dispatch`.
    pub fn with_dispatch(config: ServerConfig, dispatch: Dispatch) -> Self {
        let cache = dispatcher::with_default(&dispatch, || Cache::new(config.cache.clone()));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        debug!("[SERVER] The server is ready");
        Self {
            config,
            cache,
            dispatch,
            control_tx,
            control_rx,
            pending: Pending::default(),
            sequence: 0,
            tasks: Vec::new(),
            stats: ServerStats::default(),
        }
    }

    /// A handle for requesting control operations.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            tx: self.control_tx.clone(),
        }
    }

    /// A handle to the shared cache.
    pub fn cache(&self) -> Cache<String, String> {
        self.cache.clone()
    }

    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    /// Log the server counters.
    pub fn print_statistics(&self) {
        info!("[SERVER]---- Server statistics ------------------------------------------------------");
        info!("[SERVER] Total number of executed workers: {}", self.stats.workers);
        if self.stats.errors > 0 {
            info!("[SERVER] Total errors reported by workers: {}", self.stats.errors);
        } else {
            info!("[SERVER] No errors reported by workers");
        }
        info!("[SERVER] Unattended input requests: {}", self.stats.unattended);
        info!("[SERVER]-----------------------------------------------------------------------------");
    }

    /// Bind the configured address and serve until stopped.
    pub async fn run(self) -> ServerResult<Summary> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener).await
    }

    /// Serve connections from `listener` until stopped.
    ///
    /// The listener is closed before waiting for the remaining tasks.
    pub async fn serve(mut self, listener: TcpListener) -> ServerResult<Summary> {
        if let Ok(addr) = listener.local_addr() {
            info!("[SERVER] Listening on {}", addr);
        }

        let result = self.control_loop(&listener).await;
        drop(listener);
        info!(
            "[SERVER] The server will not attend any more requests ({} tasks pending)",
            self.tasks.len()
        );

        if let Err(err) = result {
            error!("[SERVER] {}", err);
            self.wait_for_tasks().await;
            return Err(err);
        }

        let outcome = if self.pending.finish {
            self.wait_for_tasks().await;
            RunOutcome::Finished
        } else {
            self.cancel_tasks().await;
            RunOutcome::Cancelled
        };

        self.cache.print_content();
        self.cache.print_statistics();
        self.print_statistics();

        Ok(Summary {
            outcome,
            server: self.stats,
            cache: self.cache.stats(),
        })
    }

    async fn control_loop(&mut self, listener: &TcpListener) -> ServerResult<()> {
        while !self.pending.should_stop() {
            let event = tokio::select! {
                accepted = listener.accept() => Event::Accepted(accepted),
                Some(control) = self.control_rx.recv() => Event::Control(control),
                _ = tokio::time::sleep(LISTEN_POLL_INTERVAL) => Event::Tick,
            };

            match event {
                Event::Accepted(Ok((stream, peer))) => self.launch(stream, peer),
                Event::Accepted(Err(err)) => self.accept_failed(err).await?,
                Event::Control(control) => self.pending.record(control),
                Event::Tick => {}
            }

            while let Ok(control) = self.control_rx.try_recv() {
                self.pending.record(control);
            }
            self.apply_admin_requests();
            self.cache.update();
            self.reap_tasks();
        }
        Ok(())
    }

    async fn accept_failed(&mut self, err: io::Error) -> ServerResult<()> {
        match err.kind() {
            ErrorKind::Interrupted | ErrorKind::WouldBlock => Ok(()),
            ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset => {
                warn!("[SERVER] Connection lost before it was accepted: {}", err);
                Ok(())
            }
            _ if is_resource_exhaustion(&err) => {
                self.sequence += 1;
                self.unattended(self.sequence, &err);
                // The connection stays queued; give running workers time to
                // release descriptors before retrying.
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                Ok(())
            }
            _ => Err(ServerError::Accept(err)),
        }
    }

    /// Start a worker thread for an accepted connection.
    fn launch(&mut self, stream: TcpStream, peer: SocketAddr) {
        self.sequence += 1;
        let id = self.sequence;

        let stream = match stream.into_std().and_then(|stream| {
            stream.set_nonblocking(false)?;
            Ok(stream)
        }) {
            Ok(stream) => stream,
            Err(err) => {
                self.unattended(id, &err);
                return;
            }
        };

        let mut worker = Worker::new(id, stream, self.cache.clone());
        let cancel = worker.cancel_handle();
        let dispatch = self.dispatch.clone();

        let mut builder = thread::Builder::new().name(format!("worker-{}", id));
        if let Some(size) = self.config.worker_stack_size {
            builder = builder.stack_size(size);
        }

        let spawned = builder.spawn(move || {
            dispatcher::with_default(&dispatch, || worker.exec());
            worker
        });

        match spawned {
            Ok(handle) => {
                self.stats.record_worker();
                self.tasks.push(Task { id, cancel, handle });
                trace!("[SERVER] Worker #{} started for {}", id, peer);
            }
            Err(err) => self.unattended(id, &err),
        }
    }

    fn unattended(&mut self, id: u64, err: &io::Error) {
        self.stats.record_unattended();
        warn!("[SERVER] Unable to fulfill request #{}: {}", id, err);
        warn!(
            "[SERVER] {} unattended requests until now",
            self.stats.unattended
        );
    }

    fn apply_admin_requests(&mut self) {
        if std::mem::take(&mut self.pending.clear) {
            self.cache.clear_content();
            self.cache.print_statistics();
            self.print_statistics();
        }
        if std::mem::take(&mut self.pending.print) {
            self.cache.print_content();
            self.cache.print_statistics();
            self.print_statistics();
        }
        if std::mem::take(&mut self.pending.print_statistics) {
            self.print_statistics();
        }
    }

    /// Remove finished tasks, counting the ones that reported an error.
    fn reap_tasks(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|task| task.handle.is_finished());
        self.tasks = running;

        for task in finished {
            let joined = task.handle.join();
            self.complete(task.id, joined);
        }
    }

    /// Block until every task has completed on its own.
    async fn wait_for_tasks(&mut self) {
        info!("[SERVER] Waiting for pending tasks... ({} tasks)", self.tasks.len());
        self.join_all().await;
    }

    /// Cancel every task, then block until they have all completed.
    async fn cancel_tasks(&mut self) {
        info!("[SERVER] Cancelling pending tasks... ({} tasks)", self.tasks.len());
        for task in &self.tasks {
            task.cancel.cancel();
        }
        self.join_all().await;
    }

    async fn join_all(&mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        let mut left = tasks.len();
        for Task { id, handle, .. } in tasks {
            debug!("[SERVER] Waiting for worker #{} ({} tasks left)", id, left);
            left -= 1;
            match tokio::task::spawn_blocking(move || handle.join()).await {
                Ok(joined) => self.complete(id, joined),
                Err(err) => {
                    self.stats.record_error();
                    error!("[SERVER] Lost track of worker #{}: {}", id, err);
                }
            }
        }
    }

    fn complete(&mut self, id: u64, joined: thread::Result<Worker>) {
        match joined {
            Ok(worker) => {
                if worker.error() {
                    self.stats.record_error();
                }
                trace!(
                    "[SERVER] Finishing worker #{} ({} tasks left)",
                    worker.id(),
                    self.tasks.len()
                );
            }
            Err(_) => {
                self.stats.record_error();
                error!("[SERVER] Worker #{} panicked", id);
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            warn!(
                "[SERVER] Dropped with {} tasks still running; they will finish detached",
                self.tasks.len()
            );
        }
        debug!("[SERVER] The server has finished");
    }
}
