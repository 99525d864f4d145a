use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::io::{AsyncRead, AsyncWrite};
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::debug;
use yamux::{Config, Connection, ConnectionError, Control};

pub use yamux::{Mode, Stream as MuxStream};

#[derive(thiserror::Error, Debug)]
pub enum MuxError {
    #[error("session shut down")]
    Shutdown,
    #[error("yamux: {0}")]
    Yamux(#[from] ConnectionError),
}

/// A multiplexer session running over one byte stream (spec §4.3):
/// symmetric client/server roles, `open`/`accept`, independent per-stream
/// close, and a session-wide close signal. Flow control and strict
/// in-stream ordering are inherited from `yamux::Connection`, which is
/// driven to completion on a background task for the lifetime of the
/// session.
///
/// `Mode::Client` / `Mode::Server` is a purely logical orientation — either
/// side may call `open` or `accept` — matching the Go original's
/// `yamux.Client`/`yamux.Server`, which is really just "who speaks first".
pub struct Session {
    control: Control,
    inbound: Mutex<mpsc::Receiver<MuxStream>>,
    closed: Arc<Notify>,
    is_closed: Arc<AtomicBool>,
}

impl Session {
    pub fn new<T>(io: T, mode: Mode) -> Self
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let connection = Connection::new(io, Config::default(), mode);
        let control = connection.control();
        let (tx, rx) = mpsc::channel(32);
        let closed = Arc::new(Notify::new());
        let is_closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(Self::drive(connection, tx, closed.clone(), is_closed.clone()));

        Self {
            control,
            inbound: Mutex::new(rx),
            closed,
            is_closed,
        }
    }

    async fn drive<T>(
        mut connection: Connection<T>,
        tx: mpsc::Sender<MuxStream>,
        closed: Arc<Notify>,
        is_closed: Arc<AtomicBool>,
    ) where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        loop {
            match connection.next().await {
                Some(Ok(stream)) => {
                    if tx.send(stream).await.is_err() {
                        // Nobody is accepting anymore; keep driving so
                        // outbound `open()` calls still make progress.
                        continue;
                    }
                }
                Some(Err(error)) => {
                    debug!(%error, "mux session ended");
                    break;
                }
                None => break,
            }
        }
        is_closed.store(true, Ordering::SeqCst);
        closed.notify_waiters();
    }

    /// Opens a new outbound stream. Returns [`MuxError::Shutdown`] if the
    /// session is gracefully closed — callers should treat that the same as
    /// EOF, not as a failure (spec §4.4.6).
    pub async fn open(&self) -> Result<MuxStream, MuxError> {
        self.control
            .clone()
            .open_stream()
            .await
            .map_err(|error| match error {
                ConnectionError::Closed => MuxError::Shutdown,
                other => MuxError::Yamux(other),
            })
    }

    /// Waits for the next inbound stream. Returns `None` once the session
    /// has shut down.
    pub async fn accept(&self) -> Option<MuxStream> {
        self.inbound.lock().await.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::SeqCst)
    }

    /// Resolves once the session has shut down (the `CloseChan` of spec
    /// §4.3). Resolves immediately if it already has.
    pub async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        self.closed.notified().await;
    }

    pub async fn close(&self) {
        let _ = self.control.clone().close().await;
    }
}
