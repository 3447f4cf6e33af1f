//! A tiny memcached speaking just enough of the text protocol to answer
//! `stats` commands from canned responses.
//!
//! Every accepted connection is tracked, so tests can assert that the
//! client closed all of them.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Canned replies keyed by the command line, e.g. `stats slabs`.
///
/// An empty reply means the server never answers that command, which is
/// handy for exercising client timeouts. Unknown commands get `ERROR`.
#[derive(Clone, Debug, Default)]
pub struct Responses(HashMap<String, String>);

impl Responses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, command: impl Into<String>, reply: impl Into<String>) -> Self {
        self.0.insert(command.into(), reply.into());
        self
    }

    fn get(&self, command: &str) -> Option<&str> {
        self.0.get(command).map(String::as_str)
    }
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    accepted: AtomicUsize,
    commands: AtomicUsize,
}

/// Decrements the active counter when the connection handler finishes.
struct ConnectionGuard(Arc<Counters>);

impl ConnectionGuard {
    fn new(counters: Arc<Counters>) -> Self {
        counters.active.fetch_add(1, Ordering::SeqCst);
        counters.accepted.fetch_add(1, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockMemcached {
    addr: SocketAddr,
    counters: Arc<Counters>,
    handle: JoinHandle<()>,
}

impl MockMemcached {
    /// Listen on a random local port.
    pub async fn start(responses: Responses) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let counters = Arc::new(Counters::default());

        let handle = tokio::spawn({
            let counters = Arc::clone(&counters);
            let responses = Arc::new(responses);

            async move {
                loop {
                    let (stream, _peer) = match listener.accept().await {
                        Ok(conn) => conn,
                        Err(err) => {
                            tracing::warn!(message = "mock memcached accept failed", %err);
                            continue;
                        }
                    };

                    let guard = ConnectionGuard::new(Arc::clone(&counters));
                    tokio::spawn(serve(stream, Arc::clone(&responses), guard));
                }
            }
        });

        Ok(Self {
            addr,
            counters,
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Connections accepted and not yet closed by the peer.
    pub fn active_connections(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    pub fn accepted_connections(&self) -> usize {
        self.counters.accepted.load(Ordering::SeqCst)
    }

    /// Total command lines received, across all connections.
    pub fn commands(&self) -> usize {
        self.counters.commands.load(Ordering::SeqCst)
    }

    /// A cheap handle for polling the active count from `wait_for` closures.
    pub fn active_probe(&self) -> impl Fn() -> usize + Send + Sync + 'static {
        let counters = Arc::clone(&self.counters);
        move || counters.active.load(Ordering::SeqCst)
    }
}

impl Drop for MockMemcached {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(unix)]
pub struct MockUnixMemcached {
    path: std::path::PathBuf,
    counters: Arc<Counters>,
    handle: JoinHandle<()>,
}

#[cfg(unix)]
impl MockUnixMemcached {
    pub fn start(path: std::path::PathBuf, responses: Responses) -> std::io::Result<Self> {
        let listener = tokio::net::UnixListener::bind(&path)?;
        let counters = Arc::new(Counters::default());

        let handle = tokio::spawn({
            let counters = Arc::clone(&counters);
            let responses = Arc::new(responses);

            async move {
                while let Ok((stream, _peer)) = listener.accept().await {
                    let guard = ConnectionGuard::new(Arc::clone(&counters));
                    tokio::spawn(serve(stream, Arc::clone(&responses), guard));
                }
            }
        });

        Ok(Self {
            path,
            counters,
            handle,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn active_connections(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    pub fn accepted_connections(&self) -> usize {
        self.counters.accepted.load(Ordering::SeqCst)
    }
}

#[cfg(unix)]
impl Drop for MockUnixMemcached {
    fn drop(&mut self) {
        self.handle.abort();
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn serve<S>(stream: S, responses: Arc<Responses>, guard: ConnectionGuard)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        guard.0.commands.fetch_add(1, Ordering::SeqCst);

        let command = line.trim();
        if command == "quit" {
            break;
        }

        let reply = responses.get(command).unwrap_or("ERROR\r\n");
        if reply.is_empty() {
            continue;
        }

        if writer.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }

    drop(guard);
}
