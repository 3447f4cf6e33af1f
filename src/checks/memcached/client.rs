use std::collections::BTreeMap;
use std::io;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::config::Address;

const STAT_PREFIX: &str = "STAT ";
const END: &str = "END";
const ERROR: &str = "ERROR";
const CLIENT_ERROR_PREFIX: &str = "CLIENT_ERROR";
const SERVER_ERROR_PREFIX: &str = "SERVER_ERROR";

/// Stat name to raw value, exactly as the server sent them.
pub type RawStats = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connect to {addr} failed: {err}")]
    Connect { addr: String, err: io::Error },

    #[error("command \"{cmd}\" execute failed: {err}")]
    CommandExecFailed { cmd: &'static str, err: io::Error },

    #[error("command \"{cmd}\" rejected: {reply}")]
    Rejected { cmd: &'static str, reply: String },

    #[error("connection closed before the reply of \"{cmd}\" completed")]
    UnexpectedEof { cmd: &'static str },

    #[error("no reply from {addr} after {secs}s")]
    Timeout { addr: String, secs: u64 },
}

/// The `stats` family of commands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    General,
    Items,
    Slabs,
}

impl Command {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Command::General => "stats",
            Command::Items => "stats items",
            Command::Slabs => "stats slabs",
        }
    }
}

/// A single connection speaking the memcached text protocol.
///
/// Dropping the client closes the connection.
pub struct Client<S> {
    stream: BufReader<S>,
}

impl Client<TcpStream> {
    pub async fn connect_tcp(host: &str, port: u16) -> Result<Self, FetchError> {
        let stream =
            TcpStream::connect((host, port))
                .await
                .map_err(|err| FetchError::Connect {
                    addr: format!("{host}:{port}"),
                    err,
                })?;

        Ok(Client::new(stream))
    }
}

#[cfg(unix)]
impl Client<tokio::net::UnixStream> {
    pub async fn connect_unix(path: &str) -> Result<Self, FetchError> {
        let stream = tokio::net::UnixStream::connect(path)
            .await
            .map_err(|err| FetchError::Connect {
                addr: format!("unix:{path}"),
                err,
            })?;

        Ok(Client::new(stream))
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Send one command and read `STAT` lines until `END`.
    pub async fn stats(&mut self, cmd: Command) -> Result<RawStats, FetchError> {
        let cmd = cmd.as_str();

        self.stream
            .write_all(format!("{cmd}\r\n").as_bytes())
            .await
            .map_err(|err| FetchError::CommandExecFailed { cmd, err })?;
        self.stream
            .flush()
            .await
            .map_err(|err| FetchError::CommandExecFailed { cmd, err })?;

        let mut stats = RawStats::new();
        let mut buf = Vec::with_capacity(128);
        loop {
            buf.clear();
            let n = self
                .stream
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|err| FetchError::CommandExecFailed { cmd, err })?;
            if n == 0 {
                return Err(FetchError::UnexpectedEof { cmd });
            }

            // invalid bytes only spoil their own value, which then fails to parse
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            if line == END {
                return Ok(stats);
            }

            if line == ERROR
                || line.starts_with(CLIENT_ERROR_PREFIX)
                || line.starts_with(SERVER_ERROR_PREFIX)
            {
                return Err(FetchError::Rejected {
                    cmd,
                    reply: line.to_string(),
                });
            }

            if let Some((key, value)) = parse_stat_line(line) {
                stats.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Shut the write half down, so the server sees a clean close.
    pub async fn close(mut self) {
        if let Err(err) = self.stream.shutdown().await {
            debug!(message = "Shutdown memcached connection failed", %err);
        }
    }
}

/// `STAT <name> <value>`, anything else is ignored.
fn parse_stat_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(STAT_PREFIX)?;
    let (key, value) = rest.trim_start().split_once(' ')?;
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// The raw records of one cycle. Optional groups keep their own result, a
/// failure there does not void the general stats.
#[derive(Debug, Default)]
pub struct Collected {
    pub general: RawStats,
    pub items: Option<Result<RawStats, FetchError>>,
    pub slabs: Option<Result<RawStats, FetchError>>,
}

async fn collect<S>(mut client: Client<S>, items: bool, slabs: bool) -> Result<Collected, FetchError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let general = client.stats(Command::General).await?;

    let items = if items {
        Some(client.stats(Command::Items).await)
    } else {
        None
    };

    let slabs = if slabs {
        Some(client.stats(Command::Slabs).await)
    } else {
        None
    };

    client.close().await;

    Ok(Collected {
        general,
        items,
        slabs,
    })
}

/// Open a connection, run the commands and close it again. The connection
/// never outlives this call, whatever the outcome.
pub async fn fetch(address: &Address, items: bool, slabs: bool) -> Result<Collected, FetchError> {
    match address {
        Address::Tcp { host, port } => {
            let client = Client::connect_tcp(host, *port).await?;
            collect(client, items, slabs).await
        }

        #[cfg(unix)]
        Address::Unix { path } => {
            let client = Client::connect_unix(path).await?;
            collect(client, items, slabs).await
        }

        #[cfg(not(unix))]
        Address::Unix { path } => Err(FetchError::Connect {
            addr: format!("unix:{path}"),
            err: io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            ),
        }),
    }
}
