use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::app::Application;
use crate::config::Config;
use crate::connection::{Connection, ConnectionState};
use crate::error::{Error, Result};
use crate::protocol::HandshakeRequest;
use crate::server::AppRegistry;

/// Pause after a failed `accept`, e.g. on `EMFILE`.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Identifies the accept loop started by [`Server::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerHandle {
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// The address the listener is bound to.
    ///
    /// With port `0` in the configuration this carries the port the OS chose.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

struct AcceptLoop {
    handle: ServerHandle,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// A WebSocket server.
///
/// Applications are registered per virtual host before [`Server::run`]
/// starts the accept loop on its own task. Every accepted client gets its
/// own worker task owning a [`Connection`].
///
/// # Example
///
/// ```no_run
/// use hybi::Server;
/// # async fn demo(make_app: fn(&hybi::HandshakeRequest) -> Box<dyn hybi::Application>) -> hybi::Result<()> {
/// let mut server = Server::new("localhost", "12345")?;
/// server.register_app("echo", None, make_app);
/// let handle = server.run().await?;
/// println!("listening on {}", handle.local_addr());
/// server.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    config: Arc<Config>,
    registry: AppRegistry,
    running: Option<AcceptLoop>,
}

impl Server {
    /// Create a server for `address:port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] if `port` is not numeric.
    pub fn new(address: impl Into<String>, port: &str) -> Result<Self> {
        Ok(Self::with_config(Config::new(address, port)?))
    }

    /// Create a server from a full configuration.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            registry: AppRegistry::new(),
            running: None,
        }
    }

    /// The server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The configured `address:port`.
    #[must_use]
    pub fn address(&self) -> String {
        self.config.bind_target()
    }

    /// Registered applications.
    #[must_use]
    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    /// Register an application factory for `host`, or as the default when
    /// `host` is `None`. The last registration for a host wins.
    ///
    /// Registrations made while the server is running take effect on the
    /// next [`Server::run`].
    pub fn register_app<F>(&mut self, name: impl Into<String>, host: Option<&str>, factory: F)
    where
        F: Fn(&HandshakeRequest) -> Box<dyn Application> + Send + Sync + 'static,
    {
        self.registry.register(name, host, factory);
    }

    /// Install the log sink configured by [`Config::log_file`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the log file cannot be opened.
    pub fn init_logging(&self) -> Result<()> {
        crate::logging::init(self.config.log_file.as_deref())
    }

    /// Log a line through the server's log sink.
    pub fn log(&self, message: &str) {
        crate::logging::log(message);
    }

    /// Returns `true` while an accept loop started by [`Server::run`] is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| !r.task.is_finished())
    }

    /// The bound address of the running accept loop.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.handle.local_addr)
    }

    /// Bind, listen and start the accept loop.
    ///
    /// Returns immediately once the listener is up. Calling `run` again
    /// while the loop is alive returns the existing handle.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidAddress` if the bind address does not resolve
    /// - `Error::Bind` if the socket cannot be created or bound
    /// - `Error::Listen` if listening on the bound socket fails
    pub async fn run(&mut self) -> Result<ServerHandle> {
        if let Some(running) = self.running.as_ref().filter(|r| !r.task.is_finished()) {
            warn!(addr = %running.handle.local_addr, "server already running");
            return Ok(running.handle);
        }

        let listener = self.listen().await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "listening");

        let (stop, stopped) = oneshot::channel();
        let registry = Arc::new(self.registry.clone());
        let task = tokio::spawn(accept_loop(listener, registry, self.config.clone(), stopped));

        let handle = ServerHandle { local_addr };
        self.running = Some(AcceptLoop { handle, stop, task });
        Ok(handle)
    }

    /// Stop the accept loop and wait for it to exit.
    ///
    /// The listener is released and connection workers still running are
    /// aborted before this returns. Returns `false` if no accept loop is
    /// known (never started, or already shut down).
    pub async fn shutdown(&mut self) -> bool {
        let Some(running) = self.running.take() else {
            return false;
        };

        info!(addr = %running.handle.local_addr, "shutting down accept loop");
        let signalled = running.stop.send(()).is_ok();

        match running.task.await {
            Ok(()) if signalled => info!("accept loop exited on shutdown signal"),
            Ok(()) => warn!("accept loop had already exited"),
            Err(e) if e.is_panic() => warn!(error = %e, "accept loop panicked"),
            Err(e) => warn!(error = %e, "accept loop exited unexpectedly"),
        }
        true
    }

    async fn listen(&self) -> Result<TcpListener> {
        let target = self.config.bind_target();
        let addr = lookup_host(target.as_str())
            .await
            .map_err(|e| Error::InvalidAddress(format!("{target}: {e}")))?
            .next()
            .ok_or_else(|| Error::InvalidAddress(target.clone()))?;

        let bind_err = |e: std::io::Error| Error::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        };

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;

        socket.listen(self.config.backlog).map_err(|e| Error::Listen {
            addr: addr.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            debug!(addr = %running.handle.local_addr, "server dropped, stopping accept loop");
            let _ = running.stop.send(());
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<AppRegistry>,
    config: Arc<Config>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut workers: JoinSet<SocketAddr> = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = &mut stop => break,

            Some(finished) = workers.join_next(), if !workers.is_empty() => match finished {
                Ok(peer) => debug!(%peer, active = workers.len(), "worker finished"),
                Err(e) => warn!(error = %e, active = workers.len(), "worker failed"),
            },

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!(%peer, "new connection");
                    workers.spawn(serve(stream, peer, registry.clone(), config.clone()));
                }
                Err(e) => accept_backoff(&e).await,
            },
        }
    }

    drop(listener);
    if !workers.is_empty() {
        info!(active = workers.len(), "aborting connection workers");
    }
    workers.shutdown().await;
    info!("accept loop stopped");
}

async fn accept_backoff(err: &io::Error) {
    warn!(error = %err, backoff = ?ACCEPT_BACKOFF, "error accepting connection");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

/// Read from one client until it disconnects, errors, or finishes closing.
async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<AppRegistry>,
    config: Arc<Config>,
) -> SocketAddr {
    let mut conn = Connection::new(stream, peer, registry, &config);
    let mut buf = vec![0u8; config.read_buffer_size.max(1)];

    loop {
        let n = match conn.get_mut().read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!(%peer, error = %e, "read failed");
                break;
            }
        };

        if n == 0 {
            conn.handle_eof();
            break;
        }

        if let Err(e) = conn.process_inbound(&buf[..n]).await {
            warn!(%peer, error = %e, "dropping connection");
            break;
        }

        if conn.state() == ConnectionState::Closed {
            break;
        }
    }

    info!(%peer, "disconnecting");
    let _ = conn.get_mut().shutdown().await;
    peer
}
