//! The server: listener, accept loop, and the per-request cycle.
//!
//! # One connection at a time
//!
//! kado is deliberately sequential. Each accepted connection is driven
//! through the whole cycle — read, parse, build the environment, invoke the
//! application, write, close — before the next accept resolves. There is no
//! task spawn and no shared mutable state: the [`Server`] owns only its
//! listener, identity, and configuration, so a later move to per-connection
//! tasks would not have to untangle anything.
//!
//! The cost is equally deliberate: no timeouts are enforced, so a client that
//! connects and goes silent stalls the server until it hangs up. Put a proxy
//! in front if that matters to you.
//!
//! # Failure isolation
//!
//! Nothing a client or an application does can take the loop down. Every
//! per-request failure — malformed request line, application error, missing
//! declaration, transport error — is caught at the loop boundary, logged with
//! request context, and answered by dropping the connection. The only fatal
//! error is failing to bind.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, error, info};

use crate::application::Application;
use crate::environ::Environ;
use crate::error::Error;
use crate::request::Request;
use crate::response::Responder;

const DEFAULT_BACKLOG: u32 = 1;
const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

// ── Builder ──────────────────────────────────────────────────────────────────

/// Configuration for a [`Server`], produced by [`Server::bind`].
///
/// Nothing touches the network until [`listen`](Builder::listen).
pub struct Builder {
    addr: SocketAddr,
    backlog: u32,
    read_buffer_size: usize,
}

impl Builder {
    /// Sets the accept backlog: the OS-level queue depth of pending,
    /// not-yet-accepted connections. Defaults to 1.
    pub fn backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Sets the size of the single request read. Defaults to 1024 bytes.
    ///
    /// This is the hard ceiling on how much of a request the server sees:
    /// exactly one read of at most this many bytes is performed per
    /// connection, and anything the client sends beyond it is never read.
    pub fn read_buffer_size(mut self, bytes: usize) -> Self {
        self.read_buffer_size = bytes;
        self
    }

    /// Binds the address and starts listening.
    ///
    /// This is the only fatal failure point in the crate: an unbindable
    /// address comes back as [`Error::Bind`] and the server never starts.
    /// `SO_REUSEADDR` is set so restarts do not trip over sockets in
    /// `TIME_WAIT`.
    pub async fn listen(self) -> Result<Server, Error> {
        let socket = match self.addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(Error::Bind)?;
        socket.set_reuseaddr(true).map_err(Error::Bind)?;
        socket.bind(self.addr).map_err(Error::Bind)?;
        let listener = socket.listen(self.backlog).map_err(Error::Bind)?;
        let local_addr = listener.local_addr().map_err(Error::Bind)?;

        // Reverse-DNS of the bound host, for SERVER_NAME. Unresolvable
        // addresses (0.0.0.0, most containers) fall back to the IP string.
        let server_name = dns_lookup::lookup_addr(&local_addr.ip())
            .unwrap_or_else(|_| local_addr.ip().to_string());

        Ok(Server {
            listener,
            local_addr,
            server_name,
            read_buffer_size: self.read_buffer_size,
        })
    }
}

// ── Server ───────────────────────────────────────────────────────────────────

/// The gateway server: a bound listener plus the identity it reports to
/// applications.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    server_name: String,
    read_buffer_size: usize,
}

impl Server {
    /// Configures a server to bind `addr` when
    /// [`listen`](Builder::listen) is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use kado::Server;
    /// let builder = Server::bind("0.0.0.0:8888").backlog(4);
    /// ```
    pub fn bind(addr: &str) -> Builder {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Builder {
            addr,
            backlog: DEFAULT_BACKLOG,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    /// The address actually bound, with the real port when `:0` was asked for.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The name reported to applications as `SERVER_NAME`.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Accepts and serves connections until a shutdown signal.
    ///
    /// Connections are handled strictly one at a time: a request cycle runs
    /// to completion, its connection is closed, and only then does the next
    /// accept resolve. Per-request failures never escape this loop — they are
    /// logged and the loop keeps accepting.
    ///
    /// Returns `Ok(())` after SIGTERM or Ctrl-C.
    pub async fn serve<A: Application>(self, application: A) -> Result<(), Error> {
        info!(addr = %self.local_addr, server_name = %self.server_name, "kado listening");

        // Pin the shutdown future so we can poll it across loop iterations.
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` makes select! check arms top-to-bottom. Shutdown is
                // checked first so a signal stops the server even when
                // connections are queued in the backlog.
                biased;

                () = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }

                res = self.listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };
                    debug!(peer = %peer, "connection accepted");

                    // The stream is moved into the cycle and dropped there:
                    // the connection closes exactly once whatever the outcome.
                    if let Err(e) = self.handle_one_request(stream, &application).await {
                        error!(peer = %peer, "request failed: {e}");
                    }
                }
            }
        }

        info!("kado stopped");
        Ok(())
    }

    /// Drives one full request cycle: read, parse, build the environment,
    /// invoke the application, serialize, transmit.
    async fn handle_one_request<A: Application>(
        &self,
        mut stream: TcpStream,
        application: &A,
    ) -> Result<(), Error> {
        let mut buf = vec![0u8; self.read_buffer_size];
        let n = stream.read(&mut buf).await?;
        buf.truncate(n);
        let raw = Bytes::from(buf);

        let request = Request::parse(raw)?;
        debug!(
            method = %request.method(),
            path = %request.path(),
            version = %request.version(),
            "request parsed"
        );

        let environ = Environ::build(&request, &self.server_name, self.local_addr.port());

        let mut responder = Responder::new();
        let body = application
            .call(environ, &mut responder)
            .map_err(Error::Application)?;
        let declaration = responder
            .into_declaration()
            .ok_or(Error::MissingResponseDeclaration)?;

        let response = declaration.render(body)?;
        stream.write_all(&response).await?;
        stream.shutdown().await?;
        debug!(bytes = response.len(), "response written");

        Ok(())
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C, for
/// local dev). On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` never resolves — on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
