//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and dispatches HTTP/1.1 requests to a handler function.
//! Supports HTTP/1.1 persistent connections (keep-alive) out of the box.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The relay's HTTP server.
///
/// Binds to a TCP address and dispatches incoming HTTP/1.1 requests to a
/// handler function.
///
/// # Examples
///
/// ```rust,no_run
/// use chat_relay::server::Server;
/// use chat_relay::http::{Request, Response, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:3000").await?;
///     server.run(|_req: Request| async {
///         Response::new(StatusCode::OK).body("Hello!")
///     }).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until the process is terminated.
    ///
    /// See [`run_until`](Self::run_until).
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.run_until(handler, std::future::pending()).await
    }

    /// Accepts connections and dispatches requests to `handler` until `shutdown` resolves.
    ///
    /// The handler is wrapped in an [`Arc`] and shared across all spawned Tokio
    /// tasks. Once `shutdown` completes the listener stops accepting; connections
    /// already in progress finish on their own tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run_until<H, F, S>(self, handler: H, shutdown: S) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
        S: Future<Output = ()>,
    {
        let handler = Arc::new(handler);
        tokio::pin!(shutdown);
        info!(address = %self.local_addr, "chat-relay listening");

        loop {
            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                () = &mut shutdown => {
                    info!("shutdown requested: no longer accepting connections");
                    return Ok(());
                }
            };

            let (stream, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

// Writes a terminal error response; the caller closes the connection afterwards.
async fn reject(stream: &mut TcpStream, status: StatusCode, body: String) -> std::io::Result<()> {
    let response = Response::new(status).body(body).keep_alive(false);
    stream.write_all(&response.into_bytes()).await
}

/// Handles a single TCP connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, reading one
/// request per iteration, until the peer closes the connection or signals
/// `Connection: close`.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);
    let mut need_read = true;

    loop {
        // Pipelined requests may already sit in the buffer after a response.
        if need_read {
            let bytes_read = stream.read_buf(&mut buf).await?;
            if bytes_read == 0 {
                debug!(peer = %peer_addr, "connection closed by peer");
                break;
            }
        }
        need_read = true;

        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large: sending 413");
            reject(
                &mut stream,
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request entity too large".to_owned(),
            )
            .await?;
            break;
        }

        let (mut request, body_offset) = match Request::parse(&buf) {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => continue,
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request: sending 400");
                reject(&mut stream, StatusCode::BAD_REQUEST, format!("Bad Request: {e}")).await?;
                break;
            }
        };

        // Only Content-Length framing is supported; a chunked body would
        // otherwise be read as empty and its chunks as the next request.
        if request.headers().contains("transfer-encoding") {
            warn!(peer = %peer_addr, "transfer-encoding not supported: sending 411");
            reject(
                &mut stream,
                StatusCode::LENGTH_REQUIRED,
                "Length Required".to_owned(),
            )
            .await?;
            break;
        }

        let content_length = match request.content_length() {
            Ok(len) => len.unwrap_or(0),
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request: sending 400");
                reject(&mut stream, StatusCode::BAD_REQUEST, format!("Bad Request: {e}")).await?;
                break;
            }
        };

        // Wait for the full body to arrive.
        let total_needed = body_offset + content_length;
        if total_needed > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, content_length, "declared body too large: sending 413");
            reject(
                &mut stream,
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request entity too large".to_owned(),
            )
            .await?;
            break;
        }
        if buf.len() < total_needed {
            continue;
        }

        let mut consumed = buf.split_to(total_needed);
        request.set_body(consumed.split_off(body_offset).freeze());

        let keep_alive = request.is_keep_alive();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        let response = handler(request).await.keep_alive(keep_alive);
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        if !keep_alive {
            debug!(peer = %peer_addr, "peer sent Connection: close");
            break;
        }
        need_read = buf.is_empty();
    }

    Ok(())
}
