//! Server lifecycle and the per-connection driver.
//!
//! [`HttpServer`] owns all mutable configuration: the route table, the
//! middleware chain, the not-found and error hooks, and the global headers.
//! `start` binds a listener and spawns the accept loop; every accepted
//! stream gets its own task running [`HttpServer::serve_connection`] plus a
//! shutdown handle in the connection registry, which is how `stop` reaches
//! into keep-alive and protocol-switch loops that would otherwise idle on a
//! read forever.
//!
//! Configuration methods take `&self`; everything is behind its own lock,
//! so routes and middleware may be registered before or after `start`.

mod dispatch;
mod groups;
mod metrics;

pub use dispatch::GlobalErrorHandlerFn;
pub use groups::RouteGroup;
pub use metrics::ConnectionMetrics;

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::codec::{read_request, respond};
use crate::connection::Connection;
use crate::handler::{HttpHandler, Middleware};
use crate::protocol::{HttpResponse, Method, Request, ResponseHeaders, ServerError};
use crate::router::Router;
use crate::VERSION;

use dispatch::Dispatched;

const STOPPED: u8 = 0;
const STARTING: u8 = 1;
const RUNNING: u8 = 2;
const STOPPING: u8 = 3;

/// Observer notified when a `101 Switching Protocols` response hands a
/// connection over to its session callback.
pub trait ServerDelegate: Send + Sync {
    fn socket_connection_received(&self, connection: &mut Connection);
}

/// An embeddable HTTP/1.1 server.
///
/// ```no_run
/// use std::sync::Arc;
/// use skiff::{handler_fn, HandlerResult, HttpResponse, HttpResponseBody, HttpServer, Request, ResponseHeaders};
///
/// async fn hello(_request: &Request, _headers: &mut ResponseHeaders) -> HandlerResult {
///     Ok(HttpResponse::Ok(HttpResponseBody::Text("hello".to_string())))
/// }
///
/// # async fn run() -> Result<(), skiff::ServerError> {
/// let server = Arc::new(HttpServer::new());
/// server.get("/hello", handler_fn(hello));
/// server.start(8080).await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpServer {
    pub(crate) router: RwLock<Router>,
    pub(crate) middleware: RwLock<Vec<Arc<dyn Middleware>>>,
    pub(crate) not_found: RwLock<Option<Arc<dyn HttpHandler>>>,
    pub(crate) error_handler: RwLock<Option<GlobalErrorHandlerFn>>,
    global_headers: RwLock<ResponseHeaders>,
    delegate: RwLock<Option<Arc<dyn ServerDelegate>>>,
    metrics: ConnectionMetrics,
    listen_addr: RwLock<IpAddr>,
    state: AtomicU8,
    bound_port: AtomicU16,
    next_connection_id: AtomicU64,
    connections: Mutex<HashMap<u64, watch::Sender<bool>>>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::Acquire) {
            STARTING => "starting",
            RUNNING => "running",
            STOPPING => "stopping",
            _ => "stopped",
        };
        f.debug_struct("HttpServer")
            .field("state", &state)
            .field("port", &self.port())
            .field("routes", &self.routes())
            .finish()
    }
}

impl HttpServer {
    pub fn new() -> Self {
        Self::with_name("skiff")
    }

    /// A server whose `Server` global header reads `{name}/{version}`.
    pub fn with_name(name: &str) -> Self {
        let mut global_headers = ResponseHeaders::new();
        global_headers.set("Server", format!("{name}/{VERSION}"));
        Self {
            router: RwLock::new(Router::new()),
            middleware: RwLock::new(Vec::new()),
            not_found: RwLock::new(None),
            error_handler: RwLock::new(None),
            global_headers: RwLock::new(global_headers),
            delegate: RwLock::new(None),
            metrics: ConnectionMetrics::default(),
            listen_addr: RwLock::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            state: AtomicU8::new(STOPPED),
            bound_port: AtomicU16::new(0),
            next_connection_id: AtomicU64::new(0),
            connections: Mutex::new(HashMap::new()),
            shutdown: Mutex::new(None),
        }
    }

    // Registration surface.

    pub fn register(
        &self,
        method: Option<Method>,
        pattern: &str,
        handler: impl HttpHandler + 'static,
    ) {
        self.router
            .write()
            .unwrap()
            .register(method, pattern, Arc::new(handler));
    }

    pub fn get(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(Some(Method::Get), pattern, handler);
    }

    pub fn post(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(Some(Method::Post), pattern, handler);
    }

    pub fn put(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(Some(Method::Put), pattern, handler);
    }

    pub fn delete(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(Some(Method::Delete), pattern, handler);
    }

    pub fn patch(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(Some(Method::Patch), pattern, handler);
    }

    pub fn head(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(Some(Method::Head), pattern, handler);
    }

    /// Registers a handler that matches the pattern under any method.
    pub fn any(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(None, pattern, handler);
    }

    /// A registrar that prefixes every pattern with `prefix`.
    pub fn grouped(&self, prefix: &str) -> RouteGroup<'_> {
        RouteGroup::new(self, prefix)
    }

    /// Registered route patterns, in registration order.
    pub fn routes(&self) -> Vec<String> {
        self.router.read().unwrap().routes()
    }

    /// Appends a middleware; the chain runs in registration order before
    /// routing on every request.
    pub fn add_middleware(&self, middleware: impl Middleware + 'static) {
        self.middleware.write().unwrap().push(Arc::new(middleware));
    }

    /// Handler consulted when no route matches, instead of the built-in 404.
    pub fn set_not_found_handler(&self, handler: impl HttpHandler + 'static) {
        *self.not_found.write().unwrap() = Some(Arc::new(handler));
    }

    /// Hook that turns handler failures into responses, instead of the
    /// built-in 500.
    pub fn set_error_handler(
        &self,
        on_error: impl Fn(&(dyn Error + Send + Sync), &Request, &mut ResponseHeaders) -> HttpResponse
            + Send
            + Sync
            + 'static,
    ) {
        *self.error_handler.write().unwrap() = Some(Box::new(on_error));
    }

    /// Appends a header sent with every response unless the handler already
    /// set one with the same name.
    pub fn add_global_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.global_headers.write().unwrap().add(name, value);
    }

    pub fn set_delegate(&self, delegate: Arc<dyn ServerDelegate>) {
        *self.delegate.write().unwrap() = Some(delegate);
    }

    pub fn metrics(&self) -> &ConnectionMetrics {
        &self.metrics
    }

    /// Address the listener binds to; defaults to `0.0.0.0`.
    pub fn set_listen_addr(&self, addr: IpAddr) {
        *self.listen_addr.write().unwrap() = addr;
    }

    // Lifecycle.

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    /// The port the listener is bound to. Useful after `start(0)`.
    pub fn port(&self) -> u16 {
        self.bound_port.load(Ordering::Acquire)
    }

    /// Binds and spawns the accept loop. A no-op when already running.
    /// Port `0` picks a free port; see [`HttpServer::port`].
    pub async fn start(self: &Arc<Self>, port: u16) -> Result<(), ServerError> {
        if self
            .state
            .compare_exchange(STOPPED, STARTING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let addr = SocketAddr::new(*self.listen_addr.read().unwrap(), port);
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.state.store(STOPPED, Ordering::Release);
                return Err(ServerError::bind(addr, source));
            }
        };
        let bound = listener.local_addr().map_err(|source| {
            self.state.store(STOPPED, Ordering::Release);
            ServerError::bind(addr, source)
        })?;
        self.bound_port.store(bound.port(), Ordering::Release);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown.lock().unwrap() = Some(shutdown_tx);
        self.state.store(RUNNING, Ordering::Release);
        info!(addr = %bound, "server listening");

        let server = Arc::clone(self);
        tokio::spawn(async move {
            server.accept_loop(listener, shutdown_rx).await;
        });
        Ok(())
    }

    /// Stops accepting and force-closes every tracked connection, including
    /// ones parked in keep-alive or protocol-switch loops. A no-op unless
    /// running; the server can be started again afterwards.
    pub fn stop(&self) {
        if self
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        {
            let mut connections = self.connections.lock().unwrap();
            for (_, handle) in connections.drain() {
                let _ = handle.send(true);
            }
        }
        if let Some(shutdown) = self.shutdown.lock().unwrap().take() {
            let _ = shutdown.send(true);
        }
        self.state.store(STOPPED, Ordering::Release);
        info!("server stopped");
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.accept(stream, peer),
                        Err(error) => {
                            warn!(cause = %error, "failed to accept");
                            break;
                        }
                    }
                }
            }
        }
        self.stop();
    }

    fn accept(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (handle, signal) = watch::channel(false);
        self.connections.lock().unwrap().insert(id, handle);
        self.metrics.connection_opened();

        let server = Arc::clone(self);
        tokio::spawn(async move {
            server.serve_connection(stream, peer, signal).await;
            server.connections.lock().unwrap().remove(&id);
            server.metrics.connection_closed();
        });
    }

    /// Drives one connection: read, dispatch, respond, repeat while the
    /// writer grants keep-alive. A protocol switch hands the connection to
    /// the session callback and ends the loop.
    async fn serve_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        mut shutdown: watch::Receiver<bool>,
    ) {
        debug!(%peer, "connection opened");
        let mut conn = Connection::new(stream, Some(peer));
        while self.is_running() {
            let parsed = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                parsed = read_request(&mut conn) => parsed,
            };
            let mut request = match parsed {
                Ok(request) => request,
                Err(error) => {
                    debug!(%peer, cause = %error, "failed to read request");
                    break;
                }
            };
            request.peer_addr = conn.peer_addr();

            let mut headers = ResponseHeaders::new();
            let response = match self.dispatch(&request, &mut headers).await {
                Dispatched::Instant(response) => response,
                Dispatched::Handler(params, handler) => {
                    request.path_params = params;
                    let outcome = handler.handle(&request, &mut headers).await;
                    self.resolve(outcome, &request, &mut headers)
                }
            };

            let status = response.status_code();
            request.response_code = Some(status);
            info!(
                id = %request.id,
                %peer,
                method = %request.method,
                path = %request.path,
                status,
                "request"
            );

            let keep_alive_requested =
                request.keep_alive_requested() && !request.keep_alive_disabled();
            let global = self.global_headers.read().unwrap().clone();
            let written = respond(&mut conn, response, &headers, &global, keep_alive_requested).await;
            let (keep_alive, session) = match written {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(%peer, cause = %error, "failed to send response");
                    break;
                }
            };

            if let Some(session) = session {
                if let Some(delegate) = self.delegate.read().unwrap().clone() {
                    delegate.socket_connection_received(&mut conn);
                }
                session(conn).await;
                break;
            }
            if !keep_alive {
                break;
            }
        }
        debug!(%peer, "connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, HandlerResult};
    use crate::protocol::HttpResponseBody;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    async fn ok_text(_request: &Request, _headers: &mut ResponseHeaders) -> HandlerResult {
        Ok(HttpResponse::Ok(HttpResponseBody::Text("ok".to_string())))
    }

    async fn started_server() -> Arc<HttpServer> {
        let server = Arc::new(HttpServer::new());
        server.get("/hello", handler_fn(ok_text));
        server.start(0).await.unwrap();
        server
    }

    async fn connect(server: &HttpServer) -> TcpStream {
        TcpStream::connect(("127.0.0.1", server.port())).await.unwrap()
    }

    /// Reads one `Content-Length`-framed response off the stream.
    async fn read_framed_response(stream: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(head_end) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
                let content_length: usize = head
                    .lines()
                    .find_map(|line| line.strip_prefix("Content-Length: "))
                    .map(|value| value.trim().parse().unwrap())
                    .unwrap_or(0);
                if raw.len() >= head_end + 4 + content_length {
                    return String::from_utf8_lossy(&raw[..head_end + 4 + content_length])
                        .to_string();
                }
            }
            let read = timeout(Duration::from_secs(5), stream.read(&mut chunk))
                .await
                .expect("timed out reading response")
                .unwrap();
            assert!(read > 0, "connection closed mid-response");
            raw.extend_from_slice(&chunk[..read]);
        }
    }

    #[tokio::test]
    async fn serves_a_request_over_tcp() {
        let server = started_server().await;
        let mut stream = connect(&server).await;

        stream
            .write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let response = String::from_utf8_lossy(&raw);

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("\r\nServer: skiff/"));
        assert!(response.ends_with("\r\n\r\nok"));

        server.stop();
    }

    #[tokio::test]
    async fn keep_alive_carries_two_requests_on_one_connection() {
        let server = started_server().await;
        let mut stream = connect(&server).await;

        for _ in 0..2 {
            stream
                .write_all(
                    b"GET /hello HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n",
                )
                .await
                .unwrap();
            let response = read_framed_response(&mut stream).await;
            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(response.contains("\r\nConnection: keep-alive\r\n"));
            assert!(response.ends_with("ok"));
        }

        server.stop();
    }

    #[tokio::test]
    async fn stop_closes_parked_keep_alive_connections() {
        let server = started_server().await;
        let mut stream = connect(&server).await;

        stream
            .write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n")
            .await
            .unwrap();
        read_framed_response(&mut stream).await;

        server.stop();

        let mut chunk = [0u8; 16];
        let read = timeout(Duration::from_secs(5), stream.read(&mut chunk))
            .await
            .expect("connection was not closed by stop")
            .unwrap();
        assert_eq!(read, 0);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_restart_works() {
        let server = started_server().await;
        let first_port = server.port();

        server.start(0).await.unwrap();
        assert_eq!(server.port(), first_port);

        server.stop();
        assert!(!server.is_running());

        server.start(0).await.unwrap();
        assert!(server.is_running());
        let mut stream = connect(&server).await;
        stream
            .write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        assert!(String::from_utf8_lossy(&raw).starts_with("HTTP/1.1 200 OK\r\n"));

        server.stop();
    }

    #[tokio::test]
    async fn metrics_track_open_connections() {
        let server = started_server().await;
        assert_eq!(server.metrics().open_connections(), 0);

        let mut stream = connect(&server).await;
        stream
            .write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n")
            .await
            .unwrap();
        read_framed_response(&mut stream).await;
        assert_eq!(server.metrics().open_connections(), 1);

        drop(stream);
        for _ in 0..50 {
            if server.metrics().open_connections() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(server.metrics().open_connections(), 0);

        server.stop();
    }

    #[test]
    fn new_server_is_stopped_with_no_routes() {
        let server = HttpServer::new();
        assert!(!server.is_running());
        assert!(server.routes().is_empty());
    }

    #[test]
    fn method_sugar_registers_into_the_route_table() {
        let server = HttpServer::new();
        server.get("/a", handler_fn(ok_text));
        server.post("/b", handler_fn(ok_text));
        server.any("/c/**", handler_fn(ok_text));

        assert_eq!(server.routes(), vec!["/a", "/b", "/c/**"]);
    }

    #[test]
    fn groups_prefix_their_registrations() {
        let server = HttpServer::new();
        let api = server.grouped("/api/");
        api.get("users", handler_fn(ok_text));
        let nested = api.grouped("admin");
        nested.delete("/users/:id", handler_fn(ok_text));

        assert_eq!(
            server.routes(),
            vec!["/api/users", "/api/admin/users/:id"]
        );
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let server = HttpServer::new();
        server.stop();
        assert!(!server.is_running());
    }
}
