//! Development HTTP server and graceful shutdown.
//!
//! The [`App`] is synchronous: each request is one blocking call. The server
//! owns the async side. It accepts connections with hyper, collects the body,
//! turns the request into an [`Environ`], and runs the app on tokio's
//! blocking pool so a slow handler never stalls the accept loop.
//!
//! On **SIGTERM** or **Ctrl-C** the server stops accepting, lets every
//! in-flight connection finish, and returns from [`Server::serve`].

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::app::App;
use crate::environ::{self, Environ};
use crate::error::Error;

/// Status line and headers captured from the app's sink.
type Head = (String, Vec<(String, String)>);

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr
            .parse()
            .unwrap_or_else(|e| panic!("invalid socket address `{addr}`: {e}"));
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Starts accepting connections and dispatching them through `app`.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, app: App) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_on(listener, app, shutdown_signal()).await
    }

    /// Like [`Server::serve`] on an already-bound listener, stopping when
    /// `shutdown` resolves.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        app: App,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let local = listener.local_addr()?;
        let app = Arc::new(app);

        info!(addr = %local, version = env!("CARGO_PKG_VERSION"), debug = app.is_debug(), "tern listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown first, so a signal stops accepting even if more
                // connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { dispatch(app, req, local).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tern stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request through the app. Never fails toward hyper: anything
/// that goes wrong here becomes a bare 500.
async fn dispatch(
    app: Arc<App>,
    req: hyper::Request<hyper::body::Incoming>,
    local: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("failed to read request body: {e}");
            return Ok(bare(StatusCode::BAD_REQUEST));
        }
    };

    let environ = to_environ(&parts, body, local);
    let (tx, rx) = oneshot::channel::<Head>();
    let mut tx = Some(tx);
    let sink = move |status: &str, headers: &[(String, String)]| {
        if let Some(tx) = tx.take() {
            let _ = tx.send((status.to_owned(), headers.to_vec()));
        }
    };

    let result = tokio::task::spawn_blocking(move || app.process_request(environ, sink)).await;
    let body = match result {
        Ok(Ok(body)) => body,
        Ok(Err(e)) => {
            error!(method = %parts.method, path = parts.uri.path(), "request failed: {e}");
            return Ok(bare(StatusCode::INTERNAL_SERVER_ERROR));
        }
        Err(e) => {
            error!(method = %parts.method, path = parts.uri.path(), "request task failed: {e}");
            return Ok(bare(StatusCode::INTERNAL_SERVER_ERROR));
        }
    };
    let Ok((status, headers)) = rx.await else {
        error!("app finished without starting a response");
        return Ok(bare(StatusCode::INTERNAL_SERVER_ERROR));
    };

    Ok(to_http(&status, &headers, body))
}

/// Builds the CGI-style environment for one hyper request.
fn to_environ(parts: &http::request::Parts, body: Bytes, local: SocketAddr) -> Environ {
    let path = percent_decode_str(parts.uri.path()).decode_utf8_lossy().into_owned();
    let mut env = Environ::new()
        .var(environ::REQUEST_METHOD, parts.method.as_str())
        .var(environ::PATH_INFO, path)
        .var(environ::QUERY_STRING, parts.uri.query().unwrap_or_default())
        .var(environ::SERVER_NAME, local.ip().to_string())
        .var(environ::SERVER_PORT, local.port().to_string())
        .var(environ::SERVER_PROTOCOL, format!("{:?}", parts.version))
        .var(environ::REQUEST_SCHEME, "http")
        .var(environ::CONTENT_LENGTH, body.len().to_string());

    for (name, value) in &parts.headers {
        let Ok(value) = value.to_str() else { continue };
        let key = name.as_str().to_ascii_uppercase().replace('-', "_");
        if key == environ::CONTENT_LENGTH {
            // Already taken from the collected body.
            continue;
        }
        if key == environ::CONTENT_TYPE {
            env.insert(key, value);
            continue;
        }
        // Repeated fields fold into one value; HTTP/2 splits cookies into
        // separate fields that rejoin with `; `.
        let separator = if key == "COOKIE" { "; " } else { ", " };
        let key = format!("{}{key}", environ::HEADER_PREFIX);
        let folded = match env.get(&key) {
            Some(existing) => format!("{existing}{separator}{value}"),
            None => value.to_owned(),
        };
        env.insert(key, folded);
    }

    // HTTP/2 carries the host as `:authority`, not as a Host field.
    if env.get(environ::HTTP_HOST).is_none() {
        if let Some(authority) = parts.uri.authority() {
            env.insert(environ::HTTP_HOST, authority.as_str());
        }
    }

    env.input(Cursor::new(body))
}

/// Converts the app's status line and headers into a hyper response.
fn to_http(status: &str, headers: &[(String, String)], body: Bytes) -> http::Response<Full<Bytes>> {
    let code = status
        .split_once(' ')
        .map_or(status, |(code, _)| code)
        .parse::<u16>()
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut resp = http::Response::new(Full::new(body));
    *resp.status_mut() = code;
    for (name, value) in headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                resp.headers_mut().append(name, value);
            }
            _ => warn!(name = %name, "dropping header that is not valid HTTP"),
        }
    }
    resp
}

fn bare(code: StatusCode) -> http::Response<Full<Bytes>> {
    let mut resp = http::Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = code;
    resp
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C). Only Ctrl-C exists on
/// non-Unix platforms.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environ_from_parts() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/greet/Daniel%20L/?a=1")
            .header("x-requested-with", "XMLHttpRequest")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("accept", "text/html")
            .header("accept", "application/json")
            .body(())
            .unwrap();
        let (parts, ()) = req.into_parts();
        let env = to_environ(&parts, Bytes::from_static(b"a=1"), "127.0.0.1:8000".parse().unwrap());

        assert_eq!(env.get(environ::REQUEST_METHOD), Some("POST"));
        assert_eq!(env.get(environ::PATH_INFO), Some("/greet/Daniel L/"));
        assert_eq!(env.get(environ::QUERY_STRING), Some("a=1"));
        assert_eq!(env.get(environ::CONTENT_LENGTH), Some("3"));
        assert_eq!(env.get(environ::CONTENT_TYPE), Some("application/x-www-form-urlencoded"));
        assert_eq!(env.get("HTTP_X_REQUESTED_WITH"), Some("XMLHttpRequest"));
        assert_eq!(env.get("HTTP_ACCEPT"), Some("text/html, application/json"));
        assert_eq!(env.get(environ::SERVER_PORT), Some("8000"));
    }

    #[test]
    fn authority_stands_in_for_missing_host() {
        let req = http::Request::builder()
            .version(http::Version::HTTP_2)
            .uri("http://example.com:8443/greet/?a=1")
            .body(())
            .unwrap();
        let (parts, ()) = req.into_parts();
        let env = to_environ(&parts, Bytes::new(), "[::1]:8000".parse().unwrap());

        assert_eq!(env.get(environ::HTTP_HOST), Some("example.com:8443"));
        assert_eq!(env.get(environ::PATH_INFO), Some("/greet/"));
        assert_eq!(env.request_uri(), "http://example.com:8443/greet/?a=1");
    }

    #[test]
    fn ipv6_bind_without_host_keeps_a_valid_uri() {
        let req = http::Request::builder()
            .version(http::Version::HTTP_10)
            .uri("/")
            .body(())
            .unwrap();
        let (parts, ()) = req.into_parts();
        let env = to_environ(&parts, Bytes::new(), "[::1]:8000".parse().unwrap());

        assert_eq!(env.get(environ::HTTP_HOST), None);
        assert_eq!(env.get(environ::SERVER_NAME), Some("::1"));
        assert_eq!(env.request_uri(), "http://[::1]:8000/");
    }

    #[test]
    fn http_response_from_head() {
        let resp = to_http(
            "201 Created",
            &[
                ("Content-Type".to_owned(), "text/plain".to_owned()),
                ("Set-Cookie".to_owned(), "a=1; Path=/".to_owned()),
                ("Set-Cookie".to_owned(), "b=2; Path=/".to_owned()),
            ],
            Bytes::from_static(b"done"),
        );
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers().get_all("set-cookie").iter().count(), 2);
        assert_eq!(resp.headers()["content-type"], "text/plain");
    }
}
