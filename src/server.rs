//! Read-only HTTP view of the session.
//!
//! `GET /` (or `/snapshot`) returns the current [`DashboardSnapshot`] as JSON,
//! `/health` answers `OK`. Every request loads the store on its own and never
//! holds anything the aggregator waits on.
//!
//! [`DashboardSnapshot`]: crate::snapshot::DashboardSnapshot

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::snapshot::SessionStore;

pub async fn bind(listen_addr: SocketAddr) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(listen_addr).await?;
    info!("Server is running at {}", listener.local_addr()?);
    Ok(listener)
}

pub async fn serve_listener(listener: TcpListener, store: Arc<SessionStore>) -> io::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let store = store.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let store = store.clone();
                async move { Ok::<_, Infallible>(handle_request(req.uri().path(), &store)) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                warn!("Dashboard connection error: {}", e);
            }
        });
    }
}

/// Serves on an already bound listener. The task only finishes on an accept error.
pub fn spawn(listener: TcpListener, store: Arc<SessionStore>) -> JoinHandle<io::Result<()>> {
    tokio::spawn(serve_listener(listener, store))
}

fn handle_request(path: &str, store: &SessionStore) -> Response<Full<Bytes>> {
    match path {
        "/" | "/snapshot" => match serde_json::to_vec(&store.snapshot()) {
            Ok(body) => respond(StatusCode::OK, "application/json", body),
            Err(e) => {
                warn!("could not serialize snapshot: {}", e);
                respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "Internal Server Error")
            }
        },
        "/health" | "/healthz" => respond(StatusCode::OK, "text/plain", "OK"),
        _ => respond(StatusCode::NOT_FOUND, "text/plain", "Not Found"),
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
