use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use http::{HeaderMap, StatusCode, header};
use identity::router::{create_router, generate_openapi_spec};
use identity::service::RelayService;
use shared::error::CommonError;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";
pub const QUIT_PATH: &str = "/quitquitquit";
pub const UI_PATH: &str = "/ui";

pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

pub struct ServeParams {
    pub listen: SocketAddr,
    pub ui_dir: PathBuf,
    pub tls: Option<TlsFiles>,
    pub close_after: Duration,
    pub kill_after: Duration,
    pub service: RelayService,
}

/// Logs every request to the relay's own endpoints.
async fn log_request(request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();
    let host = header_string(request.headers(), header::HOST);
    let agent = header_string(request.headers(), header::USER_AGENT);
    info!(
        host = %host,
        method = %request.method(),
        uri = %request.uri(),
        agent = %agent,
        addr = %peer,
        "request"
    );
    next.run(request).await
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn route_openapi() -> impl IntoResponse {
    Json(generate_openapi_spec())
}

async fn route_quit(State(shutdown_tx): State<broadcast::Sender<()>>) -> StatusCode {
    info!("shutdown requested over HTTP");
    // No receivers only means shutdown is already under way.
    let _ = shutdown_tx.send(());
    StatusCode::OK
}

/// Assembles the complete HTTP surface of the relay.
pub fn initiate_router(
    service: RelayService,
    ui_dir: &Path,
    shutdown_tx: broadcast::Sender<()>,
) -> Router {
    let (relay_router, _) = create_router().split_for_parts();
    let relay_router = relay_router.with_state(service);

    let quit_router = Router::new()
        .route(QUIT_PATH, get(route_quit))
        .with_state(shutdown_tx);

    Router::new()
        .merge(relay_router)
        .merge(quit_router)
        .route(OPENAPI_PATH, get(route_openapi))
        .layer(middleware::from_fn(log_request))
        .nest_service(UI_PATH, ServeDir::new(ui_dir))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn server_result(res: Result<std::io::Result<()>, tokio::task::JoinError>) -> Result<(), CommonError> {
    match res {
        Ok(res) => Ok(res?),
        Err(e) => Err(CommonError::Unknown(anyhow::Error::new(e))),
    }
}

/// Serves until SIGINT, SIGTERM or a request to the quit endpoint, then
/// drains in-flight requests for `close_after` and gives up after
/// `kill_after`.
pub async fn serve(params: ServeParams) -> Result<(), CommonError> {
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    let router = initiate_router(params.service, &params.ui_dir, shutdown_tx);
    let make_service = router.into_make_service_with_connect_info::<SocketAddr>();
    let handle = axum_server::Handle::new();

    let mut server: JoinHandle<std::io::Result<()>> = match params.tls {
        Some(tls) => {
            let config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            info!("Starting HTTPS server on {}", params.listen);
            tokio::spawn(
                axum_server::bind_rustls(params.listen, config)
                    .handle(handle.clone())
                    .serve(make_service),
            )
        }
        None => {
            info!("Starting HTTP server on {}", params.listen);
            tokio::spawn(
                axum_server::bind(params.listen)
                    .handle(handle.clone())
                    .serve(make_service),
            )
        }
    };

    tokio::select! {
        res = &mut server => return server_result(res),
        () = shutdown_signal() => info!("Received shutdown signal"),
        _ = shutdown_rx.recv() => {},
    }

    info!(
        close_after = ?params.close_after,
        "Shutting down server, waiting for in-flight requests to complete..."
    );
    handle.graceful_shutdown(Some(params.close_after));

    match tokio::time::timeout(params.kill_after, &mut server).await {
        Ok(res) => {
            server_result(res)?;
            info!("Server shut down gracefully");
            Ok(())
        }
        Err(_) => {
            warn!(kill_after = ?params.kill_after, "Server did not stop in time, exiting");
            server.abort();
            Ok(())
        }
    }
}
