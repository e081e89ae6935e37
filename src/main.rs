// src/main.rs
use anyhow::{Context, Result};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use tcp_watchdog::{
    config::{self, MetricsConfig},
    metrics::MetricsRegistry,
    monitor::{Monitor, ShutdownHandle},
    notify::EmailNotifier,
    probe::TcpProber,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tcp_watchdog=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "conf.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // Fail fast if alerts could never be delivered
    let notifier = EmailNotifier::new(&config.email).context("Invalid email configuration")?;
    notifier
        .verify()
        .await
        .context("Couldn't connect to smtp host")?;

    let mut monitor = Monitor::from_config(&config, Arc::new(TcpProber::new()), Arc::new(notifier));

    if config.metrics.enabled {
        let metrics_registry = MetricsRegistry::new()?;
        monitor = monitor.with_metrics(metrics_registry.collector());
        start_metrics_server(&config.metrics, metrics_registry).await?;
    }

    tokio::spawn(shutdown_signal(monitor.shutdown_handle()));

    monitor.run().await;
    Ok(())
}

async fn start_metrics_server(config: &MetricsConfig, registry: MetricsRegistry) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    let registry = Arc::new(registry);
    let service_path = Arc::new(config.path.clone());

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    let response = if req.uri().path() != path.as_str() {
                        text_response(StatusCode::NOT_FOUND, "Not Found")
                    } else {
                        match registry.gather() {
                            Ok(metrics) => {
                                let mut response = Response::new(Body::from(metrics));
                                response.headers_mut().insert(
                                    hyper::header::CONTENT_TYPE,
                                    hyper::header::HeaderValue::from_static(
                                        "text/plain; version=0.0.4",
                                    ),
                                );
                                response
                            }
                            Err(e) => {
                                error!("Failed to encode metrics: {}", e);
                                text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Error")
                            }
                        }
                    };
                    Ok::<_, Infallible>(response)
                }
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind metrics server on {}", addr))?
        .serve(make_service);

    info!("Metrics server listening on http://{}{}", addr, config.path);

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

// Graceful shutdown handler
async fn shutdown_signal(handle: ShutdownHandle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    handle.shutdown();
}
