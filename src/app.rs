use crate::backend::BackendApi;
use crate::config::Config;
use crate::state::{AppState, StateOptions};
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
}

impl App {
    /// Build the backend client and shared state from a loaded config.
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let backend = BackendApi::new(
            &config.backend_url,
            config.upstream_timeout,
            config.generation_timeout,
        )
        .context("Failed to create backend client")?;

        info!(
            backend_url = %config.backend_url,
            upstream_timeout = fmt_duration(config.upstream_timeout),
            generation_timeout = fmt_duration(config.generation_timeout),
            request_timeout = fmt_duration(config.request_timeout),
            subscription_gate = config.subscription_gate,
            "backend client configured"
        );
        info!(
            "session, profile and generation state is per process; \
             replicas do not share caches or generation guards"
        );

        let app_state = AppState::new(Arc::new(backend), StateOptions::from(&config));
        Ok(App { config, app_state })
    }

    /// Serve until a shutdown signal, then give in-flight requests
    /// `shutdown_timeout` to finish.
    pub async fn run(self) -> ExitCode {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = ?e, %addr, "failed to bind listener");
                return ExitCode::FAILURE;
            }
        };
        info!(%addr, "listening");

        let router = create_router(self.app_state, self.config.request_timeout);
        let draining = Arc::new(Notify::new());
        let signalled = {
            let draining = draining.clone();
            async move {
                shutdown_signal().await;
                draining.notify_one();
            }
        };

        let server = axum::serve(listener, router)
            .with_graceful_shutdown(signalled)
            .into_future();
        let shutdown_timeout = self.config.shutdown_timeout;
        let deadline = async {
            draining.notified().await;
            info!(
                timeout = fmt_duration(shutdown_timeout),
                "draining in-flight requests"
            );
            tokio::time::sleep(shutdown_timeout).await;
        };

        tokio::select! {
            result = server => match result {
                Ok(()) => {
                    info!("shutdown complete");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!(error = ?e, "server error");
                    ExitCode::FAILURE
                }
            },
            () = deadline => {
                warn!(
                    timeout = fmt_duration(shutdown_timeout),
                    "in-flight requests did not finish before the shutdown timeout"
                );
                ExitCode::FAILURE
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = ?e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received SIGTERM, shutting down");
            }
            Err(e) => {
                error!(error = ?e, "failed to install SIGTERM handler");
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
