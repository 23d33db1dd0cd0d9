use clap::Parser;
use spike_gateway::app::App;
use spike_gateway::cli::Args;
use spike_gateway::config::Config;
use spike_gateway::logging::setup_logging;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Config comes first so logging is set up before anything else can log.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting spike-gateway"
    );

    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = ?e, "failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    app.run().await
}
