pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod models;
pub mod services;
pub mod state;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
pub use config::Config;

pub async fn run(mut config: Config) -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Serve { port, env }) = &cli.command {
        if let Some(port) = port {
            config.server.port = *port;
        }
        if let Some(env) = env {
            config.server.env.clone_from(env);
        }
    }
    config.validate()?;

    init_tracing(&config);

    match cli.command {
        Some(Commands::InitConfig) => cli::cmd_init_config(),
        Some(Commands::Grant { email, codes }) => cli::cmd_grant(config, &email, &codes).await,
        Some(Commands::Serve { .. }) | None => {
            let prometheus_handle = if config.observability.metrics_enabled {
                use metrics_exporter_prometheus::PrometheusBuilder;
                let handle = PrometheusBuilder::new()
                    .install_recorder()
                    .context("Failed to install Prometheus recorder")?;
                info!("Prometheus metrics recorder initialized");
                Some(handle)
            } else {
                None
            };
            cli::cmd_serve(config, prometheus_handle).await
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let json = config.general.log_format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}
