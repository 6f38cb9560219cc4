use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::settings::Settings;

mod app;
mod auth;
mod credentials;
mod error;
mod presenter;
mod redirect;
mod settings;
#[cfg(test)]
mod test_support;
mod todo;
mod transport;

/// Logs go to stderr so they never interleave with the listing on stdout.
fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let settings = Settings::parse();
    init_tracing(&settings);

    info!(version = env!("CARGO_PKG_VERSION"), "gtasks starting");

    match app::run(&settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(kind = ?err.kind(), error = ?err, "run failed");
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
