//! Library entry for the `obsrelay` crate.
//!
//! Exposes [`inner_main`] so the binary stays a thin shim, and re-exports the
//! downstream wire types for use in integration tests.

pub mod app;
pub mod cli;
pub mod config;
pub mod http;
pub mod obs;
pub mod protocol;
pub mod run;
pub mod websocket;

// for use in integration tests
pub use protocol::{ClientCommand, MediaStatus, SceneItem, ServerMessage};

use std::fs;
use std::sync::Once;

use eyre::{Result, WrapErr as _};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use cli::{Cli, Command, LogFormat};

static INIT_TRACING: Once = Once::new();

/// The relay's main function; can be called from a shim binary.
///
/// Parses CLI and dispatches server startup.
///
/// # Errors
///
/// Returns an error if the config cannot be resolved or the server fails to
/// start.
pub async fn inner_main(invocation: Cli) -> Result<()> {
    match invocation.command {
        Command::Serve(args) => {
            INIT_TRACING.call_once(|| {
                let builder = tracing_subscriber::fmt()
                    .with_env_filter(
                        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                    )
                    .with_timer(ChronoLocal::rfc_3339());

                match args.log_format {
                    LogFormat::Compact => builder.compact().init(),
                    LogFormat::Json => builder.json().init(),
                    LogFormat::Pretty => builder.pretty().init(),
                }
            });

            let config_path = fs::canonicalize(&args.config)
                .wrap_err(format!("Config file not found at: {}", args.config))?;

            info!("Using config path: {}", config_path.display());

            run::start(&config_path, args.port, args.bind.as_deref()).await
        }
    }
}
