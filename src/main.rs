//! Binary entrypoint for the `obsrelay` service.

use clap::Parser as _;

use obsrelay::{cli::Cli, inner_main};

// The relay is a handful of cooperating timers and socket loops; everything
// suspends on I/O, so a single-threaded runtime is all it needs.
#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    inner_main(Cli::parse()).await
}
