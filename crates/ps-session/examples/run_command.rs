//! Run one command on a remote PowerShell console.
//!
//! Connection settings come from an optional settings file and the
//! `PS_SESSION_*` environment variables; the password only from
//! `PS_SESSION_PASSWORD`.
//!
//! Run with:
//! `PS_SESSION_HOST=dc01 PS_SESSION_USERNAME=svc PS_SESSION_PASSWORD=... \
//!  cargo run --example run_command -- "Get-ADUser -Identity abij01"`
//!
//! Set `PS_SESSION_SETTINGS` to a TOML file to load settings from it first.
//! Logging is controlled by `RUST_LOG`.

use std::path::PathBuf;

use ps_session::backend::ssh::SshConnector;
use ps_session::config::{self, EnvConfig};
use ps_session::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let command = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if command.is_empty() {
        eprintln!("usage: run_command <powershell command>");
        std::process::exit(2);
    }

    let settings = std::env::var_os("PS_SESSION_SETTINGS").map(PathBuf::from);
    let config = config::load(settings.as_deref(), &EnvConfig::default())?;

    let executor = CommandExecutor::new(SshConnector::new(), config)?;
    let result = executor.execute(&command).await;
    executor.disconnect().await;

    match result {
        Ok(output) => {
            println!("{}", output.output());
            Ok(())
        }
        Err(ConsoleError::CommandFailed {
            command,
            diagnostic,
            ..
        }) => {
            eprintln!("{command} failed: {diagnostic}");
            std::process::exit(1);
        }
        Err(e) => Err(e),
    }
}
