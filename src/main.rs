use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;
use learnpath::backend::{Backend, BackendConfig, HttpBackend};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    learnpath::logging::init().context("init logging")?;

    let cli = learnpath::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let config = BackendConfig::from_env()
        .context("load backend config")?
        .with_overrides(cli.backend_url, cli.timeout_secs);
    let backend: Arc<dyn Backend> =
        Arc::new(HttpBackend::new(&config).context("create backend client")?);

    match cli.command {
        learnpath::cli::Command::Learn(args) => {
            learnpath::console::run_learn(backend, args)
                .await
                .context("learn")?;
        }
        learnpath::cli::Command::Interview(args) => {
            learnpath::console::run_interview(backend, args)
                .await
                .context("interview")?;
        }
        learnpath::cli::Command::Reset => {
            learnpath::console::run_reset(backend)
                .await
                .context("reset")?;
        }
    }

    Ok(())
}
