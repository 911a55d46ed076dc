use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mcpack::cli::{Cli, Command};
use mcpack::commands::{self, App};
use mcpack::core::error::{PackError, PackResult};
use mcpack::core::http;

async fn run(cli: Cli) -> PackResult<()> {
    let dir = std::env::current_dir()?;

    // version/loaders only touch the manifest; no API key needed.
    match &cli.command {
        Command::Version { value } => return commands::version(&dir, value.as_deref()),
        Command::Loaders { names } => return commands::loaders(&dir, names),
        _ => {}
    }

    let api_key = http::api_key_from_env()?;
    let app = App::new(&api_key, dir)?;

    match cli.command {
        Command::Add { content_type, name } => commands::add(&app, content_type, &name).await,
        Command::Remove { name } => commands::remove(&app, &name).await,
        Command::List => commands::list(&app).await,
        Command::Update {
            client,
            server,
            skip_version,
        } => commands::update(&app, client, server, skip_version.as_deref()).await,
        Command::Commonver { skip_version } => {
            commands::commonver(&app, skip_version.as_deref()).await
        }
        Command::Import { file } => commands::import(&app, &file).await,
        Command::Export { file } => commands::export(&app, &file).await,
        Command::Version { .. } | Command::Loaders { .. } => unreachable!(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .without_time()
        .init();

    let cli = Cli::parse();

    let result = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => Err(PackError::Interrupted),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(PackError::Interrupted) => {
            // No stack trace on user cancellation.
            eprintln!();
            ExitCode::from(130)
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
