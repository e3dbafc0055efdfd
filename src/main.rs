use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gitea_charm::cli::Cli;
use gitea_charm::{ops, settings};

fn main() -> ExitCode {
    // Juju captures stderr into the unit log; stdout is left for results.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GITEA_CHARM_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let settings = settings::load(Some(cli.settings.as_path()), std::env::vars())?;
    let outcome = ops::handle(cli.into_action(), &settings)?;
    println!("{outcome}");
    Ok(())
}
