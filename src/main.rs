// src/main.rs

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, ConfigCommands};
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::New { name, description } => {
            let path = commands::create_package(&name, description.as_deref())?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Snap => {
            let store = commands::load_store()?;
            commands::create_snapshot(&store)
        }
        Commands::Diff {
            from,
            to,
            continue_,
            abort,
        } => {
            let store = commands::load_store()?;
            commands::run_diff(&store, from, to, continue_, abort)
        }
        Commands::Install {
            confirm,
            dry_run,
            continue_,
            abort,
        } => {
            let store = commands::load_store()?;
            commands::run_install(&store, confirm, dry_run, continue_, abort)
        }
        Commands::Uninstall {
            confirm,
            dry_run,
            continue_,
            abort,
        } => {
            let store = commands::load_store()?;
            commands::run_uninstall(&store, confirm, dry_run, continue_, abort)
        }
        Commands::LsFiles {
            from,
            to,
            only_ignored,
        } => {
            let store = commands::load_store()?;
            commands::ls_files(&store, from, to, only_ignored)
        }
        Commands::Shell { index } => {
            let store = commands::load_store()?;
            commands::shell(&store, index)
        }
        Commands::Config { command } => match command {
            ConfigCommands::Init {
                configs,
                file,
                package_dir,
            } => commands::config_init(&configs, &file, package_dir),
        },
        Commands::Dist => {
            let store = commands::load_store()?;
            commands::dist(&store)
        }
    }
}

/// Print a failure the way users need to see it: external-tool output in
/// full, everything else as a single formatted message.
fn report(err: &anyhow::Error) {
    if let Some(dfu::Error::ExternalCommand {
        command,
        stdout,
        stderr,
    }) = err.downcast_ref::<dfu::Error>()
    {
        eprintln!("error: command `{command}` failed");
        if !stdout.is_empty() {
            eprintln!("{stdout}");
        }
        if !stderr.is_empty() {
            eprintln!("{stderr}");
        }
        return;
    }
    eprintln!("error: {err:#}");
}
