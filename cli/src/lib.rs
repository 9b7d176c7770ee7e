pub mod args;
pub mod commands;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use captioner_core::{Config, Settings};

use crate::args::{Cli, Command};

/// Initialize tracing/logging with the given directives
pub fn init_logging(directives: &[&str]) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in directives {
        match directive.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Ignoring invalid log directive {:?}: {}", directive, e),
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve settings from the settings file and global CLI overrides
pub fn load_settings(cli: &Cli) -> Settings {
    let config = match &cli.settings {
        Some(path) => Config::with_settings_file(path),
        None => Config::load_or_default(),
    };
    tracing::debug!("Settings file: {:?}", config.settings_file);

    let mut settings = config.settings();
    if let Some(api_base) = &cli.api_base {
        settings.api_base = api_base.clone();
    }
    settings
}

/// Run one pipeline stage to completion
pub fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    match &cli.command {
        Command::Build(args) => {
            commands::build(args, &settings)?;
        }
        Command::Submit(args) => {
            rt.block_on(commands::submit(args, &settings))?;
        }
        Command::Retrieve(args) => {
            rt.block_on(async {
                let cancel = CancellationToken::new();
                let on_ctrl_c = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::info!("Ctrl+C received, stopping");
                        on_ctrl_c.cancel();
                    }
                });

                commands::retrieve(args, &settings, &cancel).await
            })?;
        }
    }

    Ok(())
}
