//! vaultkeeper CLI
//!
//! The administrative entry point: the one binary in the workspace that
//! initializes logging, and the only place a human drives the Task
//! Orchestrator, Scraping Worker, and Change Notification Fabric
//! directly rather than through a long-running service.

mod cli_types;
mod commands;
mod error;

use std::fs;
use std::io::Write;
use std::sync::Mutex;

use clap::Parser;
use log::LevelFilter;
use vaultkeeper_core::VaultConfig;

use cli_types::{Cli, Commands, ConfigAction, TaskAction};

struct CliLogger {
    level: LevelFilter,
    logfile: Option<Mutex<fs::File>>,
}

impl log::Log for CliLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = record.args().to_string();
        if record.level() <= log::Level::Warn {
            eprintln!("{msg}");
        } else {
            println!("{msg}");
        }

        if let Some(ref file) = self.logfile {
            let stripped = strip_ansi_escapes::strip(&msg);
            let text = String::from_utf8_lossy(&stripped);
            let mut guard = file.lock().unwrap();
            let _ = writeln!(guard, "{text}");
        }
    }

    fn flush(&self) {
        if let Some(ref file) = self.logfile {
            let _ = std::io::Write::flush(&mut *file.lock().unwrap());
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        LevelFilter::Warn
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let logfile = cli.logfile.as_ref().map(|p| {
        let file = fs::File::create(p).unwrap_or_else(|e| {
            eprintln!("could not create logfile {}: {e}", p.display());
            std::process::exit(1);
        });
        Mutex::new(file)
    });
    log::set_boxed_logger(Box::new(CliLogger { level, logfile })).expect("logger already set");
    log::set_max_level(level);

    let config_path = cli.config.clone().unwrap_or_else(vaultkeeper_core::config::config_path);
    let config = match VaultConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    let result = runtime.block_on(dispatch(cli.command, &config));
    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands, config: &VaultConfig) -> Result<(), error::CliError> {
    match command {
        Commands::Scrape { system, corpus, only, review_partial, overwrite_text_fields, selected_fields } => {
            commands::scrape::run_scrape(config, system, corpus, only, review_partial, overwrite_text_fields, selected_fields).await
        }
        Commands::Task { action } => match action {
            TaskAction::List => commands::task::run_list(config).await,
            TaskAction::Show { id } => commands::task::run_show(config, id).await,
            TaskAction::Stop { id } => commands::task::run_stop(config, id).await,
        },
        Commands::Reconcile { system } => commands::reconcile::run_reconcile(config, system).await,
        Commands::Diff { before, after } => commands::reconcile::run_diff(&before, &after).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::run_show(config),
            ConfigAction::Setup => commands::config::run_setup(),
            ConfigAction::Path => commands::config::run_path(),
        },
    }
}
