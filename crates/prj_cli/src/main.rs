//! Command-line entry point.
//!
//! # Responsibility
//! - Run kanban inspection and sync against a vault directory.
//! - Keep output deterministic for scripting and local checks.

use clap::{Parser, Subcommand};
use log::error;
use prj_core::{
    FileRef, FsVault, KanbanConfig, KanbanParser, KanbanSyncService, LogLevel, LoggingConfig,
    VaultServices, VaultTaskSource,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

#[derive(Debug, Parser)]
#[command(name = "prj", version, about = "Kanban and task note sync for a markdown vault")]
struct Cli {
    /// Vault root directory.
    #[arg(long)]
    vault: PathBuf,
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = LogLevel::for_build().to_string())]
    log_level: String,
    /// Write rolling log files here instead of stderr (absolute path).
    #[arg(long)]
    log_dir: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the lists and cards of a kanban document.
    Board { file: String },
    /// Push card statuses of a kanban document to its task notes.
    SyncOut { file: String },
    /// Move the cards of a changed task note on every board linking to it.
    TaskChanged { file: String },
    /// Print core health and version.
    Ping,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = match cli.log_dir.as_deref() {
        Some(dir) => LoggingConfig::files(&cli.log_level, dir),
        None => LoggingConfig::stderr(&cli.log_level),
    };
    if let Err(err) = logging.and_then(|config| prj_core::init_logging(&config)) {
        eprintln!("prj: {err}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={}", err);
            eprintln!("prj: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Command::Ping = cli.command {
        println!("prj_core ping={}", prj_core::ping());
        println!("prj_core version={}", prj_core::core_version());
        return Ok(());
    }

    let config = match cli.config.as_deref() {
        Some(path) => KanbanConfig::load(path)?,
        None => KanbanConfig::default(),
    };
    let vault = Rc::new(FsVault::open(&cli.vault)?);
    let tasks = Rc::new(VaultTaskSource::new(vault.clone(), vault.clone(), &config));
    let services = VaultServices::from_vault(vault, tasks, config);

    match cli.command {
        Command::Board { file } => print_board(services, FileRef::new(file)),
        Command::SyncOut { file } => {
            let outcome = KanbanSyncService::new(services).on_kanban_changed(&FileRef::new(file));
            println!("{outcome:?}");
            Ok(())
        }
        Command::TaskChanged { file } => {
            let outcomes =
                KanbanSyncService::new(services).on_task_file_changed(&FileRef::new(file));
            if outcomes.is_empty() {
                println!("no kanban boards to sync");
            }
            for (board, outcome) in outcomes {
                println!("{board}: {outcome:?}");
            }
            Ok(())
        }
        Command::Ping => Ok(()),
    }
}

fn print_board(services: VaultServices, file: FileRef) -> Result<(), Box<dyn std::error::Error>> {
    let board = KanbanParser::new(services, file.clone())
        .parse()
        .ok_or_else(|| format!("`{file}` is not a parsable kanban document"))?;

    for list in &board.lists {
        println!("## {} [{}]", list.title, list.status());
        for card in &list.items {
            let mark = if card.is_checked { 'x' } else { ' ' };
            match &card.linked_file {
                Some(linked) => println!("- [{mark}] {} -> {linked}", card.raw_content),
                None => println!("- [{mark}] {}", card.raw_content),
            }
        }
    }
    Ok(())
}
