use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;

use crate::board::TaskBoard;
use crate::board_ui::{ExportTarget, TerminalConfirm, banner_text};
use crate::config::Configuration;
use crate::confirm::{Confirm, StdinConfirm};
use crate::content_parser::parse_entry;
use crate::export::{DateFormats, ExportFormat, exporter_for, write_rows};
use crate::logging::Sink;
use crate::storage::{KeyValueStore, SqliteStore};
use crate::task::{Status, TaskId};

mod board;
mod board_ui;
mod config;
mod confirm;
mod content_parser;
mod editor;
mod export;
mod logging;
mod storage;
mod task;

/// A task board for the terminal. Without a command, opens the board.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cmd {
    /// Config file to use instead of the one in the user config dir.
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    commands: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task. A leading `[YYYY-MM-DD]` in the text sets the due date.
    Add {
        #[arg(short, long, value_name = "DATE", value_parser = content_parser::parse_due)]
        due: Option<NaiveDate>,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Show tasks grouped by status.
    List {
        #[arg(short, long)]
        status: Option<Status>,
    },
    /// Move a task back to pending.
    Pending { id: String },
    /// Start working on a task.
    Start { id: String },
    /// Mark a task as completed.
    Complete {
        id: String,
        /// Don't ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },
    /// Toggle a task's highlight.
    Highlight { id: String },
    /// Change a task's text. Opens the configured editor without --text.
    Edit {
        id: String,
        #[arg(short, long)]
        text: Option<String>,
    },
    /// Delete a task.
    Delete { id: String },
    /// Delete every task.
    Clear,
    /// Toggle your availability.
    Available,
    /// Write all tasks to a spreadsheet.
    Export {
        #[arg(short, long)]
        format: Option<ExportFormat>,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn export_target(
    cfg: &Configuration,
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
) -> ExportTarget {
    ExportTarget {
        format: format.unwrap_or(cfg.export.format),
        sheet_name: cfg.export.sheet_name.clone(),
        path: output.unwrap_or_else(|| cfg.export.file_name.clone()),
    }
}

fn lookup<S: KeyValueStore, C: Confirm>(board: &TaskBoard<S, C>, prefix: &str) -> Option<TaskId> {
    let id = board.resolve(prefix);
    if id.is_none() {
        eprintln!("No single task matches `{prefix}`.");
    }
    id
}

async fn move_task<S: KeyValueStore, C: Confirm>(
    board: &mut TaskBoard<S, C>,
    prefix: &str,
    status: Status,
) {
    let Some(id) = lookup(board, prefix) else {
        return;
    };
    if board.set_status(id, status).await {
        println!("Moved {} to {status}.", id.short());
    } else {
        println!("Left {} as it was.", id.short());
    }
}

async fn edit<S: KeyValueStore, C: Confirm>(
    board: &mut TaskBoard<S, C>,
    cfg: &Configuration,
    prefix: &str,
    text: Option<String>,
) -> Result<()> {
    let Some(id) = lookup(board, prefix) else {
        return Ok(());
    };
    board.start_edit(id);
    let draft = match text {
        Some(text) => text,
        None => {
            let current = board.draft(id).unwrap_or_default().to_string();
            match editor::open_task_editor(&cfg.taskboard.editor, &current).await {
                Ok(text) => text,
                Err(e) => {
                    board.cancel_edit(id);
                    return Err(e.into());
                }
            }
        }
    };
    board.change_draft(id, draft);
    board.save_edit(id).await;
    if let Some(task) = board.task(id) {
        println!("{}  {}", id.short(), task.text);
    }
    Ok(())
}

fn print_board<S: KeyValueStore, C: Confirm>(
    board: &TaskBoard<S, C>,
    only: Option<Status>,
    formats: &DateFormats,
) {
    if board.is_available() {
        println!("You are available");
    } else {
        println!("You are not available");
    }
    if let Some(banner) = banner_text(board.overdue_count()) {
        println!("{banner}");
    }

    let now = Utc::now();
    for (status, tasks) in board.sections().iter() {
        if only.is_some_and(|s| s != status) {
            continue;
        }
        println!("\n{} ({})", status.label(), tasks.len());
        for task in tasks {
            let mut line = format!("  {}  {}", task.id.short(), task.text);
            if let Some(due) = task.due {
                line.push_str(&format!("  [due {}]", due.format(&formats.date)));
            }
            if task.is_overdue_at(now) {
                line.push_str("  [overdue]");
            }
            if task.highlighted {
                line.push_str("  [highlighted]");
            }
            println!("{line}");
        }
    }
}

async fn run_command<S: KeyValueStore, C: Confirm>(
    board: &mut TaskBoard<S, C>,
    command: Commands,
    cfg: &Configuration,
    formats: &DateFormats,
) -> Result<()> {
    match command {
        Commands::Add { due, text } => {
            let entry = parse_entry(&text.join(" "));
            match board.add_task(&entry.text, due.or(entry.due)).await {
                Some(id) => println!("Added {}.", id.short()),
                None => eprintln!("Nothing to add, the task text is empty."),
            }
        }
        Commands::List { status } => print_board(board, status, formats),
        Commands::Pending { id } => move_task(board, &id, Status::Pending).await,
        Commands::Start { id } => move_task(board, &id, Status::InProgress).await,
        Commands::Complete { id, .. } => move_task(board, &id, Status::Completed).await,
        Commands::Highlight { id } => {
            if let Some(id) = lookup(board, &id) {
                board.toggle_highlight(id).await;
                let on = board.task(id).is_some_and(|t| t.highlighted);
                println!("{} {}.", id.short(), if on { "highlighted" } else { "unhighlighted" });
            }
        }
        Commands::Edit { id, text } => edit(board, cfg, &id, text).await?,
        Commands::Delete { id } => {
            if let Some(id) = lookup(board, &id) {
                board.delete_task(id).await;
                println!("Deleted {}.", id.short());
            }
        }
        Commands::Clear => {
            board.clear_all().await;
            println!("Cleared all tasks.");
        }
        Commands::Available => {
            if board.toggle_availability().await {
                println!("You are available");
            } else {
                println!("You are not available");
            }
        }
        Commands::Export { format, output } => {
            let target = export_target(cfg, format, output);
            let rows = board.export_rows(formats);
            let exporter = exporter_for(target.format, &target.sheet_name);
            let path = write_rows(exporter.as_ref(), &rows, &target.path)?;
            println!("Exported {} tasks to {}.", rows.len(), path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cmds = Cmd::parse();
    let cfg = Configuration::load(cmds.config.as_deref())?;
    let formats = cfg.date_formats()?;
    let sink = if cmds.commands.is_none() {
        Sink::File
    } else {
        Sink::Stderr
    };
    logging::init(&cfg, sink)?;

    let db_path = cfg.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteStore::open(&db_path).await?;

    match cmds.commands {
        None => {
            let board = TaskBoard::load(store, TerminalConfirm).await;
            board_ui::run(board, formats, export_target(&cfg, None, None)).await
        }
        Some(command) => {
            let assume_yes = matches!(command, Commands::Complete { yes: true, .. });
            let mut board = TaskBoard::load(store, StdinConfirm { assume_yes }).await;
            run_command(&mut board, command, &cfg, &formats).await?;
            match board.persist_error() {
                Some(e) => Err(eyre!("changes were not saved: {e}")),
                None => Ok(()),
            }
        }
    }
}
