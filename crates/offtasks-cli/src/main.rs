use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use offtasks_core::app::{App, AppBuilder, GroupingReport};
use offtasks_core::domain::{
    BoardSnapshot, ErrorKind, NewTask, OfftasksError, Priority, Task, TaskGroup, TaskId,
    TaskPatch, UserId, format_date, visible_tasks,
};
use offtasks_core::impls::{InMemoryBackend, PostgrestBackend, SchemaVariant};
use offtasks_core::ports::{Clock, StaticSession, SystemClock};
use offtasks_core::{ConfigError, OfftasksConfig};

#[derive(Parser, Debug)]
#[command(name = "offtasks", version, about = "Offtasks board from the terminal")]
struct Cli {
    /// TOML config file. OFFTASKS_* variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use an in-memory backend seeded with sample tasks.
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the board (runs the grouping pass first).
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        hide_completed: bool,
    },
    Add {
        content: String,
        #[arg(long, default_value = "today")]
        group: TaskGroup,
        /// 0 (none) to 3 (high).
        #[arg(long, default_value = "0", value_parser = parse_priority)]
        priority: Priority,
        #[arg(long)]
        label: Option<String>,
        /// YYYY-MM-DD. Defaults per group.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Done {
        id: String,
    },
    Restore {
        id: String,
    },
    Move {
        id: String,
        group: TaskGroup,
    },
    Edit {
        id: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,
        /// Empty string clears the label.
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    #[command(alias = "delete")]
    Rm {
        id: String,
    },
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Run one grouping pass and report each move.
    Regroup,
    /// Reload on every change until Ctrl-C.
    Watch {
        #[arg(long)]
        hide_completed: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let kind = err
                .downcast_ref::<OfftasksError>()
                .map(OfftasksError::kind)
                .or_else(|| err.downcast_ref::<ConfigError>().map(|_| ErrorKind::Config));
            if let Some(hint) = kind.and_then(hint_for) {
                eprintln!("hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

fn hint_for(kind: ErrorKind) -> Option<&'static str> {
    match kind {
        ErrorKind::Session => {
            Some("set OFFTASKS_USER_ID (or user_id in the config file), or try --demo")
        }
        ErrorKind::Auth => Some("the access token was rejected; refresh OFFTASKS_ACCESS_TOKEN"),
        ErrorKind::Schema => Some("the task table lacks a column this client needs"),
        ErrorKind::Config => Some("check --config and the OFFTASKS_* variables"),
        ErrorKind::Backend | ErrorKind::Invalid => None,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let app = if cli.demo {
        demo_app().await?
    } else {
        remote_app(cli.config.as_deref())?
    };
    let board = app.board();

    match cli.command {
        Commands::List { hide_completed } => {
            let load = board.load().await?;
            print_board(&load.snapshot, hide_completed, board.clock().today());
        }
        Commands::Add {
            content,
            group,
            priority,
            label,
            date,
        } => {
            let mut task = NewTask::new(content, group).with_priority(priority);
            if let Some(label) = label {
                task = task.with_label(label);
            }
            if let Some(date) = date {
                task = task.with_date(date);
            }
            board.create_task(task).await?;
            println!("added to {group}");
        }
        Commands::Done { id } => {
            board.set_completed(&TaskId::new(id.clone()), true).await?;
            println!("completed {id}");
        }
        Commands::Restore { id } => {
            board.restore(&TaskId::new(id.clone())).await?;
            println!("restored {id}");
        }
        Commands::Move { id, group } => {
            board.move_task(&TaskId::new(id.clone()), group).await?;
            println!("moved {id} to {group}");
        }
        Commands::Edit {
            id,
            content,
            priority,
            label,
            date,
        } => {
            let patch = TaskPatch {
                content,
                priority,
                label: label.map(|l| Some(l).filter(|l| !l.trim().is_empty())),
                date: date.map(format_date),
                ..TaskPatch::default()
            };
            if patch.is_empty() {
                bail!("nothing to edit; pass --content, --priority, --label or --date");
            }
            board.edit_task(&TaskId::new(id.clone()), patch).await?;
            println!("updated {id}");
        }
        Commands::Rm { id } => {
            board.delete_task(&TaskId::new(id.clone())).await?;
            println!("deleted {id}");
        }
        Commands::Stats { json } => {
            let stats = board.stats().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!(
                    "total {}  completed {} ({:.0}%)  overdue {}",
                    stats.total,
                    stats.completed,
                    stats.completion_rate() * 100.0,
                    stats.overdue
                );
                println!(
                    "today {}  tomorrow {}  upcoming {}  close {}",
                    stats.today, stats.tomorrow, stats.upcoming, stats.closed
                );
                for priority in [Priority::High, Priority::Medium, Priority::Low, Priority::None] {
                    println!("  {priority}: {}", stats.count_for(priority));
                }
            }
        }
        Commands::Regroup => {
            let load = board.load().await?;
            print_grouping(&load.grouping);
        }
        Commands::Watch { hide_completed } => watch(&app, hide_completed).await?,
    }

    Ok(())
}

/// Out-of-range priorities are rejected here, not clamped.
fn parse_priority(raw: &str) -> Result<Priority, String> {
    let value: u8 = raw
        .trim()
        .parse()
        .map_err(|_| format!("priority must be 0..=3, got {raw}"))?;
    Priority::try_from(value)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("OFFTASKS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn remote_app(config_path: Option<&std::path::Path>) -> Result<App> {
    let config = match config_path {
        Some(path) => OfftasksConfig::load(path)?,
        None => OfftasksConfig::default(),
    }
    .merge_env()?;
    config.validate()?;

    let backend = Arc::new(
        PostgrestBackend::from_config(&config).context("cannot reach the backend without config")?,
    );
    let session = match config.user_id.as_deref() {
        Some(user) => StaticSession::signed_in(UserId::new(user)),
        None => StaticSession::signed_out(),
    };

    Ok(AppBuilder::new()
        .backend(backend)
        .session(Arc::new(session))
        .policy(config.fallback_policy())
        .build()?)
}

/// In-memory board on the snake_case schema, so the column probes and the
/// write fallbacks have something to do.
async fn demo_app() -> Result<App> {
    let backend = Arc::new(InMemoryBackend::new(SchemaVariant::snake_case()));
    let owner = UserId::new("demo");
    let clock = SystemClock;
    let today = clock.today();
    let yesterday = clock.yesterday();

    backend
        .seed_task(&owner, "Water the plants", TaskGroup::Today, &format_date(today))
        .await;
    let stale = backend
        .seed_task(&owner, "Send invoice", TaskGroup::Today, &format_date(yesterday))
        .await;
    backend.set_completed(&stale, true).await;
    backend
        .seed_task(&owner, "Call the dentist", TaskGroup::Tomorrow, &format_date(yesterday))
        .await;
    let shipped = backend
        .seed_task(
            &owner,
            "Ship release notes",
            TaskGroup::Upcoming,
            &format_date(TaskGroup::Upcoming.default_date(today)),
        )
        .await;
    backend.set_completed(&shipped, true).await;

    let app = AppBuilder::new()
        .backend(backend.clone())
        .session(Arc::new(StaticSession::signed_in(owner)))
        .clock(Arc::new(clock))
        .change_feed(backend)
        .build()?;

    // ラベル付きの作成は category 列へのフォールバックを通る
    app.board()
        .create_task(
            NewTask::new("Plan the week", TaskGroup::Upcoming)
                .with_priority(Priority::High)
                .with_label("Work"),
        )
        .await?;
    info!("demo board seeded");
    Ok(app)
}

async fn watch(app: &App, hide_completed: bool) -> Result<()> {
    let Some(sync) = app.spawn_sync() else {
        bail!("this backend has no change feed; use --demo or poll with `list`");
    };
    let today = app.board().clock().today();
    let mut snapshots = sync.snapshots();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    print_board(&snapshot, hide_completed, today);
                }
            }
        }
    }

    sync.shutdown_and_join().await;
    Ok(())
}

fn print_board(snapshot: &BoardSnapshot, hide_completed: bool, today: NaiveDate) {
    let snapshot = snapshot.clone().sorted();
    for group in TaskGroup::ALL {
        let tasks = visible_tasks(snapshot.bucket(group), hide_completed);
        println!("== {group} ({})", tasks.len());
        for task in tasks {
            println!("  {}", task_line(task, today));
        }
    }
}

fn task_line(task: &Task, today: NaiveDate) -> String {
    let mark = if task.completed { "x" } else { " " };
    let mut line = format!("[{mark}] {}  {}", task.id, task.content);
    if task.priority != Priority::None {
        line.push_str(&format!("  !{}", task.priority));
    }
    if let Some(label) = &task.label {
        line.push_str(&format!("  #{label}"));
    }
    line.push_str(&format!("  {}", task.date));
    if task.is_overdue(today) {
        line.push_str("  (overdue)");
    }
    line
}

fn print_grouping(report: &GroupingReport) {
    if report.outcomes.is_empty() {
        println!("nothing to regroup");
        return;
    }
    for outcome in &report.outcomes {
        let planned = &outcome.planned;
        match &outcome.result {
            Ok(()) => println!(
                "moved {} {} -> {} ({})",
                planned.task_id, planned.from, planned.to, planned.rule
            ),
            Err(err) => println!(
                "failed {} {} -> {} ({}): {err}",
                planned.task_id, planned.from, planned.to, planned.rule
            ),
        }
    }
    println!("{} applied, {} failed", report.applied(), report.failed().count());
}
