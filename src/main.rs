mod app;
mod clock;
mod domain;
mod error;
mod logging;
mod persistence;
mod report;

use anyhow::{bail, Context, Result};
use app::{AppState, ViewOptions};
use chrono::Local;
use clap::{Parser, Subcommand};
use domain::{format_seconds, status_badge, SortDirection, StatusFilter, Task};
use persistence::{ensure_data_dir, get_data_dir, init_local_dir, link_for, normalize_target};
use report::{default_report_path, render_report, write_report, ReportOptions};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "classtime")]
#[command(about = "Coursework task tracker with per-task timers", long_about = None)]
struct Cli {
    /// Data directory. Defaults to $CLASSTIME_DIR, a local .classtime, or ~/.classtime
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a local .classtime directory in the current directory
    Init,
    /// Add a task
    Add {
        text: String,
        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: Option<String>,
        /// Course tag, e.g. 585
        #[arg(short, long)]
        course: Option<String>,
        /// Link to open for this task
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Edit a task. Omitted fields keep their value; pass "" to clear one.
    Edit {
        id: String,
        #[arg(short, long)]
        text: Option<String>,
        #[arg(short, long)]
        due: Option<String>,
        #[arg(short, long)]
        course: Option<String>,
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Show one task with its sessions
    Show { id: String },
    /// Toggle a task between done and not done
    Done { id: String },
    /// Delete a task
    Rm { id: String },
    /// Delete every completed task
    ClearDone,
    /// Start the timer on a task
    Start { id: String },
    /// Stop the timer on a task and record the session
    Stop { id: String },
    /// Clear all tracked time on a task
    Reset {
        id: String,
        /// Confirm clearing the time
        #[arg(long)]
        yes: bool,
    },
    /// Stop every running timer
    StopAll,
    /// List tasks
    List {
        #[arg(short, long, default_value = "active")]
        filter: StatusFilter,
        #[arg(short, long)]
        course: Option<String>,
        #[arg(long)]
        show_archived: bool,
        /// Latest due date first
        #[arg(long)]
        desc: bool,
        /// Group by course, whatever the display mode says
        #[arg(short, long)]
        group: bool,
    },
    /// List course tags in use
    Courses,
    /// Switch `list` between flat and grouped output
    DisplayMode,
    /// Show time per course
    Totals {
        #[arg(long)]
        include_archived: bool,
    },
    /// Hide a course from default views and totals
    Archive { course: String },
    /// Show an archived course again
    Unarchive { course: String },
    /// Show or set the link for a course. An empty URL removes it.
    Link { course: String, url: Option<String> },
    /// Write a markdown analytics report
    Report {
        /// Limit to these courses. Repeatable.
        #[arg(short, long)]
        course: Vec<String>,
        /// How many top tasks to list
        #[arg(long, default_value_t = 5)]
        top: usize,
        #[arg(long)]
        include_archived: bool,
        /// Output file path. Defaults to <data dir>/report-YYYY-MM-DD.md
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::enable_logging(cli.verbose);

    if let Commands::Init = cli.command {
        return init();
    }

    let data_dir = get_data_dir(cli.dir.as_deref())?;
    ensure_data_dir(&data_dir)?;
    info!(dir = %data_dir.display(), "using data directory");

    let mut app = AppState::open(&data_dir);
    print_warnings(&mut app);

    let ok = match cli.command {
        Commands::Init => return init(),
        Commands::Add {
            text,
            due,
            course,
            url,
        } => app
            .add(&text, due.as_deref(), course.as_deref(), url.as_deref())
            .is_some(),
        Commands::Edit {
            id,
            text,
            due,
            course,
            url,
        } => app.amend(
            &id,
            text.as_deref(),
            due.as_deref(),
            course.as_deref(),
            url.as_deref(),
        ),
        Commands::Done { id } => app.toggle_done(&id),
        Commands::Rm { id } => app.delete(&id),
        Commands::ClearDone => {
            app.clear_completed();
            true
        }
        Commands::Start { id } => app.start(&id),
        Commands::Stop { id } => app.stop(&id),
        Commands::Reset { id, yes } => {
            if !yes {
                bail!("Clearing time cannot be undone; rerun with --yes");
            }
            app.reset(&id)
        }
        Commands::StopAll => {
            app.shutdown();
            true
        }
        Commands::List {
            filter,
            course,
            show_archived,
            desc,
            group,
        } => {
            let view = ViewOptions {
                filter,
                course,
                show_archived,
                direction: if desc {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                },
            };
            print_list(&app, &view, group || app.settings.display_mode_flag);
            return Ok(());
        }
        Commands::Show { id } => {
            let uuid = app.store.resolve(&id)?;
            print_task(&app, uuid)?;
            return Ok(());
        }
        Commands::Courses => {
            for course in app.store.courses() {
                if app.settings.is_archived(&course) {
                    println!("{} (archived)", course);
                } else {
                    println!("{}", course);
                }
            }
            return Ok(());
        }
        Commands::DisplayMode => {
            let grouped = app.toggle_display_mode();
            print_warnings(&mut app);
            let mode = if grouped { "grouped" } else { "flat" };
            println!("list output is now {}", mode);
            return Ok(());
        }
        Commands::Totals { include_archived } => {
            let totals = app.course_totals(include_archived);
            if totals.is_empty() {
                println!("No time tracked yet");
            }
            for (course, secs) in &totals {
                println!("{:<14} {}", course, format_seconds(*secs));
            }
            let total = totals
                .iter()
                .fold(0u64, |sum, (_, secs)| sum.saturating_add(*secs));
            println!("{:<14} {}", "Total", format_seconds(total));
            return Ok(());
        }
        Commands::Archive { course } => app.archive_course(&course),
        Commands::Unarchive { course } => app.unarchive_course(&course),
        Commands::Link { course, url } => match url {
            Some(url) => {
                app.set_course_link(&course, &url);
                true
            }
            None => {
                match link_for(&app.links, &course).and_then(normalize_target) {
                    Some(target) => println!("{}", target),
                    None => println!("No link for {}", course.trim()),
                }
                return Ok(());
            }
        },
        Commands::Report {
            course,
            top,
            include_archived,
            output,
        } => {
            let now = app.store.now();
            let options = ReportOptions {
                courses: course,
                top,
                include_archived,
            };
            let content = render_report(app.store.tasks(), &app.settings, &options, now, &Local);
            let path = output.unwrap_or_else(|| default_report_path(&data_dir, now, &Local));
            write_report(&path, &content)?;
            println!("Report generated: {}", path.display());
            return Ok(());
        }
    };

    print_warnings(&mut app);
    if !ok {
        bail!("{}", app.status);
    }
    println!("{}", app.status);
    Ok(())
}

/// Initialize a local .classtime directory in the current directory
fn init() -> Result<()> {
    let cwd = std::env::current_dir().context("Could not determine current directory")?;
    let data_dir = init_local_dir(&cwd)?;
    println!("Initialized classtime directory: {}", data_dir.display());
    println!();
    println!("classtime will now use this local directory for task storage.");
    Ok(())
}

fn print_warnings(app: &mut AppState) {
    for warning in app.take_warnings() {
        eprintln!("warning: {}", warning);
    }
}

fn task_line(task: &Task, now: chrono::DateTime<chrono::Utc>) -> String {
    let mut line = format!("{}  {:<10} {}", task.short_id(), status_badge(task), task.text);
    if let Some(due) = task.due_label() {
        line.push_str(&format!("  (due {})", due));
    }
    let secs = task.total_seconds(now);
    if secs > 0 {
        line.push_str(&format!("  [{}]", format_seconds(secs)));
    }
    line
}

fn print_task(app: &AppState, id: uuid::Uuid) -> Result<()> {
    let task = app
        .task(id)
        .with_context(|| format!("No task with id {}", id))?;
    let total = app.store.total_seconds(id)?;

    println!("{}  {}", task.id, task.text);
    println!("  course:  {}", task.course_key());
    println!("  status:  {}", status_badge(task));
    if let Some(due) = task.due_label() {
        println!("  due:     {}", due);
    }
    if let Some(url) = task.url.as_deref().and_then(normalize_target) {
        println!("  link:    {}", url);
    }
    println!("  tracked: {} in {} session(s)", format_seconds(total), task.sessions.len());
    for session in &task.sessions {
        println!(
            "    {} -> {}  {}",
            session.start.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            session.end.with_timezone(&Local).format("%H:%M"),
            format_seconds(session.seconds)
        );
    }
    Ok(())
}

fn print_list(app: &AppState, view: &ViewOptions, grouped: bool) {
    let now = app.store.now();

    if grouped {
        for (course, tasks) in app.grouped_tasks(view) {
            println!("{}", course);
            for task in tasks {
                println!("  {}", task_line(task, now));
            }
        }
    } else {
        for task in app.visible_tasks(view) {
            println!("[{}] {}", task.course_key(), task_line(task, now));
        }
    }

    println!();
    println!("{}", app.summary(view));
}
