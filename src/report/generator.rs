use crate::domain::{format_seconds, order_course_keys, Task};
use crate::persistence::{atomic_write, Settings};
use crate::report::stats::{
    calculate_course_stats, course_totals, cumulative_by_day, grand_total, time_by_weekday,
    top_tasks_by_time,
};
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// What the analytics report covers
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Courses to analyse. Empty means all.
    pub courses: Vec<String>,
    /// How many tasks to list under "Top tasks"
    pub top: usize,
    /// Whether archived courses appear in "Time by class"
    pub include_archived: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            courses: Vec::new(),
            top: 5,
            include_archived: false,
        }
    }
}

/// Format hours with 2 decimal places
fn format_hours(hours: f64) -> String {
    format!("{:.2}h", hours)
}

/// Render the markdown analytics report
pub fn render_report<Tz: TimeZone>(
    tasks: &[Task],
    settings: &Settings,
    options: &ReportOptions,
    now: DateTime<Utc>,
    tz: &Tz,
) -> String {
    let report_date = now.with_timezone(tz).date_naive();
    let mut totals =
        course_totals(tasks, &settings.hidden_courses, options.include_archived, now);
    if !options.courses.is_empty() {
        totals.retain(|course, _| options.courses.contains(course));
    }
    let course_stats = calculate_course_stats(tasks);

    let mut report = String::new();

    report.push_str(&format!("# Time Report - {}\n\n", report_date));

    if !options.courses.is_empty() {
        report.push_str(&format!("Courses: {}\n\n", options.courses.join(", ")));
    }

    // Time by class
    report.push_str("## Time by Class\n\n");
    if totals.is_empty() {
        report.push_str("No time tracked yet\n\n");
    } else {
        report.push_str("| Class | Time | Tasks | Done | Sessions |\n");
        report.push_str("|-------|------|-------|------|----------|\n");
        for course in order_course_keys(totals.keys().cloned()) {
            let stats = course_stats.get(&course).cloned().unwrap_or_default();
            report.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                course,
                format_seconds(totals[&course]),
                stats.task_count,
                stats.done_count,
                stats.session_count
            ));
        }
        report.push_str(&format!("\n**Total:** {}\n\n", format_seconds(grand_total(&totals))));
    }

    // Cumulative hours
    let series = cumulative_by_day(tasks, &options.courses, tz);
    report.push_str("## Cumulative Hours\n\n");
    if series.is_empty() {
        report.push_str("No finished sessions\n\n");
    } else {
        for (day, hours) in &series {
            report.push_str(&format!("- {}: {}\n", day, format_hours(*hours)));
        }
        report.push('\n');
    }

    // Top tasks
    let top = top_tasks_by_time(tasks, &options.courses, options.top, now);
    report.push_str(&format!("## Top {} Tasks by Time\n\n", options.top));
    if top.is_empty() {
        report.push_str("No tasks\n\n");
    } else {
        for (i, (title, minutes)) in top.iter().enumerate() {
            report.push_str(&format!("{}. {} ({:.1} min)\n", i + 1, title, minutes));
        }
        report.push('\n');
    }

    // Weekday breakdown
    report.push_str("## Time by Weekday\n\n");
    for (label, hours) in time_by_weekday(tasks, &options.courses, tz) {
        report.push_str(&format!("- {}: {}\n", label, format_hours(hours)));
    }

    report
}

/// Default report location inside the data directory
pub fn default_report_path<Tz: TimeZone>(data_dir: &Path, now: DateTime<Utc>, tz: &Tz) -> PathBuf {
    let date = now.with_timezone(tz).date_naive();
    data_dir.join(format!("report-{}.md", date.format("%Y-%m-%d")))
}

/// Write a rendered report atomically
pub fn write_report(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content)?;
    info!(path = %path.display(), "report written");
    Ok(())
}
