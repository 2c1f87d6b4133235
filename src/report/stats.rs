use crate::domain::Task;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Weekday labels, Monday first
pub const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Per-course statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CourseStats {
    pub task_count: usize,
    pub done_count: usize,
    pub session_count: usize,
}

/// An empty selection means every course.
fn is_selected(task: &Task, courses: &[String]) -> bool {
    courses.is_empty() || courses.iter().any(|c| c == task.course_key())
}

/// Total tracked seconds per course key, live timers included.
/// Archived courses are skipped unless `include_archived` is set.
pub fn course_totals(
    tasks: &[Task],
    hidden_courses: &BTreeSet<String>,
    include_archived: bool,
    now: DateTime<Utc>,
) -> BTreeMap<String, u64> {
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();

    for task in tasks {
        let key = task.course_key();
        if !include_archived && hidden_courses.contains(key) {
            continue;
        }
        let total = totals.entry(key.to_string()).or_insert(0);
        *total = total.saturating_add(task.total_seconds(now));
    }

    totals
}

pub fn grand_total(totals: &BTreeMap<String, u64>) -> u64 {
    totals.values().fold(0u64, |sum, secs| sum.saturating_add(*secs))
}

/// Running total of finished-session hours per calendar day (in `tz`),
/// oldest day first. Archive visibility does not apply here.
pub fn cumulative_by_day<Tz: TimeZone>(
    tasks: &[Task],
    courses: &[String],
    tz: &Tz,
) -> Vec<(NaiveDate, f64)> {
    let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();

    for task in tasks.iter().filter(|t| is_selected(t, courses)) {
        for session in &task.sessions {
            let day = session.start.with_timezone(tz).date_naive();
            let secs = per_day.entry(day).or_insert(0);
            *secs = secs.saturating_add(session.seconds);
        }
    }

    let mut running = 0u64;
    per_day
        .into_iter()
        .map(|(day, secs)| {
            running = running.saturating_add(secs);
            (day, running as f64 / 3600.0)
        })
        .collect()
}

/// Tasks ranked by total time (live timers included), longest first, as
/// `(title, minutes)`. Equal totals keep store order.
pub fn top_tasks_by_time(
    tasks: &[Task],
    courses: &[String],
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<(String, f64)> {
    let mut ranked: Vec<(&Task, u64)> = tasks
        .iter()
        .filter(|t| is_selected(t, courses))
        .map(|t| (t, t.total_seconds(now)))
        .collect();

    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    ranked
        .into_iter()
        .take(limit)
        .map(|(task, secs)| (task.text.clone(), secs as f64 / 60.0))
        .collect()
}

/// Finished-session hours by the weekday the session started on (in `tz`).
/// Always seven entries, Monday through Sunday.
pub fn time_by_weekday<Tz: TimeZone>(
    tasks: &[Task],
    courses: &[String],
    tz: &Tz,
) -> Vec<(&'static str, f64)> {
    let mut seconds = [0u64; 7];

    for task in tasks.iter().filter(|t| is_selected(t, courses)) {
        for session in &task.sessions {
            let weekday = session.start.with_timezone(tz).weekday();
            let slot = &mut seconds[weekday.num_days_from_monday() as usize];
            *slot = slot.saturating_add(session.seconds);
        }
    }

    WEEKDAYS
        .iter()
        .zip(seconds)
        .map(|(label, secs)| (*label, secs as f64 / 3600.0))
        .collect()
}

/// Calculate per-course statistics across all tasks
pub fn calculate_course_stats(tasks: &[Task]) -> BTreeMap<String, CourseStats> {
    let mut stats: BTreeMap<String, CourseStats> = BTreeMap::new();

    for task in tasks {
        let entry = stats.entry(task.course_key().to_string()).or_default();
        entry.task_count += 1;
        if task.done {
            entry.done_count += 1;
        }
        entry.session_count += task.sessions.len();
    }

    stats
}
