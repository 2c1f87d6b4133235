//! Read-only projections of the task list used by list views.
//!
//! Every function takes borrowed tasks and returns borrowed tasks, so the
//! steps compose: status filter, archive visibility, course filter, then
//! sort or group.

use super::enums::{SortDirection, StatusFilter};
use super::task::{Task, UNASSIGNED};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Keep tasks whose completion state matches `mode`.
pub fn filter_by_status<'a, I>(tasks: I, mode: StatusFilter) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks.into_iter().filter(|t| mode.matches(t.done)).collect()
}

/// Hide tasks of archived courses unless `show_archived` is set.
pub fn apply_archive_visibility<'a, I>(
    tasks: I,
    hidden_courses: &BTreeSet<String>,
    show_archived: bool,
) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .filter(|t| show_archived || !hidden_courses.contains(t.course_key()))
        .collect()
}

/// Keep only tasks whose course key equals `selected` exactly.
pub fn apply_course_filter<'a, I>(tasks: I, selected: Option<&str>) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .filter(|t| selected.map_or(true, |course| t.course_key() == course))
        .collect()
}

/// Numeric course keys first (by value), then alphabetic, "Unassigned" last.
pub fn compare_course_keys(a: &str, b: &str) -> Ordering {
    fn rank(key: &str) -> (u8, Option<u64>) {
        if key == UNASSIGNED {
            (2, None)
        } else if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
            (0, key.parse().ok())
        } else {
            (1, None)
        }
    }

    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}

/// Sort course keys in display order.
pub fn order_course_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut keys: Vec<String> = keys.into_iter().map(Into::into).collect();
    keys.sort_by(|a, b| compare_course_keys(a, b));
    keys.dedup();
    keys
}

/// Bucket tasks by course key. Buckets follow [`compare_course_keys`];
/// tasks keep their input order inside a bucket.
pub fn group_by_course<'a, I>(tasks: I) -> Vec<(String, Vec<&'a Task>)>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut groups: Vec<(String, Vec<&'a Task>)> = Vec::new();

    for task in tasks {
        let key = task.course_key();
        match groups.iter().position(|(k, _)| k == key) {
            Some(pos) => groups[pos].1.push(task),
            None => groups.push((key.to_string(), vec![task])),
        }
    }

    groups.sort_by(|(a, _), (b, _)| compare_course_keys(a, b));
    groups
}

/// Order by due date with creation time as the tie-break.
///
/// Tasks without a due date stay at the tail in both directions. Descending
/// reverses the dated tasks and the order inside the undated tail.
pub fn sort_by_due<'a, I>(tasks: I, direction: SortDirection) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let (mut dated, mut undated): (Vec<&Task>, Vec<&Task>) =
        tasks.into_iter().partition(|t| t.due.is_some());

    dated.sort_by(|a, b| a.due.cmp(&b.due).then_with(|| a.created.cmp(&b.created)));
    undated.sort_by(|a, b| a.created.cmp(&b.created));

    if direction == SortDirection::Descending {
        dated.reverse();
        undated.reverse();
    }

    dated.extend(undated);
    dated
}

/// Get status badge text
pub fn status_badge(task: &Task) -> &'static str {
    if task.done {
        "✓ DONE"
    } else if task.is_running() {
        "⏱ RUNNING"
    } else {
        "· IDLE"
    }
}
