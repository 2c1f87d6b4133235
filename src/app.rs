use crate::clock::{Clock, SystemClock};
use crate::domain::{
    apply_archive_visibility, apply_course_filter, filter_by_status, format_seconds,
    group_by_course, order_course_keys, sort_by_due, SortDirection, StatusFilter, Task,
};
use crate::error::TrackerError;
use crate::persistence::{
    load_links, load_settings, save_links, save_settings, set_link, CourseLinks, Settings,
    TaskStore, LINKS_FILE, SETTINGS_FILE, TASKS_FILE,
};
use crate::report::stats::course_totals;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// How a list view is filtered and ordered
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    pub filter: StatusFilter,
    pub course: Option<String>,
    pub show_archived: bool,
    pub direction: SortDirection,
}

/// Application state: the task store plus settings and course links.
///
/// Every action reports its outcome as a one-line status message instead of
/// failing, so the presentation layer only has to show `status`.
pub struct AppState {
    pub store: TaskStore,
    pub settings: Settings,
    pub links: CourseLinks,
    pub status: String,
    /// Persistence problems collected since the last `take_warnings`
    pub warnings: Vec<TrackerError>,
    settings_path: Option<PathBuf>,
    links_path: Option<PathBuf>,
}

impl AppState {
    /// Load every document from the data directory
    pub fn open(data_dir: &Path) -> Self {
        Self::open_with_clock(data_dir, Box::new(SystemClock))
    }

    pub fn open_with_clock(data_dir: &Path, clock: Box<dyn Clock>) -> Self {
        let (store, tasks_warning) = TaskStore::open_with_clock(data_dir.join(TASKS_FILE), clock);
        let settings_path = data_dir.join(SETTINGS_FILE);
        let links_path = data_dir.join(LINKS_FILE);
        let (settings, settings_warning) = load_settings(&settings_path);
        let (links, links_warning) = load_links(&links_path);

        let warnings: Vec<TrackerError> = [tasks_warning, settings_warning, links_warning]
            .into_iter()
            .flatten()
            .collect();

        let status = format!("Loaded {} task(s).", store.tasks().len());
        Self {
            store,
            settings,
            links,
            status,
            warnings,
            settings_path: Some(settings_path),
            links_path: Some(links_path),
        }
    }

    /// State that never touches disk
    #[cfg(test)]
    pub fn in_memory(store: TaskStore, settings: Settings) -> Self {
        Self {
            store,
            settings,
            links: CourseLinks::new(),
            status: "Ready".to_string(),
            warnings: Vec::new(),
            settings_path: None,
            links_path: None,
        }
    }

    pub fn take_warnings(&mut self) -> Vec<TrackerError> {
        std::mem::take(&mut self.warnings)
    }

    fn set_status(&mut self, text: impl Into<String>) {
        self.status = text.into();
        debug!(status = %self.status, "status changed");
    }

    /// Turn an error into the status line
    fn report(&mut self, err: TrackerError) {
        if err.is_persistence() {
            warn!("{}", err);
        }
        self.set_status(err.to_string());
    }

    /// Pick up a failed write-through from the store
    fn collect_persist_error(&mut self) {
        if let Some(err) = self.store.take_persist_error() {
            self.warnings.push(err);
        }
    }

    fn resolve(&mut self, id: &str) -> Option<Uuid> {
        match self.store.resolve(id) {
            Ok(id) => Some(id),
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.store.get(id)
    }

    pub fn add(
        &mut self,
        text: &str,
        due: Option<&str>,
        course: Option<&str>,
        url: Option<&str>,
    ) -> Option<Uuid> {
        let result = self.store.create(text, due, course, url).map(|t| t.id);
        self.collect_persist_error();
        match result {
            Ok(id) => {
                self.set_status("Added task.");
                Some(id)
            }
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    /// Replace text, due, course, and link of a task
    pub fn edit(
        &mut self,
        id: &str,
        text: &str,
        due: Option<&str>,
        course: Option<&str>,
        url: Option<&str>,
    ) -> bool {
        let Some(id) = self.resolve(id) else {
            return false;
        };
        let result = self.store.update(id, text, due, course, url).map(|_| ());
        self.collect_persist_error();
        match result {
            Ok(()) => {
                self.set_status("Updated task.");
                true
            }
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    /// Edit only the given fields. `None` keeps the current value, an empty
    /// string clears it.
    pub fn amend(
        &mut self,
        id: &str,
        text: Option<&str>,
        due: Option<&str>,
        course: Option<&str>,
        url: Option<&str>,
    ) -> bool {
        let Some(uuid) = self.resolve(id) else {
            return false;
        };
        let Some(current) = self.task(uuid) else {
            self.report(TrackerError::not_found(uuid));
            return false;
        };

        let due_label = current.due_label();
        let text = text.unwrap_or(current.text.as_str()).to_string();
        let due = due.map(str::to_string).or(due_label);
        let course = course.map(str::to_string).or_else(|| current.course.clone());
        let url = url.map(str::to_string).or_else(|| current.url.clone());

        self.edit(id, &text, due.as_deref(), course.as_deref(), url.as_deref())
    }

    pub fn toggle_done(&mut self, id: &str) -> bool {
        let Some(id) = self.resolve(id) else {
            return false;
        };
        let result = self
            .store
            .toggle_done(id)
            .map(|t| (t.text.clone(), t.done));
        self.collect_persist_error();
        match result {
            Ok((text, true)) => self.set_status(format!("Completed '{}'", text)),
            Ok((text, false)) => self.set_status(format!("Reopened '{}'", text)),
            Err(e) => {
                self.report(e);
                return false;
            }
        }
        true
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let Some(id) = self.resolve(id) else {
            return false;
        };
        let result = self.store.delete(id);
        self.collect_persist_error();
        match result {
            Ok(task) => {
                self.set_status(format!("Deleted '{}'", task.text));
                true
            }
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    pub fn clear_completed(&mut self) -> usize {
        let removed = self.store.delete_completed();
        self.collect_persist_error();
        if removed == 0 {
            self.set_status("No completed tasks to clear.");
        } else {
            self.set_status(format!("Removed {} completed task(s).", removed));
        }
        removed
    }

    pub fn start(&mut self, id: &str) -> bool {
        let Some(id) = self.resolve(id) else {
            return false;
        };
        let result = self.store.start(id).map(|t| t.text.clone());
        self.collect_persist_error();
        match result {
            Ok(text) => {
                self.set_status(format!("Started timer for '{}'", text));
                true
            }
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    pub fn stop(&mut self, id: &str) -> bool {
        let Some(id) = self.resolve(id) else {
            return false;
        };
        let result = self.store.stop(id);
        self.collect_persist_error();
        match result {
            Ok(session) => {
                let text = self.store.get(id).map(|t| t.text.clone()).unwrap_or_default();
                self.set_status(format!(
                    "Stopped timer for '{}' (+{})",
                    text,
                    format_seconds(session.seconds)
                ));
                true
            }
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    /// Clear tracked time. Callers confirm with the user first.
    pub fn reset(&mut self, id: &str) -> bool {
        let Some(id) = self.resolve(id) else {
            return false;
        };
        let result = self.store.reset(id).map(|_| ());
        self.collect_persist_error();
        match result {
            Ok(()) => {
                self.set_status("Time cleared.");
                true
            }
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    /// Stop all running timers before exit
    pub fn shutdown(&mut self) -> usize {
        let stopped = self.store.shutdown();
        self.collect_persist_error();
        self.set_status(format!("Stopped {} running timer(s).", stopped));
        stopped
    }

    fn save_settings(&mut self) {
        if let Some(path) = &self.settings_path {
            if let Err(e) = save_settings(path, &self.settings) {
                warn!("{}", e);
                self.warnings.push(e);
            }
        }
    }

    fn save_links(&mut self) {
        if let Some(path) = &self.links_path {
            if let Err(e) = save_links(path, &self.links) {
                warn!("{}", e);
                self.warnings.push(e);
            }
        }
    }

    pub fn archive_course(&mut self, course: &str) -> bool {
        let changed = self.settings.archive(course);
        if changed {
            self.save_settings();
            self.set_status(format!("Archived {}", course.trim()));
        } else {
            self.set_status(format!("{} is already archived", course.trim()));
        }
        changed
    }

    pub fn unarchive_course(&mut self, course: &str) -> bool {
        let changed = self.settings.unarchive(course);
        if changed {
            self.save_settings();
            self.set_status(format!("Restored {}", course.trim()));
        } else {
            self.set_status(format!("{} is not archived", course.trim()));
        }
        changed
    }

    pub fn toggle_display_mode(&mut self) -> bool {
        let flag = self.settings.toggle_display_mode();
        self.save_settings();
        flag
    }

    /// Set a course link; an empty link removes it
    pub fn set_course_link(&mut self, course: &str, link: &str) {
        set_link(&mut self.links, course, link);
        self.save_links();
        if link.trim().is_empty() {
            self.set_status(format!("Removed link for {}", course.trim()));
        } else {
            self.set_status(format!("Saved link for {}", course.trim()));
        }
    }

    /// Tasks for a flat list view
    pub fn visible_tasks(&self, view: &ViewOptions) -> Vec<&Task> {
        let tasks = filter_by_status(self.store.tasks(), view.filter);
        let tasks = apply_archive_visibility(
            tasks,
            &self.settings.hidden_courses,
            view.show_archived,
        );
        let tasks = apply_course_filter(tasks, view.course.as_deref());
        sort_by_due(tasks, view.direction)
    }

    /// Tasks for a grouped view, sorted within each course
    pub fn grouped_tasks(&self, view: &ViewOptions) -> Vec<(String, Vec<&Task>)> {
        group_by_course(self.visible_tasks(view))
    }

    /// Time per course in display order
    pub fn course_totals(&self, include_archived: bool) -> Vec<(String, u64)> {
        let totals = course_totals(
            self.store.tasks(),
            &self.settings.hidden_courses,
            include_archived,
            self.store.now(),
        );
        order_course_keys(totals.keys().cloned())
            .into_iter()
            .map(|course| {
                let secs = totals[&course];
                (course, secs)
            })
            .collect()
    }

    /// "12 total | 5 to do | Filter: Active"
    pub fn summary(&self, view: &ViewOptions) -> String {
        let tasks = self.store.tasks();
        let todo = tasks.iter().filter(|t| !t.done).count();
        format!(
            "{} total | {} to do | Filter: {} | Due {}",
            tasks.len(),
            todo,
            view.filter,
            view.direction.arrow()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn test_clock() -> ManualClock {
        ManualClock::at(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap())
    }

    fn create_test_app(clock: &ManualClock) -> AppState {
        let store = TaskStore::in_memory(Vec::new(), Box::new(clock.clone()));
        AppState::in_memory(store, Settings::default())
    }

    #[test]
    fn test_add_and_validation_status() {
        let mut app = create_test_app(&test_clock());

        assert!(app.add("Read Ch.3", Some("2025-03-01"), Some("585"), None).is_some());
        assert_eq!(app.status, "Added task.");

        assert!(app.add("", None, None, None).is_none());
        assert_eq!(app.status, "Type a task description first");

        assert!(app.add("Essay", Some("tomorrow"), None, None).is_none());
        assert!(app.status.starts_with("Invalid date 'tomorrow'"));
        assert_eq!(app.store.tasks().len(), 1);
    }

    #[test]
    fn test_timer_statuses() {
        let clock = test_clock();
        let mut app = create_test_app(&clock);
        let id = app.add("Lab", None, Some("550"), None).unwrap().to_string();

        assert!(!app.stop(&id));
        assert_eq!(app.status, "No running timer to stop for 'Lab'");

        assert!(app.start(&id));
        assert_eq!(app.status, "Started timer for 'Lab'");
        assert!(!app.start(&id));
        assert_eq!(app.status, "Already running; stop 'Lab' first");

        clock.advance(75);
        assert!(app.stop(&id[..8]));
        assert_eq!(app.status, "Stopped timer for 'Lab' (+1m 15s)");
        assert_eq!(app.course_totals(false), vec![("550".to_string(), 75)]);
    }

    #[test]
    fn test_amend_keeps_omitted_fields() {
        let mut app = create_test_app(&test_clock());
        let id = app
            .add("Essay", Some("2025-04-01"), Some("585"), Some("docs.example.com/e"))
            .unwrap();
        let prefix = id.to_string()[..8].to_string();

        assert!(app.amend(&prefix, Some("Essay draft"), None, None, None));
        let task = app.task(id).unwrap();
        assert_eq!(task.text, "Essay draft");
        assert_eq!(task.due_label().as_deref(), Some("2025-04-01"));
        assert_eq!(task.course.as_deref(), Some("585"));
        assert_eq!(task.url.as_deref(), Some("docs.example.com/e"));

        assert!(app.amend(&prefix, None, Some(""), Some("550"), Some("")));
        let task = app.task(id).unwrap();
        assert_eq!(task.text, "Essay draft");
        assert_eq!(task.due, None);
        assert_eq!(task.course.as_deref(), Some("550"));
        assert_eq!(task.url, None);
        assert_eq!(app.status, "Updated task.");

        assert!(!app.amend("ffffffff", Some("x"), None, None, None));
        assert_eq!(app.status, "No task with id ffffffff");
    }

    #[test]
    fn test_unknown_id_is_reported() {
        let mut app = create_test_app(&test_clock());
        assert!(!app.delete("deadbeef"));
        assert_eq!(app.status, "No task with id deadbeef");
    }

    #[test]
    fn test_clear_completed_statuses() {
        let mut app = create_test_app(&test_clock());
        assert_eq!(app.clear_completed(), 0);
        assert_eq!(app.status, "No completed tasks to clear.");

        let id = app.add("Done soon", None, None, None).unwrap().to_string();
        app.add("Still open", None, None, None);
        assert!(app.toggle_done(&id));
        assert_eq!(app.status, "Completed 'Done soon'");
        assert_eq!(app.clear_completed(), 1);
        assert_eq!(app.status, "Removed 1 completed task(s).");
    }

    #[test]
    fn test_visible_tasks_pipeline() {
        let mut app = create_test_app(&test_clock());
        app.add("Archived work", Some("2025-01-01"), Some("500"), None);
        app.add("No due", None, Some("585"), None);
        app.add("Due later", Some("2025-05-01"), Some("585"), None);
        app.add("Due soon", Some("2025-04-01"), Some("550"), None);
        let done = app.add("Finished", Some("2025-03-15"), Some("585"), None).unwrap();
        app.toggle_done(&done.to_string());
        app.archive_course("500");

        let view = ViewOptions::default();
        let titles: Vec<&str> = app.visible_tasks(&view).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(titles, vec!["Due soon", "Due later", "No due"]);

        let view = ViewOptions {
            filter: StatusFilter::All,
            course: Some("585".to_string()),
            direction: SortDirection::Descending,
            ..ViewOptions::default()
        };
        let titles: Vec<&str> = app.visible_tasks(&view).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(titles, vec!["Due later", "Finished", "No due"]);

        let view = ViewOptions {
            filter: StatusFilter::All,
            show_archived: true,
            ..ViewOptions::default()
        };
        let groups: Vec<String> = app.grouped_tasks(&view).into_iter().map(|(k, _)| k).collect();
        assert_eq!(groups, vec!["500", "550", "585"]);
    }

    #[test]
    fn test_course_totals_respect_archive() {
        let clock = test_clock();
        let mut app = create_test_app(&clock);
        let id = app.add("Old", None, Some("500"), None).unwrap().to_string();
        app.start(&id);
        clock.advance(30);
        app.stop(&id);
        app.archive_course("500");

        assert!(app.course_totals(false).is_empty());
        assert_eq!(app.course_totals(true), vec![("500".to_string(), 30)]);
        assert!(app.unarchive_course("500"));
        assert_eq!(app.course_totals(false), vec![("500".to_string(), 30)]);
    }

    #[test]
    fn test_open_persists_all_documents() {
        let temp_dir = tempdir().unwrap();
        let clock = test_clock();

        let mut app = AppState::open_with_clock(temp_dir.path(), Box::new(clock.clone()));
        assert!(app.take_warnings().is_empty());
        let id = app.add("Lab", None, Some("550"), None).unwrap();
        app.start(&id.to_string());
        app.archive_course("500");
        app.set_course_link("550", "zoom.us/j/123");
        assert!(app.toggle_display_mode());

        clock.advance(15);
        assert_eq!(app.shutdown(), 1);

        let reopened = AppState::open_with_clock(temp_dir.path(), Box::new(clock));
        assert_eq!(reopened.status, "Loaded 1 task(s).");
        assert_eq!(reopened.task(id).unwrap().sessions[0].seconds, 15);
        assert!(reopened.settings.is_archived("500"));
        assert!(reopened.settings.display_mode_flag);
        assert_eq!(reopened.links.get("550").map(String::as_str), Some("zoom.us/j/123"));
    }

    #[test]
    fn test_open_with_malformed_documents_warns() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join(TASKS_FILE), "not json").unwrap();
        std::fs::write(temp_dir.path().join(SETTINGS_FILE), "[").unwrap();

        let mut app = AppState::open_with_clock(temp_dir.path(), Box::new(test_clock()));
        assert!(app.store.tasks().is_empty());
        assert_eq!(app.take_warnings().len(), 2);

        assert!(app.add("Works anyway", None, None, None).is_some());
        assert_eq!(app.store.tasks().len(), 1);
    }

    #[test]
    fn test_summary() {
        let mut app = create_test_app(&test_clock());
        let id = app.add("A", None, None, None).unwrap().to_string();
        app.add("B", None, None, None);
        app.toggle_done(&id);

        assert_eq!(
            app.summary(&ViewOptions::default()),
            "2 total | 1 to do | Filter: Active | Due ↑"
        );
    }
}
