//! The task store: owner of every task and the only writer of tasks.json.
//!
//! Each mutation is written through to disk right away. A failed write does
//! not undo the mutation; the error is parked on the store until the caller
//! collects it with [`TaskStore::take_persist_error`].

use crate::clock::Clock;
use crate::domain::{order_course_keys, Session, Task, TaskFields};
use crate::error::{TrackerError, TrackerResult};
use crate::persistence::{atomic_write, backup_file, read_file};
use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of loading the tasks document
#[derive(Debug)]
pub struct Loaded {
    pub tasks: Vec<Task>,
    /// Set when the document existed but could not be read
    pub warning: Option<TrackerError>,
}

/// Read tasks.json. Missing or blank means no tasks. A malformed document is
/// backed up and reported, and the task set falls back to empty.
pub fn load_tasks<P: AsRef<Path>>(path: P) -> Loaded {
    let path = path.as_ref();

    let parsed = read_file(path).and_then(|content| match content {
        Some(content) if !content.trim().is_empty() => serde_json::from_str::<Vec<Task>>(&content)
            .with_context(|| format!("Malformed tasks document {}", path.display())),
        _ => Ok(Vec::new()),
    });

    match parsed {
        Ok(tasks) => {
            debug!(count = tasks.len(), "tasks loaded");
            Loaded {
                tasks,
                warning: None,
            }
        }
        Err(e) => {
            warn!("{:#}", e);
            let e = if path.exists() {
                match backup_file(path) {
                    Ok(backup) => {
                        info!(
                            backup = %backup.display(),
                            "kept a copy of the unreadable tasks document"
                        );
                        e.context(format!("a copy was kept at {}", backup.display()))
                    }
                    Err(backup_err) => {
                        warn!("{:#}", backup_err);
                        e
                    }
                }
            } else {
                e
            };
            Loaded {
                tasks: Vec::new(),
                warning: Some(TrackerError::load(path, e)),
            }
        }
    }
}

/// Write the full task set to tasks.json
pub fn save_tasks<P: AsRef<Path>>(path: P, tasks: &[Task]) -> TrackerResult<()> {
    let path = path.as_ref();
    serde_json::to_string_pretty(tasks)
        .context("Failed to serialize tasks")
        .and_then(|json| atomic_write(path, &json))
        .map_err(|e| TrackerError::save(path, e))
}

pub struct TaskStore {
    tasks: Vec<Task>,
    /// None keeps the store in memory only
    path: Option<PathBuf>,
    clock: Box<dyn Clock>,
    persist_error: Option<TrackerError>,
}

impl TaskStore {
    /// Open the store backed by `path`, loading what is there.
    /// Returns the load warning, if any, next to the store.
    pub fn open_with_clock(
        path: impl Into<PathBuf>,
        clock: Box<dyn Clock>,
    ) -> (Self, Option<TrackerError>) {
        let path = path.into();
        let loaded = load_tasks(&path);
        let store = Self {
            tasks: loaded.tasks,
            path: Some(path),
            clock,
            persist_error: None,
        };
        (store, loaded.warning)
    }

    #[cfg(test)]
    pub fn in_memory(tasks: Vec<Task>, clock: Box<dyn Clock>) -> Self {
        Self {
            tasks,
            path: None,
            clock,
            persist_error: None,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: Uuid) -> TrackerResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TrackerError::not_found(id))
    }

    /// Find a task by full id or unique id prefix
    pub fn resolve(&self, prefix: &str) -> TrackerResult<Uuid> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Err(TrackerError::NotFound(prefix));
        }

        let mut matches = self
            .tasks
            .iter()
            .filter(|t| t.id.to_string().starts_with(&prefix));

        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(task.id),
            (Some(_), Some(_)) => Err(TrackerError::AmbiguousId(prefix)),
            (None, _) => Err(TrackerError::NotFound(prefix)),
        }
    }

    /// Distinct course tags in use, numbers first then alphabetic
    pub fn courses(&self) -> Vec<String> {
        order_course_keys(
            self.tasks
                .iter()
                .filter_map(|t| t.course.as_deref())
                .map(str::trim)
                .filter(|c| !c.is_empty()),
        )
    }

    /// Save the whole set now
    pub fn save(&self) -> TrackerResult<()> {
        match &self.path {
            Some(path) => save_tasks(path, &self.tasks),
            None => Ok(()),
        }
    }

    /// Write-through after a mutation. Failures are parked, not returned.
    fn persist(&mut self) {
        if let Err(e) = self.save() {
            warn!("{}", e);
            self.persist_error = Some(e);
        }
    }

    /// Take the last write-through failure, if one happened
    pub fn take_persist_error(&mut self) -> Option<TrackerError> {
        self.persist_error.take()
    }

    pub fn create(
        &mut self,
        text: &str,
        due: Option<&str>,
        course: Option<&str>,
        url: Option<&str>,
    ) -> TrackerResult<&Task> {
        let fields = TaskFields::parse(text, due, course, url)?;
        let created = self.clock.now().with_timezone(&Local).naive_local();
        let task = Task::new(fields, created);
        info!(task = %task.id, "task created");

        self.tasks.push(task);
        self.persist();
        Ok(&self.tasks[self.tasks.len() - 1])
    }

    /// Edit text, due date, course, and link. Time tracking is untouched.
    pub fn update(
        &mut self,
        id: Uuid,
        text: &str,
        due: Option<&str>,
        course: Option<&str>,
        url: Option<&str>,
    ) -> TrackerResult<&Task> {
        let fields = TaskFields::parse(text, due, course, url)?;
        self.get_mut(id)?.apply(fields);
        info!(task = %id, "task updated");

        self.persist();
        self.get(id).ok_or_else(|| TrackerError::not_found(id))
    }

    pub fn set_done(&mut self, id: Uuid, done: bool) -> TrackerResult<&Task> {
        self.get_mut(id)?.done = done;
        debug!(task = %id, done, "completion changed");

        self.persist();
        self.get(id).ok_or_else(|| TrackerError::not_found(id))
    }

    pub fn toggle_done(&mut self, id: Uuid) -> TrackerResult<&Task> {
        let done = self.get_mut(id)?.done;
        self.set_done(id, !done)
    }

    /// Remove a task. Unknown ids are reported as `NotFound` with no change.
    pub fn delete(&mut self, id: Uuid) -> TrackerResult<Task> {
        let pos = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| TrackerError::not_found(id))?;
        let task = self.tasks.remove(pos);
        info!(task = %id, "task deleted");

        self.persist();
        Ok(task)
    }

    /// Remove every completed task, returning how many went
    pub fn delete_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.done);
        let removed = before - self.tasks.len();

        if removed > 0 {
            info!(removed, "completed tasks cleared");
            self.persist();
        }
        removed
    }

    pub fn start(&mut self, id: Uuid) -> TrackerResult<&Task> {
        let now = self.clock.now();
        self.get_mut(id)?.start_timer(now)?;

        self.persist();
        self.get(id).ok_or_else(|| TrackerError::not_found(id))
    }

    pub fn stop(&mut self, id: Uuid) -> TrackerResult<Session> {
        let now = self.clock.now();
        let session = self.get_mut(id)?.stop_timer(now)?.clone();

        self.persist();
        Ok(session)
    }

    /// Clear all tracked time on one task. Confirmation is the caller's job.
    pub fn reset(&mut self, id: Uuid) -> TrackerResult<&Task> {
        self.get_mut(id)?.reset_time();
        info!(task = %id, "tracked time reset");

        self.persist();
        self.get(id).ok_or_else(|| TrackerError::not_found(id))
    }

    pub fn total_seconds(&self, id: Uuid) -> TrackerResult<u64> {
        let now = self.clock.now();
        self.get(id)
            .map(|t| t.total_seconds(now))
            .ok_or_else(|| TrackerError::not_found(id))
    }

    /// Stop every running timer at the current time so no tracked time is
    /// lost on exit. Saves only if something was stopped.
    pub fn shutdown(&mut self) -> usize {
        let now = self.clock.now();
        let mut stopped = 0;

        for task in self.tasks.iter_mut().filter(|t| t.is_running()) {
            if task.stop_timer(now).is_ok() {
                stopped += 1;
            }
        }

        if stopped > 0 {
            info!(stopped, "running timers stopped");
            self.persist();
        }
        stopped
    }
}
