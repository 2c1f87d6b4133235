use crate::domain::course_key;
use crate::error::{TrackerError, TrackerResult};
use crate::persistence::{atomic_write, read_file};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// App settings stored in settings.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Archived course keys, hidden from default views and totals
    #[serde(default)]
    pub hidden_courses: BTreeSet<String>,
    /// Cosmetic display toggle owned by the presentation layer
    #[serde(default)]
    pub display_mode_flag: bool,
}

impl Settings {
    pub fn is_archived(&self, course: &str) -> bool {
        self.hidden_courses.contains(course_key(Some(course)))
    }

    /// Archive a course. Returns false if it already was.
    pub fn archive(&mut self, course: &str) -> bool {
        self.hidden_courses.insert(course_key(Some(course)).to_string())
    }

    /// Unarchive a course. Returns false if it was not archived.
    pub fn unarchive(&mut self, course: &str) -> bool {
        self.hidden_courses.remove(course_key(Some(course)))
    }

    pub fn toggle_display_mode(&mut self) -> bool {
        self.display_mode_flag = !self.display_mode_flag;
        self.display_mode_flag
    }
}

/// Load settings. A missing file gives defaults; an unreadable one gives
/// defaults plus the error so the caller can warn about it.
pub fn load_settings<P: AsRef<Path>>(path: P) -> (Settings, Option<TrackerError>) {
    let path = path.as_ref();

    let parsed = read_file(path).and_then(|content| match content {
        Some(content) if !content.trim().is_empty() => serde_json::from_str(&content)
            .map(Some)
            .with_context(|| format!("Malformed settings in {}", path.display())),
        _ => Ok(None),
    });

    match parsed {
        Ok(Some(settings)) => {
            debug!(path = %path.display(), "settings loaded");
            (settings, None)
        }
        Ok(None) => (Settings::default(), None),
        Err(e) => {
            warn!("{:#}", e);
            (Settings::default(), Some(TrackerError::load(path, e)))
        }
    }
}

/// Save settings to settings.json
pub fn save_settings<P: AsRef<Path>>(path: P, settings: &Settings) -> TrackerResult<()> {
    let path = path.as_ref();
    serde_json::to_string_pretty(settings)
        .context("Failed to serialize settings")
        .and_then(|json| atomic_write(path, &json))
        .map_err(|e| TrackerError::save(path, e))
}
