use crate::domain::course_key;
use crate::error::{TrackerError, TrackerResult};
use crate::persistence::{atomic_write, read_file};
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Course key -> meeting or course page link, stored in course_links.json
pub type CourseLinks = BTreeMap<String, String>;

/// Set or replace the link for a course. Blank links remove it.
pub fn set_link(links: &mut CourseLinks, course: &str, link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return remove_link(links, course);
    }
    links.insert(course_key(Some(course)).to_string(), link.to_string())
}

pub fn remove_link(links: &mut CourseLinks, course: &str) -> Option<String> {
    links.remove(course_key(Some(course)))
}

pub fn link_for<'a>(links: &'a CourseLinks, course: &str) -> Option<&'a str> {
    links.get(course_key(Some(course))).map(String::as_str)
}

/// Turn a stored link into something a browser or file opener accepts.
///
/// http(s) URLs and local paths pass through, bare domains get `https://`.
pub fn normalize_target(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let looks_like_windows_path = value.contains(':') && value.contains('\\');
    if Path::new(value).exists() || looks_like_windows_path {
        return Some(value.to_string());
    }

    let lower = value.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(value.to_string());
    }

    let has_scheme = value.split_once(':').is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
    });
    if !has_scheme && value.contains('.') {
        return Some(format!("https://{}", value));
    }

    Some(value.to_string())
}

/// Load course links. Missing file gives an empty map; a malformed one gives
/// an empty map plus the error.
pub fn load_links<P: AsRef<Path>>(path: P) -> (CourseLinks, Option<TrackerError>) {
    let path = path.as_ref();

    let parsed = read_file(path).and_then(|content| match content {
        Some(content) if !content.trim().is_empty() => serde_json::from_str(&content)
            .with_context(|| format!("Malformed course links in {}", path.display())),
        _ => Ok(CourseLinks::new()),
    });

    match parsed {
        Ok(links) => (links, None),
        Err(e) => {
            warn!("{:#}", e);
            (CourseLinks::new(), Some(TrackerError::load(path, e)))
        }
    }
}

pub fn save_links<P: AsRef<Path>>(path: P, links: &CourseLinks) -> TrackerResult<()> {
    let path = path.as_ref();
    serde_json::to_string_pretty(links)
        .context("Failed to serialize course links")
        .and_then(|json| atomic_write(path, &json))
        .map_err(|e| TrackerError::save(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_set_and_remove_links() {
        let mut links = CourseLinks::new();
        assert_eq!(set_link(&mut links, " 585 ", "https://zoom.us/j/1"), None);
        assert_eq!(link_for(&links, "585"), Some("https://zoom.us/j/1"));

        let old = set_link(&mut links, "585", "https://zoom.us/j/2");
        assert_eq!(old.as_deref(), Some("https://zoom.us/j/1"));

        assert!(set_link(&mut links, "585", "  ").is_some());
        assert_eq!(link_for(&links, "585"), None);

        set_link(&mut links, "550", "meet.example.com/abc");
        assert_eq!(link_for(&links, " 550"), Some("meet.example.com/abc"));
        assert!(remove_link(&mut links, "550 ").is_some());
        assert!(links.is_empty());
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target(""), None);
        assert_eq!(
            normalize_target("https://canvas.example.edu/x").as_deref(),
            Some("https://canvas.example.edu/x")
        );
        assert_eq!(
            normalize_target("example.com/syllabus").as_deref(),
            Some("https://example.com/syllabus")
        );
        assert_eq!(
            normalize_target(r"C:\Users\me\notes.pdf").as_deref(),
            Some(r"C:\Users\me\notes.pdf")
        );
        assert_eq!(
            normalize_target("mailto:prof@example.edu").as_deref(),
            Some("mailto:prof@example.edu")
        );
        assert_eq!(normalize_target("notes").as_deref(), Some("notes"));
    }

    #[test]
    fn test_normalize_existing_local_file() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("hw.v2.pdf");
        std::fs::write(&file, "").unwrap();
        let target = file.to_string_lossy().to_string();

        assert_eq!(normalize_target(&target), Some(target));
    }

    #[test]
    fn test_save_and_load_links() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("course_links.json");

        let mut links = CourseLinks::new();
        set_link(&mut links, "585", "https://zoom.us/j/1");
        save_links(&path, &links).unwrap();

        let (loaded, warning) = load_links(&path);
        assert!(warning.is_none());
        assert_eq!(loaded, links);
    }

    #[test]
    fn test_malformed_links_fall_back() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("course_links.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        let (loaded, warning) = load_links(&path);
        assert!(loaded.is_empty());
        assert!(warning.is_some());
    }
}
