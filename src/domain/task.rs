use crate::error::{TrackerError, ValidationError};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;
use uuid::Uuid;

/// Group key for tasks without a course tag.
pub const UNASSIGNED: &str = "Unassigned";

/// One completed timer interval. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    #[serde(serialize_with = "serialize_stamp")]
    pub start: DateTime<Utc>,
    #[serde(serialize_with = "serialize_stamp")]
    pub end: DateTime<Utc>,
    pub seconds: u64,
}

impl Session {
    /// Build a session from two instants. Stamps are kept at whole-second
    /// precision, the duration is rounded from the exact delta.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let millis = end.signed_duration_since(start).num_milliseconds();
        let seconds = (millis as f64 / 1000.0).round().max(0.0) as u64;
        Self {
            start: start.trunc_subsecs(0),
            end: end.trunc_subsecs(0),
            seconds,
        }
    }

    /// Coerce a loosely-shaped stored entry into a session.
    /// Entries without a usable start are dropped.
    fn from_raw(raw: RawSession) -> Option<Self> {
        let start = match raw.start.as_deref().map(parse_timestamp) {
            Some(Ok(start)) => start,
            Some(Err(e)) => {
                warn!("Dropping session: {}", e);
                return None;
            }
            None => {
                warn!("Dropping session without a start timestamp");
                return None;
            }
        };
        let end = raw.end.as_deref().and_then(|s| parse_timestamp(s).ok());
        let seconds = match (raw.seconds, end) {
            (Some(secs), _) if secs.is_finite() => secs.round().max(0.0) as i64,
            (Some(_), _) => 0,
            (None, Some(end)) => end.signed_duration_since(start).num_seconds().max(0),
            (None, None) => 0,
        };
        // The duration has to fit on the calendar after `start`
        let Some(implied_end) =
            Duration::try_seconds(seconds).and_then(|span| start.checked_add_signed(span))
        else {
            warn!(seconds, "Dropping session with an out-of-range duration");
            return None;
        };
        Some(Self {
            start,
            end: end.unwrap_or(implied_end),
            seconds: seconds as u64,
        })
    }
}

#[derive(Deserialize)]
struct RawSession {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    seconds: Option<f64>,
}

fn deserialize_sessions<'de, D>(deserializer: D) -> Result<Vec<Session>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<RawSession>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(Session::from_raw)
        .collect())
}

fn serialize_stamp<S: Serializer>(stamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_stamp(*stamp))
}

/// Format a UTC instant the way it is stored on disk ("2025-03-01T09:00:00+00:00").
pub fn format_stamp(stamp: DateTime<Utc>) -> String {
    stamp.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parse a stored timestamp. Values without an offset are read as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TrackerError> {
    let value = value.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(stamp.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| TrackerError::ClockParse(value.to_string()))
}

/// Strict `YYYY-MM-DD` parsing. Blank input means "no due date".
pub fn parse_due(input: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ValidationError::InvalidDate(input.to_string()))
}

/// Normalize a free-form course tag into its grouping key.
pub fn course_key(course: Option<&str>) -> &str {
    match course.map(str::trim) {
        Some(c) if !c.is_empty() => c,
        _ => UNASSIGNED,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The user-editable fields of a task, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    pub text: String,
    pub due: Option<NaiveDate>,
    pub course: Option<String>,
    pub url: Option<String>,
}

impl TaskFields {
    pub fn parse(
        text: &str,
        due: Option<&str>,
        course: Option<&str>,
        url: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyText);
        }
        let due = match due {
            Some(raw) => parse_due(raw)?,
            None => None,
        };

        Ok(Self {
            text: text.to_string(),
            due,
            course: non_blank(course),
            url: non_blank(url),
        })
    }
}

/// One to-do item with its time-tracking history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub due: Option<NaiveDate>,
    /// Local creation time, second precision. Stable tie-break for sorting.
    #[serde(default)]
    pub created: NaiveDateTime,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default, deserialize_with = "deserialize_sessions")]
    pub sessions: Vec<Session>,
    /// Raw stored start of the running timer. Parsed lazily so a corrupted
    /// value only matters when the timer is read or stopped.
    #[serde(default, alias = "runningStart")]
    pub running_start: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Task {
    pub fn new(fields: TaskFields, created: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: fields.text,
            done: false,
            due: fields.due,
            created: created.trunc_subsecs(0),
            course: fields.course,
            sessions: Vec::new(),
            running_start: None,
            url: fields.url,
        }
    }

    /// Replace the editable fields. Time tracking is left alone.
    pub fn apply(&mut self, fields: TaskFields) {
        self.text = fields.text;
        self.due = fields.due;
        self.course = fields.course;
        self.url = fields.url;
    }

    pub fn course_key(&self) -> &str {
        course_key(self.course.as_deref())
    }

    /// Due date as stored ("YYYY-MM-DD"), if any
    pub fn due_label(&self) -> Option<String> {
        self.due.map(|d| d.format("%Y-%m-%d").to_string())
    }

    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn created() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_fields_reject_empty_text() {
        let err = TaskFields::parse("   ", None, None, None).unwrap_err();
        assert_eq!(err, ValidationError::EmptyText);
    }

    #[test]
    fn test_due_parsing_is_strict_and_canonical() {
        assert_eq!(
            parse_due(" 2025-3-1 ").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
        assert_eq!(parse_due("").unwrap(), None);
        assert!(parse_due("03/01/2025").is_err());
        assert!(parse_due("2025-02-30").is_err());

        let fields = TaskFields::parse("Essay", Some("2025-3-1"), None, None).unwrap();
        let task = Task::new(fields, created());
        assert_eq!(task.due_label().as_deref(), Some("2025-03-01"));
    }

    #[test]
    fn test_fields_trim_and_blank_to_none() {
        let fields = TaskFields::parse("  Read Ch.3 ", Some(" "), Some("  "), Some(" ")).unwrap();
        assert_eq!(fields.text, "Read Ch.3");
        assert_eq!(fields.due, None);
        assert_eq!(fields.course, None);
        assert_eq!(fields.url, None);
    }

    #[test]
    fn test_course_key_normalization() {
        assert_eq!(course_key(None), UNASSIGNED);
        assert_eq!(course_key(Some("")), UNASSIGNED);
        assert_eq!(course_key(Some("   ")), UNASSIGNED);
        assert_eq!(course_key(Some(" 585 ")), "585");
    }

    #[test]
    fn test_session_seconds_rounded_and_never_negative() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let end = start + chrono::Duration::milliseconds(90_600);
        assert_eq!(Session::between(start, end).seconds, 91);

        let before = start - chrono::Duration::seconds(5);
        assert_eq!(Session::between(start, before).seconds, 0);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-03-01T09:00:00+00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-03-01T10:00:00+01:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-03-01T09:00:00").unwrap(), expected);
        assert!(matches!(
            parse_timestamp("yesterday-ish"),
            Err(TrackerError::ClockParse(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let fields =
            TaskFields::parse("Read Ch.3", Some("2025-03-01"), Some("585"), Some("https://x.org"))
                .unwrap();
        let mut task = Task::new(fields, created());
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        task.sessions
            .push(Session::between(start, start + chrono::Duration::seconds(90)));

        let json = serde_json::to_string_pretty(&task).unwrap();
        assert!(json.contains("\"start\": \"2025-03-01T09:00:00+00:00\""));
        assert!(json.contains("\"due\": \"2025-03-01\""));
        assert!(json.contains("\"running_start\": null"));

        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_load_legacy_record_coerces_sessions() {
        let json = r#"{
            "id": "6f1c2d2e-8f53-4a5e-9a57-1b8d0f0e6f11",
            "text": "Problem set",
            "done": false,
            "due": null,
            "created": "2025-10-01T18:22:05",
            "course": "550",
            "sessions": [
                {"start": "2025-10-02T15:00:00+00:00", "end": "2025-10-02T15:02:00+00:00", "seconds": 120},
                {"start": "2025-10-03T15:00:00+00:00", "end": "2025-10-03T15:01:00+00:00"},
                {"start": "2025-10-04T15:00:00+00:00", "seconds": -4},
                {"end": "2025-10-05T15:00:00+00:00", "seconds": 30},
                {"start": "garbage", "seconds": 30}
            ],
            "runningStart": "2025-10-06T08:00:00+00:00"
        }"#;

        let task: Task = serde_json::from_str(json).unwrap();
        let seconds: Vec<u64> = task.sessions.iter().map(|s| s.seconds).collect();
        assert_eq!(seconds, vec![120, 60, 0]);
        assert_eq!(task.sessions[2].end, task.sessions[2].start);
        assert_eq!(task.running_start.as_deref(), Some("2025-10-06T08:00:00+00:00"));
        assert_eq!(task.url, None);
        assert_eq!(task.course_key(), "550");
    }

    #[test]
    fn test_load_drops_sessions_past_the_calendar() {
        let json = r#"{
            "id": "6f1c2d2e-8f53-4a5e-9a57-1b8d0f0e6f11",
            "text": "x",
            "created": "2025-10-01T18:22:05",
            "sessions": [
                {"start": "2025-10-02T15:00:00+00:00", "seconds": 1e15},
                {"start": "2025-10-02T16:00:00+00:00", "end": "2025-10-02T16:00:10+00:00", "seconds": 1e19},
                {"start": "2025-10-02T17:00:00+00:00", "seconds": 45}
            ]
        }"#;

        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.sessions.len(), 1);
        assert_eq!(task.sessions[0].seconds, 45);
        assert_eq!(
            task.sessions[0].end,
            Utc.with_ymd_and_hms(2025, 10, 2, 17, 0, 45).unwrap()
        );
    }
}
