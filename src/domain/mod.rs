pub mod enums;
pub mod task;
pub mod timer;
pub mod views;

pub use enums::{SortDirection, StatusFilter};
pub use task::{course_key, Session, Task, TaskFields};
pub use timer::format_seconds;
pub use views::{
    apply_archive_visibility, apply_course_filter, filter_by_status, group_by_course,
    order_course_keys, sort_by_due, status_badge,
};
