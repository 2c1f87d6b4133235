pub mod generator;
pub mod stats;

pub use generator::{default_report_path, render_report, write_report, ReportOptions};
