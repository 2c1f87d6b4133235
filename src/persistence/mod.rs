pub mod files;
pub mod links;
pub mod settings;
pub mod store;

pub use files::{
    atomic_write, backup_file, ensure_data_dir, get_data_dir, init_local_dir, read_file,
    LINKS_FILE, SETTINGS_FILE, TASKS_FILE,
};
pub use links::{link_for, load_links, normalize_target, save_links, set_link, CourseLinks};
pub use settings::{load_settings, save_settings, Settings};
pub use store::TaskStore;
