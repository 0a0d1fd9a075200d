//! Storage locations for the sharecycle service.

use std::path::PathBuf;

/// App data root: `~/.local/share/sharecycle/` (Linux) or
/// `~/Library/Application Support/sharecycle/` (macOS).
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("sharecycle"))
}

/// SQLite database file: `<app_data_dir>/sharecycle.db`.
pub fn db_path() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("sharecycle.db"))
}
