//! Cross-platform results file locations.
//!
//! Every binary that touches results files resolves them through here, so
//! the windowed frontend writes exactly where the report CLI says to look.

use std::path::PathBuf;

/// Directory session results are written to.
pub fn results_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eriksen")
        .join("results")
}

/// Participant IDs land in the results filename.
pub fn sanitize_id(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "anon".to_string()
    } else {
        cleaned
    }
}

/// Default per-session results file: `<participant>_<started_unix>.csv`
/// under [`results_dir`].
pub fn default_results_path(participant: &str, started_unix: Option<u64>) -> PathBuf {
    results_dir().join(format!(
        "{}_{}.csv",
        sanitize_id(participant),
        started_unix.unwrap_or(0)
    ))
}
