//! SQLite repositories
//!
//! Free functions over `&SqlitePool`. Types (ProjectRow, TaskRow, etc.) live
//! in `crate::data::types`.

pub mod activity;
pub mod budget;
pub mod comment;
pub mod file;
pub mod invitation;
pub mod notification;
pub mod project;
pub mod risk;
pub mod task;
pub mod team;
pub mod user;

/// Parse a TEXT enum column, falling back (with a warning) on unknown values
pub(crate) fn parse_column<T>(
    raw: &str,
    parse: fn(&str) -> Option<T>,
    fallback: T,
    column: &'static str,
) -> T {
    parse(raw).unwrap_or_else(|| {
        tracing::warn!(column, value = raw, "Unknown enum value in database");
        fallback
    })
}

/// Split a `GROUP_CONCAT` id list
pub(crate) fn split_ids(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}
