//! Utility functions for string normalization and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Query slugification (the form counted inside article links)
//! - Link slug extraction for image filenames
//! - String truncation for log lines
//! - File system validation for output directories

use std::fs;
use std::path::Path;
use tracing::{info, instrument};

/// Convert a free-text query into its slug form.
///
/// Lowercases the text, drops everything that is not alphanumeric, a space
/// or a hyphen, and collapses runs of separators into a single `-`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify_query("Climate  Change!"), "climate-change");
/// assert_eq!(slugify_query("  U.S. economy "), "us-economy");
/// ```
pub fn slugify_query(query: &str) -> String {
    query
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && !c.is_whitespace() && c != '-', "")
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Text typed into the search bar for a slugified query.
pub fn search_text(query_slug: &str) -> String {
    query_slug.replace('-', " ")
}

/// The final `/`-delimited segment of a link.
///
/// A trailing slash yields an empty slug, as splitting does.
pub fn link_slug(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut after `max` characters with an ellipsis and a byte
/// count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if missing, then writes and removes a scratch file.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn ensure_writable_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)?;
    let scratch_path = path.join("..__write_check__");
    fs::File::create(&scratch_path)?;
    let _ = fs::remove_file(&scratch_path);
    info!("Output directory is writable");
    Ok(())
}
