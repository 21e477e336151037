//! Data models for extracted feed records and job outcomes.
//!
//! This module defines the structures that travel between the crawler and
//! the sinks:
//! - [`Record`]: one classified news item, also the queue payload
//! - [`SheetRow`]: the six spreadsheet columns derived from a record
//! - [`JobStatus`]: outcome reported to the completion handler
//!
//! The serialized field names of [`Record`] (`url`, `img-alt`, `image`,
//! `matches-currency`, `file`, ...) form the producer/consumer transport
//! schema, so they are pinned with `#[serde(rename)]`.

use crate::errors::BotError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column headers written as the first spreadsheet row.
pub const SHEET_HEADER: [&str; 6] = [
    "title",
    "date",
    "description",
    "picture_filename",
    "phrase_count_in_title",
    "money_related",
];

/// A classified news item ready for delivery.
///
/// Records are immutable once the extractor returns them; the sink that
/// receives one owns it from then on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Headline text.
    pub title: String,
    /// Absolute link to the article.
    #[serde(rename = "url")]
    pub link: String,
    /// Short summary shown in the listing.
    pub description: String,
    /// Alt text of the listing image.
    #[serde(rename = "img-alt")]
    pub image_alt: String,
    /// Remote image URL.
    #[serde(rename = "image")]
    pub image_url: String,
    /// Publication date, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Occurrences of the query slug inside the link.
    pub count: usize,
    /// Whether the title or summary mentions an amount of money.
    #[serde(rename = "matches-currency")]
    pub money_related: bool,
    /// Trailing path segment of the link.
    pub slug: String,
    /// Local path of the downloaded image, empty if the download failed.
    #[serde(rename = "file")]
    pub picture_filename: String,
}

impl Record {
    /// Publication date in the sheet's `YYYY-MM-DD` form.
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// One spreadsheet row, in [`SHEET_HEADER`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub title: String,
    pub date: String,
    pub description: String,
    pub picture_filename: String,
    pub phrase_count_in_title: usize,
    pub money_related: bool,
}

impl From<&Record> for SheetRow {
    fn from(record: &Record) -> Self {
        SheetRow {
            title: record.title.clone(),
            date: record.date_string(),
            description: record.description.clone(),
            picture_filename: record.picture_filename.clone(),
            phrase_count_in_title: record.count,
            money_related: record.money_related,
        }
    }
}

/// Outcome passed to the completion handler.
///
/// | Status | Counter | Completion logic |
/// |--------|---------|------------------|
/// | `Success` | records | runs |
/// | `SystemError` | errors | skipped |
/// | `BusinessError` | errors | runs |
/// | `Unknown` | none | skipped (logged) |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    SystemError,
    BusinessError,
    Unknown,
}

impl From<&BotError> for JobStatus {
    /// Classify a failed unit of work.
    ///
    /// Bad data (unreadable payloads, invalid settings) is a business error
    /// and will fail the same way again. Resource and I/O failures are system
    /// errors worth another run. Search-workflow failures have no meaning for
    /// a single unit of work and stay `Unknown`.
    fn from(error: &BotError) -> Self {
        match error {
            BotError::Json(_) | BotError::Config(_) => JobStatus::BusinessError,
            BotError::Io(_)
            | BotError::Sink(_)
            | BotError::Queue(_)
            | BotError::Environment(_)
            | BotError::Browser(_)
            | BotError::Download(_) => JobStatus::SystemError,
            BotError::Crawl { source, .. } => JobStatus::from(source.as_ref()),
            BotError::Search(_) | BotError::Sort(_) => JobStatus::Unknown,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Success => "SUCCESS",
            JobStatus::SystemError => "SYSTEM_ERROR",
            JobStatus::BusinessError => "BUSINESS_ERROR",
            JobStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
pub(crate) fn sample_record(slug: &str, date: NaiveDate) -> Record {
    Record {
        title: format!("Title for {slug}"),
        link: format!("https://news.example.com/2024/{slug}"),
        description: "Markets rallied on Tuesday.".to_string(),
        image_alt: "a chart".to_string(),
        image_url: format!("https://img.example.com/{slug}.jpg"),
        date,
        count: 0,
        money_related: false,
        slug: slug.to_string(),
        picture_filename: String::new(),
    }
}
