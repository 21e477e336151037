//! Turning one listing item into a classified [`Record`].
//!
//! The extractor reads the headline, date, summary and image of the item at
//! a given locator and decides what to do with it:
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | no date region | [`Extraction::Skip`] (not a news item) |
//! | date does not match `D Mon YYYY` | [`Extraction::Skip`] |
//! | date older than the limit date | [`Extraction::Stop`] |
//! | otherwise | [`Extraction::Record`] |
//!
//! # Sorted-feed assumption
//!
//! `Stop` ends the whole crawl. This is only correct because the results are
//! sorted newest-first; an out-of-order older item ends the crawl early and
//! later in-range items are never visited.

use crate::assets::{AssetFetcher, save_image};
use crate::browser::FeedBrowser;
use crate::errors::Result;
use crate::locators::article;
use crate::models::Record;
use crate::utils::{link_slug, truncate_for_log};
use chrono::{Datelike, Months, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// One-or-two-digit day, three-letter month, four-digit year.
static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([0-9]{1,2} [A-Za-z]{3} [0-9]{4})\b").expect("valid date regex"));

/// `$` followed by digit groups, or digit groups followed by `dollars`/`USD`.
static CURRENCY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\d{1,3}(?:[.,]?\d{1,3})*|\d{1,3}(?:[.,]?\d{1,3})*\s+(?:dollars|USD)\b")
        .expect("valid currency regex")
});

/// What the crawler should do with one listing item.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Record(Record),
    /// Not a usable record; keep crawling.
    Skip,
    /// Older than the limit date; the crawl must end.
    Stop,
}

/// Parse the first `D Mon YYYY` date found in `raw`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let found = DATE_PATTERN.captures(raw)?.get(1)?.as_str();
    NaiveDate::parse_from_str(found, "%d %b %Y").ok()
}

/// Whether `text` mentions an amount of money.
pub fn is_currency_related(text: &str) -> bool {
    CURRENCY_PATTERN.is_match(text)
}

/// Case-sensitive, non-overlapping occurrences of `needle` in `haystack`.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Oldest admissible publication date for a window of `months` months.
///
/// The window includes the start month, so `months` of `0` or `1` both mean
/// "since the first day of the current month".
pub fn limit_date(start: NaiveDate, months: u32) -> NaiveDate {
    let back = months.saturating_sub(1);
    start
        .with_day(1)
        .and_then(|first| first.checked_sub_months(Months::new(back)))
        .unwrap_or(NaiveDate::MIN)
}

/// Classifies listing items for one job.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    query_slug: String,
    limit_date: NaiveDate,
    image_dir: PathBuf,
    download_attempts: usize,
}

impl RecordExtractor {
    pub fn new(
        query_slug: impl Into<String>,
        limit_date: NaiveDate,
        image_dir: impl Into<PathBuf>,
        download_attempts: usize,
    ) -> Self {
        RecordExtractor {
            query_slug: query_slug.into(),
            limit_date,
            image_dir: image_dir.into(),
            download_attempts,
        }
    }

    /// Extract the item at `item`.
    ///
    /// Missing headline fields are structural errors and propagate; date
    /// problems and image failures never do.
    #[instrument(level = "debug", skip(self, browser, assets))]
    pub fn extract(
        &self,
        browser: &mut dyn FeedBrowser,
        assets: &mut dyn AssetFetcher,
        item: &str,
    ) -> Result<Extraction> {
        browser.scroll_into_view(item)?;
        let headline = article::headline_link(item);
        let link = browser.attribute(&headline, "href")?;
        info!(%link, "Started processing article");
        let title = browser.text(&headline)?;

        let raw_date = match browser.text(&article::date(item)) {
            Ok(raw) => raw,
            Err(_) => {
                info!(%link, "Article is not news");
                return Ok(Extraction::Skip);
            }
        };
        let Some(date) = parse_date(&raw_date) else {
            info!(%link, raw_date = %truncate_for_log(&raw_date, 60), "Unable to define date for article");
            return Ok(Extraction::Skip);
        };
        if date < self.limit_date {
            info!(%link, %date, limit = %self.limit_date, "Article is out of date range");
            return Ok(Extraction::Stop);
        }

        let description = browser.text(&article::summary(item))?;
        let image = article::image(item);
        let image_url = browser.attribute(&image, "src")?;
        let image_alt = browser.attribute(&image, "alt")?;

        let slug = link_slug(&link).to_string();
        let count = count_occurrences(&link, &self.query_slug);
        let money_related = is_currency_related(&description) || is_currency_related(&title);
        let picture_filename = save_image(
            assets,
            &image_url,
            &self.image_dir,
            &slug,
            self.download_attempts,
        );
        debug!(%slug, count, money_related, "Classified article");

        info!(%link, "All information obtained for article");
        Ok(Extraction::Record(Record {
            title,
            link,
            description,
            image_alt,
            image_url,
            date,
            count,
            money_related,
            slug,
            picture_filename,
        }))
    }
}
