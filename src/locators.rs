//! Named constants for the feed workflow.
//!
//! Selectors, timeouts and output directories are declared once here and
//! consumed by the browser, crawler and sink code. All locators are XPath
//! expressions against the news site's search page.

use std::time::Duration;

/// Output directories, relative to the configured output root.
pub mod dirs {
    pub const LOGS: &str = "logs";
    pub const IMGS: &str = "imgs";
    pub const EXCEL: &str = "excel";
    pub const QUEUE: &str = "queue";

    pub const ALL: [&str; 4] = [LOGS, IMGS, EXCEL, QUEUE];
}

/// Timeouts for UI waits and browser capabilities.
pub mod timeouts {
    use super::Duration;

    pub const IMPLICIT_WAIT: Duration = Duration::from_secs(5);
    pub const SCRIPT: Duration = Duration::from_secs(15);
    pub const PAGE_LOAD: Duration = Duration::from_secs(30);

    pub const SEARCH_ICON: Duration = Duration::from_secs(5);
    pub const SEARCH_BAR: Duration = Duration::from_secs(5);
    pub const SEARCH_RESULTS: Duration = Duration::from_secs(20);
    pub const SORT_SELECTION: Duration = Duration::from_secs(5);
    pub const RESULTS: Duration = Duration::from_secs(10);
    pub const LOADING: Duration = Duration::from_secs(10);
    pub const RESUME: Duration = Duration::from_secs(30);
    pub const SEARCH_RECOVERY: Duration = Duration::from_secs(10);

    /// Interval between presence checks in polling waits.
    pub const POLL: Duration = Duration::from_millis(200);
}

pub const SEARCH_ICON: &str = "//header//div[contains(@class, 'search-trigger')]/button";
pub const FORM: &str = "//form[@role='search']";
pub const SEARCH_BAR: &str = "//form[@role='search']//input[contains(@class, 'search-bar')]";
pub const SORT_SELECTION: &str = "//select[@id='search-sort-option']";
pub const ARTICLE: &str = "//article";
pub const SHOW_MORE: &str = "//button[contains(@class, 'show-more-button')]";
pub const LOADING: &str = "//div[@class='loading-animation']";
pub const FOOTER: &str = "//footer[@class='site-footer']";
pub const RESULTS: &str = "//div[@class='search-result__list']";

/// Sort option value for newest-first ordering.
pub const SORT_BY_DATE: &str = "date";

/// Locator of the listing item at a 1-based `position`.
pub fn article_at(position: usize) -> String {
    format!("{ARTICLE}[{position}]")
}

/// Sub-locators relative to one listing item.
pub mod article {
    pub fn headline_link(item: &str) -> String {
        format!("{item}//h3//a")
    }

    pub fn date(item: &str) -> String {
        format!("{item}//footer//span[@aria-hidden]")
    }

    pub fn summary(item: &str) -> String {
        format!("{item}//p")
    }

    pub fn image(item: &str) -> String {
        format!("{item}//img")
    }
}
