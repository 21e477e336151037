//! Resumable traversal of the infinite-scroll result listing.
//!
//! The crawler walks listing positions `1, 2, 3, ...`, revealing more items
//! with the show-more button when it runs past the visible ones. Position is
//! the only checkpoint and lives in memory: when a step fails the page is
//! reloaded, more items are revealed until the failed position is visible
//! again, and the error is re-raised so the retry wrapper counts it and the
//! next attempt picks up at that same position.
//!
//! Reaching an item older than the limit date ends the crawl with
//! [`CrawlEnd::LimitReached`]; raising the stop flag is left to the caller.

use crate::assets::AssetFetcher;
use crate::browser::FeedBrowser;
use crate::errors::{BotError, Result};
use crate::extract::{Extraction, RecordExtractor};
use crate::locators::{self, article_at, timeouts};
use crate::models::Record;
use crate::retry::retry;
use tracing::{error, info, instrument};

/// Next listing position to examine, plus the one currently being examined.
///
/// `next` only moves backwards through [`Cursor::rewind`], and then by
/// exactly one step onto the position whose processing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    next: usize,
    in_flight: Option<usize>,
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor {
            next: 1,
            in_flight: None,
        }
    }
}

impl Cursor {
    /// Take the next position and advance past it immediately.
    pub fn claim(&mut self) -> usize {
        let position = self.next;
        self.next += 1;
        self.in_flight = Some(position);
        position
    }

    /// The claimed position was fully handled.
    pub fn complete(&mut self) {
        self.in_flight = None;
    }

    /// Give back an unfinished claim; returns the position to resume at.
    pub fn rewind(&mut self) -> usize {
        if let Some(position) = self.in_flight.take() {
            self.next = position;
        }
        self.next
    }

    /// 1-based position that will be examined next.
    pub fn position(&self) -> usize {
        self.next
    }
}

/// How a crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlEnd {
    /// The listing ran out of items.
    Exhausted,
    /// An item older than the limit date was reached.
    LimitReached,
    /// The stop flag was raised before the next position was claimed.
    Stopped,
}

/// Crawl state for one job: position and the cooperative stop flag.
#[derive(Debug)]
pub struct PaginationCrawler {
    cursor: Cursor,
    should_stop: bool,
    max_attempts: usize,
}

impl PaginationCrawler {
    pub fn new(max_attempts: usize) -> Self {
        PaginationCrawler {
            cursor: Cursor::default(),
            should_stop: false,
            max_attempts,
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn should_stop(&self) -> bool {
        self.should_stop
    }

    /// Ask the loop to end; observed before the next position is claimed.
    pub fn stop(&mut self) {
        info!("Automation must stop processing");
        self.should_stop = true;
    }

    /// Run the crawl until the stop flag is raised, the limit date is
    /// reached or the feed is exhausted.
    ///
    /// Each extracted record is handed to `deliver` in listing order. The
    /// whole pass is wrapped with the retry policy; every failed attempt has
    /// already reloaded the page and walked back to its position.
    #[instrument(level = "info", skip_all, fields(start = self.cursor.position()))]
    pub fn crawl(
        &mut self,
        browser: &mut dyn FeedBrowser,
        assets: &mut dyn AssetFetcher,
        extractor: &RecordExtractor,
        deliver: &mut dyn FnMut(Record) -> Result<()>,
    ) -> Result<CrawlEnd> {
        let max = self.max_attempts;
        retry("process_articles", max, || {
            self.crawl_pass(&mut *browser, &mut *assets, extractor, &mut *deliver)
        })
    }

    fn crawl_pass(
        &mut self,
        browser: &mut dyn FeedBrowser,
        assets: &mut dyn AssetFetcher,
        extractor: &RecordExtractor,
        deliver: &mut dyn FnMut(Record) -> Result<()>,
    ) -> Result<CrawlEnd> {
        match self.walk(browser, assets, extractor, deliver) {
            Ok(end) => Ok(end),
            Err(e) => {
                let resume_at = self.cursor.rewind();
                error!(position = resume_at, error = %e, "Crawl failed; reloading page");
                let recovered = browser
                    .reload()
                    .and_then(|()| self.reach(&mut *browser, resume_at));
                if let Err(recovery) = recovered {
                    error!(position = resume_at, error = %recovery, "Recovery after crawl failure failed");
                }
                Err(BotError::crawl(resume_at, e))
            }
        }
    }

    fn walk(
        &mut self,
        browser: &mut dyn FeedBrowser,
        assets: &mut dyn AssetFetcher,
        extractor: &RecordExtractor,
        deliver: &mut dyn FnMut(Record) -> Result<()>,
    ) -> Result<CrawlEnd> {
        browser.wait_until_present(locators::RESULTS, timeouts::RESULTS)?;
        // A fresh page (after a whole-job restart) starts at the first batch.
        if self.cursor.position() > 1 {
            self.reach(browser, self.cursor.position())?;
        }

        while !self.should_stop {
            let position = self.cursor.claim();
            let item = article_at(position);
            info!(position, "Processing article");

            if !browser.contains(&item)? {
                info!(position, "Article not found");
                if !self.next_page(browser)? {
                    self.cursor.complete();
                    return Ok(CrawlEnd::Exhausted);
                }
            }

            match extractor.extract(browser, assets, &item)? {
                Extraction::Record(record) => deliver(record)?,
                Extraction::Skip => {}
                Extraction::Stop => {
                    self.cursor.complete();
                    info!(position, "Reached an article older than the limit date");
                    return Ok(CrawlEnd::LimitReached);
                }
            }
            self.cursor.complete();
        }
        Ok(CrawlEnd::Stopped)
    }

    /// Reveal one more batch; `false` when there is nothing left to load.
    fn next_page(&self, browser: &mut dyn FeedBrowser) -> Result<bool> {
        retry("next_page", self.max_attempts, || load_more(&mut *browser))
    }

    /// Reveal batches until `position` is visible or the feed runs out.
    fn reach(&self, browser: &mut dyn FeedBrowser, position: usize) -> Result<()> {
        info!(position, "Searching for article index");
        browser.wait_until_present(locators::RESULTS, timeouts::RESUME)?;
        while !browser.contains(&article_at(position))? {
            if !self.next_page(browser)? {
                break;
            }
        }
        info!(position, "Reached page containing article");
        Ok(())
    }
}

fn load_more(browser: &mut dyn FeedBrowser) -> Result<bool> {
    if !browser.contains(locators::SHOW_MORE)? {
        info!("Could not load next page");
        return Ok(false);
    }
    browser.scroll_into_view(locators::FOOTER)?;
    browser.click_when_clickable(locators::SHOW_MORE, timeouts::LOADING)?;
    browser.wait_until_present(locators::LOADING, timeouts::LOADING)?;
    browser.wait_until_absent(locators::LOADING, timeouts::LOADING)?;
    info!("Next page loaded");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::FlakyFetcher;
    use crate::browser::fake::{FakeFeed, FakeItem};
    use chrono::NaiveDate;

    fn extractor(dir: &std::path::Path, limit: NaiveDate) -> RecordExtractor {
        RecordExtractor::new("news", limit, dir, 1)
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn collect(
        crawler: &mut PaginationCrawler,
        feed: &mut FakeFeed,
        ex: &RecordExtractor,
    ) -> (Result<CrawlEnd>, Vec<Record>) {
        let mut assets = FlakyFetcher::default();
        let mut records = Vec::new();
        let result = crawler.crawl(feed, &mut assets, ex, &mut |r| {
            records.push(r);
            Ok(())
        });
        (result, records)
    }

    #[test]
    fn test_cursor_claims_then_rewinds_one_step() {
        let mut cursor = Cursor::default();
        assert_eq!(cursor.claim(), 1);
        cursor.complete();
        assert_eq!(cursor.claim(), 2);
        assert_eq!(cursor.position(), 3);
        assert_eq!(cursor.rewind(), 2);
        assert_eq!(cursor.rewind(), 2);
        assert_eq!(cursor.claim(), 2);
    }

    #[test]
    fn test_stop_condition_discards_older_item() {
        let temp = tempfile::TempDir::new().unwrap();
        let items = vec![
            FakeItem::news("may", "1 May 2024"),
            FakeItem::news("april", "1 Apr 2024"),
            FakeItem::news("february", "1 Feb 2024"),
        ];
        let mut feed = FakeFeed::showing_results(items, 10);
        let mut crawler = PaginationCrawler::new(3);
        let ex = extractor(temp.path(), ymd(2024, 3, 1));

        let (result, records) = collect(&mut crawler, &mut feed, &ex);
        assert_eq!(result.unwrap(), CrawlEnd::LimitReached);
        let slugs: Vec<_> = records.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["may", "april"]);
        assert_eq!(crawler.position(), 4);
        // the stop flag belongs to the caller
        assert!(!crawler.should_stop());
    }

    #[test]
    fn test_raised_stop_flag_ends_crawl_before_next_claim() {
        let temp = tempfile::TempDir::new().unwrap();
        let items = vec![FakeItem::news("a", "3 Jun 2024")];
        let mut feed = FakeFeed::showing_results(items, 10);
        let mut crawler = PaginationCrawler::new(3);
        crawler.stop();
        let ex = extractor(temp.path(), ymd(2024, 1, 1));

        let (result, records) = collect(&mut crawler, &mut feed, &ex);
        assert_eq!(result.unwrap(), CrawlEnd::Stopped);
        assert!(records.is_empty());
        assert!(feed.read_log.is_empty());
        assert_eq!(crawler.position(), 1);
    }

    #[test]
    fn test_crawl_loads_more_pages_until_exhausted() {
        let temp = tempfile::TempDir::new().unwrap();
        let items: Vec<_> = (1..=7)
            .map(|i| FakeItem::news(&format!("s{i}"), "10 Jun 2024"))
            .collect();
        let mut feed = FakeFeed::showing_results(items, 3);
        let mut crawler = PaginationCrawler::new(3);
        let ex = extractor(temp.path(), ymd(2024, 1, 1));

        let (result, records) = collect(&mut crawler, &mut feed, &ex);
        assert_eq!(result.unwrap(), CrawlEnd::Exhausted);
        assert_eq!(records.len(), 7);
        assert_eq!(feed.visible(), 7);
        assert!(!crawler.should_stop());
        assert_eq!(crawler.position(), 9);
    }

    #[test]
    fn test_skipped_items_do_not_stop_the_crawl() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut promo = FakeItem::news("promo", "");
        promo.date = None;
        let items = vec![
            FakeItem::news("a", "3 Jun 2024"),
            promo,
            FakeItem::news("b", "2 Jun 2024"),
        ];
        let mut feed = FakeFeed::showing_results(items, 10);
        let mut crawler = PaginationCrawler::new(3);
        let ex = extractor(temp.path(), ymd(2024, 1, 1));

        let (_, records) = collect(&mut crawler, &mut feed, &ex);
        assert_eq!(records.len(), 2);
        assert!(!crawler.should_stop());
    }

    #[test]
    fn test_resume_after_failure_restarts_at_failed_position() {
        let temp = tempfile::TempDir::new().unwrap();
        let items: Vec<_> = (1..=8)
            .map(|i| FakeItem::news(&format!("s{i}"), "10 Jun 2024"))
            .collect();
        let mut feed = FakeFeed::showing_results(items, 3);
        feed.headline_failures.insert(5, 1);
        let mut crawler = PaginationCrawler::new(3);
        let ex = extractor(temp.path(), ymd(2024, 1, 1));

        let (result, records) = collect(&mut crawler, &mut feed, &ex);
        result.unwrap();
        assert_eq!(feed.reloads, 1);
        let slugs: Vec<_> = records.iter().map(|r| r.slug.clone()).collect();
        let expected: Vec<_> = (1..=8).map(|i| format!("s{i}")).collect();
        assert_eq!(slugs, expected);
        // Position 5 was read once successfully after the reload, never 1 or 6 first.
        assert_eq!(feed.read_log, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_recovery_walk_leaves_cursor_on_failed_position() {
        let temp = tempfile::TempDir::new().unwrap();
        let items: Vec<_> = (1..=8)
            .map(|i| FakeItem::news(&format!("s{i}"), "10 Jun 2024"))
            .collect();
        let mut feed = FakeFeed::showing_results(items, 3);
        feed.headline_failures.insert(5, 1);
        let mut crawler = PaginationCrawler::new(3);
        let ex = extractor(temp.path(), ymd(2024, 1, 1));
        let mut assets = FlakyFetcher::default();
        let mut delivered = 0;

        let err = crawler
            .crawl_pass(&mut feed, &mut assets, &ex, &mut |_| {
                delivered += 1;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, BotError::Crawl { position: 5, .. }));
        assert_eq!(delivered, 4);
        assert_eq!(crawler.position(), 5);
        assert!(feed.visible() >= 5);
    }

    #[test]
    fn test_failed_reload_keeps_original_crawl_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let items: Vec<_> = (1..=4)
            .map(|i| FakeItem::news(&format!("s{i}"), "10 Jun 2024"))
            .collect();
        let mut feed = FakeFeed::showing_results(items, 3);
        feed.headline_failures.insert(2, 1);
        feed.reload_failures = 1;
        let mut crawler = PaginationCrawler::new(3);
        let ex = extractor(temp.path(), ymd(2024, 1, 1));
        let mut assets = FlakyFetcher::default();

        let err = crawler
            .crawl_pass(&mut feed, &mut assets, &ex, &mut |_| Ok(()))
            .unwrap_err();
        match err {
            BotError::Crawl { position, source } => {
                assert_eq!(position, 2);
                assert!(source.to_string().contains("stale element at 2"));
            }
            other => panic!("expected a crawl error, got {other:?}"),
        }
        assert_eq!(feed.reloads, 1);
        assert_eq!(crawler.position(), 2);
    }

    #[test]
    fn test_persistent_failure_exhausts_retries() {
        let temp = tempfile::TempDir::new().unwrap();
        let items = vec![FakeItem::news("a", "10 Jun 2024")];
        let mut feed = FakeFeed::showing_results(items, 3);
        let mut crawler = PaginationCrawler::new(2);
        let ex = extractor(temp.path(), ymd(2024, 1, 1));

        let mut assets = FlakyFetcher::default();
        let result = crawler.crawl(&mut feed, &mut assets, &ex, &mut |_| {
            Err(BotError::Sink("disk full".into()))
        });
        assert!(matches!(result, Err(BotError::Crawl { position: 1, .. })));
        assert_eq!(feed.reloads, 2);
        assert_eq!(crawler.position(), 1);
    }
}
