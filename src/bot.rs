//! The news-feed workflow.
//!
//! [`NewsBot`] implements [`Bot`] for one query against the news site's
//! search page:
//!
//! 1. **Configure**: validate settings from the CLI/environment
//! 2. **Prepare**: output directories, the sink (once per job), a fresh
//!    browser session at the site URL, the limit date (once per job)
//! 3. **Run**: open the search bar, type the query, submit, sort by date,
//!    then crawl the results into the sink
//! 4. **Finish**: flush the sink, close the browser, report the record count
//!
//! Every search step is wrapped with [`retry`] and performs its own recovery
//! action before re-raising. Crawl position, tallies, limit date and sink
//! live on the job and survive whole-job restarts.

use crate::assets::AssetFetcher;
use crate::browser::{FeedBrowser, SessionOptions};
use crate::cli::ConfigArgs;
use crate::config::JobConfig;
use crate::crawler::{CrawlEnd, PaginationCrawler};
use crate::errors::{BotError, Result};
use crate::extract::{RecordExtractor, limit_date};
use crate::lifecycle::{Bot, Tally};
use crate::locators::{self, timeouts};
use crate::models::JobStatus;
use crate::retry::retry;
use crate::sink::{RecordSink, SinkBridge, SinkMode};
use crate::utils::search_text;
use chrono::{Local, NaiveDate, NaiveDateTime};
use tracing::{debug, error, info, instrument};
use url::Url;

/// Retry ceiling used before configuration has been read.
pub const DEFAULT_RETRY_MAX: usize = 5;

/// State that belongs to the job as a whole, not to one attempt.
#[derive(Debug)]
struct Job {
    started_at: NaiveDateTime,
    limit_date: Option<NaiveDate>,
    tally: Tally,
    crawler: Option<PaginationCrawler>,
}

pub struct NewsBot<B: FeedBrowser, A: AssetFetcher> {
    args: ConfigArgs,
    mode: SinkMode,
    browser: B,
    assets: A,
    config: Option<JobConfig>,
    job: Job,
    sink: Option<SinkBridge>,
    extractor: Option<RecordExtractor>,
}

fn not_ready(what: &str) -> BotError {
    BotError::Environment(format!("{what} is not prepared"))
}

impl<B: FeedBrowser, A: AssetFetcher> NewsBot<B, A> {
    pub fn new(args: ConfigArgs, mode: SinkMode, browser: B, assets: A) -> Self {
        Self::starting_at(args, mode, browser, assets, Local::now().naive_local())
    }

    /// Build a bot whose job is considered started at `started_at`.
    pub fn starting_at(
        args: ConfigArgs,
        mode: SinkMode,
        browser: B,
        assets: A,
        started_at: NaiveDateTime,
    ) -> Self {
        NewsBot {
            args,
            mode,
            browser,
            assets,
            config: None,
            job: Job {
                started_at,
                limit_date: None,
                tally: Tally::new(),
                crawler: None,
            },
            sink: None,
            extractor: None,
        }
    }

    fn config(&self) -> Result<&JobConfig> {
        self.config.as_ref().ok_or_else(|| not_ready("configuration"))
    }

    fn setup(&mut self) -> Result<()> {
        let config = self.config()?.clone();
        config.output.create_all()?;
        info!(root = %config.output.root().display(), "Output directories ready");

        if self.sink.is_none() {
            let sink = SinkBridge::open(
                self.mode,
                &config.output,
                self.job.started_at,
                &config.sheet_name,
            )?;
            info!(mode = ?sink.mode(), "Sink opened");
            self.sink = Some(sink);
        }

        self.browser.close_all()?;
        let options = SessionOptions::new(config.load_strategy);
        retry("open_browser", config.retry_max, || {
            open_browser(&mut self.browser, &config.url, &options)
        })?;

        let started = self.job.started_at.date();
        let limit = *self
            .job
            .limit_date
            .get_or_insert_with(|| limit_date(started, config.months));
        if self.job.crawler.is_none() {
            self.job.crawler = Some(PaginationCrawler::new(config.retry_max));
        }
        self.extractor = Some(RecordExtractor::new(
            config.query.clone(),
            limit,
            config.output.imgs(),
            config.retry_max,
        ));
        info!(%limit, "Environment set up");
        Ok(())
    }

    /// Crawl the results, completing every record into the sink.
    ///
    /// Reaching the limit date stops the job, so a later pass claims nothing.
    fn process_articles(&mut self) -> Result<()> {
        let NewsBot {
            browser,
            assets,
            job,
            sink,
            extractor,
            ..
        } = &mut *self;
        let extractor = extractor.as_ref().ok_or_else(|| not_ready("extractor"))?;
        let sink = sink.as_mut().ok_or_else(|| not_ready("sink"))?;
        let crawler = job.crawler.as_mut().ok_or_else(|| not_ready("crawler"))?;
        let tally = &mut job.tally;

        let end = crawler.crawl(browser, assets, extractor, &mut |record| {
            tally.complete(JobStatus::Success, || sink.deliver(&record))
        })?;
        info!(
            next_position = crawler.position(),
            ?end,
            "Finished processing articles"
        );
        if end == CrawlEnd::LimitReached {
            self.stop();
        }
        Ok(())
    }
}

impl<B: FeedBrowser, A: AssetFetcher> Bot for NewsBot<B, A> {
    fn configure(&mut self) -> Result<()> {
        self.config = Some(JobConfig::from_args(&self.args)?);
        Ok(())
    }

    #[instrument(level = "info", skip(self))]
    fn prepare_environment(&mut self) -> Result<()> {
        self.setup().map_err(|e| {
            error!(error = %e, "Error setting up environment");
            match e {
                BotError::Config(_) | BotError::Environment(_) => e,
                other => BotError::environment(other),
            }
        })
    }

    #[instrument(level = "info", skip(self))]
    fn start_job(&mut self) -> Result<()> {
        info!("Started job execution");
        let config = self.config()?.clone();
        let max = config.retry_max;
        let text = search_text(&config.query);

        retry("click_search_icon", max, || {
            click_search_icon(&mut self.browser, &config.url)
        })?;
        retry("input_search", max, || input_search(&mut self.browser, &text))?;
        retry("send_search_form", max, || {
            send_search_form(&mut self.browser, &text)
        })?;
        retry("sort_search_content", max, || {
            sort_by_date(&mut self.browser)
        })?;
        self.process_articles()
    }

    fn finish_job(&mut self) -> Result<usize> {
        self.release()?;
        let records = self.job.tally.records();
        let stopped = self.job.crawler.as_ref().is_some_and(|c| c.should_stop());
        info!(records, stopped, "Automation read {records} articles");
        Ok(records)
    }

    fn finish_job_with_error(&mut self, attempts: usize, error: &BotError) {
        if let Err(e) = self.release() {
            error!(error = %e, "Failed to release resources");
        }
        error!(
            attempts,
            records = self.job.tally.records(),
            error = %error,
            "After {attempts} attempts, the job was finished with exception"
        );
    }

    fn release(&mut self) -> Result<()> {
        let flushed = match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        };
        let closed = self.browser.close_all();
        debug!("Resources released");
        flushed.and(closed)
    }

    fn stop(&mut self) {
        if let Some(crawler) = self.job.crawler.as_mut() {
            crawler.stop();
        }
    }

    fn retry_ceiling(&self) -> usize {
        self.config
            .as_ref()
            .map_or(DEFAULT_RETRY_MAX, |config| config.retry_max)
    }

    fn tally(&mut self) -> &mut Tally {
        &mut self.job.tally
    }
}

fn same_location(location: &str, url: &Url) -> bool {
    Url::parse(location).is_ok_and(|location| location == *url)
}

/// Make sure the session shows `url`, navigating once if it does not.
fn validate_location(browser: &mut dyn FeedBrowser, url: &Url) -> Result<()> {
    if same_location(&browser.location()?, url) {
        info!(%url, "Driver in correct url");
        return Ok(());
    }
    info!(%url, "Navigating");
    browser.go_to(url.as_str())?;
    let location = browser.location()?;
    if same_location(&location, url) {
        Ok(())
    } else {
        Err(BotError::Browser(format!("browser is at {location}, expected {url}")))
    }
}

fn open_browser(browser: &mut dyn FeedBrowser, url: &Url, options: &SessionOptions) -> Result<()> {
    browser.open(url.as_str(), options)?;
    debug!("Browser opened");
    if let Err(e) = validate_location(browser, url) {
        browser.close_all()?;
        return Err(e);
    }
    debug!("Browser URL validated");
    Ok(())
}

fn open_search_bar(browser: &mut dyn FeedBrowser) -> Result<()> {
    browser.click_when_clickable(locators::SEARCH_ICON, timeouts::SEARCH_ICON)?;
    browser.wait_until_present(locators::SEARCH_BAR, timeouts::SEARCH_BAR)
}

/// Open the search bar; on failure go back to the home page first.
fn click_search_icon(browser: &mut dyn FeedBrowser, url: &Url) -> Result<()> {
    match open_search_bar(browser) {
        Ok(()) => {
            info!("Clicked search icon");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Search bar did not open");
            browser.go_to(url.as_str())?;
            browser.wait_until_present(locators::SEARCH_ICON, timeouts::SEARCH_RECOVERY)?;
            Err(BotError::Search(format!("search icon: {e}")))
        }
    }
}

fn input_search(browser: &mut dyn FeedBrowser, text: &str) -> Result<()> {
    browser.input_text(locators::SEARCH_BAR, text)?;
    let typed = browser.value(locators::SEARCH_BAR)?;
    if typed != text {
        return Err(BotError::Search(format!(
            "search bar holds `{typed}`, expected `{text}`"
        )));
    }
    info!("Query typed in search-bar");
    Ok(())
}

/// Submit the search; on failure re-type the query before re-raising.
fn send_search_form(browser: &mut dyn FeedBrowser, text: &str) -> Result<()> {
    browser.submit_form(locators::FORM)?;
    info!(query = text, "Searched");
    if let Err(e) = browser.wait_until_present(locators::RESULTS, timeouts::SEARCH_RESULTS) {
        error!(error = %e, "Search results did not load");
        input_search(browser, text)?;
        return Err(BotError::Search(format!("search results: {e}")));
    }
    info!("Search results loaded");
    Ok(())
}

fn select_date_order(browser: &mut dyn FeedBrowser) -> Result<()> {
    browser.wait_until_present(locators::SORT_SELECTION, timeouts::SORT_SELECTION)?;
    browser.select_value(locators::SORT_SELECTION, locators::SORT_BY_DATE)?;
    browser.wait_until_present(locators::RESULTS, timeouts::RESULTS)?;
    let selected = browser.selected_value(locators::SORT_SELECTION)?;
    if selected != locators::SORT_BY_DATE {
        return Err(BotError::Sort(format!("sort option is `{selected}`")));
    }
    Ok(())
}

/// Sort results newest-first; on failure reload before re-raising.
fn sort_by_date(browser: &mut dyn FeedBrowser) -> Result<()> {
    match select_date_order(browser) {
        Ok(()) => {
            info!("Sorted results by date");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Sorting failed");
            browser.reload()?;
            Err(match e {
                BotError::Sort(_) => e,
                other => BotError::Sort(other.to_string()),
            })
        }
    }
}
