//! The browsing surface the bot drives.
//!
//! [`FeedBrowser`] is the boundary between the workflow (search, sort, crawl,
//! extract) and whatever actually renders the news site. Locators are XPath
//! expressions from [`crate::locators`]. Every call is blocking; the only
//! suspension points are the timeout-bounded waits provided here.
//!
//! # Implementations
//!
//! | Type | Module | Notes |
//! |------|--------|-------|
//! | `ChromeBrowser` | [`chrome`] | Chromium over CDP via `chromiumoxide` |

pub mod chrome;

use crate::errors::{BotError, Result};
use crate::locators::timeouts;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long to wait for navigation before handing control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Wait for the full load event.
    Normal,
    /// Return once the DOM is ready.
    Eager,
    /// Return as soon as navigation starts.
    None,
}

impl std::str::FromStr for LoadStrategy {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(LoadStrategy::Normal),
            "eager" => Ok(LoadStrategy::Eager),
            "none" => Ok(LoadStrategy::None),
            other => Err(BotError::Config(format!("unknown page load strategy `{other}`"))),
        }
    }
}

/// Capabilities applied when a session is opened.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub load_strategy: LoadStrategy,
    /// How long element actions keep looking for a missing element.
    pub implicit_wait: Duration,
    pub page_load: Duration,
    pub script: Duration,
}

impl SessionOptions {
    pub fn new(load_strategy: LoadStrategy) -> Self {
        SessionOptions {
            load_strategy,
            implicit_wait: timeouts::IMPLICIT_WAIT,
            page_load: timeouts::PAGE_LOAD,
            script: timeouts::SCRIPT,
        }
    }
}

/// A single browser session showing the news site.
///
/// Element actions fail with [`BotError::Browser`] when the locator matches
/// nothing; [`FeedBrowser::contains`] is the non-failing presence check.
pub trait FeedBrowser {
    /// Launch a session and navigate to `url`.
    fn open(&mut self, url: &str, options: &SessionOptions) -> Result<()>;

    /// Close every session this browser owns. Closing nothing is not an error.
    fn close_all(&mut self) -> Result<()>;

    fn go_to(&mut self, url: &str) -> Result<()>;

    /// Current location of the page.
    fn location(&mut self) -> Result<String>;

    fn reload(&mut self) -> Result<()>;

    /// Whether any element matches `locator` right now.
    fn contains(&mut self, locator: &str) -> Result<bool>;

    fn click(&mut self, locator: &str) -> Result<()>;

    /// Replace the value of an input field.
    fn input_text(&mut self, locator: &str, text: &str) -> Result<()>;

    /// Current value of an input field.
    fn value(&mut self, locator: &str) -> Result<String>;

    fn submit_form(&mut self, locator: &str) -> Result<()>;

    /// Choose the option with `value` in a `<select>`.
    fn select_value(&mut self, locator: &str, value: &str) -> Result<()>;

    fn selected_value(&mut self, locator: &str) -> Result<String>;

    fn scroll_into_view(&mut self, locator: &str) -> Result<()>;

    /// Read a DOM property (falling back to the attribute) of the element.
    fn attribute(&mut self, locator: &str, name: &str) -> Result<String>;

    /// Rendered text of the element.
    fn text(&mut self, locator: &str) -> Result<String>;

    /// Block until `locator` matches, or fail after `timeout`.
    fn wait_until_present(&mut self, locator: &str, timeout: Duration) -> Result<()> {
        let t0 = Instant::now();
        loop {
            if self.contains(locator)? {
                debug!(locator, elapsed_ms = t0.elapsed().as_millis() as u64, "element present");
                return Ok(());
            }
            if t0.elapsed() >= timeout {
                return Err(BotError::Browser(format!(
                    "timed out after {timeout:?} waiting for {locator}"
                )));
            }
            std::thread::sleep(timeouts::POLL);
        }
    }

    /// Block until `locator` no longer matches, or fail after `timeout`.
    fn wait_until_absent(&mut self, locator: &str, timeout: Duration) -> Result<()> {
        let t0 = Instant::now();
        loop {
            if !self.contains(locator)? {
                return Ok(());
            }
            if t0.elapsed() >= timeout {
                return Err(BotError::Browser(format!(
                    "timed out after {timeout:?} waiting for {locator} to disappear"
                )));
            }
            std::thread::sleep(timeouts::POLL);
        }
    }

    /// Wait for the element to appear, then click it.
    fn click_when_clickable(&mut self, locator: &str, timeout: Duration) -> Result<()> {
        self.wait_until_present(locator, timeout)?;
        self.click(locator)
    }
}

#[cfg(test)]
pub(crate) mod fake;
