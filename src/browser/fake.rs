//! In-memory news search page for tests.
//!
//! Models an infinite-scroll listing: `page_size` items are visible after
//! (re)loading, the show-more button reveals the next batch behind a loading
//! animation, and a reload collapses the listing back to the first batch.
//! Faults can be injected per position or per step.

use super::{FeedBrowser, SessionOptions};
use crate::errors::{BotError, Result};
use crate::locators;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct FakeItem {
    pub link: String,
    pub title: String,
    /// `None` models an item without the date region (not a news item).
    pub date: Option<String>,
    pub summary: String,
    pub image: String,
    pub alt: String,
}

impl FakeItem {
    pub fn news(slug: &str, date: &str) -> Self {
        FakeItem {
            link: format!("https://news.example.com/news/2024/{slug}"),
            title: format!("Story {slug}"),
            date: Some(date.to_string()),
            summary: format!("Summary of {slug}"),
            image: format!("https://img.example.com/{slug}.jpg"),
            alt: format!("Picture for {slug}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Loading {
    Idle,
    Shown,
}

#[derive(Debug)]
pub struct FakeFeed {
    pub items: Vec<FakeItem>,
    pub page_size: usize,
    visible: usize,
    loading: Loading,
    pub opened: bool,
    pub location: String,
    pub search_bar_open: bool,
    pub typed: String,
    pub submitted: bool,
    pub sort: String,
    pub reloads: usize,
    pub opens: usize,
    pub closes: usize,
    /// Remaining `open` calls that fail.
    pub open_failures: usize,
    /// Remaining search-icon clicks that fail.
    pub search_icon_failures: usize,
    /// Remaining `reload` calls that fail.
    pub reload_failures: usize,
    /// Remaining failed headline reads, per position.
    pub headline_failures: HashMap<usize, usize>,
    /// Every position whose headline was read, in order.
    pub read_log: Vec<usize>,
}

impl FakeFeed {
    pub fn new(items: Vec<FakeItem>, page_size: usize) -> Self {
        FakeFeed {
            items,
            page_size,
            visible: 0,
            loading: Loading::Idle,
            opened: false,
            location: String::new(),
            search_bar_open: false,
            typed: String::new(),
            submitted: false,
            sort: "relevance".to_string(),
            reloads: 0,
            opens: 0,
            closes: 0,
            open_failures: 0,
            search_icon_failures: 0,
            reload_failures: 0,
            headline_failures: HashMap::new(),
            read_log: Vec::new(),
        }
    }

    /// A feed already showing results, as after a successful search.
    pub fn showing_results(items: Vec<FakeItem>, page_size: usize) -> Self {
        let mut feed = FakeFeed::new(items, page_size);
        feed.opened = true;
        feed.visible = page_size;
        feed
    }

    pub fn visible(&self) -> usize {
        self.visible.min(self.items.len())
    }

    fn reset_listing(&mut self) {
        self.visible = self.page_size;
        self.loading = Loading::Idle;
    }

    /// Split `//article[N]<rest>` into `(N, rest)`.
    fn parse_article(locator: &str) -> Option<(usize, &str)> {
        let rest = locator.strip_prefix(locators::ARTICLE)?.strip_prefix('[')?;
        let close = rest.find(']')?;
        let position = rest[..close].parse().ok()?;
        Some((position, &rest[close + 1..]))
    }

    fn item(&self, position: usize) -> Option<&FakeItem> {
        if position == 0 || position > self.visible() {
            return None;
        }
        self.items.get(position - 1)
    }

    fn missing(locator: &str) -> BotError {
        BotError::Browser(format!("element not found: {locator}"))
    }
}

impl FeedBrowser for FakeFeed {
    fn open(&mut self, url: &str, _options: &SessionOptions) -> Result<()> {
        self.opens += 1;
        if self.open_failures > 0 {
            self.open_failures -= 1;
            return Err(BotError::Browser("chrome failed to start".into()));
        }
        self.opened = true;
        self.location = url.to_string();
        self.search_bar_open = false;
        self.submitted = false;
        self.reset_listing();
        Ok(())
    }

    fn close_all(&mut self) -> Result<()> {
        if self.opened {
            self.closes += 1;
        }
        self.opened = false;
        Ok(())
    }

    fn go_to(&mut self, url: &str) -> Result<()> {
        self.location = url.to_string();
        self.search_bar_open = false;
        self.reset_listing();
        Ok(())
    }

    fn location(&mut self) -> Result<String> {
        Ok(self.location.clone())
    }

    fn reload(&mut self) -> Result<()> {
        self.reloads += 1;
        if self.reload_failures > 0 {
            self.reload_failures -= 1;
            return Err(BotError::Browser("page reload timed out".into()));
        }
        self.reset_listing();
        Ok(())
    }

    fn contains(&mut self, locator: &str) -> Result<bool> {
        if !self.opened {
            return Ok(false);
        }
        if let Some((position, rest)) = Self::parse_article(locator) {
            let Some(item) = self.item(position) else {
                return Ok(false);
            };
            return Ok(match rest {
                "//footer//span[@aria-hidden]" => item.date.is_some(),
                _ => true,
            });
        }
        Ok(match locator {
            locators::SEARCH_BAR => self.search_bar_open,
            locators::SHOW_MORE => self.visible < self.items.len(),
            locators::LOADING => {
                // Shown for exactly one check, then the next batch lands.
                if self.loading == Loading::Shown {
                    self.loading = Loading::Idle;
                    self.visible += self.page_size;
                    true
                } else {
                    false
                }
            }
            _ => true,
        })
    }

    fn click(&mut self, locator: &str) -> Result<()> {
        match locator {
            locators::SEARCH_ICON => {
                if self.search_icon_failures > 0 {
                    self.search_icon_failures -= 1;
                    return Err(BotError::Browser("search icon not clickable".into()));
                }
                self.search_bar_open = true;
                Ok(())
            }
            locators::SHOW_MORE if self.visible < self.items.len() => {
                self.loading = Loading::Shown;
                Ok(())
            }
            _ if self.contains(locator)? => Ok(()),
            _ => Err(Self::missing(locator)),
        }
    }

    fn input_text(&mut self, locator: &str, text: &str) -> Result<()> {
        if locator != locators::SEARCH_BAR || !self.search_bar_open {
            return Err(Self::missing(locator));
        }
        self.typed = text.to_string();
        Ok(())
    }

    fn value(&mut self, locator: &str) -> Result<String> {
        if locator != locators::SEARCH_BAR || !self.search_bar_open {
            return Err(Self::missing(locator));
        }
        Ok(self.typed.clone())
    }

    fn submit_form(&mut self, _locator: &str) -> Result<()> {
        self.submitted = true;
        self.reset_listing();
        Ok(())
    }

    fn select_value(&mut self, _locator: &str, value: &str) -> Result<()> {
        self.sort = value.to_string();
        self.reset_listing();
        Ok(())
    }

    fn selected_value(&mut self, _locator: &str) -> Result<String> {
        Ok(self.sort.clone())
    }

    fn scroll_into_view(&mut self, locator: &str) -> Result<()> {
        if self.contains(locator)? {
            Ok(())
        } else {
            Err(Self::missing(locator))
        }
    }

    fn attribute(&mut self, locator: &str, name: &str) -> Result<String> {
        let (position, rest) = Self::parse_article(locator).ok_or_else(|| Self::missing(locator))?;
        if rest == "//h3//a" {
            if let Some(left) = self.headline_failures.get_mut(&position).filter(|n| **n > 0) {
                *left -= 1;
                return Err(BotError::Browser(format!("stale element at {position}")));
            }
        }
        let item = self.item(position).ok_or_else(|| Self::missing(locator))?;
        match (rest, name) {
            ("//h3//a", "href") => {
                let link = item.link.clone();
                self.read_log.push(position);
                Ok(link)
            }
            ("//img", "src") => Ok(item.image.clone()),
            ("//img", "alt") => Ok(item.alt.clone()),
            _ => Err(Self::missing(locator)),
        }
    }

    fn text(&mut self, locator: &str) -> Result<String> {
        let (position, rest) = Self::parse_article(locator).ok_or_else(|| Self::missing(locator))?;
        let item = self.item(position).ok_or_else(|| Self::missing(locator))?;
        match rest {
            "//h3//a" => Ok(item.title.clone()),
            "//footer//span[@aria-hidden]" => item.date.clone().ok_or_else(|| Self::missing(locator)),
            "//p" => Ok(item.summary.clone()),
            _ => Err(Self::missing(locator)),
        }
    }
}
