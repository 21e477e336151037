//! Error taxonomy for the news bot.
//!
//! Errors are grouped by the layer that raises them so the job lifecycle can
//! tell environment problems apart from step-level failures:
//!
//! - **Environment-setup** ([`BotError::Config`], [`BotError::Environment`]):
//!   the job never reaches `Running` on this attempt.
//! - **Step-level** ([`BotError::Search`], [`BotError::Sort`],
//!   [`BotError::Crawl`], [`BotError::Browser`]): raised after an in-place
//!   recovery action, counted by the retry wrapper.
//! - **Delivery** ([`BotError::Sink`], [`BotError::Queue`]).
//!
//! Record-level conditions (missing date region, unparsable date) have no
//! variant, and [`BotError::Download`] never leaves the extractor: a failed
//! image download becomes an empty filename.

use thiserror::Error;

/// Every failure the bot can propagate.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("environment setup failed: {0}")]
    Environment(String),

    #[error("browser: {0}")]
    Browser(String),

    #[error("search step failed: {0}")]
    Search(String),

    #[error("sorting failed: {0}")]
    Sort(String),

    #[error("crawl failed at position {position}: {source}")]
    Crawl {
        position: usize,
        #[source]
        source: Box<BotError>,
    },

    #[error("download failed: {0}")]
    Download(String),

    #[error("sink: {0}")]
    Sink(String),

    #[error("queue: {0}")]
    Queue(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BotError {
    /// Wrap a failure that escaped the crawl loop, remembering where it happened.
    pub fn crawl(position: usize, source: BotError) -> Self {
        BotError::Crawl {
            position,
            source: Box::new(source),
        }
    }

    /// Re-classify an error raised while acquiring resources.
    pub fn environment(e: impl std::fmt::Display) -> Self {
        BotError::Environment(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for BotError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        BotError::Sink(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
