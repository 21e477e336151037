//! Durable file-backed work-item queue between producer and consumer runs.
//!
//! Layout under the queue root:
//!
//! ```text
//! queue/
//!   pending/   one JSON payload per record, waiting to be consumed
//!   done/      payloads whose record reached the sheet
//!   failed/    payloads that can never be consumed (malformed)
//! ```
//!
//! Payload files are named `<timestamp>-<seq>.json` so lexical order is
//! push order. Each payload is written to a temp file and renamed into
//! place, so a consumer never sees a partial payload.

use crate::errors::{BotError, Result};
use crate::models::Record;
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const PENDING: &str = "pending";
const DONE: &str = "done";
const FAILED: &str = "failed";

/// One queued payload.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: String,
    path: PathBuf,
}

impl WorkItem {
    /// Decode the payload. A malformed payload is a business error of the item.
    pub fn record(&self) -> Result<Record> {
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug)]
pub struct WorkQueue {
    root: PathBuf,
    seq: u64,
}

fn queue_err(action: &str, path: &Path, e: impl std::fmt::Display) -> BotError {
    BotError::Queue(format!("{action} {}: {e}", path.display()))
}

impl WorkQueue {
    /// Open (creating if needed) the queue rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [PENDING, DONE, FAILED] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|e| queue_err("create", &path, e))?;
        }
        debug!(root = %root.display(), "Work queue opened");
        Ok(WorkQueue { root, seq: 0 })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enqueue one record; returns the work item id.
    pub fn push(&mut self, record: &Record) -> Result<String> {
        self.seq += 1;
        let id = format!("{}-{:06}", Utc::now().format("%Y%m%dT%H%M%S%.6f"), self.seq);
        let dir = self.root.join(PENDING);
        let target = dir.join(format!("{id}.json"));

        let payload = serde_json::to_vec_pretty(record)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&payload)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| queue_err("persist", &target, e.error))?;

        info!(%id, slug = %record.slug, "Work item created");
        Ok(id)
    }

    /// Pending items in push order.
    pub fn pending(&self) -> Result<Vec<WorkItem>> {
        let dir = self.root.join(PENDING);
        let mut items = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| queue_err("list", &dir, e))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            items.push(WorkItem { id, path });
        }
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    /// Acknowledge an item whose record was delivered.
    pub fn complete(&self, item: &WorkItem) -> Result<()> {
        self.move_to(item, DONE)?;
        debug!(id = %item.id, "Work item done");
        Ok(())
    }

    /// Retire an item that can never be delivered.
    pub fn fail(&self, item: &WorkItem) -> Result<()> {
        self.move_to(item, FAILED)?;
        warn!(id = %item.id, "Work item moved to failed");
        Ok(())
    }

    fn move_to(&self, item: &WorkItem, dir: &str) -> Result<()> {
        let target = self.root.join(dir).join(format!("{}.json", item.id));
        fs::rename(&item.path, &target).map_err(|e| queue_err("move", &item.path, e))
    }
}
