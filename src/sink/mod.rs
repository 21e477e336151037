//! Record delivery.
//!
//! The crawl core hands every extracted [`Record`] to a [`RecordSink`] and
//! never looks at it again. [`SinkBridge`] picks the delivery strategy:
//!
//! | Mode | Delivery | Sheet written by |
//! |------|----------|------------------|
//! | `Direct` | row appended to the job's workbook | the crawl run |
//! | `Queue` | JSON work item pushed to the queue | a later [`drain_queue`] run |

pub mod queue;
pub mod sheet;

use crate::config::OutputLayout;
use crate::errors::Result;
use crate::lifecycle::Tally;
use crate::models::{JobStatus, Record, SheetRow};
use chrono::NaiveDateTime;
use queue::{WorkItem, WorkQueue};
use sheet::{Spreadsheet, consumer_workbook_name};
use tracing::{error, info, instrument, warn};

/// Destination for finished records.
pub trait RecordSink {
    /// Take ownership of one record, in extraction order.
    fn deliver(&mut self, record: &Record) -> Result<()>;

    /// Make everything delivered so far durable.
    fn flush(&mut self) -> Result<()>;
}

impl RecordSink for Spreadsheet {
    fn deliver(&mut self, record: &Record) -> Result<()> {
        self.append(&SheetRow::from(record))
    }

    fn flush(&mut self) -> Result<()> {
        self.save()
    }
}

impl RecordSink for WorkQueue {
    fn deliver(&mut self, record: &Record) -> Result<()> {
        self.push(record).map(|_| ())
    }

    fn flush(&mut self) -> Result<()> {
        // Every push is already persisted.
        Ok(())
    }
}

/// Which delivery strategy a crawl run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    Direct,
    Queue,
}

#[derive(Debug)]
pub enum SinkBridge {
    Direct(Spreadsheet),
    Queue(WorkQueue),
}

impl SinkBridge {
    /// Open the sink for `mode` inside the output layout.
    pub fn open(
        mode: SinkMode,
        layout: &OutputLayout,
        started_at: NaiveDateTime,
        sheet_name: &str,
    ) -> Result<Self> {
        Ok(match mode {
            SinkMode::Direct => {
                SinkBridge::Direct(Spreadsheet::create(&layout.excel(), started_at, sheet_name)?)
            }
            SinkMode::Queue => SinkBridge::Queue(WorkQueue::open(layout.queue())?),
        })
    }

    pub fn mode(&self) -> SinkMode {
        match self {
            SinkBridge::Direct(_) => SinkMode::Direct,
            SinkBridge::Queue(_) => SinkMode::Queue,
        }
    }
}

impl RecordSink for SinkBridge {
    fn deliver(&mut self, record: &Record) -> Result<()> {
        match self {
            SinkBridge::Direct(sheet) => sheet.deliver(record),
            SinkBridge::Queue(queue) => queue.deliver(record),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            SinkBridge::Direct(sheet) => sheet.flush(),
            SinkBridge::Queue(queue) => queue.flush(),
        }
    }
}

/// Consumer pass: append every pending work item to `sheet`.
///
/// Items are acknowledged only after the workbook has been saved with their
/// rows. Failures are classified with [`JobStatus::from`]: a malformed
/// payload is a business error and is retired into `failed/`; an unreadable
/// item or a row that cannot be appended is a system error and the item
/// stays pending for a later run.
///
/// # Returns
///
/// The number of items appended and acknowledged by this pass.
#[instrument(level = "info", skip_all, fields(queue = %queue.root().display()))]
pub fn drain_queue(queue: &WorkQueue, sheet: &mut Spreadsheet, tally: &mut Tally) -> Result<usize> {
    let pending = queue.pending()?;
    info!(pending = pending.len(), "Draining work queue");

    let mut appended: Vec<WorkItem> = Vec::new();
    for item in pending {
        let record = match item.record() {
            Ok(record) => record,
            Err(e) => {
                let status = JobStatus::from(&e);
                warn!(id = %item.id, error = %e, %status, "Unable to read work item");
                tally.complete(status, || queue.fail(&item))?;
                continue;
            }
        };
        match sheet.append(&SheetRow::from(&record)) {
            Ok(()) => appended.push(item),
            Err(e) => {
                let status = JobStatus::from(&e);
                error!(id = %item.id, error = %e, %status, "Unable to append work item");
                tally.complete(status, || Ok(()))?;
            }
        }
    }

    sheet.save()?;
    let before = tally.records();
    for item in &appended {
        tally.complete(JobStatus::Success, || queue.complete(item))?;
    }
    let done = tally.records() - before;
    info!(done, errors = tally.errors(), "Work queue drained");
    Ok(done)
}

/// Consumer run: drain the layout's queue into a new workbook named after
/// `started_at`.
///
/// Returns the number of items delivered. Refuses to start when a workbook
/// with the same name already exists, so no earlier consumer output is lost.
pub fn consume(layout: &OutputLayout, sheet_name: &str, started_at: NaiveDateTime) -> Result<usize> {
    layout.create_all()?;
    let queue = WorkQueue::open(layout.queue())?;
    let path = layout.excel().join(consumer_workbook_name(started_at));
    let mut sheet = Spreadsheet::create_at(path, sheet_name)?;
    let mut tally = Tally::new();

    let done = drain_queue(&queue, &mut sheet, &mut tally)?;
    if tally.errors() > 0 {
        warn!(errors = tally.errors(), "Some work items were not consumed");
    }
    info!(path = %sheet.path().display(), done, "Spreadsheet written");
    Ok(done)
}
