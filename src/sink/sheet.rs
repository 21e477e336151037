//! The tabular sink: one `.xlsx` workbook per job.
//!
//! The workbook is named from the job start timestamp
//! (`<excel>/<YYYY-MM-DD_HH-MM>.xlsx`; consumer runs add seconds), has a
//! single worksheet carrying the configured sheet name, and starts with the
//! [`SHEET_HEADER`] row. Rows are appended in extraction order and written to
//! disk on [`Spreadsheet::save`]. An existing workbook is never overwritten.

use crate::errors::{BotError, Result};
use crate::models::{SHEET_HEADER, SheetRow};
use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub struct Spreadsheet {
    workbook: Workbook,
    path: PathBuf,
    /// Zero-based index of the next free row; row 0 is the header.
    next_row: u32,
}

impl std::fmt::Debug for Spreadsheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spreadsheet")
            .field("path", &self.path)
            .field("next_row", &self.next_row)
            .finish()
    }
}

/// Workbook file name for a job started at `start`.
pub fn workbook_name(start: NaiveDateTime) -> String {
    format!("{}.xlsx", start.format("%Y-%m-%d_%H-%M"))
}

/// Workbook file name for a queue consumer run started at `start`.
pub fn consumer_workbook_name(start: NaiveDateTime) -> String {
    format!("{}.xlsx", start.format("%Y-%m-%d_%H-%M-%S"))
}

impl Spreadsheet {
    /// Create the workbook with its header row and write it once to disk.
    ///
    /// # Arguments
    ///
    /// * `dir` - The excel output directory (must exist)
    /// * `start` - Job start timestamp, used for the file name
    /// * `sheet_name` - Name of the single worksheet
    #[instrument(level = "info", skip(dir), fields(dir = %dir.display()))]
    pub fn create(dir: &Path, start: NaiveDateTime, sheet_name: &str) -> Result<Self> {
        Self::create_at(dir.join(workbook_name(start)), sheet_name)
    }

    /// Create the workbook at `path`, failing if a file is already there.
    pub fn create_at(path: PathBuf, sheet_name: &str) -> Result<Self> {
        if path.exists() {
            return Err(BotError::Sink(format!(
                "workbook already exists: {}",
                path.display()
            )));
        }
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name)?;
        for (col, name) in (0u16..).zip(SHEET_HEADER) {
            worksheet.write_string_with_format(0, col, name, &bold)?;
        }

        let mut sheet = Spreadsheet {
            workbook,
            path,
            next_row: 1,
        };
        sheet.save()?;
        info!(path = %sheet.path.display(), "Excel file created");
        Ok(sheet)
    }

    /// Append one row below the last one written.
    pub fn append(&mut self, row: &SheetRow) -> Result<()> {
        let r = self.next_row;
        let worksheet = self.workbook.worksheet_from_index(0)?;
        worksheet.write_string(r, 0, &row.title)?;
        worksheet.write_string(r, 1, &row.date)?;
        worksheet.write_string(r, 2, &row.description)?;
        worksheet.write_string(r, 3, &row.picture_filename)?;
        worksheet.write_number(r, 4, row.phrase_count_in_title as f64)?;
        worksheet.write_boolean(r, 5, row.money_related)?;
        self.next_row += 1;
        debug!(row = r, title = %row.title, "Row appended");
        Ok(())
    }

    /// Write the workbook, including every row appended so far, to disk.
    pub fn save(&mut self) -> Result<()> {
        self.workbook.save(&self.path)?;
        debug!(path = %self.path.display(), rows = self.rows(), "Workbook saved");
        Ok(())
    }

    /// Data rows appended so far, excluding the header.
    pub fn rows(&self) -> usize {
        (self.next_row - 1) as usize
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
