//! JSON Lines audit writer.
//!
//! One line per record, appended to a daily file
//! (`tflow_<YYYY-MM-DD>.jsonl`). An interrupted write can only damage its
//! own line.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tflow_core::{ActivityEntry, HealthEvent, HealthRecord, PredictionSet, Reading, SignalTimingPlan};

use crate::error::PersistenceResult;

/// One audit line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "audit", rename_all = "snake_case")]
pub enum AuditRecord {
    Reading(Reading),
    Plan(SignalTimingPlan),
    Predictions(PredictionSet),
    Health(HealthRecord),
    Event(HealthEvent),
    Activity(ActivityEntry),
}

/// Active writer state for daily file.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

/// Buffered, date-rotating JSON Lines writer in append mode.
pub struct JsonLinesWriter {
    base_dir: PathBuf,
    buffer: Vec<AuditRecord>,
    /// Flush once this many records are buffered.
    max_buffer_size: usize,
    /// Open until date rotation.
    active_writer: Option<ActiveWriter>,
}

impl JsonLinesWriter {
    /// Create a writer, creating `base_dir` if needed.
    pub fn new(base_dir: impl AsRef<Path>, max_buffer_size: usize) -> PersistenceResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;

        Ok(Self {
            base_dir,
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size: max_buffer_size.max(1),
            active_writer: None,
        })
    }

    /// Buffer a record, flushing when the buffer is full.
    pub fn add_record(&mut self, record: AuditRecord) -> PersistenceResult<()> {
        self.buffer.push(record);

        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }

        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn close_active_writer(&mut self) {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush writer on close");
            }
            info!(
                date = %active.date,
                records = active.records_written,
                "Closed JSON Lines writer"
            );
        }
    }

    fn open_writer(&self, date: &str) -> PersistenceResult<ActiveWriter> {
        let path = self.base_dir.join(format!("tflow_{date}.jsonl"));
        info!(path = %path.display(), "Opening JSON Lines writer (append mode)");

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(ActiveWriter {
            writer: BufWriter::new(file),
            date: date.to_string(),
            records_written: 0,
        })
    }

    /// Write buffered records to today's file.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let today = Utc::now().format("%Y-%m-%d").to_string();

        let needs_rotation = self
            .active_writer
            .as_ref()
            .map(|w| w.date != today)
            .unwrap_or(false);
        if needs_rotation {
            self.close_active_writer();
        }

        let mut active = match self.active_writer.take() {
            Some(active) => active,
            None => self.open_writer(&today)?,
        };

        let record_count = self.buffer.len();
        let result: PersistenceResult<()> = (|| {
            for record in &self.buffer {
                let json = serde_json::to_string(record)?;
                writeln!(active.writer, "{json}")?;
            }
            active.writer.flush()?;
            Ok(())
        })();
        if result.is_ok() {
            active.records_written += record_count;
        }
        self.active_writer = Some(active);
        result?;

        debug!(date = %today, records = record_count, "Flushed audit records");
        self.buffer.clear();

        Ok(())
    }

    /// Flush pending data and close the file.
    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        self.close_active_writer();
        Ok(())
    }
}

impl Drop for JsonLinesWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(?e, "Failed to flush buffer on drop");
        }
        self.close_active_writer();
    }
}
