//! Persistence records.
//!
//! Downstream storage receives a finished schedule and its execution log
//! as a flat stream of records: one per job, one per stage assignment, one
//! per log entry. The storage format is up to the [`RecordSink`]
//! implementation. [`JsonLinesSink`] writes one JSON object per line.

use std::io::Write;

use serde::Serialize;

use crate::error::SinkError;
use crate::models::{ExecutionLog, JobSeed, LogEntry, Schedule, StageAssignment};

/// One persisted record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record<'a> {
    /// A planned job.
    Job {
        job_id: &'a str,
        cohort: u32,
        start_day: i64,
        seed: JobSeed,
        initial_state: f64,
        targets: &'a [f64],
        planned_end_day: Option<i64>,
    },
    /// A stage assignment.
    StageAssignment(&'a StageAssignment),
    /// An execution log entry.
    LogEntry(&'a LogEntry),
}

/// Destination for persisted records.
pub trait RecordSink {
    /// Writes one record.
    fn write_record(&mut self, record: &Record<'_>) -> Result<(), SinkError>;

    /// Flushes buffered records.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes records as newline-delimited JSON.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write_record(&mut self, record: &Record<'_>) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes every job followed by its stage assignments. Returns the number
/// of records written.
pub fn export_schedule<S: RecordSink + ?Sized>(
    schedule: &Schedule,
    sink: &mut S,
) -> Result<usize, SinkError> {
    let mut count = 0;
    for planned in schedule.jobs() {
        let job = &planned.job;
        sink.write_record(&Record::Job {
            job_id: &job.job_id,
            cohort: job.cohort,
            start_day: job.start_day,
            seed: job.seed,
            initial_state: job.initial_state,
            targets: &job.targets,
            planned_end_day: planned.planned_end_day(),
        })?;
        count += 1;
        for assignment in &planned.assignments {
            sink.write_record(&Record::StageAssignment(assignment))?;
            count += 1;
        }
    }
    sink.flush()?;
    Ok(count)
}

/// Writes every log entry. Returns the number of records written.
pub fn export_log<S: RecordSink + ?Sized>(
    log: &ExecutionLog,
    sink: &mut S,
) -> Result<usize, SinkError> {
    let mut count = 0;
    for entry in log.entries() {
        sink.write_record(&Record::LogEntry(entry))?;
        count += 1;
    }
    sink.flush()?;
    Ok(count)
}
