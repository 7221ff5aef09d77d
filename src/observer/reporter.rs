//! Console reporter
//!
//! Prints a line per finished item and accumulates the run summary.

use chrono::{DateTime, Utc};
use std::io::Write;

use super::Observer;
use crate::error::ObserverError;
use crate::models::{Failure, ItemId, ItemResult, RunSummary};
use crate::output::{OutputFormat, ResultFormatter, SharedSink};

/// Observer printing item results as they are reported
pub struct ConsoleReporter {
    sink: SharedSink,
    formatter: ResultFormatter,
    suite: String,
    workers: usize,
    current: Option<ItemResult>,
    results: Vec<ItemResult>,
    started_at: DateTime<Utc>,
}

impl ConsoleReporter {
    pub fn new(sink: SharedSink, formatter: ResultFormatter) -> Self {
        Self {
            sink,
            formatter,
            suite: "suite".to_string(),
            workers: 1,
            current: None,
            results: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn with_suite(mut self, suite: impl Into<String>, workers: usize) -> Self {
        self.suite = suite.into();
        self.workers = workers;
        self
    }

    pub fn results(&self) -> &[ItemResult] {
        &self.results
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::new(self.suite.clone(), self.workers, self.results.clone())
            .with_started_at(self.started_at)
    }

    /// Machine-readable formats are only written once, as a whole summary
    fn prints_live(&self) -> bool {
        matches!(
            self.formatter.format(),
            OutputFormat::Table | OutputFormat::Summary
        )
    }

    fn open_result(&mut self, item: &ItemId) -> Result<&mut ItemResult, ObserverError> {
        match self.current.as_mut() {
            Some(result) if result.item == *item => Ok(result),
            _ => Err(ObserverError::rejected(item, "event for an item that is not open")),
        }
    }
}

impl Observer for ConsoleReporter {
    fn on_start(&mut self, item: &ItemId) -> Result<(), ObserverError> {
        if let Some(open) = &self.current {
            return Err(ObserverError::rejected(
                item,
                format!("started while {} is still open", open.item),
            ));
        }
        self.current = Some(ItemResult::pass(item.clone()));
        Ok(())
    }

    fn on_finish(&mut self, item: &ItemId) -> Result<(), ObserverError> {
        self.open_result(item)?;
        let Some(result) = self.current.take() else {
            return Ok(());
        };

        if self.prints_live() {
            let mut sink = self.sink.lock();
            writeln!(sink, "{}", self.formatter.format_result(&result))?;
            sink.flush()?;
        }
        self.results.push(result);
        Ok(())
    }

    fn on_error(&mut self, item: &ItemId, failure: &Failure) -> Result<(), ObserverError> {
        self.open_result(item)?.absorb(failure);
        Ok(())
    }

    fn on_failed_assertion(
        &mut self,
        item: &ItemId,
        failure: &Failure,
    ) -> Result<(), ObserverError> {
        self.open_result(item)?.absorb(failure);
        Ok(())
    }
}
