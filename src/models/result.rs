//! Result models for suite runs
//!
//! Defines failures, per-item results, and run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ItemId;
use crate::error::ItemError;

/// What kind of problem an item reported
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Assertion,
    Error,
    Panic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Assertion => write!(f, "assertion"),
            FailureKind::Error => write!(f, "error"),
            FailureKind::Panic => write!(f, "panic"),
        }
    }
}

/// Owned description of a failure raised by a work item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn assertion(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Assertion,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Error,
            message: message.into(),
        }
    }

    pub fn panic(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Panic,
            message: message.into(),
        }
    }

    pub fn is_assertion(&self) -> bool {
        self.kind == FailureKind::Assertion
    }
}

impl From<&ItemError> for Failure {
    fn from(err: &ItemError) -> Self {
        match err {
            ItemError::Assertion(message) => Failure::assertion(message.clone()),
            // {:#} keeps the anyhow context chain on one line
            ItemError::Other(inner) => Failure::error(format!("{inner:#}")),
            other => Failure::error(other.to_string()),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Item execution status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pass,
    Fail,
    Error,
}

impl ItemStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            ItemStatus::Pass => "✓",
            ItemStatus::Fail => "✗",
            ItemStatus::Error => "!",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemStatus::Pass)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Pass => write!(f, "PASS"),
            ItemStatus::Fail => write!(f, "FAIL"),
            ItemStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of a single item as reported to the observer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub item: ItemId,
    pub status: ItemStatus,
    pub message: Option<String>,
}

impl ItemResult {
    pub fn pass(item: ItemId) -> Self {
        Self {
            item,
            status: ItemStatus::Pass,
            message: None,
        }
    }

    pub fn fail(item: ItemId, message: impl Into<String>) -> Self {
        Self {
            item,
            status: ItemStatus::Fail,
            message: Some(message.into()),
        }
    }

    pub fn error(item: ItemId, message: impl Into<String>) -> Self {
        Self {
            item,
            status: ItemStatus::Error,
            message: Some(message.into()),
        }
    }

    /// Fold a reported failure into this result. Errors outrank failed
    /// assertions; the first message of the winning kind is kept.
    pub fn absorb(&mut self, failure: &Failure) {
        let status = if failure.is_assertion() {
            ItemStatus::Fail
        } else {
            ItemStatus::Error
        };

        let replace = match (self.status, status) {
            (ItemStatus::Pass, _) => true,
            (ItemStatus::Fail, ItemStatus::Error) => true,
            _ => false,
        };
        if replace {
            self.status = status;
            self.message = Some(failure.message.clone());
        }
    }
}

impl fmt::Display for ItemResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.symbol(), self.item)?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Summary of one suite run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub suite: String,
    pub workers: usize,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub results: Vec<ItemResult>,
}

impl RunSummary {
    pub fn new(suite: impl Into<String>, workers: usize, results: Vec<ItemResult>) -> Self {
        let total = results.len();
        let passed = results
            .iter()
            .filter(|r| r.status == ItemStatus::Pass)
            .count();
        let failed = results
            .iter()
            .filter(|r| r.status == ItemStatus::Fail)
            .count();
        let errors = results
            .iter()
            .filter(|r| r.status == ItemStatus::Error)
            .count();

        Self {
            suite: suite.into(),
            workers,
            total,
            passed,
            failed,
            errors,
            duration_ms: 0,
            started_at: Utc::now(),
            results,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.passed == self.total
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} workers)", self.suite, self.workers)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Error: {}",
            self.total, self.passed, self.failed, self.errors
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: usize) -> ItemId {
        ItemId::new(index, format!("item-{index}"))
    }

    #[test]
    fn test_failure_from_item_error() {
        let failure = Failure::from(&ItemError::assertion("expected 3"));
        assert_eq!(failure, Failure::assertion("expected 3"));

        let err = ItemError::from(anyhow::anyhow!("disk full").context("writing report"));
        let failure = Failure::from(&err);
        assert_eq!(failure.kind, FailureKind::Error);
        assert_eq!(failure.message, "writing report: disk full");
    }

    #[test]
    fn test_result_absorb() {
        let mut result = ItemResult::pass(id(0));
        result.absorb(&Failure::assertion("first"));
        assert_eq!(result.status, ItemStatus::Fail);

        result.absorb(&Failure::assertion("second"));
        assert_eq!(result.message.as_deref(), Some("first"));

        result.absorb(&Failure::panic("boom"));
        assert_eq!(result.status, ItemStatus::Error);
        assert_eq!(result.message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_run_summary() {
        let results = vec![
            ItemResult::pass(id(0)),
            ItemResult::fail(id(1), "expected 2, got 3"),
            ItemResult::error(id(2), "connection reset"),
            ItemResult::pass(id(3)),
        ];

        let summary = RunSummary::new("demo", 2, results).with_duration_ms(40);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.pass_rate(), 50.0);
        assert!(!summary.is_all_passed());
        assert!(summary.to_string().contains("Duration: 40ms"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = RunSummary::new("empty", 4, Vec::new());
        assert_eq!(summary.pass_rate(), 0.0);
        assert!(summary.is_all_passed());
    }
}
