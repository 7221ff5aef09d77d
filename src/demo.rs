//! Demo suite
//!
//! Items that print their worker and a timestamp a number of times, pausing
//! in between. Run on a terminal, each item's lines show up together even
//! though the items execute in parallel.

use chrono::Utc;
use rand::Rng;
use std::io::Write;
use std::thread;
use std::time::Duration;

use crate::config::DemoConfig;
use crate::error::ItemError;
use crate::executor::ParallelSuite;
use crate::models::{ItemContext, WorkItem};

/// How a demo item ends
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DemoOutcome {
    #[default]
    Pass,
    Fail,
    Error,
    Panic,
}

/// Work item printing progress lines to stdout and timestamps to stderr
#[derive(Clone, Debug)]
pub struct DemoItem {
    name: String,
    iterations: usize,
    delay: Duration,
    outcome: DemoOutcome,
}

impl DemoItem {
    pub fn new(name: impl Into<String>, iterations: usize, delay: Duration) -> Self {
        Self {
            name: name.into(),
            iterations,
            delay,
            outcome: DemoOutcome::Pass,
        }
    }

    pub fn with_outcome(mut self, outcome: DemoOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// The configured delay plus up to a quarter of it again
    fn pause(&self) -> Duration {
        let spread = self.delay.as_millis() as u64 / 4;
        if spread == 0 {
            return self.delay;
        }
        self.delay + Duration::from_millis(rand::rng().random_range(0..=spread))
    }
}

impl WorkItem for DemoItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut ItemContext<'_>) -> Result<(), ItemError> {
        let worker = ctx.worker();
        let thread = thread::current()
            .name()
            .unwrap_or("unnamed")
            .to_string();

        for i in 1..=self.iterations {
            thread::sleep(self.pause());
            writeln!(
                ctx.stdout(),
                "[{worker} {thread}] {} {i}/{}",
                self.name,
                self.iterations
            )?;
            writeln!(ctx.stderr(), "{}", Utc::now().timestamp_millis())?;
        }

        match self.outcome {
            DemoOutcome::Pass => Ok(()),
            DemoOutcome::Fail => Err(ItemError::assertion(format!(
                "{}: expected true, got false",
                self.name
            ))),
            DemoOutcome::Error => {
                Err(anyhow::anyhow!("{}: connection refused", self.name).into())
            }
            DemoOutcome::Panic => panic!("{} gave up", self.name),
        }
    }
}

/// Shape of a demo suite
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DemoPlan {
    pub items: usize,
    pub iterations: usize,
    pub delay: Duration,
    /// Item numbers (1-based) that fail an assertion
    pub fail: Vec<usize>,
    /// Item numbers (1-based) that return an error
    pub error: Vec<usize>,
    /// Item numbers (1-based) that panic
    pub panic: Vec<usize>,
}

impl DemoPlan {
    pub fn from_config(config: &DemoConfig) -> Self {
        Self {
            items: config.items,
            iterations: config.iterations,
            delay: Duration::from_millis(config.delay_ms),
            ..Default::default()
        }
    }

    /// Outcome of item `number`; a panic wins over an error over a failure
    pub fn outcome(&self, number: usize) -> DemoOutcome {
        if self.panic.contains(&number) {
            DemoOutcome::Panic
        } else if self.error.contains(&number) {
            DemoOutcome::Error
        } else if self.fail.contains(&number) {
            DemoOutcome::Fail
        } else {
            DemoOutcome::Pass
        }
    }

    pub fn build(&self, workers: usize) -> ParallelSuite {
        let mut suite = ParallelSuite::new(workers).with_name("demo");
        for number in 1..=self.items {
            suite.add_item(
                DemoItem::new(format!("demo-{number:02}"), self.iterations, self.delay)
                    .with_outcome(self.outcome(number)),
            );
        }
        suite
    }
}
