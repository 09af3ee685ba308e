//! A reusable worker pool for independent units of work.
//!
//! Every unit (a zone, or a shard of a zone) is handed to a pure handler on a
//! rayon thread pool. Handlers never share mutable state; they communicate
//! only through the files they write. Errors and panics are caught at the pool
//! boundary and returned as per-unit reports, so one failing unit never
//! aborts its siblings.

use crate::errors::TrackingError;
use log::{info, warn};
use rayon::prelude::*;
use serde_derive::Serialize;
use std::fmt::Display;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum UnitStatus {
    Succeeded,
    /// No output was produced, for a reason that is not an error in the unit
    /// itself (missing input, timeout, nothing to write).
    Skipped(String),
    Failed(String),
}

#[derive(Clone, Debug, Serialize)]
pub struct UnitReport {
    pub key: String,
    pub status: UnitStatus,
    pub elapsed_secs: f64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub reports: Vec<UnitReport>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Succeeded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Failed(_)))
    }

    fn count<F: Fn(&UnitStatus) -> bool>(&self, f: F) -> usize {
        self.reports.iter().filter(|r| f(&r.status)).count()
    }

    pub fn status_of(&self, key: &str) -> Option<&UnitStatus> {
        self.reports.iter().find(|r| r.key == key).map(|r| &r.status)
    }

    pub fn merge(&mut self, other: RunSummary) {
        self.reports.extend(other.reports);
    }

    /// Human readable summary lines.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{} succeeded, {} skipped, {} failed",
            self.succeeded(),
            self.skipped(),
            self.failed()
        )];
        for report in &self.reports {
            match &report.status {
                UnitStatus::Succeeded => {}
                UnitStatus::Skipped(reason) => lines.push(format!("  skipped {}: {}", report.key, reason)),
                UnitStatus::Failed(reason) => lines.push(format!("  FAILED  {}: {}", report.key, reason)),
            }
        }
        lines
    }

    pub fn write_json(&self, path: &Path) -> Result<(), TrackingError> {
        crate::tables::ensure_parent(path)?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| TrackingError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Cooperative time limit for one unit of work.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn new(limit: Duration) -> Deadline {
        Deadline {
            started: Instant::now(),
            limit,
        }
    }

    pub fn check(&self) -> Result<(), TrackingError> {
        let elapsed = self.started.elapsed();
        if elapsed > self.limit {
            return Err(TrackingError::TimedOut { elapsed });
        }
        Ok(())
    }
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<WorkerPool, TrackingError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("moisture-worker-{}", i))
            .build()
            .map_err(|e| TrackingError::Configuration(format!("cannot start worker pool: {}", e)))?;
        Ok(WorkerPool {
            pool,
            workers: workers.max(1),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `handler` on every unit and reports one status per unit, in the
    /// order of `units`.
    pub fn run<U, F>(&self, units: &[U], handler: F) -> RunSummary
    where
        U: Display + Sync,
        F: Fn(&U) -> Result<UnitStatus, TrackingError> + Sync,
    {
        let reports = self.pool.install(|| {
            units
                .par_iter()
                .map(|unit| {
                    let start = Instant::now();
                    let key = unit.to_string();
                    let status = match panic::catch_unwind(AssertUnwindSafe(|| handler(unit))) {
                        Ok(Ok(status)) => status,
                        Ok(Err(e)) if e.is_skip() => {
                            warn!("{}: skipped: {}", key, e);
                            UnitStatus::Skipped(e.to_string())
                        }
                        Ok(Err(e)) => {
                            warn!("{}: failed: {}", key, e);
                            UnitStatus::Failed(e.to_string())
                        }
                        Err(payload) => {
                            let message = payload
                                .downcast_ref::<String>()
                                .cloned()
                                .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
                                .unwrap_or_else(|| "worker panicked".to_string());
                            warn!("{}: panicked: {}", key, message);
                            UnitStatus::Failed(format!("panic: {}", message))
                        }
                    };
                    if status == UnitStatus::Succeeded {
                        info!("{}: done", key);
                    }
                    UnitReport {
                        key,
                        status,
                        elapsed_secs: start.elapsed().as_secs_f64(),
                    }
                })
                .collect::<Vec<UnitReport>>()
        });
        RunSummary { reports }
    }
}
