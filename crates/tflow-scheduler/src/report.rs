//! Cycle results.

use std::time::Duration;

use tflow_core::CycleKind;

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub kind: CycleKind,
    /// Entities processed without error.
    pub updated: usize,
    /// Entities whose processing failed (the rest of the cycle went on).
    pub failed: usize,
    /// Updated entities whose result came from the fallback engine.
    pub fallbacks: usize,
    pub duration: Duration,
}

impl CycleReport {
    pub(crate) fn new(kind: CycleKind) -> Self {
        Self {
            kind,
            updated: 0,
            failed: 0,
            fallbacks: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn processed(&self) -> usize {
        self.updated + self.failed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// The same cadence was already running.
    Skipped,
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped => None,
        }
    }

    /// Entities updated, zero when skipped.
    pub fn updated(&self) -> usize {
        self.report().map_or(0, |r| r.updated)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}
