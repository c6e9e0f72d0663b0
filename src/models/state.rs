// src/models/state.rs

//! Per-site runtime state and check outcomes.

use chrono::{DateTime, Utc};

use crate::fingerprint::Fingerprint;

/// Mutable per-site record, owned exclusively by the scheduler.
///
/// Exactly one exists per configured site, created at scheduler startup and
/// kept for the process lifetime. `last_check == None` means the site has
/// never been checked and is due immediately.
#[derive(Debug, Clone, Default)]
pub struct SiteState {
    /// When the last check was dispatched
    pub last_check: Option<DateTime<Utc>>,

    /// Digest of the last observed content
    pub fingerprint: Option<Fingerprint>,

    /// Last entity tag returned by the origin (conditional fetches only)
    pub etag: Option<String>,
}

/// Result of a single site check. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Content differs from the stored fingerprint (or none was stored)
    Changed(String),
    /// Content matches, or the origin confirmed no change
    Unchanged(String),
    /// The fetch or render failed; stored state was left untouched
    Error(String),
}

impl CheckOutcome {
    /// Short diagnostic string for log lines.
    pub fn describe(&self) -> String {
        match self {
            CheckOutcome::Changed(reason) => format!("CHANGED ({reason})"),
            CheckOutcome::Unchanged(reason) => format!("no change ({reason})"),
            CheckOutcome::Error(reason) => format!("error ({reason})"),
        }
    }
}

/// Counters for one scheduling round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub checked: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub errors: usize,
}

impl RoundSummary {
    /// Fold a single outcome into the counters.
    pub fn record(&mut self, outcome: &CheckOutcome) {
        self.checked += 1;
        match outcome {
            CheckOutcome::Changed(_) => self.changed += 1,
            CheckOutcome::Unchanged(_) => self.unchanged += 1,
            CheckOutcome::Error(_) => self.errors += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = RoundSummary::default();
        summary.record(&CheckOutcome::Changed("content changed".into()));
        summary.record(&CheckOutcome::Unchanged("not modified".into()));
        summary.record(&CheckOutcome::Error("timeout".into()));
        summary.record(&CheckOutcome::Unchanged("no change".into()));

        assert_eq!(summary.checked, 4);
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.unchanged, 2);
        assert_eq!(summary.errors, 1);
    }

    #[test]
    fn describe_includes_reason() {
        let outcome = CheckOutcome::Error("status 500".into());
        assert_eq!(outcome.describe(), "error (status 500)");
    }
}
