//! Thread-safe progress accounting. Plain atomic increments for the run
//! counters; a concurrent map with per-entry atomics for per-check
//! verification tallies. Workers never take a lock to count.

use dashmap::DashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CheckCounters {
    pub attempts: AtomicU64,
    pub passes: AtomicU64,
}

#[derive(Debug, Default)]
pub struct GenerationStats {
    pub people_completed: AtomicU64,
    pub use_cases_completed: AtomicU64,
    pub cores_built: AtomicU64,
    pub conversation_sets_built: AtomicU64,
    pub items_accepted: AtomicU64,
    pub cores_abandoned: AtomicU64,
    pub use_case_timeouts: AtomicU64,
    pub person_timeouts: AtomicU64,
    pub retry_attempts: AtomicU64,
    pub validation_failures: AtomicU64,
    checks: DashMap<String, CheckCounters>,
}

impl GenerationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_check_attempt(&self, check_name: &str) {
        self.checks
            .entry(check_name.to_string())
            .or_default()
            .attempts
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_check_pass(&self, check_name: &str) {
        self.checks
            .entry(check_name.to_string())
            .or_default()
            .passes
            .fetch_add(1, Ordering::Relaxed);
    }

    /// (attempts, passes) for a check name; (0, 0) if never run.
    pub fn check_counts(&self, check_name: &str) -> (u64, u64) {
        self.checks
            .get(check_name)
            .map(|c| {
                (
                    c.attempts.load(Ordering::Relaxed),
                    c.passes.load(Ordering::Relaxed),
                )
            })
            .unwrap_or((0, 0))
    }

    pub fn items_accepted(&self) -> u64 {
        self.items_accepted.load(Ordering::Relaxed)
    }

    pub fn people_completed(&self) -> u64 {
        self.people_completed.load(Ordering::Relaxed)
    }

    /// Point-in-time human-readable snapshot for progress logging and the
    /// final summary.
    pub fn snapshot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "generation progress:");
        let _ = writeln!(
            out,
            "  people completed      {}",
            self.people_completed.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "  use cases completed   {}",
            self.use_cases_completed.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "  cores built           {}",
            self.cores_built.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "  conversation sets     {}",
            self.conversation_sets_built.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "  items accepted        {}",
            self.items_accepted.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "  cores abandoned       {}",
            self.cores_abandoned.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "  validation failures   {}",
            self.validation_failures.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "  timeouts (case/person) {}/{}",
            self.use_case_timeouts.load(Ordering::Relaxed),
            self.person_timeouts.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "  retry attempts        {}",
            self.retry_attempts.load(Ordering::Relaxed)
        );

        let mut names: Vec<String> = self.checks.iter().map(|e| e.key().clone()).collect();
        names.sort();
        if !names.is_empty() {
            let _ = writeln!(out, "  verification checks:");
            for name in names {
                let (attempts, passes) = self.check_counts(&name);
                let _ = writeln!(out, "    {name:<34} {passes}/{attempts} passed");
            }
        }
        out
    }
}
