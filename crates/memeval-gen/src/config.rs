//! Pipeline knobs. Everything here is configuration, not derived
//! invariants — the fuzzy thresholds and consecutive-pass counts in
//! particular are empirical values carried from tuning runs.

use memeval_core::MatcherConfig;
use memeval_llm::RetryPolicy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GenConfig {
    /// Evidence messages per core; every accepted core has exactly this many.
    pub evidence_count: usize,
    /// Use cases generated (and attempted) per person.
    pub use_cases_per_person: usize,

    /// Full-regeneration budget for the core → embed → verify cycle.
    pub core_retries: u32,
    /// Embedding retry budget, independent of the core budget.
    pub embed_retries: u32,
    /// Upper bound on catalog LLM calls while accumulating scenarios.
    pub scenario_max_calls: u32,

    pub use_case_timeout: Duration,
    pub person_timeout: Duration,

    pub person_threads: usize,
    pub use_case_threads: usize,

    /// Judge must answer correctly this many consecutive times.
    pub consecutive_passes: u32,
    pub extensive_consecutive_passes: u32,
    pub extensive: bool,

    /// People processed before the zero-yield circuit-breaker check.
    pub probe_people: usize,
    /// Per-person use-case failure rate that aborts the run.
    pub fatal_failure_rate: f64,
    /// Per-person failure rate that logs a warning but continues.
    pub warn_failure_rate: f64,

    pub matcher: MatcherConfig,
    pub retry: RetryPolicy,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            evidence_count: 2,
            use_cases_per_person: 10,
            core_retries: 5,
            embed_retries: 3,
            scenario_max_calls: 5,
            use_case_timeout: Duration::from_secs(600),
            person_timeout: Duration::from_secs(3600),
            person_threads: 4,
            use_case_threads: 2,
            consecutive_passes: 2,
            extensive_consecutive_passes: 3,
            extensive: false,
            probe_people: 3,
            fatal_failure_rate: 0.96,
            warn_failure_rate: 0.70,
            matcher: MatcherConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl GenConfig {
    /// Effective consecutive-pass count for the answerability check.
    pub fn required_consecutive_passes(&self) -> u32 {
        if self.extensive {
            self.extensive_consecutive_passes
        } else {
            self.consecutive_passes
        }
    }
}
