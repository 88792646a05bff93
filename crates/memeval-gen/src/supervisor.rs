//! Orchestration: per-person and per-use-case processing with cooperative
//! timeouts, a systemic-failure circuit breaker, and thread-safe progress
//! accounting. Timeouts and abandonment are normal per-item outcomes; a
//! systemic trip aborts the whole run.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::context::RuntimeContext;
use crate::corebuild::EvidenceCoreBuilder;
use crate::embed::ConversationEmbedder;
use crate::pool::for_each_parallel;
use crate::scenario::ScenarioCatalog;
use crate::strategy::{strategy_for, EvidenceTypeStrategy};
use crate::verify::{CheckContext, VerificationExecutor};
use memeval_core::{
    validate_placement, EvidenceCategory, EvidenceItem, EvidenceUseCase, GenError, GenResult,
    Persona,
};
use memeval_store::append_evidence;

/// Terminal state of one use-case attempt.
#[derive(Debug)]
pub enum UseCaseOutcome {
    Accepted(Box<EvidenceItem>),
    Abandoned { reason: String },
    TimedOut,
    /// Person deadline expired before this use case started.
    Skipped,
}

#[derive(Debug)]
pub struct RunSummary {
    pub people_processed: usize,
    pub items_accepted: u64,
    pub snapshot: String,
}

pub struct GenerationSupervisor {
    ctx: Arc<RuntimeContext>,
}

impl GenerationSupervisor {
    pub fn new(ctx: Arc<RuntimeContext>) -> Self {
        Self { ctx }
    }

    /// Process every persona for one evidence category. Aborts with
    /// `Systemic` if the probe batch yields nothing or a person's failure
    /// rate is catastrophic.
    pub fn run(
        &self,
        personas: Vec<Persona>,
        category: EvidenceCategory,
    ) -> GenResult<RunSummary> {
        let total = personas.len();
        let probe_len = self.ctx.config.probe_people.min(total);
        let mut people = personas;
        let remainder = people.split_off(probe_len);

        info!(
            people = total,
            probe = probe_len,
            %category,
            "starting generation run"
        );

        self.run_batch(people, category)?;

        // Circuit breaker: a probe batch that produced nothing at all
        // means a broken prompt or schema, not bad luck.
        let stats = &self.ctx.stats;
        if stats.people_completed() >= 2 && stats.items_accepted() == 0 {
            error!(
                "SYSTEMIC PROBLEM: {} people completed with zero evidence items; \
                 aborting the run (check prompts, schemas, and endpoints)",
                stats.people_completed()
            );
            return Err(GenError::Systemic(
                "probe batch produced zero evidence items".into(),
            ));
        }

        self.run_batch(remainder, category)?;

        Ok(RunSummary {
            people_processed: total,
            items_accepted: self.ctx.stats.items_accepted(),
            snapshot: self.ctx.stats.snapshot(),
        })
    }

    fn run_batch(&self, personas: Vec<Persona>, category: EvidenceCategory) -> GenResult<()> {
        let fatal: Mutex<Option<GenError>> = Mutex::new(None);

        for_each_parallel(personas, self.ctx.config.person_threads, |persona| {
            if fatal.lock().is_ok_and(|g| g.is_some()) {
                return;
            }
            if let Err(e) = self.process_person(&persona, category) {
                if e.is_systemic() {
                    *fatal.lock().unwrap_or_else(|p| p.into_inner()) = Some(e);
                } else {
                    warn!(person = %persona.id, error = %e, "person processing failed");
                }
            }
        });

        match fatal.into_inner().unwrap_or_else(|p| p.into_inner()) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn process_person(&self, persona: &Persona, category: EvidenceCategory) -> GenResult<()> {
        let cfg = &self.ctx.config;
        let stats = &self.ctx.stats;
        let person_deadline = Instant::now() + cfg.person_timeout;
        let strategy = strategy_for(category);

        let catalog = ScenarioCatalog::new(
            Arc::clone(&self.ctx.generator),
            cfg.retry,
            cfg.scenario_max_calls,
        );
        let use_cases = match catalog.generate(persona, strategy.as_ref(), cfg.use_cases_per_person)
        {
            Ok(ucs) => ucs,
            Err(e) => {
                warn!(person = %persona.id, error = %e, "scenario catalog failed; person yields nothing");
                stats.people_completed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return Ok(());
            }
        };

        // Acceptance appends go through this guard so the person's file
        // keeps a single writer even with parallel use-case workers.
        let file_guard = Mutex::new(());
        let outcomes: Mutex<Vec<UseCaseOutcome>> = Mutex::new(Vec::new());

        for_each_parallel(use_cases, cfg.use_case_threads, |use_case| {
            // Person deadline, checked before each use case starts.
            let outcome = if Instant::now() >= person_deadline {
                UseCaseOutcome::Skipped
            } else {
                self.process_use_case(persona, &use_case, strategy.as_ref(), person_deadline)
            };

            if let UseCaseOutcome::Accepted(item) = &outcome {
                let _guard = file_guard.lock();
                match append_evidence(
                    persona,
                    std::slice::from_ref(item.as_ref()),
                    &self.ctx.output_dir,
                ) {
                    Ok(_) => {
                        stats
                            .items_accepted
                            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    }
                    Err(e) => error!(person = %persona.id, error = %e, "failed to persist item"),
                }
            }

            if let Ok(mut guard) = outcomes.lock() {
                guard.push(outcome);
            }
        });

        let outcomes = outcomes.into_inner().unwrap_or_else(|p| p.into_inner());
        let skipped = outcomes
            .iter()
            .filter(|o| matches!(o, UseCaseOutcome::Skipped))
            .count();
        if skipped > 0 {
            stats
                .person_timeouts
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            warn!(person = %persona.id, skipped, "person timeout: remaining use cases skipped");
        }

        let processed = outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o,
                    UseCaseOutcome::Accepted(_) | UseCaseOutcome::Abandoned { .. }
                )
            })
            .count();
        let failures = outcomes
            .iter()
            .filter(|o| matches!(o, UseCaseOutcome::Abandoned { .. }))
            .count();
        stats
            .use_cases_completed
            .fetch_add(processed as u64, std::sync::atomic::Ordering::Relaxed);
        stats
            .people_completed
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        if processed > 0 {
            let rate = failures as f64 / processed as f64;
            if rate > cfg.fatal_failure_rate {
                error!(
                    person = %persona.id,
                    failures,
                    processed,
                    "SYSTEMIC PROBLEM: catastrophic failure rate for this person"
                );
                return Err(GenError::Systemic(format!(
                    "failure rate {:.0}% for person {}",
                    rate * 100.0,
                    persona.id
                )));
            }
            if rate > cfg.warn_failure_rate {
                warn!(
                    person = %persona.id,
                    failures,
                    processed,
                    "high failure rate; continuing"
                );
            }
        }

        info!(person = %persona.id, "person done\n{}", stats.snapshot());
        Ok(())
    }

    /// Drive one use case through core → embed → validate → verify, with
    /// full regeneration on any validation or verification failure. The
    /// deadline is checked cooperatively before each iteration; an
    /// in-flight call is never interrupted, its result is just discarded.
    fn process_use_case(
        &self,
        persona: &Persona,
        use_case: &EvidenceUseCase,
        strategy: &dyn EvidenceTypeStrategy,
        person_deadline: Instant,
    ) -> UseCaseOutcome {
        let cfg = &self.ctx.config;
        let stats = &self.ctx.stats;
        let deadline = person_deadline.min(Instant::now() + cfg.use_case_timeout);

        let builder = EvidenceCoreBuilder::new(Arc::clone(&self.ctx.generator), cfg.evidence_count);
        let embedder = ConversationEmbedder::new(Arc::clone(&self.ctx.generator));

        // Every abandonment path counts; only timeouts are exempt.
        let abandon = |reason: String| {
            stats
                .cores_abandoned
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            UseCaseOutcome::Abandoned { reason }
        };

        let mut backoff = cfg.retry.initial_delay;
        for attempt in 1..=cfg.core_retries {
            if Instant::now() >= deadline {
                stats
                    .use_case_timeouts
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                debug!(use_case = %use_case.id, "use case timed out");
                return UseCaseOutcome::TimedOut;
            }
            if attempt > 1 {
                stats
                    .retry_attempts
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(cfg.retry.max_delay);
            }

            // Stage 1: evidence core (regenerated from scratch each pass).
            let core = match builder.build(persona, use_case, strategy) {
                Ok(core) => core,
                Err(e) if e.is_retryable() => {
                    debug!(use_case = %use_case.id, attempt, error = %e, "core attempt failed");
                    continue;
                }
                Err(e) => return abandon(format!("core generation: {e}")),
            };
            stats
                .cores_built
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

            // Stage 2: embedding, with its own retry budget. Exhausting
            // it abandons the use case rather than spending core retries.
            let mut conversations = None;
            for embed_attempt in 1..=cfg.embed_retries {
                if Instant::now() >= deadline {
                    stats
                        .use_case_timeouts
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    return UseCaseOutcome::TimedOut;
                }
                match embedder.embed(persona, use_case, &core, strategy) {
                    Ok(convs) => {
                        conversations = Some(convs);
                        break;
                    }
                    Err(e) if e.is_retryable() => {
                        debug!(
                            use_case = %use_case.id,
                            embed_attempt,
                            error = %e,
                            "embedding attempt failed"
                        );
                    }
                    Err(e) => return abandon(format!("embedding: {e}")),
                }
            }
            let Some(conversations) = conversations else {
                return abandon("embedding retries exhausted".into());
            };
            stats
                .conversation_sets_built
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

            // Stage 3: deterministic placement validation. A failure means
            // the whole generation was bad — regenerate, don't patch.
            let report = validate_placement(&core, &conversations, &cfg.matcher);
            if !report.is_valid {
                stats
                    .validation_failures
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                debug!(
                    use_case = %use_case.id,
                    categories = ?report.failure_categories,
                    "placement validation failed; regenerating"
                );
                continue;
            }

            // Validation passed: stamp the conversations as evidence
            // carriers and assemble the candidate item.
            let conversations: Vec<_> = conversations
                .into_iter()
                .map(|mut c| {
                    c.stamp();
                    c
                })
                .collect();
            let item = EvidenceItem::from_parts(core, conversations, use_case, &persona.id);

            // Stage 4: semantic verification.
            let checks = strategy.checks();
            let check_ctx = CheckContext {
                judge: self.ctx.judge.as_ref(),
                stats: Some(stats),
                config: cfg,
            };
            match VerificationExecutor::execute(&item, &checks, &check_ctx) {
                Ok(result) if result.passed => {
                    debug!(use_case = %use_case.id, attempt, "evidence item accepted");
                    return UseCaseOutcome::Accepted(Box::new(item));
                }
                Ok(result) => {
                    debug!(
                        use_case = %use_case.id,
                        reason = result.failure_reason.as_deref().unwrap_or("unknown"),
                        "verification failed; regenerating"
                    );
                    continue;
                }
                Err(e) if e.is_retryable() => {
                    debug!(use_case = %use_case.id, error = %e, "judge call failed");
                    continue;
                }
                Err(e) => return abandon(format!("verification: {e}")),
            }
        }

        abandon("regeneration budget exhausted".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenConfig;
    use crate::testutil::{
        conversations_json, core_json, fast_retry, judge_answer_json, judge_verdict_json,
        scenario_json, ScriptedLlm,
    };
    use memeval_store::load_evidence_items;
    use std::path::Path;

    fn test_config() -> GenConfig {
        GenConfig {
            evidence_count: 1,
            use_cases_per_person: 1,
            core_retries: 2,
            embed_retries: 2,
            scenario_max_calls: 2,
            use_case_timeout: Duration::from_secs(60),
            person_timeout: Duration::from_secs(60),
            person_threads: 1,
            use_case_threads: 1,
            retry: fast_retry(2),
            ..GenConfig::default()
        }
    }

    fn context(
        config: GenConfig,
        generator: ScriptedLlm,
        judge: ScriptedLlm,
        dir: &Path,
    ) -> Arc<RuntimeContext> {
        Arc::new(RuntimeContext::new(
            config,
            Arc::new(generator),
            Arc::new(judge),
            dir.to_path_buf(),
        ))
    }

    #[test]
    fn test_happy_path_accepts_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let fact = "I adopted a greyhound named Pixel";
        let generator = ScriptedLlm::new(vec![
            scenario_json(1),
            core_json("user", &[fact]),
            conversations_json("user", &[fact]),
        ]);
        // answerable (K=2): answer+verdict twice; unanswerable: abstains.
        let judge = ScriptedLlm::new(vec![
            judge_answer_json("the recorded facts", false),
            judge_verdict_json(true),
            judge_answer_json("the recorded facts", false),
            judge_verdict_json(true),
            judge_answer_json("", true),
        ]);
        let ctx = context(test_config(), generator, judge, dir.path());
        let supervisor = GenerationSupervisor::new(Arc::clone(&ctx));

        let persona = Persona::new("p01", "Maya", "analyst", "");
        let summary = supervisor
            .run(vec![persona], EvidenceCategory::UserFacts)
            .unwrap();

        assert_eq!(summary.items_accepted, 1);
        let items = load_evidence_items(&dir.path().join("p01_analyst.json")).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].conversations[0].contains_evidence);
        assert!(!items[0].conversations[0].id.is_empty());
    }

    #[test]
    fn test_probe_batch_zero_yield_trips_breaker() {
        let dir = tempfile::tempdir().unwrap();
        // The generator answers every prompt with a scenario batch, so
        // core decoding always fails and nothing is ever accepted.
        let generator = ScriptedLlm::repeating(scenario_json(1));
        let judge = ScriptedLlm::new(Vec::new());
        let mut config = test_config();
        config.core_retries = 1;
        // Disable the per-person rate trip so the probe breaker is what fires.
        config.fatal_failure_rate = 1.01;
        let ctx = context(config, generator, judge, dir.path());
        let supervisor = GenerationSupervisor::new(ctx);

        let personas = vec![
            Persona::new("p01", "A", "r", ""),
            Persona::new("p02", "B", "r", ""),
        ];
        let err = supervisor
            .run(personas, EvidenceCategory::UserFacts)
            .unwrap_err();
        assert!(matches!(err, GenError::Systemic(_)));
    }

    #[test]
    fn test_catastrophic_person_failure_rate_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ScriptedLlm::repeating(scenario_json(3));
        let judge = ScriptedLlm::new(Vec::new());
        let mut config = test_config();
        config.use_cases_per_person = 3;
        config.core_retries = 1;
        let ctx = context(config, generator, judge, dir.path());
        let supervisor = GenerationSupervisor::new(ctx);

        let err = supervisor
            .run(
                vec![Persona::new("p01", "A", "r", "")],
                EvidenceCategory::UserFacts,
            )
            .unwrap_err();
        assert!(matches!(err, GenError::Systemic(_)));
    }

    #[test]
    fn test_use_case_timeout_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ScriptedLlm::new(vec![scenario_json(1)]);
        let judge = ScriptedLlm::new(Vec::new());
        let mut config = test_config();
        config.use_case_timeout = Duration::ZERO;
        let ctx = context(config, generator, judge, dir.path());
        let supervisor = GenerationSupervisor::new(Arc::clone(&ctx));

        let summary = supervisor
            .run(
                vec![Persona::new("p01", "A", "r", "")],
                EvidenceCategory::UserFacts,
            )
            .unwrap();
        assert_eq!(summary.items_accepted, 0);
        assert_eq!(
            ctx.stats
                .use_case_timeouts
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn test_judge_exhaustion_counts_abandonment() {
        let dir = tempfile::tempdir().unwrap();
        let fact = "I started volunteering at the animal shelter";
        let generator = ScriptedLlm::new(vec![
            scenario_json(1),
            core_json("user", &[fact]),
            conversations_json("user", &[fact]),
        ]);
        // An empty script errors every call, so each judge helper runs out
        // its retry budget and verification fails non-retryably.
        let judge = ScriptedLlm::new(Vec::new());
        let mut config = test_config();
        config.core_retries = 1;
        config.fatal_failure_rate = 1.01;
        let ctx = context(config, generator, judge, dir.path());
        let supervisor = GenerationSupervisor::new(Arc::clone(&ctx));

        let summary = supervisor
            .run(
                vec![Persona::new("p01", "A", "r", "")],
                EvidenceCategory::UserFacts,
            )
            .unwrap();

        assert_eq!(summary.items_accepted, 0);
        assert_eq!(
            ctx.stats
                .use_cases_completed
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
        assert_eq!(
            ctx.stats
                .cores_abandoned
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn test_person_timeout_skips_remaining_use_cases() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ScriptedLlm::new(vec![scenario_json(3)]);
        let judge = ScriptedLlm::new(Vec::new());
        let mut config = test_config();
        config.use_cases_per_person = 3;
        config.person_timeout = Duration::ZERO;
        let ctx = context(config, generator, judge, dir.path());
        let supervisor = GenerationSupervisor::new(Arc::clone(&ctx));

        let summary = supervisor
            .run(
                vec![Persona::new("p01", "A", "r", "")],
                EvidenceCategory::UserFacts,
            )
            .unwrap();

        // All three use cases were skipped before starting; the person
        // counts one timeout and yields nothing.
        assert_eq!(summary.items_accepted, 0);
        assert_eq!(
            ctx.stats
                .person_timeouts
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
        assert_eq!(
            ctx.stats
                .use_cases_completed
                .load(std::sync::atomic::Ordering::Relaxed),
            0
        );
    }

    #[test]
    fn test_validation_failure_triggers_regeneration() {
        let dir = tempfile::tempdir().unwrap();
        let fact = "I moved my standing call to Thursday mornings";
        let generator = ScriptedLlm::new(vec![
            scenario_json(1),
            // First pass: conversations don't carry the evidence.
            core_json("user", &[fact]),
            conversations_json("user", &["totally unrelated filler text"]),
            // Second pass: correct placement.
            core_json("user", &[fact]),
            conversations_json("user", &[fact]),
        ]);
        let judge = ScriptedLlm::new(vec![
            judge_answer_json("the recorded facts", false),
            judge_verdict_json(true),
            judge_answer_json("the recorded facts", false),
            judge_verdict_json(true),
            judge_answer_json("", true),
        ]);
        let ctx = context(test_config(), generator, judge, dir.path());
        let supervisor = GenerationSupervisor::new(Arc::clone(&ctx));

        let summary = supervisor
            .run(
                vec![Persona::new("p01", "A", "analyst", "")],
                EvidenceCategory::UserFacts,
            )
            .unwrap();
        assert_eq!(summary.items_accepted, 1);
        assert_eq!(
            ctx.stats
                .validation_failures
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }
}
