//! Scenario catalog: ask for N scenarios, accumulate until the target is
//! met, then truncate to exactly the target. Models routinely under- or
//! over-produce; the loop guarantees the length invariant either way.

use crate::strategy::EvidenceTypeStrategy;
use memeval_core::{EvidenceUseCase, GenError, GenResult, Persona};
use memeval_llm::wire::ScenarioBatch;
use memeval_llm::{decode_json, retry_with_backoff, LlmClient, RetryPolicy};
use std::sync::Arc;
use tracing::debug;

pub struct ScenarioCatalog {
    llm: Arc<dyn LlmClient>,
    retry: RetryPolicy,
    max_calls: u32,
}

impl ScenarioCatalog {
    pub fn new(llm: Arc<dyn LlmClient>, retry: RetryPolicy, max_calls: u32) -> Self {
        Self {
            llm,
            retry,
            max_calls,
        }
    }

    /// Produce exactly `target` use cases for the persona. Iterative
    /// accumulate-until-enough; bounded by `max_calls` LLM calls.
    pub fn generate(
        &self,
        persona: &Persona,
        strategy: &dyn EvidenceTypeStrategy,
        target: usize,
    ) -> GenResult<Vec<EvidenceUseCase>> {
        let mut accumulated: Vec<String> = Vec::new();

        for call in 1..=self.max_calls {
            let remaining = target - accumulated.len();
            let prompt = strategy.scenario_prompt(persona, remaining);

            let batch = retry_with_backoff(&self.retry, "scenario batch", || {
                let response = self.llm.generate(&prompt)?;
                let batch: ScenarioBatch = decode_json(&response.content)?;
                if batch.scenarios.is_empty() {
                    return Err(GenError::Schema("empty scenario list".into()));
                }
                Ok(batch)
            })?;

            let got = batch.scenarios.len();
            accumulated.extend(
                batch
                    .scenarios
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            );
            debug!(
                person = %persona.id,
                call,
                got,
                total = accumulated.len(),
                target,
                "scenario batch accumulated"
            );

            if accumulated.len() >= target {
                accumulated.truncate(target);
                let model = self.llm.model_name().to_string();
                return Ok(accumulated
                    .into_iter()
                    .map(|scenario| {
                        let mut uc = EvidenceUseCase::new(strategy.category(), scenario);
                        uc.generating_model = Some(model.clone());
                        uc
                    })
                    .collect());
            }
        }

        Err(GenError::Exhausted {
            what: format!("scenario catalog for {}", persona.id),
            attempts: self.max_calls,
            last: format!("accumulated {} of {target}", accumulated.len()),
        })
    }
}
