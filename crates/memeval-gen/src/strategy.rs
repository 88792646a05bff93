//! Evidence-type strategies. Each evidence type differs only in prompt
//! flavor, the expected evidence speaker, and which verification checks
//! apply — one pipeline, parameterized by an injected strategy object.

use crate::verify::{
    AnswerableWithEvidence, IntermediateRelevance, PartialEvidenceProgression,
    UnanswerableWithoutEvidence, VerificationCheck,
};
use memeval_core::{EvidenceCategory, EvidenceCore, EvidenceUseCase, Message, Persona, Speaker};

/// Render messages as a `speaker: text` transcript for prompts.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.speaker, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

const SCENARIO_PROMPT: &str = "\
You are helping build a benchmark for long-term conversational memory.\n\
Generate distinct, realistic scenario descriptions for the persona below.\n\
Each scenario is one or two sentences describing a situation in the \
persona's life that could surface in casual conversation with an AI \
assistant.\n\n";

const SCENARIO_FORMAT: &str = "\
Respond with JSON only: {\"scenarios\": [\"...\", \"...\"]}.\n";

const CORE_FORMAT: &str = "\
Respond with JSON only:\n\
{\"question\": \"...\", \"answer\": \"...\", \"evidence_messages\": \
[{\"speaker\": \"user\"|\"assistant\", \"text\": \"...\"}]}\n";

const EMBED_PROMPT: &str = "\
Expand the evidence messages below into full, natural multi-turn \
conversations between the persona (user) and an AI assistant. Produce \
exactly one conversation per evidence message, in order. Conversation i \
must contain evidence message i verbatim as one of its turns, surrounded \
by unrelated small talk; no other conversation may restate, paraphrase, \
or hint at any evidence message.\n\n";

const EMBED_FORMAT: &str = "\
Respond with JSON only:\n\
{\"conversations\": [[{\"speaker\": \"user\"|\"assistant\", \"text\": \"...\"}, ...], ...]}\n";

/// Per-evidence-type behavior injected into the pipeline.
pub trait EvidenceTypeStrategy: Send + Sync {
    fn category(&self) -> EvidenceCategory;

    /// Which role states the evidence. `User` for most types.
    fn expected_speaker(&self) -> Speaker {
        Speaker::User
    }

    /// Type-specific instructions spliced into the core prompt.
    fn core_guidance(&self) -> &'static str;

    /// Prompt asking for `count` scenario descriptions.
    fn scenario_prompt(&self, persona: &Persona, count: usize) -> String {
        format!(
            "{SCENARIO_PROMPT}Persona: {}\nBackground: {}\nEvidence type: {}\n\n\
             Generate exactly {count} scenarios.\n{SCENARIO_FORMAT}",
            persona.summary(),
            persona.background,
            self.category(),
        )
    }

    /// Prompt asking for a (question, answer, evidence-messages) triple.
    fn core_prompt(&self, persona: &Persona, use_case: &EvidenceUseCase, count: usize) -> String {
        format!(
            "You are building a long-term memory benchmark.\n\
             Persona: {}\nBackground: {}\nScenario: {}\n\n\
             Produce a question about the persona, its answer, and exactly \
             {count} evidence messages spoken by the '{}' role that together \
             entail the answer. The question must be unanswerable without \
             them.\n{}\n{CORE_FORMAT}",
            persona.summary(),
            persona.background,
            use_case.scenario,
            self.expected_speaker(),
            self.core_guidance(),
        )
    }

    /// Prompt expanding the core into one conversation per evidence message.
    fn embed_prompt(
        &self,
        persona: &Persona,
        use_case: &EvidenceUseCase,
        core: &EvidenceCore,
    ) -> String {
        format!(
            "{EMBED_PROMPT}Persona: {}\nScenario: {}\n\nEvidence messages:\n{}\n\n{EMBED_FORMAT}",
            persona.summary(),
            use_case.scenario,
            render_transcript(&core.evidence_messages),
        )
    }

    /// Verification chain, in execution order.
    fn checks(&self) -> Vec<Box<dyn VerificationCheck>>;
}

/// Stable facts the user states about themselves.
pub struct UserFactsStrategy;

impl EvidenceTypeStrategy for UserFactsStrategy {
    fn category(&self) -> EvidenceCategory {
        EvidenceCategory::UserFacts
    }

    fn core_guidance(&self) -> &'static str {
        "Each evidence message states a concrete, verifiable personal fact \
         (names, places, dates, numbers). The facts must be consistent with \
         each other and with the background."
    }

    fn checks(&self) -> Vec<Box<dyn VerificationCheck>> {
        vec![
            Box::new(AnswerableWithEvidence),
            Box::new(UnanswerableWithoutEvidence),
            Box::new(IntermediateRelevance),
        ]
    }
}

/// Facts whose value changes across conversations; the latest state answers.
pub struct ChangingFactsStrategy;

impl EvidenceTypeStrategy for ChangingFactsStrategy {
    fn category(&self) -> EvidenceCategory {
        EvidenceCategory::ChangingFacts
    }

    fn core_guidance(&self) -> &'static str {
        "The evidence messages describe the SAME fact changing over time \
         (a move, a job change, a new schedule). Each message states the \
         then-current value; the answer is the FINAL value. Earlier values \
         must be plausible answers on their own."
    }

    fn checks(&self) -> Vec<Box<dyn VerificationCheck>> {
        vec![
            Box::new(AnswerableWithEvidence),
            Box::new(UnanswerableWithoutEvidence),
            Box::new(PartialEvidenceProgression),
            Box::new(IntermediateRelevance),
        ]
    }
}

/// Questions a well-behaved system should decline without the evidence.
/// The evidence is stated by the assistant (e.g. a recommendation it gave),
/// so the expected speaker differs.
pub struct AbstentionStrategy;

impl EvidenceTypeStrategy for AbstentionStrategy {
    fn category(&self) -> EvidenceCategory {
        EvidenceCategory::Abstention
    }

    fn expected_speaker(&self) -> Speaker {
        Speaker::Assistant
    }

    fn core_guidance(&self) -> &'static str {
        "Each evidence message is something the ASSISTANT said (advice, a \
         recommendation, a commitment). The question asks what the \
         assistant previously said; without the evidence the only correct \
         response is to admit not knowing."
    }

    fn checks(&self) -> Vec<Box<dyn VerificationCheck>> {
        vec![
            Box::new(AnswerableWithEvidence),
            Box::new(UnanswerableWithoutEvidence),
        ]
    }
}

/// Tastes and preferences the user expresses.
pub struct PreferenceStrategy;

impl EvidenceTypeStrategy for PreferenceStrategy {
    fn category(&self) -> EvidenceCategory {
        EvidenceCategory::Preference
    }

    fn core_guidance(&self) -> &'static str {
        "Each evidence message expresses a specific preference (a dislike, \
         a favorite, a constraint) clearly enough to be cited later. Avoid \
         preferences that could be guessed from the persona alone."
    }

    fn checks(&self) -> Vec<Box<dyn VerificationCheck>> {
        vec![
            Box::new(AnswerableWithEvidence),
            Box::new(UnanswerableWithoutEvidence),
            Box::new(IntermediateRelevance),
        ]
    }
}

/// Strategy lookup by category.
pub fn strategy_for(category: EvidenceCategory) -> Box<dyn EvidenceTypeStrategy> {
    match category {
        EvidenceCategory::UserFacts => Box::new(UserFactsStrategy),
        EvidenceCategory::ChangingFacts => Box::new(ChangingFactsStrategy),
        EvidenceCategory::Abstention => Box::new(AbstentionStrategy),
        EvidenceCategory::Preference => Box::new(PreferenceStrategy),
    }
}
