//! Semantic verification: a short-circuiting chain of judge-model checks.
//! Checks run in declaration order and stop at the first failure, so judge
//! calls stay minimal and the failure reason is attributable to exactly one
//! check. The judge only verifies; it never produces dataset content.

use crate::config::GenConfig;
use crate::strategy::render_transcript;
use memeval_core::{
    match_message, CheckResult, CompositeVerificationResult, Conversation, EvidenceCategory,
    EvidenceItem, GenResult, GenerationStats,
};
use memeval_llm::wire::{JudgeAnswer, JudgeVerdict};
use memeval_llm::{decode_json, retry_with_backoff, LlmClient};
use tracing::debug;

pub struct CheckContext<'a> {
    pub judge: &'a dyn LlmClient,
    pub stats: Option<&'a GenerationStats>,
    pub config: &'a GenConfig,
}

pub trait VerificationCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the check is meaningful for this item. Inapplicable checks
    /// are skipped entirely — not run, not recorded, not failed.
    fn applies(&self, _item: &EvidenceItem) -> bool {
        true
    }

    fn run(&self, item: &EvidenceItem, ctx: &CheckContext) -> GenResult<CheckResult>;
}

pub struct VerificationExecutor;

impl VerificationExecutor {
    /// Run `checks` in order, stopping at the first failure. An empty
    /// chain passes trivially. Judge transport errors propagate as `Err`
    /// (the caller retries the whole attempt); a failed check is a normal
    /// `Ok` result with `passed == false`.
    pub fn execute(
        item: &EvidenceItem,
        checks: &[Box<dyn VerificationCheck>],
        ctx: &CheckContext,
    ) -> GenResult<CompositeVerificationResult> {
        let mut composite = CompositeVerificationResult::empty_pass();

        for check in checks {
            if !check.applies(item) {
                debug!(check = check.name(), "check not applicable, skipped");
                continue;
            }

            if let Some(stats) = ctx.stats {
                stats.record_check_attempt(check.name());
            }

            let result = check.run(item, ctx)?;
            let passed = result.passed;
            composite.checks.push(result);

            if passed {
                if let Some(stats) = ctx.stats {
                    stats.record_check_pass(check.name());
                }
            } else {
                composite.passed = false;
                let failing = composite.checks.last().unwrap();
                composite.failure_reason =
                    Some(format!("{}: {}", failing.check_name, failing.details));
                break;
            }
        }

        Ok(composite)
    }
}

// --- judge call helpers ---

const ANSWER_FORMAT: &str = "\
Respond with JSON only: {\"answer\": \"...\", \"abstained\": true|false}. \
Set abstained to true if the context does not contain the information.\n";

const VERDICT_FORMAT: &str =
    "Respond with JSON only: {\"verdict\": true|false, \"reason\": \"...\"}.\n";

fn ask_judge(ctx: &CheckContext, context_block: &str, question: &str) -> GenResult<JudgeAnswer> {
    let prompt = format!(
        "Answer the question using ONLY the context below. If the context \
         does not contain the answer, say so.\n\n\
         Context:\n{context_block}\n\nQuestion: {question}\n\n{ANSWER_FORMAT}"
    );
    retry_with_backoff(&ctx.config.retry, "judge answer", || {
        let response = ctx.judge.generate(&prompt)?;
        decode_json(&response.content)
    })
}

/// Does `actual` convey the same answer as `expected`? Evidence answers are
/// free text, so equivalence is judged, not keyword-matched.
fn judge_equivalent(
    ctx: &CheckContext,
    question: &str,
    expected: &str,
    actual: &str,
) -> GenResult<bool> {
    let prompt = format!(
        "Question: {question}\nReference answer: {expected}\nCandidate answer: {actual}\n\n\
         Does the candidate answer convey the same information as the \
         reference answer?\n{VERDICT_FORMAT}"
    );
    let verdict: JudgeVerdict = retry_with_backoff(&ctx.config.retry, "judge verdict", || {
        let response = ctx.judge.generate(&prompt)?;
        decode_json(&response.content)
    })?;
    Ok(verdict.verdict)
}

fn judge_relevant(ctx: &CheckContext, question: &str, message_text: &str) -> GenResult<bool> {
    let prompt = format!(
        "Question: {question}\nMessage: {message_text}\n\n\
         Does this message, on its own, address the same topic the question \
         asks about?\n{VERDICT_FORMAT}"
    );
    let verdict: JudgeVerdict = retry_with_backoff(&ctx.config.retry, "judge relevance", || {
        let response = ctx.judge.generate(&prompt)?;
        decode_json(&response.content)
    })?;
    Ok(verdict.verdict)
}

fn render_conversations(conversations: &[Conversation]) -> String {
    conversations
        .iter()
        .enumerate()
        .map(|(i, c)| format!("--- conversation {i} ---\n{}", render_transcript(&c.messages)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// --- standard checks ---

/// Given only the evidence messages, the judge must answer correctly K
/// consecutive times. Guards against evidence that doesn't entail the
/// answer.
pub struct AnswerableWithEvidence;

impl VerificationCheck for AnswerableWithEvidence {
    fn name(&self) -> &'static str {
        "answerable_with_evidence"
    }

    fn run(&self, item: &EvidenceItem, ctx: &CheckContext) -> GenResult<CheckResult> {
        let context_block = render_transcript(&item.evidence_messages);
        let required = ctx.config.required_consecutive_passes();
        let mut last_answer = String::new();

        for round in 1..=required {
            let answer = ask_judge(ctx, &context_block, &item.question)?;
            last_answer = answer.answer.clone();

            let correct = !answer.abstained
                && judge_equivalent(ctx, &item.question, &item.answer, &answer.answer)?;
            if !correct {
                return Ok(CheckResult {
                    check_name: self.name().into(),
                    passed: false,
                    details: format!("judge answer diverged on round {round}/{required}"),
                    last_model_answer: Some(last_answer),
                });
            }
        }

        Ok(CheckResult {
            check_name: self.name().into(),
            passed: true,
            details: format!("{required} consecutive correct answers"),
            last_model_answer: Some(last_answer),
        })
    }
}

/// With the evidence messages stripped from the conversations, the judge
/// must fail to answer. Guards against leakage through surrounding context.
pub struct UnanswerableWithoutEvidence;

impl VerificationCheck for UnanswerableWithoutEvidence {
    fn name(&self) -> &'static str {
        "unanswerable_without_evidence"
    }

    fn run(&self, item: &EvidenceItem, ctx: &CheckContext) -> GenResult<CheckResult> {
        let stripped: Vec<Conversation> = item
            .conversations
            .iter()
            .map(|conv| {
                let messages = conv
                    .messages
                    .iter()
                    .filter(|m| {
                        !item
                            .evidence_messages
                            .iter()
                            .any(|ev| match_message(m, ev, &ctx.config.matcher).is_some())
                    })
                    .cloned()
                    .collect();
                Conversation {
                    messages,
                    ..conv.clone()
                }
            })
            .collect();

        let context_block = render_conversations(&stripped);
        let answer = ask_judge(ctx, &context_block, &item.question)?;

        let leaked = !answer.abstained
            && judge_equivalent(ctx, &item.question, &item.answer, &answer.answer)?;

        Ok(CheckResult {
            check_name: self.name().into(),
            passed: !leaked,
            details: if leaked {
                "question answerable without the evidence messages".into()
            } else {
                "judge could not answer without the evidence".into()
            },
            last_model_answer: Some(answer.answer),
        })
    }
}

/// For evolving facts: with the last conversation withheld, the judge's
/// answer must reflect the second-to-last evidence state, confirming the
/// staged nature of the fact.
pub struct PartialEvidenceProgression;

impl VerificationCheck for PartialEvidenceProgression {
    fn name(&self) -> &'static str {
        "partial_evidence_progression"
    }

    fn applies(&self, item: &EvidenceItem) -> bool {
        // Both counts gate: `run` indexes the second-to-last evidence
        // message, which need not exist just because conversations do.
        item.category == EvidenceCategory::ChangingFacts
            && item.conversations.len() >= 2
            && item.evidence_messages.len() >= 2
    }

    fn run(&self, item: &EvidenceItem, ctx: &CheckContext) -> GenResult<CheckResult> {
        let withheld_last = &item.conversations[..item.conversations.len() - 1];
        let context_block = render_conversations(withheld_last);
        let answer = ask_judge(ctx, &context_block, &item.question)?;

        // The then-current state is the second-to-last evidence message.
        let prior_state = &item.evidence_messages[item.evidence_messages.len() - 2].text;
        let reflects_prior = !answer.abstained
            && judge_equivalent(ctx, &item.question, prior_state, &answer.answer)?;

        Ok(CheckResult {
            check_name: self.name().into(),
            passed: reflects_prior,
            details: if reflects_prior {
                "answer tracks the second-to-last state".into()
            } else {
                "answer does not reflect the prior evidence state".into()
            },
            last_model_answer: Some(answer.answer),
        })
    }
}

/// With multiple evidence messages, each one except the last must on its
/// own address the question's topic — rejecting cores where earlier
/// messages are filler and only the final message matters.
pub struct IntermediateRelevance;

impl VerificationCheck for IntermediateRelevance {
    fn name(&self) -> &'static str {
        "intermediate_message_relevance"
    }

    fn applies(&self, item: &EvidenceItem) -> bool {
        item.evidence_messages.len() >= 2
    }

    fn run(&self, item: &EvidenceItem, ctx: &CheckContext) -> GenResult<CheckResult> {
        for (i, message) in item
            .evidence_messages
            .iter()
            .take(item.evidence_messages.len() - 1)
            .enumerate()
        {
            if !judge_relevant(ctx, &item.question, &message.text)? {
                return Ok(CheckResult {
                    check_name: self.name().into(),
                    passed: false,
                    details: format!("evidence message {i} does not address the question's topic"),
                    last_model_answer: None,
                });
            }
        }

        Ok(CheckResult {
            check_name: self.name().into(),
            passed: true,
            details: "all intermediate messages address the topic".into(),
            last_model_answer: None,
        })
    }
}
