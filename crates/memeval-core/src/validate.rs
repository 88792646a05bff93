//! Deterministic placement validation. No model calls: every evidence
//! message must appear exactly once, in the conversation whose index
//! matches its own, spoken by the right role.

use crate::error::FailureCategory;
use crate::evidence::{Conversation, EvidenceCore};
use crate::matcher::{match_message, MatcherConfig};

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub failure_categories: Vec<FailureCategory>,
}

impl ValidationReport {
    fn fail(&mut self, category: FailureCategory, error: String) {
        self.is_valid = false;
        self.errors.push(error);
        if !self.failure_categories.contains(&category) {
            self.failure_categories.push(category);
        }
    }
}

/// Validate that `conversations` correctly carry the core's evidence
/// messages. Index alignment is load-bearing: the later mixing stage
/// assumes conversation `i` is the carrier of evidence message `i`.
pub fn validate_placement(
    core: &EvidenceCore,
    conversations: &[Conversation],
    cfg: &MatcherConfig,
) -> ValidationReport {
    let mut report = ValidationReport {
        is_valid: true,
        ..Default::default()
    };

    // The wire decode already constrains speakers and shape, but
    // conversations re-validated from disk come through here too.
    for (ci, conv) in conversations.iter().enumerate() {
        if conv.messages.is_empty() {
            report.fail(
                FailureCategory::EmptyConversation,
                format!("conversation {ci} has no messages"),
            );
        }
    }

    // Count mismatch makes per-index checks meaningless; fail fast.
    if conversations.len() != core.evidence_messages.len() {
        report.fail(
            FailureCategory::ConversationCountMismatch,
            format!(
                "{} conversations for {} evidence messages",
                conversations.len(),
                core.evidence_messages.len()
            ),
        );
        return report;
    }

    for (ei, evidence) in core.evidence_messages.iter().enumerate() {
        // Search every conversation, not just index ei: finding the
        // evidence somewhere else is a distinct, diagnosable failure.
        let found_in: Vec<usize> = conversations
            .iter()
            .enumerate()
            .filter(|(_, conv)| {
                conv.messages
                    .iter()
                    .any(|m| match_message(m, evidence, cfg).is_some())
            })
            .map(|(ci, _)| ci)
            .collect();

        match found_in.as_slice() {
            [] => report.fail(
                FailureCategory::EvidenceNotFound,
                format!("evidence message {ei} not found in any conversation"),
            ),
            [ci] if *ci == ei => {}
            [ci] => report.fail(
                FailureCategory::EvidenceInWrongConversation,
                format!("evidence message {ei} found in conversation {ci}, expected {ei}"),
            ),
            many => report.fail(
                FailureCategory::EvidenceInMultipleConversations,
                format!("evidence message {ei} found in conversations {many:?}"),
            ),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{Message, Speaker};

    fn core_with(messages: Vec<&str>) -> EvidenceCore {
        EvidenceCore {
            question: "What did the user say?".into(),
            answer: "the facts".into(),
            evidence_messages: messages
                .into_iter()
                .map(|t| Message::new(Speaker::User, t))
                .collect(),
            generating_model: None,
        }
    }

    fn conv(texts: Vec<(&str, Speaker)>) -> Conversation {
        Conversation::unstamped(
            texts
                .into_iter()
                .map(|(t, s)| Message::new(s, t))
                .collect(),
            None,
        )
    }

    #[test]
    fn test_happy_path() {
        let core = core_with(vec!["I adopted a greyhound named Pixel"]);
        let convs = vec![conv(vec![
            ("Hey, how was your weekend?", Speaker::Assistant),
            ("Great! I adopted a greyhound named Pixel", Speaker::User),
        ])];
        let report = validate_placement(&core, &convs, &MatcherConfig::default());
        assert!(report.is_valid, "{:?}", report.errors);
    }

    #[test]
    fn test_count_mismatch_short_circuits() {
        let core = core_with(vec!["fact one about the user", "fact two about the user"]);
        let convs = vec![conv(vec![("fact one about the user", Speaker::User)])];
        let report = validate_placement(&core, &convs, &MatcherConfig::default());
        assert!(!report.is_valid);
        assert_eq!(
            report.failure_categories,
            vec![FailureCategory::ConversationCountMismatch]
        );
        // Per-message checks never ran.
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_evidence_in_multiple_conversations() {
        let fact = "I switched my gym to the one on Fifth Street";
        let core = core_with(vec![fact, "I signed up for a spin class on Tuesdays"]);
        let convs = vec![
            conv(vec![(fact, Speaker::User)]),
            conv(vec![
                (fact, Speaker::User),
                ("I signed up for a spin class on Tuesdays", Speaker::User),
            ]),
        ];
        let report = validate_placement(&core, &convs, &MatcherConfig::default());
        assert!(!report.is_valid);
        assert!(report
            .failure_categories
            .contains(&FailureCategory::EvidenceInMultipleConversations));
    }

    #[test]
    fn test_evidence_in_wrong_conversation() {
        let core = core_with(vec![
            "I started learning Portuguese this month",
            "My sister is visiting from Toronto next week",
        ]);
        let convs = vec![
            conv(vec![(
                "My sister is visiting from Toronto next week",
                Speaker::User,
            )]),
            conv(vec![(
                "I started learning Portuguese this month",
                Speaker::User,
            )]),
        ];
        let report = validate_placement(&core, &convs, &MatcherConfig::default());
        assert!(!report.is_valid);
        assert!(report
            .failure_categories
            .contains(&FailureCategory::EvidenceInWrongConversation));
    }

    #[test]
    fn test_evidence_not_found() {
        let core = core_with(vec!["I got a promotion to staff engineer in April"]);
        let convs = vec![conv(vec![
            ("Can you recommend a pasta recipe?", Speaker::User),
            ("Sure, here's a simple carbonara.", Speaker::Assistant),
        ])];
        let report = validate_placement(&core, &convs, &MatcherConfig::default());
        assert!(!report.is_valid);
        assert!(report
            .failure_categories
            .contains(&FailureCategory::EvidenceNotFound));
    }

    #[test]
    fn test_fuzzy_placement_accepted() {
        let core = core_with(vec!["My meeting is at 3pm"]);
        // Case/punctuation drift only; fuzzy tier should carry it.
        let convs = vec![conv(vec![("my meeting is at 3pm.", Speaker::User)])];
        let report = validate_placement(&core, &convs, &MatcherConfig::default());
        assert!(report.is_valid, "{:?}", report.errors);
    }

    #[test]
    fn test_empty_conversation_flagged() {
        let core = core_with(vec!["some fact about the user's week"]);
        let convs = vec![Conversation::unstamped(Vec::new(), None)];
        let report = validate_placement(&core, &convs, &MatcherConfig::default());
        assert!(!report.is_valid);
        assert!(report
            .failure_categories
            .contains(&FailureCategory::EmptyConversation));
    }
}
