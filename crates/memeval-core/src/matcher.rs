//! Three-tier evidence matching: exact containment, partial containment,
//! and Levenshtein-based fuzzy matching with a length-scaled tolerance.

use crate::evidence::Message;

/// Matching thresholds. Empirically chosen; carried as configuration
/// rather than derived.
#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    /// Edit-distance floor, so short texts still get some slack.
    pub min_distance: usize,
    /// Fraction of the evidence text length allowed as edits.
    pub distance_ratio: f64,
    /// A contained fragment must be at least this fraction of the
    /// evidence length to count as a partial match.
    pub partial_ratio: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_distance: 10,
            distance_ratio: 0.15,
            partial_ratio: 0.8,
        }
    }
}

impl MatcherConfig {
    /// Allowed edit distance for evidence text of the given length.
    pub fn fuzzy_threshold(&self, evidence_len: usize) -> usize {
        self.min_distance
            .max((evidence_len as f64 * self.distance_ratio) as usize)
    }
}

/// Which tier matched, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Partial,
    Fuzzy,
}

/// Classic O(n*m) dynamic-programming edit distance over characters,
/// with unit insert/delete/substitute costs. Single-row table.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let sub_cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + sub_cost)
                .min(prev[j + 1] + 1)
                .min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Try to match a conversation message against an evidence message.
/// Returns the strongest tier that applies, or `None`.
///
/// Speakers must agree for every tier; a verbatim quote in the wrong
/// role is not evidence.
pub fn match_message(
    conv_msg: &Message,
    evidence_msg: &Message,
    cfg: &MatcherConfig,
) -> Option<MatchTier> {
    if conv_msg.speaker != evidence_msg.speaker {
        return None;
    }

    let conv_text = conv_msg.text.trim();
    let ev_text = evidence_msg.text.trim();
    if ev_text.is_empty() {
        return None;
    }

    // Exact: the conversation message carries the evidence verbatim.
    if conv_text.contains(ev_text) {
        return Some(MatchTier::Exact);
    }

    // Partial: the conversation message is a large fragment of the evidence.
    let conv_len = conv_text.chars().count();
    let ev_len = ev_text.chars().count();
    if !conv_text.is_empty()
        && ev_text.contains(conv_text)
        && conv_len as f64 >= ev_len as f64 * cfg.partial_ratio
    {
        return Some(MatchTier::Partial);
    }

    // Fuzzy: close in edit distance, scaled by evidence length.
    if levenshtein(conv_text, ev_text) <= cfg.fuzzy_threshold(ev_len) {
        return Some(MatchTier::Fuzzy);
    }

    None
}
