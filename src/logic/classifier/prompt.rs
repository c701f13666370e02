//! Instruction text and verdict parsing
//!
//! The model is asked for a single `VERDICT:` token followed by a short
//! rationale. Anything without a recognisable token is UNCERTAIN.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::ClassifierVerdict;

/// Rationale is kept short for logs and notifications
pub const MAX_RATIONALE_CHARS: usize = 200;

static VERDICT_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\bVERDICT\s*[:=\-]?\s*\**\s*(NO[\s_\-]?CHANGES?|CHANGES?|UNCERTAIN)\b").ok()
});

/// Build the fixed instruction for one target
pub fn instruction(context: &str, changed_fraction: f32) -> String {
    format!(
        "You are comparing two screenshots of {context}'s career listing page to detect meaningful changes.\n\
         \n\
         The first image is BEFORE (previous capture), the second is AFTER (current capture).\n\
         Roughly {percent:.2}% of the pixels differ.\n\
         \n\
         Meaningful changes:\n\
         - New job postings added or postings removed\n\
         - Changed job titles, requirements, locations or departments\n\
         - Changed application deadlines\n\
         \n\
         Ignore:\n\
         - Page loading animations and spinners\n\
         - Timestamps or \"posted N days ago\" indicators\n\
         - Session IDs or tracking elements\n\
         - Small layout shifts, cookie banners and pop-ups\n\
         \n\
         Answer with exactly one of these on the first line:\n\
         VERDICT: CHANGE\n\
         VERDICT: NO_CHANGE\n\
         VERDICT: UNCERTAIN\n\
         then one or two sentences describing what changed.\n\
         Be conservative: only answer CHANGE when it concerns actual job opportunities.",
        context = context,
        percent = changed_fraction * 100.0,
    )
}

fn token_verdict(token: &str) -> ClassifierVerdict {
    let upper = token.to_ascii_uppercase();
    if upper.starts_with("NO") {
        ClassifierVerdict::NoChange
    } else if upper.starts_with("UNCERTAIN") {
        ClassifierVerdict::Uncertain
    } else {
        ClassifierVerdict::Change
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Parse raw response text into `(verdict, rationale)`
pub fn parse_response(text: &str) -> (ClassifierVerdict, String) {
    let matched = VERDICT_RE
        .as_ref()
        .and_then(|re| re.captures(text).map(|caps| (re, token_verdict(&caps[1]))));

    let (verdict, remainder) = match matched {
        Some((re, verdict)) => (verdict, re.replace(text, "").into_owned()),
        None => (ClassifierVerdict::Uncertain, text.to_string()),
    };

    let collapsed = remainder.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = collapsed.trim_matches(|c: char| c == '*' || c == '-' || c.is_whitespace());

    let rationale = if cleaned.is_empty() {
        match verdict {
            ClassifierVerdict::Uncertain if text.trim().is_empty() => "Empty classifier response".to_string(),
            _ => "No rationale given".to_string(),
        }
    } else {
        truncate(cleaned, MAX_RATIONALE_CHARS)
    };

    (verdict, rationale)
}
