//! Letter validation: letters must never talk about money and must not
//! read like therapy-speak or a greeting card.

use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_DAILY_LENGTH: usize = 500;
pub const MAX_WEEKLY_LENGTH: usize = 800;

/// Words and phrases that fail a letter outright (matched lowercase,
/// substring).
const FORBIDDEN_TERMS: &[&str] = &[
    // Money
    "money", "spending", "budget", "budgets", "cost", "costs", "price", "prices", "purchase",
    "purchases", "dollar", "dollars", "expense", "expenses", "afford", "affordable", "cheap",
    "expensive", "save", "savings", "invest", "investment", "financial", "finances", "bank",
    "banking",
    // Therapy-speak and self-help clichés
    "journey", "growth mindset", "self-care", "selfcare", "boundaries", "space for",
    "holding space", "lean into", "lean in", "honor your", "manifest", "manifesting",
    "authentic self", "best self", "true self", "healing journey", "inner child",
    "trauma response", "triggered", "toxic positivity", "live your truth", "speak your truth",
    "radical acceptance", "radical self-love", "self-love",
];

// Note: `\d+k\b` also matches non-monetary uses like "5k steps"; kept for
// parity with the source behaviour.
static CURRENCY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\$\d",
        r"\d+\s*dollars?",
        r"\d+\s*cents?",
        r"€\d",
        r"£\d",
        r"\d+\s*euros?",
        r"\d+\s*pounds?",
        r"\d+k\b",
        r"\d+\s*bucks?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

const GREETING_PREFIXES: &[&str] = &[
    "dear ", "hi ", "hello ", "hey ", "good morning", "good evening", "good afternoon",
];

const SIGNOFF_SUFFIXES: &[&str] = &[
    "sincerely", "best regards", "warm regards", "cheers", "take care", "yours truly",
    "best wishes", "warmly",
];

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Validates a generated letter. Errors invalidate; warnings don't.
pub fn validate_letter(text: &str, is_daily: bool) -> ValidationResult {
    let mut result = ValidationResult {
        valid: true,
        ..Default::default()
    };
    let lower = text.to_lowercase();

    for term in FORBIDDEN_TERMS {
        if lower.contains(term) {
            result.errors.push(format!("contains forbidden term: {}", term));
            result.valid = false;
        }
    }

    if CURRENCY_PATTERNS.iter().any(|p| p.is_match(text)) {
        result.errors.push("contains currency reference".to_string());
        result.valid = false;
    }

    let max_len = if is_daily {
        MAX_DAILY_LENGTH
    } else {
        MAX_WEEKLY_LENGTH
    };
    if text.len() > max_len {
        result
            .warnings
            .push("letter exceeds recommended length".to_string());
    }

    if text.trim().len() < 10 {
        result.errors.push("letter too short or empty".to_string());
        result.valid = false;
    }

    if GREETING_PREFIXES.iter().any(|g| lower.starts_with(g)) {
        result.warnings.push("letter starts with greeting".to_string());
    }

    let trimmed_lower = lower.trim();
    if SIGNOFF_SUFFIXES.iter().any(|s| trimmed_lower.ends_with(s)) {
        result.warnings.push("letter ends with signoff".to_string());
    }

    result
}

const GREETING_LINES: &[&str] = &[
    "Dear friend,", "Dear you,", "Hi there,", "Hello,", "Good morning,", "Good evening,",
    "Good afternoon,",
];

const SIGNOFF_LINES: &[&str] = &[
    "\n\nSincerely,", "\n\nBest regards,", "\n\nWarm regards,", "\n\nCheers,", "\n\nTake care,",
    "\n\nYours truly,", "\n\nBest wishes,", "\n\nWarmly,",
];

/// Strips a known greeting prefix and signoff suffix. Returns the cleaned
/// text and whether anything changed.
pub fn sanitize_letter(text: &str) -> (String, bool) {
    let original = text;
    let mut text = text.trim().to_string();

    for greeting in GREETING_LINES {
        if let Some(rest) = text.strip_prefix(greeting) {
            text = rest.trim().to_string();
            break;
        }
    }

    for signoff in SIGNOFF_LINES {
        if let Some(rest) = text.strip_suffix(signoff) {
            text = rest.trim().to_string();
            break;
        }
    }

    let changed = text != original;
    (text, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_terms_fail() {
        let result = validate_letter("Watch your spending this week.", true);
        assert!(!result.valid);
        assert!(result.errors[0].contains("spending"));

        let result = validate_letter("Trust the healing journey ahead.", true);
        assert!(!result.valid);
    }

    #[test]
    fn test_currency_patterns_fail() {
        for text in [
            "You spent $5 there.",
            "That was 5 dollars well used.",
            "Roughly €5 for coffee.",
            "About 50 bucks total.",
            "Target of 5k this quarter.",
        ] {
            let result = validate_letter(text, true);
            assert!(!result.valid, "expected failure for {:?}", text);
        }
    }

    #[test]
    fn test_five_k_steps_false_positive_is_kept() {
        // "5k steps" trips the \d+k\b pattern even though it isn't money.
        // Source behaviour, kept deliberately.
        let result = validate_letter("A walk of 5k steps before breakfast.", true);
        assert!(!result.valid);
        // Spelled out, it passes.
        let result = validate_letter("A walk of five thousand steps before breakfast.", true);
        assert!(result.valid);
    }

    #[test]
    fn test_length_boundaries() {
        let result = validate_letter("tiny", true);
        assert!(!result.valid);

        let long = "a ".repeat(300);
        let result = validate_letter(&long, true);
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("exceeds recommended length")));

        // The same text fits the weekly budget.
        let result = validate_letter(&long, false);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_greeting_and_signoff_warn_but_pass() {
        let result = validate_letter("Hi there, a calm stretch of attention today. Sincerely", true);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_sanitize_strips_greeting_and_signoff() {
        let (text, changed) =
            sanitize_letter("Dear friend, A calm day with one clear thread.\n\nWarmly,");
        assert!(changed);
        assert_eq!(text, "A calm day with one clear thread.");

        let (text, changed) = sanitize_letter("Already clean.");
        assert!(!changed);
        assert_eq!(text, "Already clean.");
    }
}
