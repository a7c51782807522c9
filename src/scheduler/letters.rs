//! Letter generation: trend analysis and theme selection feed a tightly
//! constrained prompt; the reply is normalised to a fixed shape, validated,
//! and sanitised before it reaches the vault.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::db::Store;
use crate::llm::OllamaClient;
use crate::signals::decay::boost_signal;
use crate::signals::profiles::{
    build_day_profile, build_week_profile, category_mix_label,
};
use crate::signals::selector::{
    apply_theme_selection, apply_weekly_theme_selection, select_weekly_countermove,
};
use crate::signals::trends::{build_trend_data, format_trend_context};
use crate::signals::validator::{sanitize_letter, validate_letter};

// Fixed silence strings; the LLM is not consulted for quiet days.
pub const SILENCE_EMPTY_DAY: &str = "Nothing captured today. Carry on.";
pub const SILENCE_LIGHT_DAY: &str = "A light day. Nothing pressing to report.";
pub const SILENCE_QUIET_WEEK: &str = "Quiet week. Sometimes that's exactly what's needed.";

/// Appended when normalisation finds no usable action line.
const DEFAULT_ACTION: &str = "Carry one small thread forward.";

/// Weekly letters skip these categories entirely.
pub const WEEKLY_EXCLUDED: [&str; 3] = ["Financial", "Tasks", "Journal"];

const DAILY_PROMPT: &str = r#"You are writing a brief daily letter. The system has already analyzed recent activity.

{context}
PROFILE (pre-computed by system):
- Date: {date}
- Activity mix: {mix}
- Temporal shape: {shape}
{theme_line}{action_line}
CONSTRAINTS:
- Output exactly two lines, in this shape:
INSIGHT: <one or two short sentences about the pattern>
ACTION: <one concrete, gentle suggestion>
- Start directly, no greeting
- End directly, no signoff
- Warm but not saccharine
- NEVER mention: money, spending, budgets, costs, prices, purchases, $, dollars
- NEVER use: "journey", "growth mindset", "self-care", "boundaries", "space for"
- Do not invent details not provided above
- If a suggested action is provided, include it naturally; if not, suggest nothing beyond the observation

Write the letter now:"#;

const WEEKLY_PROMPT: &str = r#"You are writing a weekly reflection in the third person. The system has analyzed the week.

{context}
PROFILE (pre-computed by system):
- Week: {week}
- Capture count: {count}
- Activity mix: {mix}
- Top themes: {themes}
- Projects active: {projects}
{theme_line}COUNTERMOVE TO INCLUDE: {countermove}

CONSTRAINTS:
- Output exactly four lines, in this shape:
THIS WEEK: <what the week held>
PATTERNS: <what kept recurring>
SHIFTS: <what changed>
NEXT WEEK: <the countermove, phrased naturally>
- Strictly third person, never "I" or "you" as the writer
- Honest, not falsely positive
- NEVER mention: money, spending, budgets, costs, prices, purchases, $, dollars
- NEVER use: "journey", "growth mindset", "self-care", "boundaries", "space for"
- Do not invent details not provided

Write the letter now:"#;

pub struct LetterGenerator {
    store: Arc<Store>,
    llm: Arc<OllamaClient>,
}

impl LetterGenerator {
    pub fn new(store: Arc<Store>, llm: Arc<OllamaClient>) -> Self {
        Self { store, llm }
    }

    /// Generates the daily letter body for an actor. Quiet windows return a
    /// fixed silence string without calling the LLM.
    pub async fn generate_daily(
        &self,
        actor: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<String> {
        let trend = build_trend_data(&self.store, actor, now, &[]).await?;
        if trend.total_captures == 0 {
            return Ok(SILENCE_EMPTY_DAY.to_string());
        }
        if trend.total_captures < 3 {
            return Ok(SILENCE_LIGHT_DAY.to_string());
        }

        let mut profile = build_day_profile(&self.store, actor, now).await?;
        apply_theme_selection(&mut profile);

        let theme_line = profile
            .selected_theme
            .as_ref()
            .map(|t| format!("- Detected theme: {} (evidence: {})\n", t.name, t.evidence))
            .unwrap_or_default();
        let action_line = profile
            .best_next_action
            .as_ref()
            .map(|a| format!("- Suggested action: {}\n", a.text))
            .unwrap_or_default();

        let prompt = DAILY_PROMPT
            .replace("{context}", &format_trend_context(&trend))
            .replace("{date}", &profile.date)
            .replace("{mix}", category_mix_label(&profile.counts_by_category))
            .replace("{shape}", profile.temporal_shape)
            .replace("{theme_line}", &theme_line)
            .replace("{action_line}", &action_line);

        self.generate_validated(&prompt, true, actor).await
    }

    /// Generates the weekly letter body for an actor.
    pub async fn generate_weekly(
        &self,
        actor: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<String> {
        let mut profile = build_week_profile(&self.store, actor, now).await?;
        if profile.capture_count < 3 {
            return Ok(SILENCE_QUIET_WEEK.to_string());
        }

        apply_weekly_theme_selection(&mut profile);
        let countermove = select_weekly_countermove(&profile);

        // Projects with sustained attention feed the long-term signal
        // table; a selected project theme marks the top project dominant.
        if let Some(top_project) = profile.project_activity.first() {
            let key = format!("project:{}", top_project.name);
            if let Err(e) = boost_signal(&self.store, &key, "project").await {
                warn!(key = %key, "Failed to boost project signal: {}", e);
            }
            let theme_is_project = profile
                .selected_theme
                .as_ref()
                .map(|t| t.name == "project_progress")
                .unwrap_or(false);
            if theme_is_project {
                if let Err(e) = self.store.mark_dominant(&key).await {
                    warn!(key = %key, "Failed to mark project dominant: {}", e);
                }
            }
        }

        let trend = build_trend_data(&self.store, actor, now, &WEEKLY_EXCLUDED).await?;

        let themes: Vec<&str> = profile
            .theme_candidates
            .iter()
            .take(3)
            .map(|t| t.name.as_str())
            .collect();
        let themes_str = if themes.is_empty() {
            "no clear themes".to_string()
        } else {
            themes.join(", ")
        };

        let projects: Vec<String> = profile
            .project_activity
            .iter()
            .take(3)
            .map(|p| format!("{} ({})", p.name, p.mention_count))
            .collect();
        let projects_str = if projects.is_empty() {
            "none".to_string()
        } else {
            projects.join(", ")
        };

        let theme_line = profile
            .selected_theme
            .as_ref()
            .map(|t| format!("- Primary theme: {}\n", t.name))
            .unwrap_or_default();

        let prompt = WEEKLY_PROMPT
            .replace("{context}", &format_trend_context(&trend))
            .replace("{week}", &profile.week_id)
            .replace("{count}", &profile.capture_count.to_string())
            .replace("{mix}", category_mix_label(&profile.counts_by_category))
            .replace("{themes}", &themes_str)
            .replace("{projects}", &projects_str)
            .replace("{theme_line}", &theme_line)
            .replace("{countermove}", countermove);

        self.generate_validated(&prompt, false, actor).await
    }

    /// Generate → normalise → validate, with one regeneration on
    /// validation errors, then sanitise and accept whatever came back.
    async fn generate_validated(
        &self,
        prompt: &str,
        is_daily: bool,
        actor: &str,
    ) -> anyhow::Result<String> {
        let mut text = self.generate_once(prompt, is_daily).await?;

        let mut validation = validate_letter(&text, is_daily);
        if !validation.valid {
            warn!(actor = %actor, errors = ?validation.errors, "Letter failed validation, regenerating");
            text = self.generate_once(prompt, is_daily).await?;
            validation = validate_letter(&text, is_daily);
        }

        if !validation.valid {
            warn!(actor = %actor, errors = ?validation.errors, "Letter still invalid, sanitizing and accepting");
            let (sanitized, _) = sanitize_letter(&text);
            text = sanitized;
        }
        for warning in &validation.warnings {
            warn!(actor = %actor, "Letter warning: {}", warning);
        }

        Ok(text)
    }

    async fn generate_once(&self, prompt: &str, is_daily: bool) -> anyhow::Result<String> {
        let response = self.llm.generate_text(prompt, true).await?;
        Ok(if is_daily {
            normalize_daily(&response)
        } else {
            normalize_weekly(&response)
        })
    }
}

/// Forces the `INSIGHT:` / `ACTION:` shape. A reply missing the labels is
/// relabelled line by line; a missing action gets the default.
pub fn normalize_daily(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.contains("INSIGHT:") && trimmed.contains("ACTION:") {
        return trimmed.to_string();
    }

    let lines: Vec<&str> = trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    match lines.len() {
        0 => format!("INSIGHT: {}\nACTION: {}", trimmed, DEFAULT_ACTION),
        1 => format!("INSIGHT: {}\nACTION: {}", lines[0], DEFAULT_ACTION),
        _ => format!("INSIGHT: {}\nACTION: {}", lines[0], lines[1..].join(" ")),
    }
}

const WEEKLY_LABELS: [&str; 4] = ["THIS WEEK:", "PATTERNS:", "SHIFTS:", "NEXT WEEK:"];

/// Forces the four-line weekly shape, relabelling the first lines of a
/// free-form reply in order.
pub fn normalize_weekly(text: &str) -> String {
    let trimmed = text.trim();
    if WEEKLY_LABELS.iter().all(|l| trimmed.contains(l)) {
        return trimmed.to_string();
    }

    let lines: Vec<&str> = trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return trimmed.to_string();
    }

    let mut out = Vec::new();
    for (i, label) in WEEKLY_LABELS.iter().enumerate() {
        match lines.get(i) {
            Some(_) if i == WEEKLY_LABELS.len() - 1 => {
                // Everything left lands on the last label.
                out.push(format!("{} {}", label, lines[i..].join(" ")));
            }
            Some(line) => out.push(format!("{} {}", label, line)),
            None => break,
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_daily_passthrough() {
        let text = "INSIGHT: A steady day.\nACTION: Keep going.";
        assert_eq!(normalize_daily(text), text);
    }

    #[test]
    fn test_normalize_daily_relabels() {
        let text = "A steady day of health notes.\nMaybe check the pending pile.";
        let normalized = normalize_daily(text);
        assert_eq!(
            normalized,
            "INSIGHT: A steady day of health notes.\nACTION: Maybe check the pending pile."
        );
    }

    #[test]
    fn test_normalize_daily_appends_default_action() {
        let normalized = normalize_daily("Just one observation.");
        assert!(normalized.starts_with("INSIGHT: Just one observation."));
        assert!(normalized.contains("ACTION: Carry one small thread forward."));
    }

    #[test]
    fn test_normalize_weekly_passthrough() {
        let text =
            "THIS WEEK: Much.\nPATTERNS: Sleep.\nSHIFTS: Less noise.\nNEXT WEEK: One thread.";
        assert_eq!(normalize_weekly(text), text);
    }

    #[test]
    fn test_normalize_weekly_relabels_and_folds_tail() {
        let text = "A busy week.\nSleep kept coming up.\nQuieter than before.\nPick one thread.\nAnd rest.";
        let normalized = normalize_weekly(text);
        assert!(normalized.starts_with("THIS WEEK: A busy week."));
        assert!(normalized.contains("PATTERNS: Sleep kept coming up."));
        assert!(normalized.ends_with("NEXT WEEK: Pick one thread. And rest."));
    }

    #[test]
    fn test_silence_strings_pass_validation() {
        for s in [SILENCE_EMPTY_DAY, SILENCE_LIGHT_DAY, SILENCE_QUIET_WEEK] {
            let result = validate_letter(s, true);
            assert!(result.valid, "silence string failed validation: {}", s);
        }
    }

    #[test]
    fn test_default_action_passes_validation() {
        let normalized = normalize_daily("One line only.");
        assert!(validate_letter(&normalized, true).valid);
    }
}
