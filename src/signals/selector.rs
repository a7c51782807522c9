//! Deterministic theme and action selection. The countermove and label
//! tables are fixed strings; the LLM only writes the surrounding prose.

use crate::signals::extractor::ThemeCandidate;
use crate::signals::profiles::{
    category_mix_label, DayProfile, WeekProfile, MIX_HEALTH_DOMINANT, MIX_IDEAS_DOMINANT,
    MIX_LIFE_DOMINANT, MIX_PROJECTS_DOMINANT,
};

/// Minimum supporting evidence before a theme is worth speaking about.
pub const MIN_THEME_EVIDENCE: usize = 2;

/// Weekly letter eligibility floor.
pub const MIN_WEEKLY_CAPTURES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct NextAction {
    pub text: String,
    /// "project_next", "pending_clarify", "countermove"
    pub source: &'static str,
    pub project_ref: Option<String>,
}

/// Countermove for a theme source type, if the table has one.
pub fn countermove_for_source(source_type: &str) -> Option<&'static str> {
    match source_type {
        "scattered" => Some("Consider picking one thread to pull this week"),
        "friction" => Some("Those pending clarifications might be worth a quiet moment"),
        "health_focus" => Some("The body's been talking - maybe it has something to teach"),
        "project_focus" => Some("Good momentum on projects - what would make next week even better?"),
        "term_repeat" => Some("Something's been on your mind - worth exploring deeper?"),
        _ => None,
    }
}

pub const COUNTERMOVE_HIGH_VOLUME: &str = "Lots of captures lately - anything connecting them?";
pub const COUNTERMOVE_LOW_VOLUME: &str = "Quiet week - sometimes that's exactly what's needed";
pub const COUNTERMOVE_PROJECTS_DOMINANT: &str =
    "Projects taking center stage - is that where you want your energy?";
pub const COUNTERMOVE_HEALTH_DOMINANT: &str =
    "Health's been a theme - listening to signals from the body";
pub const COUNTERMOVE_LIFE_DOMINANT: &str = "Life stuff accumulating - any patterns worth noticing?";
pub const COUNTERMOVE_IDEAS_DOMINANT: &str = "Ideas flowing - which ones have legs?";
pub const COUNTERMOVE_DEFAULT: &str = "What would make next week feel complete?";

fn actionable_priority(source_type: &str) -> u8 {
    match source_type {
        "friction" => 3,
        "stalled" => 2,
        "project_focus" | "health_focus" | "scattered" => 1,
        _ => 0, // term_repeat: observation only
    }
}

/// Picks the best theme or None for silence. Candidates arrive sorted by
/// evidence descending; among ties the more actionable source type wins.
pub fn select_theme(candidates: &[ThemeCandidate]) -> Option<ThemeCandidate> {
    let first = candidates.first()?;
    if first.evidence < MIN_THEME_EVIDENCE {
        return None;
    }

    let mut best = first;
    for candidate in &candidates[1..] {
        if candidate.evidence < best.evidence {
            break;
        }
        if actionable_priority(&candidate.source_type) > actionable_priority(&best.source_type) {
            best = candidate;
        }
    }
    Some(best.clone())
}

/// Best concrete next step for the daily letter:
/// project next-action > pending clarifications > theme countermove > none.
pub fn select_daily_action(profile: &DayProfile) -> Option<NextAction> {
    for pa in &profile.project_activity {
        if let Some(next) = &pa.next_action {
            if !next.is_empty() {
                return Some(NextAction {
                    text: next.clone(),
                    source: "project_next",
                    project_ref: Some(pa.name.clone()),
                });
            }
        }
    }

    if profile.pending_count > 0 {
        return Some(NextAction {
            text: "You have pending clarifications to review".to_string(),
            source: "pending_clarify",
            project_ref: None,
        });
    }

    if let Some(theme) = &profile.selected_theme {
        if let Some(countermove) = countermove_for_source(&theme.source_type) {
            return Some(NextAction {
                text: countermove.to_string(),
                source: "countermove",
                project_ref: None,
            });
        }
    }

    None
}

/// Countermove for the weekly letter: theme, then volume bucket, then
/// dominant-category label, then the default.
pub fn select_weekly_countermove(profile: &WeekProfile) -> &'static str {
    if let Some(theme) = &profile.selected_theme {
        if let Some(countermove) = countermove_for_source(&theme.source_type) {
            return countermove;
        }
    }

    if profile.capture_count >= 20 {
        return COUNTERMOVE_HIGH_VOLUME;
    }
    if profile.capture_count <= 5 {
        return COUNTERMOVE_LOW_VOLUME;
    }

    match category_mix_label(&profile.counts_by_category) {
        label if label == MIX_PROJECTS_DOMINANT => COUNTERMOVE_PROJECTS_DOMINANT,
        label if label == MIX_HEALTH_DOMINANT => COUNTERMOVE_HEALTH_DOMINANT,
        label if label == MIX_LIFE_DOMINANT => COUNTERMOVE_LIFE_DOMINANT,
        label if label == MIX_IDEAS_DOMINANT => COUNTERMOVE_IDEAS_DOMINANT,
        _ => COUNTERMOVE_DEFAULT,
    }
}

/// Resolves the day profile's theme and action in place.
pub fn apply_theme_selection(profile: &mut DayProfile) {
    profile.selected_theme = select_theme(&profile.theme_candidates);
    profile.best_next_action = select_daily_action(profile);
}

/// Resolves the week profile's theme in place.
pub fn apply_weekly_theme_selection(profile: &mut WeekProfile) {
    profile.selected_theme = select_theme(&profile.theme_candidates);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::extractor::ProjectActivity;

    fn theme(name: &str, evidence: usize, source_type: &str) -> ThemeCandidate {
        ThemeCandidate {
            name: name.to_string(),
            evidence,
            source_type: source_type.to_string(),
        }
    }

    #[test]
    fn test_select_theme_empty_and_below_threshold() {
        assert_eq!(select_theme(&[]), None);
        assert_eq!(select_theme(&[theme("x_focus", 1, "term_repeat")]), None);
    }

    #[test]
    fn test_select_theme_prefers_actionable_on_tie() {
        let candidates = vec![
            theme("sleep_focus", 4, "term_repeat"),
            theme("definition_friction", 4, "friction"),
            theme("health_focus", 3, "health_focus"),
        ];
        let selected = select_theme(&candidates).unwrap();
        assert_eq!(selected.name, "definition_friction");
    }

    #[test]
    fn test_select_theme_evidence_wins_over_priority() {
        let candidates = vec![
            theme("sleep_focus", 5, "term_repeat"),
            theme("definition_friction", 4, "friction"),
        ];
        assert_eq!(select_theme(&candidates).unwrap().name, "sleep_focus");
    }

    #[test]
    fn test_daily_action_priority() {
        let mut profile = DayProfile {
            pending_count: 2,
            project_activity: vec![ProjectActivity {
                name: "cave".to_string(),
                mention_count: 3,
                last_mention: chrono::Utc::now(),
                next_action: Some("Book the cave trip dates".to_string()),
            }],
            ..Default::default()
        };
        profile.selected_theme = Some(theme("health_focus", 3, "health_focus"));

        // Project next-action outranks everything.
        let action = select_daily_action(&profile).unwrap();
        assert_eq!(action.source, "project_next");
        assert_eq!(action.project_ref.as_deref(), Some("cave"));

        // Then pending clarifications.
        profile.project_activity[0].next_action = None;
        let action = select_daily_action(&profile).unwrap();
        assert_eq!(action.source, "pending_clarify");

        // Then the theme countermove.
        profile.pending_count = 0;
        let action = select_daily_action(&profile).unwrap();
        assert_eq!(action.source, "countermove");

        // Then nothing.
        profile.selected_theme = None;
        assert!(select_daily_action(&profile).is_none());
    }

    #[test]
    fn test_weekly_countermove_fallback_chain() {
        let mut profile = WeekProfile {
            capture_count: 10,
            ..Default::default()
        };

        // No theme, mid volume, no dominant category → default.
        assert_eq!(select_weekly_countermove(&profile), COUNTERMOVE_DEFAULT);

        // Volume buckets.
        profile.capture_count = 25;
        assert_eq!(select_weekly_countermove(&profile), COUNTERMOVE_HIGH_VOLUME);
        profile.capture_count = 4;
        assert_eq!(select_weekly_countermove(&profile), COUNTERMOVE_LOW_VOLUME);

        // Dominant category label.
        profile.capture_count = 10;
        profile
            .counts_by_category
            .insert("Projects".to_string(), 8);
        profile.counts_by_category.insert("Life".to_string(), 2);
        assert_eq!(
            select_weekly_countermove(&profile),
            COUNTERMOVE_PROJECTS_DOMINANT
        );

        // Theme countermove beats them all.
        profile.selected_theme = Some(theme("definition_friction", 5, "friction"));
        assert_eq!(
            select_weekly_countermove(&profile),
            countermove_for_source("friction").unwrap()
        );
    }
}
