//! Day and week profiles: window evidence first, the signals table only as
//! a long-term breadcrumb.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::db::Store;
use crate::signals::extractor::{
    build_window_evidence, detect_temporal_shape, detect_themes, top_terms, ProjectActivity,
    TermCount, ThemeCandidate,
};
use crate::signals::selector::NextAction;

#[derive(Debug, Default)]
pub struct DayProfile {
    pub date: String,
    pub capture_count: usize,
    pub counts_by_category: HashMap<String, usize>,
    pub top_terms_in_window: Vec<TermCount>,
    pub project_activity: Vec<ProjectActivity>,
    pub pending_count: usize,
    pub temporal_shape: &'static str,
    /// Decayed long-term term weights, tie-breaks only.
    pub long_term_tendencies: Vec<WeightedTerm>,
    pub theme_candidates: Vec<ThemeCandidate>,
    pub selected_theme: Option<ThemeCandidate>,
    pub best_next_action: Option<NextAction>,
}

#[derive(Debug, Default)]
pub struct WeekProfile {
    /// ISO week id, e.g. "2026-W06".
    pub week_id: String,
    pub capture_count: usize,
    pub counts_by_category: HashMap<String, usize>,
    pub top_terms_in_window: Vec<TermCount>,
    pub project_activity: Vec<ProjectActivity>,
    pub theme_candidates: Vec<ThemeCandidate>,
    pub selected_theme: Option<ThemeCandidate>,
}

#[derive(Debug, Clone)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: f64,
}

// Fixed strings for deterministic phrasing; the LLM never invents these.
pub const MIX_PROJECTS_DOMINANT: &str = "mostly Projects";
pub const MIX_HEALTH_DOMINANT: &str = "mostly Health";
pub const MIX_LIFE_DOMINANT: &str = "mostly Life";
pub const MIX_IDEAS_DOMINANT: &str = "mostly Ideas";
pub const MIX_HEALTH_LIFE: &str = "Health and Life";
pub const MIX_PROJECTS_HEALTH: &str = "Projects and Health";
pub const MIX_MIXED: &str = "mixed activity";
pub const MIX_LIGHT: &str = "light capture day";

/// Maps category counts to a fixed activity-mix label.
pub fn category_mix_label(counts: &HashMap<String, usize>) -> &'static str {
    let total: usize = counts.values().sum();
    if total < 3 {
        return MIX_LIGHT;
    }

    let (max_cat, max_count) = counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(cat, &count)| (cat.as_str(), count))
        .unwrap_or(("", 0));

    if (max_count as f64) / (total as f64) > 0.5 {
        match max_cat {
            "Projects" => return MIX_PROJECTS_DOMINANT,
            "Health" => return MIX_HEALTH_DOMINANT,
            "Life" => return MIX_LIFE_DOMINANT,
            "Ideas" => return MIX_IDEAS_DOMINANT,
            _ => {}
        }
    }

    let health = counts.get("Health").copied().unwrap_or(0);
    let life = counts.get("Life").copied().unwrap_or(0);
    let projects = counts.get("Projects").copied().unwrap_or(0);

    if health > 0 && life > 0 && health + life > total / 2 {
        return MIX_HEALTH_LIFE;
    }
    if projects > 0 && health > 0 && projects + health > total / 2 {
        return MIX_PROJECTS_HEALTH;
    }

    MIX_MIXED
}

/// Builds a day profile from the 24 h window ending at `date`.
pub async fn build_day_profile(
    store: &Store,
    actor: &str,
    date: DateTime<Utc>,
) -> anyhow::Result<DayProfile> {
    let since = date - Duration::hours(24);
    let captures = store.get_recent_captures(actor, since).await?;
    let pending = store.get_pending(actor).await?;

    let evidence = build_window_evidence(&captures, pending.len());

    let mut profile = DayProfile {
        date: date.format("%Y-%m-%d").to_string(),
        capture_count: captures.len(),
        pending_count: pending.len(),
        top_terms_in_window: top_terms(&evidence, 5),
        temporal_shape: detect_temporal_shape(&evidence.timestamps),
        theme_candidates: detect_themes(&evidence),
        counts_by_category: evidence.category_counts,
        project_activity: evidence.project_activity,
        ..Default::default()
    };

    // Long-term tendencies are best-effort; the window always wins.
    if let Ok(signals) = store.get_top_signals("term", 10).await {
        profile.long_term_tendencies = signals
            .into_iter()
            .map(|s| WeightedTerm {
                term: s.key.strip_prefix("term:").unwrap_or(&s.key).to_string(),
                weight: s.weight,
            })
            .collect();
    }

    Ok(profile)
}

/// Builds a week profile from the 7 d window ending at `week_start`.
pub async fn build_week_profile(
    store: &Store,
    actor: &str,
    week_start: DateTime<Utc>,
) -> anyhow::Result<WeekProfile> {
    let since = week_start - Duration::days(7);
    let captures = store.get_recent_captures(actor, since).await?;
    let pending = store.get_pending(actor).await?;

    let evidence = build_window_evidence(&captures, pending.len());
    let iso = week_start.iso_week();

    Ok(WeekProfile {
        week_id: format!("{}-W{:02}", iso.year(), iso.week()),
        capture_count: captures.len(),
        top_terms_in_window: top_terms(&evidence, 5),
        theme_candidates: detect_themes(&evidence),
        counts_by_category: evidence.category_counts,
        project_activity: evidence.project_activity,
        selected_theme: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, usize)]) -> HashMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_mix_label_light() {
        assert_eq!(category_mix_label(&counts(&[])), MIX_LIGHT);
        assert_eq!(category_mix_label(&counts(&[("Ideas", 2)])), MIX_LIGHT);
    }

    #[test]
    fn test_mix_label_dominant() {
        assert_eq!(
            category_mix_label(&counts(&[("Projects", 4), ("Life", 1)])),
            MIX_PROJECTS_DOMINANT
        );
        assert_eq!(
            category_mix_label(&counts(&[("Health", 5), ("Ideas", 2)])),
            MIX_HEALTH_DOMINANT
        );
    }

    #[test]
    fn test_mix_label_pairings() {
        assert_eq!(
            category_mix_label(&counts(&[("Health", 2), ("Life", 2), ("Ideas", 1), ("Tasks", 1)])),
            MIX_HEALTH_LIFE
        );
        assert_eq!(
            category_mix_label(&counts(&[("Projects", 2), ("Health", 2), ("Ideas", 1), ("Tasks", 1)])),
            MIX_PROJECTS_HEALTH
        );
    }

    #[test]
    fn test_mix_label_mixed_fallback() {
        assert_eq!(
            category_mix_label(&counts(&[
                ("Ideas", 2),
                ("Tasks", 2),
                ("Spirituality", 1),
                ("Journal", 1)
            ])),
            MIX_MIXED
        );
    }

    #[test]
    fn test_exactly_half_is_not_dominant() {
        // 3 of 6 is not > 50%.
        assert_eq!(
            category_mix_label(&counts(&[("Projects", 3), ("Ideas", 2), ("Tasks", 1)])),
            MIX_MIXED
        );
    }
}
