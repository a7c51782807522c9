//! Window evidence: statistics over the captures inside a time window.
//! This is the primary input for letter generation; the signals table is
//! only a long-term tie-breaker.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::db::CaptureRecord;
use crate::signals::stopwords::is_stopword;

static WORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z]+").expect("valid regex"));

/// Evidence computed from the captures in a window plus the current pending
/// count.
#[derive(Debug, Default)]
pub struct WindowEvidence {
    pub term_counts: HashMap<String, usize>,
    pub category_counts: HashMap<String, usize>,
    pub project_activity: Vec<ProjectActivity>,
    pub pending_count: usize,
    pub timestamps: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ProjectActivity {
    pub name: String,
    pub mention_count: usize,
    pub last_mention: DateTime<Utc>,
    pub next_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThemeCandidate {
    pub name: String,
    /// Count of supporting events in the window.
    pub evidence: usize,
    /// "term_repeat", "friction", "health_focus", "project_focus", "scattered"
    pub source_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

/// Lowercases, splits on ASCII letter runs, drops words under 3 chars and
/// stopwords, and returns the top `max_terms` by frequency.
pub fn extract_terms(text: &str, max_terms: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for m in WORD_REGEX.find_iter(&lowered) {
        let word = m.as_str();
        if word.len() < 3 || is_stopword(word) {
            continue;
        }
        *counts.entry(word).or_default() += 1;
    }

    let mut sorted: Vec<(&str, usize)> = counts.into_iter().collect();
    // Count descending, then alphabetical so equal counts are stable.
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    sorted
        .into_iter()
        .take(max_terms)
        .map(|(term, _)| term.to_string())
        .collect()
}

/// Builds window evidence from captures. Each capture contributes its top
/// 10 terms; captures routed to Projects also feed project activity keyed
/// by their top term.
pub fn build_window_evidence(captures: &[CaptureRecord], pending_count: usize) -> WindowEvidence {
    let mut evidence = WindowEvidence {
        pending_count,
        ..Default::default()
    };

    let mut projects: HashMap<String, ProjectActivity> = HashMap::new();

    for capture in captures {
        let terms = extract_terms(&capture.raw_text, 10);
        for term in &terms {
            *evidence.term_counts.entry(term.clone()).or_default() += 1;
        }

        if !capture.routed_to.is_empty() {
            *evidence
                .category_counts
                .entry(capture.routed_to.clone())
                .or_default() += 1;
        }

        evidence.timestamps.push(capture.created_at);

        if capture.routed_to == "Projects" {
            let name = terms
                .first()
                .cloned()
                .unwrap_or_else(|| "unnamed".to_string());
            projects
                .entry(name.clone())
                .and_modify(|pa| {
                    pa.mention_count += 1;
                    if capture.created_at > pa.last_mention {
                        pa.last_mention = capture.created_at;
                    }
                })
                .or_insert(ProjectActivity {
                    name,
                    mention_count: 1,
                    last_mention: capture.created_at,
                    next_action: None,
                });
        }
    }

    evidence.project_activity = projects.into_values().collect();
    evidence
        .project_activity
        .sort_by(|a, b| b.mention_count.cmp(&a.mention_count).then_with(|| a.name.cmp(&b.name)));

    evidence
}

/// Rule-based theme detection over window evidence, sorted by supporting
/// evidence descending.
pub fn detect_themes(evidence: &WindowEvidence) -> Vec<ThemeCandidate> {
    let mut candidates = Vec::new();

    // Repeated terms (count >= 3).
    for (term, &count) in &evidence.term_counts {
        if count >= 3 {
            candidates.push(ThemeCandidate {
                name: format!("{}_focus", term),
                evidence: count,
                source_type: "term_repeat".to_string(),
            });
        }
    }

    // Definition friction: pending clarifications piling up.
    if evidence.pending_count > 3 {
        candidates.push(ThemeCandidate {
            name: "definition_friction".to_string(),
            evidence: evidence.pending_count,
            source_type: "friction".to_string(),
        });
    }

    if let Some(&health) = evidence.category_counts.get("Health") {
        if health >= 3 {
            candidates.push(ThemeCandidate {
                name: "health_focus".to_string(),
                evidence: health,
                source_type: "health_focus".to_string(),
            });
        }
    }

    if let Some(&projects) = evidence.category_counts.get("Projects") {
        if projects >= 2 {
            candidates.push(ThemeCandidate {
                name: "project_progress".to_string(),
                evidence: projects,
                source_type: "project_focus".to_string(),
            });
        }
    }

    // Scattered attention: >= 4 categories and no single one holding 40%.
    let category_count = evidence.category_counts.len();
    if category_count >= 4 {
        let total: usize = evidence.category_counts.values().sum();
        let max = evidence.category_counts.values().copied().max().unwrap_or(0);
        if total > 0 && (max as f64) / (total as f64) < 0.4 {
            candidates.push(ThemeCandidate {
                name: "scattered_attention".to_string(),
                evidence: category_count,
                source_type: "scattered".to_string(),
            });
        }
    }

    candidates.sort_by(|a, b| b.evidence.cmp(&a.evidence).then_with(|| a.name.cmp(&b.name)));
    candidates
}

/// Classifies the temporal shape of a set of capture timestamps:
/// fewer than 3 → "scattered"; 70%+ inside any 2-hour window → "clustered";
/// otherwise steady when the inter-capture gaps have cv² < 1.
pub fn detect_temporal_shape(timestamps: &[DateTime<Utc>]) -> &'static str {
    if timestamps.len() < 3 {
        return "scattered";
    }

    let mut sorted = timestamps.to_vec();
    sorted.sort();

    let total = sorted.len();
    for i in 0..total {
        let window_end = sorted[i] + Duration::hours(2);
        let in_window = sorted[i..].iter().take_while(|t| **t < window_end).count();
        if (in_window as f64) / (total as f64) >= 0.7 {
            return "clustered";
        }
    }

    let gaps: Vec<f64> = sorted
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0)
        .collect();
    let avg_gap = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let variance = gaps
        .iter()
        .map(|g| (g - avg_gap) * (g - avg_gap))
        .sum::<f64>()
        / gaps.len() as f64;

    if avg_gap > 0.0 && variance / (avg_gap * avg_gap) < 1.0 {
        return "steady";
    }

    "scattered"
}

/// Top N terms from evidence by count.
pub fn top_terms(evidence: &WindowEvidence, n: usize) -> Vec<TermCount> {
    let mut terms: Vec<TermCount> = evidence
        .term_counts
        .iter()
        .map(|(term, &count)| TermCount {
            term: term.clone(),
            count,
        })
        .collect();
    terms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    terms.truncate(n);
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(text: &str, routed_to: &str, created_at: DateTime<Utc>) -> CaptureRecord {
        CaptureRecord {
            capture_id: format!("cap_{}", uuid::Uuid::new_v4().simple()),
            actor: "wolf".to_string(),
            mode: "note".to_string(),
            raw_text: text.to_string(),
            routed_to: routed_to.to_string(),
            confidence: 0.9,
            status: "filed".to_string(),
            created_at,
        }
    }

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_extract_terms_filters_and_orders() {
        let terms = extract_terms("the cache cache cache is a fast cache, sleep sleep", 10);
        assert_eq!(terms[0], "cache");
        assert_eq!(terms[1], "sleep");
        assert!(!terms.contains(&"the".to_string()));
        assert!(!terms.contains(&"is".to_string()));
    }

    #[test]
    fn test_extract_terms_drops_short_words() {
        let terms = extract_terms("go to ab cd run run", 10);
        assert_eq!(terms, vec!["run".to_string()]);
    }

    #[test]
    fn test_window_evidence_counts() {
        let captures = vec![
            capture("sleep tracking experiment", "Health", ts("2026-02-10T08:00:00Z")),
            capture("sleep quality dashboard", "Projects", ts("2026-02-10T09:00:00Z")),
            capture("bad sleep again", "Health", ts("2026-02-10T22:00:00Z")),
        ];
        let evidence = build_window_evidence(&captures, 2);
        assert_eq!(evidence.term_counts["sleep"], 3);
        assert_eq!(evidence.category_counts["Health"], 2);
        assert_eq!(evidence.category_counts["Projects"], 1);
        assert_eq!(evidence.pending_count, 2);
        assert_eq!(evidence.project_activity.len(), 1);
        // Equal term counts break alphabetically, so the project takes the
        // first term of the Projects capture: "dashboard".
        assert_eq!(evidence.project_activity[0].name, "dashboard");
    }

    #[test]
    fn test_theme_term_repeat() {
        let captures = vec![
            capture("sleep one", "Health", ts("2026-02-10T08:00:00Z")),
            capture("sleep two", "Health", ts("2026-02-10T09:00:00Z")),
            capture("sleep three", "Life", ts("2026-02-10T10:00:00Z")),
        ];
        let evidence = build_window_evidence(&captures, 0);
        let themes = detect_themes(&evidence);
        assert!(themes
            .iter()
            .any(|t| t.name == "sleep_focus" && t.source_type == "term_repeat"));
    }

    #[test]
    fn test_theme_friction_requires_more_than_three() {
        let evidence = build_window_evidence(&[], 3);
        assert!(detect_themes(&evidence).is_empty());
        let evidence = build_window_evidence(&[], 4);
        let themes = detect_themes(&evidence);
        assert_eq!(themes[0].name, "definition_friction");
        assert_eq!(themes[0].evidence, 4);
    }

    #[test]
    fn test_scattered_attention_boundary() {
        // 4 categories, max share exactly 0.4 → not scattered.
        let mut captures = Vec::new();
        for (n, cat) in [(4usize, "Ideas"), (2, "Health"), (2, "Life"), (2, "Tasks")] {
            for i in 0..n {
                captures.push(capture(
                    &format!("{} item {}", cat, i),
                    cat,
                    ts("2026-02-10T08:00:00Z"),
                ));
            }
        }
        let evidence = build_window_evidence(&captures, 0);
        assert!(!detect_themes(&evidence)
            .iter()
            .any(|t| t.name == "scattered_attention"));

        // Drop one Ideas capture: max share 3/9 < 0.4 → scattered fires.
        captures.pop();
        let mut captures2 = Vec::new();
        for (n, cat) in [(3usize, "Ideas"), (2, "Health"), (2, "Life"), (2, "Tasks")] {
            for i in 0..n {
                captures2.push(capture(
                    &format!("{} item {}", cat, i),
                    cat,
                    ts("2026-02-10T08:00:00Z"),
                ));
            }
        }
        let evidence = build_window_evidence(&captures2, 0);
        assert!(detect_themes(&evidence)
            .iter()
            .any(|t| t.name == "scattered_attention" && t.evidence == 4));
    }

    #[test]
    fn test_temporal_shape_too_few() {
        assert_eq!(
            detect_temporal_shape(&[ts("2026-02-10T08:00:00Z"), ts("2026-02-10T09:00:00Z")]),
            "scattered"
        );
    }

    #[test]
    fn test_temporal_shape_clustered() {
        // Exactly 3 stamps inside a 2 h span.
        let stamps = vec![
            ts("2026-02-10T08:00:00Z"),
            ts("2026-02-10T08:30:00Z"),
            ts("2026-02-10T09:30:00Z"),
        ];
        assert_eq!(detect_temporal_shape(&stamps), "clustered");
    }

    #[test]
    fn test_temporal_shape_steady() {
        // Evenly spaced every 4 hours: no 2 h cluster, zero variance.
        let stamps = vec![
            ts("2026-02-10T04:00:00Z"),
            ts("2026-02-10T08:00:00Z"),
            ts("2026-02-10T12:00:00Z"),
            ts("2026-02-10T16:00:00Z"),
        ];
        assert_eq!(detect_temporal_shape(&stamps), "steady");
    }

    #[test]
    fn test_temporal_shape_scattered_high_variance() {
        // Two tight pairs far apart plus a distant tail: no 2 h window holds
        // 70%, and the gap variance is above the steadiness bound.
        let stamps = vec![
            ts("2026-02-10T00:00:00Z"),
            ts("2026-02-10T00:01:00Z"),
            ts("2026-02-10T08:00:00Z"),
            ts("2026-02-10T08:01:00Z"),
            ts("2026-02-10T23:00:00Z"),
        ];
        assert_eq!(detect_temporal_shape(&stamps), "scattered");
    }
}
