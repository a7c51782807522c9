//! Seven-day trend analysis feeding the daily letter prompt: per-day
//! excerpts, category direction arrows, recurring terms, and momentum
//! shifts.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::db::Store;
use crate::signals::extractor::extract_terms;
use crate::utils::truncate_str;

#[derive(Debug, Default)]
pub struct DaySummary {
    pub date: String,
    pub day_of_week: String,
    pub capture_count: usize,
    /// category → truncated capture texts
    pub captures_by_category: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
pub struct TrendData {
    /// Last 7 days, most recent first.
    pub days: Vec<DaySummary>,
    /// category → "↑ increasing" / "↓ declining" / "→ steady"
    pub category_trend: HashMap<String, &'static str>,
    /// Terms appearing on 3+ distinct days.
    pub recurring_terms: Vec<String>,
    /// e.g. "Projects went quiet since Tue"
    pub momentum_shifts: Vec<String>,
    pub dominant_theme: String,
    pub total_captures: usize,
}

/// Builds trend data from the last 7 days of captures for an actor.
/// `exclude` drops categories from the analysis (the weekly letter skips
/// Financial/Tasks/Journal).
pub async fn build_trend_data(
    store: &Store,
    actor: &str,
    now: DateTime<Utc>,
    exclude: &[&str],
) -> anyhow::Result<TrendData> {
    let since = now - Duration::days(7);
    let captures = store.get_recent_captures(actor, since).await?;

    let mut day_map: HashMap<String, DaySummary> = HashMap::new();
    let mut term_days: HashMap<String, HashSet<String>> = HashMap::new();
    let mut total = 0usize;

    for capture in &captures {
        let category = if capture.routed_to.is_empty() {
            "Uncategorized".to_string()
        } else {
            capture.routed_to.clone()
        };
        if exclude.contains(&category.as_str()) {
            continue;
        }
        total += 1;

        let date = capture.created_at.format("%Y-%m-%d").to_string();
        let day = day_map.entry(date.clone()).or_insert_with(|| DaySummary {
            date: date.clone(),
            day_of_week: capture.created_at.format("%a").to_string(),
            ..Default::default()
        });
        day.capture_count += 1;
        day.captures_by_category
            .entry(category)
            .or_default()
            .push(truncate_str(capture.raw_text.trim(), 60));

        for term in extract_terms(&capture.raw_text, 5) {
            term_days.entry(term).or_default().insert(date.clone());
        }
    }

    let mut dates: Vec<String> = day_map.keys().cloned().collect();
    dates.sort_by(|a, b| b.cmp(a));

    let mut trend = TrendData {
        total_captures: total,
        ..Default::default()
    };
    for date in dates {
        if let Some(day) = day_map.remove(&date) {
            trend.days.push(day);
        }
    }

    let mut recurring: Vec<String> = term_days
        .into_iter()
        .filter(|(_, days)| days.len() >= 3)
        .map(|(term, _)| term)
        .collect();
    recurring.sort();
    trend.recurring_terms = recurring;

    let (category_trend, shifts) = analyze_category_trends(&trend.days);
    trend.category_trend = category_trend;
    trend.momentum_shifts = shifts;
    trend.dominant_theme = detect_dominant_theme(&trend);

    Ok(trend)
}

/// Compares each category's first-half vs second-half volume over the
/// window and flags categories that went quiet.
fn analyze_category_trends(
    days: &[DaySummary],
) -> (HashMap<String, &'static str>, Vec<String>) {
    let mut trends = HashMap::new();
    let mut shifts = Vec::new();

    if days.len() < 2 {
        return (trends, shifts);
    }

    let mut all_categories: HashSet<&String> = HashSet::new();
    for day in days {
        all_categories.extend(day.captures_by_category.keys());
    }

    let midpoint = (days.len() / 2).max(1);

    let mut sorted_categories: Vec<&String> = all_categories.into_iter().collect();
    sorted_categories.sort();

    for category in sorted_categories {
        let mut recent = 0usize;
        let mut older = 0usize;
        for (i, day) in days.iter().enumerate() {
            let count = day
                .captures_by_category
                .get(category)
                .map(|v| v.len())
                .unwrap_or(0);
            if i < midpoint {
                recent += count;
            } else {
                older += count;
            }
        }

        if recent > older * 2 && recent >= 3 {
            trends.insert(category.clone(), "↑ increasing");
        } else if older > recent * 2 && older >= 3 {
            trends.insert(category.clone(), "↓ declining");
            if recent == 0 && older >= 2 {
                // Was active, now silent: find the last day it appeared.
                if let Some(last_active) = days
                    .iter()
                    .rev()
                    .find(|d| d.captures_by_category.contains_key(category))
                {
                    shifts.push(format!(
                        "{} went quiet since {}",
                        category, last_active.day_of_week
                    ));
                }
            }
        } else {
            trends.insert(category.clone(), "→ steady");
        }
    }

    (trends, shifts)
}

fn detect_dominant_theme(trend: &TrendData) -> String {
    let mut category_totals: HashMap<&String, usize> = HashMap::new();
    let mut total = 0usize;
    for day in &trend.days {
        for (category, texts) in &day.captures_by_category {
            *category_totals.entry(category).or_default() += texts.len();
            total += texts.len();
        }
    }

    if total == 0 {
        return "quiet week".to_string();
    }

    let (max_cat, max_count) = category_totals
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(cat, count)| (cat.clone(), count))
        .unwrap_or_default();

    if (max_count as f64) / (total as f64) > 0.4 {
        return format!("{}-focused", max_cat.to_lowercase());
    }

    if let Some(term) = trend.recurring_terms.first() {
        return format!("recurring focus on {}", term);
    }

    "mixed focus".to_string()
}

/// Renders the trend context block for the letter prompt.
pub fn format_trend_context(trend: &TrendData) -> String {
    let mut out = String::from("RECENT ACTIVITY:\n");

    for day in trend.days.iter().take(3) {
        out.push_str(&format!(
            "\n{} ({}) - {} captures:\n",
            day.day_of_week, day.date, day.capture_count
        ));
        let mut categories: Vec<&String> = day.captures_by_category.keys().collect();
        categories.sort();
        for category in categories {
            let texts = &day.captures_by_category[category];
            let quoted: Vec<String> = texts
                .iter()
                .take(3)
                .map(|t| format!("{:?}", t))
                .collect();
            out.push_str(&format!("  {}: {}\n", category, quoted.join(", ")));
        }
    }

    out.push_str("\n7-DAY TRENDS:\n");
    let mut categories: Vec<&String> = trend.category_trend.keys().collect();
    categories.sort();
    for category in categories {
        let direction = trend.category_trend[category];
        if direction != "→ steady" {
            out.push_str(&format!("  {}: {}\n", category, direction));
        }
    }

    if !trend.momentum_shifts.is_empty() {
        out.push_str("\nNOTABLE SHIFTS:\n");
        for shift in &trend.momentum_shifts {
            out.push_str(&format!("  - {}\n", shift));
        }
    }

    if !trend.recurring_terms.is_empty() {
        let terms: Vec<&str> = trend
            .recurring_terms
            .iter()
            .take(5)
            .map(|s| s.as_str())
            .collect();
        out.push_str(&format!("\nRECURRING THEMES (3+ days): {}\n", terms.join(", ")));
    }

    out.push_str(&format!("\nOVERALL: {}\n", trend.dominant_theme));
    out
}
