//! Exponential decay over the long-term signal table.
//!
//! Weights decay as `w = w0 * exp(-λ·Δdays)` with λ = ln 2 / half-life.
//! Projects that were ever dominant are floored and never deleted; every
//! other signal is pruned once it decays below 1e-3.

use chrono::Utc;
use tracing::debug;

use crate::db::Store;

// Half-lives in days.
pub const HALF_LIFE_TERM: f64 = 3.0;
pub const HALF_LIFE_CATEGORY: f64 = 7.0;
pub const HALF_LIFE_PROJECT: f64 = 30.0;

/// Decay floor for projects carrying the ever_dominant flag.
pub const FLOOR_PROJECT: f64 = 0.02;

/// Signals below this after decay are deleted (dominant projects excepted).
pub const PRUNE_THRESHOLD: f64 = 1e-3;

const LN_2: f64 = std::f64::consts::LN_2;

fn half_life(signal_type: &str) -> f64 {
    match signal_type {
        "term" => HALF_LIFE_TERM,
        "category" => HALF_LIFE_CATEGORY,
        "project" => HALF_LIFE_PROJECT,
        _ => HALF_LIFE_TERM,
    }
}

fn cap(signal_type: &str) -> f64 {
    match signal_type {
        "term" => 10.0,
        "category" => 5.0,
        "project" => 10.0,
        _ => 10.0,
    }
}

fn boost_value(signal_type: &str) -> f64 {
    match signal_type {
        "term" => 1.0,
        "category" => 0.5,
        "project" => 1.0,
        _ => 1.0,
    }
}

/// Applies decay for `days_since` elapsed days. Dominant projects are
/// floored at [`FLOOR_PROJECT`].
pub fn decay_weight(
    old_weight: f64,
    days_since: f64,
    signal_type: &str,
    ever_dominant: bool,
) -> f64 {
    let lambda = LN_2 / half_life(signal_type);
    let mut weight = old_weight * (-lambda * days_since).exp();

    if signal_type == "project" && ever_dominant && weight < FLOOR_PROJECT {
        weight = FLOOR_PROJECT;
    }

    weight
}

/// Boosts a signal with lazy decay: the stored weight is decayed for the
/// time since its last update, the type's boost is added, and the result is
/// capped. Absent signals start at the boost value.
pub async fn boost_signal(store: &Store, key: &str, signal_type: &str) -> anyhow::Result<()> {
    let boost = boost_value(signal_type);
    let limit = cap(signal_type);

    let new_weight = match store.get_signal(key).await? {
        None => boost,
        Some(existing) => {
            let days_since =
                (Utc::now() - existing.last_updated).num_seconds() as f64 / 86_400.0;
            decay_weight(
                existing.weight,
                days_since.max(0.0),
                signal_type,
                existing.ever_dominant,
            ) + boost
        }
    };

    store
        .upsert_signal(key, signal_type, new_weight.min(limit))
        .await
}

/// Walks every signal, decays it for the elapsed days, and prunes signals
/// that fell below the threshold. Runs daily before letter generation.
pub async fn decay_all(store: &Store) -> anyhow::Result<()> {
    let signals = store.get_all_signals().await?;
    let now = Utc::now();

    let mut pruned = 0usize;
    for signal in signals {
        let days_since = (now - signal.last_updated).num_seconds() as f64 / 86_400.0;
        if days_since <= 0.0 {
            continue;
        }

        let new_weight = decay_weight(
            signal.weight,
            days_since,
            &signal.signal_type,
            signal.ever_dominant,
        );

        if new_weight < PRUNE_THRESHOLD
            && !(signal.signal_type == "project" && signal.ever_dominant)
        {
            store.delete_signal(&signal.key).await?;
            pruned += 1;
            continue;
        }

        store.update_signal_weight(&signal.key, new_weight).await?;
    }

    if pruned > 0 {
        debug!(pruned, "Pruned decayed signals");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_zero_days_is_identity() {
        let w = decay_weight(1.0, 0.0, "term", false);
        assert!((w - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_decay_half_life() {
        // One term half-life (3 days) halves the weight.
        let w = decay_weight(1.0, 3.0, "term", false);
        assert!((w - 0.5).abs() < 0.01, "got {}", w);

        let w = decay_weight(4.0, 7.0, "category", false);
        assert!((w - 2.0).abs() < 0.01, "got {}", w);

        let w = decay_weight(2.0, 30.0, "project", false);
        assert!((w - 1.0).abs() < 0.01, "got {}", w);
    }

    #[test]
    fn test_decay_ten_days_of_term() {
        // w = 1.0 * exp(-ln2/3 * 10) ≈ 0.099 — still above the prune
        // threshold after ten days.
        let w = decay_weight(1.0, 10.0, "term", false);
        assert!((w - 0.099).abs() < 0.01, "got {}", w);
        assert!(w > PRUNE_THRESHOLD);
    }

    #[test]
    fn test_dominant_project_floor() {
        let w = decay_weight(0.5, 365.0, "project", true);
        assert_eq!(w, FLOOR_PROJECT);
        // Without the flag the same decay goes to ~zero.
        let w = decay_weight(0.5, 365.0, "project", false);
        assert!(w < FLOOR_PROJECT);
    }

    #[tokio::test]
    async fn test_boost_new_and_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        boost_signal(&store, "term:cache", "term").await.unwrap();
        let s = store.get_signal("term:cache").await.unwrap().unwrap();
        assert!((s.weight - 1.0).abs() < 1e-9);

        // Boosting again with ~zero elapsed time doubles the weight.
        boost_signal(&store, "term:cache", "term").await.unwrap();
        let s = store.get_signal("term:cache").await.unwrap().unwrap();
        assert!((s.weight - 2.0).abs() < 0.01, "got {}", s.weight);
    }

    #[tokio::test]
    async fn test_boost_respects_cap() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        store.upsert_signal("cat:Health", "category", 4.9).await.unwrap();
        boost_signal(&store, "cat:Health", "category").await.unwrap();
        let s = store.get_signal("cat:Health").await.unwrap().unwrap();
        assert!(s.weight <= 5.0);
    }

    #[tokio::test]
    async fn test_decay_all_prunes_tiny_signals() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        store.upsert_signal("term:gone", "term", 0.002).await.unwrap();
        store.upsert_signal("project:kept", "project", 0.002).await.unwrap();
        store.mark_dominant("project:kept").await.unwrap();

        // Backdate both so decay_all sees elapsed time. 30 days of term
        // decay pushes 0.002 below 1e-3; the dominant project is floored.
        let past = (Utc::now() - chrono::Duration::days(30)).to_rfc3339();
        for key in ["term:gone", "project:kept"] {
            sqlx::query("UPDATE signals SET last_updated = ? WHERE key = ?")
                .bind(&past)
                .bind(key)
                .execute(store.pool_for_tests())
                .await
                .unwrap();
        }

        decay_all(&store).await.unwrap();

        assert!(store.get_signal("term:gone").await.unwrap().is_none());
        let kept = store.get_signal("project:kept").await.unwrap().unwrap();
        assert!(kept.weight >= FLOOR_PROJECT);
    }
}
