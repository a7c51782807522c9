use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{writer, Vault};

/// One line of `Financial/Ledger/transactions_<actor>.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: String,
    pub ts: String,
    pub actor: String,
    pub amount: f64,
    pub currency: String,
    pub merchant: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub confidence: f64,
    pub raw: String,
    pub device: String,
}

impl LedgerTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &str,
        actor: &str,
        device_id: &str,
        raw: &str,
        amount: f64,
        currency: &str,
        merchant: &str,
        label: &str,
        notes: &str,
        confidence: f64,
    ) -> Self {
        Self {
            id: id.to_string(),
            ts: Utc::now().to_rfc3339(),
            actor: actor.to_string(),
            amount,
            currency: currency.to_string(),
            merchant: merchant.to_string(),
            label: label.to_string(),
            notes: notes.to_string(),
            confidence,
            raw: raw.to_string(),
            device: device_id.to_string(),
        }
    }
}

impl Vault {
    /// Appends a transaction to the actor's ledger, serialised per actor so
    /// concurrent purchases never interleave partial lines.
    pub async fn write_transaction(&self, txn: &LedgerTransaction) -> anyhow::Result<String> {
        let lock = self.ledger_lock_for(&txn.actor).await;
        let _guard = lock.lock().await;

        let rel_path = format!("Financial/Ledger/transactions_{}.jsonl", txn.actor);
        let path = self.base_path().join(&rel_path);
        let line = serde_json::to_vec(txn)?;
        writer::append_line(&path, &line)?;
        Ok(rel_path)
    }

    async fn ledger_lock_for(&self, actor: &str) -> Arc<Mutex<()>> {
        let mut locks = self.ledger_locks.lock().await;
        locks
            .entry(actor.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ledger_is_per_actor() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new(dir.path());

        let txn = LedgerTransaction::new(
            "txn_1", "wolf", "d1", "coffee 3.50", 3.5, "GBP", "cafe", "food", "", 0.9,
        );
        let rel = vault.write_transaction(&txn).await.unwrap();
        assert_eq!(rel, "Financial/Ledger/transactions_wolf.jsonl");

        let other = LedgerTransaction::new(
            "txn_2", "wife", "d2", "groceries", 20.0, "GBP", "shop", "groceries", "", 0.8,
        );
        vault.write_transaction(&other).await.unwrap();

        assert!(dir
            .path()
            .join("Financial/Ledger/transactions_wife.jsonl")
            .exists());
        let content =
            std::fs::read_to_string(dir.path().join("Financial/Ledger/transactions_wolf.jsonl"))
                .unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
