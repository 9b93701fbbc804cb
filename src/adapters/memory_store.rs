//! In-memory transaction store.
//!
//! Backs offline/demo mode and the test suite. Provides the same atomic
//! single-row read-modify-write guarantee the hosted backend is assumed to
//! give, with a lock standing in for the backend's per-row atomicity.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{ActorId, Transaction, TxStatus};
use crate::ports::{StoreError, StoreResult, TransactionPatch, TransactionStore};

const UPDATE_CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<Uuid, Transaction>>,
    channels: Mutex<HashMap<Uuid, broadcast::Sender<Transaction>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self, tx: &Transaction) {
        let channels = self.channels.lock().expect("channel lock poisoned");
        if let Some(sender) = channels.get(&tx.id) {
            // nobody listening is fine
            let _ = sender.send(tx.clone());
        }
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let mut rows = self.rows.lock().expect("row lock poisoned");
        rows.insert(tx.id, tx.clone());
        Ok(tx.clone())
    }

    async fn fetch(&self, id: Uuid) -> StoreResult<Transaction> {
        let rows = self.rows.lock().expect("row lock poisoned");
        rows.get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update(
        &self,
        id: Uuid,
        expected: Option<TxStatus>,
        patch: TransactionPatch,
    ) -> StoreResult<Transaction> {
        let updated = {
            let mut rows = self.rows.lock().expect("row lock poisoned");
            let row = rows
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

            if let Some(expected) = expected {
                if row.status != expected {
                    return Err(StoreError::Conflict(format!(
                        "expected status {expected}, row is {}",
                        row.status
                    )));
                }
            }

            patch.apply_to(row);
            row.clone()
        };

        self.notify(&updated);
        Ok(updated)
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()> {
        let mut rows = self.rows.lock().expect("row lock poisoned");
        rows.remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn find_active_for(&self, actor: &ActorId) -> StoreResult<Option<Transaction>> {
        let rows = self.rows.lock().expect("row lock poisoned");
        let mut candidates: Vec<&Transaction> = rows
            .values()
            .filter(|tx| tx.is_party(actor) && tx.is_active_for(actor))
            .collect();
        candidates.sort_by_key(|tx| std::cmp::Reverse(tx.created_at));
        Ok(candidates.first().map(|tx| (*tx).clone()))
    }

    async fn list_open(&self) -> StoreResult<Vec<Transaction>> {
        let rows = self.rows.lock().expect("row lock poisoned");
        let mut open: Vec<Transaction> = rows
            .values()
            .filter(|tx| tx.status == TxStatus::WaitingSupporter)
            .cloned()
            .collect();
        open.sort_by_key(|tx| std::cmp::Reverse(tx.created_at));
        Ok(open)
    }

    async fn subscribe(&self, id: Uuid) -> StoreResult<broadcast::Receiver<Transaction>> {
        let mut channels = self.channels.lock().expect("channel lock poisoned");
        let sender = channels
            .entry(id)
            .or_insert_with(|| broadcast::channel(UPDATE_CHANNEL_CAPACITY).0);
        Ok(sender.subscribe())
    }
}
