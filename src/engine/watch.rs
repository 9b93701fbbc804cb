//! Live view of one transaction record.
//!
//! Combines push updates (when the store supports them) with interval
//! polling into a single ordered stream of merged snapshots. Polling is the
//! convergence backstop: a missed or delayed push event is repaired on the
//! next tick at the latest.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{Transaction, TxStatus};
use crate::engine::reconcile;
use crate::ports::{StoreError, TransactionStore};

const WATCH_BUFFER: usize = 8;

pub struct WatchHandle {
    rx: mpsc::Receiver<Transaction>,
}

impl WatchHandle {
    /// Next merged snapshot, or `None` once the watch ended (record removed,
    /// fully dismissed, or cancelled).
    pub async fn recv(&mut self) -> Option<Transaction> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> ReceiverStream<Transaction> {
        ReceiverStream::new(self.rx)
    }
}

/// Start watching `initial` for authoritative changes. Every observed change
/// is merged over the last snapshot and emitted; dropping the handle stops
/// the watch.
pub fn watch(
    store: Arc<dyn TransactionStore>,
    initial: Transaction,
    poll_interval: Duration,
) -> WatchHandle {
    let (tx, rx) = mpsc::channel(WATCH_BUFFER);
    tokio::spawn(run(store, initial, poll_interval, tx));
    WatchHandle { rx }
}

async fn run(
    store: Arc<dyn TransactionStore>,
    initial: Transaction,
    poll_interval: Duration,
    out: mpsc::Sender<Transaction>,
) {
    let id = initial.id;
    let mut snapshot = initial;

    let mut push = match store.subscribe(id).await {
        Ok(receiver) => Some(receiver),
        Err(StoreError::NotConfigured) => {
            tracing::debug!(tx_id = %id, "push updates unavailable, polling only");
            None
        }
        Err(err) => {
            tracing::warn!(tx_id = %id, error = %err, "subscribe failed, polling only");
            None
        }
    };

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await; // the first tick fires immediately

    loop {
        let observed = match &mut push {
            Some(receiver) => {
                tokio::select! {
                    pushed = receiver.recv() => match pushed {
                        Ok(tx) => Observed::Row(tx),
                        Err(_) => {
                            // lagged or closed channel; polling still covers us
                            push = None;
                            continue;
                        }
                    },
                    _ = ticker.tick() => poll_once(&store, id).await,
                }
            }
            None => {
                ticker.tick().await;
                poll_once(&store, id).await
            }
        };

        let observed = match observed {
            Observed::Row(tx) => tx,
            // record removed under us (e.g. the seeker scrapped the listing)
            Observed::Gone => return,
            Observed::Unavailable => continue,
        };

        if reconcile::differs(&snapshot, &observed) {
            snapshot = reconcile::merge(&snapshot, &observed);
            if out.send(snapshot.clone()).await.is_err() {
                return;
            }
            if matches!(snapshot.status, TxStatus::Dismissed | TxStatus::Cancelled) {
                return;
            }
        }
    }
}

enum Observed {
    Row(Transaction),
    Gone,
    Unavailable,
}

async fn poll_once(store: &Arc<dyn TransactionStore>, id: Uuid) -> Observed {
    match store.fetch(id).await {
        Ok(tx) => Observed::Row(tx),
        Err(StoreError::NotFound(_)) => Observed::Gone,
        Err(err) => {
            tracing::warn!(tx_id = %id, error = %err, "poll failed, will retry");
            Observed::Unavailable
        }
    }
}

/// Seconds left in the QR validity window, or `None` when no live QR proof
/// is pending. Zero once the window lapsed.
pub fn qr_remaining(config: &Config, tx: &Transaction) -> Option<u64> {
    let uploaded_at = match (tx.status, tx.qr_uploaded_at) {
        (TxStatus::QrUploaded, Some(at)) => at,
        _ => return None,
    };
    let elapsed = (Utc::now() - uploaded_at).num_seconds().max(0) as u64;
    Some(config.qr_validity().as_secs().saturating_sub(elapsed))
}
