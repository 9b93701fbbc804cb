//! Contracts for the external collaborators the engine coordinates with.
//!
//! The hosted backend (auth, relational storage, object storage, realtime
//! push) is consumed only through these traits; adapters live in
//! `crate::adapters`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{ActorId, SupportPercentage, Transaction, TxStatus, UserProfile};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// The store's own guard rejected the write (e.g. the row was no longer
    /// in the expected status). The caller should re-fetch and reconcile,
    /// not retry blindly.
    #[error("update guard rejected: {0}")]
    Conflict(String),

    #[error("backend request failed: {0}")]
    Request(String),

    #[error("backend request timed out")]
    Timeout,

    #[error("no backend configured")]
    NotConfigured,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
#[error("storage failure: {0}")]
pub struct StorageError(pub String);

/// Partial update of a transaction row. `None` leaves a field untouched;
/// `supporter_id` uses a nested option so withdrawal can clear it.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub status: Option<TxStatus>,
    pub supporter_id: Option<Option<ActorId>>,
    pub support_percentage: Option<SupportPercentage>,
    pub qr_url: Option<String>,
    pub qr_uploaded_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub dismissed_by_seeker: Option<bool>,
    pub dismissed_by_supporter: Option<bool>,
}

impl TransactionPatch {
    pub fn status(status: TxStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Apply this patch to an in-memory copy of the row. Used by stores and
    /// for optimistic local updates; the same application order either way.
    pub fn apply_to(&self, tx: &mut Transaction) {
        if let Some(status) = self.status {
            tx.status = status;
        }
        if let Some(supporter_id) = &self.supporter_id {
            tx.supporter_id = supporter_id.clone();
        }
        if let Some(pct) = self.support_percentage {
            tx.support_percentage = pct;
        }
        if let Some(url) = &self.qr_url {
            tx.qr_url = Some(url.clone());
        }
        if let Some(at) = self.qr_uploaded_at {
            tx.qr_uploaded_at = Some(at);
        }
        if let Some(at) = self.completed_at {
            tx.completed_at = Some(at);
        }
        if let Some(flag) = self.dismissed_by_seeker {
            tx.dismissed_by_seeker = flag;
        }
        if let Some(flag) = self.dismissed_by_supporter {
            tx.dismissed_by_supporter = flag;
        }
    }
}

/// Persistence adapter for the transaction entity.
///
/// Implementations must provide at least atomic single-row read-modify-write;
/// `update` with an `expected` status is the arbiter of which of two
/// concurrent transition attempts wins.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persist a new row. Returns the stored record, which may carry a
    /// backend-assigned id and timestamp.
    async fn insert(&self, tx: &Transaction) -> StoreResult<Transaction>;

    async fn fetch(&self, id: Uuid) -> StoreResult<Transaction>;

    /// Atomic single-row update. When `expected` is set, the write only
    /// applies if the row is still in that status; otherwise the store
    /// answers [`StoreError::Conflict`].
    async fn update(
        &self,
        id: Uuid,
        expected: Option<TxStatus>,
        patch: TransactionPatch,
    ) -> StoreResult<Transaction>;

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<()>;

    /// The actor's single unresolved transaction, if any (as seeker or
    /// supporter, not yet dismissed by them).
    async fn find_active_for(&self, actor: &ActorId) -> StoreResult<Option<Transaction>>;

    /// Open listings still waiting for a supporter, newest first.
    async fn list_open(&self) -> StoreResult<Vec<Transaction>>;

    /// Realtime update events for one record. May be unsupported
    /// ([`StoreError::NotConfigured`]); consumers fall back to polling.
    async fn subscribe(&self, id: Uuid) -> StoreResult<broadcast::Receiver<Transaction>>;
}

/// Actor identity, backed by the hosted auth service or a local fallback.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in actor, or `None` when nobody is signed in.
    async fn current_actor(&self) -> StoreResult<Option<ActorId>>;

    /// Profile lookup for display names and referral linkage.
    async fn profile(&self, id: &ActorId) -> StoreResult<Option<UserProfile>>;
}

/// Object storage for QR proof images.
#[async_trait]
pub trait QrStorage: Send + Sync {
    /// Store the image and return a public URL. Adapters degrade to an
    /// inline `data:` URL when the hosted bucket is unreachable, so a
    /// submission never fails outright on storage trouble.
    async fn upload(&self, bytes: &[u8], file_name: &str) -> Result<String, StorageError>;
}

/// Referral reward ledger, notified when a deal completes. Fire and forget:
/// a ledger failure never rolls back the completed transition.
#[async_trait]
pub trait RewardLedger: Send + Sync {
    async fn credit_referrer(&self, tx: &Transaction) -> anyhow::Result<()>;
}
