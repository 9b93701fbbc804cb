//! Transaction lifecycle engine.
//!
//! Every state transition of a sharing deal goes through here. The engine
//! validates input, enforces the per-actor single-active-transaction rule,
//! and hands each transition to the store as a guarded atomic update: the
//! write carries the status it expects the row to still be in, and a guard
//! rejection means somebody else moved the row first.

pub mod reconcile;
pub mod watch;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{ActorId, Party, SupportPercentage, Transaction, TxStatus};
use crate::error::AppError;
use crate::ports::{RewardLedger, StoreError, TransactionPatch, TransactionStore};
use crate::validation::{amount_in_bounds, validate_listing_title, validate_qr_url, MAX_AMOUNT, MIN_AMOUNT};

pub struct TransactionEngine {
    store: Arc<dyn TransactionStore>,
    rewards: Arc<dyn RewardLedger>,
    config: Config,
    in_flight: Mutex<HashSet<Uuid>>,
}

/// Clears the in-flight mark when the transition attempt ends, however it
/// ends.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<Uuid>>,
    id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().expect("in-flight lock poisoned").remove(&self.id);
    }
}

impl TransactionEngine {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        rewards: Arc<dyn RewardLedger>,
        config: Config,
    ) -> Self {
        Self {
            store,
            rewards,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a new listing for `seeker`.
    ///
    /// Rejects out-of-bounds amounts, malformed titles, and a seeker who
    /// already has an unresolved transaction.
    pub async fn create(
        &self,
        seeker: &ActorId,
        amount: BigDecimal,
        listing_title: &str,
    ) -> Result<Transaction, AppError> {
        if !amount_in_bounds(&amount) {
            return Err(AppError::InvalidAmount {
                got: amount,
                min: MIN_AMOUNT,
                max: MAX_AMOUNT,
            });
        }
        let title = validate_listing_title(listing_title)?;
        self.ensure_no_active(seeker).await?;

        let tx = Transaction::new(seeker.clone(), amount, title);
        let _guard = self.mark_in_flight(tx.id)?;
        let stored = self.store.insert(&tx).await?;
        tracing::info!(tx_id = %stored.id, seeker = %seeker, amount = %stored.amount, "listing created");
        Ok(stored)
    }

    /// `supporter` claims an open listing, choosing how much of the bill to
    /// cover. The cash leg follows even on a full gift; the seeker confirms
    /// a zero handover and the flow stays uniform.
    pub async fn accept(
        &self,
        id: Uuid,
        supporter: &ActorId,
        pct: SupportPercentage,
    ) -> Result<Transaction, AppError> {
        let tx = self.fetch(id).await?;
        if tx.seeker_id == *supporter {
            return Err(AppError::InvalidTransition {
                status: tx.status,
                event: "accept own listing",
            });
        }
        self.ensure_no_active(supporter).await?;

        let patch = TransactionPatch {
            status: Some(TxStatus::WaitingCashPayment),
            supporter_id: Some(Some(supporter.clone())),
            support_percentage: Some(pct),
            ..TransactionPatch::default()
        };
        self.transition(id, TxStatus::WaitingSupporter, patch, "accept")
            .await
    }

    /// The seeker confirms they handed over their cash share.
    pub async fn mark_cash_paid(&self, id: Uuid, actor: &ActorId) -> Result<Transaction, AppError> {
        let tx = self.fetch(id).await?;
        self.require_party(&tx, actor, Party::Seeker, "mark cash paid")?;
        self.transition(
            id,
            TxStatus::WaitingCashPayment,
            TransactionPatch::status(TxStatus::CashPaid),
            "mark cash paid",
        )
        .await
    }

    /// The supporter submits the QR proof URL for the seeker to redeem.
    pub async fn submit_qr(
        &self,
        id: Uuid,
        actor: &ActorId,
        qr_url: &str,
    ) -> Result<Transaction, AppError> {
        let url = validate_qr_url(qr_url)?;
        let tx = self.fetch(id).await?;
        self.require_party(&tx, actor, Party::Supporter, "submit qr")?;

        let patch = TransactionPatch {
            status: Some(TxStatus::QrUploaded),
            qr_url: Some(url),
            qr_uploaded_at: Some(Utc::now()),
            ..TransactionPatch::default()
        };
        self.transition(id, TxStatus::CashPaid, patch, "submit qr").await
    }

    /// Either party reports the QR redeemed successfully. Commits the deal
    /// and fires the referral credit without blocking on it.
    pub async fn report_success(&self, id: Uuid, actor: &ActorId) -> Result<Transaction, AppError> {
        let tx = self.fetch(id).await?;
        self.require_any_party(&tx, actor, "report success")?;

        let patch = TransactionPatch {
            status: Some(TxStatus::Completed),
            completed_at: Some(Utc::now()),
            ..TransactionPatch::default()
        };
        let updated = self
            .transition(id, TxStatus::QrUploaded, patch, "report success")
            .await?;

        let rewards = Arc::clone(&self.rewards);
        let completed = updated.clone();
        tokio::spawn(async move {
            if let Err(err) = rewards.credit_referrer(&completed).await {
                tracing::warn!(tx_id = %completed.id, error = %err, "referral credit failed");
            }
        });
        Ok(updated)
    }

    /// Either party reports the QR did not work.
    pub async fn report_failure(&self, id: Uuid, actor: &ActorId) -> Result<Transaction, AppError> {
        let tx = self.fetch(id).await?;
        self.require_any_party(&tx, actor, "report failure")?;
        self.transition(
            id,
            TxStatus::QrUploaded,
            TransactionPatch::status(TxStatus::Failed),
            "report failure",
        )
        .await
    }

    /// The seeker abandons the deal. An unclaimed listing is removed
    /// outright; once a supporter is bound the record is kept and marked
    /// cancelled so both parties see the outcome.
    pub async fn cancel(&self, id: Uuid, actor: &ActorId) -> Result<Option<Transaction>, AppError> {
        let tx = self.fetch(id).await?;
        self.require_party(&tx, actor, Party::Seeker, "cancel")?;
        if tx.status.is_terminal() {
            return Err(AppError::InvalidTransition {
                status: tx.status,
                event: "cancel",
            });
        }

        if tx.status == TxStatus::WaitingSupporter && tx.supporter_id.is_none() {
            let _guard = self.mark_in_flight(id)?;
            self.store.delete_by_id(id).await?;
            tracing::info!(tx_id = %id, "unclaimed listing removed");
            return Ok(None);
        }

        let updated = self
            .transition(id, tx.status, TransactionPatch::status(TxStatus::Cancelled), "cancel")
            .await?;
        Ok(Some(updated))
    }

    /// The supporter backs out before the deal is resolved. The listing goes
    /// back on the market with the default partial split.
    pub async fn withdraw(&self, id: Uuid, actor: &ActorId) -> Result<Transaction, AppError> {
        let tx = self.fetch(id).await?;
        self.require_party(&tx, actor, Party::Supporter, "withdraw")?;
        if !matches!(
            tx.status,
            TxStatus::WaitingCashPayment | TxStatus::CashPaid | TxStatus::QrUploaded
        ) {
            return Err(AppError::InvalidTransition {
                status: tx.status,
                event: "withdraw",
            });
        }

        let patch = TransactionPatch {
            status: Some(TxStatus::WaitingSupporter),
            supporter_id: Some(None),
            support_percentage: Some(SupportPercentage::Partial),
            ..TransactionPatch::default()
        };
        self.transition(id, tx.status, patch, "withdraw").await
    }

    /// `actor` archives a resolved deal from their own view. The shared
    /// record only becomes `Dismissed` once every bound party has done so.
    pub async fn dismiss(&self, id: Uuid, actor: &ActorId) -> Result<Transaction, AppError> {
        let tx = self.fetch(id).await?;
        let party = self.require_any_party(&tx, actor, "dismiss")?;
        if !tx.status.is_terminal() || tx.status == TxStatus::Dismissed {
            return Err(AppError::InvalidTransition {
                status: tx.status,
                event: "dismiss",
            });
        }

        let seeker_done = tx.dismissed_by_seeker || party == Party::Seeker;
        let supporter_done =
            tx.dismissed_by_supporter || party == Party::Supporter || tx.supporter_id.is_none();

        let patch = TransactionPatch {
            dismissed_by_seeker: (party == Party::Seeker).then_some(true),
            dismissed_by_supporter: (party == Party::Supporter).then_some(true),
            status: (seeker_done && supporter_done).then_some(TxStatus::Dismissed),
            ..TransactionPatch::default()
        };
        self.transition(id, tx.status, patch, "dismiss").await
    }

    pub async fn open_listings(&self) -> Result<Vec<Transaction>, AppError> {
        Ok(self.store.list_open().await?)
    }

    pub async fn active_transaction(&self, actor: &ActorId) -> Result<Option<Transaction>, AppError> {
        Ok(self.store.find_active_for(actor).await?)
    }

    /// Whether the QR proof on this record is past its validity window.
    /// Display-level by default; with `qr_expiry_fails` set, callers are
    /// expected to follow up with [`Self::report_failure`].
    pub fn qr_expired(&self, tx: &Transaction) -> bool {
        match (tx.status, tx.qr_uploaded_at) {
            (TxStatus::QrUploaded, Some(at)) => {
                Utc::now() - at > chrono::Duration::seconds(self.config.qr_validity_secs as i64)
            }
            _ => false,
        }
    }

    /// Fail the deal if its QR window lapsed and the auto-fail switch is on.
    /// Returns the updated record when a transition happened.
    pub async fn expire_qr_if_due(
        &self,
        id: Uuid,
        actor: &ActorId,
    ) -> Result<Option<Transaction>, AppError> {
        if !self.config.qr_expiry_fails {
            return Ok(None);
        }
        let tx = self.fetch(id).await?;
        if !self.qr_expired(&tx) {
            return Ok(None);
        }
        self.report_failure(id, actor).await.map(Some)
    }

    async fn fetch(&self, id: Uuid) -> Result<Transaction, AppError> {
        match self.store.fetch(id).await {
            Ok(tx) => Ok(tx),
            Err(StoreError::NotFound(_)) => Err(AppError::NotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn ensure_no_active(&self, actor: &ActorId) -> Result<(), AppError> {
        if let Some(existing) = self.store.find_active_for(actor).await? {
            return Err(AppError::ActiveTransactionConflict {
                actor: actor.clone(),
                tx_id: existing.id,
            });
        }
        Ok(())
    }

    fn require_party(
        &self,
        tx: &Transaction,
        actor: &ActorId,
        wanted: Party,
        event: &'static str,
    ) -> Result<(), AppError> {
        if tx.party_of(actor) == Some(wanted) {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                status: tx.status,
                event,
            })
        }
    }

    fn require_any_party(
        &self,
        tx: &Transaction,
        actor: &ActorId,
        event: &'static str,
    ) -> Result<Party, AppError> {
        tx.party_of(actor).ok_or(AppError::InvalidTransition {
            status: tx.status,
            event,
        })
    }

    fn mark_in_flight(&self, id: Uuid) -> Result<InFlightGuard<'_>, AppError> {
        let mut set = self.in_flight.lock().expect("in-flight lock poisoned");
        if !set.insert(id) {
            return Err(AppError::TransitionInFlight(id));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            id,
        })
    }

    /// Run one guarded transition. On a guard rejection the row is
    /// re-fetched so the error names the status that actually won.
    async fn transition(
        &self,
        id: Uuid,
        expected: TxStatus,
        patch: TransactionPatch,
        event: &'static str,
    ) -> Result<Transaction, AppError> {
        let _guard = self.mark_in_flight(id)?;
        match self.store.update(id, Some(expected), patch).await {
            Ok(updated) => {
                tracing::info!(tx_id = %id, status = %updated.status, event, "transition applied");
                Ok(updated)
            }
            Err(StoreError::Conflict(_)) => {
                let fresh = self.fetch(id).await?;
                tracing::warn!(
                    tx_id = %id,
                    expected = %expected,
                    actual = %fresh.status,
                    event,
                    "transition lost the race"
                );
                Err(AppError::InvalidTransition {
                    status: fresh.status,
                    event,
                })
            }
            Err(StoreError::NotFound(_)) => Err(AppError::NotFound(id)),
            Err(err) => Err(err.into()),
        }
    }
}
