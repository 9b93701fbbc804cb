//! Referral reward ledger.
//!
//! A completed deal earns the referrer a flat credit. The engine fires the
//! credit after the completion transition commits and never lets a ledger
//! failure undo the deal.

use std::sync::Arc;

use anyhow::{ensure, Context};
use async_trait::async_trait;
use bigdecimal::BigDecimal;

use crate::domain::{Transaction, TxStatus};
use crate::ports::RewardLedger;
use crate::session::Session;

/// Flat referral credit per completed deal.
pub const REWARD_PER_COMPLETION: u32 = 10;

/// Credits the locally cached profile's wallet. Stands in for the hosted
/// ledger when running against the session cache.
pub struct LocalRewardLedger {
    session: Arc<Session>,
}

impl LocalRewardLedger {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl RewardLedger for LocalRewardLedger {
    async fn credit_referrer(&self, tx: &Transaction) -> anyhow::Result<()> {
        ensure!(
            tx.status == TxStatus::Completed,
            "reward requested for a deal that is not completed ({})",
            tx.status
        );
        self.session
            .update_profile(|profile| {
                profile.wallet.total_earnings += BigDecimal::from(REWARD_PER_COMPLETION);
            })
            .context("persisting reward credit")?;
        tracing::info!(tx_id = %tx.id, credit = REWARD_PER_COMPLETION, "referral reward credited");
        Ok(())
    }
}

/// Discards credits. Used where no ledger is wired up.
#[derive(Default)]
pub struct NoopRewardLedger;

impl NoopRewardLedger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RewardLedger for NoopRewardLedger {
    async fn credit_referrer(&self, _tx: &Transaction) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActorId;

    fn completed_tx() -> Transaction {
        let mut tx = Transaction::new(ActorId::new("s1"), BigDecimal::from(100), "lunch".into());
        tx.status = TxStatus::Completed;
        tx
    }

    #[tokio::test]
    async fn completion_credits_the_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(Session::load(dir.path().join("session.json")));
        let ledger = LocalRewardLedger::new(session.clone());

        ledger.credit_referrer(&completed_tx()).await.unwrap();
        ledger.credit_referrer(&completed_tx()).await.unwrap();

        assert_eq!(
            session.profile().wallet.total_earnings,
            BigDecimal::from(2 * REWARD_PER_COMPLETION)
        );
    }

    #[tokio::test]
    async fn non_completed_deal_earns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(Session::load(dir.path().join("session.json")));
        let ledger = LocalRewardLedger::new(session.clone());

        let mut tx = completed_tx();
        tx.status = TxStatus::Failed;
        assert!(ledger.credit_referrer(&tx).await.is_err());
        assert_eq!(
            session.profile().wallet.total_earnings,
            BigDecimal::from(0)
        );
    }
}
