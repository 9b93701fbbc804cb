//! Convergence between a locally held snapshot and the authoritative row.
//!
//! Poll results and push events both land here. The authoritative record
//! wins on every shared field; the only thing the local snapshot contributes
//! is resolved display names, which are not persisted with the row and would
//! otherwise flicker away on every refresh.

use crate::domain::Transaction;

/// Merge `authoritative` over `local`. Pure and idempotent: merging the same
/// authoritative row twice yields the same result.
pub fn merge(local: &Transaction, authoritative: &Transaction) -> Transaction {
    let mut merged = authoritative.clone();
    if merged.seeker_name.is_none() {
        merged.seeker_name = local.seeker_name.clone();
    }
    if merged.supporter_name.is_none() && merged.supporter_id == local.supporter_id {
        merged.supporter_name = local.supporter_name.clone();
    }
    merged
}

/// Whether a freshly observed row changes anything worth acting on compared
/// to the snapshot the caller already holds.
pub fn differs(local: &Transaction, observed: &Transaction) -> bool {
    local.status != observed.status
        || local.supporter_id != observed.supporter_id
        || local.support_percentage != observed.support_percentage
        || local.amount != observed.amount
        || local.listing_title != observed.listing_title
        || local.qr_url != observed.qr_url
        || local.qr_uploaded_at != observed.qr_uploaded_at
        || local.completed_at != observed.completed_at
        || local.dismissed_by_seeker != observed.dismissed_by_seeker
        || local.dismissed_by_supporter != observed.dismissed_by_supporter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActorId, SupportPercentage, TxStatus};
    use bigdecimal::BigDecimal;

    fn local() -> Transaction {
        let mut tx = Transaction::new(ActorId::new("s1"), BigDecimal::from(1000), "lunch".into());
        tx.seeker_name = Some("Ayse K.".into());
        tx
    }

    #[test]
    fn authoritative_status_always_wins() {
        let local = local();
        let mut remote = local.clone();
        remote.seeker_name = None;
        remote.status = TxStatus::WaitingCashPayment;
        remote.supporter_id = Some(ActorId::new("s2"));

        let merged = merge(&local, &remote);
        assert_eq!(merged.status, TxStatus::WaitingCashPayment);
        assert_eq!(merged.supporter_id, Some(ActorId::new("s2")));
    }

    #[test]
    fn local_display_names_survive_the_merge() {
        let mut local = local();
        local.supporter_id = Some(ActorId::new("s2"));
        local.supporter_name = Some("Mehmet A.".into());

        let mut remote = local.clone();
        remote.seeker_name = None;
        remote.supporter_name = None;
        remote.status = TxStatus::CashPaid;

        let merged = merge(&local, &remote);
        assert_eq!(merged.seeker_name.as_deref(), Some("Ayse K."));
        assert_eq!(merged.supporter_name.as_deref(), Some("Mehmet A."));
    }

    #[test]
    fn supporter_name_is_dropped_when_the_supporter_changed() {
        let mut local = local();
        local.supporter_id = Some(ActorId::new("s2"));
        local.supporter_name = Some("Mehmet A.".into());

        let mut remote = local.clone();
        remote.supporter_id = Some(ActorId::new("s3"));
        remote.supporter_name = None;

        let merged = merge(&local, &remote);
        assert_eq!(merged.supporter_name, None);
    }

    #[test]
    fn merge_is_idempotent() {
        let local = local();
        let mut remote = local.clone();
        remote.seeker_name = None;
        remote.status = TxStatus::Cancelled;

        let once = merge(&local, &remote);
        let twice = merge(&once, &remote);
        assert_eq!(once, twice);
    }

    #[test]
    fn an_authoritative_amount_correction_is_worth_emitting() {
        let local = local();
        let mut remote = local.clone();
        remote.amount = BigDecimal::from(1200);
        assert!(differs(&local, &remote));

        let merged = merge(&local, &remote);
        assert_eq!(merged.amount, BigDecimal::from(1200));
        // and the corrected amount settles, not any stale figure
        assert_eq!(merged.amounts().seeker_payment, BigDecimal::from(960));
    }

    #[test]
    fn a_title_correction_is_worth_emitting() {
        let local = local();
        let mut remote = local.clone();
        remote.listing_title = "late lunch".into();
        assert!(differs(&local, &remote));
    }

    #[test]
    fn differs_ignores_display_names() {
        let local = local();
        let mut remote = local.clone();
        remote.seeker_name = None;
        assert!(!differs(&local, &remote));

        remote.support_percentage = SupportPercentage::Full;
        assert!(differs(&local, &remote));
    }
}
