//! End-to-end lifecycle runs against the in-memory stack.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;

use workigom_core::adapters::{LocalRewardLedger, MemoryStore, NoopRewardLedger, REWARD_PER_COMPLETION};
use workigom_core::config::Config;
use workigom_core::domain::{ActorId, SupportPercentage, TxStatus};
use workigom_core::engine::{watch, TransactionEngine};
use workigom_core::error::AppError;
use workigom_core::session::Session;

fn engine() -> TransactionEngine {
    TransactionEngine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(NoopRewardLedger::new()),
        Config::default(),
    )
}

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

#[tokio::test]
async fn partial_support_happy_path() {
    let engine = engine();
    let seeker = ActorId::new("seeker-1");
    let supporter = ActorId::new("supporter-1");

    let tx = engine
        .create(&seeker, BigDecimal::from(1000), "Lunch at the campus cafeteria")
        .await
        .unwrap();
    assert_eq!(tx.status, TxStatus::WaitingSupporter);

    let amounts = tx.amounts();
    assert_eq!(amounts.seeker_payment, dec("800"));
    assert_eq!(amounts.seeker_savings, dec("200"));
    assert_eq!(amounts.support_amount, dec("1000"));
    assert_eq!(amounts.refund_to_supporter, dec("750"));

    let tx = engine
        .accept(tx.id, &supporter, SupportPercentage::Partial)
        .await
        .unwrap();
    assert_eq!(tx.status, TxStatus::WaitingCashPayment);

    let tx = engine.mark_cash_paid(tx.id, &seeker).await.unwrap();
    assert_eq!(tx.status, TxStatus::CashPaid);

    let tx = engine
        .submit_qr(tx.id, &supporter, "https://cdn.example/qr.png")
        .await
        .unwrap();
    assert_eq!(tx.status, TxStatus::QrUploaded);
    assert!(tx.qr_uploaded_at.is_some());

    let tx = engine.report_success(tx.id, &seeker).await.unwrap();
    assert_eq!(tx.status, TxStatus::Completed);
    assert!(tx.completed_at.is_some());

    // settlement figures are unchanged by the lifecycle
    let amounts = tx.amounts();
    assert_eq!(amounts.seeker_payment, dec("800"));
    assert_eq!(amounts.refund_to_supporter, dec("750"));
}

#[tokio::test]
async fn full_gift_failure_path_and_dismissal() {
    let engine = engine();
    let seeker = ActorId::new("seeker-1");
    let supporter = ActorId::new("supporter-1");

    let tx = engine
        .create(&seeker, BigDecimal::from(500), "Dinner")
        .await
        .unwrap();

    let tx = engine
        .accept(tx.id, &supporter, SupportPercentage::Full)
        .await
        .unwrap();
    assert_eq!(tx.status, TxStatus::WaitingCashPayment);

    let amounts = tx.amounts();
    assert_eq!(amounts.seeker_payment, dec("0"));
    assert_eq!(amounts.seeker_savings, dec("500"));
    assert_eq!(amounts.refund_to_supporter, dec("0"));

    // the seeker confirms the (zero) cash handover even on a gift
    let tx = engine.mark_cash_paid(tx.id, &seeker).await.unwrap();
    assert_eq!(tx.status, TxStatus::CashPaid);

    let tx = engine
        .submit_qr(tx.id, &supporter, "https://cdn.example/qr.png")
        .await
        .unwrap();
    let tx = engine.report_failure(tx.id, &supporter).await.unwrap();
    assert_eq!(tx.status, TxStatus::Failed);

    // each party still sees the outcome until they archive it themselves
    assert!(engine.active_transaction(&seeker).await.unwrap().is_some());
    assert!(engine.active_transaction(&supporter).await.unwrap().is_some());

    let tx = engine.dismiss(tx.id, &supporter).await.unwrap();
    assert_eq!(tx.status, TxStatus::Failed);
    assert!(engine.active_transaction(&supporter).await.unwrap().is_none());
    assert!(engine.active_transaction(&seeker).await.unwrap().is_some());

    let tx = engine.dismiss(tx.id, &seeker).await.unwrap();
    assert_eq!(tx.status, TxStatus::Dismissed);
    assert!(engine.active_transaction(&seeker).await.unwrap().is_none());
}

#[tokio::test]
async fn withdrawal_reopens_the_listing() {
    let engine = engine();
    let seeker = ActorId::new("seeker-1");
    let supporter = ActorId::new("supporter-1");

    let tx = engine
        .create(&seeker, BigDecimal::from(300), "Breakfast")
        .await
        .unwrap();
    engine
        .accept(tx.id, &supporter, SupportPercentage::Full)
        .await
        .unwrap();

    let tx = engine.withdraw(tx.id, &supporter).await.unwrap();
    assert_eq!(tx.status, TxStatus::WaitingSupporter);
    assert_eq!(tx.supporter_id, None);
    // the split goes back to the default, not the withdrawn supporter's choice
    assert_eq!(tx.support_percentage, SupportPercentage::Partial);

    // the ex-supporter is free for other deals, the listing is open again
    assert!(engine.active_transaction(&supporter).await.unwrap().is_none());
    let open = engine.open_listings().await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, tx.id);
}

#[tokio::test]
async fn amount_boundaries_are_inclusive() {
    let engine = engine();

    for (actor, amount) in [("a1", 50u32), ("a2", 5000)] {
        engine
            .create(&ActorId::new(actor), BigDecimal::from(amount), "edge")
            .await
            .unwrap();
    }
    for amount in [49u32, 5001] {
        let err = engine
            .create(&ActorId::new("a3"), BigDecimal::from(amount), "edge")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount { .. }));
    }
}

#[tokio::test]
async fn one_unresolved_deal_per_actor() {
    let engine = engine();
    let seeker = ActorId::new("seeker-1");
    let supporter = ActorId::new("supporter-1");

    let first = engine
        .create(&seeker, BigDecimal::from(100), "first")
        .await
        .unwrap();
    engine
        .accept(first.id, &supporter, SupportPercentage::Partial)
        .await
        .unwrap();

    // the seeker is bound
    let err = engine
        .create(&seeker, BigDecimal::from(100), "second")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ActiveTransactionConflict { .. }));

    // so is the supporter
    let other = engine
        .create(&ActorId::new("seeker-2"), BigDecimal::from(100), "other")
        .await
        .unwrap();
    let err = engine
        .accept(other.id, &supporter, SupportPercentage::Full)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ActiveTransactionConflict { .. }));
}

#[tokio::test]
async fn terminal_records_reject_every_transition() {
    let engine = engine();
    let seeker = ActorId::new("seeker-1");
    let supporter = ActorId::new("supporter-1");

    let tx = engine
        .create(&seeker, BigDecimal::from(100), "lunch")
        .await
        .unwrap();
    engine
        .accept(tx.id, &supporter, SupportPercentage::Partial)
        .await
        .unwrap();
    let tx = engine.cancel(tx.id, &seeker).await.unwrap().unwrap();
    assert_eq!(tx.status, TxStatus::Cancelled);

    assert!(engine.mark_cash_paid(tx.id, &seeker).await.is_err());
    assert!(engine
        .submit_qr(tx.id, &supporter, "https://x/qr.png")
        .await
        .is_err());
    assert!(engine.report_success(tx.id, &seeker).await.is_err());
    assert!(engine.withdraw(tx.id, &supporter).await.is_err());
    assert!(engine.cancel(tx.id, &seeker).await.is_err());
}

#[tokio::test]
async fn a_watching_party_sees_the_other_side_move() {
    let store = Arc::new(MemoryStore::new());
    let engine = TransactionEngine::new(
        store.clone(),
        Arc::new(NoopRewardLedger::new()),
        Config::default(),
    );
    let seeker = ActorId::new("seeker-1");
    let supporter = ActorId::new("supporter-1");

    let tx = engine
        .create(&seeker, BigDecimal::from(1000), "lunch")
        .await
        .unwrap();

    let mut handle = watch::watch(store.clone(), tx.clone(), Duration::from_millis(20));

    engine
        .accept(tx.id, &supporter, SupportPercentage::Partial)
        .await
        .unwrap();

    let seen = tokio::time::timeout(Duration::from_secs(2), handle.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen.status, TxStatus::WaitingCashPayment);
    assert_eq!(seen.supporter_id, Some(supporter));
}

#[tokio::test]
async fn completion_credits_the_referral_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let session = Arc::new(Session::load(dir.path().join("session.json")));
    let engine = TransactionEngine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(LocalRewardLedger::new(session.clone())),
        Config::default(),
    );
    let seeker = ActorId::new("seeker-1");
    let supporter = ActorId::new("supporter-1");

    let tx = engine
        .create(&seeker, BigDecimal::from(1000), "lunch")
        .await
        .unwrap();
    engine
        .accept(tx.id, &supporter, SupportPercentage::Full)
        .await
        .unwrap();
    engine.mark_cash_paid(tx.id, &seeker).await.unwrap();
    engine
        .submit_qr(tx.id, &supporter, "https://cdn.example/qr.png")
        .await
        .unwrap();
    engine.report_success(tx.id, &seeker).await.unwrap();

    // the credit is fired off the transition path; give it a beat to land
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if session.profile().wallet.total_earnings == BigDecimal::from(REWARD_PER_COMPLETION) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "credit never landed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
