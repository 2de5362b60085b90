//! End-to-end reconciliation tests against a real SQLite database.
use std::{collections::HashSet, time::Duration};

use lpg_common::Points;
use mockall::mock;
use tokio_util::sync::CancellationToken;

use crate::{
    accrual::{AccrualClientError, AccrualOracle, AccrualResponse, AccrualStatus},
    db_types::{NewOrder, Order, OrderNumber, OrderStatusType},
    test_utils::{prepare_env::fresh_database, ScriptedOracle},
    traits::{AccrualApplied, AccrualGatewayDatabase, AccrualGatewayError, AccrualUpdate, InsertOrderResult},
    AccountManagement,
    AccrualReconciler,
    OrderManagement,
    ReconcilerConfig,
    SqliteDatabase,
};

mock! {
    pub Oracle {}
    impl AccrualOracle for Oracle {
        async fn fetch_accrual(&self, number: &OrderNumber) -> Result<Option<AccrualResponse>, AccrualClientError>;
    }
}

fn config(batch_size: usize, pool_size: usize) -> ReconcilerConfig {
    ReconcilerConfig { batch_size, pool_size, claim_lease: chrono::Duration::minutes(5) }
}

async fn new_user(db: &SqliteDatabase, login: &str) -> i64 {
    db.create_user(login).await.expect("Error creating user").id
}

async fn add_order(db: &SqliteDatabase, user_id: i64, number: &str) -> Order {
    match db.insert_order(NewOrder::new(user_id, OrderNumber::from(number))).await.expect("Error inserting order") {
        InsertOrderResult::Inserted(order) => order,
        InsertOrderResult::AlreadyExists(_) => panic!("Order {number} already exists"),
    }
}

async fn order(db: &SqliteDatabase, number: &str) -> Order {
    db.fetch_order_by_number(&OrderNumber::from(number)).await.unwrap().expect("Order does not exist")
}

async fn balance(db: &SqliteDatabase, user_id: i64) -> Points {
    db.fetch_balance(user_id).await.unwrap().expect("User does not exist").current
}

#[tokio::test]
async fn processed_order_is_credited_exactly_once() {
    let db = fresh_database().await;
    let user = new_user(&db, "alice").await;
    add_order(&db, user, "12345").await;
    assert_eq!(balance(&db, user).await, Points::zero());

    let oracle = ScriptedOracle::new().processed("12345", "5.00");
    let reconciler = AccrualReconciler::new(db.clone(), oracle.clone(), config(10, 3));
    let cancel = CancellationToken::new();

    let summary = reconciler.run_pass(&cancel).await.unwrap();
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.claimed, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.credited, Points::from(500));
    let processed = order(&db, "12345").await;
    assert_eq!(processed.status, OrderStatusType::Processed);
    assert_eq!(processed.accrual, Points::from(500));
    assert_eq!(balance(&db, user).await, Points::from(500));

    // Nothing is left to select on the second pass
    let summary = reconciler.run_pass(&cancel).await.unwrap();
    assert_eq!(summary.pending, 0);
    assert!(summary.is_empty());
    assert_eq!(oracle.call_count("12345"), 1);
    assert_eq!(balance(&db, user).await, Points::from(500));
}

#[tokio::test]
async fn invalid_order_is_never_credited() {
    let db = fresh_database().await;
    let user = new_user(&db, "bob").await;
    add_order(&db, user, "4532015112830366").await;
    let oracle = ScriptedOracle::new().status("4532015112830366", AccrualStatus::Invalid);
    let reconciler = AccrualReconciler::new(db.clone(), oracle, config(10, 3));

    let summary = reconciler.run_pass(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.credited, Points::zero());
    let invalid = order(&db, "4532015112830366").await;
    assert_eq!(invalid.status, OrderStatusType::Invalid);
    assert_eq!(invalid.accrual, Points::zero());
    assert_eq!(balance(&db, user).await, Points::zero());
}

#[tokio::test]
async fn unregistered_order_waits_for_the_next_pass() {
    let db = fresh_database().await;
    let user = new_user(&db, "carol").await;
    let before = add_order(&db, user, "99999").await;
    let oracle = ScriptedOracle::new().unregistered("99999");
    let reconciler = AccrualReconciler::new(db.clone(), oracle.clone(), config(10, 3));

    let summary = reconciler.run_pass(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.unregistered, 1);
    assert_eq!(summary.updated, 0);
    let after = order(&db, "99999").await;
    assert_eq!(after, before);

    // The lease was released, so the next pass asks again
    reconciler.run_pass(&CancellationToken::new()).await.unwrap();
    assert_eq!(oracle.call_count("99999"), 2);
    assert_eq!(order(&db, "99999").await.status, OrderStatusType::New);
}

#[tokio::test]
async fn empty_pass_is_a_no_op() {
    let db = fresh_database().await;
    let mut oracle = MockOracle::new();
    oracle.expect_fetch_accrual().times(0);
    let reconciler = AccrualReconciler::new(db.clone(), oracle, config(10, 3));
    let summary = reconciler.run_pass(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.pending, 0);
    assert!(summary.is_empty());
    assert!(!summary.throttled);
}

#[tokio::test]
async fn orders_move_through_processing() {
    let db = fresh_database().await;
    let user = new_user(&db, "dave").await;
    add_order(&db, user, "79927398713").await;
    let oracle = ScriptedOracle::new()
        .status("79927398713", AccrualStatus::Processing)
        .processed("79927398713", "10");
    let reconciler = AccrualReconciler::new(db.clone(), oracle, config(10, 3));
    let cancel = CancellationToken::new();

    reconciler.run_pass(&cancel).await.unwrap();
    let processing = order(&db, "79927398713").await;
    assert_eq!(processing.status, OrderStatusType::Processing);
    assert_eq!(balance(&db, user).await, Points::zero());

    reconciler.run_pass(&cancel).await.unwrap();
    let processed = order(&db, "79927398713").await;
    assert_eq!(processed.status, OrderStatusType::Processed);
    assert_eq!(processed.accrual, Points::from(1_000));
    assert_eq!(balance(&db, user).await, Points::from(1_000));
}

#[tokio::test]
async fn one_bad_order_does_not_block_its_batch_mates() {
    let db = fresh_database().await;
    let user = new_user(&db, "erin").await;
    for number in ["1001", "1002", "1003", "1004"] {
        add_order(&db, user, number).await;
    }
    let oracle = ScriptedOracle::new()
        .processed("1001", "1.5")
        .failing("1002", AccrualClientError::OracleInternalError)
        .status("1003", AccrualStatus::Other("LOST".into()))
        .status("1004", AccrualStatus::Invalid);
    let reconciler = AccrualReconciler::new(db.clone(), oracle.clone(), config(10, 1));

    let summary = reconciler.run_pass(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.claimed, 4);
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(oracle.calls(), vec!["1001", "1002", "1003", "1004"]);
    assert_eq!(order(&db, "1001").await.status, OrderStatusType::Processed);
    assert_eq!(order(&db, "1002").await.status, OrderStatusType::New);
    assert_eq!(order(&db, "1003").await.status, OrderStatusType::New);
    assert_eq!(order(&db, "1004").await.status, OrderStatusType::Invalid);
    assert_eq!(balance(&db, user).await, Points::from(150));
}

#[tokio::test]
async fn reports_for_the_wrong_order_change_nothing() {
    let db = fresh_database().await;
    let user = new_user(&db, "trent").await;
    let before = add_order(&db, user, "12345").await;
    let wrong = AccrualResponse::new("99999", AccrualStatus::Processed).with_accrual(5);
    let oracle = ScriptedOracle::new().then("12345", Ok(Some(wrong)));
    let reconciler = AccrualReconciler::new(db.clone(), oracle.clone(), config(10, 1));

    let summary = reconciler.run_pass(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.credited, Points::zero());
    assert_eq!(order(&db, "12345").await, before);
    assert_eq!(balance(&db, user).await, Points::zero());

    // The order is asked about again on the next pass
    reconciler.run_pass(&CancellationToken::new()).await.unwrap();
    assert_eq!(oracle.call_count("12345"), 2);
}

#[tokio::test]
async fn throttling_mid_batch_keeps_earlier_work() {
    let db = fresh_database().await;
    let user = new_user(&db, "frank").await;
    for number in ["2001", "2002", "2003", "2004"] {
        add_order(&db, user, number).await;
    }
    let mut oracle = MockOracle::new();
    oracle.expect_fetch_accrual().withf(|n| n.as_str() == "2001").times(1).returning(|_| {
        Ok(Some(AccrualResponse::new("2001", AccrualStatus::Processed).with_accrual(5)))
    });
    oracle
        .expect_fetch_accrual()
        .withf(|n| n.as_str() == "2002")
        .times(1)
        .returning(|_| Ok(Some(AccrualResponse::new("2002", AccrualStatus::Processing))));
    oracle
        .expect_fetch_accrual()
        .withf(|n| n.as_str() == "2003")
        .times(1)
        .returning(|_| Err(AccrualClientError::TooManyRequests { retry_after: Some(Duration::from_secs(30)) }));
    oracle.expect_fetch_accrual().withf(|n| n.as_str() == "2004").times(0);
    let reconciler = AccrualReconciler::new(db.clone(), oracle, config(10, 1));

    let summary = reconciler.run_pass(&CancellationToken::new()).await.unwrap();
    assert!(summary.throttled);
    assert_eq!(summary.retry_after, Some(Duration::from_secs(30)));
    assert_eq!(summary.updated, 2);
    assert_eq!(order(&db, "2001").await.status, OrderStatusType::Processed);
    assert_eq!(order(&db, "2002").await.status, OrderStatusType::Processing);
    assert_eq!(order(&db, "2003").await.status, OrderStatusType::New);
    assert_eq!(order(&db, "2004").await.status, OrderStatusType::New);
    assert_eq!(balance(&db, user).await, Points::from(500));

    // Throttled orders are claimable again straight away
    let batch = db.claim_pending_batch(10, chrono::Duration::minutes(5)).await.unwrap();
    let numbers = batch.orders.iter().map(|o| o.number.as_str()).collect::<Vec<_>>();
    assert_eq!(numbers, vec!["2002", "2003", "2004"]);
}

#[tokio::test]
async fn throttling_only_stops_the_throttled_worker() {
    let db = fresh_database().await;
    let user = new_user(&db, "grace").await;
    for number in ["3001", "3002", "3003", "3004"] {
        add_order(&db, user, number).await;
    }
    let oracle = ScriptedOracle::new()
        .throttled("3001", None)
        .processed("3002", "1")
        .processed("3003", "2")
        .processed("3004", "3");
    let reconciler = AccrualReconciler::new(db.clone(), oracle.clone(), config(2, 2));

    let summary = reconciler.run_pass(&CancellationToken::new()).await.unwrap();
    assert!(summary.throttled);
    assert_eq!(summary.retry_after, None);
    assert_eq!(summary.updated, 2);
    assert_eq!(oracle.call_count("3002"), 0);
    assert_eq!(order(&db, "3001").await.status, OrderStatusType::New);
    assert_eq!(order(&db, "3002").await.status, OrderStatusType::New);
    assert_eq!(order(&db, "3003").await.status, OrderStatusType::Processed);
    assert_eq!(order(&db, "3004").await.status, OrderStatusType::Processed);
    assert_eq!(balance(&db, user).await, Points::from(500));
}

#[tokio::test]
async fn many_workers_reconcile_every_order_once() {
    let db = fresh_database().await;
    let user = new_user(&db, "heidi").await;
    let mut oracle = ScriptedOracle::new().with_delay(Duration::from_millis(5));
    for i in 0..25 {
        let number = format!("{}", 5000 + i);
        add_order(&db, user, &number).await;
        oracle = oracle.processed(&number, "1");
    }
    let reconciler = AccrualReconciler::new(db.clone(), oracle.clone(), config(4, 3));

    let summary = reconciler.run_pass(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.pending, 25);
    assert_eq!(summary.claimed, 25);
    assert_eq!(summary.updated, 25);
    let calls = oracle.calls();
    assert_eq!(calls.len(), 25);
    assert_eq!(calls.iter().collect::<HashSet<_>>().len(), 25);
    assert_eq!(balance(&db, user).await, Points::from(2_500));
    assert_eq!(db.count_pending_orders().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_are_disjoint() {
    let db = fresh_database().await;
    let user = new_user(&db, "ivan").await;
    for i in 0..30 {
        add_order(&db, user, &format!("{}", 7000 + i)).await;
    }
    let lease = chrono::Duration::minutes(5);
    let (a, b, c) =
        tokio::join!(db.claim_pending_batch(10, lease), db.claim_pending_batch(10, lease), db.claim_pending_batch(10, lease));
    let batches = [a.unwrap(), b.unwrap(), c.unwrap()];
    let mut seen = HashSet::new();
    for batch in &batches {
        assert_eq!(batch.len(), 10);
        for order in &batch.orders {
            assert!(seen.insert(order.id), "Order {} was claimed twice", order.number);
        }
    }
    assert_eq!(seen.len(), 30);
    assert!(db.claim_pending_batch(10, lease).await.unwrap().is_empty());

    assert_eq!(db.release_batch(&batches[1]).await.unwrap(), 10);
    let reclaimed = db.claim_pending_batch(10, lease).await.unwrap();
    let ids = reclaimed.orders.iter().map(|o| o.id).collect::<HashSet<_>>();
    let expected = batches[1].orders.iter().map(|o| o.id).collect::<HashSet<_>>();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn claims_are_oldest_first() {
    let db = fresh_database().await;
    let user = new_user(&db, "judy").await;
    for number in ["8003", "8001", "8002"] {
        add_order(&db, user, number).await;
    }
    let batch = db.claim_pending_batch(2, chrono::Duration::minutes(5)).await.unwrap();
    let numbers = batch.orders.iter().map(|o| o.number.as_str()).collect::<Vec<_>>();
    assert_eq!(numbers, vec!["8003", "8001"]);
}

#[tokio::test]
async fn expired_leases_can_be_claimed_again() {
    let db = fresh_database().await;
    let user = new_user(&db, "mallory").await;
    add_order(&db, user, "9001").await;
    let first = db.claim_pending_batch(10, chrono::Duration::zero()).await.unwrap();
    assert_eq!(first.len(), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = db.claim_pending_batch(10, chrono::Duration::minutes(5)).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_ne!(first.token, second.token);
    // The stale token no longer owns the order
    assert_eq!(db.release_batch(&first).await.unwrap(), 0);
}

#[tokio::test]
async fn terminal_orders_are_never_credited_twice() {
    let db = fresh_database().await;
    let user = new_user(&db, "niaj").await;
    let o = add_order(&db, user, "12345").await;
    let update = AccrualUpdate {
        order_id: o.id,
        user_id: user,
        number: o.number.clone(),
        status: OrderStatusType::Processed,
        accrual: Points::from(500),
    };
    assert_eq!(db.apply_accrual(&update).await.unwrap(), AccrualApplied::Updated { credited: Points::from(500) });
    assert_eq!(db.apply_accrual(&update).await.unwrap(), AccrualApplied::AlreadyFinal);
    let invalid = AccrualUpdate { status: OrderStatusType::Invalid, accrual: Points::zero(), ..update };
    assert_eq!(db.apply_accrual(&invalid).await.unwrap(), AccrualApplied::AlreadyFinal);
    assert_eq!(balance(&db, user).await, Points::from(500));
    assert_eq!(order(&db, "12345").await.status, OrderStatusType::Processed);
}

#[tokio::test]
async fn failed_credit_rolls_back_the_status_change() {
    let db = fresh_database().await;
    let user = new_user(&db, "olivia").await;
    let o = add_order(&db, user, "12345").await;
    let update = AccrualUpdate {
        order_id: o.id,
        user_id: 9_999,
        number: o.number.clone(),
        status: OrderStatusType::Processed,
        accrual: Points::from(500),
    };
    let err = db.apply_accrual(&update).await.unwrap_err();
    assert!(matches!(err, AccrualGatewayError::UserNotFound(9_999)));
    let unchanged = order(&db, "12345").await;
    assert_eq!(unchanged.status, OrderStatusType::New);
    assert_eq!(unchanged.accrual, Points::zero());
}

#[tokio::test]
async fn cancelled_pass_touches_nothing() {
    let db = fresh_database().await;
    let user = new_user(&db, "peggy").await;
    add_order(&db, user, "12345").await;
    let mut oracle = MockOracle::new();
    oracle.expect_fetch_accrual().times(0);
    let reconciler = AccrualReconciler::new(db.clone(), oracle, config(10, 3));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = reconciler.run_pass(&cancel).await.unwrap();
    assert!(summary.cancelled);
    assert!(summary.is_empty());
    assert_eq!(order(&db, "12345").await.status, OrderStatusType::New);
}

#[tokio::test]
async fn cancellation_interrupts_a_slow_accrual_system() {
    let db = fresh_database().await;
    let user = new_user(&db, "rupert").await;
    add_order(&db, user, "12345").await;
    add_order(&db, user, "12346").await;
    let oracle = ScriptedOracle::new().with_delay(Duration::from_secs(30)).processed("12345", "5");
    let reconciler = AccrualReconciler::new(db.clone(), oracle, config(10, 1));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let summary = reconciler.run_pass(&cancel).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(summary.cancelled);
    assert_eq!(summary.claimed, 2);
    assert_eq!(summary.updated, 0);
    assert_eq!(order(&db, "12345").await.status, OrderStatusType::New);
    assert_eq!(balance(&db, user).await, Points::zero());
    // Leases are handed back on the way out
    assert_eq!(db.claim_pending_batch(10, chrono::Duration::minutes(5)).await.unwrap().len(), 2);
}
