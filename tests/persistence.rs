mod common;

use chrono::Duration;
use rust_decimal_macros::dec;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use tempfile::tempdir;
use tokio_test::{assert_err, assert_ok};
use wallet_tx_engine::{
    errors::{EngineError, StorageError},
    execution::{ReconcileSummary, INTERRUPTED_NOTE},
    session::{AccountSession, MemoryKeyVault},
    storage::{BundleLog, JournaledStore, TransactionStore},
    types::{BundleTransaction, ExecutionReceipt, FinalityStatus, Transaction, TransactionStatus},
    utils::ManualClock,
    validation::validate_transfer,
    Config, TransferService,
};

use crate::common::*;

fn pending() -> Transaction {
    let draft = validate_transfer(&transfer("1.25"), "APT", 8).unwrap();
    Transaction::immediate(draft, start_time())
}

#[test]
fn journal_replays_every_write() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("transactions/journal.jsonl");

    let (kept, deleted) = {
        let store = JournaledStore::open(&path).unwrap();
        let kept = pending();
        let deleted = pending();
        store.insert(kept.clone()).unwrap();
        store.insert(deleted.clone()).unwrap();
        store.update_status(kept.id, TransactionStatus::Processing).unwrap();
        store
            .update_execution(kept.id, ExecutionReceipt::accepted(hash(0x42), start_time()))
            .unwrap();
        store.delete(deleted.id).unwrap();
        (kept, deleted)
    };

    let reopened = JournaledStore::open(&path).unwrap();
    let restored = reopened.get(kept.id).unwrap();
    assert_eq!(restored.status, TransactionStatus::Processing);
    assert_eq!(restored.transaction_hash, Some(hash(0x42)));
    assert_eq!(restored.amount, dec!(1.25));
    assert_eq!(restored.created_at, kept.created_at);
    assert!(matches!(reopened.get(deleted.id), Err(EngineError::NotFound(_))));
    assert_eq!(reopened.query_all().unwrap().len(), 1);
}

#[test]
fn compaction_preserves_live_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");
    let store = JournaledStore::open(&path).unwrap();
    let tx = pending();
    store.insert(tx.clone()).unwrap();
    store.update_status(tx.id, TransactionStatus::Processing).unwrap();

    assert_ok!(store.compact());
    let lines = std::fs::read_to_string(&path).unwrap().lines().count();
    assert_eq!(lines, 1);

    // Appends after compaction land in the rewritten file.
    store.insert(pending()).unwrap();
    drop(store);
    assert_eq!(JournaledStore::open(&path).unwrap().query_all().unwrap().len(), 2);
}

#[test]
fn corrupt_journal_line_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");
    {
        let store = JournaledStore::open(&path).unwrap();
        store.insert(pending()).unwrap();
    }
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "{{\"op\":\"put\",\"tx\":").unwrap();

    let err = assert_err!(JournaledStore::open(&path));
    assert!(matches!(
        err,
        EngineError::Storage(StorageError::Corrupt { line: 2, .. })
    ));
}

#[test]
fn torn_final_line_is_dropped_on_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");
    let first = pending();
    {
        let store = JournaledStore::open(&path).unwrap();
        store.insert(first.clone()).unwrap();
    }
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    write!(file, "{{\"op\":\"put\",\"tx\":{{\"id\":\"").unwrap();
    drop(file);

    let second = pending();
    {
        let store = assert_ok!(JournaledStore::open(&path));
        assert_eq!(store.query_all().unwrap().len(), 1);
        assert_eq!(store.get(first.id).unwrap().amount, dec!(1.25));
        store.insert(second.clone()).unwrap();
    }

    let reopened = assert_ok!(JournaledStore::open(&path));
    assert_eq!(reopened.query_all().unwrap().len(), 2);
    assert!(reopened.get(second.id).is_ok());
}

#[test]
fn unterminated_final_entry_is_kept() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");
    let first = pending();
    {
        let store = JournaledStore::open(&path).unwrap();
        store.insert(first.clone()).unwrap();
    }
    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, contents.trim_end_matches('\n')).unwrap();

    let second = pending();
    {
        let store = assert_ok!(JournaledStore::open(&path));
        assert!(store.get(first.id).is_ok());
        store.insert(second.clone()).unwrap();
    }

    let reopened = assert_ok!(JournaledStore::open(&path));
    assert!(reopened.get(first.id).is_ok());
    assert!(reopened.get(second.id).is_ok());
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
}

#[test]
fn bundle_log_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bundles.jsonl");
    let bundle = BundleTransaction {
        id: uuid::Uuid::new_v4(),
        account_address: Some(sender()),
        weights: vec![],
        prices: vec![],
        collateral: dec!(5),
        leverage: 2,
        is_long: false,
        transaction_hash: Some(hash(9)),
        gas_fee: Some(1_000),
        success: true,
        message: "Trade completed: all 5 steps succeeded".to_string(),
        created_at: start_time(),
    };
    {
        let log = BundleLog::open(&path).unwrap();
        log.append(&bundle).unwrap();
        assert_err!(log.append(&bundle));
    }
    assert_eq!(BundleLog::open(&path).unwrap().list().unwrap(), vec![bundle]);
}

#[tokio::test]
async fn service_reopens_its_data_directory() {
    let dir = tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_string_lossy().into_owned(),
        ..test_config()
    };
    let session = Arc::new(AccountSession::new(Arc::new(MemoryKeyVault::with_seed(SEED)), 8));
    session.load().await.unwrap();
    let clock = Arc::new(ManualClock::new(start_time()));

    let id = {
        let service = TransferService::open(
            config.clone(),
            MockGateway::new(),
            Arc::clone(&session),
            clock.clone(),
        )
        .unwrap();
        service
            .schedule_transfer(transfer("1"), start_time() + Duration::hours(1))
            .unwrap()
            .id
    };

    let service = TransferService::open(config, MockGateway::new(), session, clock).unwrap();
    let scheduled = service.scheduled_transactions().unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].id, id);
}

#[tokio::test]
async fn interrupted_transfers_are_reconciled_not_resubmitted() {
    let h = harness().await;
    let store = Arc::clone(&h.store);

    let no_hash = h.service.create_transfer(transfer("1")).unwrap();
    store.update_status(no_hash.id, TransactionStatus::Processing).unwrap();

    h.clock.advance(Duration::seconds(1));
    let landed = h.service.create_transfer(transfer("2")).unwrap();
    store.update_status(landed.id, TransactionStatus::Processing).unwrap();
    store
        .update_execution(landed.id, ExecutionReceipt::accepted(hash(0xd1), start_time()))
        .unwrap();

    h.clock.advance(Duration::seconds(1));
    let in_mempool = h.service.create_transfer(transfer("3")).unwrap();
    store.update_status(in_mempool.id, TransactionStatus::Processing).unwrap();
    store
        .update_execution(in_mempool.id, ExecutionReceipt::accepted(hash(0xd2), start_time()))
        .unwrap();

    // Processing records are visited newest first.
    h.gateway.push_lookup(Ok(FinalityStatus::Pending));
    h.gateway
        .push_lookup(Ok(FinalityStatus::Final(outcome(hash(0xd1), 7, 100))));

    let summary = assert_ok!(h.service.reconcile_interrupted().await);
    assert_eq!(summary.failed, vec![no_hash.id]);
    assert_eq!(summary.completed, vec![landed.id]);
    assert_eq!(summary.unresolved, vec![in_mempool.id]);

    let failed = store.get(no_hash.id).unwrap();
    assert_eq!(failed.status, TransactionStatus::Failed);
    assert!(failed.notes.contains(INTERRUPTED_NOTE));

    let completed = store.get(landed.id).unwrap();
    assert_eq!(completed.status, TransactionStatus::Completed);
    assert_eq!(completed.gas_fee, Some(700));
    assert_eq!(completed.transaction_hash, Some(hash(0xd1)));

    assert_eq!(store.get(in_mempool.id).unwrap().status, TransactionStatus::Processing);
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn reconciling_a_clean_store_does_nothing() {
    let h = harness().await;
    h.service.create_transfer(transfer("1")).unwrap();

    let summary = h.service.reconcile_interrupted().await.unwrap();
    assert_eq!(summary, ReconcileSummary::default());
}
