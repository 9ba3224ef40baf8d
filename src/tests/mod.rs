//! Integration-style tests over the assembled services, backed by the
//! in-memory store.

mod cache_tests;
mod loader_tests;

use std::sync::Once;

use chrono::{Duration as ChronoDuration, Utc};

use crate::config::Config;
use crate::models::{
    Realm, Transaction, TransactionKind, TransactionMetadata, TransactionStatus, Wallet,
    WalletType,
};
use crate::state::AppState;
use crate::store::{keys, MemoryStore, Store};

static TRACING: Once = Once::new();

/// Opt-in log output while debugging: `RUST_LOG=debug cargo test -- --nocapture`.
pub(crate) fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub(crate) fn test_state() -> AppState<MemoryStore> {
    init_tracing();
    AppState::new(Config::default(), MemoryStore::new())
}

pub(crate) fn realm(id: &str, game_id: &str, active: bool) -> Realm {
    Realm {
        id: id.to_string(),
        game_id: game_id.to_string(),
        name: format!("Realm {id}"),
        active,
    }
}

pub(crate) async fn seed_realms(state: &AppState<MemoryStore>, realms: Vec<Realm>) {
    state
        .store
        .set_doc(keys::REALMS_KEY, &realms)
        .await
        .unwrap();
}

pub(crate) async fn stored_wallet(state: &AppState<MemoryStore>, user_id: &str) -> Wallet {
    state
        .store
        .get_doc(&keys::wallet_key(user_id))
        .await
        .unwrap()
        .expect("wallet document")
}

/// A completed USD deposit, `seq` seconds in the past, with a fixed-width
/// id so insertion order and id order agree.
pub(crate) fn sample_tx(user_id: &str, seq: usize) -> Transaction {
    Transaction {
        id: format!("txn_{seq:06}_aaaaaaaaa"),
        user_id: user_id.to_string(),
        wallet_type: WalletType::Static,
        wallet_id: "USD".to_string(),
        kind: TransactionKind::Deposit,
        amount: (seq + 1) as f64,
        currency: "USD".to_string(),
        gold_type: None,
        status: TransactionStatus::Completed,
        conversion_fee: None,
        from_wallet: None,
        to_wallet: None,
        created_at: Utc::now() - ChronoDuration::seconds(1000 - seq as i64),
        metadata: TransactionMetadata::None,
    }
}

/// Write transactions the way the domain logic does: each record goes to
/// its user's shard and to the global ledger.
pub(crate) async fn seed_transactions(state: &AppState<MemoryStore>, transactions: &[Transaction]) {
    let mut ledger: Vec<Transaction> = state
        .store
        .get_doc(keys::TRANSACTIONS_KEY)
        .await
        .unwrap()
        .unwrap_or_default();
    for tx in transactions {
        let shard_key = keys::user_transactions_key(&tx.user_id);
        let mut shard: Vec<Transaction> = state
            .store
            .get_doc(&shard_key)
            .await
            .unwrap()
            .unwrap_or_default();
        shard.push(tx.clone());
        state.store.set_doc(&shard_key, &shard).await.unwrap();
        ledger.push(tx.clone());
    }
    state
        .store
        .set_doc(keys::TRANSACTIONS_KEY, &ledger)
        .await
        .unwrap();
}
