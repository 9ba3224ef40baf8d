//! In-memory inverted index over all transaction records.
//!
//! Built lazily from a full scan of the durable store (global ledger plus
//! every per-user shard, de-duplicated by id) and maintained incrementally
//! on writes. Rebuilt from scratch when older than its TTL or after an
//! explicit clear. Answers multi-predicate intersection queries without
//! scanning the full transaction set per call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::WalletError;
use crate::models::{
    paginate, sort_transactions, Pagination, Sort, Transaction, TransactionFilters,
    TransactionKind, TransactionPage, TransactionStats, TransactionStatus,
};
use crate::store::{keys, Store};

/// A query result plus the measured time the index spent answering it.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub page: TransactionPage,
    pub query_time: Duration,
}

#[derive(Default)]
struct IndexState {
    transactions: HashMap<String, Transaction>,
    by_user: HashMap<String, Vec<String>>,
    by_wallet: HashMap<String, Vec<String>>,
    by_kind: HashMap<TransactionKind, Vec<String>>,
    by_status: HashMap<TransactionStatus, Vec<String>>,
    /// Day-bucketed (`YYYY-MM-DD`); exact bounds are re-checked on the
    /// loaded records.
    by_date: HashMap<String, Vec<String>>,
    /// Kept sorted by amount for range scans; re-sorted on each addition,
    /// acceptable at single-tenant data volumes.
    by_amount: Vec<(String, f64)>,
    built_at: Option<Instant>,
}

fn wallet_bucket(tx: &Transaction) -> String {
    format!("{}:{}", tx.wallet_type, tx.wallet_id)
}

fn date_bucket(tx: &Transaction) -> String {
    tx.created_at.format("%Y-%m-%d").to_string()
}

impl IndexState {
    fn insert(&mut self, tx: Transaction) {
        let id = tx.id.clone();
        self.by_user.entry(tx.user_id.clone()).or_default().push(id.clone());
        self.by_wallet.entry(wallet_bucket(&tx)).or_default().push(id.clone());
        self.by_kind.entry(tx.kind).or_default().push(id.clone());
        self.by_status.entry(tx.status).or_default().push(id.clone());
        self.by_date.entry(date_bucket(&tx)).or_default().push(id.clone());
        self.by_amount.push((id.clone(), tx.amount));
        self.by_amount.sort_by(|a, b| a.1.total_cmp(&b.1));
        self.transactions.insert(id, tx);
    }

    fn evict(&mut self, id: &str) -> Option<Transaction> {
        let tx = self.transactions.remove(id)?;
        let drop_id = |list: &mut Vec<String>| list.retain(|candidate| candidate != id);
        if let Some(list) = self.by_user.get_mut(&tx.user_id) {
            drop_id(list);
        }
        if let Some(list) = self.by_wallet.get_mut(&wallet_bucket(&tx)) {
            drop_id(list);
        }
        if let Some(list) = self.by_kind.get_mut(&tx.kind) {
            drop_id(list);
        }
        if let Some(list) = self.by_status.get_mut(&tx.status) {
            drop_id(list);
        }
        if let Some(list) = self.by_date.get_mut(&date_bucket(&tx)) {
            drop_id(list);
        }
        self.by_amount.retain(|(candidate, _)| candidate != id);
        Some(tx)
    }

    fn is_built(&self) -> bool {
        self.built_at.is_some()
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        match self.built_at {
            Some(at) => at.elapsed() > ttl,
            None => true,
        }
    }
}

/// The transaction index service. Shared via `Arc`; all state sits behind
/// one async mutex, which is held across the service's own store reads
/// during a rebuild.
pub struct TransactionIndex<S> {
    store: Arc<S>,
    ttl: Duration,
    state: Mutex<IndexState>,
}

impl<S: Store> TransactionIndex<S> {
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            state: Mutex::new(IndexState::default()),
        }
    }

    /// Answer a filtered, sorted, paginated query.
    ///
    /// Indexed predicates (user, wallet, kind, status, date bucket) are
    /// intersected cheapest-first; the full filter set is then re-applied
    /// exactly on the candidates, which also covers the predicates the
    /// index cannot express (amount bounds, sub-day date precision).
    pub async fn query(
        &self,
        filters: &TransactionFilters,
        pagination: Pagination,
        sort: Sort,
    ) -> Result<QueryOutcome, WalletError> {
        let start = Instant::now();
        let mut state = self.state.lock().await;
        self.rebuild_if_stale(&mut state).await?;

        let candidate_ids = Self::candidates(&state, filters);
        let mut matched: Vec<Transaction> = candidate_ids
            .iter()
            .filter_map(|id| state.transactions.get(id))
            .filter(|tx| filters.matches(tx))
            .cloned()
            .collect();
        drop(state);

        sort_transactions(&mut matched, sort);
        let page = paginate(matched, pagination);
        let query_time = start.elapsed();
        debug!(
            total = page.total,
            returned = page.transactions.len(),
            query_time_us = query_time.as_micros() as u64,
            "transaction index query"
        );
        Ok(QueryOutcome { page, query_time })
    }

    /// Incremental maintenance after a transaction is created.
    pub async fn add(&self, tx: &Transaction) {
        let mut state = self.state.lock().await;
        // Nothing to maintain before the first build; the build will pick
        // the record up from the store.
        if state.is_built() {
            state.insert(tx.clone());
        }
    }

    pub async fn remove(&self, id: &str) {
        let mut state = self.state.lock().await;
        if state.is_built() {
            state.evict(id);
        }
    }

    /// First-class modify-in-place support: drop the record's old entries
    /// and re-insert the updated one, so an approval/rejection does not
    /// force a full rebuild.
    pub async fn update(&self, tx: &Transaction) {
        let mut state = self.state.lock().await;
        if state.is_built() {
            state.evict(&tx.id);
            state.insert(tx.clone());
        }
    }

    /// Aggregate counts and totals, optionally scoped to one user.
    pub async fn stats(&self, user_id: Option<&str>) -> Result<TransactionStats, WalletError> {
        let mut state = self.state.lock().await;
        self.rebuild_if_stale(&mut state).await?;

        let scoped: Vec<&Transaction> = match user_id {
            Some(user) => state
                .by_user
                .get(user)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| state.transactions.get(id))
                        .collect()
                })
                .unwrap_or_default(),
            None => state.transactions.values().collect(),
        };

        let mut stats = TransactionStats {
            total_count: scoped.len(),
            ..Default::default()
        };
        for tx in &scoped {
            *stats.by_kind.entry(tx.kind.as_str().to_string()).or_default() += 1;
            *stats
                .by_status
                .entry(tx.status.as_str().to_string())
                .or_default() += 1;
            *stats.by_wallet.entry(wallet_bucket(tx)).or_default() += 1;
            stats.total_amount += tx.amount;
        }
        if stats.total_count > 0 {
            stats.average_amount = stats.total_amount / stats.total_count as f64;
        }
        Ok(stats)
    }

    /// Drop all derived state; the next query rebuilds from the store.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        *state = IndexState::default();
        debug!("transaction index cleared");
    }

    /// Force a rebuild regardless of freshness.
    pub async fn rebuild(&self) -> Result<(), WalletError> {
        let mut state = self.state.lock().await;
        *state = IndexState::default();
        self.rebuild_if_stale(&mut state).await
    }

    async fn rebuild_if_stale(&self, state: &mut IndexState) -> Result<(), WalletError> {
        if !state.is_stale(self.ttl) {
            return Ok(());
        }
        let start = Instant::now();
        let mut fresh = IndexState::default();

        // The same record is dual-written to the global ledger and a
        // per-user shard; de-duplicate by id while assembling the universe.
        let mut seen: HashSet<String> = HashSet::new();
        let ledger: Vec<Transaction> = self
            .store
            .get_doc(keys::TRANSACTIONS_KEY)
            .await?
            .unwrap_or_default();
        for tx in ledger {
            if seen.insert(tx.id.clone()) {
                fresh.insert(tx);
            }
        }
        for key in self.store.keys().await {
            if keys::shard_user_id(&key).is_none() {
                continue;
            }
            let shard: Vec<Transaction> = self.store.get_doc(&key).await?.unwrap_or_default();
            for tx in shard {
                if seen.insert(tx.id.clone()) {
                    fresh.insert(tx);
                }
            }
        }

        fresh.built_at = Some(Instant::now());
        info!(
            transactions = fresh.transactions.len(),
            build_time_ms = start.elapsed().as_millis() as u64,
            "transaction index rebuilt"
        );
        *state = fresh;
        Ok(())
    }

    /// Resolve the candidate id set: intersect whichever indexed predicate
    /// lists are supplied, starting from the smallest; with no indexed
    /// predicate the full id universe is used.
    fn candidates(state: &IndexState, filters: &TransactionFilters) -> Vec<String> {
        let mut lists: Vec<&[String]> = Vec::new();

        if let Some(user_id) = &filters.user_id {
            match state.by_user.get(user_id) {
                Some(ids) => lists.push(ids),
                None => return Vec::new(),
            }
        }
        if let (Some(wallet_type), Some(wallet_id)) = (filters.wallet_type, &filters.wallet_id) {
            match state.by_wallet.get(&format!("{wallet_type}:{wallet_id}")) {
                Some(ids) => lists.push(ids),
                None => return Vec::new(),
            }
        }
        if let Some(kind) = filters.kind {
            match state.by_kind.get(&kind) {
                Some(ids) => lists.push(ids),
                None => return Vec::new(),
            }
        }
        if let Some(status) = filters.status {
            match state.by_status.get(&status) {
                Some(ids) => lists.push(ids),
                None => return Vec::new(),
            }
        }

        // Date range: union of the day buckets touched by the range.
        let date_ids: Option<Vec<String>> =
            if filters.date_from.is_some() || filters.date_to.is_some() {
                let from = filters.date_from.map(|d| d.format("%Y-%m-%d").to_string());
                let to = filters.date_to.map(|d| d.format("%Y-%m-%d").to_string());
                let mut ids = Vec::new();
                for (bucket, bucket_ids) in &state.by_date {
                    let after_from = from.as_ref().map_or(true, |f| bucket >= f);
                    let before_to = to.as_ref().map_or(true, |t| bucket <= t);
                    if after_from && before_to {
                        ids.extend(bucket_ids.iter().cloned());
                    }
                }
                Some(ids)
            } else {
                None
            };
        if let Some(ids) = &date_ids {
            lists.push(ids);
        }

        if lists.is_empty() {
            return state.transactions.keys().cloned().collect();
        }

        // Cheapest-first: intersect starting from the smallest list.
        lists.sort_by_key(|ids| ids.len());
        let mut running: HashSet<&String> = lists[0].iter().collect();
        for ids in &lists[1..] {
            let next: HashSet<&String> = ids.iter().collect();
            running.retain(|id| next.contains(*id));
            if running.is_empty() {
                break;
            }
        }
        running.into_iter().cloned().collect()
    }
}
