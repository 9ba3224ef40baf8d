//! The single read path for wallet snapshots, catalog data, and transaction
//! views; owns the cache-vs-store decision.
//!
//! Transaction reads here are store-driven: one user's bounded history is
//! cheap to scan and the exact paginated result caches well. Cross-cutting
//! admin queries belong to the index instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::debug;

use crate::cache::{CacheKey, TtlCache};
use crate::error::WalletError;
use crate::models::{
    paginate, sort_transactions, Game, Pagination, Realm, Sort, Transaction, TransactionFilters,
    TransactionPage, Wallet,
};
use crate::store::{keys, Store};

/// TTL for dashboard-style "latest N" views.
const RECENT_TTL: Duration = Duration::from_secs(30);

/// How a value was served, and how long serving it took.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub data: T,
    pub from_cache: bool,
    pub load_time: Duration,
}

impl<T> Loaded<T> {
    fn cached(data: T, start: Instant) -> Self {
        Self {
            data,
            from_cache: true,
            load_time: start.elapsed(),
        }
    }

    fn fresh(data: T, start: Instant) -> Self {
        Self {
            data,
            from_cache: false,
            load_time: start.elapsed(),
        }
    }
}

pub struct DataLoader<S> {
    store: Arc<S>,
    cache: Arc<TtlCache>,
}

impl<S: Store> DataLoader<S> {
    pub fn new(store: Arc<S>, cache: Arc<TtlCache>) -> Self {
        Self { store, cache }
    }

    /// Cache-first wallet snapshot. A user with no persisted wallet gets a
    /// zero-balance one materialized, persisted, and cached.
    pub async fn load_user_wallet(&self, user_id: &str) -> Result<Loaded<Wallet>, WalletError> {
        let start = Instant::now();
        let cache_key = CacheKey::Wallet(user_id.to_string()).to_string();
        if let Some(wallet) = self.cache.get::<Wallet>(&cache_key) {
            return Ok(Loaded::cached(wallet, start));
        }

        let wallet = self.load_wallet_from_store(user_id).await?;
        self.cache.set(&cache_key, &wallet, None);
        Ok(Loaded::fresh(wallet, start))
    }

    /// Batched wallet load: one pass over the cache for all requested
    /// users, then only the missing subset is read from the store, then the
    /// fresh ones are written back in one batch.
    pub async fn load_multiple_wallets(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, Wallet>, WalletError> {
        let mut wallets = HashMap::with_capacity(user_ids.len());
        let mut missing = Vec::new();
        for user_id in user_ids {
            let cache_key = CacheKey::Wallet(user_id.clone()).to_string();
            match self.cache.get::<Wallet>(&cache_key) {
                Some(wallet) => {
                    wallets.insert(user_id.clone(), wallet);
                }
                None => missing.push(user_id.clone()),
            }
        }

        let loads = missing
            .iter()
            .map(|user_id| self.load_wallet_from_store(user_id));
        let loaded = join_all(loads).await;

        let mut fresh = Vec::with_capacity(missing.len());
        for result in loaded {
            fresh.push(result?);
        }
        for wallet in fresh {
            let cache_key = CacheKey::Wallet(wallet.user_id.clone()).to_string();
            self.cache.set(&cache_key, &wallet, None);
            wallets.insert(wallet.user_id.clone(), wallet);
        }
        debug!(
            requested = user_ids.len(),
            from_store = missing.len(),
            "batch wallet load"
        );
        Ok(wallets)
    }

    pub async fn load_active_realms(&self) -> Result<Loaded<Vec<Realm>>, WalletError> {
        let start = Instant::now();
        let cache_key = CacheKey::ActiveRealms.to_string();
        if let Some(realms) = self.cache.get::<Vec<Realm>>(&cache_key) {
            return Ok(Loaded::cached(realms, start));
        }

        let realms: Vec<Realm> = self
            .store
            .get_doc::<Vec<Realm>>(keys::REALMS_KEY)
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter(|realm| realm.active)
            .collect();
        self.cache.set(&cache_key, &realms, None);
        Ok(Loaded::fresh(realms, start))
    }

    pub async fn load_game_realms(&self, game_id: &str) -> Result<Loaded<Vec<Realm>>, WalletError> {
        let start = Instant::now();
        let cache_key = CacheKey::GameRealms(game_id.to_string()).to_string();
        if let Some(realms) = self.cache.get::<Vec<Realm>>(&cache_key) {
            return Ok(Loaded::cached(realms, start));
        }

        let realms: Vec<Realm> = self
            .store
            .get_doc::<Vec<Realm>>(keys::REALMS_KEY)
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter(|realm| realm.active && realm.game_id == game_id)
            .collect();
        self.cache.set(&cache_key, &realms, None);
        Ok(Loaded::fresh(realms, start))
    }

    pub async fn load_active_games(&self) -> Result<Loaded<Vec<Game>>, WalletError> {
        let start = Instant::now();
        let cache_key = CacheKey::ActiveGames.to_string();
        if let Some(games) = self.cache.get::<Vec<Game>>(&cache_key) {
            return Ok(Loaded::cached(games, start));
        }

        let games: Vec<Game> = self
            .store
            .get_doc::<Vec<Game>>(keys::GAMES_KEY)
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter(|game| game.active)
            .collect();
        self.cache.set(&cache_key, &games, None);
        Ok(Loaded::fresh(games, start))
    }

    /// Paginated transaction view over one user's shard. The exact page is
    /// cached under a composite key of user + filters + pagination + sort.
    pub async fn load_user_transactions(
        &self,
        user_id: &str,
        filters: &TransactionFilters,
        pagination: Pagination,
        sort: Sort,
    ) -> Result<Loaded<TransactionPage>, WalletError> {
        let start = Instant::now();
        let signature =
            serde_json::to_string(&(filters, pagination, sort)).unwrap_or_default();
        let cache_key = CacheKey::UserTransactions {
            user_id: user_id.to_string(),
            signature,
        }
        .to_string();
        if let Some(page) = self.cache.get::<TransactionPage>(&cache_key) {
            return Ok(Loaded::cached(page, start));
        }

        let mut transactions: Vec<Transaction> = self
            .store
            .get_doc::<Vec<Transaction>>(&keys::user_transactions_key(user_id))
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter(|tx| filters.matches(tx))
            .collect();
        sort_transactions(&mut transactions, sort);
        let page = paginate(transactions, pagination);
        self.cache.set(&cache_key, &page, None);
        Ok(Loaded::fresh(page, start))
    }

    /// Latest `limit` transactions for one user, by recency only.
    pub async fn load_recent_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Loaded<Vec<Transaction>>, WalletError> {
        let start = Instant::now();
        let cache_key = CacheKey::RecentTransactions {
            user_id: user_id.to_string(),
            limit,
        }
        .to_string();
        if let Some(recent) = self.cache.get::<Vec<Transaction>>(&cache_key) {
            return Ok(Loaded::cached(recent, start));
        }

        let mut transactions: Vec<Transaction> = self
            .store
            .get_doc::<Vec<Transaction>>(&keys::user_transactions_key(user_id))
            .await?
            .unwrap_or_default();
        sort_transactions(&mut transactions, Sort::default());
        transactions.truncate(limit);
        self.cache.set(&cache_key, &transactions, Some(RECENT_TTL));
        Ok(Loaded::fresh(transactions, start))
    }

    /// Warm the cache ahead of a dashboard render: wallet, recent
    /// transactions, and the realm catalog, loaded concurrently.
    pub async fn preload_dashboard_data(&self, user_id: &str) -> Result<(), WalletError> {
        let (wallet, recent, realms) = tokio::join!(
            self.load_user_wallet(user_id),
            self.load_recent_transactions(user_id, 10),
            self.load_active_realms(),
        );
        wallet?;
        recent?;
        realms?;
        debug!(user_id, "dashboard data preloaded");
        Ok(())
    }

    /// Drop every cached view touching this user.
    pub fn invalidate_user_cache(&self, user_id: &str) {
        self.cache
            .invalidate(&CacheKey::Wallet(user_id.to_string()).to_string());
        self.cache
            .invalidate_pattern(&format!("user_transactions:{user_id}"));
        self.cache
            .invalidate_pattern(&format!("transactions:recent:{user_id}"));
    }

    /// Drop cached catalog views after a realm/game catalog change.
    pub fn invalidate_game_cache(&self) {
        self.cache.invalidate_pattern("realms:");
        self.cache.invalidate_pattern("games:");
    }

    async fn load_wallet_from_store(&self, user_id: &str) -> Result<Wallet, WalletError> {
        match self.store.get_doc::<Wallet>(&keys::wallet_key(user_id)).await? {
            Some(wallet) => Ok(wallet),
            None => {
                // Lazily materialize a zero-balance wallet.
                let wallet = Wallet::empty(user_id);
                self.store
                    .set_doc(&keys::wallet_key(user_id), &wallet)
                    .await?;
                debug!(user_id, "materialized empty wallet");
                Ok(wallet)
            }
        }
    }
}
