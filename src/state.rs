use std::sync::Arc;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::index::TransactionIndex;
use crate::loader::DataLoader;
use crate::maintenance::Sweeper;
use crate::store::Store;
use crate::wallet::WalletService;

/// Wires the services together over one store. Every piece is constructed
/// explicitly here; nothing is process-global.
pub struct AppState<S> {
    pub config: Config,
    pub store: Arc<S>,
    pub cache: Arc<TtlCache>,
    pub index: Arc<TransactionIndex<S>>,
    pub loader: DataLoader<S>,
    pub wallets: Arc<WalletService<S>>,
}

impl<S: Store> AppState<S> {
    pub fn new(config: Config, store: S) -> Self {
        let store = Arc::new(store);
        let cache = Arc::new(TtlCache::new(config.cache_config()));
        let index = Arc::new(TransactionIndex::new(Arc::clone(&store), config.index_ttl));
        let loader = DataLoader::new(Arc::clone(&store), Arc::clone(&cache));
        let wallets = Arc::new(WalletService::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::clone(&index),
            config.wallet_config(),
        ));
        Self {
            config,
            store,
            cache,
            index,
            loader,
            wallets,
        }
    }

    /// Build the background sweeper; the caller spawns and cancels it.
    pub fn sweeper(&self) -> Sweeper<S> {
        Sweeper::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.wallets),
            self.config.cache_sweep_interval,
            self.config.maturity_sweep_interval,
        )
    }
}
