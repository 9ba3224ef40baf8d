//! Background maintenance: periodic cache cleanup and suspended-deposit
//! maturity sweeps.
//!
//! The sweeper is an explicit lifecycle object: the embedding process
//! constructs it, spawns [`Sweeper::run`], and cancels the token to stop.
//! A failed sweep cycle logs and continues; the next tick self-heals.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cache::TtlCache;
use crate::store::Store;
use crate::wallet::WalletService;

pub struct Sweeper<S> {
    cache: Arc<TtlCache>,
    wallets: Arc<WalletService<S>>,
    cache_sweep_interval: Duration,
    maturity_sweep_interval: Duration,
}

impl<S: Store> Sweeper<S> {
    pub fn new(
        cache: Arc<TtlCache>,
        wallets: Arc<WalletService<S>>,
        cache_sweep_interval: Duration,
        maturity_sweep_interval: Duration,
    ) -> Self {
        Self {
            cache,
            wallets,
            cache_sweep_interval,
            maturity_sweep_interval,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!("starting maintenance sweeper");
        let mut cache_tick = interval(self.cache_sweep_interval);
        let mut maturity_tick = interval(self.maturity_sweep_interval);

        loop {
            tokio::select! {
                _ = cache_tick.tick() => {
                    let removed = self.cache.cleanup();
                    if removed > 0 {
                        debug!(removed, "cache cleanup sweep");
                    }
                }
                _ = maturity_tick.tick() => {
                    match self.wallets.process_matured_deposits().await {
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "maturity sweep failed"),
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("shutting down maintenance sweeper");
                    break;
                }
            }
        }
    }
}
