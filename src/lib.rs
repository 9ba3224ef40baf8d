pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod loader;
pub mod maintenance;
pub mod models;
pub mod state;
pub mod store;
pub mod wallet;

#[cfg(test)]
pub mod tests;

// Re-export specific items for convenience if desired
pub use cache::{CacheConfig, CacheKey, CacheStats, TtlCache};
pub use config::Config;
pub use error::WalletError;
pub use index::{QueryOutcome, TransactionIndex};
pub use loader::{DataLoader, Loaded};
pub use maintenance::Sweeper;
pub use models::{
    GoldType, GoldWallet, Pagination, Realm, Sort, SortDir, SortKey, SuspendedDeposit,
    Transaction, TransactionFilters, TransactionKind, TransactionPage, TransactionStatus, Wallet,
    WalletType,
};
pub use state::AppState;
pub use store::{MemoryStore, Store, StoreError};
pub use wallet::{BalanceTarget, WalletConfig, WalletService};
