//! Storage-key construction.
//!
//! These strings must stay bit-for-bit compatible with already-persisted
//! data, so they are centralized here and nowhere else.

/// Prefix for per-user wallet documents: `multi-wallet-{userId}`.
pub const WALLET_PREFIX: &str = "multi-wallet";

/// Global transaction ledger key; also the prefix of per-user shards.
pub const TRANSACTIONS_KEY: &str = "multi-wallet-transactions";

/// Realm catalog: one key holding the full list.
pub const REALMS_KEY: &str = "realms";

/// Game catalog: one key holding the full list.
pub const GAMES_KEY: &str = "games";

/// Current conversion-fee configuration.
pub const CONVERSION_FEES_KEY: &str = "conversion-fees";

/// Append-only, size-capped audit trail of fee changes.
pub const CONVERSION_FEES_HISTORY_KEY: &str = "conversion-fees_history";

pub fn wallet_key(user_id: &str) -> String {
    format!("{WALLET_PREFIX}-{user_id}")
}

pub fn user_transactions_key(user_id: &str) -> String {
    format!("{TRANSACTIONS_KEY}-{user_id}")
}

/// If `key` is a per-user transaction shard, return the user id.
pub fn shard_user_id(key: &str) -> Option<&str> {
    key.strip_prefix(TRANSACTIONS_KEY)?.strip_prefix('-')
}

/// If `key` is a wallet document, return the user id. Transaction keys also
/// start with the wallet prefix, so they are excluded explicitly.
pub fn wallet_user_id(key: &str) -> Option<&str> {
    if key == TRANSACTIONS_KEY || shard_user_id(key).is_some() {
        return None;
    }
    key.strip_prefix(WALLET_PREFIX)?.strip_prefix('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_and_shard_keys() {
        assert_eq!(wallet_key("u1"), "multi-wallet-u1");
        assert_eq!(user_transactions_key("u1"), "multi-wallet-transactions-u1");
    }

    #[test]
    fn shard_user_id_extraction() {
        assert_eq!(shard_user_id("multi-wallet-transactions-u1"), Some("u1"));
        assert_eq!(shard_user_id("multi-wallet-transactions"), None);
        assert_eq!(shard_user_id("multi-wallet-u1"), None);
    }

    #[test]
    fn wallet_user_id_excludes_transaction_keys() {
        assert_eq!(wallet_user_id("multi-wallet-u1"), Some("u1"));
        assert_eq!(wallet_user_id("multi-wallet-transactions"), None);
        assert_eq!(wallet_user_id("multi-wallet-transactions-u1"), None);
        assert_eq!(wallet_user_id("realms"), None);
    }
}
