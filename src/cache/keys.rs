//! Cache key generation and management.

use std::fmt;

/// A structured cache key that renders to the canonical key string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// One user's wallet snapshot.
    Wallet(String),
    /// A paginated/filtered transaction view for one user. `signature` is
    /// the serialized filter + pagination + sort combination.
    ///
    /// Rendered under the `user_transactions` prefix rather than the plain
    /// `transactions` one, so these views get the short per-view TTL
    /// instead of the general transaction TTL.
    UserTransactions { user_id: String, signature: String },
    /// Dashboard-style "latest N" view.
    RecentTransactions { user_id: String, limit: usize },
    /// All active realms.
    ActiveRealms,
    /// Active realms of one game.
    GameRealms(String),
    /// All active games.
    ActiveGames,
    /// Current conversion-fee configuration.
    ConversionFees,
}

impl CacheKey {
    /// The user a key belongs to, if any (for targeted invalidation).
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Wallet(user_id)
            | Self::UserTransactions { user_id, .. }
            | Self::RecentTransactions { user_id, .. } => Some(user_id),
            _ => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wallet(user_id) => write!(f, "wallet:{user_id}"),
            Self::UserTransactions { user_id, signature } => {
                write!(f, "user_transactions:{user_id}:{signature}")
            }
            Self::RecentTransactions { user_id, limit } => {
                write!(f, "transactions:recent:{user_id}:{limit}")
            }
            Self::ActiveRealms => write!(f, "realms:active"),
            Self::GameRealms(game_id) => write!(f, "realms:game:{game_id}"),
            Self::ActiveGames => write!(f, "games:active"),
            Self::ConversionFees => write!(f, "conversion_fees"),
        }
    }
}
