//! Domain models for wallets, transactions, and the realm/game catalogs.
//!
//! All persisted documents serialize with camelCase field names so the
//! stored JSON keeps the shape existing data was written with.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Currency code used for gold amounts in transactions and rate lookups.
pub const GOLD_CURRENCY: &str = "GOLD";

/// One wallet per user: two static currency balances plus one gold wallet
/// per realm the user participates in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user_id: String,
    pub usd: f64,
    pub toman: f64,
    #[serde(default)]
    pub gold_wallets: HashMap<String, GoldWallet>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// A zero-balance wallet, materialized lazily on first access.
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            usd: 0.0,
            toman: 0.0,
            gold_wallets: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn static_balance(&self, currency: &str) -> Result<f64, WalletError> {
        match currency.to_uppercase().as_str() {
            "USD" => Ok(self.usd),
            "TOMAN" => Ok(self.toman),
            other => Err(WalletError::InvalidTransaction {
                reason: format!("unknown static currency: {other}"),
            }),
        }
    }

    pub fn static_balance_mut(&mut self, currency: &str) -> Result<&mut f64, WalletError> {
        match currency.to_uppercase().as_str() {
            "USD" => Ok(&mut self.usd),
            "TOMAN" => Ok(&mut self.toman),
            other => Err(WalletError::InvalidTransaction {
                reason: format!("unknown static currency: {other}"),
            }),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A per-realm gold balance split into a suspended and a withdrawable bucket.
///
/// Invariant: `total_gold == suspended_gold + withdrawable_gold`, all >= 0.
/// `total_gold` is recomputed after every mutation, never set independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldWallet {
    pub realm_id: String,
    pub suspended_gold: f64,
    pub withdrawable_gold: f64,
    pub total_gold: f64,
    #[serde(default)]
    pub suspended_deposits: Vec<SuspendedDeposit>,
}

impl GoldWallet {
    pub fn new(realm_id: &str) -> Self {
        Self {
            realm_id: realm_id.to_string(),
            suspended_gold: 0.0,
            withdrawable_gold: 0.0,
            total_gold: 0.0,
            suspended_deposits: Vec::new(),
        }
    }

    pub fn recompute_total(&mut self) {
        self.total_gold = self.suspended_gold + self.withdrawable_gold;
    }

    pub fn balance(&self, gold_type: GoldType) -> f64 {
        match gold_type {
            GoldType::Suspended => self.suspended_gold,
            GoldType::Withdrawable => self.withdrawable_gold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoldType {
    Suspended,
    Withdrawable,
}

impl GoldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoldType::Suspended => "suspended",
            GoldType::Withdrawable => "withdrawable",
        }
    }
}

impl fmt::Display for GoldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendedDepositStatus {
    Suspended,
    Withdrawable,
    Converted,
}

/// A time-locked fund grant. Immutable once created, except for the status
/// transition when it matures or is consumed by a conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspendedDeposit {
    pub id: String,
    pub amount: f64,
    pub deposited_at: DateTime<Utc>,
    pub withdrawable_at: DateTime<Utc>,
    pub deposited_by: String,
    pub status: SuspendedDepositStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    Static,
    Gold,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Static => "static",
            WalletType::Gold => "gold",
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Conversion,
    Purchase,
    Earning,
    AdminDeposit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Conversion => "conversion",
            TransactionKind::Purchase => "purchase",
            TransactionKind::Earning => "earning",
            TransactionKind::AdminDeposit => "admin_deposit",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    PendingApproval,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::PendingApproval => "pending_approval",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind metadata attached to a transaction. A tagged union instead of a
/// free-form map, so each kind carries only the fields that apply to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TransactionMetadata {
    #[default]
    None,
    Conversion {
        exchange_rate: f64,
        original_amount: f64,
        fee_percent: f64,
    },
    Withdrawal {
        pending_approval: bool,
        decided_by: Option<String>,
        decided_at: Option<DateTime<Utc>>,
    },
    AdminDeposit {
        admin_id: String,
        withdrawable_at: DateTime<Utc>,
    },
    Purchase {
        item: Option<String>,
    },
}

/// An immutable, append-only record of a single balance-affecting event.
///
/// The only permitted mutation after creation is the
/// `pending_approval -> completed|failed` status transition, which never
/// changes amount, currency, or wallet identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub wallet_type: WalletType,
    pub wallet_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gold_type: Option<GoldType>,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_wallet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_wallet: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: TransactionMetadata,
}

/// Generate an id of the form `<prefix>_<epochMillis>_<random9charBase36>`.
///
/// The millisecond component keeps ids lexically sortable by creation time
/// within a fixed digit width; the random suffix provides uniqueness.
pub fn new_id(prefix: &str) -> String {
    const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let millis = Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{prefix}_{millis}_{suffix}")
}

pub fn new_transaction_id() -> String {
    new_id("txn")
}

/// A realm: a game-specific economic namespace. One gold wallet per realm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Realm {
    pub id: String,
    pub game_id: String,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub name: String,
    pub active: bool,
}

/// Predicates for transaction queries. Every field is optional; the index
/// resolves whichever are supplied, and both read paths apply the full set
/// exactly via [`TransactionFilters::matches`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilters {
    pub user_id: Option<String>,
    pub wallet_type: Option<WalletType>,
    pub wallet_id: Option<String>,
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
}

impl TransactionFilters {
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(user_id) = &self.user_id {
            if &tx.user_id != user_id {
                return false;
            }
        }
        if let Some(wallet_type) = self.wallet_type {
            if tx.wallet_type != wallet_type {
                return false;
            }
        }
        if let Some(wallet_id) = &self.wallet_id {
            if &tx.wallet_id != wallet_id {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if tx.kind != kind {
                return false;
            }
        }
        if let Some(status) = self.status {
            if tx.status != status {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if tx.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if tx.created_at > to {
                return false;
            }
        }
        if let Some(min) = self.amount_min {
            if tx.amount < min {
                return false;
            }
        }
        if let Some(max) = self.amount_max {
            if tx.amount > max {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CreatedAt,
    Amount,
    Kind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub key: SortKey,
    pub dir: SortDir,
}

/// Sort a transaction slice in place. Ties always break on id, which keeps
/// ordering deterministic across both read paths.
pub fn sort_transactions(transactions: &mut [Transaction], sort: Sort) {
    transactions.sort_by(|a, b| {
        let ord = match sort.key {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::Amount => a.amount.total_cmp(&b.amount),
            SortKey::Kind => a
                .kind
                .as_str()
                .cmp(b.kind.as_str())
                .then_with(|| a.created_at.cmp(&b.created_at)),
        };
        let ord = ord.then_with(|| a.id.cmp(&b.id));
        match sort.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    });
}

/// Slice a sorted transaction list into one page.
pub fn paginate(transactions: Vec<Transaction>, pagination: Pagination) -> TransactionPage {
    let total = transactions.len();
    let items: Vec<Transaction> = transactions
        .into_iter()
        .skip(pagination.offset)
        .take(pagination.limit)
        .collect();
    let has_more = pagination.offset + items.len() < total;
    TransactionPage {
        transactions: items,
        total,
        has_more,
    }
}

/// One page of a filtered transaction view. Cacheable as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub total: usize,
    pub has_more: bool,
}

/// Aggregates over an (optionally user-scoped) transaction set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    pub total_count: usize,
    pub by_kind: HashMap<String, usize>,
    pub by_status: HashMap<String, usize>,
    pub by_wallet: HashMap<String, usize>,
    pub total_amount: f64,
    pub average_amount: f64,
}
