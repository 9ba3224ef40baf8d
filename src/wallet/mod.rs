//! Wallet and transaction domain logic.
//!
//! The only code permitted to mutate a wallet. Every mutation loads the
//! wallet, validates the operation-specific invariant, persists the wallet
//! and refreshes its cache entry, records the paired transaction (per-user
//! shard plus global ledger), updates the index incrementally, and
//! invalidates cached transaction views for the user.
//!
//! A wallet is one document, so both sides of a conversion land in a single
//! store write; validation happens before the first write, which is what
//! makes each operation all-or-nothing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Months, Utc};
use tracing::{info, warn};

use crate::cache::{CacheKey, TtlCache};
use crate::error::WalletError;
use crate::index::TransactionIndex;
use crate::models::{
    new_id, new_transaction_id, GoldType, GoldWallet, Realm, SuspendedDeposit,
    SuspendedDepositStatus, Transaction, TransactionKind, TransactionMetadata, TransactionStatus,
    Wallet, WalletType, GOLD_CURRENCY,
};
use crate::store::{keys, Store};

pub mod conversion;

pub use conversion::{ConversionFeeChange, ConversionFeeConfig, FEE_HISTORY_CAP};

/// The specific balance bucket an operation acts on: one static currency,
/// or one gold type within one realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceTarget {
    Static { currency: String },
    Gold { realm_id: String, gold_type: GoldType },
}

impl BalanceTarget {
    pub fn static_currency(currency: &str) -> Self {
        Self::Static {
            currency: currency.to_uppercase(),
        }
    }

    pub fn gold(realm_id: &str, gold_type: GoldType) -> Self {
        Self::Gold {
            realm_id: realm_id.to_string(),
            gold_type,
        }
    }

    fn wallet_type(&self) -> WalletType {
        match self {
            Self::Static { .. } => WalletType::Static,
            Self::Gold { .. } => WalletType::Gold,
        }
    }

    fn wallet_id(&self) -> &str {
        match self {
            Self::Static { currency } => currency,
            Self::Gold { realm_id, .. } => realm_id,
        }
    }

    fn currency(&self) -> String {
        match self {
            Self::Static { currency } => currency.to_uppercase(),
            Self::Gold { .. } => GOLD_CURRENCY.to_string(),
        }
    }

    fn gold_type(&self) -> Option<GoldType> {
        match self {
            Self::Static { .. } => None,
            Self::Gold { gold_type, .. } => Some(*gold_type),
        }
    }

    /// Bucket label used in error details, e.g. `USD` or `r1:withdrawable`.
    fn label(&self) -> String {
        match self {
            Self::Static { currency } => currency.to_uppercase(),
            Self::Gold {
                realm_id,
                gold_type,
            } => format!("{realm_id}:{gold_type}"),
        }
    }

    /// Conversion endpoint label, e.g. `static:USD` or `gold:r1`.
    fn side_label(&self) -> String {
        format!("{}:{}", self.wallet_type(), self.wallet_id())
    }
}

#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub suspension_months: u32,
    pub exchange_rates: HashMap<String, f64>,
    /// Fallback fee percent for currencies absent from the fee document.
    pub default_fee_percent: f64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            suspension_months: 2,
            exchange_rates: conversion::default_exchange_rates(),
            default_fee_percent: 5.0,
        }
    }
}

pub struct WalletService<S> {
    store: Arc<S>,
    cache: Arc<TtlCache>,
    index: Arc<TransactionIndex<S>>,
    config: WalletConfig,
}

impl<S: Store> WalletService<S> {
    pub fn new(
        store: Arc<S>,
        cache: Arc<TtlCache>,
        index: Arc<TransactionIndex<S>>,
        config: WalletConfig,
    ) -> Self {
        Self {
            store,
            cache,
            index,
            config,
        }
    }

    /// Credit the target bucket. Completes immediately; no approval step.
    pub async fn deposit(
        &self,
        user_id: &str,
        target: BalanceTarget,
        amount: f64,
    ) -> Result<Transaction, WalletError> {
        Self::validate_amount(amount)?;
        let mut wallet = self.load_or_create_wallet(user_id).await?;
        Self::credit(&mut wallet, &target, amount)?;
        self.persist_wallet(&mut wallet).await?;

        let tx = Self::base_transaction(
            user_id,
            &target,
            TransactionKind::Deposit,
            amount,
            TransactionStatus::Completed,
        );
        self.record_transaction(tx).await
    }

    /// Record a withdrawal request. The balance is checked but not
    /// deducted; the deduction happens on admin approval. Suspended gold is
    /// rejected unconditionally; it can only leave through conversion.
    pub async fn request_withdrawal(
        &self,
        user_id: &str,
        target: BalanceTarget,
        amount: f64,
    ) -> Result<Transaction, WalletError> {
        Self::validate_amount(amount)?;
        if matches!(
            target,
            BalanceTarget::Gold {
                gold_type: GoldType::Suspended,
                ..
            }
        ) {
            return Err(WalletError::SuspendedGoldRestriction);
        }

        let wallet = self.load_or_create_wallet(user_id).await?;
        let available = Self::available(&wallet, &target)?;
        if amount > available {
            return Err(WalletError::InsufficientBalance {
                wallet: target.label(),
                available,
                requested: amount,
            });
        }

        let mut tx = Self::base_transaction(
            user_id,
            &target,
            TransactionKind::Withdrawal,
            amount,
            TransactionStatus::PendingApproval,
        );
        tx.metadata = TransactionMetadata::Withdrawal {
            pending_approval: true,
            decided_by: None,
            decided_at: None,
        };
        self.record_transaction(tx).await
    }

    /// Debit the target bucket for a purchase. Suspended gold cannot be
    /// spent; it only leaves through conversion.
    pub async fn purchase(
        &self,
        user_id: &str,
        target: BalanceTarget,
        amount: f64,
        item: Option<String>,
    ) -> Result<Transaction, WalletError> {
        Self::validate_amount(amount)?;
        if matches!(
            target,
            BalanceTarget::Gold {
                gold_type: GoldType::Suspended,
                ..
            }
        ) {
            return Err(WalletError::SuspendedGoldRestriction);
        }

        let mut wallet = self.load_or_create_wallet(user_id).await?;
        Self::debit(&mut wallet, &target, amount)?;
        self.persist_wallet(&mut wallet).await?;

        let mut tx = Self::base_transaction(
            user_id,
            &target,
            TransactionKind::Purchase,
            amount,
            TransactionStatus::Completed,
        );
        tx.metadata = TransactionMetadata::Purchase { item };
        self.record_transaction(tx).await
    }

    /// Credit an earning. Gold earnings always land as withdrawable.
    pub async fn earning(
        &self,
        user_id: &str,
        target: BalanceTarget,
        amount: f64,
    ) -> Result<Transaction, WalletError> {
        Self::validate_amount(amount)?;
        let target = match target {
            BalanceTarget::Gold { realm_id, .. } => BalanceTarget::Gold {
                realm_id,
                gold_type: GoldType::Withdrawable,
            },
            static_target => static_target,
        };

        let mut wallet = self.load_or_create_wallet(user_id).await?;
        Self::credit(&mut wallet, &target, amount)?;
        self.persist_wallet(&mut wallet).await?;

        let tx = Self::base_transaction(
            user_id,
            &target,
            TransactionKind::Earning,
            amount,
            TransactionStatus::Completed,
        );
        self.record_transaction(tx).await
    }

    /// Convert between two balance buckets. Three sub-cases:
    /// suspended gold to fiat (fee-bearing), gold to gold across realms
    /// (1:1, gold type preserved), and everything else via the fixed
    /// exchange-rate table. One transaction is recorded on the destination
    /// side, annotated with both endpoints and the original amount.
    pub async fn convert(
        &self,
        user_id: &str,
        from: BalanceTarget,
        to: BalanceTarget,
        amount: f64,
    ) -> Result<Transaction, WalletError> {
        Self::validate_amount(amount)?;
        if from == to {
            return Err(WalletError::invalid(
                "conversion source and destination are the same bucket",
            ));
        }

        match (&from, &to) {
            (
                BalanceTarget::Gold {
                    gold_type: GoldType::Suspended,
                    ..
                },
                BalanceTarget::Static { .. },
            ) => self.convert_suspended_to_fiat(user_id, from, to, amount).await,
            (BalanceTarget::Gold { .. }, BalanceTarget::Gold { .. }) => {
                self.convert_gold_to_gold(user_id, from, to, amount).await
            }
            (
                _,
                BalanceTarget::Gold {
                    gold_type: GoldType::Suspended,
                    ..
                },
            ) => Err(WalletError::invalid(
                "suspended gold can only be created by admin deposit",
            )),
            _ => self.convert_by_rate(user_id, from, to, amount).await,
        }
    }

    /// Privileged: grant time-locked gold. Creates the gold wallet if the
    /// user has none for the realm (the realm itself must be active).
    pub async fn admin_suspended_deposit(
        &self,
        user_id: &str,
        realm_id: &str,
        amount: f64,
        admin_id: &str,
    ) -> Result<Transaction, WalletError> {
        Self::validate_amount(amount)?;
        self.require_active_realm(realm_id).await?;

        let mut wallet = self.load_or_create_wallet(user_id).await?;
        let deposited_at = Utc::now();
        let withdrawable_at = deposited_at
            .checked_add_months(Months::new(self.config.suspension_months))
            .ok_or_else(|| WalletError::Processing("maturity date out of range".to_string()))?;

        let gold = wallet
            .gold_wallets
            .entry(realm_id.to_string())
            .or_insert_with(|| GoldWallet::new(realm_id));
        gold.suspended_deposits.push(SuspendedDeposit {
            id: new_id("dep"),
            amount,
            deposited_at,
            withdrawable_at,
            deposited_by: admin_id.to_string(),
            status: SuspendedDepositStatus::Suspended,
        });
        gold.suspended_gold += amount;
        gold.recompute_total();
        self.persist_wallet(&mut wallet).await?;

        let mut tx = Self::base_transaction(
            user_id,
            &BalanceTarget::gold(realm_id, GoldType::Suspended),
            TransactionKind::AdminDeposit,
            amount,
            TransactionStatus::Completed,
        );
        tx.metadata = TransactionMetadata::AdminDeposit {
            admin_id: admin_id.to_string(),
            withdrawable_at,
        };
        self.record_transaction(tx).await
    }

    /// Approve a pending withdrawal: perform the deferred deduction and
    /// flip the record to completed. Only legal on pending transactions.
    pub async fn approve_transaction(
        &self,
        tx_id: &str,
        admin_id: &str,
    ) -> Result<Transaction, WalletError> {
        let (mut ledger, position) = self.find_in_ledger(tx_id).await?;
        let tx = ledger[position].clone();
        Self::require_pending(&tx)?;

        if tx.kind == TransactionKind::Withdrawal {
            let target = Self::target_of(&tx)?;
            let mut wallet = self.load_or_create_wallet(&tx.user_id).await?;
            Self::debit(&mut wallet, &target, tx.amount)?;
            self.persist_wallet(&mut wallet).await?;
        }

        let mut updated = tx;
        updated.status = TransactionStatus::Completed;
        updated.metadata = TransactionMetadata::Withdrawal {
            pending_approval: false,
            decided_by: Some(admin_id.to_string()),
            decided_at: Some(Utc::now()),
        };
        ledger[position] = updated.clone();
        self.store.set_doc(keys::TRANSACTIONS_KEY, &ledger).await?;
        self.replace_in_shard(&updated).await?;
        self.index.update(&updated).await;
        self.invalidate_transaction_views(&updated.user_id);
        info!(tx = %updated.id, admin = admin_id, "withdrawal approved");
        Ok(updated)
    }

    /// Reject a pending withdrawal: no balance effect, status becomes
    /// failed.
    pub async fn reject_transaction(
        &self,
        tx_id: &str,
        admin_id: &str,
    ) -> Result<Transaction, WalletError> {
        let (mut ledger, position) = self.find_in_ledger(tx_id).await?;
        let tx = ledger[position].clone();
        Self::require_pending(&tx)?;

        let mut updated = tx;
        updated.status = TransactionStatus::Failed;
        updated.metadata = TransactionMetadata::Withdrawal {
            pending_approval: false,
            decided_by: Some(admin_id.to_string()),
            decided_at: Some(Utc::now()),
        };
        ledger[position] = updated.clone();
        self.store.set_doc(keys::TRANSACTIONS_KEY, &ledger).await?;
        self.replace_in_shard(&updated).await?;
        self.index.update(&updated).await;
        self.invalidate_transaction_views(&updated.user_id);
        info!(tx = %updated.id, admin = admin_id, "withdrawal rejected");
        Ok(updated)
    }

    /// Create a gold wallet for an active realm. Idempotent if one exists.
    pub async fn create_gold_wallet(
        &self,
        user_id: &str,
        realm_id: &str,
    ) -> Result<Wallet, WalletError> {
        self.require_active_realm(realm_id).await?;
        let mut wallet = self.load_or_create_wallet(user_id).await?;
        wallet
            .gold_wallets
            .entry(realm_id.to_string())
            .or_insert_with(|| GoldWallet::new(realm_id));
        self.persist_wallet(&mut wallet).await?;
        Ok(wallet)
    }

    /// Remove a gold wallet. Refused while it still holds gold unless
    /// `force` explicitly overrides the safety check.
    pub async fn remove_gold_wallet(
        &self,
        user_id: &str,
        realm_id: &str,
        force: bool,
    ) -> Result<Wallet, WalletError> {
        let mut wallet = self.load_or_create_wallet(user_id).await?;
        let gold = wallet
            .gold_wallets
            .get(realm_id)
            .ok_or_else(|| WalletError::GoldWalletNotFound {
                user: user_id.to_string(),
                realm: realm_id.to_string(),
            })?;
        if gold.total_gold != 0.0 && !force {
            return Err(WalletError::WalletHasBalance {
                realm: realm_id.to_string(),
                total: gold.total_gold,
            });
        }
        if gold.total_gold != 0.0 {
            warn!(
                user_id,
                realm_id,
                total = gold.total_gold,
                "force-removing gold wallet with non-zero balance"
            );
        }
        wallet.gold_wallets.remove(realm_id);
        self.persist_wallet(&mut wallet).await?;
        Ok(wallet)
    }

    /// Update the fee percent for one currency and append to the capped
    /// audit trail.
    pub async fn set_conversion_fee(
        &self,
        currency: &str,
        percent: f64,
        admin_id: &str,
    ) -> Result<ConversionFeeConfig, WalletError> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(WalletError::ConversionConfig(format!(
                "invalid fee percentage: {percent}"
            )));
        }
        let currency = currency.to_uppercase();

        let mut config: ConversionFeeConfig = self
            .store
            .get_doc(keys::CONVERSION_FEES_KEY)
            .await?
            .unwrap_or_default();
        config.fees.insert(currency.clone(), percent);
        config.updated_at = Utc::now();
        config.updated_by = Some(admin_id.to_string());
        self.store.set_doc(keys::CONVERSION_FEES_KEY, &config).await?;

        let mut history: Vec<ConversionFeeChange> = self
            .store
            .get_doc(keys::CONVERSION_FEES_HISTORY_KEY)
            .await?
            .unwrap_or_default();
        history.push(ConversionFeeChange {
            currency,
            percent,
            changed_by: admin_id.to_string(),
            changed_at: Utc::now(),
        });
        if history.len() > FEE_HISTORY_CAP {
            let excess = history.len() - FEE_HISTORY_CAP;
            history.drain(..excess);
        }
        self.store
            .set_doc(keys::CONVERSION_FEES_HISTORY_KEY, &history)
            .await?;

        self.cache.invalidate(&CacheKey::ConversionFees.to_string());
        Ok(config)
    }

    /// Move matured suspended deposits into the withdrawable bucket.
    /// Maturity is driven solely by `withdrawable_at`. Returns the number
    /// of deposits matured.
    pub async fn process_matured_deposits(&self) -> Result<usize, WalletError> {
        let now = Utc::now();
        let mut matured = 0usize;

        for key in self.store.keys().await {
            if keys::wallet_user_id(&key).is_none() {
                continue;
            }
            let Some(mut wallet) = self.store.get_doc::<Wallet>(&key).await? else {
                continue;
            };
            let mut changed = false;
            for gold in wallet.gold_wallets.values_mut() {
                for deposit in gold.suspended_deposits.iter_mut() {
                    if deposit.status == SuspendedDepositStatus::Suspended
                        && deposit.withdrawable_at <= now
                    {
                        // A conversion may have drawn the bucket below the
                        // sum of open deposits; only the remainder moves.
                        let movable = deposit.amount.min(gold.suspended_gold);
                        gold.suspended_gold -= movable;
                        gold.withdrawable_gold += movable;
                        deposit.status = SuspendedDepositStatus::Withdrawable;
                        changed = true;
                        matured += 1;
                    }
                }
                gold.recompute_total();
            }
            if changed {
                self.persist_wallet(&mut wallet).await?;
            }
        }
        if matured > 0 {
            info!(matured, "suspended deposits matured");
        }
        Ok(matured)
    }

    // Conversion sub-cases

    async fn convert_suspended_to_fiat(
        &self,
        user_id: &str,
        from: BalanceTarget,
        to: BalanceTarget,
        amount: f64,
    ) -> Result<Transaction, WalletError> {
        let to_currency = to.currency();
        let fee_percent = self.conversion_fee_percent(&to_currency).await?;
        let rate = self.rate(GOLD_CURRENCY, &to_currency)?;

        // The full requested amount is debited; the fee is taken out of
        // the converted value, not added on top.
        let fee = amount * fee_percent / 100.0;
        let net_gold = amount - fee;
        let credited = net_gold * rate;

        let mut wallet = self.load_or_create_wallet(user_id).await?;
        Self::debit(&mut wallet, &from, amount)?;
        *wallet.static_balance_mut(&to_currency)? += credited;
        self.persist_wallet(&mut wallet).await?;

        let mut tx = Self::base_transaction(
            user_id,
            &to,
            TransactionKind::Conversion,
            credited,
            TransactionStatus::Completed,
        );
        tx.conversion_fee = Some(fee);
        tx.from_wallet = Some(from.side_label());
        tx.to_wallet = Some(to.side_label());
        tx.metadata = TransactionMetadata::Conversion {
            exchange_rate: rate,
            original_amount: amount,
            fee_percent,
        };
        self.record_transaction(tx).await
    }

    async fn convert_gold_to_gold(
        &self,
        user_id: &str,
        from: BalanceTarget,
        to: BalanceTarget,
        amount: f64,
    ) -> Result<Transaction, WalletError> {
        // Cross-realm gold moves 1:1 and keeps its gold type.
        if from.gold_type() != to.gold_type() {
            return Err(WalletError::invalid(
                "gold type cannot change in a cross-realm transfer",
            ));
        }

        let mut wallet = self.load_or_create_wallet(user_id).await?;
        Self::debit(&mut wallet, &from, amount)?;
        Self::credit(&mut wallet, &to, amount)?;
        self.persist_wallet(&mut wallet).await?;

        let mut tx = Self::base_transaction(
            user_id,
            &to,
            TransactionKind::Conversion,
            amount,
            TransactionStatus::Completed,
        );
        tx.from_wallet = Some(from.side_label());
        tx.to_wallet = Some(to.side_label());
        tx.metadata = TransactionMetadata::Conversion {
            exchange_rate: 1.0,
            original_amount: amount,
            fee_percent: 0.0,
        };
        self.record_transaction(tx).await
    }

    async fn convert_by_rate(
        &self,
        user_id: &str,
        from: BalanceTarget,
        to: BalanceTarget,
        amount: f64,
    ) -> Result<Transaction, WalletError> {
        let rate = self.rate(&from.currency(), &to.currency())?;
        let credited = amount * rate;

        let mut wallet = self.load_or_create_wallet(user_id).await?;
        Self::debit(&mut wallet, &from, amount)?;
        Self::credit(&mut wallet, &to, credited)?;
        self.persist_wallet(&mut wallet).await?;

        let mut tx = Self::base_transaction(
            user_id,
            &to,
            TransactionKind::Conversion,
            credited,
            TransactionStatus::Completed,
        );
        tx.from_wallet = Some(from.side_label());
        tx.to_wallet = Some(to.side_label());
        tx.metadata = TransactionMetadata::Conversion {
            exchange_rate: rate,
            original_amount: amount,
            fee_percent: 0.0,
        };
        self.record_transaction(tx).await
    }

    // Shared plumbing

    fn validate_amount(amount: f64) -> Result<(), WalletError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(WalletError::invalid(format!(
                "amount must be positive, got {amount}"
            )));
        }
        Ok(())
    }

    fn base_transaction(
        user_id: &str,
        target: &BalanceTarget,
        kind: TransactionKind,
        amount: f64,
        status: TransactionStatus,
    ) -> Transaction {
        Transaction {
            id: new_transaction_id(),
            user_id: user_id.to_string(),
            wallet_type: target.wallet_type(),
            wallet_id: target.wallet_id().to_string(),
            kind,
            amount,
            currency: target.currency(),
            gold_type: target.gold_type(),
            status,
            conversion_fee: None,
            from_wallet: None,
            to_wallet: None,
            created_at: Utc::now(),
            metadata: TransactionMetadata::None,
        }
    }

    fn available(wallet: &Wallet, target: &BalanceTarget) -> Result<f64, WalletError> {
        match target {
            BalanceTarget::Static { currency } => wallet.static_balance(currency),
            BalanceTarget::Gold {
                realm_id,
                gold_type,
            } => wallet
                .gold_wallets
                .get(realm_id)
                .map(|gold| gold.balance(*gold_type))
                .ok_or_else(|| WalletError::GoldWalletNotFound {
                    user: wallet.user_id.clone(),
                    realm: realm_id.clone(),
                }),
        }
    }

    fn credit(wallet: &mut Wallet, target: &BalanceTarget, amount: f64) -> Result<(), WalletError> {
        match target {
            BalanceTarget::Static { currency } => {
                *wallet.static_balance_mut(currency)? += amount;
            }
            BalanceTarget::Gold {
                realm_id,
                gold_type,
            } => {
                let user = wallet.user_id.clone();
                let gold = wallet.gold_wallets.get_mut(realm_id).ok_or_else(|| {
                    WalletError::GoldWalletNotFound {
                        user,
                        realm: realm_id.clone(),
                    }
                })?;
                match gold_type {
                    GoldType::Suspended => gold.suspended_gold += amount,
                    GoldType::Withdrawable => gold.withdrawable_gold += amount,
                }
                gold.recompute_total();
            }
        }
        Ok(())
    }

    fn debit(wallet: &mut Wallet, target: &BalanceTarget, amount: f64) -> Result<(), WalletError> {
        let available = Self::available(wallet, target)?;
        if amount > available {
            return Err(WalletError::InsufficientBalance {
                wallet: target.label(),
                available,
                requested: amount,
            });
        }
        match target {
            BalanceTarget::Static { currency } => {
                *wallet.static_balance_mut(currency)? -= amount;
            }
            BalanceTarget::Gold {
                realm_id,
                gold_type,
            } => {
                // Presence was checked by `available`.
                if let Some(gold) = wallet.gold_wallets.get_mut(realm_id) {
                    match gold_type {
                        GoldType::Suspended => gold.suspended_gold -= amount,
                        GoldType::Withdrawable => gold.withdrawable_gold -= amount,
                    }
                    gold.recompute_total();
                }
            }
        }
        Ok(())
    }

    fn target_of(tx: &Transaction) -> Result<BalanceTarget, WalletError> {
        match tx.wallet_type {
            WalletType::Static => Ok(BalanceTarget::Static {
                currency: tx.wallet_id.clone(),
            }),
            WalletType::Gold => Ok(BalanceTarget::Gold {
                realm_id: tx.wallet_id.clone(),
                gold_type: tx.gold_type.ok_or_else(|| {
                    WalletError::invalid(format!("transaction {} lacks a gold type", tx.id))
                })?,
            }),
        }
    }

    fn require_pending(tx: &Transaction) -> Result<(), WalletError> {
        if tx.status != TransactionStatus::PendingApproval {
            return Err(WalletError::TransactionNotPending {
                id: tx.id.clone(),
                status: tx.status.to_string(),
            });
        }
        Ok(())
    }

    async fn require_active_realm(&self, realm_id: &str) -> Result<(), WalletError> {
        let realms: Vec<Realm> = self
            .store
            .get_doc(keys::REALMS_KEY)
            .await?
            .unwrap_or_default();
        // An inactive realm is treated the same as a missing one.
        if realms.iter().any(|realm| realm.id == realm_id && realm.active) {
            Ok(())
        } else {
            Err(WalletError::RealmNotFound(realm_id.to_string()))
        }
    }

    async fn conversion_fee_percent(&self, currency: &str) -> Result<f64, WalletError> {
        let key = CacheKey::ConversionFees.to_string();
        let store = Arc::clone(&self.store);
        let config: ConversionFeeConfig = self
            .cache
            .get_or_set(&key, None, || async move {
                Ok::<_, WalletError>(
                    store
                        .get_doc(keys::CONVERSION_FEES_KEY)
                        .await?
                        .unwrap_or_default(),
                )
            })
            .await?;

        let percent = config
            .fees
            .get(&currency.to_uppercase())
            .copied()
            .unwrap_or(self.config.default_fee_percent);
        if !(0.0..=100.0).contains(&percent) {
            return Err(WalletError::ConversionConfig(format!(
                "invalid fee percentage for {currency}: {percent}"
            )));
        }
        Ok(percent)
    }

    fn rate(&self, from: &str, to: &str) -> Result<f64, WalletError> {
        let key = conversion::rate_key(from, to);
        self.config
            .exchange_rates
            .get(&key)
            .copied()
            .ok_or_else(|| WalletError::ConversionConfig(format!("missing exchange rate {key}")))
    }

    async fn load_or_create_wallet(&self, user_id: &str) -> Result<Wallet, WalletError> {
        match self
            .store
            .get_doc::<Wallet>(&keys::wallet_key(user_id))
            .await?
        {
            Some(wallet) => Ok(wallet),
            None => Ok(Wallet::empty(user_id)),
        }
    }

    async fn persist_wallet(&self, wallet: &mut Wallet) -> Result<(), WalletError> {
        wallet.touch();
        self.store
            .set_doc(&keys::wallet_key(&wallet.user_id), wallet)
            .await?;
        self.cache.set(
            &CacheKey::Wallet(wallet.user_id.clone()).to_string(),
            wallet,
            None,
        );
        Ok(())
    }

    /// Dual-write the record (per-user shard + global ledger), index it,
    /// and drop cached transaction views for the user.
    async fn record_transaction(&self, tx: Transaction) -> Result<Transaction, WalletError> {
        let shard_key = keys::user_transactions_key(&tx.user_id);
        let mut shard: Vec<Transaction> = self
            .store
            .get_doc(&shard_key)
            .await?
            .unwrap_or_default();
        shard.push(tx.clone());
        self.store.set_doc(&shard_key, &shard).await?;

        let mut ledger: Vec<Transaction> = self
            .store
            .get_doc(keys::TRANSACTIONS_KEY)
            .await?
            .unwrap_or_default();
        ledger.push(tx.clone());
        self.store.set_doc(keys::TRANSACTIONS_KEY, &ledger).await?;

        self.index.add(&tx).await;
        self.invalidate_transaction_views(&tx.user_id);
        info!(
            tx = %tx.id,
            user = %tx.user_id,
            kind = %tx.kind,
            amount = tx.amount,
            status = %tx.status,
            "transaction recorded"
        );
        Ok(tx)
    }

    async fn find_in_ledger(
        &self,
        tx_id: &str,
    ) -> Result<(Vec<Transaction>, usize), WalletError> {
        let ledger: Vec<Transaction> = self
            .store
            .get_doc(keys::TRANSACTIONS_KEY)
            .await?
            .unwrap_or_default();
        let position = ledger
            .iter()
            .position(|tx| tx.id == tx_id)
            .ok_or_else(|| WalletError::TransactionNotFound(tx_id.to_string()))?;
        Ok((ledger, position))
    }

    async fn replace_in_shard(&self, tx: &Transaction) -> Result<(), WalletError> {
        let shard_key = keys::user_transactions_key(&tx.user_id);
        let mut shard: Vec<Transaction> = self
            .store
            .get_doc(&shard_key)
            .await?
            .unwrap_or_default();
        if let Some(slot) = shard.iter_mut().find(|candidate| candidate.id == tx.id) {
            *slot = tx.clone();
            self.store.set_doc(&shard_key, &shard).await?;
        }
        Ok(())
    }

    fn invalidate_transaction_views(&self, user_id: &str) {
        self.cache
            .invalidate_pattern(&format!("user_transactions:{user_id}"));
        self.cache
            .invalidate_pattern(&format!("transactions:recent:{user_id}"));
    }
}
