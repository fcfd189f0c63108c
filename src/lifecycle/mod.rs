//! Sub-account lifecycle manager
//!
//! Orchestrates the state machine per (user, strategy slot):
//! UNPROVISIONED -> PROVISIONED_INACTIVE -> ACTIVE -> PROVISIONED_INACTIVE.
//! There is no deleted state: stop is a logical reset and the exchange
//! sub-account is reused on the next start.
//!
//! The remote API is non-transactional, so each operation is a strictly
//! sequential chain of calls with deliberate intermediate persistence: a
//! newly created sub-account is recorded before the capital credit, and a
//! failed credit leaves the slot PROVISIONED_INACTIVE, recoverable by a
//! later start that finds the stored sub_account_id and skips re-creation.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::common::errors::{ClientError, Result};
use crate::exchange::gateway::{ExchangeGateway, LedgerOperation};
use crate::exchange::normalize;
use crate::store::{SlotUpdate, StrategySlot, SubscriptionStore};

/// Inputs of a start (subscribe) operation
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub user: String,
    /// Exchange main account the sub-account hangs off; used only when the
    /// slot is still unprovisioned
    pub main_account_id: String,
    pub capital: Decimal,
    pub slot: StrategySlot,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
}

/// Result of a successful start operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub sub_account_id: String,
    /// Whether this call created the exchange sub-account
    pub provisioned_now: bool,
}

/// A liquidation that failed during the stop sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationFailure {
    pub currency: String,
    pub message: String,
}

/// Result of a stop operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// Slot was never provisioned; nothing to do
    NotProvisioned,
    /// All non-cash balances liquidated, local state reset
    Stopped { liquidated: usize },
    /// Local state was reset, but some balances could not be liquidated.
    /// Callers must surface these; the exchange still holds them.
    PartialLiquidation {
        liquidated: usize,
        failures: Vec<LiquidationFailure>,
    },
}

/// Per-(user, slot) advisory locks
///
/// The store has no per-key locking or version checks, so without this two
/// concurrent starts for the same slot could both observe UNPROVISIONED and
/// create duplicate sub-accounts, stranding one as an orphan. The lock is
/// held for the whole operation and changes no success-path behavior.
#[derive(Debug, Default)]
struct SlotLocks {
    inner: Mutex<HashMap<(String, u8), Arc<Mutex<()>>>>,
}

impl SlotLocks {
    async fn acquire(&self, user: &str, slot: StrategySlot) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // drop entries nobody holds or waits on, so the map tracks
            // in-flight operations instead of every key ever seen
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry((user.to_string(), slot.index()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Orchestrator for subscribe/unsubscribe flows
pub struct LifecycleManager<S> {
    gateway: Arc<ExchangeGateway>,
    store: Arc<S>,
    /// Currency credited on capital top-ups
    credit_currency: String,
    /// Reference fiat currency, never liquidated
    reference_currency: String,
    locks: SlotLocks,
}

impl<S: SubscriptionStore> LifecycleManager<S> {
    pub fn new(
        gateway: Arc<ExchangeGateway>,
        store: Arc<S>,
        credit_currency: impl Into<String>,
        reference_currency: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            credit_currency: credit_currency.into(),
            reference_currency: reference_currency.into(),
            locks: SlotLocks::default(),
        }
    }

    /// Subscribe capital to a strategy slot.
    ///
    /// Provisions the exchange sub-account exactly once per (user, slot);
    /// later starts reuse the stored sub_account_id and only credit.
    #[instrument(skip(self, request), fields(user = %request.user, slot = %request.slot))]
    pub async fn start(&self, request: StartRequest) -> Result<StartOutcome> {
        let _guard = self.locks.acquire(&request.user, request.slot).await;

        if self.store.get(&request.user).await?.is_none() {
            self.store.create_default(&request.user).await?;
            info!("Created subscription record for {}", request.user);
        }

        let proportional = self.proportional_allocation(request.slot, request.capital).await?;

        let record = self
            .store
            .get(&request.user)
            .await?
            .ok_or_else(|| ClientError::Store(format!("missing record for {}", request.user)))?;
        let slot_state = record.slot(request.slot).clone();

        if slot_state.is_provisioned() {
            let sub_account_id = parse_account_id(&slot_state.sub_account_id, "sub account id")?;
            self.credit_capital(sub_account_id, request.capital).await?;
            self.store
                .set_slot_fields(
                    &request.user,
                    request.slot,
                    activation_update(&request, proportional),
                )
                .await?;

            info!(
                "Reused sub-account {} for {} on {}",
                slot_state.sub_account_id, request.user, request.slot
            );
            Ok(StartOutcome {
                sub_account_id: slot_state.sub_account_id,
                provisioned_now: false,
            })
        } else {
            let sub_account_id = self.provision(&request).await?;
            self.credit_capital(sub_account_id, request.capital).await?;
            self.store
                .set_slot_fields(
                    &request.user,
                    request.slot,
                    activation_update(&request, proportional),
                )
                .await?;

            Ok(StartOutcome {
                sub_account_id: sub_account_id.to_string(),
                provisioned_now: true,
            })
        }
    }

    /// Unsubscribe from a strategy slot.
    ///
    /// Liquidates every non-cash balance (best effort), then resets the
    /// local subscription fields. The sub_account_id is retained for reuse.
    #[instrument(skip(self), fields(user = %user, slot = %slot))]
    pub async fn stop(&self, user: &str, slot: StrategySlot) -> Result<StopOutcome> {
        let _guard = self.locks.acquire(user, slot).await;

        let record = match self.store.get(user).await? {
            Some(record) => record,
            None => return Ok(StopOutcome::NotProvisioned),
        };
        let slot_state = record.slot(slot);
        if slot_state.main_account_id.is_empty() {
            return Ok(StopOutcome::NotProvisioned);
        }

        let sub_account_id = parse_account_id(&slot_state.sub_account_id, "sub account id")?;
        let reply = self.gateway.get_balances(sub_account_id).await?;
        let snapshot = normalize::balances_response(&reply);
        if !snapshot.accepted() {
            return Err(ClientError::exchange(snapshot.status_code, snapshot.error));
        }

        let mut liquidated = 0usize;
        let mut failures = Vec::new();
        for balance in &snapshot.balances {
            if balance.currency_symbol == self.reference_currency {
                continue;
            }
            let quantity = match balance.liquidation_quantity() {
                Ok(quantity) => quantity,
                Err(e) => {
                    warn!(
                        "Skipping {} on sub-account {}: {}",
                        balance.currency_symbol, sub_account_id, e
                    );
                    failures.push(LiquidationFailure {
                        currency: balance.currency_symbol.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            match self
                .liquidate(sub_account_id, &balance.currency_symbol, quantity)
                .await
            {
                Ok(true) => liquidated += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(
                        "Failed to liquidate {} {} on sub-account {}: {}",
                        quantity, balance.currency_symbol, sub_account_id, e
                    );
                    failures.push(LiquidationFailure {
                        currency: balance.currency_symbol.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        // Reset is unconditional; any unliquidated balance is reported in
        // the outcome instead of blocking the unsubscribe.
        self.store
            .set_slot_fields(user, slot, SlotUpdate::reset(Utc::now()))
            .await?;

        if failures.is_empty() {
            info!("Stopped {} on {} ({} liquidations)", user, slot, liquidated);
            Ok(StopOutcome::Stopped { liquidated })
        } else {
            warn!(
                "Stopped {} on {} with {} unliquidated balances",
                user,
                slot,
                failures.len()
            );
            Ok(StopOutcome::PartialLiquidation {
                liquidated,
                failures,
            })
        }
    }

    /// capital / pooled strategy wallet, guarding the empty-wallet case
    async fn proportional_allocation(
        &self,
        slot: StrategySlot,
        capital: Decimal,
    ) -> Result<Decimal> {
        let wallet = self
            .store
            .strategy_wallet(slot)
            .await?
            .ok_or_else(|| {
                ClientError::DataInconsistency(format!("no wallet snapshot for {slot}"))
            })?;
        capital.checked_div(wallet).ok_or_else(|| {
            ClientError::DataInconsistency(format!("pooled wallet for {slot} is zero"))
        })
    }

    /// Create the exchange sub-account and persist its identifiers with
    /// subscribed=false before any capital moves. If the later credit fails
    /// the slot stays PROVISIONED_INACTIVE with the account reference saved.
    async fn provision(&self, request: &StartRequest) -> Result<i64> {
        let main_account_id = parse_account_id(&request.main_account_id, "main account id")?;
        let reply = self
            .gateway
            .create_sub_account(main_account_id, &request.slot.sub_account_label())
            .await?;
        let created = normalize::sub_account_response(&reply);
        if !created.accepted() {
            return Err(ClientError::exchange(created.status_code, created.message));
        }
        let sub_account_id = created
            .sub_account_id
            .ok_or_else(|| ClientError::InvalidResponse("missing newUserId".to_string()))?;

        self.store
            .set_slot_fields(
                &request.user,
                request.slot,
                SlotUpdate {
                    main_account_id: Some(request.main_account_id.clone()),
                    sub_account_id: Some(sub_account_id.to_string()),
                    sub_account_name: Some(created.sub_account_name.clone()),
                    subscribed: Some(false),
                    capital: Some(Decimal::ZERO),
                    proportional: Some(Decimal::ZERO),
                    subscribed_date: Some(Utc::now()),
                    stop_loss: Some(Decimal::ZERO),
                    take_profit: Some(Decimal::ZERO),
                },
            )
            .await?;

        info!(
            "Provisioned sub-account {} ({}) for {}",
            sub_account_id, created.sub_account_name, request.user
        );
        Ok(sub_account_id)
    }

    /// Credit subscribed capital to a sub-account ledger
    async fn credit_capital(&self, sub_account_id: i64, amount: Decimal) -> Result<()> {
        let reference = Uuid::new_v4().to_string();
        let reply = self
            .gateway
            .add_transaction(
                LedgerOperation::Credit,
                amount,
                &self.credit_currency,
                sub_account_id,
                &reference,
            )
            .await?;
        let response = normalize::transaction_response(&reply);
        if !response.accepted() {
            return Err(ClientError::exchange(response.status_code, response.message));
        }
        Ok(())
    }

    /// Bring one currency balance to zero. A positive quantity is debited
    /// (sold); a negative one is bought back with a credit of the absolute
    /// amount; zero is an implicit success.
    async fn liquidate(&self, sub_account_id: i64, currency: &str, quantity: Decimal) -> Result<bool> {
        let (operation, amount) = if quantity > Decimal::ZERO {
            (LedgerOperation::Debit, quantity)
        } else if quantity < Decimal::ZERO {
            (LedgerOperation::Credit, -quantity)
        } else {
            return Ok(false);
        };

        let reference = Uuid::new_v4().to_string();
        let reply = self
            .gateway
            .add_transaction(operation, amount, currency, sub_account_id, &reference)
            .await?;
        let response = normalize::transaction_response(&reply);
        if !response.accepted() {
            return Err(ClientError::exchange(response.status_code, response.message));
        }
        info!(
            "Liquidated {} {} on sub-account {}",
            amount, currency, sub_account_id
        );
        Ok(true)
    }
}

fn activation_update(request: &StartRequest, proportional: Decimal) -> SlotUpdate {
    SlotUpdate {
        subscribed: Some(true),
        capital: Some(request.capital),
        proportional: Some(proportional),
        subscribed_date: Some(Utc::now()),
        stop_loss: Some(request.stop_loss),
        take_profit: Some(request.take_profit),
        ..Default::default()
    }
}

fn parse_account_id(raw: &str, what: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| ClientError::DataInconsistency(format!("{what} is not numeric: {raw:?}")))
}
