//! Subscription store: the persistent per-user record of strategy slots
//!
//! The backing document store is an external collaborator; this module
//! defines the record shape and the operation seam, plus an in-memory
//! implementation. Updates are single-document field merges: only the fields
//! named in a `SlotUpdate` change.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::Result;

pub use memory::InMemorySubscriptionStore;

/// The four fixed strategies a user may subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategySlot {
    Light,
    Investor,
    BtcTrendCatcher,
    XrpTrendCatcher,
}

impl StrategySlot {
    pub const ALL: [StrategySlot; 4] = [
        StrategySlot::Light,
        StrategySlot::Investor,
        StrategySlot::BtcTrendCatcher,
        StrategySlot::XrpTrendCatcher,
    ];

    /// Slot number, 1-4
    pub fn index(&self) -> u8 {
        match self {
            StrategySlot::Light => 1,
            StrategySlot::Investor => 2,
            StrategySlot::BtcTrendCatcher => 3,
            StrategySlot::XrpTrendCatcher => 4,
        }
    }

    pub fn from_index(index: u8) -> Option<StrategySlot> {
        match index {
            1 => Some(StrategySlot::Light),
            2 => Some(StrategySlot::Investor),
            3 => Some(StrategySlot::BtcTrendCatcher),
            4 => Some(StrategySlot::XrpTrendCatcher),
            _ => None,
        }
    }

    /// Display name of the strategy
    pub fn label(&self) -> &'static str {
        match self {
            StrategySlot::Light => "Light",
            StrategySlot::Investor => "Investor",
            StrategySlot::BtcTrendCatcher => "BTC Trend Catcher",
            StrategySlot::XrpTrendCatcher => "XRP Trend Catcher",
        }
    }

    /// Label used when provisioning the exchange sub-account
    pub fn sub_account_label(&self) -> String {
        format!("{} CopyTrading", self.label())
    }
}

impl std::fmt::Display for StrategySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle state of a (user, strategy slot) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLifecycleState {
    /// No exchange sub-account yet
    Unprovisioned,
    /// Sub-account exists, capital not subscribed
    ProvisionedInactive,
    /// Subscribed with capital credited
    Active,
}

/// Per-slot subscription state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SlotState {
    /// Exchange main account; empty string means not yet provisioned
    pub main_account_id: String,
    /// Exchange sub-account; once set, never cleared (reused across
    /// subscribe/unsubscribe cycles)
    pub sub_account_id: String,
    pub sub_account_name: String,
    pub subscribed: bool,
    /// Last successfully credited capital (may lag the live balance)
    pub capital: Decimal,
    /// capital / strategy pooled wallet at subscription time
    pub proportional: Decimal,
    pub subscribed_date: Option<DateTime<Utc>>,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

impl SlotState {
    pub fn is_provisioned(&self) -> bool {
        !self.sub_account_id.is_empty()
    }

    pub fn lifecycle_state(&self) -> SlotLifecycleState {
        if self.sub_account_id.is_empty() {
            SlotLifecycleState::Unprovisioned
        } else if self.subscribed {
            SlotLifecycleState::Active
        } else {
            SlotLifecycleState::ProvisionedInactive
        }
    }
}

/// One document per user, keyed by user identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionRecord {
    pub user: String,
    slots: [SlotState; 4],
}

impl SubscriptionRecord {
    /// Fresh record with all four slots empty and unsubscribed
    pub fn new_default(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            slots: Default::default(),
        }
    }

    pub fn slot(&self, slot: StrategySlot) -> &SlotState {
        &self.slots[(slot.index() - 1) as usize]
    }

    pub fn slot_mut(&mut self, slot: StrategySlot) -> &mut SlotState {
        &mut self.slots[(slot.index() - 1) as usize]
    }

    /// Number of strategies the user is currently subscribed to
    pub fn active_count(&self) -> usize {
        StrategySlot::ALL
            .iter()
            .filter(|slot| self.slot(**slot).subscribed)
            .count()
    }
}

/// Partial update of one slot; only the named fields change
#[derive(Debug, Clone, Default)]
pub struct SlotUpdate {
    pub main_account_id: Option<String>,
    pub sub_account_id: Option<String>,
    pub sub_account_name: Option<String>,
    pub subscribed: Option<bool>,
    pub capital: Option<Decimal>,
    pub proportional: Option<Decimal>,
    pub subscribed_date: Option<DateTime<Utc>>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

impl SlotUpdate {
    /// Merge into a slot state, field by field
    pub fn apply(&self, state: &mut SlotState) {
        if let Some(value) = &self.main_account_id {
            state.main_account_id = value.clone();
        }
        if let Some(value) = &self.sub_account_id {
            state.sub_account_id = value.clone();
        }
        if let Some(value) = &self.sub_account_name {
            state.sub_account_name = value.clone();
        }
        if let Some(value) = self.subscribed {
            state.subscribed = value;
        }
        if let Some(value) = self.capital {
            state.capital = value;
        }
        if let Some(value) = self.proportional {
            state.proportional = value;
        }
        if let Some(value) = self.subscribed_date {
            state.subscribed_date = Some(value);
        }
        if let Some(value) = self.stop_loss {
            state.stop_loss = value;
        }
        if let Some(value) = self.take_profit {
            state.take_profit = value;
        }
    }

    /// Reset performed on stop: subscription fields zeroed, account
    /// identifiers untouched
    pub fn reset(now: DateTime<Utc>) -> Self {
        Self {
            subscribed: Some(false),
            capital: Some(Decimal::ZERO),
            proportional: Some(Decimal::ZERO),
            subscribed_date: Some(now),
            stop_loss: Some(Decimal::ZERO),
            take_profit: Some(Decimal::ZERO),
            ..Default::default()
        }
    }
}

/// Operation seam over the document store
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Fetch a user record, if present
    async fn get(&self, user: &str) -> Result<Option<SubscriptionRecord>>;

    /// Create the default record for a user; returns the existing record
    /// unchanged when one is already present
    async fn create_default(&self, user: &str) -> Result<SubscriptionRecord>;

    /// Merge the named fields into one slot of one user document
    async fn set_slot_fields(
        &self,
        user: &str,
        slot: StrategySlot,
        update: SlotUpdate,
    ) -> Result<()>;

    /// Users currently subscribed to a strategy
    async fn list_subscribers(&self, slot: StrategySlot) -> Result<Vec<String>>;

    /// Every user record
    async fn list_all(&self) -> Result<Vec<SubscriptionRecord>>;

    /// Exchange-reported pooled wallet for a strategy; the denominator for
    /// proportional allocation. External fact, read-only here.
    async fn strategy_wallet(&self, slot: StrategySlot) -> Result<Option<Decimal>>;

    /// Whether a user is subscribed to a strategy
    async fn is_subscribed(&self, user: &str, slot: StrategySlot) -> Result<bool> {
        Ok(self
            .get(user)
            .await?
            .map(|record| record.slot(slot).subscribed)
            .unwrap_or(false))
    }

    /// Number of strategies a user is subscribed to
    async fn active_strategy_count(&self, user: &str) -> Result<usize> {
        Ok(self
            .get(user)
            .await?
            .map(|record| record.active_count())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_slot_roundtrip_index() {
        for slot in StrategySlot::ALL {
            assert_eq!(StrategySlot::from_index(slot.index()), Some(slot));
        }
        assert_eq!(StrategySlot::from_index(0), None);
        assert_eq!(StrategySlot::from_index(5), None);
    }

    #[test]
    fn test_sub_account_labels() {
        assert_eq!(StrategySlot::Light.sub_account_label(), "Light CopyTrading");
        assert_eq!(
            StrategySlot::BtcTrendCatcher.sub_account_label(),
            "BTC Trend Catcher CopyTrading"
        );
    }

    #[test]
    fn test_lifecycle_state_transitions() {
        let mut state = SlotState::default();
        assert_eq!(state.lifecycle_state(), SlotLifecycleState::Unprovisioned);

        state.main_account_id = "1000".into();
        state.sub_account_id = "1000470".into();
        assert_eq!(
            state.lifecycle_state(),
            SlotLifecycleState::ProvisionedInactive
        );

        state.subscribed = true;
        assert_eq!(state.lifecycle_state(), SlotLifecycleState::Active);
    }

    #[test]
    fn test_update_merges_only_named_fields() {
        let mut state = SlotState {
            sub_account_id: "1000470".into(),
            capital: dec!(250),
            subscribed: true,
            ..Default::default()
        };

        let update = SlotUpdate {
            capital: Some(dec!(300)),
            ..Default::default()
        };
        update.apply(&mut state);

        assert_eq!(state.capital, dec!(300));
        assert_eq!(state.sub_account_id, "1000470");
        assert!(state.subscribed);
    }

    #[test]
    fn test_reset_retains_account_identifiers() {
        let mut state = SlotState {
            main_account_id: "1000".into(),
            sub_account_id: "1000470".into(),
            sub_account_name: "Light CopyTrading".into(),
            subscribed: true,
            capital: dec!(250),
            proportional: dec!(0.25),
            stop_loss: dec!(10),
            take_profit: dec!(20),
            subscribed_date: None,
        };

        SlotUpdate::reset(chrono::Utc::now()).apply(&mut state);

        assert_eq!(state.sub_account_id, "1000470");
        assert_eq!(state.main_account_id, "1000");
        assert!(!state.subscribed);
        assert_eq!(state.capital, Decimal::ZERO);
        assert_eq!(state.proportional, Decimal::ZERO);
        assert_eq!(state.stop_loss, Decimal::ZERO);
        assert_eq!(state.take_profit, Decimal::ZERO);
    }
}
