//! In-memory subscription store
//!
//! Backs the `SubscriptionStore` trait with a map guarded by an async
//! RwLock. Useful for tests and single-instance deployments; a document
//! database implementation plugs in behind the same trait.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{SlotUpdate, StrategySlot, SubscriptionRecord, SubscriptionStore};
use crate::common::errors::{ClientError, Result};

#[derive(Debug, Default)]
pub struct InMemorySubscriptionStore {
    records: RwLock<HashMap<String, SubscriptionRecord>>,
    wallets: RwLock<HashMap<StrategySlot, Decimal>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pooled wallet snapshot for a strategy
    pub async fn set_strategy_wallet(&self, slot: StrategySlot, wallet: Decimal) {
        self.wallets.write().await.insert(slot, wallet);
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get(&self, user: &str) -> Result<Option<SubscriptionRecord>> {
        Ok(self.records.read().await.get(user).cloned())
    }

    async fn create_default(&self, user: &str) -> Result<SubscriptionRecord> {
        let mut records = self.records.write().await;
        let record = records
            .entry(user.to_string())
            .or_insert_with(|| SubscriptionRecord::new_default(user));
        Ok(record.clone())
    }

    async fn set_slot_fields(
        &self,
        user: &str,
        slot: StrategySlot,
        update: SlotUpdate,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(user)
            .ok_or_else(|| ClientError::Store(format!("unknown user: {user}")))?;
        update.apply(record.slot_mut(slot));
        Ok(())
    }

    async fn list_subscribers(&self, slot: StrategySlot) -> Result<Vec<String>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.slot(slot).subscribed)
            .map(|record| record.user.clone())
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<SubscriptionRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn strategy_wallet(&self, slot: StrategySlot) -> Result<Option<Decimal>> {
        Ok(self.wallets.read().await.get(&slot).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_create_default_is_idempotent() {
        let store = InMemorySubscriptionStore::new();

        let first = store.create_default("alice@example.com").await.unwrap();
        store
            .set_slot_fields(
                "alice@example.com",
                StrategySlot::Light,
                SlotUpdate {
                    sub_account_id: Some("1000470".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // A second create must not wipe the existing record
        let second = store.create_default("alice@example.com").await.unwrap();
        assert_eq!(first.user, second.user);
        assert_eq!(second.slot(StrategySlot::Light).sub_account_id, "1000470");
    }

    #[tokio::test]
    async fn test_set_slot_fields_unknown_user() {
        let store = InMemorySubscriptionStore::new();
        let result = store
            .set_slot_fields("nobody", StrategySlot::Light, SlotUpdate::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_subscribers_filters_by_slot() {
        let store = InMemorySubscriptionStore::new();
        for user in ["a", "b", "c"] {
            store.create_default(user).await.unwrap();
        }
        for user in ["a", "c"] {
            store
                .set_slot_fields(
                    user,
                    StrategySlot::Investor,
                    SlotUpdate {
                        subscribed: Some(true),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let mut subscribers = store.list_subscribers(StrategySlot::Investor).await.unwrap();
        subscribers.sort();
        assert_eq!(subscribers, vec!["a".to_string(), "c".to_string()]);
        assert!(store
            .list_subscribers(StrategySlot::Light)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_active_strategy_count() {
        let store = InMemorySubscriptionStore::new();
        store.create_default("a").await.unwrap();
        assert_eq!(store.active_strategy_count("a").await.unwrap(), 0);

        for slot in [StrategySlot::Light, StrategySlot::XrpTrendCatcher] {
            store
                .set_slot_fields(
                    "a",
                    slot,
                    SlotUpdate {
                        subscribed: Some(true),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        assert_eq!(store.active_strategy_count("a").await.unwrap(), 2);
        assert!(store.is_subscribed("a", StrategySlot::Light).await.unwrap());
        assert!(!store.is_subscribed("a", StrategySlot::Investor).await.unwrap());
    }

    #[tokio::test]
    async fn test_strategy_wallet_snapshot() {
        let store = InMemorySubscriptionStore::new();
        assert_eq!(
            store.strategy_wallet(StrategySlot::Light).await.unwrap(),
            None
        );

        store
            .set_strategy_wallet(StrategySlot::Light, dec!(1000))
            .await;
        assert_eq!(
            store.strategy_wallet(StrategySlot::Light).await.unwrap(),
            Some(dec!(1000))
        );
    }
}
