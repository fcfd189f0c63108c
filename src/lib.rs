//! CopyVault Library
//!
//! A Rust library for managing copy-trading strategy subscriptions:
//! sub-account provisioning and capital lifecycle on the exchange, plus
//! balance reconciliation reads for user dashboards.

pub mod common;
pub mod config;
pub mod exchange;
pub mod lifecycle;
pub mod report;
pub mod store;

// Re-export commonly used types
pub use common::errors::{ClientError, Result};
pub use config::types::AppConfig;
pub use exchange::gateway::{ExchangeGateway, LedgerOperation, OrderSide};
pub use exchange::normalize::{BalancesSnapshot, StandardResponse, SubAccountCreation};
pub use lifecycle::{LifecycleManager, StartOutcome, StartRequest, StopOutcome};
pub use report::{ReportSettings, Reporter, UserStats, UserSummary};

// Store types
pub use store::{
    InMemorySubscriptionStore, SlotLifecycleState, SlotState, SlotUpdate, StrategySlot,
    SubscriptionRecord, SubscriptionStore,
};
