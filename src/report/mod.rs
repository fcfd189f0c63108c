//! Balance reconciliation reporter
//!
//! Read-side aggregation: live exchange balances per active sub-account,
//! P&L/ROI per strategy and in aggregate, and the dashboard pie chart.
//! A small deadband around zero suppresses cosmetic negative noise from
//! exchange fee and rounding artifacts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::common::errors::{ClientError, Result};
use crate::config::types::ReportConfig;
use crate::exchange::gateway::ExchangeGateway;
use crate::exchange::normalize;
use crate::store::{StrategySlot, SubscriptionRecord, SubscriptionStore};

/// Reporting parameters
#[derive(Debug, Clone)]
pub struct ReportSettings {
    /// Multiplier from the exchange reference currency to the display currency
    pub equity_fx_rate: Decimal,
    /// Absolute P&L deadband (also applied to the aggregate ROI)
    pub pnl_deadband: Decimal,
    /// Per-strategy ROI deadband in percentage points
    pub roi_deadband: Decimal,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            equity_fx_rate: dec!(1.08),
            pnl_deadband: dec!(3.0),
            roi_deadband: dec!(0.3),
        }
    }
}

impl ReportSettings {
    pub fn from_config(config: &ReportConfig) -> Result<Self> {
        let parse = |text: &str, field: &str| {
            text.parse::<Decimal>()
                .map_err(|e| ClientError::Configuration(format!("invalid {field}: {e}")))
        };
        Ok(Self {
            equity_fx_rate: parse(&config.equity_fx_rate, "report.equity_fx_rate")?,
            pnl_deadband: parse(&config.pnl_deadband, "report.pnl_deadband")?,
            roi_deadband: parse(&config.roi_deadband, "report.roi_deadband")?,
        })
    }
}

/// Clamp a value inside the (-deadband, 0) noise window to exactly zero.
///
/// Positive values and values at or below -deadband pass through unchanged.
pub fn clamp_deadband(value: Decimal, deadband: Decimal) -> Decimal {
    if value > -deadband && value < Decimal::ZERO {
        Decimal::ZERO
    } else {
        value
    }
}

/// Per-strategy slice of a user summary
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StrategyPerformance {
    pub strategy: String,
    pub capital_invested: Decimal,
    /// Live equity in display currency, floored at zero for display
    pub live_capital: Decimal,
    pub pnl: Decimal,
    /// ROI in percentage points
    pub roi: Decimal,
}

/// One pie-chart slice
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PieSlice {
    pub name: String,
    /// Share of total equity, percentage rounded to 2 decimals
    pub value: Decimal,
    pub fill: String,
}

/// Aggregated user dashboard payload
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserSummary {
    pub total_capital: Decimal,
    pub invested_capital: Decimal,
    pub pnl: Decimal,
    pub roi: Decimal,
    pub strategies: Vec<StrategyPerformance>,
    pub pie_chart: Vec<PieSlice>,
}

impl UserSummary {
    /// Summary for a user with no record or no active slots
    pub fn empty() -> Self {
        Self {
            total_capital: Decimal::ZERO,
            invested_capital: Decimal::ZERO,
            pnl: Decimal::ZERO,
            roi: Decimal::ZERO,
            strategies: StrategySlot::ALL
                .iter()
                .map(|slot| StrategyPerformance {
                    strategy: slot.label().to_string(),
                    capital_invested: Decimal::ZERO,
                    live_capital: Decimal::ZERO,
                    pnl: Decimal::ZERO,
                    roi: Decimal::ZERO,
                })
                .collect(),
            pie_chart: vec![no_algo_slice()],
        }
    }
}

/// Per-strategy row of the user stats export
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StrategyStats {
    pub strategy: String,
    pub sub_account_id: String,
    pub start_date: Option<DateTime<Utc>>,
    pub start_capital: Decimal,
    pub end_capital: Decimal,
    pub end_date: Option<DateTime<Utc>>,
}

/// One row of the all-users export feeding the CSV download
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserStats {
    pub account: String,
    pub main_account: String,
    pub strategies: Vec<StrategyStats>,
}

fn slot_fill(slot: StrategySlot) -> &'static str {
    match slot {
        StrategySlot::Light => "var(--blue-8)",
        StrategySlot::Investor => "var(--purple-8)",
        StrategySlot::BtcTrendCatcher => "var(--orange-8)",
        StrategySlot::XrpTrendCatcher => "var(--yellow-8)",
    }
}

fn no_algo_slice() -> PieSlice {
    PieSlice {
        name: "No algo active".to_string(),
        value: dec!(100),
        fill: "var(--blue-8)".to_string(),
    }
}

/// Equity share breakdown, rounded to 2 decimals; a single "No algo active"
/// slice when there is no equity to break down.
pub fn pie_chart(equities: &[(StrategySlot, Decimal)], total: Decimal) -> Vec<PieSlice> {
    if total <= Decimal::ZERO {
        return vec![no_algo_slice()];
    }
    equities
        .iter()
        .map(|(slot, equity)| PieSlice {
            name: slot.label().to_string(),
            value: ((equity / total) * dec!(100)).round_dp(2),
            fill: slot_fill(*slot).to_string(),
        })
        .collect()
}

/// Read-side reconciliation over live exchange balances
pub struct Reporter<S> {
    gateway: Arc<ExchangeGateway>,
    store: Arc<S>,
    settings: ReportSettings,
}

impl<S: SubscriptionStore> Reporter<S> {
    pub fn new(gateway: Arc<ExchangeGateway>, store: Arc<S>, settings: ReportSettings) -> Self {
        Self {
            gateway,
            store,
            settings,
        }
    }

    /// Dashboard summary for one user: live equity, P&L/ROI with deadband,
    /// aggregate totals and the pie chart.
    #[instrument(skip(self))]
    pub async fn user_summary(&self, user: &str) -> Result<UserSummary> {
        let record = match self.store.get(user).await? {
            Some(record) => record,
            None => return Ok(UserSummary::empty()),
        };

        let mut total_equity = Decimal::ZERO;
        let mut invested_capital = Decimal::ZERO;
        let mut equities = Vec::new();
        let mut strategies = Vec::new();

        for slot in StrategySlot::ALL {
            let state = record.slot(slot);
            let (equity, invested) = if state.main_account_id.is_empty() {
                (Decimal::ZERO, Decimal::ZERO)
            } else {
                let equity = self.live_equity(&state.sub_account_id).await?;
                (equity, state.capital)
            };

            total_equity += equity;
            invested_capital += invested;
            equities.push((slot, equity));

            let pnl = equity - invested;
            let roi = if invested.is_zero() {
                Decimal::ZERO
            } else {
                clamp_deadband((pnl / invested) * dec!(100), self.settings.roi_deadband)
            };
            strategies.push(StrategyPerformance {
                strategy: slot.label().to_string(),
                capital_invested: invested,
                live_capital: equity.max(Decimal::ZERO),
                pnl: clamp_deadband(pnl, self.settings.pnl_deadband),
                roi,
            });
        }

        let pnl = total_equity - invested_capital;
        let roi = if invested_capital.is_zero() {
            Decimal::ZERO
        } else {
            clamp_deadband(
                (pnl / invested_capital) * dec!(100),
                self.settings.pnl_deadband,
            )
        };

        Ok(UserSummary {
            total_capital: total_equity.max(Decimal::ZERO),
            invested_capital,
            pnl: clamp_deadband(pnl, self.settings.pnl_deadband),
            roi,
            strategies,
            pie_chart: pie_chart(&equities, total_equity),
        })
    }

    /// Per-strategy start/end capital rows for one user
    #[instrument(skip(self, record))]
    pub async fn user_stats(&self, record: &SubscriptionRecord) -> Result<UserStats> {
        let now = Utc::now();
        let mut main_account = String::new();
        let mut strategies = Vec::new();

        for slot in StrategySlot::ALL {
            let state = record.slot(slot);
            if state.main_account_id.is_empty() {
                strategies.push(StrategyStats {
                    strategy: slot.label().to_string(),
                    sub_account_id: String::new(),
                    start_date: None,
                    start_capital: Decimal::ZERO,
                    end_capital: Decimal::ZERO,
                    end_date: None,
                });
                continue;
            }

            let end_capital = self.live_equity(&state.sub_account_id).await?;
            main_account = state.main_account_id.clone();
            strategies.push(StrategyStats {
                strategy: slot.label().to_string(),
                sub_account_id: state.sub_account_id.clone(),
                start_date: state.subscribed_date,
                start_capital: state.capital,
                end_capital,
                end_date: Some(now),
            });
        }

        Ok(UserStats {
            account: record.user.clone(),
            main_account,
            strategies,
        })
    }

    /// Rows for every user; the export the CSV download endpoint serializes
    pub async fn all_users_stats(&self) -> Result<Vec<UserStats>> {
        let mut rows = Vec::new();
        for record in self.store.list_all().await? {
            rows.push(self.user_stats(&record).await?);
        }
        Ok(rows)
    }

    /// Live sub-account equity converted to the display currency
    async fn live_equity(&self, sub_account_id: &str) -> Result<Decimal> {
        let id: i64 = sub_account_id.parse().map_err(|_| {
            ClientError::DataInconsistency(format!("sub account id is not numeric: {sub_account_id:?}"))
        })?;
        let reply = self.gateway.get_balances(id).await?;
        let snapshot = normalize::balances_response(&reply);
        if !snapshot.accepted() {
            return Err(ClientError::exchange(snapshot.status_code, snapshot.error));
        }
        Ok(snapshot.equity_value()? * self.settings.equity_fx_rate)
    }
}
