//! Exchange integration: gateway, auth, and response normalization

pub mod auth;
pub mod gateway;
pub mod normalize;
pub mod payload;

pub use gateway::{ExchangeGateway, LedgerOperation, OrderSide};
pub use normalize::{BalancesSnapshot, StandardResponse, SubAccountCreation};
pub use payload::RawReply;
