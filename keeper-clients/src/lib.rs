//! # Keeper Clients
//!
//! Collaborator interfaces the keeper talks to: the contract registry, chain
//! reads, transaction submission, the fiat price feed and operator
//! notifications.
//!
//! ## Clients
//!
//! - [`JsonContractRegistry`](contracts::JsonContractRegistry) - Deployment
//!   document lookup by contract role
//! - [`CoinGeckoClient`](price_feed::CoinGeckoClient) - Fiat prices
//! - [`WebhookNotifier`](notifier::WebhookNotifier) - Operator alerts

pub mod chain;
pub mod contracts;
pub mod notifier;
pub mod prelude;
pub mod price_feed;
pub mod transaction;
