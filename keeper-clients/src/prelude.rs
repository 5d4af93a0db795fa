pub use anyhow::Result;
pub use keeper_core::{Address, CoreError, FixedDecimal, U256};

pub use crate::chain::{ChainReader, PoolId};
pub use crate::contracts::{
  ContractRef, ContractRegistry, ContractRole, JsonContractRegistry,
  RegistryError,
};
pub use crate::notifier::{
  notify_best_effort, LogNotifier, Notifier, WebhookNotifier,
};
pub use crate::price_feed::{CoinGeckoClient, PriceFeed, StaticPriceFeed};
pub use crate::transaction::{
  send, ContractCall, Receipt, TransactionHandle, TransactionSubmitter, TxHash,
};
