use keeper_clients::contracts::RegistryError;
use thiserror::Error;

/// Outcome of a cycle that did not succeed.
#[derive(Debug, Error)]
pub enum CycleError {
  #[error("A cycle is already in progress.")]
  CycleInProgress,
  #[error("Contract lookup failed: {0}")]
  Registry(#[from] RegistryError),
  #[error("Reserve token price unavailable: {0}")]
  DerivedPriceUnavailable(String),
  #[error("One or more services failed.")]
  ServicesFailed,
}
