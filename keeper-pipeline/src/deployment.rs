use keeper_clients::contracts::{
  ContractRef, ContractRegistry, ContractRole, RegistryError,
};
use keeper_core::pool::TokenPair;

/// Every contract a cycle touches, resolved once at cycle start.
#[derive(Clone, Debug)]
pub struct DeployedContracts {
  pub reserve: ContractRef,
  pub reserve_token: ContractRef,
  pub reference_token: ContractRef,
  pub pegged_token: ContractRef,
  pub vault: ContractRef,
  pub reserve_pool: ContractRef,
  pub proxy_pool: ContractRef,
  pub sorted_oracles: ContractRef,
  pub peg_reserve: ContractRef,
}

impl DeployedContracts {
  /// # Errors
  /// * Any role fails to resolve
  pub fn resolve(
    registry: &dyn ContractRegistry,
  ) -> Result<DeployedContracts, RegistryError> {
    Ok(DeployedContracts {
      reserve: registry.resolve(ContractRole::Reserve)?,
      reserve_token: registry.resolve(ContractRole::ReserveToken)?,
      reference_token: registry.resolve(ContractRole::ReferenceToken)?,
      pegged_token: registry.resolve(ContractRole::PeggedToken)?,
      vault: registry.resolve(ContractRole::Vault)?,
      reserve_pool: registry.resolve(ContractRole::ReservePool)?,
      proxy_pool: registry.resolve(ContractRole::ProxyPool)?,
      sorted_oracles: registry.resolve(ContractRole::SortedOracles)?,
      peg_reserve: registry.resolve(ContractRole::PegReserve)?,
    })
  }

  /// Reserve token priced against the reference token.
  #[must_use]
  pub fn pair(&self) -> TokenPair {
    TokenPair {
      priced: self.reserve_token.address,
      reference: self.reference_token.address,
    }
  }
}
