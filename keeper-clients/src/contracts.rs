//! Contract registry: logical contract roles resolved to address and
//! interface pairs.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Arc;

use keeper_core::Address;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Contract interface description (ABI entries).
pub type Interface = Arc<Vec<Value>>;

/// Contracts the keeper talks to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContractRole {
  /// Reserve holding the assets that back the reserve token.
  Reserve,
  /// The reserve-backed token.
  ReserveToken,
  /// Stable token with an external fiat price, paired with the reserve token
  /// in the weighted pool.
  ReferenceToken,
  /// Pegged secondary currency.
  PeggedToken,
  /// Weighted pool vault holding pool balances.
  Vault,
  /// Weighted pool of reserve token against reference token.
  ReservePool,
  /// Swap entrypoint that also carries the ceiling multiplier.
  ProxyPool,
  /// Sorted linked-list oracle for the pegged exchange rate.
  SortedOracles,
  /// Reserve that backs the pegged currency.
  PegReserve,
  /// Per-token price oracle; addresses are discovered through the reserve.
  Oracle,
}

impl ContractRole {
  /// Key of the role in a registry document.
  #[must_use]
  pub fn name(self) -> &'static str {
    match self {
      ContractRole::Reserve => "Reserve",
      ContractRole::ReserveToken => "ReserveToken",
      ContractRole::ReferenceToken => "ReferenceToken",
      ContractRole::PeggedToken => "PeggedToken",
      ContractRole::Vault => "Vault",
      ContractRole::ReservePool => "ReservePool",
      ContractRole::ProxyPool => "ProxyPool",
      ContractRole::SortedOracles => "SortedOracles",
      ContractRole::PegReserve => "PegReserve",
      ContractRole::Oracle => "Oracle",
    }
  }
}

impl Display for ContractRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  #[error("Contract `{0}` is not in the registry.")]
  NotFound(String),
  #[error("Contract `{0}` has no address.")]
  AddressMissing(String),
  #[error("No interface found for contract `{0}`.")]
  InterfaceMissing(String),
  #[error("Contract `{name}` has an invalid address `{address}`.")]
  InvalidAddress { name: String, address: String },
}

/// A contract address together with its interface.
#[derive(Clone, Debug)]
pub struct ContractRef {
  pub role: ContractRole,
  pub address: Address,
  pub interface: Interface,
}

/// Resolves logical roles to deployed contracts.
pub trait ContractRegistry: Send + Sync {
  /// # Errors
  /// * `NotFound` if the role is absent
  /// * `AddressMissing` if the entry has no address
  /// * `InterfaceMissing` if no interface can be found
  fn resolve(&self, role: ContractRole) -> Result<ContractRef, RegistryError>;

  /// Interface for a role, without requiring an address.
  ///
  /// # Errors
  /// * `InterfaceMissing`
  fn interface(&self, role: ContractRole) -> Result<Interface, RegistryError>;

  /// Attaches a role's interface to an address discovered at runtime.
  ///
  /// # Errors
  /// * `InterfaceMissing`
  fn bind(
    &self,
    role: ContractRole,
    address: Address,
  ) -> Result<ContractRef, RegistryError> {
    Ok(ContractRef {
      role,
      address,
      interface: self.interface(role)?,
    })
  }
}

/// Where an entry's interface comes from.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum AbiSource {
  Inline(Vec<Value>),
  /// Name of an interface in the shared table, e.g. `ERC20`.
  Shared(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct ContractEntry {
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub abi: Option<AbiSource>,
}

/// Deployment document: `{ name, chainId, contracts: { <name>: entry } }`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDocument {
  pub name: String,
  pub chain_id: u64,
  pub contracts: HashMap<String, ContractEntry>,
}

/// Registry backed by a deployment document and a table of shared
/// interfaces.
#[derive(Clone, Debug)]
pub struct JsonContractRegistry {
  document: RegistryDocument,
  shared: HashMap<String, Interface>,
}

impl JsonContractRegistry {
  #[must_use]
  pub fn new(
    document: RegistryDocument,
    shared: HashMap<String, Vec<Value>>,
  ) -> JsonContractRegistry {
    let shared = shared
      .into_iter()
      .map(|(name, abi)| (name, Arc::new(abi)))
      .collect();
    JsonContractRegistry { document, shared }
  }

  /// Parses the deployment document and the shared interface table.
  ///
  /// # Errors
  /// * Malformed JSON
  pub fn from_json(
    document: &str,
    shared: &str,
  ) -> serde_json::Result<JsonContractRegistry> {
    Ok(JsonContractRegistry::new(
      serde_json::from_str(document)?,
      serde_json::from_str(shared)?,
    ))
  }

  #[must_use]
  pub fn chain_id(&self) -> u64 {
    self.document.chain_id
  }

  #[must_use]
  pub fn network(&self) -> &str {
    &self.document.name
  }

  fn shared_interface(&self, name: &str) -> Result<Interface, RegistryError> {
    self
      .shared
      .get(name)
      .cloned()
      .ok_or_else(|| RegistryError::InterfaceMissing(name.to_string()))
  }
}

impl ContractRegistry for JsonContractRegistry {
  fn resolve(&self, role: ContractRole) -> Result<ContractRef, RegistryError> {
    let name = role.name();
    let entry = self
      .document
      .contracts
      .get(name)
      .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
    let text = entry
      .address
      .as_deref()
      .filter(|a| !a.trim().is_empty())
      .ok_or_else(|| RegistryError::AddressMissing(name.to_string()))?;
    let address =
      text
        .parse::<Address>()
        .map_err(|_| RegistryError::InvalidAddress {
          name: name.to_string(),
          address: text.to_string(),
        })?;
    Ok(ContractRef {
      role,
      address,
      interface: self.interface(role)?,
    })
  }

  fn interface(&self, role: ContractRole) -> Result<Interface, RegistryError> {
    let name = role.name();
    match self.document.contracts.get(name).and_then(|e| e.abi.as_ref()) {
      Some(AbiSource::Inline(abi)) => Ok(Arc::new(abi.clone())),
      Some(AbiSource::Shared(alias)) => self.shared_interface(alias),
      None => self.shared_interface(name),
    }
  }
}
