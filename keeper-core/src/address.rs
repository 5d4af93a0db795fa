use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// 20-byte account address.
///
/// Ordering is byte-wise, which is the same as comparing the lower-case hex
/// forms. Weighted pools register their assets in this order.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

impl Address {
  /// Placeholder meaning "no address"; oracle neighbor hints use it to let the
  /// contract find the insert position itself.
  pub const ZERO: Address = Address([0; 20]);

  #[must_use]
  pub const fn new(bytes: [u8; 20]) -> Address {
    Address(bytes)
  }
}

impl FromStr for Address {
  type Err = CoreError;

  fn from_str(s: &str) -> Result<Address, CoreError> {
    let digits = s
      .strip_prefix("0x")
      .or_else(|| s.strip_prefix("0X"))
      .unwrap_or(s);
    let bytes = hex::decode(digits)
      .map_err(|_| CoreError::InvalidAddress(s.to_string()))?;
    let array = <[u8; 20]>::try_from(bytes.as_slice())
      .map_err(|_| CoreError::InvalidAddress(s.to_string()))?;
    Ok(Address(array))
  }
}

impl Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "0x{}", hex::encode(self.0))
  }
}

impl Debug for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    Display::fmt(self, f)
  }
}

impl Serialize for Address {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Address {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Address, D::Error> {
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
  }
}
