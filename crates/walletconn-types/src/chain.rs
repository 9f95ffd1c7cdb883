//! Chain identifiers
//!
//! A [`RawChainId`] is whatever a wallet handed us. A [`ChainId`] is the
//! normalized, non-negative integer form. Chain id `0` means "disconnected".

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// A normalized chain identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    /// The chain id recorded while no connector is active.
    pub const DISCONNECTED: ChainId = ChainId(0);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub const fn is_disconnected(&self) -> bool {
        self.0 == 0
    }

    /// `0x`-prefixed lowercase hex, the form EIP-1193 providers use.
    pub fn to_hex(&self) -> String {
        format!("{:#x}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chain id exactly as a wallet reported it.
///
/// Deserializes untagged, so JSON `1`, `1.5` and `"0x1"` all land here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawChainId {
    Integer(u64),
    Number(f64),
    Text(String),
}

impl From<u64> for RawChainId {
    fn from(id: u64) -> Self {
        Self::Integer(id)
    }
}

impl From<f64> for RawChainId {
    fn from(id: f64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RawChainId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for RawChainId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

impl From<ChainId> for RawChainId {
    fn from(id: ChainId) -> Self {
        Self::Integer(id.0)
    }
}

impl std::fmt::Display for RawChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(id) => write!(f, "{}", id),
            Self::Number(id) => write!(f, "{}", id),
            Self::Text(id) => write!(f, "{}", id),
        }
    }
}

// 2^64, the first float that no longer fits in a u64
const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;

/// Normalize a wallet-reported chain id.
///
/// Strings with a `0x` prefix are parsed as hex, anything else as decimal.
/// A leading capital `O` in place of the zero (`"Ox1"`) is tolerated, as is
/// an upper-case `X`. Parsing stops at the first character that is not a
/// digit, and fails only when no digit precedes it; signs are not digits.
/// Numbers must be non-negative integers.
pub fn normalize_chain_id(raw: &RawChainId) -> Result<ChainId> {
    let invalid = || SessionError::InvalidChainId {
        value: raw.to_string(),
    };

    match raw {
        RawChainId::Integer(id) => Ok(ChainId(*id)),
        RawChainId::Number(id) => {
            if id.is_finite() && id.fract() == 0.0 && *id >= 0.0 && *id < U64_LIMIT {
                Ok(ChainId(*id as u64))
            } else {
                Err(invalid())
            }
        }
        RawChainId::Text(text) => {
            let text = text.trim();
            let (digits, radix) = match hex_digits(text) {
                Some(digits) => (digits, 16),
                None => (text, 10),
            };

            // Only the leading run of digits counts: "137abc" is 137.
            let end = digits
                .find(|c: char| !c.is_digit(radix))
                .unwrap_or(digits.len());
            if end == 0 {
                return Err(invalid());
            }

            u64::from_str_radix(&digits[..end], radix)
                .map(ChainId)
                .map_err(|_| invalid())
        }
    }
}

/// Strip a `0x` / `0X` / `Ox` / `OX` prefix, if present.
fn hex_digits(text: &str) -> Option<&str> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some('0' | 'O'), Some('x' | 'X')) => Some(&text[2..]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(raw: impl Into<RawChainId>) -> Result<ChainId> {
        normalize_chain_id(&raw.into())
    }

    #[test]
    fn test_hex_and_decimal_strings() {
        assert_eq!(normalize("0x1").unwrap(), ChainId(1));
        assert_eq!(normalize("0x89").unwrap(), ChainId(137));
        assert_eq!(normalize("137").unwrap(), ChainId(137));
        assert_eq!(normalize(" 42 ").unwrap(), ChainId(42));
    }

    #[test]
    fn test_metamask_mobile_prefix() {
        assert_eq!(normalize("Ox1").unwrap(), normalize("0x1").unwrap());
        assert_eq!(normalize("Ox1").unwrap(), ChainId(1));
        assert_eq!(normalize("0X2a").unwrap(), ChainId(42));
    }

    #[test]
    fn test_trailing_garbage_is_ignored() {
        assert_eq!(normalize("137abc").unwrap(), ChainId(137));
        assert_eq!(normalize("1.0").unwrap(), ChainId(1));
        assert_eq!(normalize("1.5").unwrap(), ChainId(1));
        assert_eq!(normalize("0x1g").unwrap(), ChainId(1));
        assert_eq!(normalize("Ox89 ").unwrap(), ChainId(137));
    }

    #[test]
    fn test_integers_pass_through() {
        assert_eq!(normalize(1u64).unwrap(), ChainId(1));
        assert_eq!(normalize(56.0).unwrap(), ChainId(56));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for raw in ["1", "0x1", "Ox89", "80001", "0xaa36a7"] {
            let once = normalize(raw).unwrap();
            let twice = normalize(once).unwrap();
            assert_eq!(once, twice, "normalizing {} twice changed it", raw);
        }
    }

    #[test]
    fn test_invalid_inputs() {
        for raw in ["abc", "", "0x", "0xzz", "-1", "+5", ".5"] {
            assert!(
                matches!(normalize(raw), Err(SessionError::InvalidChainId { .. })),
                "expected {:?} to be rejected",
                raw
            );
        }
        assert!(matches!(normalize(1.5), Err(SessionError::InvalidChainId { .. })));
        assert!(matches!(normalize(-3.0), Err(SessionError::InvalidChainId { .. })));
        assert!(matches!(normalize(f64::NAN), Err(SessionError::InvalidChainId { .. })));
    }

    #[test]
    fn test_invalid_error_carries_raw_value() {
        match normalize("abc") {
            Err(SessionError::InvalidChainId { value }) => assert_eq!(value, "abc"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_raw_chain_id_from_json() {
        let raw: RawChainId = serde_json::from_str("\"0x1\"").unwrap();
        assert_eq!(raw, RawChainId::Text("0x1".into()));
        let raw: RawChainId = serde_json::from_str("137").unwrap();
        assert_eq!(raw, RawChainId::Integer(137));
        let raw: RawChainId = serde_json::from_str("1.5").unwrap();
        assert_eq!(raw, RawChainId::Number(1.5));
    }

    #[test]
    fn test_chain_id_hex() {
        assert_eq!(ChainId(137).to_hex(), "0x89");
        assert!(ChainId::DISCONNECTED.is_disconnected());
    }
}
