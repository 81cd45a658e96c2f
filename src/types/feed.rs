use ethers::types::Address;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Asset classes a Chainlink feed can be listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AssetClass {
    Crypto,
    Commodities,
    #[serde(rename = "FX")]
    Fx,
    Rates,
}

impl FromStr for AssetClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crypto" => Ok(Self::Crypto),
            "commodities" => Ok(Self::Commodities),
            "fx" => Ok(Self::Fx),
            "rates" => Ok(Self::Rates),
            _ => Err(ValidationError::UnknownAssetClass(s.to_string())),
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Crypto => "Crypto",
            Self::Commodities => "Commodities",
            Self::Fx => "FX",
            Self::Rates => "Rates",
        };
        f.write_str(s)
    }
}

/// Chainlink product line of a feed. Unlisted product names are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductType {
    PriceFeed,
    ProofOfReserve,
    EmergencyCount,
    Other(String),
}

impl ProductType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::PriceFeed => "Price Feed",
            Self::ProofOfReserve => "Proof of Reserve",
            Self::EmergencyCount => "Emergency Count",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for ProductType {
    fn from(s: &str) -> Self {
        match s.trim() {
            "Price Feed" => Self::PriceFeed,
            "Proof of Reserve" => Self::ProofOfReserve,
            "Emergency Count" => Self::EmergencyCount,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for ProductType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One validated row of the feed metadata table. Identity is `symbol`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedDescriptor {
    pub name: String,
    pub symbol: String,
    pub contract_address: Address,
    /// The address actually queried for round data.
    pub proxy_address: Address,
    pub decimals: u8,
    pub deviation_threshold: f64,
    pub heartbeat: u64,
    pub asset_class: AssetClass,
    #[serde(rename = "productName")]
    pub product_type: ProductType,
    pub base_asset: String,
    pub quote_asset: String,
}

impl FeedDescriptor {
    pub fn is_reserve_feed(&self) -> bool {
        self.product_type == ProductType::ProofOfReserve
    }

    /// True when `identifier` names this feed by symbol, by normalized display
    /// name, or by the display name verbatim.
    pub fn matches(&self, identifier: &str) -> bool {
        let wanted = normalize_symbol(identifier);
        self.symbol == wanted || normalize_symbol(&self.name) == wanted || self.name == identifier
    }
}

/// Canonical symbol form: whitespace and `/` removed, upper-cased.
///
/// `"BTC / USD"`, `"btc/usd"` and `" BTCUSD "` all map to `"BTCUSD"`.
pub fn normalize_symbol(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '/')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Checks the textual address form accepted in metadata: 42 chars, `0x`
/// prefix, hex body. Case is not significant.
pub fn is_valid_address(value: &str) -> bool {
    value.len() == 42
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

pub fn parse_address(value: &str) -> Result<Address, ValidationError> {
    let trimmed = value.trim();
    if !is_valid_address(trimmed) {
        return Err(ValidationError::InvalidAddress(value.to_string()));
    }
    Address::from_str(trimmed).map_err(|_| ValidationError::InvalidAddress(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_separators_and_spaces() {
        assert_eq!(normalize_symbol("BTC / USD"), "BTCUSD");
        assert_eq!(normalize_symbol("btc/usd"), "BTCUSD");
        assert_eq!(normalize_symbol(" BTC / USD "), "BTCUSD");
        assert_eq!(normalize_symbol("BTCUSD"), "BTCUSD");
        assert_eq!(normalize_symbol("sAVAX / AVAX Exchange Rate"), "SAVAXAVAXEXCHANGERATE");
    }

    #[test]
    fn address_validation() {
        assert!(is_valid_address("0x0A77230d17318075983913bC2145DB16C7366156"));
        assert!(!is_valid_address("0A77230d17318075983913bC2145DB16C7366156"));
        assert!(!is_valid_address("0x0A77230d17318075983913bC2145DB16C736615"));
        assert!(!is_valid_address("0xZZ77230d17318075983913bC2145DB16C7366156"));
    }

    #[test]
    fn parsed_addresses_serialize_lowercase() {
        let addr = parse_address("0x0A77230d17318075983913bC2145DB16C7366156").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x0a77230d17318075983913bc2145db16c7366156\"");
    }

    #[test]
    fn asset_class_parsing_is_case_insensitive() {
        assert_eq!("FX".parse::<AssetClass>().unwrap(), AssetClass::Fx);
        assert_eq!("crypto".parse::<AssetClass>().unwrap(), AssetClass::Crypto);
        assert!("Equities".parse::<AssetClass>().is_err());
    }

    #[test]
    fn product_type_keeps_unknown_names() {
        assert_eq!(ProductType::from("Proof of Reserve"), ProductType::ProofOfReserve);
        assert_eq!(ProductType::from("NAV").as_str(), "NAV");
    }
}
