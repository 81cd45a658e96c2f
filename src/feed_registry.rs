//! # Feed Registry
//!
//! Immutable table of Chainlink feeds loaded once from the metadata CSV.
//!
//! Loading is row-tolerant: a row that fails validation is skipped and its
//! reason recorded, the rest of the file still loads. After construction the
//! registry is never mutated, so it is shared behind an `Arc` without locks.

use log::{info, warn};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{FeedError, ValidationError};
use crate::types::feed::{normalize_symbol, parse_address, AssetClass, FeedDescriptor, ProductType};

/// Column layout of the metadata file. Every column is optional at the serde
/// level so that a missing value is reported as a validation failure of that
/// row instead of aborting the whole read.
#[derive(Debug, Default, Deserialize)]
struct FeedRow {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    contract_address: Option<String>,
    #[serde(default)]
    proxy_address: Option<String>,
    #[serde(default)]
    decimals: Option<String>,
    #[serde(default)]
    deviation_threshold: Option<String>,
    #[serde(default)]
    heartbeat: Option<String>,
    #[serde(default)]
    asset_class: Option<String>,
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    base_asset: Option<String>,
    #[serde(default)]
    quote_asset: Option<String>,
}

/// A row left out of the registry, with its 1-based data row number.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: ValidationError,
}

#[derive(Debug, Clone, Default)]
pub struct FeedRegistry {
    feeds: Vec<FeedDescriptor>,
    skipped: Vec<SkippedRow>,
}

impl FeedRegistry {
    /// Loads the metadata file at `path`. Only an unreadable file fails; bad
    /// rows are skipped.
    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            FeedError::Registry(format!("Feed data file not found: {} ({})", path.display(), e))
        })?;
        let registry = Self::load(file)?;
        info!(
            "📊 Loaded {} feeds from {} ({} rows skipped)",
            registry.len(),
            path.display(),
            registry.skipped.len()
        );
        Ok(registry)
    }

    pub fn load<R: Read>(source: R) -> Result<Self, FeedError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        // A header that cannot be read means there is no table at all.
        reader
            .headers()
            .map_err(|e| FeedError::Registry(format!("Invalid feed data header: {}", e)))?;

        let mut feeds: Vec<FeedDescriptor> = Vec::new();
        let mut skipped = Vec::new();
        let mut symbols = HashSet::new();
        let mut proxies = HashSet::new();

        for (index, record) in reader.deserialize::<FeedRow>().enumerate() {
            let row = index + 1;
            let parsed = record
                .map_err(|e| ValidationError::Malformed(e.to_string()))
                .and_then(validate_row)
                .and_then(|feed| {
                    if symbols.contains(&feed.symbol) {
                        return Err(ValidationError::DuplicateSymbol(feed.symbol));
                    }
                    if proxies.contains(&feed.proxy_address) {
                        return Err(ValidationError::DuplicateAddress(format!(
                            "{:?}",
                            feed.proxy_address
                        )));
                    }
                    Ok(feed)
                });

            match parsed {
                Ok(feed) => {
                    symbols.insert(feed.symbol.clone());
                    proxies.insert(feed.proxy_address);
                    feeds.push(feed);
                }
                Err(reason) => {
                    warn!("Skipping invalid feed data at row {}: {}", row, reason);
                    skipped.push(SkippedRow { row, reason });
                }
            }
        }

        Ok(Self { feeds, skipped })
    }

    /// Builds a registry from already validated descriptors, keeping order.
    pub fn from_feeds(feeds: Vec<FeedDescriptor>) -> Self {
        Self {
            feeds,
            skipped: Vec::new(),
        }
    }

    /// First feed matching `identifier` by symbol, normalized display name, or
    /// verbatim display name.
    pub fn lookup(&self, identifier: &str) -> Option<&FeedDescriptor> {
        self.feeds.iter().find(|feed| feed.matches(identifier))
    }

    /// All feeds in file order.
    pub fn all(&self) -> &[FeedDescriptor] {
        &self.feeds
    }

    pub fn reserve_feeds(&self) -> Vec<FeedDescriptor> {
        self.feeds
            .iter()
            .filter(|feed| feed.is_reserve_feed())
            .cloned()
            .collect()
    }

    pub fn skipped(&self) -> &[SkippedRow] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn validate_row(row: FeedRow) -> Result<FeedDescriptor, ValidationError> {
    let fields: [(&'static str, &Option<String>); 10] = [
        ("name", &row.name),
        ("contract_address", &row.contract_address),
        ("proxy_address", &row.proxy_address),
        ("decimals", &row.decimals),
        ("deviation_threshold", &row.deviation_threshold),
        ("heartbeat", &row.heartbeat),
        ("asset_class", &row.asset_class),
        ("product_name", &row.product_name),
        ("base_asset", &row.base_asset),
        ("quote_asset", &row.quote_asset),
    ];
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| required(value).is_none())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    // All present past this point.
    let text = |value: &Option<String>| required(value).unwrap_or_default().to_string();

    let decimals = parse_int("decimals", &text(&row.decimals))?;
    if !(0..=18).contains(&decimals) {
        return Err(ValidationError::DecimalsOutOfRange(decimals));
    }
    let heartbeat = parse_int("heartbeat", &text(&row.heartbeat))?;
    if heartbeat <= 0 {
        return Err(ValidationError::NonPositiveHeartbeat(heartbeat));
    }
    let deviation_threshold = parse_float("deviation_threshold", &text(&row.deviation_threshold))?;
    if deviation_threshold < 0.0 {
        return Err(ValidationError::NegativeDeviation(deviation_threshold));
    }

    let name = text(&row.name);
    let symbol = normalize_symbol(&name);
    if symbol.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }

    Ok(FeedDescriptor {
        symbol,
        contract_address: parse_address(&text(&row.contract_address))?,
        proxy_address: parse_address(&text(&row.proxy_address))?,
        decimals: decimals as u8,
        deviation_threshold,
        heartbeat: heartbeat as u64,
        asset_class: text(&row.asset_class).parse::<AssetClass>()?,
        product_type: ProductType::from(text(&row.product_name).as_str()),
        base_asset: text(&row.base_asset),
        quote_asset: text(&row.quote_asset),
        name,
    })
}

fn parse_int(field: &'static str, value: &str) -> Result<i64, ValidationError> {
    value.parse::<i64>().map_err(|_| ValidationError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_float(field: &'static str, value: &str) -> Result<f64, ValidationError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}
