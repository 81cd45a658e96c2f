//! Feed metadata, decoded readings and the derived views served to callers.

pub mod conversions;
pub mod feed;
pub mod reading;

pub use feed::{normalize_symbol, AssetClass, FeedDescriptor, ProductType};
pub use reading::{
    FeedDecimals, FeedDescription, FeedVersion, PriceEntry, RawReading, ReserveEntry, RoundData,
};
