use chrono::{SecondsFormat, TimeZone, Utc};
use ethers::types::{I256, U256};

/// Scales a raw feed answer by `10^decimals` into a float.
///
/// Goes through the decimal string representation so that answers wider than
/// 128 bits never pass through an intermediate integer cast. Precision beyond
/// what an `f64` holds is lost, which is accepted for display prices.
pub fn i256_div_10_pow(value: I256, decimals: u8) -> f64 {
    if value.is_zero() {
        return 0.0;
    }
    let magnitude = u256_div_10_pow(value.unsigned_abs(), decimals as u32);
    if value.is_negative() {
        -magnitude
    } else {
        magnitude
    }
}

// Safely divide a U256 by 10^decimals and return f64 without intermediate u128 casts.
pub fn u256_div_10_pow(value: U256, decimals: u32) -> f64 {
    if value.is_zero() {
        return 0.0;
    }
    let s = value.to_string();
    let len = s.len();
    let d = decimals as usize;
    let dec_str = if d == 0 {
        s
    } else if len <= d {
        let mut out = String::with_capacity(2 + d);
        out.push_str("0.");
        out.push_str(&"0".repeat(d - len));
        out.push_str(&s);
        out
    } else {
        let mut out = String::with_capacity(len + 1);
        out.push_str(&s[..len - d]);
        out.push('.');
        out.push_str(&s[len - d..]);
        out
    };
    dec_str.parse::<f64>().unwrap_or(0.0)
}

/// Unix seconds to an ISO-8601 string with a fixed `+00:00` offset.
///
/// The fixed offset keeps these strings lexically ordered in time, which the
/// reserve summary relies on.
pub fn unix_to_iso(seconds: u64) -> Option<String> {
    let secs = i64::try_from(seconds).ok()?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// Current wall-clock time, ISO-8601 with the same `+00:00` offset as `unix_to_iso`.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Overflow in conversion")]
    Overflow,
}

pub fn u256_to_u64(value: U256) -> Result<u64, ConversionError> {
    if value.bits() > 64 {
        return Err(ConversionError::Overflow);
    }
    Ok(value.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chainlink_price_scaling_8_decimals() {
        let answer = I256::from(250_000_000_000i64);
        let p = i256_div_10_pow(answer, 8);
        assert!((p - 2500.0).abs() < 1e-9, "price={}", p);
    }

    #[test]
    fn test_chainlink_price_scaling_18_decimals() {
        let answer = I256::from_raw(U256::from(3000u64) * U256::exp10(18));
        let p = i256_div_10_pow(answer, 18);
        assert!((p - 3000.0).abs() < 1e-6, "price={}", p);
    }

    #[test]
    fn negative_answers_keep_their_sign() {
        let p = i256_div_10_pow(I256::from(-150i64), 2);
        assert!((p + 1.5).abs() < 1e-12, "price={}", p);
    }

    #[test]
    fn small_answers_pad_leading_zeros() {
        let p = u256_div_10_pow(U256::from(5u64), 3);
        assert!((p - 0.005).abs() < 1e-12, "price={}", p);
    }

    #[test]
    fn zero_decimals_is_identity() {
        assert_eq!(u256_div_10_pow(U256::from(42u64), 0), 42.0);
    }

    #[test]
    fn iso_timestamps_use_fixed_utc_offset() {
        assert_eq!(unix_to_iso(0).as_deref(), Some("1970-01-01T00:00:00+00:00"));
        assert_eq!(
            unix_to_iso(1_700_000_000).as_deref(),
            Some("2023-11-14T22:13:20+00:00")
        );
        assert!(unix_to_iso(u64::MAX).is_none());
    }

    #[test]
    fn u256_to_u64_rejects_wide_values() {
        assert_eq!(u256_to_u64(U256::from(7u64)).unwrap(), 7);
        assert!(u256_to_u64(U256::from(u64::MAX) + U256::one()).is_err());
    }
}
