//! Disk size strings.
//!
//! Sizes are written as a decimal number with an optional unit suffix:
//! `M` (megabytes, the default), `G` (gigabytes) or `T` (terabytes).
//! Suffixes are upper case only.

use core::fmt;
use core::str::FromStr;

use crate::error::{Error, Result};

const MB_PER_GB: f64 = 1024.0;
const MB_PER_TB: f64 = 1024.0 * 1024.0;

/// Disk size in megabytes, always greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiskSize(i64);

impl DiskSize {
    /// Create from megabytes.
    pub fn from_mb(mb: i64) -> Result<Self> {
        if mb > 0 {
            Ok(Self(mb))
        } else {
            Err(Error::InvalidSize(mb))
        }
    }

    /// Get value in megabytes.
    pub fn as_mb(&self) -> i64 {
        self.0
    }
}

impl FromStr for DiskSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_mb(parse_size_mb(s)?)
    }
}

impl fmt::Display for DiskSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1024 && self.0 % 1024 == 0 {
            write!(f, "{} GB", self.0 / 1024)
        } else {
            write!(f, "{} MB", self.0)
        }
    }
}

/// Parse a size string into a megabyte count.
///
/// `G` and `T` accept fractional values, which are truncated after scaling.
/// Plain and `M` values must be whole numbers. The result is not range
/// checked; use [`DiskSize`] for that.
pub fn parse_size_mb(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    let invalid = || Error::InvalidSizeFormat(input.to_string());

    let (numeral, scale) = match trimmed.as_bytes().last() {
        Some(b'M') => (&trimmed[..trimmed.len() - 1], None),
        Some(b'G') => (&trimmed[..trimmed.len() - 1], Some(MB_PER_GB)),
        Some(b'T') => (&trimmed[..trimmed.len() - 1], Some(MB_PER_TB)),
        _ => (trimmed, None),
    };

    if !is_decimal_numeral(numeral) {
        return Err(invalid());
    }

    match scale {
        None => numeral.parse::<i64>().map_err(|_| invalid()),
        Some(factor) => {
            let value = numeral.parse::<f64>().map_err(|_| invalid())? * factor;
            if !value.is_finite() || value.abs() >= i64::MAX as f64 {
                return Err(invalid());
            }
            Ok(value.trunc() as i64)
        }
    }
}

// Digits with at most one decimal point and an optional leading minus sign.
fn is_decimal_numeral(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty()
        && digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_size_mb("100").unwrap(), 100);
        assert_eq!(parse_size_mb("100M").unwrap(), 100);
        assert_eq!(parse_size_mb("1G").unwrap(), 1024);
        assert_eq!(parse_size_mb("2T").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size_mb(" 50 ").unwrap(), 50);
    }

    #[test]
    fn test_parse_fractional() {
        assert_eq!(parse_size_mb("1.5G").unwrap(), 1536);
        assert_eq!(parse_size_mb("0.001G").unwrap(), 1);
        assert_eq!(parse_size_mb("0.5T").unwrap(), 512 * 1024);
        assert!(matches!(
            parse_size_mb("1.5M"),
            Err(Error::InvalidSizeFormat(_))
        ));
        assert!(matches!(
            parse_size_mb("1.5"),
            Err(Error::InvalidSizeFormat(_))
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "G", "abc", "10K", "1g", "10 G", "1..5G", "1e3G", "inf", "--1"] {
            assert!(
                matches!(parse_size_mb(input), Err(Error::InvalidSizeFormat(_))),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_disk_size_must_be_positive() {
        assert!(matches!("0".parse::<DiskSize>(), Err(Error::InvalidSize(0))));
        assert!(matches!("-5G".parse::<DiskSize>(), Err(Error::InvalidSize(-5120))));
        assert!(matches!(
            "0.0001G".parse::<DiskSize>(),
            Err(Error::InvalidSize(0))
        ));
        assert_eq!("1G".parse::<DiskSize>().unwrap().as_mb(), 1024);
    }

    #[test]
    fn test_disk_size_display() {
        assert_eq!(DiskSize::from_mb(2048).unwrap().to_string(), "2 GB");
        assert_eq!(DiskSize::from_mb(100).unwrap().to_string(), "100 MB");
    }
}
