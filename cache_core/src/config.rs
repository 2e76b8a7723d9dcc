use std::{fmt, ops::RangeInclusive};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bits::{is_pow2, log2};

pub const ACCESS_LATENCY_RANGE: RangeInclusive<u32> = 1..=10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{what} must be a power of 2, got {value}")]
    NotPowerOfTwo { what: &'static str, value: u32 },
    #[error("block size {line_bytes} exceeds {what} of {total_bytes} bytes")]
    LineLargerThanCache {
        what: &'static str,
        line_bytes: u32,
        total_bytes: u32,
    },
    #[error("cache access latency must be between 1 and 10 cycles, got {0}")]
    LatencyOutOfRange(u32),
    #[error("address width must be between 1 and 32 bits, got {0}")]
    AddressWidthOutOfRange(u32),
    #[error("{index_bits} index bits + {offset_bits} offset bits do not fit in a {width}-bit address")]
    GeometryExceedsAddress {
        index_bits: u32,
        offset_bits: u32,
        width: u32,
    },
}

/// Width of the addresses fed into a cache, in bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct AddressWidth(u32);

impl AddressWidth {
    pub const BITS_32: Self = Self(32);
    pub const BITS_30: Self = Self(30);

    pub fn new(bits: u32) -> Result<Self, ConfigError> {
        if (1..=32).contains(&bits) {
            Ok(Self(bits))
        } else {
            Err(ConfigError::AddressWidthOutOfRange(bits))
        }
    }
    pub fn bits(self) -> u32 {
        self.0
    }
    /// largest address representable in this width.
    pub fn max_address(self) -> u32 {
        crate::bits::mask_lower(self.0)
    }
}

impl Default for AddressWidth {
    fn default() -> Self {
        Self::BITS_32
    }
}

impl TryFrom<u32> for AddressWidth {
    type Error = ConfigError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::new(bits)
    }
}

impl From<AddressWidth> for u32 {
    fn from(w: AddressWidth) -> Self {
        w.0
    }
}

impl fmt::Display for AddressWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bits", self.0)
    }
}

/// Validated geometry of a single direct-mapped cache.
///
/// Only obtainable through [`CacheConfig::new`] or [`SimConfig::validate`], so
/// every `CacheConfig` satisfies the power-of-two and range rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    total_bytes: u32,
    line_bytes: u32,
    access_latency: u32,
    address_width: AddressWidth,
}

impl CacheConfig {
    pub fn new(
        total_bytes: u32,
        line_bytes: u32,
        access_latency: u32,
        address_width: AddressWidth,
    ) -> Result<Self, ConfigError> {
        Self::checked("cache size", total_bytes, line_bytes, access_latency, address_width)
    }

    fn checked(
        what: &'static str,
        total_bytes: u32,
        line_bytes: u32,
        access_latency: u32,
        address_width: AddressWidth,
    ) -> Result<Self, ConfigError> {
        if !is_pow2(total_bytes) {
            return Err(ConfigError::NotPowerOfTwo {
                what,
                value: total_bytes,
            });
        }
        if !is_pow2(line_bytes) {
            return Err(ConfigError::NotPowerOfTwo {
                what: "block size",
                value: line_bytes,
            });
        }
        if line_bytes > total_bytes {
            return Err(ConfigError::LineLargerThanCache {
                what,
                line_bytes,
                total_bytes,
            });
        }
        if !ACCESS_LATENCY_RANGE.contains(&access_latency) {
            return Err(ConfigError::LatencyOutOfRange(access_latency));
        }
        // index + offset bits == log2(total_bytes)
        let offset_bits = log2(line_bytes);
        let index_bits = log2(total_bytes) - offset_bits;
        if index_bits + offset_bits > address_width.bits() {
            return Err(ConfigError::GeometryExceedsAddress {
                index_bits,
                offset_bits,
                width: address_width.bits(),
            });
        }
        Ok(Self {
            total_bytes,
            line_bytes,
            access_latency,
            address_width,
        })
    }

    pub fn total_bytes(&self) -> u32 {
        self.total_bytes
    }
    pub fn line_bytes(&self) -> u32 {
        self.line_bytes
    }
    pub fn access_latency(&self) -> u32 {
        self.access_latency
    }
    pub fn address_width(&self) -> AddressWidth {
        self.address_width
    }
}

/// Configuration of a whole run: one instruction cache and one data cache
/// sharing block size, access latency and address width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    pub icache_bytes: u32,
    pub dcache_bytes: u32,
    pub line_bytes: u32,
    pub access_latency: u32,
    #[serde(default)]
    pub address_width: AddressWidth,
}

impl SimConfig {
    /// checks every constraint and returns `(instruction, data)` cache configs.
    pub fn validate(&self) -> Result<(CacheConfig, CacheConfig), ConfigError> {
        let icache = CacheConfig::checked(
            "instruction cache size",
            self.icache_bytes,
            self.line_bytes,
            self.access_latency,
            self.address_width,
        )?;
        let dcache = CacheConfig::checked(
            "data cache size",
            self.dcache_bytes,
            self.line_bytes,
            self.access_latency,
            self.address_width,
        )?;
        Ok((icache, dcache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(icache_bytes: u32, dcache_bytes: u32, line_bytes: u32, access_latency: u32) -> SimConfig {
        SimConfig {
            icache_bytes,
            dcache_bytes,
            line_bytes,
            access_latency,
            address_width: AddressWidth::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let (i, d) = sim(4096, 1024, 16, 5).validate().unwrap();
        assert_eq!(4096, i.total_bytes());
        assert_eq!(1024, d.total_bytes());
        assert_eq!(16, d.line_bytes());
        assert_eq!(5, i.access_latency());
        assert_eq!(AddressWidth::BITS_32, d.address_width());
    }

    #[test]
    fn test_line_equal_to_cache() {
        assert!(CacheConfig::new(64, 64, 1, AddressWidth::default()).is_ok());
    }

    #[test]
    fn test_rejects_non_pow2() {
        assert_eq!(
            Err(ConfigError::NotPowerOfTwo {
                what: "data cache size",
                value: 3000
            }),
            sim(4096, 3000, 16, 5).validate()
        );
        assert_eq!(
            Err(ConfigError::NotPowerOfTwo {
                what: "block size",
                value: 12
            }),
            sim(4096, 4096, 12, 5).validate()
        );
        assert!(matches!(
            sim(0, 4096, 16, 5).validate(),
            Err(ConfigError::NotPowerOfTwo { value: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_line_larger_than_cache() {
        assert!(matches!(
            sim(4096, 32, 64, 5).validate(),
            Err(ConfigError::LineLargerThanCache {
                what: "data cache size",
                line_bytes: 64,
                total_bytes: 32
            })
        ));
    }

    #[test]
    fn test_latency_bounds() {
        assert_eq!(
            Err(ConfigError::LatencyOutOfRange(0)),
            sim(64, 64, 4, 0).validate()
        );
        assert_eq!(
            Err(ConfigError::LatencyOutOfRange(11)),
            sim(64, 64, 4, 11).validate()
        );
        assert!(sim(64, 64, 4, 1).validate().is_ok());
        assert!(sim(64, 64, 4, 10).validate().is_ok());
    }

    #[test]
    fn test_address_width() {
        assert!(AddressWidth::new(0).is_err());
        assert!(AddressWidth::new(33).is_err());
        assert_eq!(0x3FFF_FFFF, AddressWidth::BITS_30.max_address());
        assert_eq!(u32::MAX, AddressWidth::BITS_32.max_address());
        let narrow = AddressWidth::new(8).unwrap();
        assert_eq!(
            Err(ConfigError::GeometryExceedsAddress {
                index_bits: 6,
                offset_bits: 4,
                width: 8
            }),
            CacheConfig::new(1024, 16, 1, narrow)
        );
    }

    #[test]
    fn test_deserialize() {
        let c: SimConfig = serde_json::from_str(
            r#"{"icache_bytes": 256, "dcache_bytes": 512, "line_bytes": 8, "access_latency": 3}"#,
        )
        .unwrap();
        assert_eq!(sim(256, 512, 8, 3), c);
        let c: SimConfig = serde_json::from_str(
            r#"{"icache_bytes": 256, "dcache_bytes": 512, "line_bytes": 8, "access_latency": 3, "address_width": 30}"#,
        )
        .unwrap();
        assert_eq!(AddressWidth::BITS_30, c.address_width);
        assert!(serde_json::from_str::<SimConfig>(
            r#"{"icache_bytes": 256, "dcache_bytes": 512, "line_bytes": 8, "access_latency": 3, "address_width": 64}"#,
        )
        .is_err());
    }
}
