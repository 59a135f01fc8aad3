//! Memory sizes and the units LSF expresses limits in.
//!
//! Jobs request memory in megabytes, but `bsub -M` and `rusage[mem=..]` are
//! read in the cluster's `LSF_UNIT_FOR_LIMITS` (KB unless configured).

use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static MEMORY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<size>[0-9]*\.?[0-9]+)\s*(?P<unit>[KMGTPEZ]?B?)$")
        .expect("constant regex pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Invalid memory unit suffix {0:?}. Valid suffixes are B, KB, MB, GB, TB, PB, EB, ZB")]
    InvalidSuffix(String),
    #[error("Invalid memory unit power {0}. Valid powers are 0 to 7")]
    InvalidPower(u32),
    #[error("Invalid memory string {0:?}")]
    InvalidString(String),
}

/// Memory unit, from bytes to zettabytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Unit {
    #[default]
    Bytes,
    Kilo,
    Mega,
    Giga,
    Tera,
    Peta,
    Exa,
    Zetta,
}

impl Unit {
    pub const ALL: [Unit; 8] = [
        Unit::Bytes,
        Unit::Kilo,
        Unit::Mega,
        Unit::Giga,
        Unit::Tera,
        Unit::Peta,
        Unit::Exa,
        Unit::Zetta,
    ];

    /// Exponent of the unit's multiple: 0 for bytes, 1 for kilo, ...
    pub fn power(self) -> u32 {
        self as u32
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Unit::Bytes => "B",
            Unit::Kilo => "KB",
            Unit::Mega => "MB",
            Unit::Giga => "GB",
            Unit::Tera => "TB",
            Unit::Peta => "PB",
            Unit::Exa => "EB",
            Unit::Zetta => "ZB",
        }
    }

    pub fn from_power(power: u32) -> Result<Self, MemoryError> {
        Self::ALL
            .get(power as usize)
            .copied()
            .ok_or(MemoryError::InvalidPower(power))
    }

    /// Multiplier from this unit to bytes, in powers of 1000 or 1024.
    fn multiplier(self, decimal: bool) -> f64 {
        let base: u128 = if decimal { 1000 } else { 1024 };
        base.pow(self.power()) as f64
    }
}

impl FromStr for Unit {
    type Err = MemoryError;

    /// Case-insensitive; the trailing `B` may be omitted (`K`, `mb`, `GB`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut suffix = s.trim().to_ascii_uppercase();
        if suffix.len() == 1 && suffix != "B" {
            suffix.push('B');
        }
        Self::ALL
            .into_iter()
            .find(|unit| unit.suffix() == suffix)
            .ok_or_else(|| MemoryError::InvalidSuffix(s.to_string()))
    }
}

impl TryFrom<String> for Unit {
    type Error = MemoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// An amount of memory. Two values are equal when they hold the same
/// number of (decimal) bytes, whatever their units.
#[derive(Debug, Clone, Copy)]
pub struct Memory {
    value: f64,
    unit: Unit,
}

impl Memory {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn bytes(&self, decimal: bool) -> f64 {
        self.value * self.unit.multiplier(decimal)
    }

    /// The same amount expressed in `unit`.
    pub fn to(&self, unit: Unit, decimal: bool) -> Memory {
        Memory::new(self.bytes(decimal) / unit.multiplier(decimal), unit)
    }
}

impl PartialEq for Memory {
    fn eq(&self, other: &Self) -> bool {
        self.bytes(true) == other.bytes(true)
    }
}

impl FromStr for Memory {
    type Err = MemoryError;

    /// Parse `500`, `500.8`, `500M`, `500 MB` or `500zb`. No suffix means bytes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MemoryError::InvalidString(s.to_string());
        let caps = MEMORY_PATTERN.captures(s.trim()).ok_or_else(invalid)?;
        let value: f64 = caps["size"].parse().map_err(|_| invalid())?;
        let unit = match &caps["unit"] {
            "" => Unit::Bytes,
            suffix => suffix.parse().map_err(|_| invalid())?,
        };
        Ok(Memory::new(value, unit))
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_from_suffix() {
        assert_eq!("B".parse::<Unit>(), Ok(Unit::Bytes));
        assert_eq!("GB".parse::<Unit>(), Ok(Unit::Giga));
        assert_eq!("mb".parse::<Unit>(), Ok(Unit::Mega));
        assert_eq!("k".parse::<Unit>(), Ok(Unit::Kilo));

        let err = "OB".parse::<Unit>().unwrap_err();
        assert!(err.to_string().contains("Valid suffixes are"));
    }

    #[test]
    fn test_unit_from_power() {
        assert_eq!(Unit::from_power(1), Ok(Unit::Kilo));
        assert_eq!(Unit::from_power(7), Ok(Unit::Zetta));
        let err = Unit::from_power(10).unwrap_err();
        assert!(err.to_string().contains("Valid powers are"));
    }

    #[test]
    fn test_unit_power_and_suffix() {
        assert_eq!(Unit::Mega.power(), 2);
        assert_eq!(Unit::Exa.suffix(), "EB");
    }

    #[test]
    fn test_bytes() {
        assert_eq!(Memory::new(40.0, Unit::Bytes).bytes(true), 40.0);
        assert_eq!(Memory::new(40.0, Unit::Mega).bytes(true), 40_000_000.0);
        assert_eq!(Memory::new(40.0, Unit::Kilo).bytes(false), 40_960.0);
        assert_eq!(Memory::new(0.5, Unit::Giga).bytes(true), 500_000_000.0);
        assert_eq!(Memory::new(500.0, Unit::Zetta).bytes(true), 5e23);
    }

    #[test]
    fn test_display() {
        assert_eq!(Memory::new(50.0, Unit::Kilo).to_string(), "50KB");
        assert_eq!(Memory::new(50.2, Unit::Zetta).to_string(), "50.2ZB");
    }

    #[test]
    fn test_equality_compares_bytes() {
        assert_eq!(Memory::new(50.0, Unit::Peta), Memory::new(50.0, Unit::Peta));
        assert_ne!(Memory::new(50.0, Unit::Peta), Memory::new(50.0, Unit::Kilo));
        assert_ne!(Memory::new(50.0, Unit::Peta), Memory::new(60.0, Unit::Peta));
        assert_eq!(Memory::new(500.0, Unit::Mega), Memory::new(0.5, Unit::Giga));
        assert_ne!(Memory::new(500.0, Unit::Kilo), Memory::new(0.5, Unit::Giga));
    }

    #[test]
    fn test_conversion() {
        let ten = Memory::new(10.0, Unit::Bytes);
        assert_eq!(ten.to(Unit::Bytes, true), Memory::new(10.0, Unit::Bytes));
        assert_eq!(ten.to(Unit::Kilo, true).unit(), Unit::Kilo);
        assert_eq!(
            Memory::new(30.0, Unit::Tera).to(Unit::Mega, true).value(),
            30_000_000.0
        );
        assert_eq!(
            Memory::new(30.0, Unit::Tera).to(Unit::Kilo, false).value(),
            32_212_254_720.0
        );
        assert_eq!(
            Memory::new(2662.0, Unit::Mega).to(Unit::Kilo, true).value(),
            2_662_000.0
        );
    }

    #[test]
    fn test_parse_memory() {
        assert_eq!("500".parse::<Memory>(), Ok(Memory::new(500.0, Unit::Bytes)));
        assert_eq!("500.8".parse::<Memory>(), Ok(Memory::new(500.8, Unit::Bytes)));
        assert_eq!("500M".parse::<Memory>(), Ok(Memory::new(500.0, Unit::Mega)));
        assert_eq!("500MB".parse::<Memory>(), Ok(Memory::new(500.0, Unit::Mega)));
        assert_eq!("500  MB".parse::<Memory>(), Ok(Memory::new(500.0, Unit::Mega)));
        assert_eq!("7B".parse::<Memory>(), Ok(Memory::new(7.0, Unit::Bytes)));
        assert_eq!(
            "500zb".parse::<Memory>().unwrap().bytes(true),
            Memory::new(500.0, Unit::Zetta).bytes(true)
        );
    }

    #[test]
    fn test_parse_memory_rejects_garbage() {
        for s in ["", "TB", "7LB", "7KBY"] {
            assert_eq!(
                s.parse::<Memory>(),
                Err(MemoryError::InvalidString(s.to_string())),
                "input {:?}",
                s
            );
        }
    }
}
