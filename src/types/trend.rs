use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrendError;

/// Number of trend classes. Class indices are dense in `0..NUM_CLASSES`.
pub const NUM_CLASSES: usize = 3;

/// Three-way market trend label. The string and integer mappings live only
/// here; every component goes through this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendClass {
    Bearish,
    Stable,
    Bullish,
}

impl TrendClass {
    pub const ALL: [TrendClass; NUM_CLASSES] =
        [TrendClass::Bearish, TrendClass::Stable, TrendClass::Bullish];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendClass::Bearish => "Bearish",
            TrendClass::Stable => "Stable",
            TrendClass::Bullish => "Bullish",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            TrendClass::Bearish => 0,
            TrendClass::Stable => 1,
            TrendClass::Bullish => 2,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(TrendClass::Bearish),
            1 => Some(TrendClass::Stable),
            2 => Some(TrendClass::Bullish),
            _ => None,
        }
    }
}

impl FromStr for TrendClass {
    type Err = TrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Bearish" => Ok(TrendClass::Bearish),
            "Stable" => Ok(TrendClass::Stable),
            "Bullish" => Ok(TrendClass::Bullish),
            other => Err(TrendError::InputValidation(format!(
                "unknown trend label '{}' (expected Bearish, Stable or Bullish)",
                other
            ))),
        }
    }
}

impl fmt::Display for TrendClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for class in TrendClass::ALL {
            assert_eq!(class.as_str().parse::<TrendClass>().unwrap(), class);
            assert_eq!(TrendClass::from_index(class.index()), Some(class));
        }
    }

    #[test]
    fn test_index_mapping_is_fixed() {
        assert_eq!(TrendClass::Bearish.index(), 0);
        assert_eq!(TrendClass::Stable.index(), 1);
        assert_eq!(TrendClass::Bullish.index(), 2);
        assert_eq!(TrendClass::from_index(3), None);
    }

    #[test]
    fn test_unknown_label_rejected() {
        assert!("Sideways".parse::<TrendClass>().is_err());
        assert!("bullish".parse::<TrendClass>().is_err());
        assert!("".parse::<TrendClass>().is_err());
    }
}
