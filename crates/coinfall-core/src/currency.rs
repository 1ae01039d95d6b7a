//! Currency records tracked for each live currency entity

use crate::time::Millis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a currency drop came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CurrencySource {
    /// Dropped by a creature killed by a player
    Mob,
    /// Dropped by a broken block
    Block,
    #[default]
    Unknown,
}

impl CurrencySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurrencySource::Mob => "MOB",
            CurrencySource::Block => "BLOCK",
            CurrencySource::Unknown => "UNKNOWN",
        }
    }

    /// Lenient parse; anything unrecognised is `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "MOB" => CurrencySource::Mob,
            "BLOCK" => CurrencySource::Block,
            _ => CurrencySource::Unknown,
        }
    }
}

impl fmt::Display for CurrencySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry bookkeeping for one currency entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRecord {
    /// When the entity was registered
    pub spawned_at: Millis,
    /// Always greater than zero
    pub amount: u32,
    pub source: CurrencySource,
    /// Last name visibility pushed to the world
    pub name_visible: bool,
}

impl CurrencyRecord {
    pub fn new(spawned_at: Millis, amount: u32, source: CurrencySource) -> Self {
        Self {
            spawned_at,
            amount,
            source,
            name_visible: false,
        }
    }

    /// Age at `now`, never negative
    pub fn age(&self, now: Millis) -> Millis {
        (now - self.spawned_at).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parse() {
        assert_eq!(CurrencySource::parse("MOB"), CurrencySource::Mob);
        assert_eq!(CurrencySource::parse("block"), CurrencySource::Block);
        assert_eq!(CurrencySource::parse("chest"), CurrencySource::Unknown);
        assert_eq!(CurrencySource::Block.to_string(), "BLOCK");
    }

    #[test]
    fn test_record_age() {
        let record = CurrencyRecord::new(1_000, 5, CurrencySource::Mob);
        assert_eq!(record.age(4_000), 3_000);
        assert_eq!(record.age(500), 0);
        assert!(!record.name_visible);
    }
}
