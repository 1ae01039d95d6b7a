//! Drop rules and the world filter
//!
//! Amounts are written by operators as `"min-max"` or `"n"`. Parsing is
//! lenient: a bound that fails to parse becomes 1, and so does a string
//! that is neither form.

use crate::config::{DropRuleConfig, DropsConfig, WorldsConfig};
use crate::{DropRng, WorldId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::warn;

/// Inclusive amount range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountRange {
    pub min: u32,
    pub max: u32,
}

impl AmountRange {
    pub fn new(min: u32, max: u32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn fixed(amount: u32) -> Self {
        Self::new(amount, amount)
    }

    /// Parse `"min-max"` or `"n"`
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.contains('-') {
            let parts: Vec<&str> = s.split('-').collect();
            if parts.len() == 2 {
                let min = parts[0].trim().parse().unwrap_or(1);
                let max = parts[1].trim().parse().unwrap_or(1);
                Self::new(min, max)
            } else {
                Self::fixed(1)
            }
        } else {
            Self::fixed(s.parse().unwrap_or(1))
        }
    }

    pub fn roll(&self, rng: &mut DropRng) -> u32 {
        rng.range_u32(self.min, self.max)
    }
}

impl fmt::Display for AmountRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

/// Amount and chance for one mob or block kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropRule {
    pub amount: AmountRange,
    /// Percent, values above 100 always drop
    pub chance: u32,
}

impl DropRule {
    /// Roll chance then amount; `None` when nothing drops
    pub fn roll(&self, rng: &mut DropRng) -> Option<u32> {
        if rng.roll_percent() > self.chance {
            return None;
        }
        let amount = self.amount.roll(rng);
        (amount > 0).then_some(amount)
    }
}

/// Drop rules for mobs and blocks with table-wide defaults
#[derive(Debug, Clone)]
pub struct DropTable {
    default_rule: DropRule,
    mobs: HashMap<String, DropRule>,
    blocks: HashMap<String, DropRule>,
}

impl DropTable {
    pub fn from_config(config: &DropsConfig) -> Self {
        let default_rule = DropRule {
            amount: AmountRange::parse(&config.default_amount),
            chance: config.default_chance,
        };
        let resolve = |rules: &HashMap<String, DropRuleConfig>| {
            rules
                .iter()
                .map(|(kind, rule)| {
                    let amount = rule
                        .amount
                        .as_deref()
                        .map(AmountRange::parse)
                        .unwrap_or(default_rule.amount);
                    let chance = rule.chance.unwrap_or(default_rule.chance);
                    (kind.to_lowercase(), DropRule { amount, chance })
                })
                .collect()
        };
        Self {
            default_rule,
            mobs: resolve(&config.mobs),
            blocks: resolve(&config.blocks),
        }
    }

    /// Rule for a mob kind, case-insensitive
    pub fn mob(&self, kind: &str) -> DropRule {
        self.mobs
            .get(&kind.to_lowercase())
            .copied()
            .unwrap_or(self.default_rule)
    }

    /// Rule for a block kind, case-insensitive
    pub fn block(&self, kind: &str) -> DropRule {
        self.blocks
            .get(&kind.to_lowercase())
            .copied()
            .unwrap_or(self.default_rule)
    }
}

/// Which worlds the plugin reacts in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldFilter {
    All,
    Whitelist(HashSet<String>),
    Blacklist(HashSet<String>),
}

impl WorldFilter {
    pub fn from_config(config: &WorldsConfig) -> Self {
        let list = || config.list.iter().cloned().collect::<HashSet<_>>();
        match config.mode.to_lowercase().as_str() {
            "all" => WorldFilter::All,
            "whitelist" => WorldFilter::Whitelist(list()),
            "blacklist" => WorldFilter::Blacklist(list()),
            other => {
                warn!(mode = other, "Unknown world mode, enabling all worlds");
                WorldFilter::All
            }
        }
    }

    pub fn is_enabled(&self, world: &WorldId) -> bool {
        match self {
            WorldFilter::All => true,
            WorldFilter::Whitelist(worlds) => worlds.contains(world.as_str()),
            WorldFilter::Blacklist(worlds) => !worlds.contains(world.as_str()),
        }
    }
}
