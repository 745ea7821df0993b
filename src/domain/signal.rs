//! Trade signals emitted by strategies.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn multiplier(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyId {
    VolumeBreakout,
    RsiDivergence,
    BollingerSqueeze,
    EmaCrossover,
}

impl StrategyId {
    pub const ALL: [StrategyId; 4] = [
        StrategyId::VolumeBreakout,
        StrategyId::RsiDivergence,
        StrategyId::BollingerSqueeze,
        StrategyId::EmaCrossover,
    ];

    /// Snake-case name, also used as the config section.
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyId::VolumeBreakout => "volume_breakout",
            StrategyId::RsiDivergence => "rsi_divergence",
            StrategyId::BollingerSqueeze => "bollinger_squeeze",
            StrategyId::EmaCrossover => "ema_crossover",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        StrategyId::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| format!("unknown strategy '{}'", s.trim()))
    }
}

/// Why a strategy fired: a confidence score plus the numbers it looked at.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rationale {
    pub confidence: f64,
    pub facts: BTreeMap<&'static str, f64>,
}

impl Rationale {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            facts: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &'static str, value: f64) -> Self {
        self.facts.insert(name, value);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub direction: Direction,
    /// Close of the bar that produced the signal.
    pub entry_price: f64,
    pub timestamp: DateTime<Utc>,
    pub strategy_id: StrategyId,
    /// Stop level proposed by the strategy for an entry at `entry_price`.
    pub stop_loss: f64,
    pub rationale: Rationale,
}
