//! Concurrency level selection.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest concurrency level a user may enter.
pub const MAX_CONCURRENCY: u32 = 1000;

/// Preset levels offered when no custom value has been entered.
pub const PRESET_LEVELS: [u32; 6] = [1, 5, 10, 20, 50, 100];

/// Why a concurrency level was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConcurrencyRejection {
    #[error("'{0}' is not a whole number")]
    NotAnInteger(String),

    #[error("concurrency must be a positive integer, got {0}")]
    NotPositive(i128),

    #[error("concurrency {value} exceeds the maximum of {max}")]
    AboveMaximum { value: i128, max: u32 },

    #[error("concurrency {0} is already selected")]
    Duplicate(u32),
}

/// Set of selected concurrency levels.
///
/// Always deduplicated and free of non-positive or out-of-range values;
/// iteration is ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct ConcurrencyLevels {
    levels: BTreeSet<u32>,
}

impl ConcurrencyLevels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from `levels`, rejecting it whole if any value is invalid.
    pub fn from_levels<I>(levels: I) -> Result<Self, ConcurrencyRejection>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut set = BTreeSet::new();
        for level in levels {
            check_range(level.into())?;
            set.insert(level);
        }
        Ok(Self { levels: set })
    }

    /// Parse a comma-separated list such as `"1, 5, 10"`.
    ///
    /// Blank entries are skipped and repeated values collapse.
    pub fn parse_list(text: &str) -> Result<Self, ConcurrencyRejection> {
        let mut values = Vec::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            values.push(parse_level(part)?);
        }
        Self::from_levels(values)
    }

    pub fn presets() -> Self {
        Self {
            levels: PRESET_LEVELS.iter().copied().collect(),
        }
    }

    /// Replace the selection; on error the current selection is kept.
    pub fn set<I>(&mut self, levels: I) -> Result<(), ConcurrencyRejection>
    where
        I: IntoIterator<Item = u32>,
    {
        *self = Self::from_levels(levels)?;
        Ok(())
    }

    /// Insert a user-entered value.
    pub fn add_custom(&mut self, value: i64) -> Result<u32, ConcurrencyRejection> {
        self.insert_new(check_range(value.into())?)
    }

    /// Insert a value typed as free text.
    pub fn add_custom_text(&mut self, text: &str) -> Result<u32, ConcurrencyRejection> {
        self.insert_new(parse_level(text.trim())?)
    }

    fn insert_new(&mut self, level: u32) -> Result<u32, ConcurrencyRejection> {
        if !self.levels.insert(level) {
            return Err(ConcurrencyRejection::Duplicate(level));
        }
        Ok(level)
    }

    pub fn remove(&mut self, level: u32) -> bool {
        self.levels.remove(&level)
    }

    pub fn contains(&self, level: u32) -> bool {
        self.levels.contains(&level)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.levels.iter().copied()
    }

    /// Levels in ascending order.
    pub fn to_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }
}

fn parse_level(text: &str) -> Result<u32, ConcurrencyRejection> {
    let value = text
        .parse::<i128>()
        .map_err(|_| ConcurrencyRejection::NotAnInteger(text.to_string()))?;
    check_range(value)
}

fn check_range(value: i128) -> Result<u32, ConcurrencyRejection> {
    if value <= 0 {
        return Err(ConcurrencyRejection::NotPositive(value));
    }
    if value > i128::from(MAX_CONCURRENCY) {
        return Err(ConcurrencyRejection::AboveMaximum {
            value,
            max: MAX_CONCURRENCY,
        });
    }
    Ok(value as u32)
}

impl TryFrom<Vec<u32>> for ConcurrencyLevels {
    type Error = ConcurrencyRejection;

    fn try_from(levels: Vec<u32>) -> Result<Self, Self::Error> {
        Self::from_levels(levels)
    }
}

impl From<ConcurrencyLevels> for Vec<u32> {
    fn from(levels: ConcurrencyLevels) -> Self {
        levels.to_vec()
    }
}

impl fmt::Display for ConcurrencyLevels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|l| l.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}
