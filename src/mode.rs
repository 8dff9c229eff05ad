//! Mode Table
//!
//! Per-level weighting policy. A mode string such as `b1w3,-20` reads as
//! "balanced from level 1, weighted with skew -20 from level 3". Levels without
//! an explicit entry inherit the nearest shallower one; levels deeper than the
//! deepest entry use the deepest entry.

use crate::error::ModeError;
use crate::types::Level;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a parent's pool is split among its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    /// Equal split
    Balanced,
    /// Split by descendant leaf mass raised to [`skew_exponent`]
    Weighted { skew: i32 },
}

impl Policy {
    /// Unnormalised policy score of a child with the given descendant mass
    pub fn score(&self, mass: f64) -> f64 {
        match *self {
            Policy::Balanced => 1.0,
            Policy::Weighted { skew } => {
                if mass <= 0.0 {
                    return 0.0;
                }
                mass.powf(skew_exponent(skew))
            }
        }
    }
}

/// Exponent applied to a child's leaf mass under weighted policy.
///
/// `0` keeps shares proportional to mass, large positive skews flatten toward
/// balanced (`e -> 0`), and negative skews cross balanced at `-50` and then
/// increasingly favour small folders (`e -> -inf`).
pub fn skew_exponent(skew: i32) -> f64 {
    let s = skew as f64;
    if s >= 0.0 {
        50.0 / (50.0 + s)
    } else {
        1.0 + s / 50.0
    }
}

/// Ordered mapping level -> policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModeTable {
    entries: BTreeMap<Level, Policy>,
}

impl ModeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table used when no source and no caller declares one: balanced everywhere
    pub fn balanced_default() -> Self {
        let mut table = Self::new();
        table.set(1, Policy::Balanced);
        table
    }

    /// A single weighted level, as inferred for flat lists
    pub fn weighted_single_level() -> Self {
        let mut table = Self::new();
        table.set(1, Policy::Weighted { skew: 0 });
        table
    }

    /// Parse a mode string like `b1`, `w2,-30`, `b1w3,20`
    pub fn parse(input: &str) -> Result<Self, ModeError> {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(ModeError::Empty);
        }
        let lower = compact.to_ascii_lowercase();
        let bytes = lower.as_bytes();
        let mut table = Self::new();
        let mut i = 0;

        while i < bytes.len() {
            let start = i;
            let kind = bytes[i];
            if kind != b'b' && kind != b'w' {
                return Err(invalid(input, &lower[start..]));
            }
            i += 1;
            let digits_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if digits_start == i {
                return Err(invalid(input, &lower[start..]));
            }
            let level: Level = lower[digits_start..i]
                .parse()
                .map_err(|_| invalid(input, &lower[start..i]))?;
            if level == 0 {
                return Err(ModeError::LevelZero(level));
            }

            // Up to two comma-separated slope values; only the first is meaningful
            let mut slopes: Vec<i32> = Vec::new();
            while i < bytes.len() && bytes[i] == b',' && slopes.len() < 2 {
                i += 1;
                let num_start = i;
                if i < bytes.len() && bytes[i] == b'-' {
                    i += 1;
                }
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let value: i32 = lower[num_start..i]
                    .parse()
                    .map_err(|_| invalid(input, &lower[start..i]))?;
                slopes.push(value);
            }

            let policy = if kind == b'b' {
                Policy::Balanced
            } else {
                Policy::Weighted {
                    skew: slopes.first().copied().unwrap_or(0),
                }
            };
            table.set(level, policy);
        }

        Ok(table)
    }

    pub fn set(&mut self, level: Level, policy: Policy) {
        self.entries.insert(level, policy);
    }

    pub fn get(&self, level: Level) -> Option<Policy> {
        self.entries.get(&level).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Level, Policy)> + '_ {
        self.entries.iter().map(|(l, p)| (*l, *p))
    }

    /// First level at which any policy is declared; the alignment anchor for merges
    pub fn lowest_rung(&self) -> Option<Level> {
        self.entries.keys().next().copied()
    }

    /// Deepest explicitly declared level
    pub fn deepest_level(&self) -> Option<Level> {
        self.entries.keys().next_back().copied()
    }

    /// Policy at `level`: exact entry, else nearest shallower entry, else the
    /// first entry. An empty table is balanced.
    pub fn resolve(&self, level: Level) -> Policy {
        if let Some((_, policy)) = self.entries.range(..=level).next_back() {
            return *policy;
        }
        self.entries
            .values()
            .next()
            .copied()
            .unwrap_or(Policy::Balanced)
    }

    /// Copy of `self` with `overrides` layered on top
    pub fn overlay(&self, overrides: &ModeTable) -> ModeTable {
        let mut merged = self.clone();
        for (level, policy) in overrides.iter() {
            merged.set(level, policy);
        }
        merged
    }

    /// Every level moved by `offset`; `None` if any level would drop below 1
    pub fn shifted(&self, offset: i32) -> Option<ModeTable> {
        let mut shifted = ModeTable::new();
        for (level, policy) in self.iter() {
            let moved = level as i64 + offset as i64;
            if moved < 1 {
                return None;
            }
            shifted.set(moved as Level, policy);
        }
        Some(shifted)
    }
}

impl fmt::Display for ModeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (level, policy) in self.iter() {
            match policy {
                Policy::Balanced => write!(f, "b{}", level)?,
                Policy::Weighted { skew: 0 } => write!(f, "w{}", level)?,
                Policy::Weighted { skew } => write!(f, "w{},{}", level, skew)?,
            }
        }
        Ok(())
    }
}

fn invalid(input: &str, token: &str) -> ModeError {
    ModeError::InvalidToken {
        input: input.to_string(),
        token: token.to_string(),
    }
}
