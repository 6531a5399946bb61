use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PercentageError {
    #[error("百分比必须在 0..=100 之间，实际为 {0}")]
    OutOfRange(u64),
    #[error("无法解析百分比 `{0}`")]
    Parse(String),
}

/// 清扫比例，取值 0..=100。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percentage(u8);

impl Percentage {
    pub const FULL: Percentage = Percentage(100);

    pub fn new(value: u8) -> Result<Self, PercentageError> {
        if value > 100 {
            return Err(PercentageError::OutOfRange(u64::from(value)));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// `floor(raw × pct / 100)`，在 u128 中计算，不会溢出也不会丢精度。
    pub fn apply(self, raw: u64) -> u64 {
        let scaled = u128::from(raw) * u128::from(self.0) / 100;
        // pct <= 100 保证结果不超过 raw
        scaled as u64
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Self::FULL
    }
}

impl TryFrom<u8> for Percentage {
    type Error = PercentageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for u8 {
    fn from(value: Percentage) -> Self {
        value.0
    }
}

impl FromStr for Percentage {
    type Err = PercentageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('%');
        let value: u64 = trimmed
            .parse()
            .map_err(|_| PercentageError::Parse(s.to_string()))?;
        if value > 100 {
            return Err(PercentageError::OutOfRange(value));
        }
        Self::new(value as u8)
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
