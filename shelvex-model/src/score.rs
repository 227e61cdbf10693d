use std::fmt::{self, Display};

/// One contribution to a confidence score: a human-readable reason and
/// the (possibly negative) weight it added.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScoreReason {
    pub reason: String,
    pub weight: i16,
}

impl ScoreReason {
    pub fn new(reason: impl Into<String>, weight: i16) -> Self {
        Self {
            reason: reason.into(),
            weight,
        }
    }
}

/// Confidence for one unit's identification, clamped to `[0, 100]`.
/// A pure function of the unit's signals: identical signal sets always
/// produce identical results.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScoreResult {
    pub confidence: u8,
    pub reasons: Vec<ScoreReason>,
}

/// Traffic-light banding for confidence values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    Green,
    Yellow,
    Red,
}

impl Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceBand::Green => write!(f, "green"),
            ConfidenceBand::Yellow => write!(f, "yellow"),
            ConfidenceBand::Red => write!(f, "red"),
        }
    }
}

/// Band boundaries. The bands are exhaustive and mutually exclusive:
/// green at `>= green`, yellow at `>= yellow`, red below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConfidenceThresholds {
    pub green: u8,
    pub yellow: u8,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            green: 70,
            yellow: 40,
        }
    }
}

impl ConfidenceThresholds {
    pub fn band(&self, confidence: u8) -> ConfidenceBand {
        if confidence >= self.green {
            ConfidenceBand::Green
        } else if confidence >= self.yellow {
            ConfidenceBand::Yellow
        } else {
            ConfidenceBand::Red
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_exhaustive_at_boundaries() {
        let thresholds = ConfidenceThresholds::default();
        assert_eq!(thresholds.band(39), ConfidenceBand::Red);
        assert_eq!(thresholds.band(40), ConfidenceBand::Yellow);
        assert_eq!(thresholds.band(69), ConfidenceBand::Yellow);
        assert_eq!(thresholds.band(70), ConfidenceBand::Green);
        assert_eq!(thresholds.band(0), ConfidenceBand::Red);
        assert_eq!(thresholds.band(100), ConfidenceBand::Green);
    }
}
