use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::signals::SignalVector;

pub const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;

/// Per-signal weights for the confusion score. The weights are a calibration
/// input and must sum to 1.0; `validate` enforces this once at configuration
/// time instead of renormalizing on every frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalWeights {
    pub brow_furrow: f32,
    pub smile_absence: f32,
    pub head_tilt: f32,
    pub eye_strain: f32,
    pub mouth_open: f32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            brow_furrow: 0.35,
            smile_absence: 0.25,
            head_tilt: 0.20,
            eye_strain: 0.15,
            mouth_open: 0.05,
        }
    }
}

impl SignalWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parts = [
            self.brow_furrow,
            self.smile_absence,
            self.head_tilt,
            self.eye_strain,
            self.mouth_open,
        ];
        if parts.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(ConfigError::Threshold {
                name: "signal weight",
            });
        }
        let sum: f32 = parts.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }
        Ok(())
    }
}

/// Score cut points: at and above `confused` the frame classifies as
/// Confused, below `focused` as Focused, in between as Neutral.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreThresholds {
    pub confused: f32,
    pub focused: f32,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            confused: 0.50,
            focused: 0.30,
        }
    }
}

impl ScoreThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = 0.0 < self.focused && self.focused < self.confused && self.confused <= 1.0;
        if ordered {
            Ok(())
        } else {
            Err(ConfigError::Threshold {
                name: "score thresholds",
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Focused,
    Neutral,
    Confused,
}

impl Classification {
    /// Timeline encoding: Confused = -1, Focused and Neutral = 0. Level 1 is
    /// reserved for a positive-affect signal outside the weighted five.
    pub fn engagement_level(self) -> i8 {
        match self {
            Classification::Confused => -1,
            Classification::Focused | Classification::Neutral => 0,
        }
    }
}

/// Weighted sum of the five signals, clamped to [0, 1]. A missing signal
/// contributes its neutral value of zero. Pure: identical inputs always
/// produce the identical score.
pub fn score(signals: &SignalVector, weights: &SignalWeights) -> f32 {
    let sum = weights.brow_furrow * signals.brow_furrow.unwrap_or(0.0)
        + weights.smile_absence * signals.smile_absence.unwrap_or(0.0)
        + weights.head_tilt * signals.head_tilt.unwrap_or(0.0)
        + weights.eye_strain * signals.eye_strain.unwrap_or(0.0)
        + weights.mouth_open * signals.mouth_open.unwrap_or(0.0);
    sum.max(0.0).min(1.0)
}

pub fn classify(score: f32, thresholds: &ScoreThresholds) -> Classification {
    if score >= thresholds.confused {
        Classification::Confused
    } else if score < thresholds.focused {
        Classification::Focused
    } else {
        Classification::Neutral
    }
}
