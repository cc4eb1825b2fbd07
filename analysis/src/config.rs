use serde::{Deserialize, Serialize};

use crate::proctor::ProctorConfig;
use crate::scoring::{ScoreThresholds, SignalWeights};

/// Timeline capacity: 300 samples at 2 frames/sec is about 2.5 minutes of
/// history.
pub const DEFAULT_TIMELINE_CAPACITY: usize = 300;

#[derive(Debug)]
pub enum ConfigError {
    /// Signal weights must sum to 1.0 within tolerance.
    WeightSum { sum: f32 },
    /// A threshold pair is out of order or out of range.
    Threshold { name: &'static str },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConfigError::WeightSum { sum } => {
                write!(f, "signal weights must sum to 1.0, got {}", sum)
            }
            ConfigError::Threshold { name } => write!(f, "invalid threshold configuration: {}", name),
        }
    }
}

/// Thresholds for turning raw facial measurements into normalized signals.
/// Ratios and gaps are in normalized image space, angles in degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Inner-brow to eye-span ratio at which the furrow signal saturates.
    pub brow_furrow_full_ratio: f32,
    /// Ratio at and above which the brows count as fully relaxed.
    pub brow_furrow_relaxed_ratio: f32,
    /// Ratio below which a face classifies as furrowed.
    pub brow_furrow_classify_ratio: f32,
    /// Mouth-corner lift below which no smile is read.
    pub smile_lift_threshold: f32,
    pub head_tilt_none_degrees: f32,
    pub head_tilt_full_degrees: f32,
    /// Angle above which a face classifies as tilted.
    pub head_tilt_classify_degrees: f32,
    /// Eye aspect ratio at which the strain signal saturates.
    pub eye_squint_ratio: f32,
    /// Eye aspect ratio at and above which the eyes count as open.
    pub eye_open_ratio: f32,
    pub mouth_closed_gap: f32,
    pub mouth_thinking_min_gap: f32,
    pub mouth_thinking_max_gap: f32,
    /// Gap at and above which the mouth is wide open (yawn or surprise, not
    /// part of the thinking band).
    pub mouth_wide_gap: f32,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            brow_furrow_full_ratio: 0.60,
            brow_furrow_relaxed_ratio: 0.95,
            brow_furrow_classify_ratio: 0.75,
            smile_lift_threshold: 0.03,
            head_tilt_none_degrees: 5.0,
            head_tilt_full_degrees: 15.0,
            head_tilt_classify_degrees: 12.0,
            eye_squint_ratio: 0.20,
            eye_open_ratio: 0.35,
            mouth_closed_gap: 0.02,
            mouth_thinking_min_gap: 0.04,
            mouth_thinking_max_gap: 0.06,
            mouth_wide_gap: 0.08,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = [
            ("brow furrow", self.brow_furrow_full_ratio < self.brow_furrow_relaxed_ratio),
            ("head tilt", self.head_tilt_none_degrees < self.head_tilt_full_degrees),
            ("eye aspect", self.eye_squint_ratio < self.eye_open_ratio),
            (
                "mouth gap",
                self.mouth_closed_gap < self.mouth_thinking_min_gap
                    && self.mouth_thinking_min_gap <= self.mouth_thinking_max_gap
                    && self.mouth_thinking_max_gap < self.mouth_wide_gap,
            ),
            ("smile lift", self.smile_lift_threshold > 0.0),
        ];
        for &(name, ok) in ordered.iter() {
            if !ok {
                return Err(ConfigError::Threshold { name });
            }
        }
        Ok(())
    }

    pub fn is_furrowed(&self, brow_ratio: f32) -> bool {
        brow_ratio < self.brow_furrow_classify_ratio
    }

    pub fn is_tilted(&self, tilt_degrees: f32) -> bool {
        tilt_degrees > self.head_tilt_classify_degrees
    }
}

/// Everything the analysis pipeline can be tuned with, in one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub signals: SignalConfig,
    pub weights: SignalWeights,
    pub thresholds: ScoreThresholds,
    pub proctor: ProctorConfig,
    pub timeline_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            signals: SignalConfig::default(),
            weights: SignalWeights::default(),
            thresholds: ScoreThresholds::default(),
            proctor: ProctorConfig::default(),
            timeline_capacity: DEFAULT_TIMELINE_CAPACITY,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.signals.validate()?;
        self.weights.validate()?;
        self.thresholds.validate()?;
        self.proctor.validate()?;
        if self.timeline_capacity == 0 {
            return Err(ConfigError::Threshold {
                name: "timeline capacity",
            });
        }
        Ok(())
    }
}
