use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::landmarks::GazeAngles;

/// Gaze and face-count thresholds for the proctoring monitor. Angles in
/// degrees, duration in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProctorConfig {
    pub gaze_yaw_threshold_degrees: f32,
    pub gaze_pitch_threshold_degrees: f32,
    /// How long gaze must stay away before an alert confirms. Brief glances
    /// are natural; sustained deviation is the violation.
    pub gaze_away_duration_seconds: f64,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            gaze_yaw_threshold_degrees: 35.0,
            gaze_pitch_threshold_degrees: 25.0,
            gaze_away_duration_seconds: 4.0,
        }
    }
}

impl ProctorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = self.gaze_yaw_threshold_degrees > 0.0
            && self.gaze_pitch_threshold_degrees > 0.0
            && self.gaze_away_duration_seconds > 0.0;
        if positive {
            Ok(())
        } else {
            Err(ConfigError::Threshold { name: "proctoring" })
        }
    }

    fn is_away(&self, gaze: &GazeAngles) -> bool {
        gaze.yaw_degrees.abs() > self.gaze_yaw_threshold_degrees
            || gaze.pitch_degrees.abs() > self.gaze_pitch_threshold_degrees
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GazePresence {
    Present,
    /// Gaze left the threshold at `since`; not yet sustained long enough.
    AwayPending { since: f64 },
    AwayConfirmed,
}

/// Per-session violation state machine, evaluated on every frame that
/// carries gaze or face-count information. Independent of the confusion
/// score.
#[derive(Debug)]
pub struct ProctoringMonitor {
    config: ProctorConfig,
    presence: GazePresence,
    face_visible: bool,
    multi_face_count: Option<usize>,
}

impl ProctoringMonitor {
    pub fn new(config: ProctorConfig) -> Self {
        Self {
            config,
            presence: GazePresence::Present,
            face_visible: false,
            multi_face_count: None,
        }
    }

    /// Feeds one frame's face count and gaze estimate, stamped with the
    /// frame's arrival time, and returns the alert that is active after the
    /// transition, if any.
    pub fn observe(&mut self, face_count: usize, gaze: Option<GazeAngles>, now: f64) -> Option<String> {
        // More than one face alerts immediately; exactly one clears it. Zero
        // faces leaves the flag alone, since nothing was observed either way.
        if face_count > 1 {
            self.multi_face_count = Some(face_count);
        } else if face_count == 1 {
            self.multi_face_count = None;
        }

        match gaze {
            Some(gaze) => {
                // Reacquiring the face after a gap restarts gaze tracking so
                // a stale pending timer cannot confirm across the gap.
                if !self.face_visible {
                    self.presence = GazePresence::Present;
                }
                self.face_visible = true;
                self.advance_presence(&gaze, now);
            }
            None => {
                // No gaze information this frame; the away timer freezes.
                self.face_visible = false;
            }
        }

        self.alert()
    }

    fn advance_presence(&mut self, gaze: &GazeAngles, now: f64) {
        if !self.config.is_away(gaze) {
            self.presence = GazePresence::Present;
            return;
        }
        match self.presence {
            GazePresence::Present => {
                self.presence = GazePresence::AwayPending { since: now };
            }
            GazePresence::AwayPending { since } => {
                if now - since >= self.config.gaze_away_duration_seconds {
                    log::warn!(
                        "gaze away for {:.1}s, confirming violation",
                        now - since
                    );
                    self.presence = GazePresence::AwayConfirmed;
                }
            }
            GazePresence::AwayConfirmed => {}
        }
    }

    /// The currently active violation text. Multiple faces outrank gaze.
    pub fn alert(&self) -> Option<String> {
        if let Some(count) = self.multi_face_count {
            return Some(format!(
                "Multiple faces detected ({}). The exam must be taken alone.",
                count
            ));
        }
        if let GazePresence::AwayConfirmed = self.presence {
            return Some(format!(
                "Looking away from screen for more than {:.0}s",
                self.config.gaze_away_duration_seconds
            ));
        }
        None
    }

    pub fn multi_face_active(&self) -> bool {
        self.multi_face_count.is_some()
    }

    pub fn away_confirmed(&self) -> bool {
        self.presence == GazePresence::AwayConfirmed
    }
}
