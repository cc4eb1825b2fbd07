use std::sync::Arc;

use crate::landmarks::GazeAngles;
use crate::message::{EngagementStatus, SessionUpdate};
use crate::scoring::Classification;
use crate::signals::SignalVector;
use crate::timeline::Timeline;

/// Everything the pipeline learned from one successfully decoded frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    /// Arrival time of the frame, epoch seconds.
    pub timestamp: f64,
    pub face_count: usize,
    pub gaze: Option<GazeAngles>,
    pub signals: SignalVector,
    /// `None` when no single face was readable. Deliberately not zero, so
    /// "no signal" stays distinct from "calm".
    pub score: Option<f32>,
    pub classification: Option<Classification>,
    /// Data-URI of the frame, for observer re-display.
    pub frame: Option<Arc<String>>,
}

impl FrameAnalysis {
    /// A frame that decoded fine but had no readable face.
    pub fn faceless(timestamp: f64, face_count: usize, frame: Option<Arc<String>>) -> Self {
        Self {
            timestamp,
            face_count,
            gaze: None,
            signals: SignalVector::undefined(),
            score: None,
            classification: None,
            frame,
        }
    }
}

/// Per-student aggregate state. Mutated by exactly one writer (the session's
/// frame pipeline); everyone else reads finished snapshots.
#[derive(Debug)]
pub struct SessionState {
    status: EngagementStatus,
    alert: Option<String>,
    timeline: Timeline,
    last_frame: Option<Arc<String>>,
    last_score: Option<f32>,
    created_at: f64,
    last_activity_at: f64,
}

impl SessionState {
    pub fn new(created_at: f64, timeline_capacity: usize) -> Self {
        Self {
            status: EngagementStatus::Unknown,
            alert: None,
            timeline: Timeline::new(timeline_capacity),
            last_frame: None,
            last_score: None,
            created_at,
            last_activity_at: created_at,
        }
    }

    /// Records producer activity without changing analysis state.
    pub fn touch(&mut self, now: f64) {
        if now > self.last_activity_at {
            self.last_activity_at = now;
        }
    }

    /// Applies one frame's outcome as a single transition. Only classified
    /// frames contribute a timeline sample; no-face frames change status but
    /// leave the history untouched.
    pub fn apply_frame(&mut self, analysis: FrameAnalysis, alert: Option<String>) {
        self.status = match analysis.classification {
            Some(Classification::Confused) => EngagementStatus::Confused,
            Some(_) => EngagementStatus::Focused,
            None => EngagementStatus::Unknown,
        };
        if let Some(classification) = analysis.classification {
            self.timeline
                .push(analysis.timestamp, classification.engagement_level());
        }
        if let Some(frame) = analysis.frame {
            self.last_frame = Some(frame);
        }
        self.last_score = analysis.score;
        self.alert = alert;
        self.touch(analysis.timestamp);
    }

    /// A complete, self-contained update for observers.
    pub fn snapshot(&self, now: f64) -> SessionUpdate {
        SessionUpdate {
            status: self.status,
            color: self.status.color(self.alert.is_some()),
            alert: self.alert.clone(),
            timeline: self.timeline.to_vec(),
            video_frame: self.last_frame.as_ref().map(|f| f.as_ref().clone()),
            timestamp: now,
        }
    }

    pub fn status(&self) -> EngagementStatus {
        self.status
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn last_score(&self) -> Option<f32> {
        self.last_score
    }

    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    pub fn last_activity_at(&self) -> f64 {
        self.last_activity_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ColorTag;

    fn classified(timestamp: f64, classification: Classification, score: f32) -> FrameAnalysis {
        FrameAnalysis {
            timestamp,
            face_count: 1,
            gaze: None,
            signals: SignalVector::undefined(),
            score: Some(score),
            classification: Some(classification),
            frame: Some(Arc::new("data:image/jpeg;base64,AAAA".to_string())),
        }
    }

    #[test]
    fn starts_as_connecting_with_empty_timeline() {
        let state = SessionState::new(50.0, 10);
        let update = state.snapshot(50.0);
        assert_eq!(update.status, EngagementStatus::Unknown);
        assert_eq!(update.color, ColorTag::Gray);
        assert!(update.timeline.is_empty());
        assert!(update.video_frame.is_none());
        assert!(update.alert.is_none());
    }

    #[test]
    fn classified_frame_updates_everything_at_once() {
        let mut state = SessionState::new(0.0, 10);
        state.apply_frame(classified(1.0, Classification::Confused, 0.84), None);

        assert_eq!(state.status(), EngagementStatus::Confused);
        assert_eq!(state.last_score(), Some(0.84));
        assert_eq!(state.last_activity_at(), 1.0);
        let update = state.snapshot(1.0);
        assert_eq!(update.color, ColorTag::Yellow);
        assert_eq!(update.timeline, vec![crate::timeline::TimelinePoint(1.0, -1)]);
        assert!(update.video_frame.is_some());
    }

    #[test]
    fn no_face_frames_go_unknown_without_timeline_samples() {
        let mut state = SessionState::new(0.0, 10);
        state.apply_frame(classified(1.0, Classification::Focused, 0.1), None);

        for i in 0..3 {
            let t = 1.5 + i as f64 * 0.5;
            state.apply_frame(FrameAnalysis::faceless(t, 0, None), None);
            assert_eq!(state.status(), EngagementStatus::Unknown);
        }
        // Only the one classified frame ever sampled the timeline, and the
        // score is reported as absent rather than zero.
        assert_eq!(state.timeline().len(), 1);
        assert_eq!(state.last_score(), None);
        assert!(state.alert().is_none());
    }

    #[test]
    fn alert_rides_the_snapshot_and_forces_red() {
        let mut state = SessionState::new(0.0, 10);
        state.apply_frame(
            classified(1.0, Classification::Focused, 0.1),
            Some("Looking away from screen for more than 4s".to_string()),
        );
        let update = state.snapshot(1.0);
        assert_eq!(update.status, EngagementStatus::Focused);
        assert_eq!(update.color, ColorTag::Red);
        assert!(update.alert.unwrap().contains("Looking away"));

        // The alert clears on the next normal frame.
        state.apply_frame(classified(1.5, Classification::Focused, 0.1), None);
        assert!(state.alert().is_none());
        assert_eq!(state.snapshot(1.5).color, ColorTag::Green);
    }

    #[test]
    fn last_frame_survives_a_frame_without_image() {
        let mut state = SessionState::new(0.0, 10);
        state.apply_frame(classified(1.0, Classification::Neutral, 0.4), None);
        state.apply_frame(FrameAnalysis::faceless(1.5, 0, None), None);
        assert!(state.snapshot(1.5).video_frame.is_some());
    }
}
