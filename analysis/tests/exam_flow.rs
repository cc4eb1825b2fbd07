use std::sync::Arc;

use analysis::euclid::default::Point2D;
use analysis::landmarks::{
    LandmarkSet, CHIN, LEFT_BROW_INNER, LEFT_EYE_BOTTOM, LEFT_EYE_INNER, LEFT_EYE_OUTER,
    LEFT_EYE_TOP, LEFT_MOUTH_CORNER, LOWER_LIP_INNER, NOSE_TIP, RIGHT_BROW_INNER, RIGHT_EYE_OUTER,
    RIGHT_MOUTH_CORNER, UPPER_LIP_CENTER, UPPER_LIP_INNER,
};
use analysis::{
    classify, estimate_gaze, extract, score, AnalysisConfig, ColorTag, EngagementStatus,
    FrameAnalysis, ProctoringMonitor, SessionState, SessionUpdate,
};

/// Builds a full-mesh landmark set around a fixed eye line: outer eye
/// corners at x 0.30/0.70 on y 0.40, nose between the eyes and the chin.
fn face(brow_ratio: f32, corner_y: f32, ear: f32, mouth_gap: f32, nose_dx: f32) -> LandmarkSet {
    let mut points = vec![Point2D::new(f32::NAN, f32::NAN); 468];
    points[LEFT_EYE_OUTER] = Point2D::new(0.30, 0.40);
    points[RIGHT_EYE_OUTER] = Point2D::new(0.70, 0.40);
    points[LEFT_EYE_INNER] = Point2D::new(0.40, 0.40);
    points[LEFT_EYE_TOP] = Point2D::new(0.35, 0.40 - ear * 0.05);
    points[LEFT_EYE_BOTTOM] = Point2D::new(0.35, 0.40 + ear * 0.05);
    points[LEFT_BROW_INNER] = Point2D::new(0.50 - brow_ratio * 0.20, 0.30);
    points[RIGHT_BROW_INNER] = Point2D::new(0.50 + brow_ratio * 0.20, 0.30);
    points[LEFT_MOUTH_CORNER] = Point2D::new(0.42, corner_y);
    points[RIGHT_MOUTH_CORNER] = Point2D::new(0.58, corner_y);
    points[UPPER_LIP_CENTER] = Point2D::new(0.50, 0.60);
    points[UPPER_LIP_INNER] = Point2D::new(0.50, 0.63);
    points[LOWER_LIP_INNER] = Point2D::new(0.50, 0.63 + mouth_gap);
    points[NOSE_TIP] = Point2D::new(0.50 + nose_dx, 0.55);
    points[CHIN] = Point2D::new(0.50, 0.70);
    LandmarkSet::new(points)
}

/// Relaxed brows, a clear smile curl, open eyes, closed mouth.
fn attentive_face() -> LandmarkSet {
    face(0.95, 0.67, 0.40, 0.01, 0.0)
}

/// Furrowed brows, flat mouth corners, squinting, slightly open mouth.
fn struggling_face() -> LandmarkSet {
    face(0.62, 0.61, 0.18, 0.05, 0.0)
}

/// The attentive face with the nose shifted well off the eye midpoint,
/// reading as a head turn past the yaw threshold.
fn turned_away_face() -> LandmarkSet {
    face(0.95, 0.67, 0.40, 0.01, 0.14)
}

/// One frame through the whole pipeline: extraction, scoring, proctoring
/// and the session transition, returning the observer-visible snapshot.
fn process(
    state: &mut SessionState,
    monitor: &mut ProctoringMonitor,
    config: &AnalysisConfig,
    landmarks: Option<&LandmarkSet>,
    face_count: usize,
    now: f64,
) -> SessionUpdate {
    let analysis = match landmarks {
        Some(set) if face_count == 1 => {
            let signals = extract(set, &config.signals);
            let frame_score = score(&signals, &config.weights);
            FrameAnalysis {
                timestamp: now,
                face_count,
                gaze: estimate_gaze(set),
                signals,
                score: Some(frame_score),
                classification: Some(classify(frame_score, &config.thresholds)),
                frame: Some(Arc::new("data:image/jpeg;base64,AAAA".to_string())),
            }
        }
        _ => FrameAnalysis::faceless(now, face_count, None),
    };
    let alert = monitor.observe(analysis.face_count, analysis.gaze, now);
    state.apply_frame(analysis, alert);
    state.snapshot(now)
}

#[test]
fn it_should_track_an_exam_from_focus_to_violation() {
    let config = AnalysisConfig::default();
    config.validate().expect("default config is valid");
    let mut state = SessionState::new(0.0, config.timeline_capacity);
    let mut monitor = ProctoringMonitor::new(config.proctor);

    // Two seconds of attentive frames at the 2 fps cadence.
    let mut now = 0.0;
    for _ in 0..4 {
        now += 0.5;
        let update = process(
            &mut state,
            &mut monitor,
            &config,
            Some(&attentive_face()),
            1,
            now,
        );
        assert_eq!(update.status, EngagementStatus::Focused);
        assert_eq!(update.color, ColorTag::Green);
        assert!(update.alert.is_none());
        assert!(update.video_frame.is_some());
    }
    assert_eq!(state.timeline().len(), 4);

    // The student starts struggling.
    for _ in 0..4 {
        now += 0.5;
        let update = process(
            &mut state,
            &mut monitor,
            &config,
            Some(&struggling_face()),
            1,
            now,
        );
        assert_eq!(update.status, EngagementStatus::Confused);
        assert_eq!(update.color, ColorTag::Yellow);
        assert!(update.alert.is_none());
    }
    assert_eq!(state.timeline().latest().unwrap().level(), -1);

    // Camera glitch: three frames with no face. Status goes to the
    // connecting placeholder, the timeline receives no samples and no
    // alert is raised.
    for _ in 0..3 {
        now += 0.5;
        let update = process(&mut state, &mut monitor, &config, None, 0, now);
        assert_eq!(update.status, EngagementStatus::Unknown);
        assert_eq!(update.color, ColorTag::Gray);
        assert!(update.alert.is_none());
    }
    assert_eq!(state.timeline().len(), 8);

    // The student turns away. Frames short of the sustained threshold
    // never alert.
    let first_away = now + 0.5;
    for i in 0..8 {
        let t = first_away + 0.5 * i as f64;
        let update = process(
            &mut state,
            &mut monitor,
            &config,
            Some(&turned_away_face()),
            1,
            t,
        );
        assert!(update.alert.is_none(), "no alert yet at t={}", t);
        assert_eq!(update.status, EngagementStatus::Focused);
    }

    // The frame four seconds after the turn confirms the violation, and
    // the alert outranks the engagement color.
    now = first_away + 4.0;
    let update = process(
        &mut state,
        &mut monitor,
        &config,
        Some(&turned_away_face()),
        1,
        now,
    );
    assert!(update.alert.as_deref().unwrap().contains("Looking away"));
    assert_eq!(update.color, ColorTag::Red);

    // Gaze returns: the alert clears on the very next frame.
    now += 0.5;
    let update = process(
        &mut state,
        &mut monitor,
        &config,
        Some(&attentive_face()),
        1,
        now,
    );
    assert!(update.alert.is_none());
    assert_eq!(update.color, ColorTag::Green);

    // A second person leans in. The frame is not scored, but the
    // violation fires immediately and clears as soon as the student is
    // alone again.
    now += 0.5;
    let update = process(&mut state, &mut monitor, &config, None, 2, now);
    assert!(update.alert.as_deref().unwrap().contains("Multiple faces"));
    assert_eq!(update.status, EngagementStatus::Unknown);
    assert_eq!(update.color, ColorTag::Red);

    now += 0.5;
    let update = process(
        &mut state,
        &mut monitor,
        &config,
        Some(&attentive_face()),
        1,
        now,
    );
    assert!(update.alert.is_none());

    // The full history is time-ascending and within capacity.
    let timeline = &update.timeline;
    assert!(timeline.len() <= config.timeline_capacity);
    assert!(timeline
        .windows(2)
        .all(|pair| pair[0].timestamp() <= pair[1].timestamp()));
}
