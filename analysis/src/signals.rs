use crate::config::SignalConfig;
use crate::landmarks::{
    LandmarkSet, LEFT_BROW_INNER, LEFT_EYE_BOTTOM, LEFT_EYE_INNER, LEFT_EYE_OUTER, LEFT_EYE_TOP,
    LEFT_MOUTH_CORNER, LOWER_LIP_INNER, RIGHT_BROW_INNER, RIGHT_EYE_OUTER, RIGHT_MOUTH_CORNER,
    UPPER_LIP_CENTER, UPPER_LIP_INNER,
};

const MIN_SPAN: f32 = 1e-6;

/// Raw geometric measurements taken from one landmark set. Each is `None`
/// when a required landmark is missing, independently of the others.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaceMeasurements {
    /// Inner-brow distance over eye-span distance.
    pub brow_ratio: Option<f32>,
    /// Mouth-corner mean y minus upper-lip y. Positive means the corners sit
    /// below the lip, i.e. no raised smile.
    pub smile_lift: Option<f32>,
    /// Absolute angle of the inter-eye vector from horizontal, degrees.
    pub tilt_degrees: Option<f32>,
    /// Eye aspect ratio, vertical over horizontal opening.
    pub eye_aspect_ratio: Option<f32>,
    /// Vertical gap between the inner lips.
    pub mouth_gap: Option<f32>,
}

/// The five normalized signals feeding the scoring engine, each in [0, 1] or
/// `None` when its measurement was unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalVector {
    pub brow_furrow: Option<f32>,
    pub smile_absence: Option<f32>,
    pub head_tilt: Option<f32>,
    pub eye_strain: Option<f32>,
    pub mouth_open: Option<f32>,
}

impl SignalVector {
    pub fn undefined() -> Self {
        Self::default()
    }
}

pub fn measure(set: &LandmarkSet) -> FaceMeasurements {
    FaceMeasurements {
        brow_ratio: brow_ratio(set),
        smile_lift: smile_lift(set),
        tilt_degrees: tilt_degrees(set),
        eye_aspect_ratio: eye_aspect_ratio(set),
        mouth_gap: mouth_gap(set),
    }
}

pub fn extract(set: &LandmarkSet, config: &SignalConfig) -> SignalVector {
    signals_from(&measure(set), config)
}

pub fn signals_from(measurements: &FaceMeasurements, config: &SignalConfig) -> SignalVector {
    SignalVector {
        brow_furrow: measurements.brow_ratio.map(|ratio| {
            ramp_down(
                ratio,
                config.brow_furrow_full_ratio,
                config.brow_furrow_relaxed_ratio,
            )
        }),
        smile_absence: measurements.smile_lift.map(|lift| {
            ramp_down(
                lift,
                config.smile_lift_threshold,
                config.smile_lift_threshold * 2.0,
            )
        }),
        head_tilt: measurements.tilt_degrees.map(|angle| {
            ramp_up(
                angle,
                config.head_tilt_none_degrees,
                config.head_tilt_full_degrees,
            )
        }),
        eye_strain: measurements.eye_aspect_ratio.map(|ear| {
            ramp_down(ear, config.eye_squint_ratio, config.eye_open_ratio)
        }),
        mouth_open: measurements
            .mouth_gap
            .map(|gap| thinking_band(gap, config)),
    }
}

/// 1.0 at and below `lo`, 0.0 at and above `hi`, linear between.
fn ramp_down(value: f32, lo: f32, hi: f32) -> f32 {
    ((hi - value) / (hi - lo)).max(0.0).min(1.0)
}

/// 0.0 at and below `lo`, 1.0 at and above `hi`, linear between.
fn ramp_up(value: f32, lo: f32, hi: f32) -> f32 {
    ((value - lo) / (hi - lo)).max(0.0).min(1.0)
}

/// Trapezoid peaking at 0.5 over the thinking band. A slightly open mouth is
/// a weak confusion cue; a wide open mouth is not one at all.
fn thinking_band(gap: f32, config: &SignalConfig) -> f32 {
    if gap <= config.mouth_closed_gap || gap >= config.mouth_wide_gap {
        0.0
    } else if gap < config.mouth_thinking_min_gap {
        0.5 * (gap - config.mouth_closed_gap)
            / (config.mouth_thinking_min_gap - config.mouth_closed_gap)
    } else if gap <= config.mouth_thinking_max_gap {
        0.5
    } else {
        0.5 * (config.mouth_wide_gap - gap)
            / (config.mouth_wide_gap - config.mouth_thinking_max_gap)
    }
}

fn brow_ratio(set: &LandmarkSet) -> Option<f32> {
    let brow_l = set.point(LEFT_BROW_INNER)?;
    let brow_r = set.point(RIGHT_BROW_INNER)?;
    let eye_l = set.point(LEFT_EYE_OUTER)?;
    let eye_r = set.point(RIGHT_EYE_OUTER)?;

    let eye_span = eye_l.distance_to(eye_r);
    if eye_span <= MIN_SPAN {
        return None;
    }
    Some(brow_l.distance_to(brow_r) / eye_span)
}

fn smile_lift(set: &LandmarkSet) -> Option<f32> {
    let corner_l = set.point(LEFT_MOUTH_CORNER)?;
    let corner_r = set.point(RIGHT_MOUTH_CORNER)?;
    let upper_lip = set.point(UPPER_LIP_CENTER)?;

    let corner_mean_y = (corner_l.y + corner_r.y) / 2.0;
    Some(corner_mean_y - upper_lip.y)
}

fn tilt_degrees(set: &LandmarkSet) -> Option<f32> {
    let eye_l = set.point(LEFT_EYE_OUTER)?;
    let eye_r = set.point(RIGHT_EYE_OUTER)?;

    let v = eye_r - eye_l;
    if v.length() <= MIN_SPAN {
        return None;
    }
    let mut angle = v.angle_from_x_axis().radians.to_degrees().abs();
    if angle > 90.0 {
        angle = 180.0 - angle;
    }
    Some(angle)
}

fn eye_aspect_ratio(set: &LandmarkSet) -> Option<f32> {
    let outer = set.point(LEFT_EYE_OUTER)?;
    let inner = set.point(LEFT_EYE_INNER)?;
    let top = set.point(LEFT_EYE_TOP)?;
    let bottom = set.point(LEFT_EYE_BOTTOM)?;

    let horizontal = outer.distance_to(inner);
    if horizontal <= MIN_SPAN {
        return None;
    }
    Some(top.distance_to(bottom) / horizontal)
}

fn mouth_gap(set: &LandmarkSet) -> Option<f32> {
    let upper = set.point(UPPER_LIP_INNER)?;
    let lower = set.point(LOWER_LIP_INNER)?;
    Some((lower.y - upper.y).abs())
}
