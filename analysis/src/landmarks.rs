use euclid::default::Point2D;

// MediaPipe face-mesh indices for the landmarks the extractors need.
// Left/right are viewer-relative, matching the mesh numbering.
pub const LEFT_EYE_OUTER: usize = 33;
pub const RIGHT_EYE_OUTER: usize = 263;
pub const LEFT_EYE_INNER: usize = 133;
pub const LEFT_EYE_TOP: usize = 159;
pub const LEFT_EYE_BOTTOM: usize = 145;
pub const LEFT_BROW_INNER: usize = 70;
pub const RIGHT_BROW_INNER: usize = 300;
pub const LEFT_MOUTH_CORNER: usize = 61;
pub const RIGHT_MOUTH_CORNER: usize = 291;
pub const UPPER_LIP_CENTER: usize = 13;
pub const UPPER_LIP_INNER: usize = 14;
pub const LOWER_LIP_INNER: usize = 17;
pub const NOSE_TIP: usize = 1;
pub const CHIN: usize = 152;

/// Number of points in a complete face-mesh landmark set.
pub const FACE_MESH_LANDMARK_COUNT: usize = 468;

/// An ordered set of normalized 2-D facial landmark points, as produced by a
/// landmark backend. Coordinates are in [0, 1] image space, y growing
/// downward. The set may be shorter than a full mesh; lookups past the end
/// or at non-finite points report the landmark as missing.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point2D<f32>>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point2D<f32>>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<Point2D<f32>> {
        self.points
            .get(index)
            .copied()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
    }
}

/// Head orientation estimated from a landmark set, in degrees. Zero means
/// facing the camera; sign follows image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeAngles {
    pub yaw_degrees: f32,
    pub pitch_degrees: f32,
}

/// Result of running face detection plus landmark inference on one frame.
#[derive(Debug, Clone)]
pub struct FaceScan {
    pub face_count: usize,
    pub landmarks: Option<LandmarkSet>,
}

impl FaceScan {
    pub fn no_face() -> Self {
        Self {
            face_count: 0,
            landmarks: None,
        }
    }

    pub fn single(landmarks: LandmarkSet) -> Self {
        Self {
            face_count: 1,
            landmarks: Some(landmarks),
        }
    }

    pub fn multiple(face_count: usize) -> Self {
        Self {
            face_count,
            landmarks: None,
        }
    }
}

/// Approximates head yaw and pitch from the 2-D landmark geometry.
///
/// Yaw comes from the horizontal offset of the nose tip against the midpoint
/// of the outer eye corners, pitch from the vertical position of the nose
/// between the eye line and the chin. Both are coarse projections of the
/// true head pose but track the turn direction monotonically, which is all
/// the gaze monitor needs.
pub fn estimate_gaze(set: &LandmarkSet) -> Option<GazeAngles> {
    let eye_l = set.point(LEFT_EYE_OUTER)?;
    let eye_r = set.point(RIGHT_EYE_OUTER)?;
    let nose = set.point(NOSE_TIP)?;
    let chin = set.point(CHIN)?;

    let span = eye_l.distance_to(eye_r);
    if span <= f32::EPSILON {
        return None;
    }
    let mid = eye_l.lerp(eye_r, 0.5);

    let yaw_ratio = ((nose.x - mid.x) / (span * 0.5)).max(-1.0).min(1.0);
    let yaw_degrees = yaw_ratio.asin().to_degrees();

    let face_height = chin.y - mid.y;
    if face_height <= f32::EPSILON {
        return None;
    }
    // ~0.5 when facing straight ahead, smaller when pitched up.
    let nose_position = (nose.y - mid.y) / face_height;
    let pitch_ratio = ((nose_position - 0.5) * 2.0).max(-1.0).min(1.0);
    let pitch_degrees = pitch_ratio.asin().to_degrees();

    Some(GazeAngles {
        yaw_degrees,
        pitch_degrees,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_set(points: &[(usize, f32, f32)]) -> LandmarkSet {
        let len = points.iter().map(|(i, _, _)| i + 1).max().unwrap_or(0);
        let mut all = vec![Point2D::new(f32::NAN, f32::NAN); len];
        for (index, x, y) in points {
            all[*index] = Point2D::new(*x, *y);
        }
        LandmarkSet::new(all)
    }

    #[test]
    fn missing_and_non_finite_points_are_absent() {
        let set = sparse_set(&[(NOSE_TIP, 0.5, 0.5)]);
        assert!(set.point(NOSE_TIP).is_some());
        assert!(set.point(CHIN).is_none());
        assert!(set.point(FACE_MESH_LANDMARK_COUNT + 10).is_none());
    }

    #[test]
    fn centered_face_has_near_zero_gaze() {
        let set = sparse_set(&[
            (LEFT_EYE_OUTER, 0.3, 0.4),
            (RIGHT_EYE_OUTER, 0.7, 0.4),
            (NOSE_TIP, 0.5, 0.55),
            (CHIN, 0.5, 0.7),
        ]);
        let gaze = estimate_gaze(&set).unwrap();
        assert!(gaze.yaw_degrees.abs() < 1.0);
        assert!(gaze.pitch_degrees.abs() < 1.0);
    }

    #[test]
    fn nose_offset_turns_into_signed_yaw() {
        let set = sparse_set(&[
            (LEFT_EYE_OUTER, 0.3, 0.4),
            (RIGHT_EYE_OUTER, 0.7, 0.4),
            (NOSE_TIP, 0.62, 0.55),
            (CHIN, 0.5, 0.7),
        ]);
        let gaze = estimate_gaze(&set).unwrap();
        assert!(gaze.yaw_degrees > 30.0);

        let set = sparse_set(&[
            (LEFT_EYE_OUTER, 0.3, 0.4),
            (RIGHT_EYE_OUTER, 0.7, 0.4),
            (NOSE_TIP, 0.38, 0.55),
            (CHIN, 0.5, 0.7),
        ]);
        let gaze = estimate_gaze(&set).unwrap();
        assert!(gaze.yaw_degrees < -30.0);
    }

    #[test]
    fn gaze_requires_all_four_landmarks() {
        let set = sparse_set(&[
            (LEFT_EYE_OUTER, 0.3, 0.4),
            (RIGHT_EYE_OUTER, 0.7, 0.4),
            (NOSE_TIP, 0.5, 0.55),
        ]);
        assert!(estimate_gaze(&set).is_none());
    }
}
