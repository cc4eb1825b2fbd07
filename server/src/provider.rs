use std::fmt;

use analysis::FaceScan;
use image::DynamicImage;

/// A pluggable face-landmark backend. Implementations run face detection
/// plus landmark inference over one decoded frame; they are invoked on a
/// blocking worker thread and may take their time. Anything that can load a
/// face-mesh model can sit behind this seam.
pub trait LandmarkProvider: Send + Sync {
    fn scan(&self, image: &DynamicImage) -> Result<FaceScan, ProviderError>;

    fn name(&self) -> &str {
        "unnamed"
    }
}

#[derive(Debug)]
pub struct ProviderError {
    pub reason: String,
}

impl ProviderError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "landmark provider failed: {}", self.reason)
    }
}

/// Stand-in used when no landmark backend is wired in. Every frame reports
/// no face, so sessions stay in the connecting state rather than erroring.
pub struct DisabledProvider;

impl LandmarkProvider for DisabledProvider {
    fn scan(&self, _image: &DynamicImage) -> Result<FaceScan, ProviderError> {
        Ok(FaceScan::no_face())
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
