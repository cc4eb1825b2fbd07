pub extern crate euclid;
pub extern crate serde;
pub extern crate serde_json;

pub mod config;
pub mod landmarks;
pub mod message;
pub mod proctor;
pub mod scoring;
pub mod session;
pub mod signals;
pub mod timeline;

pub use config::{AnalysisConfig, ConfigError, SignalConfig};
pub use landmarks::{estimate_gaze, FaceScan, GazeAngles, LandmarkSet};
pub use message::{
    ColorTag, ConnectionId, EngagementStatus, SessionDescription, SessionId, SessionUpdate,
};
pub use proctor::{ProctorConfig, ProctoringMonitor};
pub use scoring::{classify, score, Classification, ScoreThresholds, SignalWeights};
pub use session::{FrameAnalysis, SessionState};
pub use signals::{extract, measure, FaceMeasurements, SignalVector};
pub use timeline::{Timeline, TimelinePoint};
