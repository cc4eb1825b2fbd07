use serde::{Deserialize, Serialize};

use crate::timeline::TimelinePoint;

pub type ConnectionId = u16;
/// Client-supplied student session identifier, stable for the exam duration.
pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngagementStatus {
    Focused,
    Confused,
    Happy,
    /// No scored frame yet, or the last frame had no readable face.
    /// Dashboards render this as a connecting placeholder.
    #[serde(rename = "Connecting...")]
    Unknown,
}

impl EngagementStatus {
    /// Status tag shown on the dashboard. An active proctoring alert
    /// overrides the engagement color.
    pub fn color(self, alert_active: bool) -> ColorTag {
        if alert_active {
            return ColorTag::Red;
        }
        match self {
            EngagementStatus::Focused | EngagementStatus::Happy => ColorTag::Green,
            EngagementStatus::Confused => ColorTag::Yellow,
            EngagementStatus::Unknown => ColorTag::Gray,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Green,
    Yellow,
    Red,
    Gray,
}

/// The JSON object pushed to every subscribed observer after each session
/// transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub status: EngagementStatus,
    pub color: ColorTag,
    pub alert: Option<String>,
    pub timeline: Vec<TimelinePoint>,
    pub video_frame: Option<String>,
    pub timestamp: f64,
}

/// Summary row for the session listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescription {
    pub session_id: SessionId,
    pub status: EngagementStatus,
    pub alert: Option<String>,
    pub observer_count: usize,
    pub last_score: Option<f32>,
    pub created_at: f64,
    pub last_activity_at: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_wire_strings() {
        assert_eq!(
            serde_json::to_value(EngagementStatus::Focused).unwrap(),
            json!("Focused")
        );
        assert_eq!(
            serde_json::to_value(EngagementStatus::Happy).unwrap(),
            json!("Happy")
        );
        assert_eq!(
            serde_json::to_value(EngagementStatus::Unknown).unwrap(),
            json!("Connecting...")
        );
        let parsed: EngagementStatus = serde_json::from_str("\"Connecting...\"").unwrap();
        assert_eq!(parsed, EngagementStatus::Unknown);
    }

    #[test]
    fn color_mapping() {
        assert_eq!(EngagementStatus::Focused.color(false), ColorTag::Green);
        assert_eq!(EngagementStatus::Happy.color(false), ColorTag::Green);
        assert_eq!(EngagementStatus::Confused.color(false), ColorTag::Yellow);
        assert_eq!(EngagementStatus::Unknown.color(false), ColorTag::Gray);
        // An active alert wins regardless of engagement.
        assert_eq!(EngagementStatus::Focused.color(true), ColorTag::Red);
        assert_eq!(
            serde_json::to_value(ColorTag::Gray).unwrap(),
            json!("gray")
        );
    }

    #[test]
    fn update_serializes_with_the_fixed_schema() {
        let update = SessionUpdate {
            status: EngagementStatus::Confused,
            color: ColorTag::Yellow,
            alert: None,
            timeline: vec![TimelinePoint(100.0, -1), TimelinePoint(100.5, 0)],
            video_frame: Some("data:image/jpeg;base64,AAAA".to_string()),
            timestamp: 101.0,
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "Confused",
                "color": "yellow",
                "alert": null,
                "timeline": [[100.0, -1], [100.5, 0]],
                "video_frame": "data:image/jpeg;base64,AAAA",
                "timestamp": 101.0,
            })
        );
    }
}
