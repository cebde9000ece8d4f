//! Raw detection primitives as delivered by the vision collaborator

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One labelled bounding box from template matching
///
/// `kind` and `region` are optional on the wire so that malformed input can be
/// reported as an `InvalidDetection` instead of failing deserialization of the
/// whole frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub kind: Option<String>,
    /// `(x, y, w, h)` in screen pixels
    pub region: Option<[f32; 4]>,
    pub confidence: f32,
    /// Numeric readings extracted alongside the box (gauge level, stats, ...)
    #[serde(default)]
    pub readings: BTreeMap<String, f32>,
    /// Text read from the box, e.g. a dweller name
    #[serde(default)]
    pub text: Option<String>,
}

impl RawDetection {
    pub fn new(kind: &str, region: [f32; 4], confidence: f32) -> Self {
        Self {
            kind: Some(kind.to_string()),
            region: Some(region),
            confidence,
            readings: BTreeMap::new(),
            text: None,
        }
    }

    pub fn with_reading(mut self, name: &str, value: f32) -> Self {
        self.readings.insert(name.to_string(), value);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }
}

/// Everything the vision collaborator saw in one capture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub captured_at_ms: u64,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

impl Frame {
    pub fn new(captured_at_ms: u64, detections: Vec<RawDetection>) -> Self {
        Self {
            captured_at_ms,
            detections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_from_json_line() {
        let line = r#"{"captured_at_ms":1200,"detections":[
            {"kind":"resource:power","region":[10,5,80,12],"confidence":0.93,"readings":{"level":64,"capacity":100}},
            {"kind":"dweller","region":[300,200,20,40],"confidence":0.8,"text":"Elena"}
        ]}"#;
        let frame: Frame = serde_json::from_str(line).unwrap();
        assert_eq!(frame.captured_at_ms, 1200);
        assert_eq!(frame.detections.len(), 2);
        assert_eq!(frame.detections[0].readings["level"], 64.0);
        assert_eq!(frame.detections[1].text.as_deref(), Some("Elena"));
    }

    #[test]
    fn test_missing_fields_still_deserialize() {
        let frame: Frame =
            serde_json::from_str(r#"{"captured_at_ms":0,"detections":[{"confidence":0.9}]}"#)
                .unwrap();
        assert!(frame.detections[0].kind.is_none());
        assert!(frame.detections[0].region.is_none());
    }
}
