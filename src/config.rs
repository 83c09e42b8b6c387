use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub estimation: EstimationConfig,
    pub streaming: StreamingConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    pub hand_model: String,
    pub face_mesh_model: String,
    pub face_detector_model: String,
    pub pose_model: String,
    pub min_pose_confidence: f32,
    pub min_part_confidence: f32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub url: String,
    pub room: String,
    pub reconnect_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub mirror: bool,
    pub keypoint_color_hex: String,
    pub hand_color_hex: String,
    pub mesh_color_hex: String,
    pub point_radius: f32,
    pub overlay_scale: f32,
    pub axis_length: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
            fps: 60,
        }
    }
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            hand_model: "models/hand_landmark.onnx".to_string(),
            face_mesh_model: "models/face_mesh.onnx".to_string(),
            face_detector_model: "models/face_detection.onnx".to_string(),
            pose_model: "models/pose.onnx".to_string(),
            min_pose_confidence: 0.15,
            min_part_confidence: 0.1,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:5000".to_string(),
            room: "webclient".to_string(),
            reconnect_ms: 1000,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            mirror: true,
            keypoint_color_hex: "#FF0000".to_string(),
            hand_color_hex: "#0000FF".to_string(),
            mesh_color_hex: "#808080".to_string(),
            point_radius: 2.0,
            overlay_scale: 1.0,
            axis_length: 100.0,
        }
    }
}

impl AppConfig {
    const PATH: &'static str = "config.json";

    /// Load `config.json`, falling back to defaults on a missing or broken
    /// file, then save back so new fields appear in the file.
    pub fn load() -> Result<Self> {
        let config = if Path::new(Self::PATH).exists() {
            let content = fs::read_to_string(Self::PATH)?;
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(c) => {
                    info!(path = Self::PATH, "configuration loaded");
                    c
                }
                Err(e) => {
                    warn!(error = %e, "config parse failed, using defaults");
                    Self::default()
                }
            }
        } else {
            info!(path = Self::PATH, "no configuration file, creating default");
            Self::default()
        };

        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(Self::PATH, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.capture.width, 300);
        assert_eq!(back.streaming.room, "webclient");
        assert!(back.ui.mirror);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"capture":{"width":640}}"#).unwrap();
        assert_eq!(config.capture.width, 640);
        // Height was absent: section default applies.
        assert_eq!(config.capture.height, 300);
        assert_eq!(config.estimation.min_pose_confidence, 0.15);
    }
}
