//! Application state boundary.
//!
//! Whatever owns application state (a store, a UI bridge) receives one
//! `update_keypoints` call per frame per estimation kind: the latest
//! landmark set, or `None` when that kind detected nothing this frame.

use tracing::debug;

use crate::types::LandmarkSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypointKind {
    Hand,
    Face,
    Pose,
}

impl KeypointKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hand => "hand",
            Self::Face => "face",
            Self::Pose => "pose",
        }
    }
}

pub trait StateSink {
    fn update_keypoints(&mut self, kind: KeypointKind, value: Option<&LandmarkSet>);
}

/// Discards every update.
pub struct NullSink;

impl StateSink for NullSink {
    fn update_keypoints(&mut self, _kind: KeypointKind, _value: Option<&LandmarkSet>) {}
}

/// Logs update shapes at debug level. Used by the binary.
pub struct LoggingSink;

impl StateSink for LoggingSink {
    fn update_keypoints(&mut self, kind: KeypointKind, value: Option<&LandmarkSet>) {
        match value {
            Some(set) => debug!(kind = kind.as_str(), parts = set.len(), "keypoints updated"),
            None => debug!(kind = kind.as_str(), "keypoints cleared"),
        }
    }
}
