//! Live camera landmark tracking.
//!
//! Captures frames from a camera device, runs hand / face / body landmark
//! models on each one, renders the detections onto a software surface and
//! streams the landmark coordinates to a remote consumer over a
//! persistent WebSocket channel.

pub mod capture;
pub mod config;
pub mod detector;
pub mod error;
pub mod estimator;
pub mod head_pose;
pub mod inference;
pub mod output;
pub mod pipeline;
pub mod sink;
pub mod streaming;
pub mod types;
pub mod vis;

pub use config::AppConfig;
pub use estimator::{Estimate, EstimationMode, Estimator};
pub use pipeline::{Orchestrator, PipelineHandle, PipelineState};
pub use types::{FaceMesh, Frame, Hand, Landmark, LandmarkSet, Pose};
