//! Typed errors for every subsystem.
//!
//! Capture, inference, streaming and geometry each get their own enum so a
//! caller can match on exactly the failures that subsystem can produce.
//! Nothing here is fatal to the process: every variant is scoped to one
//! session and recoverable by calling `start()` / `connect()` again.

use thiserror::Error;

/// Errors from the capture lifecycle manager.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No camera matched the requested device id.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The platform refused access to the device.
    #[error("permission denied for device {0}")]
    PermissionDenied(String),

    /// `start()` was called while a session is already starting or running.
    #[error("capture already running")]
    AlreadyRunning,

    /// The backend failed to deliver or decode a frame.
    #[error("frame decode failed: {0}")]
    FrameDecode(String),

    /// The underlying device handle reported an error mid-session.
    #[error("camera backend error: {0}")]
    Backend(String),
}

/// Per-model inference failure. Non-fatal: the adapter absorbs these and the
/// frame proceeds as if the model had detected nothing.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("failed to load model {name}: {reason}")]
    ModelLoad { name: &'static str, reason: String },

    #[error("model {name} failed on frame: {reason}")]
    InferenceFailure { name: &'static str, reason: String },

    /// Model produced an output tensor with an unexpected shape.
    #[error("model {name} returned malformed output ({got} values, expected {expected})")]
    MalformedOutput {
        name: &'static str,
        got: usize,
        expected: usize,
    },
}

/// Errors from the streaming publisher and its transport.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Operation requested in a link state that forbids it.
    #[error("invalid link state: {0}")]
    InvalidState(&'static str),

    /// The transport dropped mid-session; the publisher will reconnect.
    #[error("connection dropped: {0}")]
    ConnectionDropped(String),

    /// The transport could not be established.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The outbound queue to the transport task is gone.
    #[error("transport channel closed")]
    ChannelClosed,
}

/// Errors from pure geometry computation.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The landmark set does not contain the canonical anchor points.
    #[error("insufficient landmarks: need at least {required}, got {actual}")]
    InsufficientLandmarks { required: usize, actual: usize },
}

/// Errors surfaced by the frame pipeline orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// `start()` was called while the pipeline is starting or running.
    #[error("pipeline already running")]
    AlreadyRunning,

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for StreamError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        StreamError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = CaptureError::DeviceUnavailable("cam7".into());
        assert!(e.to_string().contains("cam7"));

        let e = InferenceError::MalformedOutput {
            name: "face_mesh",
            got: 12,
            expected: 1404,
        };
        assert!(e.to_string().contains("1404"));

        let e = GeometryError::InsufficientLandmarks {
            required: 468,
            actual: 3,
        };
        assert!(e.to_string().contains("468"));
    }

    #[test]
    fn pipeline_wraps_capture() {
        let e: PipelineError = CaptureError::AlreadyRunning.into();
        assert!(matches!(e, PipelineError::Capture(_)));
    }
}
