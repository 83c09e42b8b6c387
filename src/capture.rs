//! Camera device lifecycle.
//!
//! [`CaptureManager`] owns the single active [`CaptureSession`] and its
//! state machine (`Idle -> Starting -> Running -> Stopping -> Idle`, with
//! `Error` reachable from `Starting`/`Running`). The actual device is
//! reached through the [`CameraBackend`] trait; [`NokhwaBackend`] is the
//! production implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{imageops, ImageBuffer, Rgb};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
    Camera,
};
use tracing::{info, warn};

use crate::error::CaptureError;
use crate::types::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Starting,
    Running,
    Stopping,
    Error,
}

/// Camera capability boundary: opens a device and yields a live pixel
/// source.
pub trait CameraBackend {
    fn open(
        &mut self,
        device: &str,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn PixelSource>, CaptureError>;
}

/// A live pixel buffer produced by an open device.
pub trait PixelSource {
    fn native_dimensions(&self) -> (u32, u32);
    fn grab(&mut self) -> Result<ImageBuffer<Rgb<u8>, Vec<u8>>, CaptureError>;
    fn close(&mut self);
}

/// One open camera device handle. Exactly one may be active at a time.
struct CaptureSession {
    device: String,
    source: Box<dyn PixelSource>,
    requested: (u32, u32),
}

/// Owner of the camera device handle and its open/close state machine.
pub struct CaptureManager {
    backend: Box<dyn CameraBackend>,
    state: CaptureState,
    running: Arc<AtomicBool>,
    session: Option<CaptureSession>,
    // Bumped by every stop(); a start() that observes a bump while opening
    // was superseded and must behave as if it never started.
    epoch: u64,
}

impl CaptureManager {
    pub fn new(backend: Box<dyn CameraBackend>) -> Self {
        Self {
            backend,
            state: CaptureState::Idle,
            running: Arc::new(AtomicBool::new(false)),
            session: None,
            epoch: 0,
        }
    }

    /// Open `device` and expose a live pixel source. The device may deliver
    /// more pixels than requested; frames are clamped to the requested size.
    /// Returns the negotiated output dimensions.
    pub fn start(
        &mut self,
        device: &str,
        width: u32,
        height: u32,
    ) -> Result<(u32, u32), CaptureError> {
        if matches!(self.state, CaptureState::Starting | CaptureState::Running) {
            return Err(CaptureError::AlreadyRunning);
        }
        self.state = CaptureState::Starting;
        let epoch = self.epoch;

        let source = match self.backend.open(device, width, height) {
            Ok(source) => source,
            Err(e) => {
                self.state = CaptureState::Error;
                return Err(e);
            }
        };

        if self.epoch != epoch {
            // A stop() raced this start and wins.
            let mut source = source;
            source.close();
            self.state = CaptureState::Idle;
            return Err(CaptureError::Backend("start superseded by stop".into()));
        }

        let native = source.native_dimensions();
        let out = (width.min(native.0), height.min(native.1));
        info!(
            device,
            native_w = native.0,
            native_h = native.1,
            out_w = out.0,
            out_h = out.1,
            "capture session started"
        );

        self.session = Some(CaptureSession {
            device: device.to_string(),
            source,
            requested: (width, height),
        });
        self.state = CaptureState::Running;
        self.running.store(true, Ordering::SeqCst);
        Ok(out)
    }

    /// Release the device and all associated tracks. Idempotent: a no-op
    /// while `Idle`.
    pub fn stop(&mut self) {
        self.epoch += 1;
        if self.state == CaptureState::Idle {
            return;
        }
        self.state = CaptureState::Stopping;
        if let Some(mut session) = self.session.take() {
            session.source.close();
            info!(device = %session.device, "capture session stopped");
        }
        self.running.store(false, Ordering::SeqCst);
        self.state = CaptureState::Idle;
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Observable running flag other components poll to decide whether to
    /// continue processing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Grab the current frame, clamped to the requested dimensions.
    pub fn current_frame(&mut self) -> Result<Frame, CaptureError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CaptureError::Backend("no active capture session".into()))?;
        let image = session.source.grab()?;
        let (rw, rh) = session.requested;
        let image = if image.width() > rw || image.height() > rh {
            imageops::crop_imm(&image, 0, 0, rw.min(image.width()), rh.min(image.height()))
                .to_image()
        } else {
            image
        };
        Ok(Frame::new(image))
    }
}

/// Production backend over nokhwa.
pub struct NokhwaBackend;

impl NokhwaBackend {
    /// Devices visible to the backend, as `(index, human name)` pairs.
    pub fn list_devices() -> Result<Vec<(u32, String)>, CaptureError> {
        let cameras = nokhwa::query(nokhwa::utils::ApiBackend::Auto)
            .map_err(|e| CaptureError::Backend(e.to_string()))?;
        Ok(cameras
            .iter()
            .map(|c| (c.index().as_index().unwrap_or(0), c.human_name()))
            .collect())
    }
}

impl CameraBackend for NokhwaBackend {
    fn open(
        &mut self,
        device: &str,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn PixelSource>, CaptureError> {
        let index: u32 = device
            .parse()
            .map_err(|_| CaptureError::DeviceUnavailable(device.to_string()))?;
        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, 30),
        ));
        let mut camera = Camera::new(CameraIndex::Index(index), format)
            .map_err(|e| classify_nokhwa_error(device, e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| classify_nokhwa_error(device, e.to_string()))?;
        info!(name = %camera.info().human_name(), "opened camera");
        Ok(Box::new(NokhwaSource { camera }))
    }
}

fn classify_nokhwa_error(device: &str, message: String) -> CaptureError {
    if message.to_lowercase().contains("permission") {
        CaptureError::PermissionDenied(device.to_string())
    } else {
        CaptureError::DeviceUnavailable(format!("{device}: {message}"))
    }
}

struct NokhwaSource {
    camera: Camera,
}

impl PixelSource for NokhwaSource {
    fn native_dimensions(&self) -> (u32, u32) {
        let res = self.camera.resolution();
        (res.width(), res.height())
    }

    fn grab(&mut self) -> Result<ImageBuffer<Rgb<u8>, Vec<u8>>, CaptureError> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| CaptureError::Backend(e.to_string()))?;
        frame
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::FrameDecode(e.to_string()))
    }

    fn close(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!(error = %e, "camera stream did not stop cleanly");
        }
    }
}
