//! Platform capability boundary
//!
//! The scanner never touches a camera, a video element, or a network stack
//! directly. Hosts implement these traits:
//!
//! - [`MediaDevices`]: permission query, device enumeration and capture
//!   requests (getUserMedia in a browser)
//! - [`MediaStream`]: one live capture stream and its tracks
//! - [`VideoSink`]: the element a stream is rendered into and frames are
//!   read back from
//! - [`Navigator`]: client side navigation after a successful entry
//!
//! [`frame_folder`] and [`stream_sink`] provide a native implementation that
//! replays image files as a camera.

pub mod frame_folder;
pub mod stream_sink;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CaptureConstraintProfile, PermissionState, PlaybackOptions};
use crate::scan_error::ScanError;

/// Error classes reported by capture APIs. Parsed from DOMException names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaErrorKind {
    NotAllowed,
    Security,
    NotFound,
    NotReadable,
    Abort,
    Overconstrained,
    NotSupported,
    Other,
}

impl MediaErrorKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" => MediaErrorKind::NotAllowed,
            "SecurityError" => MediaErrorKind::Security,
            "NotFoundError" | "DevicesNotFoundError" => MediaErrorKind::NotFound,
            "NotReadableError" | "TrackStartError" => MediaErrorKind::NotReadable,
            "AbortError" => MediaErrorKind::Abort,
            "OverconstrainedError" | "ConstraintNotSatisfiedError" => {
                MediaErrorKind::Overconstrained
            }
            "NotSupportedError" | "TypeError" => MediaErrorKind::NotSupported,
            _ => MediaErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct MediaError {
    pub kind: MediaErrorKind,
    pub message: String,
}

impl MediaError {
    pub fn new(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_dom_exception(name: &str, message: impl Into<String>) -> Self {
        Self::new(MediaErrorKind::from_name(name), message)
    }
}

impl From<MediaError> for ScanError {
    fn from(err: MediaError) -> Self {
        let message = err.message;
        match err.kind {
            MediaErrorKind::NotAllowed | MediaErrorKind::Security => {
                ScanError::PermissionDenied(message)
            }
            MediaErrorKind::NotFound => ScanError::DeviceNotFound(message),
            MediaErrorKind::NotReadable | MediaErrorKind::Abort => {
                ScanError::DeviceUnavailable(message)
            }
            MediaErrorKind::Overconstrained => ScanError::ConstraintsUnsupported(message),
            MediaErrorKind::NotSupported | MediaErrorKind::Other => {
                ScanError::UnknownAcquisition(message)
            }
        }
    }
}

/// Off-screen RGBA pixel buffer, row major, 4 bytes per pixel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbaFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Resize to `width` x `height`, reusing the allocation when possible.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.data.resize(width as usize * height as usize * 4, 0);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Rec. 601 luma of the pixel at (x, y).
    pub fn luma(&self, x: usize, y: usize) -> u8 {
        let i = (y * self.width as usize + x) * 4;
        let (r, g, b) = (
            self.data[i] as u32,
            self.data[i + 1] as u32,
            self.data[i + 2] as u32,
        );
        ((r * 299 + g * 587 + b * 114) / 1000) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInputDevice {
    pub id: String,
    pub label: String,
}

/// Capture device access (navigator.mediaDevices in a browser).
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Whether the capture API exists at all.
    fn is_supported(&self) -> bool;

    async fn query_camera_permission(&self) -> Result<PermissionState, MediaError>;

    async fn enumerate_video_inputs(&self) -> Result<Vec<VideoInputDevice>, MediaError>;

    async fn get_user_media(
        &self,
        profile: &CaptureConstraintProfile,
    ) -> Result<Box<dyn MediaStream>, MediaError>;
}

/// A live capture stream.
pub trait MediaStream: Send + Sync {
    fn id(&self) -> &str;

    /// True until every track has been stopped.
    fn is_live(&self) -> bool;

    /// Stop every track. Calling it again has no effect.
    fn stop_tracks(&self);

    /// Native frame size; zero until the first frame is available.
    fn frame_size(&self) -> (u32, u32);

    /// Copy the current frame into `target`, which is already sized to
    /// [`MediaStream::frame_size`].
    fn read_frame(&self, target: &mut RgbaFrame) -> Result<(), MediaError>;
}

/// The element a stream is rendered into (a `<video>` in a browser).
#[async_trait]
pub trait VideoSink: Send + Sync {
    fn configure(&self, options: PlaybackOptions);

    fn attach(&self, stream: std::sync::Arc<dyn MediaStream>);

    /// Clear the source. Safe to call when nothing is attached.
    fn detach(&self);

    /// Start playback. May reject, and on some platforms may never settle.
    async fn play(&self) -> Result<(), MediaError>;

    /// Rendered video size; zero while no frame is available.
    fn dimensions(&self) -> (u32, u32);

    /// Copy the visible frame into `target`, already sized to
    /// [`VideoSink::dimensions`].
    fn draw_frame(&self, target: &mut RgbaFrame) -> Result<(), MediaError>;

    /// Wait for the next display frame (requestAnimationFrame).
    async fn next_frame(&self) {
        tokio::task::yield_now().await;
    }
}

/// Client side navigation.
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: &str);
}
