use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{CaptureConstraintProfile, PermissionState};

use super::{MediaDevices, MediaError, MediaErrorKind, MediaStream, RgbaFrame, VideoInputDevice};

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Camera backed by a directory of still images, replayed in file name
/// order and looped.
pub struct FrameFolderDevices {
    dir: PathBuf,
}

impl FrameFolderDevices {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn frame_paths(&self) -> Result<Vec<PathBuf>, MediaError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| listing_error(&self.dir, MediaErrorKind::NotFound, e))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| listing_error(&self.dir, MediaErrorKind::NotReadable, e))?
        {
            let path = entry.path();
            if is_frame_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn listing_error(dir: &Path, kind: MediaErrorKind, err: std::io::Error) -> MediaError {
    MediaError::new(kind, format!("{}: {}", dir.display(), err))
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode encoded image bytes (PNG or JPEG) into an RGBA frame.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaFrame, image::ImageError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    Ok(RgbaFrame {
        width: rgba.width(),
        height: rgba.height(),
        data: rgba.into_raw(),
    })
}

#[async_trait]
impl MediaDevices for FrameFolderDevices {
    fn is_supported(&self) -> bool {
        true
    }

    async fn query_camera_permission(&self) -> Result<PermissionState, MediaError> {
        Ok(PermissionState::Granted)
    }

    async fn enumerate_video_inputs(&self) -> Result<Vec<VideoInputDevice>, MediaError> {
        let paths = self.frame_paths().await?;
        if paths.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![VideoInputDevice {
            id: self.dir.display().to_string(),
            label: format!("Frame folder ({} frames)", paths.len()),
        }])
    }

    async fn get_user_media(
        &self,
        profile: &CaptureConstraintProfile,
    ) -> Result<Box<dyn MediaStream>, MediaError> {
        let paths = self.frame_paths().await?;

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            let bytes = match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable frame");
                    continue;
                }
            };
            match decode_image(&bytes) {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping undecodable frame"),
            }
        }

        if frames.is_empty() {
            return Err(MediaError::new(
                MediaErrorKind::NotFound,
                format!("no frames in {}", self.dir.display()),
            ));
        }

        if let Some(res) = profile.resolution {
            debug!(
                profile = %profile.name,
                width = res.width,
                height = res.height,
                "Frame folder ignores requested resolution"
            );
        }

        let stream = FrameFolderStream::new(frames);
        info!(
            stream_id = stream.id(),
            frames = stream.frames.len(),
            profile = %profile.name,
            "Opened frame folder stream"
        );
        Ok(Box::new(stream))
    }
}

pub struct FrameFolderStream {
    id: String,
    frames: Vec<RgbaFrame>,
    cursor: AtomicUsize,
    live: AtomicBool,
}

impl FrameFolderStream {
    pub fn new(frames: Vec<RgbaFrame>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            frames,
            cursor: AtomicUsize::new(0),
            live: AtomicBool::new(true),
        }
    }

    fn current(&self) -> Option<&RgbaFrame> {
        if self.frames.is_empty() {
            return None;
        }
        let i = self.cursor.load(Ordering::Relaxed) % self.frames.len();
        self.frames.get(i)
    }
}

impl MediaStream for FrameFolderStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop_tracks(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            debug!(stream_id = %self.id, "Frame folder stream stopped");
        }
    }

    fn frame_size(&self) -> (u32, u32) {
        self.current().map(|f| (f.width, f.height)).unwrap_or((0, 0))
    }

    fn read_frame(&self, target: &mut RgbaFrame) -> Result<(), MediaError> {
        if !self.is_live() {
            return Err(MediaError::new(MediaErrorKind::Abort, "stream stopped"));
        }
        let frame = self
            .current()
            .ok_or_else(|| MediaError::new(MediaErrorKind::NotReadable, "no frames"))?;
        if target.width != frame.width || target.height != frame.height {
            return Err(MediaError::new(
                MediaErrorKind::NotReadable,
                "target buffer does not match frame size",
            ));
        }
        target.data.copy_from_slice(&frame.data);
        self.cursor.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> RgbaFrame {
        RgbaFrame {
            width,
            height,
            data: vec![value; width as usize * height as usize * 4],
        }
    }

    #[test]
    fn test_frame_file_extensions() {
        assert!(is_frame_file(Path::new("a/frame-001.png")));
        assert!(is_frame_file(Path::new("a/frame.JPG")));
        assert!(!is_frame_file(Path::new("a/notes.txt")));
        assert!(!is_frame_file(Path::new("a/noext")));
    }

    #[test]
    fn test_stream_cycles_frames() {
        let stream = FrameFolderStream::new(vec![solid(2, 2, 10), solid(2, 2, 20)]);
        let mut target = RgbaFrame::new(2, 2);

        stream.read_frame(&mut target).unwrap();
        assert_eq!(target.data[0], 10);
        stream.read_frame(&mut target).unwrap();
        assert_eq!(target.data[0], 20);
        stream.read_frame(&mut target).unwrap();
        assert_eq!(target.data[0], 10);
    }

    #[test]
    fn test_stop_tracks_is_idempotent() {
        let stream = FrameFolderStream::new(vec![solid(1, 1, 0)]);
        assert!(stream.is_live());
        stream.stop_tracks();
        stream.stop_tracks();
        assert!(!stream.is_live());
        assert!(stream.read_frame(&mut RgbaFrame::new(1, 1)).is_err());
    }

    #[test]
    fn test_decode_image_rejects_garbage() {
        assert!(decode_image(b"definitely not a png").is_err());
    }

    #[test]
    fn test_listing_error_keeps_kind_and_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "entry vanished");
        let err = listing_error(Path::new("/frames"), MediaErrorKind::NotReadable, io);

        assert_eq!(err.kind, MediaErrorKind::NotReadable);
        assert!(err.message.starts_with("/frames: "));
        assert!(matches!(
            crate::scan_error::ScanError::from(err),
            crate::scan_error::ScanError::DeviceUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_folder_is_not_found() {
        let devices = FrameFolderDevices::new("/nonexistent/bungu-frames");
        let err = devices
            .get_user_media(&CaptureConstraintProfile::basic())
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind, MediaErrorKind::NotFound);
        assert!(devices.enumerate_video_inputs().await.is_err());
    }
}
