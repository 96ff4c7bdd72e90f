use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::models::PlaybackOptions;

use super::{MediaError, MediaErrorKind, MediaStream, RgbaFrame, VideoSink};

/// Display refresh used for [`VideoSink::next_frame`] (~60 Hz).
const FRAME_TICK: Duration = Duration::from_millis(16);

/// Video sink that renders straight from the attached [`MediaStream`].
#[derive(Default)]
pub struct StreamVideoSink {
    source: Mutex<Option<Arc<dyn MediaStream>>>,
    options: Mutex<Option<PlaybackOptions>>,
}

impl StreamVideoSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playback_options(&self) -> Option<PlaybackOptions> {
        *self.options.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn has_source(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<Arc<dyn MediaStream>> {
        self.source
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl VideoSink for StreamVideoSink {
    fn configure(&self, options: PlaybackOptions) {
        *self.options.lock().unwrap_or_else(|e| e.into_inner()) = Some(options);
    }

    fn attach(&self, stream: Arc<dyn MediaStream>) {
        *self.source.lock().unwrap_or_else(|e| e.into_inner()) = Some(stream);
    }

    fn detach(&self) {
        self.source.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    async fn play(&self) -> Result<(), MediaError> {
        match self.current() {
            Some(stream) if stream.is_live() => Ok(()),
            Some(_) => Err(MediaError::new(MediaErrorKind::Abort, "stream has ended")),
            None => Err(MediaError::new(MediaErrorKind::Abort, "no source attached")),
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        match self.current() {
            Some(stream) if stream.is_live() => stream.frame_size(),
            _ => (0, 0),
        }
    }

    fn draw_frame(&self, target: &mut RgbaFrame) -> Result<(), MediaError> {
        match self.current() {
            Some(stream) => stream.read_frame(target),
            None => Err(MediaError::new(MediaErrorKind::Abort, "no source attached")),
        }
    }

    async fn next_frame(&self) {
        tokio::time::sleep(FRAME_TICK).await;
    }
}
