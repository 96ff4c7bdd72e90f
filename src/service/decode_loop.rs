use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::platform::{RgbaFrame, VideoSink};
use crate::service::qr_decoder::QrDecoder;

/// Copies the visible frame into a reusable off-screen buffer sized to the
/// video's native resolution.
#[derive(Debug, Default)]
pub struct FrameSampler {
    buffer: RgbaFrame,
}

impl FrameSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Ok(None)` while the sink has no frame yet.
    pub fn sample(&mut self, sink: &dyn VideoSink) -> Result<Option<&RgbaFrame>, crate::platform::MediaError> {
        let (width, height) = sink.dimensions();
        if width == 0 || height == 0 {
            return Ok(None);
        }
        self.buffer.resize(width, height);
        sink.draw_frame(&mut self.buffer)?;
        Ok(Some(&self.buffer))
    }
}

/// A running decode loop. Dropping the handle does not stop the loop; call
/// [`DecodeLoopHandle::cancel`].
pub struct DecodeLoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<Option<String>>,
}

impl DecodeLoopHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end. `None` means it was cancelled.
    pub async fn payload(self) -> Option<String> {
        match self.task.await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Decode loop task failed");
                None
            }
        }
    }
}

pub struct DecodeLoop;

impl DecodeLoop {
    /// Spawn a loop that samples `sink` every `interval` and stops at the
    /// first decoded payload or when `cancel` fires.
    pub fn spawn(
        sink: Arc<dyn VideoSink>,
        decoder: Arc<dyn QrDecoder>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> DecodeLoopHandle {
        let token = cancel.clone();
        let task = tokio::spawn(async move { run(sink, decoder, interval, token).await });
        DecodeLoopHandle { cancel, task }
    }
}

async fn run(
    sink: Arc<dyn VideoSink>,
    decoder: Arc<dyn QrDecoder>,
    interval: Duration,
    cancel: CancellationToken,
) -> Option<String> {
    let mut sampler = FrameSampler::new();
    let mut frames: u64 = 0;

    debug!("Decode loop started");

    loop {
        if cancel.is_cancelled() {
            debug!(frames, "Decode loop cancelled");
            return None;
        }

        match sampler.sample(sink.as_ref()) {
            Ok(Some(frame)) => {
                frames += 1;
                match decoder.decode(frame) {
                    Ok(Some(payload)) => {
                        info!(frames, "QR code decoded");
                        return Some(payload);
                    }
                    Ok(None) => {}
                    // One bad frame must not end the scan
                    Err(e) => debug!(error = %e, "Frame decode failed"),
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Frame capture failed"),
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(frames, "Decode loop cancelled");
                return None;
            }
            _ = async {
                tokio::time::sleep(interval).await;
                sink.next_frame().await;
            } => {}
        }
    }
}
