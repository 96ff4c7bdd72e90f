//! Camera acquisition
//!
//! Walks the constraint-profile ladder until the platform hands back a
//! stream, binds it to the video sink and gets playback going.
//!
//! # Features
//! - Profiles tried strictly in order, each at most once per acquisition
//! - Fixed pause between failed profiles so the camera driver is not hammered
//! - Playback start retried under a [`RetryPolicy`]
//! - Frames showing up on the sink count as "playing" even if the play call
//!   never settles
//!
//! The overall wall-clock timeout lives in the scanner, around [`CameraAcquirer::acquire`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CameraConfig;
use crate::models::{CaptureConstraintProfile, PlaybackOptions, RetryPolicy};
use crate::platform::{MediaDevices, MediaError, MediaStream, VideoSink};
use crate::scan_error::ScanError;

/// The one live stream of a scanner, bound to its video sink.
pub struct CaptureSession {
    id: Uuid,
    profile: CaptureConstraintProfile,
    stream: Arc<dyn MediaStream>,
    sink: Arc<dyn VideoSink>,
    stopped: AtomicBool,
}

impl CaptureSession {
    fn new(
        stream: Arc<dyn MediaStream>,
        sink: Arc<dyn VideoSink>,
        profile: CaptureConstraintProfile,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile,
            stream,
            sink,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn profile(&self) -> &CaptureConstraintProfile {
        &self.profile
    }

    pub fn stream_id(&self) -> &str {
        self.stream.id()
    }

    pub fn sink(&self) -> Arc<dyn VideoSink> {
        self.sink.clone()
    }

    pub fn is_active(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst) && self.stream.is_live()
    }

    /// Release every track and clear the sink. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stream.stop_tracks();
        self.sink.detach();
        info!(session_id = %self.id, stream_id = self.stream.id(), "Capture session stopped");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("profile", &self.profile.name)
            .field("stream_id", &self.stream.id())
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish()
    }
}

pub struct CameraAcquirer {
    devices: Arc<dyn MediaDevices>,
    profiles: Vec<CaptureConstraintProfile>,
    profile_retry_delay: Duration,
    playback_retry: RetryPolicy,
    readiness_poll: Duration,
}

impl CameraAcquirer {
    pub fn new(devices: Arc<dyn MediaDevices>, config: &CameraConfig) -> Self {
        Self::with_profiles(
            devices,
            CaptureConstraintProfile::default_ladder(config.target_resolution()),
            config,
        )
    }

    pub fn with_profiles(
        devices: Arc<dyn MediaDevices>,
        profiles: Vec<CaptureConstraintProfile>,
        config: &CameraConfig,
    ) -> Self {
        Self {
            devices,
            profiles,
            profile_retry_delay: Duration::from_millis(config.profile_retry_delay_ms),
            playback_retry: config.playback_retry(),
            readiness_poll: Duration::from_millis(config.readiness_poll_ms.max(1)),
        }
    }

    pub fn profiles(&self) -> &[CaptureConstraintProfile] {
        &self.profiles
    }

    /// Acquire a stream and start playback on `sink`. Always starts from the
    /// first profile.
    pub async fn acquire(&self, sink: Arc<dyn VideoSink>) -> Result<CaptureSession, ScanError> {
        let mut last_error: Option<MediaError> = None;

        for (index, profile) in self.profiles.iter().enumerate() {
            debug!(profile = %profile.name, attempt = index + 1, "Requesting camera");

            match self.devices.get_user_media(profile).await {
                Ok(stream) => {
                    let session = CaptureSession::new(Arc::from(stream), sink.clone(), profile.clone());
                    info!(
                        session_id = %session.id(),
                        stream_id = session.stream_id(),
                        profile = %profile.name,
                        "Camera stream acquired"
                    );

                    // Dropping the session on failure releases the stream
                    self.start_playback(&session).await?;
                    return Ok(session);
                }
                Err(e) => {
                    warn!(profile = %profile.name, error = %e, "Camera request failed");
                    last_error = Some(e);
                    if index + 1 < self.profiles.len() {
                        tokio::time::sleep(self.profile_retry_delay).await;
                    }
                }
            }
        }

        Err(match last_error {
            Some(e) => e.into(),
            None => ScanError::UnknownAcquisition("no capture profiles configured".to_string()),
        })
    }

    async fn start_playback(&self, session: &CaptureSession) -> Result<(), MediaError> {
        let sink = session.sink();
        sink.configure(PlaybackOptions::inline_muted_autoplay());
        sink.attach(session.stream.clone());

        let mut attempt = 0;
        loop {
            attempt += 1;

            // play() is always issued; frames only stand in for a stalled promise
            let outcome = tokio::select! {
                biased;
                result = sink.play() => result,
                _ = wait_for_frames(sink.as_ref(), self.readiness_poll) => {
                    debug!(session_id = %session.id(), "Frames arrived before play settled");
                    Ok(())
                }
            };

            match outcome {
                Ok(()) => {
                    info!(session_id = %session.id(), attempt, "Playback started");
                    return Ok(());
                }
                Err(e) if has_frames(sink.as_ref()) => {
                    debug!(error = %e, "Play rejected but frames are flowing");
                    return Ok(());
                }
                Err(e) => {
                    if !self.playback_retry.has_attempt_after(attempt) {
                        warn!(session_id = %session.id(), attempt, error = %e, "Playback never started");
                        return Err(e);
                    }
                    warn!(session_id = %session.id(), attempt, error = %e, "Play rejected, retrying");
                    tokio::time::sleep(Duration::from_millis(self.playback_retry.delay_ms)).await;
                }
            }
        }
    }
}

fn has_frames(sink: &dyn VideoSink) -> bool {
    let (width, height) = sink.dimensions();
    width > 0 && height > 0
}

async fn wait_for_frames(sink: &dyn VideoSink, poll: Duration) {
    while !has_frames(sink) {
        tokio::time::sleep(poll).await;
    }
}
