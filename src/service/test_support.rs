//! In-memory platform doubles shared by the service tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::CameraConfig;
use crate::models::{CaptureConstraintProfile, PermissionState, PlaybackOptions, PlayerSession};
use crate::platform::{
    MediaDevices, MediaError, MediaErrorKind, MediaStream, Navigator, RgbaFrame,
    VideoInputDevice, VideoSink,
};
use crate::service::qr_decoder::{DecodeError, QrDecoder};
use crate::service::tournament_api::{ApiClientError, TournamentApi};

pub fn fast_camera_config() -> CameraConfig {
    CameraConfig {
        acquisition_timeout_ms: 500,
        profile_retry_delay_ms: 1,
        playback_max_attempts: 3,
        playback_retry_delay_ms: 1,
        readiness_poll_ms: 1,
        probe_timeout_ms: 50,
        ..CameraConfig::default()
    }
}

pub struct FakeStream {
    id: String,
    live: Arc<AtomicBool>,
    size: (u32, u32),
}

impl FakeStream {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            live: Arc::new(AtomicBool::new(true)),
            size: (width, height),
        }
    }
}

impl MediaStream for FakeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop_tracks(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn frame_size(&self) -> (u32, u32) {
        self.size
    }

    fn read_frame(&self, target: &mut RgbaFrame) -> Result<(), MediaError> {
        target.data.fill(128);
        Ok(())
    }
}

/// Fails the profiles named in `failures`, grants every other request.
pub struct FakeDevices {
    failures: HashMap<String, MediaErrorKind>,
    hanging_profiles: Vec<String>,
    supported: bool,
    probe_failure: Option<MediaErrorKind>,
    hanging_probe: bool,
    attempts: Mutex<Vec<String>>,
    streams: Mutex<Vec<Arc<AtomicBool>>>,
    probe_calls: AtomicUsize,
}

impl FakeDevices {
    pub fn new(failures: Vec<(&str, MediaErrorKind)>) -> Self {
        Self {
            failures: failures
                .into_iter()
                .map(|(name, kind)| (name.to_string(), kind))
                .collect(),
            hanging_profiles: vec![],
            supported: true,
            probe_failure: None,
            hanging_probe: false,
            attempts: Mutex::new(vec![]),
            streams: Mutex::new(vec![]),
            probe_calls: AtomicUsize::new(0),
        }
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn with_probe_failure(mut self, kind: MediaErrorKind) -> Self {
        self.probe_failure = Some(kind);
        self
    }

    pub fn with_hanging_probe(mut self) -> Self {
        self.hanging_probe = true;
        self
    }

    /// Requests for `profile` never settle.
    pub fn with_hanging_profile(mut self, profile: &str) -> Self {
        self.hanging_profiles.push(profile.to_string());
        self
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn clear_attempts(&self) {
        self.attempts.lock().unwrap().clear();
    }

    pub fn live_streams(&self) -> usize {
        self.streams
            .lock()
            .unwrap()
            .iter()
            .filter(|live| live.load(Ordering::SeqCst))
            .count()
    }

    pub fn streams_opened(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    async fn probe<T>(&self, value: T) -> Result<T, MediaError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging_probe {
            std::future::pending::<()>().await;
        }
        match self.probe_failure {
            Some(kind) => Err(MediaError::new(kind, "probe failed")),
            None => Ok(value),
        }
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn query_camera_permission(&self) -> Result<PermissionState, MediaError> {
        self.probe(PermissionState::Granted).await
    }

    async fn enumerate_video_inputs(&self) -> Result<Vec<VideoInputDevice>, MediaError> {
        self.probe(vec![VideoInputDevice {
            id: "cam-0".to_string(),
            label: "Fake camera".to_string(),
        }])
        .await
    }

    async fn get_user_media(
        &self,
        profile: &CaptureConstraintProfile,
    ) -> Result<Box<dyn MediaStream>, MediaError> {
        self.attempts.lock().unwrap().push(profile.name.clone());

        if self.hanging_profiles.contains(&profile.name) {
            std::future::pending::<()>().await;
        }
        if let Some(kind) = self.failures.get(&profile.name) {
            return Err(MediaError::new(*kind, format!("{} refused", profile.name)));
        }

        let stream = FakeStream::new(640, 480);
        self.streams.lock().unwrap().push(stream.live.clone());
        Ok(Box::new(stream))
    }
}

#[derive(Debug, Clone)]
pub enum PlayBehavior {
    Resolve,
    Reject(MediaErrorKind),
    Hang,
}

pub struct FakeSink {
    source: Mutex<Option<Arc<dyn MediaStream>>>,
    options: Mutex<Option<PlaybackOptions>>,
    play_script: Mutex<VecDeque<PlayBehavior>>,
    zero_dimensions: bool,
    play_calls: AtomicUsize,
    draw_calls: AtomicUsize,
    detach_calls: AtomicUsize,
}

impl FakeSink {
    pub fn new() -> Self {
        Self {
            source: Mutex::new(None),
            options: Mutex::new(None),
            play_script: Mutex::new(VecDeque::new()),
            zero_dimensions: false,
            play_calls: AtomicUsize::new(0),
            draw_calls: AtomicUsize::new(0),
            detach_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_zero_dimensions(mut self) -> Self {
        self.zero_dimensions = true;
        self
    }

    /// Behaviour of successive `play` calls; resolves once exhausted.
    pub fn with_play_script(self, script: Vec<PlayBehavior>) -> Self {
        *self.play_script.lock().unwrap() = script.into();
        self
    }

    pub fn has_source(&self) -> bool {
        self.source.lock().unwrap().is_some()
    }

    pub fn options(&self) -> Option<PlaybackOptions> {
        *self.options.lock().unwrap()
    }

    pub fn play_calls(&self) -> usize {
        self.play_calls.load(Ordering::SeqCst)
    }

    pub fn draw_calls(&self) -> usize {
        self.draw_calls.load(Ordering::SeqCst)
    }

    pub fn detach_calls(&self) -> usize {
        self.detach_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoSink for FakeSink {
    fn configure(&self, options: PlaybackOptions) {
        *self.options.lock().unwrap() = Some(options);
    }

    fn attach(&self, stream: Arc<dyn MediaStream>) {
        *self.source.lock().unwrap() = Some(stream);
    }

    fn detach(&self) {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        self.source.lock().unwrap().take();
    }

    async fn play(&self) -> Result<(), MediaError> {
        self.play_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .play_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PlayBehavior::Resolve);
        match behavior {
            PlayBehavior::Resolve => Ok(()),
            PlayBehavior::Reject(kind) => Err(MediaError::new(kind, "play() rejected")),
            PlayBehavior::Hang => std::future::pending().await,
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        if self.zero_dimensions {
            return (0, 0);
        }
        match self.source.lock().unwrap().as_ref() {
            Some(stream) if stream.is_live() => stream.frame_size(),
            _ => (0, 0),
        }
    }

    fn draw_frame(&self, target: &mut RgbaFrame) -> Result<(), MediaError> {
        self.draw_calls.fetch_add(1, Ordering::SeqCst);
        let source = self.source.lock().unwrap().clone();
        match source {
            Some(stream) => stream.read_frame(target),
            None => Err(MediaError::new(MediaErrorKind::Abort, "no source")),
        }
    }
}

/// Returns scripted results, then `Ok(None)` forever.
pub struct FakeDecoder {
    script: Mutex<VecDeque<Result<Option<String>, DecodeError>>>,
    calls: AtomicUsize,
}

impl FakeDecoder {
    pub fn new(script: Vec<Result<Option<String>, DecodeError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(payload: &str) -> Self {
        Self::new(vec![Ok(Some(payload.to_string()))])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl QrDecoder for FakeDecoder {
    fn decode(&self, _frame: &RgbaFrame) -> Result<Option<String>, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

#[derive(Default)]
pub struct FakeApi {
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TournamentApi for FakeApi {
    async fn mark_tournament_active(&self, session: &PlayerSession) -> Result<(), ApiClientError> {
        self.calls.lock().unwrap().push(session.player_id.clone());
        if self.fail {
            return Err(ApiClientError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, destination: &str) {
        self.visits.lock().unwrap().push(destination.to_string());
    }
}
