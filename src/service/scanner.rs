use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{
    transition, CaptureConstraintProfile, EnvironmentReport, PayloadSource, PlatformContext, PlayerSession, ScanEffect,
    ScanEvent, ScanPhase, ScanState, TransitionError,
};
use crate::platform::frame_folder::decode_image;
use crate::platform::{MediaDevices, Navigator, VideoSink};
use crate::scan_error::ScanError;
use crate::service::camera_acquirer::{CameraAcquirer, CaptureSession};
use crate::service::decode_loop::{DecodeLoop, DecodeLoopHandle};
use crate::service::entry_resolver::EntryResolver;
use crate::service::environment_prober::EnvironmentProber;
use crate::service::qr_decoder::QrDecoder;
use crate::service::tournament_api::TournamentApi;

/// Platform collaborators of a scanner.
pub struct ScannerDeps {
    pub devices: Arc<dyn MediaDevices>,
    pub sink: Arc<dyn VideoSink>,
    pub decoder: Arc<dyn QrDecoder>,
    pub api: Arc<dyn TournamentApi>,
    pub navigator: Arc<dyn Navigator>,
    pub platform: PlatformContext,
}

/// Everything a [`ScannerHandle`] may touch from another task. The control
/// lock is always taken before the state channel's.
struct Shared {
    state_tx: watch::Sender<ScanState>,
    control: Mutex<AttemptControl>,
}

/// The current acquisition attempt and the stream it produced.
#[derive(Default)]
struct AttemptControl {
    token: CancellationToken,
    session: Option<CaptureSession>,
}

struct Applied {
    from: ScanPhase,
    to: ScanPhase,
    effects: Vec<ScanEffect>,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, AttemptControl> {
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn phase(&self) -> ScanPhase {
        self.state_tx.borrow().phase()
    }

    fn is_cancelled(&self) -> bool {
        self.control().token.is_cancelled()
    }

    /// Run `event` through the state machine against the published state,
    /// atomically with respect to other writers.
    fn apply(&self, event: ScanEvent) -> Result<Applied, TransitionError> {
        let mut outcome = Err(TransitionError {
            from: self.phase(),
            event: event.name(),
        });

        self.state_tx.send_if_modified(|state| match transition(state, event) {
            Ok(next) => {
                let from = state.phase();
                let to = next.state.phase();
                *state = next.state;
                outcome = Ok(Applied {
                    from,
                    to,
                    effects: next.effects,
                });
                true
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });

        outcome
    }

    /// Fresh token for an acquisition, unless the scanner was stopped
    /// since entering `Initializing`.
    fn begin_attempt(&self) -> Option<CancellationToken> {
        let mut control = self.control();
        if self.phase() != ScanPhase::Initializing {
            return None;
        }
        control.token = CancellationToken::new();
        Some(control.token.clone())
    }

    /// Keep `session` as the active one. A session that arrives after a stop
    /// is released on the spot.
    fn install_session(&self, session: CaptureSession) -> bool {
        let mut control = self.control();
        if control.token.is_cancelled() {
            session.stop();
            return false;
        }
        control.session = Some(session);
        true
    }

    fn take_session(&self) -> Option<CaptureSession> {
        self.control().session.take()
    }
}

/// Cloneable remote control for a running scanner.
#[derive(Clone)]
pub struct ScannerHandle {
    shared: Arc<Shared>,
}

impl ScannerHandle {
    /// Cancel the current acquisition or decode loop, move the scanner to
    /// `Idle` and release the camera. Does nothing outside `Initializing`
    /// and `Scanning`.
    pub fn stop(&self) {
        let released = {
            let mut control = self.shared.control();
            control.token.cancel();
            if matches!(
                self.shared.phase(),
                ScanPhase::Initializing | ScanPhase::Scanning
            ) {
                // The cancelled token ends the decode loop
                match self.shared.apply(ScanEvent::Stop) {
                    Ok(applied) => info!(from = ?applied.from, "Scanner stopped from handle"),
                    Err(e) => warn!(error = %e, "Stop rejected"),
                }
            }
            control.session.take()
        };

        if let Some(session) = released {
            session.stop();
        }
    }

    pub fn state(&self) -> ScanState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.shared.state_tx.subscribe()
    }
}

/// Entry Scanner - drives the scan state machine and owns the one capture
/// session and the one decode loop of a scanner instance.
pub struct EntryScanner {
    id: Uuid,
    prober: EnvironmentProber,
    acquirer: CameraAcquirer,
    resolver: EntryResolver,
    decoder: Arc<dyn QrDecoder>,
    sink: Arc<dyn VideoSink>,
    navigator: Arc<dyn Navigator>,
    player: Option<PlayerSession>,
    acquisition_timeout: Duration,
    decode_interval: Duration,
    redirect_delay: Duration,
    shared: Arc<Shared>,
    decode_loop: Option<DecodeLoopHandle>,
    last_report: Option<EnvironmentReport>,
}

impl EntryScanner {
    pub fn new(config: &Config, deps: ScannerDeps) -> Self {
        let (state_tx, _) = watch::channel(ScanState::Idle);

        Self {
            id: Uuid::new_v4(),
            prober: EnvironmentProber::new(
                deps.devices.clone(),
                deps.platform,
                config.camera.probe_timeout_ms,
            ),
            acquirer: CameraAcquirer::new(deps.devices, &config.camera),
            resolver: EntryResolver::new(deps.api, config.entry.path_marker.clone()),
            decoder: deps.decoder,
            sink: deps.sink,
            navigator: deps.navigator,
            player: config.api.player_session(),
            acquisition_timeout: Duration::from_millis(config.camera.acquisition_timeout_ms),
            decode_interval: Duration::from_millis(config.decode.interval_ms),
            redirect_delay: Duration::from_millis(config.entry.redirect_delay_ms),
            shared: Arc::new(Shared {
                state_tx,
                control: Mutex::new(AttemptControl::default()),
            }),
            decode_loop: None,
            last_report: None,
        }
    }

    /// Replace the logged-in player used for the entry request.
    pub fn set_player(&mut self, player: Option<PlayerSession>) {
        self.player = player;
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ScanState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn phase(&self) -> ScanPhase {
        self.shared.phase()
    }

    pub fn handle(&self) -> ScannerHandle {
        ScannerHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn has_session(&self) -> bool {
        self.shared.control().session.is_some()
    }

    /// Profile of the capture session currently bound to the sink.
    pub fn active_profile(&self) -> Option<CaptureConstraintProfile> {
        self.shared
            .control()
            .session
            .as_ref()
            .map(|session| session.profile().clone())
    }

    /// Probe the platform and keep the report for [`EntryScanner::diagnostics`].
    pub async fn probe_environment(&mut self) -> EnvironmentReport {
        let report = self.prober.probe().await;
        self.last_report = Some(report.clone());
        report
    }

    /// Diagnostic lines from the most recent probe.
    pub fn diagnostics(&self) -> Vec<String> {
        self.last_report
            .as_ref()
            .map(|r| r.diagnostics())
            .unwrap_or_default()
    }

    /// Start a fresh acquisition from `Idle` or `Error`.
    pub async fn start(&mut self) -> Result<ScanState, TransitionError> {
        self.dispatch(ScanEvent::Start).await?;
        Ok(self.state())
    }

    /// Retry after an error. Runs the whole profile ladder again.
    pub async fn retry(&mut self) -> Result<ScanState, TransitionError> {
        self.dispatch(ScanEvent::Retry).await?;
        Ok(self.state())
    }

    /// Tear down whatever is running and start over.
    pub async fn restart(&mut self) -> Result<ScanState, TransitionError> {
        if matches!(self.phase(), ScanPhase::Initializing | ScanPhase::Scanning) {
            self.dispatch(ScanEvent::Stop).await?;
        }
        self.start().await
    }

    /// Stop the camera and the decode loop. A no-op when idle or finished.
    pub async fn stop(&mut self) {
        if self.phase().is_terminal() {
            return;
        }
        if let Err(e) = self.dispatch(ScanEvent::Stop).await {
            warn!(scanner_id = %self.id, error = %e, "Stop rejected");
        }
    }

    /// Wait for the decode loop to find a code and resolve it.
    pub async fn wait_for_entry(&mut self) -> Result<ScanState, TransitionError> {
        let Some(handle) = self.decode_loop.take() else {
            return Ok(self.state());
        };

        match handle.payload().await {
            Some(payload) if !self.shared.is_cancelled() => {
                self.submit_payload(&payload, PayloadSource::Camera).await
            }
            _ => {
                // Cancelled from a ScannerHandle
                if self.phase() == ScanPhase::Scanning {
                    self.dispatch(ScanEvent::Stop).await?;
                }
                Ok(self.state())
            }
        }
    }

    /// Start the camera and run until the scan succeeds, fails or is stopped.
    pub async fn scan(&mut self) -> Result<ScanState, TransitionError> {
        let state = if self.phase() == ScanPhase::Error {
            self.retry().await?
        } else {
            self.start().await?
        };
        if state.phase() != ScanPhase::Scanning {
            return Ok(state);
        }
        self.wait_for_entry().await
    }

    /// Feed a payload from any source through the entry resolver.
    pub async fn submit_payload(
        &mut self,
        payload: &str,
        source: PayloadSource,
    ) -> Result<ScanState, TransitionError> {
        let event = match self.resolver.validate(payload, source) {
            Ok(link) => ScanEvent::PayloadAccepted(link),
            Err(e) => ScanEvent::PayloadRejected(e),
        };
        self.dispatch(event).await?;
        Ok(self.state())
    }

    /// Manual URL entry fallback.
    pub async fn submit_manual_url(&mut self, input: &str) -> Result<ScanState, TransitionError> {
        let event = match self.resolver.validate_manual(input) {
            Ok(link) => ScanEvent::PayloadAccepted(link),
            Err(e) => ScanEvent::PayloadRejected(e),
        };
        self.dispatch(event).await?;
        Ok(self.state())
    }

    /// Image upload fallback: decode one still image with the scanner's decoder.
    pub async fn submit_image(&mut self, bytes: &[u8]) -> Result<ScanState, TransitionError> {
        let frame = match decode_image(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                self.dispatch(ScanEvent::PayloadRejected(ScanError::ImageUnreadable(e.to_string())))
                    .await?;
                return Ok(self.state());
            }
        };

        match self.decoder.decode(&frame) {
            Ok(Some(payload)) => self.submit_payload(&payload, PayloadSource::ImageUpload).await,
            Ok(None) => {
                self.dispatch(ScanEvent::PayloadRejected(ScanError::NoCodeInImage))
                    .await?;
                Ok(self.state())
            }
            Err(e) => {
                debug!(error = %e, "Uploaded image did not decode");
                self.dispatch(ScanEvent::PayloadRejected(ScanError::NoCodeInImage))
                    .await?;
                Ok(self.state())
            }
        }
    }

    async fn dispatch(&mut self, event: ScanEvent) -> Result<(), TransitionError> {
        let mut pending = VecDeque::from([event]);
        let mut follow_up = false;

        while let Some(event) = pending.pop_front() {
            let name = event.name();
            let applied = match self.shared.apply(event) {
                Ok(applied) => applied,
                // A handle stop overtook the work of this attempt
                Err(e) if follow_up && self.shared.is_cancelled() => {
                    debug!(scanner_id = %self.id, error = %e, "Dropping event of a stopped attempt");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            info!(
                scanner_id = %self.id,
                event = name,
                from = ?applied.from,
                to = ?applied.to,
                "Scanner transition"
            );

            for effect in applied.effects {
                if let Some(next) = self.execute(effect).await {
                    pending.push_back(next);
                }
            }
            follow_up = true;
        }

        Ok(())
    }

    async fn execute(&mut self, effect: ScanEffect) -> Option<ScanEvent> {
        match effect {
            ScanEffect::StopDecodeLoop => {
                if let Some(handle) = self.decode_loop.take() {
                    handle.cancel();
                }
                None
            }
            ScanEffect::ReleaseSession => {
                if let Some(session) = self.shared.take_session() {
                    session.stop();
                }
                None
            }
            ScanEffect::AcquireCamera => Some(self.acquire().await),
            ScanEffect::StartDecodeLoop => {
                self.start_decode_loop();
                None
            }
            ScanEffect::ResolveEntry(link) => {
                match self.resolver.resolve(&link, self.player.as_ref()).await {
                    Ok(resolution) => Some(ScanEvent::EntryResolved(resolution)),
                    Err(e) => Some(ScanEvent::EntryFailed(e)),
                }
            }
            ScanEffect::Navigate {
                destination,
                delayed,
            } => {
                if delayed {
                    tokio::time::sleep(self.redirect_delay).await;
                }
                info!(scanner_id = %self.id, destination = %destination, "Navigating to tournament");
                self.navigator.navigate(&destination);
                None
            }
        }
    }

    async fn acquire(&mut self) -> ScanEvent {
        // Renewed before probing so a stop during the probe is not lost
        let Some(token) = self.shared.begin_attempt() else {
            info!(scanner_id = %self.id, "Acquisition cancelled");
            return ScanEvent::Stop;
        };

        let probed = tokio::select! {
            _ = token.cancelled() => None,
            report = self.probe_environment() => Some(report),
        };
        let Some(report) = probed else {
            info!(scanner_id = %self.id, "Acquisition cancelled during probe");
            return ScanEvent::Stop;
        };
        if let Some(blocker) = report.acquisition_blocker() {
            warn!(scanner_id = %self.id, error = %blocker, "Camera acquisition not attempted");
            return ScanEvent::AcquisitionFailed(blocker);
        }

        let timeout_ms = self.acquisition_timeout.as_millis() as u64;

        let outcome = tokio::select! {
            _ = token.cancelled() => None,
            result = tokio::time::timeout(
                self.acquisition_timeout,
                self.acquirer.acquire(self.sink.clone()),
            ) => Some(result),
        };

        match outcome {
            None => {
                info!(scanner_id = %self.id, "Acquisition cancelled");
                ScanEvent::Stop
            }
            Some(Ok(Ok(session))) => {
                if self.shared.install_session(session) {
                    ScanEvent::StreamReady
                } else {
                    info!(scanner_id = %self.id, "Stream arrived after stop, released");
                    ScanEvent::Stop
                }
            }
            Some(Ok(Err(e))) => ScanEvent::AcquisitionFailed(e),
            Some(Err(_)) => {
                warn!(scanner_id = %self.id, timeout_ms, "Camera acquisition timed out");
                ScanEvent::AcquisitionTimedOut {
                    after_ms: timeout_ms,
                }
            }
        }
    }

    fn start_decode_loop(&mut self) {
        if let Some(previous) = self.decode_loop.take() {
            previous.cancel();
        }

        let (token, session_id, sink) = {
            let control = self.shared.control();
            let Some(session) = control.session.as_ref() else {
                warn!(scanner_id = %self.id, "No capture session to decode from");
                return;
            };
            (control.token.child_token(), session.id(), session.sink())
        };

        debug!(scanner_id = %self.id, session_id = %session_id, "Starting decode loop");
        self.decode_loop = Some(DecodeLoop::spawn(
            sink,
            self.decoder.clone(),
            self.decode_interval,
            token,
        ));
    }
}

impl Drop for EntryScanner {
    fn drop(&mut self) {
        if let Some(handle) = self.decode_loop.take() {
            handle.cancel();
        }
        if let Some(session) = self.shared.take_session() {
            session.stop();
        }
    }
}
