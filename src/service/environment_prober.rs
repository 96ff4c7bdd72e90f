use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{BrowserFamily, EnvironmentReport, PermissionState, PlatformContext};
use crate::platform::MediaDevices;

/// Pre-flight camera diagnostics. Probing never fails: anything that errors
/// or hangs is reported as unknown.
pub struct EnvironmentProber {
    devices: Arc<dyn MediaDevices>,
    context: PlatformContext,
    probe_timeout: Duration,
}

impl EnvironmentProber {
    pub fn new(devices: Arc<dyn MediaDevices>, context: PlatformContext, probe_timeout_ms: u64) -> Self {
        Self {
            devices,
            context,
            probe_timeout: Duration::from_millis(probe_timeout_ms),
        }
    }

    pub async fn probe(&self) -> EnvironmentReport {
        let media_api = self.devices.is_supported();

        let (permission, video_inputs) = if media_api {
            (self.probe_permission().await, self.probe_video_inputs().await)
        } else {
            (PermissionState::Unknown, None)
        };

        let report = EnvironmentReport {
            media_api,
            permission,
            video_inputs,
            secure_context: self.context.secure_context,
            standalone: self.context.standalone,
            browser: BrowserFamily::from_user_agent(&self.context.user_agent),
            probed_at: Utc::now(),
        };

        info!(
            media_api = report.media_api,
            permission = ?report.permission,
            video_inputs = ?report.video_inputs,
            browser = ?report.browser,
            "Environment probed"
        );

        report
    }

    async fn probe_permission(&self) -> PermissionState {
        match tokio::time::timeout(self.probe_timeout, self.devices.query_camera_permission()).await {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => {
                debug!(error = %e, "Permission query failed");
                PermissionState::Unknown
            }
            Err(_) => {
                debug!("Permission query timed out");
                PermissionState::Unknown
            }
        }
    }

    async fn probe_video_inputs(&self) -> Option<usize> {
        match tokio::time::timeout(self.probe_timeout, self.devices.enumerate_video_inputs()).await {
            Ok(Ok(devices)) => Some(devices.len()),
            Ok(Err(e)) => {
                debug!(error = %e, "Device enumeration failed");
                None
            }
            Err(_) => {
                debug!("Device enumeration timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MediaErrorKind;
    use crate::service::test_support::FakeDevices;

    fn context() -> PlatformContext {
        PlatformContext {
            secure_context: true,
            standalone: false,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0"
                .to_string(),
        }
    }

    #[tokio::test]
    async fn test_probe_healthy_platform() {
        let devices = Arc::new(FakeDevices::new(vec![]));
        let prober = EnvironmentProber::new(devices, context(), 50);
        let report = prober.probe().await;

        assert!(report.media_api);
        assert_eq!(report.permission, PermissionState::Granted);
        assert_eq!(report.video_inputs, Some(1));
        assert_eq!(report.browser, BrowserFamily::Firefox);
        assert!(report.should_attempt_acquisition());
    }

    #[tokio::test]
    async fn test_probe_failures_degrade_to_unknown() {
        let devices = Arc::new(FakeDevices::new(vec![]).with_probe_failure(MediaErrorKind::Other));
        let prober = EnvironmentProber::new(devices, context(), 50);
        let report = prober.probe().await;

        assert_eq!(report.permission, PermissionState::Unknown);
        assert_eq!(report.video_inputs, None);
        assert!(report.should_attempt_acquisition());
    }

    #[tokio::test]
    async fn test_probe_hang_is_bounded() {
        let devices = Arc::new(FakeDevices::new(vec![]).with_hanging_probe());
        let prober = EnvironmentProber::new(devices, context(), 20);
        let report = prober.probe().await;

        assert_eq!(report.permission, PermissionState::Unknown);
        assert_eq!(report.video_inputs, None);
    }

    #[tokio::test]
    async fn test_missing_media_api_skips_queries() {
        let devices = Arc::new(FakeDevices::new(vec![]).unsupported());
        let prober = EnvironmentProber::new(devices.clone(), context(), 50);
        let report = prober.probe().await;

        assert!(!report.media_api);
        assert_eq!(devices.probe_calls(), 0);
        assert!(!report.should_attempt_acquisition());
    }
}
