use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scan_error::ScanError;

/// Camera permission as reported by the platform permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
    Unknown,
}

/// Browser family, guessed from the user agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserFamily {
    IosSafari,
    AndroidChrome,
    SamsungInternet,
    Edge,
    Chrome,
    Firefox,
    Safari,
    Other,
}

impl BrowserFamily {
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();
        let ios = ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod");

        // Order matters: most UAs also claim to be Safari and Chrome
        if ios {
            BrowserFamily::IosSafari
        } else if ua.contains("samsungbrowser") {
            BrowserFamily::SamsungInternet
        } else if ua.contains("edg/") || ua.contains("edge/") {
            BrowserFamily::Edge
        } else if ua.contains("firefox/") {
            BrowserFamily::Firefox
        } else if ua.contains("android") && ua.contains("chrome/") {
            BrowserFamily::AndroidChrome
        } else if ua.contains("chrome/") || ua.contains("chromium/") {
            BrowserFamily::Chrome
        } else if ua.contains("safari/") {
            BrowserFamily::Safari
        } else {
            BrowserFamily::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BrowserFamily::IosSafari => "iOS Safari",
            BrowserFamily::AndroidChrome => "Android Chrome",
            BrowserFamily::SamsungInternet => "Samsung Internet",
            BrowserFamily::Edge => "Edge",
            BrowserFamily::Chrome => "Chrome",
            BrowserFamily::Firefox => "Firefox",
            BrowserFamily::Safari => "Safari",
            BrowserFamily::Other => "Unknown browser",
        }
    }
}

/// Facts about the hosting page the platform adapter supplies up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformContext {
    pub secure_context: bool,
    pub standalone: bool,
    pub user_agent: String,
}

/// Snapshot of camera related capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentReport {
    pub media_api: bool,
    pub permission: PermissionState,
    /// `None` when the device list could not be read.
    pub video_inputs: Option<usize>,
    pub secure_context: bool,
    pub standalone: bool,
    pub browser: BrowserFamily,
    pub probed_at: DateTime<Utc>,
}

impl EnvironmentReport {
    /// The error to surface instead of attempting acquisition, if any.
    pub fn acquisition_blocker(&self) -> Option<ScanError> {
        if !self.media_api {
            return Some(ScanError::UnsupportedEnvironment(
                "media capture API is not available".to_string(),
            ));
        }
        if !self.secure_context {
            return Some(ScanError::UnsupportedEnvironment(
                "camera access requires HTTPS".to_string(),
            ));
        }
        if self.permission == PermissionState::Denied {
            return Some(ScanError::PermissionDenied(
                "camera permission is denied".to_string(),
            ));
        }
        if self.video_inputs == Some(0) {
            return Some(ScanError::DeviceNotFound(
                "no video input devices".to_string(),
            ));
        }
        None
    }

    pub fn should_attempt_acquisition(&self) -> bool {
        self.acquisition_blocker().is_none()
    }

    /// Human readable lines for the failure screen, in display order.
    pub fn diagnostics(&self) -> Vec<String> {
        let yes_no = |flag: bool| if flag { "yes" } else { "no" };

        let mut lines = vec![
            format!("Browser: {}", self.browser.label()),
            format!("Camera API available: {}", yes_no(self.media_api)),
            format!("Secure context (HTTPS): {}", yes_no(self.secure_context)),
            format!(
                "Camera permission: {}",
                match self.permission {
                    PermissionState::Granted => "granted",
                    PermissionState::Denied => "denied",
                    PermissionState::Prompt => "not yet asked",
                    PermissionState::Unknown => "unknown",
                }
            ),
            match self.video_inputs {
                Some(count) => format!("Cameras detected: {}", count),
                None => "Cameras detected: unknown".to_string(),
            },
            format!("Installed app mode: {}", yes_no(self.standalone)),
        ];

        if self.standalone && self.browser == BrowserFamily::IosSafari {
            lines.push(
                "Hint: camera access from a home-screen app can be restricted on iOS; try opening the page in Safari."
                    .to_string(),
            );
        }
        if self.permission == PermissionState::Denied {
            lines.push("Hint: re-enable camera access in the browser's site settings.".to_string());
        }

        lines
    }
}
