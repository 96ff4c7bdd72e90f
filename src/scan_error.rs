use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to the user by the entry scanner. Every variant is
/// retryable; none of them is fatal to the hosting application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("No camera found: {0}")]
    DeviceNotFound(String),

    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Camera constraints not supported: {0}")]
    ConstraintsUnsupported(String),

    #[error("Camera start timed out after {0} ms")]
    AcquisitionTimeout(u64),

    #[error("Unrecognized QR payload: {0}")]
    UnrecognizedPayload(String),

    #[error("Tournament entry request failed: {0}")]
    NetworkSideEffect(String),

    #[error("Camera error: {0}")]
    UnknownAcquisition(String),

    #[error("Camera not supported in this environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("Invalid manual entry: {0}")]
    InvalidManualEntry(String),

    #[error("Image could not be read: {0}")]
    ImageUnreadable(String),

    #[error("No QR code found in image")]
    NoCodeInImage,
}

/// Ways the user can recover from an error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOption {
    RetryCamera,
    ManualEntry,
    ImageUpload,
}

#[derive(Serialize)]
pub struct ErrorReport {
    pub error: String,
    pub message: &'static str,
    pub recovery: Vec<RecoveryOption>,
}

impl ScanError {
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::PermissionDenied(_) => "permission_denied",
            ScanError::DeviceNotFound(_) => "device_not_found",
            ScanError::DeviceUnavailable(_) => "device_unavailable",
            ScanError::ConstraintsUnsupported(_) => "constraints_unsupported",
            ScanError::AcquisitionTimeout(_) => "acquisition_timeout",
            ScanError::UnrecognizedPayload(_) => "unrecognized_payload",
            ScanError::NetworkSideEffect(_) => "network_side_effect",
            ScanError::UnknownAcquisition(_) => "unknown_acquisition",
            ScanError::UnsupportedEnvironment(_) => "unsupported_environment",
            ScanError::InvalidManualEntry(_) => "invalid_manual_entry",
            ScanError::ImageUnreadable(_) => "image_unreadable",
            ScanError::NoCodeInImage => "no_code_in_image",
        }
    }

    /// Message shown to the player.
    pub fn user_message(&self) -> &'static str {
        match self {
            ScanError::PermissionDenied(_) => {
                "Camera access was denied. Allow camera access in your browser settings and try again."
            }
            ScanError::DeviceNotFound(_) => "No camera was found on this device.",
            ScanError::DeviceUnavailable(_) => {
                "The camera is in use by another app or could not be read. Close other camera apps and try again."
            }
            ScanError::ConstraintsUnsupported(_) => {
                "This camera does not support the requested settings."
            }
            ScanError::AcquisitionTimeout(_) => {
                "Starting the camera is taking too long. Please try again."
            }
            ScanError::UnrecognizedPayload(_) => {
                "Invalid QR code. Please scan the tournament entry QR code."
            }
            ScanError::NetworkSideEffect(_) => {
                "Could not register your tournament entry. Please try again."
            }
            ScanError::UnknownAcquisition(_) => "The camera could not be started.",
            ScanError::UnsupportedEnvironment(_) => {
                "This browser cannot use the camera here. Enter the URL or upload an image instead."
            }
            ScanError::InvalidManualEntry(_) => "Please enter a valid tournament URL.",
            ScanError::ImageUnreadable(_) => "The image could not be read.",
            ScanError::NoCodeInImage => "No QR code was found in the image.",
        }
    }

    pub fn recovery_options(&self) -> Vec<RecoveryOption> {
        use RecoveryOption::*;
        match self {
            ScanError::UnsupportedEnvironment(_) | ScanError::DeviceNotFound(_) => {
                vec![ManualEntry, ImageUpload]
            }
            ScanError::InvalidManualEntry(_) => vec![ManualEntry, RetryCamera, ImageUpload],
            ScanError::ImageUnreadable(_) | ScanError::NoCodeInImage => {
                vec![ImageUpload, ManualEntry, RetryCamera]
            }
            _ => vec![RetryCamera, ManualEntry, ImageUpload],
        }
    }

    pub fn is_retryable(&self) -> bool {
        !self.recovery_options().is_empty()
    }

    /// Acquisition-class errors come from the camera, not from the payload.
    pub fn is_acquisition_error(&self) -> bool {
        matches!(
            self,
            ScanError::PermissionDenied(_)
                | ScanError::DeviceNotFound(_)
                | ScanError::DeviceUnavailable(_)
                | ScanError::ConstraintsUnsupported(_)
                | ScanError::AcquisitionTimeout(_)
                | ScanError::UnknownAcquisition(_)
                | ScanError::UnsupportedEnvironment(_)
        )
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            error: self.to_string(),
            message: self.user_message(),
            recovery: self.recovery_options(),
        }
    }
}
