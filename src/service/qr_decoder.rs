use thiserror::Error;
use tracing::debug;

use crate::platform::RgbaFrame;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Frame is empty")]
    EmptyFrame,
    #[error("Frame buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("QR code detected but unreadable: {0}")]
    Unreadable(String),
}

/// Pixel buffer in, payload out. Implementations must be pure.
pub trait QrDecoder: Send + Sync {
    fn decode(&self, frame: &RgbaFrame) -> Result<Option<String>, DecodeError>;
}

/// QR decoder backed by `rqrr`. Works on luma only and does not retry with
/// an inverted image.
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl QrDecoder for RqrrDecoder {
    fn decode(&self, frame: &RgbaFrame) -> Result<Option<String>, DecodeError> {
        if frame.is_empty() {
            return Err(DecodeError::EmptyFrame);
        }
        let expected = frame.width as usize * frame.height as usize * 4;
        if frame.data.len() != expected {
            return Err(DecodeError::BufferSize {
                expected,
                actual: frame.data.len(),
            });
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            frame.width as usize,
            frame.height as usize,
            |x, y| frame.luma(x, y),
        );
        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return Ok(None);
        }

        let mut last_error = None;
        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => return Ok(Some(content)),
                Err(e) => {
                    debug!(error = ?e, "QR grid failed to decode");
                    last_error = Some(format!("{:?}", e));
                }
            }
        }

        Err(DecodeError::Unreadable(
            last_error.unwrap_or_else(|| "unknown".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_frame_has_no_code() {
        let mut frame = RgbaFrame::new(64, 64);
        frame.data.fill(255);
        assert!(matches!(RqrrDecoder::new().decode(&frame), Ok(None)));
    }

    #[test]
    fn test_empty_frame_is_an_error() {
        let frame = RgbaFrame::default();
        assert!(matches!(RqrrDecoder::new().decode(&frame), Err(DecodeError::EmptyFrame)));
    }

    #[test]
    fn test_mismatched_buffer_is_an_error() {
        let frame = RgbaFrame {
            width: 4,
            height: 4,
            data: vec![0; 10],
        };
        assert!(matches!(
            RqrrDecoder::new().decode(&frame),
            Err(DecodeError::BufferSize { expected: 64, actual: 10 })
        ));
    }
}
