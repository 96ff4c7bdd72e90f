// Service layer module for the entry scanner
pub mod camera_acquirer;
pub mod decode_loop;
pub mod entry_resolver;
pub mod environment_prober;
pub mod qr_decoder;
pub mod scanner;
pub mod tournament_api;

#[cfg(test)]
pub(crate) mod test_support;

pub use camera_acquirer::{CameraAcquirer, CaptureSession};
pub use decode_loop::{DecodeLoop, DecodeLoopHandle, FrameSampler};
pub use entry_resolver::EntryResolver;
pub use environment_prober::EnvironmentProber;
pub use qr_decoder::{DecodeError, QrDecoder, RqrrDecoder};
pub use scanner::{EntryScanner, ScannerDeps, ScannerHandle};
pub use tournament_api::{ApiClientError, HttpTournamentApi, TournamentApi};
