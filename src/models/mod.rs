// Core models
pub mod capture;
pub mod environment;
pub mod payload;
pub mod scan_state;

// Re-export commonly used types
pub use capture::*;
pub use environment::*;
pub use payload::*;
pub use scan_state::*;
