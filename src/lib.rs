//! QR entry scanner for BUNGU SQUAD tournaments.
//!
//! A player points the camera at a tournament QR code; the scanner decodes
//! it, checks that it links to a tournament page, marks the player as
//! active in that tournament and navigates there. Manual URL entry and
//! image upload cover devices where the camera cannot be used.

pub mod config;
pub mod models;
pub mod platform;
pub mod scan_error;
pub mod service;
pub mod telemetry;
