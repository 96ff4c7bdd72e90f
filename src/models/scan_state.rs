use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::payload::{EntryLink, EntryResolution};
use crate::scan_error::ScanError;

/// Scan phase - the data-less discriminant of [`ScanState`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanPhase {
    Idle,
    Initializing,
    Scanning,
    Success,
    Error,
}

impl ScanPhase {
    /// Check if transition to another phase is valid
    pub fn can_transition_to(&self, to: &ScanPhase) -> bool {
        match (self, to) {
            (ScanPhase::Success, _) => false,
            (a, b) if a == b => true,
            (a, b) => a.valid_next_states().contains(b),
        }
    }

    /// Get all valid next phases from the current phase
    pub fn valid_next_states(&self) -> Vec<ScanPhase> {
        match self {
            // Manual entry and image upload can resolve straight from Idle
            ScanPhase::Idle => vec![ScanPhase::Initializing, ScanPhase::Success, ScanPhase::Error],
            ScanPhase::Initializing => vec![ScanPhase::Scanning, ScanPhase::Error, ScanPhase::Idle],
            ScanPhase::Scanning => vec![ScanPhase::Success, ScanPhase::Error, ScanPhase::Idle],
            ScanPhase::Error => vec![ScanPhase::Initializing, ScanPhase::Success, ScanPhase::Idle],
            ScanPhase::Success => vec![],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanPhase::Success)
    }

    /// Only these phases may start a fresh camera acquisition
    pub fn can_start_acquisition(&self) -> bool {
        matches!(self, ScanPhase::Idle | ScanPhase::Error)
    }
}

/// Scanner state. Exactly one is active at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Initializing,
    /// Also held while an accepted payload's entry request is in flight.
    /// The camera is already released by then; the state moves on to
    /// `Success` or `Error` once the request settles.
    Scanning,
    Success { destination: String },
    Error(ScanError),
}

impl ScanState {
    pub fn phase(&self) -> ScanPhase {
        match self {
            ScanState::Idle => ScanPhase::Idle,
            ScanState::Initializing => ScanPhase::Initializing,
            ScanState::Scanning => ScanPhase::Scanning,
            ScanState::Success { .. } => ScanPhase::Success,
            ScanState::Error(_) => ScanPhase::Error,
        }
    }

    pub fn error(&self) -> Option<&ScanError> {
        match self {
            ScanState::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Start,
    Retry,
    StreamReady,
    AcquisitionFailed(ScanError),
    AcquisitionTimedOut { after_ms: u64 },
    /// Keeps the current phase; see [`ScanState::Scanning`].
    PayloadAccepted(EntryLink),
    PayloadRejected(ScanError),
    EntryResolved(EntryResolution),
    EntryFailed(ScanError),
    Stop,
}

impl ScanEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ScanEvent::Start => "start",
            ScanEvent::Retry => "retry",
            ScanEvent::StreamReady => "stream_ready",
            ScanEvent::AcquisitionFailed(_) => "acquisition_failed",
            ScanEvent::AcquisitionTimedOut { .. } => "acquisition_timed_out",
            ScanEvent::PayloadAccepted(_) => "payload_accepted",
            ScanEvent::PayloadRejected(_) => "payload_rejected",
            ScanEvent::EntryResolved(_) => "entry_resolved",
            ScanEvent::EntryFailed(_) => "entry_failed",
            ScanEvent::Stop => "stop",
        }
    }
}

/// Work the scanner has to carry out after a transition, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEffect {
    StopDecodeLoop,
    ReleaseSession,
    AcquireCamera,
    StartDecodeLoop,
    ResolveEntry(EntryLink),
    /// `delayed` is set when the success banner should stay up for the
    /// configured redirect delay before navigating.
    Navigate { destination: String, delayed: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ScanState,
    pub effects: Vec<ScanEffect>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid scanner transition: {event} while {from:?}")]
pub struct TransitionError {
    pub from: ScanPhase,
    pub event: &'static str,
}

/// Pure transition function of the scanner.
pub fn transition(state: &ScanState, event: ScanEvent) -> Result<Transition, TransitionError> {
    use ScanEffect::*;

    let from = state.phase();
    let reject = |event: &ScanEvent| TransitionError {
        from,
        event: event.name(),
    };

    let next = match (from, event) {
        // Entering Initializing always tears down the previous attempt first
        (ScanPhase::Idle, ScanEvent::Start)
        | (ScanPhase::Error, ScanEvent::Start)
        | (ScanPhase::Error, ScanEvent::Retry) => Transition {
            state: ScanState::Initializing,
            effects: vec![StopDecodeLoop, ReleaseSession, AcquireCamera],
        },

        (ScanPhase::Initializing, ScanEvent::StreamReady) => Transition {
            state: ScanState::Scanning,
            effects: vec![StartDecodeLoop],
        },

        (ScanPhase::Initializing, ScanEvent::AcquisitionFailed(err)) => Transition {
            state: ScanState::Error(err),
            effects: vec![ReleaseSession],
        },

        (ScanPhase::Initializing, ScanEvent::AcquisitionTimedOut { after_ms }) => Transition {
            state: ScanState::Error(ScanError::AcquisitionTimeout(after_ms)),
            effects: vec![ReleaseSession],
        },

        // The phase is kept while the entry request is in flight
        (
            phase @ (ScanPhase::Idle | ScanPhase::Scanning | ScanPhase::Error),
            ScanEvent::PayloadAccepted(link),
        ) => Transition {
            state: state_for_phase(state, phase),
            effects: vec![StopDecodeLoop, ReleaseSession, ResolveEntry(link)],
        },

        (
            ScanPhase::Idle | ScanPhase::Scanning | ScanPhase::Error,
            ScanEvent::PayloadRejected(err),
        ) => Transition {
            state: ScanState::Error(err),
            effects: vec![StopDecodeLoop, ReleaseSession],
        },

        (
            ScanPhase::Idle | ScanPhase::Scanning | ScanPhase::Error,
            ScanEvent::EntryResolved(resolution),
        ) => Transition {
            state: ScanState::Success {
                destination: resolution.destination.clone(),
            },
            effects: vec![Navigate {
                destination: resolution.destination,
                delayed: resolution.marked_active,
            }],
        },

        (
            ScanPhase::Idle | ScanPhase::Scanning | ScanPhase::Error,
            ScanEvent::EntryFailed(err),
        ) => Transition {
            state: ScanState::Error(err),
            effects: vec![],
        },

        (
            ScanPhase::Idle | ScanPhase::Initializing | ScanPhase::Scanning | ScanPhase::Error,
            ScanEvent::Stop,
        ) => Transition {
            state: ScanState::Idle,
            effects: vec![StopDecodeLoop, ReleaseSession],
        },

        (_, event) => return Err(reject(&event)),
    };

    debug_assert!(from.can_transition_to(&next.state.phase()));
    Ok(next)
}

fn state_for_phase(state: &ScanState, phase: ScanPhase) -> ScanState {
    match phase {
        ScanPhase::Scanning => ScanState::Scanning,
        ScanPhase::Idle => ScanState::Idle,
        _ => state.clone(),
    }
}
