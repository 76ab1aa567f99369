// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the error taxonomy shared by every engine subsystem.
//!
//! Success is expressed through [`AudioResult`]'s `Ok` arm, so the taxonomy
//! only enumerates failures. Variants carry the name or detail needed to make
//! the message actionable; [`AudioError::code`] exposes the stable short code
//! for callers that match on kind rather than on message text.

use std::fmt;

/// Convenience alias for engine operations that can fail.
pub type AudioResult<T> = Result<T, AudioError>;

/// An error produced by the audio engine or one of its subsystems.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// The engine failed to initialize its backend.
    EngineInitFailed(String),
    /// `init` was called on an engine that is already running.
    AlreadyInitialized,
    /// An operation was attempted before `init` or after `shutdown`.
    NotInitialized,
    /// A file could not be opened.
    FileNotFound {
        /// The path that failed to open.
        path: String,
    },
    /// A path was syntactically invalid.
    InvalidPath {
        /// The offending path.
        path: String,
    },
    /// A document failed to parse as JSON.
    JsonParseError {
        /// Parser diagnostics.
        details: String,
    },
    /// A document parsed but did not match the expected schema.
    InvalidFormat {
        /// What was missing or malformed.
        details: String,
    },
    /// No event with the given name is registered in the sound bank.
    EventNotFound {
        /// The requested event name.
        name: String,
    },
    /// The voice pool could not produce a voice.
    VoiceAllocationFailed,
    /// A handle did not refer to a live backend voice.
    InvalidHandle,
    /// The backend refused to start playback.
    PlaybackFailed {
        /// The event whose playback failed.
        event: String,
    },
    /// No bus with the given name exists.
    BusNotFound {
        /// The requested bus name.
        name: String,
    },
    /// A bus with the given name already exists.
    BusAlreadyExists {
        /// The conflicting bus name.
        name: String,
    },
    /// No reverb bus with the given name exists.
    ReverbBusNotFound {
        /// The requested reverb bus name.
        name: String,
    },
    /// The backend could not allocate the reverb bus voice.
    ReverbBusInitFailed {
        /// The reverb bus that failed to initialize.
        name: String,
    },
    /// No snapshot with the given name exists.
    SnapshotNotFound {
        /// The requested snapshot name.
        name: String,
    },
    /// No zone with the given name exists.
    ZoneNotFound {
        /// The requested zone name.
        name: String,
    },
    /// No listener with the given id exists.
    ListenerNotFound {
        /// The requested listener id.
        id: u32,
    },
    /// An argument was invalid for the operation.
    InvalidParameter {
        /// Which argument, and why.
        details: String,
    },
    /// A value fell outside its permitted range.
    OutOfRange {
        /// Which value, and the permitted range.
        details: String,
    },
    /// An unexpected internal error.
    Unknown(String),
}

impl AudioError {
    /// Returns the stable short code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AudioError::EngineInitFailed(_) => "EngineInitFailed",
            AudioError::AlreadyInitialized => "AlreadyInitialized",
            AudioError::NotInitialized => "NotInitialized",
            AudioError::FileNotFound { .. } => "FileNotFound",
            AudioError::InvalidPath { .. } => "InvalidPath",
            AudioError::JsonParseError { .. } => "JsonParseError",
            AudioError::InvalidFormat { .. } => "InvalidFormat",
            AudioError::EventNotFound { .. } => "EventNotFound",
            AudioError::VoiceAllocationFailed => "VoiceAllocationFailed",
            AudioError::InvalidHandle => "InvalidHandle",
            AudioError::PlaybackFailed { .. } => "PlaybackFailed",
            AudioError::BusNotFound { .. } => "BusNotFound",
            AudioError::BusAlreadyExists { .. } => "BusAlreadyExists",
            AudioError::ReverbBusNotFound { .. } => "ReverbBusNotFound",
            AudioError::ReverbBusInitFailed { .. } => "ReverbBusInitFailed",
            AudioError::SnapshotNotFound { .. } => "SnapshotNotFound",
            AudioError::ZoneNotFound { .. } => "ZoneNotFound",
            AudioError::ListenerNotFound { .. } => "ListenerNotFound",
            AudioError::InvalidParameter { .. } => "InvalidParameter",
            AudioError::OutOfRange { .. } => "OutOfRange",
            AudioError::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::EngineInitFailed(msg) => {
                write!(f, "EngineInitFailed: {msg}")
            }
            AudioError::AlreadyInitialized => {
                write!(f, "AlreadyInitialized: the engine is already running")
            }
            AudioError::NotInitialized => {
                write!(f, "NotInitialized: the engine is not initialized")
            }
            AudioError::FileNotFound { path } => {
                write!(f, "FileNotFound: failed to open '{path}'")
            }
            AudioError::InvalidPath { path } => {
                write!(f, "InvalidPath: '{path}' is not a valid path")
            }
            AudioError::JsonParseError { details } => {
                write!(f, "JsonParseError: {details}")
            }
            AudioError::InvalidFormat { details } => {
                write!(f, "InvalidFormat: {details}")
            }
            AudioError::EventNotFound { name } => {
                write!(f, "EventNotFound: no event named '{name}'")
            }
            AudioError::VoiceAllocationFailed => {
                write!(f, "VoiceAllocationFailed: the voice pool could not allocate")
            }
            AudioError::InvalidHandle => {
                write!(f, "InvalidHandle: handle does not refer to a live voice")
            }
            AudioError::PlaybackFailed { event } => {
                write!(f, "PlaybackFailed: backend refused to start '{event}'")
            }
            AudioError::BusNotFound { name } => {
                write!(f, "BusNotFound: no bus named '{name}'")
            }
            AudioError::BusAlreadyExists { name } => {
                write!(f, "BusAlreadyExists: a bus named '{name}' already exists")
            }
            AudioError::ReverbBusNotFound { name } => {
                write!(f, "ReverbBusNotFound: no reverb bus named '{name}'")
            }
            AudioError::ReverbBusInitFailed { name } => {
                write!(f, "ReverbBusInitFailed: backend init failed for '{name}'")
            }
            AudioError::SnapshotNotFound { name } => {
                write!(f, "SnapshotNotFound: no snapshot named '{name}'")
            }
            AudioError::ZoneNotFound { name } => {
                write!(f, "ZoneNotFound: no zone named '{name}'")
            }
            AudioError::ListenerNotFound { id } => {
                write!(f, "ListenerNotFound: no listener with id {id}")
            }
            AudioError::InvalidParameter { details } => {
                write!(f, "InvalidParameter: {details}")
            }
            AudioError::OutOfRange { details } => {
                write!(f, "OutOfRange: {details}")
            }
            AudioError::Unknown(msg) => {
                write!(f, "Unknown: {msg}")
            }
        }
    }
}

impl std::error::Error for AudioError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_detail() {
        let err = AudioError::EventNotFound {
            name: "footstep".to_string(),
        };
        assert_eq!(format!("{err}"), "EventNotFound: no event named 'footstep'");
        assert_eq!(err.code(), "EventNotFound");
    }

    #[test]
    fn display_for_unit_variants() {
        assert_eq!(
            format!("{}", AudioError::NotInitialized),
            "NotInitialized: the engine is not initialized"
        );
        assert_eq!(AudioError::NotInitialized.code(), "NotInitialized");
    }

    #[test]
    fn error_trait_object_round_trip() {
        let err: Box<dyn std::error::Error> = Box::new(AudioError::InvalidHandle);
        assert!(format!("{err}").starts_with("InvalidHandle"));
    }
}
