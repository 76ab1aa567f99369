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

//! The sound bank: a registry of event descriptors loaded from JSON.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use aulos_core::error::{AudioError, AudioResult};
use serde::Deserialize;

/// How an event with a `sounds` list walks through its entries.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistMode {
    /// Play one asset (the `sound` path, or the first list entry).
    #[default]
    Single,
    /// Walk the list in order.
    Sequential,
    /// Walk the list in an order shuffled once per voice.
    Shuffle,
    /// Pick uniformly at random for every start.
    Random,
}

/// An immutable playback recipe: asset(s), randomisation ranges, routing,
/// priority, and playlist behavior. Registered once in the [`SoundBank`] and
/// referenced by name from then on.
#[derive(Debug, Clone)]
pub struct EventDescriptor {
    /// Unique event name (bank key).
    pub name: String,
    /// Asset path for single-sound events. Ignored when `sounds` is non-empty.
    pub path: String,
    /// Ordered list of asset paths; when non-empty this wins over `path`.
    pub sounds: Vec<String>,
    /// Name of the bus this event routes through.
    pub bus: String,
    /// Lower bound of the uniform volume draw.
    pub volume_min: f32,
    /// Upper bound of the uniform volume draw.
    pub volume_max: f32,
    /// Lower bound of the uniform pitch draw.
    pub pitch_min: f32,
    /// Upper bound of the uniform pitch draw.
    pub pitch_max: f32,
    /// Hint to the backend to stream rather than pre-decode.
    pub stream: bool,
    /// Steal priority, 0-255; higher is harder to steal.
    pub priority: u8,
    /// Distance at which the event becomes inaudible, in world units.
    pub max_distance: f32,
    /// Playlist traversal mode.
    pub playlist_mode: PlaylistMode,
    /// Whether the playlist wraps after the last entry.
    pub loop_playlist: bool,
    /// Gap between playlist items, in seconds.
    pub interval_s: f32,
    /// Delay before the first start, in seconds.
    pub start_delay_s: f32,
    /// Free-form key/value pairs carried through uninterpreted.
    pub parameters: HashMap<String, String>,
}

impl Default for EventDescriptor {
    fn default() -> Self {
        Self {
            name: String::new(),
            path: String::new(),
            sounds: Vec::new(),
            bus: "Master".to_string(),
            volume_min: 1.0,
            volume_max: 1.0,
            pitch_min: 1.0,
            pitch_max: 1.0,
            stream: false,
            priority: 128,
            max_distance: 100.0,
            playlist_mode: PlaylistMode::Single,
            loop_playlist: false,
            interval_s: 0.0,
            start_delay_s: 0.0,
            parameters: HashMap::new(),
        }
    }
}

impl EventDescriptor {
    /// Creates a single-sound descriptor with defaults for everything else.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// The bus this event routes through, falling back to `"Master"`.
    pub fn bus_or_master(&self) -> &str {
        if self.bus.is_empty() {
            "Master"
        } else {
            &self.bus
        }
    }
}

/// A `volume`/`pitch` JSON field: either one number or a `[min, max]` pair.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarOrRange {
    Scalar(f32),
    Range(Vec<f32>),
}

impl ScalarOrRange {
    fn bounds(&self) -> Option<(f32, f32)> {
        match self {
            ScalarOrRange::Scalar(v) => Some((*v, *v)),
            ScalarOrRange::Range(values) if values.len() >= 2 => Some((values[0], values[1])),
            ScalarOrRange::Range(_) => None,
        }
    }
}

/// The raw JSON shape of one event, before validation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default)]
    name: String,
    #[serde(default)]
    sound: String,
    #[serde(default)]
    sounds: Vec<String>,
    #[serde(default)]
    bus: Option<String>,
    #[serde(default)]
    volume: Option<ScalarOrRange>,
    #[serde(default)]
    pitch: Option<ScalarOrRange>,
    #[serde(default)]
    stream: bool,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default)]
    max_distance: Option<f32>,
    #[serde(default)]
    playlist_mode: Option<PlaylistMode>,
    #[serde(default)]
    loop_playlist: bool,
    #[serde(default)]
    interval: Option<f32>,
    #[serde(default)]
    start_delay: Option<f32>,
    #[serde(default)]
    parameters: HashMap<String, String>,
}

impl RawEvent {
    fn into_descriptor(self) -> AudioResult<EventDescriptor> {
        if self.name.is_empty() {
            return Err(AudioError::InvalidFormat {
                details: "event missing 'name' field".to_string(),
            });
        }

        let mut ed = EventDescriptor {
            name: self.name,
            path: self.sound,
            sounds: self.sounds,
            stream: self.stream,
            loop_playlist: self.loop_playlist,
            parameters: self.parameters,
            ..EventDescriptor::default()
        };
        if let Some(bus) = self.bus {
            ed.bus = bus;
        }
        if let Some((min, max)) = self.volume.as_ref().and_then(ScalarOrRange::bounds) {
            ed.volume_min = min;
            ed.volume_max = max;
        }
        if let Some((min, max)) = self.pitch.as_ref().and_then(ScalarOrRange::bounds) {
            ed.pitch_min = min;
            ed.pitch_max = max;
        }
        if let Some(priority) = self.priority {
            ed.priority = priority.clamp(0, 255) as u8;
        }
        if let Some(max_distance) = self.max_distance {
            ed.max_distance = max_distance;
        }
        if let Some(mode) = self.playlist_mode {
            ed.playlist_mode = mode;
        }
        if let Some(interval) = self.interval {
            ed.interval_s = interval.max(0.0);
        }
        if let Some(delay) = self.start_delay {
            ed.start_delay_s = delay.max(0.0);
        }
        Ok(ed)
    }
}

/// Registry of event descriptors, keyed by event name.
///
/// The bank is append-only: registration overwrites same-named entries but
/// nothing is ever removed, so a failed batch load leaves the events that
/// registered before the failure in place.
#[derive(Debug, Default)]
pub struct SoundBank {
    events: HashMap<String, EventDescriptor>,
}

impl SoundBank {
    /// Creates an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor, overwriting any previous entry with the same name.
    pub fn register(&mut self, descriptor: EventDescriptor) {
        log::debug!("sound bank: registered event '{}'", descriptor.name);
        self.events.insert(descriptor.name.clone(), descriptor);
    }

    /// Registers one event from a JSON object string (schema per the bank format).
    pub fn register_from_json(&mut self, json: &str) -> AudioResult<()> {
        let raw: RawEvent = serde_json::from_str(json).map_err(|e| AudioError::JsonParseError {
            details: e.to_string(),
        })?;
        self.register(raw.into_descriptor()?);
        Ok(())
    }

    /// Registers one event from an already-parsed JSON value.
    pub fn register_from_value(&mut self, value: &serde_json::Value) -> AudioResult<()> {
        let raw: RawEvent =
            serde_json::from_value(value.clone()).map_err(|e| AudioError::JsonParseError {
                details: e.to_string(),
            })?;
        self.register(raw.into_descriptor()?);
        Ok(())
    }

    /// Loads events from a JSON file holding an array of event objects (a
    /// single object is also accepted).
    ///
    /// Returns the first failure; events registered before it stay registered.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> AudioResult<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|_| AudioError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let doc: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| AudioError::JsonParseError {
                details: e.to_string(),
            })?;

        match doc {
            serde_json::Value::Array(entries) => {
                for entry in &entries {
                    self.register_from_value(entry)?;
                }
                Ok(())
            }
            other => self.register_from_value(&other),
        }
    }

    /// Looks up an event by name.
    pub fn find(&self, name: &str) -> AudioResult<&EventDescriptor> {
        self.events.get(name).ok_or_else(|| AudioError::EventNotFound {
            name: name.to_string(),
        })
    }

    /// Looks up an event by name without the error wrapping.
    pub fn get(&self, name: &str) -> Option<&EventDescriptor> {
        self.events.get(name)
    }

    /// Number of registered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the bank has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn register_overwrites_same_name() {
        let mut bank = SoundBank::new();
        bank.register(EventDescriptor::new("shot", "a.wav"));
        bank.register(EventDescriptor::new("shot", "b.wav"));
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.find("shot").unwrap().path, "b.wav");
    }

    #[test]
    fn find_unknown_is_event_not_found() {
        let bank = SoundBank::new();
        let err = bank.find("nope").unwrap_err();
        assert_eq!(err.code(), "EventNotFound");
    }

    #[test]
    fn json_defaults() {
        let mut bank = SoundBank::new();
        bank.register_from_json(r#"{"name": "step", "sound": "step.wav"}"#)
            .unwrap();
        let ed = bank.find("step").unwrap();
        assert_eq!(ed.bus, "Master");
        assert_eq!(ed.volume_min, 1.0);
        assert_eq!(ed.volume_max, 1.0);
        assert_eq!(ed.priority, 128);
        assert_eq!(ed.max_distance, 100.0);
        assert_eq!(ed.playlist_mode, PlaylistMode::Single);
        assert!(!ed.stream);
    }

    #[test]
    fn json_full_schema() {
        let mut bank = SoundBank::new();
        bank.register_from_json(
            r#"{
                "name": "ambience",
                "sounds": ["wind_a.ogg", "wind_b.ogg"],
                "bus": "SFX",
                "volume": [0.6, 0.9],
                "pitch": 1.1,
                "stream": true,
                "priority": 40,
                "maxDistance": 250.0,
                "playlistMode": "shuffle",
                "loopPlaylist": true,
                "interval": 0.5,
                "startDelay": 2.0,
                "parameters": {"biome": "tundra"}
            }"#,
        )
        .unwrap();
        let ed = bank.find("ambience").unwrap();
        assert_eq!(ed.sounds.len(), 2);
        assert_eq!(ed.bus, "SFX");
        assert_eq!((ed.volume_min, ed.volume_max), (0.6, 0.9));
        assert_eq!((ed.pitch_min, ed.pitch_max), (1.1, 1.1));
        assert!(ed.stream);
        assert_eq!(ed.priority, 40);
        assert_eq!(ed.max_distance, 250.0);
        assert_eq!(ed.playlist_mode, PlaylistMode::Shuffle);
        assert!(ed.loop_playlist);
        assert_eq!(ed.interval_s, 0.5);
        assert_eq!(ed.start_delay_s, 2.0);
        assert_eq!(ed.parameters.get("biome").map(String::as_str), Some("tundra"));
    }

    #[test]
    fn missing_name_is_invalid_format() {
        let mut bank = SoundBank::new();
        let err = bank
            .register_from_json(r#"{"sound": "anonymous.wav"}"#)
            .unwrap_err();
        assert_eq!(err.code(), "InvalidFormat");
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let mut bank = SoundBank::new();
        let err = bank.register_from_json("{not json").unwrap_err();
        assert_eq!(err.code(), "JsonParseError");
    }

    #[test]
    fn priority_clamps_to_byte_range() {
        let mut bank = SoundBank::new();
        bank.register_from_json(r#"{"name": "boom", "sound": "boom.wav", "priority": 999}"#)
            .unwrap();
        assert_eq!(bank.find("boom").unwrap().priority, 255);
    }

    #[test]
    fn load_array_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"name": "a", "sound": "a.wav"}},
                {{"name": "b", "sound": "b.wav", "bus": "Music"}}
            ]"#
        )
        .unwrap();

        let mut bank = SoundBank::new();
        bank.load_from_file(file.path()).unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.find("b").unwrap().bus, "Music");
    }

    #[test]
    fn file_load_keeps_events_registered_before_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"name": "ok", "sound": "ok.wav"}},
                {{"sound": "nameless.wav"}}
            ]"#
        )
        .unwrap();

        let mut bank = SoundBank::new();
        let err = bank.load_from_file(file.path()).unwrap_err();
        assert_eq!(err.code(), "InvalidFormat");
        assert!(bank.find("ok").is_ok());
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let mut bank = SoundBank::new();
        let err = bank.load_from_file("/definitely/not/here.json").unwrap_err();
        assert_eq!(err.code(), "FileNotFound");
    }
}
