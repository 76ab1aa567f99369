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

//! Reverb buses: parameterised sends whose wet level is driven by reverb
//! zones.
//!
//! A reverb bus owns one backend bus voice with a reverb effect on its first
//! filter slot; all parameter changes go through the backend's filter
//! parameter interface so fades happen at audio rate without engine
//! involvement.

use aulos_core::audio::{AudioBackend, FilterParam, VoiceHandle};

/// The filter slot carrying the reverb effect on a reverb bus voice.
const REVERB_SLOT: u32 = 0;

/// The full parameter tuple of a reverb bus.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ReverbParams {
    /// Wet/dry mix in `[0, 1]`.
    pub wet: f32,
    /// Room size in `[0, 1]`.
    pub room_size: f32,
    /// High-frequency damping in `[0, 1]`.
    pub damp: f32,
    /// Stereo width in `[0, 1]`.
    pub width: f32,
}

/// Preset reverb configurations `(wet, room, damp, width)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReverbPreset {
    /// Small room.
    Room,
    /// Large hall.
    Hall,
    /// Cave-like space with a long decay.
    Cave,
    /// Very large space with a rich tail.
    Cathedral,
    /// Muffled underwater effect.
    Underwater,
}

impl ReverbPreset {
    /// The parameter tuple for this preset.
    pub fn params(self) -> ReverbParams {
        match self {
            ReverbPreset::Room => ReverbParams {
                wet: 0.30,
                room_size: 0.40,
                damp: 0.70,
                width: 0.80,
            },
            ReverbPreset::Hall => ReverbParams {
                wet: 0.50,
                room_size: 0.60,
                damp: 0.50,
                width: 1.00,
            },
            ReverbPreset::Cave => ReverbParams {
                wet: 0.60,
                room_size: 0.85,
                damp: 0.30,
                width: 1.00,
            },
            ReverbPreset::Cathedral => ReverbParams {
                wet: 0.70,
                room_size: 0.95,
                damp: 0.20,
                width: 1.00,
            },
            ReverbPreset::Underwater => ReverbParams {
                wet: 0.90,
                room_size: 0.70,
                damp: 0.80,
                width: 0.50,
            },
        }
    }
}

/// A named reverb send backed by one backend bus voice.
#[derive(Debug)]
pub struct ReverbBus {
    name: String,
    handle: VoiceHandle,
    wet: f32,
    room_size: f32,
    damp: f32,
    width: f32,
    freeze: bool,
}

impl ReverbBus {
    /// Creates an uninitialised reverb bus with middle-of-the-road parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: VoiceHandle::INVALID,
            wet: 0.5,
            room_size: 0.5,
            damp: 0.5,
            width: 1.0,
            freeze: false,
        }
    }

    /// Asks the backend for a bus voice and pushes the current parameters.
    /// Returns `false` when the backend could not allocate one.
    pub fn init(&mut self, backend: &mut dyn AudioBackend) -> bool {
        let handle = backend.create_bus();
        if !handle.is_valid() {
            return false;
        }
        self.handle = handle;
        self.push_all(backend);
        true
    }

    /// Whether the bus has a live backend voice.
    pub fn is_active(&self) -> bool {
        self.handle.is_valid()
    }

    /// The bus name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backend handle of the bus voice.
    pub fn handle(&self) -> VoiceHandle {
        self.handle
    }

    /// Sets every reverb parameter at once, immediately.
    pub fn set_params(&mut self, params: ReverbParams, backend: &mut dyn AudioBackend) {
        self.wet = params.wet.clamp(0.0, 1.0);
        self.room_size = params.room_size.clamp(0.0, 1.0);
        self.damp = params.damp.clamp(0.0, 1.0);
        self.width = params.width.clamp(0.0, 1.0);
        self.push_all(backend);
    }

    /// Stores preset parameters (push happens on `init` or `set_params`).
    pub fn apply_preset(&mut self, preset: ReverbPreset, backend: &mut dyn AudioBackend) {
        self.set_params(preset.params(), backend);
    }

    /// Sets the wet level, fading over `fade_s` when positive.
    pub fn set_wet(&mut self, wet: f32, fade_s: f32, backend: &mut dyn AudioBackend) {
        self.wet = wet.clamp(0.0, 1.0);
        self.push_param(backend, FilterParam::Wet, self.wet, fade_s);
    }

    /// Sets the room size, fading over `fade_s` when positive.
    pub fn set_room_size(&mut self, room_size: f32, fade_s: f32, backend: &mut dyn AudioBackend) {
        self.room_size = room_size.clamp(0.0, 1.0);
        self.push_param(backend, FilterParam::RoomSize, self.room_size, fade_s);
    }

    /// Sets the damping, fading over `fade_s` when positive.
    pub fn set_damp(&mut self, damp: f32, fade_s: f32, backend: &mut dyn AudioBackend) {
        self.damp = damp.clamp(0.0, 1.0);
        self.push_param(backend, FilterParam::Damp, self.damp, fade_s);
    }

    /// Sets the stereo width, fading over `fade_s` when positive.
    pub fn set_width(&mut self, width: f32, fade_s: f32, backend: &mut dyn AudioBackend) {
        self.width = width.clamp(0.0, 1.0);
        self.push_param(backend, FilterParam::Width, self.width, fade_s);
    }

    /// Toggles freeze mode (infinite tail).
    pub fn set_freeze(&mut self, freeze: bool, backend: &mut dyn AudioBackend) {
        self.freeze = freeze;
        self.push_param(
            backend,
            FilterParam::Freeze,
            if freeze { 1.0 } else { 0.0 },
            0.0,
        );
    }

    /// Current wet level.
    pub fn wet(&self) -> f32 {
        self.wet
    }

    /// Current room size.
    pub fn room_size(&self) -> f32 {
        self.room_size
    }

    /// Current damping.
    pub fn damp(&self) -> f32 {
        self.damp
    }

    /// Current stereo width.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Whether freeze mode is on.
    pub fn is_freeze(&self) -> bool {
        self.freeze
    }

    fn push_param(
        &self,
        backend: &mut dyn AudioBackend,
        param: FilterParam,
        value: f32,
        fade_s: f32,
    ) {
        if !self.handle.is_valid() {
            return;
        }
        if fade_s > 0.0 {
            backend.fade_filter_parameter(self.handle, REVERB_SLOT, param, value, fade_s);
        } else {
            backend.set_filter_parameter(self.handle, REVERB_SLOT, param, value);
        }
    }

    fn push_all(&self, backend: &mut dyn AudioBackend) {
        self.push_param(backend, FilterParam::Wet, self.wet, 0.0);
        self.push_param(backend, FilterParam::RoomSize, self.room_size, 0.0);
        self.push_param(backend, FilterParam::Damp, self.damp, 0.0);
        self.push_param(backend, FilterParam::Width, self.width, 0.0);
        self.push_param(
            backend,
            FilterParam::Freeze,
            if self.freeze { 1.0 } else { 0.0 },
            0.0,
        );
    }
}
