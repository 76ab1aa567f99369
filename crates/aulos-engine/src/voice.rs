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

//! The logical voice: one tracked playback, real or virtual.

use std::collections::HashMap;
use std::fmt;

use aulos_core::audio::VoiceHandle;
use aulos_core::math::Vec3;

use crate::attenuation::{attenuation, DistanceSettings};
use crate::bank::PlaylistMode;

/// Identifier of a pool voice, minted monotonically at allocation.
///
/// Ids are never reused, so a stale id held across a slot's reallocation
/// simply stops resolving instead of aliasing the new occupant.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

impl VoiceId {
    /// The id no voice ever carries.
    pub const NONE: Self = Self(0);
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Lifecycle state of a voice slot.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum VoiceState {
    /// The slot is free (terminal until reallocated).
    #[default]
    Stopped,
    /// Tracked logically, not backed by a backend voice.
    Virtual,
    /// Backed by a running backend voice (or about to be started).
    Real,
}

/// A time-triggered callback point on a voice's playback timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Name reported to the marker callback.
    pub name: String,
    /// Playback time at which the marker fires, in seconds.
    pub time_s: f32,
    /// Whether the marker has already fired for this voice.
    pub fired: bool,
}

/// One logical playback tracked by the pool.
///
/// Invariants: `state == Virtual` implies the handle is invalid; `priority`
/// never changes after allocation; `audibility` stays in `[0, 1]`.
#[derive(Debug, Default)]
pub struct Voice {
    /// Pool-minted identifier (stable for the voice's whole life).
    pub id: VoiceId,
    /// Name of the event this voice plays.
    pub event_name: String,
    /// Backend handle; valid only while real and started.
    pub handle: VoiceHandle,
    /// Lifecycle state.
    pub state: VoiceState,
    /// Steal priority, fixed at allocation.
    pub priority: u8,
    /// World position of the source.
    pub position: Vec3,
    /// World velocity of the source (Doppler input).
    pub velocity: Vec3,
    /// Distance attenuation settings from the event.
    pub distance: DistanceSettings,
    /// Base volume drawn at allocation.
    pub volume: f32,
    /// Pitch drawn at start; Doppler multiplies on top of this.
    pub base_pitch: f32,
    /// Derived `volume · attenuation`, the stealing currency.
    pub audibility: f32,
    /// Logical playback clock, advanced every tick while not stopped.
    pub playback_time: f32,
    /// Pool time at allocation, for oldest-first stealing.
    pub start_time: f32,
    /// Per-reverb-bus send levels, keyed by reverb bus name.
    pub reverb_sends: HashMap<String, f32>,

    // Occlusion state, written by the occlusion processor.
    /// Accumulated partial blocking in `[0, 1]`.
    pub obstruction: f32,
    /// Full-blocking amount in `[0, 1]`, ramping past the threshold.
    pub occlusion: f32,
    /// One-pole smoothed occlusion.
    pub occlusion_smoothed: f32,
    /// Low-pass cutoff target in Hz.
    pub target_lowpass_hz: f32,
    /// Smoothed low-pass cutoff actually applied, in Hz.
    pub current_lowpass_hz: f32,
    /// Volume multiplier from occlusion, in `[0, 1]`.
    pub occlusion_volume: f32,
    /// Seconds since this voice last queried the raycast oracle.
    pub occlusion_query_timer: f32,

    /// Current Doppler pitch factor (1.0 = no shift).
    pub doppler_pitch: f32,
    /// Timeline markers for this voice.
    pub markers: Vec<Marker>,

    // Playlist cursor.
    /// Resolved asset list (already shuffled for shuffle mode).
    pub playlist: Vec<String>,
    /// Index of the current playlist entry.
    pub playlist_index: usize,
    /// Traversal mode, copied from the event.
    pub playlist_mode: PlaylistMode,
    /// Whether the playlist wraps.
    pub loop_playlist: bool,
    /// Gap between playlist items, in seconds.
    pub interval_s: f32,
    /// Remaining delay before the next start, in seconds.
    pub delay_timer: f32,
    /// Whether the voice is holding for `delay_timer` before starting.
    pub waiting_for_delay: bool,
}

impl Voice {
    /// Whether the voice is currently real.
    #[inline]
    pub fn is_real(&self) -> bool {
        self.state == VoiceState::Real
    }

    /// Whether the voice is currently virtual.
    #[inline]
    pub fn is_virtual(&self) -> bool {
        self.state == VoiceState::Virtual
    }

    /// Whether the slot is free.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.state == VoiceState::Stopped
    }

    /// Recomputes `audibility` from the listener position using the voice's
    /// distance settings.
    pub fn update_audibility(&mut self, listener_pos: Vec3) {
        let dist = self.position.distance(listener_pos);
        self.audibility = (self.volume * attenuation(dist, &self.distance)).clamp(0.0, 1.0);
    }

    /// Resets the slot for a fresh allocation. Everything playback-related is
    /// cleared; occlusion DSP state starts fully open.
    pub(crate) fn reset(&mut self, id: VoiceId, event_name: &str, priority: u8, now: f32) {
        *self = Voice {
            id,
            event_name: event_name.to_string(),
            state: VoiceState::Virtual,
            priority,
            volume: 1.0,
            base_pitch: 1.0,
            audibility: 1.0,
            start_time: now,
            occlusion_volume: 1.0,
            target_lowpass_hz: 22_000.0,
            current_lowpass_hz: 22_000.0,
            doppler_pitch: 1.0,
            ..Voice::default()
        };
    }
}
