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

//! A zone that plays an ambient event at a volume driven by listener
//! proximity.

use aulos_core::audio::VoiceHandle;
use aulos_core::math::Vec3;

use super::ZoneShape;

/// A positioned ambient source. The orchestrator starts the zone's event
/// when the listener enters the outer boundary, drives its volume from the
/// blend each tick, and stops it on exit. A bound snapshot is applied on the
/// entry edge and reverted on the exit edge.
#[derive(Debug, Clone)]
pub struct AudioZone {
    event: String,
    position: Vec3,
    shape: ZoneShape,
    snapshot: Option<String>,
    fade_in_s: f32,
    fade_out_s: f32,
    blend: f32,
    handle: VoiceHandle,
    was_active: bool,
}

impl AudioZone {
    /// Creates an audio zone without a snapshot.
    pub fn new(event: impl Into<String>, position: Vec3, shape: ZoneShape) -> Self {
        Self {
            event: event.into(),
            position,
            shape,
            snapshot: None,
            fade_in_s: 0.5,
            fade_out_s: 0.5,
            blend: 0.0,
            handle: VoiceHandle::INVALID,
            was_active: false,
        }
    }

    /// Creates an audio zone that also applies `snapshot` on entry and
    /// reverts bus volumes on exit.
    pub fn with_snapshot(
        event: impl Into<String>,
        position: Vec3,
        shape: ZoneShape,
        snapshot: impl Into<String>,
        fade_in_s: f32,
        fade_out_s: f32,
    ) -> Self {
        Self {
            snapshot: Some(snapshot.into()),
            fade_in_s,
            fade_out_s,
            ..Self::new(event, position, shape)
        }
    }

    /// Recomputes the blend (= zone volume) from the listener position.
    pub fn update(&mut self, listener_pos: Vec3) -> f32 {
        self.blend = self.shape.influence(self.position, listener_pos);
        self.blend
    }

    /// The current blend factor; doubles as the zone's playback volume.
    pub fn blend(&self) -> f32 {
        self.blend
    }

    /// The event this zone plays.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// The snapshot bound to this zone, if any.
    pub fn snapshot(&self) -> Option<&str> {
        self.snapshot.as_deref()
    }

    /// Snapshot fade-in time applied on the entry edge.
    pub fn fade_in_s(&self) -> f32 {
        self.fade_in_s
    }

    /// Bus revert fade applied on the exit edge.
    pub fn fade_out_s(&self) -> f32 {
        self.fade_out_s
    }

    /// The backend handle of the zone's playing voice.
    pub fn handle(&self) -> VoiceHandle {
        self.handle
    }

    /// Stores the backend handle after the orchestrator starts the event.
    pub fn set_handle(&mut self, handle: VoiceHandle) {
        self.handle = handle;
    }

    /// Whether the zone was active on the previous tick (edge detection).
    pub fn was_active(&self) -> bool {
        self.was_active
    }

    /// Records this tick's activity for the next tick's edge detection.
    pub fn set_active(&mut self, active: bool) {
        self.was_active = active;
    }

    /// Moves the zone.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }
}
