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

//! A zone that applies a mix snapshot while the listener is inside it.

use aulos_core::math::Vec3;

use super::ZoneShape;

/// A positioned region bound to a snapshot. Each tick the orchestrator picks
/// one winning mix zone by `(priority, blend)` and applies its snapshot with
/// a fade proportional to the blend.
#[derive(Debug, Clone)]
pub struct MixZone {
    name: String,
    snapshot: String,
    position: Vec3,
    shape: ZoneShape,
    priority: u8,
    fade_in_s: f32,
    fade_out_s: f32,
    blend: f32,
}

impl MixZone {
    /// Creates a mix zone.
    pub fn new(
        name: impl Into<String>,
        snapshot: impl Into<String>,
        position: Vec3,
        shape: ZoneShape,
        priority: u8,
        fade_in_s: f32,
        fade_out_s: f32,
    ) -> Self {
        Self {
            name: name.into(),
            snapshot: snapshot.into(),
            position,
            shape,
            priority,
            fade_in_s,
            fade_out_s,
            blend: 0.0,
        }
    }

    /// Recomputes the blend factor from the listener position.
    pub fn update(&mut self, listener_pos: Vec3) -> f32 {
        self.blend = self.shape.influence(self.position, listener_pos);
        self.blend
    }

    /// Whether the listener is inside the outer boundary.
    pub fn is_active(&self) -> bool {
        self.blend > 0.0
    }

    /// The current blend factor.
    pub fn blend(&self) -> f32 {
        self.blend
    }

    /// The zone name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The snapshot this zone applies.
    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    /// The arbitration priority.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// The fade-in time scaled by blend when the snapshot is applied.
    pub fn fade_in_s(&self) -> f32 {
        self.fade_in_s
    }

    /// The fade-out time used when this zone stops winning.
    pub fn fade_out_s(&self) -> f32 {
        self.fade_out_s
    }

    /// Moves the zone.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }
}
