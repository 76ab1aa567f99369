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

//! A zone that drives a reverb bus's wet level from listener proximity.

use aulos_core::math::Vec3;

use super::ZoneShape;

/// A positioned region feeding influence into one named reverb bus. When
/// several zones target the same bus, the orchestrator takes the maximum
/// influence.
#[derive(Debug, Clone)]
pub struct ReverbZone {
    name: String,
    reverb_bus: String,
    position: Vec3,
    shape: ZoneShape,
    priority: u8,
    influence: f32,
}

impl ReverbZone {
    /// Creates a reverb zone.
    pub fn new(
        name: impl Into<String>,
        reverb_bus: impl Into<String>,
        position: Vec3,
        shape: ZoneShape,
        priority: u8,
    ) -> Self {
        Self {
            name: name.into(),
            reverb_bus: reverb_bus.into(),
            position,
            shape,
            priority,
            influence: 0.0,
        }
    }

    /// Recomputes the influence from the listener position.
    pub fn update(&mut self, listener_pos: Vec3) -> f32 {
        self.influence = self.shape.influence(self.position, listener_pos);
        self.influence
    }

    /// The current influence.
    pub fn influence(&self) -> f32 {
        self.influence
    }

    /// Whether the listener is inside the outer boundary.
    pub fn is_active(&self) -> bool {
        self.influence > 0.0
    }

    /// The zone name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The reverb bus this zone drives.
    pub fn reverb_bus(&self) -> &str {
        &self.reverb_bus
    }

    /// The zone priority.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Moves the zone.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }
}
