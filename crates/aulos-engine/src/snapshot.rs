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

//! Named bundles of bus and reverb target states.
//!
//! Applying a snapshot re-targets each named bus's volume (with a fade) and
//! each named reverb bus's parameters; buses the snapshot does not mention
//! are left alone, and names that no longer resolve are skipped.

use std::collections::HashMap;

/// Target reverb parameters stored in a snapshot.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ReverbTarget {
    /// Wet/dry mix target.
    pub wet: f32,
    /// Room size target.
    pub room_size: f32,
    /// Damping target.
    pub damp: f32,
    /// Stereo width target.
    pub width: f32,
}

/// A named mix state: bus volumes plus reverb bus parameters.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    bus_volumes: HashMap<String, f32>,
    reverb_targets: HashMap<String, ReverbTarget>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target volume for a bus.
    pub fn set_bus_volume(&mut self, bus: impl Into<String>, volume: f32) {
        self.bus_volumes.insert(bus.into(), volume.max(0.0));
    }

    /// The bus → target volume map.
    pub fn bus_volumes(&self) -> &HashMap<String, f32> {
        &self.bus_volumes
    }

    /// Sets the target parameters for a reverb bus.
    pub fn set_reverb_target(&mut self, reverb_bus: impl Into<String>, target: ReverbTarget) {
        self.reverb_targets.insert(reverb_bus.into(), target);
    }

    /// The reverb bus → target parameter map.
    pub fn reverb_targets(&self) -> &HashMap<String, ReverbTarget> {
        &self.reverb_targets
    }

    /// Whether the snapshot carries a target for the given reverb bus.
    pub fn has_reverb_target(&self, reverb_bus: &str) -> bool {
        self.reverb_targets.contains_key(reverb_bus)
    }
}
