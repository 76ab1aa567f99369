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

//! Doppler pitch shift from source/listener relative radial velocity.

use aulos_core::math::{Vec3, EPSILON};

/// Bounds on the computed pitch factor, so extreme velocities stay musical.
const MIN_PITCH: f32 = 0.25;
const MAX_PITCH: f32 = 4.0;

/// Doppler tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DopplerConfig {
    /// Whether per-voice Doppler shift is applied at all.
    pub enabled: bool,
    /// Exaggeration factor; 1.0 is physically motivated, 0.0 disables shift.
    pub factor: f32,
    /// Propagation speed in world units per second.
    pub speed_of_sound: f32,
}

impl Default for DopplerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            factor: 1.0,
            speed_of_sound: 343.0,
        }
    }
}

/// Computes the Doppler pitch factor for a source as heard by a listener.
///
/// Velocities are projected onto the source→listener axis; a source closing
/// on the listener raises pitch, one receding lowers it. Radial speeds are
/// limited just below the speed of sound so the factor never blows up, and
/// the result is clamped to `[0.25, 4.0]`.
pub fn doppler_pitch(
    config: &DopplerConfig,
    source_pos: Vec3,
    source_vel: Vec3,
    listener_pos: Vec3,
    listener_vel: Vec3,
) -> f32 {
    if !config.enabled || config.factor <= 0.0 {
        return 1.0;
    }

    let to_listener = listener_pos - source_pos;
    let dist = to_listener.length();
    if dist <= EPSILON {
        return 1.0;
    }

    // Radial speeds along the source→listener axis, positive when moving
    // from the source toward the listener.
    let radial_listener = to_listener.dot(listener_vel) / dist;
    let radial_source = to_listener.dot(source_vel) / dist;

    let limit = config.speed_of_sound / config.factor * 0.95;
    let radial_listener = radial_listener.clamp(-limit, limit);
    let radial_source = radial_source.clamp(-limit, limit);

    let pitch = (config.speed_of_sound - config.factor * radial_listener)
        / (config.speed_of_sound - config.factor * radial_source);
    pitch.clamp(MIN_PITCH, MAX_PITCH)
}
