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

//! Distance attenuation curves for 3D voices.

use std::fmt;
use std::sync::Arc;

/// How a voice's volume rolls off over the normalized distance `n` in `[0, 1]`.
#[derive(Clone, Default)]
pub enum DistanceCurve {
    /// `1 - n`.
    #[default]
    Linear,
    /// `1 - log10(1 + 9n)`: gradual up close, faster at range.
    Logarithmic,
    /// `1 / (1 + 4n²)`: physics-flavoured inverse square.
    InverseSquare,
    /// `e^(-3n)`.
    Exponential,
    /// Caller-supplied `f(n) -> [0, 1]`.
    Custom(Arc<dyn Fn(f32) -> f32 + Send + Sync>),
}

impl fmt::Debug for DistanceCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistanceCurve::Linear => "Linear",
            DistanceCurve::Logarithmic => "Logarithmic",
            DistanceCurve::InverseSquare => "InverseSquare",
            DistanceCurve::Exponential => "Exponential",
            DistanceCurve::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

/// Settings for distance-based attenuation.
#[derive(Debug, Clone)]
pub struct DistanceSettings {
    /// The rolloff curve to apply over the normalized range.
    pub curve: DistanceCurve,
    /// Distance at which attenuation starts (full volume inside).
    pub min_distance: f32,
    /// Distance at which the voice becomes inaudible.
    pub max_distance: f32,
    /// Multiplier on the normalized distance, steepening the curve.
    pub rolloff_factor: f32,
}

impl Default for DistanceSettings {
    fn default() -> Self {
        Self {
            curve: DistanceCurve::Linear,
            min_distance: 1.0,
            max_distance: 100.0,
            rolloff_factor: 1.0,
        }
    }
}

impl DistanceSettings {
    /// Linear rolloff out to `max_distance`.
    pub fn linear_to(max_distance: f32) -> Self {
        Self {
            max_distance,
            ..Self::default()
        }
    }
}

/// Calculates the attenuation factor for a voice at `distance` from the
/// listener, in `[0, 1]` (0 = silent, 1 = full volume).
pub fn attenuation(distance: f32, settings: &DistanceSettings) -> f32 {
    if distance <= settings.min_distance {
        return 1.0;
    }
    if distance >= settings.max_distance {
        return 0.0;
    }

    let range = settings.max_distance - settings.min_distance;
    let n = ((distance - settings.min_distance) / range * settings.rolloff_factor).clamp(0.0, 1.0);

    let value = match &settings.curve {
        DistanceCurve::Linear => 1.0 - n,
        DistanceCurve::Logarithmic => 1.0 - (1.0 + 9.0 * n).log10(),
        DistanceCurve::InverseSquare => 1.0 / (1.0 + 4.0 * n * n),
        DistanceCurve::Exponential => (-3.0 * n).exp(),
        DistanceCurve::Custom(f) => f(n),
    };

    value.clamp(0.0, 1.0)
}
