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

//! Per-voice occlusion: raycast hits → obstruction/occlusion → smoothed
//! low-pass and volume DSP.

use std::collections::HashMap;

use aulos_core::audio::{AudioBackend, FilterParam, OcclusionOracle, FILTER_SLOT_OCCLUSION};
use aulos_core::math::Vec3;

use crate::voice::Voice;

/// How a material affects sound propagation.
#[derive(Debug, Clone, PartialEq)]
pub struct OcclusionMaterial {
    /// Material name, matched against oracle hit names.
    pub name: String,
    /// Partial blocking contribution in `[0, 1]`.
    pub obstruction: f32,
    /// Additional bias toward full occlusion (may be negative for
    /// materials sound leaks around).
    pub occlusion_bias: f32,
}

impl OcclusionMaterial {
    /// Creates a material.
    pub fn new(name: impl Into<String>, obstruction: f32, occlusion_bias: f32) -> Self {
        Self {
            name: name.into(),
            obstruction,
            occlusion_bias,
        }
    }
}

/// The built-in material table `(obstruction, occlusion_bias)`.
fn default_materials() -> Vec<OcclusionMaterial> {
    vec![
        OcclusionMaterial::new("Glass", 0.20, -0.20),
        OcclusionMaterial::new("Fabric", 0.10, -0.30),
        OcclusionMaterial::new("Foliage", 0.15, -0.20),
        OcclusionMaterial::new("Wood", 0.30, 0.00),
        OcclusionMaterial::new("Plaster", 0.40, 0.10),
        OcclusionMaterial::new("Metal", 0.50, 0.10),
        OcclusionMaterial::new("Brick", 0.60, 0.20),
        OcclusionMaterial::new("Concrete", 0.80, 0.30),
        OcclusionMaterial::new("Stone", 0.85, 0.35),
        OcclusionMaterial::new("Terrain", 1.00, 0.50),
        OcclusionMaterial::new("Water", 0.90, 0.40),
        OcclusionMaterial::new("Default", 0.50, 0.00),
    ]
}

/// Computes and applies occlusion DSP for real voices.
///
/// Oracle queries are rate-limited per voice; between queries only the
/// one-pole smoothing advances, so cutoff and volume never step.
pub struct OcclusionProcessor {
    oracle: Option<Box<dyn OcclusionOracle>>,
    materials: HashMap<String, OcclusionMaterial>,
    enabled: bool,
    threshold: f32,
    smoothing_time_s: f32,
    update_rate_hz: f32,
    min_lowpass_hz: f32,
    max_lowpass_hz: f32,
    max_volume_reduction: f32,
}

impl Default for OcclusionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl OcclusionProcessor {
    /// Creates a processor with the built-in material table and default tuning.
    pub fn new() -> Self {
        let materials = default_materials()
            .into_iter()
            .map(|m| (m.name.clone(), m))
            .collect();
        Self {
            oracle: None,
            materials,
            enabled: true,
            threshold: 0.7,
            smoothing_time_s: 0.1,
            update_rate_hz: 10.0,
            min_lowpass_hz: 400.0,
            max_lowpass_hz: 22_000.0,
            max_volume_reduction: 0.5,
        }
    }

    /// Installs the game's raycast oracle.
    pub fn set_oracle(&mut self, oracle: Box<dyn OcclusionOracle>) {
        self.oracle = Some(oracle);
    }

    /// Registers (or replaces) a material.
    pub fn register_material(&mut self, material: OcclusionMaterial) {
        self.materials.insert(material.name.clone(), material);
    }

    /// Enables or disables occlusion processing.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether occlusion processing is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the obstruction level past which full occlusion starts ramping.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(0.0, 1.0);
    }

    /// The occlusion threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Sets the one-pole smoothing time constant.
    pub fn set_smoothing_time(&mut self, seconds: f32) {
        self.smoothing_time_s = seconds.max(0.01);
    }

    /// Sets how often each voice re-queries the oracle.
    pub fn set_update_rate(&mut self, hz: f32) {
        self.update_rate_hz = hz.max(1.0);
    }

    /// Sets the low-pass cutoff range mapped over the blocking amount.
    pub fn set_lowpass_range(&mut self, min_hz: f32, max_hz: f32) {
        self.min_lowpass_hz = min_hz.clamp(100.0, 22_000.0);
        self.max_lowpass_hz = max_hz.clamp(self.min_lowpass_hz, 22_000.0);
    }

    /// Sets the maximum volume reduction at full blocking.
    pub fn set_volume_reduction(&mut self, max_reduction: f32) {
        self.max_volume_reduction = max_reduction.clamp(0.0, 1.0);
    }

    /// Per-voice occlusion pass.
    ///
    /// Advances the voice's query timer; below the query interval only the
    /// smoothing advances. On a query tick the oracle's hits are accumulated
    /// into obstruction and occlusion targets, then smoothed as usual. With
    /// no oracle (or disabled) the targets drift back to unoccluded.
    pub fn update(&self, voice: &mut Voice, listener_pos: Vec3, dt: f32) {
        let oracle = match (&self.oracle, self.enabled) {
            (Some(oracle), true) => oracle,
            _ => {
                voice.obstruction = 0.0;
                voice.occlusion = 0.0;
                voice.target_lowpass_hz = self.max_lowpass_hz;
                voice.occlusion_volume = 1.0;
                self.smooth(voice, dt);
                return;
            }
        };

        voice.occlusion_query_timer += dt;
        if voice.occlusion_query_timer < 1.0 / self.update_rate_hz {
            self.smooth(voice, dt);
            return;
        }
        voice.occlusion_query_timer = 0.0;

        let hits = oracle.cast(voice.position, listener_pos);

        let mut total_obstruction = 0.0;
        let mut total_bias = 0.0;
        for hit in &hits {
            let material = self.material(&hit.material);
            let thickness_factor = hit.thickness.min(3.0) / 3.0;
            total_obstruction += material.obstruction * (0.5 + 0.5 * thickness_factor);
            total_bias += material.occlusion_bias;
        }

        voice.obstruction = total_obstruction.clamp(0.0, 1.0);

        let occlusion_value = voice.obstruction + total_bias;
        voice.occlusion = if occlusion_value >= self.threshold && self.threshold < 1.0 {
            ((occlusion_value - self.threshold) / (1.0 - self.threshold)).clamp(0.0, 1.0)
        } else if occlusion_value >= self.threshold {
            1.0
        } else {
            0.0
        };

        let combined = voice.obstruction.max(voice.occlusion);

        let freq_t = 1.0 - combined;
        voice.target_lowpass_hz =
            self.min_lowpass_hz * (self.max_lowpass_hz / self.min_lowpass_hz).powf(freq_t);
        voice.occlusion_volume = 1.0 - combined * self.max_volume_reduction;

        self.smooth(voice, dt);
    }

    /// Pushes the smoothed occlusion state to the backend voice: volume
    /// scaled by the occlusion multiplier, cutoff on the reserved low-pass
    /// slot. Applied every tick, even fully open, so transitions stay
    /// glitch-free.
    pub fn apply_dsp(&self, voice: &Voice, backend: &mut dyn AudioBackend) {
        if !self.enabled || !voice.handle.is_valid() {
            return;
        }

        backend.set_volume(voice.handle, voice.volume * voice.occlusion_volume);
        backend.set_filter_parameter(
            voice.handle,
            FILTER_SLOT_OCCLUSION,
            FilterParam::Frequency,
            voice.current_lowpass_hz,
        );
    }

    fn material(&self, name: &str) -> &OcclusionMaterial {
        self.materials
            .get(name)
            .or_else(|| self.materials.get("Default"))
            .unwrap_or(&FALLBACK_MATERIAL)
    }

    fn smooth(&self, voice: &mut Voice, dt: f32) {
        let alpha = 1.0 - (-dt / self.smoothing_time_s).exp();
        voice.current_lowpass_hz +=
            alpha * (voice.target_lowpass_hz - voice.current_lowpass_hz);
        voice.occlusion_smoothed += alpha * (voice.occlusion - voice.occlusion_smoothed);
    }
}

/// Used only if the `Default` entry was removed from the table.
static FALLBACK_MATERIAL: OcclusionMaterial = OcclusionMaterial {
    name: String::new(),
    obstruction: 0.5,
    occlusion_bias: 0.0,
};
