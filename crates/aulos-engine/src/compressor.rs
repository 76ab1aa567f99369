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

//! Dynamic range compression for bus output.
//!
//! The engine itself never touches sample buffers; backends that expose a
//! per-bus processing hook pull [`Compressor::process`] on the samples a bus
//! emits.

/// Settings for a compressor/limiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    /// Compression threshold in dB.
    pub threshold_db: f32,
    /// Compression ratio above the threshold (e.g. 4.0 for 4:1).
    pub ratio: f32,
    /// Attack time in milliseconds.
    pub attack_ms: f32,
    /// Release time in milliseconds.
    pub release_ms: f32,
    /// Makeup gain in dB applied after reduction.
    pub makeup_gain_db: f32,
    /// Hard limiter mode (treats the ratio as infinite).
    pub limiter: bool,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -10.0,
            ratio: 4.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            makeup_gain_db: 0.0,
            limiter: false,
        }
    }
}

const MIN_DB: f32 = -96.0;

/// A per-bus compressor/limiter with a dB-domain gain envelope.
#[derive(Debug, Clone)]
pub struct Compressor {
    settings: CompressorSettings,
    sample_rate: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope_db: f32,
    enabled: bool,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(44_100.0)
    }
}

impl Compressor {
    /// Creates a compressor for the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        let mut comp = Self {
            settings: CompressorSettings::default(),
            sample_rate: sample_rate.max(1.0),
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope_db: 0.0,
            enabled: false,
        };
        comp.update_coefficients();
        comp
    }

    /// Applies new settings.
    pub fn set_settings(&mut self, settings: CompressorSettings) {
        self.settings = settings;
        self.update_coefficients();
    }

    /// The current settings.
    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    /// Enables or disables processing.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the compressor is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The current gain reduction in dB (positive numbers mean reduction).
    pub fn gain_reduction_db(&self) -> f32 {
        -self.envelope_db
    }

    /// Resets the gain envelope.
    pub fn reset(&mut self) {
        self.envelope_db = 0.0;
    }

    /// Processes samples in place. A no-op while disabled.
    pub fn process(&mut self, samples: &mut [f32]) {
        if !self.enabled {
            return;
        }

        for sample in samples.iter_mut() {
            let input = *sample;
            let input_db = linear_to_db(input.abs());

            let mut reduction_db = 0.0;
            if input_db > self.settings.threshold_db {
                if self.settings.limiter {
                    reduction_db = self.settings.threshold_db - input_db;
                } else {
                    let excess = input_db - self.settings.threshold_db;
                    reduction_db = excess / self.settings.ratio.max(1.0) - excess;
                }
            }

            // Attack when more reduction is needed, release when less.
            let coeff = if reduction_db < self.envelope_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope_db = coeff * (self.envelope_db - reduction_db) + reduction_db;

            let gain = db_to_linear(self.envelope_db + self.settings.makeup_gain_db);
            *sample = input * gain;
        }
    }

    fn update_coefficients(&mut self) {
        let attack_samples = (self.settings.attack_ms / 1000.0) * self.sample_rate;
        let release_samples = (self.settings.release_ms / 1000.0) * self.sample_rate;
        self.attack_coeff = (-1.0 / attack_samples.max(1.0)).exp();
        self.release_coeff = (-1.0 / release_samples.max(1.0)).exp();
    }
}

fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        MIN_DB
    } else {
        (20.0 * linear.log10()).max(MIN_DB)
    }
}

fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}
