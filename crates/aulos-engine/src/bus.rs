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

//! Named mix groups with smoothed volume fades.
//!
//! A bus does not mix samples itself: it tracks the backend handles of voices
//! routed through it and pushes its (fading) volume onto them each tick,
//! purging handles the backend no longer considers live.

use aulos_core::audio::{AudioBackend, VoiceHandle};

use crate::compressor::{Compressor, CompressorSettings};

/// Floor for fade windows so a zero fade completes on the next tick instead
/// of dividing by zero.
const MIN_FADE_S: f32 = 0.001;

/// A named mix group routing many voices through a shared gain.
#[derive(Debug)]
pub struct Bus {
    name: String,
    volume: f32,
    target_volume: f32,
    start_volume: f32,
    fade_total_s: f32,
    fade_remaining_s: f32,
    handles: Vec<VoiceHandle>,
    compressor: Compressor,
}

impl Bus {
    /// Creates a bus at unity volume.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume: 1.0,
            target_volume: 1.0,
            start_volume: 1.0,
            fade_total_s: 0.0,
            fade_remaining_s: 0.0,
            handles: Vec::new(),
            compressor: Compressor::default(),
        }
    }

    /// The bus name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a playing voice so the bus drives its volume.
    pub fn add_handle(&mut self, handle: VoiceHandle) {
        if handle.is_valid() {
            self.handles.push(handle);
        }
    }

    /// The current volume.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// The volume the bus is fading toward.
    pub fn target_volume(&self) -> f32 {
        self.target_volume
    }

    /// Whether a fade is still in flight.
    pub fn is_fading(&self) -> bool {
        self.fade_remaining_s > 0.0
    }

    /// Sets the volume immediately, cancelling any fade.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.max(0.0);
        self.volume = volume;
        self.target_volume = volume;
        self.fade_total_s = 0.0;
        self.fade_remaining_s = 0.0;
    }

    /// Starts a fade from the current volume to `volume` over `fade_s`.
    pub fn set_target_volume(&mut self, volume: f32, fade_s: f32) {
        self.start_volume = self.volume;
        self.target_volume = volume.max(0.0);
        self.fade_total_s = fade_s.max(MIN_FADE_S);
        self.fade_remaining_s = self.fade_total_s;
    }

    /// Advances the fade and applies the current volume to every tracked
    /// handle, dropping handles the backend reports as dead.
    pub fn update(&mut self, dt: f32, backend: &mut dyn AudioBackend) {
        if self.fade_remaining_s > 0.0 {
            self.fade_remaining_s -= dt;
            if self.fade_remaining_s <= 0.0 {
                self.fade_remaining_s = 0.0;
                self.volume = self.target_volume;
            } else {
                let t = 1.0 - self.fade_remaining_s / self.fade_total_s;
                self.volume = self.start_volume + (self.target_volume - self.start_volume) * t;
            }
        }

        let volume = self.volume;
        self.handles.retain(|&handle| {
            if backend.is_valid(handle) {
                backend.set_volume(handle, volume);
                true
            } else {
                false
            }
        });
    }

    /// Whether any tracked handle is still live on the backend. This is the
    /// sidechain-activity signal the ducker keys on.
    pub fn has_live_handles(&self, backend: &dyn AudioBackend) -> bool {
        self.handles.iter().any(|&h| backend.is_valid(h))
    }

    /// Number of handles currently tracked (live or not yet purged).
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Configures the bus compressor.
    pub fn set_compressor(&mut self, settings: CompressorSettings, enabled: bool) {
        self.compressor.set_settings(settings);
        self.compressor.set_enabled(enabled);
    }

    /// The bus compressor, for backends that process bus output through it.
    pub fn compressor_mut(&mut self) -> &mut Compressor {
        &mut self.compressor
    }

    /// The bus compressor settings.
    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aulos_core::math::Vec3;
    use std::collections::HashSet;

    /// Minimal backend double: every handle handed out stays valid until
    /// explicitly killed; volume writes are recorded.
    #[derive(Default)]
    struct RecordingBackend {
        live: HashSet<u32>,
        volumes: Vec<(u32, f32)>,
    }

    impl RecordingBackend {
        fn spawn(&mut self, raw: u32) -> VoiceHandle {
            self.live.insert(raw);
            VoiceHandle(raw)
        }
        fn kill(&mut self, handle: VoiceHandle) {
            self.live.remove(&handle.0);
        }
    }

    impl AudioBackend for RecordingBackend {
        fn play(&mut self, _asset: &str, _stream: bool) -> VoiceHandle {
            VoiceHandle::INVALID
        }
        fn stop(&mut self, handle: VoiceHandle) {
            self.kill(handle);
        }
        fn is_valid(&self, handle: VoiceHandle) -> bool {
            self.live.contains(&handle.0)
        }
        fn stream_time(&self, _handle: VoiceHandle) -> f32 {
            0.0
        }
        fn set_volume(&mut self, handle: VoiceHandle, volume: f32) {
            self.volumes.push((handle.0, volume));
        }
        fn fade_volume(&mut self, _handle: VoiceHandle, _volume: f32, _seconds: f32) {}
        fn schedule_stop(&mut self, _handle: VoiceHandle, _seconds: f32) {}
        fn set_relative_play_speed(&mut self, _handle: VoiceHandle, _speed: f32) {}
        fn set_filter_parameter(
            &mut self,
            _handle: VoiceHandle,
            _slot: u32,
            _param: aulos_core::audio::FilterParam,
            _value: f32,
        ) {
        }
        fn fade_filter_parameter(
            &mut self,
            _handle: VoiceHandle,
            _slot: u32,
            _param: aulos_core::audio::FilterParam,
            _value: f32,
            _seconds: f32,
        ) {
        }
        fn create_bus(&mut self) -> VoiceHandle {
            VoiceHandle::INVALID
        }
        fn set_3d_listener_parameters(&mut self, _p: Vec3, _v: Vec3, _f: Vec3, _u: Vec3) {}
        fn update_3d_audio(&mut self) {}
        fn active_voice_count(&self) -> u32 {
            self.live.len() as u32
        }
        fn backend_samplerate(&self) -> u32 {
            44_100
        }
        fn backend_buffer_size(&self) -> u32 {
            512
        }
        fn backend_channels(&self) -> u32 {
            2
        }
    }

    #[test]
    fn fade_reaches_target_over_window() {
        let mut backend = RecordingBackend::default();
        let mut bus = Bus::new("Music");
        bus.set_target_volume(0.0, 1.0);

        for _ in 0..10 {
            bus.update(0.1, &mut backend);
        }
        assert_eq!(bus.volume(), 0.0);
        assert!(!bus.is_fading());
    }

    #[test]
    fn fade_is_linear_in_time() {
        let mut backend = RecordingBackend::default();
        let mut bus = Bus::new("Music");
        bus.set_target_volume(0.0, 1.0);
        for _ in 0..5 {
            bus.update(0.1, &mut backend);
        }
        assert!((bus.volume() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn finished_fade_means_volume_equals_target() {
        let mut backend = RecordingBackend::default();
        let mut bus = Bus::new("SFX");
        bus.set_target_volume(0.4, 0.25);
        for _ in 0..100 {
            bus.update(0.016, &mut backend);
            if !bus.is_fading() {
                assert_eq!(bus.volume(), bus.target_volume());
            }
        }
        assert_eq!(bus.volume(), 0.4);
    }

    #[test]
    fn zero_fade_jumps_in_one_tick() {
        let mut backend = RecordingBackend::default();
        let mut bus = Bus::new("Music");
        bus.set_target_volume(0.2, 0.0);
        bus.update(0.016, &mut backend);
        assert_eq!(bus.volume(), 0.2);
    }

    #[test]
    fn set_volume_is_immediate_and_cancels_fade() {
        let mut bus = Bus::new("Music");
        bus.set_target_volume(0.0, 10.0);
        bus.set_volume(0.7);
        assert_eq!(bus.volume(), 0.7);
        assert_eq!(bus.target_volume(), 0.7);
        assert!(!bus.is_fading());
    }

    #[test]
    fn update_applies_volume_and_purges_dead_handles() {
        let mut backend = RecordingBackend::default();
        let alive = backend.spawn(1);
        let doomed = backend.spawn(2);

        let mut bus = Bus::new("SFX");
        bus.add_handle(alive);
        bus.add_handle(doomed);
        bus.set_volume(0.5);

        backend.kill(doomed);
        bus.update(0.016, &mut backend);

        assert_eq!(bus.handle_count(), 1);
        assert!(backend.volumes.contains(&(1, 0.5)));
        assert!(!backend.volumes.iter().any(|&(h, _)| h == 2));
    }

    #[test]
    fn invalid_handles_are_never_tracked() {
        let mut bus = Bus::new("SFX");
        bus.add_handle(VoiceHandle::INVALID);
        assert_eq!(bus.handle_count(), 0);
    }

    #[test]
    fn live_handle_query_feeds_sidechain() {
        let mut backend = RecordingBackend::default();
        let h = backend.spawn(9);
        let mut bus = Bus::new("Dialogue");
        assert!(!bus.has_live_handles(&backend));
        bus.add_handle(h);
        assert!(bus.has_live_handles(&backend));
        backend.kill(h);
        assert!(!bus.has_live_handles(&backend));
    }
}
