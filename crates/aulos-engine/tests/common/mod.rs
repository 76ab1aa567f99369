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

//! Shared test fixture: a scripted mock backend whose state the test keeps a
//! handle to after the engine takes ownership of the backend box.

// Each test binary uses a different slice of the fixture.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use aulos_core::audio::{AudioBackend, FilterParam, VoiceHandle};
use aulos_core::math::Vec3;

#[derive(Debug, Default)]
pub struct MockState {
    next_handle: u32,
    live: HashSet<u32>,
    /// Every play call, in order: (handle, asset, stream).
    pub plays: Vec<(u32, String, bool)>,
    /// Last volume written per handle.
    pub volumes: HashMap<u32, f32>,
    /// Last relative play speed written per handle.
    pub speeds: HashMap<u32, f32>,
    /// Every filter parameter write: (handle, slot, param, value).
    pub filter_writes: Vec<(u32, u32, FilterParam, f32)>,
    /// Every faded filter parameter write: (handle, slot, param, value, seconds).
    pub filter_fades: Vec<(u32, u32, FilterParam, f32, f32)>,
    /// Last listener pose pushed: (position, velocity, forward, up).
    pub listener: Option<(Vec3, Vec3, Vec3, Vec3)>,
    /// Number of update_3d_audio calls.
    pub updates_3d: u32,
    /// Handles explicitly stopped by the engine.
    pub stopped: Vec<u32>,
    /// When set, play() refuses and returns the invalid handle.
    pub refuse_plays: bool,
}

impl MockState {
    pub fn handle_for_asset(&self, asset: &str) -> Option<VoiceHandle> {
        self.plays
            .iter()
            .rev()
            .find(|(_, a, _)| a == asset)
            .map(|&(h, _, _)| VoiceHandle(h))
    }

    pub fn play_count(&self, asset: &str) -> usize {
        self.plays.iter().filter(|(_, a, _)| a == asset).count()
    }

    pub fn is_live(&self, handle: VoiceHandle) -> bool {
        self.live.contains(&handle.0)
    }

    /// Simulates the asset finishing playback: the handle goes invalid.
    pub fn finish(&mut self, handle: VoiceHandle) {
        self.live.remove(&handle.0);
    }
}

/// Test-side handle onto the shared mock state.
#[derive(Clone)]
pub struct MockHandle(Arc<Mutex<MockState>>);

impl MockHandle {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.0.lock().unwrap()
    }

    pub fn finish_asset(&self, asset: &str) {
        let mut state = self.state();
        if let Some(handle) = state.handle_for_asset(asset) {
            state.finish(handle);
        }
    }
}

/// The engine-side mock backend. Handles are minted sequentially and stay
/// live until the test finishes them or the engine stops them.
pub struct MockBackend(Arc<Mutex<MockState>>);

impl MockBackend {
    pub fn new() -> (Box<Self>, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (Box::new(Self(state.clone())), MockHandle(state))
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.0.lock().unwrap()
    }
}

impl AudioBackend for MockBackend {
    fn play(&mut self, asset: &str, stream: bool) -> VoiceHandle {
        let mut state = self.state();
        if state.refuse_plays {
            return VoiceHandle::INVALID;
        }
        state.next_handle += 1;
        let handle = state.next_handle;
        state.live.insert(handle);
        state.plays.push((handle, asset.to_string(), stream));
        VoiceHandle(handle)
    }

    fn stop(&mut self, handle: VoiceHandle) {
        let mut state = self.state();
        state.live.remove(&handle.0);
        state.stopped.push(handle.0);
    }

    fn is_valid(&self, handle: VoiceHandle) -> bool {
        handle.is_valid() && self.state().live.contains(&handle.0)
    }

    fn stream_time(&self, _handle: VoiceHandle) -> f32 {
        0.0
    }

    fn set_volume(&mut self, handle: VoiceHandle, volume: f32) {
        self.state().volumes.insert(handle.0, volume);
    }

    fn fade_volume(&mut self, _handle: VoiceHandle, _volume: f32, _seconds: f32) {}

    fn schedule_stop(&mut self, _handle: VoiceHandle, _seconds: f32) {}

    fn set_relative_play_speed(&mut self, handle: VoiceHandle, speed: f32) {
        self.state().speeds.insert(handle.0, speed);
    }

    fn set_filter_parameter(&mut self, handle: VoiceHandle, slot: u32, param: FilterParam, value: f32) {
        self.state().filter_writes.push((handle.0, slot, param, value));
    }

    fn fade_filter_parameter(
        &mut self,
        handle: VoiceHandle,
        slot: u32,
        param: FilterParam,
        value: f32,
        seconds: f32,
    ) {
        self.state()
            .filter_fades
            .push((handle.0, slot, param, value, seconds));
    }

    fn create_bus(&mut self) -> VoiceHandle {
        let mut state = self.state();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.live.insert(handle);
        VoiceHandle(handle)
    }

    fn set_3d_listener_parameters(&mut self, position: Vec3, velocity: Vec3, forward: Vec3, up: Vec3) {
        self.state().listener = Some((position, velocity, forward, up));
    }

    fn update_3d_audio(&mut self) {
        self.state().updates_3d += 1;
    }

    fn active_voice_count(&self) -> u32 {
        self.state().live.len() as u32
    }

    fn backend_samplerate(&self) -> u32 {
        48_000
    }

    fn backend_buffer_size(&self) -> u32 {
        512
    }

    fn backend_channels(&self) -> u32 {
        2
    }
}
