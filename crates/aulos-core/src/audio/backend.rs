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

//! Defines the abstract [`AudioBackend`] trait.

use crate::math::Vec3;

/// An opaque token referring to one playing backend voice.
///
/// Handle `0` is reserved as the invalid handle; the engine holds a handle
/// only while the backing logical voice is real.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VoiceHandle(pub u32);

impl VoiceHandle {
    /// The invalid handle.
    pub const INVALID: Self = Self(0);

    /// Returns `true` if this handle is not the invalid handle.
    ///
    /// Note this is a purely syntactic check; whether the backend still
    /// considers the voice alive is answered by [`AudioBackend::is_valid`].
    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// The per-voice filter slot the engine reserves for its occlusion low-pass.
pub const FILTER_SLOT_OCCLUSION: u32 = 0;

/// A parameter of a per-voice backend filter.
///
/// `Frequency` and `Resonance` address the low-pass biquad every backend must
/// provide on [`FILTER_SLOT_OCCLUSION`]; the remaining parameters address the
/// reverb effect attached to a bus voice created via
/// [`AudioBackend::create_bus`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FilterParam {
    /// Cutoff frequency of a low-pass filter, in Hz.
    Frequency,
    /// Resonance of a low-pass filter.
    Resonance,
    /// Wet/dry mix of a reverb effect.
    Wet,
    /// Room size of a reverb effect.
    RoomSize,
    /// High-frequency damping of a reverb effect.
    Damp,
    /// Stereo width of a reverb effect.
    Width,
    /// Freeze mode of a reverb effect (1.0 = infinite tail).
    Freeze,
}

/// The abstract contract for the platform audio backend.
///
/// This trait is the boundary between the engine's logical layer (voices,
/// buses, zones) and the infrastructure that decodes assets and mixes
/// samples into the output device. The engine owns a boxed backend for its
/// whole lifetime and drives it exclusively from the tick thread.
///
/// Implementations must not block: every method is called from inside the
/// per-frame tick.
pub trait AudioBackend {
    /// Starts playback of an asset and returns its handle.
    ///
    /// `stream` hints that the asset should be streamed from disk rather
    /// than fully decoded up front. Returns [`VoiceHandle::INVALID`] when
    /// playback could not start; the engine treats that as a retryable
    /// failure.
    fn play(&mut self, asset: &str, stream: bool) -> VoiceHandle;

    /// Stops a playing voice. Invalid handles are ignored.
    fn stop(&mut self, handle: VoiceHandle);

    /// Returns `true` while the handle refers to a live backend voice.
    ///
    /// A voice that played to completion becomes invalid; the engine polls
    /// this each tick to detect finished playback.
    fn is_valid(&self, handle: VoiceHandle) -> bool;

    /// Returns the playback position of a voice in seconds.
    fn stream_time(&self, handle: VoiceHandle) -> f32;

    /// Sets the voice's volume immediately.
    fn set_volume(&mut self, handle: VoiceHandle, volume: f32);

    /// Fades the voice's volume to `volume` over `seconds`.
    fn fade_volume(&mut self, handle: VoiceHandle, volume: f32, seconds: f32);

    /// Stops the voice after `seconds` have elapsed.
    fn schedule_stop(&mut self, handle: VoiceHandle, seconds: f32);

    /// Sets the voice's playback speed relative to its natural rate
    /// (1.0 = unchanged). Used for pitch randomisation and Doppler shift.
    fn set_relative_play_speed(&mut self, handle: VoiceHandle, speed: f32);

    /// Sets a filter parameter on one of the voice's filter slots.
    fn set_filter_parameter(
        &mut self,
        handle: VoiceHandle,
        slot: u32,
        param: FilterParam,
        value: f32,
    );

    /// Fades a filter parameter to `value` over `seconds`.
    fn fade_filter_parameter(
        &mut self,
        handle: VoiceHandle,
        slot: u32,
        param: FilterParam,
        value: f32,
        seconds: f32,
    );

    /// Allocates a long-lived mixing bus voice and returns its handle.
    ///
    /// The engine attaches reverb effects to bus voices and drives their
    /// parameters through [`Self::set_filter_parameter`] /
    /// [`Self::fade_filter_parameter`]. Returns [`VoiceHandle::INVALID`] on
    /// failure.
    fn create_bus(&mut self) -> VoiceHandle;

    /// Pushes the primary listener's pose for 3D panning and attenuation.
    fn set_3d_listener_parameters(
        &mut self,
        position: Vec3,
        velocity: Vec3,
        forward: Vec3,
        up: Vec3,
    );

    /// Commits all 3D parameter changes made since the last call.
    fn update_3d_audio(&mut self);

    /// Returns the number of voices the backend is currently mixing.
    fn active_voice_count(&self) -> u32;

    /// Returns the backend's output sample rate in Hz.
    fn backend_samplerate(&self) -> u32;

    /// Returns the backend's mix buffer size in frames.
    fn backend_buffer_size(&self) -> u32;

    /// Returns the backend's output channel count.
    fn backend_channels(&self) -> u32;
}
