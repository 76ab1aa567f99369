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

//! Interactive music: looping segments with crossfades, a beat/bar clock,
//! one-shot stingers, and a transition queue synced to the clock.

use std::collections::VecDeque;

use aulos_core::audio::{AudioBackend, VoiceHandle};
use aulos_core::error::AudioResult;

use crate::bank::SoundBank;

/// When a queued segment is allowed to take over.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransitionSync {
    /// On the next update.
    Immediate,
    /// On the next beat boundary.
    NextBeat,
    /// On the next bar boundary.
    NextBar,
}

#[derive(Debug, Clone)]
struct QueuedSegment {
    name: String,
    sync: TransitionSync,
    fade_s: f32,
}

/// Callback invoked on each beat with the beat index.
pub type BeatCallback = Box<dyn FnMut(i64) + Send>;

/// Drives the music layer: one looping segment at a time, beat-synced
/// transitions, and stingers layered on top.
pub struct MusicDirector {
    bpm: f32,
    beats_per_bar: u32,
    beat_position: f64,
    current_handle: VoiceHandle,
    current_segment: String,
    current_volume: f32,
    fading_out: VoiceHandle,
    fade_progress: f32,
    fade_duration: f32,
    queue: VecDeque<QueuedSegment>,
    beat_callback: Option<BeatCallback>,
}

impl Default for MusicDirector {
    fn default() -> Self {
        Self::new()
    }
}

impl MusicDirector {
    /// Creates a director at 120 BPM, 4/4.
    pub fn new() -> Self {
        Self {
            bpm: 120.0,
            beats_per_bar: 4,
            beat_position: 0.0,
            current_handle: VoiceHandle::INVALID,
            current_segment: String::new(),
            current_volume: 1.0,
            fading_out: VoiceHandle::INVALID,
            fade_progress: 0.0,
            fade_duration: 0.0,
            queue: VecDeque::new(),
            beat_callback: None,
        }
    }

    /// Sets the tempo in beats per minute (floored at 1).
    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = bpm.max(1.0);
    }

    /// The current tempo.
    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Sets the bar length in beats (floored at 1).
    pub fn set_beats_per_bar(&mut self, beats: u32) {
        self.beats_per_bar = beats.max(1);
    }

    /// Installs the per-beat callback.
    pub fn set_beat_callback(&mut self, callback: BeatCallback) {
        self.beat_callback = Some(callback);
    }

    /// The continuous beat position since the director started.
    pub fn beat_position(&self) -> f64 {
        self.beat_position
    }

    /// The current bar index.
    pub fn bar_position(&self) -> i64 {
        self.beat_position as i64 / self.beats_per_bar as i64
    }

    /// Whether a segment is currently playing.
    pub fn is_playing(&self) -> bool {
        self.current_handle.is_valid()
    }

    /// The name of the playing segment, if any.
    pub fn current_segment(&self) -> Option<&str> {
        if self.is_playing() {
            Some(&self.current_segment)
        } else {
            None
        }
    }

    /// Starts a segment, crossfading from the previous one over `fade_s`
    /// when one is playing and the fade is positive.
    pub fn play_segment(
        &mut self,
        name: &str,
        fade_s: f32,
        bank: &SoundBank,
        backend: &mut dyn AudioBackend,
    ) -> AudioResult<()> {
        let event = bank.find(name)?;

        if self.current_handle.is_valid() && fade_s > 0.0 {
            // Crossfade: keep the old segment running and ramp it down while
            // the new one ramps up.
            if self.fading_out.is_valid() {
                backend.stop(self.fading_out);
            }
            self.fading_out = self.current_handle;
            self.fade_duration = fade_s;
            self.fade_progress = 0.0;

            let handle = backend.play(&event.path, true);
            backend.set_volume(handle, 0.0);
            self.current_handle = handle;
        } else {
            if self.current_handle.is_valid() {
                backend.stop(self.current_handle);
            }
            let handle = backend.play(&event.path, true);
            backend.set_volume(handle, self.current_volume);
            self.current_handle = handle;
        }
        self.current_segment = name.to_string();
        log::info!("music: segment '{name}' ({fade_s}s fade)");
        Ok(())
    }

    /// Queues a segment to start at the given sync point.
    pub fn queue_segment(&mut self, name: &str, sync: TransitionSync, fade_s: f32) {
        self.queue.push_back(QueuedSegment {
            name: name.to_string(),
            sync,
            fade_s,
        });
    }

    /// Plays a one-shot stinger over the current segment.
    pub fn play_stinger(
        &mut self,
        name: &str,
        volume: f32,
        bank: &SoundBank,
        backend: &mut dyn AudioBackend,
    ) -> AudioResult<()> {
        let event = bank.find(name)?;
        let handle = backend.play(&event.path, false);
        backend.set_volume(handle, volume);
        Ok(())
    }

    /// Stops the current segment, fading out over `fade_s` when positive.
    pub fn stop(&mut self, fade_s: f32, backend: &mut dyn AudioBackend) {
        if !self.current_handle.is_valid() {
            return;
        }
        if fade_s > 0.0 {
            backend.fade_volume(self.current_handle, 0.0, fade_s);
            backend.schedule_stop(self.current_handle, fade_s);
        } else {
            backend.stop(self.current_handle);
        }
        self.current_handle = VoiceHandle::INVALID;
        self.current_segment.clear();
    }

    /// Advances the clock, the crossfade, and the transition queue.
    pub fn update(&mut self, dt: f32, bank: &SoundBank, backend: &mut dyn AudioBackend) {
        let previous_beat = self.beat_position as i64;
        self.beat_position += dt as f64 * (self.bpm as f64 / 60.0);
        let current_beat = self.beat_position as i64;

        let beat_crossed = current_beat != previous_beat;
        if beat_crossed {
            if let Some(callback) = self.beat_callback.as_mut() {
                callback(current_beat);
            }
        }
        let bar_crossed =
            current_beat / self.beats_per_bar as i64 != previous_beat / self.beats_per_bar as i64;

        // Crossfade bookkeeping.
        if self.fading_out.is_valid() && self.fade_duration > 0.0 {
            self.fade_progress += dt;
            let t = (self.fade_progress / self.fade_duration).min(1.0);
            backend.set_volume(self.fading_out, (1.0 - t) * self.current_volume);
            if self.current_handle.is_valid() {
                backend.set_volume(self.current_handle, t * self.current_volume);
            }
            if t >= 1.0 {
                backend.stop(self.fading_out);
                self.fading_out = VoiceHandle::INVALID;
                self.fade_progress = 0.0;
                self.fade_duration = 0.0;
            }
        }

        // Transition queue.
        let should_transition = match self.queue.front() {
            None => false,
            Some(queued) => match queued.sync {
                TransitionSync::Immediate => true,
                TransitionSync::NextBeat => beat_crossed,
                TransitionSync::NextBar => bar_crossed,
            },
        };
        if should_transition {
            if let Some(queued) = self.queue.pop_front() {
                if let Err(err) = self.play_segment(&queued.name, queued.fade_s, bank, backend) {
                    log::warn!("music: queued segment failed: {err}");
                }
            }
        }
    }
}
