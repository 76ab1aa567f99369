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

//! # Aulos Engine
//!
//! The voice management and spatial mix pipeline that sits between a game's
//! per-frame tick and the platform audio backend.
//!
//! The engine owns a virtualised [`pool::VoicePool`] scheduled against a real
//! voice budget, a named [`bus::Bus`] graph with smoothed fades and snapshots,
//! reverb buses driven by spatial [`zone`]s, per-voice [`occlusion`] DSP, a
//! sidechain [`ducker::Ducker`], and Doppler pitch shift. All of it is
//! composed once per frame by [`engine::AudioEngine::tick`], which is the
//! single ordering authority: everything here is single-threaded except the
//! mutexed [`params::ParameterStore`].
//!
//! The platform mixer and the game's raycast provider stay behind the
//! `aulos-core` trait boundaries; this crate never decodes or mixes samples
//! itself (the bus [`compressor`] kernel is offered to backends that pull it).

pub mod attenuation;
pub mod bank;
pub mod bus;
pub mod compressor;
pub mod doppler;
pub mod ducker;
pub mod engine;
pub mod music;
pub mod occlusion;
pub mod params;
pub mod pool;
pub mod reverb;
pub mod snapshot;
pub mod voice;
pub mod zone;

pub use attenuation::{attenuation, DistanceCurve, DistanceSettings};
pub use bank::{EventDescriptor, PlaylistMode, SoundBank};
pub use bus::Bus;
pub use compressor::{Compressor, CompressorSettings};
pub use doppler::DopplerConfig;
pub use ducker::{Ducker, DuckingRule};
pub use engine::{AudioEngine, ListenerId};
pub use music::{MusicDirector, TransitionSync};
pub use occlusion::{OcclusionMaterial, OcclusionProcessor};
pub use params::{ParameterStore, RtpcCurve};
pub use pool::{StealBehavior, VoicePool};
pub use reverb::{ReverbBus, ReverbParams, ReverbPreset};
pub use snapshot::Snapshot;
pub use voice::{Marker, Voice, VoiceId, VoiceState};
pub use zone::{AudioZone, MixZone, ReverbZone, ZoneShape};
