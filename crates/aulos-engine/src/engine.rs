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

//! The engine facade and per-frame tick orchestrator.
//!
//! [`AudioEngine::tick`] composes every subsystem in a fixed order each
//! frame: bus fades advance first so newly-routed voices see current
//! volumes, virtual voices promote before backend reconciliation so they
//! start the same tick, occlusion and Doppler only run on real voices with
//! live handles, snapshots apply after voice state changes, and the ducker
//! runs last so its gain is the final word on any bus it targets.

use std::collections::{BTreeMap, HashMap};

use aulos_core::audio::{AudioBackend, OcclusionOracle, VoiceHandle};
use aulos_core::error::{AudioError, AudioResult};
use aulos_core::math::Vec3;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::attenuation::{DistanceCurve, DistanceSettings};
use crate::bank::{EventDescriptor, PlaylistMode, SoundBank};
use crate::bus::Bus;
use crate::compressor::CompressorSettings;
use crate::doppler::{doppler_pitch, DopplerConfig};
use crate::ducker::{Ducker, DuckingRule};
use crate::music::{BeatCallback, MusicDirector, TransitionSync};
use crate::occlusion::{OcclusionMaterial, OcclusionProcessor};
use crate::params::{ParameterListener, ParameterStore, RtpcCurve};
use crate::pool::{StealBehavior, VoicePool};
use crate::reverb::{ReverbBus, ReverbParams, ReverbPreset};
use crate::snapshot::{ReverbTarget, Snapshot};
use crate::voice::{Marker, Voice, VoiceId, VoiceState};
use crate::zone::{AudioZone, MixZone, ReverbZone, ZoneShape};

/// Identifier of a registered listener.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u32);

/// Callback fired when the winning mix zone changes, with the zone name.
pub type ZoneCallback = Box<dyn FnMut(&str) + Send>;

/// Callback fired when a voice's playback clock crosses a marker.
pub type MarkerCallback = Box<dyn FnMut(VoiceId, &str) + Send>;

/// Fade used when the listener leaves the last active mix zone.
const MIX_ZONE_EXIT_FADE_S: f32 = 0.5;

/// Wet level a reverb zone drives its bus to at full influence.
const REVERB_ZONE_MAX_WET: f32 = 0.8;

/// Smoothing fade for zone-driven reverb wet changes.
const REVERB_ZONE_FADE_S: f32 = 0.1;

/// Epsilon below which the ducker leaves a bus volume untouched.
const DUCK_EPSILON: f32 = 0.001;

#[derive(Debug, Clone, Copy)]
struct Listener {
    position: Vec3,
    velocity: Vec3,
    forward: Vec3,
    up: Vec3,
    active: bool,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            active: true,
        }
    }
}

/// The audio engine: owns every subsystem and the backend, and advances the
/// whole pipeline once per frame from [`Self::tick`].
///
/// All state is engine-thread exclusive apart from the parameter store; API
/// calls that mutate engine state must come from the tick thread.
pub struct AudioEngine {
    backend: Box<dyn AudioBackend>,
    bank: SoundBank,
    params: ParameterStore,
    pool: VoicePool,
    buses: HashMap<String, Bus>,
    snapshots: HashMap<String, Snapshot>,
    reverb_buses: HashMap<String, ReverbBus>,
    audio_zones: Vec<AudioZone>,
    mix_zones: Vec<MixZone>,
    reverb_zones: Vec<ReverbZone>,
    ducker: Ducker,
    occlusion: OcclusionProcessor,
    doppler: DopplerConfig,
    music: MusicDirector,
    listeners: BTreeMap<ListenerId, Listener>,
    next_listener_id: u32,
    active_mix_zone: String,
    zone_crossfade: bool,
    zone_enter_callback: Option<ZoneCallback>,
    zone_exit_callback: Option<ZoneCallback>,
    marker_callback: Option<MarkerCallback>,
    rng: StdRng,
    initialized: bool,
}

impl AudioEngine {
    /// Creates an engine around a backend with the default RNG seed.
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self::with_seed(backend, 0x41_55_4c_4f)
    }

    /// Creates an engine with an explicit RNG seed, for deterministic replays.
    pub fn with_seed(backend: Box<dyn AudioBackend>, seed: u64) -> Self {
        Self {
            backend,
            bank: SoundBank::new(),
            params: ParameterStore::new(),
            pool: VoicePool::default(),
            buses: HashMap::new(),
            snapshots: HashMap::new(),
            reverb_buses: HashMap::new(),
            audio_zones: Vec::new(),
            mix_zones: Vec::new(),
            reverb_zones: Vec::new(),
            ducker: Ducker::new(),
            occlusion: OcclusionProcessor::new(),
            doppler: DopplerConfig::default(),
            music: MusicDirector::new(),
            listeners: BTreeMap::new(),
            next_listener_id: 1,
            active_mix_zone: String::new(),
            zone_crossfade: false,
            zone_enter_callback: None,
            zone_exit_callback: None,
            marker_callback: None,
            rng: StdRng::seed_from_u64(seed),
            initialized: false,
        }
    }

    /// Initializes the engine and creates the default `Master`, `SFX`, and
    /// `Music` buses.
    pub fn init(&mut self) -> AudioResult<()> {
        if self.initialized {
            return Err(AudioError::AlreadyInitialized);
        }
        for name in ["Master", "SFX", "Music"] {
            self.buses.insert(name.to_string(), Bus::new(name));
        }
        self.initialized = true;
        log::info!(
            "audio engine up: {} Hz, {} channels, buffer {}",
            self.backend.backend_samplerate(),
            self.backend.backend_channels(),
            self.backend.backend_buffer_size()
        );
        Ok(())
    }

    /// Stops every backend voice the engine holds and tears down all state.
    /// Subsequent API calls return [`AudioError::NotInitialized`].
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        // Release every handle before the owning maps go away.
        for voice in self.pool.voices_mut() {
            if voice.handle.is_valid() {
                self.backend.stop(voice.handle);
                voice.handle = VoiceHandle::INVALID;
            }
        }
        for zone in &mut self.audio_zones {
            if zone.handle().is_valid() {
                self.backend.stop(zone.handle());
                zone.set_handle(VoiceHandle::INVALID);
            }
        }
        self.music.stop(0.0, self.backend.as_mut());
        for reverb in self.reverb_buses.values() {
            if reverb.handle().is_valid() {
                self.backend.stop(reverb.handle());
            }
        }

        let max_real = self.pool.max_real();
        let steal = self.pool.steal_behavior();
        self.pool = VoicePool::new(max_real);
        self.pool.set_steal_behavior(steal);

        self.buses.clear();
        self.snapshots.clear();
        self.reverb_buses.clear();
        self.audio_zones.clear();
        self.mix_zones.clear();
        self.reverb_zones.clear();
        self.ducker.clear_rules();
        self.listeners.clear();
        self.active_mix_zone.clear();
        self.initialized = false;
        log::info!("audio engine shut down");
    }

    fn ensure_initialized(&self) -> AudioResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(AudioError::NotInitialized)
        }
    }

    // --- Sound bank ---

    /// Registers an event descriptor (overwrites same-named events).
    pub fn register_event(&mut self, descriptor: EventDescriptor) {
        self.bank.register(descriptor);
    }

    /// Registers one event from a JSON object string.
    pub fn register_event_json(&mut self, json: &str) -> AudioResult<()> {
        self.bank.register_from_json(json)
    }

    /// Loads a JSON file of event descriptors.
    pub fn load_events_from_file(&mut self, path: impl AsRef<std::path::Path>) -> AudioResult<()> {
        self.bank.load_from_file(path)
    }

    /// The sound bank.
    pub fn bank(&self) -> &SoundBank {
        &self.bank
    }

    // --- Playback ---

    /// Allocates a pooled voice for an event at a world position and tries
    /// to make it real immediately. The backend voice starts on the next
    /// tick.
    pub fn play_event(&mut self, name: &str, position: Vec3) -> AudioResult<VoiceId> {
        self.ensure_initialized()?;
        let event = self.bank.find(name)?.clone();

        let distance = DistanceSettings {
            curve: DistanceCurve::Linear,
            min_distance: 0.0,
            max_distance: event.max_distance,
            rolloff_factor: 1.0,
        };
        let id = self.pool.allocate(name, event.priority, position, distance);

        let listener_pos = self.primary_listener().map(|l| l.position).unwrap_or(Vec3::ZERO);
        let volume = sample_range(&mut self.rng, event.volume_min, event.volume_max);
        if let Some(voice) = self.pool.get_mut(id) {
            voice.volume = volume;
            voice.playlist_mode = event.playlist_mode;
            voice.loop_playlist = event.loop_playlist;
            voice.interval_s = event.interval_s;
            if !event.sounds.is_empty() {
                voice.playlist = event.sounds.clone();
                if event.playlist_mode == PlaylistMode::Shuffle {
                    voice.playlist.shuffle(&mut self.rng);
                }
            }
            if event.start_delay_s > 0.0 {
                voice.delay_timer = event.start_delay_s;
                voice.waiting_for_delay = true;
            }
            voice.update_audibility(listener_pos);
        }

        self.pool.make_real(id);
        Ok(id)
    }

    /// Fire-and-forget playback that bypasses the voice pool but still
    /// routes through the event's bus.
    pub fn play_event_direct(&mut self, name: &str) -> AudioResult<VoiceHandle> {
        self.ensure_initialized()?;
        start_event_direct(
            &self.bank,
            &mut self.buses,
            &mut self.rng,
            self.backend.as_mut(),
            name,
        )
    }

    /// Stops a pooled voice and frees its slot.
    pub fn stop_voice(&mut self, id: VoiceId) -> AudioResult<()> {
        self.ensure_initialized()?;
        if let Some(voice) = self.pool.get_mut(id) {
            if voice.handle.is_valid() {
                self.backend.stop(voice.handle);
            }
        }
        self.pool.stop(id);
        Ok(())
    }

    /// Moves a voice's source position.
    pub fn set_voice_position(&mut self, id: VoiceId, position: Vec3) -> AudioResult<()> {
        let voice = self.pool.get_mut(id).ok_or(AudioError::InvalidHandle)?;
        voice.position = position;
        Ok(())
    }

    /// Sets a voice's source velocity (Doppler input).
    pub fn set_voice_velocity(&mut self, id: VoiceId, velocity: Vec3) -> AudioResult<()> {
        let voice = self.pool.get_mut(id).ok_or(AudioError::InvalidHandle)?;
        voice.velocity = velocity;
        Ok(())
    }

    /// Replaces a voice's distance attenuation settings.
    pub fn set_voice_distance_settings(
        &mut self,
        id: VoiceId,
        settings: DistanceSettings,
    ) -> AudioResult<()> {
        let voice = self.pool.get_mut(id).ok_or(AudioError::InvalidHandle)?;
        voice.distance = settings;
        Ok(())
    }

    /// Sets a voice's send level into a reverb bus.
    pub fn set_voice_reverb_send(
        &mut self,
        id: VoiceId,
        reverb_bus: &str,
        level: f32,
    ) -> AudioResult<()> {
        if !self.reverb_buses.contains_key(reverb_bus) {
            return Err(AudioError::ReverbBusNotFound {
                name: reverb_bus.to_string(),
            });
        }
        let voice = self.pool.get_mut(id).ok_or(AudioError::InvalidHandle)?;
        voice
            .reverb_sends
            .insert(reverb_bus.to_string(), level.clamp(0.0, 1.0));
        Ok(())
    }

    /// Adds a timeline marker to a voice; the marker callback fires when the
    /// voice's playback clock crosses it.
    pub fn add_marker(&mut self, id: VoiceId, time_s: f32, name: &str) -> AudioResult<()> {
        let voice = self.pool.get_mut(id).ok_or(AudioError::InvalidHandle)?;
        voice.markers.push(Marker {
            name: name.to_string(),
            time_s,
            fired: false,
        });
        Ok(())
    }

    /// Installs the marker callback.
    pub fn set_marker_callback(&mut self, callback: MarkerCallback) {
        self.marker_callback = Some(callback);
    }

    /// Read access to a voice, for inspection.
    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.pool.get(id)
    }

    // --- Pool configuration ---

    /// Sets the budget of concurrently real voices.
    pub fn set_max_voices(&mut self, max_real: u32) {
        self.pool.set_max_real(max_real);
    }

    /// The budget of concurrently real voices.
    pub fn max_voices(&self) -> u32 {
        self.pool.max_real()
    }

    /// Sets the steal behavior.
    pub fn set_steal_behavior(&mut self, behavior: StealBehavior) {
        self.pool.set_steal_behavior(behavior);
    }

    /// The steal behavior.
    pub fn steal_behavior(&self) -> StealBehavior {
        self.pool.steal_behavior()
    }

    /// Number of non-stopped voices.
    pub fn active_voice_count(&self) -> u32 {
        self.pool.active_count()
    }

    /// Number of real voices.
    pub fn real_voice_count(&self) -> u32 {
        self.pool.real_count()
    }

    /// Number of virtual voices.
    pub fn virtual_voice_count(&self) -> u32 {
        self.pool.virtual_count()
    }

    // --- Buses ---

    /// Creates a named bus.
    pub fn create_bus(&mut self, name: &str) -> AudioResult<()> {
        self.ensure_initialized()?;
        if self.buses.contains_key(name) {
            return Err(AudioError::BusAlreadyExists {
                name: name.to_string(),
            });
        }
        self.buses.insert(name.to_string(), Bus::new(name));
        Ok(())
    }

    /// Sets a bus volume immediately.
    pub fn set_bus_volume(&mut self, name: &str, volume: f32) -> AudioResult<()> {
        self.ensure_initialized()?;
        let bus = self.buses.get_mut(name).ok_or_else(|| AudioError::BusNotFound {
            name: name.to_string(),
        })?;
        bus.set_volume(volume);
        Ok(())
    }

    /// Fades a bus volume to a target.
    pub fn set_bus_target_volume(&mut self, name: &str, volume: f32, fade_s: f32) -> AudioResult<()> {
        self.ensure_initialized()?;
        let bus = self.buses.get_mut(name).ok_or_else(|| AudioError::BusNotFound {
            name: name.to_string(),
        })?;
        bus.set_target_volume(volume, fade_s);
        Ok(())
    }

    /// A bus's current volume.
    pub fn bus_volume(&self, name: &str) -> AudioResult<f32> {
        self.ensure_initialized()?;
        self.buses
            .get(name)
            .map(Bus::volume)
            .ok_or_else(|| AudioError::BusNotFound {
                name: name.to_string(),
            })
    }

    /// Configures a bus's compressor.
    pub fn set_bus_compressor(
        &mut self,
        name: &str,
        settings: CompressorSettings,
        enabled: bool,
    ) -> AudioResult<()> {
        self.ensure_initialized()?;
        let bus = self.buses.get_mut(name).ok_or_else(|| AudioError::BusNotFound {
            name: name.to_string(),
        })?;
        bus.set_compressor(settings, enabled);
        Ok(())
    }

    /// Fades every bus back to unity volume.
    pub fn reset_bus_volumes(&mut self, fade_s: f32) -> AudioResult<()> {
        self.ensure_initialized()?;
        reset_bus_volumes_inner(&mut self.buses, fade_s);
        Ok(())
    }

    /// Re-targets an event's bus to the event's configured base volume.
    pub fn reset_event_volume(&mut self, event_name: &str, fade_s: f32) -> AudioResult<()> {
        self.ensure_initialized()?;
        let event = self.bank.find(event_name)?;
        let bus_name = event.bus_or_master().to_string();
        let volume = event.volume_min;
        if let Some(bus) = self.buses.get_mut(&bus_name) {
            bus.set_target_volume(volume, fade_s);
        }
        Ok(())
    }

    // --- Snapshots ---

    /// Creates (or resets) a named snapshot.
    pub fn create_snapshot(&mut self, name: &str) -> AudioResult<()> {
        self.ensure_initialized()?;
        self.snapshots.insert(name.to_string(), Snapshot::new());
        Ok(())
    }

    /// Sets a bus volume target inside a snapshot.
    pub fn set_snapshot_bus_volume(
        &mut self,
        snapshot: &str,
        bus: &str,
        volume: f32,
    ) -> AudioResult<()> {
        self.ensure_initialized()?;
        let snap = self
            .snapshots
            .get_mut(snapshot)
            .ok_or_else(|| AudioError::SnapshotNotFound {
                name: snapshot.to_string(),
            })?;
        snap.set_bus_volume(bus, volume);
        Ok(())
    }

    /// Sets a reverb bus parameter target inside a snapshot.
    pub fn set_snapshot_reverb_params(
        &mut self,
        snapshot: &str,
        reverb_bus: &str,
        wet: f32,
        room_size: f32,
        damp: f32,
        width: f32,
    ) -> AudioResult<()> {
        self.ensure_initialized()?;
        let snap = self
            .snapshots
            .get_mut(snapshot)
            .ok_or_else(|| AudioError::SnapshotNotFound {
                name: snapshot.to_string(),
            })?;
        snap.set_reverb_target(
            reverb_bus,
            ReverbTarget {
                wet,
                room_size,
                damp,
                width,
            },
        );
        Ok(())
    }

    /// Applies a snapshot: every named bus fades to its target and every
    /// named reverb bus takes its parameters. Unknown bus names inside the
    /// snapshot are skipped.
    pub fn apply_snapshot(&mut self, name: &str, fade_s: f32) -> AudioResult<()> {
        self.ensure_initialized()?;
        apply_snapshot_inner(
            &mut self.buses,
            &mut self.reverb_buses,
            &self.snapshots,
            self.backend.as_mut(),
            name,
            fade_s,
        )
    }

    // --- Reverb buses ---

    /// Creates a reverb bus with explicit parameters.
    pub fn create_reverb_bus(&mut self, name: &str, params: ReverbParams) -> AudioResult<()> {
        self.ensure_initialized()?;
        if self.reverb_buses.contains_key(name) {
            return Err(AudioError::BusAlreadyExists {
                name: name.to_string(),
            });
        }
        let mut reverb = ReverbBus::new(name);
        if !reverb.init(self.backend.as_mut()) {
            return Err(AudioError::ReverbBusInitFailed {
                name: name.to_string(),
            });
        }
        reverb.set_params(params, self.backend.as_mut());
        self.reverb_buses.insert(name.to_string(), reverb);
        Ok(())
    }

    /// Creates a reverb bus from a preset.
    pub fn create_reverb_bus_preset(&mut self, name: &str, preset: ReverbPreset) -> AudioResult<()> {
        self.create_reverb_bus(name, preset.params())
    }

    /// Sets a reverb bus's main parameters, fading over `fade_s`.
    pub fn set_reverb_params(
        &mut self,
        name: &str,
        wet: f32,
        room_size: f32,
        damp: f32,
        fade_s: f32,
    ) -> AudioResult<()> {
        self.ensure_initialized()?;
        let reverb = self
            .reverb_buses
            .get_mut(name)
            .ok_or_else(|| AudioError::ReverbBusNotFound {
                name: name.to_string(),
            })?;
        reverb.set_wet(wet, fade_s, self.backend.as_mut());
        reverb.set_room_size(room_size, fade_s, self.backend.as_mut());
        reverb.set_damp(damp, fade_s, self.backend.as_mut());
        Ok(())
    }

    /// Toggles a reverb bus's freeze mode.
    pub fn set_reverb_freeze(&mut self, name: &str, freeze: bool) -> AudioResult<()> {
        self.ensure_initialized()?;
        let reverb = self
            .reverb_buses
            .get_mut(name)
            .ok_or_else(|| AudioError::ReverbBusNotFound {
                name: name.to_string(),
            })?;
        reverb.set_freeze(freeze, self.backend.as_mut());
        Ok(())
    }

    /// A reverb bus's current wet level.
    pub fn reverb_wet(&self, name: &str) -> AudioResult<f32> {
        self.ensure_initialized()?;
        self.reverb_buses
            .get(name)
            .map(ReverbBus::wet)
            .ok_or_else(|| AudioError::ReverbBusNotFound {
                name: name.to_string(),
            })
    }

    // --- Zones ---

    /// Adds an ambient audio zone.
    pub fn add_audio_zone(
        &mut self,
        event: &str,
        position: Vec3,
        inner_radius: f32,
        outer_radius: f32,
    ) -> AudioResult<()> {
        self.ensure_initialized()?;
        self.audio_zones.push(AudioZone::new(
            event,
            position,
            ZoneShape::sphere(inner_radius, outer_radius),
        ));
        Ok(())
    }

    /// Adds an ambient audio zone that applies a snapshot while active.
    #[allow(clippy::too_many_arguments)]
    pub fn add_audio_zone_with_snapshot(
        &mut self,
        event: &str,
        position: Vec3,
        inner_radius: f32,
        outer_radius: f32,
        snapshot: &str,
        fade_in_s: f32,
        fade_out_s: f32,
    ) -> AudioResult<()> {
        self.ensure_initialized()?;
        self.audio_zones.push(AudioZone::with_snapshot(
            event,
            position,
            ZoneShape::sphere(inner_radius, outer_radius),
            snapshot,
            fade_in_s,
            fade_out_s,
        ));
        Ok(())
    }

    /// Adds a mix zone.
    #[allow(clippy::too_many_arguments)]
    pub fn add_mix_zone(
        &mut self,
        name: &str,
        snapshot: &str,
        position: Vec3,
        inner_radius: f32,
        outer_radius: f32,
        priority: u8,
        fade_in_s: f32,
        fade_out_s: f32,
    ) -> AudioResult<()> {
        self.ensure_initialized()?;
        self.mix_zones.push(MixZone::new(
            name,
            snapshot,
            position,
            ZoneShape::sphere(inner_radius, outer_radius),
            priority,
            fade_in_s,
            fade_out_s,
        ));
        Ok(())
    }

    /// Removes a mix zone by name.
    pub fn remove_mix_zone(&mut self, name: &str) -> AudioResult<()> {
        self.ensure_initialized()?;
        let before = self.mix_zones.len();
        self.mix_zones.retain(|z| z.name() != name);
        if self.mix_zones.len() == before {
            return Err(AudioError::ZoneNotFound {
                name: name.to_string(),
            });
        }
        if self.active_mix_zone == name {
            self.active_mix_zone.clear();
        }
        Ok(())
    }

    /// Adds a reverb zone driving a reverb bus.
    pub fn add_reverb_zone(
        &mut self,
        name: &str,
        reverb_bus: &str,
        position: Vec3,
        inner_radius: f32,
        outer_radius: f32,
        priority: u8,
    ) -> AudioResult<()> {
        self.ensure_initialized()?;
        self.reverb_zones.push(ReverbZone::new(
            name,
            reverb_bus,
            position,
            ZoneShape::sphere(inner_radius, outer_radius),
            priority,
        ));
        Ok(())
    }

    /// Removes a reverb zone by name.
    pub fn remove_reverb_zone(&mut self, name: &str) -> AudioResult<()> {
        self.ensure_initialized()?;
        let before = self.reverb_zones.len();
        self.reverb_zones.retain(|z| z.name() != name);
        if self.reverb_zones.len() == before {
            return Err(AudioError::ZoneNotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Names of reverb zones currently influencing the listener.
    pub fn active_reverb_zones(&self) -> Vec<String> {
        self.reverb_zones
            .iter()
            .filter(|z| z.is_active())
            .map(|z| z.name().to_string())
            .collect()
    }

    /// Name of the winning mix zone, if any.
    pub fn active_mix_zone(&self) -> Option<&str> {
        if self.active_mix_zone.is_empty() {
            None
        } else {
            Some(&self.active_mix_zone)
        }
    }

    /// Enables summing-with-normalisation across overlapping audio zones.
    pub fn set_zone_crossfade(&mut self, enabled: bool) {
        self.zone_crossfade = enabled;
    }

    /// Installs the mix-zone enter callback.
    pub fn set_zone_enter_callback(&mut self, callback: ZoneCallback) {
        self.zone_enter_callback = Some(callback);
    }

    /// Installs the mix-zone exit callback.
    pub fn set_zone_exit_callback(&mut self, callback: ZoneCallback) {
        self.zone_exit_callback = Some(callback);
    }

    // --- Listeners ---

    /// Registers a listener; the first active listener is the primary one.
    pub fn create_listener(&mut self) -> AudioResult<ListenerId> {
        self.ensure_initialized()?;
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.insert(id, Listener::default());
        Ok(id)
    }

    /// Removes a listener.
    pub fn destroy_listener(&mut self, id: ListenerId) -> AudioResult<()> {
        self.ensure_initialized()?;
        self.listeners
            .remove(&id)
            .map(|_| ())
            .ok_or(AudioError::ListenerNotFound { id: id.0 })
    }

    /// Moves a listener.
    pub fn set_listener_position(&mut self, id: ListenerId, position: Vec3) -> AudioResult<()> {
        self.ensure_initialized()?;
        let listener = self
            .listeners
            .get_mut(&id)
            .ok_or(AudioError::ListenerNotFound { id: id.0 })?;
        listener.position = position;
        Ok(())
    }

    /// Sets a listener's velocity.
    pub fn set_listener_velocity(&mut self, id: ListenerId, velocity: Vec3) -> AudioResult<()> {
        self.ensure_initialized()?;
        let listener = self
            .listeners
            .get_mut(&id)
            .ok_or(AudioError::ListenerNotFound { id: id.0 })?;
        listener.velocity = velocity;
        Ok(())
    }

    /// Sets a listener's orientation.
    pub fn set_listener_orientation(
        &mut self,
        id: ListenerId,
        forward: Vec3,
        up: Vec3,
    ) -> AudioResult<()> {
        self.ensure_initialized()?;
        let listener = self
            .listeners
            .get_mut(&id)
            .ok_or(AudioError::ListenerNotFound { id: id.0 })?;
        listener.forward = forward;
        listener.up = up;
        Ok(())
    }

    /// Marks a listener active or inactive.
    pub fn set_listener_active(&mut self, id: ListenerId, active: bool) -> AudioResult<()> {
        self.ensure_initialized()?;
        let listener = self
            .listeners
            .get_mut(&id)
            .ok_or(AudioError::ListenerNotFound { id: id.0 })?;
        listener.active = active;
        Ok(())
    }

    fn primary_listener(&self) -> Option<Listener> {
        self.listeners.values().find(|l| l.active).copied()
    }

    // --- Parameters ---

    /// Sets a global parameter; safe to call from any thread via a shared
    /// reference to the store.
    pub fn set_global_parameter(&self, name: &str, value: f32) {
        self.params.set(name, value);
    }

    /// Reads a global parameter.
    pub fn global_parameter(&self, name: &str) -> Option<f32> {
        self.params.get(name)
    }

    /// Binds a raw listener to a parameter.
    pub fn bind_parameter(&self, name: &str, listener: ParameterListener) {
        self.params.bind(name, listener);
    }

    /// Binds an RTPC curve between a parameter and an effect callback.
    pub fn bind_rtpc(&self, name: &str, curve: RtpcCurve, effect: ParameterListener) {
        self.params.bind_curve(name, curve, effect);
    }

    /// The parameter store, for sharing with game threads.
    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    // --- Ducker ---

    /// Adds a sidechain ducking rule.
    pub fn add_ducking_rule(&mut self, rule: DuckingRule) {
        self.ducker.add_rule(rule);
    }

    /// Removes a ducking rule.
    pub fn remove_ducking_rule(&mut self, target_bus: &str, sidechain_bus: &str) {
        self.ducker.remove_rule(target_bus, sidechain_bus);
    }

    /// Removes every ducking rule.
    pub fn clear_ducking_rules(&mut self) {
        self.ducker.clear_rules();
    }

    /// Whether any rule is actively ducking the bus.
    pub fn is_ducking(&self, target_bus: &str) -> bool {
        self.ducker.is_ducking(target_bus)
    }

    /// The current min-combined duck level for the bus.
    pub fn duck_level(&self, target_bus: &str) -> f32 {
        self.ducker.duck_level(target_bus)
    }

    // --- Occlusion ---

    /// Installs the game's raycast oracle.
    pub fn set_occlusion_oracle(&mut self, oracle: Box<dyn OcclusionOracle>) {
        self.occlusion.set_oracle(oracle);
    }

    /// Registers an occlusion material.
    pub fn register_occlusion_material(&mut self, material: OcclusionMaterial) {
        self.occlusion.register_material(material);
    }

    /// Enables or disables occlusion processing.
    pub fn set_occlusion_enabled(&mut self, enabled: bool) {
        self.occlusion.set_enabled(enabled);
    }

    /// Whether occlusion processing is enabled.
    pub fn is_occlusion_enabled(&self) -> bool {
        self.occlusion.is_enabled()
    }

    /// Sets the occlusion threshold.
    pub fn set_occlusion_threshold(&mut self, threshold: f32) {
        self.occlusion.set_threshold(threshold);
    }

    /// Sets the occlusion smoothing time constant.
    pub fn set_occlusion_smoothing_time(&mut self, seconds: f32) {
        self.occlusion.set_smoothing_time(seconds);
    }

    /// Sets the per-voice oracle query rate.
    pub fn set_occlusion_update_rate(&mut self, hz: f32) {
        self.occlusion.set_update_rate(hz);
    }

    /// Sets the occlusion low-pass cutoff range.
    pub fn set_occlusion_lowpass_range(&mut self, min_hz: f32, max_hz: f32) {
        self.occlusion.set_lowpass_range(min_hz, max_hz);
    }

    /// Sets the maximum occlusion volume reduction.
    pub fn set_occlusion_volume_reduction(&mut self, max_reduction: f32) {
        self.occlusion.set_volume_reduction(max_reduction);
    }

    // --- Doppler ---

    /// Enables or disables Doppler pitch shift.
    pub fn set_doppler_enabled(&mut self, enabled: bool) {
        self.doppler.enabled = enabled;
    }

    /// Sets the Doppler exaggeration factor.
    pub fn set_doppler_factor(&mut self, factor: f32) {
        self.doppler.factor = factor.max(0.0);
    }

    /// Sets the propagation speed used by the Doppler model.
    pub fn set_speed_of_sound(&mut self, speed: f32) {
        self.doppler.speed_of_sound = speed.max(1.0);
    }

    // --- Music ---

    /// Starts a music segment, crossfading from the current one.
    pub fn play_music_segment(&mut self, name: &str, fade_s: f32) -> AudioResult<()> {
        self.ensure_initialized()?;
        self.music
            .play_segment(name, fade_s, &self.bank, self.backend.as_mut())
    }

    /// Queues a music segment at a sync point.
    pub fn queue_music_segment(&mut self, name: &str, sync: TransitionSync, fade_s: f32) {
        self.music.queue_segment(name, sync, fade_s);
    }

    /// Plays a one-shot stinger over the music.
    pub fn play_stinger(&mut self, name: &str, volume: f32) -> AudioResult<()> {
        self.ensure_initialized()?;
        self.music
            .play_stinger(name, volume, &self.bank, self.backend.as_mut())
    }

    /// Stops the music, fading out over `fade_s`.
    pub fn stop_music(&mut self, fade_s: f32) -> AudioResult<()> {
        self.ensure_initialized()?;
        self.music.stop(fade_s, self.backend.as_mut());
        Ok(())
    }

    /// Sets the music tempo.
    pub fn set_music_bpm(&mut self, bpm: f32) {
        self.music.set_bpm(bpm);
    }

    /// Sets the music bar length in beats.
    pub fn set_music_beats_per_bar(&mut self, beats: u32) {
        self.music.set_beats_per_bar(beats);
    }

    /// Installs the per-beat callback.
    pub fn set_beat_callback(&mut self, callback: BeatCallback) {
        self.music.set_beat_callback(callback);
    }

    /// The music director, for direct inspection.
    pub fn music(&self) -> &MusicDirector {
        &self.music
    }

    // --- The tick ---

    /// Advances the whole pipeline by `dt` seconds. The fixed step order is
    /// the engine's ordering contract; see the module docs.
    pub fn tick(&mut self, dt: f32) -> AudioResult<()> {
        self.ensure_initialized()?;

        // 1. Bus fades advance first so voices started this tick see
        //    current volumes.
        for bus in self.buses.values_mut() {
            bus.update(dt, self.backend.as_mut());
        }

        // 2. Primary listener pose, then ambient zones against it.
        let listener = self.primary_listener();
        let listener_pos = listener.map(|l| l.position).unwrap_or(Vec3::ZERO);
        let listener_vel = listener.map(|l| l.velocity).unwrap_or(Vec3::ZERO);
        if let Some(l) = listener {
            self.backend
                .set_3d_listener_parameters(l.position, l.velocity, l.forward, l.up);
        }
        self.update_audio_zones(listener_pos);

        // 3. Rescore audibility and promote virtual voices.
        self.pool.update(dt, listener_pos);

        // 4. Reconcile every voice with the backend.
        self.reconcile_voices(listener_pos, listener_vel, dt);

        // 5. Mix-zone arbitration and snapshot application.
        self.update_mix_zones(listener_pos);

        // 6. Reverb-zone influence onto reverb bus wet levels.
        self.update_reverb_zones(listener_pos);

        // 7. Ducker last: its gain is the final word on bus volume.
        self.update_ducker(dt);

        self.music.update(dt, &self.bank, self.backend.as_mut());

        // 8. Commit 3D parameter changes.
        self.backend.update_3d_audio();
        Ok(())
    }

    fn update_audio_zones(&mut self, listener_pos: Vec3) {
        let AudioEngine {
            audio_zones,
            backend,
            bank,
            buses,
            reverb_buses,
            snapshots,
            rng,
            zone_crossfade,
            ..
        } = self;
        let backend = backend.as_mut();

        let mut total = 0.0;
        for zone in audio_zones.iter_mut() {
            total += zone.update(listener_pos);
        }
        // In crossfade mode overlapping zones share the budget so the
        // listener never hears boosted audio.
        let scale = if *zone_crossfade && total > 1.0 {
            1.0 / total
        } else {
            1.0
        };

        for zone in audio_zones.iter_mut() {
            if zone.blend() > 0.0 {
                if !backend.is_valid(zone.handle()) {
                    match start_event_direct(bank, buses, rng, backend, zone.event()) {
                        Ok(handle) => zone.set_handle(handle),
                        Err(err) => {
                            log::warn!("audio zone '{}': {err}", zone.event());
                            zone.set_handle(VoiceHandle::INVALID);
                        }
                    }
                }
                if zone.handle().is_valid() {
                    backend.set_volume(zone.handle(), zone.blend() * scale);
                }
                if !zone.was_active() {
                    if let Some(snapshot) = zone.snapshot() {
                        let snapshot = snapshot.to_string();
                        let fade = zone.fade_in_s();
                        if let Err(err) = apply_snapshot_inner(
                            buses,
                            reverb_buses,
                            snapshots,
                            backend,
                            &snapshot,
                            fade,
                        ) {
                            log::warn!("audio zone snapshot '{snapshot}': {err}");
                        }
                    }
                }
                zone.set_active(true);
            } else {
                if backend.is_valid(zone.handle()) {
                    backend.stop(zone.handle());
                }
                zone.set_handle(VoiceHandle::INVALID);
                if zone.was_active() && zone.snapshot().is_some() {
                    reset_bus_volumes_inner(buses, zone.fade_out_s());
                }
                zone.set_active(false);
            }
        }
    }

    fn reconcile_voices(&mut self, listener_pos: Vec3, listener_vel: Vec3, dt: f32) {
        let AudioEngine {
            pool,
            backend,
            bank,
            buses,
            occlusion,
            doppler,
            marker_callback,
            rng,
            ..
        } = self;
        let backend = backend.as_mut();

        for voice in pool.voices_mut() {
            if voice.is_stopped() {
                continue;
            }

            if voice.is_real() && !voice.handle.is_valid() {
                // Start-delay and playlist-interval gating.
                if voice.waiting_for_delay {
                    voice.delay_timer -= dt;
                    if voice.delay_timer > 0.0 {
                        continue;
                    }
                    voice.waiting_for_delay = false;
                    voice.delay_timer = 0.0;
                }

                let Some(event) = bank.get(&voice.event_name) else {
                    log::warn!("voice {}: event '{}' vanished from bank", voice.id, voice.event_name);
                    voice.state = VoiceState::Stopped;
                    continue;
                };

                let asset = select_asset(voice, event, rng).to_string();
                let handle = backend.play(&asset, event.stream);
                if handle.is_valid() {
                    voice.handle = handle;
                    voice.base_pitch = sample_range(rng, event.pitch_min, event.pitch_max);
                    backend.set_relative_play_speed(handle, voice.base_pitch);
                    backend.set_volume(handle, voice.volume);
                    if let Some(bus) = buses.get_mut(event.bus_or_master()) {
                        bus.add_handle(handle);
                    }
                    log::debug!("voice {}: started '{asset}'", voice.id);
                } else {
                    // Retry next tick; the pool will eventually steal the
                    // slot if the backend keeps refusing.
                    log::warn!("voice {}: backend refused '{asset}'", voice.id);
                }
            } else if voice.is_virtual() && voice.handle.is_valid() {
                backend.stop(voice.handle);
                voice.handle = VoiceHandle::INVALID;
            }

            if voice.is_real() && voice.handle.is_valid() {
                if !backend.is_valid(voice.handle) {
                    advance_playlist(voice);
                } else {
                    occlusion.update(voice, listener_pos, dt);
                    occlusion.apply_dsp(voice, backend);

                    if doppler.enabled {
                        voice.doppler_pitch = doppler_pitch(
                            doppler,
                            voice.position,
                            voice.velocity,
                            listener_pos,
                            listener_vel,
                        );
                        backend.set_relative_play_speed(
                            voice.handle,
                            voice.base_pitch * voice.doppler_pitch,
                        );
                    }

                    let playback_time = voice.playback_time;
                    let id = voice.id;
                    for marker in voice.markers.iter_mut() {
                        if !marker.fired && playback_time >= marker.time_s {
                            marker.fired = true;
                            if let Some(callback) = marker_callback.as_mut() {
                                callback(id, &marker.name);
                            }
                        }
                    }
                }
            }
        }
    }

    fn update_mix_zones(&mut self, listener_pos: Vec3) {
        for zone in &mut self.mix_zones {
            zone.update(listener_pos);
        }

        // Winner: highest priority, then highest blend.
        let mut best: Option<usize> = None;
        for (i, zone) in self.mix_zones.iter().enumerate() {
            if !zone.is_active() {
                continue;
            }
            best = match best {
                None => Some(i),
                Some(j) => {
                    let incumbent = &self.mix_zones[j];
                    if zone.priority() > incumbent.priority()
                        || (zone.priority() == incumbent.priority()
                            && zone.blend() > incumbent.blend())
                    {
                        Some(i)
                    } else {
                        Some(j)
                    }
                }
            };
        }

        let new_active = best
            .map(|i| self.mix_zones[i].name().to_string())
            .unwrap_or_default();
        if new_active != self.active_mix_zone {
            if !self.active_mix_zone.is_empty() {
                log::debug!("mix zone exit: '{}'", self.active_mix_zone);
                if let Some(callback) = self.zone_exit_callback.as_mut() {
                    callback(&self.active_mix_zone);
                }
                if new_active.is_empty() {
                    reset_bus_volumes_inner(&mut self.buses, MIX_ZONE_EXIT_FADE_S);
                }
            }
            if !new_active.is_empty() {
                log::debug!("mix zone enter: '{new_active}'");
                if let Some(callback) = self.zone_enter_callback.as_mut() {
                    callback(&new_active);
                }
            }
            self.active_mix_zone = new_active;
        }

        // The winner's snapshot flows in proportionally to the blend: the
        // fade argument shrinks as the listener nears the zone centre.
        if let Some(i) = best {
            let (snapshot, fade) = {
                let zone = &self.mix_zones[i];
                (zone.snapshot().to_string(), zone.blend() * zone.fade_in_s())
            };
            if let Err(err) = apply_snapshot_inner(
                &mut self.buses,
                &mut self.reverb_buses,
                &self.snapshots,
                self.backend.as_mut(),
                &snapshot,
                fade,
            ) {
                log::warn!("mix zone snapshot '{snapshot}': {err}");
            }
        }
    }

    fn update_reverb_zones(&mut self, listener_pos: Vec3) {
        let AudioEngine {
            reverb_zones,
            reverb_buses,
            backend,
            ..
        } = self;
        let backend = backend.as_mut();

        for zone in reverb_zones.iter_mut() {
            zone.update(listener_pos);
        }

        // Per bus, the strongest zone wins; buses with no influence fade out.
        for (name, reverb) in reverb_buses.iter_mut() {
            let influence = reverb_zones
                .iter()
                .filter(|z| z.reverb_bus() == name.as_str())
                .map(ReverbZone::influence)
                .fold(0.0, f32::max);
            reverb.set_wet(influence * REVERB_ZONE_MAX_WET, REVERB_ZONE_FADE_S, backend);
        }
    }

    fn update_ducker(&mut self, dt: f32) {
        let levels = {
            let buses = &self.buses;
            let backend: &dyn AudioBackend = self.backend.as_ref();
            self.ducker.advance(dt, |name| {
                buses
                    .get(name)
                    .map(|bus| bus.has_live_handles(backend))
                    .unwrap_or(false)
            })
        };

        for (name, level) in levels {
            if let Some(bus) = self.buses.get_mut(&name) {
                if (bus.volume() - level).abs() > DUCK_EPSILON {
                    bus.set_volume(level);
                }
            }
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Uniform draw in `[min, max]`, tolerating swapped or degenerate bounds.
fn sample_range(rng: &mut StdRng, min: f32, max: f32) -> f32 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    if (hi - lo).abs() < f32::EPSILON {
        lo
    } else {
        rng.gen_range(lo..=hi)
    }
}

/// Resolves the asset a voice should play next.
fn select_asset<'a>(voice: &'a Voice, event: &'a EventDescriptor, rng: &mut StdRng) -> &'a str {
    if voice.playlist.is_empty() {
        return &event.path;
    }
    match voice.playlist_mode {
        PlaylistMode::Random => {
            let index = rng.gen_range(0..voice.playlist.len());
            &voice.playlist[index]
        }
        _ => {
            let index = voice.playlist_index.min(voice.playlist.len() - 1);
            &voice.playlist[index]
        }
    }
}

/// Applies playlist/repeat rules after the backend reports a finished item.
fn advance_playlist(voice: &mut Voice) {
    voice.handle = VoiceHandle::INVALID;

    let continues = if voice.playlist.is_empty() {
        // Single sound: restart only when looping.
        voice.loop_playlist
    } else {
        match voice.playlist_mode {
            PlaylistMode::Sequential | PlaylistMode::Shuffle => {
                voice.playlist_index += 1;
                if voice.playlist_index >= voice.playlist.len() {
                    if voice.loop_playlist {
                        voice.playlist_index = 0;
                        true
                    } else {
                        false
                    }
                } else {
                    true
                }
            }
            PlaylistMode::Random | PlaylistMode::Single => voice.loop_playlist,
        }
    };

    if continues {
        if voice.interval_s > 0.0 {
            voice.delay_timer = voice.interval_s;
            voice.waiting_for_delay = true;
        }
    } else {
        log::debug!("voice {}: playlist finished", voice.id);
        voice.state = VoiceState::Stopped;
    }
}

/// Starts an event directly on the backend (no pool voice) and routes it to
/// the event's bus.
fn start_event_direct(
    bank: &SoundBank,
    buses: &mut HashMap<String, Bus>,
    rng: &mut StdRng,
    backend: &mut dyn AudioBackend,
    name: &str,
) -> AudioResult<VoiceHandle> {
    let event = bank.find(name)?;
    let asset = if event.sounds.is_empty() {
        event.path.clone()
    } else {
        event.sounds[rng.gen_range(0..event.sounds.len())].clone()
    };

    let handle = backend.play(&asset, event.stream);
    if !handle.is_valid() {
        return Err(AudioError::PlaybackFailed {
            event: name.to_string(),
        });
    }
    backend.set_volume(handle, sample_range(rng, event.volume_min, event.volume_max));
    backend.set_relative_play_speed(handle, sample_range(rng, event.pitch_min, event.pitch_max));
    if let Some(bus) = buses.get_mut(event.bus_or_master()) {
        bus.add_handle(handle);
    }
    Ok(handle)
}

/// Applies a snapshot to the bus graph and reverb buses. Buses the snapshot
/// names but the graph lacks are skipped.
fn apply_snapshot_inner(
    buses: &mut HashMap<String, Bus>,
    reverb_buses: &mut HashMap<String, ReverbBus>,
    snapshots: &HashMap<String, Snapshot>,
    backend: &mut dyn AudioBackend,
    name: &str,
    fade_s: f32,
) -> AudioResult<()> {
    let snapshot = snapshots.get(name).ok_or_else(|| AudioError::SnapshotNotFound {
        name: name.to_string(),
    })?;

    for (bus_name, &volume) in snapshot.bus_volumes() {
        if let Some(bus) = buses.get_mut(bus_name) {
            bus.set_target_volume(volume, fade_s);
        }
    }
    for (reverb_name, target) in snapshot.reverb_targets() {
        if let Some(reverb) = reverb_buses.get_mut(reverb_name) {
            reverb.set_wet(target.wet, fade_s, backend);
            reverb.set_room_size(target.room_size, fade_s, backend);
            reverb.set_damp(target.damp, fade_s, backend);
            reverb.set_width(target.width, fade_s, backend);
        }
    }
    Ok(())
}

/// Fades every bus back to unity.
fn reset_bus_volumes_inner(buses: &mut HashMap<String, Bus>, fade_s: f32) {
    for bus in buses.values_mut() {
        bus.set_target_volume(1.0, fade_s);
    }
}
