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

//! Engine lifecycle, routing, and per-subsystem behavior through the public
//! API.

mod common;

use std::sync::{Arc, Mutex};

use aulos_core::audio::FilterParam;
use aulos_core::math::Vec3;
use aulos_engine::{AudioEngine, EventDescriptor, ReverbPreset, RtpcCurve};
use common::{MockBackend, MockHandle};

fn engine() -> (AudioEngine, MockHandle) {
    let (backend, mock) = MockBackend::new();
    let mut engine = AudioEngine::with_seed(backend, 42);
    engine.init().unwrap();
    (engine, mock)
}

#[test]
fn init_twice_is_already_initialized() {
    let (mut engine, _mock) = engine();
    assert_eq!(engine.init().unwrap_err().code(), "AlreadyInitialized");
}

#[test]
fn api_before_init_is_not_initialized() {
    let (backend, _mock) = MockBackend::new();
    let mut engine = AudioEngine::new(backend);
    assert_eq!(engine.tick(0.016).unwrap_err().code(), "NotInitialized");
    assert_eq!(
        engine.play_event("x", Vec3::ZERO).unwrap_err().code(),
        "NotInitialized"
    );
    assert_eq!(engine.create_bus("Extra").unwrap_err().code(), "NotInitialized");
}

#[test]
fn shutdown_stops_held_handles_and_gates_api() {
    let (mut engine, mock) = engine();
    let listener = engine.create_listener().unwrap();
    engine.set_listener_position(listener, Vec3::ZERO).unwrap();
    engine.register_event(EventDescriptor::new("pad", "pad.wav"));
    engine.play_event("pad", Vec3::ZERO).unwrap();
    engine.tick(0.1).unwrap();

    let handle = mock.state().handle_for_asset("pad.wav").unwrap();
    assert!(mock.state().is_live(handle));

    engine.shutdown();
    assert!(!mock.state().is_live(handle));
    assert_eq!(engine.tick(0.016).unwrap_err().code(), "NotInitialized");
    assert_eq!(
        engine.apply_snapshot("any", 0.0).unwrap_err().code(),
        "NotInitialized"
    );
}

#[test]
fn default_buses_exist_after_init() {
    let (engine, _mock) = engine();
    for bus in ["Master", "SFX", "Music"] {
        assert_eq!(engine.bus_volume(bus).unwrap(), 1.0);
    }
}

#[test]
fn duplicate_bus_is_an_error() {
    let (mut engine, _mock) = engine();
    engine.create_bus("Ambience").unwrap();
    assert_eq!(
        engine.create_bus("Ambience").unwrap_err().code(),
        "BusAlreadyExists"
    );
}

#[test]
fn unknown_lookups_return_typed_errors() {
    let (mut engine, _mock) = engine();
    assert_eq!(engine.bus_volume("Nope").unwrap_err().code(), "BusNotFound");
    assert_eq!(
        engine.apply_snapshot("Nope", 0.1).unwrap_err().code(),
        "SnapshotNotFound"
    );
    assert_eq!(
        engine.play_event("Nope", Vec3::ZERO).unwrap_err().code(),
        "EventNotFound"
    );
    assert_eq!(
        engine.set_reverb_params("Nope", 0.5, 0.5, 0.5, 0.0).unwrap_err().code(),
        "ReverbBusNotFound"
    );
    assert_eq!(
        engine.remove_mix_zone("Nope").unwrap_err().code(),
        "ZoneNotFound"
    );
}

/// Applying a snapshot then resetting drives the buses back to unity within
/// the fade window.
#[test]
fn snapshot_then_reset_round_trips() {
    let (mut engine, _mock) = engine();
    engine.create_snapshot("tense").unwrap();
    engine.set_snapshot_bus_volume("tense", "Music", 0.4).unwrap();
    engine.set_snapshot_bus_volume("tense", "SFX", 0.7).unwrap();

    engine.apply_snapshot("tense", 0.1).unwrap();
    for _ in 0..20 {
        engine.tick(0.01).unwrap();
    }
    assert!((engine.bus_volume("Music").unwrap() - 0.4).abs() < 1e-3);
    assert!((engine.bus_volume("SFX").unwrap() - 0.7).abs() < 1e-3);

    engine.reset_bus_volumes(0.2).unwrap();
    for _ in 0..30 {
        engine.tick(0.01).unwrap();
    }
    for bus in ["Master", "SFX", "Music"] {
        assert!((engine.bus_volume(bus).unwrap() - 1.0).abs() < 1e-3);
    }
}

/// A snapshot naming a bus that does not exist applies the rest and skips
/// the stranger.
#[test]
fn snapshot_skips_unknown_buses() {
    let (mut engine, _mock) = engine();
    engine.create_snapshot("partial").unwrap();
    engine.set_snapshot_bus_volume("partial", "Music", 0.2).unwrap();
    engine.set_snapshot_bus_volume("partial", "Ghost", 0.9).unwrap();

    engine.apply_snapshot("partial", 0.0).unwrap();
    engine.tick(0.01).unwrap();
    assert!((engine.bus_volume("Music").unwrap() - 0.2).abs() < 1e-3);
}

#[test]
fn voices_route_to_their_event_bus() {
    let (mut engine, mock) = engine();
    let listener = engine.create_listener().unwrap();
    engine.set_listener_position(listener, Vec3::ZERO).unwrap();
    // Occlusion's per-voice volume write would mask the bus-applied value.
    engine.set_occlusion_enabled(false);

    engine.register_event(EventDescriptor {
        bus: "SFX".to_string(),
        ..EventDescriptor::new("clank", "clank.wav")
    });
    engine.play_event("clank", Vec3::ZERO).unwrap();
    engine.tick(0.1).unwrap();

    engine.set_bus_volume("SFX", 0.25).unwrap();
    engine.tick(0.1).unwrap();

    let state = mock.state();
    let handle = state.handle_for_asset("clank.wav").unwrap();
    assert_eq!(state.volumes[&handle.0], 0.25);
}

#[test]
fn listener_pose_reaches_backend() {
    let (mut engine, mock) = engine();
    let listener = engine.create_listener().unwrap();
    engine
        .set_listener_position(listener, Vec3::new(1.0, 2.0, 3.0))
        .unwrap();
    engine
        .set_listener_velocity(listener, Vec3::new(0.0, 0.0, -4.0))
        .unwrap();
    engine.tick(0.016).unwrap();

    let state = mock.state();
    let (position, velocity, forward, up) = state.listener.unwrap();
    assert_eq!(position, Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(velocity, Vec3::new(0.0, 0.0, -4.0));
    assert_eq!(forward, Vec3::NEG_Z);
    assert_eq!(up, Vec3::Y);
    assert!(state.updates_3d > 0);
}

#[test]
fn inactive_listener_yields_to_next() {
    let (mut engine, mock) = engine();
    let first = engine.create_listener().unwrap();
    let second = engine.create_listener().unwrap();
    engine.set_listener_position(first, Vec3::new(9.0, 0.0, 0.0)).unwrap();
    engine.set_listener_position(second, Vec3::new(-9.0, 0.0, 0.0)).unwrap();
    engine.set_listener_active(first, false).unwrap();

    engine.tick(0.016).unwrap();
    let (position, ..) = mock.state().listener.unwrap();
    assert_eq!(position, Vec3::new(-9.0, 0.0, 0.0));
}

/// Doppler raises the relative play speed of a voice closing on the
/// listener.
#[test]
fn doppler_shifts_play_speed() {
    let (mut engine, mock) = engine();
    let listener = engine.create_listener().unwrap();
    engine.set_listener_position(listener, Vec3::ZERO).unwrap();

    engine.register_event(EventDescriptor {
        pitch_min: 1.0,
        pitch_max: 1.0,
        max_distance: 500.0,
        ..EventDescriptor::new("siren", "siren.wav")
    });
    let id = engine.play_event("siren", Vec3::new(100.0, 0.0, 0.0)).unwrap();
    engine
        .set_voice_velocity(id, Vec3::new(-34.3, 0.0, 0.0))
        .unwrap();

    engine.tick(0.1).unwrap();

    let state = mock.state();
    let handle = state.handle_for_asset("siren.wav").unwrap();
    let speed = state.speeds[&handle.0];
    assert!(
        (speed - 1.0 / 0.9).abs() < 1e-2,
        "closing source should play sharp, got {speed}"
    );
    drop(state);
    assert!(engine.voice(id).unwrap().doppler_pitch > 1.0);
}

#[test]
fn markers_fire_once_at_their_time() {
    let (mut engine, _mock) = engine();
    let listener = engine.create_listener().unwrap();
    engine.set_listener_position(listener, Vec3::ZERO).unwrap();

    engine.register_event(EventDescriptor::new("stinger", "stinger.wav"));
    let id = engine.play_event("stinger", Vec3::ZERO).unwrap();
    engine.add_marker(id, 0.25, "impact").unwrap();

    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = fired.clone();
    engine.set_marker_callback(Box::new(move |voice, name| {
        sink.lock().unwrap().push((voice, name.to_string()));
    }));

    for _ in 0..6 {
        engine.tick(0.1).unwrap();
    }
    let fired = fired.lock().unwrap();
    assert_eq!(fired.len(), 1, "marker must fire exactly once");
    assert_eq!(fired[0].0, id);
    assert_eq!(fired[0].1, "impact");
}

/// Reverb zones drive their bus's wet level to 0.8 × influence; leaving
/// fades it back toward zero.
#[test]
fn reverb_zone_drives_wet_level() {
    let (mut engine, mock) = engine();
    let listener = engine.create_listener().unwrap();
    engine.create_reverb_bus_preset("CaveVerb", ReverbPreset::Cave).unwrap();
    engine
        .add_reverb_zone("grotto", "CaveVerb", Vec3::ZERO, 2.0, 12.0, 100)
        .unwrap();

    // Influence 0.5 at distance 7.
    engine.set_listener_position(listener, Vec3::new(7.0, 0.0, 0.0)).unwrap();
    engine.tick(0.1).unwrap();
    assert!((engine.reverb_wet("CaveVerb").unwrap() - 0.4).abs() < 1e-4);
    assert_eq!(engine.active_reverb_zones(), vec!["grotto".to_string()]);

    // The wet change rides the backend's faded filter parameter.
    assert!(mock
        .state()
        .filter_fades
        .iter()
        .any(|&(_, _, param, value, fade)| param == FilterParam::Wet
            && (value - 0.4).abs() < 1e-4
            && (fade - 0.1).abs() < 1e-4));

    // Out of range: wet fades toward zero.
    engine.set_listener_position(listener, Vec3::new(40.0, 0.0, 0.0)).unwrap();
    engine.tick(0.1).unwrap();
    assert_eq!(engine.reverb_wet("CaveVerb").unwrap(), 0.0);
    assert!(engine.active_reverb_zones().is_empty());
}

/// Audio zones start their event on entry, scale volume with blend, and
/// stop on exit.
#[test]
fn audio_zone_plays_scaled_by_blend() {
    let (mut engine, mock) = engine();
    let listener = engine.create_listener().unwrap();
    engine.register_event(EventDescriptor::new("falls", "falls.wav"));
    engine
        .add_audio_zone("falls", Vec3::ZERO, 3.0, 13.0)
        .unwrap();

    engine.set_listener_position(listener, Vec3::new(8.0, 0.0, 0.0)).unwrap();
    engine.tick(0.1).unwrap();
    {
        let state = mock.state();
        let handle = state.handle_for_asset("falls.wav").unwrap();
        assert!((state.volumes[&handle.0] - 0.5).abs() < 1e-4);
    }

    engine.set_listener_position(listener, Vec3::new(30.0, 0.0, 0.0)).unwrap();
    engine.tick(0.1).unwrap();
    let state = mock.state();
    let handle = state.handle_for_asset("falls.wav").unwrap();
    assert!(!state.is_live(handle), "zone voice should stop on exit");
}

/// With crossfade mode on, overlapping zone volumes are normalised so their
/// sum never exceeds unity.
#[test]
fn zone_crossfade_normalises_overlap() {
    let (mut engine, mock) = engine();
    let listener = engine.create_listener().unwrap();
    engine.set_listener_position(listener, Vec3::ZERO).unwrap();
    engine.set_zone_crossfade(true);

    engine.register_event(EventDescriptor::new("wind", "wind.wav"));
    engine.register_event(EventDescriptor::new("rain", "rain.wav"));
    engine.add_audio_zone("wind", Vec3::ZERO, 5.0, 15.0).unwrap();
    engine.add_audio_zone("rain", Vec3::ZERO, 5.0, 15.0).unwrap();

    engine.tick(0.1).unwrap();

    let state = mock.state();
    let wind = state.handle_for_asset("wind.wav").unwrap();
    let rain = state.handle_for_asset("rain.wav").unwrap();
    let total = state.volumes[&wind.0] + state.volumes[&rain.0];
    assert!(
        total <= 1.0 + 1e-4,
        "crossfaded zone volumes must not sum past unity, got {total}"
    );
    assert!((state.volumes[&wind.0] - 0.5).abs() < 1e-4);
}

#[test]
fn direct_play_routes_and_randomises_within_range() {
    let (mut engine, mock) = engine();
    engine.register_event(EventDescriptor {
        bus: "SFX".to_string(),
        volume_min: 0.6,
        volume_max: 0.9,
        pitch_min: 0.8,
        pitch_max: 1.2,
        ..EventDescriptor::new("chime", "chime.wav")
    });

    let handle = engine.play_event_direct("chime").unwrap();
    let state = mock.state();
    let volume = state.volumes[&handle.0];
    let speed = state.speeds[&handle.0];
    assert!((0.6..=0.9).contains(&volume), "volume draw {volume} out of range");
    assert!((0.8..=1.2).contains(&speed), "pitch draw {speed} out of range");
}

#[test]
fn rtpc_binding_maps_parameter_through_curve() {
    let (engine, _mock) = engine();
    let mut curve = RtpcCurve::new();
    curve.add_point(0.0, 0.5).add_point(1.0, 2.0);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    engine.bind_rtpc("engine_rpm", curve, Box::new(move |v| sink.lock().unwrap().push(v)));

    engine.set_global_parameter("engine_rpm", 0.5);
    engine.set_global_parameter("engine_rpm", 1.0);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!((seen[0] - 1.25).abs() < 1e-5);
    assert!((seen[1] - 2.0).abs() < 1e-5);
    assert_eq!(engine.global_parameter("engine_rpm"), Some(1.0));
}

#[test]
fn reset_event_volume_retargets_its_bus() {
    let (mut engine, _mock) = engine();
    engine.register_event(EventDescriptor {
        bus: "Music".to_string(),
        volume_min: 0.8,
        volume_max: 0.8,
        ..EventDescriptor::new("theme", "theme.wav")
    });
    engine.set_bus_volume("Music", 0.1).unwrap();

    engine.reset_event_volume("theme", 0.05).unwrap();
    for _ in 0..10 {
        engine.tick(0.01).unwrap();
    }
    assert!((engine.bus_volume("Music").unwrap() - 0.8).abs() < 1e-3);
}

#[test]
fn max_real_zero_keeps_all_voices_virtual() {
    let (mut engine, mock) = engine();
    let listener = engine.create_listener().unwrap();
    engine.set_listener_position(listener, Vec3::ZERO).unwrap();
    engine.set_max_voices(0);

    engine.register_event(EventDescriptor::new("one", "one.wav"));
    engine.register_event(EventDescriptor::new("two", "two.wav"));
    let a = engine.play_event("one", Vec3::ZERO).unwrap();
    let b = engine.play_event("two", Vec3::ZERO).unwrap();

    for _ in 0..5 {
        engine.tick(0.1).unwrap();
        assert_eq!(engine.real_voice_count(), 0);
    }
    assert!(engine.voice(a).unwrap().is_virtual());
    assert!(engine.voice(b).unwrap().is_virtual());
    assert!(mock.state().plays.is_empty());
}

/// The music layer crossfades segments and honors bar-synced queues while
/// the engine ticks.
#[test]
fn music_layer_rides_the_tick() {
    let (mut engine, mock) = engine();
    engine.register_event(EventDescriptor::new("calm", "calm.ogg"));
    engine.register_event(EventDescriptor::new("battle", "battle.ogg"));
    engine.set_music_bpm(240.0);
    engine.set_music_beats_per_bar(4);

    engine.play_music_segment("calm", 0.0).unwrap();
    engine.queue_music_segment("battle", aulos_engine::TransitionSync::NextBar, 0.0);

    // One bar at 240 BPM is one second.
    for _ in 0..11 {
        engine.tick(0.1).unwrap();
    }
    assert_eq!(engine.music().current_segment(), Some("battle"));
    assert_eq!(mock.state().play_count("battle.ogg"), 1);
}
