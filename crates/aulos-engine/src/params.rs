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

//! Global parameters and real-time parameter control curves.
//!
//! The [`ParameterStore`] is the engine's only cross-thread surface: game
//! threads write values at any time, the tick thread reads them. The lock is
//! held only for the map update and the synchronous listener fan-out.
//! Listeners must not call back into the engine.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// A listener invoked synchronously with each new value of a parameter.
pub type ParameterListener = Box<dyn Fn(f32) + Send>;

#[derive(Default)]
struct Parameter {
    value: f32,
    listeners: Vec<ParameterListener>,
}

/// A name → float map with per-parameter listener lists, guarded by a mutex
/// so the game thread can write while the engine thread ticks.
#[derive(Default)]
pub struct ParameterStore {
    inner: Mutex<HashMap<String, Parameter>>,
}

impl ParameterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter (creating it if needed) and fans the new value out to
    /// its listeners before returning.
    pub fn set(&self, name: &str, value: f32) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let param = map.entry(name.to_string()).or_default();
        param.value = value;
        for listener in &param.listeners {
            listener(value);
        }
    }

    /// Reads a parameter's current value, or `None` if it was never set or bound.
    pub fn get(&self, name: &str) -> Option<f32> {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(name).map(|p| p.value)
    }

    /// Appends a listener to a parameter (creating the parameter at 0.0 if needed).
    pub fn bind(&self, name: &str, listener: ParameterListener) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(name.to_string()).or_default().listeners.push(listener);
    }

    /// Binds an [`RtpcCurve`] between a parameter and an effect: on every
    /// write the curve is evaluated at the new value and `effect` receives
    /// the mapped output.
    pub fn bind_curve(&self, name: &str, curve: RtpcCurve, effect: ParameterListener) {
        self.bind(name, Box::new(move |value| effect(curve.evaluate(value))));
    }
}

/// A point on an RTPC curve.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CurvePoint {
    /// Input value.
    pub x: f32,
    /// Output value.
    pub y: f32,
}

/// A piecewise-linear mapping from parameter values to effect outputs.
///
/// Values outside the curve's input range clamp to the nearest endpoint.
#[derive(Debug, Clone, Default)]
pub struct RtpcCurve {
    points: Vec<CurvePoint>,
}

impl RtpcCurve {
    /// Creates an empty curve (which evaluates to 0.0 everywhere).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a control point, keeping the point list sorted by input value.
    pub fn add_point(&mut self, x: f32, y: f32) -> &mut Self {
        self.points.push(CurvePoint { x, y });
        self.points
            .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
        self
    }

    /// Removes all control points.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Number of control points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the curve has no control points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Evaluates the curve at `input` by linear interpolation.
    pub fn evaluate(&self, input: f32) -> f32 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return 0.0;
        };
        if input <= first.x {
            return first.y;
        }
        if input >= last.x {
            return last.y;
        }

        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if input >= a.x && input <= b.x {
                let range = b.x - a.x;
                if range <= 0.0 {
                    return a.y;
                }
                let t = (input - a.x) / range;
                return a.y + t * (b.y - a.y);
            }
        }
        last.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aulos_core::math::approx_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn set_then_get() {
        let store = ParameterStore::new();
        assert_eq!(store.get("rpm"), None);
        store.set("rpm", 0.75);
        assert_eq!(store.get("rpm"), Some(0.75));
    }

    #[test]
    fn listeners_fire_synchronously_in_order() {
        let store = ParameterStore::new();
        let calls = Arc::new(AtomicU32::new(0));

        let first = calls.clone();
        store.bind(
            "health",
            Box::new(move |v| {
                assert_eq!(first.fetch_add(1, Ordering::SeqCst), 0);
                assert_eq!(v, 0.5);
            }),
        );
        let second = calls.clone();
        store.bind(
            "health",
            Box::new(move |_| {
                assert_eq!(second.fetch_add(1, Ordering::SeqCst), 1);
            }),
        );

        store.set("health", 0.5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn writes_from_another_thread() {
        let store = Arc::new(ParameterStore::new());
        let writer = store.clone();
        std::thread::spawn(move || writer.set("speed", 3.0))
            .join()
            .unwrap();
        assert_eq!(store.get("speed"), Some(3.0));
    }

    #[test]
    fn curve_interpolates_and_clamps() {
        let mut curve = RtpcCurve::new();
        curve.add_point(0.0, 0.8).add_point(0.5, 1.2).add_point(1.0, 2.0);

        assert!(approx_eq(curve.evaluate(-1.0), 0.8));
        assert!(approx_eq(curve.evaluate(0.25), 1.0));
        assert!(approx_eq(curve.evaluate(0.75), 1.6));
        assert!(approx_eq(curve.evaluate(9.0), 2.0));
    }

    #[test]
    fn empty_and_single_point_curves() {
        let curve = RtpcCurve::new();
        assert_eq!(curve.evaluate(0.3), 0.0);

        let mut single = RtpcCurve::new();
        single.add_point(0.5, 4.0);
        assert_eq!(single.evaluate(0.0), 4.0);
        assert_eq!(single.evaluate(1.0), 4.0);
    }

    #[test]
    fn bound_curve_maps_parameter_to_effect() {
        let store = ParameterStore::new();
        let mut curve = RtpcCurve::new();
        curve.add_point(0.0, 400.0).add_point(1.0, 8000.0);

        let seen = Arc::new(Mutex::new(0.0f32));
        let sink = seen.clone();
        store.bind_curve(
            "engine_load",
            curve,
            Box::new(move |mapped| {
                *sink.lock().unwrap() = mapped;
            }),
        );

        store.set("engine_load", 0.5);
        assert!(approx_eq(*seen.lock().unwrap(), 4200.0));
    }
}
