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

//! Spatial zones: positioned volumes whose proximity to the listener drives
//! mix snapshots, reverb sends, and ambient sources.

mod audio;
mod mix;
mod reverb;

pub use audio::AudioZone;
pub use mix::MixZone;
pub use reverb::ReverbZone;

use aulos_core::math::Vec3;

/// The falloff volume of a zone.
///
/// Influence is 1.0 at the core of the shape, 0.0 outside it, and falls off
/// linearly through the fade region between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneShape {
    /// A sphere: full influence inside `inner_radius`, none at or beyond
    /// `outer_radius`.
    Sphere {
        /// Radius of full influence.
        inner_radius: f32,
        /// Radius at which influence reaches zero.
        outer_radius: f32,
    },
    /// An axis-aligned box: full influence inside the half-extents, fading
    /// to zero over `fade_distance` outside the faces.
    Box {
        /// Half-extent of the box on each axis.
        half_extents: Vec3,
        /// Width of the fade shell around the box.
        fade_distance: f32,
    },
}

impl ZoneShape {
    /// A sphere shape. `outer_radius` is raised to at least `inner_radius`.
    pub fn sphere(inner_radius: f32, outer_radius: f32) -> Self {
        ZoneShape::Sphere {
            inner_radius,
            outer_radius: outer_radius.max(inner_radius),
        }
    }

    /// Computes the influence of a zone centered at `center` on `point`,
    /// in `[0, 1]`.
    pub fn influence(&self, center: Vec3, point: Vec3) -> f32 {
        match *self {
            ZoneShape::Sphere {
                inner_radius,
                outer_radius,
            } => {
                let dist = center.distance(point);
                if dist <= inner_radius {
                    1.0
                } else if dist >= outer_radius {
                    0.0
                } else {
                    1.0 - (dist - inner_radius) / (outer_radius - inner_radius)
                }
            }
            ZoneShape::Box {
                half_extents,
                fade_distance,
            } => {
                let local = point - center;
                let outside = Vec3::new(
                    (local.x.abs() - half_extents.x).max(0.0),
                    (local.y.abs() - half_extents.y).max(0.0),
                    (local.z.abs() - half_extents.z).max(0.0),
                );
                let dist = outside.length();
                if dist <= 0.0 {
                    1.0
                } else if fade_distance <= 0.0 || dist >= fade_distance {
                    0.0
                } else {
                    1.0 - dist / fade_distance
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_influence_at_boundaries() {
        let shape = ZoneShape::sphere(5.0, 15.0);
        let center = Vec3::ZERO;
        assert_eq!(shape.influence(center, Vec3::ZERO), 1.0);
        assert_eq!(shape.influence(center, Vec3::new(5.0, 0.0, 0.0)), 1.0);
        // Exactly at the outer radius the blend is zero (inclusive).
        assert_eq!(shape.influence(center, Vec3::new(15.0, 0.0, 0.0)), 0.0);
        assert_eq!(shape.influence(center, Vec3::new(30.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn sphere_influence_interpolates_linearly() {
        let shape = ZoneShape::sphere(5.0, 15.0);
        let mid = shape.influence(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        assert!((mid - 0.5).abs() < 1e-5);
    }

    #[test]
    fn sphere_influence_is_monotone_in_distance() {
        let shape = ZoneShape::sphere(2.0, 20.0);
        let mut last = f32::INFINITY;
        for step in 0..40 {
            let x = step as f32 * 0.6;
            let v = shape.influence(Vec3::ZERO, Vec3::new(x, 0.0, 0.0));
            assert!(v <= last + 1e-6, "influence rose with distance at x={x}");
            last = v;
        }
    }

    #[test]
    fn degenerate_sphere_clamps_outer_to_inner() {
        let shape = ZoneShape::sphere(10.0, 3.0);
        // Inside: full. Outside: zero. No NaN from a negative fade band.
        assert_eq!(shape.influence(Vec3::ZERO, Vec3::new(9.0, 0.0, 0.0)), 1.0);
        assert_eq!(shape.influence(Vec3::ZERO, Vec3::new(11.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn box_influence_core_and_fade() {
        let shape = ZoneShape::Box {
            half_extents: Vec3::new(4.0, 2.0, 4.0),
            fade_distance: 2.0,
        };
        let center = Vec3::new(10.0, 0.0, 0.0);
        assert_eq!(shape.influence(center, Vec3::new(12.0, 1.0, 0.0)), 1.0);
        let half = shape.influence(center, Vec3::new(15.0, 0.0, 0.0));
        assert!((half - 0.5).abs() < 1e-5);
        assert_eq!(shape.influence(center, Vec3::new(17.0, 0.0, 0.0)), 0.0);
    }
}
