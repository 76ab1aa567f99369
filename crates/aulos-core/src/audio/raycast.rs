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

//! Defines the [`OcclusionOracle`] trait the game implements to provide
//! raycasts for sound occlusion.

use crate::math::Vec3;

/// One surface crossed by the ray from a sound source to the listener.
#[derive(Debug, Clone, PartialEq)]
pub struct OcclusionHit {
    /// Name of the material hit; matched against the registered material
    /// table (unknown names fall back to the `Default` material).
    pub material: String,
    /// Estimated thickness of the crossed geometry in world units.
    pub thickness: f32,
}

impl OcclusionHit {
    /// Creates a hit for the given material and thickness.
    pub fn new(material: impl Into<String>, thickness: f32) -> Self {
        Self {
            material: material.into(),
            thickness,
        }
    }
}

/// The game-supplied raycast provider for occlusion queries.
///
/// `cast` returns every surface crossed between `source` and `listener`; an
/// empty result means unobstructed line of sight. Queries are rate-limited by
/// the engine but still run inside the tick, so implementations must return
/// promptly and must be deterministic for a given world state within a tick.
pub trait OcclusionOracle {
    /// Casts a ray from `source` to `listener` and reports crossed surfaces.
    fn cast(&self, source: Vec3, listener: Vec3) -> Vec<OcclusionHit>;
}

/// Closures can serve directly as oracles.
impl<F> OcclusionOracle for F
where
    F: Fn(Vec3, Vec3) -> Vec<OcclusionHit>,
{
    fn cast(&self, source: Vec3, listener: Vec3) -> Vec<OcclusionHit> {
        self(source, listener)
    }
}
