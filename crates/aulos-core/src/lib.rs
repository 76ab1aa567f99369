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

//! # Aulos Core
//!
//! Foundational crate containing the core types, math primitives, and
//! interface contracts that define the audio engine's architecture.
//!
//! The engine proper lives in `aulos-engine`; this crate holds everything it
//! shares with the outside world: the [`audio::AudioBackend`] boundary to the
//! platform mixer, the [`audio::OcclusionOracle`] boundary to the game's
//! raycast provider, the [`error::AudioError`] taxonomy, and [`math::Vec3`].

#![warn(missing_docs)]

pub mod audio;
pub mod error;
pub mod math;

pub use audio::{AudioBackend, FilterParam, OcclusionHit, OcclusionOracle, VoiceHandle};
pub use error::{AudioError, AudioResult};
