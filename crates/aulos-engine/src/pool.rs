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

//! The voice pool: allocation, virtualisation, stealing, and promotion
//! against a fixed real-voice budget.

use std::collections::HashMap;

use aulos_core::audio::VoiceHandle;
use aulos_core::math::Vec3;

use crate::attenuation::DistanceSettings;
use crate::voice::{Voice, VoiceId, VoiceState};

/// Audibility below which a virtual voice is not worth promoting.
const PROMOTE_THRESHOLD: f32 = 0.01;

/// Which real voice to sacrifice when the budget is full.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum StealBehavior {
    /// Steal the voice with the smallest start time.
    Oldest,
    /// Steal the voice with the smallest audibility (audibility already
    /// encodes distance attenuation).
    Furthest,
    /// Steal the voice with the smallest audibility.
    #[default]
    Quietest,
    /// Never steal; promotion fails when the budget is full.
    None,
}

/// A growable slab of voice slots scheduled against a real-voice budget.
///
/// Slots are reused once stopped; ids are monotonic and never reused, so the
/// id → slot index stays unambiguous for the voice's whole life.
#[derive(Debug)]
pub struct VoicePool {
    voices: Vec<Voice>,
    slot_of: HashMap<VoiceId, usize>,
    max_real: u32,
    steal: StealBehavior,
    next_id: u64,
    now: f32,
}

impl Default for VoicePool {
    fn default() -> Self {
        Self::new(32)
    }
}

impl VoicePool {
    /// Creates a pool with the given budget of concurrently real voices.
    pub fn new(max_real: u32) -> Self {
        Self {
            voices: Vec::new(),
            slot_of: HashMap::new(),
            max_real,
            steal: StealBehavior::default(),
            next_id: 1,
            now: 0.0,
        }
    }

    /// Sets the budget of concurrently real voices.
    pub fn set_max_real(&mut self, max_real: u32) {
        self.max_real = max_real;
    }

    /// The budget of concurrently real voices.
    pub fn max_real(&self) -> u32 {
        self.max_real
    }

    /// Sets the steal behavior.
    pub fn set_steal_behavior(&mut self, behavior: StealBehavior) {
        self.steal = behavior;
    }

    /// The current steal behavior.
    pub fn steal_behavior(&self) -> StealBehavior {
        self.steal
    }

    /// The pool-time accumulator, advanced by [`Self::update`].
    pub fn now(&self) -> f32 {
        self.now
    }

    /// Allocates a voice: reuses a stopped slot or grows the slab. The voice
    /// starts virtual; callers promote it with [`Self::make_real`].
    ///
    /// Never fails.
    pub fn allocate(
        &mut self,
        event_name: &str,
        priority: u8,
        position: Vec3,
        distance: DistanceSettings,
    ) -> VoiceId {
        let slot = match self.voices.iter().position(Voice::is_stopped) {
            Some(slot) => slot,
            None => {
                self.voices.push(Voice::default());
                self.voices.len() - 1
            }
        };

        let id = VoiceId(self.next_id);
        self.next_id += 1;

        let voice = &mut self.voices[slot];
        let old_id = voice.id;
        voice.reset(id, event_name, priority, self.now);
        voice.position = position;
        voice.distance = distance;

        self.slot_of.remove(&old_id);
        self.slot_of.insert(id, slot);
        log::debug!("voice pool: allocated {id} for '{event_name}' in slot {slot}");
        id
    }

    /// Immutable access to a voice by id.
    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.slot_of.get(&id).map(|&slot| &self.voices[slot])
    }

    /// Mutable access to a voice by id.
    pub fn get_mut(&mut self, id: VoiceId) -> Option<&mut Voice> {
        self.slot_of.get(&id).map(|&slot| &mut self.voices[slot])
    }

    /// Tries to make a voice real, stealing a victim if the budget is full.
    ///
    /// A victim must be real and must not outrank the candidate: equal
    /// priority only qualifies when the victim is less audible. Among
    /// qualifying victims the steal behavior picks the score, with
    /// deterministic ties broken by lower priority, then lower id. Returns
    /// `false` (voice stays virtual) when no victim qualifies.
    pub fn make_real(&mut self, id: VoiceId) -> bool {
        let Some(&slot) = self.slot_of.get(&id) else {
            return false;
        };
        if self.voices[slot].is_real() {
            return true;
        }

        if self.real_count() < self.max_real {
            self.voices[slot].state = VoiceState::Real;
            return true;
        }

        let priority = self.voices[slot].priority;
        let audibility = self.voices[slot].audibility;
        let Some(victim_slot) = self.find_victim(priority, audibility) else {
            return false;
        };

        let victim = &mut self.voices[victim_slot];
        log::debug!(
            "voice pool: {} steals real slot from {} ({:?})",
            id,
            victim.id,
            self.steal
        );
        victim.state = VoiceState::Virtual;
        victim.handle = VoiceHandle::INVALID;
        self.voices[slot].state = VoiceState::Real;
        true
    }

    /// Demotes a real voice to virtual. The caller is responsible for
    /// stopping the backend voice behind the handle it held.
    pub fn make_virtual(&mut self, id: VoiceId) {
        if let Some(voice) = self.get_mut(id) {
            if voice.is_real() {
                voice.state = VoiceState::Virtual;
                voice.handle = VoiceHandle::INVALID;
            }
        }
    }

    /// Stops a voice, freeing its slot for reuse.
    pub fn stop(&mut self, id: VoiceId) {
        if let Some(voice) = self.get_mut(id) {
            voice.state = VoiceState::Stopped;
            voice.handle = VoiceHandle::INVALID;
        }
    }

    /// Per-tick pool pass: advances pool time and playback clocks, rescores
    /// audibility against the listener, then promotes the most audible
    /// virtual voices into the remaining budget.
    pub fn update(&mut self, dt: f32, listener_pos: Vec3) {
        self.now += dt;

        for voice in &mut self.voices {
            if voice.is_stopped() {
                continue;
            }
            voice.playback_time += dt;
            voice.update_audibility(listener_pos);
        }

        self.promote_virtual_voices();
    }

    /// Number of real voices.
    pub fn real_count(&self) -> u32 {
        self.voices.iter().filter(|v| v.is_real()).count() as u32
    }

    /// Number of virtual voices.
    pub fn virtual_count(&self) -> u32 {
        self.voices.iter().filter(|v| v.is_virtual()).count() as u32
    }

    /// Number of non-stopped voices.
    pub fn active_count(&self) -> u32 {
        self.real_count() + self.virtual_count()
    }

    /// Iterates all voice slots.
    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    /// Mutably iterates all voice slots.
    pub fn voices_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.iter_mut()
    }

    /// Finds the slot of the best steal victim for a candidate, or `None`.
    fn find_victim(&self, new_priority: u8, new_audibility: f32) -> Option<usize> {
        if self.steal == StealBehavior::None {
            return None;
        }

        let mut best: Option<(usize, f32)> = None;
        for (slot, voice) in self.voices.iter().enumerate() {
            if !voice.is_real() {
                continue;
            }
            // Never displace a higher priority, nor an equal one that is
            // at least as audible.
            if voice.priority > new_priority {
                continue;
            }
            if voice.priority == new_priority && voice.audibility >= new_audibility {
                continue;
            }

            let score = match self.steal {
                StealBehavior::Oldest => voice.start_time,
                StealBehavior::Furthest | StealBehavior::Quietest => voice.audibility,
                StealBehavior::None => unreachable!(),
            };

            let better = match best {
                None => true,
                Some((best_slot, best_score)) => {
                    let incumbent = &self.voices[best_slot];
                    score < best_score
                        || (score == best_score
                            && (voice.priority, voice.id) < (incumbent.priority, incumbent.id))
                }
            };
            if better {
                best = Some((slot, score));
            }
        }
        best.map(|(slot, _)| slot)
    }

    /// Promotes virtual voices by descending audibility until the budget is
    /// full, skipping the inaudible tail.
    fn promote_virtual_voices(&mut self) {
        let mut budget = self.max_real.saturating_sub(self.real_count());
        if budget == 0 {
            return;
        }

        let mut candidates: Vec<usize> = (0..self.voices.len())
            .filter(|&slot| self.voices[slot].is_virtual())
            .collect();
        candidates.sort_by(|&a, &b| {
            self.voices[b]
                .audibility
                .partial_cmp(&self.voices[a].audibility)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for slot in candidates {
            if budget == 0 {
                break;
            }
            if self.voices[slot].audibility > PROMOTE_THRESHOLD {
                self.voices[slot].state = VoiceState::Real;
                budget -= 1;
                log::trace!("voice pool: promoted {}", self.voices[slot].id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attenuation::DistanceSettings;

    fn pool_with(max_real: u32, steal: StealBehavior) -> VoicePool {
        let mut pool = VoicePool::new(max_real);
        pool.set_steal_behavior(steal);
        pool
    }

    fn allocate_at(pool: &mut VoicePool, priority: u8, x: f32) -> VoiceId {
        pool.allocate(
            "event",
            priority,
            Vec3::new(x, 0.0, 0.0),
            DistanceSettings {
                min_distance: 0.0,
                max_distance: 100.0,
                ..DistanceSettings::default()
            },
        )
    }

    #[test]
    fn allocation_reuses_stopped_slots() {
        let mut pool = pool_with(4, StealBehavior::Quietest);
        let a = allocate_at(&mut pool, 128, 0.0);
        let _b = allocate_at(&mut pool, 128, 0.0);
        assert_eq!(pool.voices().count(), 2);

        pool.stop(a);
        let c = allocate_at(&mut pool, 128, 0.0);
        // Slot count unchanged, new id minted.
        assert_eq!(pool.voices().count(), 2);
        assert!(c > a);
        // The stale id no longer resolves.
        assert!(pool.get(a).is_none());
        assert!(pool.get(c).is_some());
    }

    #[test]
    fn make_real_within_budget() {
        let mut pool = pool_with(2, StealBehavior::Quietest);
        let a = allocate_at(&mut pool, 128, 0.0);
        let b = allocate_at(&mut pool, 128, 0.0);
        assert!(pool.make_real(a));
        assert!(pool.make_real(b));
        assert_eq!(pool.real_count(), 2);
    }

    #[test]
    fn zero_budget_keeps_everything_virtual() {
        let mut pool = pool_with(0, StealBehavior::Quietest);
        let a = allocate_at(&mut pool, 255, 0.0);
        pool.update(0.016, Vec3::ZERO);
        assert!(!pool.make_real(a));
        assert_eq!(pool.real_count(), 0);
        assert_eq!(pool.virtual_count(), 1);
    }

    #[test]
    fn steals_quietest_at_equal_priority() {
        let mut pool = pool_with(1, StealBehavior::Quietest);
        let quiet = allocate_at(&mut pool, 128, 90.0);
        pool.update(0.0, Vec3::ZERO);
        assert!(pool.make_real(quiet));

        let loud = allocate_at(&mut pool, 128, 10.0);
        pool.update(0.0, Vec3::ZERO);
        assert!(pool.make_real(loud));

        assert!(pool.get(loud).unwrap().is_real());
        assert!(pool.get(quiet).unwrap().is_virtual());
        assert!(!pool.get(quiet).unwrap().handle.is_valid());
        assert_eq!(pool.real_count(), 1);
    }

    #[test]
    fn lower_priority_never_steals() {
        let mut pool = pool_with(1, StealBehavior::Quietest);
        let shield = allocate_at(&mut pool, 255, 95.0);
        pool.update(0.0, Vec3::ZERO);
        assert!(pool.make_real(shield));

        let loud = allocate_at(&mut pool, 128, 0.0);
        pool.update(0.0, Vec3::ZERO);
        assert!(!pool.make_real(loud));

        assert!(pool.get(shield).unwrap().is_real());
        assert!(pool.get(loud).unwrap().is_virtual());
    }

    #[test]
    fn equal_priority_equal_audibility_is_shielded() {
        let mut pool = pool_with(1, StealBehavior::Quietest);
        let first = allocate_at(&mut pool, 128, 50.0);
        pool.update(0.0, Vec3::ZERO);
        assert!(pool.make_real(first));

        let second = allocate_at(&mut pool, 128, 50.0);
        pool.update(0.0, Vec3::ZERO);
        // Same audibility: the incumbent keeps its slot.
        assert!(!pool.make_real(second));
    }

    #[test]
    fn oldest_steals_smallest_start_time() {
        let mut pool = pool_with(2, StealBehavior::Oldest);
        let old = allocate_at(&mut pool, 128, 50.0);
        pool.update(1.0, Vec3::ZERO);
        let newer = allocate_at(&mut pool, 128, 50.0);
        pool.update(1.0, Vec3::ZERO);
        assert!(pool.get(old).unwrap().is_real());
        assert!(pool.get(newer).unwrap().is_real());

        let latest = allocate_at(&mut pool, 200, 50.0);
        pool.update(0.0, Vec3::ZERO);
        assert!(pool.make_real(latest));
        assert!(pool.get(old).unwrap().is_virtual());
        assert!(pool.get(newer).unwrap().is_real());
    }

    #[test]
    fn steal_none_refuses() {
        let mut pool = pool_with(1, StealBehavior::None);
        let a = allocate_at(&mut pool, 1, 90.0);
        pool.update(0.0, Vec3::ZERO);
        assert!(pool.make_real(a));

        let b = allocate_at(&mut pool, 255, 0.0);
        pool.update(0.0, Vec3::ZERO);
        assert!(!pool.make_real(b));
    }

    #[test]
    fn update_promotes_most_audible_virtuals() {
        let mut pool = pool_with(2, StealBehavior::Quietest);
        let near = allocate_at(&mut pool, 128, 10.0);
        let mid = allocate_at(&mut pool, 128, 50.0);
        let far = allocate_at(&mut pool, 128, 80.0);

        pool.update(0.016, Vec3::ZERO);

        assert!(pool.get(near).unwrap().is_real());
        assert!(pool.get(mid).unwrap().is_real());
        assert!(pool.get(far).unwrap().is_virtual());
        assert_eq!(pool.real_count(), 2);
    }

    #[test]
    fn inaudible_virtuals_are_not_promoted() {
        let mut pool = pool_with(4, StealBehavior::Quietest);
        let silent = allocate_at(&mut pool, 128, 150.0);
        pool.update(0.016, Vec3::ZERO);
        assert!(pool.get(silent).unwrap().is_virtual());
    }

    #[test]
    fn real_count_never_exceeds_budget() {
        let mut pool = pool_with(3, StealBehavior::Quietest);
        for i in 0..16 {
            allocate_at(&mut pool, 128, i as f32);
        }
        for _ in 0..8 {
            pool.update(0.016, Vec3::ZERO);
            assert!(pool.real_count() <= 3);
        }
        assert_eq!(pool.real_count(), 3);
        assert_eq!(pool.active_count(), 16);
    }

    #[test]
    fn demote_then_repromote_restores_state() {
        let mut pool = pool_with(1, StealBehavior::Quietest);
        let a = allocate_at(&mut pool, 128, 10.0);
        pool.update(0.016, Vec3::ZERO);
        assert!(pool.get(a).unwrap().is_real());

        pool.make_virtual(a);
        assert!(pool.get(a).unwrap().is_virtual());
        assert!(pool.make_real(a));
        assert!(pool.get(a).unwrap().is_real());
    }

    #[test]
    fn playback_time_advances_for_active_voices() {
        let mut pool = pool_with(1, StealBehavior::Quietest);
        let a = allocate_at(&mut pool, 128, 0.0);
        pool.update(0.5, Vec3::ZERO);
        pool.update(0.25, Vec3::ZERO);
        assert!((pool.get(a).unwrap().playback_time - 0.75).abs() < 1e-6);
        assert!((pool.now() - 0.75).abs() < 1e-6);
    }
}
