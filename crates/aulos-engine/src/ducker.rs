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

//! Sidechain ducking: target-bus gain envelopes driven by activity on
//! sidechain buses (e.g. music ducks while dialogue plays).

/// Configuration for one ducking rule.
#[derive(Debug, Clone, PartialEq)]
pub struct DuckingRule {
    /// Bus whose gain is pulled down.
    pub target_bus: String,
    /// Bus whose activity triggers the duck.
    pub sidechain_bus: String,
    /// Gain floor while fully ducked, in `[0, 1]`.
    pub duck_level: f32,
    /// Fade-down time in seconds.
    pub attack_s: f32,
    /// Fade-up time in seconds.
    pub release_s: f32,
    /// How long the duck holds after the sidechain goes quiet, in seconds.
    pub hold_s: f32,
}

impl Default for DuckingRule {
    fn default() -> Self {
        Self {
            target_bus: String::new(),
            sidechain_bus: String::new(),
            duck_level: 0.3,
            attack_s: 0.1,
            release_s: 0.5,
            hold_s: 0.1,
        }
    }
}

/// Runtime envelope of one rule.
#[derive(Debug, Clone)]
struct RuleState {
    active: bool,
    current_level: f32,
    hold_timer: f32,
}

impl Default for RuleState {
    fn default() -> Self {
        Self {
            active: false,
            current_level: 1.0,
            hold_timer: 0.0,
        }
    }
}

/// Advances ducking envelopes and combines them per target bus.
///
/// Multiple rules on the same target combine by minimum: the most ducked
/// rule wins.
#[derive(Debug, Default)]
pub struct Ducker {
    rules: Vec<DuckingRule>,
    states: Vec<RuleState>,
}

impl Ducker {
    /// Creates a ducker with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule. A rule with the same target and sidechain already
    /// present is left untouched.
    pub fn add_rule(&mut self, rule: DuckingRule) {
        let exists = self
            .rules
            .iter()
            .any(|r| r.target_bus == rule.target_bus && r.sidechain_bus == rule.sidechain_bus);
        if exists {
            return;
        }
        log::debug!(
            "ducker: '{}' ducks to {} while '{}' is active",
            rule.target_bus,
            rule.duck_level,
            rule.sidechain_bus
        );
        self.rules.push(rule);
        self.states.push(RuleState::default());
    }

    /// Removes the rule with the given target and sidechain.
    pub fn remove_rule(&mut self, target_bus: &str, sidechain_bus: &str) {
        if let Some(pos) = self
            .rules
            .iter()
            .position(|r| r.target_bus == target_bus && r.sidechain_bus == sidechain_bus)
        {
            self.rules.remove(pos);
            self.states.remove(pos);
        }
    }

    /// Removes every rule.
    pub fn clear_rules(&mut self) {
        self.rules.clear();
        self.states.clear();
    }

    /// Advances every rule's envelope by `dt` and returns the min-combined
    /// gain per target bus. `sidechain_active` answers whether any voice is
    /// currently playing through the named bus.
    pub fn advance(
        &mut self,
        dt: f32,
        sidechain_active: impl Fn(&str) -> bool,
    ) -> Vec<(String, f32)> {
        let mut targets: Vec<(String, f32)> = Vec::new();

        for (rule, state) in self.rules.iter().zip(self.states.iter_mut()) {
            if sidechain_active(&rule.sidechain_bus) {
                state.active = true;
                state.hold_timer = rule.hold_s;
                let attack_rate = 1.0 / rule.attack_s.max(0.001);
                state.current_level =
                    (state.current_level - attack_rate * dt).max(rule.duck_level);
            } else if state.hold_timer > 0.0 {
                state.hold_timer -= dt;
            } else {
                let release_rate = 1.0 / rule.release_s.max(0.001);
                state.current_level = (state.current_level + release_rate * dt).min(1.0);
                if state.current_level >= 1.0 {
                    state.active = false;
                }
            }

            match targets.iter_mut().find(|(name, _)| name == &rule.target_bus) {
                Some((_, level)) => *level = level.min(state.current_level),
                None => targets.push((rule.target_bus.clone(), state.current_level)),
            }
        }

        targets
    }

    /// Whether any rule targeting `target_bus` is currently ducking.
    pub fn is_ducking(&self, target_bus: &str) -> bool {
        self.rules
            .iter()
            .zip(self.states.iter())
            .any(|(rule, state)| rule.target_bus == target_bus && state.active)
    }

    /// The min-combined current duck level for `target_bus` (1.0 = unducked).
    pub fn duck_level(&self, target_bus: &str) -> f32 {
        self.rules
            .iter()
            .zip(self.states.iter())
            .filter(|(rule, _)| rule.target_bus == target_bus)
            .fold(1.0, |level, (_, state)| level.min(state.current_level))
    }

    /// Number of installed rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
