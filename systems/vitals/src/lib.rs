#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-tick drift of the panda's needs.
//!
//! Each tick every vital independently rolls a chance that depends on what
//! the panda is doing; on success it moves by a uniformly drawn amount from
//! the activity's delta range. Counters never drop below zero.

use pet_panda_core::{Activity, Vital, Vitals};
use rand::Rng;

/// Chance and inclusive delta range for one vital under one activity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rule {
    chance: f64,
    min_delta: i32,
    max_delta: i32,
}

impl Rule {
    /// Creates a rule applying a delta in `min_delta..=max_delta` with probability `chance`.
    #[must_use]
    pub const fn new(chance: f64, min_delta: i32, max_delta: i32) -> Self {
        Self {
            chance,
            min_delta,
            max_delta,
        }
    }

    /// Probability that the vital changes on a tick.
    #[must_use]
    pub const fn chance(&self) -> f64 {
        self.chance
    }

    /// Smallest delta applied.
    #[must_use]
    pub const fn min_delta(&self) -> i32 {
        self.min_delta
    }

    /// Largest delta applied.
    #[must_use]
    pub const fn max_delta(&self) -> i32 {
        self.max_delta
    }

    /// Rolls the rule, returning the delta to apply if it fired.
    pub fn roll<R>(&self, rng: &mut R) -> Option<i32>
    where
        R: Rng + ?Sized,
    {
        if rng.gen::<f64>() >= self.chance {
            return None;
        }
        let (low, high) = if self.min_delta <= self.max_delta {
            (self.min_delta, self.max_delta)
        } else {
            (self.max_delta, self.min_delta)
        };
        Some(rng.gen_range(low..=high))
    }
}

/// Rules for all three vitals under a single activity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActivityRules {
    /// Hunger drift.
    pub hunger: Rule,
    /// Tiredness drift.
    pub tiredness: Rule,
    /// Boredom drift.
    pub boredom: Rule,
}

impl ActivityRules {
    /// Looks up the rule for a single vital.
    #[must_use]
    pub const fn rule(&self, vital: Vital) -> Rule {
        match vital {
            Vital::Hunger => self.hunger,
            Vital::Tiredness => self.tiredness,
            Vital::Boredom => self.boredom,
        }
    }
}

/// Activity-indexed table of vital drift rules.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VitalsTable {
    eating: ActivityRules,
    resting: ActivityRules,
    walking: ActivityRules,
    idle: ActivityRules,
}

impl Default for VitalsTable {
    fn default() -> Self {
        Self {
            // Eating feeds the panda quickly and wears it out a little.
            eating: ActivityRules {
                hunger: Rule::new(0.75, -10, -5),
                tiredness: Rule::new(0.2, 1, 3),
                boredom: Rule::new(0.2, -2, -1),
            },
            resting: ActivityRules {
                hunger: Rule::new(0.05, 1, 2),
                tiredness: Rule::new(0.6, -5, -2),
                boredom: Rule::new(0.3, 1, 3),
            },
            walking: ActivityRules {
                hunger: Rule::new(0.2, 1, 2),
                tiredness: Rule::new(0.4, 1, 3),
                boredom: Rule::new(0.5, -3, -1),
            },
            idle: ActivityRules {
                hunger: Rule::new(0.1, 1, 2),
                tiredness: Rule::new(0.05, 1, 2),
                boredom: Rule::new(0.2, 1, 2),
            },
        }
    }
}

impl VitalsTable {
    /// Creates a table from explicit per-activity rules.
    #[must_use]
    pub const fn new(
        eating: ActivityRules,
        resting: ActivityRules,
        walking: ActivityRules,
        idle: ActivityRules,
    ) -> Self {
        Self {
            eating,
            resting,
            walking,
            idle,
        }
    }

    /// Rules applied while the panda performs `activity`.
    #[must_use]
    pub const fn rules(&self, activity: Activity) -> &ActivityRules {
        match activity {
            Activity::Eating => &self.eating,
            Activity::Resting => &self.resting,
            Activity::Walking => &self.walking,
            Activity::Idle => &self.idle,
        }
    }

    /// Advances `vitals` by one tick of `activity`.
    #[must_use]
    pub fn update<R>(&self, vitals: Vitals, activity: Activity, rng: &mut R) -> Vitals
    where
        R: Rng + ?Sized,
    {
        let rules = self.rules(activity);
        Vital::ALL.into_iter().fold(vitals, |current, vital| {
            match rules.rule(vital).roll(rng) {
                Some(delta) => current.offset(vital, delta),
                None => current,
            }
        })
    }
}
