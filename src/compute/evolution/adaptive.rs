//! Adaptive mutation-rate control.
//!
//! The rate only ever grows: stagnating averages or a population full of
//! already-rated pairs push it up, clamped at the configured maximum.

use serde::{Deserialize, Serialize};

use crate::schema::MutationConfig;

/// Tuning state carried across generations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveState {
    /// Mutation rate for the next reproduction step.
    pub mutation_rate: f32,
    /// Best generation average seen so far.
    pub best_fitness_seen: f32,
    /// Consecutive generations without improvement.
    pub stagnation_streak: usize,
}

impl AdaptiveState {
    /// Starting state. The best-seen average starts below any real score so
    /// the first generation always counts as an improvement.
    pub fn new(initial_rate: f32) -> Self {
        Self {
            mutation_rate: initial_rate,
            best_fitness_seen: -1.0,
            stagnation_streak: 0,
        }
    }
}

/// Applies the stagnation and duplicate-pressure rules.
#[derive(Debug, Clone)]
pub struct AdaptiveController {
    config: MutationConfig,
}

impl AdaptiveController {
    pub fn new(config: MutationConfig) -> Self {
        Self { config }
    }

    /// State at the start of a run.
    pub fn initial_state(&self) -> AdaptiveState {
        AdaptiveState::new(self.config.initial_rate)
    }

    /// Fold one generation's outcome into `state`.
    ///
    /// Returns `true` when the mutation rate was raised.
    pub fn observe(
        &self,
        state: &mut AdaptiveState,
        average_fitness: f32,
        duplicate_count: usize,
        population_size: usize,
    ) -> bool {
        if average_fitness <= state.best_fitness_seen + self.config.improvement_threshold {
            state.stagnation_streak += 1;
        } else {
            state.best_fitness_seen = average_fitness;
            state.stagnation_streak = 0;
        }

        let stagnant = state.stagnation_streak >= self.config.stagnation_limit;
        let crowded = duplicate_count as f32 >= population_size as f32 / 2.0;
        if !(stagnant || crowded) {
            return false;
        }

        let previous = state.mutation_rate;
        let multiplier = state.stagnation_streak.max(1) as f32;
        state.mutation_rate =
            (state.mutation_rate + self.config.increment * multiplier).min(self.config.max_rate);
        state.stagnation_streak = 0;

        log::info!(
            "Mutation rate adjusted {:.2} -> {:.2} (stagnant: {}, duplicates: {}/{})",
            previous,
            state.mutation_rate,
            stagnant,
            duplicate_count,
            population_size
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn controller() -> AdaptiveController {
        AdaptiveController::new(MutationConfig::default())
    }

    #[test]
    fn test_first_generation_improves() {
        let controller = controller();
        let mut state = controller.initial_state();

        assert!(!controller.observe(&mut state, 4.5, 0, 10));
        assert_eq!(state.best_fitness_seen, 4.5);
        assert_eq!(state.stagnation_streak, 0);
        assert_eq!(state.mutation_rate, 0.2);
    }

    #[test]
    fn test_three_stagnant_generations() {
        let controller = controller();
        let mut state = controller.initial_state();
        controller.observe(&mut state, 5.0, 0, 10);

        assert!(!controller.observe(&mut state, 5.0, 0, 10));
        assert!(!controller.observe(&mut state, 5.005, 0, 10));
        assert_eq!(state.stagnation_streak, 2);

        assert!(controller.observe(&mut state, 4.0, 0, 10));
        // increment * streak at the moment of the trigger: 0.02 * 3.
        assert!((state.mutation_rate - 0.26).abs() < 1e-6);
        assert_eq!(state.stagnation_streak, 0);
        assert_eq!(state.best_fitness_seen, 5.0);
    }

    #[test]
    fn test_duplicate_pressure_raises_once() {
        let controller = controller();
        let mut state = controller.initial_state();

        // Improving generation, but half the population came from the cache.
        assert!(controller.observe(&mut state, 6.0, 5, 10));
        assert!((state.mutation_rate - 0.22).abs() < 1e-6);
        assert_eq!(state.best_fitness_seen, 6.0);

        // Below half does not trigger.
        assert!(!controller.observe(&mut state, 7.0, 4, 10));
    }

    #[test]
    fn test_odd_population_threshold() {
        let controller = controller();
        let mut state = controller.initial_state();
        // 7 / 2 = 3.5, so 3 duplicates are not enough and 4 are.
        assert!(!controller.observe(&mut state, 1.0, 3, 7));
        assert!(controller.observe(&mut state, 2.0, 4, 7));
    }

    #[test]
    fn test_rate_clamped_at_max() {
        let controller = controller();
        let mut state = controller.initial_state();
        for _ in 0..100 {
            controller.observe(&mut state, 0.0, 10, 10);
        }
        assert_eq!(state.mutation_rate, 0.5);
    }

    proptest! {
        #[test]
        fn prop_rate_bounded_and_non_decreasing(
            generations in prop::collection::vec((0.0f32..=10.0, 0usize..=10), 1..60)
        ) {
            let controller = controller();
            let mut state = controller.initial_state();
            let mut previous = state.mutation_rate;

            for (average, duplicates) in generations {
                controller.observe(&mut state, average, duplicates, 10);
                prop_assert!(state.mutation_rate >= 0.2);
                prop_assert!(state.mutation_rate <= 0.5);
                prop_assert!(state.mutation_rate >= previous);
                previous = state.mutation_rate;
            }
        }
    }
}
