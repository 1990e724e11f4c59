//! Constricted particle swarm optimization over pose space.
//!
//! The engine owns the particle population and the global best, and runs
//! a fixed-budget generational loop. Each generation has two strictly
//! ordered phases: first every particle's energy is evaluated (one
//! batched request) and the personal/global bests are folded in, then
//! every particle's velocity and position are updated. Phase 2 never
//! starts while phase 1 is still writing the global best, so a particle
//! always steers toward a fully settled generation result.

use crate::evaluator::FitnessEvaluator;
use crate::particle::Particle;
use crate::pose::PoseParameters;
use anyhow::{bail, ensure, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Swarm configuration. Experiment variants (population size, iteration
/// budget, clamping) are all values here rather than code paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsoConfig {
    /// Number of generations to run; there is no early stopping.
    pub iterations: usize,

    /// Cognitive acceleration constant c1 (pull toward the personal best).
    pub cognitive_weight: f32,

    /// Social acceleration constant c2 (pull toward the global best).
    pub social_weight: f32,

    /// Optional per-axis velocity clamp applied after each update.
    pub velocity_clamp: Option<PoseParameters>,

    /// RNG seed; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for PsoConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            cognitive_weight: 2.8,
            social_weight: 1.3,
            velocity_clamp: None,
            seed: None,
        }
    }
}

/// Constriction coefficient `k = 2 / |2 - phi - sqrt(phi^2 - 4 phi)|`
/// for `phi = c1 + c2`.
///
/// `phi <= 4` would put a negative number under the square root; the
/// constriction formulation is simply undefined there, so it is rejected
/// as a configuration error instead of producing NaN trajectories.
pub fn constriction_coefficient(cognitive: f32, social: f32) -> Result<f32> {
    let phi = cognitive + social;
    if phi <= 4.0 {
        bail!(
            "cognitive + social = {phi} must exceed 4 for the constriction coefficient \
             to be defined"
        );
    }
    Ok(2.0 / (2.0 - phi - (phi * phi - 4.0 * phi).sqrt()).abs())
}

/// Outcome of a swarm run.
#[derive(Debug, Clone)]
pub struct PsoResult {
    /// Best pose found across the whole run — the headline result.
    pub best_position: PoseParameters,
    /// Energy at `best_position`.
    pub best_energy: f32,
    /// Generations executed.
    pub generations: usize,
    /// Total candidate evaluations requested.
    pub evaluations: usize,
}

/// The swarm engine.
pub struct PsoOptimizer {
    config: PsoConfig,
    constriction: f32,
    particles: Vec<Particle>,
    global_best_position: PoseParameters,
    global_best_energy: f32,
    rng: StdRng,
    evaluations: usize,
}

impl PsoOptimizer {
    /// Seed one particle per caller-supplied initial position.
    pub fn new(initial_positions: &[PoseParameters], config: PsoConfig) -> Result<Self> {
        ensure!(
            !initial_positions.is_empty(),
            "swarm needs at least one particle"
        );
        let constriction =
            constriction_coefficient(config.cognitive_weight, config.social_weight)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            constriction,
            particles: initial_positions.iter().copied().map(Particle::new).collect(),
            global_best_position: PoseParameters::ZERO,
            global_best_energy: f32::INFINITY,
            rng,
            evaluations: 0,
            config,
        })
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn global_best(&self) -> (PoseParameters, f32) {
        (self.global_best_position, self.global_best_energy)
    }

    /// Run one generation. Exposed so callers can interleave their own
    /// bookkeeping; cancellation is only safe at this boundary.
    pub fn step(&mut self, evaluator: &mut dyn FitnessEvaluator) -> Result<()> {
        // Phase 1: batched fitness evaluation and best-tracking. The
        // global best folds in after each particle; order across
        // particles does not matter because min is commutative.
        let positions: Vec<PoseParameters> =
            self.particles.iter().map(|p| p.position).collect();
        let energies = evaluator.evaluate(&positions)?;
        ensure!(
            energies.len() == self.particles.len(),
            "evaluator returned {} energies for {} particles",
            energies.len(),
            self.particles.len()
        );
        self.evaluations += energies.len();

        for (index, (particle, &energy)) in
            self.particles.iter_mut().zip(&energies).enumerate()
        {
            if !energy.is_finite() {
                // A non-finite energy must never poison the bests.
                tracing::warn!(particle = index, energy, "skipping non-finite energy");
                continue;
            }
            if particle.observe(energy) && energy < self.global_best_energy {
                self.global_best_energy = energy;
                self.global_best_position = particle.position;
            }
        }

        // Phase 2: velocity and position updates, each particle reading
        // the now-settled global best.
        let k = self.constriction;
        let c1 = self.config.cognitive_weight;
        let c2 = self.config.social_weight;
        for particle in &mut self.particles {
            let r1: f32 = self.rng.gen();
            let r2: f32 = self.rng.gen();
            let cognitive = (particle.best_position - particle.position) * (c1 * r1);
            let social = (self.global_best_position - particle.position) * (c2 * r2);
            let mut velocity = particle.velocity + (cognitive + social) * k;
            if let Some(clamp) = &self.config.velocity_clamp {
                velocity = velocity.abs_clamp(clamp);
            }
            particle.velocity = velocity;
            particle.position = particle.position + velocity;
        }

        Ok(())
    }

    /// Run the full iteration budget and return the global best pose.
    pub fn run(&mut self, evaluator: &mut dyn FitnessEvaluator) -> Result<PsoResult> {
        for generation in 0..self.config.iterations {
            self.step(evaluator)?;
            tracing::debug!(
                generation,
                global_best_energy = self.global_best_energy,
                "generation complete"
            );
        }
        Ok(PsoResult {
            best_position: self.global_best_position,
            best_energy: self.global_best_energy,
            generations: self.config.iterations,
            evaluations: self.evaluations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::QuadraticEvaluator;
    use approx::assert_relative_eq;

    fn seeded(iterations: usize) -> PsoConfig {
        PsoConfig {
            iterations,
            seed: Some(7),
            ..PsoConfig::default()
        }
    }

    fn spread(n: usize, scale: f32) -> Vec<PoseParameters> {
        (0..n)
            .map(|i| {
                let t = (i as f32 / n as f32 - 0.5) * 2.0;
                PoseParameters::new(scale * t, -scale * t, 0.5 * scale * t, 0.1 * t, 0.0, -0.1 * t)
            })
            .collect()
    }

    #[test]
    fn test_constriction_coefficient_reference_value() {
        // c1 = 2.8, c2 = 1.3: phi = 4.1, k = 2 / |2 - 4.1 - sqrt(0.41)|.
        let k = constriction_coefficient(2.8, 1.3).unwrap();
        assert_relative_eq!(k, 0.72984886, epsilon = 1e-5);
    }

    #[test]
    fn test_phi_at_most_four_rejected() {
        assert!(constriction_coefficient(2.0, 2.0).is_err());
        assert!(constriction_coefficient(1.0, 1.0).is_err());
        let config = PsoConfig {
            cognitive_weight: 2.0,
            social_weight: 1.5,
            ..PsoConfig::default()
        };
        assert!(PsoOptimizer::new(&[PoseParameters::ZERO], config).is_err());
    }

    #[test]
    fn test_empty_population_rejected() {
        assert!(PsoOptimizer::new(&[], PsoConfig::default()).is_err());
    }

    #[test]
    fn test_global_best_monotone() {
        let target = PoseParameters::new(0.1, -0.2, 0.3, 0.0, 0.1, 0.0);
        let mut evaluator = QuadraticEvaluator::new(target);
        let mut pso = PsoOptimizer::new(&spread(6, 1.0), seeded(40)).unwrap();

        let mut last = f32::INFINITY;
        for _ in 0..40 {
            pso.step(&mut evaluator).unwrap();
            let (_, best) = pso.global_best();
            assert!(best <= last, "global best increased: {best} > {last}");
            last = best;
        }
    }

    #[test]
    fn test_personal_best_dominates_observations() {
        let target = PoseParameters::ZERO;
        let mut evaluator = QuadraticEvaluator::new(target);
        let mut pso = PsoOptimizer::new(&spread(4, 2.0), seeded(30)).unwrap();
        for _ in 0..30 {
            pso.step(&mut evaluator).unwrap();
            let (_, global) = pso.global_best();
            for p in pso.particles() {
                // Every personal best is at least as good as the worst
                // and never better than the global best.
                assert!(p.best_energy >= global);
            }
        }
    }

    #[test]
    fn test_converges_on_quadratic_landscape() {
        let target = PoseParameters::new(0.3, -0.1, 0.2, 0.05, -0.05, 0.0);
        let mut evaluator = QuadraticEvaluator::new(target);
        let initial = spread(8, 2.0);

        // Energy of the best starting particle, for comparison.
        let initial_best = initial
            .iter()
            .map(|p| QuadraticEvaluator::new(target).energy(p))
            .fold(f32::INFINITY, f32::min);

        let mut pso = PsoOptimizer::new(&initial, seeded(120)).unwrap();
        let result = pso.run(&mut evaluator).unwrap();
        assert_eq!(result.generations, 120);
        assert_eq!(result.evaluations, 120 * 8);
        // The constriction damps only the attraction terms while the old
        // velocity carries over undamped, so the swarm settles on a
        // plateau near the optimum instead of collapsing onto it.
        assert!(
            result.best_energy < initial_best * 0.5,
            "swarm failed to improve: {} vs initial {}",
            result.best_energy,
            initial_best
        );
        // The down-weighted rotation terms give norm^2 <= 2 * energy, so
        // the energy bound above already confines the pose this tightly.
        let norm = (result.best_position - target).norm();
        assert!(norm < 0.3, "best pose too far from target: norm {}", norm);
    }

    #[test]
    fn test_single_particle_best_equals_global_best() {
        // With one particle the personal and global bests coincide at
        // every generation, so the trace is a plain hill climb.
        let mut evaluator = QuadraticEvaluator::new(PoseParameters::ZERO);
        let start = PoseParameters::new(0.05, 0.0, -0.5, 0.0, 0.0, 0.0);
        let mut pso = PsoOptimizer::new(&[start], seeded(10)).unwrap();
        for _ in 0..10 {
            pso.step(&mut evaluator).unwrap();
            let (global_pos, global) = pso.global_best();
            let p = &pso.particles()[0];
            assert_eq!(p.best_energy, global);
            assert_eq!(p.best_position, global_pos);
        }
    }

    #[test]
    fn test_non_finite_energy_excluded_from_bests() {
        let mut evaluator = |poses: &[PoseParameters]| -> Result<Vec<f32>> {
            Ok(poses
                .iter()
                .enumerate()
                .map(|(i, _)| if i == 0 { f32::NAN } else { 1.0 + i as f32 })
                .collect())
        };
        let mut pso = PsoOptimizer::new(&spread(3, 1.0), seeded(1)).unwrap();
        pso.step(&mut evaluator).unwrap();
        let (_, best) = pso.global_best();
        assert_eq!(best, 2.0);
        assert!(pso.particles()[0].best_energy.is_infinite());
    }

    #[test]
    fn test_evaluator_error_propagates() {
        let mut evaluator =
            |_: &[PoseParameters]| -> Result<Vec<f32>> { bail!("device lost") };
        let mut pso = PsoOptimizer::new(&spread(3, 1.0), seeded(1)).unwrap();
        assert!(pso.step(&mut evaluator).is_err());
    }

    #[test]
    fn test_batch_size_mismatch_is_error() {
        let mut evaluator = |_: &[PoseParameters]| -> Result<Vec<f32>> { Ok(vec![1.0]) };
        let mut pso = PsoOptimizer::new(&spread(3, 1.0), seeded(1)).unwrap();
        assert!(pso.step(&mut evaluator).is_err());
    }

    #[test]
    fn test_velocity_clamp_bounds_step() {
        let clamp = PoseParameters::new(0.01, 0.01, 0.01, 0.01, 0.01, 0.01);
        let config = PsoConfig {
            velocity_clamp: Some(clamp),
            ..seeded(5)
        };
        let mut evaluator = QuadraticEvaluator::new(PoseParameters::ZERO);
        let mut pso = PsoOptimizer::new(&spread(4, 5.0), config).unwrap();
        for _ in 0..5 {
            let before: Vec<PoseParameters> =
                pso.particles().iter().map(|p| p.position).collect();
            pso.step(&mut evaluator).unwrap();
            for (p, prev) in pso.particles().iter().zip(&before) {
                let delta = p.position - *prev;
                assert!(delta.x_translation.abs() <= 0.01 + 1e-6);
                assert!(delta.y_translation.abs() <= 0.01 + 1e-6);
                assert!(delta.z_translation.abs() <= 0.01 + 1e-6);
            }
        }
    }
}
