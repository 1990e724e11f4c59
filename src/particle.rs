//! Particle representation for the pose swarm.

use crate::pose::PoseParameters;

/// One swarm agent: a candidate pose plus its personal-best bookkeeping
/// and the velocity applied once per generation.
#[derive(Debug, Clone)]
pub struct Particle {
    /// Current candidate pose.
    pub position: PoseParameters,
    /// Best pose this particle has ever visited.
    pub best_position: PoseParameters,
    /// Energy at `best_position`. Starts at infinity so the first
    /// observed energy always becomes the personal best.
    pub best_energy: f32,
    /// Displacement added to `position` each generation.
    pub velocity: PoseParameters,
}

impl Particle {
    /// Create a particle at `initial` with zero velocity and an
    /// unset (infinite) personal best.
    pub fn new(initial: PoseParameters) -> Self {
        Self {
            position: initial,
            best_position: initial,
            best_energy: f32::INFINITY,
            velocity: PoseParameters::ZERO,
        }
    }

    /// Record an energy observed at the current position. The personal
    /// best moves only on a strictly lower energy; returns whether it did.
    pub fn observe(&mut self, energy: f32) -> bool {
        if energy < self.best_energy {
            self.best_energy = energy;
            self.best_position = self.position;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_becomes_best() {
        let mut p = Particle::new(PoseParameters::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0));
        assert!(p.best_energy.is_infinite());
        assert!(p.observe(42.0));
        assert_eq!(p.best_energy, 42.0);
        assert_eq!(p.best_position, p.position);
    }

    #[test]
    fn test_best_updates_only_on_strict_improvement() {
        let mut p = Particle::new(PoseParameters::ZERO);
        assert!(p.observe(10.0));

        p.position = PoseParameters::new(0.5, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(!p.observe(10.0)); // equal energy does not move the best
        assert_eq!(p.best_position, PoseParameters::ZERO);

        assert!(p.observe(9.5));
        assert_eq!(p.best_position, p.position);
        assert_eq!(p.best_energy, 9.5);
    }

    #[test]
    fn test_best_energy_monotone_over_observations() {
        let mut p = Particle::new(PoseParameters::ZERO);
        let mut last = f32::INFINITY;
        for e in [5.0, 7.0, 3.0, 3.0, 8.0, 1.0] {
            p.observe(e);
            assert!(p.best_energy <= last);
            assert!(p.best_energy <= e);
            last = p.best_energy;
        }
        assert_eq!(p.best_energy, 1.0);
    }
}
