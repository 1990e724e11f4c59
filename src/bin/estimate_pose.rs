//! Recover a pose from a reference depth map with the particle swarm.
//!
//! Usage: `estimate_pose <mesh.obj> <reference-depth.txt> [population] [iterations]`
//!
//! Seeds the swarm by Gaussian jitter around a starting guess, runs the
//! fixed iteration budget, and prints the best pose found. Uses the CUDA
//! evaluator when built with the `cuda` feature and a device is present,
//! otherwise the CPU pipeline.

use anyhow::{bail, Result};
use pso_depth_matcher::{
    CpuEvaluator, DepthImage, FitnessEvaluator, PoseParameters, PsoConfig, PsoOptimizer,
    RenderConfig, TriangleMesh,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f32::consts::PI;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Gaussian-jittered swarm seeds around a starting guess.
fn seed_swarm(
    center: PoseParameters,
    translation_sigma: f32,
    rotation_sigma: f32,
    population: usize,
    rng: &mut StdRng,
) -> Result<Vec<PoseParameters>> {
    let trans = Normal::new(0.0f32, translation_sigma)?;
    let rot = Normal::new(0.0f32, rotation_sigma)?;
    Ok((0..population)
        .map(|_| {
            center
                + PoseParameters::new(
                    trans.sample(rng),
                    trans.sample(rng),
                    trans.sample(rng),
                    rot.sample(rng),
                    rot.sample(rng),
                    rot.sample(rng),
                )
        })
        .collect())
}

fn build_evaluator(
    mesh: TriangleMesh,
    config: RenderConfig,
    reference: DepthImage,
) -> Result<Box<dyn FitnessEvaluator>> {
    #[cfg(feature = "cuda")]
    {
        if pso_depth_matcher::is_cuda_available() {
            match pso_depth_matcher::GpuEvaluator::new(&mesh, config.clone(), &reference) {
                Ok(gpu) => return Ok(Box::new(gpu)),
                Err(e) => {
                    tracing::warn!("GPU evaluator unavailable ({e}), falling back to CPU");
                }
            }
        }
    }
    Ok(Box::new(CpuEvaluator::new(mesh, config, reference)?))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (mesh_path, reference_path) = match (args.next(), args.next()) {
        (Some(m), Some(r)) => (PathBuf::from(m), PathBuf::from(r)),
        _ => bail!("usage: estimate_pose <mesh.obj> <reference-depth.txt> [population] [iterations]"),
    };
    let population: usize = match args.next() {
        Some(p) => p.parse()?,
        None => 24,
    };
    let iterations: usize = match args.next() {
        Some(i) => i.parse()?,
        None => 60,
    };

    let mesh = TriangleMesh::load_obj(&mesh_path)?;
    let reference = DepthImage::from_text_file(&reference_path)?;
    let config = RenderConfig {
        crop_width: reference.width(),
        crop_height: reference.height(),
        ..RenderConfig::default()
    };
    config.validate()?;

    // Starting guess in front of the camera, upright like the scans.
    let center = PoseParameters::new(0.0, 0.0, -0.15, PI / 2.0, PI / 2.0, 0.0);
    let mut rng = StdRng::seed_from_u64(2024);
    let initial = seed_swarm(center, 0.05, PI / 8.0, population, &mut rng)?;

    let mut evaluator = build_evaluator(mesh, config, reference)?;
    let pso_config = PsoConfig {
        iterations,
        ..PsoConfig::default()
    };
    let mut pso = PsoOptimizer::new(&initial, pso_config)?;

    let start = std::time::Instant::now();
    let result = pso.run(evaluator.as_mut())?;
    let elapsed = start.elapsed();

    tracing::info!(
        generations = result.generations,
        evaluations = result.evaluations,
        elapsed_ms = elapsed.as_millis() as u64,
        "swarm finished"
    );
    println!(
        "best energy {:.6} at pose tx={:.4} ty={:.4} tz={:.4} rx={:.4} ry={:.4} rz={:.4}",
        result.best_energy,
        result.best_position.x_translation,
        result.best_position.y_translation,
        result.best_position.z_translation,
        result.best_position.x_rotation,
        result.best_position.y_rotation,
        result.best_position.z_rotation,
    );
    Ok(())
}
