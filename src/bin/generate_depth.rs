//! Render golden reference depth maps for hand-chosen poses.
//!
//! Usage: `generate_depth <mesh.obj> <output-dir>`
//!
//! Writes `dm0.txt`, `dm1.txt`, ... in the plaintext depth-map format,
//! one per reference pose.

use anyhow::{bail, Context, Result};
use pso_depth_matcher::render::cpu::render_depth;
use pso_depth_matcher::{PoseParameters, RenderConfig, TriangleMesh};
use std::f32::consts::PI;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (mesh_path, out_dir) = match (args.next(), args.next()) {
        (Some(m), Some(o)) => (PathBuf::from(m), PathBuf::from(o)),
        _ => bail!("usage: generate_depth <mesh.obj> <output-dir>"),
    };

    let mesh = TriangleMesh::load_obj(&mesh_path)?;
    let config = RenderConfig::default();

    // The reference placements the estimation experiments recover.
    let reference_poses = [
        PoseParameters::new(0.0, 0.0, -0.15, PI / 2.0 - PI / 8.0, PI / 2.0, 0.0),
        PoseParameters::new(-0.1, 0.0, -0.15, PI / 2.0 + PI / 8.0, PI / 2.0, 0.0),
    ];

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    for (i, pose) in reference_poses.iter().enumerate() {
        let depth = render_depth(&mesh, pose, &config)?;
        let path = out_dir.join(format!("dm{i}.txt"));
        depth.write_text_file(&path)?;
        tracing::info!(path = %path.display(), ?pose, "wrote reference depth map");
    }

    Ok(())
}
