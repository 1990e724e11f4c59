//! Depth-image 6-DoF pose estimation via particle swarm optimization.
//!
//! Given a rigid triangle mesh (a foot scan) and a reference depth image,
//! this crate searches pose space for the placement whose rendered depth
//! map best matches the reference. Fitness is evaluated by a
//! render-compare-reduce pipeline: each candidate pose is rasterized into
//! a depth-only buffer, differenced pixel-by-pixel against the reference,
//! and collapsed to a single scalar energy through a mipmap-style
//! block-mean pyramid. A constricted particle swarm consumes those
//! energies to drive the search.
//!
//! # Architecture
//!
//! - `pose` / `particle` / `pso`: the swarm over 6-DoF pose space.
//! - `render`: shared projection math, a CPU rasterizer, and CUDA
//!   kernels (feature `cuda`) for the batched tile render.
//! - `evaluator`: the `FitnessEvaluator` boundary, the reduction
//!   pyramid, and the CPU/GPU pipelines behind it.
//! - `depth_image` / `mesh`: owned buffers and the plaintext depth-map
//!   and OBJ interchange formats.
//!
//! # Usage
//!
//! ```ignore
//! use pso_depth_matcher::{
//!     CpuEvaluator, DepthImage, PsoConfig, PsoOptimizer, RenderConfig, TriangleMesh,
//! };
//!
//! let mesh = TriangleMesh::load_obj("foot.obj")?;
//! let reference = DepthImage::from_text_file("dm0.txt")?;
//! let mut evaluator = CpuEvaluator::new(mesh, RenderConfig::default(), reference)?;
//!
//! let mut pso = PsoOptimizer::new(&initial_poses, PsoConfig::default())?;
//! let result = pso.run(&mut evaluator)?;
//! println!("best pose: {:?}", result.best_position);
//! ```

pub mod depth_image;
pub mod evaluator;
pub mod mesh;
pub mod particle;
pub mod pose;
pub mod pso;
pub mod render;
pub mod test_utils;

pub use depth_image::{DepthImage, BACKGROUND_DEPTH};
pub use evaluator::{CpuEvaluator, EvaluatorError, FitnessEvaluator};
pub use mesh::TriangleMesh;
pub use particle::Particle;
pub use pose::PoseParameters;
pub use pso::{constriction_coefficient, PsoConfig, PsoOptimizer, PsoResult};
pub use render::RenderConfig;

#[cfg(feature = "cuda")]
pub use evaluator::gpu::{is_cuda_available, GpuEvaluator};
