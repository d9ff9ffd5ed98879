//! Halo-shaded ribbon rendering for polyline datasets such as tractography
//! tracks. This crate holds everything with numerical content: the
//! [`camera::OrbitCamera`], the ribbon vertex builder in [`geometry`],
//! dataset normalization and the per-frame uniform composition. GPU work is
//! done by an implementation of [`render::RenderBackend`].

use nalgebra::Vector3;

pub mod camera;
pub mod config;
pub mod dataset;
pub mod diagnostics;
pub mod frame;
pub mod geometry;
pub mod normalize;
pub mod render;
pub mod style;
pub mod viewer;

pub type Pos = Vector3<f32>;
