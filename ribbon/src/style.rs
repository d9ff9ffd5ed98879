use std::sync::Arc;

use nalgebra::Vector3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{camera::OrbitCamera, Pos};

/// Style parameters shared between the control surface that edits them and
/// the frame composer that reads them.
pub type SharedStyle = Arc<RwLock<RenderStyleParams>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyleParams {
    /// Full width of a ribbon in normalized dataset units.
    pub ribbon_width: f32,
    /// Share of the ribbon width drawn as the solid core, the rest is halo.
    pub core_width_fraction: f32,
    pub depth_cueing: f32,
    /// How far a halo is pushed back in depth at its outer edge.
    pub max_halo_depth: f32,

    pub clip_enabled: bool,
    pub clip_normal: Pos,
    pub clip_distance: f32,

    /// Keep the light at the camera instead of fixed in world space.
    pub lit_with_camera: bool,
    pub color: Vector3<f32>,
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub shininess: f32,
}

impl RenderStyleParams {
    pub fn shared(self) -> SharedStyle {
        Arc::new(RwLock::new(self))
    }

    /// The clip plane normal as sent to the shading stage. A zero normal
    /// turns the clip test off.
    pub fn clip_plane(&self) -> (Pos, f32) {
        if self.clip_enabled {
            (self.clip_normal, self.clip_distance)
        } else {
            (Vector3::zeros(), 0.0)
        }
    }

    /// Enables clipping with the plane facing the camera's right.
    pub fn enable_clip_from_camera(&mut self, camera: &OrbitCamera) {
        self.clip_enabled = true;
        self.clip_normal = camera.right();
    }

    /// Sets the halo as a fraction of the ribbon width.
    pub fn set_halo_width(&mut self, halo: f32) {
        self.core_width_fraction = (1.0 - halo).clamp(0.0, 1.0);
    }

    pub fn halo_width(&self) -> f32 {
        1.0 - self.core_width_fraction
    }
}

impl Default for RenderStyleParams {
    fn default() -> Self {
        Self {
            ribbon_width: 0.02,
            core_width_fraction: 0.8,
            depth_cueing: 0.5,
            max_halo_depth: 0.02,

            clip_enabled: false,
            clip_normal: Vector3::x(),
            clip_distance: 0.0,

            lit_with_camera: false,
            color: Vector3::new(0.9, 0.3, 0.8),
            ambient: 0.2,
            diffuse: 0.9,
            specular: 0.3,
            shininess: 128.0,
        }
    }
}
