use std::time::{Duration, Instant};

use anyhow::Result;
use encase::{ShaderType, UniformBuffer};
use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use wgpu::PrimitiveTopology;

use crate::{
    camera::OrbitCamera,
    diagnostics::FpsCounter,
    render::{RenderBackend, TrackBuffer},
    style::RenderStyleParams,
    Pos,
};

/// Nominal time between two frame ticks.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// World space light position when the light is not following the camera.
pub const LIGHT_POSITION: Pos = Vector3::new(0.0, 0.0, 100.0);

/// Uniforms shared by every track draw in a frame.
#[derive(Debug, Clone, PartialEq, ShaderType)]
pub struct FrameUniforms {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub inv_projection: Matrix4<f32>,

    pub light_position: Vector3<f32>,
    pub camera_position: Vector3<f32>,

    pub ribbon_width: f32,
    pub core_width_fraction: f32,
    pub depth_cueing: f32,
    pub max_halo_depth: f32,

    /// Zero when clipping is disabled.
    pub clip_normal: Vector3<f32>,
    pub clip_distance: f32,

    pub color: Vector3<f32>,
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub shininess: f32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    None,
    #[default]
    Lines,
    /// Draws the ribbon vertex stream as points. Both sides of the ribbon
    /// share a position, so every track point is drawn twice on top of
    /// itself.
    Points,
}

/// Decides when the next frame is due.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    interval: Duration,
    next: Instant,
}

/// Draws one frame per tick and keeps the frame rate.
pub struct FrameComposer {
    pub mode: RenderMode,
    fps: FpsCounter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub draws: usize,
    pub vertices: u64,
    /// Set on the frames that took a new FPS sample.
    pub fps: Option<f32>,
}

impl FrameUniforms {
    pub fn compose(camera: &OrbitCamera, style: &RenderStyleParams) -> Self {
        let light_position = if style.lit_with_camera {
            camera.inverse_view_rotation() * LIGHT_POSITION
        } else {
            LIGHT_POSITION
        };
        let (clip_normal, clip_distance) = style.clip_plane();

        Self {
            view: *camera.view_matrix(),
            projection: *camera.projection_matrix(),
            inv_projection: *camera.inverse_projection_matrix(),

            light_position,
            camera_position: camera.position(),

            ribbon_width: style.ribbon_width,
            core_width_fraction: style.core_width_fraction,
            depth_cueing: style.depth_cueing,
            max_halo_depth: style.max_halo_depth,

            clip_normal,
            clip_distance,

            color: style.color,
            ambient: style.ambient,
            diffuse: style.diffuse,
            specular: style.specular,
            shininess: style.shininess,
        }
    }

    /// Encodes the uniforms with std140 layout.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = UniformBuffer::new(Vec::new());
        buffer.write(self)?;
        Ok(buffer.into_inner())
    }
}

impl RenderMode {
    pub fn topology(&self) -> Option<PrimitiveTopology> {
        match self {
            RenderMode::None => None,
            RenderMode::Lines => Some(PrimitiveTopology::TriangleStrip),
            RenderMode::Points => Some(PrimitiveTopology::PointList),
        }
    }
}

impl FrameTimer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next: now,
        }
    }

    /// Returns true at most once per interval.
    pub fn is_due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }

        self.next = now + self.interval;
        true
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FrameComposer {
    pub fn new(mode: RenderMode, now: Instant) -> Self {
        Self {
            mode,
            fps: FpsCounter::new(now),
        }
    }

    /// Clears the target, then draws every track buffer with the uniforms
    /// for the current camera and style.
    pub fn compose<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        camera: &OrbitCamera,
        style: &RenderStyleParams,
        buffers: &[TrackBuffer<B::Buffer>],
        now: Instant,
    ) -> Result<FrameStats> {
        backend.clear();

        let mut stats = FrameStats::default();
        if let Some(topology) = self.mode.topology() {
            let uniforms = FrameUniforms::compose(camera, style).to_bytes()?;
            for track in buffers {
                backend.set_uniforms(&uniforms);
                backend.draw(&track.buffer, topology, 0..track.vertex_count);

                stats.draws += 1;
                stats.vertices += track.vertex_count as u64;
            }
        }

        stats.fps = self.fps.frame(now);
        Ok(stats)
    }

    pub fn fps(&self) -> Option<f32> {
        self.fps.fps()
    }
}
