use std::{path::PathBuf, str::FromStr};

use anyhow::{bail, Context, Result};
use clap::Parser;
use nalgebra::{SVector, Scalar, Vector3};
use num_traits::Zero;

use ribbon::{camera::OrbitCamera, config::Config, style::RenderStyleParams};

#[derive(Debug, Parser)]
/// Builds halo ribbon geometry for a track file.
pub struct Args {
    /// Path to a .obj or .txt track file.
    pub input: PathBuf,

    #[arg(long)]
    /// File to write the vertex stream to, as little endian f32s.
    pub output: PathBuf,
    #[arg(long)]
    /// File to write the std140 encoded frame uniforms to.
    pub uniforms: Option<PathBuf>,
    #[arg(long)]
    /// Config directory to read defaults from.
    pub config: Option<PathBuf>,

    #[arg(long)]
    /// Side of the cube the dataset is fit into.
    pub target_span: Option<f32>,

    #[arg(long, default_value_t = 0.0)]
    /// Camera azimuth in degrees.
    pub azimuth: f32,
    #[arg(long, default_value_t = 90.0)]
    /// Camera polar angle in degrees, measured from the up axis.
    pub polar: f32,
    #[arg(long, default_value_t = 45.0)]
    /// Vertical field of view in degrees.
    pub fov: f32,
    #[arg(long, default_value_t = 4.0 / 3.0)]
    /// Viewport width over height.
    pub aspect: f32,

    #[arg(long, value_parser = vector_value_parser::<f32, 3>)]
    /// Clip plane normal, clipping is disabled if not given.
    pub clip: Option<Vector3<f32>>,
    #[arg(long, default_value_t = 0.0)]
    /// Clip plane distance from the origin.
    pub clip_distance: f32,
    #[arg(long, conflicts_with = "clip")]
    /// Clip with the plane facing the camera's right.
    pub clip_right: bool,

    #[arg(short, long)]
    /// Log what is going on.
    pub verbose: bool,
}

impl Args {
    pub fn config(&self) -> Config {
        let mut config = (self.config.clone())
            .or_else(Config::default_dir)
            .map(|dir| Config::load_or_default(&dir))
            .unwrap_or_default();

        if let Some(target_span) = self.target_span {
            config.target_span = target_span;
        }

        config
    }

    /// The camera pose given on the command line, relative to the reset pose.
    pub fn camera(&self) -> OrbitCamera {
        let mut camera = OrbitCamera::new();
        camera.set_aspect(self.aspect);
        camera.set_field_of_view(self.fov);
        camera.rotate_azimuth(self.azimuth.to_radians());
        camera.rotate_polar((self.polar - 90.0).to_radians());
        camera
    }

    pub fn style(&self, mut style: RenderStyleParams, camera: &OrbitCamera) -> RenderStyleParams {
        if let Some(normal) = self.clip {
            style.clip_enabled = true;
            style.clip_normal = normal;
        } else if self.clip_right {
            style.enable_clip_from_camera(camera);
        }

        if self.clip.is_some() || self.clip_right {
            style.clip_distance = self.clip_distance;
        }

        style
    }
}

/// Parses a vector written as exactly `N` comma separated elements.
fn vector_value_parser<T, const N: usize>(raw: &str) -> Result<SVector<T, N>>
where
    T: FromStr + Scalar + Zero,
    T::Err: Send + Sync + std::error::Error + 'static,
{
    let parts = raw.split(',').map(str::trim).collect::<Vec<_>>();
    if parts.len() != N {
        bail!("Expected {N} comma separated elements, got {}", parts.len());
    }

    let mut vector = SVector::<T, N>::zeros();
    for (element, part) in vector.iter_mut().zip(parts) {
        *element = (part.parse()).with_context(|| format!("Invalid vector element `{part}`"))?;
    }

    Ok(vector)
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;

    use super::vector_value_parser;

    #[test]
    fn parses_clip_normals() {
        let parse = vector_value_parser::<f32, 3>;
        assert_eq!(parse("1,0,0").unwrap(), Vector3::x());
        assert_eq!(parse(" 0.5, -2 ,3 ").unwrap(), Vector3::new(0.5, -2.0, 3.0));

        assert!(parse("1,0").is_err());
        assert!(parse("1,0,0,0").is_err());
        assert!(parse("1,up,0").is_err());
    }
}
