use std::ops::Range;

use anyhow::{Context, Result};
use image::RgbaImage;
use wgpu::PrimitiveTopology;

use crate::{
    diagnostics::MemoryUsage,
    geometry::{DatasetGeometry, LineVertex},
};

/// The graphics context frames are drawn into. Implementations own the
/// device, the ribbon shader and whatever target is being presented.
pub trait RenderBackend {
    type Buffer;

    /// Creates a vertex buffer laid out as
    /// [`VERTEX_BUFFER_LAYOUT`](crate::geometry::VERTEX_BUFFER_LAYOUT).
    fn upload(&mut self, vertices: &[LineVertex]) -> Result<Self::Buffer>;
    fn clear(&mut self);
    /// Binds std140 encoded [`FrameUniforms`](crate::frame::FrameUniforms)
    /// for the following draws.
    fn set_uniforms(&mut self, uniforms: &[u8]);
    fn draw(&mut self, buffer: &Self::Buffer, topology: PrimitiveTopology, vertices: Range<u32>);

    fn device_info(&self) -> String;

    /// GPU memory usage, if the driver exposes it.
    fn memory(&self) -> Option<MemoryUsage> {
        None
    }

    /// Reads back the last drawn frame, if the backend supports it.
    fn capture(&mut self) -> Result<Option<RgbaImage>> {
        Ok(None)
    }
}

/// An uploaded vertex buffer for one track.
#[derive(Debug)]
pub struct TrackBuffer<T> {
    pub buffer: T,
    pub vertex_count: u32,
}

/// Uploads every non empty track of `geometry`, keeping draw order.
pub fn upload_geometry<B: RenderBackend>(
    backend: &mut B,
    geometry: &DatasetGeometry,
) -> Result<Vec<TrackBuffer<B::Buffer>>> {
    let mut buffers = Vec::with_capacity(geometry.drawable_tracks());
    for track in geometry.tracks().iter().filter(|x| !x.is_empty()) {
        let vertex_count =
            u32::try_from(track.vertex_count()).context("Track has too many vertices")?;
        buffers.push(TrackBuffer {
            buffer: backend.upload(track.vertices())?,
            vertex_count,
        });
    }

    Ok(buffers)
}

#[cfg(test)]
pub(crate) mod test {
    use std::ops::Range;

    use anyhow::Result;
    use image::{Rgba, RgbaImage};
    use wgpu::PrimitiveTopology;

    use super::RenderBackend;
    use crate::{diagnostics::MemoryUsage, geometry::LineVertex};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Command {
        Upload(usize),
        Clear,
        Uniforms(Vec<u8>),
        Draw(usize, PrimitiveTopology, Range<u32>),
    }

    /// Records every call made on it.
    #[derive(Default)]
    pub struct RecordingBackend {
        pub commands: Vec<Command>,
        pub memory: Option<MemoryUsage>,
        pub capture: bool,
        uploaded: usize,
    }

    impl RecordingBackend {
        pub fn with_memory(memory: MemoryUsage) -> Self {
            Self {
                memory: Some(memory),
                ..Default::default()
            }
        }

        pub fn draws(&self) -> impl Iterator<Item = &Command> {
            (self.commands.iter()).filter(|x| matches!(x, Command::Draw(..)))
        }

        pub fn last_uniforms(&self) -> Option<&[u8]> {
            self.commands.iter().rev().find_map(|x| match x {
                Command::Uniforms(bytes) => Some(bytes.as_slice()),
                _ => None,
            })
        }
    }

    impl RenderBackend for RecordingBackend {
        type Buffer = usize;

        fn upload(&mut self, vertices: &[LineVertex]) -> Result<usize> {
            self.commands.push(Command::Upload(vertices.len()));
            self.uploaded += 1;
            Ok(self.uploaded - 1)
        }

        fn clear(&mut self) {
            self.commands.push(Command::Clear);
        }

        fn set_uniforms(&mut self, uniforms: &[u8]) {
            self.commands.push(Command::Uniforms(uniforms.to_vec()));
        }

        fn draw(&mut self, buffer: &usize, topology: PrimitiveTopology, vertices: Range<u32>) {
            self.commands.push(Command::Draw(*buffer, topology, vertices));
        }

        fn device_info(&self) -> String {
            "Recording Backend".into()
        }

        fn memory(&self) -> Option<MemoryUsage> {
            self.memory
        }

        fn capture(&mut self) -> Result<Option<RgbaImage>> {
            Ok(self
                .capture
                .then(|| RgbaImage::from_pixel(4, 3, Rgba([255, 0, 255, 255]))))
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;

    use super::{
        test::{Command, RecordingBackend},
        upload_geometry,
    };
    use crate::{dataset::Dataset, geometry::DatasetGeometry};

    #[test]
    fn skips_empty_tracks() {
        let dataset = Dataset::new(vec![
            vec![Vector3::zeros(), Vector3::x()],
            vec![Vector3::y()],
            vec![Vector3::zeros(), Vector3::y(), Vector3::z()],
        ]);
        let geometry = DatasetGeometry::build(&dataset);

        let mut backend = RecordingBackend::default();
        let buffers = upload_geometry(&mut backend, &geometry).unwrap();

        assert_eq!(
            buffers.iter().map(|x| (x.buffer, x.vertex_count)).collect::<Vec<_>>(),
            [(0, 4), (1, 6)]
        );
        assert_eq!(backend.commands, [Command::Upload(4), Command::Upload(6)]);
    }
}
