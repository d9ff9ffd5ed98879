use std::{io::Write, mem};

use anyhow::Result;
use rayon::prelude::*;
use wgpu::{BufferAddress, VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

use crate::{dataset::Dataset, Pos};

/// Interleaved `[pos.xyz, dir.xyz, uv]` records, two per track point.
pub const VERTEX_BUFFER_LAYOUT: VertexBufferLayout = VertexBufferLayout {
    array_stride: mem::size_of::<LineVertex>() as BufferAddress,
    step_mode: VertexStepMode::Vertex,
    attributes: &[
        VertexAttribute {
            format: VertexFormat::Float32x3,
            offset: 0,
            shader_location: 0,
        },
        VertexAttribute {
            format: VertexFormat::Float32x3,
            offset: 3 * 4,
            shader_location: 1,
        },
        VertexAttribute {
            format: VertexFormat::Float32x2,
            offset: 6 * 4,
            shader_location: 2,
        },
    ],
};

/// Floats per [`LineVertex`].
pub const VERTEX_FLOATS: usize = 8;

#[repr(C)]
#[derive(Default, Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    /// Unit length direction the track is heading in at this point.
    pub direction: [f32; 3],
    /// `u` runs from 0 to 1 along the track, `v` picks the ribbon side.
    pub uv: [f32; 2],
}

/// Ribbon vertices for a single track, ready to be drawn as a triangle strip.
/// The ribbon's width is applied later by offsetting the `v = 0` and `v = 1`
/// copies of each point in opposite directions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackGeometry {
    vertices: Box<[LineVertex]>,
}

/// Geometry of every track in a dataset, in draw order.
#[derive(Debug, Clone, Default)]
pub struct DatasetGeometry {
    tracks: Vec<TrackGeometry>,
}

impl TrackGeometry {
    /// Builds the doubled vertex stream for one track. Tracks with fewer than
    /// two points have nothing to draw and produce no vertices. So do tracks
    /// of any length whose points all sit at one location, since no segment
    /// gives them a direction to orient the ribbon with.
    pub fn build(points: &[Pos]) -> Self {
        let n = points.len();
        if n < 2 {
            return Self::default();
        }

        let Some(directions) = smoothed_directions(points) else {
            return Self::default();
        };

        let last = (n - 1) as f32;
        let vertices = (points.iter().zip(directions).enumerate())
            .flat_map(|(i, (position, direction))| {
                let u = i as f32 / last;
                let vertex = |v| LineVertex {
                    position: (*position).into(),
                    direction: direction.into(),
                    uv: [u, v],
                };
                [vertex(0.0), vertex(1.0)]
            })
            .collect();

        Self { vertices }
    }

    pub fn vertices(&self) -> &[LineVertex] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// The vertex stream as [`VERTEX_FLOATS`] floats per vertex.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }
}

impl DatasetGeometry {
    pub fn build(dataset: &Dataset) -> Self {
        let tracks = (dataset.tracks().par_iter())
            .map(|track| TrackGeometry::build(track.points()))
            .collect();
        Self { tracks }
    }

    pub fn tracks(&self) -> &[TrackGeometry] {
        &self.tracks
    }

    pub fn vertex_count(&self) -> usize {
        self.tracks.iter().map(TrackGeometry::vertex_count).sum()
    }

    /// Number of tracks that produced any geometry.
    pub fn drawable_tracks(&self) -> usize {
        self.tracks.iter().filter(|x| !x.is_empty()).count()
    }

    /// Writes every track's vertex stream back to back as little endian
    /// floats.
    pub fn write_le<W: Write>(&self, writer: &mut W) -> Result<()> {
        for track in &self.tracks {
            for float in track.as_floats() {
                writer.write_all(&float.to_le_bytes())?;
            }
        }

        Ok(())
    }
}

fn segment_direction(from: &Pos, to: &Pos) -> Option<Pos> {
    (to - from).try_normalize(f32::MIN_POSITIVE)
}

/// Per point average of the incoming and outgoing segment directions. Points
/// sitting on a zero length segment, or where the track exactly reverses,
/// borrow the direction of their nearest neighbour. Returns `None` if every
/// point of the track is in the same place.
fn smoothed_directions(points: &[Pos]) -> Option<Vec<Pos>> {
    let segments = (points.windows(2))
        .map(|pair| segment_direction(&pair[0], &pair[1]))
        .collect::<Vec<_>>();

    let mut directions = (0..points.len())
        .map(|i| {
            let incoming = i.checked_sub(1).and_then(|prev| segments[prev]);
            let outgoing = segments.get(i).copied().flatten();
            match (incoming, outgoing) {
                (Some(incoming), Some(outgoing)) => (incoming + outgoing)
                    .try_normalize(f32::MIN_POSITIVE)
                    .or(Some(outgoing)),
                (incoming, outgoing) => incoming.or(outgoing),
            }
        })
        .collect::<Vec<_>>();

    let mut last = None;
    for direction in directions.iter_mut() {
        last = (*direction).or(last);
        *direction = last;
    }

    let first = directions.iter().find_map(|x| *x)?;
    Some(directions.into_iter().map(|x| x.unwrap_or(first)).collect())
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;
    use proptest::prelude::*;

    use super::{LineVertex, TrackGeometry, VERTEX_BUFFER_LAYOUT, VERTEX_FLOATS};
    use crate::Pos;

    fn direction(vertex: &LineVertex) -> Pos {
        Vector3::from(vertex.direction)
    }

    #[test]
    fn corner_track() {
        let points = [Vector3::zeros(), Vector3::x(), Vector3::new(1.0, 1.0, 0.0)];
        let geometry = TrackGeometry::build(&points);
        let vertices = geometry.vertices();

        assert_eq!(vertices.len(), 6);
        assert_eq!(
            vertices.iter().map(|x| x.uv[0]).collect::<Vec<_>>(),
            [0.0, 0.0, 0.5, 0.5, 1.0, 1.0]
        );
        assert_eq!(
            vertices.iter().map(|x| x.uv[1]).collect::<Vec<_>>(),
            [0.0, 1.0, 0.0, 1.0, 0.0, 1.0]
        );

        let middle = (Vector3::x() + Vector3::y()).normalize();
        assert!((direction(&vertices[2]) - middle).norm() < 1e-6);
        assert_eq!(vertices[2], LineVertex { uv: [0.5, 0.0], ..vertices[3] });
        assert!((direction(&vertices[0]) - Vector3::x()).norm() < 1e-6);
        assert!((direction(&vertices[5]) - Vector3::y()).norm() < 1e-6);
        assert_eq!(vertices[4].position, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn degenerate_tracks() {
        assert!(TrackGeometry::build(&[]).is_empty());
        assert!(TrackGeometry::build(&[Vector3::x()]).is_empty());
        assert!(TrackGeometry::build(&[Vector3::x(); 4]).is_empty());
        assert!(TrackGeometry::build(&[Vector3::zeros(); 2]).is_empty());

        let points = [Vector3::zeros(), Vector3::zeros(), Vector3::y()];
        assert!(!TrackGeometry::build(&points).is_empty());
    }

    #[test]
    fn repeated_points_keep_unit_directions() {
        let points = [
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::x(),
            Vector3::x(),
            Vector3::zeros(),
        ];
        let geometry = TrackGeometry::build(&points);

        assert_eq!(geometry.vertex_count(), 10);
        for vertex in geometry.vertices() {
            assert!((direction(vertex).norm() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn buffer_layout() {
        let geometry = TrackGeometry::build(&[Vector3::zeros(), Vector3::z()]);
        assert_eq!(geometry.as_floats().len(), 4 * VERTEX_FLOATS);
        assert_eq!(geometry.as_bytes().len(), 4 * 32);
        assert_eq!(VERTEX_BUFFER_LAYOUT.array_stride, 32);
        assert_eq!(
            &geometry.as_floats()[8..16],
            [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0]
        );
    }

    fn arb_point() -> impl Strategy<Value = Pos> {
        (-100.0_f32..100.0, -100.0_f32..100.0, -100.0_f32..100.0)
            .prop_map(|(x, y, z)| Vector3::new(x, y, z))
    }

    proptest! {
        #[test]
        fn ribbon_invariants(points in prop::collection::vec(arb_point(), 2..64)) {
            let geometry = TrackGeometry::build(&points);
            let vertices = geometry.vertices();
            prop_assert_eq!(vertices.len(), 2 * points.len());

            for (i, vertex) in vertices.iter().enumerate() {
                prop_assert_eq!(vertex.uv[1], (i % 2) as f32);
                prop_assert!((direction(vertex).norm() - 1.0).abs() < 1e-5);
            }

            for pair in vertices.windows(2) {
                prop_assert!(pair[0].uv[0] <= pair[1].uv[0]);
            }

            prop_assert_eq!(vertices[0].uv[0], 0.0);
            prop_assert_eq!(vertices[vertices.len() - 1].uv[0], 1.0);
        }
    }
}
