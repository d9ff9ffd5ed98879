use nalgebra::Vector3;
use rayon::prelude::*;
use tracing::debug;

use crate::Pos;

/// Points per chunk when summarizing a dataset in parallel.
const CHUNK_SIZE: usize = 4096;

/// Fits a dataset into a cube of side `target_span` centered on the origin,
/// scaling every axis by the same factor so angles are preserved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    pub target_span: f32,
}

/// The transform a [`Normalizer`] applied, `p' = (p - centroid) * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub centroid: Pos,
    pub scale: f32,
}

/// Point count, mean and bounds of a set of points. The mean is kept in f64
/// and updated incrementally so large datasets don't accumulate drift.
#[derive(Debug, Clone, Copy)]
struct Summary {
    count: u64,
    mean: Vector3<f64>,
    min: Pos,
    max: Pos,
}

impl Normalizer {
    pub fn new(target_span: f32) -> Self {
        Self { target_span }
    }

    /// Centers and scales every point of every track in place. Returns the
    /// applied transform, or `None` if there were no points at all. If all
    /// points coincide they are only moved to the origin.
    pub fn normalize(&self, tracks: &mut [Vec<Pos>]) -> Option<Normalization> {
        let summary = Summary::collect(tracks);
        if summary.count == 0 {
            return None;
        }

        let extent = summary.max.cast::<f64>() - summary.min.cast::<f64>();
        let (axis, span) = (extent.iter().copied().enumerate())
            .fold((0, 0.0_f64), |max, (axis, span)| {
                if span > max.1 {
                    (axis, span)
                } else {
                    max
                }
            });

        let scale = if span > 0.0 && span.is_finite() {
            (self.target_span as f64 / span) as f32
        } else {
            1.0
        };

        let normalization = Normalization {
            centroid: summary.mean.cast::<f32>(),
            scale,
        };
        debug!(
            "Normalizing {} points, centroid: {:?}, dominant axis: {axis}, scale: {scale}",
            summary.count, normalization.centroid
        );

        tracks.par_iter_mut().for_each(|track| {
            for point in track.iter_mut() {
                *point = normalization.apply(point);
            }
        });

        Some(normalization)
    }
}

impl Normalization {
    pub fn apply(&self, point: &Pos) -> Pos {
        let offset = point.cast::<f64>() - self.centroid.cast::<f64>();
        (offset * self.scale as f64).cast::<f32>()
    }

    /// Maps a normalized point back into dataset space.
    pub fn invert(&self, point: &Pos) -> Pos {
        point / self.scale + self.centroid
    }
}

impl Summary {
    fn empty() -> Self {
        Self {
            count: 0,
            mean: Vector3::zeros(),
            min: Vector3::repeat(f32::INFINITY),
            max: Vector3::repeat(f32::NEG_INFINITY),
        }
    }

    fn collect(tracks: &[Vec<Pos>]) -> Self {
        (tracks.par_iter())
            .flat_map_iter(|track| track.chunks(CHUNK_SIZE))
            .map(Self::of)
            .reduce(Self::empty, Self::merge)
    }

    // Welford's streaming mean
    fn of(points: &[Pos]) -> Self {
        let mut summary = Self::empty();
        for point in points {
            summary.count += 1;
            summary.mean += (point.cast::<f64>() - summary.mean) / summary.count as f64;
            summary.min = summary.min.inf(point);
            summary.max = summary.max.sup(point);
        }
        summary
    }

    fn merge(self, other: Self) -> Self {
        let count = self.count + other.count;
        if count == 0 {
            return self;
        }

        let weight = other.count as f64 / count as f64;
        Self {
            count,
            mean: self.mean + (other.mean - self.mean) * weight,
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self { target_span: 2.0 }
    }
}
