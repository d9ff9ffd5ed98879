use nalgebra::Vector3;

use crate::{
    normalize::{Normalization, Normalizer},
    Pos,
};

/// One ordered polyline. Immutable once the dataset holding it is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    points: Box<[Pos]>,
}

/// Tracks in draw order. A dataset is never edited in place, a new load
/// replaces the whole thing.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    tracks: Vec<Track>,
    normalization: Option<Normalization>,
}

impl Track {
    pub fn new(points: impl Into<Box<[Pos]>>) -> Self {
        Self {
            points: points.into(),
        }
    }

    pub fn points(&self) -> &[Pos] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// If the track has enough points to produce a ribbon.
    pub fn is_drawable(&self) -> bool {
        self.points.len() >= 2
    }
}

impl Dataset {
    /// Wraps already positioned tracks without normalizing them.
    pub fn new(tracks: Vec<Vec<Pos>>) -> Self {
        Self {
            tracks: tracks.into_iter().map(Track::new).collect(),
            normalization: None,
        }
    }

    /// Fits the tracks into the normalizer's target cube, then wraps them.
    pub fn normalized(mut tracks: Vec<Vec<Pos>>, normalizer: &Normalizer) -> Self {
        let normalization = normalizer.normalize(&mut tracks);
        Self {
            normalization,
            ..Self::new(tracks)
        }
    }

    /// The single demo track shown when no file has been loaded.
    pub fn test_data() -> Vec<Vec<Pos>> {
        vec![vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.5, 0.0, 0.0),
            Vector3::new(0.5, 0.2, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
        ]]
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn point_count(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// The transform applied by [`Dataset::normalized`], if any.
    pub fn normalization(&self) -> Option<&Normalization> {
        self.normalization.as_ref()
    }
}
