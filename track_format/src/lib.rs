//! Readers producing ordered point lists, one per track, from simple polyline
//! formats.

use std::{
    fmt::{self, Display},
    io::Read,
    path::Path,
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use clone_macro::clone;
use common::progress::Progress;
use nalgebra::Vector3;
use tracing::debug;

mod obj;
mod txt;
mod util;

pub type Polyline = Vec<Vector3<f32>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Wavefront OBJ, each `l` statement is a track.
    Obj,
    /// One `x y z` point per line, blank lines separate tracks.
    Txt,
}

impl Format {
    pub const ALL: [Format; 2] = [Format::Obj, Format::Txt];

    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extension() == extension)
    }

    /// Picks the format from a file's extension, failing for anything that
    /// isn't a supported track format.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|x| x.to_string_lossy())
            .with_context(|| format!("`{}` has no file extension", path.display()))?;

        Self::from_extension(&extension)
            .with_context(|| format!("Unsupported track format `.{extension}`"))
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Obj => "obj",
            Format::Txt => "txt",
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Parses every track in `reader` on the calling thread.
pub fn parse_tracks<R: Read>(
    reader: R,
    format: Format,
    progress: &Progress,
) -> Result<Vec<Polyline>> {
    let tracks = match format {
        Format::Obj => obj::parse(reader, progress),
        Format::Txt => txt::parse(reader, progress),
    }?;

    debug!("Parsed {} tracks from {format} data", tracks.len());
    Ok(tracks)
}

/// Parses tracks on a worker thread. `size` is the number of bytes expected
/// from the reader and is only used for progress reporting.
pub fn load_tracks<R: Read + Send + 'static>(
    reader: R,
    size: u64,
    format: Format,
) -> (Progress, JoinHandle<Result<Vec<Polyline>>>) {
    let progress = Progress::new();
    progress.set_total(size);

    let join = thread::spawn(clone!([progress], move || {
        let tracks = parse_tracks(reader, format, &progress);
        progress.set_finished();
        tracks
    }));

    (progress, join)
}
