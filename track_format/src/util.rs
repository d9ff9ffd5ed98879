use std::io::{BufRead, BufReader, Read};

use anyhow::{Context, Result};
use common::progress::Progress;
use nalgebra::Vector3;

/// Calls `callback` with every line of the input, without its line ending.
/// Errors are tagged with the (1-based) line number they came from.
pub fn for_each_line<R: Read>(
    reader: R,
    progress: &Progress,
    mut callback: impl FnMut(&str) -> Result<()>,
) -> Result<()> {
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut number = 0;

    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .with_context(|| format!("Failed to read line {}", number + 1))?;
        if read == 0 {
            break;
        }

        number += 1;
        progress.add_complete(read as u64);
        callback(line.trim_end_matches(&['\n', '\r'][..]))
            .with_context(|| format!("Line {number}"))?;
    }

    Ok(())
}

pub fn parse_vector<'a>(mut parts: impl Iterator<Item = &'a str>) -> Option<Vector3<f32>> {
    let vector = Vector3::new(
        parts.next()?.parse().ok()?,
        parts.next()?.parse().ok()?,
        parts.next()?.parse().ok()?,
    );

    vector.iter().all(|x: &f32| x.is_finite()).then_some(vector)
}
