use std::{io::Read, mem};

use anyhow::{Context, Result};
use common::progress::Progress;

use crate::{
    util::{for_each_line, parse_vector},
    Polyline,
};

pub fn parse<R: Read>(reader: R, progress: &Progress) -> Result<Vec<Polyline>> {
    let mut tracks = Vec::new();
    let mut current = Polyline::new();

    for_each_line(reader, progress, |line| {
        let line = line.trim();
        if line.starts_with('#') {
            return Ok(());
        }

        if line.is_empty() {
            if !current.is_empty() {
                tracks.push(mem::take(&mut current));
            }
            return Ok(());
        }

        let parts = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|x| !x.is_empty());
        current.push(parse_vector(parts).context("Invalid point")?);
        Ok(())
    })?;

    if !current.is_empty() {
        tracks.push(current);
    }

    Ok(tracks)
}
