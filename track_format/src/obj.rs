use std::io::Read;

use anyhow::{ensure, Context, Result};
use common::progress::Progress;

use crate::{
    util::{for_each_line, parse_vector},
    Polyline,
};

pub fn parse<R: Read>(reader: R, progress: &Progress) -> Result<Vec<Polyline>> {
    let mut verts = Vec::new();
    let mut lines = Vec::<Vec<usize>>::new();

    for_each_line(reader, progress, |line| {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => verts.push(parse_vector(parts).context("Invalid vertex")?),
            Some("l") => {
                let indices = parts
                    .map(|part| resolve_index(part, verts.len()))
                    .collect::<Option<Vec<_>>>()
                    .context("Invalid line element")?;
                lines.push(indices);
            }
            _ => {}
        }
        Ok(())
    })?;

    lines
        .into_iter()
        .map(|indices| {
            indices
                .into_iter()
                .map(|idx| {
                    ensure!(idx < verts.len(), "Line references missing vertex {}", idx + 1);
                    Ok(verts[idx])
                })
                .collect::<Result<Polyline>>()
        })
        .collect()
}

/// Converts a 1-based (or negative, relative) OBJ index into a 0-based one.
/// Texture coordinate suffixes (`3/7`) are ignored.
fn resolve_index(raw: &str, defined: usize) -> Option<usize> {
    let index = raw.split_once('/').map(|x| x.0).unwrap_or(raw);
    match index.parse::<i64>().ok()? {
        0 => None,
        idx if idx > 0 => Some(idx as usize - 1),
        idx => defined.checked_sub(idx.unsigned_abs() as usize),
    }
}
