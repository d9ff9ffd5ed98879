use std::{
    fs::{self, File},
    io::{stdout, BufReader, BufWriter, Write},
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use args::Args;
use common::misc::{human_count, human_duration};
use ribbon::{dataset::Dataset, frame::FrameUniforms, geometry::DatasetGeometry};
use track_format::{load_tracks, Format};

mod args;

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::OFF
    };
    let filter = filter::Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target("ribbon", level)
        .with_target("track_format", level);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.config();
    let now = Instant::now();

    let format = Format::from_path(&args.input)?;
    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open `{}`", args.input.display()))?;
    let size = file.metadata()?.len();
    let (progress, join) = load_tracks(BufReader::new(file), size, format);

    while !join.is_finished() {
        print!("\rReading: {:.1}%", progress.progress() * 100.0);
        stdout().flush()?;
        thread::sleep(Duration::from_millis(50));
    }
    println!("\rReading: 100.0%");

    let tracks = join
        .join()
        .map_err(|_| anyhow!("Track reader panicked"))??;

    let dataset = Dataset::normalized(tracks, &config.normalizer());
    let geometry = DatasetGeometry::build(&dataset);

    let mut output = BufWriter::new(File::create(&args.output)?);
    geometry.write_le(&mut output)?;
    output.flush()?;

    println!(
        "Loaded `{}`. {{ tracks: {}, drawable: {}, points: {}, vertices: {} }}",
        args.input.display(),
        human_count(dataset.tracks().len() as u64),
        human_count(geometry.drawable_tracks() as u64),
        human_count(dataset.point_count() as u64),
        human_count(geometry.vertex_count() as u64),
    );

    if let Some(normalization) = dataset.normalization() {
        println!(
            " \\ Centroid: [{:.3}, {:.3}, {:.3}], scale: {}",
            normalization.centroid.x,
            normalization.centroid.y,
            normalization.centroid.z,
            normalization.scale
        );
    }

    if let Some(path) = &args.uniforms {
        let camera = args.camera();
        let style = args.style(config.style.clone(), &camera);
        fs::write(path, FrameUniforms::compose(&camera, &style).to_bytes()?)?;
    }

    println!("Done. Elapsed: {}", human_duration(now.elapsed()));

    Ok(())
}
