//! Example: scan a synthetic seismic volume and compute a windowed attribute
//!
//! Run with: cargo run --example scan_volume
//! Log level: RUST_LOG=seismic_subvolume=debug cargo run --example scan_volume

use anyhow::Context;
use seismic_subvolume::{
    AxisRange, BinTransform, ExecutionMode, IteratorConfig, MemoryVolume, PolygonAoi,
    SubVolumeIterator, VolumeGeometry, WindowShape, ZUnit,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Root-mean-square amplitude over every present trace of the window
fn window_rms(subvolume: &seismic_subvolume::SubVolume) -> f32 {
    let (sum, n) = subvolume
        .volume(0)
        .iter()
        .filter(|trace| !trace.is_missing())
        .flat_map(|trace| trace.samples().iter())
        .fold((0.0f64, 0usize), |(sum, n), &v| (sum + (v as f64).powi(2), n + 1));
    if n == 0 {
        0.0
    } else {
        (sum / n as f64).sqrt() as f32
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    // 51 inlines x 41 crosslines, 2 s of 4 ms samples, rotated 30 degrees
    let angle = 30f64.to_radians();
    let transform = BinTransform::new(
        (450_000.0, 6_780_000.0),
        (25.0 * angle.cos(), 25.0 * angle.sin()),
        (-12.5 * angle.sin(), 12.5 * angle.cos()),
    )?;
    let geometry = VolumeGeometry::new(
        AxisRange::new(1000.0, 1100.0, 2.0),
        AxisRange::new(2000.0, 2080.0, 2.0),
        AxisRange::new(0.0, 2000.0, 4.0),
        ZUnit::Milliseconds,
    )?
    .with_transform(transform)?;
    info!("{}", geometry.summary());

    let volume = MemoryVolume::from_fn("synthetic", geometry.clone(), |(i, j, k)| {
        let t = k as f32 * 0.05;
        (t + 0.1 * i as f32).sin() * (1.0 + 0.01 * j as f32)
    });

    // Area of interest: a quadrilateral in world coordinates
    let corners = [(1010.0, 2010.0), (1080.0, 2005.0), (1090.0, 2070.0), (1020.0, 2060.0)];
    let vertices = corners
        .iter()
        .map(|&(inline, xline)| geometry.bin_to_world(inline, xline))
        .collect();
    let aoi = PolygonAoi::new(vertices)?.with_z_range(500.0, 1500.0);

    let config = match std::env::args().nth(1) {
        Some(path) => IteratorConfig::from_json_file(&path)
            .with_context(|| format!("loading iterator config from {}", path))?,
        None => IteratorConfig::default()
            .with_execution_mode(ExecutionMode::Background)
            .with_window(WindowShape::square(5))
            .with_buffer_capacity(16),
    };
    info!("config: {}", config.to_json_pretty()?);

    let iterator = SubVolumeIterator::builder(Arc::new(volume))
        .with_aoi(Arc::new(aoi))
        .with_config(config)
        .build()?;

    let started = Instant::now();
    let mut count = 0usize;
    let mut missing = 0usize;
    let mut peak = (0.0f32, (0.0, 0.0));
    while iterator.has_next() {
        let subvolume = iterator.next_subvolume()?;
        missing += subvolume.missing_count();
        let rms = window_rms(&subvolume);
        if rms > peak.0 {
            peak = (rms, subvolume.center_bin());
        }
        count += 1;
        if count % 500 == 0 {
            info!(
                completion = iterator.completion(),
                "{}",
                iterator.message()
            );
        }
    }

    info!(
        subvolumes = count,
        missing_cells = missing,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "scan finished"
    );
    println!(
        "Peak RMS {:.3} at inline {} crossline {}",
        peak.0, peak.1 .0, peak.1 .1
    );
    Ok(())
}
