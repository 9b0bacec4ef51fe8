use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use ndarray_npy::write_npy;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kspace_core::loader::{NpzLoader, VolumeLoader};
use kspace_core::synthetic::phantom_volume;
use kspace_core::{
    solve_layout, Domain, MosaicLayout, SessionState, View, ViewEvent, ViewSelector, ViewerConfig,
    Viewport, VolumeShape,
};

/// Render one frame of a dynamic multi-coil k-space volume.
///
/// Expected NPZ file structure, either:
///   - key "kspace": 6D array (nt, nz, nc, ny, nx, 2) of f32/f64
///   - keys "real" and "imag": 5D arrays (nt, nz, nc, ny, nx)
#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "synthetic"])))]
struct Args {
    /// Path to NPZ file containing the k-space volume
    #[arg(long)]
    input: Option<PathBuf>,

    /// Generate a phantom instead of loading: "nt,nz,nc,ny,nx"
    #[arg(long, value_parser = parse_shape)]
    synthetic: Option<VolumeShape>,

    /// Phantom noise level
    #[arg(long, default_value_t = 0.01)]
    noise: f32,

    /// Phantom RNG seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Viewer configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 0)]
    time: usize,

    #[arg(long, default_value_t = 0)]
    slice: usize,

    #[arg(long, value_enum, default_value_t = DomainArg::Kspace)]
    domain: DomainArg,

    /// Render this coil alone instead of the composite
    #[arg(long)]
    coil: Option<usize>,

    /// Mosaic viewport, "WIDTHxHEIGHT"
    #[arg(long, default_value = "800x600", value_parser = parse_viewport)]
    viewport: Viewport,

    /// Playback ticks to advance before rendering
    #[arg(long, default_value_t = 0)]
    frames: usize,

    /// Output path for the rendered composite (or single coil) image (.npy, u8)
    #[arg(long)]
    output: PathBuf,

    /// Output path for the coil mosaic (.npy, u8)
    #[arg(long)]
    mosaic_output: Option<PathBuf>,

    /// Print volume shape, selector and mosaic layout as JSON
    #[arg(long)]
    summary: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DomainArg {
    Kspace,
    Image,
}

impl From<DomainArg> for Domain {
    fn from(arg: DomainArg) -> Self {
        match arg {
            DomainArg::Kspace => Domain::KSpace,
            DomainArg::Image => Domain::Image,
        }
    }
}

#[derive(Serialize)]
struct Summary {
    shape: VolumeShape,
    selector: ViewSelector,
    mosaic: Option<MosaicLayout>,
}

fn parse_shape(s: &str) -> std::result::Result<VolumeShape, String> {
    let dims: Vec<usize> = s
        .split(',')
        .map(|d| d.trim().parse::<usize>().map_err(|e| format!("bad dimension {:?}: {}", d, e)))
        .collect::<std::result::Result<_, _>>()?;
    match dims.as_slice() {
        &[nt, nz, nc, ny, nx] => Ok(VolumeShape { nt, nz, nc, ny, nx }),
        _ => Err(format!("expected 5 comma-separated dims, got {}", dims.len())),
    }
}

fn parse_viewport(s: &str) -> std::result::Result<Viewport, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {:?}", s))?;
    let width = w.trim().parse().map_err(|e| format!("bad width {:?}: {}", w, e))?;
    let height = h.trim().parse().map_err(|e| format!("bad height {:?}: {}", h, e))?;
    Ok(Viewport { width, height })
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kspace_core=info,kspace_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ViewerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => ViewerConfig::default(),
    };

    // --- Load or synthesize the volume ---
    let volume = match (&args.input, args.synthetic) {
        (Some(path), _) => NpzLoader.load(path)?,
        (None, Some(shape)) => phantom_volume(shape, args.noise, args.seed)
            .context("Failed to build synthetic phantom")?,
        (None, None) => bail!("either --input or --synthetic is required"),
    };
    let shape = volume.shape();
    info!(?shape, "volume ready");

    let mut session = SessionState::new(config);
    session.set_volume(volume)?;

    // --- Views ---
    let target = match args.coil {
        Some(coil) => {
            session.open_view(View::SingleCoil(coil), args.viewport)
                .with_context(|| format!("Coil {} not in volume with {} coils", coil, shape.nc))?
                .0
        }
        None => session.composite_view(),
    };
    let mosaic = match &args.mosaic_output {
        Some(_) => Some(session.open_view(View::Mosaic, args.viewport)?.0),
        None => None,
    };

    // --- Selector ---
    session.handle(ViewEvent::SetSliceIndex(args.slice))?;
    session.handle(ViewEvent::SetTimeIndex(args.time))?;
    if session.selector().domain != Domain::from(args.domain) {
        session.handle(ViewEvent::ToggleDomain)?;
    }

    if args.frames > 0 {
        session.handle(ViewEvent::PlaybackStart)?;
        let generation = session.playback_generation();
        for _ in 0..args.frames {
            session.handle(ViewEvent::PlaybackTick { generation })?;
        }
        session.handle(ViewEvent::PlaybackStop)?;
    }

    println!(
        "Rendered t = {}, z = {}, domain = {:?} of volume {}x{}x{}x{}x{}",
        session.selector().time_index,
        session.selector().slice_index,
        session.selector().domain,
        shape.nt,
        shape.nz,
        shape.nc,
        shape.ny,
        shape.nx
    );

    // --- Save images as .npy ---
    let image = session
        .views()
        .get(target)
        .and_then(|e| e.last_frame.as_ref())
        .context("No image rendered for the requested view")?;
    write_npy(&args.output, &image.pixels)
        .map_err(|e| anyhow::anyhow!("Failed to write output NPY {:?}: {}", args.output, e))?;
    println!("Image written to {:?}", args.output);

    if let (Some(path), Some(id)) = (&args.mosaic_output, mosaic) {
        let image = session
            .views()
            .get(id)
            .and_then(|e| e.last_frame.as_ref())
            .context("No mosaic rendered")?;
        write_npy(path, &image.pixels)
            .map_err(|e| anyhow::anyhow!("Failed to write mosaic NPY {:?}: {}", path, e))?;
        println!("Mosaic written to {:?}", path);
    }

    if args.summary {
        let layout = solve_layout(
            shape.nc,
            args.viewport.width,
            args.viewport.height,
            shape.aspect_ratio(),
            session.config().layout,
        )
        .ok();
        let summary = Summary {
            shape,
            selector: session.selector(),
            mosaic: layout,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}
