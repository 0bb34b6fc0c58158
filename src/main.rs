use clap::{ArgAction, Parser};
use std::f32::consts::TAU;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn, Level};

use splatsort::camera::{orbit, Camera};
use splatsort::config::{DEFAULT_DEPTH_BUCKETS, DEFAULT_RESORT_EPSILON, DEFAULT_TEXTURE_WIDTH};
use splatsort::demo::{generate_seeded_splats, scene_center};
use splatsort::math::Vec3;
use splatsort::parser::{dot_splat, parse_scene, SceneFormat};
use splatsort::splat::ROW_SIZE;
use splatsort::{spawn_engine, EngineConfig, EngineHandle, EngineMessage, HostMessage, Splat};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

const DEMO_SPLATS: usize = 60_000;
const DEMO_SEED: u64 = 7;

#[derive(Debug, Parser)]
#[command(
    name = "splatsort",
    version,
    about = "Stream a Gaussian splat scene through the depth-ordering engine"
)]
struct Cli {
    /// Path to a .ply or .splat scene file (runs demo if omitted)
    input: Option<PathBuf>,
    #[arg(long, help = "Run built-in demo scene", conflicts_with = "input")]
    demo: bool,
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TEXTURE_WIDTH, help = "Texels per texture row")]
    texture_width: u32,
    #[arg(long, value_name = "N", default_value_t = DEFAULT_DEPTH_BUCKETS, help = "Depth sort buckets")]
    buckets: u32,
    #[arg(
        long,
        value_name = "E",
        default_value_t = DEFAULT_RESORT_EPSILON,
        help = "Skip re-sorting when the view axis moved less than this"
    )]
    resort_epsilon: f32,
    #[arg(
        long,
        value_name = "N",
        default_value_t = 65_536,
        help = "Rows per simulated download chunk for .splat input"
    )]
    chunk_rows: usize,
    #[arg(long, value_name = "N", default_value_t = 36, help = "Orbit views to sort")]
    views: u32,
    #[arg(long, value_name = "PATH", help = "Write the scene as .splat rows")]
    export: Option<PathBuf>,
    #[arg(short, long, action = ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
}

#[derive(Debug, Default)]
struct Summary {
    texture_updates: usize,
    order_updates: usize,
    last_order_count: usize,
    exported: bool,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_scene_bytes(cli: &Cli) -> AppResult<(Vec<u8>, SceneFormat)> {
    let path = match cli.input.as_ref() {
        Some(path) if !cli.demo => path,
        _ => {
            info!(splats = DEMO_SPLATS, seed = DEMO_SEED, "generating demo scene");
            let splats = generate_seeded_splats(DEMO_SPLATS, DEMO_SEED);
            return Ok((dot_splat::encode_rows(&splats), SceneFormat::Raw));
        }
    };

    let data = std::fs::read(path)
        .map_err(|err| format!("failed to read '{}': {err}", path.display()))?;
    let format = SceneFormat::from_path(path).unwrap_or_else(|| SceneFormat::detect(&data));
    info!(path = %path.display(), bytes = data.len(), ?format, "read scene file");
    Ok((data, format))
}

fn scene_radius(splats: &[Splat], center: Vec3) -> f32 {
    splats
        .iter()
        .map(|s| (s.position - center).length())
        .filter(|d| d.is_finite())
        .fold(0.0_f32, f32::max)
}

fn report(message: EngineMessage, export: Option<&Path>, summary: &mut Summary) -> AppResult<()> {
    match message {
        EngineMessage::TextureUpdate(update) => {
            summary.texture_updates += 1;
            debug!(
                width = update.width,
                height = update.height,
                words = update.words.len(),
                "texture update"
            );
        }
        EngineMessage::OrderUpdate { indices, count } => {
            summary.order_updates += 1;
            summary.last_order_count = count;
            debug!(count, first = indices.first().copied(), "order update");
        }
        EngineMessage::ExportBytes { bytes, save } => {
            if let (true, Some(path)) = (save, export) {
                write_export(path, &bytes)?;
                summary.exported = true;
            }
        }
        EngineMessage::LoadFailed(err) => return Err(Box::new(err)),
    }
    Ok(())
}

fn drain_ready(handle: &EngineHandle, export: Option<&Path>, summary: &mut Summary) -> AppResult<()> {
    while let Some(message) = handle.try_recv()? {
        report(message, export, summary)?;
    }
    Ok(())
}

fn write_export(path: &Path, bytes: &[u8]) -> AppResult<()> {
    std::fs::write(path, bytes)
        .map_err(|err| format!("failed to write '{}': {err}", path.display()))?;
    info!(path = %path.display(), splats = bytes.len() / ROW_SIZE, "exported scene");
    Ok(())
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = EngineConfig {
        texture_width: cli.texture_width,
        depth_buckets: cli.buckets,
        resort_epsilon: cli.resort_epsilon,
    };
    let (data, format) = load_scene_bytes(&cli)?;
    let splats = parse_scene(&data, format)?;
    let export = cli.export.as_deref();

    let started = Instant::now();
    let handle = spawn_engine(config)?;
    let mut summary = Summary::default();

    match format {
        SceneFormat::Ply => {
            handle.send(HostMessage::LoadStructured {
                bytes: data,
                save: export.is_some(),
            })?;
        }
        SceneFormat::Raw => {
            let total = dot_splat::row_count(data.len());
            let chunk = cli.chunk_rows.max(1);
            let mut end = 0;
            while end < total {
                end = (end + chunk).min(total);
                handle.send(HostMessage::LoadRaw {
                    bytes: data[..end * ROW_SIZE].to_vec(),
                    declared_count: total,
                })?;
                drain_ready(&handle, export, &mut summary)?;
            }
            if let Some(path) = export {
                write_export(path, &dot_splat::encode_rows(&splats))?;
                summary.exported = true;
            }
        }
    }

    let center = scene_center(&splats);
    let radius = (scene_radius(&splats, center) * 2.5).max(1.0);
    let mut camera = Camera::new(Vec3::ZERO, 0.0, 0.0);
    for step in 0..cli.views {
        let angle = TAU * step as f32 / cli.views.max(1) as f32;
        orbit(&mut camera, center, radius, radius * 0.3, angle);
        handle.send(HostMessage::SetView {
            view_proj: camera.view_projection(16.0 / 9.0),
        })?;
        drain_ready(&handle, export, &mut summary)?;
    }

    for message in handle.shutdown()? {
        report(message, export, &mut summary)?;
    }

    if export.is_some() && !summary.exported {
        warn!("export requested but the engine produced no export bytes");
    }
    info!(
        splats = splats.len(),
        texture_updates = summary.texture_updates,
        order_updates = summary.order_updates,
        last_order_count = summary.last_order_count,
        views = cli.views,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "engine run finished"
    );
    Ok(())
}
