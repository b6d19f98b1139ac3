pub mod blocks;
pub mod cli;
pub mod collision;
pub mod config;
pub mod engine;
pub mod normalize;
pub mod playground;
pub mod program;
pub mod render;
pub mod scene;
pub mod sprite;
pub mod store;
pub mod tasks;
pub mod undo;
pub mod validate;

use anyhow::{Context, Result};
use config::EngineConfig;
use playground::Playground;
use render::SpriteView;
use scene::{apply_scene, load_scene, SceneFile};
use serde::Serialize;
use sprite::SpriteState;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Final stage after a headless run.
#[derive(Debug, Clone, Serialize)]
pub struct SceneOutcome {
    /// False when the time limit passed with programs still running.
    pub settled: bool,
    pub views: Vec<SpriteView>,
    pub sprites: Vec<SpriteState>,
}

pub fn run_cli(args: &cli::Args) -> Result<()> {
    let total_stages = 4 + usize::from(args.output.is_some());
    let progress = CliProgress::new("Run", total_stages);
    let mut stage = 0usize;

    stage += 1;
    progress.emit(stage, "Loading config");
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(&canonicalize_file(path)?)?,
        None => EngineConfig::default(),
    };
    if args.seed.is_some() {
        config.random_seed = args.seed;
    }

    stage += 1;
    progress.emit(stage, "Loading scene");
    let scene_path = canonicalize_file(&args.scene)?;
    let mut scene = load_scene(&scene_path)?;
    if args.hero_mode {
        scene.hero_mode = true;
    }
    if args.pointer.is_some() {
        scene.pointer = args.pointer;
    }

    stage += 1;
    progress.emit(stage, "Running programs");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime.")?;
    let outcome = runtime.block_on(run_scene(
        config,
        &scene,
        args.run_all,
        Duration::from_millis(args.duration_ms),
    ))?;

    stage += 1;
    progress.emit(stage, "Rendering result");
    let rendered = serde_json::to_string_pretty(&outcome)?;

    if let Some(output) = &args.output {
        stage += 1;
        progress.emit(stage, "Writing result");
        std::fs::write(output, rendered.as_bytes())
            .with_context(|| format!("Failed to write '{}'.", pretty_path(output)))?;
    } else {
        println!("{}", rendered);
    }
    Ok(())
}

/// Builds a stage from `scene`, starts its programs and waits until they
/// finish or `limit` passes.
pub async fn run_scene(
    config: EngineConfig,
    scene: &SceneFile,
    run_all: bool,
    limit: Duration,
) -> Result<SceneOutcome> {
    let playground = Playground::new(config);
    let ids = apply_scene(&playground, scene)?;
    let started = if run_all {
        playground.run_all()
    } else {
        ids.iter().map(|id| playground.run(*id)).sum()
    };
    info!(sprites = ids.len(), chains = started, "scene started");

    let settled = tokio::time::timeout(limit, playground.settle())
        .await
        .is_ok();
    if !settled {
        warn!(limit_ms = limit.as_millis() as u64, "programs still running at the time limit");
    }
    Ok(SceneOutcome {
        settled,
        views: playground.render_all(),
        sprites: playground.sprites(),
    })
}

pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

fn pretty_path(path: &Path) -> String {
    let raw = path.display().to_string();
    if let Some(stripped) = raw.strip_prefix(r"\\?\") {
        stripped.to_string()
    } else {
        raw
    }
}

struct CliProgress {
    prefix: &'static str,
    total: usize,
}

impl CliProgress {
    fn new(prefix: &'static str, total: usize) -> Self {
        Self {
            prefix,
            total: total.max(1),
        }
    }

    fn emit(&self, step: usize, label: &str) {
        let step = step.clamp(1, self.total);
        let bar = render_progress_bar(step, self.total, 14);
        eprintln!(
            "[{}] {}... ({}/{}) {}",
            self.prefix, label, step, self.total, bar
        );
    }
}

fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}
