use crate::sprite::Position;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sbplay-rs",
    about = "Headless block-program playground: loads a scene, runs its sprite programs and prints the final stage."
)]
pub struct Args {
    #[arg(value_name = "SCENE")]
    pub scene: PathBuf,

    #[arg(long, value_name = "FILE", help = "Engine settings (TOML).")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        help = "Start every top-level chain instead of only 'when flag clicked' chains."
    )]
    pub run_all: bool,

    #[arg(long, help = "Enable Hero Mode (colliding sprites swap speech and program).")]
    pub hero_mode: bool,

    #[arg(
        long,
        value_name = "N",
        default_value_t = 30_000,
        help = "Stop waiting for programs after this many milliseconds."
    )]
    pub duration_ms: u64,

    #[arg(
        long,
        value_name = "X,Y",
        value_parser = parse_pointer,
        help = "Pointer position used by 'point towards'."
    )]
    pub pointer: Option<Position>,

    #[arg(long, help = "Seed for 'go to random position'.")]
    pub seed: Option<u32>,

    #[arg(long, value_name = "FILE", help = "Write the result here instead of stdout.")]
    pub output: Option<PathBuf>,
}

fn parse_pointer(raw: &str) -> Result<Position, String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", raw))?;
    let x = x
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad x '{}': {}", x.trim(), e))?;
    let y = y
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad y '{}': {}", y.trim(), e))?;
    Ok(Position::new(x, y))
}
