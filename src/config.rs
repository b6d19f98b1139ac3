use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Timing and safety knobs for the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pause between a synchronous block and its successor.
    pub step_delay_ms: u64,
    /// Glide animation tick.
    pub frame_interval_ms: u64,
    /// How long a plain `say`/`think` bubble claims to be shown.
    pub say_display_ms: f64,
    /// `go_to_random` picks both coordinates in `[0, random_range)`.
    pub random_range: f64,
    /// Dispatches one chain may perform before it is stopped as runaway.
    pub max_steps: usize,
    pub random_seed: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 10,
            frame_interval_ms: 16,
            say_display_ms: 100.0,
            random_range: 400.0,
            max_steps: 10_000,
            random_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'.", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("Invalid config '{}'.", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        Ok(config.sanitized())
    }

    /// Clamps values that would stall the scheduler.
    pub fn sanitized(mut self) -> Self {
        self.frame_interval_ms = self.frame_interval_ms.max(1);
        self.max_steps = self.max_steps.max(1);
        if !self.random_range.is_finite() || self.random_range < 0.0 {
            self.random_range = 0.0;
        }
        self
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml("step_delay_ms = 0\nrandom_seed = 7\n")
            .expect("config parses");
        assert_eq!(config.step_delay_ms, 0);
        assert_eq!(config.random_seed, Some(7));
        assert_eq!(config.frame_interval_ms, 16);
        assert_eq!(config.max_steps, 10_000);
    }

    #[test]
    fn zero_frame_interval_is_clamped() {
        let config = EngineConfig::from_toml("frame_interval_ms = 0\nmax_steps = 0")
            .expect("config parses");
        assert_eq!(config.frame_interval(), Duration::from_millis(1));
        assert_eq!(config.max_steps, 1);
    }

    #[test]
    fn load_reports_the_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "max_steps = \"lots\"").expect("write");
        let err = EngineConfig::load(file.path()).expect_err("bad type");
        assert!(err.to_string().contains("Invalid config"));

        let missing = EngineConfig::load(Path::new("/definitely/not/here.toml"));
        assert!(missing.is_err());
    }
}
