use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::answer::WindowSettings;
use crate::detect::Resolution;
use crate::frame::{TemporalBuffer, DEFAULT_MAX_WINDOW_SEC, DEFAULT_PERSIST_FRAC, DEFAULT_WINDOW_SEC};
use crate::parse::{CommandParser, DEFAULT_THRESHOLD};

const DEFAULT_FPS: f32 = 24.0;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_SEMANTIC_ACCEPTANCE: f32 = 0.6;
const DEFAULT_HAZARD_LABELS: &[&str] = &["knife", "fire", "scissors", "stop sign"];
const DEFAULT_HAZARD_COOLDOWN_SECS: f32 = 3.0;

#[derive(Debug, Deserialize, Default)]
struct AssistConfigFile {
    fps: Option<f32>,
    threshold: Option<f32>,
    camera: Option<CameraConfigFile>,
    window: Option<WindowConfigFile>,
    semantic: Option<SemanticConfigFile>,
    hazards: Option<HazardConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct WindowConfigFile {
    default_sec: Option<f32>,
    max_sec: Option<f32>,
    persist_frac: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct SemanticConfigFile {
    enabled: Option<bool>,
    acceptance: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct HazardConfigFile {
    labels: Option<Vec<String>>,
    cooldown_secs: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct AssistConfig {
    pub fps: f32,
    pub resolution: Resolution,
    /// Default confidence threshold for commands that name none.
    pub threshold: f32,
    pub window: WindowConfig,
    pub semantic: SemanticSettings,
    pub hazards: HazardSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    pub window_sec: f32,
    pub max_window_sec: f32,
    pub persist_frac: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticSettings {
    pub enabled: bool,
    pub acceptance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HazardSettings {
    /// Empty disables hazard announcements.
    pub labels: Vec<String>,
    pub cooldown: Duration,
}

impl AssistConfig {
    /// Reads the file named by `ASSIST_CONFIG` (if set), then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ASSIST_CONFIG").ok();
        Self::load_from(
            config_path
                .as_deref()
                .filter(|path| !path.trim().is_empty())
                .map(Path::new),
        )
    }

    /// Like [`AssistConfig::load`] with an explicit config file.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AssistConfigFile) -> Self {
        let resolution = Resolution::new(
            file.camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_WIDTH),
            file.camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_HEIGHT),
        );
        let window = WindowConfig {
            window_sec: file
                .window
                .as_ref()
                .and_then(|window| window.default_sec)
                .unwrap_or(DEFAULT_WINDOW_SEC),
            max_window_sec: file
                .window
                .as_ref()
                .and_then(|window| window.max_sec)
                .unwrap_or(DEFAULT_MAX_WINDOW_SEC),
            persist_frac: file
                .window
                .as_ref()
                .and_then(|window| window.persist_frac)
                .unwrap_or(DEFAULT_PERSIST_FRAC),
        };
        let semantic = SemanticSettings {
            enabled: file
                .semantic
                .as_ref()
                .and_then(|semantic| semantic.enabled)
                .unwrap_or(true),
            acceptance: file
                .semantic
                .as_ref()
                .and_then(|semantic| semantic.acceptance)
                .unwrap_or(DEFAULT_SEMANTIC_ACCEPTANCE),
        };
        let hazards = HazardSettings {
            labels: file
                .hazards
                .as_ref()
                .and_then(|hazards| hazards.labels.clone())
                .unwrap_or_else(|| {
                    DEFAULT_HAZARD_LABELS
                        .iter()
                        .map(|label| label.to_string())
                        .collect()
                }),
            cooldown: Duration::from_secs_f32(
                file.hazards
                    .and_then(|hazards| hazards.cooldown_secs)
                    .filter(|secs| secs.is_finite() && *secs >= 0.0)
                    .unwrap_or(DEFAULT_HAZARD_COOLDOWN_SECS),
            ),
        };
        Self {
            fps: file.fps.unwrap_or(DEFAULT_FPS),
            resolution,
            threshold: file.threshold.unwrap_or(DEFAULT_THRESHOLD),
            window,
            semantic,
            hazards,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(fps) = env_f32("ASSIST_FPS")? {
            self.fps = fps;
        }
        if let Some(width) = env_u32("ASSIST_WIDTH")? {
            self.resolution.width = width;
        }
        if let Some(height) = env_u32("ASSIST_HEIGHT")? {
            self.resolution.height = height;
        }
        if let Some(window_sec) = env_f32("ASSIST_WINDOW_SEC")? {
            self.window.window_sec = window_sec;
        }
        if let Some(persist_frac) = env_f32("ASSIST_PERSIST_FRAC")? {
            self.window.persist_frac = persist_frac;
        }
        if let Some(threshold) = env_f32("ASSIST_THRESHOLD")? {
            self.threshold = threshold;
        }
        if let Ok(flag) = std::env::var("ASSIST_SEMANTIC") {
            if !flag.trim().is_empty() {
                self.semantic.enabled = parse_flag(&flag)
                    .ok_or_else(|| anyhow!("ASSIST_SEMANTIC must be on/off, true/false or 1/0"))?;
            }
        }
        // an empty value clears the list
        if let Ok(hazards) = std::env::var("ASSIST_HAZARDS") {
            self.hazards.labels = split_csv(&hazards);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(anyhow!("fps must be a positive number"));
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if !(self.window.window_sec.is_finite() && self.window.window_sec > 0.0) {
            return Err(anyhow!("window.default_sec must be greater than zero"));
        }
        if !(self.window.max_window_sec >= self.window.window_sec) {
            return Err(anyhow!(
                "window.max_sec ({}) must be at least window.default_sec ({})",
                self.window.max_window_sec,
                self.window.window_sec
            ));
        }
        if !(self.window.persist_frac > 0.0 && self.window.persist_frac <= 1.0) {
            return Err(anyhow!("window.persist_frac must be within (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(anyhow!("threshold must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.semantic.acceptance) {
            return Err(anyhow!("semantic.acceptance must be within [0, 1]"));
        }
        self.hazards.labels = self
            .hazards
            .labels
            .iter()
            .map(|label| label.trim().to_lowercase())
            .filter(|label| !label.is_empty())
            .collect();
        Ok(())
    }

    pub fn window_settings(&self) -> WindowSettings {
        WindowSettings {
            window_sec: self.window.window_sec,
            persist_frac: self.window.persist_frac,
        }
    }

    pub fn parser(&self) -> CommandParser {
        CommandParser::new(self.fps).with_default_threshold(self.threshold)
    }

    pub fn buffer(&self) -> TemporalBuffer {
        TemporalBuffer::new(self.fps, self.window.max_window_sec, self.resolution)
    }

    /// Seconds between feeder ticks.
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.fps)
    }
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self::from_file(AssistConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<AssistConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: AssistConfigFile = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_f32(key: &str) -> Result<Option<f32>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{key} must be a number")),
        _ => Ok(None),
    }
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{key} must be a non-negative integer")),
        _ => Ok(None),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let mut cfg = AssistConfig::default();
        cfg.validate().expect("defaults validate");
        assert_eq!(cfg.fps, 24.0);
        assert_eq!(cfg.resolution, Resolution::new(640, 480));
        assert_eq!(cfg.window.window_sec, 0.6);
        assert_eq!(cfg.window.max_window_sec, 2.0);
        assert_eq!(cfg.buffer().capacity(), 48);
        assert_eq!(cfg.hazards.labels.len(), 4);
        assert_eq!(cfg.hazards.cooldown, Duration::from_secs(3));
    }

    #[test]
    fn window_longer_than_history_is_rejected() {
        let mut cfg = AssistConfig::default();
        cfg.window.window_sec = 3.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn flags_and_csv() {
        assert_eq!(parse_flag("Off"), Some(false));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(split_csv(" knife, ,fire "), vec!["knife", "fire"]);
    }
}
