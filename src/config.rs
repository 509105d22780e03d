// engine knobs that aren't part of a project; optional json file, every field defaults

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::pipeline::timing::DEFAULT_MARGIN_FACTOR;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sample_rate: u32, // offline render rate; live playback follows the device
    pub lookahead_secs: f64,
    pub tick_interval_ms: u64,
    pub margin_factor: f64,
    pub release_tail_secs: f64,
    pub fade_secs: f32, // retire/stop fade
    pub voice_peak: f32, // 3 voices at peak stay under full scale
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            lookahead_secs: 0.1,
            tick_interval_ms: 25,
            margin_factor: DEFAULT_MARGIN_FACTOR,
            release_tail_secs: 1.0,
            fade_secs: 0.02,
            voice_peak: 0.3,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err::<Self, _>(e).with_context(|| format!("reading config {}", path.display())),
        };
        let config = serde_json::from_str(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}
