// Process-wide coordinator settings, loadable from JSON

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
pub const DEFAULT_LOW_MEMORY_FLOOR_MB: u64 = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// Status task period in milliseconds
    pub poll_interval_ms: u64,
    /// Engine worker threads when the request leaves it at 0
    pub num_threads: usize,
    /// Run the raster preview pass even if the request does not ask for it
    pub force_rasterize: bool,
    /// Below this many available MB the environment is flagged as low on memory
    pub low_memory_floor_mb: u64,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            num_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            force_rasterize: false,
            low_memory_floor_mb: DEFAULT_LOW_MEMORY_FLOOR_MB,
        }
    }
}

impl CoordinatorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn from_json(text: &str) -> RenderResult<Self> {
        let settings: Self =
            serde_json::from_str(text).map_err(|e| RenderError::settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RenderError::settings(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    fn validate(&self) -> RenderResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(RenderError::settings("poll_interval_ms must be > 0"));
        }
        if self.num_threads == 0 {
            return Err(RenderError::settings("num_threads must be > 0"));
        }
        Ok(())
    }
}
