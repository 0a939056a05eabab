// Status snapshots and the sinks that receive them

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::Serialize;

use crate::core::bitmap::BYTES_IN_MEGABYTE;
use crate::core::state::RenderState;
use crate::traits::{EngineStatus, StatusSink};

/// Per-render constants shown next to the live counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderInfo {
    pub width: u32,
    pub height: u32,
    pub threads: usize,
    pub samples_pixel: u32,
    pub samples_light: u32,
    pub primitives: u32,
    pub lights: u32,
}

/// Transient view of a render, recomputed every tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub state: RenderState,
    /// Frames per second reported by the engine
    pub fps: f32,
    /// Rate at which the status task itself refreshes the display
    pub render_fps: f32,
    /// Engine-side render time
    pub elapsed_ms: u64,
    /// Wall time since the render was started
    pub wall_ms: u64,
    pub sample_index: u32,
    pub allocated_mb: u64,
    pub info: RenderInfo,
    pub started_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn idle() -> Self {
        Self {
            state: RenderState::Idle,
            fps: 0.0,
            render_fps: 0.0,
            elapsed_ms: 0,
            wall_ms: 0,
            sample_index: 0,
            allocated_mb: 0,
            info: RenderInfo::default(),
            started_at: None,
        }
    }

    pub fn from_engine(
        state: RenderState,
        status: &EngineStatus,
        render_fps: f32,
        wall: Duration,
        info: RenderInfo,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            state,
            fps: status.fps,
            render_fps,
            elapsed_ms: status.elapsed_ms,
            wall_ms: wall.as_millis() as u64,
            sample_index: status.sample_index,
            allocated_mb: status.allocated_bytes / BYTES_IN_MEGABYTE as u64,
            info: RenderInfo {
                lights: status.light_count.max(info.lights),
                ..info
            },
            started_at: Some(started_at),
        }
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// Two-line status text as shown under the render view
impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = &self.info;
        writeln!(
            f,
            "fps:{:.2}[{:.2}],r:{}x{},t:{},spp:{},spl:{},{}",
            self.fps,
            self.render_fps,
            info.width,
            info.height,
            info.threads,
            info.samples_pixel,
            info.samples_light,
            self.sample_index
        )?;
        write!(
            f,
            "{},m:{}mb,t:{:.2}[{:.2}],p={},l={}",
            self.state,
            self.allocated_mb,
            self.elapsed_ms as f64 / 1000.0,
            self.wall_ms as f64 / 1000.0,
            info.primitives,
            info.lights
        )
    }
}

/// Refresh-rate meter averaged over a one second window
#[derive(Debug, Clone)]
pub struct FpsMeter {
    frames: u32,
    window_start: Instant,
    fps: f32,
}

impl FpsMeter {
    const WINDOW: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        Self {
            frames: 0,
            window_start: Instant::now(),
            fps: 0.0,
        }
    }

    /// Count one refresh at `now` and return the current rate
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        self.frames += 1;
        let span = now.saturating_duration_since(self.window_start).as_secs_f32();
        if span > 0.0 {
            self.fps = self.frames as f32 / span;
        }
        if span > Self::WINDOW.as_secs_f32() {
            self.window_start = now;
            self.frames = 0;
        }
        self.fps
    }

    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink that keeps only the latest snapshot, read back by the coordinator
#[derive(Debug, Default)]
pub struct LatestStatus {
    latest: Mutex<StatusSnapshot>,
}

impl LatestStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> StatusSnapshot {
        self.latest.lock().clone()
    }

    pub fn reset(&self, snapshot: StatusSnapshot) {
        *self.latest.lock() = snapshot;
    }
}

impl StatusSink for LatestStatus {
    fn publish(&self, snapshot: &StatusSnapshot) {
        *self.latest.lock() = snapshot.clone();
    }
}

/// Forwards snapshots over a channel; silently drops once the receiver is gone
pub struct ChannelStatusSink {
    tx: Sender<StatusSnapshot>,
}

impl ChannelStatusSink {
    pub fn new(tx: Sender<StatusSnapshot>) -> Self {
        Self { tx }
    }
}

impl StatusSink for ChannelStatusSink {
    fn publish(&self, snapshot: &StatusSnapshot) {
        let _ = self.tx.send(snapshot.clone());
    }
}

/// Logs every snapshot as a single line at info level
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn publish(&self, snapshot: &StatusSnapshot) {
        log::info!("{}", snapshot.to_string().replace('\n', " | "));
    }
}
