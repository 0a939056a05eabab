// Engine calls that touch the framebuffer or preview buffers run on the
// display thread; the status task drives completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};

use crate::config::RenderConfig;
use crate::core::composer::{FrameComposer, FrameOutcome};
use crate::core::display_context::DisplayContext;
use crate::core::display_thread::DisplayThread;
use crate::core::memory_guard::MemoryGuard;
use crate::core::poller::{BackgroundStatusTask, StatusTaskContext, StatusTaskHandle, TaskExit};
use crate::core::state::{RenderState, StateCell};
use crate::core::status::{LatestStatus, RenderInfo, StatusSnapshot};
use crate::error::{RenderError, RenderResult};
use crate::settings::CoordinatorSettings;
use crate::traits::{DisplaySurface, Engine, EngineStatus, SceneInit, StatusSink};

/// Result of a successful call to [`RenderCoordinator::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { primitives: u32 },
    /// A render was running or another start was in progress; nothing happened
    AlreadyBusy,
}

/// Delivered to listeners registered with [`RenderCoordinator::on_event`]
#[derive(Debug, Clone)]
pub enum RenderEvent {
    /// Engine completed every sample; state is `Finished`
    Finished(StatusSnapshot),
    /// A stop was honoured and cleanup ran; state is `Idle`
    Stopped(StatusSnapshot),
    /// A start or a running render failed; state is `Idle`
    Failed { kind: &'static str, message: String },
}

type Listener = Box<dyn Fn(&RenderEvent) + Send + Sync>;

/// Status sink that keeps the latest snapshot and forwards to extra sinks
#[derive(Default)]
struct StatusFanOut {
    latest: LatestStatus,
    extra: RwLock<Vec<Arc<dyn StatusSink>>>,
}

impl StatusSink for StatusFanOut {
    fn publish(&self, snapshot: &StatusSnapshot) {
        self.latest.publish(snapshot);
        for sink in self.extra.read().iter() {
            sink.publish(snapshot);
        }
    }
}

enum Ending {
    Finished,
    Stopped,
}

/// State shared with the status task thread
struct Shared {
    engine: Arc<dyn Engine>,
    state: Arc<StateCell>,
    status: Arc<StatusFanOut>,
    listeners: RwLock<Vec<Listener>>,
    last_error: Mutex<Option<String>>,
}

impl Shared {
    fn emit(&self, event: &RenderEvent) {
        // a listener may start the next render, which can emit again
        for listener in self.listeners.read_recursive().iter() {
            listener(event);
        }
    }

    fn report(&self, err: &RenderError) {
        log::error!("render failed: {err}");
        *self.last_error.lock() = Some(err.to_string());
        self.emit(&RenderEvent::Failed {
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    /// Runs on the status task thread once the task has decided to exit.
    ///
    /// Cleanup happens before the state commit so a `Finished` or `Idle`
    /// observer never sees resources still held.
    fn complete(&self, exit: TaskExit, display: &DisplayThread) {
        let engine = Arc::clone(&self.engine);
        let cleanup = display.run(move |ctx| {
            engine.finish_render();
            ctx.composer.release();
            if let Err(err) = ctx.draw_frame() {
                log::warn!("final frame failed: {err}");
            }
        });
        if let Err(err) = cleanup {
            log::warn!("render cleanup skipped: {err}");
        }

        let (last, ending) = match exit {
            TaskExit::EngineIdle(last) => {
                match self.state.transition(RenderState::Busy, RenderState::Finished) {
                    Ok(()) => (last, Some(Ending::Finished)),
                    Err(RenderState::Stopped) => (last, self.settle_stop()),
                    Err(other) => {
                        log::debug!("completion found state {other}, nothing to commit");
                        (last, None)
                    }
                }
            }
            TaskExit::StateLeftBusy(RenderState::Stopped, last) => (last, self.settle_stop()),
            TaskExit::StateLeftBusy(other, last) => {
                log::debug!("status task ended with state {other}");
                (last, None)
            }
            TaskExit::Fault(err) => {
                self.state.force(RenderState::Idle);
                self.report(&err);
                (EngineStatus::default(), None)
            }
            TaskExit::Shutdown => {
                self.state.force(RenderState::Idle);
                (EngineStatus::default(), None)
            }
        };

        let mut snapshot = self.status.latest.get();
        snapshot.state = self.state.get();
        snapshot.sample_index = snapshot.sample_index.max(last.sample_index);
        self.status.publish(&snapshot);

        match ending {
            Some(Ending::Finished) => {
                log::info!("render finished after {} ms", snapshot.wall_ms);
                self.emit(&RenderEvent::Finished(snapshot));
            }
            Some(Ending::Stopped) => {
                log::info!("render stopped");
                self.emit(&RenderEvent::Stopped(snapshot));
            }
            None => {}
        }
    }

    fn settle_stop(&self) -> Option<Ending> {
        match self.state.transition(RenderState::Stopped, RenderState::Idle) {
            Ok(()) => Some(Ending::Stopped),
            Err(other) => {
                log::debug!("stop already settled, state {other}");
                None
            }
        }
    }
}

/// Clears the start latch on every exit path of `start`
struct StartLatch<'a>(&'a AtomicBool);

impl Drop for StartLatch<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RenderCoordinator {
    shared: Arc<Shared>,
    display: Arc<DisplayThread>,
    task: Mutex<Option<StatusTaskHandle>>,
    starting: AtomicBool,
    settings: CoordinatorSettings,
}

impl RenderCoordinator {
    pub fn new(
        engine: Arc<dyn Engine>,
        surface: Box<dyn DisplaySurface>,
        settings: CoordinatorSettings,
        guard: MemoryGuard,
    ) -> RenderResult<Self> {
        let composer = FrameComposer::new(Arc::clone(&engine), guard);
        let display = DisplayThread::spawn(DisplayContext::new(composer, surface))?;
        log::info!(
            "coordinator ready: engine={}, poll every {:?}",
            engine.name(),
            settings.poll_interval()
        );
        Ok(Self {
            shared: Arc::new(Shared {
                engine,
                state: Arc::new(StateCell::default()),
                status: Arc::new(StatusFanOut::default()),
                listeners: RwLock::new(Vec::new()),
                last_error: Mutex::new(None),
            }),
            display: Arc::new(display),
            task: Mutex::new(None),
            starting: AtomicBool::new(false),
            settings,
        })
    }

    /// Coordinator with the system memory probe
    pub fn with_system_memory(
        engine: Arc<dyn Engine>,
        surface: Box<dyn DisplaySurface>,
        settings: CoordinatorSettings,
    ) -> RenderResult<Self> {
        let guard = MemoryGuard::system(settings.low_memory_floor_mb);
        Self::new(engine, surface, settings, guard)
    }

    /// Load the scene and start rendering.
    ///
    /// Blocks until the engine has begun rendering or the start failed. A
    /// start while `Busy`, or while another start is still being processed,
    /// is a silent no-op. The state only becomes `Busy` once the scene has
    /// loaded; any failure leaves it `Idle`.
    pub fn start(&self, config: RenderConfig) -> RenderResult<StartOutcome> {
        if self.starting.swap(true, Ordering::AcqRel) {
            log::debug!("start ignored: another start in progress");
            return Ok(StartOutcome::AlreadyBusy);
        }
        let _latch = StartLatch(&self.starting);

        let current = self.shared.state.get();
        if !current.accepts_start() {
            log::debug!("start ignored: state is {current}");
            return Ok(StartOutcome::AlreadyBusy);
        }
        self.wait_for_task(self.task_bound())?;

        let num_threads = match config.num_threads() {
            0 => self.settings.num_threads,
            n => n,
        };
        let rasterize = config.rasterize() || self.settings.force_rasterize;
        log::info!("starting render: {config}, threads={num_threads}");

        let engine = Arc::clone(&self.shared.engine);
        let state = Arc::clone(&self.shared.state);
        let job_config = config.clone();
        let result = self
            .display
            .run(move |ctx| begin_on_display(ctx, engine, &state, &job_config, num_threads, rasterize))
            .and_then(|inner| inner);

        let primitives = match result {
            Ok(Some(primitives)) => primitives,
            Ok(None) => return Ok(StartOutcome::AlreadyBusy),
            Err(err) => {
                self.shared.state.force(RenderState::Idle);
                self.shared.report(&err);
                return Err(err);
            }
        };

        let info = RenderInfo {
            width: config.width() as u32,
            height: config.height() as u32,
            threads: num_threads,
            samples_pixel: config.samples_pixel().max(0) as u32,
            samples_light: config.samples_light().max(0) as u32,
            primitives,
            lights: 0,
        };
        self.shared.status.latest.reset(StatusSnapshot {
            state: RenderState::Busy,
            info,
            started_at: Some(Utc::now()),
            ..StatusSnapshot::idle()
        });
        *self.shared.last_error.lock() = None;

        let ctx = StatusTaskContext {
            engine: Arc::clone(&self.shared.engine),
            state: Arc::clone(&self.shared.state),
            sink: Arc::clone(&self.shared.status) as Arc<dyn StatusSink>,
            display: Arc::clone(&self.display),
            info,
            period: self.settings.poll_interval(),
        };
        let shared = Arc::clone(&self.shared);
        let display = Arc::clone(&self.display);
        let spawned =
            BackgroundStatusTask::spawn(ctx, move |exit| shared.complete(exit, &display));
        match spawned {
            Ok(handle) => *self.task.lock() = Some(handle),
            Err(err) => {
                self.shared.engine.cancel_render();
                self.shared.engine.finish_render();
                self.shared.state.force(RenderState::Idle);
                self.shared.report(&err);
                return Err(err);
            }
        }

        log::info!("render started with {primitives} primitives");
        Ok(StartOutcome::Started { primitives })
    }

    /// Cancel the running render.
    ///
    /// Only acts while `Busy`; returns whether the stop took effect. The
    /// state reads `Stopped` immediately and `Idle` once the status task has
    /// run cleanup, at most one poll period later.
    pub fn stop(&self) -> bool {
        match self
            .shared
            .state
            .transition(RenderState::Busy, RenderState::Stopped)
        {
            Ok(()) => {
                log::info!("stopping render");
                self.shared.engine.cancel_render();
                true
            }
            Err(state) => {
                log::debug!("stop ignored: state is {state}");
                false
            }
        }
    }

    pub fn state(&self) -> RenderState {
        self.shared.state.get()
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        self.shared.status.latest.get()
    }

    /// Every committed state change from now on
    pub fn subscribe_state(&self) -> Receiver<RenderState> {
        self.shared.state.subscribe()
    }

    /// Listeners run on the status task thread, or on the caller's thread for
    /// failed starts.
    ///
    /// A listener may call [`start`](Self::start) to begin the next render.
    /// It must not register listeners itself.
    pub fn on_event<F>(&self, listener: F)
    where
        F: Fn(&RenderEvent) + Send + Sync + 'static,
    {
        self.shared.listeners.write().push(Box::new(listener));
    }

    /// Additional receiver of every status snapshot
    pub fn add_status_sink(&self, sink: Arc<dyn StatusSink>) {
        self.shared.status.extra.write().push(sink);
    }

    /// Block until the state is `target` or the timeout passes
    pub fn wait_for_state(&self, target: RenderState, timeout: Option<Duration>) -> bool {
        self.shared.state.wait_until(|s| s == target, timeout).is_ok()
    }

    /// Block until `predicate` holds; returns the last state seen either way
    pub fn wait_until(
        &self,
        predicate: impl Fn(RenderState) -> bool,
        timeout: Option<Duration>,
    ) -> Result<RenderState, RenderState> {
        self.shared.state.wait_until(predicate, timeout)
    }

    /// Wait for the current status task, if any, to exit.
    ///
    /// Fails with [`RenderError::TaskLeak`] if it is still running after
    /// `timeout`. Called from an event listener, the task is the caller
    /// itself; it has already committed its final state, so it is detached
    /// instead of joined.
    pub fn wait_for_task(&self, timeout: Duration) -> RenderResult<()> {
        let mut slot = self.task.lock();
        let Some(task) = slot.as_mut() else {
            return Ok(());
        };
        if task.is_current_thread() {
            if let Some(task) = slot.take() {
                task.detach();
            }
            return Ok(());
        }
        task.join_within(timeout)?;
        *slot = None;
        Ok(())
    }

    pub fn is_task_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    /// Frames uploaded to the surface so far
    pub fn frames_presented(&self) -> RenderResult<u64> {
        self.display.run(|ctx| ctx.composer.frames_presented())
    }

    /// Live preview buffers held by the composer
    pub fn preview_buffers_allocated(&self) -> RenderResult<usize> {
        self.display.run(|ctx| ctx.composer.preview_buffers_allocated())
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Generous bound for a task to notice a state change and clean up
    fn task_bound(&self) -> Duration {
        (self.settings.poll_interval() * 4).max(Duration::from_secs(1))
    }
}

impl Drop for RenderCoordinator {
    fn drop(&mut self) {
        self.stop();
        if let Some(mut task) = self.task.lock().take() {
            if let Err(err) = task.join_within(self.task_bound()) {
                log::warn!("{err}");
                task.request_shutdown();
            }
        }
        self.display.shutdown();
    }
}

/// Display-thread part of a start: scene load, framebuffer, first frame.
///
/// Returns `Ok(None)` if the state could not be moved to `Busy`.
fn begin_on_display(
    ctx: &mut DisplayContext,
    engine: Arc<dyn Engine>,
    state: &StateCell,
    config: &RenderConfig,
    num_threads: usize,
    rasterize: bool,
) -> RenderResult<Option<u32>> {
    let raw = engine
        .initialize_scene(config)
        .map_err(|source| RenderError::engine_fault("initialize_scene", source))?;
    let primitives = match SceneInit::from_raw(raw) {
        SceneInit::Loaded { primitives } => primitives,
        SceneInit::LoadFailed => {
            return Err(RenderError::scene_load(format!(
                "could not load scene {} (obj: '{}', mtl: '{}', cam: '{}')",
                config.scene().name(),
                config.obj_path().display(),
                config.mat_path().display(),
                config.cam_path().display()
            )))
        }
        SceneInit::OutOfMemory => {
            return Err(RenderError::low_memory(format!(
                "engine ran out of memory loading scene {}",
                config.scene().name()
            )))
        }
    };
    log::debug!("scene loaded: {primitives} primitives");

    let result = first_frame(ctx, state, config, primitives, num_threads, rasterize);
    if !matches!(result, Ok(Some(_))) {
        ctx.composer.release();
        engine.finish_render();
    }
    result
}

fn first_frame(
    ctx: &mut DisplayContext,
    state: &StateCell,
    config: &RenderConfig,
    primitives: u32,
    num_threads: usize,
    rasterize: bool,
) -> RenderResult<Option<u32>> {
    let (surface_width, surface_height) = ctx.surface_size();
    ctx.composer
        .set_bitmap(config.width(), config.height(), surface_width, surface_height)?;
    ctx.composer.prepare(primitives, num_threads, rasterize);

    let from = state.get();
    if from == RenderState::Busy || state.transition(from, RenderState::Busy).is_err() {
        return Ok(None);
    }
    match ctx.draw_frame()? {
        FrameOutcome::RenderStarted => Ok(Some(primitives)),
        other => Err(RenderError::engine_fault(
            "first frame",
            anyhow::anyhow!("expected the engine to start, got {other:?}"),
        )),
    }
}
