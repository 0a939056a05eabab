// One status task per render: polls the engine until it stops working or the
// state leaves `Busy`, then hands a `TaskExit` to its exit callback.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, select, tick, Receiver, RecvTimeoutError, Sender};

use crate::core::display_thread::DisplayThread;
use crate::core::state::{RenderState, StateCell};
use crate::core::status::{FpsMeter, RenderInfo, StatusSnapshot};
use crate::error::{RenderError, RenderResult};
use crate::traits::{Engine, EngineStatus, StatusSink};

/// Why the task ended
#[derive(Debug)]
pub enum TaskExit {
    /// The engine reported `is_working == false` while the state was `Busy`
    EngineIdle(EngineStatus),
    /// Someone else moved the state out of `Busy`, usually a stop
    StateLeftBusy(RenderState, EngineStatus),
    /// `poll_status` failed or panicked
    Fault(RenderError),
    /// The owner asked the task to quit
    Shutdown,
}

/// Everything a status task reads from
pub struct StatusTaskContext {
    pub engine: Arc<dyn Engine>,
    pub state: Arc<StateCell>,
    pub sink: Arc<dyn StatusSink>,
    pub display: Arc<DisplayThread>,
    pub info: RenderInfo,
    pub period: Duration,
}

pub struct BackgroundStatusTask {
    ctx: StatusTaskContext,
    meter: FpsMeter,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl BackgroundStatusTask {
    /// Start polling on a dedicated thread.
    ///
    /// The first reading is taken immediately. `on_exit` runs exactly once,
    /// on the task thread, before the handle reports the task finished.
    pub fn spawn<F>(ctx: StatusTaskContext, on_exit: F) -> RenderResult<StatusTaskHandle>
    where
        F: FnOnce(TaskExit) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded::<()>(1);
        let period = ctx.period;
        let task = Self {
            ctx,
            meter: FpsMeter::new(),
            started: Instant::now(),
            started_at: Utc::now(),
        };

        let handle = thread::Builder::new()
            .name("render-status".into())
            .spawn(move || {
                let exit = panic::catch_unwind(AssertUnwindSafe(|| task.run(shutdown_rx)))
                    .unwrap_or_else(|payload| {
                        TaskExit::Fault(RenderError::engine_fault(
                            "status task",
                            anyhow!("panicked: {}", panic_message(&*payload)),
                        ))
                    });
                log::debug!("status task exiting: {exit:?}");
                on_exit(exit);
                drop(done_tx);
            })
            .map_err(|e| RenderError::engine_fault("spawn status task", e.into()))?;

        Ok(StatusTaskHandle {
            shutdown_tx: Some(shutdown_tx),
            done_rx,
            handle: Some(handle),
            period,
        })
    }

    fn run(mut self, shutdown: Receiver<()>) -> TaskExit {
        let ticker = tick(self.ctx.period);
        loop {
            if let Some(exit) = self.poll_once() {
                return exit;
            }
            select! {
                recv(ticker) -> _ => {}
                recv(shutdown) -> _ => return TaskExit::Shutdown,
            }
        }
    }

    /// One tick; `Some` ends the task
    fn poll_once(&mut self) -> Option<TaskExit> {
        let state = self.ctx.state.get();
        if state != RenderState::Busy {
            let last = self.refresh(state).unwrap_or_default();
            return Some(TaskExit::StateLeftBusy(state, last));
        }

        match self.refresh(state) {
            Ok(status) if status.is_working => None,
            Ok(status) => Some(TaskExit::EngineIdle(status)),
            Err(err) => Some(TaskExit::Fault(err)),
        }
    }

    fn refresh(&mut self, state: RenderState) -> RenderResult<EngineStatus> {
        let status = self
            .ctx
            .engine
            .poll_status()
            .map_err(|source| RenderError::engine_fault("poll_status", source))?;
        let render_fps = self.meter.tick();
        let snapshot = StatusSnapshot::from_engine(
            state,
            &status,
            render_fps,
            self.started.elapsed(),
            self.ctx.info,
            self.started_at,
        );
        self.ctx.sink.publish(&snapshot);
        self.ctx.display.request_redraw();
        Ok(status)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Owner side of a running status task
pub struct StatusTaskHandle {
    shutdown_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    period: Duration,
}

impl StatusTaskHandle {
    pub fn period(&self) -> Duration {
        self.period
    }

    /// True once the exit callback has returned
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// True on the task's own thread, i.e. inside its exit callback
    pub fn is_current_thread(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| h.thread().id() == thread::current().id())
    }

    /// Give up ownership without joining; the thread ends on its own
    pub fn detach(mut self) {
        self.shutdown_tx.take();
        self.handle.take();
    }

    /// Ask the task to quit at its next wait; it still runs its exit callback
    pub fn request_shutdown(&mut self) {
        self.shutdown_tx.take();
    }

    /// Wait up to `timeout` for the task to end and join it.
    ///
    /// Fails with [`RenderError::TaskLeak`] if it is still running; the handle
    /// stays usable so the caller can wait again.
    pub fn join_within(&mut self, timeout: Duration) -> RenderResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match self.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                self.handle = Some(handle);
                Err(RenderError::TaskLeak(timeout))
            }
            _ => {
                if handle.join().is_err() {
                    log::error!("status task panicked");
                }
                Ok(())
            }
        }
    }
}

impl Drop for StatusTaskHandle {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.request_shutdown();
            if let Err(err) = self.join_within(self.period * 4) {
                log::warn!("{err}");
            }
        }
    }
}
