mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver};
use render_host::core::bitmap::Bitmap;
use render_host::core::composer::FrameComposer;
use render_host::core::display_context::DisplayContext;
use render_host::core::display_thread::DisplayThread;
use render_host::core::memory_guard::{FixedMemoryProbe, MemoryGuard};
use render_host::core::poller::{BackgroundStatusTask, StatusTaskContext, StatusTaskHandle, TaskExit};
use render_host::core::state::{RenderState, StateCell};
use render_host::core::status::{LatestStatus, RenderInfo};
use render_host::engines::{CallCounts, Script, ScriptedEngine};
use render_host::traits::{Engine, StatusSink};
use render_host::{HeadlessSurface, RenderError};

use common::{init_test_logging, PERIOD, SLACK};

struct Running {
    handle: StatusTaskHandle,
    exits: Receiver<TaskExit>,
    state: Arc<StateCell>,
    status: Arc<LatestStatus>,
    engine: Arc<ScriptedEngine>,
    _display: Arc<DisplayThread>,
}

fn start_task(engine: ScriptedEngine) -> Running {
    init_test_logging();
    let engine = Arc::new(engine);
    engine
        .begin_render(Bitmap::new(4, 4).into_shared(), 1, true)
        .unwrap();

    let composer = FrameComposer::new(
        Arc::clone(&engine) as Arc<dyn Engine>,
        MemoryGuard::new(Arc::new(FixedMemoryProbe::new(1_000_000))),
    );
    let display = Arc::new(
        DisplayThread::spawn(DisplayContext::new(
            composer,
            Box::new(HeadlessSurface::new(4, 4)),
        ))
        .unwrap(),
    );
    let state = Arc::new(StateCell::new(RenderState::Busy));
    let status = Arc::new(LatestStatus::new());

    let (exit_tx, exits) = bounded(1);
    let handle = BackgroundStatusTask::spawn(
        StatusTaskContext {
            engine: Arc::clone(&engine) as Arc<dyn Engine>,
            state: Arc::clone(&state),
            sink: Arc::clone(&status) as Arc<dyn StatusSink>,
            display: Arc::clone(&display),
            info: RenderInfo {
                width: 4,
                height: 4,
                primitives: 12,
                ..RenderInfo::default()
            },
            period: PERIOD,
        },
        move |exit| {
            let _ = exit_tx.send(exit);
        },
    )
    .unwrap();

    Running {
        handle,
        exits,
        state,
        status,
        engine,
        _display: display,
    }
}

// ============================================================================
// Termination
// ============================================================================

#[test]
fn test_exits_when_engine_stops_working() {
    let run = start_task(ScriptedEngine::finishing_after(3));

    let exit = run.exits.recv_timeout(PERIOD * 3 + SLACK).unwrap();

    assert!(matches!(exit, TaskExit::EngineIdle(status) if !status.is_working));
    assert_eq!(CallCounts::get(&run.engine.calls().polls), 3);
}

#[test]
fn test_exits_within_one_period_of_engine_idle() {
    let run = start_task(ScriptedEngine::working_forever(5));
    std::thread::sleep(PERIOD + PERIOD / 2);

    let idle_at = Instant::now();
    run.engine.complete_now();
    run.exits.recv_timeout(PERIOD + SLACK).unwrap();

    assert!(idle_at.elapsed() <= PERIOD + SLACK);
}

#[test]
fn test_exits_when_state_leaves_busy() {
    let run = start_task(ScriptedEngine::working_forever(5));

    run.state
        .transition(RenderState::Busy, RenderState::Stopped)
        .unwrap();
    let exit = run.exits.recv_timeout(PERIOD + SLACK).unwrap();

    assert!(matches!(exit, TaskExit::StateLeftBusy(RenderState::Stopped, _)));
}

#[test]
fn test_poll_failure_ends_task_with_fault() {
    let run = start_task(ScriptedEngine::new(Script {
        fault_on_poll: Some(1),
        ..Script::default()
    }));

    let exit = run.exits.recv_timeout(SLACK).unwrap();

    match exit {
        TaskExit::Fault(err) => assert_eq!(err.kind(), "engine_fault"),
        other => panic!("unexpected exit {other:?}"),
    }
}

#[test]
fn test_poll_panic_ends_task_with_fault() {
    let mut run = start_task(ScriptedEngine::new(Script {
        panic_on_poll: Some(1),
        ..Script::default()
    }));

    let exit = run.exits.recv_timeout(SLACK).unwrap();

    match exit {
        TaskExit::Fault(err) => {
            assert_eq!(err.kind(), "engine_fault");
            assert!(err.to_string().contains("scripted poll panic"), "{err}");
        }
        other => panic!("unexpected exit {other:?}"),
    }
    run.handle.join_within(SLACK).unwrap();
}

#[test]
fn test_shutdown_request_ends_task() {
    let mut run = start_task(ScriptedEngine::working_forever(5));

    run.handle.request_shutdown();
    let exit = run.exits.recv_timeout(SLACK).unwrap();

    assert!(matches!(exit, TaskExit::Shutdown));
    run.handle.join_within(SLACK).unwrap();
    assert!(run.handle.is_finished());
}

// ============================================================================
// Snapshots and joins
// ============================================================================

#[test]
fn test_first_snapshot_is_published_immediately() {
    let run = start_task(ScriptedEngine::working_forever(5));
    std::thread::sleep(PERIOD / 4);

    let snapshot = run.status.get();

    assert_eq!(snapshot.state, RenderState::Busy);
    assert_eq!(snapshot.sample_index, 1);
    assert_eq!(snapshot.info.primitives, 12);
    assert_eq!(run.handle.period(), PERIOD);
    run.state.force(RenderState::Idle);
}

#[test]
fn test_join_within_reports_leak_then_recovers() {
    let mut run = start_task(ScriptedEngine::working_forever(5));

    let err = run
        .handle
        .join_within(Duration::from_millis(5))
        .unwrap_err();
    assert!(matches!(err, RenderError::TaskLeak(_)));
    assert!(!run.handle.is_finished());

    run.state.force(RenderState::Idle);
    run.handle.join_within(PERIOD + SLACK).unwrap();
    assert!(run.handle.is_finished());
}

#[test]
fn test_dropping_handle_stops_task() {
    let run = start_task(ScriptedEngine::working_forever(5));
    let exits = run.exits.clone();

    drop(run.handle);

    assert!(matches!(exits.try_recv(), Ok(TaskExit::Shutdown)));
}
