// Deterministic engine that counts every boundary call

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use parking_lot::Mutex;

use crate::config::RenderConfig;
use crate::core::bitmap::{Bitmap, SharedBitmap};
use crate::traits::{Engine, EngineStatus, NativeBuffer, PreviewBufferKind, PreviewSet};

/// Preview buffer size handed out by the scripted engine
const SCRIPTED_BUFFER_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct Script {
    /// Raw `initialize_scene` return value
    pub init_result: i32,
    /// Fail `initialize_scene` with an error instead of returning a value
    pub init_fault: bool,
    /// Time `initialize_scene` blocks for
    pub init_delay: Duration,
    /// `is_working` turns false on this poll after `begin_render`; `None` works forever
    pub finish_after_polls: Option<u32>,
    /// `poll_status` errors on this poll after `begin_render`
    pub fault_on_poll: Option<u32>,
    /// `poll_status` panics on this poll after `begin_render`
    pub panic_on_poll: Option<u32>,
    /// Fail `begin_render`
    pub begin_fault: bool,
    /// Fail allocation of this preview buffer kind
    pub fail_allocation: Option<PreviewBufferKind>,
    pub light_count: u32,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            init_result: 100,
            init_fault: false,
            init_delay: Duration::ZERO,
            finish_after_polls: None,
            fault_on_poll: None,
            panic_on_poll: None,
            begin_fault: false,
            fail_allocation: None,
            light_count: 1,
        }
    }
}

/// Per-call counters
#[derive(Debug, Default)]
pub struct CallCounts {
    pub initialize: AtomicU32,
    pub begin: AtomicU32,
    pub cancel: AtomicU32,
    pub finish: AtomicU32,
    pub polls: AtomicU32,
    pub allocations: AtomicU32,
    pub frees: AtomicU32,
    pub rasterizations: AtomicU32,
}

impl CallCounts {
    pub fn get(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

type PollHook = Arc<dyn Fn(&EngineStatus) + Send + Sync>;

pub struct ScriptedEngine {
    script: Mutex<Script>,
    calls: CallCounts,
    working: AtomicBool,
    polls_since_begin: AtomicU32,
    sample_index: AtomicU32,
    live_buffers: Mutex<HashSet<u64>>,
    next_buffer_id: AtomicU64,
    last_threads: AtomicUsize,
    sink: Mutex<Option<SharedBitmap>>,
    poll_hook: Mutex<Option<PollHook>>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            calls: CallCounts::default(),
            working: AtomicBool::new(false),
            polls_since_begin: AtomicU32::new(0),
            sample_index: AtomicU32::new(0),
            live_buffers: Mutex::new(HashSet::new()),
            next_buffer_id: AtomicU64::new(1),
            last_threads: AtomicUsize::new(0),
            sink: Mutex::new(None),
            poll_hook: Mutex::new(None),
        }
    }

    /// Engine that loads `primitives` and then works until cancelled
    pub fn working_forever(primitives: i32) -> Self {
        Self::new(Script {
            init_result: primitives,
            ..Script::default()
        })
    }

    /// Engine that completes on its `polls`-th status poll
    pub fn finishing_after(polls: u32) -> Self {
        Self::new(Script {
            finish_after_polls: Some(polls),
            ..Script::default()
        })
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    /// Run `hook` with every status, right before `poll_status` returns it
    pub fn on_poll(&self, hook: impl Fn(&EngineStatus) + Send + Sync + 'static) {
        *self.poll_hook.lock() = Some(Arc::new(hook));
    }

    pub fn update_script(&self, update: impl FnOnce(&mut Script)) {
        update(&mut self.script.lock());
    }

    pub fn is_working(&self) -> bool {
        self.working.load(Ordering::SeqCst)
    }

    /// Make the running render complete on the next poll
    pub fn complete_now(&self) {
        self.working.store(false, Ordering::SeqCst);
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers.lock().len()
    }

    /// Worker count passed to the last `begin_render`
    pub fn last_threads(&self) -> usize {
        self.last_threads.load(Ordering::SeqCst)
    }

    fn paint(&self, rgba: [u8; 4]) {
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.write().erase(rgba);
        }
    }
}

impl Engine for ScriptedEngine {
    fn initialize_scene(&self, _config: &RenderConfig) -> Result<i32> {
        self.calls.initialize.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().clone();
        if !script.init_delay.is_zero() {
            std::thread::sleep(script.init_delay);
        }
        if script.init_fault {
            bail!("scripted initialize_scene fault");
        }
        Ok(script.init_result)
    }

    fn begin_render(&self, sink: SharedBitmap, num_threads: usize, _run_async: bool) -> Result<()> {
        self.calls.begin.fetch_add(1, Ordering::SeqCst);
        if self.script.lock().begin_fault {
            bail!("scripted begin_render fault");
        }
        self.last_threads.store(num_threads, Ordering::SeqCst);
        self.polls_since_begin.store(0, Ordering::SeqCst);
        self.sample_index.store(0, Ordering::SeqCst);
        *self.sink.lock() = Some(sink);
        self.working.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn cancel_render(&self) {
        self.calls.cancel.fetch_add(1, Ordering::SeqCst);
        self.working.store(false, Ordering::SeqCst);
    }

    fn poll_status(&self) -> Result<EngineStatus> {
        self.calls.polls.fetch_add(1, Ordering::SeqCst);
        let poll = self.polls_since_begin.fetch_add(1, Ordering::SeqCst) + 1;
        let script = self.script.lock().clone();

        if script.fault_on_poll == Some(poll) {
            return Err(anyhow!("scripted poll fault on poll {poll}"));
        }
        if script.panic_on_poll == Some(poll) {
            panic!("scripted poll panic on poll {poll}");
        }
        if script.finish_after_polls.is_some_and(|n| poll >= n) {
            self.working.store(false, Ordering::SeqCst);
        }

        let working = self.working.load(Ordering::SeqCst);
        if working {
            let sample = self.sample_index.fetch_add(1, Ordering::SeqCst) + 1;
            let shade = (sample.min(255)) as u8;
            self.paint([shade, shade, shade, 255]);
        }

        let status = EngineStatus {
            is_working: working,
            fps: 4.0,
            elapsed_ms: poll as u64 * 250,
            sample_index: self.sample_index.load(Ordering::SeqCst),
            light_count: script.light_count,
            allocated_bytes: (self.live_buffers() * SCRIPTED_BUFFER_BYTES) as u64,
        };
        let hook = self.poll_hook.lock().clone();
        if let Some(hook) = hook {
            hook(&status);
        }
        Ok(status)
    }

    fn allocate_preview_buffer(&self, kind: PreviewBufferKind) -> Result<NativeBuffer> {
        self.calls.allocations.fetch_add(1, Ordering::SeqCst);
        if self.script.lock().fail_allocation == Some(kind) {
            bail!("scripted allocation failure for {kind:?}");
        }
        let id = self.next_buffer_id.fetch_add(1, Ordering::SeqCst);
        self.live_buffers.lock().insert(id);
        Ok(NativeBuffer::new(id, kind, SCRIPTED_BUFFER_BYTES))
    }

    fn free_preview_buffer(&self, buffer: NativeBuffer) {
        self.calls.frees.fetch_add(1, Ordering::SeqCst);
        self.live_buffers.lock().remove(&buffer.id());
    }

    fn rasterize_preview(&self, _buffers: PreviewSet<'_>, target: &mut Bitmap) -> Result<()> {
        self.calls.rasterizations.fetch_add(1, Ordering::SeqCst);
        target.erase([0, 0, 255, 255]);
        Ok(())
    }

    fn finish_render(&self) {
        self.calls.finish.fetch_add(1, Ordering::SeqCst);
        self.working.store(false, Ordering::SeqCst);
        self.sink.lock().take();
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
