pub mod bitmap;
pub mod composer;
pub mod coordinator;
pub mod display_context;
pub mod display_thread;
pub mod memory_guard;
pub mod poller;
pub mod state;
pub mod status;

pub use bitmap::{Bitmap, SharedBitmap};
pub use composer::{preview_memory_mb, FrameComposer, FrameOutcome};
pub use coordinator::{RenderCoordinator, RenderEvent, StartOutcome};
pub use display_context::DisplayContext;
pub use display_thread::DisplayThread;
pub use memory_guard::{FixedMemoryProbe, MemoryBudget, MemoryGuard, SystemMemoryProbe};
pub use poller::{BackgroundStatusTask, StatusTaskContext, StatusTaskHandle, TaskExit};
pub use state::{RenderState, StateCell};
pub use status::{
    ChannelStatusSink, FpsMeter, LatestStatus, LogStatusSink, RenderInfo, StatusSnapshot,
};
