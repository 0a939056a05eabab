use std::time::Duration;

pub type RenderResult<T> = Result<T, RenderError>;

/// Failures surfaced at the coordinator boundary.
///
/// Every variant leaves the render state machine outside of `Busy`.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("scene load error: {0}")]
    SceneLoad(String),

    #[error("low memory: {0}")]
    LowMemory(String),

    #[error("invalid resolution: {0}")]
    InvalidResolution(String),

    #[error("engine fault during {context}: {source}")]
    EngineFault {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("status task still running {0:?} after its deadline")]
    TaskLeak(Duration),

    #[error("display thread is no longer running")]
    DisplayThreadGone,

    #[error("settings error: {0}")]
    Settings(String),
}

impl RenderError {
    pub fn scene_load(msg: impl Into<String>) -> Self {
        Self::SceneLoad(msg.into())
    }

    pub fn low_memory(msg: impl Into<String>) -> Self {
        Self::LowMemory(msg.into())
    }

    pub fn invalid_resolution(msg: impl Into<String>) -> Self {
        Self::InvalidResolution(msg.into())
    }

    pub fn engine_fault(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::EngineFault {
            context: context.into(),
            source,
        }
    }

    /// Like [`engine_fault`](Self::engine_fault), but a low-memory error
    /// raised by the engine's own guard keeps its kind.
    pub fn from_engine(context: impl Into<String>, source: anyhow::Error) -> Self {
        match source.downcast::<RenderError>() {
            Ok(err @ Self::LowMemory(_)) => err,
            Ok(err) => Self::engine_fault(context, err.into()),
            Err(source) => Self::engine_fault(context, source),
        }
    }

    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    /// Short machine-friendly label, used in logs and status events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SceneLoad(_) => "scene_load",
            Self::LowMemory(_) => "low_memory",
            Self::InvalidResolution(_) => "invalid_resolution",
            Self::EngineFault { .. } => "engine_fault",
            Self::TaskLeak(_) => "task_leak",
            Self::DisplayThreadGone => "display_thread_gone",
            Self::Settings(_) => "settings",
        }
    }
}
