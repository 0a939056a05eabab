pub mod scripted;
pub mod software;

pub use scripted::{CallCounts, Script, ScriptedEngine};
pub use software::SoftwareEngine;
