use crate::core::status::StatusSnapshot;

/// Receives a fresh snapshot on every status tick
pub trait StatusSink: Send + Sync {
    fn publish(&self, snapshot: &StatusSnapshot);
}
