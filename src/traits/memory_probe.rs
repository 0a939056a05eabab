use crate::core::memory_guard::MemoryBudget;

/// Environment memory query behind the memory guard
pub trait MemoryProbe: Send + Sync {
    fn query(&self) -> MemoryBudget;
}
