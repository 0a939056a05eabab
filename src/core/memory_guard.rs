// Allocation gate against available system memory

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::bitmap::BYTES_IN_MEGABYTE;
use crate::error::{RenderError, RenderResult};
use crate::traits::MemoryProbe;

/// Live memory reading; never stored beyond one guard query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    pub available_mb: i64,
    pub low_memory: bool,
}

impl MemoryBudget {
    pub fn new(available_mb: i64, low_memory: bool) -> Self {
        Self {
            available_mb,
            low_memory,
        }
    }
}

/// Reads `MemAvailable` from `/proc/meminfo`.
///
/// The low-memory flag is raised when available memory drops under
/// `floor_mb`. On platforms without `/proc/meminfo` the probe reports
/// unlimited memory and never raises the flag.
#[derive(Debug, Clone)]
pub struct SystemMemoryProbe {
    floor_mb: u64,
}

impl SystemMemoryProbe {
    pub fn new(floor_mb: u64) -> Self {
        Self { floor_mb }
    }

    fn available_mb() -> Option<i64> {
        let text = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_meminfo_available_mb(&text)
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn query(&self) -> MemoryBudget {
        match Self::available_mb() {
            Some(available_mb) => {
                MemoryBudget::new(available_mb, available_mb < self.floor_mb as i64)
            }
            None => MemoryBudget::new(i64::MAX, false),
        }
    }
}

/// Extract `MemAvailable` (in kB) from meminfo text and convert to MB
pub fn parse_meminfo_available_mb(text: &str) -> Option<i64> {
    text.lines()
        .find(|line| line.starts_with("MemAvailable:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<i64>().ok())
        .map(|kb| kb / 1024)
}

/// Whole megabytes needed to hold `bytes`, rounded up
pub fn megabytes_for(bytes: u64) -> i64 {
    bytes.div_ceil(BYTES_IN_MEGABYTE as u64) as i64
}

/// Probe with a settable reading, for tests and simulations
#[derive(Debug)]
pub struct FixedMemoryProbe {
    budget: Mutex<MemoryBudget>,
}

impl FixedMemoryProbe {
    pub fn new(available_mb: i64) -> Self {
        Self {
            budget: Mutex::new(MemoryBudget::new(available_mb, false)),
        }
    }

    pub fn set(&self, budget: MemoryBudget) {
        *self.budget.lock() = budget;
    }

    pub fn set_available_mb(&self, available_mb: i64) {
        self.budget.lock().available_mb = available_mb;
    }

    pub fn set_low_memory(&self, low_memory: bool) {
        self.budget.lock().low_memory = low_memory;
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn query(&self) -> MemoryBudget {
        *self.budget.lock()
    }
}

#[derive(Clone)]
pub struct MemoryGuard {
    probe: Arc<dyn MemoryProbe>,
}

impl MemoryGuard {
    pub fn new(probe: Arc<dyn MemoryProbe>) -> Self {
        Self { probe }
    }

    pub fn system(floor_mb: u64) -> Self {
        Self::new(Arc::new(SystemMemoryProbe::new(floor_mb)))
    }

    /// True when allocating `needed_mb` would leave the system short.
    ///
    /// A negative request skips the query and always passes; it is used by
    /// call sites that validated the size elsewhere.
    pub fn is_low_memory(&self, needed_mb: i64) -> bool {
        if needed_mb < 0 {
            return false;
        }
        let budget = self.probe.query();
        budget.low_memory || budget.available_mb <= needed_mb.saturating_add(1)
    }

    /// `is_low_memory` as a `Result`, naming what was about to be allocated
    pub fn check(&self, needed_mb: i64, what: &str) -> RenderResult<()> {
        if self.is_low_memory(needed_mb) {
            let budget = self.probe.query();
            log::warn!(
                "not enough memory for {what}: need {needed_mb} MB, {} MB available",
                budget.available_mb
            );
            return Err(RenderError::low_memory(format!(
                "{what} needs {needed_mb} MB, {} MB available",
                budget.available_mb
            )));
        }
        Ok(())
    }

    /// [`check`](Self::check) for an allocation of `bytes`.
    ///
    /// Allocations under a megabyte pass without a query.
    pub fn check_bytes(&self, bytes: u64, what: &str) -> RenderResult<()> {
        if bytes < BYTES_IN_MEGABYTE as u64 {
            return Ok(());
        }
        self.check(megabytes_for(bytes), what)
    }

    pub fn budget(&self) -> MemoryBudget {
        self.probe.query()
    }
}

impl std::fmt::Debug for MemoryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGuard").finish_non_exhaustive()
    }
}
