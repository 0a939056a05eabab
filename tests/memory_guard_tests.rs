use std::sync::Arc;

use render_host::core::memory_guard::{FixedMemoryProbe, MemoryBudget, MemoryGuard};
use render_host::RenderError;

fn guard(available_mb: i64) -> (MemoryGuard, Arc<FixedMemoryProbe>) {
    let probe = Arc::new(FixedMemoryProbe::new(available_mb));
    (MemoryGuard::new(Arc::clone(&probe) as _), probe)
}

// ============================================================================
// is_low_memory
// ============================================================================

#[test]
fn test_ten_megabytes_with_nine_available_is_low() {
    let (guard, _) = guard(9);
    assert!(guard.is_low_memory(10));
}

#[test]
fn test_ten_megabytes_with_hundred_available_is_fine() {
    let (guard, _) = guard(100);
    assert!(!guard.is_low_memory(10));
}

#[test]
fn test_negative_request_is_never_low() {
    let (guard, probe) = guard(0);
    probe.set(MemoryBudget::new(0, true));
    assert!(!guard.is_low_memory(-5));
}

#[test]
fn test_system_low_flag_forces_low() {
    let (guard, probe) = guard(4096);
    assert!(!guard.is_low_memory(1));

    probe.set_low_memory(true);

    assert!(guard.is_low_memory(1));
}

#[test]
fn test_reading_is_live_not_cached() {
    let (guard, probe) = guard(100);
    assert!(!guard.is_low_memory(50));

    probe.set_available_mb(20);

    assert!(guard.is_low_memory(50));
    assert_eq!(guard.budget().available_mb, 20);
}

// ============================================================================
// check
// ============================================================================

#[test]
fn test_check_names_the_allocation() {
    let (guard, _) = guard(3);

    let err = guard.check(8, "preview buffer").unwrap_err();

    assert!(matches!(err, RenderError::LowMemory(_)));
    assert!(err.to_string().contains("preview buffer"));
    assert!(err.to_string().contains("3 MB"));
}

#[test]
fn test_system_guard_accepts_small_request() {
    let guard = MemoryGuard::system(0);
    assert!(!guard.is_low_memory(0));
}
