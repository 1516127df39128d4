// METRICS
// ================================================================================================

/// Invocation and byte counters for one trap fast path.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrapMetric {
    /// Times the trap was armed.
    pub count: u64,
    /// Bytes absorbed while the trap was active.
    pub bytes: u64,
}

/// Accumulated transduction counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub bytes_allocated: u64,
    /// Domain-error signals raised.
    pub errors: u64,
    pub sum: TrapMetric,
    pub scan: TrapMetric,
    pub product: TrapMetric,
}
