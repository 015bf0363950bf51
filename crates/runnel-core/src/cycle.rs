//! Cycle arithmetic.
//!
//! Wall-clock time is partitioned into consecutive, equal-length cycles.
//! Real cycles are numbered from 1; cycle 0 is the ledger sentinel
//! ([`CYCLE_ROOT`](crate::constants::CYCLE_ROOT)). Cycle `c` covers the
//! half-open interval `[(c - 1) * cycle_secs, c * cycle_secs)`, so every
//! cycle strictly before `cycle_of(now)` is finished.

/// The cycle containing timestamp `ts`.
///
/// # Examples
///
/// ```
/// use runnel_core::cycle::cycle_of;
/// assert_eq!(cycle_of(0, 5), 1);
/// assert_eq!(cycle_of(4, 5), 1);
/// assert_eq!(cycle_of(5, 5), 2);
/// ```
pub fn cycle_of(ts: u64, cycle_secs: u64) -> u64 {
    // Saturates into the reserved end marker for timestamps at the far
    // edge of the representable range; callers reject that cycle.
    (ts / cycle_secs).saturating_add(1)
}

/// First timestamp of cycle `cycle`.
///
/// Saturates for the reserved end-marker cycle rather than overflowing.
pub fn cycle_start(cycle: u64, cycle_secs: u64) -> u64 {
    cycle.saturating_sub(1).saturating_mul(cycle_secs)
}

/// First timestamp after cycle `cycle` (its exclusive end).
pub fn cycle_end(cycle: u64, cycle_secs: u64) -> u64 {
    cycle.saturating_mul(cycle_secs)
}

/// Seconds from `ts` to the end of its cycle. Always in `1..=cycle_secs`.
pub fn secs_until_cycle_end(ts: u64, cycle_secs: u64) -> u64 {
    cycle_secs - ts % cycle_secs
}

/// Seconds of `ts`'s cycle already elapsed before `ts`. Always in
/// `0..cycle_secs`.
pub fn secs_into_cycle(ts: u64, cycle_secs: u64) -> u64 {
    ts % cycle_secs
}
