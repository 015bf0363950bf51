//! Protocol constants. All monetary values are in base asset units; the
//! engine is unit-agnostic and per-asset.

/// Fixed sum every proxy's receiver weights must total.
///
/// A sender funding a proxy allocates a per-proxy-weight rate; multiplying
/// by `PROXY_WEIGHTS_SUM` gives the full amount flowing through the proxy.
/// Proxy receiver reconfigurations that do not sum to this constant are
/// rejected.
pub const PROXY_WEIGHTS_SUM: u32 = 10_000;

/// Reserved cycle number rooting every delta ledger. Never a real cycle;
/// real cycles are numbered from 1.
pub const CYCLE_ROOT: u64 = 0;

/// Reserved cycle number terminating a delta ledger chain.
pub const CYCLE_END: u64 = u64::MAX;

/// Default accounting cycle length: one week in seconds.
///
/// Collectability is granted per finished cycle, so shorter cycles mean
/// faster access to funds but more ledger entries per stream.
pub const DEFAULT_CYCLE_SECS: u64 = 7 * 24 * 60 * 60;

/// Maximum number of entries (receivers plus proxies) a single sender may
/// fund. Bounds the work done by a sender reconfiguration, which touches
/// every live entry.
pub const SENDER_WEIGHTS_COUNT_MAX: usize = 100;
